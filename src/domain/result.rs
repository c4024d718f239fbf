//! Result type alias for Lading

use super::errors::LadingError;

/// Result type alias for Lading operations
///
/// # Examples
///
/// ```
/// use lading::domain::result::Result;
/// use lading::domain::errors::LadingError;
///
/// fn example_function() -> Result<String> {
///     Ok("success".to_string())
/// }
///
/// fn failing_function() -> Result<()> {
///     Err(LadingError::missing_fields(["manifestSourceId"]))
/// }
/// ```
pub type Result<T> = std::result::Result<T, LadingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_with_question_mark() -> Result<()> {
        fn inner() -> Result<i32> {
            Ok(42)
        }

        let value = inner()?;
        assert_eq!(value, 42);
        Ok(())
    }
}
