//! Domain identifier types with validation
//!
//! Newtype wrappers for the business keys shared by both stores. Each type
//! rejects empty or whitespace-only input so that a constructed identifier is
//! always usable as a store filter.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Manifest source identifier
///
/// The unique business key of a manifest (for example `M108265`). Orders
/// reference their manifest through this key in both stores.
///
/// # Examples
///
/// ```
/// use lading::domain::ids::ManifestSourceId;
/// use std::str::FromStr;
///
/// let id = ManifestSourceId::from_str("M108265").unwrap();
/// assert_eq!(id.as_str(), "M108265");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ManifestSourceId(String);

impl ManifestSourceId {
    /// Creates a new ManifestSourceId from a string
    pub fn new(id: impl Into<String>) -> Result<Self, String> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err("Manifest source ID cannot be empty".to_string());
        }
        Ok(Self(id.trim().to_string()))
    }

    /// Returns the manifest source ID as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes self and returns the inner String
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for ManifestSourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ManifestSourceId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for ManifestSourceId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Order line identifier
///
/// Unique per order line. Runs of digits compare by numeric value, so `O9`
/// sorts before `O10` and `99` before `100`. The ordering is the
/// deterministic tie-break when a manifest attribute is canonicalized.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderLineId(String);

impl OrderLineId {
    /// Creates a new OrderLineId from a string
    pub fn new(id: impl Into<String>) -> Result<Self, String> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err("Order line ID cannot be empty".to_string());
        }
        Ok(Self(id.trim().to_string()))
    }

    /// Returns the order line ID as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes self and returns the inner String
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl Ord for OrderLineId {
    fn cmp(&self, other: &Self) -> Ordering {
        natural_cmp(&self.0, &other.0).then_with(|| self.0.cmp(&other.0))
    }
}

impl PartialOrd for OrderLineId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Compares text runs character by character and digit runs by value
///
/// Leading zeros are ignored, so `"007"` and `"7"` compare equal here.
fn natural_cmp(a: &str, b: &str) -> Ordering {
    let (mut a, mut b) = (a, b);
    loop {
        let (Some(x), Some(y)) = (a.chars().next(), b.chars().next()) else {
            // the shorter remainder is a prefix of the longer one
            return a.is_empty().cmp(&b.is_empty()).reverse();
        };

        let ordering = if x.is_ascii_digit() && y.is_ascii_digit() {
            let (digits_a, rest_a) = split_digits(a);
            let (digits_b, rest_b) = split_digits(b);
            a = rest_a;
            b = rest_b;
            let digits_a = digits_a.trim_start_matches('0');
            let digits_b = digits_b.trim_start_matches('0');
            digits_a
                .len()
                .cmp(&digits_b.len())
                .then_with(|| digits_a.cmp(digits_b))
        } else {
            a = &a[x.len_utf8()..];
            b = &b[y.len_utf8()..];
            x.cmp(&y)
        };

        if ordering != Ordering::Equal {
            return ordering;
        }
    }
}

fn split_digits(s: &str) -> (&str, &str) {
    s.split_at(s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len()))
}

impl fmt::Display for OrderLineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for OrderLineId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for OrderLineId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Order identifier (the parent of one or more order lines)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderId(String);

impl OrderId {
    /// Creates a new OrderId from a string
    pub fn new(id: impl Into<String>) -> Result<Self, String> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err("Order ID cannot be empty".to_string());
        }
        Ok(Self(id.trim().to_string()))
    }

    /// Returns the order ID as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for OrderId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn test_manifest_source_id_rejects_blank() {
        assert!(ManifestSourceId::new("").is_err());
        assert!(ManifestSourceId::new("   ").is_err());
    }

    #[test]
    fn test_manifest_source_id_trims() {
        let id = ManifestSourceId::new("  M1 ").unwrap();
        assert_eq!(id.as_str(), "M1");
        assert_eq!(id.to_string(), "M1");
    }

    #[test_case("O1", "O2" ; "same width")]
    #[test_case("O9", "O10" ; "digit run length")]
    #[test_case("99", "100" ; "numeric ids")]
    #[test_case("O", "O1" ; "prefix first")]
    #[test_case("A10", "B2" ; "text before digits")]
    #[test_case("007", "7" ; "leading zeros tie broken by text")]
    fn test_order_line_id_ordering(lower: &str, higher: &str) {
        let lower = OrderLineId::new(lower).unwrap();
        let higher = OrderLineId::new(higher).unwrap();
        assert!(lower < higher);
        assert!(higher > lower);
    }

    #[test]
    fn test_order_id_from_str() {
        let id = OrderId::from_str("1001").unwrap();
        assert_eq!(id.as_str(), "1001");
        assert!(OrderId::from_str("").is_err());
    }
}
