//! PostgreSQL implementation of the relational store
//!
//! Each [`RelationalTxn`] pins one pooled connection and drives the
//! transaction with explicit `BEGIN`/`COMMIT`/`ROLLBACK`.

use crate::adapters::postgresql::client::{describe, PostgreSQLClient};
use crate::adapters::relational::{Fields, RelationalStore, RelationalTxn, Table};
use crate::domain::{PersistenceError, Result};
use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;
use std::sync::{Arc, OnceLock};
use tokio_postgres::types::ToSql;

/// PostgreSQL relational store
pub struct PostgreSQLStore {
    client: Arc<PostgreSQLClient>,
}

impl PostgreSQLStore {
    pub fn new(client: PostgreSQLClient) -> Self {
        Self {
            client: Arc::new(client),
        }
    }

    /// Get a reference to the underlying client
    pub fn client(&self) -> &Arc<PostgreSQLClient> {
        &self.client
    }
}

#[async_trait]
impl RelationalStore for PostgreSQLStore {
    async fn test_connection(&self) -> Result<()> {
        self.client.test_connection().await
    }

    async fn begin(&self) -> Result<Box<dyn RelationalTxn>> {
        let connection = self.client.get_connection().await?;

        let begin = format!(
            "BEGIN; SET LOCAL statement_timeout = {}",
            self.client.statement_timeout_ms()
        );
        connection.batch_execute(&begin).await.map_err(|e| {
            PersistenceError::Transaction(format!("Failed to begin transaction: {}", describe(&e)))
        })?;

        Ok(Box::new(PostgreSQLTxn {
            connection: Some(connection),
        }))
    }

    fn describe(&self) -> String {
        self.client.connection_string_safe()
    }
}

/// Open PostgreSQL transaction
///
/// A transaction dropped before commit or rollback detaches its connection
/// from the pool, which closes it and makes the server abort the transaction.
struct PostgreSQLTxn {
    connection: Option<deadpool_postgres::Object>,
}

impl PostgreSQLTxn {
    fn connection(&self) -> Result<&deadpool_postgres::Object> {
        self.connection.as_ref().ok_or_else(|| {
            PersistenceError::Transaction("Transaction already finished".to_string()).into()
        })
    }

    async fn execute(&self, statement: &str, values: &[Option<&str>]) -> Result<u64> {
        let params: Vec<&(dyn ToSql + Sync)> =
            values.iter().map(|v| v as &(dyn ToSql + Sync)).collect();

        tracing::trace!(statement = %statement, "Executing statement");
        self.connection()?
            .execute(statement, &params)
            .await
            .map_err(|e| PersistenceError::Update(describe(&e)).into())
    }

    async fn finish(mut self: Box<Self>, statement: &str) -> Result<()> {
        let connection = self.connection.take().ok_or_else(|| {
            PersistenceError::Transaction("Transaction already finished".to_string())
        })?;

        match connection.batch_execute(statement).await {
            Ok(()) => Ok(()),
            Err(e) => {
                // connection state is unknown, don't hand it back to the pool
                let _ = deadpool_postgres::Object::take(connection);
                Err(PersistenceError::Transaction(format!("{statement} failed: {}", describe(&e)))
                    .into())
            }
        }
    }
}

impl Drop for PostgreSQLTxn {
    fn drop(&mut self) {
        if let Some(connection) = self.connection.take() {
            tracing::warn!("Transaction dropped while open, discarding its connection");
            let _ = deadpool_postgres::Object::take(connection);
        }
    }
}

#[async_trait]
impl RelationalTxn for PostgreSQLTxn {
    async fn update(&mut self, table: Table, set: &Fields, filter: &Fields) -> Result<u64> {
        let (statement, values) = update_statement(table, set, filter)?;
        self.execute(&statement, &values).await
    }

    async fn create(&mut self, table: Table, fields: &Fields) -> Result<()> {
        let (statement, values) = insert_statement(table, fields)?;
        self.execute(&statement, &values).await?;
        Ok(())
    }

    async fn destroy(&mut self, table: Table, filter: &Fields) -> Result<u64> {
        let (statement, values) = delete_statement(table, filter)?;
        self.execute(&statement, &values).await
    }

    async fn call_function(&mut self, name: &str, argument: &Value) -> Result<Vec<Value>> {
        let statement = function_statement(name)?;
        let rows = self
            .connection()?
            .query(&statement, &[argument])
            .await
            .map_err(|e| PersistenceError::Query(format!("{name}: {}", describe(&e))))?;

        rows.iter()
            .map(|row| {
                row.try_get::<_, Option<Value>>(0)
                    .map(|v| v.unwrap_or(Value::Null))
                    .map_err(|e| PersistenceError::InvalidResponse(e.to_string()).into())
            })
            .collect()
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.finish("COMMIT").await
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.finish("ROLLBACK").await
    }
}

/// Appends `column = $n` (or `column IS NULL`) conditions joined with AND
fn where_clause<'a>(filter: &'a Fields, values: &mut Vec<Option<&'a str>>) -> Result<String> {
    if filter.is_empty() {
        return Err(
            PersistenceError::Update("Refusing to write without a filter".to_string()).into(),
        );
    }

    let conditions: Vec<String> = filter
        .iter()
        .map(|(column, value)| match value {
            Some(v) => {
                values.push(Some(v));
                format!("{column} = ${}", values.len())
            }
            None => format!("{column} IS NULL"),
        })
        .collect();
    Ok(conditions.join(" AND "))
}

fn update_statement<'a>(
    table: Table,
    set: &'a Fields,
    filter: &'a Fields,
) -> Result<(String, Vec<Option<&'a str>>)> {
    if set.is_empty() {
        return Err(PersistenceError::Update(format!("Empty update of {table}")).into());
    }

    let mut values = Vec::new();
    let assignments: Vec<String> = set
        .iter()
        .map(|(column, value)| {
            values.push(value);
            format!("{column} = ${}", values.len())
        })
        .collect();
    let condition = where_clause(filter, &mut values)?;

    Ok((
        format!(
            "UPDATE {} SET {} WHERE {}",
            table.name(),
            assignments.join(", "),
            condition
        ),
        values,
    ))
}

fn insert_statement(table: Table, fields: &Fields) -> Result<(String, Vec<Option<&str>>)> {
    if fields.is_empty() {
        return Err(PersistenceError::Update(format!("Empty insert into {table}")).into());
    }

    let columns: Vec<&str> = fields.iter().map(|(c, _)| c).collect();
    let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("${i}")).collect();
    let values = fields.iter().map(|(_, v)| v).collect();

    Ok((
        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            table.name(),
            columns.join(", "),
            placeholders.join(", ")
        ),
        values,
    ))
}

fn delete_statement(table: Table, filter: &Fields) -> Result<(String, Vec<Option<&str>>)> {
    let mut values = Vec::new();
    let condition = where_clause(filter, &mut values)?;
    Ok((
        format!("DELETE FROM {} WHERE {}", table.name(), condition),
        values,
    ))
}

fn function_statement(name: &str) -> Result<String> {
    static IDENTIFIER: OnceLock<Option<Regex>> = OnceLock::new();
    let valid = IDENTIFIER
        .get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").ok())
        .as_ref()
        .is_some_and(|re| re.is_match(name));

    if !valid {
        return Err(PersistenceError::Query(format!("Invalid function name '{name}'")).into());
    }
    Ok(format!("SELECT {name}($1::json)"))
}
