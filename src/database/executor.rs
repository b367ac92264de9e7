use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use super::query_builder::{Row, SqlResult};

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Missing configuration: {0}")]
    ConfigMissing(&'static str),

    #[error("Query error: {0}")]
    QueryError(String),

    #[error("Database unavailable: {0}")]
    Unavailable(String),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// Rows for reads, affected count for writes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecResult {
    pub rows: Vec<Row>,
    pub rows_affected: u64,
}

impl ExecResult {
    pub fn rows(rows: Vec<Row>) -> Self {
        let rows_affected = rows.len() as u64;
        Self { rows, rows_affected }
    }

    pub fn affected(rows_affected: u64) -> Self {
        Self { rows: Vec::new(), rows_affected }
    }

    pub fn into_json(self) -> Value {
        Value::Array(self.rows.into_iter().map(Value::Object).collect())
    }
}

/// Runs built statements against a store.
#[async_trait]
pub trait Executor: Send + Sync {
    async fn execute(&self, sql: &SqlResult) -> Result<ExecResult, DatabaseError>;

    async fn ping(&self) -> Result<(), DatabaseError> {
        Ok(())
    }

    fn name(&self) -> &'static str;
}
