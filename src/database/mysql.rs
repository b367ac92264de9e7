//! MySQL executor backed by an sqlx pool.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Number, Value};
use sqlx::mysql::{MySqlArguments, MySqlPool, MySqlPoolOptions, MySqlRow};
use sqlx::{Column, MySql, Row, TypeInfo};
use tracing::info;

use super::executor::{DatabaseError, ExecResult, Executor};
use super::query_builder::SqlResult;
use crate::config::DatabaseConfig;

pub struct MySqlExecutor {
    pool: MySqlPool,
}

impl MySqlExecutor {
    /// Build the pool without opening a connection; the first query connects.
    pub fn connect_lazy(config: &DatabaseConfig) -> Result<Self, DatabaseError> {
        let url = config
            .url
            .as_deref()
            .ok_or(DatabaseError::ConfigMissing("DATABASE_URL"))?;

        let pool = MySqlPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout))
            .connect_lazy(url)?;

        info!(
            "Created MySQL pool (max_connections={})",
            config.max_connections
        );
        Ok(Self { pool })
    }

    pub fn from_pool(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Executor for MySqlExecutor {
    async fn execute(&self, sql: &SqlResult) -> Result<ExecResult, DatabaseError> {
        let expanded = sql.expand_bulk();

        let mut q = sqlx::query(&expanded.query);
        for p in expanded.params.iter() {
            q = bind_param(q, p);
        }

        if sql.statement.is_read() {
            let rows = q.fetch_all(&self.pool).await?;
            let rows = rows.iter().map(row_to_json).collect();
            Ok(ExecResult::rows(rows))
        } else {
            let done = q.execute(&self.pool).await?;
            Ok(ExecResult::affected(done.rows_affected()))
        }
    }

    async fn ping(&self) -> Result<(), DatabaseError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "mysql"
    }
}

fn bind_param<'q>(
    q: sqlx::query::Query<'q, MySql, MySqlArguments>,
    v: &'q Value,
) -> sqlx::query::Query<'q, MySql, MySqlArguments> {
    match v {
        Value::Null => {
            let none: Option<String> = None;
            q.bind(none)
        }
        Value::Bool(b) => q.bind(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                q.bind(i)
            } else if let Some(u) = n.as_u64() {
                q.bind(u)
            } else if let Some(f) = n.as_f64() {
                q.bind(f)
            } else {
                q.bind(n.to_string())
            }
        }
        Value::String(s) => q.bind(s.as_str()),
        // Nested values are stored as their JSON text
        Value::Array(_) | Value::Object(_) => q.bind(v.to_string()),
    }
}

fn row_to_json(row: &MySqlRow) -> Map<String, Value> {
    let mut map = Map::new();
    for (i, column) in row.columns().iter().enumerate() {
        let value = decode_column(row, i, column.type_info().name());
        map.insert(column.name().to_string(), value);
    }
    map
}

fn decode_column(row: &MySqlRow, i: usize, type_name: &str) -> Value {
    let decoded = match type_name {
        "BOOLEAN" => row.try_get::<Option<bool>, _>(i).map(|v| v.map(Value::Bool)),
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" => row
            .try_get::<Option<i64>, _>(i)
            .map(|v| v.map(|n| Value::Number(n.into()))),
        "TINYINT UNSIGNED" | "SMALLINT UNSIGNED" | "MEDIUMINT UNSIGNED" | "INT UNSIGNED"
        | "BIGINT UNSIGNED" => row
            .try_get::<Option<u64>, _>(i)
            .map(|v| v.map(|n| Value::Number(n.into()))),
        "FLOAT" | "DOUBLE" => row
            .try_get::<Option<f64>, _>(i)
            .map(|v| v.and_then(Number::from_f64).map(Value::Number)),
        _ => row.try_get::<Option<String>, _>(i).map(|v| v.map(Value::String)),
    };

    match decoded {
        Ok(Some(value)) => value,
        Ok(None) => Value::Null,
        Err(err) => {
            tracing::warn!("Could not decode column {} ({}): {}", i, type_name, err);
            Value::Null
        }
    }
}
