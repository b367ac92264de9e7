//! Storage access for pipeline stages.
//!
//! [`Database`] couples the query builder with an [`Executor`] and reports
//! every failure on the caller's baton, so actions only ever see rows or a
//! [`Halt`].

pub mod executor;
pub mod fixtures;
pub mod memory;
pub mod mysql;
pub mod query_builder;

use std::sync::Arc;

use rand::Rng;
use serde_json::Value;
use tracing::{debug, error};

use crate::baton::{Baton, ErrorRecord, Halt, StageResult};
use crate::error::ApiError;
use crate::schema::{tables, SchemaRegistry};

pub use executor::{DatabaseError, ExecResult, Executor};
pub use memory::MemoryExecutor;
pub use mysql::MySqlExecutor;
pub use query_builder::{QueryBuilder, QueryError, Row, SelectParams, SqlResult, Statement};

const ID_ATTEMPTS: usize = 5;

#[derive(Clone)]
pub struct Database {
    registry: Arc<SchemaRegistry>,
    executor: Arc<dyn Executor>,
    log_queries: bool,
}

impl Database {
    pub fn new(registry: Arc<SchemaRegistry>, executor: Arc<dyn Executor>) -> Self {
        Self { registry, executor, log_queries: false }
    }

    pub fn with_query_logging(mut self, enabled: bool) -> Self {
        self.log_queries = enabled;
        self
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    pub fn executor_name(&self) -> &'static str {
        self.executor.name()
    }

    pub async fn ping(&self) -> Result<(), DatabaseError> {
        self.executor.ping().await
    }

    fn builder<'a>(&'a self, baton: &mut Baton, table: &'a str) -> StageResult<QueryBuilder<'a>> {
        QueryBuilder::new(&self.registry, table).map_err(|err| Self::rejected(baton, table, err))
    }

    /// Builder rejection: nothing was sent to the store.
    fn rejected(baton: &mut Baton, table: &str, err: QueryError) -> Halt {
        let mut record = ErrorRecord::new(ApiError::Storage)
            .detail(format!("DB Actions: {}", err))
            .action(table);
        if let Some(subject) = err.subject() {
            record = record.attr(subject);
        }
        baton.fail(record)
    }

    async fn run(&self, baton: &mut Baton, sql: SqlResult) -> StageResult<ExecResult> {
        if self.log_queries {
            debug!("[{}] {}", baton.id, sql.to_literal_sql());
        }

        match self.executor.execute(&sql).await {
            Ok(result) => Ok(result),
            Err(err) => {
                error!("[{}] query failed on {}: {}", baton.id, sql.statement.table(), err);
                Err(baton.fail(
                    ErrorRecord::new(ApiError::Storage)
                        .detail("DB Actions: query failed")
                        .action(sql.statement.table())
                        .internal(format!("{} | {}", err, sql.to_literal_sql())),
                ))
            }
        }
    }

    /// Select with the baton's pagination directive for `table`, if any.
    pub async fn select_query(
        &self,
        baton: &mut Baton,
        table: &str,
        params: &SelectParams,
    ) -> StageResult<Vec<Row>> {
        baton.add_method("selectQuery");
        let limit = baton.db_limit.get(table).cloned();
        let sql = self
            .builder(baton, table)?
            .select(params, limit.as_ref())
            .map_err(|err| Self::rejected(baton, table, err))?;
        Ok(self.run(baton, sql).await?.rows)
    }

    /// Validate every row, then insert them in one statement.
    pub async fn insert_multiple_query(
        &self,
        baton: &mut Baton,
        table: &str,
        rows: &[Row],
    ) -> StageResult<u64> {
        baton.add_method("insertMultipleQuery");
        let sql = self
            .builder(baton, table)?
            .insert(rows)
            .map_err(|err| Self::rejected(baton, table, err))?;
        Ok(self.run(baton, sql).await?.rows_affected)
    }

    pub async fn update_query(
        &self,
        baton: &mut Baton,
        table: &str,
        values: &Row,
        conditions: &Row,
    ) -> StageResult<u64> {
        baton.add_method("updateQuery");
        let sql = self
            .builder(baton, table)?
            .update(values, conditions)
            .map_err(|err| Self::rejected(baton, table, err))?;
        Ok(self.run(baton, sql).await?.rows_affected)
    }

    pub async fn mass_update(
        &self,
        baton: &mut Baton,
        table: &str,
        rows: &[Row],
        condition_attr: &str,
    ) -> StageResult<u64> {
        baton.add_method("massUpdate");
        let sql = self
            .builder(baton, table)?
            .mass_update(rows, condition_attr)
            .map_err(|err| Self::rejected(baton, table, err))?;
        Ok(self.run(baton, sql).await?.rows_affected)
    }

    /// Random `length`-digit ids not yet used in `table.column`. Candidates
    /// are checked against the table and redrawn until enough are free.
    pub async fn generate_custom_ids(
        &self,
        baton: &mut Baton,
        count: usize,
        length: u32,
        table: &str,
        column: &str,
    ) -> StageResult<Vec<i64>> {
        baton.add_method("generateCustomIds");
        let low = 10_i64.pow(length.saturating_sub(1).min(17));
        let high = low.saturating_mul(10);
        if i64::try_from(count).map_or(true, |count| count > high - low) {
            return Err(baton.fail(
                ErrorRecord::new(ApiError::Storage)
                    .detail(format!("DB Actions: cannot draw {} distinct {}-digit ids", count, length))
                    .action(table)
                    .attr(column),
            ));
        }
        let mut ids: Vec<i64> = Vec::with_capacity(count);

        for _ in 0..ID_ATTEMPTS {
            if ids.len() >= count {
                break;
            }
            let candidates: Vec<i64> = {
                let mut rng = rand::thread_rng();
                let mut drawn: Vec<i64> = Vec::new();
                while drawn.len() < count - ids.len() {
                    let id = rng.gen_range(low..high);
                    if !drawn.contains(&id) && !ids.contains(&id) {
                        drawn.push(id);
                    }
                }
                drawn
            };

            // pagination would hide taken ids, so the lookup ignores db_limit
            let lookup = SelectParams::new().eq(column, candidates.iter().map(|id| Value::from(*id)));
            let sql = self
                .builder(baton, table)?
                .select(&lookup, None)
                .map_err(|err| Self::rejected(baton, table, err))?;
            let taken = self.run(baton, sql).await?.rows;
            ids.extend(candidates.into_iter().filter(|id| {
                !taken
                    .iter()
                    .any(|row| row.get(column).and_then(Value::as_i64) == Some(*id))
            }));
        }

        if ids.len() < count {
            return Err(baton.fail(
                ErrorRecord::new(ApiError::Storage)
                    .detail("DB Actions: could not generate free ids")
                    .action(table)
                    .attr(column),
            ));
        }
        ids.truncate(count);
        Ok(ids)
    }

    pub async fn get_test_data(&self, baton: &mut Baton, params: &SelectParams) -> StageResult<Vec<Row>> {
        baton.add_method("getTestData");
        self.select_query(baton, tables::TEST_DATA, params).await
    }

    pub async fn insert_test_data(&self, baton: &mut Baton, rows: &[Row]) -> StageResult<u64> {
        baton.add_method("insertTestData");
        self.insert_multiple_query(baton, tables::TEST_DATA, rows).await
    }

    pub async fn get_user_data(&self, baton: &mut Baton, params: &SelectParams) -> StageResult<Vec<Row>> {
        baton.add_method("getUserData");
        self.select_query(baton, tables::USER, params).await
    }

    pub async fn insert_user(&self, baton: &mut Baton, rows: &[Row]) -> StageResult<u64> {
        baton.add_method("insertUser");
        self.insert_multiple_query(baton, tables::USER, rows).await
    }

    pub async fn get_all_role_data(&self, baton: &mut Baton) -> StageResult<Vec<Row>> {
        baton.add_method("getAllRoleData");
        self.select_query(baton, tables::ROLE, &SelectParams::new()).await
    }

    pub async fn get_all_action_data(&self, baton: &mut Baton) -> StageResult<Vec<Row>> {
        baton.add_method("getAllActionData");
        self.select_query(baton, tables::ACTION, &SelectParams::new()).await
    }

    pub async fn get_all_role_action_data(&self, baton: &mut Baton) -> StageResult<Vec<Row>> {
        baton.add_method("getAllRoleActionData");
        self.select_query(baton, tables::ROLE_ACTION, &SelectParams::new()).await
    }
}
