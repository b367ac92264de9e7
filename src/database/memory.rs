//! In-process executor. Interprets built statements against tables held in
//! memory; used for development without a database and by the test suite.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use super::executor::{DatabaseError, ExecResult, Executor};
use super::query_builder::{Row, SelectParams, SqlResult, Statement};

#[derive(Default)]
struct State {
    tables: HashMap<String, Vec<Row>>,
    log: Vec<String>,
    failure: Option<String>,
}

#[derive(Default)]
pub struct MemoryExecutor {
    state: Mutex<State>,
}

impl MemoryExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        // A panic while holding the lock leaves the tables usable
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Append rows to a table, creating it if needed.
    pub fn seed(&self, table: &str, rows: impl IntoIterator<Item = Row>) {
        self.lock()
            .tables
            .entry(table.to_string())
            .or_default()
            .extend(rows);
    }

    pub fn rows(&self, table: &str) -> Vec<Row> {
        self.lock().tables.get(table).cloned().unwrap_or_default()
    }

    /// Literal SQL of every statement executed so far.
    pub fn executed(&self) -> Vec<String> {
        self.lock().log.clone()
    }

    pub fn last_statement(&self) -> Option<String> {
        self.lock().log.last().cloned()
    }

    pub fn clear_log(&self) {
        self.lock().log.clear();
    }

    /// Make every following statement fail with `message`.
    pub fn fail_with(&self, message: impl Into<String>) {
        self.lock().failure = Some(message.into());
    }

    pub fn clear_failure(&self) {
        self.lock().failure = None;
    }
}

#[async_trait]
impl Executor for MemoryExecutor {
    async fn execute(&self, sql: &SqlResult) -> Result<ExecResult, DatabaseError> {
        let mut state = self.lock();
        state.log.push(sql.to_literal_sql());

        if let Some(message) = &state.failure {
            return Err(DatabaseError::QueryError(message.clone()));
        }

        match &sql.statement {
            Statement::Select { table, filter, page } => {
                let mut rows: Vec<Row> = state
                    .tables
                    .get(table)
                    .map(|rows| rows.iter().filter(|row| matches_filter(row, filter)).cloned().collect())
                    .unwrap_or_default();

                if let Some(page) = page {
                    rows.sort_by(|a, b| {
                        compare_loose(field(a, &page.order_attr), field(b, &page.order_attr)).reverse()
                    });
                    rows = rows
                        .into_iter()
                        .skip(page.offset as usize)
                        .take(page.limit as usize)
                        .collect();
                }
                Ok(ExecResult::rows(rows))
            }
            Statement::Insert { table, columns, rows } => {
                let target = state.tables.entry(table.clone()).or_default();
                for tuple in rows {
                    let row: Row = columns.iter().cloned().zip(tuple.iter().cloned()).collect();
                    target.push(row);
                }
                Ok(ExecResult::affected(rows.len() as u64))
            }
            Statement::Update { table, values, condition } => {
                let mut affected = 0;
                if let Some(rows) = state.tables.get_mut(table) {
                    for row in rows.iter_mut() {
                        let (attr, expected) = condition;
                        if row.get(attr).is_some_and(|v| eq_loose(v, expected)) {
                            for (column, value) in values {
                                row.insert(column.clone(), value.clone());
                            }
                            affected += 1;
                        }
                    }
                }
                Ok(ExecResult::affected(affected))
            }
            Statement::MassUpdate { table, condition, targets } => {
                let mut affected = 0;
                if let Some(rows) = state.tables.get_mut(table) {
                    for row in rows.iter_mut() {
                        let Some(key) = row.get(condition).cloned() else {
                            continue;
                        };
                        let mut touched = false;
                        for target in targets {
                            if let Some((_, value)) =
                                target.cases.iter().find(|(case, _)| eq_loose(case, &key))
                            {
                                row.insert(target.column.clone(), value.clone());
                                touched = true;
                            }
                        }
                        if touched {
                            affected += 1;
                        }
                    }
                }
                Ok(ExecResult::affected(affected))
            }
        }
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

static NULL: Value = Value::Null;

fn field<'a>(row: &'a Row, column: &str) -> &'a Value {
    row.get(column).unwrap_or(&NULL)
}

fn matches_filter(row: &Row, filter: &SelectParams) -> bool {
    let equals = filter
        .equals
        .iter()
        .all(|(column, values)| values.iter().any(|v| eq_loose(field(row, column), v)));
    let below = filter.less_than.iter().all(|(column, bound)| {
        let value = field(row, column);
        comparable(value, bound) && compare_loose(value, bound) == Ordering::Less
    });
    let above = filter.greater_than.iter().all(|(column, bound)| {
        let value = field(row, column);
        comparable(value, bound) && compare_loose(value, bound) == Ordering::Greater
    });
    equals && below && above
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

fn comparable(a: &Value, b: &Value) -> bool {
    !a.is_null() && !b.is_null()
}

/// MySQL-style comparison: numeric when either side is a number.
fn eq_loose(a: &Value, b: &Value) -> bool {
    if a.is_null() || b.is_null() {
        return false;
    }
    compare_loose(a, b) == Ordering::Equal
}

fn compare_loose(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Less,
        (_, Value::Null) => Ordering::Greater,
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => match (as_number(a), as_number(b)) {
            (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
            _ => a.to_string().cmp(&b.to_string()),
        },
    }
}
