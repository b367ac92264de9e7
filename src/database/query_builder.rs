//! Schema-checked SQL construction.
//!
//! Builders are pure: they validate the inputs against a [`TableSchema`] and
//! return a [`SqlResult`] (MySQL text with `?` placeholders, the positional
//! parameters, and a structured [`Statement`] describing the same operation).
//! Nothing here touches a connection.

use serde_json::{Map, Value};
use thiserror::Error;

use crate::baton::DbLimit;
use crate::schema::{ColumnDef, SchemaRegistry, TableSchema};

pub type Row = Map<String, Value>;

/// Fixed page size for paginated selects.
pub const PAGE_SIZE: u64 = 100;

/// Reserved select keys for range conditions.
pub const LESS_THAN: &str = "lessThan";
pub const GREATER_THAN: &str = "greaterThan";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    #[error("invalid table")]
    UnknownTable(String),

    #[error("invalid attr for table")]
    InvalidAttr(String),

    #[error("non-optional value not present")]
    NonOptionalMissing(String),

    #[error("type of value not valid")]
    InvalidType(String),

    #[error("only one condition is allowed for update query")]
    MultipleConditions,

    #[error("condition value not present")]
    MissingCondition,

    #[error("no values supplied")]
    Empty,

    #[error("invalid select params: {0}")]
    InvalidSelectParams(String),
}

impl QueryError {
    /// Column or table the error refers to, if any.
    pub fn subject(&self) -> Option<&str> {
        match self {
            QueryError::UnknownTable(name)
            | QueryError::InvalidAttr(name)
            | QueryError::NonOptionalMissing(name)
            | QueryError::InvalidType(name) => Some(name),
            _ => None,
        }
    }
}

/// Select conditions. Equality groups are ORed within a column and ANDed
/// across columns; range conditions follow, `<` before `>`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectParams {
    pub equals: Vec<(String, Vec<Value>)>,
    pub less_than: Vec<(String, Value)>,
    pub greater_than: Vec<(String, Value)>,
}

impl SelectParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, column: impl Into<String>, values: impl IntoIterator<Item = Value>) -> Self {
        self.equals.push((column.into(), values.into_iter().collect()));
        self
    }

    pub fn eq_one(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.eq(column, [value.into()])
    }

    pub fn less_than(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.less_than.push((column.into(), value.into()));
        self
    }

    pub fn greater_than(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.greater_than.push((column.into(), value.into()));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.equals.is_empty() && self.less_than.is_empty() && self.greater_than.is_empty()
    }

    /// Read the JSON form: `{col: [v1, v2], lessThan: {col: v}, greaterThan: {col: v}}`.
    /// A scalar column value is treated as a one-element list.
    pub fn from_json(value: &Value) -> Result<Self, QueryError> {
        let obj = match value {
            Value::Null => return Ok(Self::new()),
            Value::Object(obj) => obj,
            _ => return Err(QueryError::InvalidSelectParams("expected an object".to_string())),
        };

        let mut params = Self::new();
        for (key, value) in obj {
            match key.as_str() {
                LESS_THAN | GREATER_THAN => {
                    let ranges = value.as_object().ok_or_else(|| {
                        QueryError::InvalidSelectParams(format!("{} requires an object", key))
                    })?;
                    for (column, bound) in ranges {
                        if key == LESS_THAN {
                            params.less_than.push((column.clone(), bound.clone()));
                        } else {
                            params.greater_than.push((column.clone(), bound.clone()));
                        }
                    }
                }
                _ => {
                    let values = match value {
                        Value::Array(items) => items.clone(),
                        other => vec![other.clone()],
                    };
                    params.equals.push((key.clone(), values));
                }
            }
        }
        Ok(params)
    }
}

/// Resolved pagination: `ORDER BY order_attr DESC LIMIT limit OFFSET offset`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub order_attr: String,
    pub limit: u64,
    pub offset: u64,
}

impl Page {
    /// Pages are 1-based; page 0 is read as the first page.
    pub fn from_limit(limit: &DbLimit) -> Self {
        let page = u64::from(limit.offset.max(1));
        Self {
            order_attr: limit.order_attr.clone(),
            limit: PAGE_SIZE,
            offset: (page - 1) * PAGE_SIZE,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MassTarget {
    pub column: String,
    /// (condition value, new value) pairs.
    pub cases: Vec<(Value, Value)>,
}

/// Structured description of a built statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Select {
        table: String,
        filter: SelectParams,
        page: Option<Page>,
    },
    Insert {
        table: String,
        columns: Vec<String>,
        rows: Vec<Vec<Value>>,
    },
    Update {
        table: String,
        values: Vec<(String, Value)>,
        condition: (String, Value),
    },
    MassUpdate {
        table: String,
        condition: String,
        targets: Vec<MassTarget>,
    },
}

impl Statement {
    pub fn table(&self) -> &str {
        match self {
            Statement::Select { table, .. }
            | Statement::Insert { table, .. }
            | Statement::Update { table, .. }
            | Statement::MassUpdate { table, .. } => table,
        }
    }

    pub fn is_read(&self) -> bool {
        matches!(self, Statement::Select { .. })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SqlResult {
    pub query: String,
    pub params: Vec<Value>,
    pub statement: Statement,
}

impl SqlResult {
    /// Render the statement with every placeholder replaced by its literal:
    /// strings single-quoted, everything else raw. For logs and assertions only.
    pub fn to_literal_sql(&self) -> String {
        let mut params = self.params.iter();
        let mut out = String::with_capacity(self.query.len() + self.params.len() * 8);
        for ch in self.query.chars() {
            if ch == '?' {
                match params.next() {
                    Some(value) => out.push_str(&render_param(value)),
                    None => out.push('?'),
                }
            } else {
                out.push(ch);
            }
        }
        out
    }

    /// Expand the bulk `VALUES ?` form into one placeholder tuple per row with
    /// flattened parameters. Other statements are returned unchanged.
    pub fn expand_bulk(&self) -> SqlResult {
        let Statement::Insert { columns, rows, .. } = &self.statement else {
            return self.clone();
        };
        let Some(head) = self.query.strip_suffix("VALUES ?") else {
            return self.clone();
        };

        let tuple = format!("({})", vec!["?"; columns.len()].join(", "));
        let values = vec![tuple; rows.len()].join(", ");
        SqlResult {
            query: format!("{}VALUES {}", head, values),
            params: rows.iter().flatten().cloned().collect(),
            statement: self.statement.clone(),
        }
    }
}

fn render_param(value: &Value) -> String {
    match value {
        // Bulk insert parameter: a list of row tuples.
        Value::Array(rows) if !rows.is_empty() && rows.iter().all(Value::is_array) => rows
            .iter()
            .map(literal)
            .collect::<Vec<_>>()
            .join(", "),
        other => literal(other),
    }
}

/// SQL literal form of a JSON value.
pub fn literal(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => format!("'{}'", s.replace('\'', "''")),
        Value::Array(items) => format!(
            "({})",
            items.iter().map(literal).collect::<Vec<_>>().join(", ")
        ),
        Value::Object(_) => literal(&Value::String(value.to_string())),
    }
}

fn quote_table(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

pub struct QueryBuilder<'a> {
    table: &'a str,
    schema: &'a TableSchema,
}

impl<'a> QueryBuilder<'a> {
    pub fn new(registry: &'a SchemaRegistry, table: &'a str) -> Result<Self, QueryError> {
        let schema = registry
            .table(table)
            .ok_or_else(|| QueryError::UnknownTable(table.to_string()))?;
        Ok(Self { table, schema })
    }

    pub fn for_schema(table: &'a str, schema: &'a TableSchema) -> Self {
        Self { table, schema }
    }

    fn column(&self, name: &str) -> Result<&'a ColumnDef, QueryError> {
        self.schema
            .get(name)
            .ok_or_else(|| QueryError::InvalidAttr(name.to_string()))
    }

    fn check_value(column: &ColumnDef, value: &Value) -> Result<(), QueryError> {
        let valid = if value.is_null() {
            column.optional
        } else {
            column.column_type.matches(value)
        };
        if valid {
            Ok(())
        } else {
            Err(QueryError::InvalidType(column.name.clone()))
        }
    }

    /// `SELECT * FROM <table> [WHERE ...] [ORDER BY ... DESC LIMIT 100 OFFSET n]`
    pub fn select(&self, filter: &SelectParams, limit: Option<&DbLimit>) -> Result<SqlResult, QueryError> {
        let mut clauses: Vec<String> = Vec::new();
        let mut params: Vec<Value> = Vec::new();

        for (column, values) in &filter.equals {
            self.column(column)?;
            match values.as_slice() {
                [] => clauses.push("1=0".to_string()),
                [single] => {
                    clauses.push(format!("{} = ?", column));
                    params.push(single.clone());
                }
                many => {
                    let parts: Vec<String> = many.iter().map(|_| format!("{} = ?", column)).collect();
                    params.extend(many.iter().cloned());
                    clauses.push(format!("({})", parts.join(" OR ")));
                }
            }
        }
        for (column, bound) in &filter.less_than {
            self.column(column)?;
            clauses.push(format!("{} < ?", column));
            params.push(bound.clone());
        }
        for (column, bound) in &filter.greater_than {
            self.column(column)?;
            clauses.push(format!("{} > ?", column));
            params.push(bound.clone());
        }

        let mut query = format!("SELECT * FROM {}", quote_table(self.table));
        if !clauses.is_empty() {
            query.push_str(" WHERE ");
            query.push_str(&clauses.join(" AND "));
        }

        let page = match limit {
            Some(limit) => {
                self.column(&limit.order_attr)?;
                let page = Page::from_limit(limit);
                query.push_str(&format!(
                    " ORDER BY {} DESC LIMIT {} OFFSET {}",
                    page.order_attr, page.limit, page.offset
                ));
                Some(page)
            }
            None => None,
        };

        Ok(SqlResult {
            query,
            params,
            statement: Statement::Select {
                table: self.table.to_string(),
                filter: filter.clone(),
                page,
            },
        })
    }

    /// Bulk insert. Every row is validated before anything is built; the first
    /// violation rejects the whole batch.
    pub fn insert(&self, rows: &[Row]) -> Result<SqlResult, QueryError> {
        if rows.is_empty() {
            return Err(QueryError::Empty);
        }

        let columns = self.schema.columns();
        let mut tuples: Vec<Vec<Value>> = Vec::with_capacity(rows.len());

        for row in rows {
            if let Some(unknown) = row.keys().find(|key| !self.schema.contains(key)) {
                return Err(QueryError::InvalidAttr(unknown.clone()));
            }

            let mut tuple = Vec::with_capacity(columns.len());
            for column in columns {
                match row.get(&column.name) {
                    None | Some(Value::Null) => {
                        if !column.optional {
                            return Err(QueryError::NonOptionalMissing(column.name.clone()));
                        }
                        tuple.push(Value::Null);
                    }
                    Some(value) => {
                        Self::check_value(column, value)?;
                        tuple.push(value.clone());
                    }
                }
            }
            tuples.push(tuple);
        }

        let names: Vec<String> = columns.iter().map(|c| c.name.clone()).collect();
        let query = format!(
            "INSERT INTO {} ({}) VALUES ?",
            quote_table(self.table),
            names.join(", ")
        );
        let bulk = Value::Array(tuples.iter().cloned().map(Value::Array).collect());

        Ok(SqlResult {
            query,
            params: vec![bulk],
            statement: Statement::Insert {
                table: self.table.to_string(),
                columns: names,
                rows: tuples,
            },
        })
    }

    /// `UPDATE <table> SET a = ?, ... WHERE c = ?` with exactly one condition.
    pub fn update(&self, values: &Row, conditions: &Row) -> Result<SqlResult, QueryError> {
        for key in values.keys().chain(conditions.keys()) {
            self.column(key)?;
        }
        for (key, value) in values.iter().chain(conditions.iter()) {
            Self::check_value(self.column(key)?, value)?;
        }
        if conditions.len() > 1 {
            return Err(QueryError::MultipleConditions);
        }
        let Some((condition_attr, condition_value)) = conditions.iter().next() else {
            return Err(QueryError::MissingCondition);
        };
        if values.is_empty() {
            return Err(QueryError::Empty);
        }

        let assignments: Vec<String> = values.keys().map(|key| format!("{} = ?", key)).collect();
        let mut params: Vec<Value> = values.values().cloned().collect();
        params.push(condition_value.clone());

        let query = format!(
            "UPDATE {} SET {} WHERE {} = ?",
            quote_table(self.table),
            assignments.join(", "),
            condition_attr
        );

        Ok(SqlResult {
            query,
            params,
            statement: Statement::Update {
                table: self.table.to_string(),
                values: values.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
                condition: (condition_attr.clone(), condition_value.clone()),
            },
        })
    }

    /// One statement updating many rows keyed by `condition_attr`:
    /// `UPDATE t SET col = CASE WHEN cond = ? THEN ? ... ELSE col END WHERE cond IN (?, ...)`.
    /// Every non-condition column present in any row becomes a CASE target.
    pub fn mass_update(&self, rows: &[Row], condition_attr: &str) -> Result<SqlResult, QueryError> {
        if rows.is_empty() {
            return Err(QueryError::Empty);
        }
        self.column(condition_attr)?;

        let mut keys: Vec<Value> = Vec::new();
        for row in rows {
            for (key, value) in row {
                Self::check_value(self.column(key)?, value)?;
            }
            match row.get(condition_attr) {
                None | Some(Value::Null) => return Err(QueryError::MissingCondition),
                Some(key) => {
                    if !keys.contains(key) {
                        keys.push(key.clone());
                    }
                }
            }
        }

        let mut targets: Vec<MassTarget> = Vec::new();
        for column in self.schema.columns() {
            if column.name == condition_attr {
                continue;
            }
            let cases: Vec<(Value, Value)> = rows
                .iter()
                .filter_map(|row| {
                    let value = row.get(&column.name)?;
                    let key = row.get(condition_attr)?;
                    Some((key.clone(), value.clone()))
                })
                .collect();
            if !cases.is_empty() {
                targets.push(MassTarget { column: column.name.clone(), cases });
            }
        }
        if targets.is_empty() {
            return Err(QueryError::Empty);
        }

        let mut params: Vec<Value> = Vec::new();
        let mut assignments: Vec<String> = Vec::with_capacity(targets.len());
        for target in &targets {
            let mut case = format!("{} = CASE", target.column);
            for (key, value) in &target.cases {
                case.push_str(&format!(" WHEN {} = ? THEN ?", condition_attr));
                params.push(key.clone());
                params.push(value.clone());
            }
            case.push_str(&format!(" ELSE {} END", target.column));
            assignments.push(case);
        }
        params.extend(keys.iter().cloned());

        let query = format!(
            "UPDATE {} SET {} WHERE {} IN ({})",
            quote_table(self.table),
            assignments.join(", "),
            condition_attr,
            vec!["?"; keys.len()].join(", ")
        );

        Ok(SqlResult {
            query,
            params,
            statement: Statement::MassUpdate {
                table: self.table.to_string(),
                condition: condition_attr.to_string(),
                targets,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ColumnType;
    use serde_json::json;

    fn test_table() -> TableSchema {
        TableSchema::new()
            .column("test_attr1", ColumnType::Number)
            .optional("test_attr2", ColumnType::Number)
            .optional("test_attr3", ColumnType::String)
    }

    fn strict_table() -> TableSchema {
        TableSchema::new()
            .column("test_attr1", ColumnType::Number)
            .column("test_attr2", ColumnType::Number)
            .column("test_attr3", ColumnType::String)
    }

    fn row(value: Value) -> Row {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn select_ors_values_of_one_column() {
        let schema = test_table();
        let builder = QueryBuilder::for_schema("test_table", &schema);
        let sql = builder
            .select(&SelectParams::new().eq("test_attr1", [json!(1), json!(2)]), None)
            .unwrap();

        assert_eq!(sql.query, "SELECT * FROM `test_table` WHERE (test_attr1 = ? OR test_attr1 = ?)");
        assert_eq!(sql.params, vec![json!(1), json!(2)]);
        assert_eq!(
            sql.to_literal_sql(),
            "SELECT * FROM `test_table` WHERE (test_attr1 = 1 OR test_attr1 = 2)"
        );
    }

    #[test]
    fn select_ands_columns_then_ranges() {
        let schema = test_table();
        let builder = QueryBuilder::for_schema("test_table", &schema);
        let params = SelectParams::from_json(&json!({
            "greaterThan": { "test_attr1": 10 },
            "test_attr3": ["text1", "text2"],
            "lessThan": { "test_attr1": 101 },
        }))
        .unwrap();
        let sql = builder.select(&params, None).unwrap();

        assert_eq!(
            sql.to_literal_sql(),
            "SELECT * FROM `test_table` WHERE (test_attr3 = 'text1' OR test_attr3 = 'text2') \
             AND test_attr1 < 101 AND test_attr1 > 10"
        );
    }

    #[test]
    fn select_range_only() {
        let schema = test_table();
        let builder = QueryBuilder::for_schema("test_table", &schema);
        let params = SelectParams::new().greater_than("test_attr1", 10).less_than("test_attr1", 101);
        let sql = builder.select(&params, None).unwrap();
        assert_eq!(
            sql.to_literal_sql(),
            "SELECT * FROM `test_table` WHERE test_attr1 < 101 AND test_attr1 > 10"
        );
    }

    #[test]
    fn select_without_conditions_has_no_where() {
        let schema = test_table();
        let sql = QueryBuilder::for_schema("test_table", &schema)
            .select(&SelectParams::new(), None)
            .unwrap();
        assert_eq!(sql.query, "SELECT * FROM `test_table`");
        assert!(sql.params.is_empty());
        assert!(sql.statement.is_read());
    }

    #[test]
    fn select_empty_value_list_matches_nothing() {
        let schema = test_table();
        let sql = QueryBuilder::for_schema("test_table", &schema)
            .select(&SelectParams::new().eq("test_attr1", Vec::new()), None)
            .unwrap();
        assert_eq!(sql.query, "SELECT * FROM `test_table` WHERE 1=0");
    }

    #[test]
    fn select_pages_are_one_based() {
        let schema = test_table();
        let builder = QueryBuilder::for_schema("test_table", &schema);

        let second = DbLimit { offset: 2, order_attr: "test_attr1".to_string() };
        let sql = builder.select(&SelectParams::new(), Some(&second)).unwrap();
        assert_eq!(sql.query, "SELECT * FROM `test_table` ORDER BY test_attr1 DESC LIMIT 100 OFFSET 100");

        let first = DbLimit { offset: 1, order_attr: "test_attr2".to_string() };
        let sql = builder.select(&SelectParams::new(), Some(&first)).unwrap();
        assert_eq!(sql.query, "SELECT * FROM `test_table` ORDER BY test_attr2 DESC LIMIT 100 OFFSET 0");

        let zero = DbLimit { offset: 0, order_attr: "test_attr2".to_string() };
        let sql = builder.select(&SelectParams::new(), Some(&zero)).unwrap();
        assert!(sql.query.ends_with("OFFSET 0"));
    }

    #[test]
    fn select_rejects_unknown_columns() {
        let schema = test_table();
        let builder = QueryBuilder::for_schema("test_table", &schema);
        let err = builder
            .select(&SelectParams::new().eq_one("nope", 1), None)
            .unwrap_err();
        assert_eq!(err, QueryError::InvalidAttr("nope".to_string()));

        let limit = DbLimit { offset: 1, order_attr: "nope".to_string() };
        assert!(builder.select(&SelectParams::new(), Some(&limit)).is_err());
    }

    #[test]
    fn unknown_table_is_rejected() {
        let registry = SchemaRegistry::standard();
        assert!(matches!(
            QueryBuilder::new(&registry, "missing"),
            Err(QueryError::UnknownTable(_))
        ));
    }

    #[test]
    fn insert_lays_rows_out_in_schema_order() {
        let schema = test_table();
        let builder = QueryBuilder::for_schema("test_table", &schema);
        let rows = vec![
            row(json!({ "test_attr2": 101, "test_attr1": 101 })),
            row(json!({ "test_attr1": 103 })),
            row(json!({ "test_attr1": 102, "test_attr2": 102 })),
        ];
        let sql = builder.insert(&rows).unwrap();

        assert_eq!(
            sql.query,
            "INSERT INTO `test_table` (test_attr1, test_attr2, test_attr3) VALUES ?"
        );
        assert_eq!(
            sql.params,
            vec![json!([[101, 101, null], [103, null, null], [102, 102, null]])]
        );
    }

    #[test]
    fn insert_rejects_missing_required_value() {
        let schema = test_table();
        let err = QueryBuilder::for_schema("test_table", &schema)
            .insert(&[row(json!({ "test_attr2": 101 }))])
            .unwrap_err();
        assert_eq!(err.to_string(), "non-optional value not present");
        assert_eq!(err.subject(), Some("test_attr1"));
    }

    #[test]
    fn insert_rejects_whole_batch_on_bad_type() {
        let schema = test_table();
        let err = QueryBuilder::for_schema("test_table", &schema)
            .insert(&[
                row(json!({ "test_attr2": 101, "test_attr1": 1 })),
                row(json!({ "test_attr2": 101, "test_attr1": "test" })),
            ])
            .unwrap_err();
        assert_eq!(err.to_string(), "type of value not valid");
    }

    #[test]
    fn insert_rejects_unknown_attr_and_empty_batch() {
        let schema = test_table();
        let builder = QueryBuilder::for_schema("test_table", &schema);
        assert_eq!(
            builder.insert(&[row(json!({ "test_attr1": 1, "bogus": 2 }))]).unwrap_err(),
            QueryError::InvalidAttr("bogus".to_string())
        );
        assert_eq!(builder.insert(&[]).unwrap_err(), QueryError::Empty);
    }

    #[test]
    fn expand_bulk_flattens_rows() {
        let schema = TableSchema::new()
            .column("id", ColumnType::Number)
            .column("text", ColumnType::String);
        let sql = QueryBuilder::for_schema("testData", &schema)
            .insert(&[
                row(json!({ "id": 1, "text": "a" })),
                row(json!({ "id": 2, "text": "b" })),
            ])
            .unwrap();

        assert_eq!(sql.to_literal_sql(), "INSERT INTO `testData` (id, text) VALUES (1, 'a'), (2, 'b')");

        let expanded = sql.expand_bulk();
        assert_eq!(expanded.query, "INSERT INTO `testData` (id, text) VALUES (?, ?), (?, ?)");
        assert_eq!(expanded.params, vec![json!(1), json!("a"), json!(2), json!("b")]);
    }

    #[test]
    fn update_renders_values_and_single_condition() {
        let schema = strict_table();
        let builder = QueryBuilder::for_schema("test_table", &schema);
        let sql = builder
            .update(
                &row(json!({ "test_attr3": "intest_value", "test_attr2": 101 })),
                &row(json!({ "test_attr1": 300 })),
            )
            .unwrap();
        // serde_json maps iterate in key order
        assert_eq!(
            sql.to_literal_sql(),
            "UPDATE `test_table` SET test_attr2 = 101, test_attr3 = 'intest_value' WHERE test_attr1 = 300"
        );

        let sql = builder
            .update(
                &row(json!({ "test_attr1": 300, "test_attr2": 101 })),
                &row(json!({ "test_attr3": "intest_value" })),
            )
            .unwrap();
        assert_eq!(
            sql.to_literal_sql(),
            "UPDATE `test_table` SET test_attr1 = 300, test_attr2 = 101 WHERE test_attr3 = 'intest_value'"
        );
    }

    #[test]
    fn update_rejections() {
        let schema = strict_table();
        let builder = QueryBuilder::for_schema("test_table", &schema);

        let bad_type = builder
            .update(
                &row(json!({ "test_attr3": 101, "test_attr2": 101 })),
                &row(json!({ "test_attr1": 300 })),
            )
            .unwrap_err();
        assert_eq!(bad_type.to_string(), "type of value not valid");

        let two_conditions = builder
            .update(
                &row(json!({ "test_attr3": "InTest string" })),
                &row(json!({ "test_attr1": 300, "test_attr2": 101 })),
            )
            .unwrap_err();
        assert_eq!(two_conditions.to_string(), "only one condition is allowed for update query");

        let invalid_attr = builder
            .update(
                &row(json!({ "test_attr3": "InTest string", "invalid_attr": "101" })),
                &row(json!({ "test_attr1": 300 })),
            )
            .unwrap_err();
        assert_eq!(invalid_attr.to_string(), "invalid attr for table");

        let no_condition = builder
            .update(&row(json!({ "test_attr3": "x" })), &Row::new())
            .unwrap_err();
        assert_eq!(no_condition, QueryError::MissingCondition);
    }

    #[test]
    fn mass_update_is_one_case_statement() {
        let schema = strict_table();
        let sql = QueryBuilder::for_schema("test_table", &schema)
            .mass_update(
                &[
                    row(json!({ "test_attr1": 101, "test_attr3": "InTest 1 String Mass Update" })),
                    row(json!({ "test_attr1": 201, "test_attr3": "InTest 2 String Mass Update" })),
                ],
                "test_attr1",
            )
            .unwrap();

        assert_eq!(
            sql.to_literal_sql(),
            "UPDATE `test_table` SET test_attr3 = CASE WHEN test_attr1 = 101 THEN 'InTest 1 String Mass Update' \
             WHEN test_attr1 = 201 THEN 'InTest 2 String Mass Update' ELSE test_attr3 END \
             WHERE test_attr1 IN (101, 201)"
        );
        assert_eq!(sql.query.matches("UPDATE").count(), 1);
    }

    #[test]
    fn mass_update_rejects_rows_without_condition() {
        let schema = strict_table();
        let err = QueryBuilder::for_schema("test_table", &schema)
            .mass_update(
                &[
                    row(json!({ "test_attr1": 101, "test_attr3": "a" })),
                    row(json!({ "test_attr3": "b" })),
                ],
                "test_attr1",
            )
            .unwrap_err();
        assert_eq!(err, QueryError::MissingCondition);
    }

    #[test]
    fn literal_escapes_quotes() {
        assert_eq!(literal(&json!("it's")), "'it''s'");
        assert_eq!(literal(&Value::Null), "NULL");
        assert_eq!(literal(&json!(true)), "true");
    }
}
