//! Declarative per-table column definitions used to validate every query.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Table names of the standard registry.
pub mod tables {
    pub const TEST_DATA: &str = "testData";
    pub const USER: &str = "user";
    pub const ROLE: &str = "role";
    pub const ACTION: &str = "action";
    pub const ROLE_ACTION: &str = "role_action";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    String,
    Number,
    Boolean,
}

impl ColumnType {
    /// Runtime type check of a JSON value against the declared column type.
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            ColumnType::String => value.is_string(),
            ColumnType::Number => value.is_number(),
            ColumnType::Boolean => value.is_boolean(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: String,
    pub column_type: ColumnType,
    pub optional: bool,
}

/// Ordered column list; insert rows are laid out in this order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableSchema {
    columns: Vec<ColumnDef>,
}

impl TableSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn column(self, name: impl Into<String>, column_type: ColumnType) -> Self {
        self.push(name.into(), column_type, false)
    }

    pub fn optional(self, name: impl Into<String>, column_type: ColumnType) -> Self {
        self.push(name.into(), column_type, true)
    }

    fn push(mut self, name: String, column_type: ColumnType, optional: bool) -> Self {
        self.columns.retain(|c| c.name != name);
        self.columns.push(ColumnDef { name, column_type, optional });
        self
    }

    pub fn get(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn columns(&self) -> &[ColumnDef] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }
}

#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    tables: HashMap<String, TableSchema>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(mut self, name: impl Into<String>, schema: TableSchema) -> Self {
        self.tables.insert(name.into(), schema);
        self
    }

    pub fn table(&self, name: &str) -> Option<&TableSchema> {
        self.tables.get(name)
    }

    /// Tables used by the auth engine and the demo actions.
    pub fn standard() -> Self {
        use ColumnType::*;

        Self::new()
            .with_table(
                tables::TEST_DATA,
                TableSchema::new().column("id", Number).column("text", String),
            )
            .with_table(
                tables::USER,
                TableSchema::new()
                    .column("user_id", Number)
                    .column("username", String)
                    .column("email", String)
                    .column("password", String)
                    .optional("role", Number),
            )
            .with_table(
                tables::ROLE,
                TableSchema::new().column("role_id", Number).column("role_name", String),
            )
            .with_table(
                tables::ACTION,
                TableSchema::new().column("action_id", Number).column("action_name", String),
            )
            .with_table(
                tables::ROLE_ACTION,
                TableSchema::new().column("role_id", Number).column("action_id", Number),
            )
    }
}
