//! Role to action permission graph.
//!
//! Loaded from the role, action and role_action tables on every check, so a
//! revoked edge takes effect on the next request. Permission is edge-based
//! only: no role is implicitly granted anything.

use std::collections::{HashMap, HashSet};

use serde_json::Value;

use crate::baton::{Baton, StageResult};
use crate::database::{Database, Row};
use crate::validation::parse_integer;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PermissionGraph {
    roles: HashMap<i64, String>,
    actions: HashMap<String, i64>,
    edges: HashSet<(i64, i64)>,
}

fn int_field(row: &Row, key: &str) -> Option<i64> {
    row.get(key).and_then(parse_integer)
}

fn str_field<'a>(row: &'a Row, key: &str) -> Option<&'a str> {
    row.get(key).and_then(Value::as_str)
}

impl PermissionGraph {
    pub async fn load(db: &Database, baton: &mut Baton) -> StageResult<Self> {
        let roles = db.get_all_role_data(baton).await?;
        let actions = db.get_all_action_data(baton).await?;
        let edges = db.get_all_role_action_data(baton).await?;
        Ok(Self::from_rows(&roles, &actions, &edges))
    }

    /// Rows missing an id or name are skipped.
    pub fn from_rows(roles: &[Row], actions: &[Row], edges: &[Row]) -> Self {
        Self {
            roles: roles
                .iter()
                .filter_map(|r| Some((int_field(r, "role_id")?, str_field(r, "role_name")?.to_string())))
                .collect(),
            actions: actions
                .iter()
                .filter_map(|r| Some((str_field(r, "action_name")?.to_string(), int_field(r, "action_id")?)))
                .collect(),
            edges: edges
                .iter()
                .filter_map(|r| Some((int_field(r, "role_id")?, int_field(r, "action_id")?)))
                .collect(),
        }
    }

    pub fn role_name(&self, role_id: i64) -> Option<&str> {
        self.roles.get(&role_id).map(String::as_str)
    }

    pub fn action_id(&self, action_name: &str) -> Option<i64> {
        self.actions.get(action_name).copied()
    }

    pub fn is_permitted(&self, role_id: Option<i64>, action_name: &str) -> bool {
        match (role_id, self.action_id(action_name)) {
            (Some(role), Some(action)) => self.edges.contains(&(role, action)),
            _ => false,
        }
    }

    /// Names of every action the role has an edge to, sorted.
    pub fn permitted_actions(&self, role_id: i64) -> Vec<String> {
        let mut names: Vec<String> = self
            .actions
            .iter()
            .filter(|(_, id)| self.edges.contains(&(role_id, **id)))
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }
}
