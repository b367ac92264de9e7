//! Seed data for running without a database: two roles, the demo actions,
//! one admin user and one test row.

use anyhow::Result;
use serde_json::{json, Value};

use super::memory::MemoryExecutor;
use super::query_builder::Row;
use crate::auth::password::hash_password_blocking;
use crate::schema::tables;

pub const DEV_USER_ID: i64 = 1000000001;
pub const DEV_USERNAME: &str = "firstUser";
pub const DEV_EMAIL: &str = "firstuser@test.com";
pub const DEV_PASSWORD: &str = "Testing";
pub const ADMIN_ROLE: i64 = 0;
pub const OTHER_ROLE: i64 = 1;

fn rows(values: impl IntoIterator<Item = Value>) -> Vec<Row> {
    values
        .into_iter()
        .filter_map(|v| match v {
            Value::Object(map) => Some(map),
            _ => None,
        })
        .collect()
}

/// Roles, actions and role-action edges: Admin may run both demo actions,
/// Other only `testGetCall`.
pub fn seed_permissions(memory: &MemoryExecutor) {
    memory.seed(
        tables::ROLE,
        rows([
            json!({ "role_id": ADMIN_ROLE, "role_name": "Admin" }),
            json!({ "role_id": OTHER_ROLE, "role_name": "Other" }),
        ]),
    );
    memory.seed(
        tables::ACTION,
        rows([
            json!({ "action_id": 101, "action_name": "testGetCall" }),
            json!({ "action_id": 102, "action_name": "testPostCall" }),
        ]),
    );
    memory.seed(
        tables::ROLE_ACTION,
        rows([
            json!({ "role_id": ADMIN_ROLE, "action_id": 101 }),
            json!({ "role_id": ADMIN_ROLE, "action_id": 102 }),
            json!({ "role_id": OTHER_ROLE, "action_id": 101 }),
        ]),
    );
}

pub fn seed_development(memory: &MemoryExecutor) -> Result<()> {
    seed_permissions(memory);

    let password = hash_password_blocking(DEV_PASSWORD)?;
    memory.seed(
        tables::USER,
        rows([json!({
            "user_id": DEV_USER_ID,
            "username": DEV_USERNAME,
            "email": DEV_EMAIL,
            "password": password,
            "role": ADMIN_ROLE,
        })]),
    );
    memory.seed(
        tables::TEST_DATA,
        rows([json!({ "id": 10001, "text": "seed row" })]),
    );
    Ok(())
}
