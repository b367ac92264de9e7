use async_trait::async_trait;
use serde_json::json;

use super::ActionHandler;
use crate::baton::{Baton, StageResult};
use crate::database::{Database, Row, SelectParams};
use crate::schema::tables;
use crate::validation::ValidatedParams;

/// Digits in generated `testData` ids.
pub const TEST_DATA_ID_LENGTH: u32 = 5;

/// Reports whether `test_param` was sent and how many test rows exist.
pub struct TestGetCall;

#[async_trait]
impl ActionHandler for TestGetCall {
    fn name(&self) -> &'static str {
        "testGetCall"
    }

    async fn run(&self, db: &Database, baton: &mut Baton, params: &ValidatedParams) -> StageResult<()> {
        let rows = db.get_test_data(baton, &SelectParams::new()).await?;
        baton.json(json!({
            "msg": "testGetCall good",
            "param": params.contains("test_param"),
            "data_details": rows.len(),
        }));
        Ok(())
    }
}

/// Stores `text` under a fresh id.
pub struct TestPostCall;

#[async_trait]
impl ActionHandler for TestPostCall {
    fn name(&self) -> &'static str {
        "testPostCall"
    }

    async fn run(&self, db: &Database, baton: &mut Baton, params: &ValidatedParams) -> StageResult<()> {
        let ids = db
            .generate_custom_ids(baton, 1, TEST_DATA_ID_LENGTH, tables::TEST_DATA, "id")
            .await?;

        let mut row = Row::new();
        row.insert("id".to_string(), json!(ids[0]));
        row.insert("text".to_string(), json!(params.str("text").unwrap_or_default()));
        db.insert_test_data(baton, &[row]).await?;

        baton.json(json!({
            "msg": "testPostCall good",
            "id": ids,
        }));
        Ok(())
    }
}
