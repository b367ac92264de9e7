#![allow(dead_code)]

use std::sync::Arc;

use anyhow::Result;
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::Value;
use tower::ServiceExt;

use baton_api::config::AppConfig;
use baton_api::database::{fixtures, MemoryExecutor};
use baton_api::handlers;
use baton_api::state::AppState;

pub struct TestApp {
    pub router: Router,
    pub memory: Arc<MemoryExecutor>,
    pub state: Arc<AppState>,
}

impl TestApp {
    /// Development profile over the seeded in-memory store.
    pub fn spawn() -> Result<Self> {
        Self::with_config(AppConfig::development())
    }

    /// Development profile with the `test_mode` header bypass switched on.
    pub fn with_test_mode() -> Result<Self> {
        let mut config = AppConfig::development();
        config.security.allow_test_mode = true;
        Self::with_config(config)
    }

    pub fn with_config(config: AppConfig) -> Result<Self> {
        let memory = Arc::new(MemoryExecutor::new());
        fixtures::seed_development(&memory)?;
        let state = Arc::new(AppState::build(config, memory.clone())?);
        let router = handlers::app(state.clone())?;
        Ok(Self { router, memory, state })
    }

    /// Signed token for an arbitrary identity.
    pub fn token(&self, user_id: i64, role: Option<i64>) -> String {
        let keys = self.state.auth.keys();
        keys.sign(&keys.claims_for(user_id, role))
            .expect("token signs")
    }

    pub fn admin_token(&self) -> String {
        self.token(fixtures::DEV_USER_ID, Some(fixtures::ADMIN_ROLE))
    }

    pub async fn get(&self, uri: &str, headers: &[(&str, &str)]) -> Result<(StatusCode, Value)> {
        let mut request = Request::builder().method("GET").uri(uri);
        for (name, value) in headers {
            request = request.header(*name, *value);
        }
        self.send(request.body(Body::empty())?).await
    }

    pub async fn post_json(&self, uri: &str, headers: &[(&str, &str)], body: &Value) -> Result<(StatusCode, Value)> {
        let mut request = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json");
        for (name, value) in headers {
            request = request.header(*name, *value);
        }
        self.send(request.body(Body::from(serde_json::to_vec(body)?))?).await
    }

    async fn send(&self, request: Request<Body>) -> Result<(StatusCode, Value)> {
        let response = self.router.clone().oneshot(request).await?;
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await?;
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)?
        };
        Ok((status, body))
    }
}
