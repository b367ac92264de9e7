use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};

use super::pipeline::AuthEndpoint;
use super::{SharedState, ACTION_ENDPOINTS};
use crate::baton::RequestType;

pub async fn root() -> Json<Value> {
    let version = env!("CARGO_PKG_VERSION");
    let actions: Vec<String> = ACTION_ENDPOINTS
        .iter()
        .map(|e| {
            let method = match e.request_type {
                RequestType::Get => "GET",
                RequestType::Post => "POST",
            };
            format!("{} {} (auth + validation)", method, e.path)
        })
        .collect();
    let auth: Vec<String> = AuthEndpoint::ALL
        .iter()
        .map(|e| format!("GET /{}", e.name()))
        .collect();

    Json(json!({
        "success": true,
        "data": {
            "name": "Baton API",
            "version": version,
            "endpoints": {
                "home": "/ (public)",
                "health": "/health (public)",
                "actions": actions,
                "auth": auth,
            },
        }
    }))
}

pub async fn health(State(state): State<SharedState>) -> impl IntoResponse {
    let now = chrono::Utc::now();

    match state.db.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "data": {
                    "status": "ok",
                    "timestamp": now,
                    "database": state.db.executor_name(),
                }
            })),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "success": false,
                "error": "database unavailable",
                "data": {
                    "status": "degraded",
                    "timestamp": now,
                    "database_error": e.to_string(),
                }
            })),
        ),
    }
}
