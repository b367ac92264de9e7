//! Request pipeline: baton creation, auth, validation and the action, each
//! stage stopping the request at its first failure.

use std::collections::HashMap;

use axum::body::Bytes;
use axum::extract::Query;
use axum::http::{HeaderMap, Uri};
use axum::response::Response;
use serde_json::{Map, Value};
use tokio::time::{error::Elapsed, timeout};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::actions::ActionHandler;
use crate::baton::{Baton, ErrorRecord, Halt, RequestType, StageResult};
use crate::error::ApiError;
use crate::state::AppState;

/// Header that asks for the auth bypass on deployments allowing it.
pub const TEST_MODE_HEADER: &str = "test_mode";

/// Auth-only endpoints; these validate their own credentials.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthEndpoint {
    CreateUser,
    Login,
    Permission,
    Validate,
}

impl AuthEndpoint {
    pub const ALL: [AuthEndpoint; 4] = [
        AuthEndpoint::CreateUser,
        AuthEndpoint::Login,
        AuthEndpoint::Permission,
        AuthEndpoint::Validate,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            AuthEndpoint::CreateUser => "createUser",
            AuthEndpoint::Login => "login",
            AuthEndpoint::Permission => "permission",
            AuthEndpoint::Validate => "validate",
        }
    }
}

fn new_baton(action: &str, params: Value, request_type: RequestType) -> Baton {
    Baton::create(Uuid::new_v4().to_string(), action, params).with_request_type(request_type)
}

fn is_test_mode(headers: &HeaderMap) -> bool {
    headers
        .get(TEST_MODE_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

/// Raw request input, or why it could not be read.
pub type RawParams = Result<Map<String, Value>, String>;

/// Query parameters as raw string values. A query string that does not
/// decode is reported on the baton instead of by the extractor.
pub fn query_params(uri: &Uri) -> RawParams {
    Query::<HashMap<String, String>>::try_from_uri(uri)
        .map(|Query(query)| query.into_iter().map(|(k, v)| (k, Value::String(v))).collect())
        .map_err(|rejection| rejection.body_text())
}

fn unreadable_input(baton: &mut Baton, detail: String) -> Halt {
    let action = baton.action.clone();
    baton.fail(
        ErrorRecord::new(ApiError::ParameterValidation)
            .action(action)
            .detail(detail),
    )
}

/// JSON object body; anything else reads as no parameters.
pub fn body_params(body: &Bytes) -> Map<String, Value> {
    if body.is_empty() {
        return Map::new();
    }
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(map)) => map,
        Ok(_) => Map::new(),
        Err(err) => {
            debug!("Ignoring unparsable request body: {}", err);
            Map::new()
        }
    }
}

/// Map a stage deadline expiry onto the baton.
fn deadline<T>(baton: &mut Baton, stage: &str, outcome: Result<StageResult<T>, Elapsed>) -> StageResult<T> {
    match outcome {
        Ok(result) => result,
        Err(_) => {
            warn!("[{}] {} stage timed out", baton.id, stage);
            let action = baton.action.clone();
            Err(baton.fail(
                ErrorRecord::new(ApiError::Timeout)
                    .action(action)
                    .detail(format!("{} stage exceeded deadline", stage)),
            ))
        }
    }
}

/// Auth, then validation, then the action.
pub async fn run_action(
    state: &AppState,
    handler: &dyn ActionHandler,
    request_type: RequestType,
    headers: HeaderMap,
    raw: RawParams,
) -> Response {
    let params = raw.as_ref().map(|raw| Value::Object(raw.clone())).unwrap_or(Value::Null);
    let mut baton = new_baton(handler.name(), params, request_type);
    let outcome = match raw {
        Ok(raw) => drive_action(state, handler, &mut baton, &headers, &raw).await,
        Err(detail) => Err(unreadable_input(&mut baton, detail)),
    };
    if outcome.is_err() {
        debug!("[{}] halted after {:?}", baton.id, baton.methods);
    }
    finish(state, baton)
}

async fn drive_action(
    state: &AppState,
    handler: &dyn ActionHandler,
    baton: &mut Baton,
    headers: &HeaderMap,
    raw: &Map<String, Value>,
) -> StageResult<()> {
    let limit = state.stage_timeout();

    let authorized = timeout(limit, state.auth.authorize(baton, headers, is_test_mode(headers))).await;
    deadline(baton, "auth", authorized)?;

    let params = state.validator.validate_request(baton, raw, handler.name())?;

    let ran = timeout(limit, handler.run(&state.db, baton, &params)).await;
    deadline(baton, "action", ran)
}

/// Credentials come from headers, falling back to the query string.
pub fn credential_params(
    state: &AppState,
    endpoint: AuthEndpoint,
    headers: &HeaderMap,
    mut query: Map<String, Value>,
) -> Map<String, Value> {
    if let Some(spec) = state.validator.spec().get_action(endpoint.name()) {
        for (attr, _) in spec.attrs() {
            if let Some(value) = headers.get(attr).and_then(|v| v.to_str().ok()) {
                query.insert(attr.to_string(), Value::String(value.to_string()));
            }
        }
    }
    query
}

/// Validation, then the auth operation.
pub async fn run_auth(
    state: &AppState,
    endpoint: AuthEndpoint,
    headers: HeaderMap,
    query: RawParams,
) -> Response {
    // Credentials stay out of the baton
    let mut baton = new_baton(endpoint.name(), Value::Null, RequestType::Get);
    let outcome = match query {
        Ok(query) => {
            let raw = credential_params(state, endpoint, &headers, query);
            drive_auth(state, endpoint, &mut baton, &headers, &raw).await
        }
        Err(detail) => Err(unreadable_input(&mut baton, detail)),
    };
    if outcome.is_err() {
        debug!("[{}] halted after {:?}", baton.id, baton.methods);
    }
    finish(state, baton)
}

async fn drive_auth(
    state: &AppState,
    endpoint: AuthEndpoint,
    baton: &mut Baton,
    headers: &HeaderMap,
    raw: &Map<String, Value>,
) -> StageResult<()> {
    let params = state.validator.validate_request(baton, raw, endpoint.name())?;

    let auth = &state.auth;
    let outcome = timeout(state.stage_timeout(), async {
        match endpoint {
            AuthEndpoint::CreateUser => auth.create_user(baton, &params).await,
            AuthEndpoint::Login => auth.login(baton, &params).await,
            AuthEndpoint::Permission => auth.permission(baton, headers, &params).await,
            AuthEndpoint::Validate => auth.validate(baton, headers, &params).await,
        }
    })
    .await;
    deadline(baton, endpoint.name(), outcome)
}

fn finish(state: &AppState, baton: Baton) -> Response {
    if !baton.is_answered() {
        warn!("[{}] {} finished without a response", baton.id, baton.action);
    }
    if state.config.api.enable_request_logging {
        info!(
            "[{}] {} -> {} in {}ms",
            baton.id,
            baton.action,
            baton.response().map(|w| w.status.as_u16()).unwrap_or(500),
            baton.elapsed().as_millis()
        );
    }
    baton.into_response()
}
