//! HTTP surface.
//!
//! Action endpoints run auth, validation and the action; auth endpoints
//! validate their credentials and call the auth service directly.

pub mod pipeline;
mod system;

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, Uri},
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::actions::ActionError;
use crate::baton::RequestType;
use crate::state::AppState;
use pipeline::AuthEndpoint;

type SharedState = Arc<AppState>;

/// An action reachable over HTTP.
#[derive(Debug, Clone, Copy)]
pub struct ActionEndpoint {
    pub path: &'static str,
    pub action: &'static str,
    pub request_type: RequestType,
}

pub const ACTION_ENDPOINTS: [ActionEndpoint; 2] = [
    ActionEndpoint {
        path: "/testGetCall",
        action: "testGetCall",
        request_type: RequestType::Get,
    },
    ActionEndpoint {
        path: "/testPostCall",
        action: "testPostCall",
        request_type: RequestType::Post,
    },
];

/// Build the router. Every action endpoint is resolved here; an unknown
/// action name is a startup error.
pub fn app(state: SharedState) -> Result<Router, ActionError> {
    Ok(Router::new()
        // Public
        .route("/", get(system::root))
        .route("/health", get(system::health))
        // Auth-only endpoints
        .merge(auth_routes())
        // Actions
        .merge(action_routes(&state)?)
        // Global middleware
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state))
}

fn action_routes(state: &AppState) -> Result<Router<SharedState>, ActionError> {
    let mut router = Router::new();

    for endpoint in ACTION_ENDPOINTS {
        let handler = state.actions.resolve(endpoint.action)?;
        router = match endpoint.request_type {
            RequestType::Get => router.route(
                endpoint.path,
                get(
                    move |State(state): State<SharedState>, headers: HeaderMap, uri: Uri| {
                        let handler = handler.clone();
                        async move {
                            let raw = pipeline::query_params(&uri);
                            pipeline::run_action(&state, handler.as_ref(), RequestType::Get, headers, raw)
                                .await
                        }
                    },
                ),
            ),
            RequestType::Post => router.route(
                endpoint.path,
                post(
                    move |State(state): State<SharedState>, headers: HeaderMap, body: Bytes| {
                        let handler = handler.clone();
                        async move {
                            let raw = Ok(pipeline::body_params(&body));
                            pipeline::run_action(&state, handler.as_ref(), RequestType::Post, headers, raw)
                                .await
                        }
                    },
                ),
            ),
        };
    }

    Ok(router)
}

fn auth_routes() -> Router<SharedState> {
    let mut router = Router::new();

    for endpoint in AuthEndpoint::ALL {
        router = router.route(
            &format!("/{}", endpoint.name()),
            get(
                move |State(state): State<SharedState>, headers: HeaderMap, uri: Uri| async move {
                    pipeline::run_auth(&state, endpoint, headers, pipeline::query_params(&uri)).await
                },
            ),
        );
    }

    router
}
