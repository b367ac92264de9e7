use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::{json, Value};

/// A terminal write captured by the sink.
#[derive(Debug, Clone, PartialEq)]
pub struct Written {
    pub status: StatusCode,
    pub body: Value,
}

impl IntoResponse for Written {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

/// Write-once response capability owned by a request's baton.
///
/// The first write wins. Any later write is a contract violation: it is
/// logged and dropped so a request can never produce two responses.
#[derive(Debug, Default)]
pub struct ResponseSink {
    written: Option<Written>,
}

impl ResponseSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the terminal response. Returns false if one was already written.
    pub fn write(&mut self, status: StatusCode, body: Value) -> bool {
        if let Some(existing) = &self.written {
            tracing::warn!(
                "Ignoring second response write (status {}), already answered with {}",
                status,
                existing.status
            );
            return false;
        }
        self.written = Some(Written { status, body });
        true
    }

    pub fn is_written(&self) -> bool {
        self.written.is_some()
    }

    pub fn written(&self) -> Option<&Written> {
        self.written.as_ref()
    }

    pub fn into_response(self) -> Response {
        match self.written {
            Some(written) => written.into_response(),
            None => {
                tracing::error!("Request finished without a response being written");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error_message": "No response produced" })),
                )
                    .into_response()
            }
        }
    }
}
