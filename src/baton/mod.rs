//! Per-request context ("baton") threaded through auth, validation, actions
//! and storage.
//!
//! The baton owns the request's only response sink. Stages report failure by
//! recording an [`ErrorRecord`] and writing the error response through
//! [`Baton::fail`], which hands back a [`Halt`]. Every stage returns
//! [`StageResult`], so `?` stops the pipeline at the first failure.

pub mod sink;

use std::collections::HashMap;
use std::time::{Duration, Instant};

use axum::http::StatusCode;
use axum::response::Response;
use serde::{Serialize, Serializer};
use serde_json::{json, Value};

use crate::error::ApiError;
pub use sink::{ResponseSink, Written};

/// Proof that a failure was recorded on the baton and answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub struct Halt;

pub type StageResult<T> = Result<T, Halt>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RequestType {
    Get,
    Post,
}

impl RequestType {
    pub fn success_status(&self) -> StatusCode {
        match self {
            RequestType::Get => StatusCode::OK,
            RequestType::Post => StatusCode::CREATED,
        }
    }
}

/// Per-table pagination directive. `offset` is a 1-based page number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DbLimit {
    pub offset: u32,
    pub order_attr: String,
}

/// Structured error accumulated on the baton.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorRecord {
    #[serde(rename = "code", serialize_with = "serialize_code")]
    pub kind: ApiError,
    pub public_message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attr: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub_attr: Option<String>,
    /// Logged only, never sent to the caller.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub internal: Option<String>,
}

fn serialize_code<S: Serializer>(kind: &ApiError, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(kind.error_code())
}

impl ErrorRecord {
    pub fn new(kind: ApiError) -> Self {
        Self {
            public_message: kind.public_message(),
            kind,
            error_detail: None,
            action: None,
            attr: None,
            sub_attr: None,
            internal: None,
        }
    }

    pub fn detail(mut self, detail: impl Into<String>) -> Self {
        self.error_detail = Some(detail.into());
        self
    }

    pub fn action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    pub fn attr(mut self, attr: impl Into<String>) -> Self {
        self.attr = Some(attr.into());
        self
    }

    pub fn sub_attr(mut self, sub_attr: Option<String>) -> Self {
        self.sub_attr = sub_attr;
        self
    }

    pub fn internal(mut self, internal: impl Into<String>) -> Self {
        self.internal = Some(internal.into());
        self
    }
}

#[derive(Debug)]
pub struct Baton {
    pub id: String,
    pub action: String,
    pub methods: Vec<String>,
    pub err: Vec<ErrorRecord>,
    pub user_id: Option<i64>,
    pub user_role: Option<i64>,
    pub request_type: RequestType,
    pub db_limit: HashMap<String, DbLimit>,
    pub params: Value,
    pub start_time: Instant,
    sink: ResponseSink,
}

impl Baton {
    /// Fresh context: no errors, no identity, GET semantics.
    pub fn create(id: impl Into<String>, action: impl Into<String>, params: Value) -> Self {
        Self {
            id: id.into(),
            action: action.into(),
            methods: Vec::new(),
            err: Vec::new(),
            user_id: None,
            user_role: None,
            request_type: RequestType::Get,
            db_limit: HashMap::new(),
            params,
            start_time: Instant::now(),
            sink: ResponseSink::new(),
        }
    }

    pub fn with_request_type(mut self, request_type: RequestType) -> Self {
        self.request_type = request_type;
        self
    }

    /// Diagnostic trail only.
    pub fn add_method(&mut self, method: impl Into<String>) {
        self.methods.push(method.into());
    }

    /// Append an error without answering the request.
    pub fn set_error(&mut self, record: ErrorRecord) {
        self.err.push(record);
    }

    pub fn has_errors(&self) -> bool {
        !self.err.is_empty()
    }

    /// Write the success payload: 200 for GET, 201 for POST.
    pub fn json(&mut self, payload: Value) {
        let status = self.request_type.success_status();
        self.sink.write(status, payload);
    }

    /// Write an error payload, 500 unless overridden.
    pub fn send_error(&mut self, payload: Value, code: Option<StatusCode>) {
        self.sink
            .write(code.unwrap_or(StatusCode::INTERNAL_SERVER_ERROR), payload);
    }

    /// Answer with `{id, error_message}` built from every accumulated public message.
    pub fn generate_error(&mut self, code: Option<StatusCode>) -> Halt {
        tracing::error!("{}", self.printable());
        let error_message = self
            .err
            .iter()
            .map(|e| e.public_message.as_str())
            .collect::<Vec<_>>()
            .join(".");
        let payload = json!({
            "id": self.id,
            "error_message": error_message,
        });
        self.send_error(payload, code);
        Halt
    }

    /// Record the error and answer with its status.
    pub fn fail(&mut self, record: ErrorRecord) -> Halt {
        let status = record.kind.status_code();
        self.set_error(record);
        self.generate_error(Some(status))
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// JSON form for logs, including internal error detail.
    pub fn printable(&self) -> Value {
        json!({
            "id": self.id,
            "action": self.action,
            "request_type": self.request_type,
            "methods": self.methods,
            "err": self.err,
            "user_id": self.user_id,
            "user_role": self.user_role,
            "elapsed_ms": self.elapsed().as_millis() as u64,
        })
    }

    pub fn response(&self) -> Option<&Written> {
        self.sink.written()
    }

    pub fn is_answered(&self) -> bool {
        self.sink.is_written()
    }

    pub fn into_response(self) -> Response {
        self.sink.into_response()
    }
}
