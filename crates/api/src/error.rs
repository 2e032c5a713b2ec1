//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use saga::{ClientError, JoinError};
use serde_json::{Value, json};

/// API-level error type that maps to HTTP responses.
///
/// Every error body has the shape `{"outcome": "error", "kind", "detail"}`.
#[derive(Debug)]
pub enum ApiError {
    /// Bad request from the client.
    BadRequest(String),
    /// A join run failed.
    Join(JoinError),
    /// A passthrough call to a collaborator failed.
    Client(ClientError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind, detail) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "validation", Value::from(msg)),
            ApiError::Join(err) => join_error_to_response(err),
            ApiError::Client(err) => client_error_to_response(err),
        };

        let body = json!({ "outcome": "error", "kind": kind, "detail": detail });
        (status, axum::Json(body)).into_response()
    }
}

fn join_error_to_response(err: JoinError) -> (StatusCode, &'static str, Value) {
    let kind = err.kind();
    let status = match &err {
        JoinError::Validation(_) => StatusCode::BAD_REQUEST,
        JoinError::NotFound { .. } => StatusCode::NOT_FOUND,
        JoinError::Unavailable { .. } | JoinError::Upstream { .. } => StatusCode::BAD_GATEWAY,
        JoinError::InvariantViolation { .. } | JoinError::PartialMerge(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };

    let detail = match &err {
        JoinError::PartialMerge(report) => json!({
            "message": err.to_string(),
            "report": report,
            "needs_reconciliation": err.needs_reconciliation(),
        }),
        JoinError::InvariantViolation { stage, field, .. } => json!({
            "message": err.to_string(),
            "stage": stage,
            "field": field,
            "needs_reconciliation": err.needs_reconciliation(),
        }),
        _ => Value::from(err.to_string()),
    };

    if status.is_server_error() {
        tracing::error!(error = %err, kind, "join failed");
    }
    (status, kind, detail)
}

fn client_error_to_response(err: ClientError) -> (StatusCode, &'static str, Value) {
    let (status, kind) = match &err {
        ClientError::NotFound { .. } => (StatusCode::NOT_FOUND, "not_found"),
        ClientError::Unavailable(_) => (StatusCode::BAD_GATEWAY, "unavailable"),
        ClientError::Rejected { status, .. } => match StatusCode::from_u16(*status) {
            Ok(code) if code.is_client_error() => (code, "upstream"),
            _ => (StatusCode::BAD_GATEWAY, "upstream"),
        },
        ClientError::Decode(_) => (StatusCode::BAD_GATEWAY, "upstream"),
        ClientError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "config"),
    };
    if status.is_server_error() {
        tracing::warn!(error = %err, "collaborator call failed");
    }
    (status, kind, Value::from(err.to_string()))
}

impl From<JoinError> for ApiError {
    fn from(err: JoinError) -> Self {
        ApiError::Join(err)
    }
}

impl From<ClientError> for ApiError {
    fn from(err: ClientError) -> Self {
        ApiError::Client(err)
    }
}
