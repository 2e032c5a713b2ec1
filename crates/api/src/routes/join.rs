//! Join endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use saga::{BroadcastClient, GroupingClient, JoinOutcome, JoinRequest};
use serde::Serialize;
use serde_json::Value;

use crate::AppState;
use crate::error::ApiError;

#[derive(Debug, Serialize)]
pub struct JoinResponse {
    pub outcome: &'static str,
    pub detail: Value,
}

impl From<JoinOutcome> for JoinResponse {
    fn from(outcome: JoinOutcome) -> Self {
        let kind = outcome.kind();
        let detail = match serde_json::to_value(&outcome) {
            Ok(Value::Object(mut fields)) => {
                fields.remove("outcome");
                Value::Object(fields)
            }
            _ => Value::Null,
        };
        Self {
            outcome: kind,
            detail,
        }
    }
}

/// POST /join: merge a joining group into a host group's broadcast.
///
/// Merged and partial outcomes answer 200; a rejection answers 409.
#[tracing::instrument(skip(state, req), fields(joining = %req.joining_group_id, host = %req.host_group_id))]
pub async fn join<G, B>(
    State(state): State<Arc<AppState<G, B>>>,
    Json(req): Json<JoinRequest>,
) -> Result<(StatusCode, Json<JoinResponse>), ApiError>
where
    G: GroupingClient + 'static,
    B: BroadcastClient + 'static,
{
    let outcome = state.coordinator.join(req).await?;
    let status = match outcome {
        JoinOutcome::Rejected { .. } => StatusCode::CONFLICT,
        JoinOutcome::PartiallyFilled { .. } | JoinOutcome::Merged { .. } => StatusCode::OK,
    };
    Ok((status, Json(outcome.into())))
}
