//! Passthrough endpoints for groups and broadcasts.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::{Broadcast, Group, GroupId, NewBroadcast, NewGroup};
use saga::{BroadcastClient, GroupingClient};

use crate::AppState;
use crate::error::ApiError;

/// POST /groups: create a group.
#[tracing::instrument(skip(state, req), fields(no_of_pax = req.no_of_pax))]
pub async fn create<G, B>(
    State(state): State<Arc<AppState<G, B>>>,
    Json(req): Json<NewGroup>,
) -> Result<(StatusCode, Json<Group>), ApiError>
where
    G: GroupingClient + 'static,
    B: BroadcastClient + 'static,
{
    if req.no_of_pax == 0 {
        return Err(ApiError::BadRequest("no_of_pax must be at least 1".into()));
    }
    let group = state.coordinator.grouping().create(&req).await?;
    tracing::info!(group_id = %group.group_id, "group created");
    Ok((StatusCode::CREATED, Json(group)))
}

/// POST /groups/{id}/broadcast: open a broadcast for an existing group.
#[tracing::instrument(skip(state, req), fields(lf_pax = req.lf_pax))]
pub async fn broadcast<G, B>(
    State(state): State<Arc<AppState<G, B>>>,
    Path(id): Path<String>,
    Json(req): Json<NewBroadcast>,
) -> Result<(StatusCode, Json<Broadcast>), ApiError>
where
    G: GroupingClient + 'static,
    B: BroadcastClient + 'static,
{
    if req.lf_pax == 0 {
        return Err(ApiError::BadRequest("lf_pax must be at least 1".into()));
    }
    let group_id = GroupId::new(id);
    if group_id.is_blank() {
        return Err(ApiError::BadRequest("group id must not be blank".into()));
    }

    // The broadcast must belong to a group that exists.
    state.coordinator.grouping().get(&group_id).await?;
    let broadcast = state.coordinator.broadcasts().create(&group_id, &req).await?;
    tracing::info!(%group_id, lf_pax = broadcast.lf_pax, "broadcast opened");
    Ok((StatusCode::CREATED, Json(broadcast)))
}

/// GET /broadcasts: list open broadcasts.
#[tracing::instrument(skip(state))]
pub async fn list_broadcasts<G, B>(
    State(state): State<Arc<AppState<G, B>>>,
) -> Result<Json<Vec<Broadcast>>, ApiError>
where
    G: GroupingClient + 'static,
    B: BroadcastClient + 'static,
{
    let broadcasts = state.coordinator.broadcasts().list().await?;
    Ok(Json(broadcasts))
}
