//! HTTP API server for the group-join orchestrator.
//!
//! Exposes the join saga and passthrough group/broadcast endpoints, with
//! structured logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use metrics_exporter_prometheus::PrometheusHandle;
use saga::{
    BroadcastClient, ClientError, GroupingClient, HttpBroadcastClient, HttpGroupingClient,
    JoinCoordinator,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use config::Config;

/// Shared application state accessible from all handlers.
pub struct AppState<G, B>
where
    G: GroupingClient,
    B: BroadcastClient,
{
    pub coordinator: JoinCoordinator<G, B>,
}

impl<G, B> AppState<G, B>
where
    G: GroupingClient,
    B: BroadcastClient,
{
    pub fn new(coordinator: JoinCoordinator<G, B>) -> Self {
        Self { coordinator }
    }
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<G, B>(state: Arc<AppState<G, B>>, metrics_handle: PrometheusHandle) -> Router
where
    G: GroupingClient + 'static,
    B: BroadcastClient + 'static,
{
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/join", post(routes::join::join::<G, B>))
        .route("/groups", post(routes::groups::create::<G, B>))
        .route(
            "/groups/{id}/broadcast",
            post(routes::groups::broadcast::<G, B>),
        )
        .route("/broadcasts", get(routes::groups::list_broadcasts::<G, B>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates application state backed by the HTTP collaborators in `config`.
pub fn create_http_state(
    config: &Config,
) -> Result<Arc<AppState<HttpGroupingClient, HttpBroadcastClient>>, ClientError> {
    let grouping = HttpGroupingClient::new(&config.grouping_url, config.upstream_timeout)?;
    let broadcasts = HttpBroadcastClient::new(&config.broadcast_url, config.upstream_timeout)?;
    let coordinator = JoinCoordinator::with_settings(grouping, broadcasts, config.join_settings());
    Ok(Arc::new(AppState::new(coordinator)))
}
