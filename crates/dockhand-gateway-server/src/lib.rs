use axum::{
    routing::{get, put},
    Router,
};
use dockhand_orchestrator::Orchestrator;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

pub mod config;
pub mod error;
mod handlers;
pub mod types;


pub use config::{LogFormat, ServerConfig};
pub use error::{ApiError, ErrorBody};

/// Header carrying the per-request id, generated when the client sends none.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    /// Cancelled on server shutdown; in-flight stats reads hang off a child token.
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        Self {
            orchestrator,
            shutdown: CancellationToken::new(),
        }
    }
}

pub fn create_app(state: AppState) -> Router {
    Router::new()
        // Lifecycle operations
        .route("/docker/recreate/:name", get(handlers::recreate))
        .route("/docker/restart/:name", get(handlers::restart))
        .route("/docker/edit/:name", put(handlers::edit))
        // Monitoring
        .route("/docker/stats/:name", get(handlers::stats))
        // Empty container name
        .route("/docker/recreate/", get(handlers::missing_name))
        .route("/docker/restart/", get(handlers::missing_name))
        .route("/docker/edit/", put(handlers::missing_name))
        .route("/docker/stats/", get(handlers::missing_name))
        .route("/health", get(handlers::health))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .with_state(state)
}
