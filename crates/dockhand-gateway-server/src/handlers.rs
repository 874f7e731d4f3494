use crate::error::ApiError;
use crate::types::{EditRequest, HealthResponse, MessageResponse, StatsResponse};
use crate::{AppState, REQUEST_ID_HEADER};
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::HeaderMap,
    Json,
};
use dockhand_common::DockhandError;
use tracing::{info, instrument};

type ApiResult<T> = Result<Json<T>, ApiError>;

fn request_id(headers: &HeaderMap) -> &str {
    headers
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-")
}

#[instrument(name = "request", skip_all, fields(operation = "recreate", request_id = %request_id(&headers), container = %name.trim()))]
pub(crate) async fn recreate(
    State(state): State<AppState>,
    Path(name): Path<String>,
    headers: HeaderMap,
) -> ApiResult<MessageResponse> {
    let outcome = state.orchestrator.recreate(&name).await?;
    info!(id = %outcome.container_id, image = %outcome.image, "Recreated");
    Ok(Json(MessageResponse::new(format!(
        "Container {} recreated successfully.",
        name.trim()
    ))))
}

#[instrument(name = "request", skip_all, fields(operation = "restart", request_id = %request_id(&headers), container = %name.trim()))]
pub(crate) async fn restart(
    State(state): State<AppState>,
    Path(name): Path<String>,
    headers: HeaderMap,
) -> ApiResult<MessageResponse> {
    state.orchestrator.restart(&name).await?;
    Ok(Json(MessageResponse::new(format!(
        "Container {} restarted successfully.",
        name.trim()
    ))))
}

#[instrument(name = "request", skip_all, fields(operation = "edit", request_id = %request_id(&headers), container = %name.trim()))]
pub(crate) async fn edit(
    State(state): State<AppState>,
    Path(name): Path<String>,
    headers: HeaderMap,
    payload: Result<Json<EditRequest>, JsonRejection>,
) -> ApiResult<MessageResponse> {
    let Json(request) =
        payload.map_err(|rejection| DockhandError::Validation(rejection.body_text()))?;
    state
        .orchestrator
        .update_cpu_limit(&name, request.cpu_limit_percent)
        .await?;
    Ok(Json(MessageResponse::new(format!(
        "Container {} updated successfully.",
        name.trim()
    ))))
}

#[instrument(name = "request", skip_all, fields(operation = "stats", request_id = %request_id(&headers), container = %name.trim()))]
pub(crate) async fn stats(
    State(state): State<AppState>,
    Path(name): Path<String>,
    headers: HeaderMap,
) -> ApiResult<StatsResponse> {
    // Dropping this future (client gone, or shutdown) cancels the engine read
    let cancel = state.shutdown.child_token();
    let _cancel_on_drop = cancel.clone().drop_guard();
    let usage = state.orchestrator.stats(&name, cancel).await?;
    Ok(Json(StatsResponse::from(usage)))
}

/// `/docker/<op>/` with nothing after the slash.
pub(crate) async fn missing_name() -> ApiError {
    ApiError(DockhandError::Validation(
        "ContainerName is required.".to_string(),
    ))
}

pub(crate) async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let engine_ok = state.orchestrator.engine_healthy().await;
    Json(HealthResponse {
        status: if engine_ok { "healthy" } else { "degraded" }.to_string(),
        engine: if engine_ok { "reachable" } else { "unreachable" }.to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}
