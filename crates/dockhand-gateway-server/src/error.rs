use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use dockhand_common::{DockhandError, RecreateStep};
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

/// Status for a request abandoned before the engine answered.
pub const CLIENT_CLOSED_REQUEST: u16 = 499;

/// JSON error body returned by every failing endpoint.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub title: String,
    pub partial: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step: Option<RecreateStep>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub container_removed: Option<bool>,
}

#[derive(Debug)]
pub struct ApiError(pub DockhandError);

impl From<DockhandError> for ApiError {
    fn from(err: DockhandError) -> Self {
        ApiError(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            DockhandError::Validation(_) => StatusCode::BAD_REQUEST,
            DockhandError::NotFound(_) => StatusCode::NOT_FOUND,
            DockhandError::Cancelled(_) => StatusCode::from_u16(CLIENT_CLOSED_REQUEST)
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            DockhandError::Engine(_)
            | DockhandError::InvalidImage(_)
            | DockhandError::PartialFailure { .. }
            | DockhandError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn title(&self) -> &'static str {
        match &self.0 {
            DockhandError::Validation(_) => "Bad Request",
            DockhandError::NotFound(_) => "Not Found",
            DockhandError::Cancelled(_) => "Client Closed Request",
            DockhandError::Engine(_)
            | DockhandError::InvalidImage(_)
            | DockhandError::PartialFailure { .. } => "Docker API Error",
            DockhandError::Config(_) => "Internal Server Error",
        }
    }

    /// The message shown to the caller; engine and validation messages pass through as-is.
    fn message(&self) -> String {
        match &self.0 {
            DockhandError::Validation(m)
            | DockhandError::NotFound(m)
            | DockhandError::Engine(m)
            | DockhandError::Cancelled(m) => m.clone(),
            other => other.to_string(),
        }
    }

    pub fn body(&self) -> ErrorBody {
        let (step, container_removed) = match &self.0 {
            DockhandError::PartialFailure { step, removed, .. } => (Some(*step), Some(*removed)),
            _ => (None, None),
        };
        ErrorBody {
            error: self.message(),
            title: self.title().to_string(),
            partial: self.0.is_partial(),
            step,
            container_removed,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = self.body();
        if status.is_server_error() {
            error!(status = status.as_u16(), partial = body.partial, "Request failed: {}", self.0);
        } else {
            warn!(status = status.as_u16(), "Request rejected: {}", self.0);
        }
        (status, Json(body)).into_response()
    }
}
