//! HTTP API handlers for tunelog-catalog

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::error;
use tunelog_common::Error;

pub mod auth;
pub mod health;
pub mod new_releases;
pub mod prewarm;
pub mod release_status;

pub use auth::{session_auth, shared_secret_auth};
pub use health::health_routes;
pub use new_releases::new_releases;
pub use prewarm::{prewarm_artist_images, prewarm_artist_releases};
pub use release_status::release_status_events;

/// Handler error: maps the common error type to an HTTP status and a JSON
/// `{error}` body
#[derive(Debug)]
pub struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            Error::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Error::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Upstream(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            error!("Request failed: {}", self.0);
        }

        let body = Json(json!({
            "error": self.0.to_string(),
        }));

        (status, body).into_response()
    }
}
