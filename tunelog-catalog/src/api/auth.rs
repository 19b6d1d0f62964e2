//! Authentication middleware for tunelog-catalog
//!
//! Two credential classes guard the API:
//! - administrative routes (prewarm): shared-secret timestamp+hash over the
//!   request body, validated before any fetch or cache work begins
//! - user routes (new-releases, release-status): bearer session token
//!   resolved against the sessions table
//!
//! The health endpoint uses neither.

use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::warn;
use tunelog_common::api::auth::{validate_hash, validate_timestamp, ApiAuthError};

use crate::db::sessions;
use crate::AppState;

/// Maximum accepted request body for hash validation
const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Authentication fields carried by administrative requests
#[derive(Debug, Deserialize)]
struct AuthFields {
    timestamp: i64,
    hash: String,
}

/// Shared-secret middleware for administrative routes.
///
/// The special secret value 0 disables validation (local development,
/// tests). Rejected requests never reach the handler, so no fetch or cache
/// work happens for them.
pub async fn shared_secret_auth(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    if state.shared_secret == 0 {
        return Ok(next.run(request).await);
    }

    let (parts, body) = request.into_parts();
    let body_bytes = axum::body::to_bytes(body, MAX_BODY_BYTES)
        .await
        .map_err(|e| AuthError::ParseError(format!("Failed to read body: {}", e)))?;

    let json_value: Value = serde_json::from_slice(&body_bytes)
        .map_err(|e| AuthError::ParseError(format!("Invalid JSON: {}", e)))?;

    let auth_fields: AuthFields = serde_json::from_value(json_value.clone())
        .map_err(|e| AuthError::MissingFields(format!("Missing auth fields: {}", e)))?;

    validate_timestamp(auth_fields.timestamp).map_err(|e| match e {
        ApiAuthError::InvalidTimestamp { reason, .. } => AuthError::InvalidTimestamp(reason),
        _ => AuthError::Other(e.to_string()),
    })?;

    validate_hash(&auth_fields.hash, &json_value, state.shared_secret).map_err(|e| match e {
        ApiAuthError::InvalidHash { .. } => {
            warn!("Hash validation failed for administrative request");
            AuthError::InvalidHash
        }
        _ => AuthError::Other(e.to_string()),
    })?;

    // Restore the body for the handler
    let request = Request::from_parts(parts, Body::from(body_bytes));

    Ok(next.run(request).await)
}

/// Session-token middleware for user-scoped routes.
///
/// On success the resolved user is attached to the request extensions.
pub async fn session_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or(AuthError::MissingToken)?
        .to_string();

    let user = sessions::validate_session(&state.db, &token)
        .await
        .map_err(|e| AuthError::Other(e.to_string()))?
        .ok_or(AuthError::InvalidToken)?;

    request.extensions_mut().insert(user);

    Ok(next.run(request).await)
}

/// Authentication error types for HTTP responses
#[derive(Debug)]
pub enum AuthError {
    InvalidTimestamp(String),
    InvalidHash,
    MissingFields(String),
    MissingToken,
    InvalidToken,
    ParseError(String),
    Other(String),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AuthError::InvalidTimestamp(reason) => (
                StatusCode::UNAUTHORIZED,
                format!("Invalid timestamp: {}", reason),
            ),
            AuthError::InvalidHash => (StatusCode::UNAUTHORIZED, "Invalid hash".to_string()),
            AuthError::MissingFields(msg) => (
                StatusCode::BAD_REQUEST,
                format!("Missing required fields: {}", msg),
            ),
            AuthError::MissingToken => (
                StatusCode::UNAUTHORIZED,
                "Missing session token".to_string(),
            ),
            AuthError::InvalidToken => (
                StatusCode::UNAUTHORIZED,
                "Invalid or expired session token".to_string(),
            ),
            AuthError::ParseError(msg) => {
                (StatusCode::BAD_REQUEST, format!("Parse error: {}", msg))
            }
            AuthError::Other(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Authentication error: {}", msg),
            ),
        };

        let body = Json(json!({
            "error": message,
        }));

        (status, body).into_response()
    }
}
