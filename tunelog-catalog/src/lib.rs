//! tunelog-catalog - External catalog cache service
//!
//! Serves the cache-refresh operations behind the Tunelog music log:
//! new-release lists for followed artists, prewarming of release and
//! artist-image caches, and incremental official-release-status
//! resolution. All external catalog traffic is rate limited to the
//! catalog's published ~1 request/second ceiling.

use sqlx::SqlitePool;
use std::sync::Arc;

use axum::Router;

use crate::services::catalog_client::CatalogClient;
use crate::services::knowledge_graph::KnowledgeGraphClient;

pub mod api;
pub mod db;
pub mod freshness;
pub mod services;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Shared secret for administrative API authentication
    pub shared_secret: i64,
    /// Rate-limited external catalog client
    pub catalog: Arc<CatalogClient>,
    /// Knowledge-graph query client (artist image resolution)
    pub graph: Arc<KnowledgeGraphClient>,
}

impl AppState {
    /// Create new application state
    pub fn new(
        db: SqlitePool,
        shared_secret: i64,
        catalog: CatalogClient,
        graph: KnowledgeGraphClient,
    ) -> Self {
        Self {
            db,
            shared_secret,
            catalog: Arc::new(catalog),
            graph: Arc::new(graph),
        }
    }
}

/// Build application router.
///
/// Prewarm endpoints require the shared-secret credential (scheduled or
/// administrative callers); user-scoped endpoints require a session token;
/// the health endpoint is public.
pub fn build_router(state: AppState) -> Router {
    use axum::middleware;
    use axum::routing::{get, post};
    use tower_http::trace::TraceLayer;

    let admin = Router::new()
        .route(
            "/api/prewarm/artist-releases",
            post(api::prewarm_artist_releases),
        )
        .route(
            "/api/prewarm/artist-images",
            post(api::prewarm_artist_images),
        )
        .layer(middleware::from_fn_with_state(
            state.clone(),
            api::shared_secret_auth,
        ));

    let user = Router::new()
        .route("/api/new-releases", get(api::new_releases))
        .route("/api/release-status/events", get(api::release_status_events))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            api::session_auth,
        ));

    let public = Router::new().merge(api::health_routes());

    Router::new()
        .merge(admin)
        .merge(user)
        .merge(public)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
