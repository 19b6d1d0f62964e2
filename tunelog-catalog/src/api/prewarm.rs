//! Cache prewarm endpoints
//!
//! Invoked by a scheduler (or manually) with the shared-secret credential.
//! Each invocation makes bounded progress and reports counts; the scheduler
//! re-invokes later to continue where this pass stopped.

use axum::{extract::State, Json};
use serde::Serialize;
use tracing::info;

use crate::api::ApiError;
use crate::db::follows;
use crate::freshness;
use crate::services::refresher::{self, RefreshOutcome, IMAGE_BATCH_PAUSE, IMAGE_BATCH_SIZE};
use crate::AppState;

/// Per-invocation fetch cap for the release prewarm
pub const RELEASE_PREWARM_CAP: usize = 25;

/// Prewarm response: counts only, no payloads
#[derive(Debug, Serialize)]
pub struct PrewarmResponse {
    pub counts: RefreshOutcome,
}

/// POST /api/prewarm/artist-releases
///
/// Refreshes the release cache for all distinct followed artists, at most
/// 25 fetches per invocation.
pub async fn prewarm_artist_releases(
    State(state): State<AppState>,
) -> Result<Json<PrewarmResponse>, ApiError> {
    let artists = follows::load_all_followed_artists(&state.db).await?;

    let refresh = refresher::refresh_artist_releases(
        &state.db,
        state.catalog.as_ref(),
        &artists,
        freshness::RELEASE_TTL,
        Some(RELEASE_PREWARM_CAP),
    )
    .await?;

    info!(
        artists = artists.len(),
        attempted = refresh.outcome.attempted,
        "Release prewarm pass complete"
    );

    Ok(Json(PrewarmResponse {
        counts: refresh.outcome,
    }))
}

/// POST /api/prewarm/artist-images
///
/// Resolves missing or stale artist images through the knowledge graph in
/// batches of 3 with a pause between batches.
pub async fn prewarm_artist_images(
    State(state): State<AppState>,
) -> Result<Json<PrewarmResponse>, ApiError> {
    let artists = follows::load_all_followed_artists(&state.db).await?;
    let artist_mbids: Vec<String> = artists.into_iter().map(|a| a.artist_mbid).collect();

    let counts = refresher::refresh_artist_images(
        &state.db,
        state.graph.as_ref(),
        &artist_mbids,
        freshness::IMAGE_TTL,
        IMAGE_BATCH_SIZE,
        IMAGE_BATCH_PAUSE,
    )
    .await?;

    info!(
        artists = artist_mbids.len(),
        attempted = counts.attempted,
        "Image prewarm pass complete"
    );

    Ok(Json(PrewarmResponse { counts }))
}
