//! New releases for the calling user's followed artists

use axum::{extract::State, Extension, Json};
use serde::Serialize;
use tracing::info;

use crate::api::ApiError;
use crate::db::{follows, sessions::SessionUser};
use crate::freshness;
use crate::services::refresher::{self, ArtistReleases, RefreshOutcome};
use crate::AppState;

/// Response: unified release list (fresh cache + newly fetched) plus the
/// refresh counts
#[derive(Debug, Serialize)]
pub struct NewReleasesResponse {
    pub releases: Vec<ArtistReleases>,
    pub counts: RefreshOutcome,
}

/// GET /api/new-releases
///
/// Runs one refresh pass over the calling user's followed artists. Artists
/// with a fresh cache row are served from cache; the rest are fetched at
/// the catalog cadence within this request.
pub async fn new_releases(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
) -> Result<Json<NewReleasesResponse>, ApiError> {
    let followed = follows::load_followed_artists(&state.db, &user.user_id).await?;

    let refresh = refresher::refresh_artist_releases(
        &state.db,
        state.catalog.as_ref(),
        &followed,
        freshness::RELEASE_TTL,
        None,
    )
    .await?;

    info!(
        user_id = %user.user_id,
        artists = followed.len(),
        fetched = refresh.outcome.succeeded,
        "Served new releases"
    );

    Ok(Json(NewReleasesResponse {
        releases: refresh.releases,
        counts: refresh.outcome,
    }))
}
