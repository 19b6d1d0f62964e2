//! Cache refresh drivers
//!
//! One invocation runs a single pass: collect targets, partition by cache
//! freshness, fetch the stale/missing slice through the rate-limited
//! client, persist successes best-effort, report counts. Per-item failures
//! are counted and skipped; they never abort the remaining sequence. There
//! is no in-invocation retry; a later invocation re-attempts whatever is
//! still missing.

use async_trait::async_trait;
use serde::Serialize;
use sqlx::SqlitePool;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::db::cache;
use crate::db::follows::FollowedArtist;
use crate::freshness::{is_fresh, now_ms};
use crate::services::catalog_client::ReleaseGroup;
use tunelog_common::Result;

/// Batch size for knowledge-graph image resolution
pub const IMAGE_BATCH_SIZE: usize = 3;

/// Pause between image resolution batches
pub const IMAGE_BATCH_PAUSE: Duration = Duration::from_millis(375);

/// Source of release-group lists, one artist at a time
#[async_trait]
pub trait ReleaseFetcher: Send + Sync {
    async fn fetch_release_groups(&self, artist_mbid: &str) -> Result<Vec<ReleaseGroup>>;
}

/// Source of artist image URLs
#[async_trait]
pub trait ImageResolver: Send + Sync {
    async fn resolve_artist_image(&self, artist_mbid: &str) -> Result<Option<String>>;
}

/// Aggregate counts for one refresh invocation.
///
/// `succeeded + failed == attempted` always holds; `skipped_fresh` counts
/// cache hits that needed no fetch.
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct RefreshOutcome {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped_fresh: usize,
}

/// One artist's release groups, from cache or freshly fetched
#[derive(Debug, Clone, Serialize)]
pub struct ArtistReleases {
    pub artist_mbid: String,
    pub artist_name: String,
    pub release_groups: Vec<ReleaseGroup>,
}

/// Result of a release refresh: counts plus the unified payload list
#[derive(Debug)]
pub struct ReleaseRefresh {
    pub outcome: RefreshOutcome,
    pub releases: Vec<ArtistReleases>,
}

/// Refresh the release cache for a set of followed artists.
///
/// Artists are processed in the order given. `fetch_cap` bounds the number
/// of fetches in this invocation; targets beyond the cap are left for a
/// later invocation. Cache writes are detached: a persistence failure
/// never fails the invocation, the fetched payload is still returned.
pub async fn refresh_artist_releases<F: ReleaseFetcher>(
    pool: &SqlitePool,
    fetcher: &F,
    artists: &[FollowedArtist],
    ttl: Duration,
    fetch_cap: Option<usize>,
) -> Result<ReleaseRefresh> {
    let now = now_ms();
    let ids: Vec<&str> = artists.iter().map(|a| a.artist_mbid.as_str()).collect();
    let cached = cache::load_release_entries(pool, &ids).await?;

    let mut releases = Vec::new();
    let mut need_fetch: Vec<&FollowedArtist> = Vec::new();
    let mut skipped_fresh = 0;

    for artist in artists {
        if let Some(entry) = cached.get(&artist.artist_mbid) {
            if is_fresh(entry.fetched_at, ttl, now) {
                match serde_json::from_str::<Vec<ReleaseGroup>>(&entry.payload) {
                    Ok(groups) => {
                        skipped_fresh += 1;
                        releases.push(ArtistReleases {
                            artist_mbid: artist.artist_mbid.clone(),
                            artist_name: artist.artist_name.clone(),
                            release_groups: groups,
                        });
                        continue;
                    }
                    Err(e) => {
                        // Unreadable payload counts as a miss
                        warn!(
                            artist_mbid = %artist.artist_mbid,
                            "Discarding unreadable cached payload: {}", e
                        );
                    }
                }
            }
        }
        need_fetch.push(artist);
    }

    let fetch_slice = match fetch_cap {
        Some(cap) if need_fetch.len() > cap => {
            debug!(
                deferred = need_fetch.len() - cap,
                "Deferring stale artists past the per-invocation cap"
            );
            &need_fetch[..cap]
        }
        _ => &need_fetch[..],
    };

    let mut outcome = RefreshOutcome {
        attempted: fetch_slice.len(),
        skipped_fresh,
        ..Default::default()
    };

    for artist in fetch_slice {
        match fetcher.fetch_release_groups(&artist.artist_mbid).await {
            Ok(groups) => {
                outcome.succeeded += 1;
                match serde_json::to_string(&groups) {
                    Ok(payload) => cache::save_release_entry_detached(
                        pool.clone(),
                        artist.artist_mbid.clone(),
                        payload,
                        now_ms(),
                    ),
                    Err(e) => warn!(
                        artist_mbid = %artist.artist_mbid,
                        "Skipping cache write for unserializable payload: {}", e
                    ),
                }
                releases.push(ArtistReleases {
                    artist_mbid: artist.artist_mbid.clone(),
                    artist_name: artist.artist_name.clone(),
                    release_groups: groups,
                });
            }
            Err(e) => {
                outcome.failed += 1;
                warn!(artist_mbid = %artist.artist_mbid, "Release fetch failed: {}", e);
            }
        }
    }

    info!(
        attempted = outcome.attempted,
        succeeded = outcome.succeeded,
        failed = outcome.failed,
        skipped_fresh = outcome.skipped_fresh,
        "Release refresh pass complete"
    );

    Ok(ReleaseRefresh { outcome, releases })
}

/// Refresh the artist image cache for a set of artists.
///
/// Misses are resolved in batches of `batch_size` awaited together, with
/// `batch_pause` between batches. A resolved `None` ("no image known") is
/// persisted like a hit so the graph is not re-queried before the TTL.
pub async fn refresh_artist_images<G: ImageResolver>(
    pool: &SqlitePool,
    resolver: &G,
    artist_mbids: &[String],
    ttl: Duration,
    batch_size: usize,
    batch_pause: Duration,
) -> Result<RefreshOutcome> {
    let now = now_ms();
    let ids: Vec<&str> = artist_mbids.iter().map(String::as_str).collect();
    let cached = cache::load_image_entries(pool, &ids).await?;

    let need_fetch: Vec<&String> = artist_mbids
        .iter()
        .filter(|mbid| match cached.get(mbid.as_str()) {
            Some(entry) => !is_fresh(entry.fetched_at, ttl, now),
            None => true,
        })
        .collect();

    let mut outcome = RefreshOutcome {
        attempted: need_fetch.len(),
        skipped_fresh: artist_mbids.len() - need_fetch.len(),
        ..Default::default()
    };

    for (batch_index, batch) in need_fetch.chunks(batch_size.max(1)).enumerate() {
        if batch_index > 0 {
            tokio::time::sleep(batch_pause).await;
        }

        let results =
            futures::future::join_all(batch.iter().map(|mbid| resolver.resolve_artist_image(mbid)))
                .await;

        for (mbid, result) in batch.iter().zip(results) {
            match result {
                Ok(image_url) => {
                    outcome.succeeded += 1;
                    cache::save_image_entry_detached(
                        pool.clone(),
                        (*mbid).clone(),
                        image_url,
                        now_ms(),
                    );
                }
                Err(e) => {
                    outcome.failed += 1;
                    warn!(artist_mbid = %mbid, "Image resolution failed: {}", e);
                }
            }
        }
    }

    info!(
        attempted = outcome.attempted,
        succeeded = outcome.succeeded,
        failed = outcome.failed,
        skipped_fresh = outcome.skipped_fresh,
        "Image refresh pass complete"
    );

    Ok(outcome)
}
