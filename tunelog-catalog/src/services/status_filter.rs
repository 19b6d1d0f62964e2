//! Incremental official-release-status filter
//!
//! Resolves the official/unofficial verdict for a set of release groups.
//! Cached verdicts are reported immediately so consumers can render without
//! flicker; misses are then resolved one at a time at the catalog cadence,
//! publishing progress after each item. The whole resolution is owned by the
//! consuming request: no process-wide state survives it.
//!
//! Cancellation is cooperative: the token is checked once per loop
//! iteration, before the next fetch, never mid-flight. Items not reached
//! when the token fires stay `Pending`.

use async_trait::async_trait;
use serde::Serialize;
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::db::cache;
use crate::freshness::{is_fresh, now_ms};
use tunelog_common::Result;

/// Source of official-release verdicts, one release group at a time
#[async_trait]
pub trait StatusFetcher: Send + Sync {
    async fn fetch_official_status(&self, release_group_mbid: &str) -> Result<bool>;
}

/// Progress of an in-flight resolution pass; discarded when the consumer
/// disconnects
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct RefreshProgress {
    pub checked: usize,
    pub total: usize,
}

/// Verdict for one release group
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ReleaseStatus {
    /// Not yet resolved (cache miss, resolution pending or cancelled)
    Pending,
    Official,
    Unofficial,
}

/// Resolve official-release status for `release_group_mbids`.
///
/// Returns the status map; entries still unresolved on cancellation remain
/// `Pending`. A fetch error marks the item official: hiding a legitimate
/// release is worse than showing a bootleg, so the filter fails open.
pub async fn run<F: StatusFetcher>(
    pool: &SqlitePool,
    fetcher: &F,
    release_group_mbids: &[String],
    ttl: Duration,
    progress: &watch::Sender<RefreshProgress>,
    cancel: &CancellationToken,
) -> HashMap<String, ReleaseStatus> {
    let now = now_ms();
    let ids: Vec<&str> = release_group_mbids.iter().map(String::as_str).collect();

    let cached = match cache::load_status_entries(pool, &ids).await {
        Ok(cached) => cached,
        Err(e) => {
            warn!("Status cache read failed, resolving all items: {}", e);
            HashMap::new()
        }
    };

    let mut statuses = HashMap::new();
    let mut pending = Vec::new();

    for id in release_group_mbids {
        if statuses.contains_key(id) {
            continue;
        }
        match cached.get(id) {
            Some(entry) if is_fresh(entry.fetched_at, ttl, now) => {
                let status = if entry.is_official {
                    ReleaseStatus::Official
                } else {
                    ReleaseStatus::Unofficial
                };
                statuses.insert(id.clone(), status);
            }
            _ => {
                statuses.insert(id.clone(), ReleaseStatus::Pending);
                pending.push(id.clone());
            }
        }
    }

    let total = pending.len();
    let _ = progress.send(RefreshProgress { checked: 0, total });

    for (index, id) in pending.iter().enumerate() {
        if cancel.is_cancelled() {
            debug!(
                resolved = index,
                total = total,
                "Status resolution cancelled, remaining items stay pending"
            );
            break;
        }

        let status = match fetcher.fetch_official_status(id).await {
            Ok(is_official) => {
                cache::save_status_entry_detached(pool.clone(), id.clone(), is_official, now_ms());
                if is_official {
                    ReleaseStatus::Official
                } else {
                    ReleaseStatus::Unofficial
                }
            }
            Err(e) => {
                // Fail open, and do not cache the guess
                warn!(
                    release_group_mbid = %id,
                    "Status fetch failed, assuming official: {}", e
                );
                ReleaseStatus::Official
            }
        };

        statuses.insert(id.clone(), status);
        let _ = progress.send(RefreshProgress {
            checked: index + 1,
            total,
        });
    }

    statuses
}
