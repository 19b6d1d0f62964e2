//! Incremental official-release-status stream
//!
//! Streams the status filter's progress over SSE so the consumer can render
//! cached verdicts immediately and watch misses resolve one by one. When
//! the client disconnects, dropping the stream cancels the in-flight
//! resolution loop before its next iteration.

use axum::{
    extract::{Query, State},
    response::sse::{Event, KeepAlive, Sse},
    Extension,
};
use futures::stream::Stream;
use serde::Deserialize;
use std::convert::Infallible;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::api::ApiError;
use crate::db::sessions::SessionUser;
use crate::freshness;
use crate::services::status_filter::{self, RefreshProgress};
use crate::AppState;

/// Query parameters: comma-separated release group ids
#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    ids: String,
}

/// GET /api/release-status/events?ids=a,b,c
///
/// Emits a `progress` event after each resolved item and a final `complete`
/// event carrying the full status map. Items not reached before a client
/// disconnect stay unresolved.
pub async fn release_status_events(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
    Query(query): Query<StatusQuery>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let ids: Vec<String> = query
        .ids
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect();

    if ids.is_empty() {
        return Err(tunelog_common::Error::InvalidInput(
            "ids query parameter must name at least one release group".to_string(),
        )
        .into());
    }

    info!(
        user_id = %user.user_id,
        items = ids.len(),
        "Starting release-status resolution"
    );

    let cancel = CancellationToken::new();
    let guard = cancel.clone().drop_guard();
    let (progress_tx, mut progress_rx) = watch::channel(RefreshProgress::default());

    let task = tokio::spawn({
        let pool = state.db.clone();
        let catalog = state.catalog.clone();
        let cancel = cancel.clone();
        async move {
            status_filter::run(
                &pool,
                catalog.as_ref(),
                &ids,
                freshness::STATUS_TTL,
                &progress_tx,
                &cancel,
            )
            .await
        }
    });

    let stream = async_stream::stream! {
        // Dropping the stream (client disconnect) drops the guard, which
        // cancels the resolution loop before its next iteration
        let _guard = guard;

        while progress_rx.changed().await.is_ok() {
            let progress = *progress_rx.borrow_and_update();
            match Event::default().event("progress").json_data(progress) {
                Ok(event) => yield Ok(event),
                Err(e) => warn!("Failed to encode progress event: {}", e),
            }
        }

        // The sender is dropped once the filter finishes; collect the map
        match task.await {
            Ok(statuses) => match Event::default().event("complete").json_data(&statuses) {
                Ok(event) => yield Ok(event),
                Err(e) => warn!("Failed to encode completion event: {}", e),
            },
            Err(e) => warn!("Status resolution task failed: {}", e),
        }
    };

    Ok(Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("heartbeat"),
    ))
}
