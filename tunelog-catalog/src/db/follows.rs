//! Followed-artist queries
//!
//! Follow rows are owned by users and are read-only input to the cache
//! refreshers; nothing here mutates them on behalf of a refresh.

use sqlx::{Row, SqlitePool};
use tunelog_common::Result;

/// An artist a user follows
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FollowedArtist {
    pub artist_mbid: String,
    pub artist_name: String,
}

/// Load one user's followed artists in follow order
pub async fn load_followed_artists(pool: &SqlitePool, user_id: &str) -> Result<Vec<FollowedArtist>> {
    let rows = sqlx::query(
        r#"
        SELECT artist_mbid, artist_name
        FROM followed_artists
        WHERE user_id = ?
        ORDER BY created_at, artist_mbid
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| FollowedArtist {
            artist_mbid: row.get("artist_mbid"),
            artist_name: row.get("artist_name"),
        })
        .collect())
}

/// Load all distinct followed artists across users (prewarm target set)
pub async fn load_all_followed_artists(pool: &SqlitePool) -> Result<Vec<FollowedArtist>> {
    let rows = sqlx::query(
        r#"
        SELECT artist_mbid, MIN(artist_name) AS artist_name
        FROM followed_artists
        GROUP BY artist_mbid
        ORDER BY artist_mbid
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| FollowedArtist {
            artist_mbid: row.get("artist_mbid"),
            artist_name: row.get("artist_name"),
        })
        .collect())
}

/// Record that a user follows an artist
pub async fn follow_artist(
    pool: &SqlitePool,
    user_id: &str,
    artist_mbid: &str,
    artist_name: &str,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO followed_artists (user_id, artist_mbid, artist_name, created_at)
        VALUES (?, ?, ?, ?)
        ON CONFLICT(user_id, artist_mbid) DO UPDATE SET
            artist_name = excluded.artist_name
        "#,
    )
    .bind(user_id)
    .bind(artist_mbid)
    .bind(artist_name)
    .bind(crate::freshness::now_ms())
    .execute(pool)
    .await?;

    Ok(())
}
