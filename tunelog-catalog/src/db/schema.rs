//! Database schema initialization for tunelog-catalog
//!
//! Idempotent DDL run on every startup. Cache tables share one shape:
//! primary key on the external entity id, a payload column, and a
//! `fetched_at` Unix-millisecond timestamp. Upsert semantics guarantee at
//! most one row per key.

use sqlx::SqlitePool;
use tunelog_common::Result;

/// Create all tables if they do not exist
pub async fn initialize_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            user_id TEXT PRIMARY KEY,
            display_name TEXT NOT NULL,
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sessions (
            token TEXT PRIMARY KEY,
            user_id TEXT NOT NULL REFERENCES users(user_id),
            created_at INTEGER NOT NULL,
            expires_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS followed_artists (
            user_id TEXT NOT NULL REFERENCES users(user_id),
            artist_mbid TEXT NOT NULL,
            artist_name TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            PRIMARY KEY (user_id, artist_mbid)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_followed_artists_mbid
        ON followed_artists(artist_mbid)
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS artist_release_cache (
            artist_mbid TEXT PRIMARY KEY,
            payload TEXT NOT NULL,
            fetched_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS artist_image_cache (
            artist_mbid TEXT PRIMARY KEY,
            image_url TEXT,
            fetched_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS release_status_cache (
            release_group_mbid TEXT PRIMARY KEY,
            is_official INTEGER NOT NULL,
            fetched_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_schema_initializes_and_is_idempotent() {
        let pool = tunelog_common::db::connect_memory().await.unwrap();

        initialize_schema(&pool).await.expect("First run");
        initialize_schema(&pool).await.expect("Second run");

        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN \
             ('settings', 'users', 'sessions', 'followed_artists', \
              'artist_release_cache', 'artist_image_cache', 'release_status_cache')",
        )
        .fetch_one(&pool)
        .await
        .unwrap();

        assert_eq!(count, 7);
    }
}
