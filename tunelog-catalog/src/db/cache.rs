//! Cache table access
//!
//! One keyed table per cached entity kind, all sharing upsert semantics on
//! the external entity id. The `*_detached` writers implement the refresh
//! driver's best-effort persistence contract: callers must not depend on the
//! write completing or succeeding; failures are logged and swallowed.

use sqlx::{Row, SqlitePool};
use std::collections::HashMap;
use tracing::warn;
use tunelog_common::Result;

/// Cached release list for one artist
#[derive(Debug, Clone)]
pub struct ReleaseEntry {
    pub artist_mbid: String,
    /// JSON array of release groups
    pub payload: String,
    /// Unix epoch milliseconds
    pub fetched_at: i64,
}

/// Cached image lookup result for one artist.
///
/// `image_url = None` records "looked up, none found" and is as cacheable
/// as a hit.
#[derive(Debug, Clone)]
pub struct ImageEntry {
    pub artist_mbid: String,
    pub image_url: Option<String>,
    pub fetched_at: i64,
}

/// Cached official-release verdict for one release group
#[derive(Debug, Clone)]
pub struct StatusEntry {
    pub release_group_mbid: String,
    pub is_official: bool,
    pub fetched_at: i64,
}

/// Build an `IN (?, ?, ...)` clause for `n` bindings
fn in_placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

// ----------------------------------------------------------------
// artist_release_cache
// ----------------------------------------------------------------

/// Load release cache rows for a set of artists, keyed by artist MBID
pub async fn load_release_entries(
    pool: &SqlitePool,
    artist_mbids: &[&str],
) -> Result<HashMap<String, ReleaseEntry>> {
    if artist_mbids.is_empty() {
        return Ok(HashMap::new());
    }

    let sql = format!(
        "SELECT artist_mbid, payload, fetched_at FROM artist_release_cache \
         WHERE artist_mbid IN ({})",
        in_placeholders(artist_mbids.len())
    );

    let mut query = sqlx::query(&sql);
    for mbid in artist_mbids {
        query = query.bind(*mbid);
    }

    let rows = query.fetch_all(pool).await?;

    let mut entries = HashMap::with_capacity(rows.len());
    for row in rows {
        let entry = ReleaseEntry {
            artist_mbid: row.get("artist_mbid"),
            payload: row.get("payload"),
            fetched_at: row.get("fetched_at"),
        };
        entries.insert(entry.artist_mbid.clone(), entry);
    }

    Ok(entries)
}

/// Upsert one artist's release cache row
pub async fn save_release_entry(
    pool: &SqlitePool,
    artist_mbid: &str,
    payload: &str,
    fetched_at: i64,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO artist_release_cache (artist_mbid, payload, fetched_at)
        VALUES (?, ?, ?)
        ON CONFLICT(artist_mbid) DO UPDATE SET
            payload = excluded.payload,
            fetched_at = excluded.fetched_at
        "#,
    )
    .bind(artist_mbid)
    .bind(payload)
    .bind(fetched_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// Best-effort detached release cache write
pub fn save_release_entry_detached(
    pool: SqlitePool,
    artist_mbid: String,
    payload: String,
    fetched_at: i64,
) {
    tokio::spawn(async move {
        if let Err(e) = save_release_entry(&pool, &artist_mbid, &payload, fetched_at).await {
            warn!(artist_mbid = %artist_mbid, "Release cache write failed (ignored): {}", e);
        }
    });
}

// ----------------------------------------------------------------
// artist_image_cache
// ----------------------------------------------------------------

/// Load image cache rows for a set of artists, keyed by artist MBID
pub async fn load_image_entries(
    pool: &SqlitePool,
    artist_mbids: &[&str],
) -> Result<HashMap<String, ImageEntry>> {
    if artist_mbids.is_empty() {
        return Ok(HashMap::new());
    }

    let sql = format!(
        "SELECT artist_mbid, image_url, fetched_at FROM artist_image_cache \
         WHERE artist_mbid IN ({})",
        in_placeholders(artist_mbids.len())
    );

    let mut query = sqlx::query(&sql);
    for mbid in artist_mbids {
        query = query.bind(*mbid);
    }

    let rows = query.fetch_all(pool).await?;

    let mut entries = HashMap::with_capacity(rows.len());
    for row in rows {
        let entry = ImageEntry {
            artist_mbid: row.get("artist_mbid"),
            image_url: row.get("image_url"),
            fetched_at: row.get("fetched_at"),
        };
        entries.insert(entry.artist_mbid.clone(), entry);
    }

    Ok(entries)
}

/// Upsert one artist's image cache row
pub async fn save_image_entry(
    pool: &SqlitePool,
    artist_mbid: &str,
    image_url: Option<&str>,
    fetched_at: i64,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO artist_image_cache (artist_mbid, image_url, fetched_at)
        VALUES (?, ?, ?)
        ON CONFLICT(artist_mbid) DO UPDATE SET
            image_url = excluded.image_url,
            fetched_at = excluded.fetched_at
        "#,
    )
    .bind(artist_mbid)
    .bind(image_url)
    .bind(fetched_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// Best-effort detached image cache write
pub fn save_image_entry_detached(
    pool: SqlitePool,
    artist_mbid: String,
    image_url: Option<String>,
    fetched_at: i64,
) {
    tokio::spawn(async move {
        if let Err(e) = save_image_entry(&pool, &artist_mbid, image_url.as_deref(), fetched_at).await
        {
            warn!(artist_mbid = %artist_mbid, "Image cache write failed (ignored): {}", e);
        }
    });
}

// ----------------------------------------------------------------
// release_status_cache
// ----------------------------------------------------------------

/// Load status cache rows for a set of release groups, keyed by MBID
pub async fn load_status_entries(
    pool: &SqlitePool,
    release_group_mbids: &[&str],
) -> Result<HashMap<String, StatusEntry>> {
    if release_group_mbids.is_empty() {
        return Ok(HashMap::new());
    }

    let sql = format!(
        "SELECT release_group_mbid, is_official, fetched_at FROM release_status_cache \
         WHERE release_group_mbid IN ({})",
        in_placeholders(release_group_mbids.len())
    );

    let mut query = sqlx::query(&sql);
    for mbid in release_group_mbids {
        query = query.bind(*mbid);
    }

    let rows = query.fetch_all(pool).await?;

    let mut entries = HashMap::with_capacity(rows.len());
    for row in rows {
        let entry = StatusEntry {
            release_group_mbid: row.get("release_group_mbid"),
            is_official: row.get::<i64, _>("is_official") != 0,
            fetched_at: row.get("fetched_at"),
        };
        entries.insert(entry.release_group_mbid.clone(), entry);
    }

    Ok(entries)
}

/// Upsert one release group's status cache row
pub async fn save_status_entry(
    pool: &SqlitePool,
    release_group_mbid: &str,
    is_official: bool,
    fetched_at: i64,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO release_status_cache (release_group_mbid, is_official, fetched_at)
        VALUES (?, ?, ?)
        ON CONFLICT(release_group_mbid) DO UPDATE SET
            is_official = excluded.is_official,
            fetched_at = excluded.fetched_at
        "#,
    )
    .bind(release_group_mbid)
    .bind(is_official as i64)
    .bind(fetched_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// Best-effort detached status cache write
pub fn save_status_entry_detached(
    pool: SqlitePool,
    release_group_mbid: String,
    is_official: bool,
    fetched_at: i64,
) {
    tokio::spawn(async move {
        if let Err(e) = save_status_entry(&pool, &release_group_mbid, is_official, fetched_at).await
        {
            warn!(
                release_group_mbid = %release_group_mbid,
                "Status cache write failed (ignored): {}", e
            );
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn setup_pool() -> SqlitePool {
        let pool = tunelog_common::db::connect_memory().await.unwrap();
        crate::db::schema::initialize_schema(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn test_release_entry_upsert_keeps_one_row_per_key() {
        let pool = setup_pool().await;

        save_release_entry(&pool, "artist-a", "[]", 1000).await.unwrap();
        save_release_entry(&pool, "artist-a", "[{\"id\":\"rg-1\"}]", 2000)
            .await
            .unwrap();

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM artist_release_cache")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 1);

        let entries = load_release_entries(&pool, &["artist-a"]).await.unwrap();
        let entry = entries.get("artist-a").expect("Row should exist");
        assert_eq!(entry.fetched_at, 2000);
        assert!(entry.payload.contains("rg-1"));
    }

    #[tokio::test]
    async fn test_load_release_entries_filters_by_key_list() {
        let pool = setup_pool().await;

        save_release_entry(&pool, "artist-a", "[]", 1000).await.unwrap();
        save_release_entry(&pool, "artist-b", "[]", 1000).await.unwrap();
        save_release_entry(&pool, "artist-c", "[]", 1000).await.unwrap();

        let entries = load_release_entries(&pool, &["artist-a", "artist-c", "artist-x"])
            .await
            .unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries.contains_key("artist-a"));
        assert!(entries.contains_key("artist-c"));
    }

    #[tokio::test]
    async fn test_load_entries_empty_key_list() {
        let pool = setup_pool().await;
        let entries = load_release_entries(&pool, &[]).await.unwrap();
        assert!(entries.is_empty());
    }

    #[tokio::test]
    async fn test_image_entry_none_is_cacheable() {
        let pool = setup_pool().await;

        save_image_entry(&pool, "artist-a", None, 1000).await.unwrap();

        let entries = load_image_entries(&pool, &["artist-a"]).await.unwrap();
        let entry = entries.get("artist-a").expect("Row should exist");
        assert!(entry.image_url.is_none());
        assert_eq!(entry.fetched_at, 1000);
    }

    #[tokio::test]
    async fn test_status_entry_roundtrip() {
        let pool = setup_pool().await;

        save_status_entry(&pool, "rg-1", true, 1000).await.unwrap();
        save_status_entry(&pool, "rg-2", false, 1000).await.unwrap();

        let entries = load_status_entries(&pool, &["rg-1", "rg-2"]).await.unwrap();
        assert!(entries.get("rg-1").unwrap().is_official);
        assert!(!entries.get("rg-2").unwrap().is_official);
    }

    #[tokio::test]
    async fn test_detached_write_lands_without_caller_waiting() {
        let pool = setup_pool().await;

        save_release_entry_detached(pool.clone(), "artist-a".to_string(), "[]".to_string(), 1000);

        // Yield to the detached task
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        let entries = load_release_entries(&pool, &["artist-a"]).await.unwrap();
        assert!(entries.contains_key("artist-a"));
    }
}
