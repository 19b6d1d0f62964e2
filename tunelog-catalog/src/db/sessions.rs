//! User and session persistence
//!
//! User-scoped endpoints authenticate with a bearer session token resolved
//! against the `sessions` table. Expired tokens are treated as absent.

use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::freshness::now_ms;
use tunelog_common::Result;

/// Authenticated user attached to a request after session validation
#[derive(Debug, Clone)]
pub struct SessionUser {
    pub user_id: String,
}

/// Create a user row
pub async fn create_user(pool: &SqlitePool, user_id: &str, display_name: &str) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO users (user_id, display_name, created_at)
        VALUES (?, ?, ?)
        ON CONFLICT(user_id) DO UPDATE SET
            display_name = excluded.display_name
        "#,
    )
    .bind(user_id)
    .bind(display_name)
    .bind(now_ms())
    .execute(pool)
    .await?;

    Ok(())
}

/// Create a session for a user, returning the token
pub async fn create_session(
    pool: &SqlitePool,
    user_id: &str,
    ttl: std::time::Duration,
) -> Result<String> {
    let token = Uuid::new_v4().to_string();
    let created_at = now_ms();
    let expires_at = created_at + ttl.as_millis() as i64;

    sqlx::query(
        r#"
        INSERT INTO sessions (token, user_id, created_at, expires_at)
        VALUES (?, ?, ?, ?)
        "#,
    )
    .bind(&token)
    .bind(user_id)
    .bind(created_at)
    .bind(expires_at)
    .execute(pool)
    .await?;

    Ok(token)
}

/// Resolve a session token to its user, ignoring expired sessions
pub async fn validate_session(pool: &SqlitePool, token: &str) -> Result<Option<SessionUser>> {
    let row = sqlx::query(
        r#"
        SELECT user_id
        FROM sessions
        WHERE token = ? AND expires_at > ?
        "#,
    )
    .bind(token)
    .bind(now_ms())
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|row| SessionUser {
        user_id: row.get("user_id"),
    }))
}

/// Delete a session (logout)
pub async fn delete_session(pool: &SqlitePool, token: &str) -> Result<()> {
    sqlx::query("DELETE FROM sessions WHERE token = ?")
        .bind(token)
        .execute(pool)
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    async fn setup_pool() -> SqlitePool {
        let pool = tunelog_common::db::connect_memory().await.unwrap();
        crate::db::schema::initialize_schema(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn test_valid_session_resolves_user() {
        let pool = setup_pool().await;
        create_user(&pool, "user-1", "Listener").await.unwrap();

        let token = create_session(&pool, "user-1", Duration::from_secs(3600))
            .await
            .unwrap();

        let user = validate_session(&pool, &token)
            .await
            .unwrap()
            .expect("Session should resolve");
        assert_eq!(user.user_id, "user-1");
    }

    #[tokio::test]
    async fn test_unknown_token_rejected() {
        let pool = setup_pool().await;

        let user = validate_session(&pool, "no-such-token").await.unwrap();
        assert!(user.is_none());
    }

    #[tokio::test]
    async fn test_expired_session_rejected() {
        let pool = setup_pool().await;
        create_user(&pool, "user-1", "Listener").await.unwrap();

        let token = create_session(&pool, "user-1", Duration::from_millis(0))
            .await
            .unwrap();

        let user = validate_session(&pool, &token).await.unwrap();
        assert!(user.is_none());
    }

    #[tokio::test]
    async fn test_deleted_session_rejected() {
        let pool = setup_pool().await;
        create_user(&pool, "user-1", "Listener").await.unwrap();

        let token = create_session(&pool, "user-1", Duration::from_secs(3600))
            .await
            .unwrap();
        delete_session(&pool, &token).await.unwrap();

        let user = validate_session(&pool, &token).await.unwrap();
        assert!(user.is_none());
    }
}
