//! User profile and session queries
//!
//! Profiles and sessions are owned by the external auth provider; these
//! tables mirror what this service needs to resolve a bearer token to a
//! user and to read or update the user's tier.

use super::models::{SessionUser, UserProfile};
use crate::tier::Tier;
use crate::time::{now, to_db_timestamp};
use crate::Result;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

/// Insert a profile, or refresh email/name if it already exists
pub async fn upsert_user(
    pool: &SqlitePool,
    id: &str,
    email: &str,
    full_name: Option<&str>,
) -> Result<()> {
    let ts = to_db_timestamp(now());
    sqlx::query(
        r#"
        INSERT INTO users (id, email, full_name, tier, created_at, updated_at)
        VALUES (?, ?, ?, 'free', ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            email = excluded.email,
            full_name = COALESCE(excluded.full_name, users.full_name),
            updated_at = excluded.updated_at
        "#,
    )
    .bind(id)
    .bind(email)
    .bind(full_name)
    .bind(&ts)
    .bind(&ts)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn get_user(pool: &SqlitePool, id: &str) -> Result<Option<UserProfile>> {
    let user = sqlx::query_as::<_, UserProfile>(
        "SELECT id, email, full_name, tier, role, created_at FROM users WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(user)
}

/// Stored tier name for a user, `None` if the user has no profile
pub async fn get_user_tier(pool: &SqlitePool, id: &str) -> Result<Option<String>> {
    let tier: Option<String> = sqlx::query_scalar("SELECT tier FROM users WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    Ok(tier)
}

/// Set a user's tier and role, returning false if the user does not exist
pub async fn set_user_tier(pool: &SqlitePool, id: &str, tier: Tier, role: &str) -> Result<bool> {
    let result = sqlx::query("UPDATE users SET tier = ?, role = ?, updated_at = ? WHERE id = ?")
        .bind(tier.as_str())
        .bind(role)
        .bind(to_db_timestamp(now()))
        .bind(id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Register a bearer token for a user
pub async fn create_session(
    pool: &SqlitePool,
    token: &str,
    user_id: &str,
    expires_at: Option<DateTime<Utc>>,
) -> Result<()> {
    sqlx::query("INSERT INTO sessions (token, user_id, expires_at, created_at) VALUES (?, ?, ?, ?)")
        .bind(token)
        .bind(user_id)
        .bind(expires_at.map(to_db_timestamp))
        .bind(to_db_timestamp(now()))
        .execute(pool)
        .await?;

    Ok(())
}

/// Resolve a bearer token to its user, ignoring expired sessions
pub async fn find_session_user(
    pool: &SqlitePool,
    token: &str,
    at: DateTime<Utc>,
) -> Result<Option<SessionUser>> {
    let user = sqlx::query_as::<_, SessionUser>(
        r#"
        SELECT u.id, u.email
        FROM sessions s
        JOIN users u ON u.id = s.user_id
        WHERE s.token = ? AND (s.expires_at IS NULL OR s.expires_at > ?)
        "#,
    )
    .bind(token)
    .bind(to_db_timestamp(at))
    .fetch_optional(pool)
    .await?;

    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init::init_in_memory;
    use chrono::Duration;

    #[tokio::test]
    async fn test_new_user_defaults_to_free() {
        let pool = init_in_memory().await.unwrap();
        upsert_user(&pool, "u1", "a@example.com", Some("Ada")).await.unwrap();

        let user = get_user(&pool, "u1").await.unwrap().unwrap();
        assert_eq!(user.tier, "free");
        assert_eq!(user.full_name.as_deref(), Some("Ada"));
        assert_eq!(get_user_tier(&pool, "u1").await.unwrap().as_deref(), Some("free"));
    }

    #[tokio::test]
    async fn test_upsert_keeps_tier() {
        let pool = init_in_memory().await.unwrap();
        upsert_user(&pool, "u1", "a@example.com", None).await.unwrap();
        set_user_tier(&pool, "u1", Tier::Pro, "pro").await.unwrap();
        upsert_user(&pool, "u1", "new@example.com", None).await.unwrap();

        let user = get_user(&pool, "u1").await.unwrap().unwrap();
        assert_eq!(user.email, "new@example.com");
        assert_eq!(user.tier, "pro");
    }

    #[tokio::test]
    async fn test_set_tier_unknown_user() {
        let pool = init_in_memory().await.unwrap();
        assert!(!set_user_tier(&pool, "ghost", Tier::Basic, "basic").await.unwrap());
    }

    #[tokio::test]
    async fn test_session_lookup_and_expiry() {
        let pool = init_in_memory().await.unwrap();
        upsert_user(&pool, "u1", "a@example.com", None).await.unwrap();
        create_session(&pool, "live", "u1", None).await.unwrap();
        create_session(&pool, "stale", "u1", Some(now() - Duration::hours(1))).await.unwrap();

        let user = find_session_user(&pool, "live", now()).await.unwrap();
        assert_eq!(user, Some(SessionUser { id: "u1".into(), email: "a@example.com".into() }));

        assert!(find_session_user(&pool, "stale", now()).await.unwrap().is_none());
        assert!(find_session_user(&pool, "missing", now()).await.unwrap().is_none());
    }
}
