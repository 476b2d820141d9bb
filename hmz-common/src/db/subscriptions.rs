//! Subscription queries

use super::models::Subscription;
use crate::time::{now, to_db_timestamp};
use crate::Result;
use sqlx::SqlitePool;

/// Most recent active subscription for a user
pub async fn active_subscription(pool: &SqlitePool, user_id: &str) -> Result<Option<Subscription>> {
    let subscription = sqlx::query_as::<_, Subscription>(
        r#"
        SELECT id, user_id, status, amount, plan_id, customer_id, created_at
        FROM subscriptions
        WHERE user_id = ? AND status = 'active'
        ORDER BY created_at DESC, id DESC
        LIMIT 1
        "#,
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(subscription)
}

pub async fn insert_subscription(
    pool: &SqlitePool,
    user_id: &str,
    status: &str,
    amount_cents: i64,
    plan_id: Option<&str>,
) -> Result<i64> {
    let result = sqlx::query(
        "INSERT INTO subscriptions (user_id, status, amount, plan_id, created_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(user_id)
    .bind(status)
    .bind(amount_cents)
    .bind(plan_id)
    .bind(to_db_timestamp(now()))
    .execute(pool)
    .await?;

    Ok(result.last_insert_rowid())
}
