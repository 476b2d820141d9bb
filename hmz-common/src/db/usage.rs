//! Usage record queries
//!
//! The `humanizations` table is append-only: rows are inserted once per
//! attempt and never updated or deleted here.

use super::models::{NewUsageRecord, UsageRecord};
use crate::time::{now, to_db_timestamp};
use crate::Result;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

/// Result of a period usage query
///
/// Distinguishes "the user has no records this period" from a real sum, so
/// callers never confuse a fresh account with a failed lookup (which is an
/// `Err`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsageLookup {
    NoRecords,
    Used(u64),
}

impl UsageLookup {
    /// Billed words in the period
    pub fn words(self) -> u64 {
        match self {
            UsageLookup::NoRecords => 0,
            UsageLookup::Used(words) => words,
        }
    }
}

/// Append a usage record, returning its row id
pub async fn insert_usage_record(pool: &SqlitePool, record: &NewUsageRecord) -> Result<i64> {
    let result = sqlx::query(
        r#"
        INSERT INTO humanizations (
            user_id, input_text, output_text, word_count, outcome,
            initial_score, final_score, request_id, created_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&record.user_id)
    .bind(&record.input_text)
    .bind(&record.output_text)
    .bind(record.word_count as i64)
    .bind(record.outcome)
    .bind(record.initial_score.map(i64::from))
    .bind(record.final_score.map(i64::from))
    .bind(&record.request_id)
    .bind(to_db_timestamp(now()))
    .execute(pool)
    .await?;

    Ok(result.last_insert_rowid())
}

/// Sum of billed words for `user_id` since `period_start`
pub async fn period_word_usage(
    pool: &SqlitePool,
    user_id: &str,
    period_start: DateTime<Utc>,
) -> Result<UsageLookup> {
    let (count, total): (i64, i64) = sqlx::query_as(
        r#"
        SELECT COUNT(*), COALESCE(SUM(word_count), 0)
        FROM humanizations
        WHERE user_id = ? AND created_at >= ?
        "#,
    )
    .bind(user_id)
    .bind(to_db_timestamp(period_start))
    .fetch_one(pool)
    .await?;

    if count == 0 {
        Ok(UsageLookup::NoRecords)
    } else {
        Ok(UsageLookup::Used(total.max(0) as u64))
    }
}

/// Most recent records for a user, newest first
pub async fn recent_usage_records(
    pool: &SqlitePool,
    user_id: &str,
    limit: i64,
) -> Result<Vec<UsageRecord>> {
    let records = sqlx::query_as::<_, UsageRecord>(
        r#"
        SELECT id, user_id, input_text, output_text, word_count, outcome,
               initial_score, final_score, request_id, created_at
        FROM humanizations
        WHERE user_id = ?
        ORDER BY created_at DESC, id DESC
        LIMIT ?
        "#,
    )
    .bind(user_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(records)
}

/// Every record for a user, oldest first
pub async fn usage_records_for_user(pool: &SqlitePool, user_id: &str) -> Result<Vec<UsageRecord>> {
    let records = sqlx::query_as::<_, UsageRecord>(
        r#"
        SELECT id, user_id, input_text, output_text, word_count, outcome,
               initial_score, final_score, request_id, created_at
        FROM humanizations
        WHERE user_id = ?
        ORDER BY id ASC
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(records)
}
