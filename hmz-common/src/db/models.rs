//! Database models

use serde::{Deserialize, Serialize};

/// How a humanize attempt ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum Outcome {
    Success,
    Error,
    Cancelled,
}

/// Stored usage record
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct UsageRecord {
    pub id: i64,
    pub user_id: String,
    pub input_text: String,
    pub output_text: String,
    pub word_count: i64,
    pub outcome: Outcome,
    pub initial_score: Option<i64>,
    pub final_score: Option<i64>,
    pub request_id: Option<String>,
    pub created_at: String,
}

/// Usage record to append
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUsageRecord {
    pub user_id: String,
    pub input_text: String,
    pub output_text: String,
    /// Billed words; zero for failed and cancelled attempts
    pub word_count: u64,
    pub outcome: Outcome,
    pub initial_score: Option<u8>,
    pub final_score: Option<u8>,
    pub request_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct UserProfile {
    pub id: String,
    pub email: String,
    pub full_name: Option<String>,
    pub tier: String,
    pub role: Option<String>,
    pub created_at: String,
}

/// Identity resolved from a bearer session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct SessionUser {
    pub id: String,
    pub email: String,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Subscription {
    pub id: i64,
    pub user_id: String,
    pub status: String,
    /// Monthly price in cents
    pub amount: i64,
    pub plan_id: Option<String>,
    pub customer_id: Option<String>,
    pub created_at: String,
}
