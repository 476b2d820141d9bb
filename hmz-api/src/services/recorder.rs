//! Usage recording
//!
//! Every admitted attempt appends exactly one record. Failed and cancelled
//! attempts are stored with zero billed words and a sentinel output text so
//! they stay visible without counting against quota.

use hmz_common::db::usage::insert_usage_record;
use hmz_common::db::{NewUsageRecord, Outcome};
use sqlx::SqlitePool;
use tracing::{debug, error};

/// Which surface a failure happened on; selects the sentinel prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureSurface {
    /// Non-streaming endpoint, `ERROR:`
    Request,
    /// Event stream, `STREAM_ERROR:`
    Stream,
}

impl FailureSurface {
    fn prefix(self) -> &'static str {
        match self {
            FailureSurface::Request => "ERROR",
            FailureSurface::Stream => "STREAM_ERROR",
        }
    }
}

/// Facts about one attempt known at admission time
#[derive(Debug, Clone)]
pub struct AttemptRecord {
    pub user_id: String,
    pub input_text: String,
    pub request_id: String,
    pub initial_score: Option<u8>,
}

impl AttemptRecord {
    pub fn new(user_id: impl Into<String>, input_text: impl Into<String>, request_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            input_text: input_text.into(),
            request_id: request_id.into(),
            initial_score: None,
        }
    }

    pub fn success(&self, output_text: String, word_count: u64, final_score: u8) -> NewUsageRecord {
        self.build(output_text, word_count, Outcome::Success, Some(final_score))
    }

    pub fn failure(&self, surface: FailureSurface, message: &str) -> NewUsageRecord {
        let output = format!("{}: {}", surface.prefix(), message);
        self.build(output, 0, Outcome::Error, None)
    }

    pub fn cancelled(&self, reason: &str) -> NewUsageRecord {
        let output = format!("CANCELLED: {}", reason);
        self.build(output, 0, Outcome::Cancelled, None)
    }

    fn build(
        &self,
        output_text: String,
        word_count: u64,
        outcome: Outcome,
        final_score: Option<u8>,
    ) -> NewUsageRecord {
        NewUsageRecord {
            user_id: self.user_id.clone(),
            input_text: self.input_text.clone(),
            output_text,
            word_count,
            outcome,
            initial_score: self.initial_score,
            final_score,
            request_id: Some(self.request_id.clone()),
        }
    }
}

#[derive(Clone)]
pub struct UsageRecorder {
    db: SqlitePool,
}

impl UsageRecorder {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Append a record; failures are logged and swallowed
    pub async fn record(&self, record: NewUsageRecord) -> Option<i64> {
        match insert_usage_record(&self.db, &record).await {
            Ok(id) => {
                debug!(
                    record_id = id,
                    outcome = ?record.outcome,
                    word_count = record.word_count,
                    "Usage recorded"
                );
                Some(id)
            }
            Err(e) => {
                error!(
                    user_id = %record.user_id,
                    outcome = ?record.outcome,
                    "Failed to record usage: {}",
                    e
                );
                None
            }
        }
    }
}
