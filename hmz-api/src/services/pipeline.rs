//! Humanize pipeline
//!
//! Runs one admitted request end to end: initial score, rewrite, final
//! score, usage record. The streaming variant runs in its own task and
//! hands frames to the HTTP body over a bounded channel; the body owns a
//! cancellation guard, so a client disconnect stops the task at its next
//! suspension point.
//!
//! Whatever happens, exactly one usage record is written per job.

use super::detector::DetectionScorer;
use super::framer::{CompletionSummary, Frame, Framer, FramerError};
use super::quota::Admission;
use super::recorder::{AttemptRecord, FailureSurface, UsageRecorder};
use super::rewriter::Rewriter;
use crate::llm::{CompletionProvider, UpstreamError};
use futures::stream::StreamExt;
use hmz_common::config::LlmConfig;
use hmz_common::time::{now, unix_millis};
use hmz_common::Tier;
use sqlx::SqlitePool;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, Instrument};

/// Frames buffered between the pipeline task and the HTTP body
const FRAME_BUFFER: usize = 32;

const CLIENT_GONE: &str = "client disconnected";

/// Correlation id: `<prefix>_<unix millis>_<9 random chars>`
pub fn new_request_id(prefix: &str) -> String {
    let random = uuid::Uuid::new_v4().simple().to_string();
    format!("{}_{}_{}", prefix, unix_millis(now()), &random[..9])
}

/// One admitted humanize request
#[derive(Debug, Clone)]
pub struct HumanizeJob {
    pub request_id: String,
    pub user_id: String,
    pub input_text: String,
    pub word_count: u64,
    pub dial: u8,
    pub admission: Admission,
}

/// Result of a non-streaming run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteResult {
    pub output_text: String,
    pub word_count: u64,
    pub tier: Tier,
    pub monthly_usage: u64,
    pub monthly_limit: u64,
    pub initial_score: u8,
    pub final_score: u8,
}

/// Why a streaming run stopped early
#[derive(Debug)]
enum Interrupt {
    Cancelled(&'static str),
    Upstream(UpstreamError),
    Framing(FramerError),
}

impl From<UpstreamError> for Interrupt {
    fn from(e: UpstreamError) -> Self {
        Interrupt::Upstream(e)
    }
}

impl From<FramerError> for Interrupt {
    fn from(e: FramerError) -> Self {
        Interrupt::Framing(e)
    }
}

/// Await `fut` unless the request is cancelled first
async fn guarded<F: Future>(cancel: &CancellationToken, fut: F) -> Result<F::Output, Interrupt> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Interrupt::Cancelled(CLIENT_GONE)),
        out = fut => Ok(out),
    }
}

async fn emit(tx: &mpsc::Sender<Frame>, frame: Frame) -> Result<(), Interrupt> {
    tx.send(frame).await.map_err(|_| Interrupt::Cancelled(CLIENT_GONE))
}

#[derive(Clone)]
pub struct Pipeline {
    scorer: DetectionScorer,
    rewriter: Rewriter,
    recorder: UsageRecorder,
}

impl Pipeline {
    pub fn new(provider: Arc<dyn CompletionProvider>, llm: &LlmConfig, db: SqlitePool) -> Self {
        Self {
            scorer: DetectionScorer::new(provider.clone(), llm.scoring_model.clone()),
            rewriter: Rewriter::new(provider, llm.rewrite_model.clone()),
            recorder: UsageRecorder::new(db),
        }
    }

    /// Start a streaming run in its own task
    ///
    /// The receiver yields frames in protocol order and closes once the run
    /// has finished, including its usage record. Cancelling `cancel` (or
    /// dropping the receiver) ends the run with a `cancelled` record.
    pub fn spawn_stream(&self, job: HumanizeJob, cancel: CancellationToken) -> mpsc::Receiver<Frame> {
        let (tx, rx) = mpsc::channel(FRAME_BUFFER);
        let span = info_span!("humanize_stream", request_id = %job.request_id, user_id = %job.user_id);
        let pipeline = self.clone();
        tokio::spawn(async move { pipeline.run_stream(job, tx, cancel).await }.instrument(span));
        rx
    }

    async fn run_stream(self, job: HumanizeJob, tx: mpsc::Sender<Frame>, cancel: CancellationToken) {
        let mut framer = Framer::new(job.request_id.clone());
        let mut attempt = AttemptRecord::new(&job.user_id, &job.input_text, &job.request_id);

        match self.drive(&job, &mut framer, &mut attempt, &tx, &cancel).await {
            Ok(()) => info!("Stream completed successfully"),
            Err(Interrupt::Cancelled(reason)) => {
                info!("Stream cancelled: {}", reason);
                self.recorder.record(attempt.cancelled(reason)).await;
            }
            Err(Interrupt::Upstream(e)) => {
                self.fail_stream(&mut framer, &attempt, &tx, e.user_message(), e.to_string()).await
            }
            Err(Interrupt::Framing(e)) => {
                self.fail_stream(&mut framer, &attempt, &tx, "Streaming failed", e.to_string()).await
            }
        }
    }

    /// Send the `error` frame and `[DONE]` if still possible, then record
    async fn fail_stream(
        &self,
        framer: &mut Framer,
        attempt: &AttemptRecord,
        tx: &mpsc::Sender<Frame>,
        client_message: &str,
        detail: String,
    ) {
        error!("Streaming error: {}", detail);

        if let Ok(frame) = framer.error(client_message) {
            if tx.send(frame).await.is_ok() {
                if let Ok(done) = framer.finish() {
                    let _ = tx.send(done).await;
                }
            }
        }
        self.recorder.record(attempt.failure(FailureSurface::Stream, &detail)).await;
    }

    async fn drive(
        &self,
        job: &HumanizeJob,
        framer: &mut Framer,
        attempt: &mut AttemptRecord,
        tx: &mpsc::Sender<Frame>,
        cancel: &CancellationToken,
    ) -> Result<(), Interrupt> {
        let initial_score = guarded(cancel, self.scorer.score(&job.input_text)).await?;
        debug!("Initial detection score: {}%", initial_score);
        attempt.initial_score = Some(initial_score);
        emit(tx, framer.initial_score(initial_score)?).await?;

        let mut chunks = guarded(cancel, self.rewriter.stream(&job.input_text, job.dial)).await??;
        let mut output = String::new();
        while let Some(chunk) = guarded(cancel, chunks.next()).await? {
            let chunk = chunk?;
            output.push_str(&chunk);
            emit(tx, framer.content(chunk)?).await?;
        }
        // Release the upstream connection before the final scoring call
        drop(chunks);
        debug!("Rewrite stream ended, {} chars", output.len());

        if output.trim().is_empty() {
            return Err(UpstreamError::EmptyOutput.into());
        }

        framer.begin_completion()?;
        let final_score = guarded(cancel, self.scorer.score(&output)).await?;
        debug!("Final detection score: {}%", final_score);

        let complete = framer.complete(CompletionSummary {
            final_score,
            word_count: job.word_count,
            tier: job.admission.tier,
            monthly_usage: job.admission.usage_after(job.word_count),
            monthly_limit: job.admission.limits.per_month,
        })?;
        let done = framer.finish()?;

        self.recorder.record(attempt.success(output, job.word_count, final_score)).await;

        // Recorded; a client that leaves now changes nothing
        if tx.send(complete).await.is_ok() {
            let _ = tx.send(done).await;
        }
        Ok(())
    }

    /// Non-streaming run; records its own outcome before returning
    pub async fn run_once(&self, job: &HumanizeJob) -> Result<RewriteResult, UpstreamError> {
        let mut attempt = AttemptRecord::new(&job.user_id, &job.input_text, &job.request_id);

        let initial_score = self.scorer.score(&job.input_text).await;
        attempt.initial_score = Some(initial_score);

        let output = match self.rewriter.rewrite(&job.input_text, job.dial).await {
            Ok(output) => output,
            Err(e) => {
                error!("Rewrite failed: {}", e);
                self.recorder.record(attempt.failure(FailureSurface::Request, &e.to_string())).await;
                return Err(e);
            }
        };

        let final_score = self.scorer.score(&output).await;
        self.recorder
            .record(attempt.success(output.clone(), job.word_count, final_score))
            .await;

        Ok(RewriteResult {
            output_text: output,
            word_count: job.word_count,
            tier: job.admission.tier,
            monthly_usage: job.admission.usage_after(job.word_count),
            monthly_limit: job.admission.limits.per_month,
            initial_score,
            final_score,
        })
    }
}
