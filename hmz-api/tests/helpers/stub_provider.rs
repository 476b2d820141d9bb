//! Deterministic completion provider
//!
//! Scoring calls (recognised by their fixed system prompt) pop replies from
//! a queue; rewrite calls follow a scripted behaviour. Every request is
//! kept for later assertions.

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use hmz_api::llm::{ChunkStream, CompletionProvider, CompletionRequest, UpstreamError};
use std::collections::VecDeque;
use std::sync::Mutex;

const SCORING_PREFIX: &str = "You are an AI detection analyzer";

/// How the rewrite call behaves
#[derive(Debug, Clone)]
pub enum RewriteScript {
    /// Stream these chunks, then end
    Chunks(Vec<String>),
    /// Stream these chunks, then fail
    FailAfter(Vec<String>, UpstreamError),
    /// Stream these chunks, then never yield again
    HangAfter(Vec<String>),
    /// Refuse to open the stream (and fail the non-streaming call)
    Refuse(UpstreamError),
}

pub struct StubProvider {
    script: RewriteScript,
    score_replies: Mutex<VecDeque<Result<String, UpstreamError>>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl StubProvider {
    pub fn new(script: RewriteScript) -> Self {
        Self {
            script,
            score_replies: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn chunks(chunks: &[&str]) -> Self {
        Self::new(RewriteScript::Chunks(to_strings(chunks)))
    }

    /// Queue scoring replies, consumed in call order; "50" once exhausted
    pub fn with_scores(self, replies: &[&str]) -> Self {
        {
            let mut queue = self.score_replies.lock().unwrap();
            queue.extend(replies.iter().map(|r| Ok(r.to_string())));
        }
        self
    }

    pub fn with_score_error(self, error: UpstreamError) -> Self {
        self.score_replies.lock().unwrap().push_back(Err(error));
        self
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Requests that were rewrite calls (not scoring)
    pub fn rewrite_requests(&self) -> Vec<CompletionRequest> {
        self.requests().into_iter().filter(|r| !is_scoring(r)).collect()
    }

    fn log(&self, request: &CompletionRequest) {
        self.requests.lock().unwrap().push(request.clone());
    }
}

pub fn to_strings(chunks: &[&str]) -> Vec<String> {
    chunks.iter().map(|c| c.to_string()).collect()
}

fn is_scoring(request: &CompletionRequest) -> bool {
    request
        .messages
        .first()
        .map(|m| m.content.starts_with(SCORING_PREFIX))
        .unwrap_or(false)
}

#[async_trait]
impl CompletionProvider for StubProvider {
    fn name(&self) -> &'static str {
        "stub"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, UpstreamError> {
        self.log(request);
        if is_scoring(request) {
            return self
                .score_replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok("50".to_string()));
        }

        match &self.script {
            RewriteScript::Chunks(chunks) | RewriteScript::HangAfter(chunks) => Ok(chunks.concat()),
            RewriteScript::FailAfter(_, error) | RewriteScript::Refuse(error) => Err(error.clone()),
        }
    }

    async fn open_stream(&self, request: &CompletionRequest) -> Result<ChunkStream, UpstreamError> {
        self.log(request);
        let stream = match self.script.clone() {
            RewriteScript::Chunks(chunks) => stream::iter(chunks.into_iter().map(Ok)).boxed(),
            RewriteScript::FailAfter(chunks, error) => stream::iter(chunks.into_iter().map(Ok))
                .chain(stream::once(async move { Err(error) }))
                .boxed(),
            RewriteScript::HangAfter(chunks) => stream::iter(chunks.into_iter().map(Ok))
                .chain(stream::pending())
                .boxed(),
            RewriteScript::Refuse(error) => return Err(error),
        };
        Ok(stream)
    }
}
