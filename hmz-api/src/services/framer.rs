//! Humanize stream framing
//!
//! A small state machine that hands out the events of one stream in
//! protocol order:
//!
//! ```text
//! Init -> InitialScoreSent -> Streaming -> Completing -> Closed
//!   \___________\________________\____________\-> Errored -> Closed
//! ```
//!
//! Every method validates the transition before producing its frame, so a
//! caller cannot emit `content` before the initial score or anything after
//! the terminal `[DONE]`.

use axum::response::sse::Event;
use hmz_common::sse::{done_event, to_sse_event};
use hmz_common::{StreamEvent, Tier};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramerState {
    Init,
    InitialScoreSent,
    Streaming,
    Completing,
    Errored,
    Closed,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FramerError {
    #[error("Cannot {action} in state {from:?}")]
    InvalidTransition { from: FramerState, action: &'static str },
}

/// One unit written to the event stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Event(StreamEvent),
    /// Terminal `data: [DONE]`
    Done,
}

impl Frame {
    pub fn to_sse_event(&self) -> Event {
        match self {
            Frame::Event(event) => to_sse_event(event),
            Frame::Done => done_event(),
        }
    }

    pub fn event(&self) -> Option<&StreamEvent> {
        match self {
            Frame::Event(event) => Some(event),
            Frame::Done => None,
        }
    }
}

/// Figures carried by the `complete` event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompletionSummary {
    pub final_score: u8,
    pub word_count: u64,
    pub tier: Tier,
    pub monthly_usage: u64,
    pub monthly_limit: u64,
}

#[derive(Debug)]
pub struct Framer {
    request_id: String,
    state: FramerState,
    summary_sent: bool,
}

impl Framer {
    pub fn new(request_id: impl Into<String>) -> Self {
        Self { request_id: request_id.into(), state: FramerState::Init, summary_sent: false }
    }

    pub fn state(&self) -> FramerState {
        self.state
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    fn invalid(&self, action: &'static str) -> FramerError {
        FramerError::InvalidTransition { from: self.state, action }
    }

    /// `Init -> InitialScoreSent`
    pub fn initial_score(&mut self, score: u8) -> Result<Frame, FramerError> {
        if self.state != FramerState::Init {
            return Err(self.invalid("send initial score"));
        }
        self.state = FramerState::InitialScoreSent;
        Ok(Frame::Event(StreamEvent::InitialScore {
            score: score.min(100),
            request_id: self.request_id.clone(),
        }))
    }

    /// `InitialScoreSent | Streaming -> Streaming`
    pub fn content(&mut self, chunk: impl Into<String>) -> Result<Frame, FramerError> {
        match self.state {
            FramerState::InitialScoreSent | FramerState::Streaming => {
                self.state = FramerState::Streaming;
                Ok(Frame::Event(StreamEvent::Content {
                    content: chunk.into(),
                    request_id: self.request_id.clone(),
                }))
            }
            _ => Err(self.invalid("send content")),
        }
    }

    /// `Streaming -> Completing`, once the generation stream has ended
    pub fn begin_completion(&mut self) -> Result<(), FramerError> {
        if self.state != FramerState::Streaming {
            return Err(self.invalid("begin completion"));
        }
        self.state = FramerState::Completing;
        Ok(())
    }

    /// The `complete` event; valid once while `Completing`
    pub fn complete(&mut self, summary: CompletionSummary) -> Result<Frame, FramerError> {
        if self.state != FramerState::Completing || self.summary_sent {
            return Err(self.invalid("send completion"));
        }
        self.summary_sent = true;
        Ok(Frame::Event(StreamEvent::Complete {
            final_score: summary.final_score.min(100),
            word_count: summary.word_count,
            tier: summary.tier,
            monthly_usage: summary.monthly_usage,
            monthly_limit: summary.monthly_limit,
            request_id: self.request_id.clone(),
            success: true,
        }))
    }

    /// Any open state `-> Errored`
    pub fn error(&mut self, message: impl Into<String>) -> Result<Frame, FramerError> {
        if matches!(self.state, FramerState::Errored | FramerState::Closed) || self.summary_sent {
            return Err(self.invalid("send error"));
        }
        self.state = FramerState::Errored;
        Ok(Frame::Event(StreamEvent::Error {
            error: message.into(),
            request_id: self.request_id.clone(),
        }))
    }

    /// `Completing | Errored -> Closed`, producing the terminal frame
    pub fn finish(&mut self) -> Result<Frame, FramerError> {
        let ready = match self.state {
            FramerState::Completing => self.summary_sent,
            FramerState::Errored => true,
            _ => false,
        };
        if !ready {
            return Err(self.invalid("finish"));
        }
        self.state = FramerState::Closed;
        Ok(Frame::Done)
    }
}
