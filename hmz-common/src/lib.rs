//! # HMZ Common Library
//!
//! Shared code for the HMZ humanizer services including:
//! - Database schema, models and queries
//! - Stream event types and SSE frame encoding
//! - Subscription tiers and word limits
//! - Configuration loading
//! - Text and time utilities

pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod sse;
pub mod text;
pub mod tier;
pub mod time;

pub use error::{Error, Result};
pub use events::StreamEvent;
pub use tier::{Tier, TierLimits};
