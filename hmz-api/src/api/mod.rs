//! HTTP API handlers for hmz-api

pub mod auth;
pub mod billing;
pub mod buildinfo;
pub mod health;
pub mod humanize;
pub mod humanize_stream;
pub mod usage;
pub mod webhook;

pub use auth::{authenticate, AuthUser};
pub use billing::{checkout_redirect, portal_redirect};
pub use buildinfo::get_build_info;
pub use health::health_routes;
pub use humanize::{humanize, HumanizeRequest, HumanizeResponse};
pub use humanize_stream::humanize_stream;
pub use usage::get_usage;
pub use webhook::payment_webhook;
