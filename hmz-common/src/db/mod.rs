//! Database models and queries

pub mod init;
pub mod models;
pub mod subscriptions;
pub mod usage;
pub mod users;

pub use init::*;
pub use models::*;
pub use usage::UsageLookup;
