//! # `taskminder`
//!
//! Per-user tasks and standalone reminders with local due-date
//! notifications, live task feeds and a filterable list view model.

pub mod activities;
pub mod auth;
pub mod categories;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod error;
pub mod feed;
pub mod logging;
pub mod notifications;
pub mod paths;
pub mod reconciler;
pub mod reminders;
pub mod session;
pub mod stats;
pub mod tasks;
pub mod templates;
pub mod testing;
pub mod traits;
pub mod view_model;

pub use error::{Error, Result};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
