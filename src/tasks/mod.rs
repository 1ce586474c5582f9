//! Task repository.
//!
//! This module provides per-user document storage with:
//! - Tasks with title, description, category, priority, status and due date
//! - Categories, standalone reminders and a preferences document
//! - Realtime feeds delivering the full ordered collection on every change
//! - Pure list filtering (all / pending / done)
//!
//! # Example
//!
//! ```no_run
//! use taskminder::tasks::{SqliteTodoStore, TaskDraft, TodoStore};
//!
//! # async fn demo() -> taskminder::error::Result<()> {
//! let store = SqliteTodoStore::new("/tmp/taskminder.db")?;
//!
//! let mut feed = store.subscribe_tasks("local");
//! let id = store.create_task("local", TaskDraft::new("Buy milk")).await?;
//!
//! while let Some(event) = feed.next().await {
//!     println!("{event:?}");
//! }
//! # let _ = id;
//! # Ok(())
//! # }
//! ```

pub mod filter;
pub mod id;
pub mod models;
pub mod store;

pub use filter::{filter_tasks, InvalidFilter, ListFilter};
pub use models::{
    Activity, ActivityKind, Category, CategoryPatch, InvalidActivityKind, InvalidPriority,
    InvalidStatus, Preferences, PreferencesPatch, Priority, Reminder, ReminderDraft, ReminderPatch,
    Status, Task, TaskDraft, TaskPatch, Theme, DEFAULT_CATEGORY_ID,
};
pub use store::{SqliteTodoStore, TodoStore};
