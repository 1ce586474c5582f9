//! Presentation-ready task list.
//!
//! Merges the realtime task feed with optimistic status toggles and exposes
//! a filtered view. The model moves between three states:
//!
//! ```text
//! Loading --snapshot--> Ready <--snapshot-- Degraded
//!    |                    |                    ^
//!    +--error/timeout-----+------error---------+
//! ```

use crate::error::{Error, Result};
use crate::feed::{FeedEvent, Subscription};
use crate::tasks::filter::{filter_tasks, ListFilter};
use crate::tasks::models::{Status, Task};
use crate::tasks::store::TodoStore;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Why the list is shown as degraded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DegradedReason {
    /// Nothing arrived within the subscribe timeout.
    ConnectionTimedOut,
    /// The feed reported a transport failure.
    FeedError(String),
}

impl std::fmt::Display for DegradedReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ConnectionTimedOut => f.write_str("your tasks could not be loaded in time"),
            Self::FeedError(message) => write!(f, "task updates are unavailable: {message}"),
        }
    }
}

/// Lifecycle state of the list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListState {
    /// Waiting for the first snapshot.
    Loading,
    /// Showing confirmed data (possibly empty).
    Ready,
    /// The feed is unavailable; the last confirmed data is still shown.
    Degraded(DegradedReason),
}

#[derive(Debug, Clone, Copy)]
struct Optimistic {
    status: Status,
    applied_at: Instant,
}

/// Live, filterable task list for one user.
#[derive(Debug)]
pub struct TaskListViewModel {
    feed: Option<Subscription<Task>>,
    state: ListState,
    confirmed: Arc<Vec<Task>>,
    optimistic: HashMap<String, Optimistic>,
    filter: ListFilter,
    deadline: Instant,
    stale_after: Duration,
}

impl TaskListViewModel {
    /// Start in `Loading` on top of a task feed.
    ///
    /// `subscribe_timeout` bounds the wait for the first event;
    /// `stale_after` is how long an unconfirmed toggle may stay pending
    /// before [`TaskListViewModel::stale_ids`] reports it.
    #[must_use]
    pub fn new(feed: Subscription<Task>, subscribe_timeout: Duration, stale_after: Duration) -> Self {
        Self {
            feed: Some(feed),
            state: ListState::Loading,
            confirmed: Arc::default(),
            optimistic: HashMap::new(),
            filter: ListFilter::All,
            deadline: Instant::now() + subscribe_timeout,
            stale_after,
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> &ListState {
        &self.state
    }

    /// Current filter selector.
    #[must_use]
    pub const fn filter(&self) -> ListFilter {
        self.filter
    }

    /// Change the filter selector. The underlying collection is untouched.
    pub fn set_filter(&mut self, filter: ListFilter) {
        self.filter = filter;
    }

    /// Wait for the next feed event and apply it.
    ///
    /// While `Loading` the wait is bounded by the subscribe timeout; when it
    /// runs out the model turns `Degraded` and keeps listening on later calls.
    /// Returns `None` once the feed is closed or disposed.
    pub async fn next_update(&mut self) -> Option<ListState> {
        let feed = self.feed.as_mut()?;
        let event = if self.state == ListState::Loading {
            match tokio::time::timeout_at(self.deadline, feed.next()).await {
                Ok(event) => event,
                Err(_) => {
                    tracing::warn!(user_id = %feed.user_id(), "no task feed event before timeout");
                    self.state = ListState::Degraded(DegradedReason::ConnectionTimedOut);
                    return Some(self.state.clone());
                }
            }
        } else {
            feed.next().await
        };
        self.apply(event?);
        Some(self.state.clone())
    }

    /// Apply one feed event.
    ///
    /// A snapshot replaces the confirmed collection and supersedes every
    /// optimistic change. An error keeps the data and marks the list degraded.
    pub fn apply(&mut self, event: FeedEvent<Task>) {
        match event {
            FeedEvent::Snapshot(tasks) => {
                self.confirmed = tasks;
                self.optimistic.clear();
                if self.state != ListState::Ready {
                    tracing::debug!(from = ?self.state, "task list ready");
                }
                self.state = ListState::Ready;
            }
            FeedEvent::Error(e) => {
                tracing::warn!(error = %e, "task feed degraded");
                self.state = ListState::Degraded(DegradedReason::FeedError(e.message));
            }
        }
    }

    fn effective_status(&self, task: &Task) -> Status {
        self.optimistic.get(&task.id).map_or(task.status, |o| o.status)
    }

    /// Every task with optimistic changes applied, in feed order.
    #[must_use]
    pub fn all_tasks(&self) -> Vec<Task> {
        self.confirmed
            .iter()
            .map(|task| {
                let mut task = task.clone();
                task.status = self.effective_status(&task);
                task
            })
            .collect()
    }

    /// The tasks to display: merged and filtered by the current selector.
    #[must_use]
    pub fn tasks(&self) -> Vec<Task> {
        filter_tasks(&self.all_tasks(), self.filter)
    }

    /// Flip a task's status locally before the store confirms it.
    ///
    /// Returns the status the task had before the flip, or `None` if the
    /// task is not in the list.
    pub fn begin_toggle(&mut self, id: &str) -> Option<Status> {
        let task = self.confirmed.iter().find(|t| t.id == id)?;
        let current = self.effective_status(task);
        self.optimistic.insert(
            id.to_string(),
            Optimistic { status: current.toggled(), applied_at: Instant::now() },
        );
        Some(current)
    }

    /// Drop an optimistic change so the confirmed status shows again.
    pub fn rollback_toggle(&mut self, id: &str) {
        if self.optimistic.remove(id).is_some() {
            tracing::debug!(task_id = %id, "optimistic toggle rolled back");
        }
    }

    /// Toggle a task optimistically and write the change to the store.
    ///
    /// If the write fails the optimistic change is rolled back.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for a task not in the list, or the store
    /// error after rolling back.
    pub async fn toggle(&mut self, store: &dyn TodoStore, user_id: &str, id: &str) -> Result<Status> {
        let previous = self
            .begin_toggle(id)
            .ok_or_else(|| Error::NotFound { collection: "task", id: id.to_string() })?;
        match store.toggle_task_status(user_id, id, previous).await {
            Ok(status) => Ok(status),
            Err(e) => {
                tracing::warn!(task_id = %id, error = %e, "toggle failed, rolling back");
                self.rollback_toggle(id);
                Err(e)
            }
        }
    }

    /// IDs of optimistic changes still unconfirmed after the stale window.
    #[must_use]
    pub fn stale_ids(&self, now: Instant) -> Vec<String> {
        let mut ids: Vec<String> = self
            .optimistic
            .iter()
            .filter(|(_, o)| now.saturating_duration_since(o.applied_at) >= self.stale_after)
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }

    /// Release the feed subscription. Later updates return `None`.
    pub fn dispose(&mut self) {
        if let Some(feed) = self.feed.take() {
            feed.unsubscribe();
        }
    }
}
