//! Keeps each task's reminder flag and notification handle in sync.
//!
//! Rules:
//! - a handle is stored only while `reminder` is set and the due date was in
//!   the future when it was scheduled;
//! - on edit the old handle is cancelled before the edit is written and
//!   before anything new is scheduled;
//! - on delete the handle is cancelled before the document is removed;
//! - scheduling is best-effort and never blocks persistence.

use crate::categories;
use crate::error::{Error, Result, ValidationError};
use crate::session::Session;
use crate::tasks::models::{Task, TaskDraft, TaskPatch, DEFAULT_CATEGORY_ID};
use crate::tasks::store::TodoStore;
use crate::templates;
use crate::traits::NotificationHandle;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Title of every task reminder notification.
pub const TASK_REMINDER_TITLE: &str = "Task reminder";

/// Why a requested reminder was not scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The task has no due date.
    NoDueDate,
    /// The due date is not in the future.
    DueInPast,
    /// The user turned notifications off in preferences.
    NotificationsDisabled,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::NoDueDate => "no due date",
            Self::DueInPast => "due date is not in the future",
            Self::NotificationsDisabled => "notifications are turned off",
        })
    }
}

/// What happened to a task's reminder after a create, edit or re-arm.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReminderOutcome {
    /// The task does not ask for a reminder.
    NotRequested,
    /// A notification is pending under this handle.
    Scheduled(NotificationHandle),
    /// Nothing was scheduled, for an expected reason.
    Skipped(SkipReason),
    /// Scheduling was attempted and failed; the task was saved anyway.
    Failed(String),
}

impl ReminderOutcome {
    /// The handle stored on the task, if any.
    #[must_use]
    pub const fn handle(&self) -> Option<&NotificationHandle> {
        match self {
            Self::Scheduled(handle) => Some(handle),
            _ => None,
        }
    }

    /// A warning to show the user, for failures only.
    #[must_use]
    pub fn warning(&self) -> Option<String> {
        match self {
            Self::Failed(_) => Some(Error::Scheduling(String::new()).user_message()),
            _ => None,
        }
    }
}

/// Summary of a [`Reconciler::rearm`] pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RearmReport {
    /// Tasks that got a fresh notification.
    pub scheduled: usize,
    /// Tasks whose stale handle was cleared.
    pub cleared: usize,
    /// Tasks whose reminder could not be restored.
    pub failed: usize,
}

/// Creates, edits and deletes tasks while keeping reminders consistent.
#[derive(Clone)]
pub struct Reconciler {
    store: Arc<dyn TodoStore>,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler").finish_non_exhaustive()
    }
}

fn validate_title(title: &str) -> Result<String> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyTitle.into());
    }
    Ok(trimmed.to_string())
}

fn reminder_body(title: &str) -> String {
    templates::render_with_vars("notifications/task_reminder.tera", &[("title", title)])
        .unwrap_or_else(|e| {
            tracing::warn!(error = %e, "falling back to plain reminder text");
            format!("It's time for: {title}")
        })
}

impl Reconciler {
    /// Create a reconciler writing through `store`.
    #[must_use]
    pub fn new(store: Arc<dyn TodoStore>) -> Self {
        Self { store }
    }

    /// The underlying store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn TodoStore> {
        &self.store
    }

    /// Replace a missing or dangling category with the fallback.
    async fn resolve_category(&self, session: &Session, requested: Option<&str>) -> String {
        let requested = requested.unwrap_or(DEFAULT_CATEGORY_ID);
        match self.store.list_categories(session.user_id()).await {
            Ok(categories) => categories::resolve(&categories, requested).id,
            Err(e) => {
                tracing::warn!(error = %e, category = requested, "could not check category");
                requested.to_string()
            }
        }
    }

    /// Schedule a reminder for a task's current fields. Never fails.
    async fn schedule_for(
        session: &Session,
        title: &str,
        due_date: Option<DateTime<Utc>>,
        reminder: bool,
    ) -> ReminderOutcome {
        if !reminder {
            return ReminderOutcome::NotRequested;
        }
        if !session.preferences().notifications_enabled {
            return ReminderOutcome::Skipped(SkipReason::NotificationsDisabled);
        }
        let Some(due_date) = due_date else {
            return ReminderOutcome::Skipped(SkipReason::NoDueDate);
        };

        let body = reminder_body(title);
        match session.scheduler().schedule(TASK_REMINDER_TITLE, &body, due_date).await {
            Ok(Some(handle)) => ReminderOutcome::Scheduled(handle),
            Ok(None) => ReminderOutcome::Skipped(SkipReason::DueInPast),
            Err(e) => {
                tracing::warn!(error = %e, "reminder scheduling failed, task kept without it");
                ReminderOutcome::Failed(e.to_string())
            }
        }
    }

    /// Store a freshly scheduled handle on the task.
    ///
    /// If the write fails the notification is cancelled again so that no
    /// unrecorded notification stays live.
    async fn record(&self, session: &Session, id: &str, outcome: ReminderOutcome) -> ReminderOutcome {
        let ReminderOutcome::Scheduled(handle) = outcome else {
            return outcome;
        };
        let patch = TaskPatch {
            notification_handle: Some(Some(handle.as_str().to_string())),
            ..TaskPatch::default()
        };
        match self.store.update_task(session.user_id(), id, patch).await {
            Ok(()) => ReminderOutcome::Scheduled(handle),
            Err(e) => {
                tracing::warn!(error = %e, %handle, "could not record handle, cancelling it");
                if let Err(cancel_err) = session.scheduler().cancel(Some(&handle)).await {
                    tracing::warn!(error = %cancel_err, %handle, "orphaned notification");
                }
                ReminderOutcome::Failed(e.to_string())
            }
        }
    }

    /// Create a task and schedule its reminder.
    ///
    /// Returns the new task ID and what happened to the reminder.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] for an empty title before any external
    /// call, or the store error if the task could not be created.
    #[tracing::instrument(skip(self, session, draft), fields(user_id = %session.user_id()))]
    pub async fn create_task(
        &self,
        session: &Session,
        mut draft: TaskDraft,
    ) -> Result<(String, ReminderOutcome)> {
        draft.title = validate_title(&draft.title)?;
        draft.category = Some(self.resolve_category(session, draft.category.as_deref()).await);
        draft.priority = draft.priority.or(Some(session.preferences().default_priority));

        let title = draft.title.clone();
        let due_date = draft.due_date;
        let reminder = draft.reminder.unwrap_or(false);

        let id = self.store.create_task(session.user_id(), draft).await?;
        let outcome = Self::schedule_for(session, &title, due_date, reminder).await;
        let outcome = self.record(session, &id, outcome).await;

        tracing::info!(task_id = %id, ?outcome, "task created");
        Ok((id, outcome))
    }

    /// Apply an edit and bring the reminder in line with the result.
    ///
    /// Any previous handle is cancelled before the edit is written and
    /// before a new one is scheduled. If that cancel fails nothing new is
    /// scheduled, and the reminder flag and due date are left as they were
    /// so the stored handle still describes the live notification.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] for an empty title, [`Error::NotFound`]
    /// if the task does not exist, or the store error if the edit could not
    /// be saved.
    #[tracing::instrument(skip(self, session, patch), fields(user_id = %session.user_id()))]
    pub async fn edit_task(
        &self,
        session: &Session,
        id: &str,
        mut patch: TaskPatch,
    ) -> Result<ReminderOutcome> {
        if let Some(title) = &patch.title {
            patch.title = Some(validate_title(title)?);
        }
        if let Some(category) = patch.category.take() {
            patch.category = Some(self.resolve_category(session, Some(&category)).await);
        }

        let current = self
            .store
            .get_task(session.user_id(), id)
            .await?
            .ok_or_else(|| Error::NotFound { collection: "task", id: id.to_string() })?;

        patch.notification_handle = None;
        let old_handle = current.notification_handle.clone();

        if let Err(e) = session.scheduler().cancel_stored(old_handle.as_deref()).await {
            // The old notification is still live, so its task keeps the
            // reminder flag and due date it was scheduled for.
            tracing::warn!(error = %e, "old reminder could not be cancelled, not rescheduling");
            patch.reminder = None;
            patch.due_date = None;
            if !patch.is_empty() {
                self.store.update_task(session.user_id(), id, patch).await?;
            }
            return Ok(ReminderOutcome::Failed(e.to_string()));
        }

        let next = patch.apply_to(&current);
        if old_handle.is_some() {
            patch.notification_handle = Some(None);
        }
        if !patch.is_empty() {
            self.store.update_task(session.user_id(), id, patch).await?;
        }

        let outcome = Self::schedule_for(session, &next.title, next.due_date, next.reminder).await;
        Ok(self.record(session, id, outcome).await)
    }

    /// Cancel a task's reminder and delete it.
    ///
    /// A failed cancel is logged and does not prevent the delete.
    ///
    /// # Errors
    ///
    /// Returns the store error if the task could not be deleted.
    #[tracing::instrument(skip(self, session), fields(user_id = %session.user_id()))]
    pub async fn delete_task(&self, session: &Session, id: &str) -> Result<()> {
        let handle = match self.store.get_task(session.user_id(), id).await {
            Ok(task) => task.and_then(|t| t.notification_handle),
            Err(e) => {
                tracing::warn!(error = %e, "could not read task before delete");
                None
            }
        };
        if let Err(e) = session.scheduler().cancel_stored(handle.as_deref()).await {
            tracing::warn!(error = %e, "reminder could not be cancelled before delete");
        }
        self.store.delete_task(session.user_id(), id).await
    }

    /// Restore reminders after a restart.
    ///
    /// Notifications from a previous process are gone, so every recorded
    /// handle is cancelled and each task with a reminder is scheduled again
    /// if it is still actionable, or has its handle cleared otherwise.
    ///
    /// # Errors
    ///
    /// Returns the store error if clearing a stale handle fails.
    #[tracing::instrument(skip(self, session, tasks), fields(user_id = %session.user_id()))]
    pub async fn rearm(&self, session: &Session, tasks: &[Task]) -> Result<RearmReport> {
        let mut report = RearmReport::default();

        for task in tasks.iter().filter(|t| t.reminder || t.notification_handle.is_some()) {
            if let Err(e) = session.scheduler().cancel_stored(task.notification_handle.as_deref()).await
            {
                tracing::warn!(task_id = %task.id, error = %e, "stale reminder not cancelled");
                report.failed += 1;
                continue;
            }

            let outcome =
                Self::schedule_for(session, &task.title, task.due_date, task.reminder).await;
            match self.record(session, &task.id, outcome).await {
                ReminderOutcome::Scheduled(_) => report.scheduled += 1,
                ReminderOutcome::Failed(_) => report.failed += 1,
                ReminderOutcome::NotRequested | ReminderOutcome::Skipped(_) => {
                    if task.notification_handle.is_some() {
                        let patch =
                            TaskPatch { notification_handle: Some(None), ..TaskPatch::default() };
                        self.store.update_task(session.user_id(), &task.id, patch).await?;
                        report.cleared += 1;
                    }
                }
            }
        }

        tracing::info!(?report, "reminders re-armed");
        Ok(report)
    }
}
