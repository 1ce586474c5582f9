//! Standalone reminders: a title and a fire time, independent of any task.
//!
//! The same rules as task reminders apply. The document is written first,
//! a notification is scheduled for it, and the handle is recorded back.
//! Old handles are cancelled before rescheduling and before deletion.

use crate::error::{Error, Result, ValidationError};
use crate::reconciler::{RearmReport, ReminderOutcome, SkipReason};
use crate::session::Session;
use crate::tasks::models::{Reminder, ReminderDraft, ReminderPatch};
use crate::tasks::store::TodoStore;
use crate::templates;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Title of every standalone reminder notification.
pub const REMINDER_TITLE: &str = "Reminder";

/// Creates, edits and deletes standalone reminders.
#[derive(Clone)]
pub struct ReminderService {
    store: Arc<dyn TodoStore>,
}

impl std::fmt::Debug for ReminderService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReminderService").finish_non_exhaustive()
    }
}

fn body_for(title: &str) -> String {
    templates::render_with_vars("notifications/reminder.tera", &[("title", title)])
        .unwrap_or_else(|e| {
            tracing::warn!(error = %e, "falling back to plain reminder text");
            format!("Don't forget: {title}")
        })
}

impl ReminderService {
    /// Create a service writing through `store`.
    #[must_use]
    pub fn new(store: Arc<dyn TodoStore>) -> Self {
        Self { store }
    }

    async fn schedule(session: &Session, title: &str, fire_at: DateTime<Utc>) -> ReminderOutcome {
        if !session.preferences().notifications_enabled {
            return ReminderOutcome::Skipped(SkipReason::NotificationsDisabled);
        }
        match session.scheduler().schedule(REMINDER_TITLE, &body_for(title), fire_at).await {
            Ok(Some(handle)) => ReminderOutcome::Scheduled(handle),
            Ok(None) => ReminderOutcome::Skipped(SkipReason::DueInPast),
            Err(e) => {
                tracing::warn!(error = %e, "reminder scheduling failed");
                ReminderOutcome::Failed(e.to_string())
            }
        }
    }

    async fn record(&self, session: &Session, id: &str, outcome: ReminderOutcome) -> ReminderOutcome {
        let ReminderOutcome::Scheduled(handle) = outcome else {
            return outcome;
        };
        let patch = ReminderPatch {
            notification_handle: Some(Some(handle.as_str().to_string())),
            ..ReminderPatch::default()
        };
        match self.store.update_reminder(session.user_id(), id, patch).await {
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

    /// Save a reminder and schedule its notification.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] for an empty title, or the store error.
    #[tracing::instrument(skip(self, session, draft), fields(user_id = %session.user_id()))]
    pub async fn create(
        &self,
        session: &Session,
        mut draft: ReminderDraft,
    ) -> Result<(String, ReminderOutcome)> {
        let title = draft.title.trim().to_string();
        if title.is_empty() {
            return Err(ValidationError::EmptyTitle.into());
        }
        draft.title.clone_from(&title);
        let fire_at = draft.fire_at;

        let id = self.store.create_reminder(session.user_id(), draft).await?;
        let outcome = Self::schedule(session, &title, fire_at).await;
        Ok((id.clone(), self.record(session, &id, outcome).await))
    }

    /// Change a reminder's title or fire time and reschedule it.
    ///
    /// The old notification is cancelled before the edit is written. If that
    /// cancel fails only the title changes and nothing is rescheduled.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] for an empty title, [`Error::NotFound`]
    /// for an unknown reminder, or the store error.
    #[tracing::instrument(skip(self, session, patch), fields(user_id = %session.user_id()))]
    pub async fn edit(
        &self,
        session: &Session,
        id: &str,
        mut patch: ReminderPatch,
    ) -> Result<ReminderOutcome> {
        if let Some(title) = patch.title.as_mut() {
            let trimmed = title.trim().to_string();
            if trimmed.is_empty() {
                return Err(ValidationError::EmptyTitle.into());
            }
            *title = trimmed;
        }

        let current: Reminder = self
            .store
            .get_reminder(session.user_id(), id)
            .await?
            .ok_or_else(|| Error::NotFound { collection: "reminder", id: id.to_string() })?;

        patch.notification_handle = None;
        let title = patch.title.clone().unwrap_or_else(|| current.title.clone());
        let fire_at = patch.fire_at.unwrap_or(current.fire_at);
        let old_handle = current.notification_handle;

        if let Err(e) = session.scheduler().cancel_stored(old_handle.as_deref()).await {
            // Keep the fire time the live notification was scheduled for.
            tracing::warn!(error = %e, "old reminder could not be cancelled, not rescheduling");
            patch.fire_at = None;
            if !patch.is_empty() {
                self.store.update_reminder(session.user_id(), id, patch).await?;
            }
            return Ok(ReminderOutcome::Failed(e.to_string()));
        }

        if old_handle.is_some() {
            patch.notification_handle = Some(None);
        }
        if !patch.is_empty() {
            self.store.update_reminder(session.user_id(), id, patch).await?;
        }

        let outcome = Self::schedule(session, &title, fire_at).await;
        Ok(self.record(session, id, outcome).await)
    }

    /// Cancel a reminder's notification and delete it.
    ///
    /// # Errors
    ///
    /// Returns the store error if the reminder could not be deleted.
    #[tracing::instrument(skip(self, session), fields(user_id = %session.user_id()))]
    pub async fn delete(&self, session: &Session, id: &str) -> Result<()> {
        let handle = match self.store.get_reminder(session.user_id(), id).await {
            Ok(reminder) => reminder.and_then(|r| r.notification_handle),
            Err(e) => {
                tracing::warn!(error = %e, "could not read reminder before delete");
                None
            }
        };
        if let Err(e) = session.scheduler().cancel_stored(handle.as_deref()).await {
            tracing::warn!(error = %e, "notification could not be cancelled before delete");
        }
        self.store.delete_reminder(session.user_id(), id).await
    }

    /// Restore reminder notifications after a restart.
    ///
    /// # Errors
    ///
    /// Returns the store error if clearing a stale handle fails.
    #[tracing::instrument(skip(self, session, reminders), fields(user_id = %session.user_id()))]
    pub async fn rearm(&self, session: &Session, reminders: &[Reminder]) -> Result<RearmReport> {
        let mut report = RearmReport::default();

        for reminder in reminders {
            let stored = reminder.notification_handle.as_deref();
            if let Err(e) = session.scheduler().cancel_stored(stored).await {
                tracing::warn!(reminder_id = %reminder.id, error = %e, "stale handle not cancelled");
                report.failed += 1;
                continue;
            }

            let outcome = Self::schedule(session, &reminder.title, reminder.fire_at).await;
            match self.record(session, &reminder.id, outcome).await {
                ReminderOutcome::Scheduled(_) => report.scheduled += 1,
                ReminderOutcome::Failed(_) => report.failed += 1,
                ReminderOutcome::NotRequested | ReminderOutcome::Skipped(_) => {
                    if stored.is_some() {
                        let clear = ReminderPatch {
                            notification_handle: Some(None),
                            ..ReminderPatch::default()
                        };
                        self.store.update_reminder(session.user_id(), &reminder.id, clear).await?;
                        report.cleared += 1;
                    }
                }
            }
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Identity;
    use crate::notifications::NotificationScheduler;
    use crate::tasks::models::Preferences;
    use crate::tasks::store::SqliteTodoStore;
    use crate::testing::{call_log, CallLog, FlakyStore, MockNotifier, StoreOp};
    use chrono::Duration;
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        store: Arc<FlakyStore<SqliteTodoStore>>,
        notifier: Arc<MockNotifier>,
        log: CallLog,
        service: ReminderService,
        session: Session,
    }

    fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let log = call_log();
        let store = Arc::new(FlakyStore::with_log(
            SqliteTodoStore::new(dir.path().join("t.db")).unwrap(),
            log.clone(),
        ));
        let notifier = Arc::new(MockNotifier::with_log(log.clone()));
        let identity =
            Identity { uid: "u1".into(), email: "u1@example.com".into(), display_name: String::new() };
        let session = Session::new(
            identity,
            Preferences::default(),
            Arc::new(NotificationScheduler::new(notifier.clone())),
        );
        let service = ReminderService::new(store.clone());
        Fixture { _dir: dir, store, notifier, log, service, session }
    }

    fn draft(title: &str, fire_at: DateTime<Utc>) -> ReminderDraft {
        ReminderDraft { title: title.to_string(), fire_at }
    }

    #[tokio::test]
    #[serial_test::serial]
    async fn test_create_writes_store_then_schedules() {
        let f = fixture();
        let fire_at = Utc::now() + Duration::minutes(30);

        let (id, outcome) = f.service.create(&f.session, draft(" Stretch ", fire_at)).await.unwrap();

        let handle = outcome.handle().cloned().unwrap();
        let saved = f.store.get_reminder("u1", &id).await.unwrap().unwrap();
        assert_eq!(saved.title, "Stretch");
        assert_eq!(saved.notification_handle.as_deref(), Some(handle.as_str()));
        assert_eq!(f.notifier.scheduled()[0].body, "Don't forget: Stretch");

        let log = f.log.lock().unwrap().clone();
        assert_eq!(log[0], format!("store.create_reminder:{id}"));
        assert_eq!(log[1], format!("notifier.schedule:{handle}"));
    }

    #[tokio::test]
    async fn test_create_in_past_is_saved_unscheduled() {
        let f = fixture();
        let (id, outcome) = f
            .service
            .create(&f.session, draft("Yesterday", Utc::now() - Duration::days(1)))
            .await
            .unwrap();

        assert_eq!(outcome, ReminderOutcome::Skipped(SkipReason::DueInPast));
        assert!(f.store.get_reminder("u1", &id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_create_rejects_blank_title() {
        let f = fixture();
        let err = f.service.create(&f.session, draft(" ", Utc::now())).await.unwrap_err();
        assert!(matches!(err, Error::Validation(ValidationError::EmptyTitle)));
        assert!(f.log.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_store_failure_schedules_nothing() {
        let f = fixture();
        f.store.fail_next(StoreOp::CreateReminder, 1);

        let err = f
            .service
            .create(&f.session, draft("Call back", Utc::now() + Duration::hours(1)))
            .await
            .unwrap_err();

        assert!(err.is_retryable());
        assert!(f.notifier.scheduled().is_empty());
    }

    #[tokio::test]
    async fn test_edit_reschedules_single_live_handle() {
        let f = fixture();
        let fire_at = Utc::now() + Duration::hours(1);
        let (id, _) = f.service.create(&f.session, draft("Tea", fire_at)).await.unwrap();

        let patch =
            ReminderPatch { fire_at: Some(fire_at + Duration::hours(1)), ..ReminderPatch::default() };
        let outcome = f.service.edit(&f.session, &id, patch).await.unwrap();

        let live = f.notifier.live_handles();
        assert_eq!(live.len(), 1);
        assert_eq!(outcome.handle(), Some(&live[0]));
        let saved = f.store.get_reminder("u1", &id).await.unwrap().unwrap();
        assert_eq!(saved.notification_handle.as_deref(), Some(live[0].as_str()));
    }

    #[tokio::test]
    async fn test_failed_cancel_keeps_fire_time_of_live_handle() {
        let f = fixture();
        let fire_at = Utc::now() + Duration::hours(1);
        let (id, first) = f.service.create(&f.session, draft("Tea", fire_at)).await.unwrap();
        let old = first.handle().cloned().unwrap();

        f.notifier.fail_next_cancel();
        let patch = ReminderPatch {
            title: Some("Green tea".into()),
            fire_at: Some(fire_at + Duration::hours(2)),
            ..ReminderPatch::default()
        };
        let outcome = f.service.edit(&f.session, &id, patch).await.unwrap();

        assert!(matches!(outcome, ReminderOutcome::Failed(_)));
        let saved = f.store.get_reminder("u1", &id).await.unwrap().unwrap();
        assert_eq!(saved.title, "Green tea");
        assert_eq!(saved.fire_at.timestamp_millis(), fire_at.timestamp_millis());
        assert_eq!(saved.notification_handle.as_deref(), Some(old.as_str()));
        assert_eq!(f.notifier.live_handles(), vec![old]);
    }

    #[tokio::test]
    async fn test_edit_into_past_clears_handle() {
        let f = fixture();
        let (id, _) =
            f.service.create(&f.session, draft("Tea", Utc::now() + Duration::hours(1))).await.unwrap();

        let patch = ReminderPatch {
            fire_at: Some(Utc::now() - Duration::hours(1)),
            ..ReminderPatch::default()
        };
        let outcome = f.service.edit(&f.session, &id, patch).await.unwrap();

        assert_eq!(outcome, ReminderOutcome::Skipped(SkipReason::DueInPast));
        assert!(f.notifier.live_handles().is_empty());
        let saved = f.store.get_reminder("u1", &id).await.unwrap().unwrap();
        assert_eq!(saved.notification_handle, None);
    }

    #[tokio::test]
    async fn test_rearm_skips_past_reminders() {
        let f = fixture();
        let future = f
            .store
            .create_reminder("u1", draft("Later", Utc::now() + Duration::hours(3)))
            .await
            .unwrap();
        let past = f
            .store
            .create_reminder("u1", draft("Gone", Utc::now() - Duration::hours(3)))
            .await
            .unwrap();
        let reminders = vec![
            f.store.get_reminder("u1", &future).await.unwrap().unwrap(),
            f.store.get_reminder("u1", &past).await.unwrap().unwrap(),
        ];

        let report = f.service.rearm(&f.session, &reminders).await.unwrap();

        assert_eq!(report, RearmReport { scheduled: 1, cleared: 0, failed: 0 });
        assert_eq!(f.notifier.live_handles().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_cancels_then_deletes() {
        let f = fixture();
        let (id, outcome) =
            f.service.create(&f.session, draft("Tea", Utc::now() + Duration::hours(1))).await.unwrap();
        let handle = outcome.handle().cloned().unwrap();

        f.service.delete(&f.session, &id).await.unwrap();

        let log = f.log.lock().unwrap().clone();
        let n = log.len();
        assert_eq!(log[n - 2], format!("notifier.cancel:{handle}"));
        assert_eq!(log[n - 1], format!("store.delete_reminder:{id}"));
        assert!(f.store.get_reminder("u1", &id).await.unwrap().is_none());
    }
}
