//! One-shot local notification scheduling.
//!
//! [`NotificationScheduler`] turns a fire time into a delay, asks the
//! platform for permission once, and registers a single fire event.
//! [`TokioNotifier`] is the in-process platform used by the CLI.

use crate::error::{Error, Result};
use crate::tasks::id::random_suffix;
use crate::traits::{NotificationHandle, NotificationRequest, Notifier, PermissionStatus};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::{mpsc, OnceCell};
use tokio::task::JoinHandle;

/// Whole seconds from `now` until `fire_at`.
///
/// Returns `None` when the truncated delay is zero or negative.
#[must_use]
pub fn delay_until(fire_at: DateTime<Utc>, now: DateTime<Utc>) -> Option<Duration> {
    let seconds = (fire_at - now).num_seconds();
    u64::try_from(seconds).ok().filter(|s| *s > 0).map(Duration::from_secs)
}

/// Schedules and cancels one-shot notifications for one session.
pub struct NotificationScheduler {
    notifier: Arc<dyn Notifier>,
    permission: OnceCell<PermissionStatus>,
    cancelled: Mutex<HashSet<NotificationHandle>>,
}

impl std::fmt::Debug for NotificationScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationScheduler")
            .field("permission", &self.permission.get())
            .finish_non_exhaustive()
    }
}

impl NotificationScheduler {
    /// Create a scheduler on top of a notification platform.
    #[must_use]
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self { notifier, permission: OnceCell::new(), cancelled: Mutex::new(HashSet::new()) }
    }

    /// Ask for permission the first time and remember the answer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PermissionDenied`] if the user refused, or the
    /// platform error if the request itself failed.
    pub async fn ensure_permission(&self) -> Result<()> {
        let status = self
            .permission
            .get_or_try_init(|| async {
                let status = self.notifier.request_permission().await?;
                tracing::info!(?status, "notification permission answered");
                Ok::<_, Error>(status)
            })
            .await?;
        match status {
            PermissionStatus::Granted => Ok(()),
            PermissionStatus::Denied => Err(Error::PermissionDenied),
        }
    }

    /// Schedule a notification at `fire_at`.
    ///
    /// Returns `Ok(None)` without touching the platform when `fire_at` is not
    /// at least one whole second in the future.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PermissionDenied`] or [`Error::Scheduling`] when the
    /// platform refuses.
    pub async fn schedule(
        &self,
        title: &str,
        body: &str,
        fire_at: DateTime<Utc>,
    ) -> Result<Option<NotificationHandle>> {
        self.schedule_from(title, body, fire_at, Utc::now()).await
    }

    /// Like [`NotificationScheduler::schedule`] with an explicit current time.
    ///
    /// # Errors
    ///
    /// Same as [`NotificationScheduler::schedule`].
    #[tracing::instrument(skip(self, body))]
    pub async fn schedule_from(
        &self,
        title: &str,
        body: &str,
        fire_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Option<NotificationHandle>> {
        let Some(delay) = delay_until(fire_at, now) else {
            tracing::debug!("fire time is not in the future, nothing scheduled");
            return Ok(None);
        };

        self.ensure_permission().await?;

        let request =
            NotificationRequest { title: title.to_string(), body: body.to_string(), delay };
        let handle = self.notifier.schedule_once(request).await?;
        // A platform may reuse an identifier once it has been cancelled.
        self.cancelled.lock().unwrap_or_else(PoisonError::into_inner).remove(&handle);
        tracing::info!(%handle, delay_secs = delay.as_secs(), "notification scheduled");
        Ok(Some(handle))
    }

    /// Cancel a notification. `None` and repeated cancels are no-ops.
    ///
    /// # Errors
    ///
    /// Returns the platform error if cancellation failed; the handle may then
    /// be cancelled again.
    pub async fn cancel(&self, handle: Option<&NotificationHandle>) -> Result<()> {
        let Some(handle) = handle else {
            return Ok(());
        };

        let first_time = self
            .cancelled
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(handle.clone());
        if !first_time {
            tracing::debug!(%handle, "already cancelled");
            return Ok(());
        }

        if let Err(e) = self.notifier.cancel(handle).await {
            self.cancelled.lock().unwrap_or_else(PoisonError::into_inner).remove(handle);
            return Err(e);
        }
        tracing::info!(%handle, "notification cancelled");
        Ok(())
    }

    /// Cancel a handle stored on a document.
    ///
    /// # Errors
    ///
    /// Same as [`NotificationScheduler::cancel`].
    pub async fn cancel_stored(&self, handle: Option<&str>) -> Result<()> {
        let handle = handle.map(NotificationHandle::new);
        self.cancel(handle.as_ref()).await
    }
}

/// A notification that reached its fire time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveredNotification {
    /// Handle it was scheduled under.
    pub handle: NotificationHandle,
    /// Notification title.
    pub title: String,
    /// Notification body.
    pub body: String,
}

type PendingTimers = Arc<Mutex<HashMap<NotificationHandle, JoinHandle<()>>>>;

/// In-process notifier backed by tokio timers.
///
/// Handles look like `local-<run>-<n>`, where `<run>` is random per
/// notifier, so handles stored by an earlier process never name a timer of
/// this one. Fired notifications are sent to the receiver returned by
/// [`TokioNotifier::new`]. Pending timers are lost when the process exits.
#[derive(Debug)]
pub struct TokioNotifier {
    run: String,
    next_id: AtomicU64,
    pending: PendingTimers,
    delivered: mpsc::UnboundedSender<DeliveredNotification>,
}

impl TokioNotifier {
    /// Create a notifier and the receiver of fired notifications.
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<DeliveredNotification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let notifier = Self {
            run: random_suffix(),
            next_id: AtomicU64::new(1),
            pending: Arc::default(),
            delivered: tx,
        };
        (notifier, rx)
    }

    /// Number of notifications waiting to fire.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

impl Drop for TokioNotifier {
    fn drop(&mut self) {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        for (_, timer) in pending.drain() {
            timer.abort();
        }
    }
}

#[async_trait]
impl Notifier for TokioNotifier {
    async fn request_permission(&self) -> Result<PermissionStatus> {
        Ok(PermissionStatus::Granted)
    }

    async fn schedule_once(&self, request: NotificationRequest) -> Result<NotificationHandle> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let handle = NotificationHandle::new(format!("local-{}-{id}", self.run));

        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        let timers = Arc::clone(&self.pending);
        let delivered = self.delivered.clone();
        let fired = handle.clone();
        let timer = tokio::spawn(async move {
            tokio::time::sleep(request.delay).await;
            timers.lock().unwrap_or_else(PoisonError::into_inner).remove(&fired);
            tracing::info!(handle = %fired, title = %request.title, "notification fired");
            let _ = delivered.send(DeliveredNotification {
                handle: fired,
                title: request.title,
                body: request.body,
            });
        });
        pending.insert(handle.clone(), timer);
        drop(pending);

        Ok(handle)
    }

    async fn cancel(&self, handle: &NotificationHandle) -> Result<()> {
        let timer = self.pending.lock().unwrap_or_else(PoisonError::into_inner).remove(handle);
        if let Some(timer) = timer {
            timer.abort();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FailingNotifier, MockNotifier};
    use chrono::{Duration as ChronoDuration, TimeZone};

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn test_delay_truncates_to_whole_seconds() {
        let now = at(0);
        assert_eq!(delay_until(at(90), now), Some(Duration::from_secs(90)));
        assert_eq!(delay_until(now + ChronoDuration::milliseconds(1500), now), Some(Duration::from_secs(1)));
        assert_eq!(delay_until(now + ChronoDuration::milliseconds(999), now), None);
        assert_eq!(delay_until(now, now), None);
        assert_eq!(delay_until(at(-60), now), None);
    }

    #[tokio::test]
    async fn test_schedule_future_registers_one_event() {
        let notifier = Arc::new(MockNotifier::new());
        let scheduler = NotificationScheduler::new(notifier.clone());

        let handle = scheduler.schedule_from("Task reminder", "Buy milk", at(3600), at(0)).await.unwrap();

        assert!(handle.is_some());
        let scheduled = notifier.scheduled();
        assert_eq!(scheduled.len(), 1);
        assert_eq!(scheduled[0].delay, Duration::from_secs(3600));
        assert_eq!(scheduled[0].body, "Buy milk");
    }

    #[tokio::test]
    async fn test_schedule_past_returns_none_without_platform_call() {
        let notifier = Arc::new(MockNotifier::new());
        let scheduler = NotificationScheduler::new(notifier.clone());

        let handle = scheduler.schedule_from("t", "b", at(-60), at(0)).await.unwrap();

        assert!(handle.is_none());
        assert!(notifier.scheduled().is_empty());
        assert_eq!(notifier.permission_requests(), 0);
    }

    #[tokio::test]
    async fn test_permission_requested_once() {
        let notifier = Arc::new(MockNotifier::new());
        let scheduler = NotificationScheduler::new(notifier.clone());

        scheduler.schedule_from("a", "b", at(60), at(0)).await.unwrap();
        scheduler.schedule_from("c", "d", at(120), at(0)).await.unwrap();

        assert_eq!(notifier.permission_requests(), 1);
    }

    #[tokio::test]
    async fn test_denied_permission_is_remembered() {
        let notifier = Arc::new(FailingNotifier::permission_denied());
        let scheduler = NotificationScheduler::new(notifier.clone());

        let first = scheduler.schedule_from("a", "b", at(60), at(0)).await;
        let second = scheduler.schedule_from("a", "b", at(60), at(0)).await;

        assert!(matches!(first, Err(Error::PermissionDenied)));
        assert!(matches!(second, Err(Error::PermissionDenied)));
        assert_eq!(notifier.permission_requests(), 1);
    }

    #[tokio::test]
    async fn test_platform_error_is_scheduling_error() {
        let scheduler = NotificationScheduler::new(Arc::new(FailingNotifier::platform_error()));
        let result = scheduler.schedule_from("a", "b", at(60), at(0)).await;
        assert!(matches!(result, Err(Error::Scheduling(_))));
    }

    #[tokio::test]
    async fn test_cancel_none_and_twice_are_noops() {
        let notifier = Arc::new(MockNotifier::new());
        let scheduler = NotificationScheduler::new(notifier.clone());
        let handle = scheduler.schedule_from("a", "b", at(60), at(0)).await.unwrap();

        scheduler.cancel(None).await.unwrap();
        scheduler.cancel(handle.as_ref()).await.unwrap();
        scheduler.cancel(handle.as_ref()).await.unwrap();

        assert_eq!(notifier.cancelled().len(), 1);
        assert!(notifier.live_handles().is_empty());
    }

    #[tokio::test]
    async fn test_failed_cancel_can_be_retried() {
        let notifier = Arc::new(MockNotifier::new());
        let scheduler = NotificationScheduler::new(notifier.clone());
        let handle = scheduler.schedule_from("a", "b", at(60), at(0)).await.unwrap();

        notifier.fail_next_cancel();
        assert!(scheduler.cancel(handle.as_ref()).await.is_err());
        scheduler.cancel(handle.as_ref()).await.unwrap();

        assert!(notifier.live_handles().is_empty());
    }

    #[tokio::test]
    async fn test_recycled_handle_is_cancelled_again() {
        let notifier = Arc::new(MockNotifier::new());
        let scheduler = NotificationScheduler::new(notifier.clone());

        let first = scheduler.schedule_from("a", "b", at(60), at(0)).await.unwrap();
        scheduler.cancel(first.as_ref()).await.unwrap();
        notifier.restart_ids();
        let second = scheduler.schedule_from("c", "d", at(60), at(0)).await.unwrap();
        assert_eq!(first, second);

        scheduler.cancel(second.as_ref()).await.unwrap();

        assert_eq!(notifier.cancelled().len(), 2);
        assert!(notifier.live_handles().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokio_notifier_fires_once() {
        let (notifier, mut fired) = TokioNotifier::new();
        let request = NotificationRequest {
            title: "Task reminder".into(),
            body: "Buy milk".into(),
            delay: Duration::from_secs(30),
        };
        let handle = notifier.schedule_once(request).await.unwrap();
        assert_eq!(notifier.pending_count(), 1);

        tokio::time::sleep(Duration::from_secs(31)).await;

        let delivered = fired.recv().await.unwrap();
        assert_eq!(delivered.handle, handle);
        assert_eq!(delivered.body, "Buy milk");
        assert_eq!(notifier.pending_count(), 0);
        assert!(fired.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokio_notifier_cancel_prevents_delivery() {
        let (notifier, mut fired) = TokioNotifier::new();
        let request =
            NotificationRequest { title: "t".into(), body: "b".into(), delay: Duration::from_secs(5) };
        let handle = notifier.schedule_once(request).await.unwrap();

        notifier.cancel(&handle).await.unwrap();
        notifier.cancel(&handle).await.unwrap();
        tokio::time::sleep(Duration::from_secs(10)).await;

        assert_eq!(notifier.pending_count(), 0);
        assert!(fired.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_tokio_notifier_handles_are_unique() {
        let (notifier, _fired) = TokioNotifier::new();
        let make = || NotificationRequest {
            title: "t".into(),
            body: "b".into(),
            delay: Duration::from_secs(60),
        };
        let a = notifier.schedule_once(make()).await.unwrap();
        let b = notifier.schedule_once(make()).await.unwrap();
        assert_ne!(a, b);
        assert!(a.as_str().starts_with("local-"));
    }

    #[tokio::test]
    async fn test_tokio_notifier_handles_differ_between_instances() {
        let (earlier, _a) = TokioNotifier::new();
        let (later, _b) = TokioNotifier::new();
        let make = || NotificationRequest {
            title: "t".into(),
            body: "b".into(),
            delay: Duration::from_secs(60),
        };

        let old = earlier.schedule_once(make()).await.unwrap();
        let new = later.schedule_once(make()).await.unwrap();
        assert_ne!(old, new);

        // Cancelling a handle from another instance leaves this one's timer alone.
        later.cancel(&old).await.unwrap();
        assert_eq!(later.pending_count(), 1);
    }
}
