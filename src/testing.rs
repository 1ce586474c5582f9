//! Testing utilities and mock implementations.
//!
//! These types are provided for use in tests. They may appear unused in
//! the library itself but are consumed by unit and integration tests.

#![allow(dead_code)]

use crate::auth::{AuthError, Credentials, Identity};
use crate::error::{Error, Result};
use crate::feed::Subscription;
use crate::tasks::models::{
    Category, CategoryPatch, Preferences, PreferencesPatch, Reminder, ReminderDraft,
    ReminderPatch, Task, TaskDraft, TaskPatch,
};
use crate::tasks::store::TodoStore;
use crate::traits::{
    IdentityProvider, NotificationHandle, NotificationRequest, Notifier, PermissionStatus,
};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::watch;

/// Shared, ordered record of calls across several mocks.
pub type CallLog = Arc<Mutex<Vec<String>>>;

/// Create an empty call log.
#[must_use]
pub fn call_log() -> CallLog {
    Arc::default()
}

fn record(log: Option<&CallLog>, entry: String) {
    if let Some(log) = log {
        log.lock().unwrap_or_else(PoisonError::into_inner).push(entry);
    }
}

#[derive(Debug, Default)]
struct NotifierState {
    scheduled: Vec<NotificationRequest>,
    handles: Vec<NotificationHandle>,
    live: Vec<NotificationHandle>,
    cancelled: Vec<NotificationHandle>,
    fail_next_cancel: bool,
    fail_schedules: bool,
}

/// A mock notification platform for testing.
///
/// Grants permission, records every request and tracks which handles are
/// still live.
#[derive(Debug, Default)]
pub struct MockNotifier {
    state: Mutex<NotifierState>,
    permission_requests: AtomicUsize,
    next_id: AtomicU64,
    log: Option<CallLog>,
}

impl MockNotifier {
    /// Create a new mock notifier.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock notifier that appends its calls to `log`.
    #[must_use]
    pub fn with_log(log: CallLog) -> Self {
        Self { log: Some(log), ..Self::default() }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, NotifierState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Every request scheduled so far, in order.
    #[must_use]
    pub fn scheduled(&self) -> Vec<NotificationRequest> {
        self.state().scheduled.clone()
    }

    /// Every handle issued so far, in order.
    #[must_use]
    pub fn issued_handles(&self) -> Vec<NotificationHandle> {
        self.state().handles.clone()
    }

    /// Handles scheduled and not yet cancelled.
    #[must_use]
    pub fn live_handles(&self) -> Vec<NotificationHandle> {
        self.state().live.clone()
    }

    /// Every cancel call that reached the platform, in order.
    #[must_use]
    pub fn cancelled(&self) -> Vec<NotificationHandle> {
        self.state().cancelled.clone()
    }

    /// How many times permission was requested.
    #[must_use]
    pub fn permission_requests(&self) -> usize {
        self.permission_requests.load(Ordering::SeqCst)
    }

    /// Make the next cancel call fail.
    pub fn fail_next_cancel(&self) {
        self.state().fail_next_cancel = true;
    }

    /// Issue handles from `mock-0` again, like a platform that recycles
    /// identifiers.
    pub fn restart_ids(&self) {
        self.next_id.store(0, Ordering::SeqCst);
    }

    /// Make every schedule call fail until switched off.
    pub fn fail_schedules(&self, fail: bool) {
        self.state().fail_schedules = fail;
    }
}

#[async_trait]
impl Notifier for MockNotifier {
    async fn request_permission(&self) -> Result<PermissionStatus> {
        self.permission_requests.fetch_add(1, Ordering::SeqCst);
        Ok(PermissionStatus::Granted)
    }

    async fn schedule_once(&self, request: NotificationRequest) -> Result<NotificationHandle> {
        let mut state = self.state();
        if state.fail_schedules {
            return Err(Error::Scheduling("mock platform rejected the request".into()));
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let handle = NotificationHandle::new(format!("mock-{id}"));
        record(self.log.as_ref(), format!("notifier.schedule:{handle}"));
        state.scheduled.push(request);
        state.handles.push(handle.clone());
        state.live.push(handle.clone());
        drop(state);
        Ok(handle)
    }

    async fn cancel(&self, handle: &NotificationHandle) -> Result<()> {
        let mut state = self.state();
        if state.fail_next_cancel {
            state.fail_next_cancel = false;
            return Err(Error::Scheduling("mock platform failed to cancel".into()));
        }
        record(self.log.as_ref(), format!("notifier.cancel:{handle}"));
        state.cancelled.push(handle.clone());
        state.live.retain(|h| h != handle);
        drop(state);
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FailureMode {
    PermissionDenied,
    Platform,
}

/// A notification platform that always fails, for testing error paths.
#[derive(Debug)]
pub struct FailingNotifier {
    mode: FailureMode,
    permission_requests: AtomicUsize,
}

impl FailingNotifier {
    /// A platform where the user refuses notifications.
    #[must_use]
    pub const fn permission_denied() -> Self {
        Self { mode: FailureMode::PermissionDenied, permission_requests: AtomicUsize::new(0) }
    }

    /// A platform that grants permission but rejects every call.
    #[must_use]
    pub const fn platform_error() -> Self {
        Self { mode: FailureMode::Platform, permission_requests: AtomicUsize::new(0) }
    }

    /// How many times permission was requested.
    #[must_use]
    pub fn permission_requests(&self) -> usize {
        self.permission_requests.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Notifier for FailingNotifier {
    async fn request_permission(&self) -> Result<PermissionStatus> {
        self.permission_requests.fetch_add(1, Ordering::SeqCst);
        Ok(match self.mode {
            FailureMode::PermissionDenied => PermissionStatus::Denied,
            FailureMode::Platform => PermissionStatus::Granted,
        })
    }

    async fn schedule_once(&self, _request: NotificationRequest) -> Result<NotificationHandle> {
        Err(Error::Scheduling("platform unavailable".into()))
    }

    async fn cancel(&self, _handle: &NotificationHandle) -> Result<()> {
        Err(Error::Scheduling("platform unavailable".into()))
    }
}

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap());

/// Minimum password length accepted by [`MockIdentityProvider`].
pub const MIN_PASSWORD_LEN: usize = 6;

/// An in-memory identity service for testing.
#[derive(Debug)]
pub struct MockIdentityProvider {
    accounts: Mutex<HashMap<String, (String, Identity)>>,
    current: watch::Sender<Option<Identity>>,
    next_uid: AtomicU64,
    offline: AtomicBool,
}

impl Default for MockIdentityProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockIdentityProvider {
    /// Create an identity service with no accounts and nobody signed in.
    #[must_use]
    pub fn new() -> Self {
        let (current, _) = watch::channel(None);
        Self {
            accounts: Mutex::new(HashMap::new()),
            current,
            next_uid: AtomicU64::new(1),
            offline: AtomicBool::new(false),
        }
    }

    /// Simulate losing the connection to the service.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Push an identity change as if it came from another device.
    pub fn push_identity(&self, identity: Option<Identity>) {
        self.current.send_replace(identity);
    }

    fn check_online(&self) -> Result<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(AuthError::Network("mock service offline".into()).into());
        }
        Ok(())
    }
}

#[async_trait]
impl IdentityProvider for MockIdentityProvider {
    async fn sign_up(&self, credentials: &Credentials, display_name: &str) -> Result<Identity> {
        self.check_online()?;
        if !EMAIL_RE.is_match(&credentials.email) {
            return Err(AuthError::InvalidEmail.into());
        }
        if credentials.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AuthError::WeakPassword.into());
        }

        let mut accounts = self.accounts.lock().unwrap_or_else(PoisonError::into_inner);
        if accounts.contains_key(&credentials.email) {
            return Err(AuthError::EmailInUse.into());
        }
        let identity = Identity {
            uid: format!("uid-{}", self.next_uid.fetch_add(1, Ordering::SeqCst)),
            email: credentials.email.clone(),
            display_name: display_name.to_string(),
        };
        accounts
            .insert(credentials.email.clone(), (credentials.password.clone(), identity.clone()));
        drop(accounts);

        self.current.send_replace(Some(identity.clone()));
        Ok(identity)
    }

    async fn sign_in(&self, credentials: &Credentials) -> Result<Identity> {
        self.check_online()?;
        let identity = {
            let accounts = self.accounts.lock().unwrap_or_else(PoisonError::into_inner);
            match accounts.get(&credentials.email) {
                Some((password, identity)) if *password == credentials.password => {
                    identity.clone()
                }
                _ => return Err(AuthError::InvalidCredentials.into()),
            }
        };
        self.current.send_replace(Some(identity.clone()));
        Ok(identity)
    }

    async fn sign_out(&self) -> Result<()> {
        self.check_online()?;
        self.current.send_replace(None);
        Ok(())
    }

    fn watch_identity(&self) -> watch::Receiver<Option<Identity>> {
        self.current.subscribe()
    }
}

/// Store operations that [`FlakyStore`] can make fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    /// `create_task`
    CreateTask,
    /// `update_task` (and therefore `toggle_task_status`)
    UpdateTask,
    /// `delete_task`
    DeleteTask,
    /// `create_reminder`
    CreateReminder,
    /// `update_reminder`
    UpdateReminder,
    /// `delete_reminder`
    DeleteReminder,
    /// `list_categories`
    ListCategories,
    /// `get_preferences`
    GetPreferences,
    /// `update_preferences`
    UpdatePreferences,
}

/// A store wrapper that injects transport failures and records writes.
#[derive(Debug)]
pub struct FlakyStore<S> {
    inner: S,
    failures: Mutex<HashMap<StoreOp, usize>>,
    log: Option<CallLog>,
}

impl<S: TodoStore> FlakyStore<S> {
    /// Wrap a store; nothing fails until [`FlakyStore::fail_next`] is called.
    #[must_use]
    pub fn new(inner: S) -> Self {
        Self { inner, failures: Mutex::new(HashMap::new()), log: None }
    }

    /// Wrap a store and append its write calls to `log`.
    #[must_use]
    pub fn with_log(inner: S, log: CallLog) -> Self {
        Self { log: Some(log), ..Self::new(inner) }
    }

    /// Make the next `times` calls of `op` fail with a transport error.
    pub fn fail_next(&self, op: StoreOp, times: usize) {
        *self.failures.lock().unwrap_or_else(PoisonError::into_inner).entry(op).or_default() +=
            times;
    }

    /// The wrapped store.
    pub const fn inner(&self) -> &S {
        &self.inner
    }

    fn check(&self, op: StoreOp) -> Result<()> {
        let mut failures = self.failures.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(remaining) = failures.get_mut(&op) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(Error::Transport(format!("injected failure in {op:?}")));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl<S: TodoStore> TodoStore for FlakyStore<S> {
    fn subscribe_tasks(&self, user_id: &str) -> Subscription<Task> {
        self.inner.subscribe_tasks(user_id)
    }

    async fn create_task(&self, user_id: &str, draft: TaskDraft) -> Result<String> {
        self.check(StoreOp::CreateTask)?;
        let id = self.inner.create_task(user_id, draft).await?;
        record(self.log.as_ref(), format!("store.create_task:{id}"));
        Ok(id)
    }

    async fn get_task(&self, user_id: &str, id: &str) -> Result<Option<Task>> {
        self.inner.get_task(user_id, id).await
    }

    async fn update_task(&self, user_id: &str, id: &str, patch: TaskPatch) -> Result<()> {
        self.check(StoreOp::UpdateTask)?;
        record(self.log.as_ref(), format!("store.update_task:{id}"));
        self.inner.update_task(user_id, id, patch).await
    }

    async fn delete_task(&self, user_id: &str, id: &str) -> Result<()> {
        self.check(StoreOp::DeleteTask)?;
        record(self.log.as_ref(), format!("store.delete_task:{id}"));
        self.inner.delete_task(user_id, id).await
    }

    fn subscribe_categories(&self, user_id: &str) -> Subscription<Category> {
        self.inner.subscribe_categories(user_id)
    }

    async fn create_category(&self, user_id: &str, name: &str, color: &str) -> Result<Category> {
        self.inner.create_category(user_id, name, color).await
    }

    async fn put_category(&self, user_id: &str, category: &Category) -> Result<()> {
        self.inner.put_category(user_id, category).await
    }

    async fn update_category(&self, user_id: &str, id: &str, patch: CategoryPatch) -> Result<()> {
        self.inner.update_category(user_id, id, patch).await
    }

    async fn delete_category(&self, user_id: &str, id: &str) -> Result<()> {
        self.inner.delete_category(user_id, id).await
    }

    async fn list_categories(&self, user_id: &str) -> Result<Vec<Category>> {
        self.check(StoreOp::ListCategories)?;
        self.inner.list_categories(user_id).await
    }

    fn subscribe_reminders(&self, user_id: &str) -> Subscription<Reminder> {
        self.inner.subscribe_reminders(user_id)
    }

    async fn create_reminder(&self, user_id: &str, draft: ReminderDraft) -> Result<String> {
        self.check(StoreOp::CreateReminder)?;
        let id = self.inner.create_reminder(user_id, draft).await?;
        record(self.log.as_ref(), format!("store.create_reminder:{id}"));
        Ok(id)
    }

    async fn get_reminder(&self, user_id: &str, id: &str) -> Result<Option<Reminder>> {
        self.inner.get_reminder(user_id, id).await
    }

    async fn update_reminder(&self, user_id: &str, id: &str, patch: ReminderPatch) -> Result<()> {
        self.check(StoreOp::UpdateReminder)?;
        record(self.log.as_ref(), format!("store.update_reminder:{id}"));
        self.inner.update_reminder(user_id, id, patch).await
    }

    async fn delete_reminder(&self, user_id: &str, id: &str) -> Result<()> {
        self.check(StoreOp::DeleteReminder)?;
        record(self.log.as_ref(), format!("store.delete_reminder:{id}"));
        self.inner.delete_reminder(user_id, id).await
    }

    async fn get_preferences(&self, user_id: &str) -> Result<Preferences> {
        self.check(StoreOp::GetPreferences)?;
        self.inner.get_preferences(user_id).await
    }

    async fn update_preferences(
        &self,
        user_id: &str,
        patch: PreferencesPatch,
    ) -> Result<Preferences> {
        self.check(StoreOp::UpdatePreferences)?;
        record(self.log.as_ref(), format!("store.update_preferences:{user_id}"));
        self.inner.update_preferences(user_id, patch).await
    }

    fn subscribe_preferences(&self, user_id: &str) -> Subscription<Preferences> {
        self.inner.subscribe_preferences(user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::store::SqliteTodoStore;
    use std::time::Duration;
    use tempfile::TempDir;

    fn request() -> NotificationRequest {
        NotificationRequest { title: "t".into(), body: "b".into(), delay: Duration::from_secs(60) }
    }

    #[tokio::test]
    async fn test_mock_notifier_tracks_live_handles() {
        let notifier = MockNotifier::new();
        let a = notifier.schedule_once(request()).await.unwrap();
        let b = notifier.schedule_once(request()).await.unwrap();

        notifier.cancel(&a).await.unwrap();

        assert_eq!(notifier.live_handles(), vec![b]);
        assert_eq!(notifier.cancelled(), vec![a]);
        assert_eq!(notifier.issued_handles().len(), 2);
    }

    #[tokio::test]
    async fn test_mock_notifier_failures() {
        let notifier = MockNotifier::new();
        notifier.fail_schedules(true);
        assert!(matches!(notifier.schedule_once(request()).await, Err(Error::Scheduling(_))));
        notifier.fail_schedules(false);

        let handle = notifier.schedule_once(request()).await.unwrap();
        notifier.fail_next_cancel();
        assert!(notifier.cancel(&handle).await.is_err());
        notifier.cancel(&handle).await.unwrap();
    }

    #[tokio::test]
    async fn test_call_log_is_shared() {
        let log = call_log();
        let notifier = MockNotifier::with_log(log.clone());
        let handle = notifier.schedule_once(request()).await.unwrap();
        notifier.cancel(&handle).await.unwrap();

        let entries = log.lock().unwrap().clone();
        assert_eq!(entries, vec!["notifier.schedule:mock-0", "notifier.cancel:mock-0"]);
    }

    #[tokio::test]
    async fn test_failing_notifier() {
        let denied = FailingNotifier::permission_denied();
        assert_eq!(denied.request_permission().await.unwrap(), PermissionStatus::Denied);
        assert_eq!(denied.permission_requests(), 1);

        let broken = FailingNotifier::platform_error();
        assert!(broken.schedule_once(request()).await.is_err());
    }

    #[tokio::test]
    async fn test_mock_identity_sign_up_rules() {
        let provider = MockIdentityProvider::new();
        let creds = |email: &str, password: &str| Credentials {
            email: email.to_string(),
            password: password.to_string(),
        };

        let err = provider.sign_up(&creds("not-an-email", "secret1"), "").await.unwrap_err();
        assert!(matches!(err, Error::Auth(AuthError::InvalidEmail)));

        let err = provider.sign_up(&creds("sam@example.com", "123"), "").await.unwrap_err();
        assert!(matches!(err, Error::Auth(AuthError::WeakPassword)));

        provider.sign_up(&creds("sam@example.com", "secret1"), "Sam").await.unwrap();
        let err = provider.sign_up(&creds("sam@example.com", "secret1"), "").await.unwrap_err();
        assert!(matches!(err, Error::Auth(AuthError::EmailInUse)));
    }

    #[tokio::test]
    async fn test_mock_identity_watch_follows_sign_in_and_out() {
        let provider = MockIdentityProvider::new();
        let watcher = provider.watch_identity();
        let creds = Credentials { email: "sam@example.com".into(), password: "secret1".into() };

        provider.sign_up(&creds, "Sam").await.unwrap();
        assert_eq!(watcher.borrow().as_ref().map(|i| i.display_name.clone()), Some("Sam".into()));

        provider.sign_out().await.unwrap();
        assert!(watcher.borrow().is_none());

        let wrong = Credentials { password: "nope".into(), ..creds.clone() };
        assert!(matches!(
            provider.sign_in(&wrong).await,
            Err(Error::Auth(AuthError::InvalidCredentials))
        ));
        provider.sign_in(&creds).await.unwrap();
        assert!(watcher.borrow().is_some());
    }

    #[tokio::test]
    async fn test_mock_identity_offline() {
        let provider = MockIdentityProvider::new();
        provider.set_offline(true);
        let err = provider.sign_out().await.unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_flaky_store_fails_requested_times() {
        let dir = TempDir::new().unwrap();
        let store = FlakyStore::new(SqliteTodoStore::new(dir.path().join("t.db")).unwrap());
        store.fail_next(StoreOp::CreateTask, 1);

        let err = store.create_task("u", TaskDraft::new("A")).await.unwrap_err();
        assert!(matches!(err, Error::Transport(_)));
        store.create_task("u", TaskDraft::new("A")).await.unwrap();
    }
}
