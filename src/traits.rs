//! Core traits for testability and abstraction.
//!
//! The notification platform and the identity service sit behind these
//! seams. Production code uses [`crate::notifications::TokioNotifier`];
//! tests use the mocks in [`crate::testing`].

use crate::auth::{Credentials, Identity};
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::watch;

/// Opaque identifier of a scheduled notification, used to cancel it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NotificationHandle(String);

impl NotificationHandle {
    /// Wrap a platform identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The platform identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume the handle, returning the platform identifier.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl std::fmt::Display for NotificationHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for NotificationHandle {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Answer of the platform to a permission request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionStatus {
    /// Notifications may be shown.
    Granted,
    /// The user refused notifications.
    Denied,
}

/// A one-shot local notification to register.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationRequest {
    /// Notification title.
    pub title: String,
    /// Notification body.
    pub body: String,
    /// Time from now until the notification fires. Always at least one second.
    pub delay: Duration,
}

/// Trait for the local notification platform.
///
/// Implementations register exactly one fire event per request and never
/// repeat it.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Ask the user for permission to show notifications.
    ///
    /// # Errors
    ///
    /// Returns an error if the platform cannot be queried.
    async fn request_permission(&self) -> Result<PermissionStatus>;

    /// Register a one-shot notification and return its handle.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::Error::Scheduling`] if the platform rejects it.
    async fn schedule_once(&self, request: NotificationRequest) -> Result<NotificationHandle>;

    /// Cancel a pending notification. Unknown handles are ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if the platform call fails.
    async fn cancel(&self, handle: &NotificationHandle) -> Result<()>;
}

/// Trait for the hosted identity service.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Register a new account and sign it in.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::Error::Auth`] with the provider's reason.
    async fn sign_up(&self, credentials: &Credentials, display_name: &str) -> Result<Identity>;

    /// Sign in to an existing account.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::Error::Auth`] with the provider's reason.
    async fn sign_in(&self, credentials: &Credentials) -> Result<Identity>;

    /// Sign the current identity out.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider cannot be reached.
    async fn sign_out(&self) -> Result<()>;

    /// Follow identity changes. The current value is the signed-in identity.
    fn watch_identity(&self) -> watch::Receiver<Option<Identity>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_display_and_inner() {
        let handle = NotificationHandle::new("local-7");
        assert_eq!(handle.to_string(), "local-7");
        assert_eq!(handle.as_str(), "local-7");
        assert_eq!(handle.into_inner(), "local-7");
    }

    #[test]
    fn test_handle_serializes_as_plain_string() {
        let handle = NotificationHandle::from("abc".to_string());
        assert_eq!(serde_json::to_string(&handle).unwrap(), r#""abc""#);
    }
}
