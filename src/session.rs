//! Signed-in session state and its lifecycle.
//!
//! A [`Session`] exists only while somebody is signed in. It carries the
//! identity, the user's preferences and the notification scheduler for
//! that sign-in. [`SessionManager`] creates it on sign-in or sign-up and
//! drops it on sign-out.

use crate::activities;
use crate::auth::{Identity, RegistrationForm, SignInForm};
use crate::categories;
use crate::error::Result;
use crate::notifications::NotificationScheduler;
use crate::tasks::models::{Activity, ActivityKind, Preferences, PreferencesPatch};
use crate::tasks::store::TodoStore;
use crate::traits::{IdentityProvider, Notifier};
use std::sync::Arc;
use tokio::sync::watch;

/// Everything scoped to one signed-in user.
#[derive(Debug)]
pub struct Session {
    identity: Identity,
    preferences: Preferences,
    scheduler: Arc<NotificationScheduler>,
}

impl Session {
    /// Assemble a session from already-loaded parts.
    #[must_use]
    pub fn new(
        identity: Identity,
        preferences: Preferences,
        scheduler: Arc<NotificationScheduler>,
    ) -> Self {
        Self { identity, preferences, scheduler }
    }

    /// Load the user's preferences and open a session with a fresh scheduler.
    ///
    /// # Errors
    ///
    /// Returns an error if the preferences cannot be read.
    pub async fn start(
        store: &dyn TodoStore,
        notifier: Arc<dyn Notifier>,
        identity: Identity,
    ) -> Result<Self> {
        let preferences = store.get_preferences(&identity.uid).await?;
        tracing::info!(user_id = %identity.uid, "session started");
        Ok(Self::new(identity, preferences, Arc::new(NotificationScheduler::new(notifier))))
    }

    /// The signed-in identity.
    #[must_use]
    pub const fn identity(&self) -> &Identity {
        &self.identity
    }

    /// The user ID every document is stored under.
    #[must_use]
    pub fn user_id(&self) -> &str {
        &self.identity.uid
    }

    /// The user's preferences as last read or pushed.
    #[must_use]
    pub const fn preferences(&self) -> &Preferences {
        &self.preferences
    }

    /// Replace the cached preferences, e.g. from a feed snapshot.
    pub fn set_preferences(&mut self, preferences: Preferences) {
        self.preferences = preferences;
    }

    /// The scheduler for this session.
    #[must_use]
    pub fn scheduler(&self) -> &NotificationScheduler {
        &self.scheduler
    }
}

/// Owns the current [`Session`] and follows the identity service.
pub struct SessionManager {
    provider: Arc<dyn IdentityProvider>,
    store: Arc<dyn TodoStore>,
    notifier: Arc<dyn Notifier>,
    current: Option<Session>,
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager").field("current", &self.current).finish_non_exhaustive()
    }
}

impl SessionManager {
    /// Create a manager with nobody signed in.
    #[must_use]
    pub fn new(
        provider: Arc<dyn IdentityProvider>,
        store: Arc<dyn TodoStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self { provider, store, notifier, current: None }
    }

    /// The active session, if somebody is signed in.
    #[must_use]
    pub const fn current(&self) -> Option<&Session> {
        self.current.as_ref()
    }

    /// Follow identity changes pushed by the provider.
    #[must_use]
    pub fn watch_identity(&self) -> watch::Receiver<Option<Identity>> {
        self.provider.watch_identity()
    }

    async fn open(&mut self, identity: Identity) -> Result<&Session> {
        let session = Session::start(self.store.as_ref(), Arc::clone(&self.notifier), identity).await?;
        Ok(&*self.current.insert(session))
    }

    /// Register an account, write its defaults and open a session.
    ///
    /// # Errors
    ///
    /// Returns a validation error before contacting the provider, or the
    /// provider's [`crate::auth::AuthError`].
    #[tracing::instrument(skip(self, form), fields(email = %form.email))]
    pub async fn sign_up(&mut self, form: &RegistrationForm) -> Result<&Session> {
        let credentials = form.validate()?;
        let display_name = form.display_name.trim();
        let identity = self.provider.sign_up(&credentials, display_name).await?;

        categories::seed_defaults(self.store.as_ref(), &identity.uid).await?;
        if !display_name.is_empty() {
            let patch = PreferencesPatch {
                display_name: Some(display_name.to_string()),
                ..PreferencesPatch::default()
            };
            self.store.update_preferences(&identity.uid, patch).await?;
        }

        self.open(identity).await
    }

    /// Sign in and open a session.
    ///
    /// # Errors
    ///
    /// Returns a validation error before contacting the provider, or the
    /// provider's [`crate::auth::AuthError`].
    #[tracing::instrument(skip(self, form), fields(email = %form.email))]
    pub async fn sign_in(&mut self, form: &SignInForm) -> Result<&Session> {
        let credentials = form.validate()?;
        let identity = self.provider.sign_in(&credentials).await?;
        self.open(identity).await
    }

    /// Sign out and drop the session.
    ///
    /// Scheduled notifications are left in place.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider cannot be reached; the session is
    /// kept in that case.
    pub async fn sign_out(&mut self) -> Result<()> {
        self.provider.sign_out().await?;
        if let Some(session) = self.current.take() {
            tracing::info!(user_id = %session.user_id(), "session ended");
        }
        Ok(())
    }

    /// Apply an identity pushed by the provider.
    ///
    /// `None` tears the session down; a different identity replaces it.
    ///
    /// # Errors
    ///
    /// Returns an error if the new user's preferences cannot be read.
    pub async fn follow(&mut self, identity: Option<Identity>) -> Result<Option<&Session>> {
        match identity {
            None => {
                self.current = None;
                Ok(None)
            }
            Some(identity) if self.current.as_ref().is_some_and(|s| s.identity == identity) => {
                Ok(self.current.as_ref())
            }
            Some(identity) => self.open(identity).await.map(Some),
        }
    }

    /// Merge and persist a preferences change for the signed-in user.
    ///
    /// Returns `Ok(None)` when nobody is signed in.
    ///
    /// # Errors
    ///
    /// Returns an error if the store write fails.
    pub async fn update_preferences(
        &mut self,
        patch: PreferencesPatch,
    ) -> Result<Option<&Preferences>> {
        let Some(session) = self.current.as_mut() else {
            return Ok(None);
        };
        let updated = self.store.update_preferences(session.user_id(), patch).await?;
        session.set_preferences(updated);
        Ok(Some(session.preferences()))
    }

    /// Add an activity for the signed-in user.
    ///
    /// Returns `Ok(None)` when nobody is signed in.
    ///
    /// # Errors
    ///
    /// See [`activities::add_activity`].
    pub async fn add_activity(
        &mut self,
        name: &str,
        kind: Option<ActivityKind>,
    ) -> Result<Option<Activity>> {
        let Some(session) = self.current.as_mut() else {
            return Ok(None);
        };
        activities::add_activity(self.store.as_ref(), session, name, kind).await.map(Some)
    }

    /// Remove one of the signed-in user's activities.
    ///
    /// Returns `false` when nobody is signed in.
    ///
    /// # Errors
    ///
    /// See [`activities::remove_activity`].
    pub async fn remove_activity(&mut self, id: i64) -> Result<bool> {
        let Some(session) = self.current.as_mut() else {
            return Ok(false);
        };
        activities::remove_activity(self.store.as_ref(), session, id).await?;
        Ok(true)
    }
}
