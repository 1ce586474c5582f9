//! Realtime collection feeds.
//!
//! A [`FeedHub`] fans out immutable snapshots of a per-user collection to
//! every live [`Subscription`]. Subscriptions are cancellable async sequences:
//! dropping one (or calling [`Subscription::unsubscribe`]) removes its
//! listener from the hub.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::sync::mpsc;

/// A transport failure reported through a feed. The subscription stays open.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct FeedError {
    /// Description of the failure, for logs.
    pub message: String,
}

impl FeedError {
    /// Create a feed error with the given message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

/// One event delivered to a subscriber.
#[derive(Debug, Clone)]
pub enum FeedEvent<T> {
    /// The full, ordered collection after a change.
    Snapshot(Arc<Vec<T>>),
    /// The feed is currently unavailable.
    Error(FeedError),
}

type Listeners<T> = HashMap<String, Vec<(u64, mpsc::UnboundedSender<FeedEvent<T>>)>>;

#[derive(Debug)]
struct HubInner<T> {
    listeners: Mutex<Listeners<T>>,
    next_id: AtomicU64,
}

impl<T> HubInner<T> {
    fn listeners(&self) -> MutexGuard<'_, Listeners<T>> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Fan-out point for one collection, keyed by user ID.
#[derive(Debug)]
pub struct FeedHub<T> {
    inner: Arc<HubInner<T>>,
}

impl<T> Clone for FeedHub<T> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl<T> Default for FeedHub<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> FeedHub<T> {
    /// Create a hub with no listeners.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(HubInner {
                listeners: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(0),
            }),
        }
    }

    /// Register a new listener for `user_id`.
    ///
    /// The caller is expected to deliver the current snapshot through
    /// [`Subscription::sender`] or [`FeedHub::publish`] right after.
    pub fn subscribe(&self, user_id: &str) -> Subscription<T> {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner.listeners().entry(user_id.to_string()).or_default().push((id, tx.clone()));
        tracing::debug!(user_id, listener = id, "feed listener registered");
        Subscription {
            rx,
            tx,
            user_id: user_id.to_string(),
            id,
            hub: Arc::downgrade(&self.inner),
        }
    }

    /// Number of live listeners for `user_id`.
    #[must_use]
    pub fn listener_count(&self, user_id: &str) -> usize {
        self.inner.listeners().get(user_id).map_or(0, Vec::len)
    }

    /// Send an event to every listener of `user_id`, pruning closed ones.
    fn broadcast(&self, user_id: &str, event: &FeedEvent<T>)
    where
        T: Clone,
    {
        let mut listeners = self.inner.listeners();
        if let Some(entries) = listeners.get_mut(user_id) {
            entries.retain(|(_, tx)| tx.send(event.clone()).is_ok());
            if entries.is_empty() {
                listeners.remove(user_id);
            }
        }
    }

    /// Deliver a new snapshot to every listener of `user_id`.
    pub fn publish(&self, user_id: &str, snapshot: Vec<T>)
    where
        T: Clone,
    {
        self.broadcast(user_id, &FeedEvent::Snapshot(Arc::new(snapshot)));
    }

    /// Report a transport failure to every listener of `user_id`.
    pub fn publish_error(&self, user_id: &str, error: FeedError)
    where
        T: Clone,
    {
        tracing::warn!(user_id, error = %error, "feed error");
        self.broadcast(user_id, &FeedEvent::Error(error));
    }
}

/// A live, cancellable sequence of feed events for one user.
#[derive(Debug)]
pub struct Subscription<T> {
    rx: mpsc::UnboundedReceiver<FeedEvent<T>>,
    tx: mpsc::UnboundedSender<FeedEvent<T>>,
    user_id: String,
    id: u64,
    hub: Weak<HubInner<T>>,
}

impl<T> Subscription<T> {
    /// Wait for the next event.
    ///
    /// Returns `None` once the hub has gone away.
    pub async fn next(&mut self) -> Option<FeedEvent<T>> {
        if self.hub.strong_count() == 0 {
            return self.rx.try_recv().ok();
        }
        self.rx.recv().await
    }

    /// Take an already-delivered event without waiting.
    pub fn try_next(&mut self) -> Option<FeedEvent<T>> {
        self.rx.try_recv().ok()
    }

    /// Sender feeding only this subscription, used to deliver its initial snapshot.
    #[must_use]
    pub fn sender(&self) -> mpsc::UnboundedSender<FeedEvent<T>> {
        self.tx.clone()
    }

    /// The user this subscription watches.
    #[must_use]
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Stop receiving events and release the listener.
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        let Some(inner) = self.hub.upgrade() else {
            return;
        };
        let mut listeners = inner.listeners();
        if let Some(entries) = listeners.get_mut(&self.user_id) {
            entries.retain(|(id, _)| *id != self.id);
            if entries.is_empty() {
                listeners.remove(&self.user_id);
            }
        }
        drop(listeners);
        tracing::debug!(user_id = %self.user_id, listener = self.id, "feed listener released");
    }
}
