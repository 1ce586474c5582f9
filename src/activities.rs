//! The user's own activities, offered as ideas on free days.
//!
//! Activities live in the preferences document. Each one needs a name and a
//! kind, and gets a millisecond timestamp as its ID.

use crate::error::{Error, Result, ValidationError};
use crate::session::Session;
use crate::tasks::models::{Activity, ActivityKind, PreferencesPatch};
use crate::tasks::store::TodoStore;
use chrono::{DateTime, Utc};

/// Build a new activity for a list, stamped with `now`.
///
/// The ID is `now` in milliseconds, moved forward past any ID already in
/// `existing`.
///
/// # Errors
///
/// Returns [`ValidationError::IncompleteActivity`] when the name is blank or
/// no kind was chosen.
pub fn new_activity(
    existing: &[Activity],
    name: &str,
    kind: Option<ActivityKind>,
    now: DateTime<Utc>,
) -> Result<Activity> {
    let name = name.trim();
    let Some(kind) = kind.filter(|_| !name.is_empty()) else {
        return Err(ValidationError::IncompleteActivity.into());
    };

    let mut id = now.timestamp_millis();
    while existing.iter().any(|a| a.id == id) {
        id += 1;
    }
    Ok(Activity { id, name: name.to_string(), kind })
}

/// Append an activity to the session user's preferences.
///
/// # Errors
///
/// Returns [`ValidationError::IncompleteActivity`] before any write, or the
/// store error.
#[tracing::instrument(skip(store, session), fields(user_id = %session.user_id()))]
pub async fn add_activity(
    store: &dyn TodoStore,
    session: &mut Session,
    name: &str,
    kind: Option<ActivityKind>,
) -> Result<Activity> {
    let mut activities = session.preferences().activities.clone();
    let activity = new_activity(&activities, name, kind, Utc::now())?;
    activities.push(activity.clone());

    let patch = PreferencesPatch { activities: Some(activities), ..PreferencesPatch::default() };
    let updated = store.update_preferences(session.user_id(), patch).await?;
    session.set_preferences(updated);
    tracing::info!(activity_id = activity.id, "activity added");
    Ok(activity)
}

/// Remove the activity with `id` from the session user's preferences.
///
/// # Errors
///
/// Returns [`Error::NotFound`] for an unknown ID, or the store error.
#[tracing::instrument(skip(store, session), fields(user_id = %session.user_id()))]
pub async fn remove_activity(store: &dyn TodoStore, session: &mut Session, id: i64) -> Result<()> {
    let mut activities = session.preferences().activities.clone();
    let before = activities.len();
    activities.retain(|a| a.id != id);
    if activities.len() == before {
        return Err(Error::NotFound { collection: "activity", id: id.to_string() });
    }

    let patch = PreferencesPatch { activities: Some(activities), ..PreferencesPatch::default() };
    let updated = store.update_preferences(session.user_id(), patch).await?;
    session.set_preferences(updated);
    Ok(())
}
