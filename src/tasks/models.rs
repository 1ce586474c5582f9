//! Document types stored per user: tasks, categories, reminders and preferences.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Task priority levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Low priority.
    Low,
    /// Medium priority (default).
    #[default]
    Medium,
    /// High priority.
    High,
}

impl Priority {
    /// Parse a priority from a string.
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not a valid priority.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Result<Self, InvalidPriority> {
        match s.to_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            _ => Err(InvalidPriority(s.to_string())),
        }
    }

    /// Get the string representation of the priority.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error when an invalid priority string is provided.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidPriority(pub String);

impl std::fmt::Display for InvalidPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid priority: '{}' (must be one of: low, medium, high)", self.0)
    }
}

impl std::error::Error for InvalidPriority {}

/// Task status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Task still needs doing.
    #[default]
    Todo,
    /// Task has been done.
    Done,
}

impl Status {
    /// Parse a status from a string.
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not a valid status.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Result<Self, InvalidStatus> {
        match s.to_lowercase().as_str() {
            "todo" => Ok(Self::Todo),
            "done" => Ok(Self::Done),
            _ => Err(InvalidStatus(s.to_string())),
        }
    }

    /// Get the string representation of the status.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Todo => "todo",
            Self::Done => "done",
        }
    }

    /// The status a toggle moves to from this one.
    #[must_use]
    pub const fn toggled(self) -> Self {
        match self {
            Self::Todo => Self::Done,
            Self::Done => Self::Todo,
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error when an invalid status string is provided.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidStatus(pub String);

impl std::fmt::Display for InvalidStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid status: '{}' (must be one of: todo, done)", self.0)
    }
}

impl std::error::Error for InvalidStatus {}

/// Category assigned to tasks created without one.
pub const DEFAULT_CATEGORY_ID: &str = "personal";

/// A task owned by a single user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Opaque identifier assigned by the store.
    pub id: String,
    /// Short title describing the task.
    pub title: String,
    /// Free-form details.
    pub description: String,
    /// ID of the category; may refer to a category that no longer exists.
    pub category: String,
    /// Priority level.
    pub priority: Priority,
    /// Current status.
    pub status: Status,
    /// When the task is due, if ever.
    pub due_date: Option<DateTime<Utc>>,
    /// Whether the user asked to be reminded at the due date.
    pub reminder: bool,
    /// Handle of the currently scheduled notification.
    ///
    /// Present only while `reminder` is set and a notification is pending.
    pub notification_handle: Option<String>,
    /// When the store created the task. Never changes.
    pub created_at: DateTime<Utc>,
}

impl Task {
    /// Check if the task is done.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.status == Status::Done
    }
}

/// Fields supplied when creating a task. Absent fields get store defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskDraft {
    /// Short title (required, non-empty).
    pub title: String,
    /// Details; defaults to empty.
    pub description: Option<String>,
    /// Category ID; defaults to [`DEFAULT_CATEGORY_ID`].
    pub category: Option<String>,
    /// Priority; defaults to medium.
    pub priority: Option<Priority>,
    /// Status; defaults to todo.
    pub status: Option<Status>,
    /// Due date.
    pub due_date: Option<DateTime<Utc>>,
    /// Reminder flag; defaults to false.
    pub reminder: Option<bool>,
}

impl TaskDraft {
    /// Start a draft with just a title.
    #[must_use]
    pub fn new(title: impl Into<String>) -> Self {
        Self { title: title.into(), ..Self::default() }
    }

    /// Set the due date.
    #[must_use]
    pub fn due(mut self, due_date: DateTime<Utc>) -> Self {
        self.due_date = Some(due_date);
        self
    }

    /// Ask for a reminder at the due date.
    #[must_use]
    pub fn remind(mut self) -> Self {
        self.reminder = Some(true);
        self
    }

    /// Set the priority.
    #[must_use]
    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    /// Set the category.
    #[must_use]
    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Set the description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Fields that can be updated on a task.
///
/// `None` leaves a field untouched. Nullable fields use a nested option so
/// that `Some(None)` clears them.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TaskPatch {
    /// New title (if Some).
    pub title: Option<String>,
    /// New description (if Some).
    pub description: Option<String>,
    /// New category (if Some).
    pub category: Option<String>,
    /// New priority (if Some).
    pub priority: Option<Priority>,
    /// New status (if Some).
    pub status: Option<Status>,
    /// New due date, or `Some(None)` to clear it.
    pub due_date: Option<Option<DateTime<Utc>>>,
    /// New reminder flag (if Some).
    pub reminder: Option<bool>,
    /// New notification handle, or `Some(None)` to clear it.
    pub notification_handle: Option<Option<String>>,
}

impl TaskPatch {
    /// Check if any fields are set for update.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.category.is_none()
            && self.priority.is_none()
            && self.status.is_none()
            && self.due_date.is_none()
            && self.reminder.is_none()
            && self.notification_handle.is_none()
    }

    /// Return a copy of `task` with this patch merged in.
    #[must_use]
    pub fn apply_to(&self, task: &Task) -> Task {
        let mut next = task.clone();
        if let Some(title) = &self.title {
            next.title.clone_from(title);
        }
        if let Some(description) = &self.description {
            next.description.clone_from(description);
        }
        if let Some(category) = &self.category {
            next.category.clone_from(category);
        }
        if let Some(priority) = self.priority {
            next.priority = priority;
        }
        if let Some(status) = self.status {
            next.status = status;
        }
        if let Some(due_date) = self.due_date {
            next.due_date = due_date;
        }
        if let Some(reminder) = self.reminder {
            next.reminder = reminder;
        }
        if let Some(handle) = &self.notification_handle {
            next.notification_handle.clone_from(handle);
        }
        next
    }
}

/// A user-defined grouping for tasks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    /// Unique identifier.
    pub id: String,
    /// Display name (non-empty).
    pub name: String,
    /// Color token, e.g. `#3B82F6`.
    pub color: String,
}

/// Fields that can be updated on a category.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CategoryPatch {
    /// New name (if Some).
    pub name: Option<String>,
    /// New color (if Some).
    pub color: Option<String>,
}

impl CategoryPatch {
    /// Check if any fields are set for update.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.name.is_none() && self.color.is_none()
    }
}

/// A standalone reminder, independent of any task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reminder {
    /// Unique identifier.
    pub id: String,
    /// What to remind about.
    pub title: String,
    /// When the notification should fire.
    pub fire_at: DateTime<Utc>,
    /// Handle of the pending notification, if one is scheduled.
    pub notification_handle: Option<String>,
    /// When the store created the reminder.
    pub created_at: DateTime<Utc>,
}

/// Fields supplied when creating a standalone reminder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReminderDraft {
    /// What to remind about (required, non-empty).
    pub title: String,
    /// When the notification should fire.
    pub fire_at: DateTime<Utc>,
}

/// Fields that can be updated on a standalone reminder.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReminderPatch {
    /// New title (if Some).
    pub title: Option<String>,
    /// New fire time (if Some).
    pub fire_at: Option<DateTime<Utc>>,
    /// New handle, or `Some(None)` to clear it.
    pub notification_handle: Option<Option<String>>,
}

impl ReminderPatch {
    /// Check if any fields are set for update.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.title.is_none() && self.fire_at.is_none() && self.notification_handle.is_none()
    }
}

/// Color theme of the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    /// Light theme (default).
    #[default]
    Light,
    /// Dark theme.
    Dark,
}

impl Theme {
    /// The other theme.
    #[must_use]
    pub const fn toggled(self) -> Self {
        match self {
            Self::Light => Self::Dark,
            Self::Dark => Self::Light,
        }
    }
}

/// Kind of hobby a user lists in their preferences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityKind {
    /// Resting, unwinding.
    Relaxation,
    /// Reading, courses, practice.
    Learning,
    /// Chores around the house.
    Household,
    /// Physical exercise.
    Sport,
    /// Going out with others.
    Social,
    /// Anything else.
    Other,
}

impl ActivityKind {
    /// Parse an activity kind from a string.
    ///
    /// # Errors
    ///
    /// Returns an error if the string names no known kind.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Result<Self, InvalidActivityKind> {
        match s.to_lowercase().as_str() {
            "relaxation" => Ok(Self::Relaxation),
            "learning" => Ok(Self::Learning),
            "household" => Ok(Self::Household),
            "sport" => Ok(Self::Sport),
            "social" => Ok(Self::Social),
            "other" => Ok(Self::Other),
            _ => Err(InvalidActivityKind(s.to_string())),
        }
    }

    /// Get the string representation of the kind.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Relaxation => "relaxation",
            Self::Learning => "learning",
            Self::Household => "household",
            Self::Sport => "sport",
            Self::Social => "social",
            Self::Other => "other",
        }
    }
}

impl std::fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error when an invalid activity kind string is provided.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidActivityKind(pub String);

impl std::fmt::Display for InvalidActivityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "invalid activity type: '{}' (must be one of: relaxation, learning, household, sport, social, other)",
            self.0
        )
    }
}

impl std::error::Error for InvalidActivityKind {}

/// A hobby the user wants suggested on free days.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Activity {
    /// Identifier unique within the user's list.
    pub id: i64,
    /// Display name.
    pub name: String,
    /// What kind of activity this is.
    pub kind: ActivityKind,
}

/// The per-user settings document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    /// Name shown in the profile.
    pub display_name: String,
    /// Priority preselected for new tasks.
    pub default_priority: Priority,
    /// Whether reminders should schedule notifications at all.
    pub notifications_enabled: bool,
    /// Presentation theme.
    pub theme: Theme,
    /// Hobbies used for suggestions.
    pub activities: Vec<Activity>,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            display_name: String::new(),
            default_priority: Priority::Medium,
            notifications_enabled: true,
            theme: Theme::Light,
            activities: Vec::new(),
        }
    }
}

/// Fields that can be merged into the preferences document.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PreferencesPatch {
    /// New display name (if Some).
    pub display_name: Option<String>,
    /// New default priority (if Some).
    pub default_priority: Option<Priority>,
    /// New notifications flag (if Some).
    pub notifications_enabled: Option<bool>,
    /// New theme (if Some).
    pub theme: Option<Theme>,
    /// Replacement activity list (if Some).
    pub activities: Option<Vec<Activity>>,
}

impl PreferencesPatch {
    /// Merge this patch into `prefs`.
    pub fn apply(&self, prefs: &mut Preferences) {
        if let Some(name) = &self.display_name {
            prefs.display_name.clone_from(name);
        }
        if let Some(priority) = self.default_priority {
            prefs.default_priority = priority;
        }
        if let Some(enabled) = self.notifications_enabled {
            prefs.notifications_enabled = enabled;
        }
        if let Some(theme) = self.theme {
            prefs.theme = theme;
        }
        if let Some(activities) = &self.activities {
            prefs.activities.clone_from(activities);
        }
    }
}
