//! Error types for `taskminder`.

use crate::auth::AuthError;

/// Errors that can occur while managing tasks, reminders and sessions.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A JSON encoding or decoding error occurred.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A YAML parsing error occurred.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A `SQLite` database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// User input was rejected before reaching any external service.
    #[error("Invalid input: {0}")]
    Validation(#[from] ValidationError),

    /// The document store or network could not be reached.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The notification platform refused or failed to schedule.
    #[error("Notification scheduling failed: {0}")]
    Scheduling(String),

    /// The user has not granted notification permission.
    #[error("Notification permission denied")]
    PermissionDenied,

    /// A document does not exist in the store.
    #[error("{collection} not found: {id}")]
    NotFound {
        /// The collection that was queried.
        collection: &'static str,
        /// The document ID that was missing.
        id: String,
    },

    /// The identity service rejected an operation.
    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    /// A template error occurred.
    #[error("Template error: {0}")]
    Template(String),

    /// The configuration file is invalid.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Broad classes of failure, used to decide how a caller reacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Rejected input; show the message, never log as a fault.
    Validation,
    /// Store/network failure; surface degraded state, retryable.
    Transport,
    /// Notification failure; best-effort, log and continue.
    Scheduling,
    /// Missing or stale reference; fall back to a default where possible.
    NotFound,
    /// Identity service rejection.
    Auth,
    /// Local setup problem (config, templates, serialization).
    Internal,
}

impl Error {
    /// Classify this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::Transport(_) | Self::Database(_) | Self::Io(_) => ErrorKind::Transport,
            Self::Scheduling(_) | Self::PermissionDenied => ErrorKind::Scheduling,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Auth(_) => ErrorKind::Auth,
            Self::Json(_) | Self::Yaml(_) | Self::Template(_) | Self::Config(_) => {
                ErrorKind::Internal
            }
        }
    }

    /// Whether retrying the same operation later may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self.kind(), ErrorKind::Transport)
            || matches!(self, Self::Auth(AuthError::Network(_)))
    }

    /// A short, actionable message suitable for showing to the user.
    ///
    /// Raw technical details stay in the `Display` output, which is meant for logs.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(e) => e.to_string(),
            Self::Auth(e) => e.user_message().to_string(),
            Self::PermissionDenied => {
                "Notifications are disabled. Allow them in system settings to get reminders."
                    .to_string()
            }
            Self::Scheduling(_) => {
                "The task was saved, but its reminder could not be scheduled.".to_string()
            }
            Self::NotFound { collection, .. } => {
                format!("This {collection} no longer exists. It may have been deleted.")
            }
            Self::Transport(_) | Self::Database(_) | Self::Io(_) => {
                "Unable to reach your data. Check your connection and try again.".to_string()
            }
            Self::Json(_) | Self::Yaml(_) | Self::Template(_) | Self::Config(_) => {
                "Something went wrong. Please try again.".to_string()
            }
        }
    }
}

/// Input rejected before any external call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// A title was empty or only whitespace.
    #[error("A title is required")]
    EmptyTitle,

    /// A category name was empty or only whitespace.
    #[error("A category name is required")]
    EmptyCategoryName,

    /// An activity is missing its name or kind.
    #[error("An activity needs both a name and a type")]
    IncompleteActivity,

    /// A required form field was left empty.
    #[error("Please fill in the {0} field")]
    MissingField(&'static str),

    /// Password and confirmation differ.
    #[error("The passwords do not match")]
    PasswordMismatch,

    /// A value could not be understood.
    #[error("Invalid {field}: '{value}'")]
    InvalidValue {
        /// What the value was meant to be.
        field: &'static str,
        /// The value as given.
        value: String,
    },
}

/// A specialized Result type for this crate.
pub type Result<T> = std::result::Result<T, Error>;
