//! Task list filtering.

use crate::tasks::models::{Status, Task};
use serde::{Deserialize, Serialize};

/// Which tasks a list shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListFilter {
    /// Every task.
    #[default]
    All,
    /// Tasks still to do.
    Pending,
    /// Finished tasks.
    Done,
}

impl ListFilter {
    /// Parse a filter from a string.
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not a valid filter.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Result<Self, InvalidFilter> {
        match s.to_lowercase().as_str() {
            "all" => Ok(Self::All),
            "pending" | "todo" => Ok(Self::Pending),
            "done" => Ok(Self::Done),
            _ => Err(InvalidFilter(s.to_string())),
        }
    }

    /// Get the string representation of the filter.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Pending => "pending",
            Self::Done => "done",
        }
    }

    /// Whether a task passes this filter.
    #[must_use]
    pub fn matches(self, task: &Task) -> bool {
        match self {
            Self::All => true,
            Self::Pending => task.status == Status::Todo,
            Self::Done => task.status == Status::Done,
        }
    }
}

impl std::fmt::Display for ListFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error when an invalid filter string is provided.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidFilter(pub String);

impl std::fmt::Display for InvalidFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid filter: '{}' (must be one of: all, pending, done)", self.0)
    }
}

impl std::error::Error for InvalidFilter {}

/// Select the tasks matching `filter`, keeping their order.
#[must_use]
pub fn filter_tasks(tasks: &[Task], filter: ListFilter) -> Vec<Task> {
    tasks.iter().filter(|task| filter.matches(task)).cloned().collect()
}
