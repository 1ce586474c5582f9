//! Command-line interface for taskminder.
//!
//! Acts as a single local user (see `user_id` in the config). Reminders only
//! fire while `taskminder watch` is running; every other command records
//! them so that `watch` can re-arm them.

mod activity;
mod category;
mod reminder;
mod run;

#[cfg(test)]
mod tests;

pub use activity::ActivityCommand;
pub use category::CategoryCommand;
pub use reminder::ReminderCommand;
pub use run::{parse_due, run, CliOutput};

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Taskminder - tasks with due-date reminders.
///
/// Due dates accept RFC 3339 timestamps (`2025-06-01T09:00:00Z`) or offsets
/// from now (`+30m`, `+2h`, `+1d`).
#[derive(Parser, Debug)]
#[command(name = "taskminder")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Config file (defaults to the platform config directory)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Database file, overriding the config
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Top-level commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create a task.
    Add {
        /// Title for the task (required)
        title: String,

        /// Description with more details
        #[arg(short, long)]
        description: Option<String>,

        /// Category ID (unknown IDs fall back to a default)
        #[arg(short, long)]
        category: Option<String>,

        /// Priority: low, medium, high (defaults to the preference)
        #[arg(short, long)]
        priority: Option<String>,

        /// Due date
        #[arg(long)]
        due: Option<String>,

        /// Notify at the due date
        #[arg(short, long)]
        remind: bool,
    },

    /// List tasks, newest first.
    List {
        /// Which tasks to show: all, pending, done
        #[arg(short, long, default_value = "all")]
        filter: String,
    },

    /// Flip a task between todo and done.
    Toggle {
        /// Task ID
        id: String,
    },

    /// Change fields of a task and re-sync its reminder.
    Edit {
        /// Task ID
        id: String,

        /// New title
        #[arg(long)]
        title: Option<String>,

        /// New description
        #[arg(long)]
        description: Option<String>,

        /// New category ID
        #[arg(long)]
        category: Option<String>,

        /// New priority: low, medium, high
        #[arg(long)]
        priority: Option<String>,

        /// New due date
        #[arg(long, conflicts_with = "clear_due")]
        due: Option<String>,

        /// Remove the due date
        #[arg(long)]
        clear_due: bool,

        /// Turn the reminder on
        #[arg(long, conflicts_with = "no_remind")]
        remind: bool,

        /// Turn the reminder off
        #[arg(long)]
        no_remind: bool,
    },

    /// Delete a task, cancelling its reminder first.
    Rm {
        /// Task ID
        id: String,
    },

    /// Standalone reminders, independent of tasks.
    #[command(subcommand)]
    Reminder(ReminderCommand),

    /// Task categories.
    #[command(subcommand)]
    Category(CategoryCommand),

    /// Your own activities, used for suggestions.
    #[command(subcommand)]
    Activity(ActivityCommand),

    /// Show or change preferences.
    Prefs {
        /// Theme: light or dark
        #[arg(long)]
        theme: Option<String>,

        /// Schedule notifications for reminders: true or false
        #[arg(long)]
        notifications: Option<bool>,

        /// Priority preselected for new tasks
        #[arg(long)]
        default_priority: Option<String>,
    },

    /// Task counts and the most recent tasks.
    Stats {
        /// How many recent tasks to show
        #[arg(long, default_value = "3")]
        recent: usize,
    },

    /// Today's suggestion and activity ideas.
    Suggest {
        /// Day to suggest for, as YYYY-MM-DD (defaults to today)
        #[arg(long)]
        date: Option<String>,
    },

    /// Follow the task list live and deliver reminders as they fire.
    Watch {
        /// Which tasks to show: all, pending, done
        #[arg(short, long, default_value = "all")]
        filter: String,

        /// Stop after this many seconds (runs until killed otherwise)
        #[arg(long)]
        for_secs: Option<u64>,
    },

    /// Show version information.
    Version,
}
