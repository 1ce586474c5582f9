//! Standalone reminder subcommands.

use clap::Subcommand;

/// Standalone reminder commands.
///
/// ```bash
/// taskminder reminder add "Call the bank" --at +2h
/// taskminder reminder list
/// ```
#[derive(Subcommand, Debug, Clone)]
pub enum ReminderCommand {
    /// Create a reminder and schedule its notification.
    Add {
        /// What to remind about
        title: String,

        /// When to fire
        #[arg(long)]
        at: String,
    },

    /// Move a reminder or rename it.
    Edit {
        /// Reminder ID
        id: String,

        /// New title
        #[arg(long)]
        title: Option<String>,

        /// New fire time
        #[arg(long)]
        at: Option<String>,
    },

    /// List reminders by fire time.
    List,

    /// Cancel and delete a reminder.
    Rm {
        /// Reminder ID
        id: String,
    },
}
