//! Activity subcommands.

use clap::Subcommand;

/// Activities offered as ideas by `suggest`.
///
/// ```bash
/// taskminder activity add "Chess" --kind learning
/// taskminder activity rm 1700000000000
/// ```
#[derive(Subcommand, Debug, Clone)]
pub enum ActivityCommand {
    /// List your activities.
    List,

    /// Add an activity.
    Add {
        /// Display name
        name: String,

        /// Type: relaxation, learning, household, sport, social or other
        #[arg(long)]
        kind: Option<String>,
    },

    /// Remove an activity.
    Rm {
        /// Activity ID
        id: i64,
    },
}
