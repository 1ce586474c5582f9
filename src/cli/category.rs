//! Category subcommands.

use clap::Subcommand;

/// Category commands.
///
/// Deleting a category leaves its tasks in place; they fall back to a
/// default category when next edited.
#[derive(Subcommand, Debug, Clone)]
pub enum CategoryCommand {
    /// List categories.
    List,

    /// Create a category.
    Add {
        /// Display name
        name: String,

        /// Color token
        #[arg(long, default_value = "#64748B")]
        color: String,
    },

    /// Rename or recolor a category.
    Edit {
        /// Category ID
        id: String,

        /// New name
        #[arg(long)]
        name: Option<String>,

        /// New color
        #[arg(long)]
        color: Option<String>,
    },

    /// Delete a category.
    Rm {
        /// Category ID
        id: String,
    },
}
