//! Default categories and category resolution.

use crate::error::{Result, ValidationError};
use crate::tasks::models::{Category, DEFAULT_CATEGORY_ID};
use crate::tasks::store::TodoStore;

/// The categories every new account starts with: `(id, name, color)`.
pub const DEFAULT_CATEGORIES: [(&str, &str, &str); 4] = [
    ("work", "Work", "#3B82F6"),
    ("personal", "Personal", "#10B981"),
    ("study", "Study", "#8B5CF6"),
    ("health", "Health", "#EF4444"),
];

/// The default categories as documents.
#[must_use]
pub fn default_categories() -> Vec<Category> {
    DEFAULT_CATEGORIES
        .iter()
        .map(|(id, name, color)| Category {
            id: (*id).to_string(),
            name: (*name).to_string(),
            color: (*color).to_string(),
        })
        .collect()
}

/// The built-in category used when nothing else matches.
#[must_use]
pub fn builtin_fallback() -> Category {
    default_categories()
        .into_iter()
        .find(|c| c.id == DEFAULT_CATEGORY_ID)
        .unwrap_or_else(|| Category {
            id: DEFAULT_CATEGORY_ID.to_string(),
            name: "Personal".to_string(),
            color: "#10B981".to_string(),
        })
}

/// Check a category name typed by the user and return it trimmed.
///
/// # Errors
///
/// Returns [`ValidationError::EmptyCategoryName`] for blank names.
pub fn validate_name(name: &str) -> Result<&str> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyCategoryName.into());
    }
    Ok(trimmed)
}

/// Find the category `id` refers to, falling back when it dangles.
///
/// The fallback is the first of the user's categories, or the built-in
/// `personal` category if the user has none.
#[must_use]
pub fn resolve(categories: &[Category], id: &str) -> Category {
    categories
        .iter()
        .find(|c| c.id == id)
        .or_else(|| categories.first())
        .cloned()
        .unwrap_or_else(builtin_fallback)
}

/// Write the default categories if the user has none yet.
///
/// Returns `true` when the defaults were written.
///
/// # Errors
///
/// Returns an error if the store cannot be read or written.
#[tracing::instrument(skip(store))]
pub async fn seed_defaults(store: &dyn TodoStore, user_id: &str) -> Result<bool> {
    if !store.list_categories(user_id).await?.is_empty() {
        return Ok(false);
    }
    for category in default_categories() {
        store.put_category(user_id, &category).await?;
    }
    tracing::info!(count = DEFAULT_CATEGORIES.len(), "default categories written");
    Ok(true)
}
