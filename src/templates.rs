//! User-facing text rendered with Tera.
//!
//! Notification bodies and daily suggestions are templates. The defaults are
//! compiled into the binary; a directory given to [`init_templates`] may
//! override any of them by relative path, e.g.
//! `notifications/task_reminder.tera`.

use crate::error::{Error, Result};
use once_cell::sync::Lazy;
use std::path::Path;
use std::sync::{PoisonError, RwLock};
use tera::{Context, Tera};

/// Templates shipped with the crate, by name.
const BUILTIN: [(&str, &str); 8] = [
    (
        "notifications/task_reminder.tera",
        include_str!("../templates/notifications/task_reminder.tera"),
    ),
    ("notifications/reminder.tera", include_str!("../templates/notifications/reminder.tera")),
    ("suggestions/holiday.tera", include_str!("../templates/suggestions/holiday.tera")),
    ("suggestions/busy.tera", include_str!("../templates/suggestions/busy.tera")),
    ("suggestions/weekend_clear.tera", include_str!("../templates/suggestions/weekend_clear.tera")),
    (
        "suggestions/weekend_pending.tera",
        include_str!("../templates/suggestions/weekend_pending.tera"),
    ),
    ("suggestions/weekday_clear.tera", include_str!("../templates/suggestions/weekday_clear.tera")),
    (
        "suggestions/weekday_pending.tera",
        include_str!("../templates/suggestions/weekday_pending.tera"),
    ),
];

/// The active engine; `None` until first use or after [`reset_cache`].
static ENGINE: Lazy<RwLock<Option<Tera>>> = Lazy::new(|| RwLock::new(None));

fn build_engine(overrides: Option<&Path>) -> Result<Tera> {
    let mut tera = match overrides.filter(|dir| dir.is_dir()) {
        Some(dir) => {
            let pattern = format!("{}/**/*.tera", dir.display());
            let tera = Tera::new(&pattern).map_err(|e| {
                Error::Template(format!("Failed to load templates from {}: {e}", dir.display()))
            })?;
            let count = tera.get_template_names().count();
            tracing::debug!(dir = %dir.display(), count, "template overrides loaded");
            tera
        }
        None => Tera::default(),
    };

    for (name, source) in BUILTIN {
        if tera.get_template(name).is_err() {
            tera.add_raw_template(name, source)
                .map_err(|e| Error::Template(format!("Built-in template {name} is invalid: {e}")))?;
        }
    }
    Ok(tera)
}

/// Load templates, letting files under `overrides` replace built-in ones.
///
/// A missing directory, or `None`, means built-in templates only.
///
/// # Errors
///
/// Returns [`Error::Template`] if an override file does not parse.
pub fn init_templates(overrides: Option<&Path>) -> Result<()> {
    let tera = build_engine(overrides)?;
    *ENGINE.write().unwrap_or_else(PoisonError::into_inner) = Some(tera);
    Ok(())
}

/// Render `name` with `context`, loading the built-in set on first use.
///
/// # Errors
///
/// Returns [`Error::Template`] if the template is unknown or fails to render.
pub fn render(name: &str, context: &Context) -> Result<String> {
    let loaded = ENGINE.read().unwrap_or_else(PoisonError::into_inner).is_some();
    if !loaded {
        init_templates(None)?;
    }

    let engine = ENGINE.read().unwrap_or_else(PoisonError::into_inner);
    let tera = engine.as_ref().ok_or_else(|| Error::Template("templates not loaded".into()))?;
    tera.render(name, context)
        .map_err(|e| Error::Template(format!("Failed to render template {name}: {e}")))
}

/// Render `name` with string variables.
///
/// # Errors
///
/// Same as [`render`].
pub fn render_with_vars(name: &str, vars: &[(&str, &str)]) -> Result<String> {
    let mut context = Context::new();
    for (key, value) in vars {
        context.insert(*key, value);
    }
    render(name, &context)
}

/// Forget the loaded templates; the next render loads the built-in set.
///
/// # Errors
///
/// Currently always `Ok`.
pub fn reset_cache() -> Result<()> {
    *ENGINE.write().unwrap_or_else(PoisonError::into_inner) = None;
    Ok(())
}

/// Names of the built-in templates.
#[must_use]
pub fn builtin_names() -> Vec<&'static str> {
    BUILTIN.iter().map(|(name, _)| *name).collect()
}
