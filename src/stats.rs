//! Productivity statistics and daily suggestions.

use crate::error::Result;
use crate::tasks::models::{Activity, ActivityKind, Task};
use crate::templates;
use chrono::{Datelike, NaiveDate, Weekday};
use serde::Serialize;
use tera::Context;

/// Pending tasks above which the day counts as busy.
pub const BUSY_THRESHOLD: usize = 5;

/// Fixed-date public holidays as `(month, day, name)`.
pub const HOLIDAYS: [(u32, u32, &str); 8] = [
    (1, 1, "New Year's Day"),
    (5, 1, "Labour Day"),
    (5, 8, "Victory in Europe Day"),
    (7, 14, "Bastille Day"),
    (8, 15, "Assumption Day"),
    (11, 1, "All Saints' Day"),
    (11, 11, "Armistice Day"),
    (12, 25, "Christmas Day"),
];

/// Ideas for a free weekday.
pub const EMPTY_DAY_IDEAS: [&str; 6] =
    ["Reading", "Meditation", "Cooking", "Gardening", "Tidying up", "Podcast"];

/// Ideas for the weekend.
pub const WEEKEND_IDEAS: [&str; 6] =
    ["Cinema", "Swimming pool", "Walk", "Museum", "Restaurant", "Bike ride"];

/// Task counts shown on the profile.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TaskStats {
    /// Every task.
    pub total: usize,
    /// Tasks marked done.
    pub done: usize,
    /// Tasks still to do.
    pub todo: usize,
}

impl TaskStats {
    /// Count the tasks by status.
    #[must_use]
    pub fn from_tasks(tasks: &[Task]) -> Self {
        let done = tasks.iter().filter(|t| t.is_done()).count();
        Self { total: tasks.len(), done, todo: tasks.len() - done }
    }
}

/// The `n` most recently created tasks, newest first.
#[must_use]
pub fn recent_activity(tasks: &[Task], n: usize) -> Vec<Task> {
    let mut recent = tasks.to_vec();
    recent.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    recent.truncate(n);
    recent
}

/// The holiday falling on `date`, if any.
#[must_use]
pub fn holiday_on(date: NaiveDate) -> Option<&'static str> {
    HOLIDAYS
        .iter()
        .find(|(month, day, _)| date.month() == *month && date.day() == *day)
        .map(|(_, _, name)| *name)
}

/// Which suggestion applies to a day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Suggestion {
    /// A public holiday.
    Holiday(&'static str),
    /// More than [`BUSY_THRESHOLD`] tasks pending.
    Busy,
    /// Weekend with nothing pending.
    WeekendClear,
    /// Weekend with a few tasks pending.
    WeekendPending,
    /// Weekday with nothing pending.
    WeekdayClear,
    /// Weekday with a few tasks pending.
    WeekdayPending,
}

impl Suggestion {
    /// Pick the suggestion for `date` with `todo_count` tasks pending.
    ///
    /// Holidays win over everything, then a busy day, then weekend or weekday.
    #[must_use]
    pub fn pick(todo_count: usize, date: NaiveDate) -> Self {
        if let Some(name) = holiday_on(date) {
            return Self::Holiday(name);
        }
        if todo_count > BUSY_THRESHOLD {
            return Self::Busy;
        }
        let weekend = matches!(date.weekday(), Weekday::Sat | Weekday::Sun);
        match (weekend, todo_count == 0) {
            (true, true) => Self::WeekendClear,
            (true, false) => Self::WeekendPending,
            (false, true) => Self::WeekdayClear,
            (false, false) => Self::WeekdayPending,
        }
    }

    /// Template rendering this suggestion.
    #[must_use]
    pub const fn template(&self) -> &'static str {
        match self {
            Self::Holiday(_) => "suggestions/holiday.tera",
            Self::Busy => "suggestions/busy.tera",
            Self::WeekendClear => "suggestions/weekend_clear.tera",
            Self::WeekendPending => "suggestions/weekend_pending.tera",
            Self::WeekdayClear => "suggestions/weekday_clear.tera",
            Self::WeekdayPending => "suggestions/weekday_pending.tera",
        }
    }
}

/// Suggestion text for `date` with `todo_count` tasks pending.
///
/// # Errors
///
/// Returns an error if the template cannot be rendered.
pub fn daily_suggestion(todo_count: usize, date: NaiveDate) -> Result<String> {
    let suggestion = Suggestion::pick(todo_count, date);
    let mut context = Context::new();
    context.insert("todo_count", &todo_count);
    if let Suggestion::Holiday(name) = suggestion {
        context.insert("holiday", name);
    }
    templates::render(suggestion.template(), &context)
}

/// An idea shown on the suggestions screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Idea {
    /// Display name.
    pub name: String,
    /// Whether it comes from the user's own activities.
    pub from_user: bool,
}

/// Ideas grouped by the kind of free time they fit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ActivityIdeas {
    /// For a free weekday.
    pub empty_day: Vec<Idea>,
    /// For the weekend.
    pub weekend: Vec<Idea>,
}

fn fits_empty_day(activity: &Activity) -> bool {
    matches!(
        activity.kind,
        ActivityKind::Relaxation | ActivityKind::Learning | ActivityKind::Household
    ) || activity.name.chars().count() % 2 == 0
}

/// Built-in ideas followed by the user's activities, split by free-time kind.
#[must_use]
pub fn activity_ideas(activities: &[Activity]) -> ActivityIdeas {
    let builtin = |names: &[&str]| -> Vec<Idea> {
        names.iter().map(|name| Idea { name: (*name).to_string(), from_user: false }).collect()
    };
    let mut ideas =
        ActivityIdeas { empty_day: builtin(&EMPTY_DAY_IDEAS), weekend: builtin(&WEEKEND_IDEAS) };

    for activity in activities {
        let idea = Idea { name: activity.name.clone(), from_user: true };
        if fits_empty_day(activity) {
            ideas.empty_day.push(idea);
        } else {
            ideas.weekend.push(idea);
        }
    }
    ideas
}
