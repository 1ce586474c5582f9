//! Command execution for the CLI.
//!
//! This module handles running CLI commands and producing output.

use crate::activities;
use crate::auth::Identity;
use crate::categories;
use crate::cli::{ActivityCommand, CategoryCommand, Cli, Command, ReminderCommand};
use crate::config::AppConfig;
use crate::error::{Error, Result, ValidationError};
use crate::feed::{FeedEvent, Subscription};
use crate::notifications::{DeliveredNotification, TokioNotifier};
use crate::reconciler::{Reconciler, ReminderOutcome};
use crate::reminders::ReminderService;
use crate::session::Session;
use crate::stats::{self, ActivityIdeas, TaskStats};
use crate::tasks::{
    ActivityKind, CategoryPatch, ListFilter, PreferencesPatch, Priority, ReminderDraft, ReminderPatch,
    SqliteTodoStore, Status, Task, TaskDraft, TaskPatch, Theme, TodoStore,
};
use crate::templates;
use crate::view_model::{ListState, TaskListViewModel};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{Duration, Instant};

/// Output from running the CLI, with separate stdout and stderr messages.
#[derive(Debug)]
pub struct CliOutput {
    /// Exit code for the process.
    pub exit_code: ExitCode,
    /// Messages to print to stdout.
    pub stdout: Vec<String>,
    /// Messages to print to stderr.
    pub stderr: Vec<String>,
}

/// Run a CLI command.
///
/// `live` receives output that has to appear while the command is still
/// running (`watch`); everything else is collected in the returned output.
pub async fn run(cli: Cli, live: &mut dyn Write) -> CliOutput {
    let Cli { config, db, command } = cli;

    if matches!(command, Command::Version) {
        return run_version();
    }

    let result = async {
        let mut app = open_app(config.as_deref(), db).await?;
        dispatch(&mut app, command, live).await
    }
    .await;

    result.unwrap_or_else(|e| {
        tracing::error!(error = %e, "command failed");
        error_output(e.user_message())
    })
}

async fn dispatch(app: &mut App, command: Command, live: &mut dyn Write) -> Result<CliOutput> {
    match command {
        Command::Version => Ok(run_version()),
        Command::Add { title, description, category, priority, due, remind } => {
            let draft = TaskDraft {
                title,
                description,
                category,
                priority: parse_priority(priority.as_deref())?,
                status: None,
                due_date: due.as_deref().map(|d| parse_due(d, Utc::now())).transpose()?,
                reminder: Some(remind),
            };
            task_add(app, draft).await
        }
        Command::List { filter } => task_list(app, parse_filter(&filter)?).await,
        Command::Toggle { id } => task_toggle(app, &id).await,
        Command::Edit {
            id,
            title,
            description,
            category,
            priority,
            due,
            clear_due,
            remind,
            no_remind,
        } => {
            let due_date = if clear_due {
                Some(None)
            } else {
                due.as_deref().map(|d| parse_due(d, Utc::now())).transpose()?.map(Some)
            };
            let reminder = match (remind, no_remind) {
                (true, _) => Some(true),
                (_, true) => Some(false),
                _ => None,
            };
            let patch = TaskPatch {
                title,
                description,
                category,
                priority: parse_priority(priority.as_deref())?,
                status: None,
                due_date,
                reminder,
                notification_handle: None,
            };
            task_edit(app, &id, patch).await
        }
        Command::Rm { id } => task_rm(app, &id).await,
        Command::Reminder(cmd) => run_reminder_cmd(app, cmd).await,
        Command::Category(cmd) => run_category_cmd(app, cmd).await,
        Command::Activity(cmd) => run_activity_cmd(app, cmd).await,
        Command::Prefs { theme, notifications, default_priority } => {
            let patch = PreferencesPatch {
                theme: theme.as_deref().map(parse_theme).transpose()?,
                notifications_enabled: notifications,
                default_priority: parse_priority(default_priority.as_deref())?,
                ..PreferencesPatch::default()
            };
            run_prefs(app, patch).await
        }
        Command::Stats { recent } => run_stats(app, recent),
        Command::Suggest { date } => {
            let date = match date {
                Some(d) => NaiveDate::parse_from_str(&d, "%Y-%m-%d").map_err(|_| {
                    ValidationError::InvalidValue { field: "date", value: d.clone() }
                })?,
                None => chrono::Local::now().date_naive(),
            };
            run_suggest(app, date)
        }
        Command::Watch { filter, for_secs } => {
            let filter = parse_filter(&filter)?;
            run_watch(app, filter, for_secs.map(Duration::from_secs), live).await
        }
    }
}

// === Utility Commands ===

fn run_version() -> CliOutput {
    CliOutput {
        exit_code: ExitCode::SUCCESS,
        stdout: vec![],
        stderr: vec![format!("taskminder v{}", crate::VERSION)],
    }
}

// === Task Commands ===

async fn task_add(app: &App, draft: TaskDraft) -> Result<CliOutput> {
    let (id, outcome) = app.reconciler().create_task(&app.session, draft).await?;
    Ok(json_output(&WriteOutput::new(id, &outcome)))
}

async fn task_list(app: &App, filter: ListFilter) -> Result<CliOutput> {
    let mut vm = app.task_list().await?;
    vm.set_filter(filter);
    let tasks = vm.tasks();
    vm.dispose();
    Ok(json_output(&ListOutput { filter: filter.as_str(), count: tasks.len(), tasks }))
}

async fn task_toggle(app: &App, id: &str) -> Result<CliOutput> {
    let mut vm = app.task_list().await?;
    let status = vm.toggle(app.store.as_ref(), app.session.user_id(), id).await?;
    vm.dispose();
    Ok(json_output(&ToggleOutput { id: id.to_string(), status }))
}

async fn task_edit(app: &App, id: &str, patch: TaskPatch) -> Result<CliOutput> {
    let outcome = app.reconciler().edit_task(&app.session, id, patch).await?;
    Ok(json_output(&WriteOutput::new(id.to_string(), &outcome)))
}

async fn task_rm(app: &App, id: &str) -> Result<CliOutput> {
    app.reconciler().delete_task(&app.session, id).await?;
    Ok(success_output(format!("Task deleted: {id}")))
}

// === Reminder Commands ===

async fn run_reminder_cmd(app: &App, cmd: ReminderCommand) -> Result<CliOutput> {
    let service = ReminderService::new(Arc::clone(&app.store));
    match cmd {
        ReminderCommand::Add { title, at } => {
            let draft = ReminderDraft { title, fire_at: parse_due(&at, Utc::now())? };
            let (id, outcome) = service.create(&app.session, draft).await?;
            Ok(json_output(&WriteOutput::new(id, &outcome)))
        }
        ReminderCommand::Edit { id, title, at } => {
            let patch = ReminderPatch {
                title,
                fire_at: at.as_deref().map(|a| parse_due(a, Utc::now())).transpose()?,
                notification_handle: None,
            };
            let outcome = service.edit(&app.session, &id, patch).await?;
            Ok(json_output(&WriteOutput::new(id, &outcome)))
        }
        ReminderCommand::List => {
            let reminders = first_snapshot(app.store.subscribe_reminders(app.session.user_id()))?;
            Ok(json_output(&*reminders))
        }
        ReminderCommand::Rm { id } => {
            service.delete(&app.session, &id).await?;
            Ok(success_output(format!("Reminder deleted: {id}")))
        }
    }
}

// === Category Commands ===

async fn run_category_cmd(app: &App, cmd: CategoryCommand) -> Result<CliOutput> {
    let user_id = app.session.user_id();
    match cmd {
        CategoryCommand::List => {
            let categories = app.store.list_categories(user_id).await?;
            Ok(json_output(&categories))
        }
        CategoryCommand::Add { name, color } => {
            let name = categories::validate_name(&name)?;
            let category = app.store.create_category(user_id, name, &color).await?;
            Ok(json_output(&category))
        }
        CategoryCommand::Edit { id, name, color } => {
            let name = name.as_deref().map(categories::validate_name).transpose()?;
            let patch = CategoryPatch { name: name.map(str::to_string), color };
            app.store.update_category(user_id, &id, patch).await?;
            Ok(success_output(format!("Category updated: {id}")))
        }
        CategoryCommand::Rm { id } => {
            app.store.delete_category(user_id, &id).await?;
            Ok(success_output(format!("Category deleted: {id}")))
        }
    }
}

// === Preferences, Stats, Suggestions ===

async fn run_prefs(app: &mut App, patch: PreferencesPatch) -> Result<CliOutput> {
    if patch == PreferencesPatch::default() {
        return Ok(json_output(app.session.preferences()));
    }
    let updated = app.store.update_preferences(app.session.user_id(), patch).await?;
    app.session.set_preferences(updated);
    Ok(json_output(app.session.preferences()))
}

fn run_stats(app: &App, recent: usize) -> Result<CliOutput> {
    let tasks = first_snapshot(app.store.subscribe_tasks(app.session.user_id()))?;
    let output = StatsOutput {
        stats: TaskStats::from_tasks(&tasks),
        recent: stats::recent_activity(&tasks, recent),
    };
    Ok(json_output(&output))
}

fn run_suggest(app: &App, date: NaiveDate) -> Result<CliOutput> {
    let tasks = first_snapshot(app.store.subscribe_tasks(app.session.user_id()))?;
    let todo = TaskStats::from_tasks(&tasks).todo;
    let output = SuggestOutput {
        date,
        suggestion: stats::daily_suggestion(todo, date)?,
        ideas: stats::activity_ideas(&app.session.preferences().activities),
    };
    Ok(json_output(&output))
}

// === Activity Commands ===

async fn run_activity_cmd(app: &mut App, cmd: ActivityCommand) -> Result<CliOutput> {
    match cmd {
        ActivityCommand::List => Ok(json_output(&app.session.preferences().activities)),
        ActivityCommand::Add { name, kind } => {
            let kind = kind.as_deref().map(parse_activity_kind).transpose()?;
            let activity =
                activities::add_activity(app.store.as_ref(), &mut app.session, &name, kind).await?;
            Ok(json_output(&activity))
        }
        ActivityCommand::Rm { id } => {
            activities::remove_activity(app.store.as_ref(), &mut app.session, id).await?;
            Ok(success_output(format!("Activity removed: {id}")))
        }
    }
}

// === Watch ===

enum WatchEvent {
    List(Option<ListState>),
    Fired(DeliveredNotification),
    Done,
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

async fn run_watch(
    app: &mut App,
    filter: ListFilter,
    run_for: Option<Duration>,
    live: &mut dyn Write,
) -> Result<CliOutput> {
    let user_id = app.session.user_id().to_string();

    let tasks = first_snapshot(app.store.subscribe_tasks(&user_id))?;
    let task_report = app.reconciler().rearm(&app.session, &tasks).await?;
    let reminders = first_snapshot(app.store.subscribe_reminders(&user_id))?;
    let reminder_report =
        ReminderService::new(Arc::clone(&app.store)).rearm(&app.session, &reminders).await?;
    writeln!(
        live,
        "Re-armed {} task and {} standalone reminders ({} cleared, {} failed)",
        task_report.scheduled,
        reminder_report.scheduled,
        task_report.cleared + reminder_report.cleared,
        task_report.failed + reminder_report.failed,
    )?;

    let mut vm = TaskListViewModel::new(
        app.store.subscribe_tasks(&user_id),
        app.config.subscribe_timeout(),
        app.config.stale_toggle_after(),
    );
    vm.set_filter(filter);
    let deadline = run_for.map(|d| Instant::now() + d);

    loop {
        let event = tokio::select! {
            update = vm.next_update() => WatchEvent::List(update),
            Some(fired) = app.delivered.recv() => WatchEvent::Fired(fired),
            () = wait_until(deadline) => WatchEvent::Done,
        };

        match event {
            WatchEvent::List(None) | WatchEvent::Done => break,
            WatchEvent::List(Some(ListState::Loading)) => {}
            WatchEvent::List(Some(ListState::Ready)) => {
                writeln!(live, "--- {} ({}) ---", filter, vm.tasks().len())?;
                for task in vm.tasks() {
                    writeln!(live, "{}", task_line(&task))?;
                }
            }
            WatchEvent::List(Some(ListState::Degraded(reason))) => {
                writeln!(live, "! {reason}")?;
            }
            WatchEvent::Fired(notification) => {
                writeln!(live, "[{}] {}", notification.title, notification.body)?;
            }
        }
    }

    vm.dispose();
    Ok(success_output("Stopped watching".to_string()))
}

fn task_line(task: &Task) -> String {
    let mark = if task.is_done() { "x" } else { " " };
    let due = task
        .due_date
        .map(|d| format!(" (due {})", d.format("%Y-%m-%d %H:%M")))
        .unwrap_or_default();
    format!("[{mark}] {} {} [{}]{due}", task.id, task.title, task.priority)
}

// === Helper Functions ===

struct App {
    config: AppConfig,
    store: Arc<dyn TodoStore>,
    session: Session,
    delivered: mpsc::UnboundedReceiver<DeliveredNotification>,
}

impl App {
    fn reconciler(&self) -> Reconciler {
        Reconciler::new(Arc::clone(&self.store))
    }

    /// A list view model that has already settled on its first state.
    async fn task_list(&self) -> Result<TaskListViewModel> {
        let mut vm = TaskListViewModel::new(
            self.store.subscribe_tasks(self.session.user_id()),
            self.config.subscribe_timeout(),
            self.config.stale_toggle_after(),
        );
        match vm.next_update().await {
            Some(ListState::Ready) => Ok(vm),
            Some(ListState::Degraded(reason)) => Err(Error::Transport(reason.to_string())),
            Some(ListState::Loading) | None => {
                Err(Error::Transport("task feed closed".to_string()))
            }
        }
    }
}

async fn open_app(config_path: Option<&Path>, db: Option<PathBuf>) -> Result<App> {
    let mut config = match config_path {
        Some(path) => AppConfig::load_from(path)?,
        None => AppConfig::load()?,
    };
    if let Some(db) = db {
        config.database_path = Some(db);
    }
    if let Some(dir) = config.templates_dir.as_deref() {
        templates::init_templates(Some(dir))?;
    }

    let store: Arc<dyn TodoStore> = Arc::new(SqliteTodoStore::new(config.database_path()?)?);
    categories::seed_defaults(store.as_ref(), &config.user_id).await?;

    let (notifier, delivered) = TokioNotifier::new();
    let identity = Identity {
        uid: config.user_id.clone(),
        email: String::new(),
        display_name: String::new(),
    };
    let session = Session::start(store.as_ref(), Arc::new(notifier), identity).await?;

    Ok(App { config, store, session, delivered })
}

/// The snapshot a fresh subscription delivers on open.
fn first_snapshot<T>(mut feed: Subscription<T>) -> Result<Arc<Vec<T>>> {
    match feed.try_next() {
        Some(FeedEvent::Snapshot(items)) => Ok(items),
        Some(FeedEvent::Error(e)) => Err(Error::Transport(e.message)),
        None => Err(Error::Transport("feed delivered no snapshot".to_string())),
    }
}

/// Parse a due date: RFC 3339, or `+N` followed by `m`, `h` or `d`.
///
/// # Errors
///
/// Returns [`ValidationError::InvalidValue`] for anything else.
pub fn parse_due(input: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
    let input = input.trim();
    let invalid =
        || Error::from(ValidationError::InvalidValue { field: "due date", value: input.to_string() });

    if let Some(offset) = input.strip_prefix('+') {
        let unit = offset.chars().last().ok_or_else(invalid)?;
        let amount: u32 = offset[..offset.len() - unit.len_utf8()].parse().map_err(|_| invalid())?;
        let amount = i64::from(amount);
        let delta = match unit {
            'm' => chrono::Duration::try_minutes(amount),
            'h' => chrono::Duration::try_hours(amount),
            'd' => chrono::Duration::try_days(amount),
            _ => None,
        }
        .ok_or_else(invalid)?;
        return now.checked_add_signed(delta).ok_or_else(invalid);
    }

    DateTime::parse_from_rfc3339(input).map(|d| d.with_timezone(&Utc)).map_err(|_| invalid())
}

fn parse_priority(input: Option<&str>) -> Result<Option<Priority>> {
    input
        .map(|p| {
            Priority::from_str(p)
                .map_err(|_| ValidationError::InvalidValue { field: "priority", value: p.into() })
        })
        .transpose()
        .map_err(Error::from)
}

fn parse_filter(input: &str) -> Result<ListFilter> {
    ListFilter::from_str(input).map_err(|_| {
        ValidationError::InvalidValue { field: "filter", value: input.to_string() }.into()
    })
}

fn parse_activity_kind(input: &str) -> Result<ActivityKind> {
    ActivityKind::from_str(input).map_err(|_| {
        ValidationError::InvalidValue { field: "activity type", value: input.to_string() }.into()
    })
}

fn parse_theme(input: &str) -> Result<Theme> {
    match input.to_lowercase().as_str() {
        "light" => Ok(Theme::Light),
        "dark" => Ok(Theme::Dark),
        _ => Err(ValidationError::InvalidValue { field: "theme", value: input.to_string() }.into()),
    }
}

fn json_output<T: Serialize + ?Sized>(value: &T) -> CliOutput {
    match serde_json::to_string_pretty(value) {
        Ok(json) => CliOutput { exit_code: ExitCode::SUCCESS, stdout: vec![json], stderr: vec![] },
        Err(e) => error_output(e.to_string()),
    }
}

fn success_output(message: String) -> CliOutput {
    CliOutput { exit_code: ExitCode::SUCCESS, stdout: vec![message], stderr: vec![] }
}

fn error_output(message: String) -> CliOutput {
    CliOutput { exit_code: ExitCode::from(1), stdout: vec![], stderr: vec![message] }
}

// === Output Types ===

/// Result of a write that may have touched a reminder.
#[derive(Debug, Serialize)]
struct WriteOutput {
    id: String,
    reminder: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    handle: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warning: Option<String>,
}

impl WriteOutput {
    fn new(id: String, outcome: &ReminderOutcome) -> Self {
        let reminder = match outcome {
            ReminderOutcome::NotRequested => "none".to_string(),
            ReminderOutcome::Scheduled(_) => "scheduled".to_string(),
            ReminderOutcome::Skipped(reason) => format!("skipped: {reason}"),
            ReminderOutcome::Failed(_) => "failed".to_string(),
        };
        Self {
            id,
            reminder,
            handle: outcome.handle().map(ToString::to_string),
            warning: outcome.warning(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ListOutput {
    filter: &'static str,
    count: usize,
    tasks: Vec<Task>,
}

#[derive(Debug, Serialize)]
struct ToggleOutput {
    id: String,
    status: Status,
}

#[derive(Debug, Serialize)]
struct StatsOutput {
    #[serde(flatten)]
    stats: TaskStats,
    recent: Vec<Task>,
}

#[derive(Debug, Serialize)]
struct SuggestOutput {
    date: NaiveDate,
    suggestion: String,
    ideas: ActivityIdeas,
}
