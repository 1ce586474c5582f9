//! Tests for the CLI module.

use super::*;
use chrono::{Duration as ChronoDuration, TimeZone, Utc};
use clap::Parser;
use serde_json::Value;
use std::path::PathBuf;
use std::process::ExitCode;
use tempfile::TempDir;

/// A config file and database in a temp directory.
struct TestEnv {
    _dir: TempDir,
    config: PathBuf,
    db: PathBuf,
}

impl TestEnv {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let config = dir.path().join("config.yaml");
        let db = dir.path().join("tasks.db");
        Self { _dir: dir, config, db }
    }

    fn cli(&self, args: &[&str]) -> Cli {
        let config = self.config.to_string_lossy().to_string();
        let db = self.db.to_string_lossy().to_string();
        let mut argv = vec!["taskminder", "--config", &config, "--db", &db];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    async fn exec(&self, args: &[&str]) -> CliOutput {
        self.exec_live(args).await.0
    }

    async fn exec_live(&self, args: &[&str]) -> (CliOutput, String) {
        let mut live = Vec::new();
        let output = run(self.cli(args), &mut live).await;
        (output, String::from_utf8(live).unwrap())
    }

    async fn json(&self, args: &[&str]) -> Value {
        let output = self.exec(args).await;
        assert_eq!(output.exit_code, ExitCode::SUCCESS, "stderr: {:?}", output.stderr);
        serde_json::from_str(&output.stdout[0]).unwrap()
    }
}

// === Parsing ===

#[test]
fn test_parse_due_offsets() {
    let now = Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap();
    assert_eq!(parse_due("+30m", now).unwrap(), now + ChronoDuration::minutes(30));
    assert_eq!(parse_due("+2h", now).unwrap(), now + ChronoDuration::hours(2));
    assert_eq!(parse_due(" +1d ", now).unwrap(), now + ChronoDuration::days(1));
}

#[test]
fn test_parse_due_rfc3339() {
    let now = Utc::now();
    let due = parse_due("2025-06-01T11:00:00+02:00", now).unwrap();
    assert_eq!(due, Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap());
}

#[test]
fn test_parse_due_rejects_garbage() {
    let now = Utc::now();
    for input in ["tomorrow", "+", "+5", "+5w", "+-5m", "+5é", ""] {
        let err = parse_due(input, now).unwrap_err();
        assert!(err.to_string().contains("due date"), "{input}: {err}");
    }
}

#[test]
fn test_edit_rejects_conflicting_flags() {
    let result = Cli::try_parse_from(["taskminder", "edit", "t1", "--remind", "--no-remind"]);
    assert!(result.is_err());

    let result = Cli::try_parse_from(["taskminder", "edit", "t1", "--due", "+1h", "--clear-due"]);
    assert!(result.is_err());
}

#[test]
fn test_nested_subcommands_parse() {
    let cli = Cli::try_parse_from(["taskminder", "reminder", "add", "Call", "--at", "+2h"]).unwrap();
    assert!(matches!(cli.command, Command::Reminder(ReminderCommand::Add { .. })));

    let cli = Cli::try_parse_from(["taskminder", "category", "list"]).unwrap();
    assert!(matches!(cli.command, Command::Category(CategoryCommand::List)));

    let cli = Cli::try_parse_from(["taskminder", "activity", "rm", "1700000000000"]).unwrap();
    assert!(matches!(cli.command, Command::Activity(ActivityCommand::Rm { id: 1_700_000_000_000 })));
}

// === Commands ===

#[tokio::test]
async fn test_version() {
    let output = run(Cli::try_parse_from(["taskminder", "version"]).unwrap(), &mut Vec::new()).await;
    assert_eq!(output.exit_code, ExitCode::SUCCESS);
    assert!(output.stderr[0].starts_with("taskminder v"));
}

#[tokio::test]
async fn test_add_with_future_due_date_schedules() {
    let env = TestEnv::new();

    let added = env.json(&["add", "Buy milk", "--due", "+1h", "--remind"]).await;

    assert_eq!(added["reminder"], "scheduled");
    assert!(added["handle"].is_string());

    let listed = env.json(&["list"]).await;
    assert_eq!(listed["count"], 1);
    assert_eq!(listed["tasks"][0]["title"], "Buy milk");
    assert_eq!(listed["tasks"][0]["notification_handle"], added["handle"]);
}

#[tokio::test]
async fn test_add_with_past_due_date_is_skipped() {
    let env = TestEnv::new();

    let added = env.json(&["add", "Old", "--due", "2020-01-01T00:00:00Z", "-r"]).await;

    assert_eq!(added["reminder"], "skipped: due date is not in the future");
    assert!(added.get("handle").is_none());
}

#[tokio::test]
async fn test_add_rejects_blank_title_and_bad_priority() {
    let env = TestEnv::new();

    let output = env.exec(&["add", "   "]).await;
    assert_eq!(output.exit_code, ExitCode::from(1));
    assert_eq!(output.stderr, vec!["A title is required".to_string()]);

    let output = env.exec(&["add", "Plan trip", "-p", "urgent"]).await;
    assert_eq!(output.exit_code, ExitCode::from(1));
    assert!(output.stderr[0].contains("urgent"));

    assert_eq!(env.json(&["list"]).await["count"], 0);
}

#[tokio::test]
async fn test_toggle_and_filter() {
    let env = TestEnv::new();
    let first = env.json(&["add", "Water plants"]).await;
    env.json(&["add", "Call mum"]).await;
    let id = first["id"].as_str().unwrap();

    let toggled = env.json(&["toggle", id]).await;
    assert_eq!(toggled["status"], "done");

    let done = env.json(&["list", "--filter", "done"]).await;
    assert_eq!(done["count"], 1);
    assert_eq!(done["tasks"][0]["id"], id);

    let pending = env.json(&["list", "-f", "pending"]).await;
    assert_eq!(pending["count"], 1);
    assert_eq!(pending["tasks"][0]["title"], "Call mum");

    let toggled = env.json(&["toggle", id]).await;
    assert_eq!(toggled["status"], "todo");
}

#[tokio::test]
async fn test_toggle_unknown_task_fails() {
    let env = TestEnv::new();
    let output = env.exec(&["toggle", "missing"]).await;
    assert_eq!(output.exit_code, ExitCode::from(1));
    assert!(output.stderr[0].contains("no longer exists"));
}

#[tokio::test]
async fn test_list_rejects_unknown_filter() {
    let env = TestEnv::new();
    let output = env.exec(&["list", "--filter", "later"]).await;
    assert_eq!(output.exit_code, ExitCode::from(1));
    assert!(output.stderr[0].contains("later"));
}

#[tokio::test]
async fn test_edit_clears_due_date_and_reminder() {
    let env = TestEnv::new();
    let added = env.json(&["add", "Dentist", "--due", "+1d", "--remind"]).await;
    let id = added["id"].as_str().unwrap();

    let edited = env.json(&["edit", id, "--clear-due", "--no-remind"]).await;
    assert_eq!(edited["reminder"], "none");

    let listed = env.json(&["list"]).await;
    let task = &listed["tasks"][0];
    assert!(task["due_date"].is_null());
    assert!(task["notification_handle"].is_null());
    assert_eq!(task["reminder"], false);
}

#[tokio::test]
async fn test_rm_deletes_task() {
    let env = TestEnv::new();
    let added = env.json(&["add", "Take out bins", "--due", "+2h", "-r"]).await;
    let id = added["id"].as_str().unwrap();

    let output = env.exec(&["rm", id]).await;
    assert_eq!(output.exit_code, ExitCode::SUCCESS);
    assert_eq!(env.json(&["list"]).await["count"], 0);

    let output = env.exec(&["rm", id]).await;
    assert_eq!(output.exit_code, ExitCode::SUCCESS);
}

#[tokio::test]
async fn test_notifications_off_skips_reminders() {
    let env = TestEnv::new();

    let prefs = env.json(&["prefs", "--notifications", "false", "--theme", "dark"]).await;
    assert_eq!(prefs["notifications_enabled"], false);
    assert_eq!(prefs["theme"], "dark");

    let added = env.json(&["add", "Gym", "--due", "+3h", "--remind"]).await;
    assert_eq!(added["reminder"], "skipped: notifications are turned off");
}

#[tokio::test]
async fn test_prefs_rejects_unknown_theme() {
    let env = TestEnv::new();
    let output = env.exec(&["prefs", "--theme", "sepia"]).await;
    assert_eq!(output.exit_code, ExitCode::from(1));
}

#[tokio::test]
async fn test_default_categories_are_seeded_once() {
    let env = TestEnv::new();

    let categories = env.json(&["category", "list"]).await;
    assert_eq!(categories.as_array().unwrap().len(), 4);

    let output = env.exec(&["category", "rm", "work"]).await;
    assert_eq!(output.exit_code, ExitCode::SUCCESS);
    let categories = env.json(&["category", "list"]).await;
    assert_eq!(categories.as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_category_add_and_edit() {
    let env = TestEnv::new();

    let created = env.json(&["category", "add", " Garden ", "--color", "#22C55E"]).await;
    assert_eq!(created["name"], "Garden");
    let id = created["id"].as_str().unwrap();

    let output = env.exec(&["category", "edit", id, "--name", "Allotment"]).await;
    assert_eq!(output.exit_code, ExitCode::SUCCESS);

    let output = env.exec(&["category", "add", "  "]).await;
    assert_eq!(output.exit_code, ExitCode::from(1));
}

#[tokio::test]
async fn test_standalone_reminders() {
    let env = TestEnv::new();

    let added = env.json(&["reminder", "add", "Call the bank", "--at", "+2h"]).await;
    assert_eq!(added["reminder"], "scheduled");
    let id = added["id"].as_str().unwrap();

    let listed = env.json(&["reminder", "list"]).await;
    assert_eq!(listed.as_array().unwrap().len(), 1);
    assert_eq!(listed[0]["title"], "Call the bank");

    let edited = env.json(&["reminder", "edit", id, "--at", "2020-01-01T00:00:00Z"]).await;
    assert_eq!(edited["reminder"], "skipped: due date is not in the future");

    let output = env.exec(&["reminder", "rm", id]).await;
    assert_eq!(output.exit_code, ExitCode::SUCCESS);
    assert!(env.json(&["reminder", "list"]).await.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_stats_counts_tasks() {
    let env = TestEnv::new();
    let first = env.json(&["add", "One"]).await;
    env.json(&["add", "Two"]).await;
    env.json(&["add", "Three"]).await;
    env.json(&["toggle", first["id"].as_str().unwrap()]).await;

    let stats = env.json(&["stats", "--recent", "2"]).await;

    assert_eq!(stats["total"], 3);
    assert_eq!(stats["done"], 1);
    assert_eq!(stats["todo"], 2);
    assert_eq!(stats["recent"].as_array().unwrap().len(), 2);
}

#[tokio::test]
#[serial_test::serial]
async fn test_suggest_on_holiday() {
    crate::templates::reset_cache().unwrap();
    let env = TestEnv::new();

    let suggestion = env.json(&["suggest", "--date", "2025-12-25"]).await;

    assert_eq!(suggestion["date"], "2025-12-25");
    assert!(suggestion["suggestion"].as_str().unwrap().contains("Christmas Day"));
    assert!(!suggestion["ideas"]["weekend"].as_array().unwrap().is_empty());
}

#[tokio::test]
#[serial_test::serial]
async fn test_activities_feed_suggestions() {
    let env = TestEnv::new();

    let chess = env.json(&["activity", "add", " Chess ", "--kind", "learning"]).await;
    assert_eq!(chess["name"], "Chess");
    assert_eq!(chess["kind"], "learning");
    let id = chess["id"].as_i64().unwrap().to_string();

    let missing_kind = env.exec(&["activity", "add", "Knitting"]).await;
    assert_eq!(missing_kind.exit_code, ExitCode::from(1));
    assert!(missing_kind.stderr[0].contains("both a name and a type"), "{:?}", missing_kind.stderr);
    let bad_kind = env.exec(&["activity", "add", "Knitting", "--kind", "napping"]).await;
    assert_eq!(bad_kind.exit_code, ExitCode::from(1));
    assert_eq!(env.json(&["activity", "list"]).await.as_array().unwrap().len(), 1);

    let suggestion = env.json(&["suggest", "--date", "2025-06-04"]).await;
    let empty_day = suggestion["ideas"]["empty_day"].as_array().unwrap();
    assert!(empty_day.iter().any(|idea| idea["name"] == "Chess" && idea["from_user"] == true));

    assert_eq!(env.exec(&["activity", "rm", &id]).await.exit_code, ExitCode::SUCCESS);
    assert_eq!(env.exec(&["activity", "rm", &id]).await.exit_code, ExitCode::from(1));
    assert!(env.json(&["activity", "list"]).await.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_suggest_rejects_bad_date() {
    let env = TestEnv::new();
    let output = env.exec(&["suggest", "--date", "25/12/2025"]).await;
    assert_eq!(output.exit_code, ExitCode::from(1));
}

#[tokio::test]
async fn test_invalid_config_is_reported() {
    let env = TestEnv::new();
    std::fs::write(&env.config, "subscribe_timeout_secs: 0\n").unwrap();

    let output = env.exec(&["list"]).await;

    assert_eq!(output.exit_code, ExitCode::from(1));
}

// === Watch ===

#[tokio::test(start_paused = true)]
async fn test_watch_rearms_and_delivers() {
    let env = TestEnv::new();
    env.json(&["add", "Buy milk", "--due", "+1h", "--remind"]).await;
    env.json(&["add", "Read book"]).await;

    let (output, live) = env.exec_live(&["watch", "--for-secs", "4000"]).await;

    assert_eq!(output.exit_code, ExitCode::SUCCESS);
    assert!(live.contains("Re-armed 1 task and 0 standalone reminders"), "{live}");
    assert!(live.contains("Buy milk"));
    assert!(live.contains("Read book"));
    assert!(live.contains("[Task reminder]"), "{live}");
}

#[tokio::test(start_paused = true)]
async fn test_watch_stops_before_reminder_fires() {
    let env = TestEnv::new();
    env.json(&["add", "Buy milk", "--due", "+1h", "--remind"]).await;

    let (output, live) = env.exec_live(&["watch", "--filter", "pending", "--for-secs", "60"]).await;

    assert_eq!(output.exit_code, ExitCode::SUCCESS);
    assert!(live.contains("--- pending (1) ---"));
    assert!(!live.contains("[Task reminder]"));
}

#[tokio::test(start_paused = true)]
async fn test_watch_after_earlier_runs_delivers_every_reminder() {
    let env = TestEnv::new();
    env.json(&["add", "Buy milk", "--due", "+1h", "--remind"]).await;
    env.json(&["add", "Call mom", "--due", "+2h", "--remind"]).await;
    env.json(&["reminder", "add", "Stretch", "--at", "+90m"]).await;

    let (first, live) = env.exec_live(&["watch", "--for-secs", "60"]).await;
    assert_eq!(first.exit_code, ExitCode::SUCCESS);
    assert!(live.contains("Re-armed 2 task and 1 standalone reminders (0 cleared, 0 failed)"), "{live}");
    assert!(!live.contains("[Task reminder]"));

    let (second, live) = env.exec_live(&["watch", "--for-secs", "8000"]).await;
    assert_eq!(second.exit_code, ExitCode::SUCCESS);
    assert!(live.contains("Re-armed 2 task and 1 standalone reminders (0 cleared, 0 failed)"), "{live}");
    assert_eq!(live.matches("[Task reminder]").count(), 2, "{live}");
    assert_eq!(live.matches("[Reminder]").count(), 1, "{live}");
    assert!(live.contains("Buy milk") && live.contains("Call mom") && live.contains("Stretch"));
}
