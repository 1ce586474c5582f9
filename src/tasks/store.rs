//! Document store trait and `SQLite` implementation.
//!
//! Every document lives under a user ID. Collections are exposed both as
//! request/response CRUD and as push feeds: after each write the affected
//! collection is reloaded and published to the user's live subscriptions.

use crate::error::{Error, Result, ValidationError};
use crate::feed::{FeedError, FeedEvent, FeedHub, Subscription};
use crate::tasks::id::generate_id;
use crate::tasks::models::{
    Category, CategoryPatch, Preferences, PreferencesPatch, Priority, Reminder, ReminderDraft,
    ReminderPatch, Status, Task, TaskDraft, TaskPatch, DEFAULT_CATEGORY_ID,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Trait for per-user document storage with realtime feeds.
///
/// Subscriptions deliver the current snapshot first and then the full,
/// ordered collection after every change. Transport failures arrive as
/// [`FeedEvent::Error`] without closing the subscription.
#[allow(clippy::missing_errors_doc)]
#[async_trait]
pub trait TodoStore: Send + Sync {
    // Tasks
    /// Live feed of the user's tasks, newest `created_at` first.
    fn subscribe_tasks(&self, user_id: &str) -> Subscription<Task>;

    /// Create a task, filling defaults for absent fields. Returns the new ID.
    async fn create_task(&self, user_id: &str, draft: TaskDraft) -> Result<String>;

    /// Get a task by ID.
    async fn get_task(&self, user_id: &str, id: &str) -> Result<Option<Task>>;

    /// Merge `patch` into an existing task.
    ///
    /// Fails with [`Error::NotFound`] if the task does not exist.
    async fn update_task(&self, user_id: &str, id: &str, patch: TaskPatch) -> Result<()>;

    /// Delete a task. Deleting a missing task succeeds.
    async fn delete_task(&self, user_id: &str, id: &str) -> Result<()>;

    /// Write the flip of `current` as the task's status and return it.
    async fn toggle_task_status(&self, user_id: &str, id: &str, current: Status) -> Result<Status> {
        let next = current.toggled();
        let patch = TaskPatch { status: Some(next), ..TaskPatch::default() };
        self.update_task(user_id, id, patch).await?;
        Ok(next)
    }

    // Categories
    /// Live feed of the user's categories, in creation order.
    fn subscribe_categories(&self, user_id: &str) -> Subscription<Category>;

    /// Create a category with a generated ID.
    async fn create_category(&self, user_id: &str, name: &str, color: &str) -> Result<Category>;

    /// Write a category under its own ID, replacing any existing one.
    async fn put_category(&self, user_id: &str, category: &Category) -> Result<()>;

    /// Merge `patch` into an existing category.
    async fn update_category(&self, user_id: &str, id: &str, patch: CategoryPatch) -> Result<()>;

    /// Delete a category. Tasks referring to it are left untouched.
    async fn delete_category(&self, user_id: &str, id: &str) -> Result<()>;

    /// List the user's categories, in creation order.
    async fn list_categories(&self, user_id: &str) -> Result<Vec<Category>>;

    // Standalone reminders
    /// Live feed of the user's reminders, earliest `fire_at` first.
    fn subscribe_reminders(&self, user_id: &str) -> Subscription<Reminder>;

    /// Create a reminder. Returns the new ID.
    async fn create_reminder(&self, user_id: &str, draft: ReminderDraft) -> Result<String>;

    /// Get a reminder by ID.
    async fn get_reminder(&self, user_id: &str, id: &str) -> Result<Option<Reminder>>;

    /// Merge `patch` into an existing reminder.
    async fn update_reminder(&self, user_id: &str, id: &str, patch: ReminderPatch) -> Result<()>;

    /// Delete a reminder. Deleting a missing reminder succeeds.
    async fn delete_reminder(&self, user_id: &str, id: &str) -> Result<()>;

    // Preferences
    /// Read the preferences document, or the defaults if none was written.
    async fn get_preferences(&self, user_id: &str) -> Result<Preferences>;

    /// Merge `patch` into the preferences document and return the result.
    async fn update_preferences(
        &self,
        user_id: &str,
        patch: PreferencesPatch,
    ) -> Result<Preferences>;

    /// Live feed of the preferences document. Each snapshot holds one entry.
    fn subscribe_preferences(&self, user_id: &str) -> Subscription<Preferences>;
}

const TASK_COLUMNS: &str = "id, title, description, category, priority, status, due_at, \
                            reminder, notification_handle, created_at";

const REMINDER_COLUMNS: &str = "id, title, fire_at, notification_handle, created_at";

fn to_millis(at: DateTime<Utc>) -> i64 {
    at.timestamp_millis()
}

fn from_millis(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}

/// SQLite-based document store.
///
/// Clones share their feed hubs, so a write through one clone reaches
/// subscriptions opened through another.
#[derive(Debug, Clone)]
pub struct SqliteTodoStore {
    db_path: PathBuf,
    task_feed: FeedHub<Task>,
    category_feed: FeedHub<Category>,
    reminder_feed: FeedHub<Reminder>,
    preference_feed: FeedHub<Preferences>,
}

impl SqliteTodoStore {
    /// Create a new `SQLite` store at the given database path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be initialized.
    pub fn new(db_path: impl AsRef<Path>) -> Result<Self> {
        let store = Self {
            db_path: db_path.as_ref().to_path_buf(),
            task_feed: FeedHub::new(),
            category_feed: FeedHub::new(),
            reminder_feed: FeedHub::new(),
            preference_feed: FeedHub::new(),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Get the database path.
    #[must_use]
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Open a connection to the database.
    fn open(&self) -> Result<Connection> {
        if let Some(parent) = self.db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(&self.db_path)?;
        conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        Ok(conn)
    }

    /// Initialize the database schema.
    fn init_schema(&self) -> Result<()> {
        let conn = self.open()?;

        conn.execute_batch(
            r"
            CREATE TABLE IF NOT EXISTS tasks (
                user_id TEXT NOT NULL,
                id TEXT NOT NULL,
                title TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                category TEXT NOT NULL DEFAULT 'personal',
                priority TEXT NOT NULL DEFAULT 'medium'
                    CHECK (priority IN ('low', 'medium', 'high')),
                status TEXT NOT NULL DEFAULT 'todo' CHECK (status IN ('todo', 'done')),
                due_at INTEGER,
                reminder INTEGER NOT NULL DEFAULT 0,
                notification_handle TEXT,
                created_at INTEGER NOT NULL,
                PRIMARY KEY (user_id, id)
            );

            CREATE TABLE IF NOT EXISTS categories (
                user_id TEXT NOT NULL,
                id TEXT NOT NULL,
                name TEXT NOT NULL,
                color TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                PRIMARY KEY (user_id, id)
            );

            CREATE TABLE IF NOT EXISTS reminders (
                user_id TEXT NOT NULL,
                id TEXT NOT NULL,
                title TEXT NOT NULL,
                fire_at INTEGER NOT NULL,
                notification_handle TEXT,
                created_at INTEGER NOT NULL,
                PRIMARY KEY (user_id, id)
            );

            CREATE TABLE IF NOT EXISTS settings (
                user_id TEXT PRIMARY KEY,
                document TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_tasks_user_created ON tasks(user_id, created_at);
            CREATE INDEX IF NOT EXISTS idx_reminders_user_fire ON reminders(user_id, fire_at);
            ",
        )?;

        Ok(())
    }

    /// Parse a task from a row selected with [`TASK_COLUMNS`].
    fn parse_task(row: &rusqlite::Row) -> rusqlite::Result<Task> {
        let priority: String = row.get(4)?;
        let status: String = row.get(5)?;
        let due_at: Option<i64> = row.get(6)?;

        Ok(Task {
            id: row.get(0)?,
            title: row.get(1)?,
            description: row.get(2)?,
            category: row.get(3)?,
            priority: Priority::from_str(&priority).unwrap_or_default(),
            status: Status::from_str(&status).unwrap_or_default(),
            due_date: due_at.map(from_millis),
            reminder: row.get(7)?,
            notification_handle: row.get(8)?,
            created_at: from_millis(row.get(9)?),
        })
    }

    fn parse_category(row: &rusqlite::Row) -> rusqlite::Result<Category> {
        Ok(Category { id: row.get(0)?, name: row.get(1)?, color: row.get(2)? })
    }

    fn parse_reminder(row: &rusqlite::Row) -> rusqlite::Result<Reminder> {
        Ok(Reminder {
            id: row.get(0)?,
            title: row.get(1)?,
            fire_at: from_millis(row.get(2)?),
            notification_handle: row.get(3)?,
            created_at: from_millis(row.get(4)?),
        })
    }

    fn load_tasks(conn: &Connection, user_id: &str) -> Result<Vec<Task>> {
        let sql = format!(
            "SELECT {TASK_COLUMNS} FROM tasks WHERE user_id = ?1
             ORDER BY created_at DESC, rowid DESC"
        );
        let mut stmt = conn.prepare(&sql)?;
        let tasks = stmt
            .query_map(params![user_id], Self::parse_task)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(tasks)
    }

    fn load_categories(conn: &Connection, user_id: &str) -> Result<Vec<Category>> {
        let mut stmt = conn.prepare(
            "SELECT id, name, color FROM categories WHERE user_id = ?1
             ORDER BY created_at ASC, rowid ASC",
        )?;
        let categories = stmt
            .query_map(params![user_id], Self::parse_category)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(categories)
    }

    fn load_reminders(conn: &Connection, user_id: &str) -> Result<Vec<Reminder>> {
        let sql = format!(
            "SELECT {REMINDER_COLUMNS} FROM reminders WHERE user_id = ?1
             ORDER BY fire_at ASC, rowid ASC"
        );
        let mut stmt = conn.prepare(&sql)?;
        let reminders = stmt
            .query_map(params![user_id], Self::parse_reminder)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(reminders)
    }

    fn load_preferences(conn: &Connection, user_id: &str) -> Result<Preferences> {
        let document: Option<String> = conn
            .query_row(
                "SELECT document FROM settings WHERE user_id = ?1",
                params![user_id],
                |row| row.get(0),
            )
            .optional()?;
        match document {
            Some(json) => Ok(serde_json::from_str(&json)?),
            None => Ok(Preferences::default()),
        }
    }

    /// Open a subscription on `hub` and deliver the result of `load` to it.
    fn open_feed<T: Clone>(
        &self,
        hub: &FeedHub<T>,
        user_id: &str,
        load: impl FnOnce(&Connection) -> Result<Vec<T>>,
    ) -> Subscription<T> {
        let subscription = hub.subscribe(user_id);
        let event = match self.open().and_then(|conn| load(&conn)) {
            Ok(items) => FeedEvent::Snapshot(Arc::new(items)),
            Err(e) => {
                tracing::warn!(user_id, error = %e, "initial snapshot failed");
                FeedEvent::Error(FeedError::new(e.to_string()))
            }
        };
        // The receiver is owned by `subscription`, so this cannot fail.
        let _ = subscription.sender().send(event);
        subscription
    }

    /// Reload a collection after a write and push it to subscribers.
    fn republish<T: Clone>(
        hub: &FeedHub<T>,
        conn: &Connection,
        user_id: &str,
        load: impl FnOnce(&Connection, &str) -> Result<Vec<T>>,
    ) {
        match load(conn, user_id) {
            Ok(items) => hub.publish(user_id, items),
            Err(e) => hub.publish_error(user_id, FeedError::new(e.to_string())),
        }
    }

    fn publish_tasks(&self, conn: &Connection, user_id: &str) {
        Self::republish(&self.task_feed, conn, user_id, Self::load_tasks);
    }

    fn publish_categories(&self, conn: &Connection, user_id: &str) {
        Self::republish(&self.category_feed, conn, user_id, Self::load_categories);
    }

    fn publish_reminders(&self, conn: &Connection, user_id: &str) {
        Self::republish(&self.reminder_feed, conn, user_id, Self::load_reminders);
    }

    fn publish_preferences(&self, user_id: &str, prefs: Preferences) {
        self.preference_feed.publish(user_id, vec![prefs]);
    }

    /// Run a dynamic `UPDATE` built from `(column, value)` pairs.
    ///
    /// Returns the number of rows changed.
    fn execute_update(
        conn: &Connection,
        table: &str,
        user_id: &str,
        id: &str,
        updates: &[&str],
        mut values: Vec<Box<dyn rusqlite::ToSql>>,
    ) -> Result<usize> {
        values.push(Box::new(user_id.to_string()));
        values.push(Box::new(id.to_string()));

        let sql = format!("UPDATE {table} SET {} WHERE user_id = ? AND id = ?", updates.join(", "));

        let params: Vec<&dyn rusqlite::ToSql> = values.iter().map(AsRef::as_ref).collect();
        Ok(conn.execute(&sql, params.as_slice())?)
    }

    fn exists(conn: &Connection, table: &str, user_id: &str, id: &str) -> Result<bool> {
        let sql = format!("SELECT EXISTS(SELECT 1 FROM {table} WHERE user_id = ?1 AND id = ?2)");
        Ok(conn.query_row(&sql, params![user_id, id], |row| row.get(0))?)
    }
}

#[async_trait]
impl TodoStore for SqliteTodoStore {
    fn subscribe_tasks(&self, user_id: &str) -> Subscription<Task> {
        self.open_feed(&self.task_feed, user_id, |conn| Self::load_tasks(conn, user_id))
    }

    #[tracing::instrument(skip(self, draft), fields(title = %draft.title))]
    async fn create_task(&self, user_id: &str, draft: TaskDraft) -> Result<String> {
        if draft.title.trim().is_empty() {
            return Err(ValidationError::EmptyTitle.into());
        }

        let conn = self.open()?;
        let id = generate_id(&draft.title, "task");

        conn.execute(
            "INSERT INTO tasks (user_id, id, title, description, category, priority, status,
                                due_at, reminder, notification_handle, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, NULL, ?10)",
            params![
                user_id,
                &id,
                &draft.title,
                draft.description.as_deref().unwrap_or(""),
                draft.category.as_deref().unwrap_or(DEFAULT_CATEGORY_ID),
                draft.priority.unwrap_or_default().as_str(),
                draft.status.unwrap_or_default().as_str(),
                draft.due_date.map(to_millis),
                draft.reminder.unwrap_or(false),
                to_millis(Utc::now()),
            ],
        )?;
        tracing::info!(task_id = %id, "task created");

        self.publish_tasks(&conn, user_id);
        Ok(id)
    }

    async fn get_task(&self, user_id: &str, id: &str) -> Result<Option<Task>> {
        let conn = self.open()?;
        let sql = format!("SELECT {TASK_COLUMNS} FROM tasks WHERE user_id = ?1 AND id = ?2");
        let task = conn.query_row(&sql, params![user_id, id], Self::parse_task).optional()?;
        Ok(task)
    }

    #[tracing::instrument(skip(self, patch))]
    async fn update_task(&self, user_id: &str, id: &str, patch: TaskPatch) -> Result<()> {
        let conn = self.open()?;

        if patch.is_empty() {
            return if Self::exists(&conn, "tasks", user_id, id)? {
                Ok(())
            } else {
                Err(Error::NotFound { collection: "task", id: id.to_string() })
            };
        }

        // Build dynamic UPDATE statement
        let mut updates = Vec::new();
        let mut values: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(ref title) = patch.title {
            updates.push("title = ?");
            values.push(Box::new(title.clone()));
        }
        if let Some(ref description) = patch.description {
            updates.push("description = ?");
            values.push(Box::new(description.clone()));
        }
        if let Some(ref category) = patch.category {
            updates.push("category = ?");
            values.push(Box::new(category.clone()));
        }
        if let Some(priority) = patch.priority {
            updates.push("priority = ?");
            values.push(Box::new(priority.as_str()));
        }
        if let Some(status) = patch.status {
            updates.push("status = ?");
            values.push(Box::new(status.as_str()));
        }
        if let Some(due_date) = patch.due_date {
            updates.push("due_at = ?");
            values.push(Box::new(due_date.map(to_millis)));
        }
        if let Some(reminder) = patch.reminder {
            updates.push("reminder = ?");
            values.push(Box::new(reminder));
        }
        if let Some(ref handle) = patch.notification_handle {
            updates.push("notification_handle = ?");
            values.push(Box::new(handle.clone()));
        }

        let rows = Self::execute_update(&conn, "tasks", user_id, id, &updates, values)?;
        if rows == 0 {
            return Err(Error::NotFound { collection: "task", id: id.to_string() });
        }
        tracing::debug!(fields = updates.len(), "task updated");

        self.publish_tasks(&conn, user_id);
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn delete_task(&self, user_id: &str, id: &str) -> Result<()> {
        let conn = self.open()?;
        let rows =
            conn.execute("DELETE FROM tasks WHERE user_id = ?1 AND id = ?2", params![user_id, id])?;
        if rows > 0 {
            tracing::info!("task deleted");
            self.publish_tasks(&conn, user_id);
        }
        Ok(())
    }

    fn subscribe_categories(&self, user_id: &str) -> Subscription<Category> {
        self.open_feed(&self.category_feed, user_id, |conn| Self::load_categories(conn, user_id))
    }

    #[tracing::instrument(skip(self))]
    async fn create_category(&self, user_id: &str, name: &str, color: &str) -> Result<Category> {
        if name.trim().is_empty() {
            return Err(ValidationError::EmptyCategoryName.into());
        }
        let category =
            Category { id: generate_id(name, "category"), name: name.to_string(), color: color.to_string() };
        self.put_category(user_id, &category).await?;
        Ok(category)
    }

    async fn put_category(&self, user_id: &str, category: &Category) -> Result<()> {
        let conn = self.open()?;
        conn.execute(
            "INSERT INTO categories (user_id, id, name, color, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(user_id, id) DO UPDATE SET name = excluded.name, color = excluded.color",
            params![user_id, &category.id, &category.name, &category.color, to_millis(Utc::now())],
        )?;
        self.publish_categories(&conn, user_id);
        Ok(())
    }

    async fn update_category(&self, user_id: &str, id: &str, patch: CategoryPatch) -> Result<()> {
        let conn = self.open()?;
        if patch.is_empty() {
            return if Self::exists(&conn, "categories", user_id, id)? {
                Ok(())
            } else {
                Err(Error::NotFound { collection: "category", id: id.to_string() })
            };
        }

        let mut updates = Vec::new();
        let mut values: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();
        if let Some(ref name) = patch.name {
            if name.trim().is_empty() {
                return Err(ValidationError::EmptyCategoryName.into());
            }
            updates.push("name = ?");
            values.push(Box::new(name.clone()));
        }
        if let Some(ref color) = patch.color {
            updates.push("color = ?");
            values.push(Box::new(color.clone()));
        }

        let rows = Self::execute_update(&conn, "categories", user_id, id, &updates, values)?;
        if rows == 0 {
            return Err(Error::NotFound { collection: "category", id: id.to_string() });
        }
        self.publish_categories(&conn, user_id);
        Ok(())
    }

    async fn delete_category(&self, user_id: &str, id: &str) -> Result<()> {
        let conn = self.open()?;
        let rows = conn
            .execute("DELETE FROM categories WHERE user_id = ?1 AND id = ?2", params![user_id, id])?;
        if rows > 0 {
            self.publish_categories(&conn, user_id);
        }
        Ok(())
    }

    async fn list_categories(&self, user_id: &str) -> Result<Vec<Category>> {
        let conn = self.open()?;
        Self::load_categories(&conn, user_id)
    }

    fn subscribe_reminders(&self, user_id: &str) -> Subscription<Reminder> {
        self.open_feed(&self.reminder_feed, user_id, |conn| Self::load_reminders(conn, user_id))
    }

    #[tracing::instrument(skip(self, draft), fields(title = %draft.title))]
    async fn create_reminder(&self, user_id: &str, draft: ReminderDraft) -> Result<String> {
        if draft.title.trim().is_empty() {
            return Err(ValidationError::EmptyTitle.into());
        }
        let conn = self.open()?;
        let id = generate_id(&draft.title, "reminder");
        conn.execute(
            "INSERT INTO reminders (user_id, id, title, fire_at, notification_handle, created_at)
             VALUES (?1, ?2, ?3, ?4, NULL, ?5)",
            params![user_id, &id, &draft.title, to_millis(draft.fire_at), to_millis(Utc::now())],
        )?;
        tracing::info!(reminder_id = %id, "reminder created");
        self.publish_reminders(&conn, user_id);
        Ok(id)
    }

    async fn get_reminder(&self, user_id: &str, id: &str) -> Result<Option<Reminder>> {
        let conn = self.open()?;
        let sql =
            format!("SELECT {REMINDER_COLUMNS} FROM reminders WHERE user_id = ?1 AND id = ?2");
        Ok(conn.query_row(&sql, params![user_id, id], Self::parse_reminder).optional()?)
    }

    async fn update_reminder(&self, user_id: &str, id: &str, patch: ReminderPatch) -> Result<()> {
        let conn = self.open()?;
        if patch.is_empty() {
            return if Self::exists(&conn, "reminders", user_id, id)? {
                Ok(())
            } else {
                Err(Error::NotFound { collection: "reminder", id: id.to_string() })
            };
        }

        let mut updates = Vec::new();
        let mut values: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();
        if let Some(ref title) = patch.title {
            updates.push("title = ?");
            values.push(Box::new(title.clone()));
        }
        if let Some(fire_at) = patch.fire_at {
            updates.push("fire_at = ?");
            values.push(Box::new(to_millis(fire_at)));
        }
        if let Some(ref handle) = patch.notification_handle {
            updates.push("notification_handle = ?");
            values.push(Box::new(handle.clone()));
        }

        let rows = Self::execute_update(&conn, "reminders", user_id, id, &updates, values)?;
        if rows == 0 {
            return Err(Error::NotFound { collection: "reminder", id: id.to_string() });
        }
        self.publish_reminders(&conn, user_id);
        Ok(())
    }

    async fn delete_reminder(&self, user_id: &str, id: &str) -> Result<()> {
        let conn = self.open()?;
        let rows = conn
            .execute("DELETE FROM reminders WHERE user_id = ?1 AND id = ?2", params![user_id, id])?;
        if rows > 0 {
            self.publish_reminders(&conn, user_id);
        }
        Ok(())
    }

    async fn get_preferences(&self, user_id: &str) -> Result<Preferences> {
        let conn = self.open()?;
        Self::load_preferences(&conn, user_id)
    }

    #[tracing::instrument(skip(self, patch))]
    async fn update_preferences(
        &self,
        user_id: &str,
        patch: PreferencesPatch,
    ) -> Result<Preferences> {
        let conn = self.open()?;
        let mut prefs = Self::load_preferences(&conn, user_id)?;
        patch.apply(&mut prefs);

        let document = serde_json::to_string(&prefs)?;
        conn.execute(
            "INSERT INTO settings (user_id, document) VALUES (?1, ?2)
             ON CONFLICT(user_id) DO UPDATE SET document = excluded.document",
            params![user_id, document],
        )?;

        self.publish_preferences(user_id, prefs.clone());
        Ok(prefs)
    }

    fn subscribe_preferences(&self, user_id: &str) -> Subscription<Preferences> {
        self.open_feed(&self.preference_feed, user_id, |conn| {
            Self::load_preferences(conn, user_id).map(|prefs| vec![prefs])
        })
    }
}
