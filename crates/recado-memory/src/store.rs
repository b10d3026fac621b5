use recado_core::{config::shellexpand, config::MemoryConfig, error::RecadoError, text::normalize_title};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use tracing::info;

/// A pending reminder row due for delivery.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Reminder {
    pub id: i64,
    pub chat_id: String,
    pub task_title: String,
    /// UTC, 'YYYY-MM-DD HH:MM:SS'.
    pub remind_time: String,
}

/// Persistent store backed by SQLite.
#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Create a new store, running migrations on first use.
    pub async fn new(config: &MemoryConfig) -> Result<Self, RecadoError> {
        let db_path = shellexpand(&config.db_path);

        // Ensure parent directory exists.
        if let Some(parent) = std::path::Path::new(&db_path).parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| RecadoError::Memory(format!("failed to create data dir: {e}")))?;
        }

        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{db_path}"))
            .map_err(|e| RecadoError::Memory(format!("invalid db path: {e}")))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(opts)
            .await
            .map_err(|e| RecadoError::Memory(format!("failed to connect to sqlite: {e}")))?;

        Self::run_migrations(&pool).await?;

        info!("Reminder store initialized at {db_path}");

        Ok(Self { pool })
    }

    /// In-memory store, single connection. Meant for tests.
    pub async fn open_in_memory() -> Result<Self, RecadoError> {
        let opts = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| RecadoError::Memory(format!("invalid db path: {e}")))?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(opts)
            .await
            .map_err(|e| RecadoError::Memory(format!("failed to connect to sqlite: {e}")))?;

        Self::run_migrations(&pool).await?;
        Ok(Self { pool })
    }

    /// Run SQL migrations, tracking which have already been applied.
    async fn run_migrations(pool: &SqlitePool) -> Result<(), RecadoError> {
        sqlx::raw_sql(
            "CREATE TABLE IF NOT EXISTS _migrations (
                name TEXT PRIMARY KEY,
                applied_at TEXT NOT NULL DEFAULT (datetime('now'))
            );",
        )
        .execute(pool)
        .await
        .map_err(|e| RecadoError::Memory(format!("failed to create migrations table: {e}")))?;

        let migrations: &[(&str, &str)] =
            &[("001_init", include_str!("../migrations/001_init.sql"))];

        for (name, sql) in migrations {
            let applied: Option<(String,)> =
                sqlx::query_as("SELECT name FROM _migrations WHERE name = ?")
                    .bind(name)
                    .fetch_optional(pool)
                    .await
                    .map_err(|e| {
                        RecadoError::Memory(format!("failed to check migration {name}: {e}"))
                    })?;

            if applied.is_some() {
                continue;
            }

            sqlx::raw_sql(sql)
                .execute(pool)
                .await
                .map_err(|e| RecadoError::Memory(format!("migration {name} failed: {e}")))?;

            sqlx::query("INSERT INTO _migrations (name) VALUES (?)")
                .bind(name)
                .execute(pool)
                .await
                .map_err(|e| {
                    RecadoError::Memory(format!("failed to record migration {name}: {e}"))
                })?;
        }
        Ok(())
    }

    /// Insert a pending reminder. `remind_time` must already be UTC in
    /// 'YYYY-MM-DD HH:MM:SS' form.
    pub async fn create_reminder(
        &self,
        chat_id: &str,
        task_title: &str,
        remind_time: &str,
    ) -> Result<i64, RecadoError> {
        let result = sqlx::query(
            "INSERT INTO reminders (chat_id, task_title, remind_time) VALUES (?, ?, ?)",
        )
        .bind(chat_id)
        .bind(task_title)
        .bind(remind_time)
        .execute(&self.pool)
        .await
        .map_err(|e| RecadoError::Memory(format!("create reminder failed: {e}")))?;

        Ok(result.last_insert_rowid())
    }

    /// Pending reminders whose time has come. SQLite's `datetime('now')`
    /// is UTC, matching how remind_time is stored.
    pub async fn due_reminders(&self) -> Result<Vec<Reminder>, RecadoError> {
        sqlx::query_as(
            "SELECT id, chat_id, task_title, remind_time FROM reminders \
             WHERE status = 'pending' AND datetime(remind_time) <= datetime('now') \
             ORDER BY remind_time ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RecadoError::Memory(format!("due reminders query failed: {e}")))
    }

    /// Mark a reminder as delivered.
    pub async fn mark_sent(&self, id: i64) -> Result<(), RecadoError> {
        sqlx::query("UPDATE reminders SET status = 'sent' WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| RecadoError::Memory(format!("mark sent failed: {e}")))?;
        Ok(())
    }

    /// Count of reminders still pending (for status display).
    pub async fn pending_count(&self) -> Result<i64, RecadoError> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM reminders WHERE status = 'pending'")
                .fetch_one(&self.pool)
                .await
                .map_err(|e| RecadoError::Memory(format!("pending count failed: {e}")))?;
        Ok(count)
    }

    /// Remember an alias for a task. The alias is normalized before storage;
    /// a repeated alias overwrites its previous target (last writer wins).
    pub async fn put_alias(&self, alias_text: &str, task_id: &str) -> Result<(), RecadoError> {
        let key = normalize_title(alias_text);
        if key.is_empty() {
            return Ok(());
        }
        sqlx::query(
            "INSERT INTO task_aliases (alias_text, task_id) VALUES (?, ?) \
             ON CONFLICT(alias_text) DO UPDATE SET task_id = excluded.task_id",
        )
        .bind(&key)
        .bind(task_id)
        .execute(&self.pool)
        .await
        .map_err(|e| RecadoError::Memory(format!("put alias failed: {e}")))?;
        Ok(())
    }

    /// Look up a learned alias. The input is normalized before lookup.
    pub async fn get_alias(&self, alias_text: &str) -> Result<Option<String>, RecadoError> {
        let key = normalize_title(alias_text);
        if key.is_empty() {
            return Ok(None);
        }
        let row: Option<(String,)> =
            sqlx::query_as("SELECT task_id FROM task_aliases WHERE alias_text = ?")
                .bind(&key)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| RecadoError::Memory(format!("get alias failed: {e}")))?;
        Ok(row.map(|(id,)| id))
    }
}
