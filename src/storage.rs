//! SQLite storage layer for Toxiscope.
//!
//! Two tables:
//!
//! - `settings`: key-value store of the persisted [`Settings`] fields, read at
//!   startup and written on change
//! - `analyses`: accepted analysis results, newest last, capped at
//!   [`DEFAULT_HISTORY_RETENTION`] rows
//!
//! # Privacy
//!
//! Chat messages are never stored. The history holds only the classifier's
//! verdicts and the number of messages each verdict covered.

use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

use crate::model::{AnalysisRecord, AnalysisResult, Sensitivity, Settings, ToxicPerson, ToxicityLevel};

const KEY_API_KEY: &str = "apiKey";
const KEY_ANALYSIS_DELAY: &str = "analysisDelaySeconds";
const KEY_MESSAGE_COUNT: &str = "messageCount";
const KEY_SENSITIVITY: &str = "sensitivity";

/// Analyses kept before the oldest are pruned.
pub const DEFAULT_HISTORY_RETENTION: u32 = 1000;

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Storage {
    pool: SqlitePool,
    history_retention: u32,
}

impl Storage {
    /// Create a new storage instance and initialize the schema.
    ///
    /// # Arguments
    ///
    /// * `database_url` - SQLite connection string (e.g., "sqlite:toxiscope.db?mode=rwc" or "sqlite::memory:")
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        // Every in-memory connection is its own database; keep a single one.
        let max_connections = if database_url.contains(":memory:") { 1 } else { 5 };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        let storage = Self {
            pool,
            history_retention: DEFAULT_HISTORY_RETENTION,
        };
        storage.initialize_schema().await?;

        Ok(storage)
    }

    /// Keep at most `rows` analyses (minimum 1).
    pub fn with_history_retention(mut self, rows: u32) -> Self {
        self.history_retention = rows.max(1);
        self
    }

    /// Create the database schema if it doesn't exist.
    async fn initialize_schema(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS settings (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS analyses (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                ts INTEGER NOT NULL,
                message_count INTEGER NOT NULL,
                level TEXT NOT NULL,
                toxic_person TEXT NOT NULL,
                behaviors TEXT NOT NULL,
                problem TEXT NOT NULL,
                suggestion TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Load the persisted settings.
    ///
    /// Missing or unreadable fields take their defaults.
    pub async fn load_settings(&self) -> anyhow::Result<Settings> {
        let rows = sqlx::query("SELECT key, value FROM settings")
            .fetch_all(&self.pool)
            .await?;

        let mut settings = Settings::default();
        for row in rows {
            let key: String = row.get("key");
            let value: String = row.get("value");
            match key.as_str() {
                KEY_API_KEY => settings.api_key = value,
                KEY_ANALYSIS_DELAY => {
                    if let Ok(delay) = value.parse() {
                        settings.analysis_delay_seconds = delay;
                    }
                }
                KEY_MESSAGE_COUNT => {
                    if let Ok(count) = value.parse() {
                        settings.message_count = count;
                    }
                }
                KEY_SENSITIVITY => {
                    if let Ok(sensitivity) =
                        serde_json::from_value::<Sensitivity>(serde_json::Value::String(value))
                    {
                        settings.sensitivity = sensitivity;
                    }
                }
                _ => {}
            }
        }

        Ok(settings)
    }

    /// Persist every settings field.
    pub async fn save_settings(&self, settings: &Settings) -> anyhow::Result<()> {
        let sensitivity = serde_json::to_value(settings.sensitivity)?
            .as_str()
            .unwrap_or("medium")
            .to_string();

        let entries = [
            (KEY_API_KEY, settings.api_key.clone()),
            (KEY_ANALYSIS_DELAY, settings.analysis_delay_seconds.to_string()),
            (KEY_MESSAGE_COUNT, settings.message_count.to_string()),
            (KEY_SENSITIVITY, sensitivity),
        ];

        let mut tx = self.pool.begin().await?;
        for (key, value) in entries {
            sqlx::query(
                r#"
                INSERT INTO settings (key, value) VALUES (?, ?)
                ON CONFLICT(key) DO UPDATE SET value = excluded.value
                "#,
            )
            .bind(key)
            .bind(value)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        Ok(())
    }

    /// Append an accepted analysis to the history and prune past the retention cap.
    pub async fn record_analysis(&self, record: &AnalysisRecord) -> anyhow::Result<()> {
        let behaviors = serde_json::to_string(&record.result.behaviors)?;

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO analyses (ts, message_count, level, toxic_person, behaviors, problem, suggestion)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(record.timestamp.timestamp())
        .bind(record.message_count as i64)
        .bind(record.result.level.label())
        .bind(record.result.toxic_person.label())
        .bind(behaviors)
        .bind(&record.result.problem)
        .bind(&record.result.suggestion)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            DELETE FROM analyses
            WHERE id NOT IN (SELECT id FROM analyses ORDER BY id DESC LIMIT ?)
            "#,
        )
        .bind(i64::from(self.history_retention))
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(())
    }

    /// Most recent analyses, newest first.
    pub async fn recent_analyses(&self, limit: u32) -> anyhow::Result<Vec<AnalysisRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT ts, message_count, level, toxic_person, behaviors, problem, suggestion
            FROM analyses
            ORDER BY id DESC
            LIMIT ?
            "#,
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let ts: i64 = row.get("ts");
            let message_count: i64 = row.get("message_count");
            let level: String = row.get("level");
            let toxic_person: String = row.get("toxic_person");
            let behaviors: String = row.get("behaviors");

            records.push(AnalysisRecord {
                timestamp: DateTime::<Utc>::from_timestamp(ts, 0).unwrap_or_default(),
                message_count: usize::try_from(message_count).unwrap_or_default(),
                result: AnalysisResult {
                    level: ToxicityLevel::from_label(&level).unwrap_or_default(),
                    toxic_person: ToxicPerson::from_label(&toxic_person).unwrap_or_default(),
                    behaviors: serde_json::from_str(&behaviors).unwrap_or_default(),
                    problem: row.get("problem"),
                    suggestion: row.get("suggestion"),
                },
            });
        }

        Ok(records)
    }
}
