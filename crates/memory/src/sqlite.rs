//! SQLite history store.
//!
//! Uses a single SQLite database file with two tables:
//! - `sessions`: one row per conversation, with last-activity tracking
//! - `messages`: one row per exchange (question, answer, model, context)
//!
//! Timestamps are stored as fixed-width RFC 3339 text so that ordering by
//! the column is chronological.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use folio_core::error::MemoryError;
use folio_core::history::HistoryStore;
use folio_core::message::{
    new_session_id, DailyCount, HistoryStats, NewSession, QuestionCount, Session, StatsRange,
    StoredTurn, TOP_QUESTIONS_LIMIT,
};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use tracing::{debug, info, warn};

use crate::SESSION_MESSAGE_LIMIT;

/// A persistent SQLite history store.
pub struct SqliteHistory {
    pool: SqlitePool,
}

impl SqliteHistory {
    /// Open (or create) a history database.
    ///
    /// Accepts a file path or a `sqlite:` URL. Pass `"sqlite::memory:"` for
    /// an in-process ephemeral database (useful for tests).
    pub async fn new(path: &str) -> Result<Self, MemoryError> {
        let options = SqliteConnectOptions::from_str(path)
            .map_err(|e| MemoryError::Storage(format!("Invalid SQLite path: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(|e| MemoryError::Storage(format!("Failed to open SQLite: {e}")))?;

        let store = Self { pool };
        store.run_migrations().await?;
        info!("SQLite history store initialized at {path}");
        Ok(store)
    }

    /// Open a database file, creating its parent directory if needed.
    pub async fn open(path: &std::path::Path) -> Result<Self, MemoryError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                MemoryError::Storage(format!("Failed to create {}: {e}", parent.display()))
            })?;
        }
        Self::new(&path.to_string_lossy()).await
    }

    /// Create from an existing pool (useful for testing).
    pub async fn from_pool(pool: SqlitePool) -> Result<Self, MemoryError> {
        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), MemoryError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS sessions (
                id            TEXT PRIMARY KEY,
                user_id       TEXT,
                created_at    TEXT NOT NULL,
                last_activity TEXT NOT NULL,
                metadata      TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| MemoryError::MigrationFailed(format!("sessions table: {e}")))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS messages (
                id         TEXT PRIMARY KEY,
                session_id TEXT NOT NULL REFERENCES sessions(id),
                user_id    TEXT,
                message    TEXT NOT NULL,
                response   TEXT NOT NULL,
                timestamp  TEXT NOT NULL,
                model      TEXT,
                context    TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| MemoryError::MigrationFailed(format!("messages table: {e}")))?;

        for (name, sql) in [
            (
                "session_id index",
                "CREATE INDEX IF NOT EXISTS idx_messages_session_id ON messages(session_id)",
            ),
            (
                "timestamp index",
                "CREATE INDEX IF NOT EXISTS idx_messages_timestamp ON messages(timestamp)",
            ),
            (
                "user_id index",
                "CREATE INDEX IF NOT EXISTS idx_sessions_user_id ON sessions(user_id)",
            ),
            (
                "last_activity index",
                "CREATE INDEX IF NOT EXISTS idx_sessions_last_activity ON sessions(last_activity)",
            ),
        ] {
            sqlx::query(sql)
                .execute(&self.pool)
                .await
                .map_err(|e| MemoryError::MigrationFailed(format!("{name}: {e}")))?;
        }

        debug!("SQLite migrations complete");
        Ok(())
    }

    async fn insert_session(&self, session: &Session) -> Result<(), MemoryError> {
        let metadata = session
            .metadata
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| MemoryError::Storage(format!("Metadata serialization: {e}")))?;

        sqlx::query(
            r#"
            INSERT INTO sessions (id, user_id, created_at, last_activity, metadata)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(&session.id)
        .bind(&session.user_id)
        .bind(format_ts(&session.created_at))
        .bind(format_ts(&session.last_activity))
        .bind(metadata)
        .execute(&self.pool)
        .await
        .map_err(|e| MemoryError::Storage(format!("INSERT session failed: {e}")))?;
        Ok(())
    }

    fn row_to_turn(row: &sqlx::sqlite::SqliteRow) -> Result<StoredTurn, MemoryError> {
        let get = |col: &str| -> Result<String, MemoryError> {
            row.try_get(col)
                .map_err(|e| MemoryError::QueryFailed(format!("{col} column: {e}")))
        };
        let get_opt = |col: &str| -> Result<Option<String>, MemoryError> {
            row.try_get(col)
                .map_err(|e| MemoryError::QueryFailed(format!("{col} column: {e}")))
        };

        let context = get_opt("context")?.and_then(|raw| match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(error = %e, "Dropping unreadable message context");
                None
            }
        });

        Ok(StoredTurn {
            id: get("id")?,
            session_id: get("session_id")?,
            user_id: get_opt("user_id")?,
            message: get("message")?,
            response: get("response")?,
            timestamp: parse_ts(&get("timestamp")?)?,
            model: get_opt("model")?,
            context,
        })
    }

    fn row_to_session(row: &sqlx::sqlite::SqliteRow) -> Result<Session, MemoryError> {
        let id: String = row
            .try_get("id")
            .map_err(|e| MemoryError::QueryFailed(format!("id column: {e}")))?;
        let user_id: Option<String> = row
            .try_get("user_id")
            .map_err(|e| MemoryError::QueryFailed(format!("user_id column: {e}")))?;
        let created_at: String = row
            .try_get("created_at")
            .map_err(|e| MemoryError::QueryFailed(format!("created_at column: {e}")))?;
        let last_activity: String = row
            .try_get("last_activity")
            .map_err(|e| MemoryError::QueryFailed(format!("last_activity column: {e}")))?;
        let metadata: Option<String> = row
            .try_get("metadata")
            .map_err(|e| MemoryError::QueryFailed(format!("metadata column: {e}")))?;

        Ok(Session {
            id,
            user_id,
            created_at: parse_ts(&created_at)?,
            last_activity: parse_ts(&last_activity)?,
            messages: Vec::new(),
            metadata: metadata.and_then(|raw| serde_json::from_str(&raw).ok()),
        })
    }

    /// Run a `COUNT` query whose only parameter is the window start.
    async fn count(&self, sql: &str, since: Option<&str>) -> Result<u64, MemoryError> {
        let count: i64 = sqlx::query_scalar(sql)
            .bind(since)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| MemoryError::QueryFailed(format!("Count failed: {e}")))?;
        Ok(count.max(0) as u64)
    }
}

fn format_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_ts(raw: &str) -> Result<DateTime<Utc>, MemoryError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| MemoryError::QueryFailed(format!("Unreadable timestamp {raw:?}: {e}")))
}

#[async_trait]
impl HistoryStore for SqliteHistory {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn session_messages(
        &self,
        session_id: &str,
        limit: usize,
    ) -> Result<Vec<StoredTurn>, MemoryError> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM messages
            WHERE session_id = ?1
            ORDER BY timestamp DESC, rowid DESC
            LIMIT ?2
            "#,
        )
        .bind(session_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| MemoryError::QueryFailed(format!("Session messages: {e}")))?;

        let mut turns = rows
            .iter()
            .map(Self::row_to_turn)
            .collect::<Result<Vec<_>, _>>()?;
        turns.reverse();
        Ok(turns)
    }

    async fn append_turn(&self, turn: StoredTurn) -> Result<(), MemoryError> {
        let ts = format_ts(&turn.timestamp);
        let context = turn
            .context
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| MemoryError::Storage(format!("Context serialization: {e}")))?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| MemoryError::Storage(format!("BEGIN failed: {e}")))?;

        sqlx::query(
            r#"
            INSERT OR IGNORE INTO sessions (id, user_id, created_at, last_activity)
            VALUES (?1, ?2, ?3, ?3)
            "#,
        )
        .bind(&turn.session_id)
        .bind(&turn.user_id)
        .bind(&ts)
        .execute(&mut *tx)
        .await
        .map_err(|e| MemoryError::Storage(format!("INSERT session failed: {e}")))?;

        sqlx::query(
            r#"
            INSERT INTO messages (id, session_id, user_id, message, response, timestamp, model, context)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&turn.id)
        .bind(&turn.session_id)
        .bind(&turn.user_id)
        .bind(&turn.message)
        .bind(&turn.response)
        .bind(&ts)
        .bind(&turn.model)
        .bind(context)
        .execute(&mut *tx)
        .await
        .map_err(|e| MemoryError::Storage(format!("INSERT message failed: {e}")))?;

        tx.commit()
            .await
            .map_err(|e| MemoryError::Storage(format!("COMMIT failed: {e}")))?;

        debug!(session_id = %turn.session_id, message_id = %turn.id, "Stored turn");
        Ok(())
    }

    async fn touch_session(&self, session_id: &str) -> Result<(), MemoryError> {
        let result = sqlx::query("UPDATE sessions SET last_activity = ?1 WHERE id = ?2")
            .bind(format_ts(&Utc::now()))
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(|e| MemoryError::Storage(format!("UPDATE session failed: {e}")))?;

        if result.rows_affected() == 0 {
            return Err(MemoryError::SessionNotFound(session_id.to_string()));
        }
        Ok(())
    }

    async fn create_session(&self, new: NewSession) -> Result<Session, MemoryError> {
        let now = Utc::now();
        let session = Session {
            id: new.id.unwrap_or_else(new_session_id),
            user_id: new.user_id,
            created_at: now,
            last_activity: now,
            messages: Vec::new(),
            metadata: new.metadata,
        };
        self.insert_session(&session).await?;
        Ok(session)
    }

    async fn get_session(&self, session_id: &str) -> Result<Option<Session>, MemoryError> {
        let row = sqlx::query("SELECT * FROM sessions WHERE id = ?1")
            .bind(session_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| MemoryError::QueryFailed(format!("Get session: {e}")))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let mut session = Self::row_to_session(&row)?;
        session.messages = self
            .session_messages(session_id, SESSION_MESSAGE_LIMIT)
            .await?;
        Ok(Some(session))
    }

    async fn stats(&self, range: StatsRange) -> Result<HistoryStats, MemoryError> {
        let since = range.since(Utc::now()).map(|ts| format_ts(&ts));
        let since = since.as_deref();

        let total_messages = self
            .count(
                "SELECT COUNT(*) FROM messages WHERE (?1 IS NULL OR timestamp >= ?1)",
                since,
            )
            .await?;
        let total_sessions = self
            .count(
                "SELECT COUNT(*) FROM sessions WHERE (?1 IS NULL OR created_at >= ?1)",
                since,
            )
            .await?;
        let active_users = self
            .count(
                "SELECT COUNT(DISTINCT user_id) FROM messages
                 WHERE user_id IS NOT NULL AND (?1 IS NULL OR timestamp >= ?1)",
                since,
            )
            .await?;

        let top_rows = sqlx::query(
            "SELECT message, COUNT(*) AS count FROM messages
             WHERE (?1 IS NULL OR timestamp >= ?1)
             GROUP BY message
             ORDER BY count DESC, message ASC
             LIMIT ?2",
        )
        .bind(since)
        .bind(TOP_QUESTIONS_LIMIT as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| MemoryError::QueryFailed(format!("Top questions failed: {e}")))?;

        let top_questions = top_rows
            .iter()
            .map(|row| {
                let message: String = row
                    .try_get("message")
                    .map_err(|e| MemoryError::QueryFailed(format!("message column: {e}")))?;
                let count: i64 = row
                    .try_get("count")
                    .map_err(|e| MemoryError::QueryFailed(format!("count column: {e}")))?;
                Ok(QuestionCount {
                    message,
                    count: count.max(0) as u64,
                })
            })
            .collect::<Result<Vec<_>, MemoryError>>()?;

        // Timestamps are fixed-width UTC, so the first ten chars are the date
        let day_rows = sqlx::query(
            "SELECT substr(timestamp, 1, 10) AS day, COUNT(*) AS count FROM messages
             WHERE (?1 IS NULL OR timestamp >= ?1)
             GROUP BY day
             ORDER BY day",
        )
        .bind(since)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| MemoryError::QueryFailed(format!("Daily counts failed: {e}")))?;

        let messages_over_time = day_rows
            .iter()
            .map(|row| {
                let day: String = row
                    .try_get("day")
                    .map_err(|e| MemoryError::QueryFailed(format!("day column: {e}")))?;
                let count: i64 = row
                    .try_get("count")
                    .map_err(|e| MemoryError::QueryFailed(format!("count column: {e}")))?;
                let date = NaiveDate::parse_from_str(&day, "%Y-%m-%d")
                    .map_err(|e| MemoryError::QueryFailed(format!("Unreadable day {day:?}: {e}")))?;
                Ok(DailyCount {
                    date,
                    count: count.max(0) as u64,
                })
            })
            .collect::<Result<Vec<_>, MemoryError>>()?;

        debug!(?range, total_messages, "Computed history stats");
        Ok(HistoryStats {
            total_messages,
            total_sessions,
            active_users,
            top_questions,
            messages_over_time,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use folio_core::message::new_message_id;

    async fn test_store() -> SqliteHistory {
        SqliteHistory::new("sqlite::memory:").await.unwrap()
    }

    fn turn(session: &str, message: &str, offset_secs: i64) -> StoredTurn {
        StoredTurn {
            id: new_message_id(),
            session_id: session.into(),
            user_id: None,
            message: message.into(),
            response: format!("answer to {message}"),
            timestamp: Utc::now() + Duration::seconds(offset_secs),
            model: Some("llama3.1".into()),
            context: None,
        }
    }

    #[tokio::test]
    async fn append_and_read_back_in_order() {
        let db = test_store().await;
        for (i, q) in ["first", "second", "third"].iter().enumerate() {
            db.append_turn(turn("s1", q, i as i64)).await.unwrap();
        }

        let all = db.session_messages("s1", 10).await.unwrap();
        let messages: Vec<&str> = all.iter().map(|t| t.message.as_str()).collect();
        assert_eq!(messages, vec!["first", "second", "third"]);

        let last_two = db.recent_turns("s1", 2).await.unwrap();
        assert_eq!(last_two[0].message, "second");
        assert_eq!(last_two[1].response, "answer to third");
    }

    #[tokio::test]
    async fn context_and_user_survive_roundtrip() {
        let db = test_store().await;
        let mut t = turn("s1", "Where are you based?", 0);
        t.user_id = Some("u42".into());
        t.context = Some(serde_json::json!({"page": "/about"}));
        db.append_turn(t).await.unwrap();

        let stored = db.session_messages("s1", 5).await.unwrap();
        assert_eq!(stored[0].user_id.as_deref(), Some("u42"));
        assert_eq!(stored[0].context.as_ref().unwrap()["page"], "/about");
        assert_eq!(stored[0].model.as_deref(), Some("llama3.1"));
    }

    #[tokio::test]
    async fn append_creates_session_implicitly() {
        let db = test_store().await;
        assert!(db.get_session("s1").await.unwrap().is_none());

        db.append_turn(turn("s1", "hello", -30)).await.unwrap();
        let session = db.get_session("s1").await.unwrap().unwrap();
        assert_eq!(session.messages.len(), 1);

        db.touch_session("s1").await.unwrap();
        let touched = db.get_session("s1").await.unwrap().unwrap();
        assert!(touched.last_activity > session.last_activity);
    }

    #[tokio::test]
    async fn touch_unknown_session_fails() {
        let db = test_store().await;
        assert!(matches!(
            db.touch_session("ghost").await,
            Err(MemoryError::SessionNotFound(_))
        ));
    }

    #[tokio::test]
    async fn create_session_with_metadata() {
        let db = test_store().await;
        let session = db
            .create_session(NewSession {
                id: None,
                user_id: Some("u1".into()),
                metadata: Some(serde_json::json!({"source": "cli"})),
            })
            .await
            .unwrap();
        assert!(session.id.starts_with("session_"));

        let loaded = db.get_session(&session.id).await.unwrap().unwrap();
        assert_eq!(loaded.user_id.as_deref(), Some("u1"));
        assert_eq!(loaded.metadata.unwrap()["source"], "cli");

        let dup = NewSession {
            id: Some(session.id.clone()),
            ..NewSession::default()
        };
        assert!(db.create_session(dup).await.is_err());
    }

    #[tokio::test]
    async fn stats_counts() {
        let db = test_store().await;
        let mut a = turn("s1", "q1", 0);
        a.user_id = Some("u1".into());
        db.append_turn(a).await.unwrap();
        db.append_turn(turn("s1", "q2", 1)).await.unwrap();
        db.append_turn(turn("s2", "q3", 2)).await.unwrap();

        let stats = db.stats(StatsRange::All).await.unwrap();
        assert_eq!(stats.total_messages, 3);
        assert_eq!(stats.total_sessions, 2);
        assert_eq!(stats.active_users, 1);
    }

    #[tokio::test]
    async fn duplicate_message_id_rejected() {
        let db = test_store().await;
        let t = turn("s1", "q", 0);
        db.append_turn(t.clone()).await.unwrap();
        assert!(matches!(
            db.append_turn(t).await,
            Err(MemoryError::Storage(_))
        ));
    }

    #[tokio::test]
    async fn open_creates_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("chatbot.db");
        let db = SqliteHistory::open(&path).await.unwrap();
        db.append_turn(turn("s1", "persisted?", 0)).await.unwrap();
        drop(db);

        let reopened = SqliteHistory::open(&path).await.unwrap();
        assert_eq!(reopened.session_messages("s1", 5).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn stats_window_top_questions_and_daily_counts() {
        let db = test_store().await;
        let old = StoredTurn {
            timestamp: Utc::now() - Duration::days(10),
            ..turn("old", "What are your skills?", 0)
        };
        db.append_turn(old).await.unwrap();
        db.append_turn(turn("s1", "What are your skills?", 0)).await.unwrap();
        db.append_turn(turn("s1", "What are your skills?", 1)).await.unwrap();
        db.append_turn(turn("s1", "Any projects?", 2)).await.unwrap();

        let week = db.stats(StatsRange::Week).await.unwrap();
        assert_eq!(week.total_messages, 3);
        assert_eq!(week.total_sessions, 1);
        assert_eq!(
            week.top_questions,
            vec![
                QuestionCount {
                    message: "What are your skills?".into(),
                    count: 2
                },
                QuestionCount {
                    message: "Any projects?".into(),
                    count: 1
                },
            ]
        );
        let in_week: u64 = week.messages_over_time.iter().map(|d| d.count).sum();
        assert_eq!(in_week, 3);

        let month = db.stats(StatsRange::Month).await.unwrap();
        assert_eq!(month.total_messages, 4);
        assert_eq!(month.total_sessions, 2);
        assert_eq!(month.messages_over_time[0].date, (Utc::now() - Duration::days(10)).date_naive());
        assert_eq!(month.messages_over_time[0].count, 1);
    }

    #[tokio::test]
    async fn unreadable_timestamp_is_reported() {
        let db = test_store().await;
        db.append_turn(turn("s1", "q", 0)).await.unwrap();
        sqlx::query("UPDATE messages SET timestamp = 'yesterday-ish'")
            .execute(&db.pool)
            .await
            .unwrap();

        assert!(matches!(
            db.session_messages("s1", 5).await,
            Err(MemoryError::QueryFailed(_))
        ));
    }
}
