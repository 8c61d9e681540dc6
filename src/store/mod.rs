use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, ErrorCode};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use thiserror::Error;

pub mod aggregate;
pub mod friends;
pub mod posts;
pub mod query;
pub mod users;

use aggregate::AggregateError;

/// Deadline applied to every store operation unless configured otherwise.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Fixed textual timestamp format used for every stored timestamp.
/// Millisecond precision in UTC, so values also sort lexicographically.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";
const TIMESTAMP_PARSE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.fZ";

// VM instructions between deadline checks.
const PROGRESS_INTERVAL: i32 = 1000;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(rusqlite::Error),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Duplicate {0}")]
    Duplicate(String),
    #[error("Users are already friends")]
    AlreadyFriends,
    #[error("Users are not friends")]
    NotFriends,
    #[error("A user cannot befriend themselves")]
    SelfFriendship,
    #[error("Operation exceeded its deadline")]
    Timeout,
    #[error("Database is busy")]
    Busy,
    #[error("Database connection unavailable")]
    Unavailable,
    #[error("Aggregation error: {0}")]
    Aggregate(#[from] AggregateError),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match err.sqlite_error_code() {
            Some(ErrorCode::OperationInterrupted) => StoreError::Timeout,
            Some(ErrorCode::DatabaseBusy) | Some(ErrorCode::DatabaseLocked) => StoreError::Busy,
            _ => StoreError::Database(err),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Thread-safe SQLite store
pub struct Store {
    conn: Arc<Mutex<Connection>>,
    timeout: Duration,
}

impl Store {
    /// Create a new store with the given database path
    pub fn new(db_path: &str) -> StoreResult<Self> {
        Self::with_timeout(db_path, DEFAULT_TIMEOUT)
    }

    /// Create an in-memory store for testing
    pub fn in_memory() -> StoreResult<Self> {
        Self::with_timeout(":memory:", DEFAULT_TIMEOUT)
    }

    /// Open a store whose operations fail with `StoreError::Timeout` once they
    /// run past `timeout`.
    pub fn with_timeout(db_path: &str, timeout: Duration) -> StoreResult<Self> {
        let conn = Connection::open(db_path)?;
        conn.busy_timeout(timeout)?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
            timeout,
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> StoreResult<()> {
        let conn = self.conn.lock().map_err(|_| StoreError::Unavailable)?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                email TEXT UNIQUE,
                phone TEXT UNIQUE,
                password_hash TEXT NOT NULL,
                image_url TEXT NOT NULL DEFAULT '',
                friend_count INTEGER NOT NULL DEFAULT 0 CHECK (friend_count >= 0),
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS friends (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                follow_user_id TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                FOREIGN KEY (user_id) REFERENCES users(id),
                FOREIGN KEY (follow_user_id) REFERENCES users(id),
                UNIQUE(user_id, follow_user_id),
                CHECK (user_id <> follow_user_id)
            );

            CREATE TABLE IF NOT EXISTS posts (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                content TEXT NOT NULL,
                tags TEXT NOT NULL DEFAULT '[]',
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                FOREIGN KEY (user_id) REFERENCES users(id)
            );

            CREATE TABLE IF NOT EXISTS post_comments (
                id TEXT PRIMARY KEY,
                post_id TEXT NOT NULL,
                user_id TEXT NOT NULL,
                comment TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                FOREIGN KEY (post_id) REFERENCES posts(id),
                FOREIGN KEY (user_id) REFERENCES users(id)
            );

            CREATE INDEX IF NOT EXISTS idx_users_created_at ON users(created_at);
            CREATE INDEX IF NOT EXISTS idx_users_friend_count ON users(friend_count);
            CREATE INDEX IF NOT EXISTS idx_friends_follow_user_id ON friends(follow_user_id);
            CREATE INDEX IF NOT EXISTS idx_posts_created_at ON posts(created_at);
            CREATE INDEX IF NOT EXISTS idx_post_comments_post_id ON post_comments(post_id);
            "#,
        )?;
        Ok(())
    }

    /// Run `f` against the connection with the store deadline armed.
    ///
    /// The deadline starts before waiting for the connection, so time spent
    /// queued behind other operations counts against it. A statement still
    /// executing when the deadline passes is interrupted and reported as
    /// `StoreError::Timeout`; any transaction opened inside `f` is rolled back
    /// when it is dropped uncommitted.
    pub(crate) fn run<T, F>(&self, op: &'static str, f: F) -> StoreResult<T>
    where
        F: FnOnce(&mut Connection) -> StoreResult<T>,
    {
        let deadline = Instant::now() + self.timeout;
        let mut conn = self.conn.lock().map_err(|_| StoreError::Unavailable)?;
        if Instant::now() >= deadline {
            log::warn!("store operation {} timed out waiting for the connection", op);
            return Err(StoreError::Timeout);
        }
        conn.progress_handler(PROGRESS_INTERVAL, Some(move || Instant::now() >= deadline));

        let result = f(&mut *conn);

        conn.progress_handler(PROGRESS_INTERVAL, None::<fn() -> bool>);

        if let Err(ref e) = result {
            match e {
                StoreError::Database(_) | StoreError::Timeout | StoreError::Busy => {
                    log::warn!("store operation {} failed: {}", op, e)
                }
                _ => log::debug!("store operation {} rejected: {}", op, e),
            }
        }
        result
    }
}

pub(crate) fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

pub(crate) fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    NaiveDateTime::parse_from_str(s, TIMESTAMP_PARSE_FORMAT).map(|naive| naive.and_utc())
}

/// Current time truncated to what the stored format can represent, so values
/// handed back to callers equal what a later read returns.
pub(crate) fn now() -> DateTime<Utc> {
    let now = Utc::now();
    parse_timestamp(&format_timestamp(&now)).unwrap_or(now)
}

pub(crate) fn get_datetime(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    parse_timestamp(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Whether `err` is a UNIQUE or PRIMARY KEY violation.
pub(crate) fn is_unique_violation(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(e, _) => {
            e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                || e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
        }
        _ => false,
    }
}

pub(crate) fn is_foreign_key_violation(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(e, _) => {
            e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY
        }
        _ => false,
    }
}

/// Identifiers are UUIDs; anything else cannot name a stored row.
pub(crate) fn is_valid_id(id: &str) -> bool {
    uuid::Uuid::parse_str(id).is_ok()
}
