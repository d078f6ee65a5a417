//! Storage layer for user points and credited poll answers
//!
//! Provides a persistent storage implementation on top of an embedded SQLite
//! database. Two relations are kept:
//!
//! - `user_points`: one row per user with the running point total
//! - `poll_answers`: one row per credited `(poll_id, user_id)` pair, unique

use crate::config::DATABASE_MAX_CONNECTIONS;
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Executor, FromRow, Sqlite, SqlitePool};
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, info};

/// Errors that can occur during storage operations
#[derive(Error, Debug)]
pub enum StorageError {
    /// Error reported by the database driver
    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),
    /// Award amounts must be non-negative
    #[error("Invalid award amount: {0}")]
    InvalidAmount(i64),
}

/// One leaderboard row
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct LeaderboardEntry {
    /// Last seen name of the user
    pub display_name: String,
    /// Current point total
    pub points: i64,
}

/// One user meeting a point threshold
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct WhitelistEntry {
    /// Telegram user ID
    pub user_id: i64,
    /// Last seen name of the user
    pub display_name: String,
}

/// Result of crediting a poll answer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreditOutcome {
    /// The pair was new; the award was applied
    Credited,
    /// The pair was already credited; nothing changed
    Duplicate,
}

/// Interface for point storage providers
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PointsStore: Send + Sync {
    /// Get a user's point total, 0 when the user is unknown
    async fn get_points(&self, user_id: i64) -> Result<i64, StorageError>;
    /// Add `amount` points to a user, creating the record if needed and
    /// overwriting the stored display name
    async fn award_point(
        &self,
        user_id: i64,
        display_name: &str,
        amount: i64,
    ) -> Result<(), StorageError>;
    /// Check whether the pair has already been credited
    async fn has_credited(&self, poll_id: &str, user_id: i64) -> Result<bool, StorageError>;
    /// Record the pair as credited. Returns `false` when it already was.
    async fn mark_credited(&self, poll_id: &str, user_id: i64) -> Result<bool, StorageError>;
    /// Mark the pair and award the points as one transaction
    async fn credit_answer(
        &self,
        poll_id: &str,
        user_id: i64,
        display_name: &str,
        amount: i64,
    ) -> Result<CreditOutcome, StorageError>;
    /// Highest scoring users, at most `limit` of them
    async fn top_n(&self, limit: u32) -> Result<Vec<LeaderboardEntry>, StorageError>;
    /// All users with `points >= min_points`, highest first
    async fn above_threshold(&self, min_points: i64) -> Result<Vec<WhitelistEntry>, StorageError>;
    /// Check connection to storage
    async fn check_connection(&self) -> Result<(), StorageError>;
}

const CREATE_USER_POINTS: &str = "CREATE TABLE IF NOT EXISTS user_points (
        user_id INTEGER PRIMARY KEY,
        username TEXT,
        points INTEGER NOT NULL DEFAULT 0
    )";

const CREATE_POLL_ANSWERS: &str = "CREATE TABLE IF NOT EXISTS poll_answers (
        poll_id TEXT NOT NULL,
        user_id INTEGER NOT NULL,
        UNIQUE(poll_id, user_id)
    )";

const UPSERT_POINTS: &str = "INSERT INTO user_points (user_id, username, points)
     VALUES (?1, ?2, ?3)
     ON CONFLICT(user_id) DO UPDATE SET
         points = user_points.points + excluded.points,
         username = excluded.username";

const INSERT_ANSWER: &str = "INSERT OR IGNORE INTO poll_answers (poll_id, user_id) VALUES (?1, ?2)";

/// SQLite-backed storage implementation
#[derive(Clone)]
pub struct SqliteStorage {
    pool: SqlitePool,
}

impl SqliteStorage {
    /// Open (or create) the database and make sure the schema exists.
    ///
    /// `sqlite::memory:` URLs get a single long-lived connection so the
    /// database survives between calls.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid, the file cannot be opened, or
    /// schema creation fails.
    pub async fn connect(database_url: &str) -> Result<Self, StorageError> {
        let in_memory = database_url.contains(":memory:");
        let options = SqliteConnectOptions::from_str(database_url)?
            .journal_mode(SqliteJournalMode::Wal)
            .create_if_missing(true);

        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(DATABASE_MAX_CONNECTIONS)
        };

        let pool = pool_options.connect_with(options).await?;
        let storage = Self { pool };
        storage.init_schema().await?;
        info!("SQLite storage ready at {database_url}");
        Ok(storage)
    }

    /// Create tables if they do not exist yet. Safe to run on every start.
    ///
    /// # Errors
    ///
    /// Returns an error if a DDL statement fails.
    pub async fn init_schema(&self) -> Result<(), StorageError> {
        sqlx::query(CREATE_USER_POINTS).execute(&self.pool).await?;
        sqlx::query(CREATE_POLL_ANSWERS).execute(&self.pool).await?;
        Ok(())
    }
}

async fn upsert_points<'e, E>(
    executor: E,
    user_id: i64,
    display_name: &str,
    amount: i64,
) -> Result<(), StorageError>
where
    E: Executor<'e, Database = Sqlite>,
{
    if amount < 0 {
        return Err(StorageError::InvalidAmount(amount));
    }
    sqlx::query(UPSERT_POINTS)
        .bind(user_id)
        .bind(display_name)
        .bind(amount)
        .execute(executor)
        .await?;
    Ok(())
}

#[async_trait]
impl PointsStore for SqliteStorage {
    async fn get_points(&self, user_id: i64) -> Result<i64, StorageError> {
        let points =
            sqlx::query_scalar::<_, i64>("SELECT points FROM user_points WHERE user_id = ?1")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(points.unwrap_or(0))
    }

    async fn award_point(
        &self,
        user_id: i64,
        display_name: &str,
        amount: i64,
    ) -> Result<(), StorageError> {
        upsert_points(&self.pool, user_id, display_name, amount).await
    }

    async fn has_credited(&self, poll_id: &str, user_id: i64) -> Result<bool, StorageError> {
        let found = sqlx::query_scalar::<_, i64>(
            "SELECT 1 FROM poll_answers WHERE poll_id = ?1 AND user_id = ?2",
        )
        .bind(poll_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(found.is_some())
    }

    async fn mark_credited(&self, poll_id: &str, user_id: i64) -> Result<bool, StorageError> {
        let result = sqlx::query(INSERT_ANSWER)
            .bind(poll_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn credit_answer(
        &self,
        poll_id: &str,
        user_id: i64,
        display_name: &str,
        amount: i64,
    ) -> Result<CreditOutcome, StorageError> {
        if amount < 0 {
            return Err(StorageError::InvalidAmount(amount));
        }

        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(INSERT_ANSWER)
            .bind(poll_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?
            .rows_affected()
            == 1;

        if !inserted {
            tx.rollback().await?;
            debug!("Answer of user {user_id} to poll {poll_id} was already credited");
            return Ok(CreditOutcome::Duplicate);
        }

        upsert_points(&mut *tx, user_id, display_name, amount).await?;
        tx.commit().await?;
        Ok(CreditOutcome::Credited)
    }

    async fn top_n(&self, limit: u32) -> Result<Vec<LeaderboardEntry>, StorageError> {
        let rows = sqlx::query_as::<_, LeaderboardEntry>(
            "SELECT COALESCE(username, 'Unknown') AS display_name, points FROM user_points
             ORDER BY points DESC, user_id ASC
             LIMIT ?1",
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn above_threshold(&self, min_points: i64) -> Result<Vec<WhitelistEntry>, StorageError> {
        let rows = sqlx::query_as::<_, WhitelistEntry>(
            "SELECT user_id, COALESCE(username, 'Unknown') AS display_name FROM user_points
             WHERE points >= ?1
             ORDER BY points DESC, user_id ASC",
        )
        .bind(min_points)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn check_connection(&self) -> Result<(), StorageError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        info!("SQLite storage connection check passed.");
        Ok(())
    }
}
