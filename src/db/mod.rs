//! Database module for persistent storage.
//!
//! Provides async SQLite access using SQLx for the identity store:
//! - `users`: one row per distinguished actor
//! - `nicks`: nickname history per user
//! - `hosts`: ident@hostname history per user
//!
//! One database file exists per configured network. All writes are committed
//! before the calling operation returns.

mod identities;

pub use identities::{IdentityRepository, User, UserId};

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use thiserror::Error;
use tracing::info;

static MEMDB_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Identity store errors.
///
/// Any of these means the store is unreachable or corrupt; callers treat them
/// as fatal for the operation that triggered them.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
    #[error("database integrity check failed: {0}")]
    Integrity(String),
    #[error("storage directory error: {0}")]
    Io(#[from] std::io::Error),
}

/// Database handle.
///
/// The pool is capped at a single connection: the store is one shared
/// resource owned by the identity resolver and used from the event loop only.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Connection acquire timeout - a locked database file must not stall the loop forever.
    const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

    /// Open (or create) the database at `path`, creating tables if absent.
    ///
    /// `":memory:"` opens a private in-memory database, used by tests.
    pub async fn new(path: &str) -> Result<Self, StorageError> {
        let pool = if path == ":memory:" {
            // Each call gets its own named shared-cache database so parallel
            // tests never see each other's rows.
            let id = MEMDB_COUNTER.fetch_add(1, Ordering::Relaxed);
            let memdb_uri = format!(
                "file:pancakesbot-memdb-{}-{}?mode=memory&cache=shared",
                std::process::id(),
                id
            );

            let options = SqliteConnectOptions::new()
                .filename(&memdb_uri)
                .shared_cache(true)
                .foreign_keys(true)
                .create_if_missing(true);

            // The in-memory database lives only as long as its connection.
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .acquire_timeout(Self::ACQUIRE_TIMEOUT)
                .connect_with(options)
                .await?
        } else {
            if let Some(parent) = Path::new(path).parent()
                && !parent.as_os_str().is_empty()
            {
                std::fs::create_dir_all(parent)?;
            }

            let options = SqliteConnectOptions::new()
                .filename(path)
                .create_if_missing(true)
                .foreign_keys(true)
                .journal_mode(SqliteJournalMode::Wal)
                .synchronous(SqliteSynchronous::Normal);

            SqlitePoolOptions::new()
                .max_connections(1)
                .acquire_timeout(Self::ACQUIRE_TIMEOUT)
                .test_before_acquire(true)
                .connect_with(options)
                .await?
        };

        info!(path = %path, "Identity database connected");

        Self::run_migrations(&pool).await?;

        // Refuse to run on top of a corrupt file.
        let integrity_result: String = sqlx::query_scalar("PRAGMA integrity_check")
            .fetch_one(&pool)
            .await?;

        if integrity_result != "ok" {
            tracing::error!(
                integrity_check = %integrity_result,
                "Identity database integrity check FAILED"
            );
            return Err(StorageError::Integrity(integrity_result));
        }

        Ok(Self { pool })
    }

    /// Get reference to the underlying connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Create the identity tables if they do not exist yet.
    async fn run_migrations(pool: &SqlitePool) -> Result<(), StorageError> {
        sqlx::migrate!("./migrations").run(pool).await?;

        info!("Identity schema checked/applied");
        Ok(())
    }

    /// Get identity repository.
    pub fn identities(&self) -> IdentityRepository<'_> {
        IdentityRepository::new(&self.pool)
    }
}
