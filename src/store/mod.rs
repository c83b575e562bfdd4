//! Embedded analytical store
//!
//! A single SQLite connection shared by every read and write. The pool is
//! capped at one connection and never recycles it, so an in-memory store
//! lives as long as the [`Store`] does.
//!
//! Table ownership:
//! - `crm_records`, `equipment_records`: replaced wholesale on every load
//! - `company_mappings`: insert-only, unique on the name pair
//! - `_meta`: key/value rows (the data fingerprint)
//! - `unified_companies`: dropped and recreated on every rebuild

mod mappings;
mod meta;
mod schema;
mod sources;
mod unified;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;

use crate::error::{ReconcileError, Result};
use crate::oplog::OperationalLog;

pub(crate) use schema::{CRM_TABLE, EQUIPMENT_TABLE, UNIFIED_TABLE};
pub use unified::ProjectionSource;

const MEMORY_PATH: &str = ":memory:";

/// Handle to the analytical store
#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
    read_only: bool,
    location: String,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("location", &self.location)
            .field("read_only", &self.read_only)
            .finish()
    }
}

impl Store {
    /// Open the store read-write, falling back to read-only.
    ///
    /// The fallback is taken when the file cannot be opened for writing or
    /// the owned tables cannot be created (typically a lock held by another
    /// process). If the read-only attempt fails too the error is fatal.
    pub async fn open(path: &str, log: &OperationalLog) -> Result<Self> {
        if path == MEMORY_PATH {
            return Self::in_memory().await;
        }

        let rw_error = match Self::open_read_write(path).await {
            Ok(store) => {
                log.info(format!("Connected to store at {}", path));
                return Ok(store);
            }
            Err(e) => e,
        };

        log.warn(format!(
            "Could not open store at {} read-write ({}); retrying read-only",
            path, rw_error
        ));

        match Self::open_read_only(path).await {
            Ok(store) => {
                log.warn(format!("Connected to store at {} in READ-ONLY mode", path));
                Ok(store)
            }
            Err(ro_error) => Err(ReconcileError::StoreUnavailable {
                path: path.to_string(),
                message: format!("read-write: {}; read-only: {}", rw_error, ro_error),
            }),
        }
    }

    /// Private in-memory store
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = Self::pool_options().connect_with(options).await?;
        let store = Self {
            pool,
            read_only: false,
            location: MEMORY_PATH.to_string(),
        };
        schema::ensure_owned_tables(&store.pool).await?;
        Ok(store)
    }

    /// Open an existing store file without write access
    pub async fn open_read_only(path: &str) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .journal_mode(SqliteJournalMode::Delete)
            .read_only(true)
            .create_if_missing(false);
        let pool = Self::pool_options().connect_with(options).await?;

        // a file that is not a database only fails on first use
        sqlx::query("SELECT count(*) FROM sqlite_master")
            .execute(&pool)
            .await?;

        Ok(Self {
            pool,
            read_only: true,
            location: path.to_string(),
        })
    }

    async fn open_read_write(path: &str) -> Result<Self> {
        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .journal_mode(SqliteJournalMode::Delete)
            .create_if_missing(true);
        let pool = Self::pool_options().connect_with(options).await?;
        schema::ensure_owned_tables(&pool).await?;

        Ok(Self {
            pool,
            read_only: false,
            location: path.to_string(),
        })
    }

    fn pool_options() -> SqlitePoolOptions {
        SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close the shared connection
    pub async fn close(&self) {
        self.pool.close().await;
    }

    pub(crate) fn ensure_writable(&self, operation: &str) -> Result<()> {
        if self.read_only {
            return Err(ReconcileError::ReadOnly {
                operation: operation.to_string(),
            });
        }
        Ok(())
    }

    pub async fn table_exists(&self, table: &str) -> Result<bool> {
        let found: Option<(String,)> = sqlx::query_as(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?",
        )
        .bind(table)
        .fetch_optional(&self.pool)
        .await?;
        Ok(found.is_some())
    }

    /// Row count of a table, 0 when the table is absent
    pub async fn row_count(&self, table: &str) -> Result<i64> {
        if !self.table_exists(table).await? {
            return Ok(0);
        }
        // table name checked against sqlite_master above
        let (count,): (i64,) = sqlx::query_as(&format!("SELECT count(*) FROM \"{}\"", table))
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

/// Rows per multi-row INSERT, keeping bound parameters under SQLite's limit
pub(crate) fn rows_per_insert(columns: usize) -> usize {
    const MAX_PARAMS: usize = 900;
    (MAX_PARAMS / columns.max(1)).max(1)
}
