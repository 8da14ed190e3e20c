//! Record store access.
//!
//! The KPI engine reads two tables owned by the voicemail assistant: `calls` and `messages`.
//! Access goes through the [`handlers::RecordStore`] trait so that the aggregation can run
//! against the SQLite database in production and against in-memory fixtures in tests.
//!
//! ```text
//! ┌─────────────┐
//! │ Aggregator  │  (kpi::compute_kpis)
//! └──────┬──────┘
//!        │
//!        ↓
//! ┌─────────────┐
//! │ RecordStore │  (db::handlers - SqliteRecordStore / InMemoryRecordStore)
//! └──────┬──────┘
//!        │
//!        ↓
//! ┌─────────────┐
//! │   Models    │  (db::models - rows and records)
//! └──────┬──────┘
//!        │
//!        ↓
//! ┌─────────────┐
//! │   SQLite    │
//! └─────────────┘
//! ```
//!
//! # Modules
//!
//! - [`handlers`]: the store trait and its implementations
//! - [`models`]: row structures and the records built from them
//! - [`errors`]: store-specific error types
//!
//! # Migrations
//!
//! The schema lives in `migrations/`. Migrations only create what is missing, so they can be
//! applied to an existing `voicemail.db`; the reporter normally opens the database read-only
//! and leaves them off.

use std::str::FromStr;
use std::time::Duration;

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tracing::info;

use crate::config::DatabaseConfig;

pub mod errors;
pub mod handlers;
pub mod models;

use errors::DbError;

/// Get the record store migrator
pub fn migrator() -> sqlx::migrate::Migrator {
    sqlx::migrate!("./migrations")
}

/// Open a connection pool on the configured SQLite database, running migrations if enabled.
pub async fn connect(config: &DatabaseConfig) -> errors::Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(&config.url)?
        .read_only(config.read_only)
        .create_if_missing(config.create_if_missing);

    let mut pool_options = SqlitePoolOptions::new()
        .max_connections(config.pool.max_connections)
        .min_connections(config.pool.min_connections)
        .acquire_timeout(Duration::from_secs(config.pool.acquire_timeout_secs));

    if config.pool.idle_timeout_secs > 0 {
        pool_options = pool_options.idle_timeout(Duration::from_secs(config.pool.idle_timeout_secs));
    }

    let pool = pool_options.connect_with(options).await?;

    if config.run_migrations {
        info!("Running record store migrations");
        migrator()
            .run(&pool)
            .await
            .map_err(|e| DbError::Other(anyhow::anyhow!("run migrations: {e}")))?;
    }

    Ok(pool)
}
