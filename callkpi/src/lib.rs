//! # callkpi: KPI reports for the voicemail assistant
//!
//! `callkpi` reads the call log and transcribed voicemails that the voicemail assistant stores
//! per garage, reduces them to a fixed set of key performance indicators for a reporting period,
//! and publishes the result: one styled HTML report per garage and period, a consolidated
//! Markdown report, and an email to each garage with its report attached.
//!
//! ## Architecture
//!
//! - **Record store** ([`db`]): read-only access to the `calls` and `messages` tables behind the
//!   [`db::handlers::RecordStore`] trait, with a SQLite implementation and an in-memory one.
//! - **Aggregator** ([`kpi`]): [`kpi::compute_kpis`] fetches one tenant's records for an
//!   inclusive window and reduces them to a [`kpi::KpiResult`]. The reduction is pure and
//!   stateless; malformed voicemail analyses are tolerated.
//! - **Periods** ([`periods`]): rolling and fixed reporting windows.
//! - **Rendering** ([`report`]): HTML and Markdown templates.
//! - **Delivery** ([`email`]): SMTP or file transport.
//! - **Runner** ([`runner`]): the batch run tying these together with bounded concurrency,
//!   per-job timeouts and cancellation.
//!
//! ## Quick Start
//!
//! ```no_run
//! use clap::Parser;
//! use callkpi::{Application, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = callkpi::config::Args::parse();
//!     let config = Config::load(&args)?;
//!     callkpi::telemetry::init_telemetry(config.enable_otel_export)?;
//!
//!     let app = Application::new(config).await?;
//!     let summary = app.run(tokio_util::sync::CancellationToken::new()).await?;
//!     println!("{} report(s) written, {} sent", summary.reports_written.len(), summary.sent);
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration
//!
//! See the [`config`] module for configuration options.

pub mod config;
pub mod db;
pub mod email;
pub mod errors;
pub mod kpi;
pub mod periods;
pub mod report;
pub mod runner;
pub mod telemetry;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

#[cfg(test)]
mod test;

use std::sync::Arc;

use sqlx::SqlitePool;
use tokio_util::sync::CancellationToken;
use tracing::info;

pub use config::Config;
pub use db::migrator;

use crate::db::handlers::SqliteRecordStore;
use crate::email::EmailService;
use crate::runner::{ReportRunner, RunSummary, SelfCheck};

/// The report generator wired to its SQLite record store and mail transport.
pub struct Application {
    runner: ReportRunner,
    pool: SqlitePool,
}

impl Application {
    /// Open the record store and build the mail transport (unless delivery is disabled)
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let pool = db::connect(&config.database).await?;
        info!(url = %config.database.url, read_only = config.database.read_only, "Record store opened");

        Self::new_with_pool(config, pool)
    }

    /// Build the application on an existing pool
    pub fn new_with_pool(config: Config, pool: SqlitePool) -> anyhow::Result<Self> {
        let email = if config.send_reports {
            Some(EmailService::new(&config)?)
        } else {
            info!("Report delivery disabled");
            None
        };

        let store = Arc::new(SqliteRecordStore::new(pool.clone()));
        let runner = ReportRunner::new(config, store, email)?;

        Ok(Self { runner, pool })
    }

    pub async fn run(&self, cancel: CancellationToken) -> errors::Result<RunSummary> {
        self.runner.run(cancel).await
    }

    pub async fn self_check(&self) -> SelfCheck {
        self.runner.self_check().await
    }

    pub fn runner(&self) -> &ReportRunner {
        &self.runner
    }

    /// Close the record store
    pub async fn shutdown(self) {
        self.pool.close().await;
    }
}
