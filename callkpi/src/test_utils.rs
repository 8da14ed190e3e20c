//! Test utilities for record fixtures and configuration (available with `test-utils` feature).

use std::path::Path;
use std::time::Duration;

use chrono::NaiveDateTime;
use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;

use crate::config::{Config, EmailConfig, EmailTransportConfig, PeriodConfig, TenantConfig};
use crate::db::models::{calls::CallRecord, messages::MessageRecord};

/// Parse a `YYYY-MM-DD HH:MM:SS` timestamp
pub fn ts(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").expect("Invalid test timestamp")
}

/// A bare call: no status, duration, caller or voicemail
pub fn call(call_sid: &str, created_at: &str) -> CallRecord {
    CallRecord {
        call_sid: call_sid.to_string(),
        from_number: None,
        duration_secs: None,
        status: None,
        has_voicemail: false,
        start_time: None,
        created_at: Some(ts(created_at)),
    }
}

/// A bare voicemail: no analysis, not sent
pub fn message(call_sid: &str, created_at: &str) -> MessageRecord {
    MessageRecord {
        call_sid: call_sid.to_string(),
        from_number: None,
        transcript: None,
        analysis: None,
        sent_at: None,
        created_at: Some(ts(created_at)),
    }
}

/// Single-connection in-memory database with the schema applied.
///
/// Each `sqlite::memory:` connection is its own database, so the pool must never open a second
/// one.
pub async fn setup_test_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to open in-memory database");

    crate::db::migrator().run(&pool).await.expect("Failed to run migrations");
    pool
}

/// Row to insert into `calls`. Timestamps are stored verbatim, so tests can use any format the
/// upstream writer might produce.
#[derive(Debug, Clone)]
pub struct CallFixture {
    pub call_sid: String,
    pub garage_id: String,
    pub created_at: String,
    pub from_number: Option<String>,
    pub status: Option<String>,
    pub duration: Option<i64>,
    pub has_message: i64,
}

impl CallFixture {
    pub fn new(call_sid: &str, garage_id: &str, created_at: &str) -> Self {
        Self {
            call_sid: call_sid.to_string(),
            garage_id: garage_id.to_string(),
            created_at: created_at.to_string(),
            from_number: None,
            status: None,
            duration: None,
            has_message: 0,
        }
    }

    pub fn status(mut self, status: &str) -> Self {
        self.status = Some(status.to_string());
        self
    }

    pub fn duration(mut self, seconds: i64) -> Self {
        self.duration = Some(seconds);
        self
    }

    pub fn from_number(mut self, number: &str) -> Self {
        self.from_number = Some(number.to_string());
        self
    }

    pub fn voicemail(mut self) -> Self {
        self.has_message = 1;
        self
    }
}

#[derive(Debug, Clone)]
pub struct MessageFixture {
    pub call_sid: String,
    pub garage_id: String,
    pub created_at: String,
    pub analysis: Option<String>,
    pub sent_at: Option<String>,
}

impl MessageFixture {
    pub fn new(call_sid: &str, garage_id: &str, created_at: &str) -> Self {
        Self {
            call_sid: call_sid.to_string(),
            garage_id: garage_id.to_string(),
            created_at: created_at.to_string(),
            analysis: None,
            sent_at: None,
        }
    }

    pub fn analysis(mut self, analysis: &str) -> Self {
        self.analysis = Some(analysis.to_string());
        self
    }

    pub fn sent_at(mut self, sent_at: &str) -> Self {
        self.sent_at = Some(sent_at.to_string());
        self
    }
}

pub async fn insert_call(pool: &SqlitePool, fixture: &CallFixture) {
    sqlx::query(
        "INSERT INTO calls (call_sid, from_number, duration, status, has_message, garage_id, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
    )
    .bind(&fixture.call_sid)
    .bind(&fixture.from_number)
    .bind(fixture.duration)
    .bind(&fixture.status)
    .bind(fixture.has_message)
    .bind(&fixture.garage_id)
    .bind(&fixture.created_at)
    .execute(pool)
    .await
    .expect("Failed to insert call");
}

pub async fn insert_message(pool: &SqlitePool, fixture: &MessageFixture) {
    sqlx::query(
        "INSERT INTO messages (call_sid, analysis, sent_at, garage_id, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
    )
    .bind(&fixture.call_sid)
    .bind(&fixture.analysis)
    .bind(&fixture.sent_at)
    .bind(&fixture.garage_id)
    .bind(&fixture.created_at)
    .execute(pool)
    .await
    .expect("Failed to insert message");
}

/// Configuration writing reports and file-transport emails under `dir`, reporting January 2026
pub fn create_test_config(dir: &Path) -> Config {
    Config {
        output_dir: dir.join("rapports"),
        email: EmailConfig {
            transport: EmailTransportConfig::File {
                path: dir.join("emails").to_string_lossy().into_owned(),
            },
            from_email: "reports@example.com".to_string(),
            ..Default::default()
        },
        tenants: vec![TenantConfig {
            to_email: Some("client@example.com".to_string()),
            ..TenantConfig::discovered("Garage Test")
        }],
        periods: vec![PeriodConfig::Fixed {
            name: "Janvier 2026".to_string(),
            slug: "Janvier".to_string(),
            start: ts("2026-01-01 00:00:00"),
            end: ts("2026-01-31 23:59:59"),
        }],
        fetch_timeout: Duration::from_secs(5),
        ..Default::default()
    }
}
