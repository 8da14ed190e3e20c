//! SQLite queries for call and message records.

use chrono::NaiveDateTime;
use sqlx::SqlitePool;
use tracing::instrument;

use crate::db::{
    errors::Result,
    handlers::repository::RecordStore,
    models::{
        calls::{CallRecord, CallRow},
        messages::{MessageRecord, MessageRow},
    },
};

/// Format SQLite's `datetime()` produces and compares against
pub const SQLITE_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

fn sqlite_timestamp(ts: NaiveDateTime) -> String {
    ts.format(SQLITE_TIMESTAMP_FORMAT).to_string()
}

/// Record store backed by the voicemail assistant's SQLite database.
///
/// The tenant identifier is the `garage_id` column. Timestamps are normalized with
/// `datetime()` on both sides of the comparison so that rows written as ISO-8601 strings
/// (`2026-01-05T10:00:00Z`) and as SQLite defaults (`2026-01-05 10:00:00`) compare alike.
#[derive(Clone, Debug)]
pub struct SqliteRecordStore {
    pool: SqlitePool,
}

impl SqliteRecordStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl RecordStore for SqliteRecordStore {
    #[instrument(skip(self), err)]
    async fn fetch_calls(&self, tenant_id: &str, start: NaiveDateTime, end: NaiveDateTime) -> Result<Vec<CallRecord>> {
        let rows = sqlx::query_as::<_, CallRow>(
            r#"
            SELECT
                COALESCE(call_sid, CAST(id AS TEXT)) AS call_sid,
                from_number,
                duration,
                status,
                has_message,
                datetime(start_time) AS start_time,
                datetime(created_at) AS created_at
            FROM calls
            WHERE garage_id = ?1
              AND datetime(created_at) BETWEEN datetime(?2) AND datetime(?3)
            ORDER BY datetime(created_at), id
            "#,
        )
        .bind(tenant_id)
        .bind(sqlite_timestamp(start))
        .bind(sqlite_timestamp(end))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(CallRecord::from).collect())
    }

    #[instrument(skip(self), err)]
    async fn fetch_messages(&self, tenant_id: &str, start: NaiveDateTime, end: NaiveDateTime) -> Result<Vec<MessageRecord>> {
        let rows = sqlx::query_as::<_, MessageRow>(
            r#"
            SELECT
                COALESCE(call_sid, CAST(id AS TEXT)) AS call_sid,
                from_number,
                CAST(transcript AS BLOB) AS transcript,
                CAST(analysis AS BLOB) AS analysis,
                sent_at,
                datetime(created_at) AS created_at
            FROM messages
            WHERE garage_id = ?1
              AND datetime(created_at) BETWEEN datetime(?2) AND datetime(?3)
            ORDER BY datetime(created_at), id
            "#,
        )
        .bind(tenant_id)
        .bind(sqlite_timestamp(start))
        .bind(sqlite_timestamp(end))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(MessageRecord::from).collect())
    }

    #[instrument(skip(self), err)]
    async fn list_tenants(&self) -> Result<Vec<String>> {
        let tenants = sqlx::query_scalar::<_, String>("SELECT DISTINCT garage_id FROM calls WHERE garage_id IS NOT NULL ORDER BY garage_id")
            .fetch_all(&self.pool)
            .await?;
        Ok(tenants)
    }

    #[instrument(skip(self), err)]
    async fn date_range(&self) -> Result<Option<(NaiveDateTime, NaiveDateTime)>> {
        let (min, max) = sqlx::query_as::<_, (Option<NaiveDateTime>, Option<NaiveDateTime>)>(
            "SELECT MIN(datetime(created_at)) AS min_created_at, MAX(datetime(created_at)) AS max_created_at FROM calls",
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(min.zip(max))
    }
}
