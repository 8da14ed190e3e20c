//! Base trait for record store access.

use chrono::NaiveDateTime;

use crate::db::errors::Result;
use crate::db::models::{calls::CallRecord, messages::MessageRecord};

/// Read-only query interface over call and message records.
///
/// Windows are inclusive on both ends (`BETWEEN start AND end`) and filter on the record's
/// creation timestamp. Tenant identifiers are matched exactly. A reversed window matches
/// nothing.
#[async_trait::async_trait]
pub trait RecordStore: Send + Sync {
    /// Calls created within `[start, end]` for the tenant
    async fn fetch_calls(&self, tenant_id: &str, start: NaiveDateTime, end: NaiveDateTime) -> Result<Vec<CallRecord>>;

    /// Messages created within `[start, end]` for the tenant
    async fn fetch_messages(&self, tenant_id: &str, start: NaiveDateTime, end: NaiveDateTime) -> Result<Vec<MessageRecord>>;

    /// Distinct tenants with at least one call, sorted
    async fn list_tenants(&self) -> Result<Vec<String>>;

    /// Earliest and latest call creation timestamps, `None` when there are no calls
    async fn date_range(&self) -> Result<Option<(NaiveDateTime, NaiveDateTime)>>;
}
