//! In-memory record store.
//!
//! Holds records in a `RwLock`-guarded vector. It is suitable for tests and for rendering
//! reports from fixtures without a database. Records without a creation timestamp never match a
//! window, like `NULL BETWEEN a AND b` in SQL.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::NaiveDateTime;
use tokio::sync::RwLock;

use crate::db::{
    errors::Result,
    handlers::repository::RecordStore,
    models::{calls::CallRecord, messages::MessageRecord},
};

#[derive(Default)]
struct Records {
    calls: Vec<(String, CallRecord)>,
    messages: Vec<(String, MessageRecord)>,
}

/// In-memory implementation of the [`RecordStore`] trait.
///
/// ```ignore
/// let store = InMemoryRecordStore::new();
/// store.insert_call("Garage Test", call).await;
/// let calls = store.fetch_calls("Garage Test", start, end).await?;
/// ```
#[derive(Clone, Default)]
pub struct InMemoryRecordStore {
    records: Arc<RwLock<Records>>,
}

fn in_window(created_at: Option<NaiveDateTime>, start: NaiveDateTime, end: NaiveDateTime) -> bool {
    created_at.is_some_and(|ts| start <= ts && ts <= end)
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_call(&self, tenant_id: impl Into<String>, call: CallRecord) {
        self.records.write().await.calls.push((tenant_id.into(), call));
    }

    pub async fn insert_message(&self, tenant_id: impl Into<String>, message: MessageRecord) {
        self.records.write().await.messages.push((tenant_id.into(), message));
    }
}

#[async_trait::async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn fetch_calls(&self, tenant_id: &str, start: NaiveDateTime, end: NaiveDateTime) -> Result<Vec<CallRecord>> {
        let records = self.records.read().await;
        Ok(records
            .calls
            .iter()
            .filter(|(tenant, call)| tenant == tenant_id && in_window(call.created_at, start, end))
            .map(|(_, call)| call.clone())
            .collect())
    }

    async fn fetch_messages(&self, tenant_id: &str, start: NaiveDateTime, end: NaiveDateTime) -> Result<Vec<MessageRecord>> {
        let records = self.records.read().await;
        Ok(records
            .messages
            .iter()
            .filter(|(tenant, message)| tenant == tenant_id && in_window(message.created_at, start, end))
            .map(|(_, message)| message.clone())
            .collect())
    }

    async fn list_tenants(&self) -> Result<Vec<String>> {
        let records = self.records.read().await;
        let tenants: BTreeSet<&String> = records.calls.iter().map(|(tenant, _)| tenant).collect();
        Ok(tenants.into_iter().cloned().collect())
    }

    async fn date_range(&self) -> Result<Option<(NaiveDateTime, NaiveDateTime)>> {
        let records = self.records.read().await;
        let timestamps = records.calls.iter().filter_map(|(_, call)| call.created_at);
        let range = timestamps.fold(None, |acc: Option<(NaiveDateTime, NaiveDateTime)>, ts| match acc {
            None => Some((ts, ts)),
            Some((min, max)) => Some((min.min(ts), max.max(ts))),
        });
        Ok(range)
    }
}
