//! Database models for voicemail messages.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Row returned by the messages query. `transcript` and `analysis` are read as bytes since
/// upstream writers do not guarantee UTF-8.
#[derive(Debug, Clone, FromRow)]
pub struct MessageRow {
    pub call_sid: String,
    pub from_number: Option<String>,
    pub transcript: Option<Vec<u8>>,
    pub analysis: Option<Vec<u8>>,
    pub sent_at: Option<String>,
    pub created_at: Option<NaiveDateTime>,
}

/// A transcribed voicemail, read-only
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageRecord {
    /// Call the voicemail was left on
    pub call_sid: String,
    pub from_number: Option<String>,
    pub transcript: Option<String>,
    /// JSON analysis produced upstream; may be missing, empty or malformed
    pub analysis: Option<String>,
    /// When the voicemail was forwarded to the garage, as written by the dispatcher
    pub sent_at: Option<String>,
    pub created_at: Option<NaiveDateTime>,
}

impl MessageRecord {
    /// A message was dispatched when its sent timestamp is present and non-empty.
    pub fn was_sent(&self) -> bool {
        self.sent_at.as_deref().is_some_and(|s| !s.is_empty())
    }
}

impl From<MessageRow> for MessageRecord {
    fn from(row: MessageRow) -> Self {
        let analysis = row.analysis.and_then(|bytes| match String::from_utf8(bytes) {
            Ok(text) => Some(text),
            Err(e) => {
                tracing::trace!(call_sid = %row.call_sid, error = %e, "Analysis is not UTF-8, treating as absent");
                None
            }
        });

        Self {
            call_sid: row.call_sid,
            from_number: row.from_number,
            transcript: row.transcript.map(|bytes| String::from_utf8_lossy(&bytes).into_owned()),
            analysis,
            sent_at: row.sent_at,
            created_at: row.created_at,
        }
    }
}
