//! Database models for calls.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Status reported by the telephony provider for a call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum CallStatus {
    Completed,
    InProgress,
    Missed,
    /// Any other provider status (`busy`, `no-answer`, ...), kept verbatim
    Other(String),
}

impl CallStatus {
    /// Completed and in-progress calls were picked up.
    pub fn is_answered(&self) -> bool {
        matches!(self, CallStatus::Completed | CallStatus::InProgress)
    }

    pub fn is_missed(&self) -> bool {
        matches!(self, CallStatus::Missed)
    }

    pub fn as_str(&self) -> &str {
        match self {
            CallStatus::Completed => "completed",
            CallStatus::InProgress => "in-progress",
            CallStatus::Missed => "missed",
            CallStatus::Other(s) => s,
        }
    }
}

impl From<String> for CallStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "completed" => CallStatus::Completed,
            "in-progress" => CallStatus::InProgress,
            "missed" => CallStatus::Missed,
            _ => CallStatus::Other(s),
        }
    }
}

impl From<&str> for CallStatus {
    fn from(s: &str) -> Self {
        CallStatus::from(s.to_string())
    }
}

impl From<CallStatus> for String {
    fn from(status: CallStatus) -> Self {
        status.as_str().to_string()
    }
}

impl std::fmt::Display for CallStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Row returned by the calls query
#[derive(Debug, Clone, FromRow)]
pub struct CallRow {
    pub call_sid: String,
    pub from_number: Option<String>,
    pub duration: Option<i64>,
    pub status: Option<String>,
    pub has_message: Option<i64>,
    pub start_time: Option<NaiveDateTime>,
    pub created_at: Option<NaiveDateTime>,
}

/// A single inbound call, read-only
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallRecord {
    /// Provider call identifier
    pub call_sid: String,
    /// Caller's phone number, when the provider exposed it
    pub from_number: Option<String>,
    /// Duration in seconds; zero or negative means the duration is unknown
    pub duration_secs: Option<i64>,
    pub status: Option<CallStatus>,
    /// Whether the caller left a voicemail, independently of the call status
    pub has_voicemail: bool,
    pub start_time: Option<NaiveDateTime>,
    pub created_at: Option<NaiveDateTime>,
}

impl From<CallRow> for CallRecord {
    fn from(row: CallRow) -> Self {
        Self {
            call_sid: row.call_sid,
            from_number: row.from_number,
            duration_secs: row.duration,
            status: row.status.map(CallStatus::from),
            // The column is an integer flag; anything but 1 counts as no voicemail
            has_voicemail: row.has_message == Some(1),
            start_time: row.start_time,
            created_at: row.created_at,
        }
    }
}
