//! KPI aggregation.
//!
//! [`compute_kpis`] fetches a tenant's calls and voicemails for an inclusive window and reduces
//! them to a [`KpiResult`]. The reduction itself is [`aggregate`], a pure function over the
//! fetched records: the same records always give the same result, and nothing is cached or
//! carried between calls.
//!
//! A few behaviours are deliberately literal:
//!
//! - `calls_with_voicemail` counts the voicemail flag whatever the call status, and
//!   `voicemail_rate_pct` is a share of *all* calls.
//! - Durations of zero or less mean "unknown" and are left out of the average entirely.
//! - Motives tied on count keep the order in which they were first seen.

use std::collections::{HashMap, HashSet};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::db::handlers::RecordStore;
use crate::db::models::{calls::CallRecord, messages::MessageRecord};
use crate::errors::Result;

pub mod analysis;

pub use analysis::AnalysisPayload;

/// Number of motives kept in [`KpiResult::top_motives`]
pub const TOP_MOTIVES: usize = 3;

/// A motive and how many voicemails carried it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MotiveCount {
    pub motive: String,
    pub count: u64,
}

/// KPIs for one tenant over one window.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KpiResult {
    pub total_calls: u64,
    pub calls_with_voicemail: u64,
    pub missed_calls: u64,
    /// Calls with status `completed` or `in-progress`
    pub answered_calls: u64,
    /// Distinct non-empty caller numbers
    pub unique_callers: u64,
    /// Mean of strictly positive durations, one decimal; 0 when there are none
    pub average_duration_seconds: f64,
    pub total_messages: u64,
    pub messages_sent: u64,
    pub urgent_calls: u64,
    pub names_detected: u64,
    /// At most three motives, most frequent first
    pub top_motives: Vec<MotiveCount>,
    pub voicemail_rate_pct: f64,
    pub answer_rate_pct: f64,
}

impl KpiResult {
    /// True when the window held neither calls nor voicemails
    pub fn is_empty(&self) -> bool {
        self.total_calls == 0 && self.total_messages == 0
    }
}

/// Round to one decimal place, ties to even on the scaled value (`1.05` rounds to `1.0`).
fn round1(value: f64) -> f64 {
    (value * 10.0).round_ties_even() / 10.0
}

/// `part` as a percentage of `total`, one decimal; 0 when `total` is 0.
fn rate_pct(part: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    round1(part as f64 / total as f64 * 100.0)
}

#[derive(Default)]
struct CallStats<'a> {
    total: u64,
    with_voicemail: u64,
    missed: u64,
    answered: u64,
    duration_sum: i64,
    duration_count: u64,
    callers: HashSet<&'a str>,
}

impl<'a> CallStats<'a> {
    fn add(&mut self, call: &'a CallRecord) {
        self.total += 1;
        if call.has_voicemail {
            self.with_voicemail += 1;
        }
        if let Some(status) = &call.status {
            if status.is_missed() {
                self.missed += 1;
            } else if status.is_answered() {
                self.answered += 1;
            }
        }
        if let Some(duration) = call.duration_secs
            && duration > 0
        {
            self.duration_sum += duration;
            self.duration_count += 1;
        }
        if let Some(number) = call.from_number.as_deref()
            && !number.is_empty()
        {
            self.callers.insert(number);
        }
    }

    fn average_duration(&self) -> f64 {
        if self.duration_count == 0 {
            return 0.0;
        }
        round1(self.duration_sum as f64 / self.duration_count as f64)
    }
}

/// Frequency counter that remembers first-seen order, so that a stable sort by count keeps
/// ties in encounter order.
#[derive(Default)]
struct MotiveCounter {
    counts: Vec<MotiveCount>,
    index: HashMap<String, usize>,
}

impl MotiveCounter {
    fn add(&mut self, motive: &str) {
        match self.index.get(motive) {
            Some(&i) => self.counts[i].count += 1,
            None => {
                self.index.insert(motive.to_string(), self.counts.len());
                self.counts.push(MotiveCount {
                    motive: motive.to_string(),
                    count: 1,
                });
            }
        }
    }

    fn most_common(self, n: usize) -> Vec<MotiveCount> {
        let mut counts = self.counts;
        // sort_by is stable
        counts.sort_by(|a, b| b.count.cmp(&a.count));
        counts.truncate(n);
        counts
    }
}

#[derive(Default)]
struct MessageStats {
    total: u64,
    sent: u64,
    urgent: u64,
    names: u64,
    motives: MotiveCounter,
}

impl MessageStats {
    fn add(&mut self, message: &MessageRecord) {
        self.total += 1;
        if message.was_sent() {
            self.sent += 1;
        }

        let analysis = AnalysisPayload::decode_or_default(message.analysis.as_deref());
        if let Some(motive) = &analysis.motive_legend {
            self.motives.add(motive);
        }
        if analysis.is_urgent() {
            self.urgent += 1;
        }
        if analysis.detected_name().is_some() {
            self.names += 1;
        }
    }
}

/// Reduce a window's calls and voicemails to KPIs.
pub fn aggregate(calls: &[CallRecord], messages: &[MessageRecord]) -> KpiResult {
    let mut call_stats = CallStats::default();
    for call in calls {
        call_stats.add(call);
    }

    let mut message_stats = MessageStats::default();
    for message in messages {
        message_stats.add(message);
    }

    KpiResult {
        total_calls: call_stats.total,
        calls_with_voicemail: call_stats.with_voicemail,
        missed_calls: call_stats.missed,
        answered_calls: call_stats.answered,
        unique_callers: call_stats.callers.len() as u64,
        average_duration_seconds: call_stats.average_duration(),
        total_messages: message_stats.total,
        messages_sent: message_stats.sent,
        urgent_calls: message_stats.urgent,
        names_detected: message_stats.names,
        top_motives: message_stats.motives.most_common(TOP_MOTIVES),
        voicemail_rate_pct: rate_pct(call_stats.with_voicemail, call_stats.total),
        answer_rate_pct: rate_pct(call_stats.answered, call_stats.total),
    }
}

/// Compute the KPIs of `tenant_id` over the inclusive window `[start, end]`.
///
/// The window is not validated: a reversed window matches no records and yields a zeroed
/// result. Store failures are returned as [`crate::errors::Error::DataAccess`]; unreadable
/// voicemail analyses are not errors.
#[instrument(skip(store), err)]
pub async fn compute_kpis(store: &dyn RecordStore, tenant_id: &str, start: NaiveDateTime, end: NaiveDateTime) -> Result<KpiResult> {
    let (calls, messages) = tokio::try_join!(store.fetch_calls(tenant_id, start, end), store.fetch_messages(tenant_id, start, end))?;

    tracing::debug!(calls = calls.len(), messages = messages.len(), "Fetched records");

    Ok(aggregate(&calls, &messages))
}
