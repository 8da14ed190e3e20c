//! Best-effort decoding of the JSON analysis attached to each voicemail.
//!
//! The analysis is produced upstream by a language model and stored as text. It may be missing,
//! empty, truncated, or shaped differently from what we expect. Decoding never fails the
//! reduction: anything that is not a JSON object decodes to `None`, and individual fields with
//! an unexpected type are treated as absent.

use serde_json::{Map, Value};

/// Placeholder names the analysis writes when no caller name was detected
const UNKNOWN_NAME_SENTINELS: &[&str] = &["inconnu", "unknown"];

/// Fields of the voicemail analysis that feed the KPIs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnalysisPayload {
    /// Categorical reason for the call (`vidange`, `rdv`, ...)
    pub motive_legend: Option<String>,
    pub is_urgent: Option<bool>,
    /// Caller name detected in the transcript, possibly an "unknown" placeholder
    pub name: Option<String>,
}

/// JSON truthiness: false, null, zero, and empty strings/arrays/objects are falsy.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

fn non_empty_string(map: &Map<String, Value>, key: &str) -> Option<String> {
    match map.get(key) {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}

impl AnalysisPayload {
    /// Decode a raw analysis string. Returns `None` when the text is empty, is not valid JSON,
    /// or is valid JSON but not an object.
    pub fn decode(raw: &str) -> Option<Self> {
        if raw.is_empty() {
            return None;
        }

        let map: Map<String, Value> = serde_json::from_str(raw).ok()?;

        Some(Self {
            motive_legend: non_empty_string(&map, "motive_legend"),
            is_urgent: map.get("is_urgent").map(is_truthy),
            name: non_empty_string(&map, "name"),
        })
    }

    /// Decode, substituting the empty payload on any failure.
    pub fn decode_or_default(raw: Option<&str>) -> Self {
        match raw {
            Some(raw) => Self::decode(raw).unwrap_or_else(|| {
                tracing::trace!(len = raw.len(), "Unreadable voicemail analysis, treating as empty");
                Self::default()
            }),
            None => Self::default(),
        }
    }

    pub fn is_urgent(&self) -> bool {
        self.is_urgent == Some(true)
    }

    /// The detected name, unless it is one of the "unknown" placeholders (case-insensitive)
    pub fn detected_name(&self) -> Option<&str> {
        let name = self.name.as_deref()?;
        let lowered = name.to_lowercase();
        if UNKNOWN_NAME_SENTINELS.contains(&lowered.as_str()) {
            None
        } else {
            Some(name)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_full_payload() {
        let payload = AnalysisPayload::decode(r#"{"motive_legend":"oil_change","is_urgent":true,"name":"Jean"}"#).unwrap();
        assert_eq!(payload.motive_legend.as_deref(), Some("oil_change"));
        assert!(payload.is_urgent());
        assert_eq!(payload.detected_name(), Some("Jean"));
    }

    #[test]
    fn test_decode_rejects_malformed_and_non_objects() {
        assert_eq!(AnalysisPayload::decode(""), None);
        assert_eq!(AnalysisPayload::decode("{not json"), None);
        assert_eq!(AnalysisPayload::decode(r#"{"motive_legend": "vidange""#), None);
        assert_eq!(AnalysisPayload::decode("[1, 2, 3]"), None);
        assert_eq!(AnalysisPayload::decode("\"vidange\""), None);
        assert_eq!(AnalysisPayload::decode("null"), None);
    }

    #[test]
    fn test_decode_or_default_never_fails() {
        assert_eq!(AnalysisPayload::decode_or_default(None), AnalysisPayload::default());
        assert_eq!(AnalysisPayload::decode_or_default(Some("\u{0}garbage")), AnalysisPayload::default());
        assert_eq!(AnalysisPayload::decode_or_default(Some("{}")), AnalysisPayload::default());
    }

    #[test]
    fn test_wrongly_typed_fields_are_absent() {
        let payload = AnalysisPayload::decode(r#"{"motive_legend": 3, "name": ["Jean"], "is_urgent": null}"#).unwrap();
        assert_eq!(payload.motive_legend, None);
        assert_eq!(payload.name, None);
        assert!(!payload.is_urgent());
    }

    #[test]
    fn test_empty_strings_are_absent() {
        let payload = AnalysisPayload::decode(r#"{"motive_legend": "", "name": ""}"#).unwrap();
        assert_eq!(payload.motive_legend, None);
        assert_eq!(payload.detected_name(), None);
    }

    #[test]
    fn test_urgency_truthiness() {
        let urgent = |raw: &str| AnalysisPayload::decode(raw).unwrap().is_urgent();
        assert!(urgent(r#"{"is_urgent": true}"#));
        assert!(urgent(r#"{"is_urgent": 1}"#));
        assert!(urgent(r#"{"is_urgent": "oui"}"#));
        assert!(!urgent(r#"{"is_urgent": false}"#));
        assert!(!urgent(r#"{"is_urgent": 0}"#));
        assert!(!urgent(r#"{"is_urgent": ""}"#));
        assert!(!urgent(r#"{}"#));
    }

    #[test]
    fn test_unknown_name_sentinel_is_case_insensitive() {
        let name = |raw: &str| AnalysisPayload::decode(raw).unwrap().detected_name().map(str::to_string);
        assert_eq!(name(r#"{"name": "Inconnu"}"#), None);
        assert_eq!(name(r#"{"name": "INCONNU"}"#), None);
        assert_eq!(name(r#"{"name": "unknown"}"#), None);
        assert_eq!(name(r#"{"name": "Jean"}"#), Some("Jean".to_string()));
        // Only the exact placeholder is excluded
        assert_eq!(name(r#"{"name": "Jean Inconnu"}"#), Some("Jean Inconnu".to_string()));
    }
}
