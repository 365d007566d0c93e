use serde::{Deserialize, Serialize};

use crate::model::{Phase, SummaryRequest, SummarySession};
use crate::telemetry::keys::*;

/// One record per finished session, handed to a `TelemetrySink`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SessionTrace {
    pub session_id: u64,
    pub subject_id: Option<String>,
    pub period: Option<i32>,
    pub language: Option<String>,

    /// Terminal phase the session ended in.
    pub phase: Phase,

    pub content_fragments: u32,
    pub reasoning_fragments: u32,
    pub content_chars: usize,
    pub reasoning_chars: usize,

    /// Wall-clock time from start to the terminal phase.
    pub latency_ms: Option<i64>,
    /// Time between first and most recent reasoning fragment.
    pub reasoning_ms: Option<i64>,

    pub error_kind: Option<String>,
    pub error_message: Option<String>,
}

impl SessionTrace {
    pub fn new(session_id: u64) -> Self {
        Self {
            session_id,
            ..Default::default()
        }
    }

    pub fn request(mut self, req: &SummaryRequest) -> Self {
        self.subject_id = Some(req.subject_id.clone());
        self.period = Some(req.period);
        self.language = Some(req.language.to_string());
        self
    }

    /// Copy counters and timings out of a session snapshot.
    pub fn session(mut self, s: &SummarySession) -> Self {
        self.phase = s.phase;
        self.content_fragments = s.content_fragments;
        self.reasoning_fragments = s.reasoning_fragments;
        self.content_chars = s.content.chars().count();
        self.reasoning_chars = s.reasoning.chars().count();
        self.latency_ms = match (s.started_at, s.finished_at) {
            (Some(a), Some(b)) => Some((b - a).num_milliseconds()),
            _ => None,
        };
        self.reasoning_ms = s.reasoning_duration().map(|d| d.num_milliseconds());
        self.error_message = s.error_message.clone();
        self
    }

    pub fn error_kind_opt(mut self, kind: Option<&str>) -> Self {
        self.error_kind = kind.map(|s| s.to_string());
        self
    }

    /// Flatten into stable key/value attributes (see `keys`). Unset values are skipped.
    pub fn attributes(&self) -> Vec<(&'static str, String)> {
        let mut out = vec![
            (KEY_SESSION_ID, self.session_id.to_string()),
            (KEY_PHASE, format!("{:?}", self.phase).to_lowercase()),
            (KEY_CONTENT_FRAGMENTS, self.content_fragments.to_string()),
            (KEY_REASONING_FRAGMENTS, self.reasoning_fragments.to_string()),
        ];
        let optional = [
            (KEY_SUBJECT_ID, self.subject_id.clone()),
            (KEY_PERIOD, self.period.map(|p| p.to_string())),
            (KEY_LANGUAGE, self.language.clone()),
            (KEY_LATENCY_MS, self.latency_ms.map(|v| v.to_string())),
            (KEY_REASONING_MS, self.reasoning_ms.map(|v| v.to_string())),
            (KEY_ERROR_KIND, self.error_kind.clone()),
            (KEY_ERROR_MESSAGE, self.error_message.clone()),
        ];
        out.extend(optional.into_iter().filter_map(|(k, v)| v.map(|v| (k, v))));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Language;
    use chrono::{Duration, Utc};
    use serde_json::json;

    #[test]
    fn session_trace_serializes() {
        let t0 = Utc::now();
        let session = SummarySession {
            id: 3,
            phase: Phase::Completed,
            content: "增长".into(),
            reasoning: "think".into(),
            content_fragments: 1,
            reasoning_fragments: 2,
            reasoning_started_at: Some(t0),
            reasoning_ended_at: Some(t0 + Duration::milliseconds(250)),
            error_message: None,
            started_at: Some(t0),
            finished_at: Some(t0 + Duration::milliseconds(900)),
        };
        let trace = SessionTrace::new(3)
            .request(&SummaryRequest::new("CHN", 2020, Language::Zh))
            .session(&session)
            .error_kind_opt(None);

        let as_json = serde_json::to_value(&trace).unwrap();
        assert_eq!(as_json["session_id"], json!(3));
        assert_eq!(as_json["subject_id"], json!("CHN"));
        assert_eq!(as_json["language"], json!("zh"));
        assert_eq!(as_json["phase"], json!("completed"));
        assert_eq!(as_json["content_chars"], json!(2));
        assert_eq!(as_json["reasoning_chars"], json!(5));
        assert_eq!(as_json["latency_ms"], json!(900));
        assert_eq!(as_json["reasoning_ms"], json!(250));
        assert_eq!(as_json["error_kind"], json!(null));
    }

    #[test]
    fn attributes_skip_unset_values() {
        let trace = SessionTrace {
            session_id: 9,
            phase: Phase::Errored,
            error_kind: Some("transport".into()),
            ..Default::default()
        };
        let attrs = trace.attributes();
        assert!(attrs.contains(&(KEY_SESSION_ID, "9".to_string())));
        assert!(attrs.contains(&(KEY_PHASE, "errored".to_string())));
        assert!(attrs.contains(&(KEY_ERROR_KIND, "transport".to_string())));
        assert!(attrs.iter().all(|(k, _)| *k != KEY_SUBJECT_ID && *k != KEY_LATENCY_MS));
    }
}
