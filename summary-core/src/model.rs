use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SummaryError;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Zh,
    En,
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Zh => "zh",
            Self::En => "en",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Language {
    type Err = SummaryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "zh" => Ok(Self::Zh),
            "en" => Ok(Self::En),
            other => Err(SummaryError::Validation(format!(
                "unsupported language '{other}' (expected zh or en)"
            ))),
        }
    }
}

/// What the caller asks a summary for. Serialized as the POST body.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SummaryRequest {
    pub subject_id: String,
    pub period: i32,
    pub language: Language,
}

impl SummaryRequest {
    pub fn new(subject_id: impl Into<String>, period: i32, language: Language) -> Self {
        Self {
            subject_id: subject_id.into(),
            period,
            language,
        }
    }
}

/// Logical text stream a fragment belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Channel {
    Content,
    Reasoning,
    Other(String),
}

impl Channel {
    /// Surrounding whitespace is not part of the name.
    pub fn from_name(name: &str) -> Self {
        match name.trim() {
            "content" => Self::Content,
            "reasoning" => Self::Reasoning,
            other => Self::Other(other.to_string()),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Idle,
    Streaming,
    Completed,
    Errored,
    Cancelled,
}

impl Phase {
    /// True for the phases a session can end in (`Idle` has no session behind it).
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Errored | Self::Cancelled)
    }
}

/// Live state of one summary request.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct SummarySession {
    pub id: u64,
    pub phase: Phase,
    pub content: String,
    pub reasoning: String,
    pub content_fragments: u32,
    pub reasoning_fragments: u32,
    pub reasoning_started_at: Option<DateTime<Utc>>,
    pub reasoning_ended_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl SummarySession {
    pub(crate) fn streaming(id: u64) -> Self {
        Self {
            id,
            phase: Phase::Streaming,
            started_at: Some(Utc::now()),
            ..Default::default()
        }
    }

    pub fn is_streaming(&self) -> bool {
        self.phase == Phase::Streaming
    }

    pub(crate) fn push_content(&mut self, text: &str) {
        self.content.push_str(text);
        self.content_fragments += 1;
    }

    pub(crate) fn push_reasoning(&mut self, text: &str, now: DateTime<Utc>) {
        self.reasoning.push_str(text);
        self.reasoning_fragments += 1;
        if self.reasoning_started_at.is_none() {
            self.reasoning_started_at = Some(now);
        }
        self.reasoning_ended_at = Some(now);
    }

    /// Moves a streaming session into `Completed` or `Cancelled`.
    pub(crate) fn finish(&mut self, phase: Phase, now: DateTime<Utc>) {
        debug_assert!(matches!(phase, Phase::Completed | Phase::Cancelled));
        self.phase = phase;
        self.finished_at = Some(now);
        if self.reasoning_started_at.is_some() && self.reasoning_ended_at.is_none() {
            self.reasoning_ended_at = Some(now);
        }
    }

    pub(crate) fn fail(&mut self, err: &SummaryError, now: DateTime<Utc>) {
        self.phase = Phase::Errored;
        self.finished_at = Some(now);
        self.error_message = Some(err.to_string());
    }

    /// Time spent between the first and most recent reasoning fragment.
    pub fn reasoning_duration(&self) -> Option<chrono::Duration> {
        match (self.reasoning_started_at, self.reasoning_ended_at) {
            (Some(start), Some(end)) => Some(end - start),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_serializes_camel_case() {
        let req = SummaryRequest::new("CHN", 2020, Language::En);
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"subjectId": "CHN", "period": 2020, "language": "en"})
        );
    }

    #[test]
    fn language_parses_case_insensitively() {
        assert_eq!("ZH".parse::<Language>().unwrap(), Language::Zh);
        assert_eq!(" en ".parse::<Language>().unwrap(), Language::En);
        assert!(matches!(
            "fr".parse::<Language>(),
            Err(SummaryError::Validation(_))
        ));
    }

    #[test]
    fn reasoning_timestamps_track_first_and_latest() {
        let mut s = SummarySession::streaming(1);
        let t0 = Utc::now();
        let t1 = t0 + chrono::Duration::milliseconds(40);
        s.push_reasoning("a", t0);
        s.push_reasoning("b", t1);
        assert_eq!(s.reasoning_started_at, Some(t0));
        assert_eq!(s.reasoning_ended_at, Some(t1));
        assert_eq!(s.reasoning_duration(), Some(chrono::Duration::milliseconds(40)));
        assert_eq!(s.reasoning_fragments, 2);
    }

    #[test]
    fn finish_does_not_fabricate_reasoning_end() {
        let mut s = SummarySession::streaming(1);
        s.push_content("x");
        s.finish(Phase::Completed, Utc::now());
        assert_eq!(s.phase, Phase::Completed);
        assert!(s.reasoning_started_at.is_none());
        assert!(s.reasoning_ended_at.is_none());
    }

    #[test]
    fn finish_keeps_existing_reasoning_end() {
        let mut s = SummarySession::streaming(1);
        let t0 = Utc::now();
        s.push_reasoning("r", t0);
        s.finish(Phase::Cancelled, t0 + chrono::Duration::seconds(5));
        assert_eq!(s.reasoning_ended_at, Some(t0));
    }

    #[test]
    fn finish_fills_reasoning_end_when_missing() {
        let mut s = SummarySession::streaming(1);
        let t0 = Utc::now();
        s.reasoning_started_at = Some(t0);
        let t1 = t0 + chrono::Duration::seconds(1);
        s.finish(Phase::Cancelled, t1);
        assert_eq!(s.reasoning_ended_at, Some(t1));
    }

    #[test]
    fn terminal_phases() {
        assert!(!Phase::Idle.is_terminal());
        assert!(!Phase::Streaming.is_terminal());
        assert!(Phase::Completed.is_terminal());
        assert!(Phase::Errored.is_terminal());
        assert!(Phase::Cancelled.is_terminal());
    }
}
