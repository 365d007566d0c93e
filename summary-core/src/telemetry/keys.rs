/// Span/Log attribute keys for summary sessions.
/// Keep these stable; changing them is a breaking change for dashboards.
pub const KEY_SESSION_ID: &str = "session.id";
pub const KEY_SUBJECT_ID: &str = "summary.subject";
pub const KEY_PERIOD: &str = "summary.period";
pub const KEY_LANGUAGE: &str = "summary.lang";
pub const KEY_PHASE: &str = "session.phase";

pub const KEY_LATENCY_MS: &str = "latency.ms";
pub const KEY_CONTENT_FRAGMENTS: &str = "fragments.content";
pub const KEY_REASONING_FRAGMENTS: &str = "fragments.reasoning";
pub const KEY_REASONING_MS: &str = "reasoning.ms";

/// Error-related (if applicable)
pub const KEY_ERROR_KIND: &str = "error.kind";
pub const KEY_ERROR_MESSAGE: &str = "error.message";
