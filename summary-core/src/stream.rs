//! Streaming primitives for the summary protocol.
//!
//! Contract:
//! - The server emits 0..n fragments on the `content` and `reasoning` channels,
//!   optionally followed by a `[DONE]` marker.
//! - `Done` is terminal: records after it are never applied.
//! - A payload that is not the expected JSON shape is still a fragment (raw text),
//!   never an error.

use serde::Deserialize;
use tracing::debug;

use crate::model::Channel;
use crate::sse::SseRecord;

/// Terminal sentinel carried in a `data:` line.
pub const DONE_MARKER: &str = "[DONE]";

/// What one decoded record means for a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    Fragment { channel: Channel, text: String },
    Done,
}

#[derive(Deserialize)]
struct WirePayload {
    #[serde(default)]
    event: Option<String>,
    #[serde(default)]
    data: Option<String>,
}

// A JSON array would also deserialize into the struct, so insist on an object.
fn parse_wire(payload: &str) -> serde_json::Result<WirePayload> {
    let value: serde_json::Value = serde_json::from_str(payload)?;
    if !value.is_object() {
        return Err(serde::de::Error::custom("payload is not a JSON object"));
    }
    serde_json::from_value(value)
}

/// Resolve one SSE record into an event. Records without a `data:` line yield `None`.
pub fn decode_record(record: &SseRecord) -> Option<StreamEvent> {
    let payload = record.data.as_deref()?;
    if payload.trim() == DONE_MARKER {
        return Some(StreamEvent::Done);
    }
    let annotated = record.event.as_deref();
    match parse_wire(payload) {
        Ok(wire) => {
            let name = wire.event.as_deref().or(annotated).unwrap_or("content");
            Some(StreamEvent::Fragment {
                channel: Channel::from_name(name),
                text: wire.data.unwrap_or_default(),
            })
        }
        Err(e) => {
            debug!(error = %e, len = payload.len(), "payload is not a JSON event; using raw text");
            Some(StreamEvent::Fragment {
                channel: Channel::from_name(annotated.unwrap_or("content")),
                text: payload.to_string(),
            })
        }
    }
}
