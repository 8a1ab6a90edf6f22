//! Hub profile stream payload parsing.
//!
//! The Hub posts a profile snapshot carrying the session and event that
//! triggered the app:
//!
//! ```text
//! { "profile": { "id": "...", "sessions": [ { "collectApp": "...", "section": "...",
//!     "events": [ { "definitionId": "...", "data": { ... } } ] } ] } }
//! ```
//!
//! Only the first session and its first event are relevant.

use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::error::{RelayError, RelayResult};
use crate::web::callback::SessionContext;

/// Flattened view of a stream payload.
#[derive(Debug, Clone, PartialEq)]
pub struct EventPayload {
    pub profile_id: String,
    pub session: SessionContext,
    /// Event definition id, when the Hub sends one
    pub event_id: Option<String>,
    /// Event-specific fields
    pub data: Map<String, Value>,
}

impl EventPayload {
    /// Non-empty string form of an event data field.
    pub fn data_text(&self, field: &str) -> Option<String> {
        match self.data.get(field)? {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct StreamEnvelope {
    profile: Option<RawProfile>,
}

#[derive(Debug, Deserialize)]
struct RawProfile {
    id: Option<Value>,
    #[serde(default)]
    sessions: Vec<RawSession>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSession {
    collect_app: Option<String>,
    section: Option<String>,
    #[serde(default)]
    events: Vec<RawEvent>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawEvent {
    definition_id: Option<String>,
    data: Option<Map<String, Value>>,
}

/// Parse a raw stream payload body.
pub fn parse_stream_payload(body: &[u8]) -> RelayResult<EventPayload> {
    let envelope: StreamEnvelope = serde_json::from_slice(body).map_err(|e| {
        warn!(error = %e, body_length = body.len(), "stream_payload_invalid_json");
        RelayError::Parse(format!("Parse error: {}", e))
    })?;

    let profile = envelope
        .profile
        .ok_or_else(|| RelayError::Parse("Profile not found".to_string()))?;

    let profile_id = match profile.id {
        Some(Value::String(s)) if !s.is_empty() => s,
        Some(Value::Number(n)) => n.to_string(),
        _ => return Err(RelayError::Parse("Profile id not found".to_string())),
    };

    let session = profile
        .sessions
        .into_iter()
        .next()
        .ok_or_else(|| RelayError::Parse("Session not found".to_string()))?;

    let collect_app = session
        .collect_app
        .ok_or_else(|| RelayError::Parse("CollectApp not found".to_string()))?;

    let section = session
        .section
        .ok_or_else(|| RelayError::Parse("Section not found".to_string()))?;

    let event = session
        .events
        .into_iter()
        .next()
        .ok_or_else(|| RelayError::Parse("Event not found".to_string()))?;

    let data = event
        .data
        .ok_or_else(|| RelayError::Parse("Data not set".to_string()))?;

    info!(
        profile_id = %profile_id,
        collect_app = %collect_app,
        section = %section,
        event_id = ?event.definition_id,
        data_fields = data.len(),
        "stream_payload_parsed"
    );

    Ok(EventPayload {
        profile_id,
        session: SessionContext::new(collect_app, section),
        event_id: event.definition_id,
        data,
    })
}
