//! Deployment variants.
//!
//! The relay ships as two near-identical apps: a generic outbound call app and
//! a voice feedback recorder. Both run the same handlers; only the values in
//! [`DeploymentProfile`] differ.

use std::fmt;
use std::str::FromStr;

use serde_json::{json, Value};

use crate::settings::SettingsMap;

/// Setting holding the Call Provider account SID.
pub const ACCOUNT_SID: &str = "TWILIO_ACCOUNT_SID";
/// Setting holding the Call Provider auth token.
pub const AUTH_TOKEN: &str = "TWILIO_AUTH_TOKEN";
/// Setting holding the number calls are placed from.
pub const CALLER_NUMBER: &str = "TWILIO_NUMBER";
/// Setting naming the event data field that carries the phone number.
pub const NUMBER_EVENT_DATA: &str = "NUMBER_EVENT_DATA";
/// Seconds of silence before recording stops.
pub const RECORD_TIMEOUT: &str = "RECORD_TIMEOUT";
/// Maximum recording length in seconds.
pub const RECORD_MAX_LENGTH: &str = "RECORD_MAX_LENGTH";
/// Whether a beep is played before recording.
pub const RECORD_PLAY_BEEP: &str = "RECORD_PLAY_BEEP";
/// Message spoken before recording.
pub const VOICE_MESSAGE: &str = "VOICE_MESSAGE";

/// Which app this process runs as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deployment {
    /// Generic outbound call app
    Call,
    /// Voice feedback recorder
    Feedback,
}

impl FromStr for Deployment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "call" | "twilio-call" => Ok(Deployment::Call),
            "feedback" | "voice-feedback" => Ok(Deployment::Feedback),
            other => Err(format!("unknown deployment: {}", other)),
        }
    }
}

impl fmt::Display for Deployment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Deployment::Call => f.write_str("call"),
            Deployment::Feedback => f.write_str("feedback"),
        }
    }
}

/// What the after-call callback does when the provider sends no recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingRecording {
    /// Respond with `{"error": "..."}`
    Error,
    /// Respond with `{"error": false}` and write nothing
    Ignore,
}

/// Per-deployment parameters for the shared handler set.
#[derive(Debug, Clone)]
pub struct DeploymentProfile {
    /// Body of `GET /`
    pub greeting: &'static str,
    /// Settings baseline for event intake
    pub intake_defaults: SettingsMap,
    /// Settings baseline for the call control document
    pub call_defaults: SettingsMap,
    pub missing_recording: MissingRecording,
    /// Properties schema served to the settings form
    pub settings_schema: Value,
}

impl DeploymentProfile {
    pub fn for_deployment(deployment: Deployment) -> Self {
        match deployment {
            Deployment::Call => Self {
                greeting: "Hello, I am Twilio Call application! Sorry but I have not web interface :(",
                intake_defaults: intake_defaults(),
                call_defaults: call_defaults(""),
                missing_recording: MissingRecording::Error,
                settings_schema: settings_schema(),
            },
            Deployment::Feedback => Self {
                greeting: "Hello, I am Voice Feedback application! Sorry but I have not web interface :(",
                intake_defaults: intake_defaults(),
                call_defaults: call_defaults("Please leave your feedback after the beep."),
                missing_recording: MissingRecording::Ignore,
                settings_schema: settings_schema(),
            },
        }
    }
}

fn intake_defaults() -> SettingsMap {
    let mut map = SettingsMap::new();
    map.insert(ACCOUNT_SID.to_string(), Value::Null);
    map.insert(AUTH_TOKEN.to_string(), Value::Null);
    map.insert(CALLER_NUMBER.to_string(), Value::Null);
    map.insert(NUMBER_EVENT_DATA.to_string(), json!("phonenumber"));
    map
}

fn call_defaults(voice_message: &str) -> SettingsMap {
    let mut map = SettingsMap::new();
    map.insert(RECORD_TIMEOUT.to_string(), json!(5));
    map.insert(RECORD_MAX_LENGTH.to_string(), json!(3600));
    map.insert(RECORD_PLAY_BEEP.to_string(), json!(true));
    map.insert(VOICE_MESSAGE.to_string(), json!(voice_message));
    map
}

fn settings_schema() -> Value {
    json!({
        ACCOUNT_SID: { "type": "string", "title": "Twilio Account SID", "minLength": 1 },
        AUTH_TOKEN: { "type": "string", "title": "Twilio Auth Token", "minLength": 1 },
        CALLER_NUMBER: { "type": "string", "title": "Twilio phone number", "minLength": 1 },
        NUMBER_EVENT_DATA: { "type": "string", "title": "Event data field with phone number", "minLength": 1 },
        RECORD_TIMEOUT: { "type": "integer", "title": "Record timeout (seconds)", "minimum": 1 },
        RECORD_MAX_LENGTH: { "type": "integer", "title": "Record max length (seconds)", "minimum": 1, "maximum": 14400 },
        RECORD_PLAY_BEEP: { "type": "boolean", "title": "Play beep before recording" },
        VOICE_MESSAGE: { "type": "string", "title": "Voice message" }
    })
}
