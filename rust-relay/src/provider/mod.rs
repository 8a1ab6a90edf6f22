//! Call Provider integration.
//!
//! This module provides:
//! - The [`CallProvider`] capability used to place outbound calls
//! - A Twilio-compatible REST implementation
//! - The control document builder returned to the provider mid-call

pub mod twilio;
pub mod twiml;

use async_trait::async_trait;

use crate::deployment::{ACCOUNT_SID, AUTH_TOKEN, CALLER_NUMBER};
use crate::error::{RelayError, RelayResult};
use crate::settings::{SettingsExt, SettingsMap};

pub use twilio::TwilioClient;
pub use twiml::{RecordOptions, VoiceResponse};

/// Provider account credentials, taken from the Hub's remote settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderAccount {
    pub account_sid: String,
    pub auth_token: String,
}

/// An outbound call request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundCall {
    /// Caller number owned by the provider account
    pub from: String,
    /// Destination number
    pub to: String,
    /// URL the provider fetches the control document from
    pub callback_url: String,
}

impl ProviderAccount {
    /// Read the account from resolved settings.
    pub fn from_settings(settings: &SettingsMap) -> RelayResult<Self> {
        match (settings.text(ACCOUNT_SID), settings.text(AUTH_TOKEN)) {
            (Some(account_sid), Some(auth_token)) => Ok(Self {
                account_sid,
                auth_token,
            }),
            _ => Err(RelayError::Provider(
                "account credentials are not configured".to_string(),
            )),
        }
    }
}

/// Read the configured caller number from resolved settings.
pub fn caller_number(settings: &SettingsMap) -> RelayResult<String> {
    settings
        .text(CALLER_NUMBER)
        .ok_or_else(|| RelayError::Provider("caller number is not configured".to_string()))
}

/// Operations the relay needs from the Call Provider.
#[async_trait]
pub trait CallProvider: Send + Sync {
    /// Ask the provider to place a call. Returns the provider's call id.
    async fn place_call(&self, account: &ProviderAccount, call: &OutboundCall) -> RelayResult<String>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn settings(value: serde_json::Value) -> SettingsMap {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_account_from_settings() {
        let account = ProviderAccount::from_settings(&settings(json!({
            "TWILIO_ACCOUNT_SID": "AC123",
            "TWILIO_AUTH_TOKEN": "token"
        })))
        .unwrap();
        assert_eq!(account.account_sid, "AC123");
        assert_eq!(account.auth_token, "token");
    }

    #[test]
    fn test_missing_account_is_provider_error() {
        let err = ProviderAccount::from_settings(&settings(json!({
            "TWILIO_ACCOUNT_SID": null,
            "TWILIO_AUTH_TOKEN": "token"
        })))
        .unwrap_err();
        assert!(matches!(err, RelayError::Provider(_)));
        assert!(err.to_string().starts_with("Call Provider error:"));
    }

    #[test]
    fn test_caller_number() {
        assert_eq!(
            caller_number(&settings(json!({"TWILIO_NUMBER": "+1000"}))).unwrap(),
            "+1000"
        );
        assert!(caller_number(&settings(json!({"TWILIO_NUMBER": null}))).is_err());
    }
}
