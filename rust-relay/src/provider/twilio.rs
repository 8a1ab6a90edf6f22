//! Twilio-compatible REST client.
//!
//! Calls are created with `POST /2010-04-01/Accounts/{sid}/Calls.json`, sending
//! `From`, `To` and `Url` as form fields and authenticating with HTTP basic auth.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{error, info};
use url::Url;

use super::{CallProvider, OutboundCall, ProviderAccount};
use crate::error::{RelayError, RelayResult};
use crate::Config;

/// `reqwest`-backed [`CallProvider`] implementation.
#[derive(Clone)]
pub struct TwilioClient {
    http: Client,
    api_host: String,
}

#[derive(Deserialize)]
struct CallCreated {
    #[serde(default)]
    sid: String,
}

#[derive(Deserialize)]
struct ApiError {
    #[serde(default)]
    code: Option<u64>,
    message: String,
}

impl TwilioClient {
    pub fn new(api_host: impl Into<String>, timeout: Duration) -> RelayResult<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RelayError::Provider(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            api_host: api_host.into(),
        })
    }

    pub fn from_config(config: &Config) -> RelayResult<Self> {
        Self::new(
            config.call_provider_host.clone(),
            Duration::from_millis(config.request_timeout_ms),
        )
    }

    fn calls_url(&self, account_sid: &str) -> RelayResult<Url> {
        let mut url = Url::parse(&self.api_host)
            .map_err(|e| RelayError::Provider(format!("invalid API host {:?}: {}", self.api_host, e)))?;

        url.path_segments_mut()
            .map_err(|_| RelayError::Provider(format!("invalid API host {:?}", self.api_host)))?
            .pop_if_empty()
            .extend(["2010-04-01", "Accounts", account_sid, "Calls.json"]);

        Ok(url)
    }
}

#[async_trait]
impl CallProvider for TwilioClient {
    async fn place_call(&self, account: &ProviderAccount, call: &OutboundCall) -> RelayResult<String> {
        let url = self.calls_url(&account.account_sid)?;

        info!(
            from = %call.from,
            to = %call.to,
            callback_url = %call.callback_url,
            "call_create_starting"
        );

        let response = self
            .http
            .post(url)
            .basic_auth(&account.account_sid, Some(&account.auth_token))
            .form(&[
                ("From", call.from.as_str()),
                ("To", call.to.as_str()),
                ("Url", call.callback_url.as_str()),
            ])
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    error!(error = %e, "call_create_timeout");
                } else {
                    error!(error = %e, "call_create_request_error");
                }
                RelayError::Provider(e.to_string())
            })?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if !status.is_success() {
            let (code, message) = match serde_json::from_str::<ApiError>(&body) {
                Ok(api_error) => (api_error.code, api_error.message),
                Err(_) => (None, format!("provider responded with {}", status)),
            };

            error!(
                status_code = status.as_u16(),
                error_code = ?code,
                message = %message,
                "call_create_rejected"
            );

            return Err(RelayError::Provider(message));
        }

        let sid = serde_json::from_str::<CallCreated>(&body)
            .map(|created| created.sid)
            .unwrap_or_default();

        info!(call_sid = %sid, status_code = status.as_u16(), "call_create_complete");

        Ok(sid)
    }
}
