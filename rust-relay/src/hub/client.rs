//! Hub REST client.
//!
//! Endpoints used:
//! - `GET|PUT /v1/companies/{group}/buckets/{bucket}/apps/{app}/custom` (app settings)
//! - `POST /v1/companies/{group}/buckets/{bucket}/profiles/{profile}` (profile attributes)
//!
//! Every request carries the app key as the `app_key` query parameter.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info};
use url::Url;

use super::{HubApi, ProfileScope};
use crate::error::{RelayError, RelayResult};
use crate::settings::SettingsMap;
use crate::Config;

/// Connection details for one installed Hub app.
#[derive(Debug, Clone)]
pub struct HubCredentials {
    pub api_host: String,
    pub group_id: String,
    pub bucket_id: String,
    pub app_id: String,
    pub app_key: String,
}

impl HubCredentials {
    pub fn from_config(config: &Config) -> Self {
        Self {
            api_host: config.hub_api_host.clone(),
            group_id: config.hub_group_id.clone(),
            bucket_id: config.hub_bucket_id.clone(),
            app_id: config.hub_app_id.clone(),
            app_key: config.hub_app_key.clone(),
        }
    }
}

/// `reqwest`-backed [`HubApi`] implementation.
#[derive(Clone)]
pub struct HubClient {
    http: Client,
    credentials: HubCredentials,
}

#[derive(Deserialize)]
struct SettingsEnvelope {
    #[serde(default)]
    custom: Option<SettingsMap>,
}

#[derive(Serialize)]
struct ProfileUpdate<'a> {
    id: &'a str,
    attributes: [AttributeGroup<'a>; 1],
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AttributeGroup<'a> {
    collect_app: &'a str,
    section: &'a str,
    data: &'a SettingsMap,
}

impl HubClient {
    pub fn new(credentials: HubCredentials, timeout: Duration) -> RelayResult<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RelayError::Fetch(format!("Failed to build Hub HTTP client: {}", e)))?;

        Ok(Self { http, credentials })
    }

    pub fn from_config(config: &Config) -> RelayResult<Self> {
        Self::new(
            HubCredentials::from_config(config),
            Duration::from_millis(config.request_timeout_ms),
        )
    }

    fn endpoint(&self, segments: &[&str]) -> RelayResult<Url> {
        let creds = &self.credentials;
        let mut url = Url::parse(&creds.api_host)
            .map_err(|e| RelayError::Fetch(format!("Invalid Hub API host {:?}: {}", creds.api_host, e)))?;

        url.path_segments_mut()
            .map_err(|_| RelayError::Fetch(format!("Invalid Hub API host {:?}", creds.api_host)))?
            .pop_if_empty()
            .extend(["v1", "companies", creds.group_id.as_str(), "buckets", creds.bucket_id.as_str()])
            .extend(segments);

        url.query_pairs_mut().append_pair("app_key", &creds.app_key);

        Ok(url)
    }

    fn settings_url(&self) -> RelayResult<Url> {
        self.endpoint(&["apps", self.credentials.app_id.as_str(), "custom"])
    }

    fn profile_url(&self, profile_id: &str) -> RelayResult<Url> {
        self.endpoint(&["profiles", profile_id])
    }
}

#[async_trait]
impl HubApi for HubClient {
    async fn get_settings(&self) -> RelayResult<SettingsMap> {
        let url = self.settings_url()?;

        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| transport_error("hub_settings_fetch_error", e))?;

        let response = check_status(response, "hub_settings_fetch_rejected").await?;

        let envelope: SettingsEnvelope = response
            .json()
            .await
            .map_err(|e| RelayError::Fetch(format!("Invalid Hub settings response: {}", e)))?;

        let settings = envelope.custom.unwrap_or_default();
        info!(settings_count = settings.len(), "hub_settings_fetched");

        Ok(settings)
    }

    async fn set_settings(&self, settings: &SettingsMap) -> RelayResult<()> {
        let url = self.settings_url()?;

        let response = self
            .http
            .put(url)
            .json(settings)
            .send()
            .await
            .map_err(|e| transport_error("hub_settings_store_error", e))?;

        check_status(response, "hub_settings_store_rejected").await?;
        info!(settings_count = settings.len(), "hub_settings_stored");

        Ok(())
    }

    async fn set_profile_attributes(
        &self,
        scope: &ProfileScope,
        attributes: &SettingsMap,
    ) -> RelayResult<()> {
        let url = self.profile_url(&scope.profile_id)?;

        let body = ProfileUpdate {
            id: &scope.profile_id,
            attributes: [AttributeGroup {
                collect_app: scope.collect_app.as_deref().unwrap_or(&self.credentials.app_id),
                section: scope.section.as_deref().unwrap_or_default(),
                data: attributes,
            }],
        };

        let response = self
            .http
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error("hub_attributes_write_error", e))?;

        check_status(response, "hub_attributes_write_rejected").await?;

        info!(
            profile_id = %scope.profile_id,
            collect_app = ?scope.collect_app,
            section = ?scope.section,
            attribute_count = attributes.len(),
            "hub_attributes_written"
        );

        Ok(())
    }
}

fn transport_error(event: &'static str, e: reqwest::Error) -> RelayError {
    if e.is_timeout() {
        error!(error = %e, event, "hub_request_timeout");
    } else {
        error!(error = %e, event, "hub_request_failed");
    }
    RelayError::Fetch(format!("Hub request failed: {}", e))
}

/// Turn a non-2xx response into a `Fetch` error carrying the Hub's message.
async fn check_status(response: Response, event: &'static str) -> RelayResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<Value>(&body)
        .ok()
        .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| format!("Hub responded with {}", status));

    error!(status_code = status.as_u16(), message = %message, event, "hub_request_rejected");

    Err(RelayError::Fetch(message))
}
