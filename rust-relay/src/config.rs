//! Configuration module for environment variable parsing.
//!
//! Hub credentials come from the environment. Call Provider credentials and
//! message/record settings are stored remotely in the Hub and fetched per request.

use std::env;
use tracing::warn;

use crate::deployment::Deployment;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // =========================================================================
    // Hub Configuration
    // =========================================================================

    /// Hub bucket the app is installed into
    pub hub_bucket_id: String,

    /// Hub application key used as the `app_key` query parameter
    pub hub_app_key: String,

    /// Hub application id (also the default collect app for attribute writes)
    pub hub_app_id: String,

    /// Hub company/group id
    pub hub_group_id: String,

    /// Hub REST API base URL
    pub hub_api_host: String,

    // =========================================================================
    // Call Provider Configuration
    // =========================================================================

    /// Call Provider REST API base URL
    pub call_provider_host: String,

    // =========================================================================
    // Web Server Configuration
    // =========================================================================

    /// Port for the web server to listen on
    pub port: u16,

    /// Verbose route logging
    pub debug: bool,

    /// Which handler variant this instance runs
    pub deployment: Deployment,

    /// Externally visible origin for callback URLs, overriding the request's Host
    pub public_base_url: Option<String>,

    /// Echo from/to/callback in the intake response
    pub echo_call_debug: bool,

    /// Optional key switching callback signatures to HMAC-SHA256
    pub callback_signing_key: Option<String>,

    /// HTTP request timeout in milliseconds for outbound calls
    pub request_timeout_ms: u64,

    /// Where the settings form binder fetches its properties schema from
    pub settings_schema_url: Option<String>,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Config {
            hub_bucket_id: env::var("INNO_BUCKET_ID").unwrap_or_default(),

            hub_app_key: env::var("INNO_APP_KEY").unwrap_or_default(),

            hub_app_id: env::var("INNO_APP_ID").unwrap_or_default(),

            hub_group_id: env::var("INNO_COMPANY_ID").unwrap_or_default(),

            hub_api_host: env::var("INNO_API_HOST")
                .map(|v| v.trim_end_matches('/').to_string())
                .unwrap_or_else(|_| "https://api.innomdc.com".to_string()),

            call_provider_host: env::var("TWILIO_API_HOST")
                .map(|v| v.trim_end_matches('/').to_string())
                .unwrap_or_else(|_| "https://api.twilio.com".to_string()),

            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(8080),

            debug: parse_flag("DEBUG", false),

            deployment: parse_deployment("DEPLOYMENT"),

            public_base_url: env::var("PUBLIC_BASE_URL")
                .ok()
                .map(|v| v.trim().trim_end_matches('/').to_string())
                .filter(|v| !v.is_empty()),

            echo_call_debug: parse_flag("ECHO_CALL_DEBUG", true),

            callback_signing_key: env::var("CALLBACK_SIGNING_KEY")
                .ok()
                .filter(|v| !v.trim().is_empty()),

            request_timeout_ms: env::var("REQUEST_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(8000),

            settings_schema_url: env::var("SETTINGS_SCHEMA_URL")
                .ok()
                .filter(|v| !v.trim().is_empty()),
        }
    }

    /// Whether all Hub credentials needed for API calls are present.
    pub fn hub_configured(&self) -> bool {
        !self.hub_bucket_id.is_empty()
            && !self.hub_app_key.is_empty()
            && !self.hub_app_id.is_empty()
            && !self.hub_group_id.is_empty()
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            hub_bucket_id: String::new(),
            hub_app_key: String::new(),
            hub_app_id: String::new(),
            hub_group_id: String::new(),
            hub_api_host: "https://api.innomdc.com".to_string(),
            call_provider_host: "https://api.twilio.com".to_string(),
            port: 8080,
            debug: false,
            deployment: Deployment::Call,
            public_base_url: None,
            echo_call_debug: true,
            callback_signing_key: None,
            request_timeout_ms: 8000,
            settings_schema_url: None,
        }
    }
}

/// Parse a boolean flag. Any non-empty value other than "0"/"false"/"no"/"off" is true.
fn parse_flag(name: &str, default: bool) -> bool {
    match env::var(name) {
        Ok(raw) => {
            let value = raw.trim().to_ascii_lowercase();
            !(value.is_empty() || matches!(value.as_str(), "0" | "false" | "no" | "off"))
        }
        Err(_) => default,
    }
}

/// Parse the deployment variant, falling back to the generic call app.
fn parse_deployment(name: &str) -> Deployment {
    let raw = match env::var(name) {
        Ok(v) => v,
        Err(_) => return Deployment::Call,
    };

    match raw.parse() {
        Ok(deployment) => deployment,
        Err(_) => {
            warn!(env_var = name, value = %raw, "Invalid deployment, using default");
            Deployment::Call
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flag_values() {
        env::set_var("TEST_FLAG_ON", "1");
        env::set_var("TEST_FLAG_OFF", "false");
        env::set_var("TEST_FLAG_EMPTY", "");
        assert!(parse_flag("TEST_FLAG_ON", false));
        assert!(!parse_flag("TEST_FLAG_OFF", true));
        assert!(!parse_flag("TEST_FLAG_EMPTY", true));
        env::remove_var("TEST_FLAG_ON");
        env::remove_var("TEST_FLAG_OFF");
        env::remove_var("TEST_FLAG_EMPTY");
    }

    #[test]
    fn test_parse_flag_default() {
        assert!(parse_flag("NONEXISTENT_FLAG_VAR", true));
        assert!(!parse_flag("NONEXISTENT_FLAG_VAR", false));
    }

    #[test]
    fn test_parse_deployment() {
        env::set_var("TEST_DEPLOYMENT", "feedback");
        assert_eq!(parse_deployment("TEST_DEPLOYMENT"), Deployment::Feedback);
        env::set_var("TEST_DEPLOYMENT", "nonsense");
        assert_eq!(parse_deployment("TEST_DEPLOYMENT"), Deployment::Call);
        env::remove_var("TEST_DEPLOYMENT");
    }

    #[test]
    fn test_hub_configured() {
        let mut config = Config::default();
        assert!(!config.hub_configured());

        config.hub_bucket_id = "bucket".to_string();
        config.hub_app_key = "key".to_string();
        config.hub_app_id = "app".to_string();
        config.hub_group_id = "4".to_string();
        assert!(config.hub_configured());
    }
}
