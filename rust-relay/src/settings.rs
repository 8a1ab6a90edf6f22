//! Settings resolution.
//!
//! Each handler has a hard-coded baseline. Remote settings fetched from the Hub
//! are merged over it key by key. A failed fetch is an error for the request;
//! the baseline is never used as a fallback.

use serde_json::{Map, Value};
use tracing::{debug, error};

use crate::error::RelayResult;
use crate::hub::HubApi;

/// Setting name -> value.
pub type SettingsMap = Map<String, Value>;

/// Merge `remote` over `defaults`. Remote values win; remote-only keys are kept.
pub fn merge(defaults: &SettingsMap, remote: SettingsMap) -> SettingsMap {
    let mut merged = defaults.clone();
    for (key, value) in remote {
        merged.insert(key, value);
    }
    merged
}

/// Fetch remote settings and merge them over `defaults`.
pub async fn resolve(defaults: &SettingsMap, hub: &dyn HubApi) -> RelayResult<SettingsMap> {
    let remote = hub.get_settings().await.map_err(|e| {
        error!(error = %e, "settings_fetch_failed");
        e
    })?;

    debug!(remote_keys = remote.len(), default_keys = defaults.len(), "settings_resolved");

    Ok(merge(defaults, remote))
}

/// Typed, lenient access to a resolved settings map.
///
/// Values edited through the settings form may arrive as strings even when the
/// baseline holds numbers or booleans.
pub trait SettingsExt {
    /// Non-empty string value. Numbers are rendered as strings.
    fn text(&self, key: &str) -> Option<String>;

    /// Unsigned integer value, falling back to `default`.
    fn integer(&self, key: &str, default: u64) -> u64;

    /// Boolean value, falling back to `default`.
    fn flag(&self, key: &str, default: bool) -> bool;
}

impl SettingsExt for SettingsMap {
    fn text(&self, key: &str) -> Option<String> {
        match self.get(key)? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    fn integer(&self, key: &str, default: u64) -> u64 {
        match self.get(key) {
            Some(Value::Number(n)) => n
                .as_u64()
                .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
                .unwrap_or(default),
            Some(Value::String(s)) => s.trim().parse().unwrap_or(default),
            _ => default,
        }
    }

    fn flag(&self, key: &str, default: bool) -> bool {
        match self.get(key) {
            Some(Value::Bool(b)) => *b,
            Some(Value::Number(n)) => n.as_f64().map(|f| f != 0.0).unwrap_or(default),
            Some(Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" | "on" => true,
                "false" | "0" | "no" | "off" | "" => false,
                _ => default,
            },
            Some(Value::Null) => false,
            _ => default,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RelayError;
    use crate::hub::ProfileScope;
    use async_trait::async_trait;
    use serde_json::json;

    fn map(value: Value) -> SettingsMap {
        value.as_object().cloned().unwrap()
    }

    struct StaticHub(Option<SettingsMap>);

    #[async_trait]
    impl HubApi for StaticHub {
        async fn get_settings(&self) -> RelayResult<SettingsMap> {
            self.0
                .clone()
                .ok_or_else(|| RelayError::Fetch("Hub unavailable".to_string()))
        }

        async fn set_settings(&self, _settings: &SettingsMap) -> RelayResult<()> {
            Ok(())
        }

        async fn set_profile_attributes(
            &self,
            _scope: &ProfileScope,
            _attributes: &SettingsMap,
        ) -> RelayResult<()> {
            Ok(())
        }
    }

    #[test]
    fn test_merge_remote_wins() {
        let merged = merge(&map(json!({"A": 1, "B": 2})), map(json!({"B": 3, "C": 4})));
        assert_eq!(Value::Object(merged), json!({"A": 1, "B": 3, "C": 4}));
    }

    #[test]
    fn test_merge_empty_remote_keeps_defaults() {
        let defaults = map(json!({"A": 1}));
        assert_eq!(merge(&defaults, SettingsMap::new()), defaults);
    }

    #[tokio::test]
    async fn test_resolve_merges_remote() {
        let hub = StaticHub(Some(map(json!({"RECORD_TIMEOUT": 10}))));
        let resolved = resolve(&map(json!({"RECORD_TIMEOUT": 5, "RECORD_PLAY_BEEP": true})), &hub)
            .await
            .unwrap();
        assert_eq!(resolved["RECORD_TIMEOUT"], json!(10));
        assert_eq!(resolved["RECORD_PLAY_BEEP"], json!(true));
    }

    #[tokio::test]
    async fn test_resolve_does_not_fall_back_on_failure() {
        let hub = StaticHub(None);
        let result = resolve(&map(json!({"A": 1})), &hub).await;
        assert!(matches!(result, Err(RelayError::Fetch(_))));
    }

    #[test]
    fn test_lenient_accessors() {
        let settings = map(json!({
            "S": "hello",
            "EMPTY": "",
            "N": 42,
            "NS": " 17 ",
            "B": true,
            "BS": "false",
            "BN": 1,
            "NULL": null
        }));

        assert_eq!(settings.text("S"), Some("hello".to_string()));
        assert_eq!(settings.text("EMPTY"), None);
        assert_eq!(settings.text("N"), Some("42".to_string()));
        assert_eq!(settings.text("NULL"), None);
        assert_eq!(settings.text("MISSING"), None);

        assert_eq!(settings.integer("N", 0), 42);
        assert_eq!(settings.integer("NS", 0), 17);
        assert_eq!(settings.integer("S", 5), 5);
        assert_eq!(settings.integer("MISSING", 3600), 3600);

        assert!(settings.flag("B", false));
        assert!(!settings.flag("BS", true));
        assert!(settings.flag("BN", false));
        assert!(!settings.flag("NULL", true));
        assert!(settings.flag("MISSING", true));
    }
}
