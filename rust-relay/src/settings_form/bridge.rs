//! Host bridge capability and the editor load/save flow.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use super::{FieldError, SchemaForm};
use crate::error::RelayResult;
use crate::hub::HubApi;
use crate::settings::SettingsMap;

/// What the settings form needs from its host.
#[async_trait]
pub trait SettingsBridge: Send + Sync {
    /// Resolves once the host can serve property requests.
    async fn on_ready(&self) -> RelayResult<()>;

    async fn get_properties(&self) -> RelayResult<SettingsMap>;

    async fn set_properties(&self, values: &SettingsMap) -> RelayResult<()>;
}

/// Bridge that reads and writes the app settings directly through the Hub API.
#[derive(Clone)]
pub struct HubSettingsBridge {
    hub: Arc<dyn HubApi>,
}

impl HubSettingsBridge {
    pub fn new(hub: Arc<dyn HubApi>) -> Self {
        Self { hub }
    }
}

#[async_trait]
impl SettingsBridge for HubSettingsBridge {
    async fn on_ready(&self) -> RelayResult<()> {
        Ok(())
    }

    async fn get_properties(&self) -> RelayResult<SettingsMap> {
        self.hub.get_settings().await
    }

    async fn set_properties(&self, values: &SettingsMap) -> RelayResult<()> {
        self.hub.set_settings(values).await
    }
}

/// Result of submitting the form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved,
    /// Nothing was stored
    Rejected(Vec<FieldError>),
}

/// Binds a [`SchemaForm`] to a [`SettingsBridge`].
#[derive(Debug, Clone)]
pub struct SettingsEditor {
    form: SchemaForm,
}

impl SettingsEditor {
    pub fn new(form: SchemaForm) -> Self {
        Self { form }
    }

    pub fn form(&self) -> &SchemaForm {
        &self.form
    }

    /// Wait for the host, then load the current values.
    pub async fn load(&self, bridge: &dyn SettingsBridge) -> RelayResult<SettingsMap> {
        bridge.on_ready().await?;
        let values = bridge.get_properties().await?;
        info!(fields = values.len(), "settings_form_loaded");
        Ok(values)
    }

    /// Validate `values` and store them when valid.
    pub async fn save(&self, bridge: &dyn SettingsBridge, values: &SettingsMap) -> RelayResult<SaveOutcome> {
        let errors = self.form.validate(values);
        if !errors.is_empty() {
            warn!(
                errors = %errors.iter().map(ToString::to_string).collect::<Vec<_>>().join("; "),
                "settings_form_invalid"
            );
            return Ok(SaveOutcome::Rejected(errors));
        }

        bridge.on_ready().await?;
        bridge.set_properties(values).await?;
        info!(fields = values.len(), "settings_form_saved");

        Ok(SaveOutcome::Saved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use serde_json::json;

    use crate::error::RelayError;

    #[derive(Default)]
    struct MemoryBridge {
        ready: bool,
        stored: Mutex<SettingsMap>,
    }

    #[async_trait]
    impl SettingsBridge for MemoryBridge {
        async fn on_ready(&self) -> RelayResult<()> {
            if self.ready {
                Ok(())
            } else {
                Err(RelayError::Fetch("host not ready".to_string()))
            }
        }

        async fn get_properties(&self) -> RelayResult<SettingsMap> {
            Ok(self.stored.lock().unwrap().clone())
        }

        async fn set_properties(&self, values: &SettingsMap) -> RelayResult<()> {
            *self.stored.lock().unwrap() = values.clone();
            Ok(())
        }
    }

    fn editor() -> SettingsEditor {
        SettingsEditor::new(
            SchemaForm::from_properties(
                "Settings",
                json!({"VOICE_MESSAGE": {"type": "string", "title": "Voice message"}}),
            )
            .unwrap(),
        )
    }

    fn values(value: serde_json::Value) -> SettingsMap {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let bridge = MemoryBridge {
            ready: true,
            ..Default::default()
        };
        let editor = editor();

        let outcome = editor
            .save(&bridge, &values(json!({"VOICE_MESSAGE": "hello"})))
            .await
            .unwrap();
        assert_eq!(outcome, SaveOutcome::Saved);

        let loaded = editor.load(&bridge).await.unwrap();
        assert_eq!(loaded["VOICE_MESSAGE"], json!("hello"));
    }

    #[tokio::test]
    async fn test_invalid_values_not_stored() {
        let bridge = MemoryBridge {
            ready: true,
            ..Default::default()
        };

        let outcome = editor()
            .save(&bridge, &values(json!({"VOICE_MESSAGE": 5})))
            .await
            .unwrap();

        match outcome {
            SaveOutcome::Rejected(errors) => {
                assert_eq!(errors[0].to_string(), "Voice message: Value must be of type string.")
            }
            SaveOutcome::Saved => panic!("Expected rejection"),
        }
        assert!(bridge.stored.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_load_waits_for_ready() {
        let bridge = MemoryBridge::default();
        assert!(editor().load(&bridge).await.is_err());
    }

    struct RecordingHub {
        stored: Mutex<Option<SettingsMap>>,
    }

    #[async_trait]
    impl HubApi for RecordingHub {
        async fn get_settings(&self) -> RelayResult<SettingsMap> {
            Ok(values(json!({"VOICE_MESSAGE": "from hub"})))
        }

        async fn set_settings(&self, settings: &SettingsMap) -> RelayResult<()> {
            *self.stored.lock().unwrap() = Some(settings.clone());
            Ok(())
        }

        async fn set_profile_attributes(
            &self,
            _scope: &crate::hub::ProfileScope,
            _attributes: &SettingsMap,
        ) -> RelayResult<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_hub_bridge() {
        let hub = Arc::new(RecordingHub {
            stored: Mutex::new(None),
        });
        let bridge = HubSettingsBridge::new(hub.clone());

        let loaded = editor().load(&bridge).await.unwrap();
        assert_eq!(loaded["VOICE_MESSAGE"], json!("from hub"));

        editor()
            .save(&bridge, &values(json!({"VOICE_MESSAGE": "new"})))
            .await
            .unwrap();
        assert_eq!(
            hub.stored.lock().unwrap().as_ref().unwrap()["VOICE_MESSAGE"],
            json!("new")
        );
    }
}
