//! JSON-Schema driven settings form binder.
//!
//! The operator edits the app settings through a form generated from a
//! properties schema. This module provides:
//! - [`SchemaForm`]: schema fetch, the wrapped form document and validation
//! - [`SettingsBridge`]: the host capability used to load and store values
//! - [`SettingsEditor`]: load/save flow tying the two together

pub mod bridge;

use std::fmt;

use reqwest::Client;
use serde_json::{json, Map, Value};
use tracing::{error, info};

use crate::error::{RelayError, RelayResult};
use crate::settings::SettingsMap;

pub use bridge::{HubSettingsBridge, SaveOutcome, SettingsBridge, SettingsEditor};

/// Default form title.
pub const DEFAULT_TITLE: &str = "App settings stored in Hub Cloud";

/// A validation failure for one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    /// Property name
    pub field: String,
    /// Human label, the schema `title` or the property name
    pub title: String,
    pub message: String,
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.title, self.message)
    }
}

/// A settings form built from a properties schema.
///
/// Every declared property is required and undeclared properties are rejected.
#[derive(Debug, Clone)]
pub struct SchemaForm {
    title: String,
    properties: Map<String, Value>,
}

impl SchemaForm {
    /// Build a form from an in-memory properties schema.
    pub fn from_properties(title: impl Into<String>, properties: Value) -> RelayResult<Self> {
        match properties {
            Value::Object(properties) => Ok(Self {
                title: title.into(),
                properties,
            }),
            other => Err(RelayError::Parse(format!(
                "Settings schema must be an object, got {}",
                json_type(&other)
            ))),
        }
    }

    /// Fetch the properties schema from `schema_url`.
    pub async fn fetch(http: &Client, schema_url: &str, title: impl Into<String>) -> RelayResult<Self> {
        info!(schema_url = %schema_url, "settings_schema_fetch_starting");

        let response = http.get(schema_url).send().await.map_err(|e| {
            error!(schema_url = %schema_url, error = %e, "settings_schema_fetch_error");
            RelayError::Fetch(format!("Failed to fetch settings schema: {}", e))
        })?;

        let status = response.status();
        if !status.is_success() {
            error!(schema_url = %schema_url, status_code = status.as_u16(), "settings_schema_fetch_rejected");
            return Err(RelayError::Fetch(format!(
                "Failed to fetch settings schema: {}",
                status
            )));
        }

        let properties: Value = response
            .json()
            .await
            .map_err(|e| RelayError::Parse(format!("Invalid settings schema: {}", e)))?;

        let form = Self::from_properties(title, properties)?;
        info!(properties = form.properties.len(), "settings_schema_fetched");

        Ok(form)
    }

    /// Full object schema the form renders.
    pub fn document(&self) -> Value {
        let required: Vec<&String> = self.properties.keys().collect();
        json!({
            "type": "object",
            "title": self.title,
            "properties": self.properties,
            "required": required,
            "additionalProperties": false
        })
    }

    /// Validate submitted values. An empty result means the values are valid.
    pub fn validate(&self, values: &SettingsMap) -> Vec<FieldError> {
        let mut errors = Vec::new();

        for (field, schema) in &self.properties {
            let title = schema
                .get("title")
                .and_then(Value::as_str)
                .unwrap_or(field)
                .to_string();

            let push = |errors: &mut Vec<FieldError>, message: String| {
                errors.push(FieldError {
                    field: field.clone(),
                    title: title.clone(),
                    message,
                });
            };

            match values.get(field) {
                None => push(&mut errors, "Value required.".to_string()),
                Some(value) => {
                    if let Some(message) = check_value(schema, value) {
                        push(&mut errors, message);
                    }
                }
            }
        }

        for field in values.keys().filter(|k| !self.properties.contains_key(*k)) {
            errors.push(FieldError {
                field: field.clone(),
                title: self.title.clone(),
                message: format!("No additional properties allowed, but property {} is set.", field),
            });
        }

        errors
    }
}

/// Check one value against its property schema.
fn check_value(schema: &Value, value: &Value) -> Option<String> {
    if let Some(expected) = schema.get("type") {
        let allowed: Vec<&str> = match expected {
            Value::String(t) => vec![t.as_str()],
            Value::Array(ts) => ts.iter().filter_map(Value::as_str).collect(),
            _ => Vec::new(),
        };
        if !allowed.is_empty() && !allowed.iter().any(|t| matches_type(t, value)) {
            return Some(format!("Value must be of type {}.", allowed.join(" or ")));
        }
    }

    if let Some(Value::Array(options)) = schema.get("enum") {
        if !options.contains(value) {
            return Some("Value must be one of the enumerated values.".to_string());
        }
    }

    if let Some(n) = value.as_f64() {
        if let Some(min) = schema.get("minimum").and_then(Value::as_f64) {
            if n < min {
                return Some(format!("Value must be at least {}.", min));
            }
        }
        if let Some(max) = schema.get("maximum").and_then(Value::as_f64) {
            if n > max {
                return Some(format!("Value must be at most {}.", max));
            }
        }
    }

    if let Some(s) = value.as_str() {
        let length = s.chars().count() as u64;
        if let Some(min) = schema.get("minLength").and_then(Value::as_u64) {
            if length < min {
                return Some(format!("Value must be at least {} characters long.", min));
            }
        }
        if let Some(max) = schema.get("maxLength").and_then(Value::as_u64) {
            if length > max {
                return Some(format!("Value must be at most {} characters long.", max));
            }
        }
    }

    None
}

fn matches_type(expected: &str, value: &Value) -> bool {
    match expected {
        "string" => value.is_string(),
        "integer" => value.is_i64() || value.is_u64(),
        "number" => value.is_number(),
        "boolean" => value.is_boolean(),
        "object" => value.is_object(),
        "array" => value.is_array(),
        "null" => value.is_null(),
        _ => true,
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
