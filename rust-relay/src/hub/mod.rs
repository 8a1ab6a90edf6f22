//! Hub integration.
//!
//! This module provides:
//! - The [`HubApi`] capability the handlers depend on
//! - A `reqwest` implementation against the Hub REST API
//! - The stream payload parser for inbound profile events

pub mod client;
pub mod stream;

use async_trait::async_trait;

use crate::error::RelayResult;
use crate::settings::SettingsMap;

pub use client::HubClient;
pub use stream::{parse_stream_payload, EventPayload};

/// Profile attribute that receives the recording URL.
pub const VOICE_FEEDBACK_ATTRIBUTE: &str = "last-voice-feedback";

/// Which profile (and which interaction flow) a Hub write targets.
///
/// Passed explicitly with every call instead of being kept as mutable state
/// on a shared client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileScope {
    pub profile_id: String,
    pub collect_app: Option<String>,
    pub section: Option<String>,
}

impl ProfileScope {
    pub fn new(profile_id: impl Into<String>) -> Self {
        Self {
            profile_id: profile_id.into(),
            collect_app: None,
            section: None,
        }
    }

    pub fn with_session(mut self, collect_app: impl Into<String>, section: impl Into<String>) -> Self {
        self.collect_app = Some(collect_app.into());
        self.section = Some(section.into());
        self
    }
}

/// Operations the relay needs from the Hub.
#[async_trait]
pub trait HubApi: Send + Sync {
    /// Fetch this app's remote settings.
    async fn get_settings(&self) -> RelayResult<SettingsMap>;

    /// Replace this app's remote settings.
    async fn set_settings(&self, settings: &SettingsMap) -> RelayResult<()>;

    /// Write attributes onto a profile.
    async fn set_profile_attributes(
        &self,
        scope: &ProfileScope,
        attributes: &SettingsMap,
    ) -> RelayResult<()>;
}
