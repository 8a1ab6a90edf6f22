//! HubCall - Hub profile events to recorded outbound calls.
//!
//! This library provides shared modules for the two HubCall binaries:
//! - `hubcall-web`: Web server for the Hub webhook and Call Provider callbacks
//! - `hubcall-settings`: Operator tool for viewing and updating app settings
//!
//! ## Architecture
//!
//! ```text
//! Hub event → POST / → Call Provider dials → POST /call/... (control document)
//!           → GET /afterCall/... → recording URL written back to the Hub profile
//! ```

pub mod config;
pub mod deployment;
pub mod error;
pub mod hub;
pub mod provider;
pub mod settings;
pub mod settings_form;
pub mod web;

// Re-export commonly used types
pub use config::Config;
pub use deployment::{Deployment, DeploymentProfile};
pub use error::{RelayError, RelayResult};
pub use hub::{HubApi, HubClient, ProfileScope};
pub use provider::{CallProvider, TwilioClient};
pub use settings::SettingsMap;
pub use web::{router, AppState};
