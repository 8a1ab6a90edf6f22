//! HubCall Settings - operator tool for the app settings stored in the Hub.
//!
//! The form schema is fetched from `SETTINGS_SCHEMA_URL` when set, otherwise the
//! schema bundled with the configured deployment is used.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use hubcall::settings_form::{
    HubSettingsBridge, SaveOutcome, SchemaForm, SettingsEditor, DEFAULT_TITLE,
};
use hubcall::{Config, DeploymentProfile, HubClient, SettingsMap};

/// Inspect, validate and store the relay settings kept in the Hub
#[derive(Parser, Debug)]
#[command(name = "hubcall-settings")]
#[command(about = "Operator tool for the HubCall app settings", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Command {
    /// Print the current settings as JSON
    Show,
    /// Print the form document the settings are validated against
    Schema,
    /// Validate a settings file without storing it
    Check {
        /// JSON object with one member per setting
        file: PathBuf,
    },
    /// Validate a settings file and store it in the Hub
    Apply {
        /// JSON object with one member per setting
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so stdout stays machine-readable
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().flatten_event(true).with_writer(std::io::stderr))
        .init();

    let config = Config::from_env();

    match cli.command {
        Command::Show => show(&config).await,
        Command::Schema => {
            let editor = editor(&config).await?;
            println!("{}", serde_json::to_string_pretty(&editor.form().document())?);
            Ok(())
        }
        Command::Check { file } => {
            let values = read_settings_file(&file)?;
            let editor = editor(&config).await?;
            report(editor.form().validate(&values).iter().map(ToString::to_string).collect())
        }
        Command::Apply { file } => {
            let values = read_settings_file(&file)?;
            apply(&config, &values).await
        }
    }
}

fn bridge(config: &Config) -> Result<HubSettingsBridge> {
    if !config.hub_configured() {
        bail!("Hub credentials are incomplete: set INNO_BUCKET_ID, INNO_APP_KEY, INNO_APP_ID and INNO_COMPANY_ID");
    }
    let hub = HubClient::from_config(config).context("Failed to create Hub client")?;
    Ok(HubSettingsBridge::new(Arc::new(hub)))
}

async fn editor(config: &Config) -> Result<SettingsEditor> {
    let form = match &config.settings_schema_url {
        Some(url) => {
            let http = reqwest::Client::builder()
                .timeout(Duration::from_millis(config.request_timeout_ms))
                .build()
                .context("Failed to create HTTP client")?;
            SchemaForm::fetch(&http, url, DEFAULT_TITLE)
                .await
                .context("Failed to load settings schema")?
        }
        None => {
            let profile = DeploymentProfile::for_deployment(config.deployment);
            SchemaForm::from_properties(DEFAULT_TITLE, profile.settings_schema)
                .context("Invalid bundled settings schema")?
        }
    };
    Ok(SettingsEditor::new(form))
}

async fn show(config: &Config) -> Result<()> {
    let bridge = bridge(config)?;
    let values = editor(config)
        .await?
        .load(&bridge)
        .await
        .context("Unable to get settings from the Hub")?;

    println!("{}", serde_json::to_string_pretty(&values)?);
    Ok(())
}

async fn apply(config: &Config, values: &SettingsMap) -> Result<()> {
    let bridge = bridge(config)?;
    let outcome = editor(config)
        .await?
        .save(&bridge, values)
        .await
        .context("Unable to store settings in the Hub")?;

    match outcome {
        SaveOutcome::Saved => {
            info!(fields = values.len(), "settings_applied");
            println!("Settings were saved.");
            Ok(())
        }
        SaveOutcome::Rejected(errors) => report(errors.iter().map(ToString::to_string).collect()),
    }
}

fn read_settings_file(path: &Path) -> Result<SettingsMap> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("{} is not a JSON object", path.display()))
}

fn report(errors: Vec<String>) -> Result<()> {
    if errors.is_empty() {
        println!("Settings are valid.");
        return Ok(());
    }
    for error in &errors {
        eprintln!("{}", error);
    }
    bail!("{} invalid setting(s)", errors.len())
}
