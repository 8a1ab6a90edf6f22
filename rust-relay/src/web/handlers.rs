//! Webhook and provider callback handlers.
//!
//! Flow of one call:
//! 1. `POST /` receives a Hub profile event and asks the Call Provider to dial
//! 2. `POST /call/...` is fetched by the provider for the control document
//! 3. `GET /afterCall/...` reports the recording, which is written to the profile
//!
//! Nothing is kept between the steps; the signed callback URLs carry the context.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{rejection::QueryRejection, Path, Query, State},
    http::{header, HeaderMap, Uri},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::deployment::{
    DeploymentProfile, MissingRecording, NUMBER_EVENT_DATA, RECORD_MAX_LENGTH, RECORD_PLAY_BEEP,
    RECORD_TIMEOUT, VOICE_MESSAGE,
};
use crate::error::{RelayError, RelayResult};
use crate::hub::{parse_stream_payload, HubApi, ProfileScope, VOICE_FEEDBACK_ATTRIBUTE};
use crate::provider::{caller_number, CallProvider, OutboundCall, ProviderAccount, RecordOptions, VoiceResponse};
use crate::settings::{self, SettingsExt, SettingsMap};
use crate::web::callback::{build_url, RequestOrigin, SessionContext, AFTER_CALL_PATH, CALL_PATH};
use crate::web::signature::SignatureScheme;
use crate::Config;

/// Voice used for the spoken message.
const SAY_VOICE: &str = "alice";

/// Suffix that turns a provider recording URL into a downloadable asset.
const RECORDING_FORMAT_SUFFIX: &str = ".mp3";

/// Shared application state. Built once at startup, read-only afterwards.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub profile: Arc<DeploymentProfile>,
    pub signatures: Arc<SignatureScheme>,
    pub hub: Arc<dyn HubApi>,
    pub calls: Arc<dyn CallProvider>,
}

impl AppState {
    pub fn new(config: Config, hub: Arc<dyn HubApi>, calls: Arc<dyn CallProvider>) -> Self {
        let profile = DeploymentProfile::for_deployment(config.deployment);
        let signatures = SignatureScheme::from_key(config.callback_signing_key.as_deref());

        Self {
            config: Arc::new(config),
            profile: Arc::new(profile),
            signatures: Arc::new(signatures),
            hub,
            calls,
        }
    }

    fn origin(&self, headers: &HeaderMap, uri: &Uri) -> RequestOrigin {
        RequestOrigin::resolve(self.config.public_base_url.as_deref(), headers, uri)
    }
}

// =============================================================================
// Responses
// =============================================================================

/// The `error` member: `false` on success, a message otherwise.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ErrorFlag {
    Flag(bool),
    Message(String),
}

/// JSON body returned by the intake and after-call endpoints.
#[derive(Debug, Serialize)]
pub struct RelayResponse {
    pub error: ErrorFlag,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug: Option<Vec<String>>,
}

impl RelayResponse {
    pub fn ok() -> Self {
        Self {
            error: ErrorFlag::Flag(false),
            debug: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            error: ErrorFlag::Message(message.into()),
            debug: None,
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        (self.status(), Json(RelayResponse::failed(self.to_string()))).into_response()
    }
}

/// Health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Path parameters of the signed provider callbacks.
#[derive(Debug, Deserialize)]
pub struct CallbackPath {
    pub profile: String,
    pub sign: String,
    pub collect_app: String,
    pub section: String,
}

impl CallbackPath {
    fn session(&self) -> SessionContext {
        SessionContext::new(&self.collect_app, &self.section)
    }
}

/// Query parameters the provider appends to the after-call callback.
#[derive(Debug, Default, Deserialize)]
pub struct AfterCallQuery {
    #[serde(rename = "RecordingUrl")]
    pub recording_url: Option<String>,
    #[serde(rename = "RecordingDuration")]
    pub recording_duration: Option<String>,
    #[serde(rename = "Digits")]
    pub digits: Option<String>,
}

// =============================================================================
// Root
// =============================================================================

/// Greeting; this service has no web interface.
pub async fn greeting(State(state): State<AppState>) -> &'static str {
    debug!(route = "/", "route_open");
    state.profile.greeting
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

/// Properties schema for the settings form.
pub async fn settings_schema(State(state): State<AppState>) -> Json<Value> {
    debug!(route = "/settings.schema.json", "route_open");
    Json(state.profile.settings_schema.clone())
}

// =============================================================================
// Profile Stream Intake
// =============================================================================

/// Hub profile stream webhook.
///
/// Every failure is answered with HTTP 200 and `{"error": "<message>"}`.
pub async fn stream_intake(
    State(state): State<AppState>,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    debug!(route = "/", body_length = body.len(), "route_open");

    match place_call_for_event(&state, &headers, &uri, &body).await {
        Ok(response) => Json(response).into_response(),
        Err(e) => {
            error!(kind = e.kind(), error = %e, "stream_intake_failed");
            e.into_response()
        }
    }
}

async fn place_call_for_event(
    state: &AppState,
    headers: &HeaderMap,
    uri: &Uri,
    body: &[u8],
) -> RelayResult<RelayResponse> {
    let event = parse_stream_payload(body)?;
    let scope = ProfileScope::new(&event.profile_id)
        .with_session(&event.session.collect_app, &event.session.section);
    let span = info_span!("stream_intake", profile_id = %scope.profile_id);

    async move {
        let settings = settings::resolve(&state.profile.intake_defaults, state.hub.as_ref()).await?;

        let field = settings
            .text(NUMBER_EVENT_DATA)
            .unwrap_or_else(|| "phonenumber".to_string());

        let number = event.data_text(&field).ok_or_else(|| {
            RelayError::Validation(format!(
                "Event in Profile {} has no phone number in data \"{}\"",
                event.profile_id, field
            ))
        })?;

        let callback = build_url(
            &state.origin(headers, uri),
            &state.signatures,
            &scope.profile_id,
            CALL_PATH,
            SessionContext::from_scope(&scope).as_ref(),
        )?;

        let account = ProviderAccount::from_settings(&settings)?;
        let call = OutboundCall {
            from: caller_number(&settings)?,
            to: number,
            callback_url: callback.to_string(),
        };

        let call_sid = state.calls.place_call(&account, &call).await?;

        info!(
            call_sid = %call_sid,
            to = %call.to,
            collect_app = ?scope.collect_app,
            section = ?scope.section,
            "call_requested"
        );

        Ok::<_, RelayError>(RelayResponse {
            error: ErrorFlag::Flag(false),
            debug: state
                .config
                .echo_call_debug
                .then(|| vec![call.from, call.to, call.callback_url]),
        })
    }
    .instrument(span)
    .await
}

// =============================================================================
// Call Control Document
// =============================================================================

/// Provider fetches what to do once the callee answers.
pub async fn call_control(
    State(state): State<AppState>,
    uri: Uri,
    headers: HeaderMap,
    Path(path): Path<CallbackPath>,
) -> Response {
    debug!(route = "/call", profile_id = %path.profile, "route_open");

    if !state.signatures.verify(&path.profile, &path.sign) {
        warn!(profile_id = %path.profile, "call_control_bad_signature");
        return RelayError::Signature.into_response();
    }

    match control_document(&state, &headers, &uri, &path).await {
        Ok(xml) => ([(header::CONTENT_TYPE, "application/xml")], xml).into_response(),
        Err(e) => {
            error!(kind = e.kind(), error = %e, profile_id = %path.profile, "call_control_failed");
            e.into_response()
        }
    }
}

async fn control_document(
    state: &AppState,
    headers: &HeaderMap,
    uri: &Uri,
    path: &CallbackPath,
) -> RelayResult<String> {
    let settings = settings::resolve(&state.profile.call_defaults, state.hub.as_ref()).await?;

    let action = build_url(
        &state.origin(headers, uri),
        &state.signatures,
        &path.profile,
        AFTER_CALL_PATH,
        Some(&path.session()),
    )?;

    let document = voice_response(&settings, action.as_str());

    info!(
        profile_id = %path.profile,
        collect_app = %path.collect_app,
        section = %path.section,
        verbs = document.verbs().len(),
        "call_control_rendered"
    );

    Ok(document.to_xml())
}

/// Optional message, a pause, then a recording reported to `action`.
pub fn voice_response(settings: &SettingsMap, action: &str) -> VoiceResponse {
    let mut document = VoiceResponse::new();

    if let Some(message) = settings
        .text(VOICE_MESSAGE)
        .map(|m| m.trim().to_string())
        .filter(|m| !m.is_empty())
    {
        document = document.say(message, SAY_VOICE);
    }

    document.pause(None).record(RecordOptions {
        action: action.to_string(),
        timeout: settings.integer(RECORD_TIMEOUT, 5),
        max_length: settings.integer(RECORD_MAX_LENGTH, 3600),
        play_beep: settings.flag(RECORD_PLAY_BEEP, true),
        method: "GET".to_string(),
    })
}

// =============================================================================
// After Call
// =============================================================================

/// Provider reports that the recording is ready.
///
/// The query is only inspected once the signature holds; a malformed query is
/// answered like any other failure, with HTTP 200 and `{"error": ...}`.
pub async fn after_call(
    State(state): State<AppState>,
    Path(path): Path<CallbackPath>,
    query: Result<Query<AfterCallQuery>, QueryRejection>,
) -> Response {
    debug!(route = "/afterCall", profile_id = %path.profile, "route_open");

    if !state.signatures.verify(&path.profile, &path.sign) {
        warn!(profile_id = %path.profile, "after_call_bad_signature");
        return RelayError::Signature.into_response();
    }

    let result = match query {
        Ok(Query(query)) => store_recording(&state, &path, query).await,
        Err(rejection) => Err(RelayError::Parse(rejection.body_text())),
    };

    match result {
        Ok(response) => Json(response).into_response(),
        Err(e) => {
            error!(kind = e.kind(), error = %e, profile_id = %path.profile, "after_call_failed");
            e.into_response()
        }
    }
}

async fn store_recording(
    state: &AppState,
    path: &CallbackPath,
    query: AfterCallQuery,
) -> RelayResult<RelayResponse> {
    let recording_url = match query.recording_url.filter(|u| !u.trim().is_empty()) {
        Some(url) => url,
        None => {
            return match state.profile.missing_recording {
                MissingRecording::Error => Err(RelayError::Validation(
                    "There is no \"RecordingUrl\" parameter".to_string(),
                )),
                MissingRecording::Ignore => {
                    info!(
                        profile_id = %path.profile,
                        digits = ?query.digits,
                        "after_call_without_recording"
                    );
                    Ok(RelayResponse::ok())
                }
            };
        }
    };

    let asset_url = format!("{}{}", recording_url.trim(), RECORDING_FORMAT_SUFFIX);

    let scope = ProfileScope::new(&path.profile).with_session(&path.collect_app, &path.section);
    let mut attributes = SettingsMap::new();
    attributes.insert(VOICE_FEEDBACK_ATTRIBUTE.to_string(), Value::String(asset_url.clone()));

    state.hub.set_profile_attributes(&scope, &attributes).await?;

    info!(
        profile_id = %path.profile,
        collect_app = %path.collect_app,
        section = %path.section,
        recording_url = %asset_url,
        recording_duration = ?query.recording_duration,
        "after_call_recording_stored"
    );

    Ok(RelayResponse::ok())
}
