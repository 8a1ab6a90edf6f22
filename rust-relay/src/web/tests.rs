//! Router-level tests with in-memory Hub and Call Provider fakes.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use super::{router, sign, AppState};
use crate::deployment::Deployment;
use crate::error::{RelayError, RelayResult};
use crate::hub::{HubApi, ProfileScope};
use crate::provider::{CallProvider, OutboundCall, ProviderAccount};
use crate::settings::SettingsMap;
use crate::Config;

#[derive(Default)]
struct FakeHub {
    /// `None` makes every settings fetch fail
    settings: Option<SettingsMap>,
    writes: Mutex<Vec<(ProfileScope, SettingsMap)>>,
}

#[async_trait]
impl HubApi for FakeHub {
    async fn get_settings(&self) -> RelayResult<SettingsMap> {
        self.settings
            .clone()
            .ok_or_else(|| RelayError::Fetch("Settings not available".to_string()))
    }

    async fn set_settings(&self, _settings: &SettingsMap) -> RelayResult<()> {
        Ok(())
    }

    async fn set_profile_attributes(
        &self,
        scope: &ProfileScope,
        attributes: &SettingsMap,
    ) -> RelayResult<()> {
        self.writes
            .lock()
            .unwrap()
            .push((scope.clone(), attributes.clone()));
        Ok(())
    }
}

#[derive(Default)]
struct FakeProvider {
    reject_with: Option<String>,
    calls: Mutex<Vec<(ProviderAccount, OutboundCall)>>,
}

#[async_trait]
impl CallProvider for FakeProvider {
    async fn place_call(&self, account: &ProviderAccount, call: &OutboundCall) -> RelayResult<String> {
        if let Some(message) = &self.reject_with {
            return Err(RelayError::Provider(message.clone()));
        }
        self.calls
            .lock()
            .unwrap()
            .push((account.clone(), call.clone()));
        Ok("CA0001".to_string())
    }
}

struct Harness {
    app: Router,
    hub: Arc<FakeHub>,
    provider: Arc<FakeProvider>,
}

fn remote_settings() -> SettingsMap {
    json!({
        "TWILIO_ACCOUNT_SID": "AC123",
        "TWILIO_AUTH_TOKEN": "token",
        "TWILIO_NUMBER": "+1000",
        "VOICE_MESSAGE": "  Please leave a message  ",
        "RECORD_TIMEOUT": "10"
    })
    .as_object()
    .cloned()
    .unwrap()
}

fn harness_with(config: Config, hub: FakeHub, provider: FakeProvider) -> Harness {
    let hub = Arc::new(hub);
    let provider = Arc::new(provider);
    let state = AppState::new(config, hub.clone(), provider.clone());
    Harness {
        app: router(state),
        hub,
        provider,
    }
}

fn harness() -> Harness {
    harness_with(
        Config::default(),
        FakeHub {
            settings: Some(remote_settings()),
            ..Default::default()
        },
        FakeProvider::default(),
    )
}

fn stream_body(data: Value) -> Body {
    Body::from(
        json!({
            "profile": {
                "id": "u1",
                "sessions": [{
                    "collectApp": "app1",
                    "section": "s1",
                    "events": [{ "definitionId": "call-me", "data": data }]
                }]
            }
        })
        .to_string(),
    )
}

fn request(method: &str, uri: &str, body: Body) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::HOST, "relay.example.com")
        .body(body)
        .unwrap()
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, String, Option<String>) {
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, String::from_utf8(bytes.to_vec()).unwrap(), content_type)
}

async fn send_json(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let (status, body, _) = send(app, req).await;
    (status, serde_json::from_str(&body).unwrap())
}

// =============================================================================
// Root
// =============================================================================

#[tokio::test]
async fn test_greeting() {
    let h = harness();
    let (status, body, _) = send(&h.app, request("GET", "/", Body::empty())).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("Twilio Call application"));
}

#[tokio::test]
async fn test_health() {
    let h = harness();
    let (status, body) = send_json(&h.app, request("GET", "/health", Body::empty())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "ok"}));
}

#[tokio::test]
async fn test_settings_schema_route() {
    let h = harness();
    let (status, body) = send_json(&h.app, request("GET", "/settings.schema.json", Body::empty())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["TWILIO_NUMBER"]["type"], json!("string"));
}

// =============================================================================
// Intake
// =============================================================================

#[tokio::test]
async fn test_intake_places_call() {
    let h = harness();
    let (status, body) = send_json(
        &h.app,
        request("POST", "/", stream_body(json!({"phonenumber": "+155512345"}))),
    )
    .await;

    let expected_url = format!("http://relay.example.com/call/u1/{}/app1/s1", sign("u1"));

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["error"], json!(false));
    assert_eq!(body["debug"], json!(["+1000", "+155512345", expected_url]));

    let calls = h.provider.calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    let (account, call) = &calls[0];
    assert_eq!(account.account_sid, "AC123");
    assert_eq!(call.from, "+1000");
    assert_eq!(call.to, "+155512345");
    assert!(call
        .callback_url
        .contains(&format!("/call/u1/{}/app1/s1", sign("u1"))));
}

#[tokio::test]
async fn test_intake_without_host_uses_request_authority() {
    let h = harness();
    let req = Request::builder()
        .method("POST")
        .uri("http://relay.internal:3000/")
        .body(stream_body(json!({"phonenumber": "+155512345"})))
        .unwrap();

    let (status, body) = send_json(&h.app, req).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["debug"][2],
        json!(format!("http://relay.internal:3000/call/u1/{}/app1/s1", sign("u1")))
    );
}

#[tokio::test]
async fn test_intake_missing_phone_number() {
    let h = harness();
    let (status, body) = send_json(
        &h.app,
        request("POST", "/", stream_body(json!({"email": "a@b.c"}))),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let message = body["error"].as_str().unwrap();
    assert!(message.contains("phone number"));
    assert!(message.contains("phonenumber"));
    assert!(h.provider.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_intake_uses_configured_number_field() {
    let mut settings = remote_settings();
    settings.insert("NUMBER_EVENT_DATA".to_string(), json!("mobile"));
    let h = harness_with(
        Config::default(),
        FakeHub {
            settings: Some(settings),
            ..Default::default()
        },
        FakeProvider::default(),
    );

    let (_, body) = send_json(
        &h.app,
        request("POST", "/", stream_body(json!({"mobile": "+1777", "phonenumber": "+1888"}))),
    )
    .await;

    assert_eq!(body["error"], json!(false));
    assert_eq!(h.provider.calls.lock().unwrap()[0].1.to, "+1777");
}

#[tokio::test]
async fn test_intake_parse_error_is_ok_status() {
    let h = harness();
    let (status, body) = send_json(&h.app, request("POST", "/", Body::from("{\"nope\": 1}"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["error"], json!("Profile not found"));
}

#[tokio::test]
async fn test_intake_settings_failure() {
    let h = harness_with(Config::default(), FakeHub::default(), FakeProvider::default());
    let (status, body) = send_json(
        &h.app,
        request("POST", "/", stream_body(json!({"phonenumber": "+155512345"}))),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["error"], json!("Settings not available"));
    assert!(h.provider.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_intake_provider_rejection() {
    let h = harness_with(
        Config::default(),
        FakeHub {
            settings: Some(remote_settings()),
            ..Default::default()
        },
        FakeProvider {
            reject_with: Some("Invalid To number".to_string()),
            ..Default::default()
        },
    );

    let (status, body) = send_json(
        &h.app,
        request("POST", "/", stream_body(json!({"phonenumber": "+155512345"}))),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["error"], json!("Call Provider error: Invalid To number"));
}

#[tokio::test]
async fn test_intake_without_debug_echo() {
    let config = Config {
        echo_call_debug: false,
        public_base_url: Some("https://public.example.com".to_string()),
        ..Config::default()
    };
    let h = harness_with(
        config,
        FakeHub {
            settings: Some(remote_settings()),
            ..Default::default()
        },
        FakeProvider::default(),
    );

    let (_, body) = send_json(
        &h.app,
        request("POST", "/", stream_body(json!({"phonenumber": "+155512345"}))),
    )
    .await;

    assert_eq!(body, json!({"error": false}));
    assert!(h.provider.calls.lock().unwrap()[0]
        .1
        .callback_url
        .starts_with("https://public.example.com/call/u1/"));
}

// =============================================================================
// Call control document
// =============================================================================

#[tokio::test]
async fn test_call_control_document() {
    let h = harness();
    let uri = format!("/call/u1/{}/app1/s1", sign("u1"));

    for method in ["POST", "GET"] {
        let (status, body, content_type) = send(&h.app, request(method, &uri, Body::empty())).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(content_type.as_deref(), Some("application/xml"));
        assert!(body.contains("<Say voice=\"alice\">Please leave a message</Say>"));
        assert!(body.contains("<Pause/>"));
        assert!(body.contains(&format!(
            "action=\"http://relay.example.com/afterCall/u1/{}/app1/s1\"",
            sign("u1")
        )));
        assert!(body.contains("timeout=\"10\""));
        assert!(body.contains("maxLength=\"3600\""));
        assert!(body.contains("playBeep=\"true\""));
        assert!(body.contains("method=\"GET\""));
    }
}

#[tokio::test]
async fn test_call_control_without_message() {
    let mut settings = remote_settings();
    settings.insert("VOICE_MESSAGE".to_string(), json!("   "));
    let h = harness_with(
        Config::default(),
        FakeHub {
            settings: Some(settings),
            ..Default::default()
        },
        FakeProvider::default(),
    );

    let uri = format!("/call/u1/{}/app1/s1", sign("u1"));
    let (_, body, _) = send(&h.app, request("POST", &uri, Body::empty())).await;
    assert!(!body.contains("<Say"));
    assert!(body.contains("<Record "));
}

#[tokio::test]
async fn test_call_control_bad_signature() {
    let h = harness();
    let (status, body) = send_json(&h.app, request("GET", "/call/u1/WRONGSIG/app1/s1", Body::empty())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"error": "Bad request"}));
}

#[tokio::test]
async fn test_call_control_signature_of_other_profile() {
    let h = harness();
    let uri = format!("/call/u1/{}/app1/s1", sign("u2"));
    let (status, _) = send_json(&h.app, request("POST", &uri, Body::empty())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// =============================================================================
// After call
// =============================================================================

#[tokio::test]
async fn test_after_call_stores_recording() {
    let h = harness();
    let uri = format!(
        "/afterCall/u1/{}/app1/s1?RecordingUrl=https://host/rec123&RecordingDuration=12",
        sign("u1")
    );

    let (status, body) = send_json(&h.app, request("GET", &uri, Body::empty())).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"error": false}));

    let writes = h.hub.writes.lock().unwrap();
    assert_eq!(writes.len(), 1);
    let (scope, attributes) = &writes[0];
    assert_eq!(scope, &ProfileScope::new("u1").with_session("app1", "s1"));
    assert_eq!(attributes["last-voice-feedback"], json!("https://host/rec123.mp3"));
}

#[tokio::test]
async fn test_after_call_missing_recording_is_error() {
    let h = harness();
    let uri = format!("/afterCall/u1/{}/app1/s1", sign("u1"));

    let (status, body) = send_json(&h.app, request("GET", &uri, Body::empty())).await;

    assert_eq!(status, StatusCode::OK);
    assert!(!body["error"].as_str().unwrap().is_empty());
    assert!(h.hub.writes.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_after_call_missing_recording_ignored_by_feedback_deployment() {
    let config = Config {
        deployment: Deployment::Feedback,
        ..Config::default()
    };
    let h = harness_with(config, FakeHub::default(), FakeProvider::default());
    let uri = format!("/afterCall/u1/{}/app1/s1?RecordingUrl=", sign("u1"));

    let (status, body) = send_json(&h.app, request("GET", &uri, Body::empty())).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"error": false}));
    assert!(h.hub.writes.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_after_call_bad_signature() {
    let h = harness();
    let (status, body) = send_json(
        &h.app,
        request("GET", "/afterCall/u1/WRONGSIG/app1/s1?RecordingUrl=https://host/rec", Body::empty()),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"error": "Bad request"}));
    assert!(h.hub.writes.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_after_call_malformed_query_checks_signature_first() {
    let h = harness();
    let (status, body, content_type) = send(
        &h.app,
        request("GET", "/afterCall/u1/WRONGSIG/app1/s1?RecordingUrl=a&RecordingUrl=b", Body::empty()),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(content_type.as_deref(), Some("application/json"));
    assert_eq!(serde_json::from_str::<Value>(&body).unwrap(), json!({"error": "Bad request"}));
}

#[tokio::test]
async fn test_after_call_malformed_query_is_json_error() {
    let h = harness();
    let uri = format!("/afterCall/u1/{}/app1/s1?RecordingUrl=a&RecordingUrl=b", sign("u1"));

    let (status, body) = send_json(&h.app, request("GET", &uri, Body::empty())).await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["error"].as_str().unwrap().contains("RecordingUrl"));
    assert!(h.hub.writes.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_keyed_signatures_reject_legacy_urls() {
    let config = Config {
        callback_signing_key: Some("secret".to_string()),
        ..Config::default()
    };
    let h = harness_with(
        config,
        FakeHub {
            settings: Some(remote_settings()),
            ..Default::default()
        },
        FakeProvider::default(),
    );

    let legacy = format!("/call/u1/{}/app1/s1", sign("u1"));
    let (status, _, _) = send(&h.app, request("POST", &legacy, Body::empty())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, body) = send_json(
        &h.app,
        request("POST", "/", stream_body(json!({"phonenumber": "+155512345"}))),
    )
    .await;
    let issued = body["debug"][2].as_str().unwrap().to_string();
    let path = issued.trim_start_matches("http://relay.example.com");

    let (status, _, _) = send(&h.app, request("POST", path, Body::empty())).await;
    assert_eq!(status, StatusCode::OK);
}
