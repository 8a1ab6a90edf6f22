//! Web server module for the Hub webhook and Call Provider callbacks.
//!
//! Routes:
//! - `GET /` greeting
//! - `POST /` Hub profile stream intake
//! - `POST|GET /call/{profile}/{sign}/{collectApp}/{section}` call control document
//! - `GET /afterCall/{profile}/{sign}/{collectApp}/{section}` recording callback
//! - `GET /health`, `GET /settings.schema.json`

pub mod callback;
pub mod handlers;
pub mod signature;

#[cfg(test)]
mod tests;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

pub use callback::{build_url, RequestOrigin, SessionContext};
pub use handlers::{
    after_call, call_control, greeting, health, settings_schema, stream_intake, AppState,
    ErrorFlag, HealthResponse, RelayResponse,
};
pub use signature::{sign, verify, SignatureScheme};

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(greeting).post(stream_intake))
        .route(
            "/call/:profile/:sign/:collect_app/:section",
            post(call_control).get(call_control),
        )
        .route(
            "/afterCall/:profile/:sign/:collect_app/:section",
            get(after_call),
        )
        .route("/health", get(health))
        .route("/settings.schema.json", get(settings_schema))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
