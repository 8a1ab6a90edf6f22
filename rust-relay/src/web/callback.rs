//! Signed callback URLs.
//!
//! Callback URLs have the shape
//! `{origin}{path}/{profile}/{signature}[/{collect_app}/{section}]` and are
//! resolved against the origin the inbound request reached, so the Call
//! Provider calls back into the same deployed instance.

use axum::http::{header, HeaderMap, Uri};
use tracing::warn;
use url::Url;

use crate::error::{RelayError, RelayResult};
use crate::hub::ProfileScope;
use crate::web::signature::SignatureScheme;

/// Path of the call control document callback.
pub const CALL_PATH: &str = "/call";

/// Path of the recording-ready callback.
pub const AFTER_CALL_PATH: &str = "/afterCall";

/// Scheme and authority (plus optional base path) the request arrived on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestOrigin(String);

impl RequestOrigin {
    /// Use a configured public base URL verbatim.
    pub fn fixed(base_url: &str) -> Self {
        RequestOrigin(base_url.trim_end_matches('/').to_string())
    }

    /// Derive the origin from proxy headers, then `Host`, then the request URI.
    pub fn from_headers(headers: &HeaderMap, uri: &Uri) -> Self {
        let header_value = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                // Proxies may append a comma-separated chain
                .and_then(|v| v.split(',').next())
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let scheme = header_value("x-forwarded-proto")
            .or_else(|| uri.scheme_str().map(str::to_string))
            .unwrap_or_else(|| "http".to_string());
        let host = header_value("x-forwarded-host")
            .or_else(|| header_value(header::HOST.as_str()))
            .or_else(|| uri.authority().map(|a| a.to_string()))
            .unwrap_or_else(|| {
                // Callbacks built from this origin will not reach us from outside
                warn!(uri = %uri, "request_origin_unknown");
                "localhost".to_string()
            });

        RequestOrigin(format!("{}://{}", scheme, host))
    }

    /// Pick the configured base URL when present, otherwise the request headers.
    pub fn resolve(public_base_url: Option<&str>, headers: &HeaderMap, uri: &Uri) -> Self {
        match public_base_url {
            Some(base) => RequestOrigin::fixed(base),
            None => RequestOrigin::from_headers(headers, uri),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Interaction flow a callback belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    pub collect_app: String,
    pub section: String,
}

impl SessionContext {
    pub fn new(collect_app: impl Into<String>, section: impl Into<String>) -> Self {
        Self {
            collect_app: collect_app.into(),
            section: section.into(),
        }
    }

    /// Session of a scope, when it names both collect app and section.
    pub fn from_scope(scope: &ProfileScope) -> Option<Self> {
        match (&scope.collect_app, &scope.section) {
            (Some(collect_app), Some(section)) => Some(Self::new(collect_app, section)),
            _ => None,
        }
    }
}

/// Build a signed callback URL.
///
/// Every dynamic segment is percent-encoded as a single path segment.
/// Alphanumeric ids come out unchanged.
pub fn build_url(
    origin: &RequestOrigin,
    scheme: &SignatureScheme,
    profile_id: &str,
    path: &str,
    context: Option<&SessionContext>,
) -> RelayResult<Url> {
    let mut url = Url::parse(origin.as_str())
        .map_err(|e| RelayError::Validation(format!("Invalid callback origin {:?}: {}", origin.as_str(), e)))?;

    let signature = scheme.sign(profile_id);

    {
        let mut segments = url.path_segments_mut().map_err(|_| {
            RelayError::Validation(format!("Callback origin {:?} cannot carry a path", origin.as_str()))
        })?;
        segments.pop_if_empty();
        segments.extend(path.split('/').filter(|s| !s.is_empty()));
        segments.push(profile_id);
        segments.push(&signature);
        if let Some(ctx) = context {
            segments.push(&ctx.collect_app);
            segments.push(&ctx.section);
        }
    }

    Ok(url)
}
