//! Outbound diagnostic headers and inbound correlation-id lookup.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

use crate::metadata::RequestMeta;

pub const X_CSRF_TOKEN: HeaderName = HeaderName::from_static("x-csrf-token");
pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");
pub const X_CORRELATION_ID: HeaderName = HeaderName::from_static("x-correlation-id");
pub const X_CLIENT: HeaderName = HeaderName::from_static("x-client");
pub const X_ATTEMPT: HeaderName = HeaderName::from_static("x-attempt");
pub const X_REQUEST_DURATION: HeaderName = HeaderName::from_static("x-request-duration");

/// Stamps tracing headers for the current attempt.
///
/// These only serve server-side log correlation.
pub(crate) fn stamp_diagnostics(headers: &mut HeaderMap, meta: &RequestMeta, client_id: &str) {
    if let Ok(value) = HeaderValue::from_str(meta.correlation_id()) {
        headers.insert(X_REQUEST_ID, value.clone());
        headers.insert(X_CORRELATION_ID, value);
    }
    if let Ok(value) = HeaderValue::from_str(client_id) {
        headers.insert(X_CLIENT, value);
    }
    headers.insert(X_ATTEMPT, HeaderValue::from(meta.attempt()));
    let elapsed_ms = u64::try_from(meta.elapsed().as_millis()).unwrap_or(u64::MAX);
    headers.insert(X_REQUEST_DURATION, HeaderValue::from(elapsed_ms));
}

/// Correlation id echoed by the server, preferring `x-correlation-id`.
pub(crate) fn server_correlation_id(headers: &HeaderMap) -> Option<&str> {
    [X_CORRELATION_ID, X_REQUEST_ID]
        .iter()
        .filter_map(|name| headers.get(name))
        .filter_map(|value| value.to_str().ok())
        .map(str::trim)
        .find(|value| !value.is_empty())
}

/// Finds `name` in a `Cookie` header value such as `a=1; csrf_token=xyz`.
pub(crate) fn cookie_value<'a>(cookie_header: &'a str, name: &str) -> Option<&'a str> {
    cookie_header
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim())
        .filter(|value| !value.is_empty())
}

pub(crate) fn normalize_bearer_authorization(token: &str) -> String {
    let trimmed = token.trim();
    let prefix = trimmed.get(..7);
    if prefix.is_some_and(|value| value.eq_ignore_ascii_case("bearer ")) {
        trimmed.to_owned()
    } else {
        format!("Bearer {trimmed}")
    }
}
