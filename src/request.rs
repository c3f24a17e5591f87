use reqwest::{
    header::{HeaderMap, HeaderName, HeaderValue},
    Method,
};
use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::error::ClientError;

/// One logical API call, with optional per-call retry overrides.
#[derive(Clone, Debug)]
pub struct ApiRequest {
    /// HTTP verb.
    pub method: Method,
    /// Path joined onto the client's base URL, or an absolute `http(s)` URL.
    pub path: String,
    /// Query string pairs.
    pub query: Vec<(String, String)>,
    /// JSON body, sent with `Content-Type: application/json`.
    pub body: Option<JsonValue>,
    /// Extra headers sent on every attempt.
    pub headers: HeaderMap,
    /// Overrides the client's `max_attempts`.
    pub max_attempts: Option<u32>,
    /// Permits retrying a mutating verb without an idempotency key.
    pub allow_mutation_retry: bool,
    pub(crate) refresh_on_unauthorized: bool,
    invalid: Option<String>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            headers: HeaderMap::new(),
            max_attempts: None,
            allow_mutation_retry: false,
            refresh_on_unauthorized: true,
            invalid: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Serializes `body` as the JSON payload.
    ///
    /// A serialization failure is reported when the request is sent.
    pub fn json<B: Serialize + ?Sized>(mut self, body: &B) -> Self {
        match serde_json::to_value(body) {
            Ok(value) => self.body = Some(value),
            Err(err) => self.invalidate(format!("body is not serializable: {err}")),
        }
        self
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Adds a header. An invalid name or value is reported when the request is sent.
    pub fn header(mut self, name: &str, value: &str) -> Self {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                self.headers.insert(name, value);
            }
            _ => self.invalidate(format!("invalid header '{name}'")),
        }
        self
    }

    /// Sets an `Idempotency-Key`, which makes a mutating request retryable.
    pub fn idempotency_key(self, key: &str) -> Self {
        self.header("idempotency-key", key)
    }

    pub fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    pub fn allow_mutation_retry(mut self, allow: bool) -> Self {
        self.allow_mutation_retry = allow;
        self
    }

    /// Returns a 401 as-is instead of refreshing credentials and resending.
    /// The session is left untouched either way.
    pub fn without_auth_refresh(mut self) -> Self {
        self.refresh_on_unauthorized = false;
        self
    }

    pub(crate) fn validate(&self) -> Result<(), ClientError> {
        match &self.invalid {
            Some(reason) => Err(ClientError::InvalidRequest(reason.clone())),
            None => Ok(()),
        }
    }

    fn invalidate(&mut self, reason: String) {
        self.invalid.get_or_insert(reason);
    }
}

/// Resolves `path` against `base_url` unless it is already absolute.
pub(crate) fn resolve_url(base_url: &str, path: &str) -> Result<reqwest::Url, ClientError> {
    let joined = if path.starts_with("http://") || path.starts_with("https://") {
        path.to_owned()
    } else {
        format!(
            "{}/{}",
            base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    };
    reqwest::Url::parse(&joined)
        .map_err(|err| ClientError::InvalidRequest(format!("invalid url '{joined}': {err}")))
}
