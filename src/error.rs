use serde_json::{json, Value as JsonValue};

use crate::ApiError;

/// Failure raised while obtaining or renewing credentials.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// No refresh credential is held, so a refresh cannot be attempted.
    #[error("no refresh token available")]
    MissingRefreshToken,
    /// The session holds a refresh token but no endpoint to send it to.
    #[error("no refresh endpoint configured")]
    MissingRefreshEndpoint,
    /// The refresh endpoint answered with a non-success status.
    #[error("token refresh rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },
    /// Network or request execution error while refreshing.
    #[error("token refresh transport error: {0}")]
    Transport(reqwest::Error),
    /// The refresh endpoint answered with an unexpected payload.
    #[error("token refresh returned an invalid payload: {0}")]
    InvalidPayload(String),
}

/// Internal failure of a single logical request, before normalization.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Network or request execution error from `reqwest`.
    #[error("transport error: {0}")]
    Transport(reqwest::Error),
    /// Non-success HTTP status code with raw response body.
    #[error("http error {status}: {body}")]
    Http { status: u16, body: String },
    /// Credential refresh failed after a 401; the session was torn down.
    #[error("authentication failed: {source}")]
    Auth {
        #[source]
        source: AuthError,
        /// Login entry point the caller should navigate to.
        redirect: String,
    },
    /// Malformed request configuration; nothing was sent.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    /// Success response whose body could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),
}

impl ClientError {
    /// HTTP status associated with this failure, if one was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            Self::Auth {
                source: AuthError::Rejected { status, .. },
                ..
            } => Some(*status),
            Self::Transport(err) => err.status().map(|status| status.as_u16()),
            _ => None,
        }
    }
}

/// Converts any pipeline failure into the stable [`ApiError`] shape.
pub fn normalize(err: &ClientError) -> ApiError {
    match err {
        ClientError::Transport(inner) if inner.is_timeout() => ApiError {
            code: "TIMEOUT".to_owned(),
            message: "the request timed out".to_owned(),
            details: json!({ "cause": inner.to_string() }),
            recoverable: true,
        },
        ClientError::Transport(inner) => ApiError {
            code: "NETWORK_ERROR".to_owned(),
            message: "the server could not be reached".to_owned(),
            details: json!({ "cause": inner.to_string() }),
            recoverable: true,
        },
        ClientError::Http { status, body } => normalize_http(*status, body),
        ClientError::Auth { source, redirect } => ApiError {
            code: "AUTH_REFRESH_FAILED".to_owned(),
            message: "your session has expired, please sign in again".to_owned(),
            details: json!({ "cause": source.to_string(), "redirect": redirect }),
            recoverable: false,
        },
        ClientError::InvalidRequest(reason) => ApiError {
            code: "INVALID_REQUEST".to_owned(),
            message: reason.clone(),
            details: JsonValue::Null,
            recoverable: false,
        },
        ClientError::Decode(reason) => ApiError {
            code: "DECODE_ERROR".to_owned(),
            message: "the server returned an unreadable response".to_owned(),
            details: json!({ "cause": reason }),
            recoverable: false,
        },
    }
}

fn normalize_http(status: u16, body: &str) -> ApiError {
    let (code, default_message, recoverable) = match status {
        401 => ("UNAUTHORIZED".to_owned(), "authentication required", false),
        403 => ("FORBIDDEN".to_owned(), "access denied", false),
        404 => ("NOT_FOUND".to_owned(), "resource not found", false),
        408 => ("REQUEST_TIMEOUT".to_owned(), "the server timed out", true),
        409 => ("CONFLICT".to_owned(), "the resource was modified concurrently", false),
        422 => ("VALIDATION_FAILED".to_owned(), "the request was rejected as invalid", false),
        429 => ("RATE_LIMITED".to_owned(), "too many requests", true),
        500..=599 => ("SERVER_ERROR".to_owned(), "the server failed to process the request", true),
        other => (format!("HTTP_{other}"), "the request failed", false),
    };

    let parsed = serde_json::from_str::<JsonValue>(body).ok();
    let server_message = parsed.as_ref().and_then(|value| {
        value
            .get("message")
            .or_else(|| value.get("error"))
            .and_then(JsonValue::as_str)
            .map(str::to_owned)
    });
    let server_code = parsed
        .as_ref()
        .and_then(|value| value.get("code"))
        .and_then(JsonValue::as_str)
        .map(str::to_owned);
    let body_detail = match parsed {
        Some(value) => value,
        None if body.is_empty() => JsonValue::Null,
        None => JsonValue::String(body.to_owned()),
    };

    ApiError {
        code: server_code.unwrap_or(code),
        message: server_message.unwrap_or_else(|| default_message.to_owned()),
        details: json!({ "status": status, "body": body_detail }),
        recoverable,
    }
}
