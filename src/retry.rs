//! Retry classification and backoff for the request pipeline.

use std::time::Duration;

use reqwest::{header::HeaderMap, Method, StatusCode};

use crate::ClientOptions;

/// Header names that mark a mutating request as safe to resend.
pub const IDEMPOTENCY_HEADERS: [&str; 2] = ["idempotency-key", "x-idempotency-key"];

/// Returns true for statuses worth another attempt: 408, 429 and any 5xx.
pub fn is_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
        || status.is_server_error()
}

/// Returns true for transport failures that never produced a response.
pub fn is_retryable_transport(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request() || err.is_body()
}

/// GET, HEAD and OPTIONS can always be resent.
pub fn is_safe_method(method: &Method) -> bool {
    matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS)
}

/// Verbs that change server state and carry the CSRF token.
pub fn is_mutating_method(method: &Method) -> bool {
    matches!(
        *method,
        Method::POST | Method::PUT | Method::PATCH | Method::DELETE
    )
}

/// Case-insensitive lookup of an idempotency key header.
pub fn has_idempotency_key(headers: &HeaderMap) -> bool {
    headers.keys().any(|name| {
        IDEMPOTENCY_HEADERS
            .iter()
            .any(|candidate| name.as_str().eq_ignore_ascii_case(candidate))
    })
}

/// Backoff before resending after `attempt` (1-based) failed.
///
/// `min(max_backoff_ms, base_backoff_ms * 2^(attempt - 1))`
pub fn backoff_delay(options: &ClientOptions, attempt: u32) -> Duration {
    let exp = attempt.saturating_sub(1).min(16);
    let multiplier = 1u64 << exp;
    let delay_ms = options
        .base_backoff_ms
        .saturating_mul(multiplier)
        .min(options.max_backoff_ms);
    Duration::from_millis(delay_ms)
}

/// Whether a failure of this kind may be resent at all, ignoring the budget.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Failure {
    Status(StatusCode),
    /// Connect, timeout or body failure without a usable response.
    Transport,
    /// Transport failure that will not go away on resend, e.g. a builder error.
    Fatal,
}

impl Failure {
    fn is_transient(self) -> bool {
        match self {
            Self::Status(status) => is_retryable_status(status),
            Self::Transport => true,
            Self::Fatal => false,
        }
    }
}

/// Full generic-retry decision: budget, failure class and method safety.
pub fn should_retry(
    failure: Failure,
    method: &Method,
    mutation_retry_allowed: bool,
    attempts_left: bool,
) -> bool {
    attempts_left
        && failure.is_transient()
        && (is_safe_method(method) || mutation_retry_allowed)
}
