use reqwest::header::HeaderMap;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Stable error shape every caller receives.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ApiError {
    /// Machine-readable code, e.g. `SERVER_ERROR`.
    pub code: String,
    /// Human-readable description.
    pub message: String,
    /// Opaque extra data: status, server body, redirect target.
    pub details: JsonValue,
    /// Whether retrying the whole operation later may succeed.
    pub recoverable: bool,
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub total: Option<u64>,
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimit {
    pub limit: Option<u64>,
    pub remaining: Option<u64>,
    /// Reset time as sent by the server (usually epoch seconds).
    pub reset: Option<u64>,
}

/// Metadata attached to a successful response.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseMeta {
    pub pagination: Option<Pagination>,
    pub rate_limit: Option<RateLimit>,
    /// Correlation id in effect when the request settled.
    pub correlation_id: String,
    /// Number of sends the request took.
    pub attempts: u32,
}

impl ResponseMeta {
    pub(crate) fn from_headers(headers: &HeaderMap, correlation_id: &str, attempts: u32) -> Self {
        let pagination = Pagination {
            total: header_u64(headers, "x-total-count"),
            page: header_u64(headers, "x-page"),
            per_page: header_u64(headers, "x-per-page"),
        };
        let rate_limit = RateLimit {
            limit: header_u64(headers, "x-ratelimit-limit"),
            remaining: header_u64(headers, "x-ratelimit-remaining"),
            reset: header_u64(headers, "x-ratelimit-reset"),
        };
        Self {
            pagination: (pagination != Pagination::default()).then_some(pagination),
            rate_limit: (rate_limit != RateLimit::default()).then_some(rate_limit),
            correlation_id: correlation_id.to_owned(),
            attempts,
        }
    }
}

fn header_u64(headers: &HeaderMap, name: &str) -> Option<u64> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse().ok())
}

/// Normalized outcome of a request: payload or [`ApiError`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ApiResponse<T> {
    Success { data: T, meta: ResponseMeta },
    Failure { error: ApiError },
}

impl<T> ApiResponse<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn data(&self) -> Option<&T> {
        match self {
            Self::Success { data, .. } => Some(data),
            Self::Failure { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&ApiError> {
        match self {
            Self::Success { .. } => None,
            Self::Failure { error } => Some(error),
        }
    }

    /// Converts into a `Result` for `?`-style call sites.
    pub fn into_result(self) -> Result<T, ApiError> {
        match self {
            Self::Success { data, .. } => Ok(data),
            Self::Failure { error } => Err(error),
        }
    }
}
