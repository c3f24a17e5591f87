//! `narrative-http` is a resilient async client for the Emergent Narrative
//! backend API.
//!
//! Every call made through [`ApiClient`] goes through one pipeline:
//! - credential, CSRF and correlation headers on each attempt
//! - bounded retry with exponential backoff for transient failures
//! - a single credential refresh when the server answers 401
//! - one normalized [`ApiResponse`] / [`ApiError`] shape for callers
//!
//! ```no_run
//! use narrative_http::{ApiClient, ApiResponse};
//! use serde_json::Value;
//!
//! # async fn run() {
//! let api = ApiClient::new_bearer("http://localhost:8000/api", "token");
//! match api.get::<Value>("/stories").await {
//!     ApiResponse::Success { data, .. } => println!("{data}"),
//!     ApiResponse::Failure { error } => eprintln!("{error}"),
//! }
//! # }
//! ```

mod auth;
mod client;
mod envelope;
mod error;
mod headers;
mod health;
mod log;
mod metadata;
mod options;
mod request;

pub mod retry;

pub use auth::{AuthProvider, SessionStore};
pub use client::{ApiClient, DEFAULT_REFRESH_PATH};
pub use envelope::{ApiError, ApiResponse, Pagination, RateLimit, ResponseMeta};
pub use error::{normalize, AuthError, ClientError};
pub use health::{discover_local_backend, HealthMonitor, HealthStatus};
pub use log::{LogOutcome, RequestLog, RequestLogger, TracingLogger};
pub use metadata::RequestMeta;
pub use options::{ClientOptions, DEFAULT_CLIENT_ID};
pub use request::ApiRequest;
