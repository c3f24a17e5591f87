use std::time::Duration;

/// Default value stamped into the `X-Client` header.
pub const DEFAULT_CLIENT_ID: &str = "narrative-dashboard";

/// Configures timeout, retry and session behavior of [`crate::ApiClient`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ClientOptions {
    /// Per-attempt timeout in milliseconds.
    pub timeout_ms: u64,
    /// Total number of sends allowed for one logical request, including the first.
    pub max_attempts: u32,
    /// Base retry backoff in milliseconds (exponential strategy).
    pub base_backoff_ms: u64,
    /// Upper bound for a single backoff delay in milliseconds.
    pub max_backoff_ms: u64,
    /// Identifier sent in the `X-Client` header.
    pub client_id: String,
    /// Name of the cookie holding the anti-forgery token.
    pub csrf_cookie_name: String,
    /// Login entry point reported when the session is torn down.
    pub login_path: String,
    /// Path requested by [`crate::ApiClient::health`].
    pub health_path: String,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout_ms: 10_000,
            max_attempts: 3,
            base_backoff_ms: 200,
            max_backoff_ms: 2_000,
            client_id: DEFAULT_CLIENT_ID.to_owned(),
            csrf_cookie_name: "csrf_token".to_owned(),
            login_path: "/login".to_owned(),
            health_path: "/health".to_owned(),
        }
    }
}

impl ClientOptions {
    /// Applies overrides from `NARRATIVE_API_TIMEOUT_MS` and
    /// `NARRATIVE_API_MAX_ATTEMPTS`.
    ///
    /// Unset variables keep the current value; unparsable ones are an error.
    pub fn from_env_overrides(mut self) -> Result<Self, String> {
        if let Some(timeout_ms) = read_env_number::<u64>("NARRATIVE_API_TIMEOUT_MS")? {
            self.timeout_ms = timeout_ms;
        }
        if let Some(max_attempts) = read_env_number::<u32>("NARRATIVE_API_MAX_ATTEMPTS")? {
            if max_attempts == 0 {
                return Err("NARRATIVE_API_MAX_ATTEMPTS must be at least 1".to_owned());
            }
            self.max_attempts = max_attempts;
        }
        Ok(self)
    }

    pub(crate) fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

fn read_env_number<T: std::str::FromStr>(name: &str) -> Result<Option<T>, String> {
    match std::env::var(name) {
        Ok(raw) if raw.trim().is_empty() => Ok(None),
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| format!("{name} must be a non-negative integer, got '{raw}'")),
        Err(_) => Ok(None),
    }
}
