use std::time::{Duration, Instant};

/// Retry state of one logical request.
///
/// Each transition returns a new value; the pipeline threads it through the
/// retry loop and drops it once the request settles.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestMeta {
    start: Instant,
    correlation_id: String,
    server_correlation: bool,
    attempt: u32,
    max_attempts: u32,
    allow_mutation_retry: bool,
    refreshed: bool,
}

impl RequestMeta {
    /// State of the first attempt, with a fresh client-generated correlation id.
    pub fn first(max_attempts: u32, allow_mutation_retry: bool) -> Self {
        Self {
            start: Instant::now(),
            correlation_id: uuid::Uuid::new_v4().to_string(),
            server_correlation: false,
            attempt: 1,
            max_attempts,
            allow_mutation_retry,
            refreshed: false,
        }
    }

    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn allow_mutation_retry(&self) -> bool {
        self.allow_mutation_retry
    }

    /// Whether the one-shot credential refresh has been used.
    pub fn refreshed(&self) -> bool {
        self.refreshed
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// True while the generic retry budget allows another send.
    pub fn has_attempts_left(&self) -> bool {
        self.attempt < self.max_attempts
    }

    /// State for the next send of the same logical request.
    pub fn next_attempt(&self) -> Self {
        Self {
            attempt: self.attempt.saturating_add(1),
            ..self.clone()
        }
    }

    /// Marks the refresh as used and grants the resend it triggers, so the
    /// refresh never takes a slot from the generic retry budget.
    pub fn mark_refreshed(&self) -> Self {
        Self {
            refreshed: true,
            max_attempts: self.max_attempts.saturating_add(1),
            ..self.next_attempt()
        }
    }

    /// Adopts the id echoed by the server. Only the first adoption sticks.
    pub fn adopt_server_correlation_id(&self, server_id: Option<&str>) -> Self {
        match server_id {
            Some(id) if !self.server_correlation && !id.is_empty() => Self {
                correlation_id: id.to_owned(),
                server_correlation: true,
                ..self.clone()
            },
            _ => self.clone(),
        }
    }
}
