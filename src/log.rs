//! Structured request logging.

use std::fmt;

/// How an attempt ended from the pipeline's point of view.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LogOutcome {
    Success,
    Retry,
    Refresh,
    Failed,
}

impl fmt::Display for LogOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Success => "success",
            Self::Retry => "retry",
            Self::Refresh => "refresh",
            Self::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// One log record for one attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestLog {
    pub method: String,
    pub url: String,
    /// `None` when no response was received.
    pub status: Option<u16>,
    pub attempt: u32,
    /// Elapsed time since the first attempt began.
    pub duration_ms: u64,
    pub correlation_id: String,
    pub outcome: LogOutcome,
}

pub trait RequestLogger: Send + Sync {
    fn log(&self, entry: &RequestLog);
}

/// Default logger emitting `tracing` events.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingLogger;

impl RequestLogger for TracingLogger {
    fn log(&self, entry: &RequestLog) {
        match entry.outcome {
            LogOutcome::Failed => tracing::warn!(
                method = %entry.method,
                url = %entry.url,
                status = entry.status,
                attempt = entry.attempt,
                duration_ms = entry.duration_ms,
                correlation_id = %entry.correlation_id,
                "api request failed"
            ),
            outcome => tracing::debug!(
                method = %entry.method,
                url = %entry.url,
                status = entry.status,
                attempt = entry.attempt,
                duration_ms = entry.duration_ms,
                correlation_id = %entry.correlation_id,
                outcome = %outcome,
                "api request"
            ),
        }
    }
}
