use std::time::Duration;

use thiserror::Error;

/// How the dispatcher should treat a failed outbound call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallFailure {
    /// Upstream answered "too many requests", optionally with a mandated wait.
    Throttled { retry_after: Option<Duration> },
    Other,
}

/// Classifies a failed call for the dispatcher.
///
/// Implemented by the error type of every operation passed to
/// [`RateLimitedDispatcher::dispatch`](super::RateLimitedDispatcher::dispatch).
pub trait ThrottleSignal {
    fn classify(&self) -> CallFailure;
}

/// Non-success HTTP answer from an upstream REST service.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("HTTP {status}: {message}")]
pub struct HttpStatusFailure {
    pub status: u16,
    pub retry_after: Option<Duration>,
    pub message: String,
}

impl HttpStatusFailure {
    pub const TOO_MANY_REQUESTS: u16 = 429;

    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            retry_after: None,
            message: message.into(),
        }
    }

    /// Builds a failure from a status and the raw `Retry-After` header value.
    pub fn with_retry_after_header(
        status: u16,
        retry_after: Option<&str>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            status,
            retry_after: retry_after.and_then(parse_retry_after),
            message: message.into(),
        }
    }

    pub fn is_throttled(&self) -> bool {
        self.status == Self::TOO_MANY_REQUESTS
    }
}

impl ThrottleSignal for HttpStatusFailure {
    fn classify(&self) -> CallFailure {
        if self.is_throttled() {
            CallFailure::Throttled {
                retry_after: self.retry_after,
            }
        } else {
            CallFailure::Other
        }
    }
}

/// Parses a `Retry-After` value given in (possibly fractional) seconds.
///
/// Returns `None` for anything that is not a positive, finite number.
pub fn parse_retry_after(raw: &str) -> Option<Duration> {
    let secs = raw.trim().parse::<f64>().ok()?;
    if !secs.is_finite() || secs <= 0.0 {
        return None;
    }
    Duration::try_from_secs_f64(secs).ok()
}
