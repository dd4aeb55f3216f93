//! Adaptive, concurrency-bounded dispatcher for outbound calls.
//!
//! Every call against a rate-limited upstream goes through one shared
//! [`RateLimitedDispatcher`]. It caps how many calls are in flight at once and
//! keeps a small delay per [`EndpointClass`] that grows when the upstream
//! throttles us and decays as calls succeed again.

mod delay;
mod signal;

use std::{borrow::Cow, fmt, future::Future, sync::Arc, time::Duration};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::clock::{Clock, TokioClock};

pub use delay::{DelayPolicy, DelayTable, MAX_DELAY_SECS};
pub use signal::{CallFailure, HttpStatusFailure, ThrottleSignal, parse_retry_after};

use delay::secs_to_duration;

/// Category of outbound calls sharing one adaptive delay.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EndpointClass(Cow<'static, str>);

impl EndpointClass {
    pub const DEFAULT: EndpointClass = EndpointClass(Cow::Borrowed("default"));

    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for EndpointClass {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for EndpointClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&'static str> for EndpointClass {
    fn from(value: &'static str) -> Self {
        Self(Cow::Borrowed(value))
    }
}

impl From<String> for EndpointClass {
    fn from(value: String) -> Self {
        Self(Cow::Owned(value))
    }
}

/// Sizing for the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DispatcherConfig {
    /// Permits shared by every caller.
    pub max_concurrency: usize,
    #[serde(default)]
    pub delay: DelayPolicy,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 45,
            delay: DelayPolicy::default(),
        }
    }
}

/// Failure observed by a dispatcher caller.
#[derive(Debug, Error)]
pub enum DispatchError<E> {
    /// Upstream throttled the call. Any mandated wait has already been paid.
    #[error("upstream throttled `{endpoint}` (retry after {retry_after:?})")]
    Throttled {
        endpoint: EndpointClass,
        retry_after: Option<Duration>,
        #[source]
        source: E,
    },

    #[error("upstream call failed")]
    Upstream(#[source] E),

    #[error("dispatcher is closed")]
    Closed,
}

impl<E> DispatchError<E> {
    /// Throttles are worth retrying; retry policy itself is up to the caller.
    pub fn is_retryable(&self) -> bool {
        matches!(self, DispatchError::Throttled { .. })
    }

    /// The operation's own error, if the operation ran at all.
    pub fn into_source(self) -> Option<E> {
        match self {
            DispatchError::Throttled { source, .. } | DispatchError::Upstream(source) => {
                Some(source)
            }
            DispatchError::Closed => None,
        }
    }
}

/// Shared outbound-call throttle.
///
/// Construct once and hand out clones of the `Arc` to every caller.
pub struct RateLimitedDispatcher {
    permits: Arc<Semaphore>,
    capacity: usize,
    delays: DelayTable,
    policy: DelayPolicy,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for RateLimitedDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateLimitedDispatcher")
            .field("capacity", &self.capacity)
            .field("available_permits", &self.permits.available_permits())
            .field("tracked_endpoints", &self.delays.len())
            .field("policy", &self.policy)
            .field("clock", &self.clock)
            .finish()
    }
}

impl Default for RateLimitedDispatcher {
    fn default() -> Self {
        Self::new(DispatcherConfig::default())
    }
}

impl RateLimitedDispatcher {
    pub fn new(config: DispatcherConfig) -> Self {
        Self::with_clock(config, Arc::new(TokioClock))
    }

    pub fn with_clock(config: DispatcherConfig, clock: Arc<dyn Clock>) -> Self {
        let capacity = config.max_concurrency.max(1);
        Self {
            permits: Arc::new(Semaphore::new(capacity)),
            capacity,
            delays: DelayTable::new(),
            policy: config.delay,
            clock,
        }
    }

    /// Runs `operation` under the concurrency budget and the endpoint's delay.
    ///
    /// On a throttle the endpoint's delay grows and, when the upstream sent a
    /// retry-after hint, the caller is held for that long before it sees the
    /// failure. The call is never retried here.
    pub async fn dispatch<T, E, F, Fut>(
        &self,
        endpoint: &EndpointClass,
        operation: F,
    ) -> Result<T, DispatchError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: ThrottleSignal,
    {
        let permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| DispatchError::Closed)?;

        let pre_delay = self.delays.current(endpoint);
        if pre_delay > 0.0 {
            debug!(endpoint = %endpoint, delay_secs = pre_delay, "delaying outbound call");
            self.clock.sleep(secs_to_duration(pre_delay)).await;
        }

        match operation().await {
            Ok(value) => {
                drop(permit);
                let next = self.policy.after_success(self.delays.current(endpoint));
                self.delays.store(endpoint, next);
                Ok(value)
            }
            Err(err) => match err.classify() {
                CallFailure::Throttled { retry_after } => {
                    let next = self.policy.after_throttle(self.delays.current(endpoint));
                    self.delays.store(endpoint, next);
                    warn!(
                        endpoint = %endpoint,
                        delay_secs = next,
                        retry_after_secs = retry_after.map(|d| d.as_secs_f64()),
                        "upstream throttled outbound call"
                    );
                    if let Some(wait) = retry_after {
                        self.clock.sleep(wait).await;
                    }
                    drop(permit);
                    Err(DispatchError::Throttled {
                        endpoint: endpoint.clone(),
                        retry_after,
                        source: err,
                    })
                }
                CallFailure::Other => {
                    drop(permit);
                    Err(DispatchError::Upstream(err))
                }
            },
        }
    }

    /// Current adaptive delay for `endpoint`, in seconds.
    pub fn delay_for(&self, endpoint: &EndpointClass) -> f64 {
        self.delays.current(endpoint)
    }

    pub fn available_permits(&self) -> usize {
        self.permits.available_permits()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Rejects every pending and future dispatch with [`DispatchError::Closed`].
    pub fn close(&self) {
        self.permits.close();
    }

    pub fn is_closed(&self) -> bool {
        self.permits.is_closed()
    }
}
