use std::time::Duration;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use super::EndpointClass;

/// Hard upper bound for any endpoint's delay, in seconds.
pub const MAX_DELAY_SECS: f64 = 5.0;

/// Step sizes for the adaptive per-endpoint delay.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DelayPolicy {
    /// Upper bound for any endpoint's delay, in seconds. Never above
    /// [`MAX_DELAY_SECS`].
    pub ceiling_secs: f64,
    /// Added to the delay every time the upstream throttles us.
    pub throttle_step_secs: f64,
    /// Removed from the delay after every successful call.
    pub decay_step_secs: f64,
}

impl Default for DelayPolicy {
    fn default() -> Self {
        Self {
            ceiling_secs: MAX_DELAY_SECS,
            throttle_step_secs: 0.5,
            decay_step_secs: 0.1,
        }
    }
}

impl DelayPolicy {
    pub fn after_success(&self, current: f64) -> f64 {
        self.clamp(current - self.decay_step_secs)
    }

    pub fn after_throttle(&self, current: f64) -> f64 {
        self.clamp(current + self.throttle_step_secs)
    }

    /// Keeps a delay inside `[0, ceiling]`, mapping NaN to zero.
    pub fn clamp(&self, value: f64) -> f64 {
        if value.is_nan() {
            return 0.0;
        }
        let ceiling = if self.ceiling_secs.is_nan() {
            MAX_DELAY_SECS
        } else {
            self.ceiling_secs.clamp(0.0, MAX_DELAY_SECS)
        };
        value.clamp(0.0, ceiling)
    }
}

/// Current delay per endpoint class.
///
/// Reads and writes are individually atomic but a dispatch does not hold the
/// entry across its whole call, so concurrent updates to the same class are
/// last-write-wins.
#[derive(Debug, Default)]
pub struct DelayTable {
    delays: DashMap<EndpointClass, f64>,
}

impl DelayTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current delay in seconds, creating the entry at zero on first use.
    pub fn current(&self, endpoint: &EndpointClass) -> f64 {
        *self.delays.entry(endpoint.clone()).or_insert(0.0)
    }

    pub fn store(&self, endpoint: &EndpointClass, secs: f64) {
        self.delays.insert(endpoint.clone(), secs);
    }

    pub fn len(&self) -> usize {
        self.delays.len()
    }

    pub fn is_empty(&self) -> bool {
        self.delays.is_empty()
    }
}

pub(crate) fn secs_to_duration(secs: f64) -> Duration {
    Duration::try_from_secs_f64(secs).unwrap_or_default()
}
