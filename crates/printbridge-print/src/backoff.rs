// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Linear reconnect backoff.
//
// After the n-th consecutive failure the next attempt waits
// `min(n * base, max)`.  A success resets the counter.

use std::time::Duration;

use printbridge_core::config::AppConfig;
use tracing::debug;

/// Backoff parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffConfig {
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(5),
            max_delay: Duration::from_secs(60),
        }
    }
}

impl From<&AppConfig> for BackoffConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            base_delay: config.reconnect_base_delay(),
            max_delay: config.reconnect_max_delay(),
        }
    }
}

/// Delay before the next attempt after `failures` consecutive failures.
pub fn compute_delay(failures: u32, config: &BackoffConfig) -> Duration {
    config
        .base_delay
        .saturating_mul(failures)
        .min(config.max_delay)
}

/// Consecutive-failure counter.
#[derive(Debug, Clone, Default)]
pub struct Backoff {
    config: BackoffConfig,
    failures: u32,
}

impl Backoff {
    pub fn new(config: BackoffConfig) -> Self {
        Self {
            config,
            failures: 0,
        }
    }

    /// Count a failure and return how long to wait before retrying.
    pub fn record_failure(&mut self) -> Duration {
        self.failures = self.failures.saturating_add(1);
        let delay = compute_delay(self.failures, &self.config);
        debug!(failures = self.failures, delay_ms = delay.as_millis() as u64, "backoff");
        delay
    }

    pub fn reset(&mut self) {
        self.failures = 0;
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }
}
