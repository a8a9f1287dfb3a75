// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Application configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::settings::DEFAULT_DPI;

/// Persistent daemon settings, stored as `config.json` in the data directory.
///
/// Timing values are kept as plain integers so the file stays hand-editable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// How often the status monitor queries every printer.
    pub status_interval_ms: u64,
    /// How often the sync client polls for jobs (doubles as heartbeat).
    pub poll_interval_ms: u64,
    /// Reconnect delay per consecutive failure.
    pub reconnect_base_delay_ms: u64,
    /// Upper bound on the reconnect delay.
    pub reconnect_max_delay_ms: u64,
    /// Timeout applied to every remote HTTP request.
    pub http_timeout_ms: u64,
    /// Sleep between checks while `stop()` waits for an in-flight batch.
    pub drain_poll_interval_ms: u64,
    /// DPI used when a printer's settings do not carry one.
    pub default_dpi: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            status_interval_ms: 2_000,
            poll_interval_ms: 3_000,
            reconnect_base_delay_ms: 5_000,
            reconnect_max_delay_ms: 60_000,
            http_timeout_ms: 15_000,
            drain_poll_interval_ms: 50,
            default_dpi: DEFAULT_DPI,
        }
    }
}

impl AppConfig {
    pub fn status_interval(&self) -> Duration {
        Duration::from_millis(self.status_interval_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn reconnect_base_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_base_delay_ms)
    }

    pub fn reconnect_max_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_max_delay_ms)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_millis(self.http_timeout_ms)
    }

    pub fn drain_poll_interval(&self) -> Duration {
        Duration::from_millis(self.drain_poll_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let config: AppConfig = serde_json::from_str(r#"{ "poll_interval_ms": 5000 }"#).unwrap();
        assert_eq!(config.poll_interval(), Duration::from_secs(5));
        assert_eq!(config.status_interval(), Duration::from_secs(2));
        assert_eq!(config.reconnect_max_delay(), Duration::from_secs(60));
    }
}
