// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Logging setup: human-readable output on stderr plus a daily rotating log
// file under `<data dir>/logs`.

use std::path::Path;

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{EnvFilter, Layer, fmt, prelude::*};

use printbridge_core::error::{BridgeError, Result};

pub const LOG_DIR: &str = "logs";
const LOG_PREFIX: &str = "printbridge";
const DEFAULT_LEVEL: &str = "info";
/// Daily files kept before the oldest is removed.
const MAX_LOG_FILES: usize = 14;

/// Install the global subscriber. `RUST_LOG` overrides the default level.
///
/// The returned guard flushes the file writer on drop; keep it alive for the
/// life of the process.
pub fn init(data_dir: &Path) -> Result<WorkerGuard> {
    let (writer, guard) = file_writer(&data_dir.join(LOG_DIR))?;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LEVEL));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(file_layer(writer))
        .try_init()
        .map_err(|e| BridgeError::Configuration(format!("logging: {e}")))?;
    Ok(guard)
}

/// Non-blocking writer over `printbridge.<date>.log` files in `log_dir`.
fn file_writer(log_dir: &Path) -> Result<(NonBlocking, WorkerGuard)> {
    std::fs::create_dir_all(log_dir)?;
    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_PREFIX)
        .filename_suffix("log")
        .max_log_files(MAX_LOG_FILES)
        .build(log_dir)
        .map_err(|e| {
            BridgeError::Configuration(format!("log file in {}: {e}", log_dir.display()))
        })?;
    Ok(tracing_appender::non_blocking(appender))
}

fn file_layer<S>(writer: NonBlocking) -> impl Layer<S>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
{
    fmt::layer()
        .with_ansi(false)
        .with_target(true)
        .with_writer(writer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_land_in_the_daily_file() {
        let dir = tempfile::tempdir().unwrap();
        let log_dir = dir.path().join(LOG_DIR);
        let (writer, guard) = file_writer(&log_dir).unwrap();

        let subscriber = tracing_subscriber::registry().with(file_layer(writer));
        tracing::subscriber::with_default(subscriber, || {
            tracing::info!(job_id = 7, "job finished");
        });
        drop(guard);

        let files: Vec<_> = std::fs::read_dir(&log_dir)
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .collect();
        assert_eq!(files.len(), 1);
        let name = files[0].file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("printbridge.") && name.ends_with(".log"), "{name}");

        let text = std::fs::read_to_string(&files[0]).unwrap();
        assert!(text.contains("job finished"));
        assert!(text.contains("job_id=7"));
        assert!(!text.contains('\u{1b}'));
    }
}
