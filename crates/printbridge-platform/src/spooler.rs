// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Local print spooler (CUPS command-line tools).
//
// Raw jobs go through `lp -o raw` so the queue's driver never touches the
// bytes; status comes from `lpstat -p`.

use std::io::ErrorKind;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{info, instrument, warn};

use printbridge_core::error::{BridgeError, Result};
use printbridge_core::{PrinterStatus, RawPrintResult};

use crate::traits::{RawPrinter, StatusProbe, validate_request};

/// Raw transport and status probe backed by `lp` / `lpstat`.
#[derive(Debug, Clone)]
pub struct SpoolerPrinter {
    lp: String,
    lpstat: String,
    timeout: Duration,
}

impl SpoolerPrinter {
    pub fn new(timeout: Duration) -> Self {
        Self {
            lp: "lp".into(),
            lpstat: "lpstat".into(),
            timeout,
        }
    }

    /// Use different binaries, e.g. absolute paths on systems with a
    /// restricted `PATH`.
    pub fn with_commands(mut self, lp: impl Into<String>, lpstat: impl Into<String>) -> Self {
        self.lp = lp.into();
        self.lpstat = lpstat.into();
        self
    }
}

fn spawn_error(program: &str, err: std::io::Error) -> BridgeError {
    if err.kind() == ErrorKind::NotFound {
        BridgeError::PlatformUnavailable(format!("`{program}`"))
    } else {
        BridgeError::Io(err)
    }
}

/// Extract the numeric part of `request id is Queue-42 (1 file(s))`.
pub fn parse_request_id(stdout: &str) -> Option<u32> {
    let rest = stdout.split("request id is").nth(1)?;
    let id = rest.split_whitespace().next()?;
    id.rsplit('-').next()?.parse().ok()
}

/// Interpret `lpstat -p NAME` output for one queue.
pub fn parse_lpstat(stdout: &str) -> PrinterStatus {
    let text = stdout.to_ascii_lowercase();
    if text.contains("disabled") {
        PrinterStatus::offline(stdout.trim().to_string())
    } else if text.contains("idle") || text.contains("printing") || text.contains("enabled") {
        PrinterStatus::online()
    } else {
        PrinterStatus::offline(format!("unrecognised status: {}", stdout.trim()))
    }
}

#[async_trait]
impl RawPrinter for SpoolerPrinter {
    #[instrument(skip(self, bytes), fields(bytes_len = bytes.len()))]
    async fn send(&self, printer_name: &str, bytes: &[u8], job_name: &str) -> Result<RawPrintResult> {
        validate_request(printer_name, bytes)?;

        let mut child = Command::new(&self.lp)
            .args(["-d", printer_name, "-o", "raw", "-t", job_name])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| spawn_error(&self.lp, e))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(bytes).await?;
            stdin.shutdown().await?;
        }

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| BridgeError::Transport(format!("{} timed out", self.lp)))??;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(BridgeError::Transport(format!(
                "{} exited with {}: {}",
                self.lp,
                output.status,
                stderr.trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let job_id = parse_request_id(&stdout).unwrap_or_else(|| {
            warn!(output = %stdout.trim(), "Spooler accepted job without a request id");
            0
        });
        info!(printer = printer_name, job_id, bytes = bytes.len(), "Job spooled");
        Ok(RawPrintResult {
            job_id,
            bytes_written: bytes.len(),
            success: true,
        })
    }
}

#[async_trait]
impl StatusProbe for SpoolerPrinter {
    async fn query(&self, printer_name: &str) -> Result<PrinterStatus> {
        let output = tokio::time::timeout(
            self.timeout,
            Command::new(&self.lpstat)
                .args(["-p", printer_name])
                .kill_on_drop(true)
                .output(),
        )
        .await
        .map_err(|_| BridgeError::Transport(format!("{} timed out", self.lpstat)))?
        .map_err(|e| spawn_error(&self.lpstat, e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Ok(PrinterStatus::offline(stderr.trim().to_string()));
        }
        Ok(parse_lpstat(&String::from_utf8_lossy(&output.stdout)))
    }
}
