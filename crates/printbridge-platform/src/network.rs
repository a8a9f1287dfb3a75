// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Raw TCP printing (JetDirect style, usually port 9100).
//
// Printers whose name has the form `host:port` are reached directly: open a
// socket, write the bytes, close.  The printer must understand the command
// language natively, which thermal printers do.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tracing::{debug, info, instrument};

use printbridge_core::error::{BridgeError, Result};
use printbridge_core::{PrinterStatus, RawPrintResult};

use crate::traits::{RawPrinter, StatusProbe, validate_request};

/// Default raw TCP port (HP JetDirect).
pub const RAW_PORT: u16 = 9100;

/// Write size per `write_all`, so progress shows up in debug logs.
const CHUNK_SIZE: usize = 8192;

/// Split a `host:port` printer name. Anything else is not a network printer.
pub fn parse_network_name(name: &str) -> Option<(&str, u16)> {
    let (host, port) = name.trim().rsplit_once(':')?;
    let host = host.trim_start_matches('[').trim_end_matches(']');
    if host.is_empty() || host.contains(char::is_whitespace) || host.contains('/') {
        return None;
    }
    let port = port.parse::<u16>().ok().filter(|p| *p != 0)?;
    Some((host, port))
}

/// Raw TCP transport and reachability probe.
#[derive(Debug)]
pub struct NetworkPrinter {
    timeout: Duration,
    next_job_id: AtomicU32,
}

impl NetworkPrinter {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            next_job_id: AtomicU32::new(1),
        }
    }

    async fn connect(&self, host: &str, port: u16) -> Result<TcpStream> {
        let addr = if host.contains(':') {
            format!("[{host}]:{port}")
        } else {
            format!("{host}:{port}")
        };
        tokio::time::timeout(self.timeout, TcpStream::connect(&addr))
            .await
            .map_err(|_| {
                BridgeError::Transport(format!(
                    "connection to {addr} timed out after {}s",
                    self.timeout.as_secs()
                ))
            })?
            .map_err(|e| BridgeError::Transport(format!("connect to {addr}: {e}")))
    }
}

impl Default for NetworkPrinter {
    fn default() -> Self {
        Self::new(Duration::from_secs(15))
    }
}

#[async_trait]
impl RawPrinter for NetworkPrinter {
    #[instrument(skip(self, bytes), fields(bytes_len = bytes.len()))]
    async fn send(&self, printer_name: &str, bytes: &[u8], job_name: &str) -> Result<RawPrintResult> {
        validate_request(printer_name, bytes)?;
        let (host, port) = parse_network_name(printer_name).ok_or_else(|| {
            BridgeError::Validation(format!("{printer_name} is not a host:port address"))
        })?;

        let mut stream = self.connect(host, port).await?;

        let mut sent = 0usize;
        for chunk in bytes.chunks(CHUNK_SIZE) {
            tokio::time::timeout(self.timeout, stream.write_all(chunk))
                .await
                .map_err(|_| BridgeError::Transport(format!("send timed out at byte {sent}")))?
                .map_err(|e| BridgeError::Transport(format!("send failed at byte {sent}: {e}")))?;
            sent += chunk.len();
            debug!(sent, total = bytes.len(), "raw TCP progress");
        }

        stream
            .flush()
            .await
            .map_err(|e| BridgeError::Transport(format!("flush: {e}")))?;
        stream
            .shutdown()
            .await
            .map_err(|e| BridgeError::Transport(format!("shutdown: {e}")))?;

        let job_id = self.next_job_id.fetch_add(1, Ordering::Relaxed);
        info!(printer = printer_name, job_id, bytes = sent, "Raw job sent");
        Ok(RawPrintResult {
            job_id,
            bytes_written: sent,
            success: true,
        })
    }
}

#[async_trait]
impl StatusProbe for NetworkPrinter {
    async fn query(&self, printer_name: &str) -> Result<PrinterStatus> {
        let (host, port) = parse_network_name(printer_name).ok_or_else(|| {
            BridgeError::Validation(format!("{printer_name} is not a host:port address"))
        })?;
        match self.connect(host, port).await {
            Ok(_) => Ok(PrinterStatus::online()),
            Err(e) => Ok(PrinterStatus::offline(e.to_string())),
        }
    }
}
