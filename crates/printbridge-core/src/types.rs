// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Printbridge print bridge.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::BridgeError;

/// Store-assigned identifier of a printer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrinterId(pub i64);

impl fmt::Display for PrinterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Store-assigned identifier of a local print job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub i64);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Capability class of a printer. A job's type must match its printer's.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrinterType {
    Receipt,
    A4,
    Label,
}

impl PrinterType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Receipt => "receipt",
            Self::A4 => "a4",
            Self::Label => "label",
        }
    }
}

impl fmt::Display for PrinterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PrinterType {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "receipt" => Ok(Self::Receipt),
            "a4" => Ok(Self::A4),
            "label" => Ok(Self::Label),
            other => Err(BridgeError::Validation(format!("unknown printer type: {other}"))),
        }
    }
}

/// A physical printer known to this bridge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Printer {
    pub id: PrinterId,
    /// OS-level device name, unique across printers.
    pub name: String,
    pub description: Option<String>,
    /// Last status observed by the status monitor.
    pub online: bool,
    pub printer_type: PrinterType,
}

/// Partial update of a printer's user-editable fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PrinterUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
}

/// A printer together with its validated settings document.
#[derive(Debug, Clone, PartialEq)]
pub struct PrinterWithSettings {
    pub printer: Printer,
    pub settings: crate::settings::PrinterSettings,
}

/// Lifecycle states of a print job. `Pending` is the only non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Persisted, not yet finished.
    Pending,
    /// Bytes accepted by the printer transport.
    Completed,
    /// Printing failed; see the job's `error` field.
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl FromStr for JobStatus {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(BridgeError::Validation(format!("unknown job status: {other}"))),
        }
    }
}

/// A persisted print job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrintJob {
    pub id: JobId,
    pub printer_id: PrinterId,
    pub name: String,
    pub job_type: PrinterType,
    pub status: JobStatus,
    /// Opaque payload, validated by the adapter that prints it.
    pub data: serde_json::Value,
    pub created_at: DateTime<Utc>,
    /// Set only when the job completed successfully.
    pub completed_at: Option<DateTime<Utc>>,
    /// Set only when the job failed.
    pub error: Option<String>,
}

/// Fields supplied by the caller when a job is created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPrintJob {
    pub printer_id: PrinterId,
    pub name: String,
    pub job_type: PrinterType,
    pub data: serde_json::Value,
}

/// Filters for listing jobs. All fields are optional and combine with AND.
#[derive(Debug, Clone, Default)]
pub struct JobFilter {
    pub status: Option<JobStatus>,
    pub job_type: Option<PrinterType>,
    pub printer_id: Option<PrinterId>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

/// Partial update of a job's non-lifecycle fields.
#[derive(Debug, Clone, Default)]
pub struct JobUpdate {
    pub name: Option<String>,
    pub data: Option<serde_json::Value>,
    /// Terminal status to apply; only honoured while the job is pending.
    pub status: Option<JobStatus>,
    pub error: Option<String>,
}

/// Dashboard counters over all printers and jobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStats {
    pub total_printers: u64,
    pub total_jobs: u64,
    pub completed_jobs: u64,
    pub failed_jobs: u64,
    pub pending_jobs: u64,
    /// Completed jobs as a percentage of all jobs; 0 when there are none.
    pub success_rate: f64,
}

impl JobStats {
    pub fn success_rate_of(completed: u64, total: u64) -> f64 {
        if total == 0 {
            0.0
        } else {
            completed as f64 / total as f64 * 100.0
        }
    }
}

/// A job joined with the printer it ran on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecentJob {
    #[serde(flatten)]
    pub job: PrintJob,
    pub printer: Printer,
}

/// Result of executing one job through the orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrintOutcome {
    pub job_id: JobId,
    pub success: bool,
    pub error: Option<String>,
}

/// Which configured printer a remote job is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrinterRole {
    Label,
    Receipt,
    Regular,
}

impl PrinterRole {
    /// The printer type a job for this role must carry.
    pub fn printer_type(&self) -> PrinterType {
        match self {
            Self::Label => PrinterType::Label,
            Self::Receipt => PrinterType::Receipt,
            Self::Regular => PrinterType::A4,
        }
    }
}

impl fmt::Display for PrinterRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Label => "label",
            Self::Receipt => "receipt",
            Self::Regular => "regular",
        })
    }
}

/// Singleton bridge settings: remote credentials and role-to-printer mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalSettings {
    pub server_url: String,
    pub api_key: String,
    pub client_id: String,
    pub label_printer_id: Option<PrinterId>,
    pub receipt_printer_id: Option<PrinterId>,
    pub regular_printer_id: Option<PrinterId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl GlobalSettings {
    /// Whether enough is configured to talk to the remote queue.
    pub fn is_complete(&self) -> bool {
        !self.server_url.trim().is_empty()
            && !self.api_key.trim().is_empty()
            && !self.client_id.trim().is_empty()
    }

    pub fn printer_for(&self, role: PrinterRole) -> Option<PrinterId> {
        match role {
            PrinterRole::Label => self.label_printer_id,
            PrinterRole::Receipt => self.receipt_printer_id,
            PrinterRole::Regular => self.regular_printer_id,
        }
    }
}

/// Partial update of the global settings. `Some(None)` clears a role.
#[derive(Debug, Clone, Default)]
pub struct GlobalSettingsUpdate {
    pub server_url: Option<String>,
    pub api_key: Option<String>,
    pub client_id: Option<String>,
    pub label_printer_id: Option<Option<PrinterId>>,
    pub receipt_printer_id: Option<Option<PrinterId>>,
    pub regular_printer_id: Option<Option<PrinterId>>,
}

/// OS-level status of a printer as reported by a status probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrinterStatus {
    pub online: bool,
    pub error: Option<String>,
}

impl PrinterStatus {
    pub fn online() -> Self {
        Self { online: true, error: None }
    }

    pub fn offline(reason: impl Into<String>) -> Self {
        Self {
            online: false,
            error: Some(reason.into()),
        }
    }
}

/// What the raw print transport reports for an accepted document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawPrintResult {
    pub job_id: u32,
    pub bytes_written: usize,
    pub success: bool,
}

/// Classification of errors for reconnect and reporting decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorClass {
    /// Network blip, timeout, busy database; safe to try again later.
    Transient,
    /// Bad payload, wrong printer, unsupported operation; never retried.
    Permanent,
    /// Missing or incomplete credentials; wait for the user.
    Configuration,
}

/// Connectivity of the sync client with the remote job queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    Disconnected,
    Registering,
    Connected,
}
