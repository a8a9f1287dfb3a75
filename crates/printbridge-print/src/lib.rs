// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Printbridge Print: persistent printers and jobs, the label and receipt
// adapters, the printer status monitor and the remote job queue client.
// This crate ties the domain types of `printbridge-core` to the encoders in
// `printbridge-encode` and the OS ports of `printbridge-platform`.

pub mod adapters;
pub mod backoff;
pub mod events;
pub mod jobs;
pub mod monitor;
pub mod printers;
pub mod remote;
pub mod scheduler;
pub mod settings;
pub mod store;
pub mod sync;

#[cfg(test)]
mod testing;

pub use adapters::Adapters;
pub use backoff::{Backoff, BackoffConfig};
pub use events::{BridgeEvent, EventBus};
pub use jobs::{JobService, RECENT_JOBS_LIMIT};
pub use monitor::StatusMonitor;
pub use printers::PrinterService;
pub use remote::{HttpConnector, HttpRemoteApi, RemoteApi, RemoteConnector, RemoteJob};
pub use scheduler::Scheduler;
pub use settings::SettingsService;
pub use store::{SqliteStore, Store};
pub use sync::{SyncClient, SyncConfig};
