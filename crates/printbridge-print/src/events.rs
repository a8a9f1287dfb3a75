// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// In-process event bus.
//
// Services publish typed `BridgeEvent`s on a `tokio::sync::broadcast`
// channel; any number of subscribers (the sync client, the daemon's log
// forwarder, tests) receive every event published after they subscribed.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use printbridge_core::types::{JobId, Printer};

pub use tokio::sync::broadcast::Receiver;
pub use tokio::sync::broadcast::error::RecvError;

/// Channel capacity. Slow subscribers see `RecvError::Lagged`.
pub const DEFAULT_EVENT_CAPACITY: usize = 128;

/// Everything the bridge announces to the rest of the process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BridgeEvent {
    /// The status monitor saw a printer go online or offline.
    PrinterStatusChanged {
        printer: Printer,
        online: bool,
        previous: bool,
    },
    /// One status scan failed. The monitor keeps running.
    MonitoringError { error: String },
    /// A job reached a terminal state.
    JobCompleted {
        job_id: JobId,
        printer_name: String,
        success: bool,
        error: Option<String>,
    },
    /// Registration with the remote queue succeeded.
    ConnectionEstablished { client_id: String },
    /// An exchange with the remote queue failed.
    ConnectionLost { error: String },
    /// Global settings were written.
    SettingsUpdated,
}

/// Cloneable handle on the broadcast channel.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<BridgeEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish an event. Returns the number of subscribers that will see it;
    /// having none is not an error.
    pub fn emit(&self, event: BridgeEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }

    pub fn subscribe(&self) -> Receiver<BridgeEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}
