// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Printer status monitor.
//
// Periodically asks the status probe about every known printer and records
// online/offline transitions.  A scan never aborts the loop: failures are
// logged and published as `MonitoringError`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::{debug, info, instrument, warn};

use printbridge_core::error::Result;
use printbridge_core::types::Printer;
use printbridge_platform::StatusProbe;

use crate::events::{BridgeEvent, EventBus};
use crate::scheduler::{BusyGuard, Scheduler, TaskHandle};
use crate::store::Store;

struct MonitorInner {
    store: Arc<dyn Store>,
    probe: Arc<dyn StatusProbe>,
    events: EventBus,
    running: AtomicBool,
    scanning: AtomicBool,
}

/// Keeps each printer's `online` flag in step with what the OS reports.
pub struct StatusMonitor {
    inner: Arc<MonitorInner>,
    interval: Duration,
    scheduler: Scheduler,
    task: Mutex<Option<TaskHandle>>,
}

impl StatusMonitor {
    pub fn new(
        store: Arc<dyn Store>,
        probe: Arc<dyn StatusProbe>,
        events: EventBus,
        interval: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(MonitorInner {
                store,
                probe,
                events,
                running: AtomicBool::new(false),
                scanning: AtomicBool::new(false),
            }),
            interval,
            scheduler: Scheduler::new(),
            task: Mutex::new(None),
        }
    }

    /// Start scanning: once immediately, then every interval. Idempotent.
    pub fn start(&self) {
        if self.inner.running.swap(true, Ordering::AcqRel) {
            debug!("status monitor already running");
            return;
        }
        let inner = Arc::clone(&self.inner);
        let handle = self.scheduler.every(self.interval, move || {
            let inner = Arc::clone(&inner);
            async move {
                inner.tick().await;
            }
        });
        if let Ok(mut task) = self.task.lock() {
            *task = Some(handle);
        }
        info!(interval_ms = self.interval.as_millis() as u64, "Status monitor started");
    }

    /// Stop scanning. A query already in flight may still complete.
    pub fn stop(&self) {
        if !self.inner.running.swap(false, Ordering::AcqRel) {
            return;
        }
        if let Ok(mut task) = self.task.lock() {
            if let Some(handle) = task.take() {
                handle.cancel();
            }
        }
        self.scheduler.cancel_all();
        info!("Status monitor stopped");
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::Acquire)
    }

    /// Run one scan now. Returns `false` if the monitor is stopped or a scan
    /// is already in progress.
    pub async fn scan_now(&self) -> bool {
        self.inner.tick().await
    }
}

impl MonitorInner {
    async fn tick(&self) -> bool {
        if !self.running.load(Ordering::Acquire) {
            return false;
        }
        let Some(_busy) = BusyGuard::try_acquire(&self.scanning) else {
            debug!("previous status scan still running, skipping tick");
            return false;
        };
        if let Err(err) = self.scan().await {
            warn!(error = %err, "Printer status scan failed");
            self.events.emit(BridgeEvent::MonitoringError {
                error: err.to_string(),
            });
        }
        true
    }

    #[instrument(skip(self))]
    async fn scan(&self) -> Result<()> {
        let printers = self.store.list_printers()?;
        for printer in printers {
            if !self.running.load(Ordering::Acquire) {
                debug!("monitor stopped mid-scan");
                break;
            }
            match self.probe.query(&printer.name).await {
                Ok(status) if status.online != printer.online => {
                    self.record_change(printer, status.online)?;
                }
                Ok(_) => {}
                Err(err) => {
                    warn!(printer = %printer.name, error = %err, "Status query failed");
                    self.events.emit(BridgeEvent::MonitoringError {
                        error: format!("{}: {err}", printer.name),
                    });
                }
            }
        }
        Ok(())
    }

    fn record_change(&self, printer: Printer, online: bool) -> Result<()> {
        self.store.set_printer_online(printer.id, online)?;
        let previous = printer.online;
        info!(
            printer = %printer.name,
            online,
            previous,
            "Printer status changed"
        );
        self.events.emit(BridgeEvent::PrinterStatusChanged {
            printer: Printer { online, ..printer },
            online,
            previous,
        });
        Ok(())
    }
}
