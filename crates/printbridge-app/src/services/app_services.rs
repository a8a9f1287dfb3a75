// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Central service layer: opens the store, builds every backend service on
// the shared event bus and drives their start/stop order.
//
// All services hold their state behind `Arc`, so `AppServices` is cheap to
// clone into tasks.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use printbridge_core::config::AppConfig;
use printbridge_core::error::Result;
use printbridge_platform::platform_ports;
use printbridge_print::events::RecvError;
use printbridge_print::{
    Adapters, BridgeEvent, EventBus, HttpConnector, JobService, PrinterService, SettingsService,
    SqliteStore, StatusMonitor, Store, SyncClient, SyncConfig,
};
use tracing::{debug, info, warn};

const CONFIG_FILE: &str = "config.json";
const DATABASE_FILE: &str = "printbridge.db";

#[derive(Clone)]
pub struct AppServices {
    config: AppConfig,
    data_dir: PathBuf,
    events: EventBus,
    settings: Arc<SettingsService>,
    jobs: Arc<JobService>,
    printers: Arc<PrinterService>,
    monitor: Arc<StatusMonitor>,
    sync: SyncClient,
    renderer_available: bool,
}

impl AppServices {
    /// Initialise all services.  Call once at startup.
    ///
    /// Loads (or creates) `config.json`, opens the SQLite store and makes
    /// sure global settings exist.  Nothing runs until [`Self::start`].
    pub fn init(data_dir: &Path) -> Result<Self> {
        info!(path = %data_dir.display(), "initialising app services");
        let config = load_or_create_config(data_dir)?;
        let store: Arc<dyn Store> = Arc::new(SqliteStore::open(&data_dir.join(DATABASE_FILE))?);
        let services = Self::build(config, data_dir.to_path_buf(), store);
        services.settings.initialize()?;
        info!("app services initialised");
        Ok(services)
    }

    fn build(config: AppConfig, data_dir: PathBuf, store: Arc<dyn Store>) -> Self {
        let events = EventBus::default();
        let ports = platform_ports(config.http_timeout());
        let renderer_available = ports.renderer.available();

        let settings = Arc::new(SettingsService::new(store.clone(), events.clone()));
        let jobs = Arc::new(JobService::new(
            store.clone(),
            Adapters::new(&ports),
            events.clone(),
        ));
        let printers = Arc::new(
            PrinterService::new(store.clone(), jobs.clone()).with_default_dpi(config.default_dpi),
        );
        let monitor = Arc::new(StatusMonitor::new(
            store,
            ports.probe.clone(),
            events.clone(),
            config.status_interval(),
        ));
        let sync = SyncClient::new(
            settings.clone(),
            jobs.clone(),
            Arc::new(HttpConnector::new(config.http_timeout())),
            events.clone(),
            SyncConfig::from(&config),
        );

        Self {
            config,
            data_dir,
            events,
            settings,
            jobs,
            printers,
            monitor,
            sync,
            renderer_available,
        }
    }

    /// Start the job service, the status monitor and the sync client.
    pub async fn start(&self) {
        if !self.renderer_available {
            warn!("No template renderer installed: receipt jobs will fail, label jobs are unaffected");
        }
        self.spawn_event_log();
        self.jobs.start();
        self.monitor.start();
        self.sync.start().await;
        info!("Printbridge running");
    }

    /// Stop in dependency order: timers and the remote batch first, then
    /// the services that execute jobs.
    pub async fn shutdown(&self) {
        info!("Printbridge shutting down");
        self.sync.stop().await;
        self.monitor.stop();
        self.jobs.stop();
        info!("Printbridge stopped");
    }

    /// Mirror bus events into the log.
    fn spawn_event_log(&self) {
        let mut rx = self.events.subscribe();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(BridgeEvent::JobCompleted {
                        job_id,
                        printer_name,
                        success,
                        error,
                    }) => {
                        info!(%job_id, printer = %printer_name, success, error = ?error, "job finished");
                    }
                    Ok(BridgeEvent::ConnectionLost { error }) => {
                        warn!(error = %error, "remote queue unreachable");
                    }
                    Ok(event) => debug!(?event, "bridge event"),
                    Err(RecvError::Lagged(missed)) => warn!(missed, "event log lagged"),
                    Err(RecvError::Closed) => break,
                }
            }
        });
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn settings(&self) -> &SettingsService {
        &self.settings
    }

    pub fn jobs(&self) -> &JobService {
        &self.jobs
    }

    pub fn printers(&self) -> &PrinterService {
        &self.printers
    }
}

// -- Config file persistence -------------------------------------------------

/// Read `config.json`, writing the defaults first if it does not exist.
/// A file that exists but does not parse is an error, not a silent reset.
fn load_or_create_config(data_dir: &Path) -> Result<AppConfig> {
    let path = data_dir.join(CONFIG_FILE);
    if !path.exists() {
        let config = AppConfig::default();
        persist_config(data_dir, &config)?;
        info!(path = %path.display(), "wrote default configuration");
        return Ok(config);
    }
    let data = std::fs::read_to_string(&path)?;
    Ok(serde_json::from_str(&data)?)
}

fn persist_config(data_dir: &Path, config: &AppConfig) -> Result<()> {
    let path = data_dir.join(CONFIG_FILE);
    let json = serde_json::to_string_pretty(config)?;
    std::fs::write(&path, json)?;
    Ok(())
}
