// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Remote sync client.
//
// Registers this bridge with the remote job queue, polls it for jobs (the
// poll doubles as heartbeat), prints each job through the `JobService` and
// reports the result upstream.  Any failed exchange drops the connection and
// schedules a reconnect with linear backoff.  A `SettingsUpdated` event
// restarts the whole cycle with the new credentials.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use printbridge_core::config::AppConfig;
use printbridge_core::error::BridgeError;
use printbridge_core::types::{ConnectionState, GlobalSettings, NewPrintJob};

use crate::backoff::{Backoff, BackoffConfig};
use crate::events::{BridgeEvent, EventBus, RecvError};
use crate::jobs::JobService;
use crate::remote::{RemoteApi, RemoteConnector, RemoteJob};
use crate::scheduler::{BusyGuard, Scheduler, TaskHandle};
use crate::settings::SettingsService;

type BoxFuture = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Timing of the sync client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncConfig {
    pub poll_interval: Duration,
    pub backoff: BackoffConfig,
    /// Sleep between checks while `stop` waits for an in-flight batch.
    pub drain_interval: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for SyncConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            poll_interval: config.poll_interval(),
            backoff: BackoffConfig::from(config),
            drain_interval: config.drain_poll_interval(),
        }
    }
}

/// Credentials and API client of the current connection attempt.
#[derive(Clone)]
struct Session {
    settings: GlobalSettings,
    api: Arc<dyn RemoteApi>,
}

struct SyncState {
    connection: ConnectionState,
    backoff: Backoff,
    session: Option<Session>,
    poll_task: Option<TaskHandle>,
}

struct SyncInner {
    settings: Arc<SettingsService>,
    jobs: Arc<JobService>,
    connector: Arc<dyn RemoteConnector>,
    events: EventBus,
    config: SyncConfig,
    scheduler: Scheduler,
    state: Mutex<SyncState>,
    running: AtomicBool,
    polling: AtomicBool,
    listener: Mutex<Option<CancellationToken>>,
}

/// Handle on the sync client. Clones share the same client.
#[derive(Clone)]
pub struct SyncClient {
    inner: Arc<SyncInner>,
}

impl SyncClient {
    pub fn new(
        settings: Arc<SettingsService>,
        jobs: Arc<JobService>,
        connector: Arc<dyn RemoteConnector>,
        events: EventBus,
        config: SyncConfig,
    ) -> Self {
        Self {
            inner: Arc::new(SyncInner {
                settings,
                jobs,
                connector,
                events,
                config,
                scheduler: Scheduler::new(),
                state: Mutex::new(SyncState {
                    connection: ConnectionState::Disconnected,
                    backoff: Backoff::new(config.backoff),
                    session: None,
                    poll_task: None,
                }),
                running: AtomicBool::new(false),
                polling: AtomicBool::new(false),
                listener: Mutex::new(None),
            }),
        }
    }

    /// Start the client: follow settings changes and make the first
    /// connection attempt. Connectivity problems are handled internally.
    pub async fn start(&self) {
        if self.inner.running.swap(true, Ordering::AcqRel) {
            debug!("sync client already running");
            return;
        }
        self.inner.spawn_settings_listener();
        info!("Sync client started");
        self.inner.connect().await;
    }

    /// Cancel all timers, wait for an in-flight batch, then disconnect.
    pub async fn stop(&self) {
        if !self.inner.running.swap(false, Ordering::AcqRel) {
            return;
        }
        if let Some(token) = lock(&self.inner.listener).take() {
            token.cancel();
        }
        self.inner.halt().await;
        info!("Sync client stopped");
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::Acquire)
    }

    pub fn state(&self) -> ConnectionState {
        lock(&self.inner.state).connection
    }

    /// Consecutive failed exchanges since the last successful registration.
    pub fn failures(&self) -> u32 {
        lock(&self.inner.state).backoff.failures()
    }

    /// Run one poll now. Returns `false` if the client is not connected or a
    /// batch is already in progress.
    pub async fn poll_now(&self) -> bool {
        self.inner.poll_tick().await
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

impl SyncInner {
    fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    fn set_connection(&self, connection: ConnectionState) {
        let mut state = lock(&self.state);
        if state.connection != connection {
            debug!(from = ?state.connection, to = ?connection, "connection state");
            state.connection = connection;
        }
    }

    fn spawn_settings_listener(self: &Arc<Self>) {
        let token = CancellationToken::new();
        if let Some(previous) = lock(&self.listener).replace(token.clone()) {
            previous.cancel();
        }
        let mut rx = self.events.subscribe();
        let inner = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                let event = tokio::select! {
                    _ = token.cancelled() => break,
                    event = rx.recv() => event,
                };
                match event {
                    Ok(BridgeEvent::SettingsUpdated) => inner.restart().await,
                    Ok(_) => {}
                    Err(RecvError::Lagged(missed)) => {
                        warn!(missed, "sync client missed events, restarting");
                        inner.restart().await;
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            debug!("settings listener ended");
        });
    }

    /// Connection attempt as a boxed future, so reconnect timers can
    /// schedule it from inside the attempt itself.
    fn connect(self: &Arc<Self>) -> BoxFuture {
        let inner = Arc::clone(self);
        Box::pin(async move { inner.connect_once().await })
    }

    #[instrument(skip(self))]
    async fn connect_once(self: &Arc<Self>) {
        if !self.is_running() {
            return;
        }

        let settings = match self.settings.load() {
            Ok(settings) => settings,
            Err(BridgeError::NotFound(_)) => {
                error!("No settings stored, staying disconnected");
                self.set_connection(ConnectionState::Disconnected);
                return;
            }
            Err(err) => {
                self.connection_failed(err);
                return;
            }
        };
        if !settings.is_complete() {
            let err = BridgeError::Configuration(
                "server URL, API key and client id are required".into(),
            );
            error!(error = %err, "Remote queue not configured, staying disconnected");
            self.set_connection(ConnectionState::Disconnected);
            return;
        }
        let api = match self.connector.connect(&settings) {
            Ok(api) => api,
            Err(err) => {
                error!(error = %err, "Cannot build remote client, staying disconnected");
                self.set_connection(ConnectionState::Disconnected);
                return;
            }
        };

        self.set_connection(ConnectionState::Registering);
        if let Err(err) = api.register(&settings.client_id).await {
            self.connection_failed(err);
            return;
        }
        if !self.is_running() {
            return;
        }

        let client_id = settings.client_id.clone();
        {
            let mut state = lock(&self.state);
            state.connection = ConnectionState::Connected;
            state.backoff.reset();
            state.session = Some(Session { settings, api });
        }
        info!(client_id = %client_id, "Connected to remote queue");
        self.events
            .emit(BridgeEvent::ConnectionEstablished { client_id });

        let inner = Arc::clone(self);
        let poll = self.scheduler.every(self.config.poll_interval, move || {
            let inner = Arc::clone(&inner);
            async move {
                inner.poll_tick().await;
            }
        });
        if let Some(previous) = lock(&self.state).poll_task.replace(poll) {
            previous.cancel();
        }
    }

    /// Drop the connection and schedule the next attempt.
    fn connection_failed(self: &Arc<Self>, err: BridgeError) {
        let delay = {
            let mut state = lock(&self.state);
            state.connection = ConnectionState::Disconnected;
            state.session = None;
            if let Some(poll) = state.poll_task.take() {
                poll.cancel();
            }
            state.backoff.record_failure()
        };
        warn!(
            error = %err,
            class = ?err.class(),
            retry_in_ms = delay.as_millis() as u64,
            "Remote queue connection lost"
        );
        self.events.emit(BridgeEvent::ConnectionLost {
            error: err.to_string(),
        });

        if self.is_running() {
            let inner = Arc::clone(self);
            self.scheduler.after(delay, move || inner.connect());
        }
    }

    /// One poll: fetch the pending jobs and work through them in order.
    async fn poll_tick(self: &Arc<Self>) -> bool {
        if !self.is_running() {
            return false;
        }
        let Some(_busy) = BusyGuard::try_acquire(&self.polling) else {
            debug!("previous batch still running, skipping poll");
            return false;
        };
        let session = {
            let state = lock(&self.state);
            if state.connection != ConnectionState::Connected {
                return false;
            }
            state.session.clone()
        };
        let Some(session) = session else {
            return false;
        };

        let jobs = match session.api.fetch_jobs(&session.settings.client_id).await {
            Ok(jobs) => jobs,
            Err(err) => {
                self.connection_failed(err);
                return true;
            }
        };
        if !jobs.is_empty() {
            info!(count = jobs.len(), "Remote jobs received");
        }
        for job in jobs {
            self.run_remote_job(&session, job).await;
        }
        true
    }

    #[instrument(skip(self, session, job), fields(remote_id = %job.id, job_type = %job.job_type))]
    async fn run_remote_job(&self, session: &Session, job: RemoteJob) {
        let remote_id = job.id.clone();
        let report = match self.print_remote_job(&session.settings, job).await {
            Ok(()) => session.api.complete_job(&remote_id).await,
            Err(reason) => {
                warn!(reason = %reason, "Remote job failed");
                session.api.fail_job(&remote_id, &reason).await
            }
        };
        if let Err(err) = report {
            warn!(error = %err, "Could not report job result, not retrying");
        }
    }

    async fn print_remote_job(
        &self,
        settings: &GlobalSettings,
        job: RemoteJob,
    ) -> std::result::Result<(), String> {
        let role = job.role().map_err(|e| e.to_string())?;
        let printer_id = settings
            .printer_for(role)
            .ok_or_else(|| format!("no {role} printer configured"))?;

        let outcome = self
            .jobs
            .submit(NewPrintJob {
                printer_id,
                name: job.name,
                job_type: role.printer_type(),
                data: job.data,
            })
            .await
            .map_err(|e| e.to_string())?;

        if outcome.success {
            Ok(())
        } else {
            Err(outcome.error.unwrap_or_else(|| "print failed".into()))
        }
    }

    /// Cancel timers and wait until no batch is in flight.
    async fn halt(&self) {
        self.scheduler.cancel_all();
        {
            let mut state = lock(&self.state);
            if let Some(poll) = state.poll_task.take() {
                poll.cancel();
            }
        }
        while self.polling.load(Ordering::Acquire) {
            tokio::time::sleep(self.config.drain_interval).await;
        }
        let mut state = lock(&self.state);
        state.connection = ConnectionState::Disconnected;
        state.session = None;
    }

    /// Stop everything and reconnect with freshly loaded settings.
    async fn restart(self: &Arc<Self>) {
        if !self.is_running() {
            return;
        }
        info!("Settings changed, restarting sync client");
        self.halt().await;
        lock(&self.state).backoff.reset();
        self.connect().await;
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use serde_json::json;

    use printbridge_core::settings::{CommandLanguage, LabelSettings, PrinterSettings};
    use printbridge_core::types::{GlobalSettingsUpdate, JobFilter, JobStatus, PrinterType};

    use super::*;
    use crate::adapters::Adapters;
    use crate::store::{SqliteStore, Store};
    use crate::testing::{FakeConnector, RecordingPrinter, fake_ports};

    struct Fixture {
        store: Arc<SqliteStore>,
        transport: Arc<RecordingPrinter>,
        connector: Arc<FakeConnector>,
        settings: Arc<SettingsService>,
        jobs: Arc<JobService>,
        events: EventBus,
        client: SyncClient,
    }

    impl Fixture {
        fn remote(&self) -> &crate::testing::FakeRemote {
            &self.connector.remote
        }
    }

    fn fixture(api_key: &str) -> Fixture {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let label = store
            .create_printer(
                "Label-1",
                PrinterType::Label,
                None,
                &PrinterSettings::Label(LabelSettings {
                    encoder: CommandLanguage::Zpl,
                    ..LabelSettings::default()
                }),
            )
            .unwrap();
        let now = Utc::now();
        store
            .save_global_settings(&GlobalSettings {
                server_url: "https://queue-a.test".into(),
                api_key: api_key.into(),
                client_id: "bridge-0123456789ab".into(),
                label_printer_id: Some(label.id),
                receipt_printer_id: None,
                regular_printer_id: None,
                created_at: now,
                updated_at: now,
            })
            .unwrap();

        let events = EventBus::default();
        let transport = Arc::new(RecordingPrinter::default());
        let jobs = Arc::new(JobService::new(
            store.clone(),
            Adapters::new(&fake_ports(transport.clone())),
            events.clone(),
        ));
        jobs.start();
        let settings = Arc::new(SettingsService::new(store.clone(), events.clone()));
        let connector = Arc::new(FakeConnector::default());
        let client = SyncClient::new(
            settings.clone(),
            jobs.clone(),
            connector.clone(),
            events.clone(),
            SyncConfig {
                poll_interval: Duration::from_secs(3),
                backoff: BackoffConfig {
                    base_delay: Duration::from_secs(5),
                    max_delay: Duration::from_secs(60),
                },
                drain_interval: Duration::from_millis(50),
            },
        );
        Fixture {
            store,
            transport,
            connector,
            settings,
            jobs,
            events,
            client,
        }
    }

    fn label_job(id: &str) -> RemoteJob {
        RemoteJob {
            id: id.into(),
            name: format!("label {id}"),
            job_type: "label".into(),
            data: json!({
                "brand": "Acme",
                "productName": "Widget",
                "barcode": "123456",
                "price": 4.5,
                "expiry": "2026-12-31",
                "copies": 1
            }),
        }
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn registers_then_polls() {
        let fx = fixture("key");
        let mut rx = fx.events.subscribe();

        fx.client.start().await;
        assert_eq!(fx.client.state(), ConnectionState::Connected);
        assert_eq!(
            rx.try_recv().unwrap(),
            BridgeEvent::ConnectionEstablished {
                client_id: "bridge-0123456789ab".into()
            }
        );

        settle().await;
        tokio::time::sleep(Duration::from_secs(7)).await;
        assert_eq!(fx.remote().count("register:bridge-0123456789ab"), 1);
        assert_eq!(fx.remote().count("fetch:bridge-0123456789ab"), 3);
        fx.client.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn incomplete_settings_make_no_network_calls() {
        let fx = fixture("  ");
        fx.client.start().await;
        settle().await;

        assert_eq!(fx.client.state(), ConnectionState::Disconnected);
        assert!(fx.connector.connects().is_empty());
        assert!(fx.remote().calls().is_empty());
        fx.client.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn jobs_are_printed_and_reported() {
        let fx = fixture("key");
        let mut receipt = label_job("r-1");
        receipt.job_type = "receipt".into();
        fx.remote().push_batch(vec![label_job("l-1"), receipt]);

        fx.client.start().await;
        settle().await;

        let calls = fx.remote().calls();
        assert!(calls.contains(&"complete:l-1".to_string()));
        assert!(calls.contains(&"fail:r-1:no receipt printer configured".to_string()));
        assert_eq!(fx.transport.sent().len(), 1);

        let local = fx.jobs.list(&JobFilter::default()).unwrap();
        assert_eq!(local.len(), 1);
        assert_eq!(local[0].status, JobStatus::Completed);
        assert_eq!(local[0].name, "label l-1");
        fx.client.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn lost_reports_do_not_stop_the_batch() {
        let fx = fixture("key");
        fx.remote().set_fail_reports(true);
        fx.remote().push_batch(vec![label_job("1"), label_job("2")]);

        fx.client.start().await;
        settle().await;

        assert_eq!(fx.remote().count("complete:"), 2);
        assert_eq!(fx.transport.sent().len(), 2);
        assert_eq!(fx.client.state(), ConnectionState::Connected);
        fx.client.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn failed_registration_backs_off_linearly_and_recovers() {
        let fx = fixture("key");
        fx.remote().set_fail_register(true);
        let mut rx = fx.events.subscribe();

        fx.client.start().await;
        assert_eq!(fx.client.state(), ConnectionState::Disconnected);
        assert_eq!(fx.client.failures(), 1);
        assert!(matches!(rx.try_recv().unwrap(), BridgeEvent::ConnectionLost { .. }));

        tokio::time::sleep(Duration::from_millis(4_900)).await;
        assert_eq!(fx.remote().count("register:"), 1);
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(fx.remote().count("register:"), 2);
        assert_eq!(fx.client.failures(), 2);

        fx.remote().set_fail_register(false);
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(fx.client.state(), ConnectionState::Connected);
        assert_eq!(fx.client.failures(), 0);
        assert_eq!(fx.remote().count("register:"), 3);
        fx.client.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn failed_poll_disconnects_and_reconnects() {
        let fx = fixture("key");
        fx.client.start().await;
        settle().await;
        assert_eq!(fx.remote().count("fetch:"), 1);

        fx.remote().set_fail_fetch(true);
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(fx.client.state(), ConnectionState::Disconnected);
        assert_eq!(fx.client.failures(), 1);

        fx.remote().set_fail_fetch(false);
        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(fx.client.state(), ConnectionState::Connected);
        assert_eq!(fx.remote().count("register:"), 2);
        fx.client.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn overlapping_polls_are_skipped() {
        let fx = fixture("key");
        let gate = fx.remote().gate_fetches();

        fx.client.start().await;
        settle().await;
        assert_eq!(fx.remote().count("fetch:"), 1);

        assert!(!fx.client.poll_now().await);
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(fx.remote().count("fetch:"), 1);

        gate.add_permits(1_000);
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(fx.remote().count("fetch:") >= 2);
        fx.client.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn stop_waits_for_the_batch_in_flight() {
        let fx = fixture("key");
        let gate = fx.remote().gate_fetches();
        fx.client.start().await;
        settle().await;

        let client = fx.client.clone();
        let stopping = tokio::spawn(async move { client.stop().await });
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(!stopping.is_finished());

        gate.add_permits(1);
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(stopping.is_finished());
        assert_eq!(fx.client.state(), ConnectionState::Disconnected);

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(fx.remote().count("fetch:"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn settings_update_restarts_with_new_credentials() {
        let fx = fixture("key");
        fx.client.start().await;
        settle().await;

        fx.settings
            .update(GlobalSettingsUpdate {
                server_url: Some("https://queue-b.test".into()),
                ..Default::default()
            })
            .unwrap();
        settle().await;

        assert_eq!(
            fx.connector.connects(),
            vec!["https://queue-a.test".to_string(), "https://queue-b.test".to_string()]
        );
        assert_eq!(fx.remote().count("register:"), 2);
        assert_eq!(fx.client.state(), ConnectionState::Connected);

        let fetches = fx.remote().count("fetch:");
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(fx.remote().count("fetch:") > fetches);
        fx.client.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn missing_role_printer_is_reported_per_job() {
        let fx = fixture("key");
        fx.settings
            .update(GlobalSettingsUpdate {
                label_printer_id: Some(None),
                ..Default::default()
            })
            .unwrap();
        fx.remote().push_batch(vec![label_job("7")]);

        fx.client.start().await;
        settle().await;

        assert_eq!(fx.remote().count("fail:7:no label printer configured"), 1);
        assert!(fx.store.list_jobs(&JobFilter::default()).unwrap().is_empty());
        assert!(fx.transport.sent().is_empty());
        fx.client.stop().await;
    }
}
