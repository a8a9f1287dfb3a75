// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Print job orchestration.
//
// `JobService::execute` persists a job, runs it through the adapter for the
// printer's type and records exactly one terminal state.  Adapter and
// transport failures become failed job rows; only storage problems and
// lifecycle errors are returned to the caller.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{error, info, instrument, warn};

use printbridge_core::error::{BridgeError, Result, classify_error};
use printbridge_core::types::{
    JobFilter, JobId, JobStats, JobStatus, JobUpdate, NewPrintJob, PrintJob, PrintOutcome,
    PrinterId, PrinterWithSettings, RecentJob,
};

use crate::adapters::Adapters;
use crate::events::{BridgeEvent, EventBus};
use crate::store::Store;

pub struct JobService {
    store: Arc<dyn Store>,
    adapters: Adapters,
    events: EventBus,
    running: AtomicBool,
}

impl JobService {
    /// Create a stopped service.
    pub fn new(store: Arc<dyn Store>, adapters: Adapters, events: EventBus) -> Self {
        Self {
            store,
            adapters,
            events,
            running: AtomicBool::new(false),
        }
    }

    pub fn start(&self) {
        if !self.running.swap(true, Ordering::AcqRel) {
            info!("Print job service started");
        }
    }

    pub fn stop(&self) {
        if self.running.swap(false, Ordering::AcqRel) {
            info!("Print job service stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Look up the job's printer and execute the job on it.
    pub async fn submit(&self, job: NewPrintJob) -> Result<PrintOutcome> {
        if !self.is_running() {
            return Err(BridgeError::ServiceNotRunning);
        }
        let printer = self
            .store
            .get_printer_with_settings(job.printer_id)?
            .ok_or_else(|| BridgeError::NotFound(format!("printer {}", job.printer_id)))?;
        self.execute(&printer, job).await
    }

    /// Persist `job` as pending, print it on `printer` and record the result.
    #[instrument(skip(self, printer, job), fields(printer = %printer.printer.name, job_type = %job.job_type))]
    pub async fn execute(&self, printer: &PrinterWithSettings, job: NewPrintJob) -> Result<PrintOutcome> {
        if !self.is_running() {
            return Err(BridgeError::ServiceNotRunning);
        }
        if job.printer_id != printer.printer.id {
            return Err(BridgeError::Validation(format!(
                "job targets printer {} but was executed on printer {}",
                job.printer_id, printer.printer.id
            )));
        }

        let stored = self.store.insert_job(&job)?;

        let printed = if printer.printer.printer_type != stored.job_type {
            Err(BridgeError::TypeMismatch {
                printer: printer.printer.printer_type,
                job: stored.job_type,
            })
        } else {
            self.adapters
                .print(printer, &stored.name, &stored.data)
                .await
                .map(|_| ())
        };

        let outcome = match printed {
            Ok(()) => {
                self.store.finish_job(stored.id, JobStatus::Completed, None)?;
                info!(job_id = %stored.id, "Job completed");
                PrintOutcome {
                    job_id: stored.id,
                    success: true,
                    error: None,
                }
            }
            Err(err) => {
                let message = err.to_string();
                warn!(
                    job_id = %stored.id,
                    error = %message,
                    class = ?classify_error(&err),
                    "Job failed"
                );
                if let Err(db_err) =
                    self.store.finish_job(stored.id, JobStatus::Failed, Some(&message))
                {
                    error!(job_id = %stored.id, error = %db_err, "Could not record job failure");
                    return Err(db_err);
                }
                PrintOutcome {
                    job_id: stored.id,
                    success: false,
                    error: Some(message),
                }
            }
        };

        self.events.emit(BridgeEvent::JobCompleted {
            job_id: outcome.job_id,
            printer_name: printer.printer.name.clone(),
            success: outcome.success,
            error: outcome.error.clone(),
        });
        Ok(outcome)
    }

    pub fn list(&self, filter: &JobFilter) -> Result<Vec<PrintJob>> {
        self.store.list_jobs(filter)
    }

    pub fn list_for_printer(&self, printer_id: PrinterId) -> Result<Vec<PrintJob>> {
        self.store.list_jobs(&JobFilter {
            printer_id: Some(printer_id),
            ..JobFilter::default()
        })
    }

    pub fn get(&self, id: JobId) -> Result<PrintJob> {
        self.store
            .get_job(id)?
            .ok_or_else(|| BridgeError::NotFound(format!("job {id}")))
    }

    #[instrument(skip(self, update))]
    pub fn update(&self, id: JobId, update: &JobUpdate) -> Result<PrintJob> {
        self.store.update_job(id, update)
    }

    #[instrument(skip(self))]
    pub fn delete(&self, id: JobId) -> Result<()> {
        self.store.delete_job(id)
    }

    /// Dashboard counters across every printer.
    pub fn stats(&self) -> Result<JobStats> {
        self.store.job_stats()
    }

    /// The newest jobs with their printers, newest first.
    pub fn recent(&self, limit: u32) -> Result<Vec<RecentJob>> {
        self.store.recent_jobs(limit)
    }
}

/// Number of jobs the dashboard shows by default.
pub const RECENT_JOBS_LIMIT: u32 = 10;

#[cfg(test)]
mod tests {
    use printbridge_core::settings::{CommandLanguage, LabelSettings, PrinterSettings};
    use printbridge_core::types::PrinterType;
    use serde_json::json;

    use super::*;
    use crate::store::SqliteStore;
    use crate::testing::{RecordingPrinter, fake_ports};

    struct Fixture {
        store: Arc<SqliteStore>,
        transport: Arc<RecordingPrinter>,
        events: EventBus,
        service: JobService,
    }

    fn fixture_with(transport: RecordingPrinter) -> Fixture {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let transport = Arc::new(transport);
        let events = EventBus::default();
        let service = JobService::new(
            store.clone(),
            Adapters::new(&fake_ports(transport.clone())),
            events.clone(),
        );
        service.start();
        Fixture {
            store,
            transport,
            events,
            service,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(RecordingPrinter::default())
    }

    fn zpl_printer(store: &SqliteStore) -> PrinterWithSettings {
        let settings = PrinterSettings::Label(LabelSettings {
            encoder: CommandLanguage::Zpl,
            ..LabelSettings::default()
        });
        let printer = store
            .create_printer("Label-1", PrinterType::Label, None, &settings)
            .unwrap();
        store.get_printer_with_settings(printer.id).unwrap().unwrap()
    }

    fn label_job(printer: &PrinterWithSettings, job_type: PrinterType) -> NewPrintJob {
        NewPrintJob {
            printer_id: printer.printer.id,
            name: "shelf label".into(),
            job_type,
            data: json!({
                "brand": "Acme",
                "productName": "Widget",
                "barcode": "123456",
                "price": 3,
                "expiry": "2026-12-31",
                "copies": 2
            }),
        }
    }

    #[tokio::test]
    async fn label_job_prints_zpl_and_completes() {
        let fx = fixture();
        let printer = zpl_printer(&fx.store);
        let mut rx = fx.events.subscribe();

        let outcome = fx
            .service
            .execute(&printer, label_job(&printer, PrinterType::Label))
            .await
            .unwrap();
        assert!(outcome.success);

        let sent = fx.transport.sent();
        assert_eq!(sent.len(), 1);
        let zpl = String::from_utf8(sent[0].bytes.clone()).unwrap();
        assert!(zpl.starts_with("^XA"));
        assert_eq!(zpl.matches("^BC").count(), 1);
        assert!(zpl.contains("^FD123456^FS"));
        assert!(zpl.ends_with("^PQ2\n^XZ"));

        let job = fx.service.get(outcome.job_id).unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert!(job.completed_at.is_some());
        assert_eq!(job.error, None);

        assert_eq!(
            rx.try_recv().unwrap(),
            BridgeEvent::JobCompleted {
                job_id: outcome.job_id,
                printer_name: "Label-1".into(),
                success: true,
                error: None,
            }
        );
    }

    #[tokio::test]
    async fn type_mismatch_fails_without_printing() {
        let fx = fixture();
        let printer = zpl_printer(&fx.store);

        let outcome = fx
            .service
            .execute(&printer, label_job(&printer, PrinterType::Receipt))
            .await
            .unwrap();

        assert!(!outcome.success);
        assert!(outcome.error.as_deref().unwrap().contains("type mismatch"));
        assert!(fx.transport.sent().is_empty());
        let job = fx.service.get(outcome.job_id).unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.completed_at, None);
    }

    #[tokio::test]
    async fn transport_failure_marks_the_job_failed() {
        let fx = fixture_with(RecordingPrinter::failing("connection refused"));
        let printer = zpl_printer(&fx.store);
        let mut rx = fx.events.subscribe();

        let outcome = fx
            .service
            .execute(&printer, label_job(&printer, PrinterType::Label))
            .await
            .unwrap();

        assert!(!outcome.success);
        let job = fx.service.get(outcome.job_id).unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.error.unwrap().contains("connection refused"));
        assert!(matches!(
            rx.try_recv().unwrap(),
            BridgeEvent::JobCompleted { success: false, .. }
        ));
    }

    #[tokio::test]
    async fn a4_printing_is_a_failed_job() {
        let fx = fixture();
        let printer = fx
            .store
            .create_printer("Office", PrinterType::A4, None, &PrinterSettings::A4)
            .unwrap();
        let outcome = fx
            .service
            .submit(NewPrintJob {
                printer_id: printer.id,
                name: "letter".into(),
                job_type: PrinterType::A4,
                data: json!({}),
            })
            .await
            .unwrap();
        assert!(!outcome.success);
        assert!(outcome.error.unwrap().contains("not supported"));
    }

    #[tokio::test]
    async fn stopped_service_touches_nothing() {
        let fx = fixture();
        let printer = zpl_printer(&fx.store);
        fx.service.stop();

        let err = fx
            .service
            .execute(&printer, label_job(&printer, PrinterType::Label))
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::ServiceNotRunning));
        assert!(fx.service.list(&JobFilter::default()).unwrap().is_empty());
    }

    #[tokio::test]
    async fn executed_jobs_reach_exactly_one_terminal_state() {
        let fx = fixture();
        let printer = zpl_printer(&fx.store);
        for job_type in [PrinterType::Label, PrinterType::Receipt, PrinterType::Label] {
            fx.service
                .execute(&printer, label_job(&printer, job_type))
                .await
                .unwrap();
        }

        let jobs = fx.service.list_for_printer(printer.printer.id).unwrap();
        assert_eq!(jobs.len(), 3);
        for job in &jobs {
            assert!(job.status.is_terminal());
            assert_eq!(job.completed_at.is_some(), job.status == JobStatus::Completed);
            assert_eq!(job.error.is_some(), job.status == JobStatus::Failed);
        }

        let finished = jobs[0].id;
        let err = fx
            .service
            .update(
                finished,
                &JobUpdate {
                    status: Some(JobStatus::Failed),
                    ..JobUpdate::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, BridgeError::Validation(_)));
    }

    #[tokio::test]
    async fn stats_and_recent_reflect_executed_jobs() {
        let fx = fixture();
        let printer = zpl_printer(&fx.store);
        assert_eq!(fx.service.stats().unwrap().success_rate, 0.0);

        let printed = fx
            .service
            .execute(&printer, label_job(&printer, PrinterType::Label))
            .await
            .unwrap();
        let rejected = fx
            .service
            .execute(&printer, label_job(&printer, PrinterType::Receipt))
            .await
            .unwrap();

        let stats = fx.service.stats().unwrap();
        assert_eq!(stats.total_printers, 1);
        assert_eq!(stats.total_jobs, 2);
        assert_eq!(stats.completed_jobs, 1);
        assert_eq!(stats.failed_jobs, 1);
        assert_eq!(stats.success_rate, 50.0);

        let recent = fx.service.recent(RECENT_JOBS_LIMIT).unwrap();
        let ids: Vec<_> = recent.iter().map(|r| r.job.id).collect();
        assert_eq!(ids, vec![rejected.job_id, printed.job_id]);
        assert!(recent.iter().all(|r| r.printer.name == "Label-1"));
    }

    #[tokio::test]
    async fn missing_job_is_not_found() {
        let fx = fixture();
        assert!(matches!(fx.service.get(JobId(99)), Err(BridgeError::NotFound(_))));
        assert!(matches!(fx.service.delete(JobId(99)), Err(BridgeError::NotFound(_))));
    }
}
