// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// In-memory fakes of the platform ports and the remote queue for unit tests.

use std::collections::{HashMap, VecDeque};
use std::io::Cursor;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use image::{DynamicImage, GrayImage, ImageFormat, Luma};
use serde_json::Value;
use tokio::sync::Semaphore;

use printbridge_core::error::{BridgeError, Result};
use printbridge_core::types::{GlobalSettings, PrinterStatus, RawPrintResult};
use printbridge_platform::{PlatformPorts, RawPrinter, StatusProbe, TemplateRenderer};

use crate::remote::{RemoteApi, RemoteConnector, RemoteJob};

/// PNG of a solid black `width` x `height` image.
pub fn black_png(width: u32, height: u32) -> Vec<u8> {
    let mut buf = Vec::new();
    DynamicImage::ImageLuma8(GrayImage::from_pixel(width, height, Luma([0])))
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .expect("encode png");
    buf
}

#[derive(Debug, Clone)]
pub struct SentJob {
    pub printer: String,
    pub job_name: String,
    pub bytes: Vec<u8>,
}

/// Raw printer that records every send, optionally failing them.
#[derive(Debug, Default)]
pub struct RecordingPrinter {
    sent: Mutex<Vec<SentJob>>,
    failure: Mutex<Option<String>>,
}

impl RecordingPrinter {
    pub fn failing(reason: &str) -> Self {
        let printer = Self::default();
        *printer.failure.lock().unwrap() = Some(reason.to_string());
        printer
    }

    pub fn sent(&self) -> Vec<SentJob> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl RawPrinter for RecordingPrinter {
    async fn send(&self, printer_name: &str, bytes: &[u8], job_name: &str) -> Result<RawPrintResult> {
        if let Some(reason) = self.failure.lock().unwrap().clone() {
            return Err(BridgeError::Transport(reason));
        }
        let mut sent = self.sent.lock().unwrap();
        sent.push(SentJob {
            printer: printer_name.to_string(),
            job_name: job_name.to_string(),
            bytes: bytes.to_vec(),
        });
        Ok(RawPrintResult {
            job_id: sent.len() as u32,
            bytes_written: bytes.len(),
            success: true,
        })
    }
}

/// Renderer returning a fixed bitmap and recording template ids.
#[derive(Debug)]
pub struct StaticRenderer {
    bitmap: Vec<u8>,
    templates: Mutex<Vec<String>>,
}

impl StaticRenderer {
    pub fn new(bitmap: Vec<u8>) -> Self {
        Self {
            bitmap,
            templates: Mutex::new(Vec::new()),
        }
    }

    pub fn templates(&self) -> Vec<String> {
        self.templates.lock().unwrap().clone()
    }
}

#[async_trait]
impl TemplateRenderer for StaticRenderer {
    async fn render(&self, template_id: &str, _data: &Value) -> Result<Vec<u8>> {
        self.templates.lock().unwrap().push(template_id.to_string());
        Ok(self.bitmap.clone())
    }
}

/// Status probe answering from a table. Unknown printers are offline.
#[derive(Debug, Default)]
pub struct ScriptedProbe {
    answers: Mutex<HashMap<String, std::result::Result<bool, String>>>,
    queries: AtomicU32,
    gate: Mutex<Option<Arc<Semaphore>>>,
}

impl ScriptedProbe {
    pub fn set_online(&self, printer: &str, online: bool) {
        self.answers.lock().unwrap().insert(printer.to_string(), Ok(online));
    }

    pub fn set_error(&self, printer: &str, error: &str) {
        self.answers
            .lock()
            .unwrap()
            .insert(printer.to_string(), Err(error.to_string()));
    }

    /// Make every query wait for a permit on the returned semaphore.
    pub fn gate(&self) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        *self.gate.lock().unwrap() = Some(Arc::clone(&gate));
        gate
    }

    pub fn queries(&self) -> u32 {
        self.queries.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StatusProbe for ScriptedProbe {
    async fn query(&self, printer_name: &str) -> Result<PrinterStatus> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.acquire().await.expect("gate closed").forget();
        }
        match self.answers.lock().unwrap().get(printer_name) {
            Some(Ok(true)) => Ok(PrinterStatus::online()),
            Some(Ok(false)) | None => Ok(PrinterStatus::offline("not connected")),
            Some(Err(error)) => Err(BridgeError::Transport(error.clone())),
        }
    }
}

/// Ports built from the recording fakes.
pub fn fake_ports(printer: Arc<RecordingPrinter>) -> PlatformPorts {
    PlatformPorts {
        printer,
        probe: Arc::new(ScriptedProbe::default()),
        renderer: Arc::new(StaticRenderer::new(black_png(32, 8))),
    }
}

/// Remote queue fake: scripted job batches and a call log.
#[derive(Debug, Default)]
pub struct FakeRemote {
    calls: Mutex<Vec<String>>,
    batches: Mutex<VecDeque<Vec<RemoteJob>>>,
    fail_register: AtomicBool,
    fail_fetch: AtomicBool,
    fail_reports: AtomicBool,
    fetch_gate: Mutex<Option<Arc<Semaphore>>>,
}

impl FakeRemote {
    pub fn push_batch(&self, jobs: Vec<RemoteJob>) {
        self.batches.lock().unwrap().push_back(jobs);
    }

    pub fn set_fail_register(&self, fail: bool) {
        self.fail_register.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_fetch(&self, fail: bool) {
        self.fail_fetch.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_reports(&self, fail: bool) {
        self.fail_reports.store(fail, Ordering::SeqCst);
    }

    /// Make every fetch wait for a permit on the returned semaphore.
    pub fn gate_fetches(&self) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        *self.fetch_gate.lock().unwrap() = Some(Arc::clone(&gate));
        gate
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.calls().iter().filter(|c| c.starts_with(prefix)).count()
    }

    fn log(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl RemoteApi for FakeRemote {
    async fn register(&self, client_id: &str) -> Result<()> {
        self.log(format!("register:{client_id}"));
        if self.fail_register.load(Ordering::SeqCst) {
            return Err(BridgeError::Transport("register refused".into()));
        }
        Ok(())
    }

    async fn fetch_jobs(&self, client_id: &str) -> Result<Vec<RemoteJob>> {
        self.log(format!("fetch:{client_id}"));
        let gate = self.fetch_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.acquire().await.expect("gate closed").forget();
        }
        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(BridgeError::Transport("fetch timed out".into()));
        }
        Ok(self.batches.lock().unwrap().pop_front().unwrap_or_default())
    }

    async fn complete_job(&self, job_id: &str) -> Result<()> {
        self.log(format!("complete:{job_id}"));
        if self.fail_reports.load(Ordering::SeqCst) {
            return Err(BridgeError::Transport("report lost".into()));
        }
        Ok(())
    }

    async fn fail_job(&self, job_id: &str, reason: &str) -> Result<()> {
        self.log(format!("fail:{job_id}:{reason}"));
        if self.fail_reports.load(Ordering::SeqCst) {
            return Err(BridgeError::Transport("report lost".into()));
        }
        Ok(())
    }
}

/// Connector handing out one shared `FakeRemote`, recording the server URL
/// of every connect.
#[derive(Debug, Default)]
pub struct FakeConnector {
    pub remote: Arc<FakeRemote>,
    connects: Mutex<Vec<String>>,
}

impl FakeConnector {
    pub fn connects(&self) -> Vec<String> {
        self.connects.lock().unwrap().clone()
    }
}

impl RemoteConnector for FakeConnector {
    fn connect(&self, settings: &GlobalSettings) -> Result<Arc<dyn RemoteApi>> {
        self.connects.lock().unwrap().push(settings.server_url.clone());
        Ok(self.remote.clone())
    }
}
