// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Client for the remote print-job queue.
//
// Every endpoint answers with the envelope `{success, data?, error?}`.  A
// non-2xx status, a body that is not JSON, or `success: false` all count as
// a failed exchange.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::{debug, instrument};

use printbridge_core::error::{BridgeError, Result};
use printbridge_core::types::{GlobalSettings, PrinterRole};

/// A job waiting in the remote queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteJob {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub name: String,
    /// Role key: `label`, `receipt` or `regular`.
    #[serde(rename = "type")]
    pub job_type: String,
    /// Job payload. The queue sends it as JSON text; objects are accepted too.
    #[serde(default, deserialize_with = "json_or_text")]
    pub data: Value,
}

impl RemoteJob {
    /// The printer role this job is routed to.
    pub fn role(&self) -> Result<PrinterRole> {
        match self.job_type.trim().to_ascii_lowercase().as_str() {
            "label" => Ok(PrinterRole::Label),
            "receipt" => Ok(PrinterRole::Receipt),
            "regular" | "a4" => Ok(PrinterRole::Regular),
            other => Err(BridgeError::Validation(format!("unknown job type: {other}"))),
        }
    }
}

fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(s) => s,
        Raw::Number(n) => n.to_string(),
    })
}

fn json_or_text<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Value, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(text) => serde_json::from_str(&text).unwrap_or(Value::String(text)),
        other => other,
    })
}

/// Response envelope shared by every endpoint.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    success: bool,
    data: Option<T>,
    error: Option<String>,
}

impl<T> Envelope<T> {
    fn into_result(self, endpoint: &str) -> Result<Option<T>> {
        if self.success {
            Ok(self.data)
        } else {
            Err(BridgeError::Transport(format!(
                "{endpoint} rejected: {}",
                self.error.as_deref().unwrap_or("no reason given")
            )))
        }
    }
}

/// Remote queue operations used by the sync client.
#[async_trait]
pub trait RemoteApi: Send + Sync {
    async fn register(&self, client_id: &str) -> Result<()>;

    async fn fetch_jobs(&self, client_id: &str) -> Result<Vec<RemoteJob>>;

    async fn complete_job(&self, job_id: &str) -> Result<()>;

    async fn fail_job(&self, job_id: &str, reason: &str) -> Result<()>;
}

/// Builds a `RemoteApi` for the current credentials. Called on every
/// (re)start of the sync client.
pub trait RemoteConnector: Send + Sync {
    fn connect(&self, settings: &GlobalSettings) -> Result<Arc<dyn RemoteApi>>;
}

/// `reqwest` implementation of [`RemoteApi`].
#[derive(Debug, Clone)]
pub struct HttpRemoteApi {
    client: Client,
    base_url: Url,
    api_key: String,
}

impl HttpRemoteApi {
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self> {
        let base_url = base_url.trim().trim_end_matches('/');
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(BridgeError::Configuration(format!(
                "server URL must start with http:// or https://, got `{base_url}`"
            )));
        }
        let parsed = Url::parse(base_url).map_err(|e| {
            BridgeError::Configuration(format!("invalid server URL `{base_url}`: {e}"))
        })?;
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BridgeError::Configuration(format!("HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: parsed,
            api_key: api_key.to_string(),
        })
    }

    /// Append path segments to the server URL. Each segment is
    /// percent-encoded, so ids from the queue cannot change the route.
    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| {
                BridgeError::Configuration(format!("server URL `{}` cannot take a path", self.base_url))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn exchange<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<Option<T>> {
        let response = request
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    BridgeError::Transport(format!("{endpoint} timed out"))
                } else {
                    BridgeError::Transport(format!("{endpoint}: {e}"))
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| BridgeError::Transport(format!("{endpoint}: reading body: {e}")))?;
        if !status.is_success() {
            return Err(BridgeError::Transport(format!(
                "{endpoint} returned {status}: {}",
                body.trim()
            )));
        }

        let envelope: Envelope<T> = serde_json::from_str(&body).map_err(|e| {
            BridgeError::Transport(format!("{endpoint} returned a non-JSON response: {e}"))
        })?;
        envelope.into_result(endpoint)
    }
}

#[async_trait]
impl RemoteApi for HttpRemoteApi {
    #[instrument(skip(self))]
    async fn register(&self, client_id: &str) -> Result<()> {
        let request = self
            .client
            .post(self.url(&["api", "bridge", "register"])?)
            .header(CONTENT_TYPE, "application/json")
            .query(&[("clientId", client_id)]);
        self.exchange::<Value>("register", request).await?;
        debug!("registered with remote queue");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn fetch_jobs(&self, client_id: &str) -> Result<Vec<RemoteJob>> {
        let request = self
            .client
            .get(self.url(&["api", "bridge", "jobs"])?)
            .header(CONTENT_TYPE, "application/json")
            .query(&[("clientId", client_id)]);
        let jobs = self
            .exchange::<Vec<RemoteJob>>("fetch jobs", request)
            .await?
            .unwrap_or_default();
        debug!(count = jobs.len(), "jobs fetched");
        Ok(jobs)
    }

    #[instrument(skip(self))]
    async fn complete_job(&self, job_id: &str) -> Result<()> {
        let request = self
            .client
            .post(self.url(&["api", "bridge", "jobs", job_id, "complete"])?)
            .header(CONTENT_TYPE, "application/json");
        self.exchange::<Value>("complete job", request).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn fail_job(&self, job_id: &str, reason: &str) -> Result<()> {
        let request = self
            .client
            .post(self.url(&["api", "bridge", "jobs", job_id, "fail"])?)
            .json(&serde_json::json!({ "reason": reason }));
        self.exchange::<Value>("fail job", request).await?;
        Ok(())
    }
}

/// Connector producing [`HttpRemoteApi`] clients.
#[derive(Debug, Clone)]
pub struct HttpConnector {
    timeout: Duration,
}

impl HttpConnector {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl RemoteConnector for HttpConnector {
    fn connect(&self, settings: &GlobalSettings) -> Result<Arc<dyn RemoteApi>> {
        Ok(Arc::new(HttpRemoteApi::new(
            &settings.server_url,
            &settings.api_key,
            self.timeout,
        )?))
    }
}
