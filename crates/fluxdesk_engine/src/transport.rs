use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use desk_logging::desk_warn;
use futures_util::StreamExt;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;
use serde_json::Value;

use fluxdesk_core::{ErrorDetail, JobHandle, JobRequest, JobStatus, RunError, StatusSnapshot};

/// Failures of a single HTTP operation, classified for the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("API key invalid or unauthorized")]
    Auth,
    #[error("API error ({status}): {detail}")]
    Api { status: u16, detail: String },
    #[error("network error: {0}")]
    Network(String),
    #[error("unexpected server response: {0}")]
    Protocol(String),
    #[error("downloaded payload is empty")]
    EmptyPayload,
}

impl From<TransportError> for RunError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Auth => RunError::Auth,
            TransportError::Api { status, detail } => RunError::Api { status, detail },
            TransportError::Network(message) => RunError::Network(message),
            TransportError::Protocol(message) => RunError::Protocol(message),
            TransportError::EmptyPayload => {
                RunError::Protocol("downloaded payload is empty".to_string())
            }
        }
    }
}

/// Per-call timeouts and the queue base URL.
#[derive(Debug, Clone)]
pub struct TransportSettings {
    pub base_url: String,
    pub submit_timeout: Duration,
    pub status_timeout: Duration,
    pub result_timeout: Duration,
    pub download_timeout: Duration,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.fal.ai/queues".to_string(),
            submit_timeout: Duration::from_secs(20),
            status_timeout: Duration::from_secs(10),
            result_timeout: Duration::from_secs(20),
            download_timeout: Duration::from_secs(30),
        }
    }
}

/// Shared, runtime-settable credential. A missing or empty key is a
/// recoverable condition: calls fail with `Auth` until a key is supplied.
#[derive(Debug, Clone, Default)]
pub struct ApiKey(Arc<RwLock<Option<String>>>);

impl ApiKey {
    pub fn set(&self, key: impl Into<String>) {
        let key = key.into();
        let mut slot = self.0.write().expect("api key lock");
        *slot = if key.is_empty() { None } else { Some(key) };
    }

    pub fn get(&self) -> Option<String> {
        self.0.read().expect("api key lock").clone()
    }

    pub fn is_set(&self) -> bool {
        self.0.read().expect("api key lock").is_some()
    }
}

/// The three queue operations plus the binary download, async and blocking
/// from the orchestrator's point of view.
#[async_trait::async_trait]
pub trait QueueTransport: Send + Sync {
    async fn submit(&self, request: &JobRequest) -> Result<JobHandle, TransportError>;
    async fn poll_status(&self, handle: &JobHandle) -> Result<StatusSnapshot, TransportError>;
    async fn fetch_result(&self, handle: &JobHandle) -> Result<Value, TransportError>;
    async fn download(&self, url: &str) -> Result<Vec<u8>, TransportError>;
}

/// Production transport on reqwest.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    settings: TransportSettings,
    api_key: ApiKey,
}

impl HttpTransport {
    pub fn new(settings: TransportSettings, api_key: ApiKey) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|err| TransportError::Network(err.to_string()))?;
        Ok(Self {
            client,
            settings,
            api_key,
        })
    }

    fn auth_header(&self) -> Result<String, TransportError> {
        self.api_key
            .get()
            .map(|key| format!("Key {key}"))
            .ok_or(TransportError::Auth)
    }

    fn submit_url(&self, model_id: &str) -> String {
        format!("{}/{}/submit", self.settings.base_url, model_id)
    }

    fn status_url(&self, handle: &JobHandle) -> String {
        format!(
            "{}/{}/requests/{}/status",
            self.settings.base_url, handle.model_id, handle.request_id
        )
    }

    fn result_url(&self, handle: &JobHandle) -> String {
        format!(
            "{}/{}/requests/{}",
            self.settings.base_url, handle.model_id, handle.request_id
        )
    }

    async fn get_json(&self, url: &str, timeout: Duration) -> Result<Value, TransportError> {
        let response = self
            .client
            .get(url)
            .header(AUTHORIZATION, self.auth_header()?)
            .timeout(timeout)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        let response = check_status(response).await?;
        read_json(response).await
    }
}

#[async_trait::async_trait]
impl QueueTransport for HttpTransport {
    async fn submit(&self, request: &JobRequest) -> Result<JobHandle, TransportError> {
        if request.image_urls.len() > 1 {
            desk_warn!(
                "{} image URLs supplied; only the first is sent",
                request.image_urls.len()
            );
        }
        let body = serde_json::json!({ "input": request.wire_input() });
        let body = serde_json::to_vec(&body)
            .map_err(|err| TransportError::Protocol(err.to_string()))?;

        let response = self
            .client
            .post(self.submit_url(&request.model_id))
            .header(AUTHORIZATION, self.auth_header()?)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .timeout(self.settings.submit_timeout)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        let response = check_status(response).await?;
        let value = read_json(response).await?;

        let request_id = value
            .get("request_id")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                TransportError::Protocol("submission response lacks request_id".to_string())
            })?;
        Ok(JobHandle {
            request_id: request_id.to_string(),
            model_id: request.model_id.clone(),
            started: Instant::now(),
        })
    }

    async fn poll_status(&self, handle: &JobHandle) -> Result<StatusSnapshot, TransportError> {
        let value = self
            .get_json(&self.status_url(handle), self.settings.status_timeout)
            .await?;
        let body: StatusBody = serde_json::from_value(value)
            .map_err(|err| TransportError::Protocol(format!("malformed status body: {err}")))?;
        Ok(snapshot_from_body(body))
    }

    async fn fetch_result(&self, handle: &JobHandle) -> Result<Value, TransportError> {
        self.get_json(&self.result_url(handle), self.settings.result_timeout)
            .await
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, TransportError> {
        let response = self
            .client
            .get(url)
            .timeout(self.settings.download_timeout)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        let response = check_status(response).await?;

        let mut bytes = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(map_reqwest_error)?;
            bytes.extend_from_slice(&chunk);
        }
        if bytes.is_empty() {
            return Err(TransportError::EmptyPayload);
        }
        Ok(bytes)
    }
}

/// Wire shape of the status endpoint. Loosely typed on purpose: every field
/// except `status` is optional and absent fields stay absent.
#[derive(Debug, Deserialize)]
struct StatusBody {
    status: Option<String>,
    progress: Option<ProgressBody>,
    eta_ms: Option<f64>,
    queue_position: Option<u64>,
    error: Option<ErrorBody>,
    #[serde(default)]
    logs: Vec<LogLine>,
    #[serde(default)]
    fal_logs: Vec<LogLine>,
}

#[derive(Debug, Deserialize)]
struct ProgressBody {
    percentage: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LogLine {
    message: Option<String>,
}

fn snapshot_from_body(body: StatusBody) -> StatusSnapshot {
    let status = body
        .status
        .as_deref()
        .map(JobStatus::parse)
        .unwrap_or(JobStatus::Unknown);

    // Two known log field names; the first non-empty wins.
    let lines = if body.logs.is_empty() {
        &body.fal_logs
    } else {
        &body.logs
    };
    let log_lines: Vec<String> = lines
        .iter()
        .filter_map(|line| line.message.clone())
        .filter(|message| !message.is_empty())
        .collect();

    let error = if status == JobStatus::Failed || body.error.is_some() {
        Some(ErrorDetail {
            message: body
                .error
                .and_then(|err| err.message)
                .unwrap_or_else(|| "Unknown error during processing.".to_string()),
            log_lines,
        })
    } else {
        None
    };

    StatusSnapshot {
        status,
        progress_pct: body.progress.and_then(|progress| progress.percentage),
        eta_ms: body.eta_ms,
        queue_position: body.queue_position,
        error,
    }
}

/// Read a 2xx body as JSON. A body that does not parse is a protocol
/// violation, not a network failure.
async fn read_json(response: reqwest::Response) -> Result<Value, TransportError> {
    let bytes = response.bytes().await.map_err(map_reqwest_error)?;
    serde_json::from_slice(&bytes)
        .map_err(|err| TransportError::Protocol(format!("response is not valid JSON: {err}")))
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, TransportError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status.as_u16() == 401 || status.as_u16() == 403 {
        return Err(TransportError::Auth);
    }
    let text = response.text().await.unwrap_or_default();
    Err(TransportError::Api {
        status: status.as_u16(),
        detail: error_detail_from_body(&text),
    })
}

/// Pull a human-readable detail out of an error body, trying the known JSON
/// fields before falling back to the raw text.
fn error_detail_from_body(text: &str) -> String {
    if let Ok(value) = serde_json::from_str::<Value>(text) {
        let candidates = [
            value.get("detail"),
            value.get("message"),
            value.get("error").and_then(|err| err.get("message")),
        ];
        for candidate in candidates.into_iter().flatten() {
            if let Some(detail) = candidate.as_str() {
                return detail.to_string();
            }
        }
        return value.to_string();
    }
    if text.is_empty() {
        "Could not retrieve error details.".to_string()
    } else {
        text.to_string()
    }
}

fn map_reqwest_error(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        return TransportError::Network(format!("request timed out: {err}"));
    }
    if err.is_connect() {
        return TransportError::Network(format!("connection error: {err}"));
    }
    TransportError::Network(err.to_string())
}
