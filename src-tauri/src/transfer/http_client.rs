use super::client::TransferClient;
use super::types::*;
use crate::config::AppConfig;
use async_trait::async_trait;
use futures::TryStreamExt;
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client, StatusCode};
use std::time::Duration;
use tokio_util::io::ReaderStream;
use tokio_util::sync::CancellationToken;

/// Posts artifacts to the processing service as `multipart/form-data`
pub struct HttpTransferClient {
    client: Client,
    endpoint: String,
    timeout: Option<Duration>,
}

impl HttpTransferClient {
    pub fn new(endpoint: &str) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.to_string(),
            timeout: None,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(&config.endpoint).with_timeout(config.request_timeout())
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn send(
        &self,
        request: SubmissionRequest,
        progress: ProgressCallback,
    ) -> Result<ProcessingResult, TransferFailure> {
        let artifact = request.artifact;
        let total = artifact.len();
        let reader = artifact
            .reader()
            .await
            .map_err(TransferFailure::artifact_unreadable)?;

        let mut tracker = UploadProgress::new(total, progress);
        let stream =
            ReaderStream::new(reader).inspect_ok(move |chunk| tracker.advance(chunk.len()));

        let part = Part::stream_with_length(Body::wrap_stream(stream), total)
            .file_name(artifact.file_name().to_string())
            .mime_str("application/zip")
            .map_err(classify)?;
        let form = Form::new()
            .text("model", request.model_id.clone())
            .part("file", part);

        let mut builder = self.client.post(&self.endpoint).multipart(form);
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }

        tracing::debug!(
            endpoint = %self.endpoint,
            model = %request.model_id,
            file = %artifact.file_name(),
            bytes = total,
            "Submitting artifact"
        );

        let response = builder.send().await.map_err(classify)?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = server_message(&body).unwrap_or_else(|| fallback_message(status));
            tracing::warn!(%status, %message, "Processing service rejected submission");
            return Err(TransferFailure::rejected(status.as_u16(), message));
        }

        let body = response.bytes().await.map_err(classify)?;
        serde_json::from_slice::<ProcessingResult>(&body).map_err(TransferFailure::invalid_response)
    }
}

#[async_trait]
impl TransferClient for HttpTransferClient {
    async fn submit(
        &self,
        request: SubmissionRequest,
        progress: ProgressCallback,
        cancel: CancellationToken,
    ) -> Result<ProcessingResult, TransferFailure> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::debug!(endpoint = %self.endpoint, "Submission cancelled");
                Err(TransferFailure::cancelled())
            }
            outcome = self.send(request, progress) => outcome,
        }
    }
}

/// Turns byte counts into whole percentages, reporting each value once
struct UploadProgress {
    total: u64,
    sent: u64,
    last_reported: Option<u8>,
    callback: ProgressCallback,
}

impl UploadProgress {
    fn new(total: u64, callback: ProgressCallback) -> Self {
        Self {
            total,
            sent: 0,
            last_reported: None,
            callback,
        }
    }

    fn advance(&mut self, bytes: usize) {
        if self.total == 0 {
            return;
        }

        self.sent += bytes as u64;
        let percent = (self.sent.saturating_mul(100) / self.total).min(100) as u8;
        if self.last_reported != Some(percent) {
            self.last_reported = Some(percent);
            (self.callback)(percent);
        }
    }
}

fn classify(err: reqwest::Error) -> TransferFailure {
    if err.is_timeout() {
        tracing::warn!(error = %err, "Processing request timed out");
        TransferFailure::timeout()
    } else {
        tracing::warn!(error = %err, "Processing request failed");
        TransferFailure::network()
    }
}

/// Pull the service's own explanation out of an error body
fn server_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    ["error", "message"]
        .iter()
        .filter_map(|key| value.get(*key).and_then(|v| v.as_str()))
        .find(|message| !message.trim().is_empty())
        .map(String::from)
}

fn fallback_message(status: StatusCode) -> String {
    format!("Request failed with status: {}", status)
}
