use crate::artifact::Artifact;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Receives upload progress as a percentage of artifact bytes sent
pub type ProgressCallback = Arc<dyn Fn(u8) + Send + Sync>;

#[derive(Debug, Clone)]
pub struct SubmissionRequest {
    pub artifact: Artifact,
    pub model_id: String,
}

/// Payload returned by the processing service on success.
///
/// `metrics` holds free-form findings (volume, confidence, ...) that are passed
/// through to renderers untouched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProcessingResult {
    /// Base64-encoded image, ready to be shown as a data URL
    pub image: String,
    #[serde(default)]
    pub metrics: HashMap<String, serde_json::Value>,
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl ProcessingResult {
    pub fn image_bytes(&self) -> Result<Vec<u8>, base64::DecodeError> {
        base64::engine::general_purpose::STANDARD.decode(self.image.trim())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureReason {
    NetworkUnavailable,
    Timeout,
    ServerRejected { status: u16 },
    InvalidResponse,
    ArtifactUnreadable,
    Cancelled,
}

/// Terminal failure of a submission, with a message fit for display
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, thiserror::Error)]
#[error("{message}")]
pub struct TransferFailure {
    pub reason: FailureReason,
    pub message: String,
}

impl TransferFailure {
    pub fn new(reason: FailureReason, message: impl Into<String>) -> Self {
        Self {
            reason,
            message: message.into(),
        }
    }

    pub fn network() -> Self {
        Self::new(
            FailureReason::NetworkUnavailable,
            "Unable to reach the processing service. Check your connection and try again.",
        )
    }

    pub fn timeout() -> Self {
        Self::new(FailureReason::Timeout, "The processing service did not respond in time.")
    }

    pub fn rejected(status: u16, message: impl Into<String>) -> Self {
        Self::new(FailureReason::ServerRejected { status }, message)
    }

    pub fn invalid_response(detail: impl std::fmt::Display) -> Self {
        Self::new(
            FailureReason::InvalidResponse,
            format!("The processing service returned an unreadable result: {}", detail),
        )
    }

    pub fn artifact_unreadable(detail: impl std::fmt::Display) -> Self {
        Self::new(FailureReason::ArtifactUnreadable, detail.to_string())
    }

    pub fn cancelled() -> Self {
        Self::new(FailureReason::Cancelled, "Processing was cancelled.")
    }

    pub fn is_cancelled(&self) -> bool {
        self.reason == FailureReason::Cancelled
    }
}
