use crate::artifact::ArtifactSummary;
use crate::transfer::{ProcessingResult, TransferFailure};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Ready,
    InFlight,
    Succeeded,
    Failed,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Succeeded | SessionState::Failed)
    }
}

/// Read-only view of a processing session, as handed to renderers.
///
/// `result` is only set in `Succeeded`, `error` only in `Failed`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Session {
    pub id: String,
    pub state: SessionState,
    pub selected_model: String,
    pub artifact: Option<ArtifactSummary>,
    pub progress: u8,
    pub result: Option<ProcessingResult>,
    pub error: Option<TransferFailure>,
    /// Number of the latest accepted `start()`; 0 before the first one
    pub episode: u64,
    pub started_at: Option<String>,
    pub finished_at: Option<String>,
}

/// Inputs to the session reducer, tagged with an episode by the caller
#[derive(Debug, Clone)]
pub enum SessionEvent {
    TransferProgress(u8),
    Tick,
    Completed(ProcessingResult),
    Failed(TransferFailure),
}

/// What the reducer did with an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// Stale episode or no episode in flight
    Ignored,
    Unchanged,
    Updated,
    /// The episode reached a terminal state
    Finished,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("No artifact selected")]
    NoArtifact,

    #[error("A submission is already in progress")]
    Busy,

    #[error("Unknown model: {0}")]
    UnknownModel(String),

    #[error("No async runtime available to run the submission")]
    NoRuntime,
}

impl Session {
    pub fn new(default_model: &str) -> Self {
        Self {
            id: format!("session-{}", Uuid::new_v4()),
            state: SessionState::Idle,
            selected_model: default_model.to_string(),
            artifact: None,
            progress: 0,
            result: None,
            error: None,
            episode: 0,
            started_at: None,
            finished_at: None,
        }
    }

    /// Drop everything the previous episode produced
    pub(crate) fn clear_outcome(&mut self) {
        self.progress = 0;
        self.result = None;
        self.error = None;
        self.started_at = None;
        self.finished_at = None;
    }

    pub(crate) fn begin_episode(&mut self) -> u64 {
        self.clear_outcome();
        self.episode += 1;
        self.state = SessionState::InFlight;
        self.started_at = Some(Utc::now().to_rfc3339());
        self.episode
    }

    pub fn is_in_flight(&self) -> bool {
        self.state == SessionState::InFlight
    }
}
