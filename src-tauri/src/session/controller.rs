use super::progress::{apply_event, ProgressPolicy};
use super::types::*;
use crate::artifact::Artifact;
use crate::catalog::ModelCatalog;
use crate::config::{AppConfig, ConfigError};
use crate::transfer::{ProgressCallback, SubmissionRequest, TransferClient, TransferFailure};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;
use tokio::time::{interval_at, Duration, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Owns one processing session and the single submission it may have in flight.
///
/// All mutation goes through the transition methods below or through events
/// raised by the heuristic ticker and the transfer client, which are folded in
/// by [`apply_event`]. Renderers read snapshots via [`SessionController::subscribe`].
pub struct SessionController {
    shared: Arc<Shared>,
}

struct Shared {
    inner: Mutex<Inner>,
    snapshots: watch::Sender<Session>,
    catalog: ModelCatalog,
    client: Arc<dyn TransferClient>,
    policy: ProgressPolicy,
    tick_interval: Duration,
}

struct Inner {
    session: Session,
    artifact: Option<Artifact>,
    /// Cancels the ticker and transfer of the episode in flight
    cancel: Option<CancellationToken>,
}

impl SessionController {
    /// Fails when `config` does not pass [`AppConfig::validate`].
    pub fn new(
        catalog: ModelCatalog,
        client: Arc<dyn TransferClient>,
        config: &AppConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let session = Session::new(&catalog.default_model().id);
        let (snapshots, _) = watch::channel(session.clone());

        tracing::debug!(
            session_id = %session.id,
            model = %session.selected_model,
            "Session created"
        );

        Ok(Self {
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner {
                    session,
                    artifact: None,
                    cancel: None,
                }),
                snapshots,
                catalog,
                client,
                policy: config.progress_policy(),
                tick_interval: config.tick_interval(),
            }),
        })
    }

    pub fn catalog(&self) -> &ModelCatalog {
        &self.shared.catalog
    }

    pub fn snapshot(&self) -> Session {
        self.shared.lock().session.clone()
    }

    /// Receiver that observes every published change to the session
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.shared.snapshots.subscribe()
    }

    pub fn select_artifact(&self, artifact: Artifact) -> Result<(), SessionError> {
        let mut inner = self.shared.lock();
        if inner.session.is_in_flight() {
            return Err(SessionError::Busy);
        }

        tracing::info!(
            session_id = %inner.session.id,
            file = %artifact.file_name(),
            bytes = artifact.len(),
            "Artifact selected"
        );

        inner.session.clear_outcome();
        inner.session.artifact = Some(artifact.summary());
        inner.session.state = SessionState::Ready;
        inner.artifact = Some(artifact);
        self.shared.publish(&inner);
        Ok(())
    }

    pub fn select_model(&self, model_id: &str) -> Result<(), SessionError> {
        let mut inner = self.shared.lock();
        if inner.session.is_in_flight() {
            return Err(SessionError::Busy);
        }
        if !self.shared.catalog.contains(model_id) {
            return Err(SessionError::UnknownModel(model_id.to_string()));
        }

        inner.session.selected_model = model_id.to_string();
        self.shared.publish(&inner);
        Ok(())
    }

    /// Begin a new episode and return its number.
    ///
    /// Returns as soon as the ticker and the submission are spawned; the
    /// outcome arrives through the snapshot channel.
    pub fn start(&self) -> Result<u64, SessionError> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| SessionError::NoRuntime)?;

        let mut inner = self.shared.lock();
        if inner.session.is_in_flight() {
            return Err(SessionError::Busy);
        }
        let artifact = inner.artifact.clone().ok_or(SessionError::NoArtifact)?;

        let episode = inner.session.begin_episode();
        let cancel = CancellationToken::new();
        inner.cancel = Some(cancel.clone());

        let request = SubmissionRequest {
            artifact,
            model_id: inner.session.selected_model.clone(),
        };

        tracing::info!(
            session_id = %inner.session.id,
            episode,
            model = %request.model_id,
            "Starting submission"
        );

        self.shared.publish(&inner);
        drop(inner);

        runtime.spawn(run_ticker(self.shared.clone(), episode, cancel.clone()));
        runtime.spawn(run_submission(self.shared.clone(), episode, request, cancel));

        Ok(episode)
    }

    /// Abandon the episode in flight. Returns `false` when there was nothing to cancel.
    pub fn cancel(&self) -> bool {
        let mut inner = self.shared.lock();
        if !inner.session.is_in_flight() {
            return false;
        }

        let episode = inner.session.episode;
        let applied = self.shared.apply_locked(
            &mut inner,
            episode,
            SessionEvent::Failed(TransferFailure::cancelled()),
        );
        applied == Applied::Finished
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        if let Some(cancel) = self.shared.lock().cancel.take() {
            cancel.cancel();
        }
    }
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, inner: &Inner) {
        self.snapshots.send_replace(inner.session.clone());
    }

    fn apply(&self, episode: u64, event: SessionEvent) -> Applied {
        let mut inner = self.lock();
        self.apply_locked(&mut inner, episode, event)
    }

    fn apply_locked(&self, inner: &mut Inner, episode: u64, event: SessionEvent) -> Applied {
        let applied = apply_event(&mut inner.session, episode, event, &self.policy);

        match applied {
            Applied::Ignored => {
                tracing::trace!(
                    episode,
                    current = inner.session.episode,
                    "Discarded stale session event"
                );
            }
            Applied::Unchanged => {}
            Applied::Updated => self.publish(inner),
            Applied::Finished => {
                if let Some(cancel) = inner.cancel.take() {
                    cancel.cancel();
                }

                let session = &inner.session;
                match &session.error {
                    Some(failure) => tracing::warn!(
                        session_id = %session.id,
                        episode,
                        reason = ?failure.reason,
                        message = %failure.message,
                        progress = session.progress,
                        "Submission failed"
                    ),
                    None => {
                        tracing::info!(session_id = %session.id, episode, "Submission succeeded")
                    }
                }
                self.publish(inner);
            }
        }

        applied
    }
}

async fn run_ticker(shared: Arc<Shared>, episode: u64, cancel: CancellationToken) {
    let period = shared.tick_interval;
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                if shared.apply(episode, SessionEvent::Tick) == Applied::Ignored {
                    break;
                }
            }
        }
    }
}

async fn run_submission(
    shared: Arc<Shared>,
    episode: u64,
    request: SubmissionRequest,
    cancel: CancellationToken,
) {
    let progress: ProgressCallback = {
        let shared = shared.clone();
        Arc::new(move |percent| {
            shared.apply(episode, SessionEvent::TransferProgress(percent));
        })
    };

    let client = shared.client.clone();
    let event = match client.submit(request, progress, cancel).await {
        Ok(result) => SessionEvent::Completed(result),
        Err(failure) => SessionEvent::Failed(failure),
    };

    shared.apply(episode, event);
}
