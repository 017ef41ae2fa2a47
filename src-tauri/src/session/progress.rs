use super::types::*;
use chrono::Utc;

/// Limits for merging transfer progress and heuristic ticks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressPolicy {
    /// Highest value either source may reach before a confirmed success
    pub ceiling: u8,
    pub tick_step: u8,
}

impl Default for ProgressPolicy {
    fn default() -> Self {
        Self {
            ceiling: 90,
            tick_step: 10,
        }
    }
}

impl ProgressPolicy {
    pub fn merge_transfer(&self, current: u8, reported: u8) -> u8 {
        current.max(reported.min(self.ceiling))
    }

    pub fn merge_tick(&self, current: u8) -> u8 {
        current.max(current.saturating_add(self.tick_step).min(self.ceiling))
    }
}

/// Fold one event into the session.
///
/// Only events for the current episode while it is in flight are applied;
/// everything else is reported as `Applied::Ignored` and leaves the session
/// untouched. Progress is a running maximum capped by the policy ceiling and
/// only a success sets 100.
pub fn apply_event(
    session: &mut Session,
    episode: u64,
    event: SessionEvent,
    policy: &ProgressPolicy,
) -> Applied {
    if episode != session.episode || !session.is_in_flight() {
        return Applied::Ignored;
    }

    match event {
        SessionEvent::TransferProgress(reported) => {
            update_progress(session, policy.merge_transfer(session.progress, reported))
        }
        SessionEvent::Tick => update_progress(session, policy.merge_tick(session.progress)),
        SessionEvent::Completed(result) => {
            session.progress = 100;
            session.result = Some(result);
            session.error = None;
            session.state = SessionState::Succeeded;
            session.finished_at = Some(Utc::now().to_rfc3339());
            Applied::Finished
        }
        SessionEvent::Failed(failure) => {
            // progress stays where it got to
            session.result = None;
            session.error = Some(failure);
            session.state = SessionState::Failed;
            session.finished_at = Some(Utc::now().to_rfc3339());
            Applied::Finished
        }
    }
}

fn update_progress(session: &mut Session, next: u8) -> Applied {
    if next == session.progress {
        Applied::Unchanged
    } else {
        session.progress = next;
        Applied::Updated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::fixtures::sample_result;
    use crate::transfer::{FailureReason, TransferFailure};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn in_flight() -> Session {
        let mut session = Session::new("unet_t1c");
        session.begin_episode();
        session
    }

    #[test]
    fn test_transfer_progress_is_capped() {
        let policy = ProgressPolicy::default();

        assert_eq!(policy.merge_transfer(0, 30), 30);
        assert_eq!(policy.merge_transfer(60, 30), 60);
        assert_eq!(policy.merge_transfer(60, 100), 90);
    }

    #[test]
    fn test_tick_adds_step_up_to_ceiling() {
        let policy = ProgressPolicy::default();

        assert_eq!(policy.merge_tick(0), 10);
        assert_eq!(policy.merge_tick(60), 70);
        assert_eq!(policy.merge_tick(85), 90);
        assert_eq!(policy.merge_tick(90), 90);
    }

    #[test]
    fn test_interleaved_sources() {
        let policy = ProgressPolicy::default();
        let mut session = in_flight();

        assert_eq!(
            apply_event(&mut session, 1, SessionEvent::TransferProgress(30), &policy),
            Applied::Updated
        );
        assert_eq!(
            apply_event(&mut session, 1, SessionEvent::TransferProgress(60), &policy),
            Applied::Updated
        );
        assert_eq!(apply_event(&mut session, 1, SessionEvent::Tick, &policy), Applied::Updated);
        assert_eq!(session.progress, 70);

        // A late, smaller transfer reading never pulls progress back
        assert_eq!(
            apply_event(&mut session, 1, SessionEvent::TransferProgress(65), &policy),
            Applied::Unchanged
        );
        assert_eq!(session.progress, 70);

        assert_eq!(
            apply_event(&mut session, 1, SessionEvent::Completed(sample_result()), &policy),
            Applied::Finished
        );
        assert_eq!(session.state, SessionState::Succeeded);
        assert_eq!(session.progress, 100);
        assert!(session.finished_at.is_some());
    }

    #[test]
    fn test_failure_keeps_progress() {
        let policy = ProgressPolicy::default();
        let mut session = in_flight();

        apply_event(&mut session, 1, SessionEvent::TransferProgress(45), &policy);
        let applied = apply_event(
            &mut session,
            1,
            SessionEvent::Failed(TransferFailure::rejected(400, "invalid format")),
            &policy,
        );

        assert_eq!(applied, Applied::Finished);
        assert_eq!(session.state, SessionState::Failed);
        assert_eq!(session.progress, 45);
        assert!(session.result.is_none());
        assert_eq!(session.error.as_ref().unwrap().message, "invalid format");
    }

    #[test]
    fn test_events_after_terminal_are_ignored() {
        let policy = ProgressPolicy::default();
        let mut session = in_flight();

        apply_event(&mut session, 1, SessionEvent::Completed(sample_result()), &policy);

        assert_eq!(apply_event(&mut session, 1, SessionEvent::Tick, &policy), Applied::Ignored);
        assert_eq!(
            apply_event(&mut session, 1, SessionEvent::TransferProgress(10), &policy),
            Applied::Ignored
        );
        assert_eq!(
            apply_event(&mut session, 1, SessionEvent::Failed(TransferFailure::network()), &policy),
            Applied::Ignored
        );
        assert_eq!(session.state, SessionState::Succeeded);
        assert!(session.error.is_none());
    }

    #[test]
    fn test_stale_episode_is_ignored() {
        let policy = ProgressPolicy::default();
        let mut session = in_flight();
        apply_event(&mut session, 1, SessionEvent::Failed(TransferFailure::cancelled()), &policy);

        assert_eq!(session.begin_episode(), 2);
        assert_eq!(session.progress, 0);
        assert!(session.error.is_none());

        assert_eq!(
            apply_event(&mut session, 1, SessionEvent::TransferProgress(80), &policy),
            Applied::Ignored
        );
        assert_eq!(
            apply_event(&mut session, 1, SessionEvent::Completed(sample_result()), &policy),
            Applied::Ignored
        );
        assert_eq!(session.state, SessionState::InFlight);
        assert_eq!(session.progress, 0);
        assert!(session.result.is_none());
    }

    #[test]
    fn test_idle_session_ignores_events() {
        let policy = ProgressPolicy::default();
        let mut session = Session::new("unet_t1c");

        assert_eq!(apply_event(&mut session, 0, SessionEvent::Tick, &policy), Applied::Ignored);
        assert_eq!(session.state, SessionState::Idle);
    }

    #[test]
    fn test_random_interleavings_are_monotone() {
        let policy = ProgressPolicy::default();
        let mut rng = StdRng::seed_from_u64(0x4a5e);

        for _ in 0..200 {
            let mut session = in_flight();
            let mut previous = session.progress;

            for _ in 0..rng.gen_range(1..60) {
                let event = if rng.gen_bool(0.5) {
                    SessionEvent::TransferProgress(rng.gen_range(0..=100))
                } else {
                    SessionEvent::Tick
                };
                apply_event(&mut session, 1, event, &policy);

                assert!(session.progress >= previous);
                assert!(session.progress <= policy.ceiling);
                previous = session.progress;
            }

            if rng.gen_bool(0.5) {
                apply_event(&mut session, 1, SessionEvent::Completed(sample_result()), &policy);
                assert_eq!(session.progress, 100);
            } else {
                let failure = SessionEvent::Failed(TransferFailure::timeout());
                apply_event(&mut session, 1, failure, &policy);
                assert_eq!(session.progress, previous);
                assert_eq!(session.error.as_ref().unwrap().reason, FailureReason::Timeout);
            }
        }
    }

    #[test]
    fn test_custom_policy() {
        let policy = ProgressPolicy { ceiling: 75, tick_step: 25 };

        assert_eq!(policy.merge_tick(50), 75);
        assert_eq!(policy.merge_transfer(0, 99), 75);
    }
}
