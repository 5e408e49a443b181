//! Identity performer with a log and fault injection.

use latchkey_core::{Action, Performer};
use thiserror::Error;

/// Failure injected by [`RecordingPerformer`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("injected failure on attempt {attempt} ({action})")]
pub struct InjectedFailure {
    /// Zero-based attempt that failed
    pub attempt: usize,
    /// Action that was refused
    pub action: Action,
}

/// Performer that returns every action unchanged and keeps a log.
///
/// Optionally refuses exactly one attempt, counted from zero across the
/// performer's whole life. Refused actions are not logged.
#[derive(Debug, Clone, Default)]
pub struct RecordingPerformer {
    performed: Vec<Action>,
    attempts: usize,
    fail_at: Option<usize>,
}

impl RecordingPerformer {
    /// Performer that never fails.
    pub fn new() -> Self {
        Self::default()
    }

    /// Performer that fails the `attempt`-th call to `perform`.
    pub fn failing_at(attempt: usize) -> Self {
        Self { fail_at: Some(attempt), ..Self::default() }
    }

    /// Arm (or disarm) the one-shot failure, counted from the next attempt.
    pub fn fail_after(&mut self, remaining: Option<usize>) {
        self.fail_at = remaining.map(|n| self.attempts + n);
    }

    /// Actions performed successfully, in order.
    pub fn performed(&self) -> &[Action] {
        &self.performed
    }

    /// Performed actions in their descriptor form.
    pub fn descriptors(&self) -> Vec<String> {
        self.performed.iter().map(ToString::to_string).collect()
    }

    /// Number of `perform` calls, including refused ones.
    pub fn attempts(&self) -> usize {
        self.attempts
    }
}

impl Performer for RecordingPerformer {
    type Outcome = Action;
    type Error = InjectedFailure;

    fn perform(&mut self, action: Action) -> Result<Action, InjectedFailure> {
        let attempt = self.attempts;
        self.attempts += 1;

        if self.fail_at == Some(attempt) {
            self.fail_at = None;
            tracing::debug!(attempt, %action, "injecting failure");
            return Err(InjectedFailure { attempt, action });
        }

        self.performed.push(action.clone());
        Ok(action)
    }
}
