//! Per-invocation bookkeeping for a join run.

use std::time::{Duration, Instant};

use uuid::Uuid;

use crate::outcome::JoinRequest;
use crate::reconciler::Classification;
use crate::state::JoinState;
use crate::steps::JoinStep;

/// Tracks one join invocation: its state, classification, and the
/// mutating steps that have taken effect so far.
///
/// Lives only for the duration of the call; nothing is persisted.
#[derive(Debug, Clone)]
pub struct JoinRun {
    id: Uuid,
    request: JoinRequest,
    state: JoinState,
    classification: Option<Classification>,
    completed_steps: Vec<JoinStep>,
    started_at: Instant,
}

impl JoinRun {
    pub fn new(request: JoinRequest) -> Self {
        Self {
            id: Uuid::new_v4(),
            request,
            state: JoinState::Start,
            classification: None,
            completed_steps: Vec::new(),
            started_at: Instant::now(),
        }
    }

    /// Moves the run to `next`.
    pub fn advance(&mut self, next: JoinState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "invalid join transition {} -> {}",
            self.state,
            next
        );
        tracing::debug!(run_id = %self.id, from = %self.state, to = %next, "join state changed");
        self.state = next;
    }

    /// Records the capacity classification and moves to `Classified`.
    pub fn classify(&mut self, classification: Classification) {
        self.classification = Some(classification);
        self.advance(JoinState::Classified);
    }

    /// Records that a mutating step took effect.
    pub fn record_step(&mut self, step: JoinStep) {
        tracing::info!(run_id = %self.id, %step, "join step completed");
        self.completed_steps.push(step);
    }
}

// Query methods
impl JoinRun {
    /// Returns the run id used to correlate log lines.
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn request(&self) -> &JoinRequest {
        &self.request
    }

    pub fn state(&self) -> JoinState {
        self.state
    }

    pub fn classification(&self) -> Option<Classification> {
        self.classification
    }

    /// Returns the completed mutating steps in the order they ran.
    pub fn completed_steps(&self) -> &[JoinStep] {
        &self.completed_steps
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }
}
