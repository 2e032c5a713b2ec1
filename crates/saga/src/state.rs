//! Join run state machine.

use serde::{Deserialize, Serialize};

/// The state of one join run.
///
/// State transitions:
/// ```text
/// Start ──► FetchingJoining ──► FetchingHost ──► Classified ──┬──► Succeeded (rejected)
///   │              │                 │                        └──► Mutating ──┬──► Succeeded
///   └──────────────┴─────────────────┴──► Failed                              ├──► PartiallyApplied
///                                                                             └──► Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum JoinState {
    /// Request accepted, nothing read yet.
    #[default]
    Start,

    /// Reading the joining group.
    FetchingJoining,

    /// Reading the host broadcast and host group.
    FetchingHost,

    /// Capacity classified; no store touched yet.
    Classified,

    /// Writing to the stores.
    Mutating,

    /// Finished cleanly (terminal).
    Succeeded,

    /// Stores were changed but do not agree (terminal, must be surfaced).
    PartiallyApplied,

    /// Finished with an error and no outstanding inconsistency (terminal).
    Failed,
}

impl JoinState {
    /// Returns true if the run may move from this state to `next`.
    pub fn can_transition_to(&self, next: JoinState) -> bool {
        use JoinState::*;
        matches!(
            (self, next),
            (Start, FetchingJoining)
                | (FetchingJoining, FetchingHost)
                | (FetchingHost, Classified)
                | (Classified, Mutating)
                | (Classified, Succeeded)
                | (Mutating, Succeeded)
                | (Mutating, PartiallyApplied)
                | (Start | FetchingJoining | FetchingHost | Mutating, Failed)
        )
    }

    /// Returns true if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JoinState::Succeeded | JoinState::PartiallyApplied | JoinState::Failed
        )
    }

    /// Returns the state name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            JoinState::Start => "Start",
            JoinState::FetchingJoining => "FetchingJoining",
            JoinState::FetchingHost => "FetchingHost",
            JoinState::Classified => "Classified",
            JoinState::Mutating => "Mutating",
            JoinState::Succeeded => "Succeeded",
            JoinState::PartiallyApplied => "PartiallyApplied",
            JoinState::Failed => "Failed",
        }
    }
}

impl std::fmt::Display for JoinState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
