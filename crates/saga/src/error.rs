//! Client and join error types.

use common::GroupId;
use serde::Serialize;
use thiserror::Error;

use crate::steps::JoinStep;

/// Errors returned by the Grouping and Broadcast clients.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    /// The referenced record does not exist.
    #[error("{resource} {id} not found")]
    NotFound { resource: &'static str, id: GroupId },

    /// Timeout, transport failure, or a server-side error upstream.
    #[error("upstream unavailable: {0}")]
    Unavailable(String),

    /// The collaborator answered with a non-success status other than 404.
    #[error("upstream rejected request with status {status}: {message}")]
    Rejected { status: u16, message: String },

    /// The response body did not match the expected record.
    #[error("malformed upstream response: {0}")]
    Decode(String),

    /// The client could not be constructed.
    #[error("client configuration error: {0}")]
    Config(String),
}

impl ClientError {
    /// The error produced when a call exceeds its time budget.
    pub fn timeout() -> Self {
        ClientError::Unavailable("timeout".to_string())
    }

    /// Returns true if the call may be retried (transport-level failure).
    pub fn is_unavailable(&self) -> bool {
        matches!(self, ClientError::Unavailable(_))
    }

    /// Returns true if the record was absent.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ClientError::NotFound { .. })
    }
}

/// A record re-created while undoing a failed merge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RestoredRecord {
    /// The deletion this record undoes.
    pub undone: JoinStep,
    /// Id of the re-created record. Groups come back under a new id.
    pub group_id: GroupId,
}

/// What happened to the stores during a merge that did not finish.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PartialMergeReport {
    pub failed_step: JoinStep,
    pub cause: String,
    /// Steps that had taken effect before the failure.
    pub completed_steps: Vec<JoinStep>,
    pub restored: Vec<RestoredRecord>,
    /// Completed deletions that could not be undone.
    pub unrestored: Vec<JoinStep>,
}

impl PartialMergeReport {
    /// Returns true if every completed deletion was undone.
    pub fn fully_restored(&self) -> bool {
        self.unrestored.is_empty()
    }
}

/// Errors that end a join run.
#[derive(Debug, Error)]
pub enum JoinError {
    /// The request itself is malformed.
    #[error("invalid join request: {0}")]
    Validation(String),

    /// A record the join depends on does not exist.
    #[error("{stage}: {resource} {id} not found")]
    NotFound {
        stage: JoinStep,
        resource: &'static str,
        id: GroupId,
    },

    /// An upstream call timed out or could not be delivered.
    #[error("{stage}: upstream unavailable: {cause}")]
    Unavailable { stage: JoinStep, cause: String },

    /// An upstream call was answered with an unusable response.
    #[error("{stage}: upstream error: {cause}")]
    Upstream { stage: JoinStep, cause: String },

    /// Store contents break a capacity invariant, or a partial fill left
    /// the host group and its broadcast out of step.
    #[error("{stage}: invariant violated on {field}: {detail}")]
    InvariantViolation {
        stage: JoinStep,
        field: &'static str,
        detail: String,
    },

    /// Some but not all steps of a merge took effect.
    #[error(
        "merge failed at {}: {} (completed: {:?}, unrestored: {:?})",
        .0.failed_step,
        .0.cause,
        .0.completed_steps,
        .0.unrestored
    )]
    PartialMerge(Box<PartialMergeReport>),
}

impl JoinError {
    /// Tags a client error with the step that produced it.
    pub fn from_client(stage: JoinStep, err: ClientError) -> Self {
        match err {
            ClientError::NotFound { resource, id } => JoinError::NotFound {
                stage,
                resource,
                id,
            },
            ClientError::Unavailable(cause) => JoinError::Unavailable { stage, cause },
            other => JoinError::Upstream {
                stage,
                cause: other.to_string(),
            },
        }
    }

    /// Returns the step the run stopped at, if it got past validation.
    pub fn stage(&self) -> Option<JoinStep> {
        match self {
            JoinError::Validation(_) => None,
            JoinError::NotFound { stage, .. }
            | JoinError::Unavailable { stage, .. }
            | JoinError::Upstream { stage, .. }
            | JoinError::InvariantViolation { stage, .. } => Some(*stage),
            JoinError::PartialMerge(report) => Some(report.failed_step),
        }
    }

    /// Short label used in metrics and responses.
    pub fn kind(&self) -> &'static str {
        match self {
            JoinError::Validation(_) => "validation",
            JoinError::NotFound { .. } => "not_found",
            JoinError::Unavailable { .. } => "unavailable",
            JoinError::Upstream { .. } => "upstream",
            JoinError::InvariantViolation { .. } => "invariant_violation",
            JoinError::PartialMerge(_) => "partial_merge",
        }
    }

    /// Returns true if the stores may now disagree and need reconciliation.
    pub fn needs_reconciliation(&self) -> bool {
        match self {
            JoinError::PartialMerge(report) => !report.fully_restored(),
            JoinError::InvariantViolation { stage, .. } => !stage.is_read(),
            _ => false,
        }
    }
}

/// Convenience type alias for join results.
pub type Result<T> = std::result::Result<T, JoinError>;
