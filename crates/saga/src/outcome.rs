//! Join requests and their results.

use common::GroupId;
use serde::{Deserialize, Serialize};

use crate::error::JoinError;

/// Request to merge a joining group into a host group's broadcast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinRequest {
    pub joining_group_id: GroupId,
    pub host_group_id: GroupId,
}

impl JoinRequest {
    pub fn new(joining_group_id: impl Into<GroupId>, host_group_id: impl Into<GroupId>) -> Self {
        Self {
            joining_group_id: joining_group_id.into(),
            host_group_id: host_group_id.into(),
        }
    }

    /// Checks the request shape before any upstream call is made.
    pub fn validate(&self) -> Result<(), JoinError> {
        if self.joining_group_id.is_blank() {
            return Err(JoinError::Validation(
                "joining_group_id must not be empty".to_string(),
            ));
        }
        if self.host_group_id.is_blank() {
            return Err(JoinError::Validation(
                "host_group_id must not be empty".to_string(),
            ));
        }
        if self.joining_group_id == self.host_group_id {
            return Err(JoinError::Validation(format!(
                "group {} cannot join its own broadcast",
                self.host_group_id
            )));
        }
        Ok(())
    }
}

/// Result of a join run that completed without error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum JoinOutcome {
    /// The joining group does not fit; nothing was changed.
    Rejected { reason: String },

    /// The host group grew and its broadcast stays open with less capacity.
    #[serde(rename = "partial")]
    PartiallyFilled {
        host_group_id: GroupId,
        new_lf_pax: u32,
        host_no_of_pax: u32,
    },

    /// Both groups were replaced by one complete group.
    Merged {
        new_group_id: GroupId,
        no_of_pax: u32,
    },
}

impl JoinOutcome {
    /// Short label used in metrics and responses.
    pub fn kind(&self) -> &'static str {
        match self {
            JoinOutcome::Rejected { .. } => "rejected",
            JoinOutcome::PartiallyFilled { .. } => "partial",
            JoinOutcome::Merged { .. } => "merged",
        }
    }
}
