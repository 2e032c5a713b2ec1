//! Named steps of a join run.

use serde::{Deserialize, Serialize};

/// One upstream call made by the join coordinator.
///
/// Reads come first, then either the merge steps (perfect match) or the
/// fill steps (partial match).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinStep {
    FetchJoiningGroup,
    FetchHostBroadcast,
    FetchHostGroup,
    DeleteHostBroadcast,
    DeleteJoiningGroup,
    DeleteHostGroup,
    CreateMergedGroup,
    UpdateHostGroup,
    UpdateHostBroadcast,
}

impl JoinStep {
    /// Returns true for the read-phase steps, which never mutate a store.
    pub fn is_read(&self) -> bool {
        matches!(
            self,
            JoinStep::FetchJoiningGroup | JoinStep::FetchHostBroadcast | JoinStep::FetchHostGroup
        )
    }

    /// Returns the step name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            JoinStep::FetchJoiningGroup => "fetch_joining_group",
            JoinStep::FetchHostBroadcast => "fetch_host_broadcast",
            JoinStep::FetchHostGroup => "fetch_host_group",
            JoinStep::DeleteHostBroadcast => "delete_host_broadcast",
            JoinStep::DeleteJoiningGroup => "delete_joining_group",
            JoinStep::DeleteHostGroup => "delete_host_group",
            JoinStep::CreateMergedGroup => "create_merged_group",
            JoinStep::UpdateHostGroup => "update_host_group",
            JoinStep::UpdateHostBroadcast => "update_host_broadcast",
        }
    }
}

impl std::fmt::Display for JoinStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
