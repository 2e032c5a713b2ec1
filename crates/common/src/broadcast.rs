//! Broadcast records owned by the Broadcast collaborator.

use serde::{Deserialize, Serialize};

use crate::group::GroupStatus;
use crate::types::GroupId;

/// An open invitation issued by a host group.
///
/// Keyed by the issuing group's id; at most one exists per group.
/// `lf_pax` is the capacity the host still needs filled and is never zero
/// while the broadcast exists. The id is absent from single-record bodies
/// and decodes blank.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Broadcast {
    #[serde(default, alias = "group_id")]
    pub grouping_id: GroupId,
    pub lf_pax: u32,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: GroupStatus,
}

impl Broadcast {
    /// Returns the create payload that would reopen this broadcast.
    pub fn to_new_broadcast(&self) -> NewBroadcast {
        NewBroadcast {
            description: self.description.clone(),
            lf_pax: self.lf_pax,
        }
    }
}

/// Payload for opening a broadcast for a group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewBroadcast {
    #[serde(default)]
    pub description: String,
    pub lf_pax: u32,
}

/// Update of a broadcast's outstanding capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BroadcastPatch {
    pub lf_pax: u32,
}
