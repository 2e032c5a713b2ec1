//! Shared records exchanged with the Grouping and Broadcast collaborators.

pub mod broadcast;
pub mod group;
pub mod types;

pub use broadcast::{Broadcast, BroadcastPatch, NewBroadcast};
pub use group::{Group, GroupPatch, GroupStatus, NewGroup};
pub use types::GroupId;
