//! Clients for the Grouping and Broadcast collaborators.

pub mod broadcast;
pub mod faults;
pub mod grouping;
pub mod http;

pub use broadcast::{BroadcastClient, InMemoryBroadcastClient};
pub use faults::Operation;
pub use grouping::{GroupingClient, InMemoryGroupingClient};
pub use http::{HttpBroadcastClient, HttpGroupingClient};
