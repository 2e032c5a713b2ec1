//! Group-join saga.
//!
//! Merges a *joining* group into a *host* group that has an open broadcast,
//! reconciling the Grouping store (`no_of_pax`) with the Broadcast store
//! (`lf_pax`) without a shared transaction.
//!
//! A join runs these steps:
//! 1. Read the joining group, the host broadcast and the host group
//! 2. Classify the fit (reject / perfect match / partial match)
//! 3. Perfect match: delete the broadcast and both groups, create the merged group
//! 4. Partial match: grow the host group, shrink the broadcast
//!
//! If a merge step fails, the records it already deleted are re-created and
//! the run reports which steps took effect.

pub mod coordinator;
pub mod error;
pub mod locks;
pub mod outcome;
pub mod reconciler;
pub mod run;
pub mod services;
pub mod state;
pub mod steps;

pub use coordinator::{JoinCoordinator, JoinSettings};
pub use error::{ClientError, JoinError, PartialMergeReport, RestoredRecord};
pub use locks::HostLocks;
pub use outcome::{JoinOutcome, JoinRequest};
pub use reconciler::{CAPACITY_EXCEEDED, Classification, reconcile};
pub use run::JoinRun;
pub use services::{
    BroadcastClient, GroupingClient, HttpBroadcastClient, HttpGroupingClient,
    InMemoryBroadcastClient, InMemoryGroupingClient, Operation,
};
pub use state::JoinState;
pub use steps::JoinStep;
