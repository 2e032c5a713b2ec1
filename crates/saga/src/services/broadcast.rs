//! Broadcast client trait and in-memory implementation.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockWriteGuard};
use std::time::Duration;

use async_trait::async_trait;
use common::{Broadcast, BroadcastPatch, GroupId, GroupStatus, NewBroadcast};

use crate::error::ClientError;
use crate::services::faults::{FaultPlan, Operation};

/// Typed access to the Broadcast collaborator. Broadcasts are keyed by
/// the id of the group that issued them.
#[async_trait]
pub trait BroadcastClient: Send + Sync {
    /// Fetches the broadcast issued by `group_id`.
    async fn get(&self, group_id: &GroupId) -> Result<Broadcast, ClientError>;

    /// Lists every open broadcast.
    async fn list(&self) -> Result<Vec<Broadcast>, ClientError>;

    /// Opens a broadcast for `group_id`.
    async fn create(
        &self,
        group_id: &GroupId,
        broadcast: &NewBroadcast,
    ) -> Result<Broadcast, ClientError>;

    /// Sets the outstanding capacity of the broadcast.
    async fn update(
        &self,
        group_id: &GroupId,
        patch: &BroadcastPatch,
    ) -> Result<Broadcast, ClientError>;

    /// Deletes the broadcast issued by `group_id`.
    async fn delete(&self, group_id: &GroupId) -> Result<(), ClientError>;
}

#[derive(Debug, Default)]
struct InMemoryBroadcastState {
    broadcasts: BTreeMap<GroupId, Broadcast>,
    faults: FaultPlan,
}

/// In-memory Broadcast store for tests and local runs.
#[derive(Debug, Clone, Default)]
pub struct InMemoryBroadcastClient {
    state: Arc<RwLock<InMemoryBroadcastState>>,
}

impl InMemoryBroadcastClient {
    pub fn new() -> Self {
        Self::default()
    }

    fn write(&self) -> RwLockWriteGuard<'_, InMemoryBroadcastState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stores a broadcast, replacing any existing one for the same group.
    pub fn insert(&self, broadcast: Broadcast) {
        self.write()
            .broadcasts
            .insert(broadcast.grouping_id.clone(), broadcast);
    }

    /// Returns the stored broadcast, bypassing faults and call counts.
    pub fn broadcast(&self, group_id: &GroupId) -> Option<Broadcast> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .broadcasts
            .get(group_id)
            .cloned()
    }

    /// Returns all stored broadcasts ordered by group id.
    pub fn snapshot(&self) -> Vec<Broadcast> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .broadcasts
            .values()
            .cloned()
            .collect()
    }

    /// Makes every call of `op` fail with `error`.
    pub fn fail(&self, op: Operation, error: ClientError) {
        self.write().faults.fail(op, error);
    }

    /// Makes the next `times` calls of `op` fail with `error`.
    pub fn fail_times(&self, op: Operation, error: ClientError, times: u32) {
        self.write().faults.fail_times(op, error, times);
    }

    /// Delays every call of `op`.
    pub fn delay(&self, op: Operation, delay: Duration) {
        self.write().faults.delay(op, delay);
    }

    /// Removes all scripted faults and delays.
    pub fn clear_faults(&self) {
        self.write().faults.clear();
    }

    /// Returns how many times `op` was called.
    pub fn calls(&self, op: Operation) -> usize {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .faults
            .calls(op)
    }

    /// Returns the number of mutating calls made so far.
    pub fn mutation_calls(&self) -> usize {
        self.calls(Operation::Create) + self.calls(Operation::Update) + self.calls(Operation::Delete)
    }

    async fn enter(&self, op: Operation) -> Result<(), ClientError> {
        let delay = self
            .state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .faults
            .delay_for(op);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.write().faults.on_call(op)
    }
}

fn not_found(group_id: &GroupId) -> ClientError {
    ClientError::NotFound {
        resource: "broadcast",
        id: group_id.clone(),
    }
}

#[async_trait]
impl BroadcastClient for InMemoryBroadcastClient {
    async fn get(&self, group_id: &GroupId) -> Result<Broadcast, ClientError> {
        self.enter(Operation::Get).await?;
        self.broadcast(group_id)
            .ok_or_else(|| not_found(group_id))
    }

    async fn list(&self) -> Result<Vec<Broadcast>, ClientError> {
        self.enter(Operation::List).await?;
        Ok(self.snapshot())
    }

    async fn create(
        &self,
        group_id: &GroupId,
        broadcast: &NewBroadcast,
    ) -> Result<Broadcast, ClientError> {
        self.enter(Operation::Create).await?;
        let mut state = self.write();
        if state.broadcasts.contains_key(group_id) {
            return Err(ClientError::Rejected {
                status: 409,
                message: format!("broadcast for group {group_id} already exists"),
            });
        }
        let created = Broadcast {
            grouping_id: group_id.clone(),
            lf_pax: broadcast.lf_pax,
            description: broadcast.description.clone(),
            status: GroupStatus::Seeking,
        };
        state.broadcasts.insert(group_id.clone(), created.clone());
        Ok(created)
    }

    async fn update(
        &self,
        group_id: &GroupId,
        patch: &BroadcastPatch,
    ) -> Result<Broadcast, ClientError> {
        self.enter(Operation::Update).await?;
        let mut state = self.write();
        let broadcast = state
            .broadcasts
            .get_mut(group_id)
            .ok_or_else(|| not_found(group_id))?;
        broadcast.lf_pax = patch.lf_pax;
        Ok(broadcast.clone())
    }

    async fn delete(&self, group_id: &GroupId) -> Result<(), ClientError> {
        self.enter(Operation::Delete).await?;
        self.write()
            .broadcasts
            .remove(group_id)
            .map(|_| ())
            .ok_or_else(|| not_found(group_id))
    }
}
