//! Grouping client trait and in-memory implementation.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockWriteGuard};
use std::time::Duration;

use async_trait::async_trait;
use common::{Group, GroupId, GroupPatch, NewGroup};

use crate::error::ClientError;
use crate::services::faults::{FaultPlan, Operation};

/// Typed access to the Grouping collaborator.
#[async_trait]
pub trait GroupingClient: Send + Sync {
    /// Fetches a group by id.
    async fn get(&self, id: &GroupId) -> Result<Group, ClientError>;

    /// Creates a group; the collaborator assigns its id.
    async fn create(&self, group: &NewGroup) -> Result<Group, ClientError>;

    /// Applies a partial update and returns the updated group.
    async fn update(&self, id: &GroupId, patch: &GroupPatch) -> Result<Group, ClientError>;

    /// Deletes a group.
    async fn delete(&self, id: &GroupId) -> Result<(), ClientError>;
}

#[derive(Debug, Default)]
struct InMemoryGroupingState {
    groups: BTreeMap<GroupId, Group>,
    next_id: u64,
    faults: FaultPlan,
}

/// In-memory Grouping store for tests and local runs.
///
/// Ids are assigned sequentially starting at 1, like the collaborator's
/// auto-increment key.
#[derive(Debug, Clone, Default)]
pub struct InMemoryGroupingClient {
    state: Arc<RwLock<InMemoryGroupingState>>,
}

impl InMemoryGroupingClient {
    pub fn new() -> Self {
        Self::default()
    }

    fn write(&self) -> RwLockWriteGuard<'_, InMemoryGroupingState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stores a group under its own id, replacing any existing record.
    pub fn insert(&self, group: Group) {
        let mut state = self.write();
        if let Ok(numeric) = group.group_id.as_str().parse::<u64>() {
            state.next_id = state.next_id.max(numeric);
        }
        state.groups.insert(group.group_id.clone(), group);
    }

    /// Returns the stored group, bypassing faults and call counts.
    pub fn group(&self, id: &GroupId) -> Option<Group> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .groups
            .get(id)
            .cloned()
    }

    /// Returns all stored groups ordered by id.
    pub fn snapshot(&self) -> Vec<Group> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .groups
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

fn not_found(id: &GroupId) -> ClientError {
    ClientError::NotFound {
        resource: "group",
        id: id.clone(),
    }
}

#[async_trait]
impl GroupingClient for InMemoryGroupingClient {
    async fn get(&self, id: &GroupId) -> Result<Group, ClientError> {
        self.enter(Operation::Get).await?;
        self.group(id).ok_or_else(|| not_found(id))
    }

    async fn create(&self, group: &NewGroup) -> Result<Group, ClientError> {
        self.enter(Operation::Create).await?;
        let mut state = self.write();
        state.next_id += 1;
        let created = Group {
            group_id: GroupId::from(state.next_id),
            no_of_pax: group.no_of_pax,
            description: group.description.clone(),
            status: group.status,
        };
        state
            .groups
            .insert(created.group_id.clone(), created.clone());
        Ok(created)
    }

    async fn update(&self, id: &GroupId, patch: &GroupPatch) -> Result<Group, ClientError> {
        self.enter(Operation::Update).await?;
        let mut state = self.write();
        let group = state.groups.get_mut(id).ok_or_else(|| not_found(id))?;
        patch.apply_to(group);
        Ok(group.clone())
    }

    async fn delete(&self, id: &GroupId) -> Result<(), ClientError> {
        self.enter(Operation::Delete).await?;
        self.write()
            .groups
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| not_found(id))
    }
}
