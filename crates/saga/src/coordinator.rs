//! Join coordinator: merges a joining group into a host group's broadcast.

use std::future::Future;
use std::time::Duration;

use common::{Broadcast, BroadcastPatch, Group, GroupId, GroupPatch, NewGroup};
use tracing::Instrument;

use crate::error::{ClientError, JoinError, PartialMergeReport, RestoredRecord};
use crate::locks::HostLocks;
use crate::outcome::{JoinOutcome, JoinRequest};
use crate::reconciler::{Classification, reconcile};
use crate::run::JoinRun;
use crate::services::broadcast::BroadcastClient;
use crate::services::grouping::GroupingClient;
use crate::state::JoinState;
use crate::steps::JoinStep;

/// Tuning for upstream calls made during a join.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinSettings {
    /// Upper bound on any single upstream call.
    pub call_timeout: Duration,
    /// Extra attempts for a read that failed as unavailable.
    pub read_retries: u32,
    /// Total attempts for an absolute-value update in a partial fill.
    pub update_attempts: u32,
}

impl Default for JoinSettings {
    fn default() -> Self {
        Self {
            call_timeout: Duration::from_secs(5),
            read_retries: 1,
            update_attempts: 3,
        }
    }
}

/// Records read before any mutation; compensation restores from these.
struct Snapshot {
    joining: Group,
    host: Group,
    broadcast: Broadcast,
}

/// Orchestrates the join saga across the Grouping and Broadcast stores.
///
/// Runs touching the same groups are serialized; every upstream call is
/// bounded by [`JoinSettings::call_timeout`].
pub struct JoinCoordinator<G, B>
where
    G: GroupingClient,
    B: BroadcastClient,
{
    grouping: G,
    broadcasts: B,
    locks: HostLocks,
    settings: JoinSettings,
}

impl<G, B> JoinCoordinator<G, B>
where
    G: GroupingClient,
    B: BroadcastClient,
{
    /// Creates a coordinator with default settings.
    pub fn new(grouping: G, broadcasts: B) -> Self {
        Self::with_settings(grouping, broadcasts, JoinSettings::default())
    }

    pub fn with_settings(grouping: G, broadcasts: B, settings: JoinSettings) -> Self {
        Self {
            grouping,
            broadcasts,
            locks: HostLocks::new(),
            settings,
        }
    }

    pub fn grouping(&self) -> &G {
        &self.grouping
    }

    pub fn broadcasts(&self) -> &B {
        &self.broadcasts
    }

    pub fn settings(&self) -> JoinSettings {
        self.settings
    }

    /// Merges `request.joining_group_id` into the broadcast of
    /// `request.host_group_id`.
    ///
    /// Rejections are returned as [`JoinOutcome::Rejected`] and never touch
    /// a store. Read failures abort before any mutation. Mutation failures
    /// are reported as [`JoinError::PartialMerge`] or
    /// [`JoinError::InvariantViolation`], never as success.
    pub async fn join(&self, request: JoinRequest) -> Result<JoinOutcome, JoinError> {
        metrics::counter!("join_invocations_total").increment(1);
        let mut run = JoinRun::new(request);
        let span = tracing::info_span!(
            "join",
            run_id = %run.id(),
            joining = %run.request().joining_group_id,
            host = %run.request().host_group_id,
        );

        let result = self.execute(&mut run).instrument(span.clone()).await;

        let duration = run.elapsed().as_secs_f64();
        metrics::histogram!("join_duration_seconds").record(duration);
        span.in_scope(|| match &result {
            Ok(outcome) => {
                metrics::counter!("join_outcomes_total", "outcome" => outcome.kind()).increment(1);
                tracing::info!(outcome = outcome.kind(), state = %run.state(), duration, "join finished");
            }
            Err(err) => {
                metrics::counter!("join_outcomes_total", "outcome" => err.kind()).increment(1);
                if err.needs_reconciliation() {
                    tracing::error!(error = %err, state = %run.state(), duration, "join left stores inconsistent");
                } else {
                    tracing::warn!(error = %err, state = %run.state(), duration, "join failed");
                }
            }
        });
        result
    }

    async fn execute(&self, run: &mut JoinRun) -> Result<JoinOutcome, JoinError> {
        if let Err(err) = run.request().validate() {
            run.advance(JoinState::Failed);
            return Err(err);
        }
        let request = run.request().clone();

        let _guard = self
            .locks
            .acquire(&[&request.host_group_id, &request.joining_group_id])
            .await;

        match self.read_phase(run, &request).await {
            Ok(snapshot) => self.decide(run, snapshot).await,
            Err(err) => {
                run.advance(JoinState::Failed);
                Err(err)
            }
        }
    }

    async fn read_phase(
        &self,
        run: &mut JoinRun,
        request: &JoinRequest,
    ) -> Result<Snapshot, JoinError> {
        run.advance(JoinState::FetchingJoining);
        let joining = self
            .read(JoinStep::FetchJoiningGroup, || {
                self.grouping.get(&request.joining_group_id)
            })
            .await?;
        if joining.no_of_pax == 0 {
            return Err(JoinError::InvariantViolation {
                stage: JoinStep::FetchJoiningGroup,
                field: "no_of_pax",
                detail: format!("joining group {} has no members", joining.group_id),
            });
        }

        run.advance(JoinState::FetchingHost);
        let broadcast = self
            .read(JoinStep::FetchHostBroadcast, || {
                self.broadcasts.get(&request.host_group_id)
            })
            .await?;
        if broadcast.lf_pax == 0 {
            return Err(JoinError::InvariantViolation {
                stage: JoinStep::FetchHostBroadcast,
                field: "lf_pax",
                detail: format!(
                    "broadcast of group {} is open with no capacity",
                    request.host_group_id
                ),
            });
        }

        let host = self
            .read(JoinStep::FetchHostGroup, || {
                self.grouping.get(&request.host_group_id)
            })
            .await?;

        Ok(Snapshot {
            joining,
            host,
            broadcast,
        })
    }

    async fn decide(
        &self,
        run: &mut JoinRun,
        snapshot: Snapshot,
    ) -> Result<JoinOutcome, JoinError> {
        let classification = reconcile(snapshot.broadcast.lf_pax, snapshot.joining.no_of_pax);
        tracing::info!(
            lf_pax = snapshot.broadcast.lf_pax,
            joining_pax = snapshot.joining.no_of_pax,
            %classification,
            "join classified"
        );
        run.classify(classification);

        match classification {
            Classification::Reject { reason } => {
                run.advance(JoinState::Succeeded);
                Ok(JoinOutcome::Rejected {
                    reason: reason.to_string(),
                })
            }
            Classification::PerfectMatch => {
                run.advance(JoinState::Mutating);
                self.merge(run, &snapshot).await
            }
            Classification::PartialMatch { new_lf_pax } => {
                run.advance(JoinState::Mutating);
                self.fill(run, &snapshot, new_lf_pax).await
            }
        }
    }

    /// Perfect match: replace both groups and the broadcast with one
    /// complete group.
    async fn merge(&self, run: &mut JoinRun, snapshot: &Snapshot) -> Result<JoinOutcome, JoinError> {
        let host_id = &snapshot.host.group_id;
        let joining_id = &snapshot.joining.group_id;
        let total = combined_pax(&snapshot.host, &snapshot.joining, JoinStep::CreateMergedGroup)
            .inspect_err(|_| run.advance(JoinState::Failed))?;

        self.delete_step(
            run,
            snapshot,
            JoinStep::DeleteHostBroadcast,
            self.broadcasts.delete(host_id),
        )
        .await?;
        self.delete_step(
            run,
            snapshot,
            JoinStep::DeleteJoiningGroup,
            self.grouping.delete(joining_id),
        )
        .await?;
        self.delete_step(
            run,
            snapshot,
            JoinStep::DeleteHostGroup,
            self.grouping.delete(host_id),
        )
        .await?;

        let merged = match self.bounded(self.grouping.create(&NewGroup::merged(total))).await {
            Ok(group) => group,
            Err(err) => {
                return Err(self
                    .compensate(run, snapshot, JoinStep::CreateMergedGroup, err)
                    .await);
            }
        };
        run.record_step(JoinStep::CreateMergedGroup);
        run.advance(JoinState::Succeeded);

        Ok(JoinOutcome::Merged {
            new_group_id: merged.group_id,
            no_of_pax: merged.no_of_pax,
        })
    }

    /// Runs one deletion of a merge. A record that is already gone counts
    /// as deleted; any other failure stops the merge and compensates.
    async fn delete_step(
        &self,
        run: &mut JoinRun,
        snapshot: &Snapshot,
        step: JoinStep,
        call: impl Future<Output = Result<(), ClientError>>,
    ) -> Result<(), JoinError> {
        match self.bounded(call).await {
            Ok(()) => {}
            Err(err) if err.is_not_found() => {
                tracing::warn!(%step, "record already absent, treating as deleted");
            }
            Err(err) => return Err(self.compensate(run, snapshot, step, err).await),
        }
        run.record_step(step);
        Ok(())
    }

    /// Re-creates whatever the merge deleted, newest first, and reports
    /// what was and was not restored.
    async fn compensate(
        &self,
        run: &mut JoinRun,
        snapshot: &Snapshot,
        failed_step: JoinStep,
        cause: ClientError,
    ) -> JoinError {
        metrics::counter!("join_compensations_total").increment(1);
        tracing::warn!(%failed_step, error = %cause, completed = ?run.completed_steps(), "merge failed, compensating");

        let mut restored = Vec::new();
        let mut unrestored = Vec::new();
        // The broadcast follows the host group to its new id.
        let mut host_id: Option<GroupId> = Some(snapshot.host.group_id.clone());

        for &step in run.completed_steps().iter().rev() {
            let result = match step {
                JoinStep::DeleteHostGroup => {
                    let result = self
                        .bounded(self.grouping.create(&snapshot.host.to_new_group()))
                        .await
                        .map(|group| group.group_id);
                    host_id = result.as_ref().ok().cloned();
                    result
                }
                JoinStep::DeleteJoiningGroup => self
                    .bounded(self.grouping.create(&snapshot.joining.to_new_group()))
                    .await
                    .map(|group| group.group_id),
                JoinStep::DeleteHostBroadcast => match &host_id {
                    Some(id) => self
                        .bounded(
                            self.broadcasts
                                .create(id, &snapshot.broadcast.to_new_broadcast()),
                        )
                        .await
                        .map(|broadcast| broadcast.grouping_id),
                    None => Err(ClientError::NotFound {
                        resource: "group",
                        id: snapshot.host.group_id.clone(),
                    }),
                },
                _ => continue,
            };

            match result {
                Ok(group_id) => {
                    tracing::info!(undone = %step, %group_id, "record restored");
                    restored.push(RestoredRecord {
                        undone: step,
                        group_id,
                    });
                }
                Err(err) => {
                    tracing::error!(undone = %step, error = %err, "record could not be restored");
                    unrestored.push(step);
                }
            }
        }

        let report = PartialMergeReport {
            failed_step,
            cause: cause.to_string(),
            completed_steps: run.completed_steps().to_vec(),
            restored,
            unrestored,
        };
        run.advance(if report.fully_restored() {
            JoinState::Failed
        } else {
            JoinState::PartiallyApplied
        });
        JoinError::PartialMerge(Box::new(report))
    }

    /// Partial match: grow the host group, then shrink its broadcast.
    async fn fill(
        &self,
        run: &mut JoinRun,
        snapshot: &Snapshot,
        new_lf_pax: u32,
    ) -> Result<JoinOutcome, JoinError> {
        let host_id = &snapshot.host.group_id;
        let host_pax = combined_pax(&snapshot.host, &snapshot.joining, JoinStep::UpdateHostGroup)
            .inspect_err(|_| run.advance(JoinState::Failed))?;

        let group_patch = GroupPatch::pax(host_pax);
        if let Err(err) = self
            .apply_update(JoinStep::UpdateHostGroup, || {
                self.grouping.update(host_id, &group_patch)
            })
            .await
        {
            // A timed-out update may still have been applied upstream.
            let maybe_applied = err.is_unavailable();
            run.advance(if maybe_applied {
                JoinState::PartiallyApplied
            } else {
                JoinState::Failed
            });
            return Err(JoinError::InvariantViolation {
                stage: JoinStep::UpdateHostGroup,
                field: "no_of_pax",
                detail: format!(
                    "host group {host_id} not updated to {host_pax} (may have applied: {maybe_applied}): {err}"
                ),
            });
        }
        run.record_step(JoinStep::UpdateHostGroup);

        let broadcast_patch = BroadcastPatch { lf_pax: new_lf_pax };
        if let Err(err) = self
            .apply_update(JoinStep::UpdateHostBroadcast, || {
                self.broadcasts.update(host_id, &broadcast_patch)
            })
            .await
        {
            run.advance(JoinState::PartiallyApplied);
            return Err(JoinError::InvariantViolation {
                stage: JoinStep::UpdateHostBroadcast,
                field: "lf_pax",
                detail: format!(
                    "host group {host_id} has {host_pax} pax but its broadcast was not set to {new_lf_pax}: {err}"
                ),
            });
        }
        run.record_step(JoinStep::UpdateHostBroadcast);
        run.advance(JoinState::Succeeded);

        Ok(JoinOutcome::PartiallyFilled {
            host_group_id: host_id.clone(),
            new_lf_pax,
            host_no_of_pax: host_pax,
        })
    }

    /// Bounds one upstream call by the configured timeout.
    async fn bounded<T>(
        &self,
        call: impl Future<Output = Result<T, ClientError>>,
    ) -> Result<T, ClientError> {
        tokio::time::timeout(self.settings.call_timeout, call)
            .await
            .unwrap_or_else(|_| Err(ClientError::timeout()))
    }

    /// Reads with a bounded retry on unavailability.
    async fn read<T, F, Fut>(&self, stage: JoinStep, mut call: F) -> Result<T, JoinError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ClientError>>,
    {
        let mut attempt = 0;
        loop {
            match self.bounded(call()).await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_unavailable() && attempt < self.settings.read_retries => {
                    attempt += 1;
                    tracing::warn!(%stage, attempt, error = %err, "read unavailable, retrying");
                }
                Err(err) => return Err(JoinError::from_client(stage, err)),
            }
        }
    }

    /// Applies an absolute-value update, retrying while unavailable.
    async fn apply_update<T, F, Fut>(&self, stage: JoinStep, mut call: F) -> Result<T, ClientError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ClientError>>,
    {
        let attempts = self.settings.update_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.bounded(call()).await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_unavailable() && attempt < attempts => {
                    tracing::warn!(%stage, attempt, error = %err, "update unavailable, retrying");
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

/// Pax of the host after taking in the joining group.
///
/// Counted from the host group's own `no_of_pax` (read in `FetchHostGroup`)
/// rather than from the broadcast's `lf_pax`, so a merged group is always
/// the sum of the two groups it replaces. DESIGN.md records this choice.
fn combined_pax(host: &Group, joining: &Group, stage: JoinStep) -> Result<u32, JoinError> {
    host.no_of_pax
        .checked_add(joining.no_of_pax)
        .ok_or_else(|| JoinError::InvariantViolation {
            stage,
            field: "no_of_pax",
            detail: format!(
                "combined pax of groups {} and {} overflows",
                host.group_id, joining.group_id
            ),
        })
}
