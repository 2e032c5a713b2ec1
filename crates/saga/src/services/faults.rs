//! Fault injection shared by the in-memory clients.

use std::collections::HashMap;
use std::time::Duration;

use crate::error::ClientError;

/// A client operation that faults and latency can be attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Get,
    List,
    Create,
    Update,
    Delete,
}

#[derive(Debug, Clone)]
struct Fault {
    error: ClientError,
    /// `None` fails every call.
    remaining: Option<u32>,
}

/// Scripted failures, delays and call counts for one in-memory client.
#[derive(Debug, Default)]
pub(crate) struct FaultPlan {
    faults: HashMap<Operation, Fault>,
    delays: HashMap<Operation, Duration>,
    calls: HashMap<Operation, usize>,
}

impl FaultPlan {
    pub(crate) fn fail(&mut self, op: Operation, error: ClientError) {
        self.faults.insert(
            op,
            Fault {
                error,
                remaining: None,
            },
        );
    }

    pub(crate) fn fail_times(&mut self, op: Operation, error: ClientError, times: u32) {
        self.faults.insert(
            op,
            Fault {
                error,
                remaining: Some(times),
            },
        );
    }

    pub(crate) fn delay(&mut self, op: Operation, delay: Duration) {
        self.delays.insert(op, delay);
    }

    pub(crate) fn clear(&mut self) {
        self.faults.clear();
        self.delays.clear();
    }

    pub(crate) fn delay_for(&self, op: Operation) -> Option<Duration> {
        self.delays.get(&op).copied()
    }

    pub(crate) fn calls(&self, op: Operation) -> usize {
        self.calls.get(&op).copied().unwrap_or(0)
    }

    /// Counts the call and returns the scripted error, if any.
    pub(crate) fn on_call(&mut self, op: Operation) -> Result<(), ClientError> {
        *self.calls.entry(op).or_default() += 1;

        let Some(fault) = self.faults.get_mut(&op) else {
            return Ok(());
        };
        match fault.remaining {
            None => Err(fault.error.clone()),
            Some(0) => {
                self.faults.remove(&op);
                Ok(())
            }
            Some(n) => {
                fault.remaining = Some(n - 1);
                Err(fault.error.clone())
            }
        }
    }
}
