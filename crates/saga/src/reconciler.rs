//! Capacity reconciliation between a broadcast and a joining group.

use serde::Serialize;

/// Reason given when a joining group does not fit.
pub const CAPACITY_EXCEEDED: &str = "capacity exceeded";

/// How a joining group fits into a host group's outstanding capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Classification {
    /// The joining group is larger than the remaining capacity.
    Reject { reason: &'static str },

    /// The joining group fills the remaining capacity exactly.
    PerfectMatch,

    /// Capacity remains after the joining group is admitted.
    PartialMatch { new_lf_pax: u32 },
}

impl Classification {
    /// Returns the classification name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Classification::Reject { .. } => "reject",
            Classification::PerfectMatch => "perfect_match",
            Classification::PartialMatch { .. } => "partial_match",
        }
    }
}

impl std::fmt::Display for Classification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Classifies a join from the host's outstanding capacity and the joining pax.
pub fn reconcile(lf_pax: u32, no_of_pax_joining: u32) -> Classification {
    match lf_pax.checked_sub(no_of_pax_joining) {
        None => Classification::Reject {
            reason: CAPACITY_EXCEEDED,
        },
        Some(0) => Classification::PerfectMatch,
        Some(new_lf_pax) => Classification::PartialMatch { new_lf_pax },
    }
}
