//! Per-cycle snapshots of the simulation.

use crate::definition::State;
use crate::env::Store;
use crate::operation::Instruction;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a simulation stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HaltReason {
    /// The configured end state was reached.
    EndStateReached,
    /// The configured number of cycles has run.
    IterationLimitReached,
}

impl fmt::Display for HaltReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HaltReason::EndStateReached => f.write_str("end state reached"),
            HaltReason::IterationLimitReached => f.write_str("iteration limit reached"),
        }
    }
}

/// A transition that fired during a cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FiredTransition {
    pub condition: String,
    pub instruction: Instruction,
    pub nextstate: State,
}

/// Observable record of one cycle.
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    /// Index of the executed cycle, starting at 0.
    pub cycle: u64,

    /// State at the start of the cycle.
    pub from_state: State,

    /// State at the end of the cycle.
    pub state: State,

    /// Input values after stimulus was applied, in declaration order.
    pub inputs: Store,

    /// Variable values at the end of the cycle, in declaration order.
    pub variables: Store,

    /// Transitions that fired, in firing order.
    pub fired: Vec<FiredTransition>,

    /// Set when the engine halted at the end of this cycle.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub halted: Option<HaltReason>,
}

/// Receiver of snapshots as the simulation produces them.
pub trait SnapshotSink {
    fn emit(&mut self, snapshot: &Snapshot);
}

impl<F> SnapshotSink for F
where
    F: FnMut(&Snapshot),
{
    fn emit(&mut self, snapshot: &Snapshot) {
        self(snapshot)
    }
}

/// Every snapshot of a completed simulation.
#[derive(Debug, Clone, Serialize)]
pub struct Trace {
    /// Environment before the first cycle.
    pub initial: Snapshot,

    /// One snapshot per executed cycle.
    pub snapshots: Vec<Snapshot>,

    pub halt: HaltReason,
}

impl Trace {
    /// Number of cycles executed.
    pub fn cycles(&self) -> usize {
        self.snapshots.len()
    }

    /// The last snapshot, or the initial one if no cycle ran.
    pub fn last(&self) -> &Snapshot {
        self.snapshots.last().unwrap_or(&self.initial)
    }
}
