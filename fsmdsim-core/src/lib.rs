//! # fsmdsim-core
//!
//! Execution engine for FSMD (finite-state machine with datapath)
//! descriptions.
//!
//! This crate provides:
//! - Expression parsing and evaluation
//! - Named conditions with nested expansion
//! - Named assignment operations and instructions
//! - Description and stimulus loading and validation
//! - The cycle-stepped simulation engine

pub mod condition;
pub mod definition;
pub mod document;
pub mod engine;
pub mod env;
pub mod error;
pub mod expr;
pub mod operation;
pub mod snapshot;
pub mod stimulus;
mod xml;

pub use condition::{ConditionRegistry, Guard};
pub use definition::{Definition, DescriptionRaw, LoadOptions, State, Transition, TransitionTable};
pub use document::{load_description, load_stimulus, Format};
pub use engine::{
    run, run_with_options, EndStateCheck, EngineState, FiringMode, SimOptions, Simulator, Status,
};
pub use env::{Number, Scope, Store};
pub use error::{CoreError, ExprError};
pub use expr::{Expr, Value};
pub use operation::{Assignment, Instruction, OperationRegistry};
pub use snapshot::{FiredTransition, HaltReason, Snapshot, SnapshotSink, Trace};
pub use stimulus::{SetInput, Stimulus, StimulusRaw};
