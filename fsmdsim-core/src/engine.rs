//! Simulation engine - steps a description through cycles.
//!
//! Each cycle runs four phases:
//!
//! 1. stimulus events scheduled for the current cycle write the inputs;
//! 2. every transition of the state the cycle started in is tried in
//!    declaration order, against the environment as left by the transitions
//!    before it; each one whose guard holds runs its instruction and moves
//!    the machine to its next state;
//! 3. the end state, if configured, is compared with the current state;
//! 4. the cycle counter advances and the iteration limit is checked.
//!
//! With [`FiringMode::AllMatches`] the scan in phase 2 does not stop at the
//! first match, so several transitions can fire in one cycle and the last one
//! decides the next state.

use crate::definition::{Definition, State};
use crate::env::{Layered, Store};
use crate::error::CoreError;
use crate::snapshot::{FiredTransition, HaltReason, Snapshot, SnapshotSink, Trace};
use crate::stimulus::Stimulus;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How many matching transitions may fire per cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FiringMode {
    /// Every transition whose guard holds fires, in declaration order.
    #[default]
    AllMatches,
    /// Scanning stops after the first transition that fires.
    FirstMatch,
}

impl FromStr for FiringMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "all_matches" | "all" => Ok(FiringMode::AllMatches),
            "first_match" | "first" => Ok(FiringMode::FirstMatch),
            _ => Err(format!(
                "invalid firing mode '{}', expected all_matches or first_match",
                s
            )),
        }
    }
}

impl fmt::Display for FiringMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FiringMode::AllMatches => f.write_str("all_matches"),
            FiringMode::FirstMatch => f.write_str("first_match"),
        }
    }
}

/// When the end state is compared with the current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndStateCheck {
    /// Each time a transition fires, before it moves the machine. A state
    /// with no firing transition is never detected as the end state.
    #[default]
    PreTransition,
    /// Once per cycle, after all transitions were tried.
    PostCycle,
}

impl FromStr for EndStateCheck {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "pre_transition" | "pre" => Ok(EndStateCheck::PreTransition),
            "post_cycle" | "post" => Ok(EndStateCheck::PostCycle),
            _ => Err(format!(
                "invalid end-state check '{}', expected pre_transition or post_cycle",
                s
            )),
        }
    }
}

impl fmt::Display for EndStateCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EndStateCheck::PreTransition => f.write_str("pre_transition"),
            EndStateCheck::PostCycle => f.write_str("post_cycle"),
        }
    }
}

/// Engine options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SimOptions {
    #[serde(default)]
    pub firing: FiringMode,
    #[serde(default)]
    pub end_check: EndStateCheck,
}

/// Engine lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Running,
    Halted(HaltReason),
    /// An evaluation error stopped the simulation.
    Faulted,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Running => f.write_str("running"),
            Status::Halted(reason) => write!(f, "halted: {}", reason),
            Status::Faulted => f.write_str("faulted"),
        }
    }
}

/// Everything that changes while a simulation runs.
#[derive(Debug, Clone)]
pub struct EngineState {
    /// Index of the next cycle to execute.
    pub cycle: u64,
    pub state: State,
    pub inputs: Store,
    pub variables: Store,
    pub status: Status,
}

impl EngineState {
    /// Zeroed environment in the initial state.
    pub fn new(definition: &Definition) -> Self {
        Self {
            cycle: 0,
            state: definition.initial.clone(),
            inputs: Store::with_names(definition.inputs.iter().cloned()),
            variables: Store::with_names(definition.variables.iter().cloned()),
            status: Status::Running,
        }
    }
}

/// Cycle-stepped interpreter over a loaded description.
pub struct Simulator<'a> {
    definition: &'a Definition,
    stimulus: Option<&'a Stimulus>,
    options: SimOptions,
    iterations: i64,
    machine: EngineState,
}

impl<'a> Simulator<'a> {
    /// Creates a simulator that runs at most `iterations` cycles. A limit of
    /// zero or less halts before the first cycle.
    ///
    /// The stimulus is checked against the description when the description
    /// was loaded strictly.
    pub fn new(
        definition: &'a Definition,
        stimulus: Option<&'a Stimulus>,
        iterations: i64,
    ) -> Result<Self, CoreError> {
        if definition.options.strict {
            if let Some(stimulus) = stimulus {
                stimulus.validate(definition)?;
            }
        }

        let mut machine = EngineState::new(definition);
        if iterations <= 0 {
            machine.status = Status::Halted(HaltReason::IterationLimitReached);
        }

        Ok(Self {
            definition,
            stimulus,
            options: SimOptions::default(),
            iterations,
            machine,
        })
    }

    pub fn with_options(mut self, options: SimOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> SimOptions {
        self.options
    }

    pub fn status(&self) -> Status {
        self.machine.status
    }

    pub fn machine(&self) -> &EngineState {
        &self.machine
    }

    pub fn definition(&self) -> &'a Definition {
        self.definition
    }

    /// The environment before any cycle has run.
    pub fn initial_snapshot(&self) -> Snapshot {
        let halted = match self.machine.status {
            Status::Halted(reason) => Some(reason),
            _ => None,
        };
        Snapshot {
            cycle: self.machine.cycle,
            from_state: self.machine.state.clone(),
            state: self.machine.state.clone(),
            inputs: self.machine.inputs.clone(),
            variables: self.machine.variables.clone(),
            fired: Vec::new(),
            halted,
        }
    }

    /// Executes one cycle. Returns `Ok(None)` once halted.
    ///
    /// An error moves the engine to [`Status::Faulted`]; later calls return
    /// [`CoreError::NotRunning`].
    pub fn step(&mut self) -> Result<Option<Snapshot>, CoreError> {
        match self.machine.status {
            Status::Running => {}
            Status::Halted(_) => return Ok(None),
            Status::Faulted => {
                return Err(CoreError::NotRunning {
                    status: self.machine.status.to_string(),
                })
            }
        }

        match self.run_cycle() {
            Ok(snapshot) => Ok(Some(snapshot)),
            Err(e) => {
                tracing::warn!(
                    "Simulation of {} faulted in cycle {}: {}",
                    self.definition.name,
                    self.machine.cycle,
                    e
                );
                self.machine.status = Status::Faulted;
                Err(e)
            }
        }
    }

    /// Runs until halted, handing each snapshot to `sink`.
    pub fn run<S: SnapshotSink + ?Sized>(&mut self, sink: &mut S) -> Result<HaltReason, CoreError> {
        loop {
            if let Status::Halted(reason) = self.machine.status {
                return Ok(reason);
            }
            if let Some(snapshot) = self.step()? {
                sink.emit(&snapshot);
            }
        }
    }

    fn run_cycle(&mut self) -> Result<Snapshot, CoreError> {
        let definition = self.definition;
        let options = self.options;
        let end_state = self.stimulus.and_then(|s| s.end_state.as_ref());
        let m = &mut self.machine;
        let cycle = m.cycle;

        // Phase 1: stimulus
        if let Some(stimulus) = self.stimulus {
            for event in stimulus.events_at(cycle) {
                event.apply(&mut m.inputs, &m.variables)?;
                tracing::debug!("Cycle {}: set input {}", cycle, event.assignment.source);
            }
        }

        // Phase 2: transitions of the state the cycle started in
        let from_state = m.state.clone();
        let mut fired = Vec::new();
        let mut halt = None;

        for transition in definition.transitions_for(&from_state) {
            let guard = transition.guard(&definition.conditions)?;
            if !guard.evaluate(&Layered::new(&m.inputs, &m.variables))? {
                continue;
            }

            definition
                .operations
                .execute(&transition.instruction, &mut m.variables, &m.inputs)?;

            if options.end_check == EndStateCheck::PreTransition
                && halt.is_none()
                && end_state == Some(&m.state)
            {
                halt = Some(HaltReason::EndStateReached);
            }

            if !definition.has_state(&transition.nextstate) {
                return Err(CoreError::UnknownState {
                    name: transition.nextstate.to_string(),
                });
            }

            tracing::debug!(
                "Cycle {}: ({}) fired, executing {}, next state {}",
                cycle,
                transition.condition,
                transition.instruction,
                transition.nextstate
            );

            m.state = transition.nextstate.clone();
            fired.push(FiredTransition {
                condition: transition.condition.clone(),
                instruction: transition.instruction.clone(),
                nextstate: transition.nextstate.clone(),
            });

            if options.firing == FiringMode::FirstMatch {
                break;
            }
        }

        // Phase 3: end state after the scan
        if options.end_check == EndStateCheck::PostCycle && end_state == Some(&m.state) {
            halt = Some(HaltReason::EndStateReached);
        }

        // Phase 4: cycle accounting
        m.cycle += 1;
        if halt.is_none() && m.cycle as i64 == self.iterations {
            halt = Some(HaltReason::IterationLimitReached);
        }

        if let Some(reason) = halt {
            tracing::info!(
                "Simulation of {} halted after cycle {} in state {}: {}",
                definition.name,
                cycle,
                m.state,
                reason
            );
            m.status = Status::Halted(reason);
        }

        Ok(Snapshot {
            cycle,
            from_state,
            state: m.state.clone(),
            inputs: m.inputs.clone(),
            variables: m.variables.clone(),
            fired,
            halted: halt,
        })
    }
}

/// Runs a description with default options and collects the trace.
pub fn run(
    iterations: i64,
    definition: &Definition,
    stimulus: Option<&Stimulus>,
) -> Result<Trace, CoreError> {
    run_with_options(iterations, definition, stimulus, SimOptions::default())
}

/// Runs a description and collects the trace.
pub fn run_with_options(
    iterations: i64,
    definition: &Definition,
    stimulus: Option<&Stimulus>,
    options: SimOptions,
) -> Result<Trace, CoreError> {
    let mut sim = Simulator::new(definition, stimulus, iterations)?.with_options(options);
    let initial = sim.initial_snapshot();
    let mut snapshots = Vec::new();
    let halt = sim.run(&mut |s: &Snapshot| snapshots.push(s.clone()))?;
    Ok(Trace {
        initial,
        snapshots,
        halt,
    })
}
