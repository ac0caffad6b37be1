//! Trace rendering.

use colored::Colorize;
use fsmdsim_core::{CoreError, Definition, HaltReason, Snapshot, Store};
use serde_json::json;
use std::io::{self, Write};

/// Receives the simulation as it progresses.
pub trait Renderer {
    /// Called once, before the simulation, when a summary is wanted.
    fn description(&mut self, definition: &Definition) -> io::Result<()>;

    /// Called once with the environment before the first cycle.
    fn start(&mut self, initial: &Snapshot) -> io::Result<()>;

    /// Called after every executed cycle.
    fn cycle(&mut self, snapshot: &Snapshot) -> io::Result<()>;

    /// Called once when the simulation stops.
    fn finish(&mut self, outcome: Result<HaltReason, &CoreError>) -> io::Result<()>;
}

const RULE: &str = "-------------------------------------------------------------------";

/// Human-readable progress log.
pub struct TextRenderer<W: Write> {
    out: W,
}

impl<W: Write> TextRenderer<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out
    }

    fn values(&mut self, title: &str, store: &Store) -> io::Result<()> {
        writeln!(self.out, "{}", title.bold())?;
        for (name, value) in store.iter() {
            writeln!(self.out, "  {} = {}", name.cyan(), value)?;
        }
        Ok(())
    }
}

impl<W: Write> Renderer for TextRenderer<W> {
    fn description(&mut self, def: &Definition) -> io::Result<()> {
        writeln!(
            self.out,
            "{}",
            format!("FSMD description {} (checksum: {})", def.name.cyan(), def.checksum).bold()
        )?;

        writeln!(self.out, "States:")?;
        for state in &def.states {
            writeln!(self.out, "  {}", state)?;
        }
        writeln!(self.out, "Initial state:")?;
        writeln!(self.out, "  {}", def.initial.as_str().yellow())?;

        writeln!(self.out, "Inputs:")?;
        for input in &def.inputs {
            writeln!(self.out, "  {}", input)?;
        }
        writeln!(self.out, "Variables:")?;
        for variable in &def.variables {
            writeln!(self.out, "  {}", variable)?;
        }

        writeln!(self.out, "Operations:")?;
        for (name, op) in def.operations.iter() {
            writeln!(self.out, "  {} : {}", name.cyan(), op.source)?;
        }
        writeln!(self.out, "Conditions:")?;
        for (name, expr) in def.conditions.iter() {
            writeln!(self.out, "  {} : {}", name.cyan(), expr)?;
        }

        writeln!(self.out, "FSMD transitions table:")?;
        for state in &def.states {
            let transitions = def.transitions_for(state);
            if transitions.is_empty() {
                continue;
            }
            writeln!(self.out, "  {}", state)?;
            for t in transitions {
                writeln!(
                    self.out,
                    "    nextstate: {}, condition: {}, instruction: {}",
                    t.nextstate, t.condition, t.instruction
                )?;
            }
        }
        writeln!(self.out)
    }

    fn start(&mut self, initial: &Snapshot) -> io::Result<()> {
        writeln!(self.out, "{}", "---Start simulation---".bold())?;
        self.values("Variables:", &initial.variables)?;
        writeln!(self.out, "Status: {}", initial.state.as_str().yellow())?;
        writeln!(self.out, "{}", RULE)
    }

    fn cycle(&mut self, snap: &Snapshot) -> io::Result<()> {
        writeln!(self.out, "Cycle = {}", snap.cycle.to_string().bold())?;
        writeln!(self.out, "Current state = {}", snap.from_state.as_str().yellow())?;
        if !snap.inputs.is_empty() {
            self.values("Inputs:", &snap.inputs)?;
        }

        for fired in &snap.fired {
            writeln!(self.out, "The condition ({}) is {}.", fired.condition, "true".green())?;
            writeln!(self.out, "Executing instruction = {}", fired.instruction)?;
            writeln!(self.out, "Next state = {}", fired.nextstate.as_str().yellow())?;
        }

        writeln!(
            self.out,
            "At the end of the cycle {} execution, the status is:",
            snap.cycle
        )?;
        self.values("Variables:", &snap.variables)?;
        writeln!(self.out, "{}", RULE)
    }

    fn finish(&mut self, outcome: Result<HaltReason, &CoreError>) -> io::Result<()> {
        match outcome {
            Ok(HaltReason::EndStateReached) => writeln!(self.out, "{}", "End-state reached.".green())?,
            Ok(HaltReason::IterationLimitReached) => {
                writeln!(self.out, "{}", "Iteration limit reached.".green())?
            }
            Err(e) => writeln!(
                self.out,
                "{} [{}] {}",
                "Simulation halted:".red().bold(),
                e.error_code(),
                e
            )?,
        }
        writeln!(self.out, "End of simulation.")
    }
}

/// One JSON object per line: a `description`, a `start`, one `cycle` per
/// snapshot, then `halt` or `error`.
pub struct JsonRenderer<W: Write> {
    out: W,
}

impl<W: Write> JsonRenderer<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out
    }

    fn line(&mut self, value: serde_json::Value) -> io::Result<()> {
        serde_json::to_writer(&mut self.out, &value)?;
        writeln!(self.out)
    }
}

impl<W: Write> Renderer for JsonRenderer<W> {
    fn description(&mut self, def: &Definition) -> io::Result<()> {
        self.line(json!({
            "event": "description",
            "name": def.name,
            "checksum": def.checksum,
            "description": def.raw,
        }))
    }

    fn start(&mut self, initial: &Snapshot) -> io::Result<()> {
        self.line(json!({"event": "start", "snapshot": initial}))
    }

    fn cycle(&mut self, snapshot: &Snapshot) -> io::Result<()> {
        self.line(json!({"event": "cycle", "snapshot": snapshot}))
    }

    fn finish(&mut self, outcome: Result<HaltReason, &CoreError>) -> io::Result<()> {
        match outcome {
            Ok(reason) => self.line(json!({"event": "halt", "reason": reason})),
            Err(e) => self.line(json!({
                "event": "error",
                "code": e.error_code(),
                "message": e.to_string(),
            })),
        }
    }
}
