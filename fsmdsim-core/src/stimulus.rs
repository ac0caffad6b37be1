//! Stimulus schedule: timed input assignments and an optional end state.
//!
//! ```yaml
//! setinput:
//!   - { cycle: 0, expression: "in_A = 12" }
//!   - { cycle: 0, expression: "in_B = 8" }
//! endstate: FINISH
//! ```

use crate::definition::{one_or_many, Definition, State};
use crate::env::{Layered, Store};
use crate::error::CoreError;
use crate::operation::Assignment;
use serde::{Deserialize, Serialize};

/// A `setinput` entry as written in the document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SetInputRaw {
    /// Kept untyped so a malformed cycle can be skipped instead of failing
    /// the whole document.
    #[serde(default)]
    pub cycle: serde_json::Value,

    #[serde(default)]
    pub expression: Option<String>,
}

/// Raw stimulus as read from a document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StimulusRaw {
    #[serde(default, deserialize_with = "one_or_many")]
    pub setinput: Vec<SetInputRaw>,

    #[serde(default)]
    pub endstate: Option<String>,
}

/// One scheduled input assignment.
#[derive(Debug, Clone)]
pub struct SetInput {
    pub cycle: u64,
    pub assignment: Assignment,
}

impl SetInput {
    /// Evaluates the assignment against inputs and variables and writes the
    /// result into `inputs`.
    pub fn apply(&self, inputs: &mut Store, variables: &Store) -> Result<(), CoreError> {
        let value = self.assignment.evaluate(&Layered::new(inputs, variables))?;
        if inputs.set(&self.assignment.target, value) {
            Ok(())
        } else {
            Err(CoreError::UnknownInput {
                name: self.assignment.target.clone(),
            })
        }
    }
}

/// A validated stimulus schedule. Events keep their declaration order.
#[derive(Debug, Clone, Default)]
pub struct Stimulus {
    events: Vec<SetInput>,
    pub end_state: Option<State>,
}

impl Stimulus {
    /// An empty schedule: no events, no end state.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json_str(text: &str) -> Result<Self, CoreError> {
        let raw: StimulusRaw = serde_json::from_str(text)?;
        Self::from_raw(raw)
    }

    pub fn from_yaml_str(text: &str) -> Result<Self, CoreError> {
        let raw: StimulusRaw = serde_yaml::from_str(text)?;
        Self::from_raw(raw)
    }

    /// Parses an `fsmdstimulus` XML document.
    pub fn from_xml_str(text: &str) -> Result<Self, CoreError> {
        Self::from_raw(crate::xml::stimulus_from_str(text)?)
    }

    /// Builds a schedule from raw entries. Entries with a missing or
    /// malformed cycle, or without an expression, are skipped with a
    /// warning. An expression that does not parse is an error.
    pub fn from_raw(raw: StimulusRaw) -> Result<Self, CoreError> {
        let mut events = Vec::with_capacity(raw.setinput.len());
        for (i, entry) in raw.setinput.iter().enumerate() {
            let Some(cycle) = parse_cycle(&entry.cycle) else {
                tracing::warn!("Skipping setinput {}: malformed cycle {}", i, entry.cycle);
                continue;
            };
            let Some(expression) = entry.expression.as_deref() else {
                tracing::warn!("Skipping setinput {}: no expression", i);
                continue;
            };
            let assignment = Assignment::parse(expression).map_err(|e| CoreError::InvalidStimulus {
                reason: format!("setinput {}: {}", i, e),
            })?;
            events.push(SetInput { cycle, assignment });
        }

        Ok(Self {
            events,
            end_state: raw.endstate.map(State),
        })
    }

    /// Schedules `expression` at `cycle`, after any events already there.
    pub fn push(&mut self, cycle: u64, expression: &str) -> Result<(), CoreError> {
        let assignment = Assignment::parse(expression)?;
        self.events.push(SetInput { cycle, assignment });
        Ok(())
    }

    pub fn with_end_state(mut self, state: impl Into<State>) -> Self {
        self.end_state = Some(state.into());
        self
    }

    pub fn events(&self) -> &[SetInput] {
        &self.events
    }

    /// Events scheduled for `cycle`, in declaration order.
    pub fn events_at(&self, cycle: u64) -> impl Iterator<Item = &SetInput> {
        self.events.iter().filter(move |e| e.cycle == cycle)
    }

    /// Checks every target and identifier against a description.
    pub fn validate(&self, definition: &Definition) -> Result<(), CoreError> {
        let declared = |n: &str| definition.inputs.iter().chain(&definition.variables).any(|d| d == n);

        for event in &self.events {
            let a = &event.assignment;
            if !definition.inputs.iter().any(|i| *i == a.target) {
                return Err(CoreError::InvalidStimulus {
                    reason: format!("'{}' assigns '{}', which is not a declared input", a.source, a.target),
                });
            }
            if let Some(ident) = a.expr.identifiers().into_iter().find(|i| !declared(*i)) {
                return Err(CoreError::InvalidStimulus {
                    reason: format!("'{}' reads undeclared identifier '{}'", a.source, ident),
                });
            }
        }

        if let Some(end) = &self.end_state {
            if !definition.has_state(end) {
                return Err(CoreError::InvalidStimulus {
                    reason: format!("end state '{}' not in states list", end),
                });
            }
        }

        Ok(())
    }
}

/// Accepts non-negative integers, integral reals and numeric strings.
fn parse_cycle(value: &serde_json::Value) -> Option<u64> {
    match value {
        serde_json::Value::Number(n) => n.as_u64().or_else(|| {
            n.as_f64()
                .filter(|f| *f >= 0.0 && f.fract() == 0.0 && *f <= u64::MAX as f64)
                .map(|f| f as u64)
        }),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::LoadOptions;
    use crate::env::Number;
    use serde_json::json;

    #[test]
    fn test_parse_stimulus() {
        let stim = Stimulus::from_yaml_str(
            r#"
setinput:
  - { cycle: 0, expression: "in_A = 12" }
  - { cycle: 2, expression: "in_B = in_A + 1" }
endstate: FINISH
"#,
        )
        .unwrap();

        assert_eq!(stim.events().len(), 2);
        assert_eq!(stim.events_at(2).count(), 1);
        assert_eq!(stim.events_at(1).count(), 0);
        assert_eq!(stim.end_state, Some(State::from("FINISH")));
    }

    #[test]
    fn test_single_entry_and_string_cycle() {
        let stim = Stimulus::from_json_str(r#"{"setinput": {"cycle": "3", "expression": "x = 1"}}"#).unwrap();
        assert_eq!(stim.events().len(), 1);
        assert_eq!(stim.events()[0].cycle, 3);
        assert_eq!(stim.end_state, None);
    }

    #[test]
    fn test_absent_fields_mean_no_stimulus() {
        let stim = Stimulus::from_yaml_str("{}").unwrap();
        assert!(stim.events().is_empty());
        assert!(stim.end_state.is_none());

        let stim = Stimulus::from_yaml_str("setinput:\nendstate:\n").unwrap();
        assert!(stim.events().is_empty());
        assert!(stim.end_state.is_none());
    }

    #[test]
    fn test_malformed_cycles_are_skipped() {
        let raw: StimulusRaw = serde_json::from_value(json!({
            "setinput": [
                {"cycle": -1, "expression": "x = 1"},
                {"cycle": "soon", "expression": "x = 2"},
                {"expression": "x = 3"},
                {"cycle": 1.5, "expression": "x = 4"},
                {"cycle": 4.0, "expression": "x = 5"},
                {"cycle": 1},
                {"cycle": 2, "expression": "x = 6"}
            ]
        }))
        .unwrap();
        let stim = Stimulus::from_raw(raw).unwrap();
        let cycles: Vec<u64> = stim.events().iter().map(|e| e.cycle).collect();
        assert_eq!(cycles, vec![4, 2]);
    }

    #[test]
    fn test_bad_expression_is_an_error() {
        let err = Stimulus::from_json_str(r#"{"setinput": [{"cycle": 0, "expression": "x + 1"}]}"#).unwrap_err();
        assert!(matches!(err, CoreError::InvalidStimulus { .. }));
    }

    #[test]
    fn test_apply_writes_inputs() {
        let mut stim = Stimulus::new();
        stim.push(0, "in1 = v * 2 + 1").unwrap();
        let mut inputs = Store::with_names(["in1"]);
        let mut vars = Store::with_names(["v"]);
        vars.set("v", Number::Int(3));

        for event in stim.events_at(0) {
            event.apply(&mut inputs, &vars).unwrap();
        }
        assert_eq!(inputs.get("in1"), Some(Number::Int(7)));
    }

    #[test]
    fn test_apply_unknown_input() {
        let mut stim = Stimulus::new();
        stim.push(0, "v = 1").unwrap();
        let mut inputs = Store::with_names(["in1"]);
        let vars = Store::with_names(["v"]);
        let err = stim.events()[0].apply(&mut inputs, &vars).unwrap_err();
        assert!(matches!(err, CoreError::UnknownInput { ref name } if name == "v"));
    }

    #[test]
    fn test_validate_against_definition() {
        let def = Definition::from_json(
            "t",
            &json!({"states": ["A"], "initial": "A", "inputs": ["i"], "variables": ["v"]}),
            LoadOptions::default(),
        )
        .unwrap();

        let mut ok = Stimulus::new().with_end_state("A");
        ok.push(1, "i = v + 1").unwrap();
        assert!(ok.validate(&def).is_ok());

        let mut to_variable = Stimulus::new();
        to_variable.push(0, "v = 1").unwrap();
        assert!(to_variable.validate(&def).is_err());

        let mut unknown_read = Stimulus::new();
        unknown_read.push(0, "i = w").unwrap();
        assert!(unknown_read.validate(&def).is_err());

        assert!(Stimulus::new().with_end_state("Z").validate(&def).is_err());
    }
}
