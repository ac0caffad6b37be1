//! FSMD description types and the transition table.
//!
//! Descriptions use a JSON, YAML or XML document. The JSON and YAML form:
//!
//! ```yaml
//! states: [INIT, TEST, SUB_A, SUB_B, FINISH]
//! initial: INIT
//! inputs: [in_A, in_B]
//! variables: [var_A, var_B]
//! operations:
//!   - { name: init_A, expression: "var_A = in_A" }
//!   - { name: init_B, expression: "var_B = in_B" }
//!   - { name: A_minus_B, expression: "var_A = var_A - var_B" }
//!   - { name: B_minus_A, expression: "var_B = var_B - var_A" }
//! conditions:
//!   - { name: A_gt_B, expression: "var_A > var_B" }
//!   - { name: A_lt_B, expression: "var_A < var_B" }
//!   - { name: A_eq_B, expression: "var_A == var_B" }
//! fsmd:
//!   INIT:
//!     - { condition: true, instruction: "init_A init_B", nextstate: TEST }
//!   TEST:
//!     - { condition: A_gt_B, instruction: NOP, nextstate: SUB_A }
//!     - { condition: A_lt_B, instruction: NOP, nextstate: SUB_B }
//!     - { condition: A_eq_B, instruction: NOP, nextstate: FINISH }
//!   SUB_A:
//!     - { condition: true, instruction: A_minus_B, nextstate: TEST }
//!   SUB_B:
//!     - { condition: true, instruction: B_minus_A, nextstate: TEST }
//!   FINISH:
//!     - { condition: true, instruction: NOP, nextstate: FINISH }
//! ```
//!
//! Every list field also accepts a single element in place of a list.

use crate::condition::{ConditionRegistry, Guard};
use crate::error::CoreError;
use crate::operation::{is_nop, Instruction, OperationRegistry};
use serde::{Deserialize, Deserializer, Serialize};
use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

/// A state in the machine.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct State(pub String);

impl State {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for State {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for State {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A `name` / `expression` pair, used for operations and conditions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedExpression {
    pub name: String,
    pub expression: String,
}

/// A transition as written in the document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionRaw {
    /// Condition name, literal or raw boolean expression.
    #[serde(deserialize_with = "deserialize_condition")]
    pub condition: String,

    /// Operation names, as a space-separated string or a list.
    #[serde(default, deserialize_with = "deserialize_instruction")]
    pub instruction: Instruction,

    pub nextstate: String,
}

/// Accepts one element or a list of elements; `null` is an empty list.
pub(crate) fn one_or_many<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany<T> {
        Many(Vec<T>),
        One(T),
    }

    Ok(match Option::<OneOrMany<T>>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(OneOrMany::Many(items)) => items,
        Some(OneOrMany::One(item)) => vec![item],
    })
}

fn deserialize_condition<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::{self, Visitor};

    struct ConditionVisitor;

    impl<'de> Visitor<'de> for ConditionVisitor {
        type Value = String;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a condition string, boolean or number")
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
            Ok(v.to_string())
        }

        fn visit_bool<E: de::Error>(self, v: bool) -> Result<Self::Value, E> {
            Ok(v.to_string())
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
            Ok(v.to_string())
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
            Ok(v.to_string())
        }

        // `1.0` prints as `1`, so integral reals still hit the literal guards.
        fn visit_f64<E: de::Error>(self, v: f64) -> Result<Self::Value, E> {
            Ok(v.to_string())
        }
    }

    deserializer.deserialize_any(ConditionVisitor)
}

fn deserialize_instruction<'de, D>(deserializer: D) -> Result<Instruction, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::{self, Visitor};

    struct InstructionVisitor;

    impl<'de> Visitor<'de> for InstructionVisitor {
        type Value = Instruction;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a string or array of operation names")
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
            Ok(Instruction::parse(v))
        }

        fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
            Ok(Instruction::default())
        }

        fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
            Ok(Instruction::default())
        }

        fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
        where
            A: de::SeqAccess<'de>,
        {
            let mut ops = Vec::new();
            while let Some(s) = seq.next_element::<String>()? {
                ops.extend(s.split_whitespace().map(str::to_string));
            }
            Ok(Instruction(ops))
        }
    }

    deserializer.deserialize_any(InstructionVisitor)
}

/// Raw description as read from a document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DescriptionRaw {
    /// All valid states, in declaration order.
    #[serde(deserialize_with = "one_or_many")]
    pub states: Vec<String>,

    /// Initial state.
    pub initial: String,

    #[serde(default, deserialize_with = "one_or_many")]
    pub inputs: Vec<String>,

    #[serde(default, deserialize_with = "one_or_many")]
    pub variables: Vec<String>,

    #[serde(default, deserialize_with = "one_or_many")]
    pub operations: Vec<NamedExpression>,

    #[serde(default, deserialize_with = "one_or_many")]
    pub conditions: Vec<NamedExpression>,

    /// Transitions per source state, in declaration order.
    #[serde(default)]
    pub fsmd: BTreeMap<String, OneOrManyTransitions>,
}

/// The transition list of one state. A single transition may be written
/// without the surrounding list.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct OneOrManyTransitions(pub Vec<TransitionRaw>);

impl<'de> Deserialize<'de> for OneOrManyTransitions {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        one_or_many(deserializer).map(Self)
    }
}

/// Options applied while loading a description.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadOptions {
    /// Check every reference at load time. When false, unresolved names are
    /// left for the simulation to report when it reaches them.
    pub strict: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self { strict: true }
    }
}

impl LoadOptions {
    pub fn lenient() -> Self {
        Self { strict: false }
    }
}

/// A transition of the table.
#[derive(Debug, Clone)]
pub struct Transition {
    pub condition: String,
    pub instruction: Instruction,
    pub nextstate: State,
    /// Compiled guard. `None` when compilation failed during a lenient load;
    /// the failure is reproduced when the transition is evaluated.
    guard: Option<Guard>,
}

impl Transition {
    /// Returns the compiled guard, compiling on demand if needed.
    pub fn guard<'a>(&'a self, conditions: &ConditionRegistry) -> Result<Cow<'a, Guard>, CoreError> {
        match &self.guard {
            Some(guard) => Ok(Cow::Borrowed(guard)),
            None => conditions.compile(&self.condition).map(Cow::Owned),
        }
    }
}

/// Per-state ordered transitions. Fixed once loaded.
#[derive(Debug, Clone, Default)]
pub struct TransitionTable {
    by_state: HashMap<State, Vec<Transition>>,
}

impl TransitionTable {
    /// Transitions leaving `state`, in declaration order.
    pub fn transitions_for(&self, state: &State) -> &[Transition] {
        self.by_state.get(state).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.by_state.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Validated and indexed FSMD description.
#[derive(Debug, Clone)]
pub struct Definition {
    /// Description name, usually the document's file stem.
    pub name: String,

    /// All valid states, in declaration order.
    pub states: Vec<State>,

    state_set: HashSet<State>,

    /// Initial state.
    pub initial: State,

    /// Input names, in declaration order.
    pub inputs: Vec<String>,

    /// Variable names, in declaration order.
    pub variables: Vec<String>,

    pub operations: OperationRegistry,

    pub conditions: ConditionRegistry,

    table: TransitionTable,

    /// Options the description was loaded with.
    pub options: LoadOptions,

    /// Raw description as loaded.
    pub raw: DescriptionRaw,

    /// Hash of the description for integrity checks.
    pub checksum: String,
}

impl Definition {
    /// Parses and validates a description from a JSON value.
    pub fn from_json(
        name: impl Into<String>,
        json: &serde_json::Value,
        options: LoadOptions,
    ) -> Result<Self, CoreError> {
        let raw: DescriptionRaw = serde_json::from_value(json.clone())?;
        Self::from_raw(name, raw, options)
    }

    /// Parses and validates a description from JSON text.
    pub fn from_json_str(
        name: impl Into<String>,
        text: &str,
        options: LoadOptions,
    ) -> Result<Self, CoreError> {
        let raw: DescriptionRaw = serde_json::from_str(text)?;
        Self::from_raw(name, raw, options)
    }

    /// Parses and validates a description from YAML text.
    pub fn from_yaml_str(
        name: impl Into<String>,
        text: &str,
        options: LoadOptions,
    ) -> Result<Self, CoreError> {
        let raw: DescriptionRaw = serde_yaml::from_str(text)?;
        Self::from_raw(name, raw, options)
    }

    /// Parses and validates a description from an `fsmddescription` XML
    /// document.
    pub fn from_xml_str(
        name: impl Into<String>,
        text: &str,
        options: LoadOptions,
    ) -> Result<Self, CoreError> {
        let raw = crate::xml::description_from_str(text)?;
        Self::from_raw(name, raw, options)
    }

    /// Builds a description from raw parts.
    pub fn from_raw(
        name: impl Into<String>,
        raw: DescriptionRaw,
        options: LoadOptions,
    ) -> Result<Self, CoreError> {
        let name = name.into();

        // Build state set
        let states: Vec<State> = raw.states.iter().map(|s| State(s.clone())).collect();
        let mut state_set = HashSet::new();
        for state in &states {
            if !state_set.insert(state.clone()) {
                return Err(CoreError::definition(format!("duplicate state '{}'", state)));
            }
        }

        // Validate initial state
        let initial = State(raw.initial.clone());
        if !state_set.contains(&initial) {
            return Err(CoreError::definition(format!(
                "initial state '{}' not in states list",
                initial
            )));
        }

        // Inputs and variables share one namespace
        let mut identifiers = HashSet::new();
        for ident in raw.inputs.iter().chain(&raw.variables) {
            if !identifiers.insert(ident.as_str()) {
                return Err(CoreError::definition(format!(
                    "identifier '{}' declared more than once",
                    ident
                )));
            }
        }

        let mut operations = OperationRegistry::new();
        for op in &raw.operations {
            operations.insert(&op.name, &op.expression)?;
        }

        let mut conditions = ConditionRegistry::new();
        for cond in &raw.conditions {
            conditions.insert(&cond.name, &cond.expression)?;
        }

        // Build transitions
        let mut by_state = HashMap::new();
        for (source, list) in &raw.fsmd {
            let source = State(source.clone());
            if !state_set.contains(&source) {
                return Err(CoreError::definition(format!(
                    "transitions given for undeclared state '{}'",
                    source
                )));
            }

            let mut transitions = Vec::with_capacity(list.0.len());
            for t in &list.0 {
                let guard = match conditions.compile(&t.condition) {
                    Ok(guard) => Some(guard),
                    Err(e) if options.strict => {
                        return Err(CoreError::definition(format!(
                            "transition {} -> {}: {}",
                            source, t.nextstate, e
                        )))
                    }
                    Err(_) => None,
                };
                transitions.push(Transition {
                    condition: t.condition.clone(),
                    instruction: t.instruction.clone(),
                    nextstate: State(t.nextstate.clone()),
                    guard,
                });
            }
            by_state.insert(source, transitions);
        }

        // Compute checksum
        let json_bytes = serde_json::to_vec(&raw)?;
        let checksum = format!("{:08x}", crc32c::crc32c(&json_bytes));

        let definition = Self {
            name,
            states,
            state_set,
            initial,
            inputs: raw.inputs.clone(),
            variables: raw.variables.clone(),
            operations,
            conditions,
            table: TransitionTable { by_state },
            options,
            raw,
            checksum,
        };

        if options.strict {
            definition.check_references()?;
        }

        Ok(definition)
    }

    /// Load-time checks that a lenient load leaves to the simulation.
    fn check_references(&self) -> Result<(), CoreError> {
        let is_input = |n: &str| self.inputs.iter().any(|i| i == n);
        let is_variable = |n: &str| self.variables.iter().any(|v| v == n);

        for (name, _) in self.conditions.iter() {
            if is_input(name) || is_variable(name) {
                return Err(CoreError::definition(format!(
                    "condition '{}' shadows an input or variable",
                    name
                )));
            }
        }

        for (name, op) in self.operations.iter() {
            if !is_variable(op.target.as_str()) {
                return Err(CoreError::definition(format!(
                    "operation '{}' assigns '{}', which is not a declared variable",
                    name, op.target
                )));
            }
            for ident in op.expr.identifiers() {
                if !is_input(ident) && !is_variable(ident) {
                    return Err(CoreError::definition(format!(
                        "operation '{}' reads undeclared identifier '{}'",
                        name, ident
                    )));
                }
            }
        }

        for (name, _) in self.conditions.iter() {
            let guard = self
                .conditions
                .compile(name)
                .map_err(|e| CoreError::definition(format!("condition '{}': {}", name, e)))?;
            for ident in guard.identifiers() {
                if !is_input(ident) && !is_variable(ident) {
                    return Err(CoreError::definition(format!(
                        "condition '{}' reads undeclared identifier '{}'",
                        name, ident
                    )));
                }
            }
        }

        for state in &self.states {
            for t in self.transitions_for(state) {
                if !self.has_state(&t.nextstate) {
                    return Err(CoreError::definition(format!(
                        "transition {} -> {}: next state not in states list",
                        state, t.nextstate
                    )));
                }
                for token in &t.instruction.0 {
                    if !is_nop(token) && !self.operations.contains(token) {
                        return Err(CoreError::definition(format!(
                            "transition {} -> {}: unknown operation '{}'",
                            state, t.nextstate, token
                        )));
                    }
                }
                if let Some(guard) = &t.guard {
                    for ident in guard.identifiers() {
                        if !is_input(ident) && !is_variable(ident) {
                            return Err(CoreError::definition(format!(
                                "transition {} -> {}: unknown condition or identifier '{}'",
                                state, t.nextstate, ident
                            )));
                        }
                    }
                }
            }
        }

        Ok(())
    }

    /// Transitions leaving `state`, in declaration order.
    pub fn transitions_for(&self, state: &State) -> &[Transition] {
        self.table.transitions_for(state)
    }

    pub fn table(&self) -> &TransitionTable {
        &self.table
    }

    /// Returns true if the given state is declared.
    pub fn has_state(&self, state: &State) -> bool {
        self.state_set.contains(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn gcd_definition() -> serde_json::Value {
        json!({
            "states": ["INIT", "TEST", "SUB_A", "SUB_B", "FINISH"],
            "initial": "INIT",
            "inputs": ["in_A", "in_B"],
            "variables": ["var_A", "var_B"],
            "operations": [
                {"name": "init_A", "expression": "var_A = in_A"},
                {"name": "init_B", "expression": "var_B = in_B"},
                {"name": "A_minus_B", "expression": "var_A = var_A - var_B"},
                {"name": "B_minus_A", "expression": "var_B = var_B - var_A"}
            ],
            "conditions": [
                {"name": "A_gt_B", "expression": "var_A > var_B"},
                {"name": "A_lt_B", "expression": "var_A < var_B"},
                {"name": "A_eq_B", "expression": "var_A == var_B"}
            ],
            "fsmd": {
                "INIT": [{"condition": true, "instruction": "init_A init_B", "nextstate": "TEST"}],
                "TEST": [
                    {"condition": "A_gt_B", "instruction": "NOP", "nextstate": "SUB_A"},
                    {"condition": "A_lt_B", "instruction": "NOP", "nextstate": "SUB_B"},
                    {"condition": "A_eq_B", "instruction": "NOP", "nextstate": "FINISH"}
                ],
                "SUB_A": {"condition": "True", "instruction": "A_minus_B", "nextstate": "TEST"},
                "SUB_B": {"condition": 1, "instruction": ["B_minus_A"], "nextstate": "TEST"},
                "FINISH": [{"condition": "true", "instruction": "nop", "nextstate": "FINISH"}]
            }
        })
    }

    fn load(json: serde_json::Value) -> Result<Definition, CoreError> {
        Definition::from_json("test", &json, LoadOptions::default())
    }

    #[test]
    fn test_parse_definition() {
        let def = load(gcd_definition()).unwrap();

        assert_eq!(def.name, "test");
        assert_eq!(def.initial.as_str(), "INIT");
        assert_eq!(def.states.len(), 5);
        assert_eq!(def.inputs, vec!["in_A", "in_B"]);
        assert_eq!(def.operations.len(), 4);
        assert_eq!(def.conditions.len(), 3);
        assert_eq!(def.table().len(), 7);
        assert_eq!(def.checksum.len(), 8);
    }

    #[test]
    fn test_transitions_keep_declaration_order() {
        let def = load(gcd_definition()).unwrap();
        let next: Vec<_> = def
            .transitions_for(&State::from("TEST"))
            .iter()
            .map(|t| t.nextstate.as_str())
            .collect();
        assert_eq!(next, vec!["SUB_A", "SUB_B", "FINISH"]);
    }

    #[test]
    fn test_single_transition_and_scalar_condition() {
        let def = load(gcd_definition()).unwrap();

        let sub_a = def.transitions_for(&State::from("SUB_A"));
        assert_eq!(sub_a.len(), 1);
        assert_eq!(sub_a[0].condition, "True");

        let sub_b = def.transitions_for(&State::from("SUB_B"));
        assert_eq!(sub_b[0].condition, "1");
        assert_eq!(sub_b[0].instruction, Instruction(vec!["B_minus_A".to_string()]));

        let init = def.transitions_for(&State::from("INIT"));
        assert_eq!(init[0].condition, "true");
        assert_eq!(init[0].instruction.0, vec!["init_A", "init_B"]);
    }

    #[test]
    fn test_real_conditions() {
        let def = load(json!({
            "states": ["A"],
            "initial": "A",
            "fsmd": {"A": [
                {"condition": 1.0, "instruction": "NOP", "nextstate": "A"},
                {"condition": 0.0, "instruction": "NOP", "nextstate": "A"},
                {"condition": 0.5, "instruction": "NOP", "nextstate": "A"}
            ]}
        }))
        .unwrap();

        let conditions: Vec<_> = def
            .transitions_for(&State::from("A"))
            .iter()
            .map(|t| t.condition.as_str())
            .collect();
        assert_eq!(conditions, vec!["1", "0", "0.5"]);
    }

    #[test]
    fn test_exploding_condition_rejected_at_load() {
        let mut conditions = vec![json!({"name": "c0", "expression": "x > 0"})];
        for i in 1..32 {
            conditions.push(json!({
                "name": format!("c{}", i),
                "expression": format!("c{} and c{}", i - 1, i - 1)
            }));
        }
        let description = json!({
            "states": ["A"],
            "initial": "A",
            "variables": ["x"],
            "conditions": conditions,
            "fsmd": {"A": [{"condition": "c31", "instruction": "NOP", "nextstate": "A"}]}
        });

        assert!(matches!(
            load(description.clone()),
            Err(CoreError::InvalidDefinition { .. })
        ));
        assert!(matches!(
            Definition::from_json("test", &description, LoadOptions::lenient()),
            Ok(_)
        ));
    }

    #[test]
    fn test_state_without_transitions() {
        let def = load(json!({
            "states": ["A", "B"],
            "initial": "A",
            "fsmd": {"A": [{"condition": true, "instruction": "NOP", "nextstate": "B"}]}
        }))
        .unwrap();
        assert!(def.transitions_for(&State::from("B")).is_empty());
    }

    #[test]
    fn test_checksum_is_stable() {
        let a = load(gcd_definition()).unwrap();
        let b = load(gcd_definition()).unwrap();
        assert_eq!(a.checksum, b.checksum);
    }

    #[test]
    fn test_invalid_initial_state() {
        let result = load(json!({"states": ["a", "b"], "initial": "c"}));
        assert!(matches!(result, Err(CoreError::InvalidDefinition { .. })));
    }

    #[test]
    fn test_duplicate_names() {
        let dup_state = json!({"states": ["a", "a"], "initial": "a"});
        assert!(matches!(load(dup_state), Err(CoreError::InvalidDefinition { .. })));

        let overlap = json!({"states": ["a"], "initial": "a", "inputs": ["x"], "variables": ["x"]});
        assert!(matches!(load(overlap), Err(CoreError::InvalidDefinition { .. })));

        let dup_op = json!({
            "states": ["a"], "initial": "a", "variables": ["v"],
            "operations": [
                {"name": "o", "expression": "v = 1"},
                {"name": "o", "expression": "v = 2"}
            ]
        });
        assert!(matches!(load(dup_op), Err(CoreError::InvalidDefinition { .. })));
    }

    #[test]
    fn test_unknown_next_state() {
        let json = json!({
            "states": ["a"],
            "initial": "a",
            "fsmd": {"a": [{"condition": true, "instruction": "NOP", "nextstate": "zz"}]}
        });
        assert!(matches!(load(json.clone()), Err(CoreError::InvalidDefinition { .. })));
        assert!(Definition::from_json("t", &json, LoadOptions::lenient()).is_ok());
    }

    #[test]
    fn test_unknown_instruction_token() {
        let json = json!({
            "states": ["a"],
            "initial": "a",
            "fsmd": {"a": [{"condition": true, "instruction": "missing", "nextstate": "a"}]}
        });
        let err = load(json.clone()).unwrap_err();
        assert!(err.to_string().contains("unknown operation 'missing'"));
        assert!(Definition::from_json("t", &json, LoadOptions::lenient()).is_ok());
    }

    #[test]
    fn test_transitions_for_undeclared_state() {
        let json = json!({
            "states": ["a"],
            "initial": "a",
            "fsmd": {"b": [{"condition": true, "instruction": "NOP", "nextstate": "a"}]}
        });
        assert!(Definition::from_json("t", &json, LoadOptions::lenient()).is_err());
    }

    #[test]
    fn test_operation_targets_and_identifiers() {
        let assigns_input = json!({
            "states": ["a"], "initial": "a", "inputs": ["i"],
            "operations": [{"name": "o", "expression": "i = 1"}]
        });
        assert!(load(assigns_input).is_err());

        let reads_unknown = json!({
            "states": ["a"], "initial": "a", "variables": ["v"],
            "operations": [{"name": "o", "expression": "v = w + 1"}]
        });
        assert!(load(reads_unknown).is_err());
    }

    #[test]
    fn test_cyclic_condition_rejected_at_load() {
        let json = json!({
            "states": ["a"], "initial": "a", "variables": ["v"],
            "conditions": [
                {"name": "p", "expression": "q and v > 0"},
                {"name": "q", "expression": "p"}
            ]
        });
        let err = load(json).unwrap_err();
        assert!(err.to_string().contains("cyclic condition reference"));
    }

    #[test]
    fn test_malformed_operation_always_rejected() {
        let json = json!({
            "states": ["a"], "initial": "a", "variables": ["v"],
            "operations": [{"name": "o", "expression": "v + 1"}]
        });
        assert!(Definition::from_json("t", &json, LoadOptions::lenient()).is_err());
    }

    #[test]
    fn test_from_yaml() {
        let yaml = r#"
states: [IDLE, RUN]
initial: IDLE
inputs: start
variables: [count]
operations:
  name: inc
  expression: count = count + 1
conditions:
  - name: go
    expression: start == 1
fsmd:
  IDLE:
    condition: go
    instruction: NOP
    nextstate: RUN
  RUN:
    - condition: true
      instruction: inc
      nextstate: RUN
"#;
        let def = Definition::from_yaml_str("counter", yaml, LoadOptions::default()).unwrap();
        assert_eq!(def.inputs, vec!["start"]);
        assert!(def.operations.contains("inc"));
        assert_eq!(def.transitions_for(&State::from("IDLE")).len(), 1);
        assert_eq!(def.transitions_for(&State::from("RUN"))[0].condition, "true");
    }
}
