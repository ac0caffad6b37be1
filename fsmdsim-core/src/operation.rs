//! Named assignment operations and the instructions that sequence them.

use crate::env::{Layered, Number, Scope, Store};
use crate::error::CoreError;
use crate::expr::Expr;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// The instruction token that does nothing.
pub const NOP: &str = "NOP";

/// Returns true for the no-op token, in any letter case.
pub fn is_nop(token: &str) -> bool {
    token.eq_ignore_ascii_case(NOP)
}

/// A parsed `target = expr` assignment.
#[derive(Debug, Clone)]
pub struct Assignment {
    pub target: String,
    pub expr: Expr,
    pub source: String,
}

impl Assignment {
    /// Parses `target = expr`. The first `=` that is not part of `==`, `!=`,
    /// `<=` or `>=` separates the target from the expression.
    pub fn parse(source: &str) -> Result<Self, CoreError> {
        let invalid = |reason: String| CoreError::InvalidAssignment {
            expr: source.to_string(),
            reason,
        };

        let split = find_assign(source).ok_or_else(|| invalid("missing '='".to_string()))?;
        let target = source[..split].trim();
        let rhs = &source[split + 1..];

        let mut chars = target.chars();
        let valid_target = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
            && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
        if !valid_target {
            return Err(invalid(format!("invalid target '{}'", target)));
        }

        let expr = Expr::parse(rhs).map_err(|e| invalid(e.to_string()))?;
        Ok(Self {
            target: target.to_string(),
            expr,
            source: source.to_string(),
        })
    }

    /// Evaluates the right-hand side to a storable number.
    pub fn evaluate<S: Scope + ?Sized>(&self, scope: &S) -> Result<Number, CoreError> {
        self.expr
            .evaluate(scope)
            .map(|v| v.to_number())
            .map_err(|e| CoreError::expression(&self.source, e))
    }
}

fn find_assign(s: &str) -> Option<usize> {
    let bytes = s.as_bytes();
    (0..bytes.len()).find(|&i| {
        bytes[i] == b'='
            && !matches!(i.checked_sub(1).map(|p| bytes[p]), Some(b'=' | b'!' | b'<' | b'>'))
            && bytes.get(i + 1) != Some(&b'=')
    })
}

/// An ordered sequence of operation names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Instruction(pub Vec<String>);

impl Instruction {
    /// Splits a whitespace-separated instruction string.
    pub fn parse(s: &str) -> Self {
        Self(s.split_whitespace().map(str::to_string).collect())
    }

    /// Operation names, with no-op tokens skipped.
    pub fn operations(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str).filter(|t| !is_nop(t))
    }

    pub fn is_nop(&self) -> bool {
        self.operations().next().is_none()
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str(NOP);
        }
        f.write_str(&self.0.join(" "))
    }
}

/// Registry of named operations, in declaration order.
#[derive(Debug, Clone, Default)]
pub struct OperationRegistry {
    entries: Vec<(String, Assignment)>,
    index: HashMap<String, usize>,
}

impl OperationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses and registers an operation. Names must be unique.
    pub fn insert(&mut self, name: impl Into<String>, expression: &str) -> Result<(), CoreError> {
        let name = name.into();
        if is_nop(&name) {
            return Err(CoreError::definition(format!(
                "operation name '{}' is reserved",
                name
            )));
        }
        if self.index.contains_key(&name) {
            return Err(CoreError::definition(format!(
                "duplicate operation '{}'",
                name
            )));
        }
        let assignment = Assignment::parse(expression)?;
        self.index.insert(name.clone(), self.entries.len());
        self.entries.push((name, assignment));
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Assignment> {
        self.index.get(name).map(|&i| &self.entries[i].1)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Assignment)> {
        self.entries.iter().map(|(n, a)| (n.as_str(), a))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Applies one operation to `variables`, reading inputs and variables.
    pub fn apply(&self, token: &str, variables: &mut Store, inputs: &Store) -> Result<(), CoreError> {
        if is_nop(token) {
            return Ok(());
        }

        let op = self.get(token).ok_or_else(|| CoreError::UnknownOperation {
            name: token.to_string(),
        })?;

        let value = op.evaluate(&Layered::new(inputs, variables))?;
        if variables.set(&op.target, value) {
            return Ok(());
        }

        let reason = if inputs.contains(&op.target) {
            format!("target '{}' is an input", op.target)
        } else {
            format!("target '{}' is not a declared variable", op.target)
        };
        Err(CoreError::InvalidAssignment {
            expr: op.source.clone(),
            reason,
        })
    }

    /// Applies every operation of an instruction, left to right. Each
    /// assignment is visible to the ones after it.
    pub fn execute(
        &self,
        instruction: &Instruction,
        variables: &mut Store,
        inputs: &Store,
    ) -> Result<(), CoreError> {
        for token in instruction.operations() {
            self.apply(token, variables, inputs)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry(pairs: &[(&str, &str)]) -> OperationRegistry {
        let mut reg = OperationRegistry::new();
        for (name, expr) in pairs {
            reg.insert(*name, expr).unwrap();
        }
        reg
    }

    #[test]
    fn test_parse_assignment() {
        let a = Assignment::parse("var_A = var_A - var_B").unwrap();
        assert_eq!(a.target, "var_A");
        assert_eq!(a.expr.identifiers(), vec!["var_A", "var_B"]);

        let a = Assignment::parse("flag=x==y").unwrap();
        assert_eq!(a.target, "flag");

        let a = Assignment::parse("ok = a <= b").unwrap();
        assert_eq!(a.target, "ok");
    }

    #[test]
    fn test_parse_assignment_errors() {
        for src in ["x + 1", "= 3", "1x = 2", "a b = 1", "x = ", "x = (1"] {
            assert!(
                matches!(Assignment::parse(src), Err(CoreError::InvalidAssignment { .. })),
                "expected error for {:?}",
                src
            );
        }
    }

    #[test]
    fn test_apply_reads_inputs_and_variables() {
        let reg = registry(&[("load", "acc = acc + in1 * 2")]);
        let mut inputs = Store::with_names(["in1"]);
        let mut vars = Store::with_names(["acc"]);
        inputs.set("in1", Number::Int(3));
        vars.set("acc", Number::Int(1));

        reg.apply("load", &mut vars, &inputs).unwrap();
        assert_eq!(vars.get("acc"), Some(Number::Int(7)));
    }

    #[test]
    fn test_instruction_is_sequential() {
        let reg = registry(&[("inc", "v = v + 1"), ("dbl", "v = v * 2")]);
        let inputs = Store::default();
        let mut vars = Store::with_names(["v"]);
        vars.set("v", Number::Int(1));

        reg.execute(&Instruction::parse("inc dbl"), &mut vars, &inputs)
            .unwrap();
        assert_eq!(vars.get("v"), Some(Number::Int(4)));

        reg.execute(&Instruction::parse("dbl inc"), &mut vars, &inputs)
            .unwrap();
        assert_eq!(vars.get("v"), Some(Number::Int(9)));
    }

    #[test]
    fn test_nop_leaves_environment_unchanged() {
        let reg = registry(&[("inc", "v = v + 1")]);
        let mut inputs = Store::with_names(["i"]);
        let mut vars = Store::with_names(["v"]);
        inputs.set("i", Number::Int(5));
        vars.set("v", Number::Real(1.5));
        let (inputs_before, vars_before) = (inputs.clone(), vars.clone());

        for token in ["NOP", "nop", "Nop"] {
            reg.apply(token, &mut vars, &inputs).unwrap();
            reg.execute(&Instruction::parse(token), &mut vars, &inputs)
                .unwrap();
        }
        assert_eq!(vars, vars_before);
        assert_eq!(inputs, inputs_before);
        assert!(Instruction::parse("NOP").is_nop());
    }

    #[test]
    fn test_unknown_operation() {
        let reg = registry(&[("inc", "v = v + 1")]);
        let mut vars = Store::with_names(["v"]);
        let err = reg
            .execute(&Instruction::parse("inc missing"), &mut vars, &Store::default())
            .unwrap_err();
        assert!(matches!(err, CoreError::UnknownOperation { ref name } if name == "missing"));
        // The operation before the failure already took effect.
        assert_eq!(vars.get("v"), Some(Number::Int(1)));
    }

    #[test]
    fn test_assigning_an_input_is_refused() {
        let reg = registry(&[("bad", "in1 = 4")]);
        let inputs = Store::with_names(["in1"]);
        let mut vars = Store::with_names(["v"]);
        let err = reg.apply("bad", &mut vars, &inputs).unwrap_err();
        assert!(matches!(err, CoreError::InvalidAssignment { .. }));
        assert_eq!(inputs.get("in1"), Some(Number::Int(0)));
    }

    #[test]
    fn test_boolean_result_is_stored_as_integer() {
        let reg = registry(&[("cmp", "flag = x > 2")]);
        let mut inputs = Store::with_names(["x"]);
        let mut vars = Store::with_names(["flag"]);
        inputs.set("x", Number::Int(3));
        reg.apply("cmp", &mut vars, &inputs).unwrap();
        assert_eq!(vars.get("flag"), Some(Number::Int(1)));
    }

    #[test]
    fn test_division_error_propagates() {
        let reg = registry(&[("div", "v = 10 / v")]);
        let mut vars = Store::with_names(["v"]);
        let err = reg.apply("div", &mut vars, &Store::default()).unwrap_err();
        assert_eq!(err.error_code(), "EXPRESSION_ERROR");
    }

    #[test]
    fn test_duplicate_and_reserved_names() {
        let mut reg = registry(&[("inc", "v = v + 1")]);
        assert!(reg.insert("inc", "v = 0").is_err());
        assert!(reg.insert("nop", "v = 0").is_err());
    }

    #[test]
    fn test_instruction_display() {
        assert_eq!(Instruction::parse("a  b\tc").to_string(), "a b c");
        assert_eq!(Instruction::default().to_string(), "NOP");
    }
}
