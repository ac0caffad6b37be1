//! Named conditions and guard compilation.
//!
//! A condition is a named boolean expression. Guards and other conditions
//! may mention a condition by name; before evaluation every such mention is
//! replaced by the condition's body, wrapped in parentheses, recursively.
//!
//! Only whole identifier tokens are substituted. A condition called `c1`
//! leaves `c10` and `c1_ready` alone, so the order in which names are tried
//! does not change the result. Names are tried in declaration order.

use crate::env::Scope;
use crate::error::{CoreError, ExprError};
use crate::expr::Expr;
use std::collections::HashMap;

/// Upper bound on the text a single guard may expand to.
pub const MAX_EXPANSION_LEN: usize = 64 * 1024;

/// Returns true for words the expression grammar reserves.
fn is_reserved(name: &str) -> bool {
    matches!(name, "and" | "or" | "not")
        || name.eq_ignore_ascii_case("true")
        || name.eq_ignore_ascii_case("false")
}

/// Registry of named conditions, in declaration order.
#[derive(Debug, Clone, Default)]
pub struct ConditionRegistry {
    entries: Vec<(String, String)>,
    index: HashMap<String, usize>,
}

impl ConditionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a condition. Names must be unique.
    pub fn insert(
        &mut self,
        name: impl Into<String>,
        expression: impl Into<String>,
    ) -> Result<(), CoreError> {
        let name = name.into();
        if is_reserved(&name) {
            return Err(CoreError::definition(format!(
                "condition name '{}' is reserved",
                name
            )));
        }
        if self.index.contains_key(&name) {
            return Err(CoreError::definition(format!(
                "duplicate condition '{}'",
                name
            )));
        }
        self.index.insert(name.clone(), self.entries.len());
        self.entries.push((name, expression.into()));
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.index.get(name).map(|&i| self.entries[i].1.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, e)| (n.as_str(), e.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Recognises the literal guards `true` / `false` (any case) and `1` / `0`.
    pub fn literal(condition: &str) -> Option<bool> {
        let c = condition.trim();
        if c.eq_ignore_ascii_case("true") || c == "1" {
            Some(true)
        } else if c.eq_ignore_ascii_case("false") || c == "0" {
            Some(false)
        } else {
            None
        }
    }

    /// Substitutes every registered condition name in `condition`.
    ///
    /// Fails with `InvalidDefinition` once the result grows past
    /// [`MAX_EXPANSION_LEN`], so nested references cannot blow up.
    pub fn expand(&self, condition: &str) -> Result<String, CoreError> {
        let mut out = String::with_capacity(condition.len());
        let mut stack = Vec::new();
        self.expand_into(condition, &mut stack, &mut out)?;
        Ok(out)
    }

    fn expand_into<'a>(
        &'a self,
        text: &str,
        stack: &mut Vec<&'a str>,
        out: &mut String,
    ) -> Result<(), CoreError> {
        let mut rest = text;

        while let Some(c) = rest.chars().next() {
            if c.is_ascii_digit() || c == '.' {
                let len = number_len(rest);
                out.push_str(&rest[..len]);
                rest = &rest[len..];
                continue;
            }

            if c.is_ascii_alphabetic() || c == '_' {
                let len = rest
                    .find(|ch: char| !(ch.is_ascii_alphanumeric() || ch == '_'))
                    .unwrap_or(rest.len());
                let word = &rest[..len];
                rest = &rest[len..];

                match self.index.get(word) {
                    Some(&i) => {
                        let (name, body) = &self.entries[i];
                        if stack.contains(&name.as_str()) {
                            let mut chain: Vec<&str> = stack.clone();
                            chain.push(name);
                            return Err(CoreError::CyclicCondition {
                                chain: chain.join(" -> "),
                            });
                        }
                        if out.len() + body.len() + 2 > MAX_EXPANSION_LEN {
                            return Err(CoreError::definition(format!(
                                "condition '{}' expands beyond {} bytes",
                                stack.first().copied().unwrap_or(name.as_str()),
                                MAX_EXPANSION_LEN
                            )));
                        }
                        stack.push(name);
                        out.push('(');
                        self.expand_into(body, stack, out)?;
                        out.push(')');
                        stack.pop();
                    }
                    None => out.push_str(word),
                }
                continue;
            }

            out.push(c);
            rest = &rest[c.len_utf8()..];
        }

        Ok(())
    }

    /// Expands and parses a guard once so it can be evaluated many times.
    pub fn compile(&self, condition: &str) -> Result<Guard, CoreError> {
        if let Some(value) = Self::literal(condition) {
            return Ok(Guard::Literal(value));
        }

        let expanded = self.expand(condition)?;
        let expr = Expr::parse(&expanded).map_err(|e| CoreError::expression(&expanded, e))?;
        Ok(Guard::Expr {
            source: condition.to_string(),
            expanded,
            expr,
        })
    }

    /// Evaluates a condition name, literal or raw expression to a boolean.
    pub fn resolve<S: Scope + ?Sized>(&self, condition: &str, scope: &S) -> Result<bool, CoreError> {
        self.compile(condition)?.evaluate(scope)
    }
}

/// Length of the numeric literal at the start of `s`, exponent included,
/// so that `1e3` is not read as the digit `1` followed by the name `e3`.
fn number_len(s: &str) -> usize {
    let bytes = s.as_bytes();
    let mut i = 0;
    while i < bytes.len() && (bytes[i].is_ascii_digit() || bytes[i] == b'.') {
        i += 1;
    }
    if i < bytes.len() && (bytes[i] == b'e' || bytes[i] == b'E') {
        let mut j = i + 1;
        if j < bytes.len() && (bytes[j] == b'+' || bytes[j] == b'-') {
            j += 1;
        }
        if j < bytes.len() && bytes[j].is_ascii_digit() {
            while j < bytes.len() && bytes[j].is_ascii_digit() {
                j += 1;
            }
            i = j;
        }
    }
    i.max(1)
}

/// A transition guard ready for evaluation.
#[derive(Debug, Clone)]
pub enum Guard {
    Literal(bool),
    Expr {
        source: String,
        expanded: String,
        expr: Expr,
    },
}

impl Guard {
    pub fn evaluate<S: Scope + ?Sized>(&self, scope: &S) -> Result<bool, CoreError> {
        match self {
            Guard::Literal(value) => Ok(*value),
            Guard::Expr {
                source,
                expanded,
                expr,
            } => match expr.evaluate(scope) {
                Ok(value) => Ok(value.is_truthy()),
                // A leftover name is neither a condition nor a declared identifier.
                Err(ExprError::UnknownIdentifier(name)) => Err(CoreError::UnknownCondition {
                    name,
                    condition: source.clone(),
                }),
                Err(e) => Err(CoreError::expression(expanded, e)),
            },
        }
    }

    /// Identifiers the guard reads after expansion.
    pub fn identifiers(&self) -> Vec<&str> {
        match self {
            Guard::Literal(_) => Vec::new(),
            Guard::Expr { expr, .. } => expr.identifiers(),
        }
    }
}
