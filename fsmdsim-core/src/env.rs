//! Numeric values and the fixed-schema stores that hold inputs and variables.

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;

/// A numeric value held by an input or a variable.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Number {
    Int(i64),
    Real(f64),
}

impl Number {
    pub fn as_f64(self) -> f64 {
        match self {
            Number::Int(i) => i as f64,
            Number::Real(r) => r,
        }
    }
}

impl Default for Number {
    fn default() -> Self {
        Number::Int(0)
    }
}

impl From<i64> for Number {
    fn from(i: i64) -> Self {
        Number::Int(i)
    }
}

impl From<f64> for Number {
    fn from(r: f64) -> Self {
        Number::Real(r)
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Number::Int(i) => write!(f, "{}", i),
            // Reals always carry a fractional part so 4.0 is not mistaken for 4.
            Number::Real(r) if r.is_finite() && r.fract() == 0.0 => write!(f, "{:.1}", r),
            Number::Real(r) => write!(f, "{}", r),
        }
    }
}

/// Read-only name lookup used by the evaluator.
pub trait Scope {
    fn lookup(&self, name: &str) -> Option<Number>;
}

impl Scope for HashMap<String, Number> {
    fn lookup(&self, name: &str) -> Option<Number> {
        self.get(name).copied()
    }
}

/// Two stores read as one namespace. `first` shadows `second`.
pub struct Layered<'a> {
    first: &'a Store,
    second: &'a Store,
}

impl<'a> Layered<'a> {
    pub fn new(first: &'a Store, second: &'a Store) -> Self {
        Self { first, second }
    }
}

impl Scope for Layered<'_> {
    fn lookup(&self, name: &str) -> Option<Number> {
        self.first.get(name).or_else(|| self.second.get(name))
    }
}

/// A fixed set of named numeric slots.
///
/// Names are fixed when the store is built and every slot starts at zero.
/// Writes to undeclared names are refused, so the schema never grows or
/// shrinks while a simulation runs. Iteration follows declaration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Store {
    names: Vec<String>,
    values: Vec<Number>,
    index: HashMap<String, usize>,
}

impl Store {
    /// Builds a zero-initialised store. Repeated names keep their first slot.
    pub fn with_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut store = Self::default();
        for name in names {
            let name = name.into();
            if store.index.contains_key(&name) {
                continue;
            }
            store.index.insert(name.clone(), store.names.len());
            store.names.push(name);
            store.values.push(Number::default());
        }
        store
    }

    pub fn get(&self, name: &str) -> Option<Number> {
        self.index.get(name).map(|&i| self.values[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Writes a declared slot. Returns false and leaves the store untouched
    /// if `name` was never declared.
    pub fn set(&mut self, name: &str, value: Number) -> bool {
        match self.index.get(name) {
            Some(&i) => {
                self.values[i] = value;
                true
            }
            None => false,
        }
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Number)> {
        self.names
            .iter()
            .map(String::as_str)
            .zip(self.values.iter().copied())
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl Scope for Store {
    fn lookup(&self, name: &str) -> Option<Number> {
        self.get(name)
    }
}

impl Serialize for Store {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (name, value) in self.iter() {
            map.serialize_entry(name, &value)?;
        }
        map.end()
    }
}
