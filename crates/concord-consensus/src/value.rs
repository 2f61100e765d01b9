//! Proposed values and the fixed-schema metadata extension.

use std::collections::BTreeMap;

/// A value an analyzer proposes for an entity.
///
/// Values are categorical. Two proposals agree only when their values are
/// equal; values are never averaged.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Value {
    /// Integer output (colors, counts, class ids)
    Int(i64),
    /// Symbolic output
    Symbol(String),
}

impl Value {
    /// The integer payload, if any.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            Value::Symbol(_) => None,
        }
    }

    /// The symbolic payload, if any.
    pub fn as_symbol(&self) -> Option<&str> {
        match self {
            Value::Int(_) => None,
            Value::Symbol(s) => Some(s),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(i64::from(v))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Symbol(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Symbol(s)
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{}", v),
            Value::Symbol(s) => write!(f, "{}", s),
        }
    }
}

/// A metadata entry: text or number.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum MetaValue {
    Number(f64),
    Text(String),
}

impl From<f64> for MetaValue {
    fn from(v: f64) -> Self {
        MetaValue::Number(v)
    }
}

impl From<&str> for MetaValue {
    fn from(s: &str) -> Self {
        MetaValue::Text(s.to_string())
    }
}

impl From<String> for MetaValue {
    fn from(s: String) -> Self {
        MetaValue::Text(s)
    }
}

/// Analyzer-defined extension fields carried from proposal to proposition.
pub type Metadata = BTreeMap<String, MetaValue>;
