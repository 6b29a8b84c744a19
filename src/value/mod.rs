//! # Value Type System
//!
//! Constants that can appear in clauses and tuples. The graph model only needs
//! three kinds: strings (labels, property keys and values), 32-bit integers and
//! 64-bit integers (node/edge identities, including Skolem-allocated ones).
//!
//! ## Usage
//!
//! ```rust
//! use pgview::value::{Tuple, Value};
//!
//! let node = Tuple::new(vec![Value::Long(1), Value::string("Person")]);
//! assert_eq!(node.arity(), 2);
//! assert_eq!(node.to_string(), "(1, \"Person\")");
//! ```

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;

/// Column types a predicate can declare
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    String,
    Int,
    Long,
}

impl DataType {
    /// Check if a value matches this type
    pub fn matches(self, value: &Value) -> bool {
        matches!(
            (self, value),
            (DataType::String, Value::String(_))
                | (DataType::Int, Value::Int(_))
                | (DataType::Long, Value::Long(_))
        )
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::String => write!(f, "string"),
            DataType::Int => write!(f, "int"),
            DataType::Long => write!(f, "long"),
        }
    }
}

/// A bound constant
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Value {
    String(String),
    Int(i32),
    Long(i64),
}

impl Value {
    pub fn string(s: &str) -> Self {
        Value::String(s.to_string())
    }

    pub fn data_type(&self) -> DataType {
        match self {
            Value::String(_) => DataType::String,
            Value::Int(_) => DataType::Int,
            Value::Long(_) => DataType::Long,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Numeric view of the value; `Int` widens to `i64`
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(i64::from(*v)),
            Value::Long(v) => Some(*v),
            Value::String(_) => None,
        }
    }

    /// Compare two values the way interpreted atoms do.
    ///
    /// Numbers compare numerically across `Int`/`Long`, strings compare
    /// lexicographically, and a string is never comparable with a number.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            _ => match (self.as_i64(), other.as_i64()) {
                (Some(a), Some(b)) => Some(a.cmp(&b)),
                _ => None,
            },
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => write!(f, "\"{s}\""),
            Value::Int(v) => write!(f, "{v}"),
            Value::Long(v) => write!(f, "{v}"),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Long(v)
    }
}

/// A tuple of bound values, one per column
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tuple {
    values: Vec<Value>,
}

impl PartialOrd for Tuple {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Tuple {
    fn cmp(&self, other: &Self) -> Ordering {
        self.values.iter().cmp(other.values.iter())
    }
}

impl Tuple {
    /// Create a new tuple from a vector of values
    pub fn new(values: Vec<Value>) -> Self {
        Tuple { values }
    }

    /// Get the number of columns in this tuple
    pub fn arity(&self) -> usize {
        self.values.len()
    }

    /// Get a value by index
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Get all values as a slice
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    /// Create a new tuple by selecting specific columns
    pub fn project(&self, indices: &[usize]) -> Self {
        let values = indices
            .iter()
            .filter_map(|&i| self.values.get(i).cloned())
            .collect();
        Tuple { values }
    }

    /// Append one value, producing a tuple of arity + 1
    pub fn extended(&self, value: Value) -> Self {
        let mut values = self.values.clone();
        values.push(value);
        Tuple { values }
    }
}

impl fmt::Display for Tuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, v) in self.values.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{v}")?;
        }
        write!(f, ")")
    }
}

impl<'a> IntoIterator for &'a Tuple {
    type Item = &'a Value;
    type IntoIter = std::slice::Iter<'a, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.iter()
    }
}

impl From<Vec<Value>> for Tuple {
    fn from(values: Vec<Value>) -> Self {
        Tuple::new(values)
    }
}

/// The result of evaluating one predicate: a duplicate-free, ordered set of tuples
pub type Relation = BTreeSet<Tuple>;
