//! Property values and deferred references
//!
//! Properties never embed live handles to other nodes. A cross-node value is
//! a [`Reference`]: a lookup key for an output the referenced node will
//! produce once realized. References keep node construction
//! order-independent and make the whole graph serializable.

use crate::scope::ScopePath;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A deferred pointer to another node's future output value.
///
/// Holds a non-owning lookup key (scope path + output name), never a live
/// pointer: the referenced node may not be realized yet.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Reference {
    /// Scope path of the node producing the output.
    pub source: ScopePath,

    /// Name of the output (e.g. `arn`, `dns_name`).
    pub output: String,
}

impl Reference {
    pub fn new(source: ScopePath, output: impl Into<String>) -> Self {
        Self {
            source,
            output: output.into(),
        }
    }
}

impl std::fmt::Display for Reference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "${{{}#{}}}", self.source, self.output)
    }
}

/// A property value.
///
/// Numbers are integral; every property observed in practice (capacities,
/// ports, memory limits, counts) is. Keeping `Value: Eq + Ord` lets policy
/// statements use set semantics on their action/resource members.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Value {
    Null,
    Bool(bool),
    Number(i64),
    String(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
    /// Deferred binding to another node's output.
    Ref(Reference),
}

impl Value {
    /// Visit every [`Reference`] embedded in this value, depth-first.
    pub fn walk_refs(&self, visit: &mut impl FnMut(&Reference)) {
        match self {
            Value::Ref(reference) => visit(reference),
            Value::List(items) => {
                for item in items {
                    item.walk_refs(visit);
                }
            }
            Value::Map(entries) => {
                for value in entries.values() {
                    value.walk_refs(visit);
                }
            }
            _ => {}
        }
    }

    /// Whether any part of this value is still a deferred reference.
    pub fn has_refs(&self) -> bool {
        let mut found = false;
        self.walk_refs(&mut |_| found = true);
        found
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<i64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
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

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<Reference> for Value {
    fn from(reference: Reference) -> Self {
        Value::Ref(reference)
    }
}

impl<V: Into<Value>> From<Vec<V>> for Value {
    fn from(items: Vec<V>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(entries: BTreeMap<String, Value>) -> Self {
        Value::Map(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_arn() -> Reference {
        Reference::new(["storage", "patients"].into(), "arn")
    }

    #[test]
    fn test_walk_refs_finds_nested_references() {
        let value = Value::Map(BTreeMap::from([
            ("name".to_string(), Value::from("patients")),
            (
                "resources".to_string(),
                Value::from(vec![Value::Ref(table_arn())]),
            ),
        ]));

        let mut seen = Vec::new();
        value.walk_refs(&mut |r| seen.push(r.clone()));
        assert_eq!(seen, vec![table_arn()]);
        assert!(value.has_refs());
        assert!(!Value::from(5).has_refs());
    }

    #[test]
    fn test_reference_display() {
        assert_eq!(table_arn().to_string(), "${storage/patients#arn}");
    }

    #[test]
    fn test_value_roundtrips_through_json() {
        let value = Value::Ref(table_arn());
        let json = serde_json::to_string(&value).unwrap();
        let back: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(back, value);
    }
}
