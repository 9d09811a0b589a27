//! Runtime module for region conditions
//!
//! Values that definitions hold and conditions compute, and the
//! [`Definitions`] map that conditions are evaluated against.

use std::{collections::HashMap, fmt};

use serde::{Deserialize, Serialize};

pub mod eval;

pub use eval::{evaluate, evaluate_value};

/// Canonical runtime value for condition evaluation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// The value of a name that is not defined. Never produced by config.
    #[default]
    #[serde(skip)]
    Undefined,
    /// Explicit `null`.
    Null,
    Bool(bool),
    Number(f64),
    String(String),
}

impl Value {
    /// Truthiness: `undefined`, `null`, `false`, `0`, `NaN` and `""` are falsy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::String(s) => !s.is_empty(),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
        }
    }

    /// Parses a command-line or env-style literal: `true`/`false` become
    /// booleans, numerals become numbers, anything else stays a string.
    pub fn from_literal(text: &str) -> Self {
        match text {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            _ => match text.parse::<f64>() {
                Ok(n) if !text.trim().is_empty() => Value::Number(n),
                _ => Value::String(text.to_string()),
            },
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => write!(f, "undefined"),
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Number(n) => write!(f, "{}", n),
            Value::String(s) => write!(f, "{}", s),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
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

/// The merged key/value set conditions are evaluated against.
///
/// Assembled once per session by [`crate::config`] and shared read-only
/// across every transform.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Definitions(HashMap<String, Value>);

impl Definitions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `key` can be referenced from a condition.
    ///
    /// Only identifier-shaped keys qualify. Numeric-shaped keys such as `"2"`
    /// stay in the map but cannot be bound, since `2` in a condition is a
    /// number literal.
    pub fn eligible(key: &str) -> bool {
        let mut chars = key.chars();
        match chars.next() {
            Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
            _ => return false,
        }
        chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
    }

    /// Looks up a name as a condition would see it.
    pub fn lookup(&self, name: &str) -> Value {
        if !Self::eligible(name) {
            return Value::Undefined;
        }
        self.0.get(name).cloned().unwrap_or(Value::Undefined)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    /// Overlays `other` on top of this map; `other` wins on conflicts.
    pub fn merge(&mut self, other: Definitions) {
        self.0.extend(other.0);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Definitions {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Definitions(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truthiness() {
        assert!(!Value::Undefined.is_truthy());
        assert!(!Value::Null.is_truthy());
        assert!(!Value::Number(0.0).is_truthy());
        assert!(!Value::Number(f64::NAN).is_truthy());
        assert!(!Value::String(String::new()).is_truthy());
        assert!(Value::String("false".into()).is_truthy());
        assert!(Value::Number(-1.0).is_truthy());
    }

    #[test]
    fn test_eligible_keys() {
        assert!(Definitions::eligible("DEBUG"));
        assert!(Definitions::eligible("_private9"));
        assert!(!Definitions::eligible("2"));
        assert!(!Definitions::eligible("VITE-MODE"));
        assert!(!Definitions::eligible("a.b"));
        assert!(!Definitions::eligible(""));
    }

    #[test]
    fn test_ineligible_keys_are_undefined() {
        let defs: Definitions = [("2", Value::Bool(true)), ("a-b", Value::Bool(true))]
            .into_iter()
            .collect();
        assert_eq!(defs.lookup("2"), Value::Undefined);
        assert_eq!(defs.lookup("a-b"), Value::Undefined);
        assert_eq!(defs.get("2"), Some(&Value::Bool(true)));
    }

    #[test]
    fn test_from_literal() {
        assert_eq!(Value::from_literal("true"), Value::Bool(true));
        assert_eq!(Value::from_literal("42"), Value::Number(42.0));
        assert_eq!(Value::from_literal("web"), Value::String("web".into()));
        assert_eq!(Value::from_literal(""), Value::String(String::new()));
    }

    #[test]
    fn test_deserialize_untagged() {
        let defs: Definitions =
            serde_json::from_str(r#"{"A": true, "B": 3, "C": "x", "D": null}"#).unwrap();
        assert_eq!(defs.get("A"), Some(&Value::Bool(true)));
        assert_eq!(defs.get("B"), Some(&Value::Number(3.0)));
        assert_eq!(defs.get("C"), Some(&Value::String("x".into())));
        assert_eq!(defs.get("D"), Some(&Value::Null));
    }
}
