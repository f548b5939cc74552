//! Recognition results.

use std::collections::BTreeMap;
use std::fmt;

use intent_graph::StateId;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// One traversed edge and the input tokens it consumed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathStep {
    pub from: StateId,
    pub to: StateId,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub matched: Vec<String>,
}

impl PathStep {
    pub fn new(from: StateId, to: StateId, matched: Vec<String>) -> Self {
        Self { from, to, matched }
    }
}

/// Edges from the start state to the final state.
pub type MatchPath = Vec<PathStep>;

/// Typed token or entity value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    Duration {
        seconds: f64,
    },
    DateTime(#[serde(with = "time::serde::rfc3339")] OffsetDateTime),
    Text(String),
    Object(BTreeMap<String, Value>),
}

impl Value {
    pub fn text(s: impl Into<String>) -> Self {
        Value::Text(s.into())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(n) => Some(*n as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(n) => write!(f, "{n}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Duration { seconds } => write!(f, "{seconds}s"),
            Value::DateTime(dt) => match dt.format(&time::format_description::well_known::Rfc3339) {
                Ok(s) => f.write_str(&s),
                Err(_) => write!(f, "{dt}"),
            },
            Value::Text(s) => f.write_str(s),
            Value::Object(map) => match serde_json::to_string(map) {
                Ok(s) => f.write_str(&s),
                Err(_) => Err(fmt::Error),
            },
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Intent {
    pub name: String,
    /// 1.0 for strict matches, lower for fuzzy ones.
    pub confidence: f64,
}

/// Tagged span of the recognized text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub entity: String,
    pub value: Value,
    pub raw_value: String,
    /// Slot the value came from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Character offsets into [`Recognition::text`].
    pub start: usize,
    pub end: usize,
    /// Character offsets into [`Recognition::raw_text`].
    pub raw_start: usize,
    pub raw_end: usize,
    pub tokens: Vec<Value>,
    pub raw_tokens: Vec<String>,
}

impl Entity {
    pub(crate) fn open(name: &str, start: usize, raw_start: usize) -> Self {
        Self {
            entity: name.to_string(),
            value: Value::Text(String::new()),
            raw_value: String::new(),
            source: None,
            start,
            end: start,
            raw_start,
            raw_end: raw_start,
            tokens: Vec::new(),
            raw_tokens: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recognition {
    pub intent: Intent,
    pub entities: Vec<Entity>,
    pub text: String,
    pub raw_text: String,
    pub tokens: Vec<Value>,
    pub raw_tokens: Vec<String>,
    #[serde(default)]
    pub recognize_seconds: f64,
}

impl Recognition {
    pub fn entity(&self, name: &str) -> Option<&Entity> {
        self.entities.iter().find(|e| e.entity == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_json_shapes() {
        assert_eq!(serde_json::to_string(&Value::Int(20)).unwrap(), "20");
        assert_eq!(serde_json::to_string(&Value::text("red")).unwrap(), "\"red\"");
        assert_eq!(
            serde_json::to_string(&Value::Duration { seconds: 300.0 }).unwrap(),
            "{\"seconds\":300.0}"
        );
        let v: Value = serde_json::from_str("{\"kind\":\"Color\",\"value\":\"red\"}").unwrap();
        assert!(matches!(v, Value::Object(ref m) if m["kind"] == Value::text("Color")));
        let v: Value = serde_json::from_str("1.5").unwrap();
        assert_eq!(v, Value::Float(1.5));
    }

    #[test]
    fn value_display() {
        assert_eq!(Value::Int(72).to_string(), "72");
        assert_eq!(Value::Bool(false).to_string(), "false");
        let dt = OffsetDateTime::from_unix_timestamp(0).unwrap();
        assert_eq!(Value::DateTime(dt).to_string(), "1970-01-01T00:00:00Z");
    }
}
