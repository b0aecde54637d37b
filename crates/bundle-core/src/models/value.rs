use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single declared parameter value.
///
/// Resource specs are untyped JSON; only scalars and lists of scalars are
/// meaningful as bundle parameters. Anything else is carried as `Opaque`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<ParamValue>),
    /// Null or a nested object. Kept verbatim so a defaulting write does not
    /// lose it, but it cannot take part in validation or fingerprinting.
    Opaque(Value),
}

/// Declared parameters of a resource, keyed by parameter name.
///
/// Sorted by key so iteration order never depends on how the map was built.
pub type ParameterMap = BTreeMap<String, ParamValue>;

impl ParamValue {
    /// String form used for enum, length and pattern checks.
    ///
    /// Lists and opaque values have no string form.
    pub fn coerce_string(&self) -> Option<String> {
        match self {
            Self::Bool(b) => Some(b.to_string()),
            Self::Int(i) => Some(i.to_string()),
            Self::Float(f) => Some(f.to_string()),
            Self::String(s) => Some(s.clone()),
            Self::List(_) | Self::Opaque(_) => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::List(_) => "list",
            Self::Opaque(Value::Null) => "null",
            Self::Opaque(Value::Object(_)) => "object",
            Self::Opaque(_) => "value",
        }
    }

    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Bool(b) => Self::Bool(*b),
            Value::Number(n) => match (n.as_i64(), n.as_f64()) {
                (Some(i), _) => Self::Int(i),
                // u64 beyond i64::MAX and real floats
                (None, Some(f)) => Self::Float(f),
                (None, None) => Self::Opaque(value.clone()),
            },
            Value::String(s) => Self::String(s.clone()),
            Value::Array(items) => Self::List(items.iter().map(Self::from_json).collect()),
            Value::Null | Value::Object(_) => Self::Opaque(value.clone()),
        }
    }

    /// Decode the entries of an untyped spec object into a parameter map.
    pub fn map_from_json(object: &serde_json::Map<String, Value>) -> ParameterMap {
        object
            .iter()
            .map(|(name, value)| (name.clone(), Self::from_json(value)))
            .collect()
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Self::Opaque(value) => write!(f, "{value}"),
            other => match other.coerce_string() {
                Some(s) => f.write_str(&s),
                None => Ok(()),
            },
        }
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}
