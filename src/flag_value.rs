use std::fmt;

use log::warn;
use serde::{Deserialize, Serialize};

/// FlagValue is the closed set of value shapes a feature flag can take.
///
/// There is no implicit coercion between cases: an integer flag read through [FlagValue::as_float]
/// yields `None`, never a widened value.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum FlagValue {
    Bool(bool),
    Str(String),
    // Int must precede Float so that integral JSON numbers deserialize as Int.
    Int(i64),
    Float(f64),
}

/// The type tag persisted next to a [FlagValue] in a [crate::FlagRecord].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    Bool,
    String,
    Int,
    Float,
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueType::Bool => "bool",
            ValueType::String => "string",
            ValueType::Int => "int",
            ValueType::Float => "float",
        };
        f.write_str(name)
    }
}

impl From<bool> for FlagValue {
    fn from(b: bool) -> FlagValue {
        FlagValue::Bool(b)
    }
}

impl From<String> for FlagValue {
    fn from(s: String) -> FlagValue {
        FlagValue::Str(s)
    }
}

impl From<&str> for FlagValue {
    fn from(s: &str) -> FlagValue {
        FlagValue::Str(s.to_owned())
    }
}

impl From<f64> for FlagValue {
    fn from(f: f64) -> FlagValue {
        FlagValue::Float(f)
    }
}

impl From<i64> for FlagValue {
    fn from(i: i64) -> FlagValue {
        FlagValue::Int(i)
    }
}

impl FlagValue {
    /// Convert a raw JSON value, as handed out by a remote provider's bulk enumeration, into a
    /// FlagValue.
    ///
    /// Returns `None` for null, arrays and objects, which have no FlagValue counterpart.
    ///
    /// JSON carries no integer/float distinction, so a whole number such as `10` becomes
    /// [FlagValue::Int] even when the flag is declared as a float remotely. Such a value reads
    /// back through `get_int`, and `get_double` returns its default for it.
    pub fn from_json(v: &serde_json::Value) -> Option<FlagValue> {
        use serde_json::Value;
        match v {
            Value::Bool(b) => Some(FlagValue::Bool(*b)),
            Value::String(s) => Some(FlagValue::Str(s.clone())),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Some(FlagValue::Int(i))
                } else if let Some(f) = n.as_f64() {
                    Some(FlagValue::Float(f))
                } else {
                    warn!("unrepresentable number {}, ignoring", n);
                    None
                }
            }
            Value::Null | Value::Array(_) | Value::Object(_) => None,
        }
    }

    /// Decode `v` as a value of type `value_type`, as persisted next to its tag in a
    /// [crate::FlagRecord].
    ///
    /// A whole number is accepted for [ValueType::Float]. Returns `None` when `v` does not fit
    /// the tag.
    pub fn from_tagged(value_type: ValueType, v: &serde_json::Value) -> Option<FlagValue> {
        match value_type {
            ValueType::Bool => v.as_bool().map(FlagValue::Bool),
            ValueType::String => v.as_str().map(FlagValue::from),
            ValueType::Int => v.as_i64().map(FlagValue::Int),
            ValueType::Float => v.as_f64().map(FlagValue::Float),
        }
    }

    pub fn value_type(&self) -> ValueType {
        match self {
            FlagValue::Bool(_) => ValueType::Bool,
            FlagValue::Str(_) => ValueType::String,
            FlagValue::Int(_) => ValueType::Int,
            FlagValue::Float(_) => ValueType::Float,
        }
    }

    /// Returns true if both values hold the same case, regardless of the payload.
    pub fn same_type(&self, other: &FlagValue) -> bool {
        self.value_type() == other.value_type()
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FlagValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_string(&self) -> Option<String> {
        match self {
            FlagValue::Str(s) => Some(s.clone()),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            FlagValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            FlagValue::Float(f) => Some(*f),
            _ => None,
        }
    }
}
