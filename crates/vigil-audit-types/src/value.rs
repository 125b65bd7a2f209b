//! Value snapshots passed to strategies.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::any::{type_name, TypeId};
use strum::{Display, EnumString};

/// Runtime kind of a captured value, used to match operation signatures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[derive(Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ValueKind {
    Null,
    Bool,
    Integer,
    Float,
    String,
    Array,
    Object,
}

impl ValueKind {
    /// Kind of the given value.
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(_) => Self::Bool,
            Value::Number(n) if n.is_f64() => Self::Float,
            Value::Number(_) => Self::Integer,
            Value::String(_) => Self::String,
            Value::Array(_) => Self::Array,
            Value::Object(_) => Self::Object,
        }
    }

    /// Kinds of a list of values, in order.
    pub fn of_all(values: &[Value]) -> Vec<Self> {
        values.iter().map(Self::of).collect()
    }
}

/// What a successful audited call returned, as seen by the after-hook.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReturnValue {
    /// The call returns `()`.
    Unit,
    /// Serialized snapshot of the returned value.
    Value { value: Value },
    /// The value could not be serialized.
    Opaque { type_name: String, reason: String },
}

impl ReturnValue {
    /// Snapshot a returned value.
    pub fn capture<T: Serialize + 'static>(value: &T) -> Self {
        if TypeId::of::<T>() == TypeId::of::<()>() {
            return Self::Unit;
        }
        match serde_json::to_value(value) {
            Ok(value) => Self::Value { value },
            Err(e) => Self::opaque::<T>(e.to_string()),
        }
    }

    /// Snapshot of a value that has no serialized form.
    pub fn opaque<T: ?Sized>(reason: impl Into<String>) -> Self {
        Self::Opaque {
            type_name: type_name::<T>().to_string(),
            reason: reason.into(),
        }
    }

    /// The serialized value, if any.
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Self::Value { value } => Some(value),
            _ => None,
        }
    }

    /// Whether the call returned `()`.
    pub fn is_unit(&self) -> bool {
        matches!(self, Self::Unit)
    }
}
