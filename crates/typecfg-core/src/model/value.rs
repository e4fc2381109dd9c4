use std::fmt;

use serde::{Deserialize, Serialize};

/// Identity of a complex or list instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InstanceId(pub u64);

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A scalar with optional display text
#[derive(Debug, Clone, PartialEq)]
pub struct Simple {
    pub value: serde_json::Value,
    pub formatted: Option<String>,
}

/// A value held by a property slot or a list
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Simple(Simple),
    Complex(InstanceId),
    List(InstanceId),
}

impl Value {
    pub fn simple(value: impl Into<serde_json::Value>) -> Self {
        Value::Simple(Simple {
            value: value.into(),
            formatted: None,
        })
    }

    pub fn formatted(value: impl Into<serde_json::Value>, formatted: impl Into<String>) -> Self {
        Value::Simple(Simple {
            value: value.into(),
            formatted: Some(formatted.into()),
        })
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Simple(s) if s.value.is_null())
    }

    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            Value::Simple(s) => Some(&s.value),
            _ => None,
        }
    }

    /// The instance a complex or list value refers to
    pub fn instance_id(&self) -> Option<InstanceId> {
        match self {
            Value::Complex(id) | Value::List(id) => Some(*id),
            Value::Simple(_) => None,
        }
    }

    /// Type-defined equality: scalars compare by value (display text is
    /// ignored), instances by identity.
    pub fn equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Simple(a), Value::Simple(b)) => a.value == b.value,
            (Value::Complex(a), Value::Complex(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            _ => false,
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        Value::simple(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::simple(value)
    }
}

/// `equals` lifted over empty slots
pub fn values_equal(a: Option<&Value>, b: Option<&Value>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => a.equals(b),
        _ => false,
    }
}

/// Whether a slot holds its type default or an explicitly set value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValueState {
    Default,
    Specified,
}

/// Value and state of one property of a complex instance
#[derive(Debug, Clone, PartialEq)]
pub struct Slot {
    pub value: Option<Value>,
    pub state: ValueState,
}

impl Slot {
    pub fn default_with(value: Option<Value>) -> Self {
        Self {
            value,
            state: ValueState::Default,
        }
    }

    pub fn specified(value: Option<Value>) -> Self {
        Self {
            value,
            state: ValueState::Specified,
        }
    }

    /// Same state and `equals`-equal value
    pub fn same_as(&self, state: ValueState, value: Option<&Value>) -> bool {
        self.state == state && values_equal(self.value.as_ref(), value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_equals_ignores_formatted_text() {
        let a = Value::formatted(json!(1), "one");
        let b = Value::simple(json!(1));
        assert!(a.equals(&b));
        assert_ne!(a, b);
    }

    #[test]
    fn test_instances_compare_by_identity() {
        assert!(Value::Complex(InstanceId(1)).equals(&Value::Complex(InstanceId(1))));
        assert!(!Value::Complex(InstanceId(1)).equals(&Value::List(InstanceId(1))));
    }

    #[test]
    fn test_values_equal_on_empty_slots() {
        assert!(values_equal(None, None));
        assert!(!values_equal(Some(&Value::simple(json!(1))), None));
    }
}
