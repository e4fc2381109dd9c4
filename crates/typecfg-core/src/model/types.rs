use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::instance::InstanceStore;
use super::value::{Simple, Value};
use crate::errors::{Result, TypeCfgError};

/// Type of a property value or list element
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValueType {
    String,
    Number,
    Boolean,
    Complex(String),
    List(Box<ValueType>),
}

impl ValueType {
    pub fn list_of(element: ValueType) -> Self {
        ValueType::List(Box::new(element))
    }

    pub fn is_simple(&self) -> bool {
        matches!(self, ValueType::String | ValueType::Number | ValueType::Boolean)
    }

    /// Cast a value to this type
    ///
    /// A null scalar casts to `None`. Instances must already be of the
    /// matching complex type or element type.
    pub fn cast(&self, value: Value, store: &InstanceStore) -> Result<Option<Value>> {
        match value {
            Value::Simple(simple) => {
                if simple.value.is_null() {
                    return Ok(None);
                }
                self.cast_simple(simple).map(Some)
            }
            Value::Complex(id) => match self {
                ValueType::Complex(type_id) if store.complex(id)?.type_.id == *type_id => {
                    Ok(Some(Value::Complex(id)))
                }
                _ => Err(TypeCfgError::type_mismatch(
                    self.to_string(),
                    store.type_name_of(&Value::Complex(id)),
                )),
            },
            Value::List(id) => match self {
                ValueType::List(element) if store.list(id)?.element_type == **element => {
                    Ok(Some(Value::List(id)))
                }
                _ => Err(TypeCfgError::type_mismatch(
                    self.to_string(),
                    store.type_name_of(&Value::List(id)),
                )),
            },
        }
    }

    /// Cast a non-null scalar
    pub fn cast_simple(&self, simple: Simple) -> Result<Value> {
        use serde_json::Value as Json;

        let mismatch = |json: &Json| TypeCfgError::type_mismatch(self.to_string(), json_type_name(json));
        let value = match (self, simple.value) {
            (ValueType::String, Json::String(s)) => Json::String(s),
            (ValueType::String, json @ (Json::Number(_) | Json::Bool(_))) => {
                Json::String(json.to_string())
            }
            (ValueType::Number, Json::Number(n)) => Json::Number(n),
            (ValueType::Number, Json::String(s)) => parse_number(&s).ok_or_else(|| {
                TypeCfgError::type_mismatch("number", format!("string '{}'", s))
            })?,
            (ValueType::Boolean, Json::Bool(b)) => Json::Bool(b),
            (_, json) => return Err(mismatch(&json)),
        };
        Ok(Value::Simple(Simple {
            value,
            formatted: simple.formatted,
        }))
    }
}

fn parse_number(s: &str) -> Option<serde_json::Value> {
    let trimmed = s.trim();
    if let Ok(i) = trimmed.parse::<i64>() {
        return Some(serde_json::Value::from(i));
    }
    trimmed
        .parse::<f64>()
        .ok()
        .and_then(serde_json::Number::from_f64)
        .map(serde_json::Value::Number)
}

pub(crate) fn json_type_name(json: &serde_json::Value) -> &'static str {
    match json {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::String => f.write_str("string"),
            ValueType::Number => f.write_str("number"),
            ValueType::Boolean => f.write_str("boolean"),
            ValueType::Complex(id) => write!(f, "complex<{}>", id),
            ValueType::List(element) => write!(f, "list<{}>", element),
        }
    }
}

/// Declaration of one property of a complex type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyType {
    pub name: String,
    pub value_type: ValueType,
    #[serde(default)]
    pub read_only: bool,
    /// Default of a scalar property
    #[serde(default)]
    pub default: Option<serde_json::Value>,
}

impl PropertyType {
    pub fn new(name: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            name: name.into(),
            value_type,
            read_only: false,
            default: None,
        }
    }

    pub fn with_read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    pub fn with_default(mut self, default: serde_json::Value) -> Self {
        self.default = Some(default);
        self
    }

    /// The value a slot holds in the `Default` state
    pub fn default_value(&self) -> Option<Value> {
        let default = self.default.as_ref().filter(|d| !d.is_null())?;
        self.value_type
            .cast_simple(Simple {
                value: default.clone(),
                formatted: None,
            })
            .ok()
    }
}

/// A structured type: ordered properties, optionally keyed by one of them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplexType {
    pub id: String,
    pub properties: Vec<PropertyType>,
    #[serde(default)]
    pub key_property: Option<String>,
}

impl ComplexType {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            properties: Vec::new(),
            key_property: None,
        }
    }

    pub fn with_property(mut self, property: PropertyType) -> Self {
        self.properties.push(property);
        self
    }

    pub fn with_key(mut self, property: impl Into<String>) -> Self {
        self.key_property = Some(property.into());
        self
    }

    pub fn property_index(&self, name: &str) -> Option<usize> {
        self.properties.iter().position(|p| p.name == name)
    }

    /// Index of `name`, or `ArgumentInvalid` if this type does not declare it
    pub fn require_property(&self, name: &str) -> Result<usize> {
        self.property_index(name).ok_or_else(|| {
            TypeCfgError::argument_invalid(
                "name",
                format!("type '{}' has no property '{}'", self.id, name),
            )
        })
    }

    pub fn key_index(&self) -> Option<usize> {
        self.key_property
            .as_deref()
            .and_then(|k| self.property_index(k))
    }
}

/// Registered complex types by id
#[derive(Debug, Default)]
pub struct TypeRegistry {
    types: HashMap<String, Arc<ComplexType>>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a type after checking its declaration
    pub fn register(&mut self, ty: ComplexType) -> Result<Arc<ComplexType>> {
        if ty.id.is_empty() {
            return Err(TypeCfgError::argument_required("type.id"));
        }
        if self.types.contains_key(&ty.id) {
            return Err(TypeCfgError::argument_invalid(
                "type.id",
                format!("type '{}' is already registered", ty.id),
            ));
        }

        let mut seen = HashSet::new();
        for property in &ty.properties {
            if property.name.is_empty() {
                return Err(TypeCfgError::argument_required("property.name"));
            }
            if !seen.insert(property.name.as_str()) {
                return Err(TypeCfgError::argument_invalid(
                    "property.name",
                    format!("duplicate property '{}' in '{}'", property.name, ty.id),
                ));
            }
            if let Some(default) = property.default.as_ref().filter(|d| !d.is_null()) {
                if !property.value_type.is_simple() {
                    return Err(TypeCfgError::argument_invalid(
                        "property.default",
                        format!("'{}' is not a scalar property", property.name),
                    ));
                }
                property.value_type.cast_simple(Simple {
                    value: default.clone(),
                    formatted: None,
                })?;
            }
        }

        if let Some(key) = &ty.key_property {
            match ty.property_index(key) {
                Some(i) if ty.properties[i].value_type.is_simple() => {}
                _ => {
                    return Err(TypeCfgError::argument_invalid(
                        "type.key_property",
                        format!("'{}' is not a scalar property of '{}'", key, ty.id),
                    ))
                }
            }
        }

        let ty = Arc::new(ty);
        self.types.insert(ty.id.clone(), Arc::clone(&ty));
        Ok(ty)
    }

    pub fn get(&self, id: &str) -> Result<Arc<ComplexType>> {
        self.types
            .get(id)
            .cloned()
            .ok_or_else(|| TypeCfgError::TypeNotFound {
                type_id: id.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn simple(v: serde_json::Value) -> Simple {
        Simple {
            value: v,
            formatted: None,
        }
    }

    #[test]
    fn test_string_accepts_scalars() {
        let v = ValueType::String.cast_simple(simple(json!(42))).unwrap();
        assert_eq!(v.as_json(), Some(&json!("42")));
        let v = ValueType::String.cast_simple(simple(json!(true))).unwrap();
        assert_eq!(v.as_json(), Some(&json!("true")));
    }

    #[test]
    fn test_number_accepts_numeric_strings() {
        let v = ValueType::Number.cast_simple(simple(json!(" 7 "))).unwrap();
        assert_eq!(v.as_json(), Some(&json!(7)));
        let v = ValueType::Number.cast_simple(simple(json!("2.5"))).unwrap();
        assert_eq!(v.as_json(), Some(&json!(2.5)));

        let err = ValueType::Number.cast_simple(simple(json!("abc"))).unwrap_err();
        assert!(matches!(err, TypeCfgError::TypeMismatch { .. }));
    }

    #[test]
    fn test_boolean_is_strict() {
        let err = ValueType::Boolean.cast_simple(simple(json!("true"))).unwrap_err();
        assert!(matches!(err, TypeCfgError::TypeMismatch { ref expected, .. } if expected == "boolean"));
    }

    #[test]
    fn test_register_rejects_bad_key_property() {
        let mut registry = TypeRegistry::new();
        let ty = ComplexType::new("T")
            .with_property(PropertyType::new("a", ValueType::list_of(ValueType::String)))
            .with_key("a");
        let err = registry.register(ty).unwrap_err();
        assert!(matches!(err, TypeCfgError::ArgumentInvalid { .. }));
    }

    #[test]
    fn test_register_rejects_duplicate_properties() {
        let mut registry = TypeRegistry::new();
        let ty = ComplexType::new("T")
            .with_property(PropertyType::new("a", ValueType::String))
            .with_property(PropertyType::new("a", ValueType::Number));
        assert!(registry.register(ty).is_err());
    }

    #[test]
    fn test_default_value_is_cast() {
        let p = PropertyType::new("n", ValueType::Number).with_default(json!("3"));
        assert_eq!(p.default_value().unwrap().as_json(), Some(&json!(3)));
    }
}
