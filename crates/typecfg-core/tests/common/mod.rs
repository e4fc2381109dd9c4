use serde_json::json;
use typecfg_core::config::{Apply, Criterion, RuleSpec};
use typecfg_core::model::{ComplexType, InstanceId, PropertyType, Value, ValueType};
use typecfg_core::Context;

/// Context with a keyed `Person` type and an `Address` type
///
/// `Person`: `name` (key), `age` (default 0), `id` (read-only),
/// `address` (complex), `tags` (list of strings).
#[allow(dead_code)]
pub fn person_context() -> Context {
    let mut ctx = Context::new();
    ctx.register_type(
        ComplexType::new("Address")
            .with_property(PropertyType::new("city", ValueType::String)),
    )
    .unwrap();
    ctx.register_type(
        ComplexType::new("Person")
            .with_property(PropertyType::new("name", ValueType::String))
            .with_property(PropertyType::new("age", ValueType::Number).with_default(json!(0)))
            .with_property(PropertyType::new("id", ValueType::String).with_read_only())
            .with_property(PropertyType::new(
                "address",
                ValueType::Complex("Address".to_string()),
            ))
            .with_property(PropertyType::new("tags", ValueType::list_of(ValueType::String)))
            .with_key("name"),
    )
    .unwrap();
    ctx
}

/// Create a committed person with the given name
#[allow(dead_code)]
pub fn create_person(ctx: &mut Context, name: &str) -> InstanceId {
    ctx.create_complex("Person", vec![("name", Value::from(name))])
        .unwrap()
}

/// Scalar string of an optional value, for terse assertions
#[allow(dead_code)]
pub fn text(value: Option<Value>) -> Option<String> {
    value
        .as_ref()
        .and_then(Value::as_json)
        .and_then(|j| j.as_str())
        .map(str::to_string)
}

/// Scalar strings of list elements
#[allow(dead_code)]
pub fn texts(values: &[Value]) -> Vec<String> {
    values
        .iter()
        .filter_map(|v| v.as_json().and_then(|j| j.as_str()).map(str::to_string))
        .collect()
}

#[allow(dead_code)]
pub fn strings(values: &[&str]) -> Vec<Value> {
    values.iter().map(|v| Value::from(*v)).collect()
}

/// A value rule for `module` contributing `apply`
#[allow(dead_code)]
pub fn value_rule(module: &str, apply: serde_json::Value) -> RuleSpec {
    RuleSpec::new(module, Apply::Value(apply))
}

#[allow(dead_code)]
pub fn user_rule(module: &str, user: &str, apply: serde_json::Value) -> RuleSpec {
    value_rule(module, apply).with_criterion(Criterion::User, user)
}
