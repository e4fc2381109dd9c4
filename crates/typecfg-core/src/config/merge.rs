//! Deep merge of configuration fragments

use serde_json::{Map, Value};

/// Merge `source` onto `target`
///
/// Objects merge key by key, recursively; any other source value replaces
/// the target value.
pub fn merge_into(target: &mut Value, source: Value) {
    match (target, source) {
        (Value::Object(t), Value::Object(s)) => {
            for (key, value) in s {
                match t.get_mut(&key) {
                    Some(existing) if existing.is_object() && value.is_object() => {
                        merge_into(existing, value)
                    }
                    _ => {
                        t.insert(key, value);
                    }
                }
            }
        }
        (t, s) => *t = s,
    }
}

/// Left-fold fragments over an empty object; `null` fragments contribute nothing
pub fn merge_all<I>(fragments: I) -> Value
where
    I: IntoIterator<Item = Value>,
{
    let mut acc = Value::Object(Map::new());
    for fragment in fragments {
        if !fragment.is_null() {
            merge_into(&mut acc, fragment);
        }
    }
    acc
}
