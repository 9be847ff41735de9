use serde_json::{Map, Value as JsonValue};

/// Copies the entries of `data` whose key is in `allowed`, in input order.
/// Keys missing from `data` are simply absent from the result.
pub fn filter_obj(data: &Map<String, JsonValue>, allowed: &[&str]) -> Map<String, JsonValue> {
    data.iter()
        .filter(|(key, _)| allowed.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}
