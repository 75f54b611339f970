//! Query string serialization for request parameters.

use serde_json::Value;

use crate::utils::encode_component;

/// Serialize a JSON object into a canonical query string (keys sorted,
/// empty values skipped). Nested objects become `key[sub]=value`, arrays
/// repeat the key.
pub fn encode_params(params: &Value) -> String {
    let Value::Object(map) = params else {
        return String::new();
    };

    let mut keys: Vec<&String> = map.keys().collect();
    keys.sort();

    let mut pairs = Vec::new();
    for key in keys {
        match &map[key.as_str()] {
            Value::Object(nested) => {
                let mut sub_keys: Vec<&String> = nested.keys().collect();
                sub_keys.sort();
                for sub_key in sub_keys {
                    if let Some(value) = scalar(&nested[sub_key.as_str()]) {
                        pairs.push(pair(&format!("{}[{}]", key, sub_key), &value));
                    }
                }
            }
            Value::Array(items) => {
                pairs.extend(items.iter().filter_map(scalar).map(|value| pair(key, &value)));
            }
            other => {
                if let Some(value) = scalar(other) {
                    pairs.push(pair(key, &value));
                }
            }
        }
    }
    pairs.join("&")
}

/// Append serialized `params` to `path`. Leaves `path` alone when nothing
/// survives serialization.
pub fn append_query(path: &str, params: Option<&Value>) -> String {
    let query = params.map(encode_params).unwrap_or_default();
    if query.is_empty() {
        path.to_string()
    } else if path.contains('?') {
        format!("{}&{}", path, query)
    } else {
        format!("{}?{}", path, query)
    }
}

fn pair(key: &str, value: &str) -> String {
    format!("{}={}", encode_component(key), encode_component(value))
}

/// String form of a value, or `None` for null and empty strings.
fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_encode_params_sorted_and_filtered() {
        let params = json!({
            "pageSize": 10,
            "deptName": "Cardiology & Vascular",
            "empty": "",
            "missing": null,
            "active": true
        });
        assert_eq!(
            encode_params(&params),
            "active=true&deptName=Cardiology%20%26%20Vascular&pageSize=10"
        );
    }

    #[test]
    fn test_encode_nested_and_array() {
        let params = json!({
            "params": {"endTime": "2024-01-31", "beginTime": "2024-01-01", "skip": null},
            "ids": [3, 1]
        });
        assert_eq!(
            encode_params(&params),
            "ids=3&ids=1&params%5BbeginTime%5D=2024-01-01&params%5BendTime%5D=2024-01-31"
        );
    }

    #[test]
    fn test_append_query() {
        assert_eq!(append_query("/c/dept/list", None), "/c/dept/list");
        assert_eq!(append_query("/c/dept/list", Some(&json!({"x": ""}))), "/c/dept/list");
        assert_eq!(append_query("/c/dept/list", Some(&json!({"page": 2}))), "/c/dept/list?page=2");
        assert_eq!(append_query("/c/dept/list?a=1", Some(&json!({"page": 2}))), "/c/dept/list?a=1&page=2");
    }

    #[test]
    fn test_non_object_params_are_ignored() {
        assert_eq!(encode_params(&json!(["a", "b"])), "");
        assert_eq!(encode_params(&json!("raw")), "");
    }
}
