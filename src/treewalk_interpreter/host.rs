//! Conversion between interpreter values and `serde_json` values.

use super::errors::ErrorKind;
use super::value::{Number, Value};

use std::collections::BTreeMap;

const MAX_DEPTH: usize = 256;

pub fn lift(json: serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Boolean(b),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => Value::int(i),
            None => n.as_f64().map(Value::float).unwrap_or(Value::Null),
        },
        serde_json::Value::String(s) => Value::String(s),
        serde_json::Value::Array(items) => Value::array(items.into_iter().map(lift).collect()),
        serde_json::Value::Object(map) => {
            let map: BTreeMap<_, _> = map.into_iter().map(|(k, v)| (k, lift(v))).collect();
            Value::hashmap(map)
        }
    }
}

pub fn lower(value: &Value) -> Result<serde_json::Value, ErrorKind> {
    lower_nested(value, 0)
}

fn lower_nested(value: &Value, depth: usize) -> Result<serde_json::Value, ErrorKind> {
    if depth > MAX_DEPTH {
        return Err(ErrorKind::InvalidValue(
            "Value is nested too deeply to convert to JSON".to_owned(),
        ));
    }

    Ok(match value {
        Value::Null => serde_json::Value::Null,
        Value::Boolean(b) => serde_json::Value::Bool(*b),
        Value::Number(Number::Int(n)) => serde_json::Value::from(*n),
        Value::Number(Number::Float(n)) => match serde_json::Number::from_f64(*n) {
            Some(n) => serde_json::Value::Number(n),
            None => {
                return Err(ErrorKind::InvalidValue(format!(
                    "{} cannot be represented in JSON",
                    n
                )))
            }
        },
        Value::String(s) => serde_json::Value::String(s.clone()),
        Value::Array(items) => {
            let items = items.borrow();
            let lowered = items
                .iter()
                .map(|item| lower_nested(item, depth + 1))
                .collect::<Result<Vec<_>, _>>()?;
            serde_json::Value::Array(lowered)
        }
        Value::HashMap(map) => {
            let mut object = serde_json::Map::new();
            for (key, item) in map.borrow().iter() {
                object.insert(key.clone(), lower_nested(item, depth + 1)?);
            }
            serde_json::Value::Object(object)
        }
        other => {
            return Err(ErrorKind::IllegalOperation(format!(
                "converting {} to JSON",
                other.type_name()
            )))
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_lift() {
        let value = lift(json!({"b": [1, 2.5, "x"], "a": null, "c": true}));
        assert_eq!(value.to_string(), r#"{"a": null, "b": [1, 2.5, "x"], "c": true}"#);
    }

    #[test]
    fn test_lower_keeps_integers() {
        let value = Value::array(vec![Value::int(3), Value::float(3.0), Value::str("s")]);
        assert_eq!(lower(&value).unwrap(), json!([3, 3.0, "s"]));
        assert!(lower(&value).unwrap()[0].is_i64());
    }

    #[test]
    fn test_lower_rejects_non_data() {
        assert!(lower(&Value::float(f64::NAN)).is_err());

        let cyclic = Value::array(vec![]);
        if let Value::Array(items) = &cyclic {
            items.borrow_mut().push(cyclic.clone());
        }
        assert!(lower(&cyclic).is_err());
        if let Value::Array(items) = &cyclic {
            items.borrow_mut().clear();
        }
    }
}
