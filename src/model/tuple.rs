use indexmap::IndexMap;
use serde_json::Value;

/// One decoded JSON object from a response. `serde_json` is built with
/// `preserve_order`, so key order survives transformation.
pub type Tuple = serde_json::Map<String, Value>;

/// Query/body params and headers. Insertion-ordered so encoded query
/// strings come out in the order params were added.
pub type Params = IndexMap<String, Value>;

/// Recursive mapping merge: right side wins per leaf key, nested maps
/// recurse, arrays are replaced wholesale (never concatenated).
pub fn deep_merge(base: &Params, other: &Params) -> Params {
    let mut out = base.clone();
    for (key, value) in other {
        match (out.get_mut(key), value) {
            (Some(Value::Object(existing)), Value::Object(incoming)) => {
                *existing = deep_merge_objects(existing, incoming);
            }
            _ => {
                out.insert(key.clone(), value.clone());
            }
        }
    }
    out
}

fn deep_merge_objects(base: &Tuple, other: &Tuple) -> Tuple {
    let mut out = base.clone();
    for (key, value) in other {
        match (out.get_mut(key), value) {
            (Some(Value::Object(existing)), Value::Object(incoming)) => {
                *existing = deep_merge_objects(existing, incoming);
            }
            _ => {
                out.insert(key.clone(), value.clone());
            }
        }
    }
    out
}

/// Build a `Params` map from a JSON object literal. Panics on non-object
/// input; intended for fixtures and call sites with literal values.
pub fn params_from(value: Value) -> Params {
    match value {
        Value::Object(map) => map.into_iter().collect(),
        other => panic!("expected a JSON object, got {other}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deep_merge_right_wins_on_leaf_conflict() {
        let base = params_from(json!({"a": 1, "b": 2}));
        let other = params_from(json!({"b": 3}));
        let merged = deep_merge(&base, &other);
        assert_eq!(merged["a"], json!(1));
        assert_eq!(merged["b"], json!(3));
    }

    #[test]
    fn test_deep_merge_recurses_into_nested_maps() {
        let base = params_from(json!({"user": {"id": 1, "name": "Jane"}}));
        let other = params_from(json!({"user": {"name": "Jill"}}));
        let merged = deep_merge(&base, &other);
        assert_eq!(merged["user"], json!({"id": 1, "name": "Jill"}));
    }

    #[test]
    fn test_deep_merge_replaces_arrays_wholesale() {
        let base = params_from(json!({"tags": [1, 2]}));
        let other = params_from(json!({"tags": [3]}));
        let merged = deep_merge(&base, &other);
        assert_eq!(merged["tags"], json!([3]));
    }

    #[test]
    fn test_deep_merge_preserves_insertion_order() {
        let base = params_from(json!({"a": 1, "b": 2}));
        let other = params_from(json!({"c": 3}));
        let merged = deep_merge(&base, &other);
        let keys: Vec<_> = merged.keys().cloned().collect();
        assert_eq!(keys, vec!["a", "b", "c"]);
    }
}
