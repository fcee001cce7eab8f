//! Auto-summary algorithm (`spec.md` §4.6.1). Grounded directly on
//! `hive/tools/base.py::_auto_summarize()`: given a nested result value
//! and a token budget `T`, produce a compact digest bounded to `4 * T`
//! characters.

use serde_json::{json, Map, Value};

const STRING_PASSTHROUGH_MAX: usize = 200;
const STRING_TRUNCATE_TO: usize = 100;

fn truncate_str(s: &str) -> Value {
    if s.chars().count() < STRING_PASSTHROUGH_MAX {
        json!(s)
    } else {
        let truncated: String = s.chars().take(STRING_TRUNCATE_TO).collect();
        json!(format!("{truncated}..."))
    }
}

fn sample_size(token_limit: usize) -> usize {
    (token_limit / 50).max(5)
}

fn summarize_list(items: &[Value], max_items: usize) -> Value {
    let sample: Vec<Value> = items
        .iter()
        .take(max_items)
        .map(|item| match item {
            Value::Object(obj) => {
                let mut out = Map::new();
                for (k, v) in obj {
                    match v {
                        Value::String(s) if s.chars().count() < STRING_PASSTHROUGH_MAX => {
                            out.insert(k.clone(), json!(s));
                        }
                        Value::Number(_) | Value::Bool(_) => {
                            out.insert(k.clone(), v.clone());
                        }
                        _ => {}
                    }
                }
                Value::Object(out)
            }
            Value::String(s) => truncate_str(s),
            other => other.clone(),
        })
        .collect();
    json!(sample)
}

fn summarize_value(value: &Value, max_items: usize) -> Value {
    match value {
        Value::String(s) => truncate_str(s),
        Value::Number(_) | Value::Bool(_) | Value::Null => value.clone(),
        Value::Array(items) => summarize_list(items, max_items),
        Value::Object(obj) => {
            let mut out = Map::new();
            for (k, v) in obj {
                match v {
                    Value::Array(items) => {
                        out.insert(format!("{k}_count"), json!(items.len()));
                        out.insert(format!("{k}_sample"), summarize_list(items, max_items));
                    }
                    Value::Object(_) => {
                        out.insert(k.clone(), shallow_scalars(v));
                    }
                    other => {
                        out.insert(k.clone(), summarize_value(other, max_items));
                    }
                }
            }
            Value::Object(out)
        }
    }
}

fn shallow_scalars(value: &Value) -> Value {
    match value {
        Value::Object(obj) => {
            let mut out = Map::new();
            for (k, v) in obj {
                match v {
                    Value::String(s) => {
                        out.insert(k.clone(), truncate_str(s));
                    }
                    Value::Number(_) | Value::Bool(_) | Value::Null => {
                        out.insert(k.clone(), v.clone());
                    }
                    _ => {}
                }
            }
            Value::Object(out)
        }
        other => other.clone(),
    }
}

/// Produce the bounded digest used as a tool message's content when fed
/// back into the LLM loop.
pub fn auto_summarize(result: &Value, token_limit: usize) -> String {
    let max_items = sample_size(token_limit);
    let digest = summarize_value(result, max_items);
    let serialized = serde_json::to_string(&digest).unwrap_or_else(|_| "{}".to_string());
    let hard_cap = 4 * token_limit;
    if serialized.chars().count() > hard_cap {
        serialized.chars().take(hard_cap).collect()
    } else {
        serialized
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_strings_pass_through() {
        let v = json!({"name": "pUC19"});
        let out = auto_summarize(&v, 500);
        assert!(out.contains("pUC19"));
    }

    #[test]
    fn long_strings_are_truncated_with_ellipsis() {
        let long = "A".repeat(300);
        let v = json!({"sequence": long});
        let out = auto_summarize(&v, 500);
        assert!(out.contains("..."));
        assert!(!out.contains(&"A".repeat(300)));
    }

    #[test]
    fn lists_become_count_and_sample() {
        let items: Vec<Value> = (0..20).map(|i| json!({"name": format!("f{i}")})).collect();
        let v = json!({"features": items});
        let out = auto_summarize(&v, 500);
        assert!(out.contains("features_count"));
        assert!(out.contains("features_sample"));
        assert!(out.contains("20"));
    }

    #[test]
    fn hard_cap_is_enforced() {
        let items: Vec<Value> = (0..10_000).map(|i| json!({"name": format!("feature-number-{i}")})).collect();
        let v = json!({"features": items});
        let out = auto_summarize(&v, 10);
        assert!(out.chars().count() <= 40);
    }
}
