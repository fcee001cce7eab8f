//! JSON-schema slimming for the LLM tool-calling wire format (`spec.md`
//! §4.11 step 2): remove `title`, flatten `anyOf: [{T}, {null}]` to `T`,
//! drop `default: null`. Builds the OpenAI-style function-schema
//! envelope the router hands to the LLM client.

use serde_json::{json, Map, Value};

use crate::tools::Tool;

fn slim(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            if let Some(any_of) = map.get("anyOf").and_then(|v| v.as_array()) {
                if any_of.len() == 2 {
                    let null_branch = any_of.iter().position(|v| v.get("type").and_then(|t| t.as_str()) == Some("null"));
                    if let Some(null_idx) = null_branch {
                        let other_idx = 1 - null_idx;
                        let mut rest = map.clone();
                        rest.remove("anyOf");
                        rest.remove("title");
                        rest.remove("default");
                        let mut merged = slim(&any_of[other_idx]).as_object().cloned().unwrap_or_default();
                        for (k, v) in rest {
                            merged.entry(k).or_insert(v);
                        }
                        return Value::Object(merged);
                    }
                }
            }

            let mut out = Map::new();
            for (k, v) in map {
                if k == "title" {
                    continue;
                }
                if k == "default" && v.is_null() {
                    continue;
                }
                out.insert(k.clone(), slim(v));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(slim).collect()),
        other => other.clone(),
    }
}

/// Build the OpenAI-style `{"type":"function","function":{...}}` entry
/// for a single tool, using its slimmed input schema.
pub fn function_schema(tool: &dyn Tool) -> Value {
    let description = tool.guidelines().unwrap_or_else(|| tool.description());
    json!({
        "type": "function",
        "function": {
            "name": tool.name(),
            "description": description,
            "parameters": slim(&tool.input_schema()),
        }
    })
}

/// Schema set for a whole tool collection, suitable for the `tools` field
/// of a chat-completion request.
pub fn function_schemas(tools: &[std::sync::Arc<dyn Tool>]) -> Vec<Value> {
    tools.iter().map(|t| function_schema(t.as_ref())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flattens_optional_anyof() {
        let input = json!({
            "title": "Foo",
            "properties": {
                "name": {
                    "anyOf": [{"type": "string"}, {"type": "null"}],
                    "default": null,
                    "title": "Name"
                }
            }
        });
        let out = slim(&input);
        assert!(out.get("title").is_none());
        let name_schema = &out["properties"]["name"];
        assert_eq!(name_schema["type"], "string");
        assert!(name_schema.get("default").is_none());
        assert!(name_schema.get("anyOf").is_none());
    }
}
