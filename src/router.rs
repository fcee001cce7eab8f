//! Agentic router (C13). Grounded on `hive/tools/router.py::_unified_loop()`:
//! three input modes (`//direct`, `/guided`, free-text natural language),
//! a bounded tool-calling loop with per-turn tool narrowing, an
//! out-of-band auto-pipe cache for large tool outputs, and cooperative
//! cancellation.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{mpsc, watch};

use crate::config::LlmConfig;
use crate::error::{HiveError, HiveResult};
use crate::llm::{ChatMessage, LlmClient};
use crate::models::{ChainStep, ProgressEvent, TokenUsage};
use crate::tools::{schema, Tool, ToolRegistry};

const SYSTEM_PROMPT: &str = "\
You are the lab assistant for a local sequence library. Use tools only when a \
request needs library data, sequence math, or a similarity search — never for \
small talk or things you already know. Chain at most one tool call per kind of \
step (search then profile then extract, for instance); don't repeat a tool \
with the same arguments. When you report a tool's result, describe what it \
found in plain language instead of reprinting raw JSON.";

/// Some providers require a non-empty `tools` array whenever earlier `tool`
/// role messages are present in the conversation. Sent together with
/// `tool_choice="none"` once the loop wants a final text turn, so those
/// providers don't reject the request outright.
fn noop_tool_schema() -> Vec<Value> {
    vec![serde_json::json!({
        "type": "function",
        "function": {
            "name": "_noop",
            "description": "n/a",
            "parameters": { "type": "object", "properties": {} },
        }
    })]
}

#[derive(Debug, Clone)]
pub enum RouterResponse {
    /// `args` was empty and the tool has required fields: the caller
    /// should render an input form instead of executing anything.
    Form { tool: String, schema: Value },
    Message { text: String, tokens: TokenUsage },
    ToolResult { tool: String, data: Value, content: String, chain: Vec<ChainStep>, tokens: TokenUsage },
    Cancelled,
}

/// Split `//name rest` / `/name rest` into `(name, rest)`.
fn split_command(rest: &str) -> (&str, &str) {
    match rest.split_once(char::is_whitespace) {
        Some((name, args)) => (name, args.trim()),
        None => (rest.trim(), ""),
    }
}

fn schema_has_required_fields(schema: &Value) -> bool {
    schema
        .get("required")
        .and_then(|r| r.as_array())
        .map(|a| !a.is_empty())
        .unwrap_or(false)
}

/// `None` means "return a form"; `Some` is the parsed argument object.
fn parse_direct_args(tool: &dyn Tool, args: &str) -> Option<Value> {
    if args.is_empty() {
        return if schema_has_required_fields(&tool.input_schema()) {
            None
        } else {
            Some(Value::Object(Default::default()))
        };
    }
    match serde_json::from_str::<Value>(args) {
        Ok(v) if v.is_object() => Some(v),
        _ => Some(serde_json::json!({ "query": args })),
    }
}

pub async fn dispatch(
    text: &str,
    history: &[ChatMessage],
    registry: &ToolRegistry,
    llm: Option<&LlmClient>,
    llm_config: &LlmConfig,
    progress: &mpsc::UnboundedSender<ProgressEvent>,
    cancel: &watch::Receiver<bool>,
) -> HiveResult<RouterResponse> {
    let trimmed = text.trim();

    if let Some(rest) = trimmed.strip_prefix("//") {
        return dispatch_direct(rest, registry, "direct").await;
    }

    if let Some(rest) = trimmed.strip_prefix('/') {
        let (name, args_str) = split_command(rest);
        let tool = registry
            .get(name)
            .ok_or_else(|| HiveError::NotFound(format!("Unknown tool '{name}'")))?;
        if let Some(llm) = llm {
            if tool.is_llm_tool() {
                let rewritten = format!("Use the {name} tool: {args_str}");
                return run_loop(llm, registry, history, &rewritten, llm_config, progress, cancel).await;
            }
        }
        return dispatch_direct(rest, registry, "guided").await;
    }

    let Some(llm) = llm else {
        return Ok(RouterResponse::Message {
            text: "No language model is configured.".into(),
            tokens: TokenUsage::default(),
        });
    };
    run_loop(llm, registry, history, trimmed, llm_config, progress, cancel).await
}

async fn dispatch_direct(rest: &str, registry: &ToolRegistry, mode: &str) -> HiveResult<RouterResponse> {
    let (name, args_str) = split_command(rest);
    let tool = registry
        .get(name)
        .ok_or_else(|| HiveError::NotFound(format!("Unknown tool '{name}'")))?;

    match parse_direct_args(tool.as_ref(), args_str) {
        None => Ok(RouterResponse::Form { tool: name.to_string(), schema: tool.input_schema() }),
        Some(args) => {
            let result = registry.execute(name, args.clone(), mode).await;
            let content = tool.format_result(&result);
            Ok(RouterResponse::ToolResult {
                tool: name.to_string(),
                data: result,
                content: content.clone(),
                chain: vec![ChainStep {
                    tool: name.to_string(),
                    params: args,
                    summary: content,
                    widget: tool.widget().to_string(),
                }],
                tokens: TokenUsage::default(),
            })
        }
    }
}

/// Tools allowed on the turn immediately after each tool (`spec.md` §4.11.1).
/// Anything not listed here (including every terminal tool) maps to the
/// empty set, forcing a text turn.
fn next_tools(last: &str) -> &'static [&'static str] {
    match last {
        "search" => &["extract", "profile", "features", "primers", "blast"],
        "profile" => &["extract", "features", "primers", "blast"],
        "features" => &["extract", "blast"],
        "primers" => &["extract", "blast"],
        "extract" => &["blast", "translate", "transcribe", "revcomp", "digest", "gc"],
        _ => &[],
    }
}

struct ParsedToolCall {
    id: String,
    name: String,
    args: Value,
}

fn parse_tool_calls(raw: &[Value]) -> Vec<ParsedToolCall> {
    raw.iter()
        .filter_map(|tc| {
            let id = tc.get("id")?.as_str()?.to_string();
            let func = tc.get("function")?;
            let name = func.get("name")?.as_str()?.to_string();
            let args_str = func.get("arguments").and_then(|a| a.as_str()).unwrap_or("{}");
            let mut args: Value = serde_json::from_str(args_str).unwrap_or_else(|_| serde_json::json!({}));
            if let Some(obj) = args.as_object_mut() {
                obj.retain(|_, v| !v.is_null());
            }
            Some(ParsedToolCall { id, name, args })
        })
        .collect()
}

/// Replace short/missing parameter values with a previously-cached large
/// result (`spec.md` §4.11 step 5.e "auto-pipe inject").
fn inject_from_cache(tool: &dyn Tool, args: &mut Value, cache: &HashMap<String, String>, pipe_min_length: usize) {
    let schema = tool.input_schema();
    let Some(props) = schema.get("properties").and_then(|p| p.as_object()) else { return };
    let Some(obj) = args.as_object_mut() else { return };

    for key in props.keys() {
        let Some(cached) = cache.get(key) else { continue };
        let needs_replace = match obj.get(key) {
            None => true,
            Some(Value::Null) => true,
            Some(Value::String(s)) => s.is_empty() || s.len() < pipe_min_length,
            _ => false,
        };
        if needs_replace {
            obj.insert(key.clone(), Value::String(cached.clone()));
        }
    }
}

/// Stash every large string result field out-of-band so it never re-enters
/// the LLM context directly ("auto-pipe stash").
fn stash_to_cache(result: &Value, cache: &mut HashMap<String, String>, pipe_min_length: usize) {
    let Some(obj) = result.as_object() else { return };
    for (key, value) in obj {
        if let Value::String(s) = value {
            if s.len() >= pipe_min_length {
                cache.insert(key.clone(), s.clone());
            }
        }
    }
}

fn filter_tools(tools: &[Arc<dyn Tool>], allowed: &[&str]) -> Vec<Arc<dyn Tool>> {
    tools.iter().filter(|t| allowed.contains(&t.name())).cloned().collect()
}

async fn run_loop(
    llm: &LlmClient,
    registry: &ToolRegistry,
    history: &[ChatMessage],
    user_message: &str,
    config: &LlmConfig,
    progress: &mpsc::UnboundedSender<ProgressEvent>,
    cancel: &watch::Receiver<bool>,
) -> HiveResult<RouterResponse> {
    let mut messages: Vec<ChatMessage> = Vec::with_capacity(history.len() + 2);
    messages.push(ChatMessage {
        role: "system".into(),
        content: Some(SYSTEM_PROMPT.into()),
        tool_calls: None,
        tool_call_id: None,
        name: None,
    });
    messages.extend_from_slice(history);
    messages.push(ChatMessage {
        role: "user".into(),
        content: Some(user_message.to_string()),
        tool_calls: None,
        tool_call_id: None,
        name: None,
    });

    let all_llm_tools = registry.llm_tools();
    let mut current_tools = all_llm_tools.clone();

    let mut chain: Vec<ChainStep> = Vec::new();
    let mut cache: HashMap<String, String> = HashMap::new();
    let mut tokens = TokenUsage::default();
    let mut force_text = false;
    let mut last_result: Option<Value> = None;
    let mut last_tool: Option<String> = None;
    let mut exceeded = false;

    let _ = progress.send(ProgressEvent::Thinking);

    for _turn in 0..config.agent_max_turns {
        if *cancel.borrow() {
            return Ok(RouterResponse::Cancelled);
        }

        let (schemas, tool_choice) = if force_text {
            (Some(noop_tool_schema()), Some("none"))
        } else {
            (Some(schema::function_schemas(&current_tools)), None)
        };

        let response = match llm.chat(messages.clone(), schemas, tool_choice).await {
            Ok(r) => r,
            Err(_) => {
                exceeded = true;
                break;
            }
        };
        tokens.input += response.usage.prompt_tokens;
        tokens.output += response.usage.completion_tokens;

        let Some(choice) = response.choices.first() else {
            exceeded = true;
            break;
        };

        if choice.finish_reason == "refusal" {
            let text = choice.message.content.clone().unwrap_or_else(|| "The model declined to answer.".into());
            return Ok(RouterResponse::Message { text, tokens });
        }

        let tool_calls = choice.message.tool_calls.clone().unwrap_or_default();

        if tool_calls.is_empty() || force_text {
            let text = choice.message.content.clone().unwrap_or_default();
            return Ok(match last_tool {
                Some(tool) => RouterResponse::ToolResult {
                    tool,
                    data: last_result.unwrap_or(Value::Null),
                    content: text,
                    chain,
                    tokens,
                },
                None => RouterResponse::Message { text, tokens },
            });
        }

        messages.push(ChatMessage {
            role: "assistant".into(),
            content: choice.message.content.clone(),
            tool_calls: Some(tool_calls.clone()),
            tool_call_id: None,
            name: None,
        });

        for call in parse_tool_calls(&tool_calls) {
            if *cancel.borrow() {
                return Ok(RouterResponse::Cancelled);
            }

            let Some(tool) = registry.get(&call.name) else {
                messages.push(ChatMessage {
                    role: "tool".into(),
                    content: Some(serde_json::json!({ "error": format!("Unknown tool '{}'", call.name) }).to_string()),
                    tool_calls: None,
                    tool_call_id: Some(call.id),
                    name: Some(call.name),
                });
                continue;
            };

            let mut args = call.args;
            inject_from_cache(tool.as_ref(), &mut args, &cache, config.pipe_min_length);

            let _ = progress.send(ProgressEvent::Tool {
                tool: call.name.clone(),
                tools_used: chain.len() + 1,
                tokens,
            });

            let result = registry.execute(&call.name, args.clone(), "natural").await;
            stash_to_cache(&result, &mut cache, config.pipe_min_length);

            let content_for_llm = crate::tools::summary::auto_summarize(&result, config.summary_token_limit);
            messages.push(ChatMessage {
                role: "tool".into(),
                content: Some(content_for_llm),
                tool_calls: None,
                tool_call_id: Some(call.id),
                name: Some(call.name.clone()),
            });

            chain.push(ChainStep {
                tool: call.name.clone(),
                params: args,
                summary: tool.format_result(&result),
                widget: tool.widget().to_string(),
            });
            last_tool = Some(call.name.clone());
            last_result = Some(result);

            let _ = progress.send(ProgressEvent::Thinking);
        }

        match &last_tool {
            Some(name) => {
                let allowed = next_tools(name);
                if allowed.is_empty() {
                    force_text = true;
                } else {
                    current_tools = filter_tools(&all_llm_tools, allowed);
                }
            }
            None => force_text = true,
        }
    }

    let mut summary = chain
        .last()
        .map(|step| step.summary.clone())
        .unwrap_or_else(|| "No result.".to_string());
    if exceeded {
        summary.push_str(" (reached maximum reasoning steps)");
    }

    Ok(match last_tool {
        Some(tool) => RouterResponse::ToolResult {
            tool,
            data: last_result.unwrap_or(Value::Null),
            content: summary,
            chain,
            tokens,
        },
        None => RouterResponse::Message { text: summary, tokens },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_tools_narrows_after_search() {
        assert_eq!(next_tools("search"), &["extract", "profile", "features", "primers", "blast"]);
    }

    #[test]
    fn next_tools_is_empty_after_terminal_tool() {
        assert!(next_tools("blast").is_empty());
        assert!(next_tools("gc").is_empty());
    }

    #[test]
    fn noop_schema_has_no_required_parameters() {
        let schema = noop_tool_schema();
        assert_eq!(schema.len(), 1);
        assert_eq!(schema[0]["function"]["name"], "_noop");
        assert!(schema[0]["function"]["parameters"]["properties"].as_object().unwrap().is_empty());
    }

    #[test]
    fn direct_args_empty_with_required_fields_yields_form() {
        struct Dummy;
        impl Tool for Dummy {
            fn name(&self) -> &'static str { "dummy" }
            fn description(&self) -> &'static str { "d" }
            fn widget(&self) -> &'static str { "text" }
            fn tags(&self) -> &'static [&'static str] { &["llm"] }
            fn input_schema(&self) -> Value {
                serde_json::json!({"type": "object", "required": ["sequence"]})
            }
            fn execute<'a>(&'a self, params: Value, _mode: &'a str) -> crate::tools::BoxFuture<'a, anyhow::Result<Value>> {
                Box::pin(async move { Ok(params) })
            }
        }
        assert!(parse_direct_args(&Dummy, "").is_none());
        assert!(parse_direct_args(&Dummy, "ATGC").is_some());
    }

    #[test]
    fn auto_pipe_inject_replaces_short_value() {
        struct Dummy;
        impl Tool for Dummy {
            fn name(&self) -> &'static str { "extract" }
            fn description(&self) -> &'static str { "d" }
            fn widget(&self) -> &'static str { "text" }
            fn tags(&self) -> &'static [&'static str] { &["llm"] }
            fn input_schema(&self) -> Value {
                serde_json::json!({"type": "object", "properties": {"sequence": {"type": "string"}}})
            }
            fn execute<'a>(&'a self, params: Value, _mode: &'a str) -> crate::tools::BoxFuture<'a, anyhow::Result<Value>> {
                Box::pin(async move { Ok(params) })
            }
        }
        let mut cache = HashMap::new();
        cache.insert("sequence".to_string(), "A".repeat(300));
        let mut args = serde_json::json!({"sequence": ""});
        inject_from_cache(&Dummy, &mut args, &cache, 200);
        assert_eq!(args["sequence"].as_str().unwrap().len(), 300);
    }

    #[test]
    fn auto_pipe_stash_only_keeps_long_strings() {
        let mut cache = HashMap::new();
        let result = serde_json::json!({"short": "hi", "long": "x".repeat(250)});
        stash_to_cache(&result, &mut cache, 200);
        assert!(!cache.contains_key("short"));
        assert!(cache.contains_key("long"));
    }

    /// A cancel flag set before the loop starts must short-circuit before
    /// any LLM call — exercised with an unreachable base URL to prove no
    /// network access was attempted.
    #[tokio::test]
    async fn dispatch_returns_cancelled_without_calling_the_llm() {
        let entry = crate::config::ModelEntry {
            provider: "ollama".into(),
            model: "llama3".into(),
            base_url: Some("http://127.0.0.1:1".into()),
            api_key: None,
        };
        let llm = LlmClient::new(entry);
        let registry = ToolRegistry::new();
        let llm_config = LlmConfig::default();
        let (progress_tx, _progress_rx) = mpsc::unbounded_channel();
        let (cancel_tx, cancel_rx) = watch::channel(false);
        cancel_tx.send(true).unwrap();

        let response = dispatch("extract GFP from pGFP", &[], &registry, Some(&llm), &llm_config, &progress_tx, &cancel_rx)
            .await
            .unwrap();
        assert!(matches!(response, RouterResponse::Cancelled));
    }
}
