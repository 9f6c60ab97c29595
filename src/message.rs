//! Provider-neutral conversation data model.
//!
//! These types are the "internal protocol" wire formats converge on: a
//! [`Item`] is exactly one entry of [`crate::history::ConversationHistory`],
//! and a [`ToolCall`]/[`ToolResult`] pair is the correlation unit between the
//! agent loop and the tool executor. Nothing here knows about any provider's
//! wire format — that translation lives in [`crate::adapter`].

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Whether a tool call carries structured JSON arguments or an opaque text
/// blob (typically a diff/patch).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolCallKind {
    /// Structured JSON-object arguments.
    Function,
    /// Opaque string input, e.g. a patch.
    Custom,
}

/// A model-issued request to invoke a named side-effecting function.
///
/// `call_id` is the correlation key with the later [`Item::Tool`] result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub call_id: String,
    pub name: String,
    pub kind: ToolCallKind,
    /// Parsed JSON object for `Function` calls, `{"input": raw}` for `Custom`
    /// calls whose raw text did not parse as JSON.
    pub arguments: Value,
}

impl ToolCall {
    pub fn function(call_id: impl Into<String>, name: impl Into<String>, arguments: Value) -> Self {
        Self {
            call_id: call_id.into(),
            name: name.into(),
            kind: ToolCallKind::Function,
            arguments,
        }
    }

    pub fn custom(call_id: impl Into<String>, name: impl Into<String>, arguments: Value) -> Self {
        Self {
            call_id: call_id.into(),
            name: name.into(),
            kind: ToolCallKind::Custom,
            arguments,
        }
    }
}

/// Outcome of running one [`ToolCall`] through the executor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    pub call_id: String,
    pub success: bool,
    /// Present when `success` is true.
    pub result: Option<Value>,
    /// Present when `success` is false.
    pub error: Option<String>,
    pub metadata: Option<Value>,
}

impl ToolResult {
    pub fn ok(call_id: impl Into<String>, result: Value) -> Self {
        Self {
            call_id: call_id.into(),
            success: true,
            result: Some(result),
            error: None,
            metadata: None,
        }
    }

    pub fn err(call_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            success: false,
            result: None,
            error: Some(error.into()),
            metadata: None,
        }
    }

    /// The human-facing text for this result: the structured `summary` field
    /// when `result` is an object that has one, else the stringified result
    /// or error.
    pub fn display_content(&self) -> String {
        if !self.success {
            return self
                .error
                .clone()
                .unwrap_or_else(|| "tool failed".to_string());
        }
        match &self.result {
            Some(Value::Object(map)) => match map.get("summary") {
                Some(Value::String(s)) => s.clone(),
                Some(other) => other.to_string(),
                None => Value::Object(map.clone()).to_string(),
            },
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => String::new(),
        }
    }
}

/// One append-only conversation-history entry.
///
/// Matches spec.md §3's `LLMMessage` one-for-one: `System` is valid only at
/// index 0, `Assistant` carries `content` and/or `tool_calls` (at least one
/// present), `Tool` is the result of a completed call, `Reasoning` is a
/// provider reasoning trace round-tripped verbatim where the provider
/// requires it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Item {
    System {
        content: String,
    },
    User {
        content: String,
    },
    Assistant {
        #[serde(skip_serializing_if = "Option::is_none")]
        content: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        tool_calls: Option<Vec<ToolCall>>,
    },
    Tool {
        tool_call_id: String,
        content: String,
    },
    Reasoning {
        id: String,
        summary: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        encrypted: Option<String>,
    },
}

impl Item {
    pub fn system(content: impl Into<String>) -> Self {
        Item::System {
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Item::User {
            content: content.into(),
        }
    }

    pub fn assistant_text(content: impl Into<String>) -> Self {
        Item::Assistant {
            content: Some(content.into()),
            tool_calls: None,
        }
    }

    pub fn assistant_tool_calls(content: Option<String>, tool_calls: Vec<ToolCall>) -> Self {
        Item::Assistant {
            content,
            tool_calls: Some(tool_calls),
        }
    }

    pub fn tool(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Item::Tool {
            tool_call_id: tool_call_id.into(),
            content: content.into(),
        }
    }

    /// `call_id`s announced by this item, if it is an assistant item with
    /// tool calls. Used to check the History invariant that every `Tool`
    /// item references a preceding announcement.
    pub fn announced_call_ids(&self) -> Vec<&str> {
        match self {
            Item::Assistant {
                tool_calls: Some(calls),
                ..
            } => calls.iter().map(|c| c.call_id.as_str()).collect(),
            _ => Vec::new(),
        }
    }
}

/// Provider tag. `openai` and `compatible` share one adapter; `anthropic`
/// has its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    OpenAi,
    Compatible,
    Anthropic,
}

/// Streaming wire dialect for OpenAI-family providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WireApi {
    Chat,
    Responses,
    /// Resolves to `Chat` — every OpenAI-compatible local server this crate
    /// targets actually implements the chat-completions dialect.
    Auto,
}

impl WireApi {
    pub fn resolve(self) -> WireApi {
        match self {
            WireApi::Auto => WireApi::Chat,
            other => other,
        }
    }
}

/// Immutable per-agent provider configuration.
#[derive(Debug, Clone)]
pub struct LLMConfig {
    pub provider: ProviderKind,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub model: String,
    pub wire_api: WireApi,
    pub timeout_secs: u64,
    pub retry_attempts: u32,
    pub max_turns: u32,
    pub max_iterations: u32,
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Compatible,
            api_key: None,
            base_url: None,
            model: "gpt-5-codex".to_string(),
            wire_api: WireApi::Auto,
            timeout_secs: 60,
            retry_attempts: 2,
            max_turns: 20,
            max_iterations: 20,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn tool_result_display_content_prefers_summary() {
        let r = ToolResult::ok("c1", json!({"summary": "3 files changed", "detail": {}}));
        assert_eq!(r.display_content(), "3 files changed");
    }

    #[test]
    fn tool_result_display_content_stringifies_plain_result() {
        let r = ToolResult::ok("c1", json!("ok\n"));
        assert_eq!(r.display_content(), "ok\n");
    }

    #[test]
    fn tool_result_display_content_uses_error_on_failure() {
        let r = ToolResult::err("c1", "boom");
        assert_eq!(r.display_content(), "boom");
    }

    #[test]
    fn item_announced_call_ids_only_on_assistant_with_tool_calls() {
        let item = Item::assistant_tool_calls(
            None,
            vec![ToolCall::function("c1", "shell", json!({"command": "ls"}))],
        );
        assert_eq!(item.announced_call_ids(), vec!["c1"]);
        assert!(Item::user("hi").announced_call_ids().is_empty());
    }

    #[test]
    fn wire_api_auto_resolves_to_chat() {
        assert_eq!(WireApi::Auto.resolve(), WireApi::Chat);
        assert_eq!(WireApi::Responses.resolve(), WireApi::Responses);
    }
}
