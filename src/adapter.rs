//! Provider adapters: translate between [`crate::message::Item`] and each
//! provider's wire format, in both directions, and translate each provider's
//! streaming wire events into the internal [`ResponseEvent`] sequence.
//!
//! This is the only place in the crate permitted to know provider wire
//! formats (spec.md §6, "the adapter layer owns these formats"). Two
//! dialects are supported on the OpenAI family: `chat` (messages with a role
//! and text, tool calls as a structured `tool_calls` array) and `responses`
//! (a flat list of typed items — `message`, `function_call`,
//! `custom_tool_call`, `function_call_output`, `reasoning`).

use crate::error::{Error, Result};
use crate::event::ResponseEvent;
use crate::message::{Item, ToolCall, ToolCallKind, WireApi};
use crate::utils::parse_sse_lines;
use async_trait::async_trait;
use futures::stream::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::pin::Pin;
use std::time::Duration;

pub type ResponseStream = Pin<Box<dyn Stream<Item = Result<ResponseEvent>> + Send>>;

/// Parameters that vary per call but not per adapter instance.
#[derive(Debug, Clone, Default)]
pub struct CallParams {
    pub model: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    /// Per-call override of the configured wire dialect.
    pub wire_api: Option<WireApi>,
}

/// One item already translated into a provider's wire shape.
///
/// Chat-dialect items serialize to a single JSON object per
/// `ChatCompletions` message; responses-dialect items serialize to one
/// typed input item. Kept as an enum of structured payloads (rather than raw
/// `Value`) so [`ProviderAdapter::from_wire`] can invert the translation for
/// the round-trip property in spec.md §8.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "wire")]
pub enum ProviderItem {
    ChatMessage {
        role: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        content: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        tool_calls: Option<Vec<Value>>,
        #[serde(skip_serializing_if = "Option::is_none")]
        tool_call_id: Option<String>,
    },
    Message {
        role: String,
        text: String,
    },
    FunctionCall {
        call_id: String,
        name: String,
        arguments: Value,
    },
    CustomToolCall {
        call_id: String,
        name: String,
        input: String,
    },
    FunctionCallOutput {
        call_id: String,
        arguments: Value,
        result: String,
    },
    CustomToolCallOutput {
        call_id: String,
        result: String,
    },
    Reasoning {
        id: String,
        summary: String,
        encrypted: Option<String>,
    },
}

/// Async streaming contract every provider implements.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Open a streaming request against the provider and return the
    /// translated event sequence.
    async fn stream_response(&self, history: &[Item], params: &CallParams) -> Result<ResponseStream>;

    /// Non-streaming call. Default implementation drains `stream_response`
    /// and concatenates text deltas; adapters overriding this should match
    /// that semantics.
    async fn generate_response(&self, history: &[Item], params: &CallParams) -> Result<String> {
        let mut stream = self.stream_response(history, params).await?;
        let mut text = String::new();
        while let Some(event) = stream.next().await {
            match event? {
                ResponseEvent::OutputTextDelta(delta) => text.push_str(&delta),
                ResponseEvent::Error(message) => return Err(Error::provider(message)),
                ResponseEvent::Completed { .. } => break,
                _ => {}
            }
        }
        Ok(text)
    }

    /// Providers with server-side conversation state return an opaque id
    /// attached to subsequent calls. Most providers have none.
    async fn conversations_create(&self) -> Result<Option<String>> {
        Ok(None)
    }

    /// Translate history into this adapter's wire format under `wire_api`.
    fn to_wire(&self, history: &[Item], wire_api: WireApi) -> Vec<ProviderItem>;

    /// Invert [`ProviderAdapter::to_wire`] for the `responses` dialect.
    /// Adapters that don't support the responses dialect may return an
    /// empty vec.
    fn from_wire(&self, items: &[ProviderItem]) -> Vec<Item> {
        let _ = items;
        Vec::new()
    }
}

/// Shared translation logic for OpenAI-family wire formats (`openai` and
/// `compatible` providers share this).
pub(crate) fn to_wire_openai(history: &[Item], wire_api: WireApi) -> Vec<ProviderItem> {
    match wire_api.resolve() {
        WireApi::Chat => to_chat(history),
        WireApi::Responses => to_responses(history),
        WireApi::Auto => unreachable!("resolve() never returns Auto"),
    }
}

fn tool_kind_for_call_id<'a>(history: &'a [Item], call_id: &str) -> Option<&'a ToolCall> {
    history.iter().find_map(|item| match item {
        Item::Assistant {
            tool_calls: Some(calls),
            ..
        } => calls.iter().find(|c| c.call_id == call_id),
        _ => None,
    })
}

fn to_chat(history: &[Item]) -> Vec<ProviderItem> {
    history
        .iter()
        .filter_map(|item| match item {
            Item::System { content } => Some(ProviderItem::ChatMessage {
                role: "system".to_string(),
                content: Some(content.clone()),
                tool_calls: None,
                tool_call_id: None,
            }),
            Item::User { content } => Some(ProviderItem::ChatMessage {
                role: "user".to_string(),
                content: Some(content.clone()),
                tool_calls: None,
                tool_call_id: None,
            }),
            Item::Assistant {
                content,
                tool_calls,
            } => {
                let wire_calls = tool_calls.as_ref().map(|calls| {
                    calls
                        .iter()
                        .map(|c| {
                            let arguments = match c.kind {
                                ToolCallKind::Function => c.arguments.to_string(),
                                ToolCallKind::Custom => c
                                    .arguments
                                    .get("patch")
                                    .or_else(|| c.arguments.get("input"))
                                    .and_then(Value::as_str)
                                    .unwrap_or_default()
                                    .to_string(),
                            };
                            json!({
                                "id": c.call_id,
                                "type": "function",
                                "function": {"name": c.name, "arguments": arguments},
                            })
                        })
                        .collect()
                });
                Some(ProviderItem::ChatMessage {
                    role: "assistant".to_string(),
                    content: content.clone(),
                    tool_calls: wire_calls,
                    tool_call_id: None,
                })
            }
            Item::Tool {
                tool_call_id,
                content,
            } => Some(ProviderItem::ChatMessage {
                role: "tool".to_string(),
                content: Some(content.clone()),
                tool_calls: None,
                tool_call_id: Some(tool_call_id.clone()),
            }),
            // Reasoning items are only forwarded to providers that accept
            // them on output; the chat dialect never does.
            Item::Reasoning { .. } => None,
        })
        .collect()
}

fn to_responses(history: &[Item]) -> Vec<ProviderItem> {
    let mut out = Vec::new();
    for item in history {
        match item {
            Item::System { content } => out.push(ProviderItem::Message {
                role: "system".to_string(),
                text: content.clone(),
            }),
            Item::User { content } => out.push(ProviderItem::Message {
                role: "user".to_string(),
                text: content.clone(),
            }),
            Item::Assistant {
                content,
                tool_calls,
            } => {
                if let Some(text) = content {
                    out.push(ProviderItem::Message {
                        role: "assistant".to_string(),
                        text: text.clone(),
                    });
                }
                if let Some(calls) = tool_calls {
                    for call in calls {
                        match call.kind {
                            ToolCallKind::Function => out.push(ProviderItem::FunctionCall {
                                call_id: call.call_id.clone(),
                                name: call.name.clone(),
                                arguments: call.arguments.clone(),
                            }),
                            ToolCallKind::Custom => {
                                let input = call
                                    .arguments
                                    .get("patch")
                                    .or_else(|| call.arguments.get("input"))
                                    .and_then(Value::as_str)
                                    .unwrap_or_default()
                                    .to_string();
                                out.push(ProviderItem::CustomToolCall {
                                    call_id: call.call_id.clone(),
                                    name: call.name.clone(),
                                    input,
                                });
                            }
                        }
                    }
                }
            }
            Item::Tool {
                tool_call_id,
                content,
            } => {
                let source = tool_kind_for_call_id(history, tool_call_id);
                match source.map(|c| c.kind) {
                    Some(ToolCallKind::Custom) => {
                        out.push(ProviderItem::CustomToolCallOutput {
                            call_id: tool_call_id.clone(),
                            result: content.clone(),
                        })
                    }
                    _ => out.push(ProviderItem::FunctionCallOutput {
                        call_id: tool_call_id.clone(),
                        arguments: source.map(|c| c.arguments.clone()).unwrap_or(Value::Null),
                        result: content.clone(),
                    }),
                }
            }
            Item::Reasoning {
                id,
                summary,
                encrypted,
            } => out.push(ProviderItem::Reasoning {
                id: id.clone(),
                summary: summary.clone(),
                encrypted: encrypted.clone(),
            }),
        }
    }
    out
}

/// Invert [`to_responses`]. Consecutive `Message{role:"assistant"}` +
/// `FunctionCall`/`CustomToolCall` items with no intervening `User`/`System`
/// message collapse back into one `Item::Assistant`.
pub(crate) fn from_wire_responses(items: &[ProviderItem]) -> Vec<Item> {
    let mut out: Vec<Item> = Vec::new();
    let mut pending_assistant_text: Option<String> = None;
    let mut pending_calls: Vec<ToolCall> = Vec::new();

    let flush = |out: &mut Vec<Item>,
                 text: &mut Option<String>,
                 calls: &mut Vec<ToolCall>| {
        if text.is_some() || !calls.is_empty() {
            let calls_opt = if calls.is_empty() {
                None
            } else {
                Some(std::mem::take(calls))
            };
            out.push(Item::Assistant {
                content: text.take(),
                tool_calls: calls_opt,
            });
        }
    };

    for item in items {
        match item {
            ProviderItem::Message { role, text } => match role.as_str() {
                "system" => {
                    flush(&mut out, &mut pending_assistant_text, &mut pending_calls);
                    out.push(Item::System {
                        content: text.clone(),
                    });
                }
                "user" => {
                    flush(&mut out, &mut pending_assistant_text, &mut pending_calls);
                    out.push(Item::User {
                        content: text.clone(),
                    });
                }
                "assistant" => {
                    flush(&mut out, &mut pending_assistant_text, &mut pending_calls);
                    pending_assistant_text = Some(text.clone());
                }
                _ => {}
            },
            ProviderItem::FunctionCall {
                call_id,
                name,
                arguments,
            } => pending_calls.push(ToolCall::function(
                call_id.clone(),
                name.clone(),
                arguments.clone(),
            )),
            ProviderItem::CustomToolCall {
                call_id,
                name,
                input,
            } => pending_calls.push(ToolCall::custom(
                call_id.clone(),
                name.clone(),
                json!({"patch": input}),
            )),
            ProviderItem::FunctionCallOutput { call_id, result, .. } => {
                flush(&mut out, &mut pending_assistant_text, &mut pending_calls);
                out.push(Item::tool(call_id.clone(), result.clone()));
            }
            ProviderItem::CustomToolCallOutput { call_id, result } => {
                flush(&mut out, &mut pending_assistant_text, &mut pending_calls);
                out.push(Item::tool(call_id.clone(), result.clone()));
            }
            ProviderItem::Reasoning {
                id,
                summary,
                encrypted,
            } => {
                flush(&mut out, &mut pending_assistant_text, &mut pending_calls);
                out.push(Item::Reasoning {
                    id: id.clone(),
                    summary: summary.clone(),
                    encrypted: encrypted.clone(),
                });
            }
            ProviderItem::ChatMessage { .. } => {}
        }
    }
    flush(&mut out, &mut pending_assistant_text, &mut pending_calls);
    out
}

fn provider_item_to_json(item: &ProviderItem) -> Value {
    match item {
        ProviderItem::ChatMessage {
            role,
            content,
            tool_calls,
            tool_call_id,
        } => {
            let mut obj = json!({"role": role, "content": content.clone().unwrap_or_default()});
            if let Some(calls) = tool_calls {
                obj["tool_calls"] = json!(calls);
            }
            if let Some(id) = tool_call_id {
                obj["tool_call_id"] = json!(id);
            }
            obj
        }
        ProviderItem::Message { role, text } => json!({
            "role": role,
            "content": [{"type": if role == "assistant" { "output_text" } else { "input_text" }, "text": text}],
        }),
        ProviderItem::FunctionCall {
            call_id,
            name,
            arguments,
        } => json!({
            "type": "function_call",
            "call_id": call_id,
            "name": name,
            "arguments": arguments.to_string(),
        }),
        ProviderItem::CustomToolCall {
            call_id,
            name,
            input,
        } => json!({
            "type": "custom_tool_call",
            "call_id": call_id,
            "name": name,
            "input": input,
        }),
        ProviderItem::FunctionCallOutput {
            call_id,
            arguments,
            result,
        } => json!({
            "type": "function_call_output",
            "call_id": call_id,
            "output": {"arguments": arguments, "result": result},
        }),
        ProviderItem::CustomToolCallOutput { call_id, result } => json!({
            "type": "custom_tool_call_output",
            "call_id": call_id,
            "output": result,
        }),
        ProviderItem::Reasoning {
            id,
            summary,
            encrypted,
        } => json!({
            "type": "reasoning",
            "id": id,
            "summary": summary,
            "encrypted_content": encrypted,
        }),
    }
}

// ===========================================================================
// OpenAI / compatible adapter
// ===========================================================================

/// Adapter for `openai` and `compatible` providers: dialect chosen by
/// `wire_api` (`chat` | `responses` | `auto`, `auto` resolving to `chat`)
/// or a per-call override.
pub struct OpenAiAdapter {
    http: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
    default_model: String,
    wire_api: WireApi,
}

impl OpenAiAdapter {
    pub fn new(
        api_key: Option<String>,
        base_url: impl Into<String>,
        default_model: impl Into<String>,
        wire_api: WireApi,
        timeout: Duration,
    ) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            api_key,
            base_url: base_url.into(),
            default_model: default_model.into(),
            wire_api,
        })
    }

    fn auth_header(&self) -> String {
        format!("Bearer {}", self.api_key.as_deref().unwrap_or("not-needed"))
    }

    fn resolve_wire_api(&self, params: &CallParams) -> WireApi {
        params.wire_api.unwrap_or(self.wire_api).resolve()
    }
}

#[async_trait]
impl ProviderAdapter for OpenAiAdapter {
    async fn stream_response(&self, history: &[Item], params: &CallParams) -> Result<ResponseStream> {
        let model = params.model.clone().unwrap_or_else(|| self.default_model.clone());
        match self.resolve_wire_api(params) {
            WireApi::Chat => self.stream_chat(history, &model, params).await,
            WireApi::Responses => self.stream_responses(history, &model, params).await,
            WireApi::Auto => unreachable!(),
        }
    }

    fn to_wire(&self, history: &[Item], wire_api: WireApi) -> Vec<ProviderItem> {
        to_wire_openai(history, wire_api)
    }

    fn from_wire(&self, items: &[ProviderItem]) -> Vec<Item> {
        from_wire_responses(items)
    }
}

impl OpenAiAdapter {
    async fn stream_chat(
        &self,
        history: &[Item],
        model: &str,
        params: &CallParams,
    ) -> Result<ResponseStream> {
        let messages: Vec<Value> = to_chat(history).iter().map(provider_item_to_json).collect();
        let mut body = json!({"model": model, "messages": messages, "stream": true});
        if let Some(max_tokens) = params.max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }
        if let Some(temperature) = params.temperature {
            body["temperature"] = json!(temperature);
        }

        let url = format!("{}/chat/completions", self.base_url);
        let response = self
            .http
            .post(&url)
            .header("Authorization", self.auth_header())
            .json(&body)
            .send()
            .await?;
        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(Error::api(format!("{status}: {text}")));
        }

        let lines = parse_sse_lines(response);
        let assembler = ChatAssembler::default();
        let stream = lines.scan(assembler, |assembler, payload| {
            let event = payload.and_then(|raw| assembler.process(&raw));
            futures::future::ready(Some(event))
        });
        let flattened = stream.flat_map(|events_result| {
            futures::stream::iter(match events_result {
                Ok(events) => events.into_iter().map(Ok).collect::<Vec<_>>(),
                Err(e) => vec![Err(e)],
            })
        });
        let with_created = futures::stream::once(async { Ok(ResponseEvent::Created) }).chain(flattened);
        Ok(Box::pin(with_created))
    }

    async fn stream_responses(
        &self,
        history: &[Item],
        model: &str,
        params: &CallParams,
    ) -> Result<ResponseStream> {
        let input: Vec<Value> = to_responses(history).iter().map(provider_item_to_json).collect();
        let mut body = json!({"model": model, "input": input, "stream": true});
        if let Some(max_tokens) = params.max_tokens {
            body["max_output_tokens"] = json!(max_tokens);
        }
        if let Some(temperature) = params.temperature {
            body["temperature"] = json!(temperature);
        }

        let url = format!("{}/responses", self.base_url);
        let response = self
            .http
            .post(&url)
            .header("Authorization", self.auth_header())
            .json(&body)
            .send()
            .await?;
        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(Error::api(format!("{status}: {text}")));
        }

        let lines = parse_sse_lines(response);
        let stream = lines.map(|payload| payload.and_then(|raw| parse_responses_event(&raw)));
        Ok(Box::pin(stream))
    }
}

/// Map one `response.*` SSE frame to zero or one [`ResponseEvent`]s.
fn parse_responses_event(raw: &str) -> Result<ResponseEvent> {
    let frame: Value =
        serde_json::from_str(raw).map_err(|e| Error::stream(format!("malformed frame: {e}")))?;
    let event_type = frame.get("type").and_then(Value::as_str).unwrap_or("");

    let event = match event_type {
        "response.created" => ResponseEvent::Created,
        "response.output_text.delta" | "output_text.delta" => {
            ResponseEvent::OutputTextDelta(text_field(&frame, "delta"))
        }
        "response.reasoning_text.delta" => {
            ResponseEvent::ReasoningTextDelta(text_field(&frame, "delta"))
        }
        "response.reasoning_summary_text.delta" => {
            ResponseEvent::ReasoningSummaryDelta(text_field(&frame, "delta"))
        }
        "response.output_item.done" => ResponseEvent::OutputItemDone(frame.clone()),
        "response.function_call_arguments.delta" => ResponseEvent::ToolCallDelta {
            call_id: text_field(&frame, "call_id"),
            name: frame.get("name").and_then(Value::as_str).map(str::to_string),
            fragment: text_field(&frame, "delta"),
            kind: ToolCallKind::Function,
        },
        "response.custom_tool_call_input.delta" => ResponseEvent::ToolCallDelta {
            call_id: text_field(&frame, "item_id"),
            name: None,
            fragment: text_field(&frame, "delta"),
            kind: ToolCallKind::Custom,
        },
        "response.function_call_arguments.done" => {
            let call_id = text_field(&frame, "call_id");
            let raw_args = text_field(&frame, "arguments");
            let args = serde_json::from_str(&raw_args).unwrap_or_else(|_| json!({"input": raw_args}));
            ResponseEvent::ToolCallReady(ToolCall::function(
                call_id,
                frame.get("name").and_then(Value::as_str).unwrap_or_default(),
                args,
            ))
        }
        "response.custom_tool_call_input.done" => {
            let call_id = text_field(&frame, "item_id");
            let input = text_field(&frame, "input");
            ResponseEvent::ToolCallReady(ToolCall::custom(call_id, "", json!({"patch": input})))
        }
        "response.output_item.added" => ResponseEvent::Ignored,
        "response.completed" => {
            let usage = frame.get("response").and_then(|r| r.get("usage")).map(|u| {
                (
                    u.get("input_tokens").and_then(Value::as_u64).unwrap_or(0),
                    u.get("output_tokens").and_then(Value::as_u64).unwrap_or(0),
                )
            });
            ResponseEvent::Completed { usage }
        }
        "response.failed" | "error" => {
            ResponseEvent::Error(text_field(&frame, "message"))
        }
        // rate_limits, response.in_progress, response.content_part.done,
        // response.output_text.done, and other non-semantic frames.
        _ => ResponseEvent::Ignored,
    };
    Ok(event)
}

fn text_field(frame: &Value, key: &str) -> String {
    frame.get(key).and_then(Value::as_str).unwrap_or_default().to_string()
}

/// Assembles chat-dialect streaming deltas into [`ResponseEvent`]s.
///
/// Chat completion chunks interleave tool-call argument fragments across
/// multiple deltas, indexed by a provider-assigned integer; this assembler
/// tracks one [`PartialToolCall`] per index and only emits `ToolCallReady`
/// once a chunk's `finish_reason` closes the choice out.
#[derive(Default)]
struct ChatAssembler {
    tool_calls: HashMap<u32, PartialToolCall>,
}

#[derive(Debug, Default)]
struct PartialToolCall {
    id: Option<String>,
    name: Option<String>,
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct ChatChunk {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    delta: ChatDelta,
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ChatDelta {
    content: Option<String>,
    tool_calls: Option<Vec<ChatToolCallDelta>>,
}

#[derive(Debug, Deserialize)]
struct ChatToolCallDelta {
    index: u32,
    id: Option<String>,
    function: Option<ChatFunctionDelta>,
}

#[derive(Debug, Deserialize)]
struct ChatFunctionDelta {
    name: Option<String>,
    arguments: Option<String>,
}

impl ChatAssembler {
    fn process(&mut self, raw: &str) -> Result<Vec<ResponseEvent>> {
        let chunk: ChatChunk = serde_json::from_str(raw)
            .map_err(|e| Error::stream(format!("failed to parse chat chunk: {e}")))?;
        let mut events = Vec::new();

        for choice in chunk.choices {
            if let Some(content) = choice.delta.content {
                if !content.is_empty() {
                    events.push(ResponseEvent::OutputTextDelta(content));
                }
            }

            if let Some(deltas) = choice.delta.tool_calls {
                for delta in deltas {
                    let entry = self.tool_calls.entry(delta.index).or_default();
                    if let Some(id) = delta.id {
                        entry.id = Some(id);
                    }
                    if let Some(function) = delta.function {
                        if let Some(name) = function.name {
                            entry.name = Some(name);
                        }
                        if let Some(args) = function.arguments {
                            entry.arguments.push_str(&args);
                        }
                    }
                }
            }

            if choice.finish_reason.is_some() {
                for (_, partial) in self.tool_calls.drain() {
                    if let (Some(id), Some(name)) = (partial.id, partial.name) {
                        let args = if partial.arguments.is_empty() {
                            json!({})
                        } else {
                            serde_json::from_str(&partial.arguments)
                                .unwrap_or_else(|_| json!({"input": partial.arguments}))
                        };
                        events.push(ResponseEvent::ToolCallReady(ToolCall::function(
                            id, name, args,
                        )));
                    }
                }
                events.push(ResponseEvent::Completed { usage: None });
            }
        }

        Ok(events)
    }
}

// ===========================================================================
// Anthropic adapter
// ===========================================================================

/// Adapter for the `anthropic` provider. When `model` does not begin with
/// `claude`, authentication switches to bearer-style headers for third-party
/// Anthropic-compatible gateways instead of the native `x-api-key` header.
pub struct AnthropicAdapter {
    http: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
    default_model: String,
    use_bearer_auth: bool,
}

impl AnthropicAdapter {
    pub fn new(
        api_key: Option<String>,
        base_url: impl Into<String>,
        default_model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let default_model = default_model.into();
        let use_bearer_auth = !default_model.to_lowercase().starts_with("claude");
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            api_key,
            base_url: base_url.into(),
            default_model,
            use_bearer_auth,
        })
    }

    fn to_anthropic_messages(history: &[Item]) -> (String, Vec<Value>) {
        let mut system = String::new();
        let mut content = Vec::new();
        for item in history {
            match item {
                Item::System { content: c } => {
                    system.push_str(c);
                    system.push('\n');
                }
                Item::User { content: c } => content.push(json!({"role": "user", "content": c})),
                Item::Assistant {
                    content: text,
                    tool_calls,
                } => {
                    let mut blocks = Vec::new();
                    if let Some(t) = text {
                        blocks.push(json!({"type": "text", "text": t}));
                    }
                    for call in tool_calls.iter().flatten() {
                        blocks.push(json!({
                            "type": "tool_use",
                            "id": call.call_id,
                            "name": call.name,
                            "input": call.arguments,
                        }));
                    }
                    content.push(json!({"role": "assistant", "content": blocks}));
                }
                Item::Tool {
                    tool_call_id,
                    content: c,
                } => content.push(json!({
                    "role": "user",
                    "content": [{"type": "tool_result", "tool_use_id": tool_call_id, "content": c}],
                })),
                Item::Reasoning { .. } => {}
            }
        }
        (system.trim().to_string(), content)
    }
}

#[async_trait]
impl ProviderAdapter for AnthropicAdapter {
    async fn stream_response(&self, history: &[Item], params: &CallParams) -> Result<ResponseStream> {
        let model = params.model.clone().unwrap_or_else(|| self.default_model.clone());
        let (system, messages) = Self::to_anthropic_messages(history);
        let mut body = json!({
            "model": model,
            "max_tokens": params.max_tokens.unwrap_or(1024),
            "messages": messages,
            "stream": true,
        });
        if !system.is_empty() {
            body["system"] = json!(system);
        }
        if let Some(temperature) = params.temperature {
            body["temperature"] = json!(temperature);
        }

        let url = format!("{}/v1/messages", self.base_url);
        let mut request = self.http.post(&url).json(&body);
        request = if self.use_bearer_auth {
            request.header(
                "Authorization",
                format!("Bearer {}", self.api_key.as_deref().unwrap_or("")),
            )
        } else {
            request
                .header("x-api-key", self.api_key.as_deref().unwrap_or(""))
                .header("anthropic-version", "2023-06-01")
        };

        let response = request.send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(Error::api(format!("{status}: {text}")));
        }

        let lines = parse_sse_lines(response);
        let assembler = AnthropicAssembler::default();
        let stream = lines.scan(assembler, |assembler, payload| {
            let event = payload.and_then(|raw| assembler.process(&raw));
            futures::future::ready(Some(event))
        });
        let flattened = stream.flat_map(|events_result| {
            futures::stream::iter(match events_result {
                Ok(events) => events.into_iter().map(Ok).collect::<Vec<_>>(),
                Err(e) => vec![Err(e)],
            })
        });
        Ok(Box::pin(flattened))
    }

    fn to_wire(&self, history: &[Item], _wire_api: WireApi) -> Vec<ProviderItem> {
        // Anthropic speaks its own content-block shape; to_wire here is used
        // only by tests/logging, not by the request path above.
        to_responses(history)
    }
}

#[derive(Default)]
struct AnthropicAssembler {
    /// index of the content block currently assembling tool-call input, if
    /// any, keyed by the block's index in the message.
    pending_tool: HashMap<u32, (String, String, String)>, // index -> (id, name, json buf)
}

impl AnthropicAssembler {
    fn process(&mut self, raw: &str) -> Result<Vec<ResponseEvent>> {
        let frame: Value =
            serde_json::from_str(raw).map_err(|e| Error::stream(format!("malformed frame: {e}")))?;
        let event_type = frame.get("type").and_then(Value::as_str).unwrap_or("");
        let mut events = Vec::new();

        match event_type {
            "message_start" => events.push(ResponseEvent::Created),
            "content_block_start" => {
                if let Some(block) = frame.get("content_block") {
                    if block.get("type").and_then(Value::as_str) == Some("tool_use") {
                        let index = frame.get("index").and_then(Value::as_u64).unwrap_or(0) as u32;
                        let id = block.get("id").and_then(Value::as_str).unwrap_or_default().to_string();
                        let name = block.get("name").and_then(Value::as_str).unwrap_or_default().to_string();
                        self.pending_tool.insert(index, (id, name, String::new()));
                    }
                }
            }
            "content_block_delta" => {
                let index = frame.get("index").and_then(Value::as_u64).unwrap_or(0) as u32;
                if let Some(delta) = frame.get("delta") {
                    match delta.get("type").and_then(Value::as_str) {
                        Some("text_delta") => {
                            let text = delta.get("text").and_then(Value::as_str).unwrap_or_default();
                            if !text.is_empty() {
                                events.push(ResponseEvent::OutputTextDelta(text.to_string()));
                            }
                        }
                        Some("input_json_delta") => {
                            let partial =
                                delta.get("partial_json").and_then(Value::as_str).unwrap_or_default();
                            if let Some((id, name, buf)) = self.pending_tool.get_mut(&index) {
                                buf.push_str(partial);
                                events.push(ResponseEvent::ToolCallDelta {
                                    call_id: id.clone(),
                                    name: Some(name.clone()),
                                    fragment: partial.to_string(),
                                    kind: ToolCallKind::Function,
                                });
                            }
                        }
                        _ => {}
                    }
                }
            }
            "content_block_stop" => {
                let index = frame.get("index").and_then(Value::as_u64).unwrap_or(0) as u32;
                if let Some((id, name, buf)) = self.pending_tool.remove(&index) {
                    let args = if buf.is_empty() {
                        json!({})
                    } else {
                        serde_json::from_str(&buf).unwrap_or_else(|_| json!({"input": buf}))
                    };
                    events.push(ResponseEvent::ToolCallReady(ToolCall::function(
                        id, name, args,
                    )));
                }
            }
            "message_delta" => {
                if let Some(usage) = frame.get("usage") {
                    let output = usage.get("output_tokens").and_then(Value::as_u64).unwrap_or(0);
                    events.push(ResponseEvent::TokenUsage {
                        prompt: 0,
                        completion: output,
                    });
                }
            }
            "message_stop" => events.push(ResponseEvent::Completed { usage: None }),
            "error" => {
                let message = frame
                    .get("error")
                    .and_then(|e| e.get("message"))
                    .and_then(Value::as_str)
                    .unwrap_or("error")
                    .to_string();
                events.push(ResponseEvent::Error(message));
            }
            _ => {}
        }

        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Item;

    fn sample_history() -> Vec<Item> {
        let mut history = vec![Item::system("be helpful"), Item::user("run ls")];
        history.push(Item::assistant_tool_calls(
            None,
            vec![ToolCall::function("c1", "shell", json!({"command": "ls"}))],
        ));
        history.push(Item::tool("c1", "file.txt\n"));
        history.push(Item::assistant_text("Here's the listing."));
        history
    }

    #[test]
    fn responses_round_trip_preserves_items_and_call_ids() {
        let history = sample_history();
        let wire = to_responses(&history);
        let back = from_wire_responses(&wire);
        assert_eq!(back.len(), history.len());
        for (original, reconstructed) in history.iter().zip(back.iter()) {
            match (original, reconstructed) {
                (Item::System { content: a }, Item::System { content: b }) => assert_eq!(a, b),
                (Item::User { content: a }, Item::User { content: b }) => assert_eq!(a, b),
                (
                    Item::Assistant {
                        content: ac,
                        tool_calls: at,
                    },
                    Item::Assistant {
                        content: bc,
                        tool_calls: bt,
                    },
                ) => {
                    assert_eq!(ac, bc);
                    let a_ids: Vec<_> = at.iter().flatten().map(|c| c.call_id.clone()).collect();
                    let b_ids: Vec<_> = bt.iter().flatten().map(|c| c.call_id.clone()).collect();
                    assert_eq!(a_ids, b_ids);
                }
                (
                    Item::Tool {
                        tool_call_id: a,
                        content: ac,
                    },
                    Item::Tool {
                        tool_call_id: b,
                        content: bc,
                    },
                ) => {
                    assert_eq!(a, b);
                    assert_eq!(ac, bc);
                }
                _ => panic!("item shape mismatch"),
            }
        }
    }

    #[test]
    fn chat_wire_serializes_tool_calls_as_json_string_arguments() {
        let history = sample_history();
        let wire = to_chat(&history);
        let assistant_with_calls = wire
            .iter()
            .find(|item| matches!(item, ProviderItem::ChatMessage { tool_calls: Some(_), .. }))
            .unwrap();
        if let ProviderItem::ChatMessage { tool_calls, .. } = assistant_with_calls {
            let calls = tool_calls.as_ref().unwrap();
            assert_eq!(calls.len(), 1);
            assert_eq!(calls[0]["function"]["name"], "shell");
            assert!(calls[0]["function"]["arguments"].is_string());
        }
    }

    #[test]
    fn responses_tool_call_ready_falls_back_to_input_on_parse_failure() {
        let event = parse_responses_event(
            r#"{"type":"response.function_call_arguments.done","call_id":"c1","name":"shell","arguments":"not json"}"#,
        )
        .unwrap();
        match event {
            ResponseEvent::ToolCallReady(call) => {
                assert_eq!(call.arguments, json!({"input": "not json"}));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn responses_completed_carries_usage_when_present() {
        let event = parse_responses_event(
            r#"{"type":"response.completed","response":{"usage":{"input_tokens":10,"output_tokens":5}}}"#,
        )
        .unwrap();
        match event {
            ResponseEvent::Completed { usage: Some((p, c)) } => {
                assert_eq!((p, c), (10, 5));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn responses_non_terminal_unknown_frame_is_ignored() {
        let event = parse_responses_event(r#"{"type":"response.in_progress"}"#).unwrap();
        assert!(matches!(event, ResponseEvent::Ignored));
    }

    #[test]
    fn chat_assembler_tolerates_split_argument_deltas() {
        let mut assembler = ChatAssembler::default();
        let chunk1 = r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"id":"c1","function":{"name":"search","arguments":"{\"q\""}}]},"finish_reason":null}]}"#;
        let chunk2 = r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"function":{"arguments":":\"rust\"}"}}]},"finish_reason":"tool_calls"}]}"#;
        assert!(assembler.process(chunk1).unwrap().is_empty());
        let events = assembler.process(chunk2).unwrap();
        let ready = events
            .iter()
            .find_map(|e| match e {
                ResponseEvent::ToolCallReady(c) => Some(c),
                _ => None,
            })
            .unwrap();
        assert_eq!(ready.arguments, json!({"q": "rust"}));
    }

    #[test]
    fn anthropic_adapter_picks_bearer_auth_for_non_claude_models() {
        let adapter = AnthropicAdapter::new(
            Some("key".into()),
            "https://gateway.example/v1",
            "gpt-4o-compatible",
            Duration::from_secs(30),
        )
        .unwrap();
        assert!(adapter.use_bearer_auth);

        let native = AnthropicAdapter::new(
            Some("key".into()),
            "https://api.anthropic.com",
            "claude-3-5-sonnet-20241022",
            Duration::from_secs(30),
        )
        .unwrap();
        assert!(!native.use_bearer_auth);
    }
}
