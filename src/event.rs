//! Closed event sum types for the two stages of the pipeline: the provider
//! stream feeding the agent loop ([`ResponseEvent`]), and the agent loop
//! feeding the UI ([`AgentEvent`]).
//!
//! Both are tagged unions enumerated once rather than open dictionaries, per
//! the design note in spec.md §9: consumers pattern-match exhaustively and
//! provider-specific non-semantic wire events are normalized to `Ignored` at
//! the adapter boundary rather than leaking upstream.

use crate::message::{ToolCall, ToolCallKind};
use serde_json::Value;

/// One event translated from a provider's streaming wire format.
#[derive(Debug, Clone)]
pub enum ResponseEvent {
    /// Stream opened; no content yet.
    Created,
    /// Incremental assistant text. Both `response.output_text.delta` and the
    /// bare `output_text.delta` spelling map here.
    OutputTextDelta(String),
    /// Incremental reasoning trace text.
    ReasoningTextDelta(String),
    /// Incremental reasoning summary text.
    ReasoningSummaryDelta(String),
    /// A provider-side output item completed assembling (opaque metadata).
    OutputItemDone(Value),
    /// A fragment of a tool call's arguments/input still being assembled.
    ToolCallDelta {
        call_id: String,
        name: Option<String>,
        fragment: String,
        kind: ToolCallKind,
    },
    /// A tool call finished assembling and is ready to run.
    ToolCallReady(ToolCall),
    /// Provider-reported token usage for the turn so far.
    TokenUsage { prompt: u64, completion: u64 },
    /// Terminal success event for the stream.
    Completed { usage: Option<(u64, u64)> },
    /// Terminal failure event for the stream; no further events follow.
    Error(String),
    /// A provider-specific event with no semantic meaning to the core
    /// (`rate_limits`, `web_search_begin`, and similar).
    Ignored,
}

/// One event the agent loop emits for the UI to render.
#[derive(Debug, Clone)]
pub enum AgentEvent {
    UserMessage(String),
    LlmStreamStart,
    LlmChunk(String),
    ReasoningChunk(String),
    /// Request-to-run: the agent is about to ask for confirmation on this
    /// call.
    ToolCall {
        call_id: String,
        name: String,
        arguments: Value,
    },
    ToolResult {
        call_id: String,
        name: String,
        result: Option<Value>,
        success: bool,
        error: Option<String>,
        arguments: Value,
    },
    ToolError {
        call_id: String,
        name: String,
        message: String,
    },
    TurnTokenUsage { prompt: u64, completion: u64 },
    TurnComplete { turn_index: u32 },
    TaskComplete,
    MaxIterations { iterations: u32, turn_index: u32 },
    Error(String),
    /// Status indicator only (see DESIGN.md Open Question #3) — never an
    /// interactive prompt the UI must answer before the loop proceeds.
    WaitingForUser,
}

impl AgentEvent {
    /// Whether this event is one of the three terminal, per-task events
    /// (exactly one of which spec.md §8 requires to be emitted, last, per
    /// task).
    pub fn is_task_terminal(&self) -> bool {
        matches!(
            self,
            AgentEvent::TaskComplete | AgentEvent::MaxIterations { .. } | AgentEvent::Error(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_complete_variants_are_terminal() {
        assert!(AgentEvent::TaskComplete.is_task_terminal());
        assert!(
            AgentEvent::MaxIterations {
                iterations: 2,
                turn_index: 1
            }
            .is_task_terminal()
        );
        assert!(AgentEvent::Error("x".into()).is_task_terminal());
        assert!(!AgentEvent::LlmChunk("hi".into()).is_task_terminal());
    }
}
