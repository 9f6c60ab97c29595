//! # Agent Core
//!
//! The execution core for a terminal-resident coding assistant: multi-provider
//! LLM streaming, an append-only conversation history, risk-tiered tool
//! scheduling with a confirmation handshake, skills injection, and trajectory
//! recording for offline replay.
//!
//! ## Key Features
//!
//! - **Multi-provider streaming**: one [`agent::Agent`] drives OpenAI
//!   chat/responses dialects and Anthropic's messages API through a common
//!   [`adapter::ProviderAdapter`] trait.
//! - **Conversation as value**: [`history::ConversationHistory`] is an
//!   append-only log with one mutable owner; everyone else reads cheap
//!   snapshots.
//! - **Risk-tiered tools**: [`tools::RiskLevel`] drives which calls need
//!   user confirmation and which may run concurrently.
//! - **Skills injection**: [`skills`] discovers and loads `SKILL.md` bundles
//!   from repo/user/system/admin roots.
//! - **Session stats & trajectory**: [`session::SessionStats`] and
//!   [`session::TrajectoryRecorder`] track usage and append a JSONL replay
//!   log per session.
//! - **Retry logic**: exponential backoff with jitter for non-streaming
//!   calls ([`retry`]).
//!
//! ## Example
//!
//! ```rust,no_run
//! use agent_core::{Agent, AutoConfirm, LLMConfig, ToolRegistry};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = LLMConfig::default();
//!     let registry = ToolRegistry::new();
//!     let mut agent = Agent::new(config, registry, Arc::new(AutoConfirm), "You are helpful.")?;
//!
//!     agent
//!         .run_task("t1", "What's 2+2?", |event| {
//!             println!("{event:?}");
//!         })
//!         .await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - **message**: provider-neutral conversation data model (`Item`,
//!   `ToolCall`, `ToolResult`, `LLMConfig`).
//! - **event**: closed event enums for each pipeline stage (`ResponseEvent`,
//!   `AgentEvent`).
//! - **history**: the append-only `ConversationHistory` value type.
//! - **adapter**: per-provider wire-format translation and SSE streaming.
//! - **client**: provider-dispatching `LlmClient`.
//! - **agent**: the turn/iteration state machine and system-prompt
//!   composition.
//! - **tools**: tool definitions, the registry, and the risk-tiered
//!   executor.
//! - **skills**: `SKILL.md` discovery, parsing, and system-bundle
//!   installation.
//! - **session**: process-wide stats and the trajectory recorder.
//! - **config**: provider connection helpers and session config/env
//!   resolution.
//! - **context**: token estimation and history truncation.
//! - **retry**: exponential backoff retry logic with jitter.
//! - **hooks**: lifecycle interception (pre/post tool use, prompt submit).
//! - **logging**: `tracing_subscriber` initialization.
//! - **error**: the `Error` enum and `Result<T>` alias used throughout.

// ============================================================================
// MODULE DECLARATIONS
// ============================================================================

/// The turn/iteration state machine consuming provider streams and
/// dispatching tool calls.
mod agent;

/// Per-provider wire-format translation and SSE/streaming transport.
mod adapter;

/// Provider-dispatching client wrapping one `ProviderAdapter`.
mod client;

/// Provider connection helpers, plus session config file / environment
/// variable resolution.
pub mod config;

/// Context window management: token estimation and history truncation.
mod context;

/// Error types and conversions used across all public APIs.
mod error;

/// Closed event sum types for the provider stream and the agent-to-UI
/// stream.
mod event;

/// Append-only conversation history value type.
mod history;

/// Lifecycle hooks for intercepting tool use and prompt submission.
mod hooks;

/// Structured logging initialization.
mod logging;

/// Provider-neutral conversation data model.
mod message;

/// Process-wide session stats and the trajectory recorder.
mod session;

/// `SKILL.md` discovery, parsing, and system-bundle installation.
mod skills;

/// Tool definition and risk-tiered execution system.
mod tools;

/// Internal utilities for SSE parsing.
mod utils;

// ============================================================================
// PUBLIC EXPORTS
// ============================================================================

/// Retry utilities with exponential backoff and jitter. Public as a module
/// so callers can reuse `RetryConfig` for their own operations.
pub mod retry;

// --- Agent Loop ---

pub use agent::{Agent, SystemPromptBuilder, Turn, TurnStatus, UiConfirmation};

// --- Provider-Neutral Data Model ---

pub use message::{Item, LLMConfig, ProviderKind, ToolCall, ToolCallKind, ToolResult, WireApi};

// --- Events ---

pub use event::{AgentEvent, ResponseEvent};

// --- Conversation History ---

pub use history::ConversationHistory;

// --- Provider Adapters ---

pub use adapter::{
    AnthropicAdapter, CallParams, OpenAiAdapter, ProviderAdapter, ProviderItem, ResponseStream,
};

// --- Client ---

pub use client::LlmClient;

// --- Provider Configuration Helpers ---

pub use config::{Provider, get_base_url, get_model};

// --- Context Management ---

pub use context::{estimate_tokens, is_approaching_limit, truncate_items};

// --- Error Handling ---

pub use error::{Error, Result, ToolExecutionKind};

// --- Lifecycle Hooks ---

pub use hooks::{
    HOOK_POST_TOOL_USE, HOOK_PRE_TOOL_USE, HOOK_USER_PROMPT_SUBMIT, HookDecision, Hooks,
    PostToolUseEvent, PreToolUseEvent, UserPromptSubmitEvent,
};

// --- Tool System ---

pub use tools::{
    AutoConfirm, ConfirmationHandler, Executor, RiskLevel, Tool, ToolBuilder, ToolRegistry, tool,
    read_file_tool, shell_tool, write_file_tool,
};

// --- Skills ---

pub use skills::{
    SkillError, SkillLoadOutcome, SkillMetadata, SkillScope, format_skill_summary,
    install_system_skills, load_skills, system_cache_root_dir,
};

// --- Session Stats & Trajectory ---

pub use session::{SessionStats, SessionStatsSnapshot, TrajectoryRecord, TrajectoryRecorder};

// --- Logging ---

pub use logging::{init as init_logging, resolve_level as resolve_log_level};

// ============================================================================
// CONVENIENCE PRELUDE
// ============================================================================

/// Convenience module bundling the most commonly used types for driving one
/// agent loop. Import with `use agent_core::prelude::*;`.
pub mod prelude {
    pub use crate::{
        Agent, AgentEvent, AutoConfirm, ConversationHistory, Error, Executor, HookDecision, Hooks,
        Item, LLMConfig, Result, RiskLevel, Tool, ToolCall, ToolRegistry, ToolResult,
        UiConfirmation, tool,
    };
}
