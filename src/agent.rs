//! The turn/iteration state machine: consumes a provider [`ResponseEvent`]
//! stream, appends to [`ConversationHistory`], dispatches tool calls through
//! [`Executor`], and emits [`AgentEvent`]s for the UI.
//!
//! New component — the teacher's `Client::send`/`receive` is a single-shot
//! auto-exec buffer with no turn/budget bookkeeping. Grounded on
//! `agent/base_agent.py`'s task/turn lifecycle and
//! `pywen_agent.py`'s system-prompt assembly, expressed with the teacher's
//! `futures::Stream` + `Arc<AtomicBool>` cancellation idiom.

use crate::adapter::CallParams;
use crate::client::LlmClient;
use crate::error::{Error, Result};
use crate::event::AgentEvent;
use crate::history::ConversationHistory;
use crate::hooks::{Hooks, PostToolUseEvent, PreToolUseEvent, UserPromptSubmitEvent};
use crate::message::{Item, LLMConfig, ToolCall, ToolResult};
use crate::session::{SessionStats, TrajectoryRecord, TrajectoryRecorder};
use crate::skills::SkillMetadata;
use crate::tools::{ConfirmationHandler, Executor, ToolRegistry};
use futures::StreamExt;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Terminal and non-terminal states of one [`Turn`]. Monotonic: only
/// `Active -> {Completed, MaxIterations, Error}` transitions are valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnStatus {
    Active,
    Completed,
    MaxIterations,
    Error,
}

/// Bookkeeping for one provider streaming request and its consumption,
/// bounded by a single `completed` event or its error equivalent.
#[derive(Debug, Clone)]
pub struct Turn {
    pub id: u32,
    pub iterations: u32,
    pub status: TurnStatus,
    pub total_tokens: u64,
}

impl Turn {
    fn new(id: u32) -> Self {
        Self {
            id,
            iterations: 0,
            status: TurnStatus::Active,
            total_tokens: 0,
        }
    }
}

/// A request the UI must answer before a [`crate::message::ToolCall`] with
/// [`crate::tools::RiskLevel::requires_confirmation`] runs.
#[async_trait::async_trait]
pub trait UiConfirmation: Send + Sync {
    async fn confirm_tool_call(&self, call: &ToolCall, display_name: &str) -> bool;
}

/// Bridges [`UiConfirmation`] into the [`ConfirmationHandler`] contract the
/// [`Executor`] expects; the agent is the only caller that has both a
/// `ToolCall` (for the bridge) and the registry (for `Executor`).
struct ConfirmationBridge(Arc<dyn UiConfirmation>);

#[async_trait::async_trait]
impl ConfirmationHandler for ConfirmationBridge {
    async fn confirm(&self, tool_name: &str, display_name: &str, arguments: &Value) -> bool {
        let call = ToolCall::function(String::new(), tool_name, arguments.clone());
        self.0.confirm_tool_call(&call, display_name).await
    }
}

/// Everything the agent loop needs beyond per-task inputs: provider client,
/// tool registry/executor wiring, session-wide counters, and optional
/// cross-cutting hooks. One `Agent` drives one [`ConversationHistory`]; the
/// spec requires no two tasks run concurrently against the same history.
pub struct Agent {
    client: LlmClient,
    config: LLMConfig,
    registry: Arc<ToolRegistry>,
    executor: Executor,
    history: ConversationHistory,
    stats: Arc<SessionStats>,
    trajectory: Option<Arc<TrajectoryRecorder>>,
    hooks: Hooks,
    cancelled: Arc<AtomicBool>,
    discovered_skills: Vec<SkillMetadata>,
    turn_counter: u32,
}

impl Agent {
    pub fn new(
        config: LLMConfig,
        registry: ToolRegistry,
        confirmation: Arc<dyn UiConfirmation>,
        system_prompt: impl Into<String>,
    ) -> Result<Self> {
        let client = LlmClient::new(&config)?;
        let registry = Arc::new(registry);
        let executor = Executor::new(
            Arc::clone(&registry),
            Arc::new(ConfirmationBridge(confirmation)),
        );
        Ok(Self {
            client,
            config,
            registry,
            executor,
            history: ConversationHistory::new(system_prompt),
            stats: Arc::new(SessionStats::new()),
            trajectory: None,
            hooks: Hooks::new(),
            cancelled: Arc::new(AtomicBool::new(false)),
            discovered_skills: Vec::new(),
            turn_counter: 0,
        })
    }

    pub fn with_trajectory(mut self, recorder: Arc<TrajectoryRecorder>) -> Self {
        self.trajectory = Some(recorder);
        self
    }

    pub fn with_hooks(mut self, hooks: Hooks) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn with_stats(mut self, stats: Arc<SessionStats>) -> Self {
        self.stats = stats;
        self
    }

    pub fn with_skills(mut self, skills: Vec<SkillMetadata>) -> Self {
        self.discovered_skills = skills;
        self
    }

    pub fn history(&self) -> &ConversationHistory {
        &self.history
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    /// Replace history item 0 in place. Called once before the first task,
    /// or whenever the composed system prompt changes (e.g. a skill is
    /// injected).
    pub fn set_system_prompt(&mut self, text: impl Into<String>) {
        self.history.replace_system(text);
    }

    /// A handle the caller can use to cancel the in-flight task from another
    /// task (e.g. on Ctrl-C). Cancellation is checked at every suspension
    /// point: before opening a stream, after each event, and around tool
    /// execution.
    pub fn cancellation_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// Run one user utterance to completion, streaming [`AgentEvent`]s to
    /// `sink` as they occur. Returns once exactly one of
    /// `task_complete | max_iterations | error` has been emitted, per
    /// spec.md §8's terminal-event invariant.
    pub async fn run_task(
        &mut self,
        task_id: impl Into<String>,
        user_message: impl Into<String>,
        mut sink: impl FnMut(AgentEvent),
    ) -> Result<()> {
        let task_id = task_id.into();
        let mut user_message = user_message.into();

        if let Some(decision) = self
            .hooks
            .execute_user_prompt_submit(UserPromptSubmitEvent::new(
                user_message.clone(),
                history_as_json(&self.history),
            ))
            .await
        {
            if !decision.continue_execution {
                let reason = decision.reason.unwrap_or_else(|| "blocked by hook".to_string());
                sink(AgentEvent::Error(reason));
                return Ok(());
            }
            if let Some(modified) = decision.modified_prompt {
                user_message = modified;
            }
        }

        self.stats.task_started();
        self.history.append(Item::user(user_message.clone()))?;
        sink(AgentEvent::UserMessage(user_message.clone()));
        self.record_input(&task_id, Item::user(user_message)).await;

        let mut turn_index: u32 = 0;
        // Tool-cycle budget counted across the whole task, per the glossary
        // ("the iteration counter resets per task") and §8 scenario 5: a
        // provider issuing one tool call per turn must still trip
        // `max_iterations` once the cumulative count reaches the budget.
        let mut task_iterations: u32 = 0;
        loop {
            if self.is_cancelled() {
                sink(AgentEvent::Error("cancelled".to_string()));
                return Err(Error::cancellation("task cancelled"));
            }
            if turn_index >= self.config.max_turns {
                sink(AgentEvent::MaxIterations {
                    iterations: task_iterations,
                    turn_index,
                });
                return Ok(());
            }

            self.turn_counter += 1;
            let mut turn = Turn::new(self.turn_counter);
            let outcome = self
                .run_turn(&task_id, &mut turn, &mut task_iterations, &mut sink)
                .await?;
            turn_index += 1;

            match outcome {
                TurnOutcome::TaskComplete => {
                    sink(AgentEvent::TaskComplete);
                    return Ok(());
                }
                TurnOutcome::ContinueNextTurn => {
                    sink(AgentEvent::TurnComplete { turn_index });
                    continue;
                }
                TurnOutcome::MaxIterations => {
                    sink(AgentEvent::MaxIterations {
                        iterations: task_iterations,
                        turn_index,
                    });
                    return Ok(());
                }
                TurnOutcome::Error(message) => {
                    sink(AgentEvent::Error(message.clone()));
                    return Err(Error::provider(message));
                }
            }
        }
    }

    /// Drive one provider stream to its terminal event, dispatching any
    /// tool calls it announces along the way. `task_iterations` is the
    /// tool-cycle counter shared across every turn of the enclosing task.
    async fn run_turn(
        &mut self,
        task_id: &str,
        turn: &mut Turn,
        task_iterations: &mut u32,
        sink: &mut impl FnMut(AgentEvent),
    ) -> Result<TurnOutcome> {
        let params = CallParams {
            model: Some(self.config.model.clone()),
            wire_api: Some(self.config.wire_api),
            ..CallParams::default()
        };

        let history_snapshot = self.history.snapshot();
        let mut stream = self.client.stream(&history_snapshot, &params).await?;

        let mut assistant_text = String::new();
        let mut issued_tool_calls = false;
        let mut appended_tool_results = false;

        while let Some(event) = stream.next().await {
            if self.is_cancelled() {
                turn.status = TurnStatus::Error;
                return Err(Error::cancellation("task cancelled mid-stream"));
            }

            self.record_response(task_id, &event).await;

            let event = match event {
                Ok(event) => event,
                Err(err) => {
                    turn.status = TurnStatus::Error;
                    if !assistant_text.is_empty() {
                        self.history.append(Item::assistant_text(assistant_text.clone()))?;
                    }
                    return Ok(TurnOutcome::Error(err.to_string()));
                }
            };

            use crate::event::ResponseEvent;
            match event {
                ResponseEvent::Created => sink(AgentEvent::LlmStreamStart),
                ResponseEvent::OutputTextDelta(delta) => {
                    assistant_text.push_str(&delta);
                    sink(AgentEvent::LlmChunk(delta));
                }
                ResponseEvent::ReasoningTextDelta(delta) | ResponseEvent::ReasoningSummaryDelta(delta) => {
                    sink(AgentEvent::ReasoningChunk(delta));
                }
                ResponseEvent::OutputItemDone(_) | ResponseEvent::ToolCallDelta { .. } => {}
                ResponseEvent::ToolCallReady(call) => {
                    issued_tool_calls = true;
                    if *task_iterations >= self.config.max_iterations {
                        turn.status = TurnStatus::MaxIterations;
                        return Ok(TurnOutcome::MaxIterations);
                    }
                    turn.iterations += 1;
                    *task_iterations += 1;

                    let text = if assistant_text.is_empty() {
                        None
                    } else {
                        Some(std::mem::take(&mut assistant_text))
                    };
                    self.history
                        .append(Item::assistant_tool_calls(text, vec![call.clone()]))?;

                    self.run_tool_call(task_id, call, sink).await?;
                    appended_tool_results = true;
                }
                ResponseEvent::TokenUsage { prompt, completion } => {
                    self.stats.record_usage(prompt, completion);
                    turn.total_tokens += prompt + completion;
                    sink(AgentEvent::TurnTokenUsage { prompt, completion });
                }
                ResponseEvent::Completed { usage } => {
                    if let Some((prompt, completion)) = usage {
                        self.stats.record_usage(prompt, completion);
                        turn.total_tokens += prompt + completion;
                        sink(AgentEvent::TurnTokenUsage { prompt, completion });
                    } else if !issued_tool_calls {
                        self.stats.record_text_fallback(&assistant_text);
                    }

                    if !assistant_text.is_empty() {
                        self.history.append(Item::assistant_text(assistant_text))?;
                    }

                    turn.status = TurnStatus::Completed;
                    return Ok(if issued_tool_calls && appended_tool_results {
                        TurnOutcome::ContinueNextTurn
                    } else {
                        TurnOutcome::TaskComplete
                    });
                }
                ResponseEvent::Error(message) => {
                    turn.status = TurnStatus::Error;
                    if !assistant_text.is_empty() {
                        self.history.append(Item::assistant_text(assistant_text))?;
                    }
                    return Ok(TurnOutcome::Error(message));
                }
                ResponseEvent::Ignored => {}
            }
        }

        // Stream ended without a `completed` or `error` terminator: spec.md
        // §8 requires a synthetic error in this case.
        turn.status = TurnStatus::Error;
        if !assistant_text.is_empty() {
            self.history.append(Item::assistant_text(assistant_text))?;
        }
        Ok(TurnOutcome::Error(
            "provider stream ended without a terminal event".to_string(),
        ))
    }

    /// The tool sub-procedure from spec.md §4.5: lookup, confirm, execute,
    /// append, emit — for exactly one announced call.
    async fn run_tool_call(
        &mut self,
        task_id: &str,
        call: ToolCall,
        sink: &mut impl FnMut(AgentEvent),
    ) -> Result<()> {
        sink(AgentEvent::ToolCall {
            call_id: call.call_id.clone(),
            name: call.name.clone(),
            arguments: call.arguments.clone(),
        });

        if !self.registry.contains(&call.name) {
            let message = Error::tool_not_found(&call.name).to_string();
            self.history.append(Item::tool(call.call_id.clone(), message.clone()))?;
            sink(AgentEvent::ToolError {
                call_id: call.call_id.clone(),
                name: call.name.clone(),
                message,
            });
            return Ok(());
        }

        let mut arguments = call.arguments.clone();
        if let Some(decision) = self
            .hooks
            .execute_pre_tool_use(PreToolUseEvent::new(
                call.name.clone(),
                arguments.clone(),
                call.call_id.clone(),
                history_as_json(&self.history),
            ))
            .await
        {
            if !decision.continue_execution {
                let reason = decision.reason.unwrap_or_else(|| "blocked by hook".to_string());
                let result = ToolResult::err(call.call_id.clone(), reason);
                self.append_tool_result_and_emit(&call, &result, sink)?;
                return Ok(());
            }
            if let Some(modified) = decision.modified_input {
                arguments = modified;
            }
        }

        let mut dispatch_call = call.clone();
        dispatch_call.arguments = arguments;
        let results = self.executor.run(vec![dispatch_call]).await;
        let result = results
            .into_iter()
            .next()
            .unwrap_or_else(|| ToolResult::err(call.call_id.clone(), "executor returned no result"));

        self.hooks
            .execute_post_tool_use(PostToolUseEvent::new(
                call.name.clone(),
                call.arguments.clone(),
                call.call_id.clone(),
                serde_json::to_value(&result).unwrap_or(Value::Null),
                history_as_json(&self.history),
            ))
            .await;

        self.append_tool_result_and_emit(&call, &result, sink)?;
        let _ = task_id;
        Ok(())
    }

    fn append_tool_result_and_emit(
        &mut self,
        call: &ToolCall,
        result: &ToolResult,
        sink: &mut impl FnMut(AgentEvent),
    ) -> Result<()> {
        self.history
            .append(Item::tool(result.call_id.clone(), result.display_content()))?;
        sink(AgentEvent::ToolResult {
            call_id: result.call_id.clone(),
            name: call.name.clone(),
            result: result.result.clone(),
            success: result.success,
            error: result.error.clone(),
            arguments: call.arguments.clone(),
        });
        Ok(())
    }

    async fn record_input(&self, task_id: &str, item: Item) {
        if let Some(recorder) = &self.trajectory {
            let value = serde_json::to_value(&item).unwrap_or(Value::Null);
            recorder
                .record(&TrajectoryRecord::Input {
                    task_id: task_id.to_string(),
                    item: value,
                    timestamp: now(),
                })
                .await;
        }
    }

    async fn record_response(&self, task_id: &str, event: &Result<crate::event::ResponseEvent>) {
        if let Some(recorder) = &self.trajectory {
            let frame = match event {
                Ok(event) => response_event_to_json(event),
                Err(err) => serde_json::json!({"error": err.to_string()}),
            };
            recorder
                .record(&TrajectoryRecord::Response {
                    task_id: task_id.to_string(),
                    frame,
                    timestamp: now(),
                })
                .await;
        }
    }
}

/// `chrono::Utc::now()` wrapper kept as a single call site so a future
/// injectable clock only needs to change this function.
fn now() -> chrono::DateTime<chrono::Utc> {
    chrono::Utc::now()
}

fn history_as_json(history: &ConversationHistory) -> Vec<Value> {
    history
        .snapshot()
        .iter()
        .map(|item| serde_json::to_value(item).unwrap_or(Value::Null))
        .collect()
}

fn response_event_to_json(event: &crate::event::ResponseEvent) -> Value {
    use crate::event::ResponseEvent;
    match event {
        ResponseEvent::Created => serde_json::json!({"type": "created"}),
        ResponseEvent::OutputTextDelta(d) => serde_json::json!({"type": "output_text.delta", "delta": d}),
        ResponseEvent::ReasoningTextDelta(d) => {
            serde_json::json!({"type": "reasoning_text.delta", "delta": d})
        }
        ResponseEvent::ReasoningSummaryDelta(d) => {
            serde_json::json!({"type": "reasoning_summary.delta", "delta": d})
        }
        ResponseEvent::OutputItemDone(v) => serde_json::json!({"type": "output_item.done", "item": v}),
        ResponseEvent::ToolCallDelta { call_id, name, fragment, .. } => {
            serde_json::json!({"type": "tool_call.delta", "call_id": call_id, "name": name, "fragment": fragment})
        }
        ResponseEvent::ToolCallReady(call) => {
            serde_json::json!({"type": "tool_call.ready", "call_id": call.call_id, "name": call.name})
        }
        ResponseEvent::TokenUsage { prompt, completion } => {
            serde_json::json!({"type": "token_usage", "prompt": prompt, "completion": completion})
        }
        ResponseEvent::Completed { usage } => serde_json::json!({"type": "completed", "usage": usage}),
        ResponseEvent::Error(message) => serde_json::json!({"type": "error", "message": message}),
        ResponseEvent::Ignored => serde_json::json!({"type": "ignored"}),
    }
}

enum TurnOutcome {
    TaskComplete,
    ContinueNextTurn,
    MaxIterations,
    Error(String),
}

/// Compose the system prompt from spec.md §4.5: base prompt + style prompt
/// (concatenated `PYWEN.md` files walking from `cwd` toward the filesystem
/// root, at most 512 hops) + runtime environment block + sandbox descriptor +
/// optional git descriptor + skills section.
pub struct SystemPromptBuilder {
    base_prompt: String,
    cwd: std::path::PathBuf,
    skills: Vec<SkillMetadata>,
}

const MAX_STYLE_PROMPT_HOPS: usize = 512;
const STYLE_PROMPT_FILENAME: &str = "PYWEN.md";

impl SystemPromptBuilder {
    pub fn new(base_prompt: impl Into<String>, cwd: impl Into<std::path::PathBuf>) -> Self {
        Self {
            base_prompt: base_prompt.into(),
            cwd: cwd.into(),
            skills: Vec::new(),
        }
    }

    pub fn with_skills(mut self, skills: Vec<SkillMetadata>) -> Self {
        self.skills = skills;
        self
    }

    pub async fn build(&self) -> String {
        let mut sections = vec![self.base_prompt.clone()];

        let style = self.style_prompt().await;
        if !style.is_empty() {
            sections.push(style);
        }

        sections.push(self.environment_block());

        if let Some(sandbox) = sandbox_descriptor() {
            sections.push(sandbox);
        }

        if let Some(git) = self.git_descriptor().await {
            sections.push(git);
        }

        if !self.skills.is_empty() {
            let mut section = String::from("## Available skills\n");
            for skill in &self.skills {
                section.push_str(&crate::skills::format_skill_summary(skill));
                section.push('\n');
            }
            sections.push(section);
        }

        sections.join("\n\n")
    }

    async fn style_prompt(&self) -> String {
        let mut directory = Some(self.cwd.clone());
        let mut chunks = Vec::new();
        for _ in 0..MAX_STYLE_PROMPT_HOPS {
            let Some(dir) = directory else { break };
            let candidate = dir.join(STYLE_PROMPT_FILENAME);
            if let Ok(content) = tokio::fs::read_to_string(&candidate).await {
                chunks.push(content);
            }
            directory = dir.parent().map(std::path::Path::to_path_buf);
        }
        chunks.join("\n\n")
    }

    fn environment_block(&self) -> String {
        let shell = std::env::var("SHELL").unwrap_or_else(|_| "unknown".to_string());
        format!(
            "## Environment\nOS: {os}\nArchitecture: {arch}\nInterpreter: rustc (build-time)\nShell: {shell}",
            os = std::env::consts::OS,
            arch = std::env::consts::ARCH,
            shell = shell,
        )
    }

    async fn git_descriptor(&self) -> Option<String> {
        let mut directory = Some(self.cwd.clone());
        while let Some(dir) = directory {
            if tokio::fs::metadata(dir.join(".git")).await.is_ok() {
                return Some(format!("## Git repository\nRoot: {}", dir.display()));
            }
            directory = dir.parent().map(std::path::Path::to_path_buf);
        }
        None
    }
}

/// `SANDBOX=sandbox-exec` (macOS seatbelt) gets a distinct descriptor from
/// any other non-empty value (the generic sandbox case).
fn sandbox_descriptor() -> Option<String> {
    let value = std::env::var("SANDBOX").ok()?;
    if value.is_empty() {
        return None;
    }
    if value == "sandbox-exec" {
        Some("## Sandbox\nmacOS seatbelt (sandbox-exec)".to_string())
    } else {
        Some(format!("## Sandbox\n{value}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::ResponseEvent;
    use crate::tools::{tool, RiskLevel};
    use serde_json::json;
    use std::sync::Mutex as StdMutex;

    struct AutoConfirmUi;
    #[async_trait::async_trait]
    impl UiConfirmation for AutoConfirmUi {
        async fn confirm_tool_call(&self, _call: &ToolCall, _display_name: &str) -> bool {
            true
        }
    }

    struct RejectUi;
    #[async_trait::async_trait]
    impl UiConfirmation for RejectUi {
        async fn confirm_tool_call(&self, _call: &ToolCall, _display_name: &str) -> bool {
            false
        }
    }

    fn test_config() -> LLMConfig {
        LLMConfig {
            max_turns: 5,
            max_iterations: 5,
            ..LLMConfig::default()
        }
    }

    fn echo_tool() -> crate::tools::Tool {
        tool("echo", "Echo back the given text")
            .param("text", "string")
            .build(|args| async move { Ok(json!({"summary": args["text"]})) })
            .with_risk_level(RiskLevel::Safe)
    }

    fn scripted_adapter(events: Vec<Vec<ResponseEvent>>) -> Arc<dyn crate::adapter::ProviderAdapter> {
        Arc::new(ScriptedAdapter {
            calls: StdMutex::new(events.into_iter().collect()),
        })
    }

    struct ScriptedAdapter {
        calls: StdMutex<std::collections::VecDeque<Vec<ResponseEvent>>>,
    }

    #[async_trait::async_trait]
    impl crate::adapter::ProviderAdapter for ScriptedAdapter {
        async fn stream_response(
            &self,
            _history: &[Item],
            _params: &CallParams,
        ) -> Result<crate::adapter::ResponseStream> {
            let events = self
                .calls
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_default();
            let stream = futures::stream::iter(events.into_iter().map(Ok));
            Ok(Box::pin(stream))
        }

        fn to_wire(&self, history: &[Item], wire_api: crate::message::WireApi) -> Vec<crate::adapter::ProviderItem> {
            crate::adapter::to_wire_openai(history, wire_api)
        }
    }

    fn build_agent(
        events: Vec<Vec<ResponseEvent>>,
        confirmation: Arc<dyn UiConfirmation>,
        registry: ToolRegistry,
    ) -> Agent {
        let config = test_config();
        let registry = Arc::new(registry);
        let executor = Executor::new(
            Arc::clone(&registry),
            Arc::new(ConfirmationBridge(confirmation)),
        );
        Agent {
            client: LlmClient::from_adapter(scripted_adapter(events), crate::retry::RetryConfig::default()),
            config,
            registry,
            executor,
            history: ConversationHistory::new("be helpful"),
            stats: Arc::new(SessionStats::new()),
            trajectory: None,
            hooks: Hooks::new(),
            cancelled: Arc::new(AtomicBool::new(false)),
            discovered_skills: Vec::new(),
            turn_counter: 0,
        }
    }

    #[tokio::test]
    async fn plain_answer_emits_chunks_then_task_complete() {
        let events = vec![vec![
            ResponseEvent::Created,
            ResponseEvent::OutputTextDelta("Hi".to_string()),
            ResponseEvent::OutputTextDelta(" there".to_string()),
            ResponseEvent::Completed { usage: None },
        ]];
        let mut agent = build_agent(events, Arc::new(AutoConfirmUi), ToolRegistry::new());

        let mut emitted = Vec::new();
        agent
            .run_task("t1", "hello", |event| emitted.push(format!("{event:?}")))
            .await
            .unwrap();

        assert!(emitted.iter().any(|e| e.contains("UserMessage")));
        assert!(emitted.iter().any(|e| e.contains("LlmStreamStart")));
        assert!(emitted.iter().any(|e| e.contains("Hi")));
        assert_eq!(emitted.last().unwrap(), "TaskComplete");

        assert_eq!(
            agent.history().last_assistant_text(),
            Some("Hi there".to_string())
        );
    }

    #[tokio::test]
    async fn single_tool_call_accepted_then_final_answer() {
        let mut registry = ToolRegistry::new();
        registry.register(echo_tool());

        let events = vec![
            vec![
                ResponseEvent::ToolCallReady(ToolCall::function("c1", "echo", json!({"text": "hi"}))),
                ResponseEvent::Completed { usage: None },
            ],
            vec![
                ResponseEvent::OutputTextDelta("done".to_string()),
                ResponseEvent::Completed { usage: None },
            ],
        ];
        let mut agent = build_agent(events, Arc::new(AutoConfirmUi), registry);

        let mut emitted = Vec::new();
        agent
            .run_task("t1", "please echo", |event| emitted.push(format!("{event:?}")))
            .await
            .unwrap();

        assert!(emitted.iter().any(|e| e.contains("ToolCall {")));
        assert!(emitted.iter().any(|e| e.contains("ToolResult") && e.contains("success: true")));
        assert!(emitted.iter().any(|e| e == "TurnComplete { turn_index: 1 }"));
        assert_eq!(emitted.last().unwrap(), "TaskComplete");

        let snapshot = agent.history().snapshot();
        assert!(snapshot.iter().any(|i| matches!(i, Item::Tool { .. })));
    }

    #[tokio::test]
    async fn tool_rejected_by_user_records_error_and_continues() {
        let mut registry = ToolRegistry::new();
        registry.register(echo_tool().with_risk_level(RiskLevel::High));

        let events = vec![
            vec![
                ResponseEvent::ToolCallReady(ToolCall::function("c1", "echo", json!({"text": "hi"}))),
                ResponseEvent::Completed { usage: None },
            ],
            vec![ResponseEvent::OutputTextDelta("ok".to_string()), ResponseEvent::Completed { usage: None }],
        ];
        let mut agent = build_agent(events, Arc::new(RejectUi), registry);

        let mut emitted = Vec::new();
        agent
            .run_task("t1", "please echo", |event| emitted.push(format!("{event:?}")))
            .await
            .unwrap();

        assert!(emitted.iter().any(|e| e.contains("success: false")));
        let snapshot = agent.history().snapshot();
        let tool_item = snapshot.iter().find(|i| matches!(i, Item::Tool { .. })).unwrap();
        if let Item::Tool { content, .. } = tool_item {
            assert!(content.contains("rejected"));
        }
    }

    #[tokio::test]
    async fn tool_not_found_emits_tool_error_and_continues() {
        let events = vec![
            vec![
                ResponseEvent::ToolCallReady(ToolCall::function("c1", "nope", json!({}))),
                ResponseEvent::Completed { usage: None },
            ],
            vec![ResponseEvent::OutputTextDelta("ok".to_string()), ResponseEvent::Completed { usage: None }],
        ];
        let mut agent = build_agent(events, Arc::new(AutoConfirmUi), ToolRegistry::new());

        let mut emitted = Vec::new();
        agent
            .run_task("t1", "call nope", |event| emitted.push(format!("{event:?}")))
            .await
            .unwrap();

        assert!(emitted.iter().any(|e| e.contains("ToolError")));
    }

    #[tokio::test]
    async fn budget_exhausted_emits_max_iterations() {
        let mut registry = ToolRegistry::new();
        registry.register(echo_tool());

        let mut config = test_config();
        config.max_iterations = 2;
        let registry = Arc::new(registry);
        let executor = Executor::new(Arc::clone(&registry), Arc::new(ConfirmationBridge(Arc::new(AutoConfirmUi))));

        let looping_call = || {
            vec![
                ResponseEvent::ToolCallReady(ToolCall::function("c1", "echo", json!({"text": "hi"}))),
                ResponseEvent::Completed { usage: None },
            ]
        };
        let events = vec![looping_call(), looping_call(), looping_call()];

        let mut agent = Agent {
            client: LlmClient::from_adapter(scripted_adapter(events), crate::retry::RetryConfig::default()),
            config,
            registry,
            executor,
            history: ConversationHistory::new("be helpful"),
            stats: Arc::new(SessionStats::new()),
            trajectory: None,
            hooks: Hooks::new(),
            cancelled: Arc::new(AtomicBool::new(false)),
            discovered_skills: Vec::new(),
            turn_counter: 0,
        };

        let mut emitted = Vec::new();
        agent
            .run_task("t1", "loop", |event| emitted.push(format!("{event:?}")))
            .await
            .unwrap();

        assert!(emitted.iter().any(|e| e.starts_with("MaxIterations")));
        let tool_items = agent
            .history()
            .snapshot()
            .into_iter()
            .filter(|i| matches!(i, Item::Tool { .. }))
            .count();
        assert_eq!(tool_items, 2);
    }

    #[tokio::test]
    async fn provider_error_mid_stream_preserves_partial_text() {
        let events = vec![vec![
            ResponseEvent::OutputTextDelta("partial".to_string()),
            ResponseEvent::Error("network".to_string()),
        ]];
        let mut agent = build_agent(events, Arc::new(AutoConfirmUi), ToolRegistry::new());

        let mut emitted = Vec::new();
        let result = agent
            .run_task("t1", "hello", |event| emitted.push(format!("{event:?}")))
            .await;

        assert!(result.is_err());
        assert!(emitted.iter().any(|e| e.contains("partial")));
        assert!(emitted.last().unwrap().starts_with("Error"));
        assert_eq!(
            agent.history().last_assistant_text(),
            Some("partial".to_string())
        );
    }
}
