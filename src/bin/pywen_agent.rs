//! CLI entrypoint: a terminal-resident coding assistant wired around
//! [`agent_core::Agent`].
//!
//! Grounded on `pywen/cli.py`'s subcommand-per-profile entrypoint and
//! `pywen/app.py`'s REPL loop, reimplemented with `clap`'s derive API and a
//! plain stdin read loop instead of their interactive TUI.

use agent_core::config::{AgentProfile, SessionConfig};
use agent_core::{
    Agent, AgentEvent, SystemPromptBuilder, ToolRegistry, TrajectoryRecorder, UiConfirmation,
    read_file_tool, shell_tool, write_file_tool,
};
use clap::Parser;
use std::io::Write;
use std::sync::Arc;
use tokio::io::AsyncBufReadExt;

const EXIT_SUCCESS: i32 = 0;
const EXIT_USER_ERROR: i32 = 1;
const EXIT_PROVIDER_ERROR: i32 = 2;
const EXIT_CANCELLED: i32 = 130;

#[derive(Parser, Debug)]
#[command(name = "pywen-agent", about = "Terminal-resident coding assistant")]
struct Cli {
    /// Agent profile: which base system prompt and tool set to use.
    #[arg(value_enum, default_value = "pywen")]
    profile: Profile,

    /// Path to the JSON session config file.
    #[arg(long, default_value = "pywen_config.json")]
    config: String,

    /// Run a single prompt non-interactively instead of entering a REPL.
    #[arg(long)]
    prompt: Option<String>,

    /// Logging level; falls back to `RUST_LOG`, then the config file's
    /// `log_level`, then `info`.
    #[arg(long)]
    log_level: Option<String>,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum Profile {
    Pywen,
    Codex,
    Claudecode,
}

impl From<Profile> for AgentProfile {
    fn from(value: Profile) -> Self {
        match value {
            Profile::Pywen => AgentProfile::Pywen,
            Profile::Codex => AgentProfile::Codex,
            Profile::Claudecode => AgentProfile::ClaudeCode,
        }
    }
}

fn base_prompt_for(profile: AgentProfile) -> &'static str {
    match profile {
        AgentProfile::Pywen => {
            "You are pywen, a terminal-resident coding assistant. Use the \
             available tools to read, write, and run code on the user's behalf."
        }
        AgentProfile::Codex => {
            "You are a codex-style coding agent operating inside a sandboxed \
             shell. Prefer minimal, surgical patches."
        }
        AgentProfile::ClaudeCode => {
            "You are a pair-programming assistant. Explain your reasoning \
             briefly before taking actions that change files."
        }
    }
}

fn register_tools(registry: &mut ToolRegistry, profile: AgentProfile) {
    registry.register(read_file_tool());
    registry.register(write_file_tool());
    if !matches!(profile, AgentProfile::ClaudeCode) {
        registry.register(shell_tool());
    }
}

struct StdinConfirmation;

#[async_trait::async_trait]
impl UiConfirmation for StdinConfirmation {
    async fn confirm_tool_call(
        &self,
        call: &agent_core::ToolCall,
        display_name: &str,
    ) -> bool {
        eprint!("Allow {display_name} ({})? [y/N] ", call.name);
        let _ = std::io::stderr().flush();
        let mut line = String::new();
        let mut reader = tokio::io::BufReader::new(tokio::io::stdin());
        if reader.read_line(&mut line).await.is_err() {
            return false;
        }
        matches!(line.trim().to_lowercase().as_str(), "y" | "yes")
    }
}

fn print_event(event: &AgentEvent) {
    match event {
        AgentEvent::LlmChunk(text) => {
            print!("{text}");
            let _ = std::io::stdout().flush();
        }
        AgentEvent::ReasoningChunk(_) => {}
        AgentEvent::ToolCall { name, .. } => {
            eprintln!("\n[tool] running {name}...");
        }
        AgentEvent::ToolResult { name, success, .. } => {
            eprintln!("[tool] {name} {}", if *success { "ok" } else { "failed" });
        }
        AgentEvent::ToolError { name, message, .. } => {
            eprintln!("[tool] {name} error: {message}");
        }
        AgentEvent::TaskComplete => println!(),
        AgentEvent::MaxIterations { turn_index, .. } => {
            eprintln!("\n[agent] stopped after {turn_index} turns without completing");
        }
        AgentEvent::Error(message) => eprintln!("\n[agent] error: {message}"),
        _ => {}
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let profile: AgentProfile = cli.profile.into();

    let config = match SessionConfig::load(&cli.config).await {
        Ok(config) => config,
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(EXIT_USER_ERROR);
        }
    };

    let level = agent_core::resolve_log_level(cli.log_level.as_deref(), config.log_level.as_deref());
    let log_dir = agent_core::config::pywen_home().join("logs");
    agent_core::init_logging(&level, Some(log_dir.as_path()));

    let llm_config = match config.resolve() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(EXIT_USER_ERROR);
        }
    };

    let cwd = std::env::current_dir().unwrap_or_else(|_| ".".into());
    let skills = agent_core::load_skills(&agent_core::config::pywen_home(), &cwd).await;
    for error in &skills.errors {
        tracing::warn!(path = %error.path.display(), message = %error.message, "failed to load skill");
    }

    let system_prompt = SystemPromptBuilder::new(base_prompt_for(profile), cwd)
        .with_skills(skills.skills)
        .build()
        .await;

    let mut registry = ToolRegistry::new();
    register_tools(&mut registry, profile);

    let confirmation: Arc<dyn UiConfirmation> = if cli.prompt.is_some() {
        Arc::new(AutoConfirmAdapter)
    } else {
        Arc::new(StdinConfirmation)
    };

    let mut agent = match Agent::new(llm_config, registry, confirmation, system_prompt) {
        Ok(agent) => agent,
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(EXIT_USER_ERROR);
        }
    };

    let trajectory_dir = agent_core::config::pywen_home().join("trajectories");
    let session_id = config
        .session_id
        .clone()
        .unwrap_or_else(|| "session".to_string());
    if let Ok(recorder) = TrajectoryRecorder::open(trajectory_dir.join(format!("{session_id}.jsonl"))).await {
        agent = agent.with_trajectory(Arc::new(recorder));
    }

    let cancelled = agent.cancellation_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancelled.store(true, std::sync::atomic::Ordering::Relaxed);
        }
    });

    let exit_code = if let Some(prompt) = cli.prompt {
        run_one_shot(&mut agent, &prompt).await
    } else {
        run_repl(&mut agent).await
    };

    std::process::exit(exit_code);
}

struct AutoConfirmAdapter;

#[async_trait::async_trait]
impl UiConfirmation for AutoConfirmAdapter {
    async fn confirm_tool_call(&self, _call: &agent_core::ToolCall, _display_name: &str) -> bool {
        true
    }
}

async fn run_one_shot(agent: &mut Agent, prompt: &str) -> i32 {
    let mut had_error = false;
    let result = agent
        .run_task("task-1", prompt, |event| {
            if matches!(event, AgentEvent::Error(_)) {
                had_error = true;
            }
            print_event(&event);
        })
        .await;

    match result {
        Ok(()) if had_error => EXIT_PROVIDER_ERROR,
        Ok(()) => EXIT_SUCCESS,
        Err(agent_core::Error::Cancellation(_)) => EXIT_CANCELLED,
        Err(_) => EXIT_PROVIDER_ERROR,
    }
}

async fn run_repl(agent: &mut Agent) -> i32 {
    let mut task_index = 0u32;
    let mut reader = tokio::io::BufReader::new(tokio::io::stdin());
    loop {
        eprint!("> ");
        let _ = std::io::stderr().flush();

        let mut line = String::new();
        let read = reader.read_line(&mut line).await;
        match read {
            Ok(0) => return EXIT_SUCCESS, // EOF
            Ok(_) => {}
            Err(_) => return EXIT_USER_ERROR,
        }

        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if matches!(line, "exit" | "quit") {
            return EXIT_SUCCESS;
        }

        task_index += 1;
        let task_id = format!("task-{task_index}");
        let mut had_error = false;
        let result = agent
            .run_task(task_id, line, |event| {
                if matches!(event, AgentEvent::Error(_)) {
                    had_error = true;
                }
                print_event(&event);
            })
            .await;

        match result {
            Ok(()) if had_error => return EXIT_PROVIDER_ERROR,
            Ok(()) => continue,
            Err(agent_core::Error::Cancellation(_)) => return EXIT_CANCELLED,
            Err(_) => return EXIT_PROVIDER_ERROR,
        }
    }
}
