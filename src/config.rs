//! Configuration: local-provider connection helpers, and the session config
//! file / environment resolution feeding [`crate::message::LLMConfig`].
//!
//! ## Supported Providers
//!
//! - **LM Studio**: Popular local model server with GUI
//! - **Ollama**: Command-line focused local model server
//! - **llama.cpp**: C++ inference engine with server mode
//! - **vLLM**: High-performance inference server
//!
//! ## Environment Variables
//!
//! - `OPEN_AGENT_BASE_URL`: Override base URL for any provider
//! - `OPEN_AGENT_MODEL`: Override model name (when prefer_env is true)
//!
//! ## Examples
//!
//! ```rust
//! use agent_core::config::{Provider, get_base_url, get_model};
//!
//! // Quick setup with provider defaults
//! let url = get_base_url(Some(Provider::Ollama), None);
//! let model = get_model(Some("llama3:8b"), false);
//! assert_eq!(model, Some("llama3:8b".to_string()));
//! let _ = url;
//! ```

use std::env;
use std::str::FromStr;

// ============================================================================
// PROVIDER ENUM
// ============================================================================

/// Enum representing supported local LLM server providers.
///
/// Each provider has a default base URL where its API server typically runs.
/// These are convenience shortcuts to avoid hardcoding URLs in application code.
///
/// ## Provider Details
///
/// | Provider | Default URL | Port | Description |
/// |----------|-------------|------|-------------|
/// | LMStudio | http://localhost:1234/v1 | 1234 | GUI-based local server |
/// | Ollama | http://localhost:11434/v1 | 11434 | CLI-focused server |
/// | LlamaCpp | http://localhost:8080/v1 | 8080 | C++ inference engine |
/// | VLLM | http://localhost:8000/v1 | 8000 | High-performance server |
///
/// All providers implement the OpenAI-compatible API standard, making them
/// interchangeable from the SDK's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    /// LM Studio - Popular GUI-based local model server (default port 1234)
    LMStudio,

    /// Ollama - Command-line focused local model server (default port 11434)
    Ollama,

    /// llama.cpp - C++ inference engine with server mode (default port 8080)
    LlamaCpp,

    /// vLLM - High-performance inference server (default port 8000)
    VLLM,
}

impl Provider {
    /// Get the default base URL for this provider.
    ///
    /// Returns the standard localhost URL where each provider's API server
    /// typically runs. All URLs include the `/v1` path suffix required by
    /// the OpenAI-compatible API standard.
    ///
    /// # Returns
    ///
    /// A static string slice containing the full base URL including protocol,
    /// host, port, and API version path.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use agent_core::config::Provider;
    ///
    /// assert_eq!(Provider::Ollama.default_url(), "http://localhost:11434/v1");
    /// assert_eq!(Provider::LMStudio.default_url(), "http://localhost:1234/v1");
    /// ```
    pub fn default_url(&self) -> &'static str {
        match self {
            // LM Studio's default port from their documentation
            Provider::LMStudio => "http://localhost:1234/v1",

            // Ollama's default port from their documentation
            Provider::Ollama => "http://localhost:11434/v1",

            // llama.cpp server's common default port
            Provider::LlamaCpp => "http://localhost:8080/v1",

            // vLLM's default port from their documentation
            Provider::VLLM => "http://localhost:8000/v1",
        }
    }
}

// ============================================================================
// FROMSTR IMPLEMENTATION FOR PARSING
// ============================================================================

impl FromStr for Provider {
    type Err = String;

    /// Parse a provider name from a string.
    ///
    /// This implementation is case-insensitive and supports multiple naming
    /// conventions (dashes, underscores, dots) for flexibility.
    ///
    /// # Supported Formats
    ///
    /// - **LMStudio**: "lmstudio", "lm-studio", "lm_studio" (case-insensitive)
    /// - **Ollama**: "ollama" (case-insensitive)
    /// - **LlamaCpp**: "llamacpp", "llama-cpp", "llama_cpp", "llama.cpp" (case-insensitive)
    /// - **VLLM**: "vllm" (case-insensitive)
    ///
    /// # Errors
    ///
    /// Returns a `String` error message if the provider name is not recognized.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use agent_core::config::Provider;
    /// use std::str::FromStr;
    ///
    /// let provider = "ollama".parse::<Provider>().unwrap();
    /// assert_eq!(provider, Provider::Ollama);
    ///
    /// let provider = "LM-Studio".parse::<Provider>().unwrap();
    /// assert_eq!(provider, Provider::LMStudio);
    ///
    /// assert!("unknown".parse::<Provider>().is_err());
    /// ```
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        // Convert to lowercase for case-insensitive matching
        match s.to_lowercase().as_str() {
            // LM Studio accepts multiple common variations
            "lmstudio" | "lm-studio" | "lm_studio" => Ok(Provider::LMStudio),

            // Ollama is simple
            "ollama" => Ok(Provider::Ollama),

            // llama.cpp has many variations in the wild
            "llamacpp" | "llama-cpp" | "llama_cpp" | "llama.cpp" => Ok(Provider::LlamaCpp),

            // vLLM is straightforward
            "vllm" => Ok(Provider::VLLM),

            // Unrecognized provider name
            _ => Err(format!("Unknown provider: {}", s)),
        }
    }
}

// ============================================================================
// CONFIGURATION HELPER FUNCTIONS
// ============================================================================

/// Get the base URL for API requests with environment variable support.
///
/// This function implements a priority-based resolution strategy for determining
/// the API base URL, making it easy to override defaults during development or deployment.
///
/// ## Resolution Priority
///
/// 1. **Environment Variable**: `OPEN_AGENT_BASE_URL` (highest priority)
/// 2. **Provider Default**: The provider's default URL if specified
/// 3. **Fallback Parameter**: Explicit fallback value
/// 4. **Ultimate Default**: LM Studio's default URL (http://localhost:1234/v1)
///
/// ## Use Cases
///
/// - **Development**: Use provider defaults for quick setup
/// - **Testing**: Override with environment variable to point to test server
/// - **Production**: Specify explicit fallback for reliability
///
/// # Arguments
///
/// * `provider` - Optional provider enum to use its default URL
/// * `fallback` - Optional explicit fallback URL string
///
/// # Returns
///
/// The resolved base URL as a `String`. Always returns a value (never None).
///
/// # Examples
///
/// ```rust,no_run
/// use agent_core::config::{get_base_url, Provider};
///
/// // Use Ollama's default (http://localhost:11434/v1)
/// let url = get_base_url(Some(Provider::Ollama), None);
///
/// // With explicit fallback
/// let url = get_base_url(None, Some("http://localhost:1234/v1"));
///
/// // Override via environment (takes precedence over everything)
/// // SAFETY: This is a doctest example showing how env vars work
/// unsafe { std::env::set_var("OPEN_AGENT_BASE_URL", "http://custom-server:8080/v1"); }
/// let url = get_base_url(Some(Provider::Ollama), None);
/// // Returns "http://custom-server:8080/v1" despite provider being set
/// ```
pub fn get_base_url(provider: Option<Provider>, fallback: Option<&str>) -> String {
    // Priority 1: Check environment variable first (allows runtime override)
    if let Ok(url) = env::var("OPEN_AGENT_BASE_URL") {
        return url;
    }

    // Priority 2: Use provider's default URL if specified
    if let Some(p) = provider {
        return p.default_url().to_string();
    }

    // Priority 3: Use explicit fallback, or default to LM Studio
    fallback
        .unwrap_or(Provider::LMStudio.default_url())
        .to_string()
}

/// Get the model name with optional environment variable override.
///
/// This function provides flexible model name resolution with opt-in environment
/// variable support. Unlike `get_base_url`, environment variable checking is
/// controlled by the `prefer_env` parameter.
///
/// ## Resolution Priority
///
/// If `prefer_env` is `true`:
/// 1. **Environment Variable**: `OPEN_AGENT_MODEL` (if set)
/// 2. **Fallback Parameter**: Explicit fallback value
///
/// If `prefer_env` is `false`:
/// 1. **Fallback Parameter**: Explicit fallback value only
///
/// ## Why Optional Environment Override?
///
/// Model names are often specified explicitly in code for consistency across
/// environments. The `prefer_env` flag gives you control over whether to
/// allow environment overrides.
///
/// # Arguments
///
/// * `fallback` - Optional explicit model name
/// * `prefer_env` - Whether to check environment variable first
///
/// # Returns
///
/// `Some(String)` if a model name was found, `None` if no model specified
///
/// # Examples
///
/// ```rust,no_run
/// use agent_core::config::get_model;
///
/// // Use explicit model name, allow environment override
/// let model = get_model(Some("llama3:8b"), true);
///
/// // Force specific model (ignore environment)
/// let model = get_model(Some("qwen2.5-32b"), false);
///
/// // Try environment only
/// let model = get_model(None, true);
/// // Returns Some(model) if OPEN_AGENT_MODEL is set, None otherwise
/// ```
pub fn get_model(fallback: Option<&str>, prefer_env: bool) -> Option<String> {
    // If environment override is preferred, check it first
    if prefer_env {
        if let Ok(model) = env::var("OPEN_AGENT_MODEL") {
            return Some(model);
        }
    }

    // Fall back to the explicit parameter (if provided)
    fallback.map(|s| s.to_string())
}

// ============================================================================
// SESSION CONFIGURATION (config file + environment resolution)
// ============================================================================

use crate::error::{Error, Result};
use crate::message::{LLMConfig, ProviderKind, WireApi};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Agent profile selected by the CLI subcommand; each profile picks a
/// different base system prompt and tool set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentProfile {
    Pywen,
    Codex,
    ClaudeCode,
}

impl FromStr for AgentProfile {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pywen" => Ok(AgentProfile::Pywen),
            "codex" => Ok(AgentProfile::Codex),
            "claudecode" | "claude-code" | "claude_code" => Ok(AgentProfile::ClaudeCode),
            _ => Err(format!("Unknown agent profile: {}", s)),
        }
    }
}

/// `model_config` block of the JSON config file.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    pub provider: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    pub model: String,
}

/// The on-disk shape of `pywen_config.json`. Deserialized, then merged with
/// environment variables via [`SessionConfig::resolve`].
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    pub model_config: ModelConfig,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
    #[serde(default = "default_max_turns")]
    pub max_turns: u32,
    #[serde(default)]
    pub log_level: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
}

fn default_max_iterations() -> u32 {
    20
}

fn default_max_turns() -> u32 {
    20
}

impl SessionConfig {
    /// Load and parse the config file at `path`. A missing or malformed
    /// file surfaces as `Error::Config`, never a panic — the CLI binary maps
    /// this to exit code 1.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|err| Error::config(format!("cannot read {}: {err}", path.display())))?;
        serde_json::from_str(&content)
            .map_err(|err| Error::config(format!("cannot parse {}: {err}", path.display())))
    }

    /// Resolve this config plus environment-variable overrides into an
    /// [`LLMConfig`]. Priority: environment variables for credentials/base
    /// URL (`OPENAI_API_KEY`/`OPENAI_BASE_URL`, then `OPEN_AGENT_BASE_URL`)
    /// win over the config file's values, matching spec.md §6.
    pub fn resolve(&self) -> Result<LLMConfig> {
        let provider = match self.model_config.provider.to_lowercase().as_str() {
            "openai" => ProviderKind::OpenAi,
            "anthropic" => ProviderKind::Anthropic,
            _ => ProviderKind::Compatible,
        };

        let api_key = std::env::var("OPENAI_API_KEY")
            .ok()
            .or_else(|| self.model_config.api_key.clone());

        let base_url = std::env::var("OPENAI_BASE_URL")
            .ok()
            .or_else(|| std::env::var("OPEN_AGENT_BASE_URL").ok())
            .or_else(|| self.model_config.base_url.clone());

        Ok(LLMConfig {
            provider,
            api_key,
            base_url,
            model: self.model_config.model.clone(),
            wire_api: WireApi::Auto,
            timeout_secs: 60,
            retry_attempts: 2,
            max_turns: self.max_turns,
            max_iterations: self.max_iterations,
        })
    }
}

/// Base directory for user skills, cache, and logs: `$PYWEN_HOME`, defaulting
/// to `~/.pywen`.
pub fn pywen_home() -> PathBuf {
    if let Ok(path) = std::env::var("PYWEN_HOME") {
        return PathBuf::from(path);
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".pywen")
}

/// Resolution of `PYWEN_SYSTEM_MD` / `PYWEN_CODEX_SYSTEM_MD`: whether an
/// external system-prompt file should be loaded, and from where.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SystemMdSetting {
    Disabled,
    Path(PathBuf),
}

/// Resolve a `PYWEN_SYSTEM_MD`-style env var: `0`/`false` disables it, `1`/
/// `true` resolves to `$PYWEN_HOME/system.md`, anything else is a literal
/// path.
pub fn resolve_system_md(var_name: &str) -> SystemMdSetting {
    match std::env::var(var_name) {
        Err(_) => SystemMdSetting::Disabled,
        Ok(value) => match value.to_lowercase().as_str() {
            "0" | "false" => SystemMdSetting::Disabled,
            "1" | "true" => SystemMdSetting::Path(pywen_home().join("system.md")),
            other => SystemMdSetting::Path(PathBuf::from(other)),
        },
    }
}

/// Whether `PYWEN_WRITE_SYSTEM_MD` is set to a truthy value.
pub fn write_system_md_enabled() -> bool {
    matches!(
        std::env::var("PYWEN_WRITE_SYSTEM_MD").as_deref(),
        Ok("1") | Ok("true") | Ok("TRUE") | Ok("True")
    )
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_default_urls() {
        assert_eq!(Provider::LMStudio.default_url(), "http://localhost:1234/v1");
        assert_eq!(Provider::Ollama.default_url(), "http://localhost:11434/v1");
        assert_eq!(Provider::LlamaCpp.default_url(), "http://localhost:8080/v1");
        assert_eq!(Provider::VLLM.default_url(), "http://localhost:8000/v1");
    }

    #[test]
    fn test_provider_from_str() {
        assert_eq!("lmstudio".parse::<Provider>(), Ok(Provider::LMStudio));
        assert_eq!("LM-Studio".parse::<Provider>(), Ok(Provider::LMStudio));
        assert_eq!("ollama".parse::<Provider>(), Ok(Provider::Ollama));
        assert_eq!("llamacpp".parse::<Provider>(), Ok(Provider::LlamaCpp));
        assert_eq!("llama.cpp".parse::<Provider>(), Ok(Provider::LlamaCpp));
        assert_eq!("vllm".parse::<Provider>(), Ok(Provider::VLLM));
        assert!("unknown".parse::<Provider>().is_err());
    }

    #[test]
    fn test_get_base_url_with_provider() {
        // SAFETY: This test runs in an isolated test environment where environment
        // variable modifications won't affect other tests due to test isolation.
        // The OPEN_AGENT_BASE_URL variable is specific to this library and not
        // used by the Rust standard library or other critical system components.
        unsafe {
            env::remove_var("OPEN_AGENT_BASE_URL");
        }

        let url = get_base_url(Some(Provider::Ollama), None);
        assert_eq!(url, "http://localhost:11434/v1");
    }

    #[test]
    fn test_get_base_url_with_fallback() {
        // SAFETY: This test runs in an isolated test environment where environment
        // variable modifications won't affect other tests due to test isolation.
        // The OPEN_AGENT_BASE_URL variable is specific to this library and not
        // used by the Rust standard library or other critical system components.
        unsafe {
            env::remove_var("OPEN_AGENT_BASE_URL");
        }

        let url = get_base_url(None, Some("http://custom:8080/v1"));
        assert_eq!(url, "http://custom:8080/v1");
    }

    #[test]
    fn agent_profile_parses_known_names() {
        assert_eq!("pywen".parse::<AgentProfile>(), Ok(AgentProfile::Pywen));
        assert_eq!("codex".parse::<AgentProfile>(), Ok(AgentProfile::Codex));
        assert_eq!(
            "claude-code".parse::<AgentProfile>(),
            Ok(AgentProfile::ClaudeCode)
        );
        assert!("bogus".parse::<AgentProfile>().is_err());
    }

    #[tokio::test]
    async fn session_config_load_parses_valid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pywen_config.json");
        tokio::fs::write(
            &path,
            r#"{"model_config": {"provider": "compatible", "model": "qwen2.5-32b"}, "max_iterations": 10, "max_turns": 5, "log_level": "debug"}"#,
        )
        .await
        .unwrap();

        let config = SessionConfig::load(&path).await.unwrap();
        assert_eq!(config.model_config.model, "qwen2.5-32b");
        assert_eq!(config.max_iterations, 10);
        assert_eq!(config.max_turns, 5);
        assert_eq!(config.log_level.as_deref(), Some("debug"));
    }

    #[tokio::test]
    async fn session_config_load_rejects_missing_file() {
        let err = SessionConfig::load("/nonexistent/pywen_config.json")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[tokio::test]
    async fn session_config_load_rejects_malformed_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        tokio::fs::write(&path, "{not json").await.unwrap();
        let err = SessionConfig::load(&path).await.unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn resolve_prefers_env_over_config_file_credentials() {
        // SAFETY: test-local env vars, cleaned up at the end of the test.
        unsafe {
            std::env::set_var("OPENAI_API_KEY", "env-key");
            std::env::set_var("OPENAI_BASE_URL", "http://env-base/v1");
        }

        let config = SessionConfig {
            model_config: ModelConfig {
                provider: "openai".to_string(),
                api_key: Some("file-key".to_string()),
                base_url: Some("http://file-base/v1".to_string()),
                model: "gpt-5-codex".to_string(),
            },
            max_iterations: 20,
            max_turns: 20,
            log_level: None,
            session_id: None,
        };

        let llm_config = config.resolve().unwrap();
        assert_eq!(llm_config.api_key.as_deref(), Some("env-key"));
        assert_eq!(llm_config.base_url.as_deref(), Some("http://env-base/v1"));
        assert_eq!(llm_config.provider, ProviderKind::OpenAi);

        unsafe {
            std::env::remove_var("OPENAI_API_KEY");
            std::env::remove_var("OPENAI_BASE_URL");
        }
    }

    #[test]
    fn resolve_system_md_disabled_on_falsy_values() {
        unsafe {
            std::env::set_var("TEST_PYWEN_SYSTEM_MD", "false");
        }
        assert_eq!(
            resolve_system_md("TEST_PYWEN_SYSTEM_MD"),
            SystemMdSetting::Disabled
        );
        unsafe {
            std::env::remove_var("TEST_PYWEN_SYSTEM_MD");
        }
    }

    #[test]
    fn resolve_system_md_treats_other_values_as_path() {
        unsafe {
            std::env::set_var("TEST_PYWEN_SYSTEM_MD_2", "/tmp/my-system.md");
        }
        assert_eq!(
            resolve_system_md("TEST_PYWEN_SYSTEM_MD_2"),
            SystemMdSetting::Path(PathBuf::from("/tmp/my-system.md"))
        );
        unsafe {
            std::env::remove_var("TEST_PYWEN_SYSTEM_MD_2");
        }
    }
}
