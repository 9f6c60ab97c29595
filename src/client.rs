//! Provider-dispatching client: the one place that turns an [`LLMConfig`]
//! into a concrete [`ProviderAdapter`] and applies the outer retry policy to
//! non-streaming calls.
//!
//! Streaming calls are not retried mid-stream — a dropped connection after
//! partial output would otherwise silently duplicate assistant text. Retry
//! only wraps [`LlmClient::generate_text`], the non-streaming path used for
//! cheap one-shot calls (title generation, skill-relevance checks) where
//! replaying the whole request on failure is safe.

use crate::adapter::{AnthropicAdapter, CallParams, OpenAiAdapter, ProviderAdapter, ResponseStream};
use crate::error::Result;
use crate::message::{Item, LLMConfig, ProviderKind};
use crate::retry::{RetryConfig, retry_with_backoff_conditional};
use std::sync::Arc;
use std::time::Duration;

/// Multiplexes requests across the supported providers behind one
/// `Arc<dyn ProviderAdapter>`, so [`crate::agent::Agent`] never has to match
/// on [`ProviderKind`] itself.
pub struct LlmClient {
    adapter: Arc<dyn ProviderAdapter>,
    retry: RetryConfig,
}

impl LlmClient {
    /// Build the client for `config`, constructing the adapter matching its
    /// `provider` field.
    pub fn new(config: &LLMConfig) -> Result<Self> {
        let timeout = Duration::from_secs(config.timeout_secs);
        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| default_base_url(config.provider).to_string());

        let adapter: Arc<dyn ProviderAdapter> = match config.provider {
            ProviderKind::OpenAi | ProviderKind::Compatible => Arc::new(OpenAiAdapter::new(
                config.api_key.clone(),
                base_url,
                config.model.clone(),
                config.wire_api,
                timeout,
            )?),
            ProviderKind::Anthropic => Arc::new(AnthropicAdapter::new(
                config.api_key.clone(),
                base_url,
                config.model.clone(),
                timeout,
            )?),
        };

        let retry = RetryConfig::new().with_max_attempts(config.retry_attempts.max(1));
        Ok(Self { adapter, retry })
    }

    /// Construct directly from an adapter, bypassing provider dispatch.
    /// Used by tests and by callers wiring in a custom adapter.
    pub fn from_adapter(adapter: Arc<dyn ProviderAdapter>, retry: RetryConfig) -> Self {
        Self { adapter, retry }
    }

    /// Open a streaming call. Not retried: a caller that needs resilience
    /// against connection failure restarts the turn at the agent-loop level
    /// instead, since only it knows whether partial output was already
    /// surfaced to the user.
    pub async fn stream(&self, history: &[Item], params: &CallParams) -> Result<ResponseStream> {
        self.adapter.stream_response(history, params).await
    }

    /// Non-streaming call, retried with exponential backoff on transient
    /// failures (network errors, timeouts, 5xx responses).
    pub async fn generate_text(&self, history: &[Item], params: &CallParams) -> Result<String> {
        let adapter = Arc::clone(&self.adapter);
        retry_with_backoff_conditional(self.retry.clone(), move || {
            let adapter = Arc::clone(&adapter);
            let history = history.to_vec();
            let params = params.clone();
            async move { adapter.generate_response(&history, &params).await }
        })
        .await
    }

    pub fn adapter(&self) -> &Arc<dyn ProviderAdapter> {
        &self.adapter
    }
}

fn default_base_url(provider: ProviderKind) -> &'static str {
    match provider {
        ProviderKind::OpenAi => "https://api.openai.com/v1",
        ProviderKind::Compatible => "http://localhost:1234/v1",
        ProviderKind::Anthropic => "https://api.anthropic.com",
    }
}
