//! Model router: sends a prompt to a mock LLM or a live OpenAI-compatible chat API.

use concierge_core::{CommandContext, CoreConfig, FallbackResponder, HandlerFault};
use serde_json::json;
use thiserror::Error;

const ENV_LLM_API_URL: &str = "CONCIERGE_LLM_API_URL";
const ENV_LLM_API_KEY: &str = "CONCIERGE_LLM_API_KEY";
const ENV_LLM_MODEL: &str = "CONCIERGE_LLM_MODEL";
const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Mode for LLM invocation: mock (deterministic simulated generation) or live (external API).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LlmMode {
    #[default]
    Mock,
    Live,
}

impl LlmMode {
    pub fn parse(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("live") {
            LlmMode::Live
        } else {
            LlmMode::Mock
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LlmMode::Mock => "mock",
            LlmMode::Live => "live",
        }
    }
}

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("LLM request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("LLM API error ({status}): {body}")]
    Api { status: u16, body: String },
    #[error("LLM response had no message content")]
    MalformedResponse,
}

#[derive(Debug, Clone)]
struct LiveEndpoint {
    url: String,
    api_key: String,
    model: String,
}

impl LiveEndpoint {
    fn from_env() -> Option<Self> {
        let base = std::env::var(ENV_LLM_API_URL).ok().filter(|v| !v.trim().is_empty())?;
        let api_key = std::env::var(ENV_LLM_API_KEY).ok().filter(|v| !v.trim().is_empty())?;
        let model = std::env::var(ENV_LLM_MODEL).unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        let base = base.trim_end_matches('/');
        let url = if base.ends_with("/chat/completions") {
            base.to_string()
        } else {
            format!("{}/chat/completions", base)
        };
        Some(Self { url, api_key, model })
    }
}

/// Routes prompts to the configured model. Also answers commands no handler claims.
pub struct ModelRouter {
    mode: LlmMode,
    endpoint: Option<LiveEndpoint>,
    client: reqwest::Client,
}

impl ModelRouter {
    pub fn with_mode(mode: LlmMode) -> Self {
        let endpoint = match mode {
            LlmMode::Live => LiveEndpoint::from_env(),
            LlmMode::Mock => None,
        };
        Self {
            mode,
            endpoint,
            client: reqwest::Client::new(),
        }
    }

    pub fn from_config(config: &CoreConfig) -> Self {
        Self::with_mode(LlmMode::parse(&config.llm_mode))
    }

    pub fn mode(&self) -> LlmMode {
        self.mode
    }

    pub async fn generate(&self, prompt: &str) -> Result<String, ModelError> {
        match (self.mode, &self.endpoint) {
            (LlmMode::Live, Some(endpoint)) => self.live_generate(endpoint, prompt).await,
            (LlmMode::Live, None) => {
                tracing::warn!(
                    target: "concierge::llm",
                    "Live mode without {} / {}, using mock generation",
                    ENV_LLM_API_URL,
                    ENV_LLM_API_KEY
                );
                Ok(mock_generate(prompt))
            }
            (LlmMode::Mock, _) => Ok(mock_generate(prompt)),
        }
    }

    async fn live_generate(&self, endpoint: &LiveEndpoint, prompt: &str) -> Result<String, ModelError> {
        let body = json!({
            "model": endpoint.model,
            "messages": [
                { "role": "user", "content": prompt }
            ],
            "temperature": 0.2
        });
        tracing::debug!(target: "concierge::llm", prompt_len = prompt.len(), "Sending prompt to LLM");
        let response = self
            .client
            .post(&endpoint.url)
            .bearer_auth(&endpoint.api_key)
            .json(&body)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ModelError::Api {
                status: status.as_u16(),
                body,
            });
        }
        let payload: serde_json::Value = response.json().await?;
        payload["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or(ModelError::MalformedResponse)
    }
}

impl Default for ModelRouter {
    fn default() -> Self {
        Self::with_mode(LlmMode::Mock)
    }
}

/// Deterministic stand-in for a model: echoes a preview of the prompt.
fn mock_generate(prompt: &str) -> String {
    let question = prompt
        .rsplit("User:")
        .next()
        .unwrap_or(prompt)
        .trim();
    let preview: String = question.chars().take(80).collect();
    let ellipsis = if question.chars().count() > 80 { "…" } else { "" };
    format!("[Mock LLM] You asked: {}{}", preview, ellipsis)
}

#[async_trait::async_trait]
impl FallbackResponder for ModelRouter {
    async fn respond(&self, command: &str, context: &CommandContext) -> Result<String, HandlerFault> {
        let prompt = if context.is_empty() {
            format!("User: {}", command)
        } else {
            let context = serde_json::to_string(&context.values).unwrap_or_default();
            format!("Context: {}\n\nUser: {}", context, command)
        };
        Ok(self.generate(&prompt).await?)
    }
}
