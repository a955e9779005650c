use crate::prompts;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_MODEL: &str = "gpt-3.5-turbo";
const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_TIMEOUT_MS: u64 = 30_000;

#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("OPENAI_API_KEY is not set")]
    MissingApiKey,
    #[error("transport error: {0}")]
    Transport(String),
    #[error("request timed out")]
    Timeout,
    #[error("authentication rejected ({0})")]
    Auth(u16),
    #[error("rate limited: {0}")]
    RateLimited(String),
    #[error("completion service returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("completion had no choices")]
    EmptyResponse,
}

impl From<reqwest::Error> for CompletionError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            CompletionError::Timeout
        } else {
            CompletionError::Transport(e.to_string())
        }
    }
}

/// One worked example: a user prompt and the reply the model should give.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FewShot {
    pub prompt: String,
    pub reply: String,
}

impl FewShot {
    pub fn new(prompt: impl Into<String>, reply: impl Into<String>) -> Self {
        Self { prompt: prompt.into(), reply: reply.into() }
    }
}

/// Anything that can turn a prompt into a single completion.
pub trait CompletionSource {
    fn complete(
        &self,
        prompt: &str,
        temperature: f32,
        examples: &[FewShot],
    ) -> Result<String, CompletionError>;

    /// A single exchange under a different system instruction. Sources
    /// without a separate system role get the instruction prepended.
    fn complete_with_system(
        &self,
        system: &str,
        prompt: &str,
        temperature: f32,
    ) -> Result<String, CompletionError> {
        self.complete(&format!("{system}\n\n{prompt}"), temperature, &[])
    }
}

#[derive(Clone)]
pub struct ClientConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub timeout: Duration,
    pub system_prompt: String,
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl ClientConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            system_prompt: prompts::SYSTEM_PROMPT.to_string(),
        }
    }

    /// Reads `OPENAI_API_KEY` plus the optional `LOGPT_MODEL`,
    /// `LOGPT_BASE_URL` and `LOGPT_TIMEOUT_MS` overrides.
    pub fn from_env() -> Result<Self, CompletionError> {
        let key = std::env::var("OPENAI_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or(CompletionError::MissingApiKey)?;
        let mut config = Self::new(key);
        if let Ok(model) = std::env::var("LOGPT_MODEL") {
            config.model = model;
        }
        if let Ok(url) = std::env::var("LOGPT_BASE_URL") {
            config.base_url = url;
        }
        if let Some(ms) = std::env::var("LOGPT_TIMEOUT_MS").ok().and_then(|v| v.parse::<u64>().ok()) {
            config.timeout = Duration::from_millis(ms);
        }
        Ok(config)
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub role: &'static str,
    pub content: String,
}

impl ChatMessage {
    fn new(role: &'static str, content: impl Into<String>) -> Self {
        Self { role, content: content.into() }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: &'a [ChatMessage],
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    content: Option<String>,
}

/// Chat-completions client for OpenAI-compatible endpoints.
pub struct OpenAiClient {
    config: ClientConfig,
    http: reqwest::blocking::Client,
}

impl OpenAiClient {
    pub fn new(config: ClientConfig) -> Result<Self, CompletionError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(config.timeout)
            .build()?;
        Ok(Self { config, http })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// System instruction, then each example as a user/assistant exchange,
    /// then the new prompt.
    pub fn build_messages(&self, prompt: &str, examples: &[FewShot]) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(examples.len() * 2 + 2);
        messages.push(ChatMessage::new("system", self.config.system_prompt.as_str()));
        for ex in examples {
            messages.push(ChatMessage::new("user", ex.prompt.as_str()));
            messages.push(ChatMessage::new("assistant", ex.reply.as_str()));
        }
        messages.push(ChatMessage::new("user", prompt));
        messages
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }

    fn send(&self, messages: &[ChatMessage], temperature: f32) -> Result<String, CompletionError> {
        let request = ChatRequest { model: &self.config.model, temperature, messages };
        tracing::debug!(model = %self.config.model, temperature, "requesting completion");

        let response = self
            .http
            .post(self.endpoint())
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(match status.as_u16() {
                401 | 403 => CompletionError::Auth(status.as_u16()),
                429 => CompletionError::RateLimited(body),
                code => CompletionError::Status { status: code, body },
            });
        }

        let parsed: ChatResponse = response.json()?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or(CompletionError::EmptyResponse)
    }
}

impl CompletionSource for OpenAiClient {
    fn complete(
        &self,
        prompt: &str,
        temperature: f32,
        examples: &[FewShot],
    ) -> Result<String, CompletionError> {
        self.send(&self.build_messages(prompt, examples), temperature)
    }

    fn complete_with_system(
        &self,
        system: &str,
        prompt: &str,
        temperature: f32,
    ) -> Result<String, CompletionError> {
        let messages = [ChatMessage::new("system", system), ChatMessage::new("user", prompt)];
        self.send(&messages, temperature)
    }
}
