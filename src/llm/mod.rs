//! Reqwest-based LLM client implementing OpenAI-compatible Chat Completions streaming,
//! and the [`TextGenerator`] seam the pipeline calls through.

use std::{pin::Pin, time::Duration};

use anyhow::{Context, Result};
use async_stream::try_stream;
use async_trait::async_trait;
use futures_core::Stream;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{config::Config, error::LlmError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChatOptions {
    pub model: String,
    pub temperature: f32,
    pub top_p: f32,
    pub max_tokens: Option<u32>,
}

impl ChatOptions {
    pub fn new(model: impl Into<String>, temperature: f32) -> Self {
        Self {
            model: model.into(),
            temperature,
            top_p: 1.0,
            max_tokens: None,
        }
    }
}

/// Text generation collaborator: one system instruction, one user prompt.
/// Callers treat every error as recoverable.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, system: &str, user: &str) -> Result<String, LlmError>;
}

/// Generator used when no model is configured; every call fails, so the
/// pipeline runs entirely on its deterministic fallbacks.
#[derive(Debug, Default, Clone, Copy)]
pub struct OfflineGenerator;

#[async_trait]
impl TextGenerator for OfflineGenerator {
    async fn generate(&self, _system: &str, _user: &str) -> Result<String, LlmError> {
        Err(LlmError::Offline)
    }
}

#[derive(Debug)]
pub struct LlmClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    options: ChatOptions,
}

impl LlmClient {
    pub fn from_config(cfg: &Config) -> Result<Self> {
        let timeout = cfg
            .get("REQUEST_TIMEOUT")
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(60);
        let api_base_url = cfg.get("API_BASE_URL").unwrap_or_else(|| "default".into());
        let base_url = normalize_base_url(&api_base_url);
        let api_key = cfg.get("OPENAI_API_KEY").filter(|k| !k.trim().is_empty());

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout))
            .build()
            .context("failed to build http client")?;

        let model = cfg.get("DEFAULT_MODEL").unwrap_or_else(|| "gpt-4.1".into());
        let temperature = cfg.get_f32("TEMPERATURE").unwrap_or(0.1);

        Ok(Self {
            http,
            base_url,
            api_key,
            options: ChatOptions::new(model, temperature),
        })
    }

    pub fn with_options(mut self, options: ChatOptions) -> Self {
        self.options = options;
        self
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    pub fn options(&self) -> &ChatOptions {
        &self.options
    }

    pub fn chat_stream(
        &self,
        messages: Vec<ChatMessage>,
        opts: ChatOptions,
    ) -> Pin<Box<dyn Stream<Item = Result<StreamEvent>> + Send>> {
        let http = self.http.clone();
        let base_url = self.base_url.clone();
        let api_key = self.api_key.clone();

        Box::pin(try_stream! {
            let url = format!("{}/chat/completions", base_url.trim_end_matches('/'));

            let mut headers = HeaderMap::new();
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
            headers.insert(reqwest::header::ACCEPT, HeaderValue::from_static("text/event-stream"));
            if let Some(key) = api_key.clone() {
                let hv = HeaderValue::from_str(&format!("Bearer {}", key))?;
                headers.insert(AUTHORIZATION, hv);
            }

            let mut body = serde_json::json!({
                "model": opts.model,
                "temperature": opts.temperature,
                "top_p": opts.top_p,
                "messages": messages,
                "stream": true,
            });
            if let Some(max) = opts.max_tokens {
                body["max_tokens"] = serde_json::json!(max);
            }

            let resp = http
                .post(url)
                .headers(headers)
                .json(&body)
                .send()
                .await
                .context("failed to send chat request")?;

            if !resp.status().is_success() {
                let status = resp.status();
                Err(anyhow::Error::new(LlmError::Api { status: status.as_u16() }))?;
            }

            let mut buf = String::new();
            let mut stream = resp.bytes_stream();
            use futures_util::StreamExt as _;

            while let Some(chunk) = stream.next().await {
                let bytes = chunk.context("stream error")?;
                buf.push_str(&String::from_utf8_lossy(&bytes));
                // process lines
                while let Some(pos) = buf.find('\n') {
                    let line = buf[..pos].trim().to_string();
                    buf = buf[pos + 1..].to_string();
                    if let Some(ev) = parse_sse_line(&line) {
                        let done = matches!(ev, StreamEvent::Done);
                        yield ev;
                        if done { return; }
                    }
                }
            }
        })
    }
}

#[async_trait]
impl TextGenerator for LlmClient {
    async fn generate(&self, system: &str, user: &str) -> Result<String, LlmError> {
        use futures_util::StreamExt as _;

        if self.api_key.is_none() {
            return Err(LlmError::MissingApiKey);
        }
        let messages = vec![
            ChatMessage::new(Role::System, system),
            ChatMessage::new(Role::User, user),
        ];
        let mut stream = self.chat_stream(messages, self.options.clone());
        let mut text = String::new();
        while let Some(ev) = stream.next().await {
            match ev {
                Ok(StreamEvent::Content(t)) => text.push_str(&t),
                Ok(StreamEvent::Done) => break,
                Err(e) => {
                    return Err(match e.downcast::<LlmError>() {
                        Ok(llm) => llm,
                        Err(other) => LlmError::RequestFailed(format!("{other:#}")),
                    })
                }
            }
        }
        debug!(model = %self.options.model, chars = text.len(), "generation finished");
        if text.trim().is_empty() {
            return Err(LlmError::EmptyResponse);
        }
        Ok(text)
    }
}

#[derive(Debug, PartialEq)]
pub enum StreamEvent {
    Content(String),
    Done,
}

fn normalize_base_url(api_base_url: &str) -> String {
    if api_base_url == "default" {
        return "https://api.openai.com/v1".to_string();
    }
    let trimmed = api_base_url.trim_end_matches('/');
    if !trimmed.ends_with("/v1") && !trimmed.contains("/v1/") {
        format!("{}/v1", trimmed)
    } else {
        trimmed.to_string()
    }
}

/// One server-sent-events line; `None` for comments, blanks and malformed payloads.
fn parse_sse_line(line: &str) -> Option<StreamEvent> {
    if line.is_empty() || line.starts_with(':') {
        return None;
    }
    let payload = line.strip_prefix("data:")?.trim();
    if payload == "[DONE]" {
        return Some(StreamEvent::Done);
    }
    let chunk = serde_json::from_str::<Chunk>(payload).ok()?;
    let content: String = chunk
        .choices
        .into_iter()
        .filter_map(|c| c.delta.and_then(|d| d.content))
        .collect();
    (!content.is_empty()).then_some(StreamEvent::Content(content))
}

// Minimal chunk structures for OpenAI-like streaming
#[derive(Debug, Deserialize)]
struct Chunk {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    delta: Option<Delta>,
}

#[derive(Debug, Deserialize)]
struct Delta {
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_normalization() {
        assert_eq!(normalize_base_url("default"), "https://api.openai.com/v1");
        assert_eq!(normalize_base_url("http://localhost:4000/"), "http://localhost:4000/v1");
        assert_eq!(normalize_base_url("http://proxy/v1/"), "http://proxy/v1");
    }

    #[test]
    fn sse_lines() {
        assert_eq!(parse_sse_line("data: [DONE]"), Some(StreamEvent::Done));
        assert_eq!(parse_sse_line(": keepalive"), None);
        assert_eq!(parse_sse_line("data: {not json"), None);
        let line = r#"data: {"choices":[{"delta":{"content":"fig = 1"}}]}"#;
        assert_eq!(parse_sse_line(line), Some(StreamEvent::Content("fig = 1".into())));
        let empty = r#"data: {"choices":[{"delta":{"role":"assistant"}}]}"#;
        assert_eq!(parse_sse_line(empty), None);
    }

    #[tokio::test]
    async fn offline_generator_always_fails() {
        let err = OfflineGenerator.generate("sys", "user").await.unwrap_err();
        assert!(matches!(err, LlmError::Offline));
    }

    #[tokio::test]
    async fn client_without_key_fails_fast() {
        let cfg = Config::from_pairs([("OPENAI_API_KEY", "")]);
        let client = LlmClient::from_config(&cfg).unwrap();
        if client.has_api_key() {
            // a real key in the environment wins over the pair
            return;
        }
        let err = client.generate("sys", "user").await.unwrap_err();
        assert!(matches!(err, LlmError::MissingApiKey));
    }
}
