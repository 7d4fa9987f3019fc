//! Completion service abstraction and the OpenAI-compatible streaming client.
//!
//! The [`CompletionService`] trait decouples the engine from the actual model
//! backend. Tests use scripted services that return predetermined replies
//! without touching the network.

use std::io::{BufRead, BufReader};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde_json::{Value, json};
use tracing::{debug, instrument, warn};

use crate::core::message::Message;
use crate::io::config::ModelConfig;

/// Receives reply fragments as the completion service produces them.
pub type TokenSink<'a> = dyn FnMut(&str) + 'a;

/// A language-model chat endpoint.
///
/// Errors returned here mean the service could not answer at all
/// (connectivity, authentication, malformed stream) and abort the turn.
pub trait CompletionService {
    /// Send `messages` and stream reply fragments to `on_token`. Returns the
    /// full reply text.
    fn chat(&self, messages: &[Message], on_token: &mut TokenSink<'_>) -> Result<String>;

    /// Send `messages` and return the full reply without forwarding fragments.
    fn complete(&self, messages: &[Message]) -> Result<String> {
        self.chat(messages, &mut |_| {})
    }
}

/// Client for `/chat/completions` endpoints speaking the OpenAI wire format
/// (OpenAI, OpenRouter, Ollama, vLLM, ...).
pub struct OpenAiClient {
    agent: ureq::Agent,
    endpoint: String,
    model: String,
    api_key: Option<String>,
    max_tokens: u32,
}

impl OpenAiClient {
    /// Build a client for `model`. The API key is read from the environment
    /// variable named by `model.api_key_env`; a missing variable means no
    /// `Authorization` header is sent.
    pub fn new(model: &ModelConfig, timeout: Duration) -> Self {
        let api_key = model
            .api_key_env
            .as_deref()
            .and_then(|var| std::env::var(var).ok())
            .filter(|key| !key.trim().is_empty());
        if api_key.is_none() {
            debug!(env = ?model.api_key_env, "no api key found, sending unauthenticated requests");
        }
        Self {
            agent: ureq::AgentBuilder::new().timeout(timeout).build(),
            endpoint: format!("{}/chat/completions", model.base_url.trim_end_matches('/')),
            model: model.model.clone(),
            api_key,
            max_tokens: model.max_tokens,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn request_body(&self, messages: &[Message]) -> Value {
        json!({
            "model": self.model,
            "messages": messages,
            "max_tokens": self.max_tokens,
            "stream": true,
        })
    }
}

impl CompletionService for OpenAiClient {
    #[instrument(skip_all, fields(model = %self.model, messages = messages.len()))]
    fn chat(&self, messages: &[Message], on_token: &mut TokenSink<'_>) -> Result<String> {
        let mut request = self
            .agent
            .post(&self.endpoint)
            .set("Content-Type", "application/json")
            .set("Accept", "text/event-stream");
        if let Some(key) = &self.api_key {
            request = request.set("Authorization", &format!("Bearer {key}"));
        }

        let response = match request.send_json(self.request_body(messages)) {
            Ok(response) => response,
            Err(ureq::Error::Status(code, response)) => {
                let body = response.into_string().unwrap_or_default();
                warn!(code, "completion request rejected");
                bail!(
                    "completion request to {} failed with status {code}: {}",
                    self.endpoint,
                    body.trim()
                );
            }
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("completion request to {}", self.endpoint));
            }
        };

        let reader = BufReader::new(response.into_reader());
        let mut reply = String::new();
        for line in reader.lines() {
            let line = line.context("read completion stream")?;
            match parse_sse_line(&line)? {
                SseEvent::Delta(fragment) => {
                    on_token(&fragment);
                    reply.push_str(&fragment);
                }
                SseEvent::Done => break,
                SseEvent::Skip => {}
            }
        }
        debug!(reply_bytes = reply.len(), "completion finished");
        Ok(reply)
    }
}

/// One interpreted line of a server-sent event stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseEvent {
    /// A reply fragment.
    Delta(String),
    /// The `[DONE]` terminator.
    Done,
    /// Keep-alives, comments, role-only deltas and blank lines.
    Skip,
}

/// Interpret a single SSE line from a streaming chat completion.
pub fn parse_sse_line(line: &str) -> Result<SseEvent> {
    let Some(payload) = line.trim().strip_prefix("data:") else {
        return Ok(SseEvent::Skip);
    };
    let payload = payload.trim();
    if payload == "[DONE]" {
        return Ok(SseEvent::Done);
    }
    if payload.is_empty() {
        return Ok(SseEvent::Skip);
    }
    let value: Value = serde_json::from_str(payload).context("parse completion chunk")?;
    if let Some(error) = value.get("error") {
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string());
        bail!("completion stream error: {message}");
    }
    let fragment = value
        .pointer("/choices/0/delta/content")
        .and_then(Value::as_str)
        .unwrap_or_default();
    if fragment.is_empty() {
        return Ok(SseEvent::Skip);
    }
    Ok(SseEvent::Delta(fragment.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_content_delta() {
        let line = r#"data: {"choices":[{"delta":{"content":"Hel"}}]}"#;
        assert_eq!(
            parse_sse_line(line).expect("parse"),
            SseEvent::Delta("Hel".to_string())
        );
    }

    #[test]
    fn parses_done_marker() {
        assert_eq!(parse_sse_line("data: [DONE]").expect("parse"), SseEvent::Done);
    }

    #[test]
    fn skips_comments_and_role_deltas() {
        assert_eq!(parse_sse_line(": keep-alive").expect("parse"), SseEvent::Skip);
        assert_eq!(parse_sse_line("").expect("parse"), SseEvent::Skip);
        let role_only = r#"data: {"choices":[{"delta":{"role":"assistant"}}]}"#;
        assert_eq!(parse_sse_line(role_only).expect("parse"), SseEvent::Skip);
    }

    #[test]
    fn stream_error_is_reported() {
        let line = r#"data: {"error":{"message":"quota exceeded"}}"#;
        let err = parse_sse_line(line).unwrap_err();
        assert!(err.to_string().contains("quota exceeded"));
    }

    #[test]
    fn malformed_chunk_is_an_error() {
        assert!(parse_sse_line("data: {not json").is_err());
    }

    #[test]
    fn endpoint_joins_base_url() {
        let model = ModelConfig {
            model: "m".to_string(),
            base_url: "http://localhost:11434/v1/".to_string(),
            api_key_env: None,
            max_tokens: 16,
        };
        let client = OpenAiClient::new(&model, Duration::from_secs(1));
        assert_eq!(client.endpoint, "http://localhost:11434/v1/chat/completions");
        assert_eq!(client.model(), "m");
    }

    #[test]
    fn unreachable_server_is_an_error() {
        let model = ModelConfig {
            model: "m".to_string(),
            base_url: "http://127.0.0.1:1".to_string(),
            api_key_env: None,
            max_tokens: 16,
        };
        let client = OpenAiClient::new(&model, Duration::from_secs(2));
        assert!(client.complete(&[Message::user("hi")]).is_err());
    }
}
