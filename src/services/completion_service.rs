//! Client for an OpenAI-compatible chat completions endpoint.
//!
//! Turns a conversation history into a role-tagged transcript and asks the
//! upstream model for a short reply.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::config::CompletionConfig;
use crate::error::CompletionError;
use crate::models::message::Message;

/// Anything that can produce a reply to the latest user message.
#[async_trait]
pub trait ChatCompleter: Send + Sync {
    /// Generates a reply given the newest `user_message` and the prior
    /// `history` (oldest first). Only the last `max_history` entries are sent.
    async fn generate_reply(
        &self,
        user_message: &str,
        history: &[Message],
        max_history: usize,
    ) -> Result<String, CompletionError>;
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct TranscriptMessage {
    pub role: Role,
    pub content: String,
}

/// Builds the prompt: system instruction, the tail of the history, then the
/// new user message. History from `bot_sender` becomes assistant turns; other
/// senders become user turns prefixed with their name.
pub fn build_transcript(
    system_prompt: &str,
    bot_sender: &str,
    history: &[Message],
    user_message: &str,
    max_history: usize,
) -> Vec<TranscriptMessage> {
    let recent = &history[history.len().saturating_sub(max_history)..];

    let mut transcript = Vec::with_capacity(recent.len() + 2);
    transcript.push(TranscriptMessage {
        role: Role::System,
        content: system_prompt.to_string(),
    });

    transcript.extend(recent.iter().map(|msg| {
        if msg.sender == bot_sender {
            TranscriptMessage {
                role: Role::Assistant,
                content: msg.body.clone(),
            }
        } else {
            TranscriptMessage {
                role: Role::User,
                content: format!("{}: {}", msg.sender, msg.body),
            }
        }
    }));

    transcript.push(TranscriptMessage {
        role: Role::User,
        content: user_message.to_string(),
    });
    transcript
}

/// [`ChatCompleter`] that talks to the configured HTTP endpoint.
#[derive(Clone)]
pub struct CompletionClient {
    client: Client,
    config: CompletionConfig,
    bot_sender: String,
}

impl CompletionClient {
    pub fn new(config: CompletionConfig, bot_sender: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            config,
            bot_sender: bot_sender.into(),
        }
    }

    async fn send_request(
        &self,
        api_key: &str,
        body: &ChatCompletionRequest<'_>,
    ) -> Result<String, CompletionError> {
        let response = self
            .client
            .post(&self.config.endpoint)
            .bearer_auth(api_key)
            .json(body)
            .send()
            .await
            .map_err(|err| CompletionError::Upstream {
                status: None,
                message: format!("request failed: {}", err),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            error!("Completion API error ({}): {}", status, body_text);
            return Err(map_http_error(status, &body_text));
        }

        let parsed: ChatCompletionResponse =
            response
                .json()
                .await
                .map_err(|err| CompletionError::Upstream {
                    status: Some(status.as_u16()),
                    message: format!("unreadable response: {}", err),
                })?;

        extract_reply(parsed)
    }
}

#[async_trait]
impl ChatCompleter for CompletionClient {
    async fn generate_reply(
        &self,
        user_message: &str,
        history: &[Message],
        max_history: usize,
    ) -> Result<String, CompletionError> {
        let api_key = match self.config.api_key.as_deref() {
            Some(key) if !key.trim().is_empty() => key,
            _ => return Err(CompletionError::NotConfigured),
        };

        let messages = build_transcript(
            &self.config.system_prompt,
            &self.bot_sender,
            history,
            user_message,
            max_history,
        );
        debug!(
            "Requesting completion from {} with {} transcript entries",
            self.config.model,
            messages.len()
        );

        let request = ChatCompletionRequest {
            model: &self.config.model,
            messages,
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        };

        self.send_request(api_key, &request).await
    }
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<TranscriptMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

fn extract_reply(response: ChatCompletionResponse) -> Result<String, CompletionError> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .map(|content| content.trim().to_string())
        .filter(|content| !content.is_empty())
        .ok_or(CompletionError::EmptyResponse)
}

fn map_http_error(status: StatusCode, body: &str) -> CompletionError {
    let message = serde_json::from_str::<ErrorResponse>(body)
        .ok()
        .and_then(|wrapper| wrapper.error.message)
        .or_else(|| Some(body.trim().to_string()).filter(|b| !b.is_empty()))
        .unwrap_or_else(|| "Unknown error".to_string());

    CompletionError::Upstream {
        status: Some(status.as_u16()),
        message,
    }
}
