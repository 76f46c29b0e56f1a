//! Language model client used to turn message text into task JSON.
//!
//! The [`TaskInference`] trait isolates transport and model selection
//! from parsing so pollers can be driven by a deterministic stub in tests.

use std::future::Future;
use std::pin::Pin;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::LlmConfig;
use crate::errors::rejects_content;
use crate::{AppError, Result};

/// Boxed future returned by the external-service traits.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Single-shot completion against a configured model.
pub trait TaskInference: Send + Sync {
    /// Send `system_prompt` and `user_message` as a two-turn exchange.
    ///
    /// Resolves to the trimmed text of the first completion, or `None`
    /// when the model returned no content.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Rejected` when the model refuses this message's
    /// content (a 4xx other than auth, not-found or rate limiting), and
    /// `AppError::Llm` or `AppError::Http` on other transport or API
    /// failures. Callers inside a poll loop log these and retry later.
    fn complete<'a>(
        &'a self,
        system_prompt: &'a str,
        user_message: &'a str,
    ) -> BoxFuture<'a, Result<Option<String>>>;
}

/// OpenAI-compatible chat-completions client.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    http: Client,
    endpoint: String,
    model: String,
    api_key: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatTurn<'a>; 2],
}

#[derive(Debug, Serialize)]
struct ChatTurn<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiClient {
    /// Build a client from LLM settings with the configured request timeout.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Llm` if the HTTP client cannot be constructed.
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|err| AppError::Llm(format!("failed to build http client: {err}")))?;

        Ok(Self {
            http,
            endpoint: format!("{}/chat/completions", config.api_base.trim_end_matches('/')),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
        })
    }

    /// Model identifier this client sends.
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    async fn request(&self, system_prompt: &str, user_message: &str) -> Result<Option<String>> {
        let body = ChatRequest {
            model: &self.model,
            messages: [
                ChatTurn {
                    role: "system",
                    content: system_prompt,
                },
                ChatTurn {
                    role: "user",
                    content: user_message,
                },
            ],
        };

        debug!(endpoint = %self.endpoint, model = %self.model, "requesting completion");

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            let msg = format!("model returned {status}: {detail}");
            return Err(if rejects_content(status) {
                AppError::Rejected(msg)
            } else {
                AppError::Llm(msg)
            });
        }

        let parsed: ChatResponse = response.json().await?;
        Ok(first_completion(parsed))
    }
}

fn first_completion(response: ChatResponse) -> Option<String> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .map(|text| text.trim().to_owned())
        .filter(|text| !text.is_empty())
}

impl TaskInference for OpenAiClient {
    fn complete<'a>(
        &'a self,
        system_prompt: &'a str,
        user_message: &'a str,
    ) -> BoxFuture<'a, Result<Option<String>>> {
        Box::pin(self.request(system_prompt, user_message))
    }
}
