//! Local Ollama chat adapter
//!
//! Speaks the native `/api/chat` protocol. No authentication; a
//! connection refusal simply means the local service is not running and
//! surfaces as a transport failure for the circuit breaker to absorb.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use url::Url;

use sage_config::ProviderConfig;

use super::ProviderClient;
use crate::error::CallFailure;
use crate::types::{Prompt, RawCompletion};

/// Default local Ollama base URL
const DEFAULT_BASE_URL: &str = "http://127.0.0.1:11434";

/// Local Ollama chat adapter
pub struct OllamaClient {
    name: String,
    client: Client,
    base_url: Url,
}

impl OllamaClient {
    /// Create from provider configuration
    ///
    /// # Panics
    ///
    /// Panics if the hardcoded default base URL is invalid (should never
    /// happen).
    pub fn new(name: String, config: &ProviderConfig) -> Self {
        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| Url::parse(DEFAULT_BASE_URL).expect("valid default URL"));

        Self {
            name,
            client: Client::new(),
            base_url,
        }
    }

    fn chat_url(&self) -> String {
        let base = self.base_url.as_str().trim_end_matches('/');
        format!("{base}/api/chat")
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
    options: ChatOptions,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatOptions {
    num_predict: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    message: Option<ResponseMessage>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: String,
}

#[async_trait]
impl ProviderClient for OllamaClient {
    fn name(&self) -> &str {
        &self.name
    }

    async fn call(
        &self,
        prompt: &Prompt,
        model: &str,
        max_tokens: u32,
        deadline: Duration,
    ) -> Result<RawCompletion, CallFailure> {
        let mut messages = Vec::with_capacity(2);
        if let Some(instruction) = prompt.system_instruction() {
            messages.push(ChatMessage {
                role: "system".to_owned(),
                content: instruction,
            });
        }
        messages.push(ChatMessage {
            role: "user".to_owned(),
            content: prompt.question.clone(),
        });

        let request = ChatRequest {
            model: model.to_owned(),
            messages,
            stream: false,
            options: ChatOptions {
                num_predict: max_tokens,
            },
        };

        let response = self
            .client
            .post(self.chat_url())
            .timeout(deadline)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(provider = %self.name, error = %e, "local model request failed");
                super::transport_failure(deadline, &e)
            })?;

        if !response.status().is_success() {
            return Err(super::status_failure(response).await);
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| super::decode_failure(deadline, &e))?;

        let content = body
            .message
            .map(|message| message.content)
            .ok_or_else(|| CallFailure::EmptyOrMalformed("no message in response".to_owned()))?;

        Ok(RawCompletion {
            content,
            model: body.model.unwrap_or_else(|| model.to_owned()),
        })
    }
}
