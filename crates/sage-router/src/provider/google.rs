//! Google Generative Language API adapter

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use url::Url;

use sage_config::ProviderConfig;

use super::ProviderClient;
use crate::error::CallFailure;
use crate::types::{Prompt, RawCompletion};

/// Default Google Generative Language API base URL
const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Google Generative Language API adapter
pub struct GoogleClient {
    name: String,
    client: Client,
    base_url: Url,
    api_key: Option<SecretString>,
}

impl GoogleClient {
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
            api_key: config.api_key.clone(),
        }
    }

    /// Build the `generateContent` URL; the key rides as a query
    /// parameter per the Google API convention
    fn generate_url(&self, model: &str) -> String {
        let base = self.base_url.as_str().trim_end_matches('/');
        match &self.api_key {
            Some(key) => format!("{base}/models/{model}:generateContent?key={}", key.expose_secret()),
            None => format!("{base}/models/{model}:generateContent"),
        }
    }
}

#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
    #[serde(rename = "systemInstruction", skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Content,
}

#[async_trait]
impl ProviderClient for GoogleClient {
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
        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: prompt.question.clone(),
                }],
            }],
            generation_config: GenerationConfig {
                max_output_tokens: max_tokens,
            },
            system_instruction: prompt.system_instruction().map(|text| Content {
                parts: vec![Part { text }],
            }),
        };

        let response = self
            .client
            .post(self.generate_url(model))
            .timeout(deadline)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(provider = %self.name, error = %e, "upstream request failed");
                super::transport_failure(deadline, &e)
            })?;

        if !response.status().is_success() {
            return Err(super::status_failure(response).await);
        }

        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| super::decode_failure(deadline, &e))?;

        // Google does not echo the model back; report the one requested
        let content = body
            .candidates
            .into_iter()
            .next()
            .map(|candidate| {
                candidate
                    .content
                    .parts
                    .into_iter()
                    .map(|part| part.text)
                    .collect::<String>()
            })
            .ok_or_else(|| CallFailure::EmptyOrMalformed("no candidates in response".to_owned()))?;

        Ok(RawCompletion {
            content,
            model: model.to_owned(),
        })
    }
}
