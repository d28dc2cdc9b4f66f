use secrecy::SecretString;
use serde::Deserialize;
use url::Url;

/// Default per-call deadline in milliseconds
const fn default_timeout_ms() -> u64 {
    30_000
}

/// Default maximum output tokens per answer
const fn default_max_tokens() -> u32 {
    2_048
}

/// Configuration for a single AI provider
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderConfig {
    /// Wire protocol spoken by the provider
    pub kind: ProviderKind,
    /// API key for authentication (absent for local backends)
    #[serde(default)]
    pub api_key: Option<SecretString>,
    /// Base URL override (defaults per kind)
    #[serde(default)]
    pub base_url: Option<Url>,
    /// Model used when the caller does not override it
    pub default_model: String,
    /// Maximum output tokens requested per call
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Per-call deadline in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Capability tags used by the ranker
    #[serde(default)]
    pub capabilities: Vec<Capability>,
}

/// Supported provider wire protocols
///
/// Qwen (`DashScope` compatible-mode) and volcano-engine `DeepSeek` speak
/// the `OpenAI` protocol and are configured as `openai` with a `base_url`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// OpenAI-compatible chat completions API
    Openai,
    /// Anthropic Messages API
    Anthropic,
    /// Google Generative Language API
    Google,
    /// Local Ollama chat API
    Ollama,
}

/// Capability tag advertised by a provider and consulted at rank time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Strong at mathematics
    Math,
    /// Strong at writing and fixing code
    Code,
    /// Strong at multi-step reasoning
    Reasoning,
    /// Tuned for Chinese-language content
    Chinese,
    /// General-purpose conversational model
    General,
}
