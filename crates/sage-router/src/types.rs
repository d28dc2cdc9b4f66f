//! Request and answer types shared across the router

use std::time::Duration;

use sage_config::Category;

use crate::error::AttemptFailure;

/// One inbound question
///
/// Created per call by the route layer, read-only through the pipeline.
#[derive(Debug, Clone)]
pub struct AskRequest {
    /// The question text
    pub question: String,
    /// Force a specific provider to the head of the candidate list
    pub provider_override: Option<String>,
    /// Use a specific model instead of the provider's default
    pub model_override: Option<String>,
    /// Response-language hint (e.g. "zh-CN")
    pub locale: Option<String>,
}

impl AskRequest {
    /// A plain question with no overrides
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            provider_override: None,
            model_override: None,
            locale: None,
        }
    }
}

/// Prompt material handed to a provider adapter
#[derive(Debug, Clone)]
pub struct Prompt {
    /// The question text
    pub question: String,
    /// Response-language hint
    pub locale: Option<String>,
}

impl Prompt {
    /// System-style instruction derived from the locale hint, where the
    /// wire protocol supports one
    pub fn system_instruction(&self) -> Option<String> {
        self.locale
            .as_ref()
            .map(|locale| format!("Respond in the language of locale {locale}."))
    }
}

/// Raw, un-normalized completion from a provider
#[derive(Debug, Clone)]
pub struct RawCompletion {
    /// Answer text as the provider returned it
    pub content: String,
    /// Model that produced the answer
    pub model: String,
}

/// Why the selected provider was chosen
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionReason {
    /// Caller explicitly requested this provider
    Override,
    /// Provider ranked first for the question category
    Affinity(Category),
    /// An earlier candidate failed; this provider was next in line
    Fallback {
        /// The provider whose failure triggered the advance
        from: String,
    },
    /// Every circuit was open; the least-recently-failing provider was
    /// tried anyway
    LastResort,
}

impl std::fmt::Display for SelectionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Override => f.write_str("explicit override"),
            Self::Affinity(category) => write!(f, "category affinity ({category})"),
            Self::Fallback { from } => write!(f, "fallback from {from}"),
            Self::LastResort => f.write_str("last resort (all circuits open)"),
        }
    }
}

/// Normalized answer with provenance, owned by the caller
#[derive(Debug, Clone)]
pub struct AnswerEnvelope {
    /// The answer text
    pub content: String,
    /// Provider that produced the accepted answer
    pub provider: String,
    /// Model that produced the accepted answer
    pub model: String,
    /// Wall time for the whole Ask, failovers included
    pub elapsed: Duration,
    /// Why this provider was chosen
    pub reason: SelectionReason,
    /// Candidates tried and rejected before the accepted one, in order
    pub discarded: Vec<AttemptFailure>,
}
