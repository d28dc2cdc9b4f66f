use std::collections::HashMap;

use serde::Deserialize;

use crate::provider::Capability;

/// Default minimum answer length accepted by the normalizer
const fn default_min_content_len() -> usize {
    2
}

/// Routing policy configuration
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RoutingConfig {
    /// Provider preferred for general questions with no override
    #[serde(default)]
    pub default_provider: Option<String>,
    /// Minimum character count for an answer to be accepted
    #[serde(default = "default_min_content_len")]
    pub min_content_len: usize,
    /// Category affinity overrides: category -> ordered capability preference
    ///
    /// Categories absent from the map keep the built-in preference order.
    #[serde(default)]
    pub affinity: HashMap<Category, Vec<Capability>>,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            default_provider: None,
            min_content_len: default_min_content_len(),
            affinity: HashMap::new(),
        }
    }
}

/// Coarse question category assigned by the classifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Computation, proofs, equations
    Math,
    /// Writing, reviewing, or debugging code
    Code,
    /// Multi-step explanation or analysis
    Reasoning,
    /// Predominantly Chinese-language content
    ChineseNlp,
    /// Everything else
    General,
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Math => "math",
            Self::Code => "code",
            Self::Reasoning => "reasoning",
            Self::ChineseNlp => "chinese_nlp",
            Self::General => "general",
        };
        f.write_str(name)
    }
}
