#![allow(clippy::must_use_candidate)]

mod circuit;
mod env;
mod loader;
mod provider;
mod routing;

use indexmap::IndexMap;
use serde::Deserialize;

pub use circuit::CircuitConfig;
pub use provider::{Capability, ProviderConfig, ProviderKind};
pub use routing::{Category, RoutingConfig};

/// Top-level sage configuration
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Provider configurations keyed by name
    #[serde(default)]
    pub providers: IndexMap<String, ProviderConfig>,
    /// Routing policy
    #[serde(default)]
    pub routing: RoutingConfig,
    /// Circuit breaker settings shared by all providers
    #[serde(default)]
    pub circuit: CircuitConfig,
}
