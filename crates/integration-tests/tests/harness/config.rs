//! Programmatic configuration builder for integration tests

use indexmap::IndexMap;
use sage_config::{Capability, CircuitConfig, Config, ProviderConfig, ProviderKind, RoutingConfig};
use secrecy::SecretString;

/// Builder for constructing test configurations
pub struct ConfigBuilder {
    providers: IndexMap<String, ProviderConfig>,
    routing: RoutingConfig,
    circuit: CircuitConfig,
}

impl ConfigBuilder {
    /// Create a new builder with minimal defaults
    pub fn new() -> Self {
        Self {
            providers: IndexMap::new(),
            routing: RoutingConfig::default(),
            circuit: CircuitConfig::default(),
        }
    }

    /// Add a provider pointed at a mock backend
    pub fn with_provider(
        mut self,
        name: &str,
        kind: ProviderKind,
        base_url: &str,
        capabilities: Vec<Capability>,
    ) -> Self {
        self.providers.insert(
            name.to_owned(),
            ProviderConfig {
                kind,
                api_key: Some(SecretString::from("test-key")),
                base_url: Some(base_url.parse().expect("valid URL")),
                default_model: "mock-model-1".to_owned(),
                max_tokens: 256,
                timeout_ms: 2_000,
                capabilities,
            },
        );
        self
    }

    /// Override one provider's per-call deadline
    pub fn with_timeout_ms(mut self, name: &str, timeout_ms: u64) -> Self {
        self.providers
            .get_mut(name)
            .expect("provider must be added first")
            .timeout_ms = timeout_ms;
        self
    }

    /// Set the default provider for general questions
    pub fn with_default_provider(mut self, name: &str) -> Self {
        self.routing.default_provider = Some(name.to_owned());
        self
    }

    /// Set circuit breaker settings
    pub fn with_circuit(mut self, circuit: CircuitConfig) -> Self {
        self.circuit = circuit;
        self
    }

    /// Build the final config
    pub fn build(self) -> Config {
        Config {
            providers: self.providers,
            routing: self.routing,
            circuit: self.circuit,
        }
    }
}
