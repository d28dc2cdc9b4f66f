use std::path::Path;

use crate::Config;

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Reads the file, expands `{{ env.VAR }}` placeholders, then
    /// deserializes and validates the result.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, environment variable
    /// expansion fails, TOML parsing fails, or validation fails
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read config file {}: {e}", path.display()))?;

        let expanded = crate::env::expand_env(&raw)
            .map_err(|e| anyhow::anyhow!("config variable expansion failed: {e}"))?;

        let config: Self =
            toml::from_str(&expanded).map_err(|e| anyhow::anyhow!("failed to parse config: {e}"))?;

        config.validate()?;

        Ok(config)
    }

    /// Validate that the configuration is internally consistent
    ///
    /// An empty provider map is accepted here; the router rejects it per
    /// request so embedded callers can still construct a dispatcher from
    /// a partially built config.
    ///
    /// # Errors
    ///
    /// Returns an error if a provider entry or the routing/circuit
    /// sections are invalid
    pub fn validate(&self) -> anyhow::Result<()> {
        for (name, provider) in &self.providers {
            if provider.default_model.is_empty() {
                anyhow::bail!("provider '{name}' has an empty default_model");
            }
            if provider.timeout_ms == 0 {
                anyhow::bail!("provider '{name}' has a zero timeout_ms");
            }
            if provider.max_tokens == 0 {
                anyhow::bail!("provider '{name}' has a zero max_tokens");
            }
        }

        if let Some(ref default) = self.routing.default_provider
            && !self.providers.contains_key(default)
        {
            anyhow::bail!("routing.default_provider names unknown provider '{default}'");
        }

        if self.circuit.threshold == 0 {
            anyhow::bail!("circuit.threshold must be greater than 0");
        }
        if self.circuit.cooldown_ms == 0 {
            anyhow::bail!("circuit.cooldown_ms must be greater than 0");
        }
        if self.circuit.cooldown_ms > self.circuit.max_cooldown_ms {
            anyhow::bail!("circuit.cooldown_ms exceeds circuit.max_cooldown_ms");
        }

        Ok(())
    }
}
