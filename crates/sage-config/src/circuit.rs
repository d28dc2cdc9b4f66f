use serde::Deserialize;

const fn default_threshold() -> u32 {
    3
}

const fn default_cooldown_ms() -> u64 {
    30_000
}

const fn default_max_cooldown_ms() -> u64 {
    300_000
}

/// Circuit breaker settings applied to every provider
///
/// The circuit opens after `threshold` consecutive failures. Each reopen
/// doubles the cooldown up to `max_cooldown_ms`; a success resets both the
/// counter and the cooldown.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CircuitConfig {
    /// Consecutive failures before the circuit opens
    #[serde(default = "default_threshold")]
    pub threshold: u32,
    /// Initial cooldown before a half-open probe, in milliseconds
    #[serde(default = "default_cooldown_ms")]
    pub cooldown_ms: u64,
    /// Upper bound for the doubling cooldown, in milliseconds
    #[serde(default = "default_max_cooldown_ms")]
    pub max_cooldown_ms: u64,
}

impl Default for CircuitConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            cooldown_ms: default_cooldown_ms(),
            max_cooldown_ms: default_max_cooldown_ms(),
        }
    }
}
