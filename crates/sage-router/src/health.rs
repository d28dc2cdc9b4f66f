//! Provider health tracking with circuit breaker semantics
//!
//! Records success/failure per provider and gates ranking so a backend
//! that is down (e.g. a local Ollama service that is not running) is not
//! hammered, while still being probed for recovery.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use dashmap::DashMap;
use sage_config::CircuitConfig;

/// Sentinel for "no latency observed yet"
const NO_LATENCY: u64 = u64::MAX;

/// Time source, injectable so tests can drive circuit transitions
/// deterministically
pub trait Clock: Send + Sync {
    /// Milliseconds since the Unix epoch
    fn now_ms(&self) -> u64;
}

/// Wall-clock time source used outside of tests
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    }
}

/// Circuit breaker state for a provider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Normal operation, calls flow through
    Closed,
    /// Provider is failing, calls are blocked until the cooldown elapses
    Open,
    /// Cooldown elapsed; one trial call is allowed through
    HalfOpen,
}

/// Per-provider health record
///
/// All fields are atomics so concurrent Asks update one provider without
/// locking the others.
struct ProviderHealth {
    consecutive_failures: AtomicU32,
    /// When the circuit opened (ms since epoch, 0 = closed)
    opened_at_ms: AtomicU64,
    /// Current cooldown; doubles on each reopen
    cooldown_ms: AtomicU64,
    /// Whether a half-open trial call is in flight
    probe_inflight: AtomicBool,
    last_latency_ms: AtomicU64,
    last_success_ms: AtomicU64,
}

impl ProviderHealth {
    fn new(initial_cooldown_ms: u64) -> Self {
        Self {
            consecutive_failures: AtomicU32::new(0),
            opened_at_ms: AtomicU64::new(0),
            cooldown_ms: AtomicU64::new(initial_cooldown_ms),
            probe_inflight: AtomicBool::new(false),
            last_latency_ms: AtomicU64::new(NO_LATENCY),
            last_success_ms: AtomicU64::new(0),
        }
    }
}

/// Process-wide provider health tracker
pub struct HealthTracker {
    providers: DashMap<String, ProviderHealth>,
    config: CircuitConfig,
    clock: Arc<dyn Clock>,
}

impl HealthTracker {
    /// Create a tracker backed by the system clock
    pub fn new(config: CircuitConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a tracker with an explicit time source
    pub fn with_clock(config: CircuitConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            providers: DashMap::new(),
            config,
            clock,
        }
    }

    /// Current circuit state for a provider
    pub fn circuit_state(&self, provider: &str) -> CircuitState {
        let Some(health) = self.providers.get(provider) else {
            return CircuitState::Closed;
        };

        let opened_at = health.opened_at_ms.load(Ordering::Relaxed);
        if opened_at == 0 {
            return CircuitState::Closed;
        }

        let elapsed = self.clock.now_ms().saturating_sub(opened_at);
        if elapsed >= health.cooldown_ms.load(Ordering::Relaxed) {
            CircuitState::HalfOpen
        } else {
            CircuitState::Open
        }
    }

    /// Whether the provider may receive new calls
    pub fn is_available(&self, provider: &str) -> bool {
        self.circuit_state(provider) != CircuitState::Open
    }

    /// Reserve the single half-open trial call
    ///
    /// Returns false if another Ask already holds the probe; the caller
    /// must then skip the provider. The reservation is released by
    /// `record_success`, `record_failure`, or `cancel_probe`.
    pub fn try_begin_probe(&self, provider: &str) -> bool {
        let Some(health) = self.providers.get(provider) else {
            return true;
        };
        health
            .probe_inflight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Release a probe reservation without recording an outcome
    ///
    /// Used when a half-open trial call is cancelled mid-flight.
    pub fn cancel_probe(&self, provider: &str) {
        if let Some(health) = self.providers.get(provider) {
            health.probe_inflight.store(false, Ordering::Release);
        }
    }

    /// Record an accepted call: close the circuit and reset the backoff
    pub fn record_success(&self, provider: &str, latency: Duration) {
        let health = self.entry(provider);
        let now = self.clock.now_ms();

        health.consecutive_failures.store(0, Ordering::Relaxed);
        health.opened_at_ms.store(0, Ordering::Relaxed);
        health.cooldown_ms.store(self.config.cooldown_ms, Ordering::Relaxed);
        health.probe_inflight.store(false, Ordering::Release);
        health
            .last_latency_ms
            .store(u64::try_from(latency.as_millis()).unwrap_or(u64::MAX), Ordering::Relaxed);
        health.last_success_ms.store(now, Ordering::Relaxed);
    }

    /// Record a non-accepted call
    ///
    /// A failure while the circuit is open (a failed half-open probe or a
    /// last-resort attempt) reopens it and doubles the cooldown, bounded
    /// by the configured cap. A failure while closed increments the
    /// consecutive counter and opens the circuit at the threshold.
    pub fn record_failure(&self, provider: &str) {
        let health = self.entry(provider);
        let now = self.clock.now_ms();

        health.probe_inflight.store(false, Ordering::Release);
        let count = health.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1;

        if health.opened_at_ms.load(Ordering::Relaxed) != 0 {
            let doubled = health
                .cooldown_ms
                .load(Ordering::Relaxed)
                .saturating_mul(2)
                .min(self.config.max_cooldown_ms);
            health.cooldown_ms.store(doubled, Ordering::Relaxed);
            health.opened_at_ms.store(now, Ordering::Relaxed);
            tracing::warn!(provider, cooldown_ms = doubled, "circuit reopened for provider");
        } else if count >= self.config.threshold {
            health.opened_at_ms.store(now, Ordering::Relaxed);
            tracing::warn!(
                provider,
                consecutive_failures = count,
                "circuit opened for provider"
            );
        }
    }

    /// Consecutive non-accepted outcomes since the last success
    pub fn consecutive_failures(&self, provider: &str) -> u32 {
        self.providers
            .get(provider)
            .map_or(0, |h| h.consecutive_failures.load(Ordering::Relaxed))
    }

    /// Latency of the most recent accepted call, if any
    pub fn last_latency(&self, provider: &str) -> Option<Duration> {
        self.providers.get(provider).and_then(|h| {
            let ms = h.last_latency_ms.load(Ordering::Relaxed);
            (ms != NO_LATENCY).then_some(Duration::from_millis(ms))
        })
    }

    /// When the provider last returned an accepted answer, if ever
    /// (ms since epoch)
    pub fn last_success_ms(&self, provider: &str) -> Option<u64> {
        self.providers.get(provider).and_then(|h| {
            let ms = h.last_success_ms.load(Ordering::Relaxed);
            (ms != 0).then_some(ms)
        })
    }

    fn entry(&self, provider: &str) -> dashmap::mapref::one::RefMut<'_, String, ProviderHealth> {
        self.providers
            .entry(provider.to_owned())
            .or_insert_with(|| ProviderHealth::new(self.config.cooldown_ms))
    }
}
