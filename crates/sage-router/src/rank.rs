//! Candidate ranking
//!
//! Turns the configured provider set into an ordered candidate list for
//! one Ask: category affinity first, then health gating, then the
//! caller's explicit override forced to the head.

use indexmap::IndexMap;
use sage_config::{Capability, Category, ProviderConfig, RoutingConfig};

use crate::health::HealthTracker;

/// Ordered candidates for one Ask
///
/// Built fresh per call and owned by that Ask; never shared.
#[derive(Debug, Clone)]
pub struct CandidateList {
    /// Provider names, most preferred first
    pub providers: Vec<String>,
    /// Whether the health filter emptied the list and a single
    /// least-recently-failing provider was chosen instead
    pub last_resort: bool,
}

/// Built-in category -> capability preference order
///
/// Deployments can re-rank via `[routing.affinity]` without a rebuild;
/// this table is the fallback policy, not a contract.
const fn builtin_affinity(category: Category) -> &'static [Capability] {
    match category {
        Category::Math => &[
            Capability::Math,
            Capability::Reasoning,
            Capability::Code,
            Capability::General,
        ],
        Category::Code => &[Capability::Code, Capability::Reasoning, Capability::General],
        Category::Reasoning => &[Capability::Reasoning, Capability::Code, Capability::General],
        Category::ChineseNlp => &[Capability::Chinese, Capability::General],
        Category::General => &[Capability::General],
    }
}

/// Rank the configured providers for one Ask
///
/// Ordering: explicit override first (explicit intent always wins), then
/// affinity rank for the category, with ties broken by lowest recent
/// latency and then configuration order. Providers with an open circuit
/// are filtered out; when that would empty the list, the single provider
/// with the smallest failure streak is returned as a last resort so stale
/// health state can never refuse an Ask outright.
pub fn rank(
    providers: &IndexMap<String, ProviderConfig>,
    category: Category,
    routing: &RoutingConfig,
    health: &HealthTracker,
    provider_override: Option<&str>,
) -> CandidateList {
    if providers.is_empty() {
        return CandidateList {
            providers: Vec::new(),
            last_resort: false,
        };
    }

    let prefs: &[Capability] = routing
        .affinity
        .get(&category)
        .map_or_else(|| builtin_affinity(category), Vec::as_slice);

    let mut order: Vec<(bool, usize, u64, usize, &str)> = providers
        .iter()
        .enumerate()
        .map(|(index, (name, config))| {
            let affinity_rank = prefs
                .iter()
                .position(|preferred| config.capabilities.contains(preferred))
                .unwrap_or(prefs.len());
            let latency = health
                .last_latency(name)
                .map_or(u64::MAX, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX));
            let is_default = category == Category::General
                && routing.default_provider.as_deref() == Some(name.as_str());
            (!is_default, affinity_rank, latency, index, name.as_str())
        })
        .collect();

    order.sort_by_key(|&(not_default, affinity_rank, latency, index, _)| {
        (not_default, affinity_rank, latency, index)
    });

    let mut candidates: Vec<String> = order
        .iter()
        .filter(|(_, _, _, _, name)| health.is_available(name))
        .map(|(_, _, _, _, name)| (*name).to_owned())
        .collect();

    if let Some(forced) = provider_override
        && let Some(position) = candidates.iter().position(|name| name == forced)
    {
        let name = candidates.remove(position);
        candidates.insert(0, name);
    }

    if candidates.is_empty() {
        // Every circuit is open. Explicit intent still wins; otherwise
        // pick the provider with the least-bad failure streak.
        let chosen = provider_override
            .filter(|forced| providers.contains_key(*forced))
            .map_or_else(|| least_bad(providers, health), str::to_owned);
        return CandidateList {
            providers: vec![chosen],
            last_resort: true,
        };
    }

    CandidateList {
        providers: candidates,
        last_resort: false,
    }
}

/// Provider with the smallest consecutive-failure streak, ties resolved
/// by configuration order
fn least_bad(providers: &IndexMap<String, ProviderConfig>, health: &HealthTracker) -> String {
    providers
        .keys()
        .enumerate()
        .min_by_key(|(index, name)| (health.consecutive_failures(name), *index))
        .map(|(_, name)| name.clone())
        .expect("providers checked non-empty")
}
