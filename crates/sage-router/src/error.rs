use std::time::Duration;

use thiserror::Error;

/// Failure of a single provider call
///
/// Fallback policy is driven by these values, not by catching broad
/// exceptions: every adapter translates its backend's error shapes into
/// this taxonomy, and the dispatcher decides what happens next.
#[derive(Debug, Clone, Error)]
pub enum CallFailure {
    /// Call exceeded its deadline
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// Connection, DNS, or TLS failure before a response arrived
    #[error("transport error: {0}")]
    Transport(String),

    /// Credential rejected by the provider
    #[error("authentication rejected: {0}")]
    Auth(String),

    /// Provider returned a non-success status
    #[error("upstream returned {status}: {detail}")]
    Upstream { status: u16, detail: String },

    /// Response arrived but failed content sanity checks
    #[error("empty or malformed response: {0}")]
    EmptyOrMalformed(String),
}

impl CallFailure {
    /// Coarse classification for events and exhaustion reports
    pub const fn kind(&self) -> FailureKind {
        match self {
            Self::Timeout(_) => FailureKind::Timeout,
            Self::Transport(_) => FailureKind::Transport,
            Self::Auth(_) => FailureKind::Auth,
            Self::Upstream { .. } => FailureKind::Upstream,
            Self::EmptyOrMalformed(_) => FailureKind::EmptyOrMalformed,
        }
    }

    /// Whether the failure points at configuration rather than a
    /// transient provider fault
    ///
    /// Rejected credentials and 4xx upstream statuses still advance the
    /// fallback walk, but are flagged for operator visibility.
    pub const fn config_suspect(&self) -> bool {
        matches!(
            self,
            Self::Auth(_)
                | Self::Upstream {
                    status: 400..=499,
                    ..
                }
        )
    }
}

/// Failure kind without the per-variant detail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Deadline exceeded
    Timeout,
    /// Connection-level failure
    Transport,
    /// Credential rejected
    Auth,
    /// Non-success upstream status
    Upstream,
    /// Content failed sanity checks
    EmptyOrMalformed,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Timeout => "timeout",
            Self::Transport => "transport",
            Self::Auth => "auth",
            Self::Upstream => "upstream",
            Self::EmptyOrMalformed => "empty_or_malformed",
        };
        f.write_str(name)
    }
}

/// One discarded candidate within an Ask, in the order it was tried
#[derive(Debug, Clone)]
pub struct AttemptFailure {
    /// Provider that was tried
    pub provider: String,
    /// Why the attempt was rejected
    pub failure: CallFailure,
}

/// Terminal failure of an Ask
#[derive(Debug, Error)]
pub enum RouteError {
    /// No providers are configured
    #[error("no providers configured")]
    NoProviders,

    /// Explicit override names a provider that does not exist
    #[error("unknown provider: {provider}")]
    UnknownProvider {
        /// The name the caller asked for
        provider: String,
    },

    /// Every candidate failed; carries the ordered per-provider failures
    #[error("all {} candidate providers failed", attempts.len())]
    Exhausted {
        /// Per-provider failures in the order they were tried
        attempts: Vec<AttemptFailure>,
    },

    /// The caller cancelled the Ask
    #[error("request cancelled")]
    Cancelled,
}

impl RouteError {
    /// Whether this is a configuration problem detected before any
    /// network call was made
    pub const fn is_configuration(&self) -> bool {
        matches!(self, Self::NoProviders | Self::UnknownProvider { .. })
    }
}
