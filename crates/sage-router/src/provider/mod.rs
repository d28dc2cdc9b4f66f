//! Provider trait and adapters for AI backends
//!
//! Each adapter builds its backend's request shape, enforces the per-call
//! deadline, and translates backend error shapes into the shared failure
//! taxonomy. Adapters never retry; fallback policy lives in the
//! dispatcher alone.

pub mod anthropic;
pub mod google;
pub mod ollama;
pub mod openai;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;

use crate::error::CallFailure;
use crate::types::{Prompt, RawCompletion};

/// Trait implemented by each AI backend adapter
#[async_trait]
pub trait ProviderClient: Send + Sync {
    /// Provider name as configured
    fn name(&self) -> &str;

    /// Issue one question to the backend under a deadline
    ///
    /// The call must not outlive `deadline`; an elapsed deadline is
    /// reported as `CallFailure::Timeout`.
    ///
    /// # Errors
    ///
    /// Returns a `CallFailure` classifying why no usable completion was
    /// produced.
    async fn call(
        &self,
        prompt: &Prompt,
        model: &str,
        max_tokens: u32,
        deadline: Duration,
    ) -> Result<RawCompletion, CallFailure>;
}

/// Map a reqwest send/read error into the failure taxonomy
pub(crate) fn transport_failure(deadline: Duration, error: &reqwest::Error) -> CallFailure {
    if error.is_timeout() {
        CallFailure::Timeout(deadline)
    } else {
        CallFailure::Transport(error.to_string())
    }
}

/// Map a decode error on a 2xx body into the failure taxonomy
pub(crate) fn decode_failure(deadline: Duration, error: &reqwest::Error) -> CallFailure {
    if error.is_timeout() {
        CallFailure::Timeout(deadline)
    } else {
        CallFailure::EmptyOrMalformed(format!("failed to parse response: {error}"))
    }
}

/// Classify a non-success status, consuming the response body as detail
pub(crate) async fn status_failure(response: reqwest::Response) -> CallFailure {
    let status = response.status();
    let detail = response.text().await.unwrap_or_default();

    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        CallFailure::Auth(format!("provider returned {status}: {detail}"))
    } else {
        CallFailure::Upstream {
            status: status.as_u16(),
            detail,
        }
    }
}
