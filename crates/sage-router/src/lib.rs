//! Multi-provider question routing for sage
//!
//! Provides one `ask` operation over multiple AI backends (`OpenAI`,
//! Anthropic, Google, Qwen, volcano-engine `DeepSeek`, local Ollama):
//! classify the question, rank the configured providers, walk the
//! candidates under per-call deadlines, and return one normalized answer
//! with provenance, or one typed failure. Failovers are invisible to
//! the caller beyond the provenance metadata.

#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

pub mod classify;
pub mod dispatch;
pub mod error;
pub mod event;
pub mod health;
pub mod normalize;
pub mod provider;
pub mod rank;
pub mod types;

pub use classify::classify;
pub use dispatch::Dispatcher;
pub use error::{AttemptFailure, CallFailure, FailureKind, RouteError};
pub use health::{CircuitState, Clock, HealthTracker, SystemClock};
pub use provider::ProviderClient;
pub use rank::{CandidateList, rank};
pub use sage_config::{Capability, Category, Config};
pub use types::{AnswerEnvelope, AskRequest, Prompt, RawCompletion, SelectionReason};
