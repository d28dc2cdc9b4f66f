//! Structured completion events
//!
//! One event per completed Ask, emitted through `tracing` for the
//! external telemetry layer. The router itself persists nothing.

use std::time::Duration;

use crate::types::SelectionReason;

/// Telemetry record for one completed Ask
#[derive(Debug)]
pub struct AskEvent<'a> {
    /// Providers that received a call, in order
    pub tried: &'a [String],
    /// Provider whose answer was accepted, if any
    pub selected_provider: Option<&'a str>,
    /// Model whose answer was accepted, if any
    pub selected_model: Option<&'a str>,
    /// Wall time for the whole Ask
    pub elapsed: Duration,
    /// Terminal outcome: accepted, exhausted, or configuration_error
    pub outcome: &'static str,
    /// Why the selected provider was chosen
    pub reason: Option<&'a SelectionReason>,
}

/// Emit the event on the `sage::ask` target
pub fn emit(event: &AskEvent<'_>) {
    let reason = event.reason.map(ToString::to_string);
    tracing::info!(
        target: "sage::ask",
        tried = ?event.tried,
        selected_provider = event.selected_provider,
        selected_model = event.selected_model,
        elapsed_ms = u64::try_from(event.elapsed.as_millis()).unwrap_or(u64::MAX),
        outcome = event.outcome,
        reason = reason.as_deref(),
        "ask completed"
    );
}
