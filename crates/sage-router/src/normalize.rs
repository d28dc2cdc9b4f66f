//! Answer normalization
//!
//! An empty "success" is functionally a failure: a response that parses
//! but carries only whitespace or boilerplate refusal text must trigger
//! fallback, never reach the caller as an answer.

use crate::error::CallFailure;

/// Refusal openers that mean the provider declined rather than answered.
/// Kept short and conservative; aggressive matching would discard
/// legitimate answers that merely mention refusing.
const REFUSAL_PREFIXES: &[&str] = &[
    "i can't help with",
    "i cannot help with",
    "i'm sorry, but i can't",
    "i am sorry, but i cannot",
    "抱歉，我无法",
    "对不起，我不能",
];

/// Validate and shape raw provider output into answer content
///
/// # Errors
///
/// Returns `CallFailure::EmptyOrMalformed` for whitespace-only content,
/// content below `min_len` characters, or bare refusal boilerplate.
pub fn normalize(raw: &str, min_len: usize) -> Result<String, CallFailure> {
    let trimmed = raw.trim();

    if trimmed.is_empty() {
        return Err(CallFailure::EmptyOrMalformed(
            "response contained only whitespace".to_owned(),
        ));
    }

    if trimmed.chars().count() < min_len {
        return Err(CallFailure::EmptyOrMalformed(format!(
            "response shorter than {min_len} characters"
        )));
    }

    let lowered = trimmed.to_lowercase();
    if REFUSAL_PREFIXES.iter().any(|prefix| lowered.starts_with(prefix)) {
        return Err(CallFailure::EmptyOrMalformed(
            "response is refusal boilerplate".to_owned(),
        ));
    }

    Ok(trimmed.to_owned())
}
