//! Greedy token-budget truncation of conversation history.
//!
//! Token costs are estimated as `ceil(chars / 2)` — a deliberately cheap
//! approximation, not a tokenizer. The estimator and
//! [`CONTEXT_TOKEN_BUDGET`] are tuned together; changing one without
//! re-validating the other shifts how much context actually fits.

use qprovider::ChatMessage;

pub const CONTEXT_TOKEN_BUDGET: usize = 7000;

pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(2)
}

/// Keeps the longest suffix of `history` whose estimated cost, together
/// with the system prompt's, stays within `budget`. The newest message
/// always survives, even when it alone exceeds the budget; chronological
/// order is preserved.
pub fn truncate_history(
    system_prompt: &str,
    history: &[ChatMessage],
    budget: usize,
) -> Vec<ChatMessage> {
    let mut total = estimate_tokens(system_prompt);
    let mut kept = 0;

    for message in history.iter().rev() {
        let cost = estimate_tokens(&message.content);
        if total + cost > budget {
            if kept == 0 && !history.is_empty() {
                kept = 1;
            }
            break;
        }

        total += cost;
        kept += 1;
    }

    history[history.len() - kept..].to_vec()
}
