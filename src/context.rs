//! Context management utilities for manual history management.
//!
//! These are opt-in helpers a caller applies to a
//! [`crate::history::ConversationHistory`] snapshot — nothing in
//! [`crate::agent::Agent`] truncates automatically.

use crate::message::Item;

/// Estimate token count for a list of items.
///
/// Character-based approximation (1 token ≈ 4 characters), the same
/// conservative heuristic used across model families when no tokenizer is
/// available.
pub fn estimate_tokens(items: &[Item]) -> usize {
    if items.is_empty() {
        return 0;
    }

    let mut total_chars = 0;
    for item in items {
        total_chars += 8; // role formatting overhead
        match item {
            Item::System { content } | Item::User { content } => total_chars += content.len(),
            Item::Assistant {
                content,
                tool_calls,
            } => {
                if let Some(text) = content {
                    total_chars += text.len();
                }
                for call in tool_calls.iter().flatten() {
                    total_chars += call.name.len() + call.call_id.len();
                    total_chars += call.arguments.to_string().len();
                }
            }
            Item::Tool {
                tool_call_id,
                content,
            } => total_chars += tool_call_id.len() + content.len(),
            Item::Reasoning { summary, .. } => total_chars += summary.len(),
        }
    }

    total_chars += 16; // conversation-level overhead
    total_chars.div_ceil(4)
}

/// Truncate history, keeping the most recent `keep` items. Preserves item 0
/// (the system prompt) when `preserve_system` is set, since
/// [`crate::history::ConversationHistory`] requires it to stay first.
///
/// This is a simple recency truncation — it does not attempt to keep a
/// `Tool` item's matching `Assistant` announcement together, so callers
/// truncating a history bound for further `append` calls should truncate at
/// a turn boundary rather than mid-turn.
pub fn truncate_items(items: &[Item], keep: usize, preserve_system: bool) -> Vec<Item> {
    if items.is_empty() {
        return Vec::new();
    }
    if items.len() <= keep {
        return items.to_vec();
    }

    let has_system = preserve_system && matches!(items.first(), Some(Item::System { .. }));

    if has_system {
        let mut result = vec![items[0].clone()];
        if keep > 0 && items.len() > 1 {
            let start = items.len().saturating_sub(keep);
            result.extend_from_slice(&items[start.max(1)..]);
        }
        result
    } else if keep > 0 {
        let start = items.len().saturating_sub(keep);
        items[start..].to_vec()
    } else {
        Vec::new()
    }
}

/// Whether estimated history size exceeds `limit * margin`.
pub fn is_approaching_limit(items: &[Item], limit: usize, margin: f32) -> bool {
    let estimated = estimate_tokens(items);
    let threshold = (limit as f32 * margin) as usize;
    estimated > threshold
}
