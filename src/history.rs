//! Append-only conversation log.
//!
//! A [`ConversationHistory`] is a value object the agent owns as its single
//! writable handle; the UI and the trajectory recorder only ever see
//! [`ConversationHistory::snapshot`] clones. There are no back-references
//! from items to the container and no cyclic graphs (DESIGN NOTES §9,
//! "conversation as value").

use crate::adapter::{ProviderAdapter, ProviderItem};
use crate::error::{Error, Result};
use crate::message::{Item, WireApi};

/// Append-only typed log of conversation [`Item`]s.
///
/// Ordering invariants: item 0 is exactly one `System` item and is the only
/// entry ever replaced in place ([`ConversationHistory::replace_system`]);
/// every other item is append-only. Items carry neither timestamps nor
/// sequence numbers — ordering is purely positional.
#[derive(Debug, Clone, Default)]
pub struct ConversationHistory {
    items: Vec<Item>,
}

impl ConversationHistory {
    /// Start a history with its mandatory system item.
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            items: vec![Item::system(system_prompt)],
        }
    }

    /// Replace the item-0 system prompt in place. Panics if the history was
    /// constructed without calling [`ConversationHistory::new`] first — that
    /// would violate invariant (1) in spec.md §3.
    pub fn replace_system(&mut self, content: impl Into<String>) {
        match self.items.first_mut() {
            Some(Item::System { content: existing }) => *existing = content.into(),
            _ => panic!("ConversationHistory item 0 must be a System item"),
        }
    }

    /// Append one item. Returns an [`Error::InvariantViolation`] if the item
    /// is a `Tool` result whose `tool_call_id` was never announced by a
    /// preceding assistant `tool_calls` item.
    pub fn append(&mut self, item: Item) -> Result<()> {
        if let Item::Tool { tool_call_id, .. } = &item {
            let announced = self
                .items
                .iter()
                .any(|i| i.announced_call_ids().contains(&tool_call_id.as_str()));
            if !announced {
                return Err(Error::invariant_violation(format!(
                    "orphan tool result for call_id {tool_call_id}"
                )));
            }
        }
        self.items.push(item);
        Ok(())
    }

    /// Append several items in order, stopping at the first invariant
    /// violation.
    pub fn extend(&mut self, items: impl IntoIterator<Item = Item>) -> Result<()> {
        for item in items {
            self.append(item)?;
        }
        Ok(())
    }

    /// A cheap, independently-ownable copy of the current items.
    pub fn snapshot(&self) -> Vec<Item> {
        self.items.clone()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn last_assistant_text(&self) -> Option<String> {
        self.items.iter().rev().find_map(|item| match item {
            Item::Assistant {
                content: Some(text),
                ..
            } => Some(text.clone()),
            _ => None,
        })
    }

    /// Translate the current history into a provider's wire format via the
    /// given adapter.
    pub fn to_wire(&self, adapter: &dyn ProviderAdapter, wire_api: WireApi) -> Vec<ProviderItem> {
        adapter.to_wire(&self.items, wire_api)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::ToolCall;
    use serde_json::json;

    #[test]
    fn item_zero_is_system() {
        let history = ConversationHistory::new("be helpful");
        assert_eq!(history.len(), 1);
        assert!(matches!(history.snapshot()[0], Item::System { .. }));
    }

    #[test]
    fn replace_system_mutates_in_place_without_growing() {
        let mut history = ConversationHistory::new("v1");
        history.replace_system("v2");
        assert_eq!(history.len(), 1);
        match &history.snapshot()[0] {
            Item::System { content } => assert_eq!(content, "v2"),
            _ => unreachable!(),
        }
    }

    #[test]
    fn append_rejects_orphan_tool_result() {
        let mut history = ConversationHistory::new("sys");
        let err = history.append(Item::tool("c1", "result")).unwrap_err();
        assert!(matches!(err, Error::InvariantViolation(_)));
    }

    #[test]
    fn append_accepts_tool_result_with_prior_announcement() {
        let mut history = ConversationHistory::new("sys");
        history
            .append(Item::assistant_tool_calls(
                None,
                vec![ToolCall::function("c1", "shell", json!({}))],
            ))
            .unwrap();
        history.append(Item::tool("c1", "ok")).unwrap();
        assert_eq!(history.len(), 3);
    }

    #[test]
    fn last_assistant_text_finds_most_recent() {
        let mut history = ConversationHistory::new("sys");
        history.append(Item::user("hi")).unwrap();
        history.append(Item::assistant_text("first")).unwrap();
        history.append(Item::assistant_text("second")).unwrap();
        assert_eq!(history.last_assistant_text(), Some("second".to_string()));
    }
}
