//! Black-box checks of the invariants spec.md §8 lists for
//! `ConversationHistory`: item 0 is always the system item, tool results must
//! correlate to a previously announced `call_id`, and `to_wire` round-trips
//! through the responses dialect without losing call correlation.

use agent_core::{ConversationHistory, Item, OpenAiAdapter, ProviderAdapter, ToolCall, WireApi};
use serde_json::json;
use std::time::Duration;

fn adapter() -> OpenAiAdapter {
    OpenAiAdapter::new(
        Some("test-key".into()),
        "http://localhost:1234/v1",
        "test-model",
        WireApi::Responses,
        Duration::from_secs(5),
    )
    .unwrap()
}

#[test]
fn orphan_tool_result_is_rejected() {
    let mut history = ConversationHistory::new("be helpful");
    history.append(Item::user("run ls")).unwrap();

    let err = history.append(Item::tool("c1", "file.txt")).unwrap_err();
    assert!(err.to_string().contains("orphan"));
    assert_eq!(history.len(), 2);
}

#[test]
fn tool_result_after_matching_announcement_is_accepted() {
    let mut history = ConversationHistory::new("be helpful");
    history.append(Item::user("run ls")).unwrap();
    history
        .append(Item::assistant_tool_calls(
            None,
            vec![ToolCall::function("c1", "shell", json!({"command": "ls"}))],
        ))
        .unwrap();
    history.append(Item::tool("c1", "file.txt\n")).unwrap();

    assert_eq!(history.len(), 4);
    assert!(matches!(history.snapshot().last(), Some(Item::Tool { .. })));
}

#[test]
fn replace_system_keeps_item_zero_in_place() {
    let mut history = ConversationHistory::new("v1 prompt");
    history.append(Item::user("hi")).unwrap();
    history.replace_system("v2 prompt");

    let snapshot = history.snapshot();
    match &snapshot[0] {
        Item::System { content } => assert_eq!(content, "v2 prompt"),
        other => panic!("expected System at index 0, got {other:?}"),
    }
    assert_eq!(snapshot.len(), 2);
}

#[test]
fn to_wire_responses_round_trips_call_ids() {
    let mut history = ConversationHistory::new("be helpful");
    history.append(Item::user("run ls")).unwrap();
    history
        .append(Item::assistant_tool_calls(
            Some("checking".to_string()),
            vec![ToolCall::function("c1", "shell", json!({"command": "ls"}))],
        ))
        .unwrap();
    history.append(Item::tool("c1", "file.txt\n")).unwrap();

    let adapter = adapter();
    let wire = history.to_wire(&adapter, WireApi::Responses);
    let reconstructed = adapter.from_wire(&wire);

    let original = history.snapshot();
    assert_eq!(original.len(), reconstructed.len());
    for item in &original {
        if let Item::Assistant { tool_calls: Some(calls), .. } = item {
            assert!(reconstructed.iter().any(|r| {
                matches!(r, Item::Assistant { tool_calls: Some(rc), .. }
                    if rc.iter().map(|c| &c.call_id).eq(calls.iter().map(|c| &c.call_id)))
            }));
        }
    }
}
