use super::*;
use crate::llm::Role;

#[test]
fn turns_are_kept_in_order() {
    let mut history = ChatHistory::new();
    assert!(history.is_empty());

    history.push_turn("Any good heist movies?", "Try Heat (1995).");
    history.push_turn("Who directed it?", "Michael Mann.");

    let roles: Vec<Role> = history.iter().map(|m| m.role).collect();
    assert_eq!(roles, vec![Role::Human, Role::Ai, Role::Human, Role::Ai]);
    assert_eq!(history.messages()[2].content, "Who directed it?");
    assert_eq!(history.len(), 4);
}

#[test]
fn reset_empties_history() {
    let mut history = ChatHistory::with_greeting("hello");
    history.push(ChatMessage::human("hi"));
    assert_eq!(history.len(), 2);

    history.reset();
    assert!(history.is_empty());
}

#[test]
fn greeting_is_an_ai_message() {
    let history = ChatHistory::with_greeting("Welcome!");
    assert_eq!(history.messages(), &[ChatMessage::ai("Welcome!")]);
}

#[test]
fn serializes_as_message_list() {
    let mut history = ChatHistory::new();
    history.extend([ChatMessage::human("q1"), ChatMessage::ai("a1")]);

    let json = serde_json::to_value(&history).expect("history should serialize");
    assert_eq!(
        json,
        serde_json::json!([
            { "role": "human", "content": "q1" },
            { "role": "ai", "content": "a1" },
        ])
    );
}
