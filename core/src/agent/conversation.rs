use crate::traits::{ChatMessage, ToolCall};
use std::collections::HashSet;

/// Append-only message history of a single agent run.
///
/// Tool results can only be recorded against a call that an earlier assistant message issued,
/// so every `ToolResult` in the history has a matching `ToolCall` id before it.
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    messages: Vec<ChatMessage>,
    issued_calls: HashSet<String>,
}

impl Conversation {
    pub fn new(seed: Vec<ChatMessage>) -> Self {
        let mut conversation = Self::default();
        for message in seed {
            match message {
                ChatMessage::ToolResult { .. } => {
                    tracing::warn!("Dropping seeded tool result without a matching call");
                }
                ChatMessage::Assistant {
                    content,
                    tool_calls,
                } => conversation.push_assistant(content, tool_calls),
                other => conversation.messages.push(other),
            }
        }
        conversation
    }

    pub fn push_assistant(&mut self, content: Option<String>, tool_calls: Vec<ToolCall>) {
        self.issued_calls
            .extend(tool_calls.iter().map(|call| call.id.clone()));
        self.messages
            .push(ChatMessage::assistant_with_tool_calls(content, tool_calls));
    }

    /// Returns `false`, leaving the history untouched, when `call` was never issued.
    pub fn push_tool_result(&mut self, call: &ToolCall, payload: serde_json::Value) -> bool {
        if !self.issued_calls.contains(&call.id) {
            return false;
        }
        self.messages.push(ChatMessage::tool_result(call, payload));
        true
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn tool_result_requires_issued_call() {
        let mut conversation = Conversation::new(vec![ChatMessage::user("hi")]);
        let call = ToolCall::new("call_1", "calculate", "{}");

        assert!(!conversation.push_tool_result(&call, json!({})));
        assert_eq!(conversation.len(), 1);

        conversation.push_assistant(None, vec![call.clone()]);
        assert!(conversation.push_tool_result(&call, json!({"result": 1})));
        assert_eq!(conversation.len(), 3);
    }

    #[test]
    fn seeded_orphan_results_are_dropped() {
        let orphan = ChatMessage::tool_result(&ToolCall::new("x", "y", "{}"), json!(null));
        let conversation = Conversation::new(vec![ChatMessage::system("s"), orphan]);
        assert_eq!(conversation.messages(), &[ChatMessage::system("s")]);
    }
}
