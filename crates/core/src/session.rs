use tracing::warn;

use crate::application::{Answer, InsightService};

pub const GREETING: &str = "Hello! I'll answer based on the in-depth analyses stored so far.";
pub const NOT_FOUND_REPLY: &str = "Sorry, I couldn't find anything related in the store.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

/// Transcript of one chat session. Owned by the caller and passed to each turn.
#[derive(Debug, Clone)]
pub struct ChatSession {
    messages: Vec<ChatMessage>,
}

impl Default for ChatSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatSession {
    pub fn new() -> Self {
        Self {
            messages: vec![ChatMessage {
                role: Role::Assistant,
                content: GREETING.to_string(),
            }],
        }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Runs one turn and returns the assistant reply.
    /// Failures become the reply text; the session itself never fails.
    pub fn handle(&mut self, service: &InsightService, input: &str) -> &str {
        self.push(Role::User, input.to_string());

        let reply = match service.ask(input) {
            Ok(Answer::Generated { text, .. }) => text,
            Ok(Answer::NotFound) => NOT_FOUND_REPLY.to_string(),
            Err(e) => {
                warn!("chat turn failed: {e}");
                format!("Failed to generate an answer: {e}")
            }
        };

        self.push(Role::Assistant, reply);
        &self.messages[self.messages.len() - 1].content
    }

    fn push(&mut self, role: Role, content: String) {
        self.messages.push(ChatMessage { role, content });
    }
}
