//! Append-only conversation log for one turn.

use crate::core::message::{Message, Role};

/// Ordered message log owned by the turn in flight.
///
/// Messages can only be appended. There is no API to remove, reorder or edit
/// an entry, so every reader sees the exact history that led to its step.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Context {
    messages: Vec<Message>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a turn context from a system prompt and the prior history.
    pub fn seeded(system_prompt: &str, history: &[Message]) -> Self {
        let mut messages = Vec::with_capacity(history.len() + 1);
        if !system_prompt.trim().is_empty() {
            messages.push(Message::system(system_prompt.trim()));
        }
        messages.extend(history.iter().cloned());
        Self { messages }
    }

    pub fn append(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Most recent user message, if any.
    pub fn last_user(&self) -> Option<&Message> {
        self.messages.iter().rev().find(|m| m.role() == Role::User)
    }

    /// Most recent assistant message at or after `from`.
    pub fn last_assistant_since(&self, from: usize) -> Option<&Message> {
        self.messages
            .get(from..)
            .and_then(|tail| tail.iter().rev().find(|m| m.role() == Role::Assistant))
    }

    /// Independent copy for a new session. Later appends to either side are
    /// not visible to the other.
    pub fn fork(&self) -> Self {
        self.clone()
    }

    /// Render the log as plain text, one `role: content` block per message.
    pub fn transcript(&self) -> String {
        self.messages
            .iter()
            .map(|m| format!("{}: {}", m.role().as_str(), m.content()))
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    pub fn into_messages(self) -> Vec<Message> {
        self.messages
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeded_puts_system_prompt_first() {
        let history = vec![Message::user("hi"), Message::assistant("hello")];
        let ctx = Context::seeded("be nice", &history);
        assert_eq!(ctx.len(), 3);
        assert_eq!(ctx.messages()[0], Message::system("be nice"));
        assert_eq!(ctx.messages()[2], Message::assistant("hello"));
    }

    #[test]
    fn seeded_skips_blank_prompt() {
        let ctx = Context::seeded("  ", &[]);
        assert!(ctx.is_empty());
    }

    #[test]
    fn append_preserves_order() {
        let mut ctx = Context::new();
        ctx.append(Message::user("a"));
        ctx.append(Message::system("b"));
        ctx.append(Message::assistant("c"));
        let contents: Vec<&str> = ctx.messages().iter().map(Message::content).collect();
        assert_eq!(contents, vec!["a", "b", "c"]);
    }

    #[test]
    fn last_user_skips_later_roles() {
        let mut ctx = Context::new();
        ctx.append(Message::user("first"));
        ctx.append(Message::user("second"));
        ctx.append(Message::system("observation"));
        assert_eq!(ctx.last_user().map(Message::content), Some("second"));
    }

    #[test]
    fn last_assistant_since_ignores_earlier_replies() {
        let mut ctx = Context::new();
        ctx.append(Message::assistant("old"));
        let mark = ctx.len();
        ctx.append(Message::user("new question"));
        assert!(ctx.last_assistant_since(mark).is_none());
        ctx.append(Message::assistant("new"));
        assert_eq!(
            ctx.last_assistant_since(mark).map(Message::content),
            Some("new")
        );
    }

    #[test]
    fn fork_is_independent() {
        let mut ctx = Context::new();
        ctx.append(Message::user("shared"));
        let mut forked = ctx.fork();
        forked.append(Message::assistant("only in fork"));
        assert_eq!(ctx.len(), 1);
        assert_eq!(forked.len(), 2);
    }
}
