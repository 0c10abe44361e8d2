use crate::types::{Message, MessageRole};

use super::context_manager::ContextManager;

/// A transcript message and how many completion requests have carried it.
#[derive(Debug, Clone)]
pub struct SessionEntry {
    pub message: Message,
    pub turns_included: u32,
}

impl SessionEntry {
    /// Turns left before the message expires; `None` if it never does.
    ///
    /// Negative once the message is overdue.
    pub fn remaining_turns(&self) -> Option<i64> {
        self.message
            .ttl
            .map(|ttl| i64::from(ttl) - i64::from(self.turns_included))
    }

    pub fn is_expired(&self) -> bool {
        self.remaining_turns().is_some_and(|remaining| remaining < 0)
    }
}

/// Append-only transcript owned by a single agent runner.
#[derive(Debug, Clone, Default)]
pub struct ChatSession {
    entries: Vec<SessionEntry>,
}

impl ChatSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: Message) {
        self.entries.push(SessionEntry {
            message,
            turns_included: 0,
        });
    }

    pub fn messages(&self) -> impl Iterator<Item = &Message> {
        self.entries.iter().map(|entry| &entry.message)
    }

    pub fn entries(&self) -> &[SessionEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.entries.last().map(|entry| &entry.message)
    }

    /// Most recent message authored by the model.
    pub fn last_assistant(&self) -> Option<&Message> {
        self.entries
            .iter()
            .rev()
            .map(|entry| &entry.message)
            .find(|message| message.role == MessageRole::Assistant)
    }

    /// Build the context for the next completion request.
    ///
    /// Every message that makes it into the context has its turn count
    /// bumped. The transcript itself is left intact.
    pub fn prepare_context(&mut self, manager: &ContextManager) -> Vec<Message> {
        let keep = manager.select(&self.entries);

        self.entries
            .iter_mut()
            .zip(keep)
            .filter(|(_, keep)| *keep)
            .map(|(entry, _)| {
                entry.turns_included += 1;
                entry.message.clone()
            })
            .collect()
    }
}
