//! Conversation memory for agent runners.
//!
//! - [`session`] holds the append-only transcript of one agent.
//! - [`context_manager`] decides which transcript messages are sent with a
//!   completion request, based on each message's `ttl` and importance.

pub mod context_manager;
pub mod session;

pub use context_manager::{ContextManager, PruningPolicy, PruningTrigger, TieBreak};
pub use session::{ChatSession, SessionEntry};

/// Default token budget before expired messages are pruned from context.
pub const DEFAULT_MAX_CONTEXT_TOKENS: usize = 8000;

/// Estimates token count for a message (rough approximation).
///
/// Uses a simple heuristic of ~4 characters per token for English text.
pub fn estimate_tokens(text: &str) -> usize {
    text.len().div_ceil(4)
}
