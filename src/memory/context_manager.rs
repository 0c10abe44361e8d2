use serde::{Deserialize, Serialize};

use super::session::SessionEntry;
use super::{estimate_tokens, DEFAULT_MAX_CONTEXT_TOKENS};

/// When expired messages are dropped from the context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PruningTrigger {
    /// Send the whole transcript.
    Never,
    /// Drop every expired message.
    Always,
    /// Drop expired messages only while the context is over `max_tokens`.
    #[default]
    TokenBudget,
}

/// Order among expired messages equally overdue and equally important.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    #[default]
    OldestFirst,
    NewestFirst,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PruningPolicy {
    pub trigger: PruningTrigger,
    /// Budget for [`PruningTrigger::TokenBudget`].
    pub max_tokens: usize,
    pub tie_break: TieBreak,
}

impl Default for PruningPolicy {
    fn default() -> Self {
        Self {
            trigger: PruningTrigger::default(),
            max_tokens: DEFAULT_MAX_CONTEXT_TOKENS,
            tie_break: TieBreak::default(),
        }
    }
}

/// Applies a [`PruningPolicy`] to a transcript.
#[derive(Debug, Clone, Default)]
pub struct ContextManager {
    policy: PruningPolicy,
}

impl ContextManager {
    pub fn new(policy: PruningPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &PruningPolicy {
        &self.policy
    }

    /// One flag per entry: `true` if the entry goes into the context.
    pub fn select(&self, entries: &[SessionEntry]) -> Vec<bool> {
        let mut keep = vec![true; entries.len()];
        if self.policy.trigger == PruningTrigger::Never {
            return keep;
        }

        let mut candidates: Vec<usize> = entries
            .iter()
            .enumerate()
            .filter(|(_, entry)| entry.is_expired())
            .map(|(index, _)| index)
            .collect();

        // Most overdue, then least important, then position.
        candidates.sort_by(|&a, &b| {
            let (ea, eb) = (&entries[a], &entries[b]);
            ea.remaining_turns()
                .cmp(&eb.remaining_turns())
                .then(ea.message.importance.cmp(&eb.message.importance))
                .then(match self.policy.tie_break {
                    TieBreak::OldestFirst => a.cmp(&b),
                    TieBreak::NewestFirst => b.cmp(&a),
                })
        });

        let mut total: usize = entries
            .iter()
            .map(|entry| estimate_tokens(&entry.message.text))
            .sum();

        for index in candidates {
            if self.policy.trigger == PruningTrigger::TokenBudget && total <= self.policy.max_tokens
            {
                break;
            }
            keep[index] = false;
            total -= estimate_tokens(&entries[index].message.text);
        }

        keep
    }
}
