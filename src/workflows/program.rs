//! Validated, immutable workflow programs.
//!
//! A [`Program`] is only ever produced by the loader, so every `goto` target
//! resolves, every condition list ends in a default clause and every
//! action-only state transfers control.

use regex::Regex;

use crate::interpolation::Template;
use crate::types::{Importance, MessageRole};

#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub(crate) agents: Vec<Agent>,
}

impl Program {
    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    pub fn agent(&self, name: &str) -> Option<&Agent> {
        self.agents.iter().find(|agent| agent.name == name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Agent {
    pub(crate) name: String,
    pub(crate) states: Vec<State>,
}

impl Agent {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn states(&self) -> &[State] {
        &self.states
    }

    /// Index of the entry state. Always 0: the first declared state.
    pub fn entry_index(&self) -> usize {
        0
    }

    pub fn state(&self, index: usize) -> Option<&State> {
        self.states.get(index)
    }

    pub fn state_index(&self, name: &str) -> Option<usize> {
        self.states.iter().position(|state| state.name == name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct State {
    pub(crate) name: String,
    pub(crate) model: Option<String>,
    pub(crate) action: Option<Vec<Action>>,
    pub(crate) conditions: Option<ConditionList>,
}

impl State {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Model override for turns taken in this state.
    pub fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    /// Actions run every time the state is entered.
    pub fn entry_actions(&self) -> &[Action] {
        self.action.as_deref().unwrap_or_default()
    }

    pub fn conditions(&self) -> Option<&ConditionList> {
        self.conditions.as_ref()
    }
}

/// Ordered clauses plus the mandatory trailing default.
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionList {
    pub(crate) clauses: Vec<Clause>,
    pub(crate) default: Vec<Action>,
}

impl ConditionList {
    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    pub fn default_actions(&self) -> &[Action] {
        &self.default
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Clause {
    pub(crate) predicate: Predicate,
    pub(crate) actions: Vec<Action>,
}

impl Clause {
    pub fn predicate(&self) -> &Predicate {
        &self.predicate
    }

    pub fn actions(&self) -> &[Action] {
        &self.actions
    }
}

/// Test applied to the latest assistant reply.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Contains(String),
    Matches(Pattern),
}

impl Predicate {
    pub fn is_match(&self, reply: &str) -> bool {
        match self {
            Predicate::Contains(needle) => reply.contains(needle.as_str()),
            Predicate::Matches(pattern) => pattern.0.is_match(reply),
        }
    }
}

/// Compiled regex compared by its source text.
#[derive(Debug, Clone)]
pub struct Pattern(pub(crate) Regex);

impl Pattern {
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Goto(String),
    Message(MessageAction),
    SystemMessage(Template),
    End,
}

impl Action {
    /// `goto` and `end` hand control elsewhere and must close their list.
    pub fn is_transfer(&self) -> bool {
        matches!(self, Action::Goto(_) | Action::End)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MessageAction {
    pub template: Template,
    pub role: MessageRole,
    pub importance: Importance,
    pub ttl: Option<u32>,
}
