//! YAML schema types for workflow definitions.
//!
//! A workflow file declares agents, each a list of states:
//!
//! ```yaml
//! agents:
//! -   name: agent1
//!     states:
//!     -   name: initial
//!         action:
//!         -   system_message: "Here are your instructions."
//!         -   goto: some_state
//!     -   name: some_state
//!         model: llama3.2
//!         conditions:
//!         -   if:
//!                 contains: "$$$python"
//!                 action:
//!                 -   message: "The Python output is:\n\n{python()}"
//!         -   default:
//!                 action:
//!                 -   message:
//!                         text: "Please write some code."
//!                         importance: low
//!                         ttl: 1
//!                 -   end
//! ```
//!
//! Actions and conditions are kept as raw [`serde_yaml::Value`]s here; the
//! loader interprets them so it can report the exact agent, state and index
//! of a malformed entry.

use serde::Deserialize;
use serde_yaml::Value;

use crate::types::{Importance, MessageRole};

/// Top-level workflow document.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WorkflowDocument {
    pub agents: Vec<AgentDocument>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AgentDocument {
    pub name: String,

    #[serde(default)]
    pub states: Vec<StateDocument>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StateDocument {
    pub name: String,

    /// Model override for completion turns taken in this state
    #[serde(default)]
    pub model: Option<String>,

    /// Actions run on entry
    #[serde(default)]
    pub action: Option<Vec<Value>>,

    /// Ordered clauses, the last being `default`
    #[serde(default)]
    pub conditions: Option<Vec<Value>>,
}

/// Body of an `if:` clause.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IfDocument {
    #[serde(default)]
    pub contains: Option<String>,

    #[serde(default)]
    pub matches: Option<String>,

    #[serde(default)]
    pub action: Vec<Value>,
}

/// Body of a `default:` clause.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DefaultDocument {
    #[serde(default)]
    pub action: Vec<Value>,
}

/// Long form of a `message:` action.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MessageDocument {
    pub text: String,

    #[serde(default)]
    pub role: Option<MessageRole>,

    #[serde(default)]
    pub importance: Option<Importance>,

    #[serde(default)]
    pub ttl: Option<u32>,
}
