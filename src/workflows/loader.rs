//! Workflow loading and static validation.
//!
//! ```ignore
//! let program = load_workflow_file("workflows/python.yaml")?;
//! for agent in program.agents() {
//!     println!("{} has {} states", agent.name(), agent.states().len());
//! }
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use regex::Regex;
use serde_yaml::Value;
use tracing::debug;

use super::program::{
    Action, Agent, Clause, ConditionList, MessageAction, Pattern, Predicate, Program, State,
};
use super::schema::{
    AgentDocument, DefaultDocument, IfDocument, MessageDocument, StateDocument, WorkflowDocument,
};
use crate::interpolation::Template;
use crate::types::{Importance, MessageRole};

/// Why a workflow was rejected.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("Failed to read workflow file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid workflow YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Workflow declares no agents")]
    NoAgents,

    #[error("Duplicate agent name '{0}'")]
    DuplicateAgent(String),

    #[error("Agent '{0}' declares no states")]
    EmptyAgent(String),

    #[error("Agent '{agent}' declares state '{state}' more than once")]
    DuplicateState { agent: String, state: String },

    #[error("State '{agent}.{state}' has neither `action` nor `conditions`")]
    MissingBody { agent: String, state: String },

    #[error("State '{agent}.{state}' has a malformed action at index {index}: {reason}")]
    MalformedAction {
        agent: String,
        state: String,
        index: usize,
        reason: String,
    },

    #[error("State '{agent}.{state}' has a malformed condition at index {index}: {reason}")]
    MalformedCondition {
        agent: String,
        state: String,
        index: usize,
        reason: String,
    },

    #[error("State '{agent}.{state}': the `default` clause must be the last condition")]
    DefaultNotLast { agent: String, state: String },

    #[error("State '{agent}.{state}': condition list has no `default` clause")]
    MissingDefault { agent: String, state: String },

    #[error("State '{agent}.{state}': action at index {index} follows a `goto` or `end`")]
    ActionAfterTransfer {
        agent: String,
        state: String,
        index: usize,
    },

    #[error("State '{agent}.{state}': action list must end with `goto` or `end`")]
    FallsThrough { agent: String, state: String },

    #[error("State '{agent}.{state}': `goto` target '{target}' does not exist")]
    UnknownGotoTarget {
        agent: String,
        state: String,
        target: String,
    },

    #[error("State '{agent}.{state}': unknown template function `{function}()`")]
    UnknownFunction {
        agent: String,
        state: String,
        function: String,
    },

    #[error("State '{agent}.{state}': invalid pattern '{pattern}': {reason}")]
    InvalidPattern {
        agent: String,
        state: String,
        pattern: String,
        reason: String,
    },
}

/// Parse and validate workflow YAML.
pub fn load_workflow(text: &str) -> Result<Program, ParseError> {
    let document: WorkflowDocument = serde_yaml::from_str(text)?;

    if document.agents.is_empty() {
        return Err(ParseError::NoAgents);
    }

    let mut seen = HashSet::new();
    let mut agents = Vec::with_capacity(document.agents.len());
    for agent in &document.agents {
        if !seen.insert(agent.name.as_str()) {
            return Err(ParseError::DuplicateAgent(agent.name.clone()));
        }
        agents.push(load_agent(agent)?);
    }

    debug!(agents = agents.len(), "Workflow loaded");
    Ok(Program { agents })
}

/// Read a workflow file and load it.
pub fn load_workflow_file(path: impl AsRef<Path>) -> Result<Program, ParseError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|source| ParseError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    load_workflow(&text)
}

fn load_agent(doc: &AgentDocument) -> Result<Agent, ParseError> {
    if doc.states.is_empty() {
        return Err(ParseError::EmptyAgent(doc.name.clone()));
    }

    let mut names = HashSet::new();
    for state in &doc.states {
        if !names.insert(state.name.as_str()) {
            return Err(ParseError::DuplicateState {
                agent: doc.name.clone(),
                state: state.name.clone(),
            });
        }
    }

    let states = doc
        .states
        .iter()
        .map(|state| {
            StateLoader {
                agent: &doc.name,
                state: &state.name,
                known_states: &names,
            }
            .load(state)
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Agent {
        name: doc.name.clone(),
        states,
    })
}

/// Validation context for one state.
struct StateLoader<'a> {
    agent: &'a str,
    state: &'a str,
    known_states: &'a HashSet<&'a str>,
}

impl StateLoader<'_> {
    fn load(&self, doc: &StateDocument) -> Result<State, ParseError> {
        if doc.action.is_none() && doc.conditions.is_none() {
            return Err(ParseError::MissingBody {
                agent: self.agent.to_string(),
                state: self.state.to_string(),
            });
        }

        let action = doc
            .action
            .as_deref()
            .map(|raw| self.action_list(raw))
            .transpose()?;

        let conditions = doc
            .conditions
            .as_deref()
            .map(|raw| self.condition_list(raw))
            .transpose()?;

        if conditions.is_none() {
            let transfers = action
                .as_ref()
                .and_then(|actions| actions.last())
                .is_some_and(Action::is_transfer);
            if !transfers {
                return Err(ParseError::FallsThrough {
                    agent: self.agent.to_string(),
                    state: self.state.to_string(),
                });
            }
        }

        Ok(State {
            name: doc.name.clone(),
            model: doc.model.clone(),
            action,
            conditions,
        })
    }

    fn condition_list(&self, raw: &[Value]) -> Result<ConditionList, ParseError> {
        let mut clauses = Vec::new();
        let mut default = None;

        for (index, value) in raw.iter().enumerate() {
            if default.is_some() {
                return Err(ParseError::DefaultNotLast {
                    agent: self.agent.to_string(),
                    state: self.state.to_string(),
                });
            }

            let (key, body) = single_entry(value)
                .ok_or_else(|| self.malformed_condition(index, "expected `if` or `default`"))?;

            match key {
                "if" => {
                    let doc: IfDocument = serde_yaml::from_value(body.clone())
                        .map_err(|e| self.malformed_condition(index, &e.to_string()))?;
                    let predicate = self.predicate(index, &doc)?;
                    clauses.push(Clause {
                        predicate,
                        actions: self.action_list(&doc.action)?,
                    });
                }
                "default" => {
                    let doc: DefaultDocument = serde_yaml::from_value(body.clone())
                        .map_err(|e| self.malformed_condition(index, &e.to_string()))?;
                    default = Some(self.action_list(&doc.action)?);
                }
                other => {
                    return Err(self.malformed_condition(
                        index,
                        &format!("unknown condition kind `{}`", other),
                    ))
                }
            }
        }

        let default = default.ok_or_else(|| ParseError::MissingDefault {
            agent: self.agent.to_string(),
            state: self.state.to_string(),
        })?;

        Ok(ConditionList { clauses, default })
    }

    fn predicate(&self, index: usize, doc: &IfDocument) -> Result<Predicate, ParseError> {
        match (&doc.contains, &doc.matches) {
            (Some(needle), None) => Ok(Predicate::Contains(needle.clone())),
            (None, Some(pattern)) => Regex::new(pattern)
                .map(|regex| Predicate::Matches(Pattern(regex)))
                .map_err(|e| ParseError::InvalidPattern {
                    agent: self.agent.to_string(),
                    state: self.state.to_string(),
                    pattern: pattern.clone(),
                    reason: e.to_string(),
                }),
            _ => Err(self.malformed_condition(
                index,
                "`if` needs exactly one of `contains` or `matches`",
            )),
        }
    }

    fn action_list(&self, raw: &[Value]) -> Result<Vec<Action>, ParseError> {
        let actions = raw
            .iter()
            .enumerate()
            .map(|(index, value)| self.action(index, value))
            .collect::<Result<Vec<_>, _>>()?;

        if let Some(position) = actions.iter().position(Action::is_transfer) {
            if position + 1 < actions.len() {
                return Err(ParseError::ActionAfterTransfer {
                    agent: self.agent.to_string(),
                    state: self.state.to_string(),
                    index: position + 1,
                });
            }
        }

        Ok(actions)
    }

    fn action(&self, index: usize, value: &Value) -> Result<Action, ParseError> {
        if let Value::String(word) = value {
            return match word.as_str() {
                "end" => Ok(Action::End),
                other => Err(self.malformed_action(index, &format!("unknown action `{}`", other))),
            };
        }

        let (key, body) = single_entry(value)
            .ok_or_else(|| self.malformed_action(index, "expected a single-key mapping or `end`"))?;

        match key {
            "goto" => {
                let target = body
                    .as_str()
                    .ok_or_else(|| self.malformed_action(index, "`goto` needs a state name"))?;
                if !self.known_states.contains(target) {
                    return Err(ParseError::UnknownGotoTarget {
                        agent: self.agent.to_string(),
                        state: self.state.to_string(),
                        target: target.to_string(),
                    });
                }
                Ok(Action::Goto(target.to_string()))
            }
            "system_message" => {
                let text = body.as_str().ok_or_else(|| {
                    self.malformed_action(index, "`system_message` needs a string")
                })?;
                Ok(Action::SystemMessage(self.template(text)?))
            }
            "message" => self.message(index, body),
            other => Err(self.malformed_action(index, &format!("unknown action `{}`", other))),
        }
    }

    fn message(&self, index: usize, body: &Value) -> Result<Action, ParseError> {
        let doc = match body {
            Value::String(text) => MessageDocument {
                text: text.clone(),
                role: None,
                importance: None,
                ttl: None,
            },
            Value::Mapping(_) => serde_yaml::from_value(body.clone())
                .map_err(|e| self.malformed_action(index, &e.to_string()))?,
            _ => {
                return Err(self.malformed_action(index, "`message` needs a string or mapping"))
            }
        };

        Ok(Action::Message(MessageAction {
            template: self.template(&doc.text)?,
            role: doc.role.unwrap_or(MessageRole::User),
            importance: doc.importance.unwrap_or(Importance::Medium),
            ttl: doc.ttl,
        }))
    }

    fn template(&self, text: &str) -> Result<Template, ParseError> {
        Template::parse(text).map_err(|e| ParseError::UnknownFunction {
            agent: self.agent.to_string(),
            state: self.state.to_string(),
            function: e.0,
        })
    }

    fn malformed_action(&self, index: usize, reason: &str) -> ParseError {
        ParseError::MalformedAction {
            agent: self.agent.to_string(),
            state: self.state.to_string(),
            index,
            reason: reason.to_string(),
        }
    }

    fn malformed_condition(&self, index: usize, reason: &str) -> ParseError {
        ParseError::MalformedCondition {
            agent: self.agent.to_string(),
            state: self.state.to_string(),
            index,
            reason: reason.to_string(),
        }
    }
}

/// The key and value of a mapping with exactly one string key.
fn single_entry(value: &Value) -> Option<(&str, &Value)> {
    let mapping = value.as_mapping()?;
    if mapping.len() != 1 {
        return None;
    }
    let (key, body) = mapping.iter().next()?;
    Some((key.as_str()?, body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpolation::{Function, Segment};

    const MINIMAL: &str = r#"
agents:
-   name: agent1
    states:
    -   name: initial
        action:
        -   goto: some_state
    -   name: some_state
        conditions:
        -   default:
                action:
                -   end
"#;

    #[test]
    fn test_minimal_program() {
        let program = load_workflow(MINIMAL).unwrap();
        assert_eq!(program.agents().len(), 1);

        let agent = &program.agents()[0];
        assert_eq!(agent.name(), "agent1");
        assert_eq!(agent.states()[agent.entry_index()].name(), "initial");
        assert_eq!(
            agent.states()[0].entry_actions(),
            &[Action::Goto("some_state".to_string())]
        );

        let conditions = agent.states()[1].conditions().unwrap();
        assert!(conditions.clauses().is_empty());
        assert_eq!(conditions.default_actions(), &[Action::End]);
    }

    #[test]
    fn test_loading_twice_gives_equal_programs() {
        assert_eq!(load_workflow(MINIMAL).unwrap(), load_workflow(MINIMAL).unwrap());
    }

    #[test]
    fn test_message_forms() {
        let yaml = r#"
agents:
-   name: a
    states:
    -   name: s
        action:
        -   system_message: "Rules."
        -   message: "Output:\n\n{python()}"
        -   message:
                text: "remember"
                role: assistant
                importance: low
                ttl: 2
        -   end
"#;
        let program = load_workflow(yaml).unwrap();
        let actions = program.agents()[0].states()[0].entry_actions();

        match &actions[0] {
            Action::SystemMessage(template) => assert_eq!(template.source(), "Rules."),
            other => panic!("unexpected {:?}", other),
        }
        match &actions[1] {
            Action::Message(message) => {
                assert_eq!(message.role, MessageRole::User);
                assert_eq!(message.importance, Importance::Medium);
                assert_eq!(message.ttl, None);
                assert_eq!(
                    message.template.segments()[1],
                    Segment::Call(Function::Python)
                );
            }
            other => panic!("unexpected {:?}", other),
        }
        match &actions[2] {
            Action::Message(message) => {
                assert_eq!(message.role, MessageRole::Assistant);
                assert_eq!(message.importance, Importance::Low);
                assert_eq!(message.ttl, Some(2));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(actions[3], Action::End);
    }

    #[test]
    fn test_unknown_goto_target() {
        let yaml = r#"
agents:
-   name: agent1
    states:
    -   name: initial
        action:
        -   goto: nowhere
"#;
        match load_workflow(yaml) {
            Err(ParseError::UnknownGotoTarget { agent, state, target }) => {
                assert_eq!(agent, "agent1");
                assert_eq!(state, "initial");
                assert_eq!(target, "nowhere");
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
