//! Execution of a single agent's state machine.
//!
//! # Model turns
//!
//! Every visit to a condition-governed state owns one pending model turn.
//! The completion request is made the first time the visit needs the
//! model's reply:
//!
//! - evaluating an `if` predicate,
//! - rendering a template that calls `{python()}` or `{rtfm()}`,
//! - finishing a branch that stays in the state.
//!
//! A visit that leaves through `goto` or `end` without needing the reply
//! makes no request. If nothing was appended since the latest assistant
//! reply, the visit reads that reply and no request is made. When a
//! branch stays in its state, the reply fetched at the end of the visit is
//! the one the next visit evaluates.

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::program::{Action, Agent, ConditionList, Program, State};
use crate::frontend::Frontend;
use crate::interpolation::{Interpolator, RenderContext, Template};
use crate::llm::{CompletionRequest, LLMClient};
use crate::memory::{ChatSession, ContextManager, PruningPolicy};
use crate::rag::SnippetDatabase;
use crate::tools::ScriptExecutor;
use crate::types::{AppError, Message, MessageRole, Result};

pub const DEFAULT_MAX_TRANSITIONS: usize = 1000;
pub const DEFAULT_MAX_TURNS: usize = 100;

/// Collaborators shared by every agent of a workflow.
#[derive(Clone)]
pub struct Backends {
    pub llm: Arc<dyn LLMClient>,
    pub snippets: Arc<dyn SnippetDatabase>,
    pub executor: Arc<dyn ScriptExecutor>,
    pub frontend: Arc<dyn Frontend>,
}

/// Limits and policies applied to each agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerOptions {
    /// State visits allowed before the agent is failed
    pub max_transitions: usize,
    /// Completion requests allowed before the agent is failed
    pub max_turns: usize,
    /// Snippets requested per `{rtfm()}` call
    pub top_k: usize,
    pub pruning: PruningPolicy,
}

impl Default for RunnerOptions {
    fn default() -> Self {
        Self {
            max_transitions: DEFAULT_MAX_TRANSITIONS,
            max_turns: DEFAULT_MAX_TURNS,
            top_k: 5,
            pruning: PruningPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Running a state's entry actions
    Entry,
    /// Choosing or running a condition branch
    Evaluating,
    /// Waiting on the completion backend
    AwaitingCompletion,
    Terminated,
    Failed,
}

/// Where control goes after an action list.
enum Flow {
    Stay,
    Goto(usize),
    End,
}

/// Runs one agent of a [`Program`] to completion.
pub struct AgentRunner {
    program: Arc<Program>,
    agent_index: usize,
    name: String,
    current: usize,
    phase: Phase,
    session: ChatSession,
    context: ContextManager,
    llm: Arc<dyn LLMClient>,
    frontend: Arc<dyn Frontend>,
    interpolator: Interpolator,
    options: RunnerOptions,
    transitions: usize,
    turns: usize,
    /// This visit still owes a completion request.
    turn_owed: bool,
    /// A reply was fetched at the end of the previous visit for this one.
    reply_ready: bool,
    /// Messages were appended after the latest reply.
    unanswered: bool,
}

impl AgentRunner {
    /// Create a runner for the agent at `agent_index`.
    pub fn new(
        program: Arc<Program>,
        agent_index: usize,
        backends: &Backends,
        options: &RunnerOptions,
    ) -> Result<Self> {
        let agent = program.agents().get(agent_index).ok_or_else(|| {
            AppError::NotFound(format!("Agent index {} is out of range", agent_index))
        })?;
        let name = agent.name().to_string();
        let current = agent.entry_index();

        let interpolator = Interpolator::new(
            Arc::clone(&backends.snippets),
            Arc::clone(&backends.executor),
            Arc::clone(&backends.frontend),
        )
        .with_top_k(options.top_k);

        Ok(Self {
            program,
            agent_index,
            name,
            current,
            phase: Phase::Entry,
            session: ChatSession::new(),
            context: ContextManager::new(options.pruning.clone()),
            llm: Arc::clone(&backends.llm),
            frontend: Arc::clone(&backends.frontend),
            interpolator,
            options: options.clone(),
            transitions: 0,
            turns: 0,
            turn_owed: false,
            reply_ready: false,
            unanswered: false,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn session(&self) -> &ChatSession {
        &self.session
    }

    /// Name of the state the runner is in, or last was in.
    pub fn current_state(&self) -> &str {
        self.program.agents()[self.agent_index].states()[self.current].name()
    }

    /// Completion requests made so far.
    pub fn turns(&self) -> usize {
        self.turns
    }

    pub fn transitions(&self) -> usize {
        self.transitions
    }

    /// Drive the agent until it reaches `end` or fails.
    pub async fn run(&mut self) -> Result<()> {
        info!(agent = %self.name, "Agent started");
        let result = self.drive().await;

        match &result {
            Ok(()) => {
                self.phase = Phase::Terminated;
                info!(
                    agent = %self.name,
                    turns = self.turns,
                    messages = self.session.len(),
                    "Agent terminated"
                );
            }
            Err(e) => {
                self.phase = Phase::Failed;
                warn!(agent = %self.name, state = self.current_state(), error = %e, "Agent failed");
            }
        }

        result
    }

    async fn drive(&mut self) -> Result<()> {
        let program = Arc::clone(&self.program);
        let agent = &program.agents()[self.agent_index];
        let mut index = agent.entry_index();
        let mut entering = true;

        loop {
            self.transitions += 1;
            if self.transitions > self.options.max_transitions {
                return Err(AppError::Workflow(format!(
                    "Agent '{}' exceeded {} state transitions",
                    self.name, self.options.max_transitions
                )));
            }

            self.current = index;
            let state = agent.state(index).ok_or_else(|| {
                AppError::Internal(format!("State index {} is out of range", index))
            })?;

            if entering {
                debug!(agent = %self.name, state = state.name(), "Entering state");
                self.phase = Phase::Entry;
                match self.execute(agent, state, state.entry_actions()).await? {
                    Flow::Goto(next) => {
                        index = next;
                        continue;
                    }
                    Flow::End => return Ok(()),
                    Flow::Stay => {}
                }
            }

            let Some(conditions) = state.conditions() else {
                return Err(AppError::Workflow(format!(
                    "State '{}' has no transition out",
                    state.name()
                )));
            };

            self.begin_visit();
            self.phase = Phase::Evaluating;
            let actions = self.select_branch(state, conditions).await?;

            match self.execute(agent, state, actions).await? {
                Flow::Goto(next) => {
                    index = next;
                    entering = true;
                }
                Flow::End => return Ok(()),
                Flow::Stay => {
                    self.finish_stay(state).await?;
                    entering = false;
                }
            }
        }
    }

    fn begin_visit(&mut self) {
        if self.reply_ready {
            self.reply_ready = false;
            self.turn_owed = false;
        } else {
            self.turn_owed = true;
        }
    }

    /// Staying always asks for a fresh reply for the next visit.
    async fn finish_stay(&mut self, state: &State) -> Result<()> {
        self.turn_owed = false;
        self.request_completion(state).await?;
        self.reply_ready = true;
        Ok(())
    }

    /// First matching clause in declared order, else the default.
    async fn select_branch<'p>(
        &mut self,
        state: &State,
        conditions: &'p ConditionList,
    ) -> Result<&'p [Action]> {
        for clause in conditions.clauses() {
            self.observe(state).await?;
            let matched = self
                .session
                .last_assistant()
                .is_some_and(|reply| clause.predicate().is_match(&reply.text));
            if matched {
                debug!(agent = %self.name, state = state.name(), predicate = ?clause.predicate(), "Condition matched");
                return Ok(clause.actions());
            }
        }

        debug!(agent = %self.name, state = state.name(), "Default branch taken");
        Ok(conditions.default_actions())
    }

    async fn execute(&mut self, agent: &Agent, state: &State, actions: &[Action]) -> Result<Flow> {
        for action in actions {
            match action {
                Action::Goto(target) => {
                    let next = agent.state_index(target).ok_or_else(|| {
                        AppError::Workflow(format!("Unknown state '{}'", target))
                    })?;
                    debug!(agent = %self.name, from = state.name(), to = %target, "goto");
                    return Ok(Flow::Goto(next));
                }
                Action::End => {
                    debug!(agent = %self.name, state = state.name(), "end");
                    return Ok(Flow::End);
                }
                Action::SystemMessage(template) => {
                    let text = self.render(state, template).await?;
                    self.append(Message::system(text));
                }
                Action::Message(message) => {
                    let text = self.render(state, &message.template).await?;
                    self.append(
                        Message::new(message.role, text)
                            .with_importance(message.importance)
                            .with_ttl(message.ttl),
                    );
                }
            }
        }

        Ok(Flow::Stay)
    }

    async fn render(&mut self, state: &State, template: &Template) -> Result<String> {
        if template.has_calls() {
            self.observe(state).await?;
        }

        let ctx = RenderContext {
            agent: &self.name,
            last_reply: self.session.last_assistant().map(|m| m.text.as_str()),
        };
        self.interpolator.render(template, &ctx).await
    }

    /// Settle the owed turn, if any.
    ///
    /// The request is only made when the conversation has moved on since the
    /// latest assistant reply; otherwise that reply answers the visit.
    async fn observe(&mut self, state: &State) -> Result<()> {
        if !self.turn_owed {
            return Ok(());
        }
        self.turn_owed = false;

        if self.unanswered || self.session.last_assistant().is_none() {
            self.request_completion(state).await?;
        } else {
            debug!(agent = %self.name, state = state.name(), "Reusing latest reply");
        }
        Ok(())
    }

    async fn request_completion(&mut self, state: &State) -> Result<()> {
        self.turns += 1;
        if self.turns > self.options.max_turns {
            return Err(AppError::Workflow(format!(
                "Agent '{}' exceeded {} completion turns",
                self.name, self.options.max_turns
            )));
        }

        let messages = self.session.prepare_context(&self.context);
        debug!(
            agent = %self.name,
            state = state.name(),
            context = messages.len(),
            transcript = self.session.len(),
            "Requesting completion"
        );

        self.phase = Phase::AwaitingCompletion;
        let request =
            CompletionRequest::new(messages).with_model(state.model().map(str::to_string));
        let mut reply = self.llm.chat_completion(request).await?;
        self.phase = Phase::Evaluating;

        reply.role = MessageRole::Assistant;
        self.append(reply);
        self.unanswered = false;
        Ok(())
    }

    fn append(&mut self, message: Message) {
        self.frontend.handle_message(&self.name, &message);
        self.session.push(message);
        self.unanswered = true;
    }
}
