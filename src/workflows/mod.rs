//! Workflow Engine Module
//!
//! Workflows are state machines declared in YAML. Each agent walks its own
//! states, emitting templated messages and asking the model for replies;
//! conditions on those replies decide where it goes next.
//!
//! - [`schema`] - raw YAML document types
//! - [`loader`] - parsing and static validation into a [`Program`]
//! - [`program`] - the validated, immutable program model
//! - [`runner`] - one agent's execution loop
//! - [`engine`] - concurrent execution of all agents
//!
//! # Usage
//!
//! ```ignore
//! let program = Arc::new(load_workflow_file("workflows/python.yaml")?);
//! let mut runner = WorkflowRunner::new(program, backends, RunnerOptions::default())?;
//! let report = runner.run().await;
//! for agent in &report.agents {
//!     println!("{}: {:?}", agent.agent, agent.status);
//! }
//! ```

pub mod engine;
pub mod loader;
pub mod program;
pub mod runner;
pub mod schema;

pub use engine::{AgentReport, AgentStatus, WorkflowReport, WorkflowRunner};
pub use loader::{load_workflow, load_workflow_file, ParseError};
pub use program::{Action, Agent, Clause, ConditionList, MessageAction, Predicate, Program, State};
pub use runner::{AgentRunner, Backends, Phase, RunnerOptions};
