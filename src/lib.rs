//! # statechat
//!
//! Declarative state-machine workflows for tool-augmented conversations with
//! language models.
//!
//! A workflow is a YAML document listing agents. Each agent is a state
//! machine whose states append messages to its transcript, ask the model for
//! replies and branch on what the model said. Message templates can call
//! `{python()}` to run the Python block of the model's last reply, or
//! `{rtfm()}` to answer its documentation query with numbered extracts from
//! a snippet index.
//!
//! ## Quick Start (Library Usage)
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use statechat::{
//!     load_workflow_file, Backends, ConsoleFrontend, DisabledSnippetDatabase, Provider,
//!     PythonExecutor, RunnerOptions, StatechatConfig, WorkflowRunner,
//! };
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = StatechatConfig::load_or_default("statechat.toml")?;
//!     let provider = Provider::from_config(&config.llm)?;
//!
//!     let backends = Backends {
//!         llm: provider.create_client()?,
//!         snippets: Arc::new(DisabledSnippetDatabase),
//!         executor: Arc::new(PythonExecutor::from_config(&config.execution)),
//!         frontend: Arc::new(ConsoleFrontend::new(true)),
//!     };
//!
//!     let program = Arc::new(load_workflow_file("workflows/python.yaml")?);
//!     let mut runner = WorkflowRunner::new(program, backends, config.runner_options())?;
//!     let report = runner.run().await;
//!     println!("{}", serde_json::to_string_pretty(&report)?);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `ollama` | Ollama local inference and embeddings (default) |
//! | `openai` | OpenAI-compatible chat and embeddings endpoints (default) |
//! | `ares-vector` | Embedded HNSW snippet index (default) |
//!
//! ## Modules
//!
//! - [`workflows`] - Workflow loading, the agent state machine and the multi-agent runner
//! - [`interpolation`] - Template placeholders and fenced-block extraction
//! - [`memory`] - Agent transcripts and context pruning
//! - [`llm`] - Completion and embedding clients
//! - [`rag`] - Snippet chunking, indexing and retrieval
//! - [`tools`] - Sandboxed script execution
//! - [`frontend`] - Presentation of messages and extracts
//! - [`types`] - Messages, snippets and error handling

#![cfg_attr(docsrs, feature(doc_cfg))]

/// Command line parsing and terminal output.
pub mod cli;
/// Presentation layer for agent activity.
pub mod frontend;
/// Template placeholders and block extraction.
pub mod interpolation;
/// LLM provider clients and abstractions.
pub mod llm;
/// Transcripts and context pruning.
pub mod memory;
/// Snippet chunking, indexing and retrieval.
pub mod rag;
/// Script execution.
pub mod tools;
/// Core types (messages, snippets, errors).
pub mod types;
/// Configuration utilities.
pub mod utils;
/// Workflow loading and execution.
pub mod workflows;

// Re-export commonly used types
pub use frontend::{ConsoleFrontend, Frontend, SilentFrontend};
pub use llm::{CompletionRequest, EmbeddingClient, LLMClient, Provider};
pub use memory::{ChatSession, ContextManager, PruningPolicy};
pub use rag::{DisabledSnippetDatabase, SnippetDatabase};
#[cfg(feature = "ares-vector")]
pub use rag::VectorSnippetDatabase;
pub use tools::{PythonExecutor, ScriptExecutor, ScriptOutcome};
pub use types::{AppError, Importance, Message, MessageRole, Result, Snippet};
pub use utils::toml_config::StatechatConfig;
pub use workflows::{
    load_workflow, load_workflow_file, AgentRunner, Backends, ParseError, Program, RunnerOptions,
    WorkflowReport, WorkflowRunner,
};
