//! Shared helpers for integration tests.

#![allow(dead_code)]

pub mod mocks;

use std::sync::Arc;

use statechat::frontend::SilentFrontend;
use statechat::workflows::{load_workflow, Backends, Program, RunnerOptions, WorkflowRunner};

use mocks::{MockExecutor, MockLLMClient, MockSnippetDatabase};

/// Backends built from the default mocks, with a silent frontend.
pub fn mock_backends(llm: MockLLMClient) -> Backends {
    Backends {
        llm: Arc::new(llm),
        snippets: Arc::new(MockSnippetDatabase::empty()),
        executor: Arc::new(MockExecutor::default()),
        frontend: Arc::new(SilentFrontend::default()),
    }
}

pub fn program(yaml: &str) -> Arc<Program> {
    Arc::new(load_workflow(yaml).expect("workflow should load"))
}

pub fn workflow_runner(yaml: &str, backends: Backends) -> WorkflowRunner {
    WorkflowRunner::new(program(yaml), backends, RunnerOptions::default())
        .expect("runner should build")
}
