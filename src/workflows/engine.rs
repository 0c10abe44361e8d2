//! Workflow Engine
//!
//! Runs every agent of a program concurrently, one tokio task per agent,
//! and collects a [`WorkflowReport`] once all of them have stopped.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info, info_span, Instrument};
use uuid::Uuid;

use super::program::Program;
use super::runner::{AgentRunner, Backends, RunnerOptions};
use crate::types::Result;

/// How an agent stopped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum AgentStatus {
    Terminated,
    Failed(String),
}

/// Outcome of one agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentReport {
    pub agent: String,
    pub status: AgentStatus,
    /// State the agent stopped in
    pub final_state: String,
    pub messages: usize,
    pub turns: usize,
}

/// Outcome of a whole workflow run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    /// One entry per agent, in declaration order
    pub agents: Vec<AgentReport>,
}

impl WorkflowReport {
    pub fn all_terminated(&self) -> bool {
        self.agents
            .iter()
            .all(|report| report.status == AgentStatus::Terminated)
    }

    pub fn failed(&self) -> impl Iterator<Item = &AgentReport> {
        self.agents
            .iter()
            .filter(|report| matches!(report.status, AgentStatus::Failed(_)))
    }
}

/// Owns the agent runners of one program.
pub struct WorkflowRunner {
    program: Arc<Program>,
    runners: Vec<AgentRunner>,
}

impl WorkflowRunner {
    /// Create one runner per agent, in declaration order.
    pub fn new(program: Arc<Program>, backends: Backends, options: RunnerOptions) -> Result<Self> {
        let runners = (0..program.agents().len())
            .map(|index| AgentRunner::new(Arc::clone(&program), index, &backends, &options))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { program, runners })
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    /// Runners in declaration order. After [`run`](Self::run) they hold the
    /// final transcripts.
    pub fn agent_runners(&self) -> &[AgentRunner] {
        &self.runners
    }

    /// Run all agents to completion.
    ///
    /// A failing agent is recorded in the report and does not stop the others.
    pub async fn run(&mut self) -> WorkflowReport {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let start = Instant::now();
        info!(%run_id, agents = self.runners.len(), "Workflow started");

        let names: Vec<String> = self.runners.iter().map(|r| r.name().to_string()).collect();

        let handles: Vec<_> = std::mem::take(&mut self.runners)
            .into_iter()
            .map(|mut runner| {
                let span = info_span!("agent", agent = %runner.name(), %run_id);
                tokio::spawn(
                    async move {
                        let result = runner.run().await;
                        (runner, result)
                    }
                    .instrument(span),
                )
            })
            .collect();

        let mut agents = Vec::with_capacity(handles.len());
        for (name, joined) in names.into_iter().zip(futures::future::join_all(handles).await) {
            match joined {
                Ok((runner, result)) => {
                    let status = match result {
                        Ok(()) => AgentStatus::Terminated,
                        Err(e) => AgentStatus::Failed(e.to_string()),
                    };
                    agents.push(AgentReport {
                        agent: name,
                        status,
                        final_state: runner.current_state().to_string(),
                        messages: runner.session().len(),
                        turns: runner.turns(),
                    });
                    self.runners.push(runner);
                }
                Err(e) => {
                    error!(agent = %name, error = %e, "Agent task aborted");
                    agents.push(AgentReport {
                        agent: name,
                        status: AgentStatus::Failed(format!("task aborted: {}", e)),
                        final_state: String::new(),
                        messages: 0,
                        turns: 0,
                    });
                }
            }
        }

        let report = WorkflowReport {
            run_id,
            started_at,
            duration_ms: start.elapsed().as_millis() as u64,
            agents,
        };
        info!(
            %run_id,
            duration_ms = report.duration_ms,
            failed = report.failed().count(),
            "Workflow finished"
        );
        report
    }
}
