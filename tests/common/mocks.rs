//! Mock implementations for testing.
//!
//! Scripted stand-ins for the completion, retrieval and execution backends,
//! shared across the integration test files.

use std::collections::VecDeque;

use async_trait::async_trait;
use parking_lot::Mutex;

use statechat::llm::{CompletionRequest, LLMClient};
use statechat::rag::SnippetDatabase;
use statechat::tools::{ScriptExecutor, ScriptOutcome};
use statechat::types::{AppError, Importance, Message, Result, Snippet};

/// Mock LLM client with scripted replies.
///
/// Replies are handed out in order; the last one repeats once the script is
/// exhausted. Every request is recorded for later inspection.
///
/// # Examples
///
/// ```ignore
/// // Always answers the same
/// let client = MockLLMClient::new("Hello, world!");
///
/// // Answers "yes" once, then "no" forever
/// let client = MockLLMClient::scripted(&["yes", "no"]);
///
/// // Always fails
/// let client = MockLLMClient::failing();
/// ```
pub struct MockLLMClient {
    replies: Mutex<VecDeque<String>>,
    ttl: Option<u32>,
    should_fail: bool,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl MockLLMClient {
    /// Create a new mock client that always returns the given reply.
    pub fn new(reply: &str) -> Self {
        Self::scripted(&[reply])
    }

    /// Create a mock client that returns `replies` in order.
    pub fn scripted(replies: &[&str]) -> Self {
        Self {
            replies: Mutex::new(replies.iter().map(|r| r.to_string()).collect()),
            ttl: None,
            should_fail: false,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Create a mock client that always returns an error.
    pub fn failing() -> Self {
        Self {
            should_fail: true,
            ..Self::scripted(&[])
        }
    }

    /// Replies carry this `ttl`.
    pub fn with_ttl(mut self, ttl: Option<u32>) -> Self {
        self.ttl = ttl;
        self
    }

    /// Number of completion requests received.
    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }

    /// All completion requests received, in order.
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().clone()
    }

    fn next_reply(&self) -> String {
        let mut replies = self.replies.lock();
        if replies.len() > 1 {
            replies.pop_front().unwrap_or_default()
        } else {
            replies.front().cloned().unwrap_or_default()
        }
    }
}

#[async_trait]
impl LLMClient for MockLLMClient {
    async fn chat_completion(&self, request: CompletionRequest) -> Result<Message> {
        self.requests.lock().push(request);
        if self.should_fail {
            return Err(AppError::LLM("Mock LLM failure".to_string()));
        }

        Ok(Message::assistant(self.next_reply())
            .with_importance(Importance::Low)
            .with_ttl(self.ttl))
    }

    fn model_name(&self) -> &str {
        "mock-model"
    }
}

/// Mock snippet database returning a fixed result for every query.
pub struct MockSnippetDatabase {
    snippets: Vec<Snippet>,
    should_fail: bool,
    queries: Mutex<Vec<(String, usize)>>,
}

impl MockSnippetDatabase {
    pub fn new(snippets: Vec<Snippet>) -> Self {
        Self {
            snippets,
            should_fail: false,
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    pub fn failing() -> Self {
        Self {
            should_fail: true,
            ..Self::empty()
        }
    }

    /// Queries received with their limits, in order.
    pub fn queries(&self) -> Vec<(String, usize)> {
        self.queries.lock().clone()
    }
}

#[async_trait]
impl SnippetDatabase for MockSnippetDatabase {
    async fn find_nearest_merged(&self, query: &str, limit: usize) -> Result<Vec<Snippet>> {
        self.queries.lock().push((query.to_string(), limit));
        if self.should_fail {
            return Err(AppError::Retrieval("Mock index unavailable".to_string()));
        }
        Ok(self.snippets.iter().take(limit).cloned().collect())
    }
}

/// Mock script executor returning a fixed outcome.
pub struct MockExecutor {
    outcome: Option<ScriptOutcome>,
    sources: Mutex<Vec<String>>,
}

impl Default for MockExecutor {
    fn default() -> Self {
        Self::new(ScriptOutcome::Completed {
            stdout: String::new(),
        })
    }
}

impl MockExecutor {
    pub fn new(outcome: ScriptOutcome) -> Self {
        Self {
            outcome: Some(outcome),
            sources: Mutex::new(Vec::new()),
        }
    }

    /// Executor whose interpreter cannot be started.
    pub fn failing() -> Self {
        Self {
            outcome: None,
            sources: Mutex::new(Vec::new()),
        }
    }

    /// Sources received, in order.
    pub fn sources(&self) -> Vec<String> {
        self.sources.lock().clone()
    }
}

#[async_trait]
impl ScriptExecutor for MockExecutor {
    async fn execute(&self, source: &str) -> Result<ScriptOutcome> {
        self.sources.lock().push(source.to_string());
        self.outcome
            .clone()
            .ok_or_else(|| AppError::Execution("Mock interpreter missing".to_string()))
    }
}
