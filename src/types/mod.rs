use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::workflows::loader::ParseError;

// ============= Message Types =============

/// Who authored a transcript message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

impl MessageRole {
    /// Wire name used by chat completion APIs.
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::System => "system",
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Retention priority of a message. Ordered from least to most important.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Importance {
    Low,
    #[default]
    Medium,
    High,
}

/// One entry of a chat transcript.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub text: String,
    pub importance: Importance,
    /// Further completion turns this message stays in context; `None` never expires.
    pub ttl: Option<u32>,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn new(role: MessageRole, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
            importance: Importance::default(),
            ttl: None,
            timestamp: Utc::now(),
        }
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::new(MessageRole::System, text).with_importance(Importance::High)
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(MessageRole::User, text)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, text)
    }

    pub fn with_importance(mut self, importance: Importance) -> Self {
        self.importance = importance;
        self
    }

    pub fn with_ttl(mut self, ttl: Option<u32>) -> Self {
        self.ttl = ttl;
        self
    }
}

// ============= Retrieval Types =============

/// A document fragment returned by the snippet database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snippet {
    /// Identifier of the source document (usually a file name).
    pub source: String,
    /// Byte offset of `text` within the source document.
    pub start_offset: usize,
    pub page_start: u32,
    pub page_end: u32,
    pub text: String,
}

impl Snippet {
    pub fn new(text: impl Into<String>, source: impl Into<String>, start_offset: usize) -> Self {
        Self {
            source: source.into(),
            start_offset,
            page_start: 1,
            page_end: 1,
            text: text.into(),
        }
    }

    pub fn with_pages(mut self, page_start: u32, page_end: u32) -> Self {
        self.page_start = page_start;
        self.page_end = page_end;
        self
    }

    /// Byte offset one past the end of this snippet in its source.
    pub fn end_offset(&self) -> usize {
        self.start_offset + self.text.len()
    }
}

// ============= Error Types =============

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("LLM error: {0}")]
    LLM(String),

    #[error("Retrieval error: {0}")]
    Retrieval(String),

    #[error("Execution error: {0}")]
    Execution(String),

    #[error("Workflow error: {0}")]
    Workflow(String),

    #[error("Workflow parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, AppError>;
