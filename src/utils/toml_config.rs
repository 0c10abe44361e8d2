//! TOML-based configuration for statechat
//!
//! Backends, limits and logging are configured in `statechat.toml`. Every
//! field has a default, so a missing file or an empty one is a valid
//! configuration. Secrets are never stored in the file: the OpenAI provider
//! names the environment variable that holds its API key.
//!
//! ```toml
//! [logging]
//! level = "info"
//! json = false
//!
//! [llm]
//! type = "ollama"
//! base_url = "http://localhost:11434"
//! model = "llama3.2"
//! embedding_model = "nomic-embed-text"
//!
//! [retrieval]
//! index_path = "./data/index"
//! collection = "snippets"
//! top_k = 5
//!
//! [execution]
//! interpreter = "python3"
//! timeout_secs = 30
//!
//! [runner]
//! max_transitions = 1000
//! max_turns = 100
//!
//! [runner.pruning]
//! trigger = "token_budget"
//! max_tokens = 8000
//! tie_break = "oldest_first"
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::memory::{PruningPolicy, PruningTrigger};
use crate::tools::python::{DEFAULT_INTERPRETER, DEFAULT_MAX_OUTPUT_BYTES, DEFAULT_TIMEOUT_SECS};
use crate::workflows::runner::{RunnerOptions, DEFAULT_MAX_TRANSITIONS, DEFAULT_MAX_TURNS};

/// Root configuration structure loaded from statechat.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatechatConfig {
    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub retrieval: RetrievalConfig,

    #[serde(default)]
    pub execution: ExecutionConfig,

    #[serde(default)]
    pub runner: RunnerConfig,
}

// ============= Logging Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive; `RUST_LOG` takes precedence
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// ============= LLM Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum LlmConfig {
    Ollama {
        #[serde(default = "default_ollama_url")]
        base_url: String,
        #[serde(default = "default_ollama_model")]
        model: String,
        #[serde(default = "default_ollama_embedding_model")]
        embedding_model: String,
    },
    OpenAI {
        /// Environment variable containing API key
        #[serde(default = "default_openai_key_env")]
        api_key_env: String,
        #[serde(default = "default_openai_base")]
        api_base: String,
        #[serde(default = "default_openai_model")]
        model: String,
        #[serde(default = "default_openai_embedding_model")]
        embedding_model: String,
    },
}

fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_ollama_model() -> String {
    "llama3.2".to_string()
}

fn default_ollama_embedding_model() -> String {
    "nomic-embed-text".to_string()
}

fn default_openai_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_openai_base() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_openai_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_openai_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

impl Default for LlmConfig {
    fn default() -> Self {
        LlmConfig::Ollama {
            base_url: default_ollama_url(),
            model: default_ollama_model(),
            embedding_model: default_ollama_embedding_model(),
        }
    }
}

// ============= Retrieval Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Directory of the persistent snippet index; in memory when unset
    #[serde(default)]
    pub index_path: Option<PathBuf>,

    #[serde(default = "default_collection")]
    pub collection: String,

    /// Snippets requested per `{rtfm()}` call
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Chunk size in characters
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

fn default_collection() -> String {
    "snippets".to_string()
}

fn default_top_k() -> usize {
    5
}

fn default_chunk_size() -> usize {
    1000
}

fn default_chunk_overlap() -> usize {
    200
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            index_path: None,
            collection: default_collection(),
            top_k: default_top_k(),
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
        }
    }
}

// ============= Execution Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionConfig {
    #[serde(default = "default_interpreter")]
    pub interpreter: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Captured output beyond this many bytes is truncated
    #[serde(default = "default_max_output_bytes")]
    pub max_output_bytes: usize,
}

fn default_interpreter() -> String {
    DEFAULT_INTERPRETER.to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_max_output_bytes() -> usize {
    DEFAULT_MAX_OUTPUT_BYTES
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            interpreter: default_interpreter(),
            timeout_secs: default_timeout_secs(),
            max_output_bytes: default_max_output_bytes(),
        }
    }
}

// ============= Runner Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerConfig {
    #[serde(default = "default_max_transitions")]
    pub max_transitions: usize,

    #[serde(default = "default_max_turns")]
    pub max_turns: usize,

    #[serde(default)]
    pub pruning: PruningPolicy,
}

fn default_max_transitions() -> usize {
    DEFAULT_MAX_TRANSITIONS
}

fn default_max_turns() -> usize {
    DEFAULT_MAX_TURNS
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            max_transitions: default_max_transitions(),
            max_turns: default_max_turns(),
            pruning: PruningPolicy::default(),
        }
    }
}

// ============= Errors =============

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Environment variable '{0}' referenced in config is not set")]
    MissingEnvVar(String),
}

impl StatechatConfig {
    /// Load and validate configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        let config: StatechatConfig = toml::from_str(&content)?;

        config.validate()?;

        Ok(config)
    }

    /// Like [`load`](Self::load), but a missing file yields the defaults.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        match Self::load(&path) {
            Err(ConfigError::FileNotFound(missing)) => {
                info!(path = %missing.display(), "No configuration file, using defaults");
                let config = Self::default();
                config.validate()?;
                Ok(config)
            }
            other => other,
        }
    }

    /// Validate limits and env var availability
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let LlmConfig::OpenAI { api_key_env, .. } = &self.llm {
            self.validate_env_var(api_key_env)?;
        }

        let nonzero = [
            ("retrieval.top_k", self.retrieval.top_k),
            ("retrieval.chunk_size", self.retrieval.chunk_size),
            ("execution.timeout_secs", self.execution.timeout_secs as usize),
            ("execution.max_output_bytes", self.execution.max_output_bytes),
            ("runner.max_transitions", self.runner.max_transitions),
            ("runner.max_turns", self.runner.max_turns),
        ];
        for (field, value) in nonzero {
            if value == 0 {
                return Err(ConfigError::ValidationError(format!(
                    "{} must be greater than zero",
                    field
                )));
            }
        }

        if self.retrieval.chunk_overlap >= self.retrieval.chunk_size {
            return Err(ConfigError::ValidationError(format!(
                "retrieval.chunk_overlap ({}) must be smaller than retrieval.chunk_size ({})",
                self.retrieval.chunk_overlap, self.retrieval.chunk_size
            )));
        }

        if self.runner.pruning.trigger == PruningTrigger::TokenBudget
            && self.runner.pruning.max_tokens == 0
        {
            return Err(ConfigError::ValidationError(
                "runner.pruning.max_tokens must be greater than zero".to_string(),
            ));
        }

        if self.execution.interpreter.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "execution.interpreter must not be empty".to_string(),
            ));
        }

        Ok(())
    }

    fn validate_env_var(&self, name: &str) -> Result<(), ConfigError> {
        std::env::var(name).map_err(|_| ConfigError::MissingEnvVar(name.to_string()))?;
        Ok(())
    }

    /// Runner limits and pruning policy for every agent
    pub fn runner_options(&self) -> RunnerOptions {
        RunnerOptions {
            max_transitions: self.runner.max_transitions,
            max_turns: self.runner.max_turns,
            top_k: self.retrieval.top_k,
            pruning: self.runner.pruning.clone(),
        }
    }
}
