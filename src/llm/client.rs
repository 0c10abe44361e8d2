//! LLM client abstractions and provider selection
//!
//! - **OpenAI**: any OpenAI-compatible `/chat/completions` and `/embeddings` endpoint
//! - **Ollama**: local inference through an Ollama server

use std::sync::Arc;

use async_trait::async_trait;

use crate::types::{AppError, Message, Result};
use crate::utils::toml_config::LlmConfig;

/// A chat completion request: the pruned context plus an optional model override.
#[derive(Debug, Clone, Default)]
pub struct CompletionRequest {
    pub messages: Vec<Message>,
    /// Model to use instead of the client's default
    pub model: Option<String>,
}

impl CompletionRequest {
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            model: None,
        }
    }

    pub fn with_model(mut self, model: Option<String>) -> Self {
        self.model = model;
        self
    }
}

/// Generic LLM client trait for provider abstraction
///
/// The returned message carries the model's text; the runner normalises its
/// role to `assistant`. Importance and `ttl` are left to the implementation.
#[async_trait]
pub trait LLMClient: Send + Sync {
    /// Generate the next assistant message for a conversation
    async fn chat_completion(&self, request: CompletionRequest) -> Result<Message>;

    /// Get the model name/identifier
    fn model_name(&self) -> &str;
}

/// Text embedding backend used by the snippet index
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    /// Embed each text; the result has one vector per input, in order
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    fn embedding_model(&self) -> &str;
}

/// Provider enum for runtime selection
#[derive(Debug, Clone)]
pub enum Provider {
    /// OpenAI API or a compatible endpoint
    ///
    /// # Example
    /// ```rust,ignore
    /// let provider = Provider::OpenAI {
    ///     api_key: "sk-...".to_string(),
    ///     api_base: "https://api.openai.com/v1".to_string(),
    ///     model: "gpt-4o-mini".to_string(),
    ///     embedding_model: "text-embedding-3-small".to_string(),
    /// };
    /// ```
    OpenAI {
        api_key: String,
        api_base: String,
        model: String,
        embedding_model: String,
    },

    /// Ollama local LLM provider
    ///
    /// # Example
    /// ```rust,ignore
    /// let provider = Provider::Ollama {
    ///     base_url: "http://localhost:11434".to_string(),
    ///     model: "llama3.2".to_string(),
    ///     embedding_model: "nomic-embed-text".to_string(),
    /// };
    /// ```
    Ollama {
        base_url: String,
        model: String,
        embedding_model: String,
    },
}

impl Provider {
    /// Build a provider from the `[llm]` configuration section.
    ///
    /// The OpenAI API key is read from the environment variable the
    /// configuration names.
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        match config {
            LlmConfig::OpenAI {
                api_key_env,
                api_base,
                model,
                embedding_model,
            } => {
                let api_key = std::env::var(api_key_env).map_err(|_| {
                    AppError::Configuration(format!(
                        "Environment variable '{}' is not set",
                        api_key_env
                    ))
                })?;
                Ok(Provider::OpenAI {
                    api_key,
                    api_base: api_base.clone(),
                    model: model.clone(),
                    embedding_model: embedding_model.clone(),
                })
            }
            LlmConfig::Ollama {
                base_url,
                model,
                embedding_model,
            } => Ok(Provider::Ollama {
                base_url: base_url.clone(),
                model: model.clone(),
                embedding_model: embedding_model.clone(),
            }),
        }
    }

    /// Create a completion client for this provider
    ///
    /// # Errors
    ///
    /// Returns an error if the provider was compiled out or its endpoint is invalid.
    pub fn create_client(&self) -> Result<Arc<dyn LLMClient>> {
        match self {
            #[cfg(feature = "openai")]
            Provider::OpenAI {
                api_key,
                api_base,
                model,
                embedding_model,
            } => Ok(Arc::new(super::openai::OpenAIClient::new(
                api_key.clone(),
                api_base.clone(),
                model.clone(),
                embedding_model.clone(),
            ))),

            #[cfg(feature = "ollama")]
            Provider::Ollama {
                base_url,
                model,
                embedding_model,
            } => Ok(Arc::new(super::ollama::OllamaClient::new(
                base_url,
                model.clone(),
                embedding_model.clone(),
            )?)),

            #[allow(unreachable_patterns)]
            other => Err(not_compiled(other)),
        }
    }

    /// Create an embedding client for this provider
    pub fn create_embedder(&self) -> Result<Arc<dyn EmbeddingClient>> {
        match self {
            #[cfg(feature = "openai")]
            Provider::OpenAI {
                api_key,
                api_base,
                model,
                embedding_model,
            } => Ok(Arc::new(super::openai::OpenAIClient::new(
                api_key.clone(),
                api_base.clone(),
                model.clone(),
                embedding_model.clone(),
            ))),

            #[cfg(feature = "ollama")]
            Provider::Ollama {
                base_url,
                model,
                embedding_model,
            } => Ok(Arc::new(super::ollama::OllamaClient::new(
                base_url,
                model.clone(),
                embedding_model.clone(),
            )?)),

            #[allow(unreachable_patterns)]
            other => Err(not_compiled(other)),
        }
    }

    /// Get a human-readable name for this provider
    pub fn name(&self) -> &'static str {
        match self {
            Provider::OpenAI { .. } => "OpenAI",
            Provider::Ollama { .. } => "Ollama",
        }
    }

    pub fn model(&self) -> &str {
        match self {
            Provider::OpenAI { model, .. } | Provider::Ollama { model, .. } => model,
        }
    }
}

#[allow(dead_code)]
fn not_compiled(provider: &Provider) -> AppError {
    AppError::Configuration(format!(
        "Provider '{}' is not enabled in this build; rebuild with the '{}' feature",
        provider.name(),
        provider.name().to_lowercase()
    ))
}
