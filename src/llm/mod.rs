//! LLM Provider Clients and Abstractions
//!
//! Completion and embedding backends behind common traits:
//! - [`LLMClient`] - produces the next assistant message for a transcript
//! - [`EmbeddingClient`] - turns text into vectors for the snippet index
//! - [`Provider`] - selects and builds a client from configuration
//!
//! # Supported Providers
//!
//! Enable providers via Cargo features:
//! - `openai` - OpenAI API and compatible endpoints
//! - `ollama` - Local Ollama server
//!
//! # Example
//!
//! ```ignore
//! use statechat::llm::{CompletionRequest, Provider};
//!
//! let provider = Provider::from_config(&config.llm)?;
//! let client = provider.create_client()?;
//! let reply = client
//!     .chat_completion(CompletionRequest::new(vec![Message::user("What is 2+2?")]))
//!     .await?;
//! println!("{}", reply.text);
//! ```

/// Core LLM client traits and provider selection.
pub mod client;

#[cfg(feature = "ollama")]
pub mod ollama;

#[cfg(feature = "openai")]
pub mod openai;

pub use client::{CompletionRequest, EmbeddingClient, LLMClient, Provider};
