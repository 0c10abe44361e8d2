use async_trait::async_trait;
use ollama_rs::{
    generation::chat::{request::ChatMessageRequest, ChatMessage},
    generation::embeddings::request::{EmbeddingsInput, GenerateEmbeddingsRequest},
    Ollama,
};
use reqwest::Url;

use crate::llm::client::{CompletionRequest, EmbeddingClient, LLMClient};
use crate::types::{AppError, Message, MessageRole, Result};

const DEFAULT_OLLAMA_PORT: u16 = 11434;

pub struct OllamaClient {
    client: Ollama,
    model: String,
    embedding_model: String,
}

impl OllamaClient {
    pub fn new(base_url: &str, model: String, embedding_model: String) -> Result<Self> {
        let (host, port) = split_base_url(base_url)?;
        let client = Ollama::new(host, port);

        Ok(Self {
            client,
            model,
            embedding_model,
        })
    }
}

/// Split `http://host:port` into the `(scheme://host, port)` pair Ollama expects.
fn split_base_url(base_url: &str) -> Result<(String, u16)> {
    let url = Url::parse(base_url).map_err(|e| {
        AppError::Configuration(format!("Invalid Ollama base URL '{}': {}", base_url, e))
    })?;
    let host = url.host_str().ok_or_else(|| {
        AppError::Configuration(format!("Ollama base URL '{}' has no host", base_url))
    })?;
    let port = url.port().unwrap_or(DEFAULT_OLLAMA_PORT);

    Ok((format!("{}://{}", url.scheme(), host), port))
}

fn to_chat_message(message: &Message) -> ChatMessage {
    match message.role {
        MessageRole::System => ChatMessage::system(message.text.clone()),
        MessageRole::User => ChatMessage::user(message.text.clone()),
        MessageRole::Assistant => ChatMessage::assistant(message.text.clone()),
    }
}

#[async_trait]
impl LLMClient for OllamaClient {
    async fn chat_completion(&self, request: CompletionRequest) -> Result<Message> {
        let model = request.model.unwrap_or_else(|| self.model.clone());
        let messages: Vec<ChatMessage> = request.messages.iter().map(to_chat_message).collect();

        let response = self
            .client
            .send_chat_messages(ChatMessageRequest::new(model, messages))
            .await
            .map_err(|e| AppError::LLM(format!("Ollama error: {}", e)))?;

        Ok(Message::assistant(response.message.content))
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl EmbeddingClient for OllamaClient {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let request = GenerateEmbeddingsRequest::new(
            self.embedding_model.clone(),
            EmbeddingsInput::Multiple(texts.to_vec()),
        );

        let response = self
            .client
            .generate_embeddings(request)
            .await
            .map_err(|e| AppError::LLM(format!("Ollama embedding error: {}", e)))?;

        if response.embeddings.len() != texts.len() {
            return Err(AppError::LLM(format!(
                "Ollama returned {} embeddings for {} inputs",
                response.embeddings.len(),
                texts.len()
            )));
        }

        Ok(response.embeddings)
    }

    fn embedding_model(&self) -> &str {
        &self.embedding_model
    }
}
