//! services/api/src/adapters/embeddings.rs
//!
//! This module contains the adapter for the embedding model that backs the
//! pricing knowledge base. It implements the `EmbeddingService` port.

use async_openai::{config::OpenAIConfig, error::OpenAIError, types::embeddings::CreateEmbeddingRequestArgs, Client};
use async_trait::async_trait;
use detailing_core::ports::{EmbeddingService, PortError, PortResult};

/// An adapter that implements `EmbeddingService` using an OpenAI-compatible endpoint.
#[derive(Clone)]
pub struct OpenAiEmbeddingAdapter {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiEmbeddingAdapter {
    /// Creates a new `OpenAiEmbeddingAdapter`.
    pub fn new(client: Client<OpenAIConfig>, model: String) -> Self {
        Self { client, model }
    }
}

#[async_trait]
impl EmbeddingService for OpenAiEmbeddingAdapter {
    async fn embed(&self, text: &str) -> PortResult<Vec<f32>> {
        let request = CreateEmbeddingRequestArgs::default()
            .model(&self.model)
            .input(text)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let response = self
            .client
            .embeddings()
            .create(request)
            .await
            .map_err(|e: OpenAIError| PortError::Unexpected(e.to_string()))?;

        response
            .data
            .into_iter()
            .next()
            .map(|item| item.embedding)
            .ok_or_else(|| {
                PortError::Unexpected("Embedding response contained no vectors.".to_string())
            })
    }
}
