//! Embedding client abstraction and provider adapters.
//!
//! Two backends are supported, selected by `EMBEDDING_PROVIDER`: the hosted
//! OpenAI embeddings API and a local Ollama runtime. Both share the batch
//! contract of [`EmbeddingClient`]: one vector per input text, in input
//! order. A failure for a single text degrades to an empty vector for that
//! text so the rest of the batch survives; callers must skip empty vectors
//! before storage or distance computations.

mod ollama;
mod openai;

pub use ollama::OllamaEmbeddingClient;
pub use openai::OpenAiEmbeddingClient;

use crate::config::{EmbeddingProvider, get_config};
use async_trait::async_trait;
use thiserror::Error;

/// Errors raised by embedding providers.
#[derive(Debug, Error)]
pub enum EmbeddingClientError {
    /// Provider was unable to produce embeddings for the supplied input.
    #[error("Failed to generate embeddings: {0}")]
    GenerationFailed(String),
}

/// Interface implemented by embedding backends.
#[async_trait]
pub trait EmbeddingClient {
    /// Produce an embedding vector for each supplied chunk of text.
    ///
    /// The returned sequence has the same length and order as the input.
    /// An empty vector marks a text whose embedding failed.
    async fn generate_embeddings(
        &self,
        texts: Vec<String>,
    ) -> Result<Vec<Vec<f32>>, EmbeddingClientError>;
}

/// Build an embedding client for the configured provider.
pub fn get_embedding_client() -> Box<dyn EmbeddingClient + Send + Sync> {
    let config = get_config();
    match config.embedding_provider {
        EmbeddingProvider::OpenAI => Box::new(OpenAiEmbeddingClient::new()),
        EmbeddingProvider::Ollama => Box::new(OllamaEmbeddingClient::new()),
    }
}
