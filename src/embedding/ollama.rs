//! Local Ollama embeddings adapter.

use super::{EmbeddingClient, EmbeddingClientError};
use crate::config::get_config;
use async_trait::async_trait;
use ollama_rs::Ollama;
use ollama_rs::generation::embeddings::request::{EmbeddingsInput, GenerateEmbeddingsRequest};

/// Embedding client backed by a local Ollama runtime.
///
/// Mirrors the hosted adapter's degradation contract: a text whose embedding
/// call fails is recorded as an empty vector instead of failing the batch.
pub struct OllamaEmbeddingClient {
    ollama: Ollama,
    model: String,
}

impl OllamaEmbeddingClient {
    /// Construct a client from the loaded configuration.
    ///
    /// Falls back to the Ollama default endpoint (`http://127.0.0.1:11434`)
    /// when `OLLAMA_URL` is not set.
    pub fn new() -> Self {
        let config = get_config();
        let ollama = match &config.ollama_url {
            Some(url) => Ollama::try_new(url.clone()).expect("Invalid OLLAMA_URL"),
            None => Ollama::default(),
        };
        Self {
            ollama,
            model: config.embedding_model.clone(),
        }
    }
}

impl Default for OllamaEmbeddingClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EmbeddingClient for OllamaEmbeddingClient {
    async fn generate_embeddings(
        &self,
        texts: Vec<String>,
    ) -> Result<Vec<Vec<f32>>, EmbeddingClientError> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for text in texts {
            let request = GenerateEmbeddingsRequest::new(
                self.model.clone(),
                EmbeddingsInput::Single(text),
            );
            match self.ollama.generate_embeddings(request).await {
                Ok(mut response) => match response.embeddings.pop() {
                    Some(vector) => embeddings.push(vector),
                    None => {
                        tracing::warn!(
                            model = %self.model,
                            "Ollama returned no embedding; recording empty vector"
                        );
                        embeddings.push(Vec::new());
                    }
                },
                Err(error) => {
                    tracing::warn!(
                        model = %self.model,
                        error = %error,
                        "Ollama embedding request failed; recording empty vector"
                    );
                    embeddings.push(Vec::new());
                }
            }
        }
        Ok(embeddings)
    }
}
