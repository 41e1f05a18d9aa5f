//! Hosted OpenAI embeddings adapter.

use super::{EmbeddingClient, EmbeddingClientError};
use crate::config::get_config;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

const DEFAULT_API_URL: &str = "https://api.openai.com/v1";

/// Embedding client backed by the OpenAI `POST /v1/embeddings` endpoint.
///
/// Requests are issued one text at a time; a per-text failure is logged and
/// recorded as an empty vector so the remainder of the batch still embeds.
pub struct OpenAiEmbeddingClient {
    pub(crate) client: Client,
    pub(crate) base_url: String,
    pub(crate) api_key: String,
    pub(crate) model: String,
}

#[derive(Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingObject>,
}

#[derive(Deserialize)]
struct EmbeddingObject {
    embedding: Vec<f32>,
}

impl OpenAiEmbeddingClient {
    /// Construct a client from the loaded configuration.
    pub fn new() -> Self {
        let config = get_config();
        Self {
            client: Client::new(),
            base_url: config
                .openai_api_url
                .clone()
                .unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            api_key: config
                .openai_api_key
                .clone()
                .expect("OPENAI_API_KEY must be set for the OpenAI embedding provider"),
            model: config.embedding_model.clone(),
        }
    }

    async fn embed_one(&self, text: &str) -> Result<Vec<f32>, EmbeddingClientError> {
        let url = format!("{}/embeddings", self.base_url.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&json!({ "model": self.model, "input": text }))
            .send()
            .await
            .map_err(|err| EmbeddingClientError::GenerationFailed(err.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(EmbeddingClientError::GenerationFailed(format!(
                "embeddings API returned {status}: {body}"
            )));
        }

        let payload: EmbeddingsResponse = response
            .json()
            .await
            .map_err(|err| EmbeddingClientError::GenerationFailed(err.to_string()))?;
        payload
            .data
            .into_iter()
            .next()
            .map(|object| object.embedding)
            .ok_or_else(|| {
                EmbeddingClientError::GenerationFailed(
                    "embeddings API returned no data".to_string(),
                )
            })
    }
}

impl Default for OpenAiEmbeddingClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EmbeddingClient for OpenAiEmbeddingClient {
    async fn generate_embeddings(
        &self,
        texts: Vec<String>,
    ) -> Result<Vec<Vec<f32>>, EmbeddingClientError> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for text in &texts {
            match self.embed_one(text).await {
                Ok(vector) => embeddings.push(vector),
                Err(error) => {
                    tracing::warn!(error = %error, "Embedding request failed; recording empty vector");
                    embeddings.push(Vec::new());
                }
            }
        }
        Ok(embeddings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method::POST, MockServer};

    fn test_client(base_url: String) -> OpenAiEmbeddingClient {
        OpenAiEmbeddingClient {
            client: Client::new(),
            base_url,
            api_key: "test-key".into(),
            model: "text-embedding-3-small".into(),
        }
    }

    #[tokio::test]
    async fn one_vector_per_text_in_order() {
        let server = MockServer::start_async().await;
        let alpha = server
            .mock_async(|when, then| {
                when.method(POST).path("/embeddings").body_contains("alpha");
                then.status(200)
                    .json_body(serde_json::json!({ "data": [{ "embedding": [0.1, 0.2] }] }));
            })
            .await;
        let beta = server
            .mock_async(|when, then| {
                when.method(POST).path("/embeddings").body_contains("beta");
                then.status(200)
                    .json_body(serde_json::json!({ "data": [{ "embedding": [0.3, 0.4] }] }));
            })
            .await;

        let client = test_client(server.base_url());
        let embeddings = client
            .generate_embeddings(vec!["alpha".into(), "beta".into()])
            .await
            .expect("batch embedding");

        alpha.assert_async().await;
        beta.assert_async().await;
        assert_eq!(embeddings, vec![vec![0.1, 0.2], vec![0.3, 0.4]]);
    }

    #[tokio::test]
    async fn failed_text_degrades_to_empty_vector() {
        let server = MockServer::start_async().await;
        let _ok = server
            .mock_async(|when, then| {
                when.method(POST).path("/embeddings").body_contains("keeps");
                then.status(200)
                    .json_body(serde_json::json!({ "data": [{ "embedding": [1.0, 0.0] }] }));
            })
            .await;
        let _failing = server
            .mock_async(|when, then| {
                when.method(POST).path("/embeddings").body_contains("breaks");
                then.status(500).body("backend exploded");
            })
            .await;

        let client = test_client(server.base_url());
        let embeddings = client
            .generate_embeddings(vec!["keeps".into(), "breaks".into()])
            .await
            .expect("batch survives per-text failure");

        assert_eq!(embeddings.len(), 2);
        assert_eq!(embeddings[0], vec![1.0, 0.0]);
        assert!(embeddings[1].is_empty());
    }
}
