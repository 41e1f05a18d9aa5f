//! Chat completion client and grounding prompt assembly.
//!
//! The client targets the Gemini `generateContent` REST surface with a
//! bounded request timeout. Callers on the ask/chat paths degrade a failed
//! model call to [`FALLBACK_REPLY`] instead of surfacing an error.

pub mod prompt;

use crate::config::get_config;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use thiserror::Error;

/// Reply used when the chat model cannot be reached or errors out.
pub const FALLBACK_REPLY: &str = "Sorry, the AI service is unavailable right now.";

const DEFAULT_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Errors returned while talking to the chat completion API.
#[derive(Debug, Error)]
pub enum ChatError {
    /// HTTP layer failed before receiving a response.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// The API reported a structured error.
    #[error("Chat API error: {0}")]
    Api(String),
    /// The API responded with an unexpected status code.
    #[error("Unexpected chat API response ({status}): {body}")]
    UnexpectedStatus {
        /// HTTP status returned from the API.
        status: StatusCode,
        /// Body payload associated with the failing response.
        body: String,
    },
    /// The response parsed but carried no usable candidate text.
    #[error("Malformed chat API response: {0}")]
    MalformedResponse(String),
}

/// HTTP client for the chat completion model.
pub struct ChatClient {
    pub(crate) client: Client,
    pub(crate) base_url: String,
    pub(crate) api_key: String,
    pub(crate) model: String,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize, Default)]
struct Candidate {
    #[serde(default)]
    content: CandidateContent,
}

#[derive(Deserialize, Default)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ContentPart>,
}

#[derive(Deserialize, Default)]
struct ContentPart {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ApiError,
}

#[derive(Deserialize)]
struct ApiError {
    message: String,
}

impl ChatClient {
    /// Construct a client using configuration derived from the environment.
    ///
    /// Outbound calls are bounded by `CHAT_TIMEOUT_SECS`; a call exceeding
    /// it is abandoned and treated as a failure.
    pub fn new() -> Result<Self, ChatError> {
        let config = get_config();
        let client = Client::builder()
            .user_agent("studymentor/0.1")
            .timeout(Duration::from_secs(config.chat_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config
                .gemini_api_url
                .clone()
                .unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            api_key: config.gemini_api_key.clone(),
            model: config.chat_model.clone(),
        })
    }

    /// Send one message to the model and return the candidate text.
    pub async fn generate(&self, message: &str) -> Result<String, ChatError> {
        let url = format!(
            "{}/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        );
        let response = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&json!({
                "contents": [
                    { "parts": [{ "text": message }] }
                ]
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            if let Ok(parsed) = serde_json::from_str::<ErrorResponse>(&body) {
                return Err(ChatError::Api(parsed.error.message));
            }
            return Err(ChatError::UnexpectedStatus { status, body });
        }

        let payload: GenerateContentResponse = response.json().await?;
        let text = payload
            .candidates
            .into_iter()
            .next()
            .map(|candidate| {
                candidate
                    .content
                    .parts
                    .into_iter()
                    .map(|part| part.text)
                    .collect::<String>()
            })
            .filter(|text| !text.is_empty());

        text.ok_or_else(|| {
            ChatError::MalformedResponse("response contained no candidate text".to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method::POST, MockServer};

    fn test_client(base_url: String) -> ChatClient {
        ChatClient {
            client: Client::new(),
            base_url,
            api_key: "test-key".into(),
            model: "gemini-2.0-flash".into(),
        }
    }

    #[tokio::test]
    async fn candidate_text_is_extracted() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/models/gemini-2.0-flash:generateContent")
                    .query_param("key", "test-key")
                    .body_contains("what is osmosis?");
                then.status(200).json_body(serde_json::json!({
                    "candidates": [
                        {
                            "content": {
                                "parts": [
                                    { "text": "Water crossing " },
                                    { "text": "a membrane." }
                                ]
                            }
                        }
                    ]
                }));
            })
            .await;

        let client = test_client(server.base_url());
        let reply = client
            .generate("what is osmosis?")
            .await
            .expect("model reply");

        mock.assert_async().await;
        assert_eq!(reply, "Water crossing a membrane.");
    }

    #[tokio::test]
    async fn structured_api_errors_are_surfaced() {
        let server = MockServer::start_async().await;
        let _mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/models/gemini-2.0-flash:generateContent");
                then.status(400).json_body(serde_json::json!({
                    "error": { "code": 400, "message": "API key not valid" }
                }));
            })
            .await;

        let client = test_client(server.base_url());
        let error = client.generate("hello").await.unwrap_err();
        assert!(matches!(error, ChatError::Api(message) if message == "API key not valid"));
    }

    #[tokio::test]
    async fn empty_candidates_are_malformed() {
        let server = MockServer::start_async().await;
        let _mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/models/gemini-2.0-flash:generateContent");
                then.status(200)
                    .json_body(serde_json::json!({ "candidates": [] }));
            })
            .await;

        let client = test_client(server.base_url());
        let error = client.generate("hello").await.unwrap_err();
        assert!(matches!(error, ChatError::MalformedResponse(_)));
    }
}
