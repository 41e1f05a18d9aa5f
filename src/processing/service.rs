//! Request orchestration: extraction, chunking, embedding, storage, and answers.

use crate::{
    chat::{
        ChatClient, FALLBACK_REPLY,
        prompt::{NO_NOTES_ANSWER, build_grounding_prompt},
    },
    config::get_config,
    embedding::{EmbeddingClient, get_embedding_client},
    extract,
    metadata::{ChatMessageRecord, ChatRole, FileRecord, MetadataError, MetadataService},
    metrics::{IngestionMetrics, MetricsSnapshot},
    processing::{
        chunking::split_text,
        types::{AskError, AskOutcome, IngestOutcome, IngestRequest, ProcessingError},
    },
    qdrant::{ChunkPoint, QdrantService},
};
use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

/// Number of chunks retrieved per grounded question.
const RETRIEVAL_LIMIT: usize = 4;

/// Coordinates the full pipeline: extraction, chunking, embedding, vector and
/// metadata writes, and grounded answering.
///
/// The service owns long-lived handles to the embedding client, the vector
/// and metadata stores, and the chat model so every HTTP handler reuses the
/// same components. Construct it once near process start and share it
/// through an `Arc`.
pub struct RagService {
    embedding_client: Box<dyn EmbeddingClient + Send + Sync>,
    qdrant: QdrantService,
    metadata: MetadataService,
    chat_client: ChatClient,
    downloader: reqwest::Client,
    metrics: Arc<IngestionMetrics>,
}

/// Abstraction over the backend operations used by the HTTP surface.
#[async_trait]
pub trait BackendApi: Send + Sync {
    /// Extract, chunk, embed, and store a document handed over as bytes.
    async fn ingest_document(
        &self,
        request: IngestRequest,
    ) -> Result<IngestOutcome, ProcessingError>;

    /// Download a remote file and run it through the ingestion pipeline.
    async fn process_remote_file(
        &self,
        url: &str,
        filename: &str,
        user_id: &str,
    ) -> Result<IngestOutcome, ProcessingError>;

    /// Answer a question, grounded on a file's chunks when one is given.
    async fn ask(&self, question: &str, file_id: Option<&str>) -> Result<AskOutcome, AskError>;

    /// Run one general chat turn and persist both sides of it.
    async fn chat(&self, user_id: &str, message: &str) -> Result<String, MetadataError>;

    /// List a user's chat log ordered by timestamp.
    async fn list_chats(&self, user_id: &str) -> Result<Vec<ChatMessageRecord>, MetadataError>;

    /// List the file records owned by a user.
    async fn list_files(&self, user_id: &str) -> Result<Vec<FileRecord>, MetadataError>;

    /// Retrieve the current metrics snapshot for diagnostics.
    fn metrics_snapshot(&self) -> MetricsSnapshot;
}

impl RagService {
    /// Build a new service, initializing backing stores as needed.
    ///
    /// Unreachable or misconfigured collaborators abort startup here rather
    /// than failing on the first request.
    pub async fn new() -> Self {
        let config = get_config();
        tracing::info!("Initializing embedding client");
        let embedding_client = get_embedding_client();
        let qdrant = QdrantService::new().expect("Failed to initialize Qdrant client");
        let vector_size = config.embedding_dimension as u64;
        qdrant
            .create_collection_if_not_exists(&config.qdrant_collection_name, vector_size)
            .await
            .expect("Failed to ensure Qdrant collection exists");
        qdrant
            .ensure_payload_indexes(&config.qdrant_collection_name)
            .await
            .expect("Failed to ensure Qdrant payload indexes");
        tracing::debug!(collection = %config.qdrant_collection_name, "Vector collection ready");

        let metadata = MetadataService::new().expect("Failed to initialize metadata store client");
        metadata
            .ensure_database()
            .await
            .expect("Failed to ensure metadata database exists");
        metadata
            .ensure_indexes()
            .await
            .expect("Failed to ensure metadata indexes");
        tracing::debug!("Metadata database ready");

        let chat_client = ChatClient::new().expect("Failed to initialize chat client");
        let downloader = reqwest::Client::builder()
            .user_agent("studymentor/0.1")
            .build()
            .expect("Failed to build download client");

        Self {
            embedding_client,
            qdrant,
            metadata,
            chat_client,
            downloader,
            metrics: Arc::new(IngestionMetrics::new()),
        }
    }

    /// Extract, chunk, embed, and store a document.
    ///
    /// Chunks whose embedding failed (empty or wrong-sized vectors) are
    /// skipped at storage time; the rest of the document still indexes.
    pub async fn ingest_document(
        &self,
        request: IngestRequest,
    ) -> Result<IngestOutcome, ProcessingError> {
        let config = get_config();
        let IngestRequest {
            bytes,
            filename,
            user_id,
            source_url,
            file_id,
        } = request;
        let file_id = file_id.unwrap_or_else(|| Uuid::new_v4().to_string());
        tracing::info!(file_id = %file_id, filename = %filename, "Processing document");

        let text = extract::extract_text(&bytes, &filename)?;
        let chunks = split_text(&text, config.chunk_size, config.chunk_overlap)?;
        let chunk_count = chunks.len();
        let embeddings = if chunks.is_empty() {
            Vec::new()
        } else {
            self.embedding_client
                .generate_embeddings(chunks.clone())
                .await?
        };

        debug_assert_eq!(chunk_count, embeddings.len());

        let mut points = Vec::with_capacity(chunk_count);
        let mut skipped_embeddings = 0;
        for (ordinal, (text, vector)) in chunks.into_iter().zip(embeddings).enumerate() {
            if vector.is_empty() {
                tracing::warn!(file_id = %file_id, ordinal, "Embedding failed for chunk; skipping storage");
                skipped_embeddings += 1;
                continue;
            }
            if vector.len() != config.embedding_dimension {
                tracing::warn!(
                    file_id = %file_id,
                    ordinal,
                    expected = config.embedding_dimension,
                    actual = vector.len(),
                    "Embedding dimension mismatch; skipping storage"
                );
                skipped_embeddings += 1;
                continue;
            }
            points.push(ChunkPoint {
                ordinal,
                text,
                vector,
            });
        }

        self.qdrant
            .upsert_chunks(&config.qdrant_collection_name, &file_id, points)
            .await?;

        let record = FileRecord {
            file_id: file_id.clone(),
            user_id,
            filename,
            source_url,
            chunk_count,
            created_at: crate::metadata::types::current_timestamp_rfc3339(),
        };
        self.metadata.put_file_record(&record).await?;

        self.metrics.record_document(chunk_count as u64);
        tracing::info!(
            file_id = %file_id,
            chunks = chunk_count,
            skipped_embeddings,
            "Document indexed"
        );

        Ok(IngestOutcome {
            file_id,
            chunk_count,
            skipped_embeddings,
        })
    }

    /// Download a remote file and run it through the ingestion pipeline.
    pub async fn process_remote_file(
        &self,
        url: &str,
        filename: &str,
        user_id: &str,
    ) -> Result<IngestOutcome, ProcessingError> {
        tracing::info!(url, filename, "Downloading source file");
        let response = self
            .downloader
            .get(url)
            .send()
            .await
            .map_err(|err| ProcessingError::Download(err.to_string()))?;
        if !response.status().is_success() {
            return Err(ProcessingError::Download(format!(
                "download returned {}",
                response.status()
            )));
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|err| ProcessingError::Download(err.to_string()))?;

        self.ingest_document(IngestRequest {
            bytes: bytes.to_vec(),
            filename: filename.to_string(),
            user_id: Some(user_id.to_string()),
            source_url: Some(url.to_string()),
            file_id: None,
        })
        .await
    }

    /// Answer a question, grounding it on a file's chunks when one is given.
    ///
    /// Without a `file_id` the vector store is never touched and the raw
    /// question goes straight to the model. With one, an empty retrieval
    /// short-circuits to the fixed no-notes answer without a model call.
    pub async fn ask(
        &self,
        question: &str,
        file_id: Option<&str>,
    ) -> Result<AskOutcome, AskError> {
        let Some(file_id) = file_id else {
            tracing::debug!("General chat mode; skipping retrieval");
            let answer = self.answer_with_model(question).await;
            self.metrics.record_question();
            return Ok(AskOutcome {
                answer,
                sources: Vec::new(),
            });
        };

        let config = get_config();
        let mut vectors = self
            .embedding_client
            .generate_embeddings(vec![question.to_string()])
            .await?;
        let vector = vectors
            .pop()
            .filter(|vector| !vector.is_empty())
            .ok_or(AskError::EmptyQueryEmbedding)?;
        if vector.len() != config.embedding_dimension {
            return Err(AskError::DimensionMismatch {
                expected: config.embedding_dimension,
                actual: vector.len(),
            });
        }

        let hits = self
            .qdrant
            .query_chunks(
                &config.qdrant_collection_name,
                vector,
                file_id,
                RETRIEVAL_LIMIT,
            )
            .await?;
        let sources: Vec<String> = hits.into_iter().map(|hit| hit.text).collect();

        if sources.is_empty() {
            tracing::debug!(file_id, "No chunks retrieved; returning fixed answer");
            self.metrics.record_question();
            return Ok(AskOutcome {
                answer: NO_NOTES_ANSWER.to_string(),
                sources,
            });
        }

        let prompt = build_grounding_prompt(question, &sources);
        let answer = self.answer_with_model(&prompt).await;
        self.metrics.record_question();
        Ok(AskOutcome { answer, sources })
    }

    /// Run one general chat turn and persist both sides of it.
    pub async fn chat(&self, user_id: &str, message: &str) -> Result<String, MetadataError> {
        self.metadata
            .append_chat_message(user_id, ChatRole::User, message)
            .await?;
        let reply = self.answer_with_model(message).await;
        self.metadata
            .append_chat_message(user_id, ChatRole::Ai, &reply)
            .await?;
        Ok(reply)
    }

    /// List a user's chat log ordered by timestamp.
    pub async fn list_chats(
        &self,
        user_id: &str,
    ) -> Result<Vec<ChatMessageRecord>, MetadataError> {
        self.metadata.list_chat_messages(user_id).await
    }

    /// List the file records owned by a user.
    pub async fn list_files(&self, user_id: &str) -> Result<Vec<FileRecord>, MetadataError> {
        self.metadata.list_files(user_id).await
    }

    /// Return the current activity metrics snapshot.
    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    async fn answer_with_model(&self, prompt: &str) -> String {
        match self.chat_client.generate(prompt).await {
            Ok(reply) => reply,
            Err(error) => {
                tracing::error!(error = %error, "Chat model call failed; returning fallback reply");
                FALLBACK_REPLY.to_string()
            }
        }
    }
}

#[async_trait]
impl BackendApi for RagService {
    async fn ingest_document(
        &self,
        request: IngestRequest,
    ) -> Result<IngestOutcome, ProcessingError> {
        RagService::ingest_document(self, request).await
    }

    async fn process_remote_file(
        &self,
        url: &str,
        filename: &str,
        user_id: &str,
    ) -> Result<IngestOutcome, ProcessingError> {
        RagService::process_remote_file(self, url, filename, user_id).await
    }

    async fn ask(&self, question: &str, file_id: Option<&str>) -> Result<AskOutcome, AskError> {
        RagService::ask(self, question, file_id).await
    }

    async fn chat(&self, user_id: &str, message: &str) -> Result<String, MetadataError> {
        RagService::chat(self, user_id, message).await
    }

    async fn list_chats(&self, user_id: &str) -> Result<Vec<ChatMessageRecord>, MetadataError> {
        RagService::list_chats(self, user_id).await
    }

    async fn list_files(&self, user_id: &str) -> Result<Vec<FileRecord>, MetadataError> {
        RagService::list_files(self, user_id).await
    }

    fn metrics_snapshot(&self) -> MetricsSnapshot {
        RagService::metrics_snapshot(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CONFIG, Config, EmbeddingProvider};
    use crate::embedding::EmbeddingClientError;
    use crate::qdrant::payload::chunk_point_id;
    use httpmock::{Method::GET, Method::POST, Method::PUT, MockServer};
    use serde_json::json;
    use std::sync::Once;

    const CHAT_PATH: &str = "/models/gemini-2.0-flash:generateContent";

    fn ensure_test_config() {
        static INIT: Once = Once::new();
        INIT.call_once(|| {
            let _ = CONFIG.set(Config {
                qdrant_url: "http://127.0.0.1:6333".into(),
                qdrant_collection_name: "notes".into(),
                qdrant_api_key: None,
                embedding_provider: EmbeddingProvider::OpenAI,
                embedding_model: "test-model".into(),
                embedding_dimension: 3,
                openai_api_key: Some("test-key".into()),
                openai_api_url: None,
                ollama_url: None,
                gemini_api_key: "test-key".into(),
                chat_model: "gemini-2.0-flash".into(),
                gemini_api_url: None,
                chat_timeout_secs: 5,
                couchdb_url: "http://127.0.0.1:5984".into(),
                couchdb_database: "mentor".into(),
                couchdb_username: None,
                couchdb_password: None,
                chunk_size: 500,
                chunk_overlap: 100,
                server_port: None,
            });
        });
    }

    struct StubEmbeddingClient {
        dimension: usize,
        failing: Vec<String>,
    }

    #[async_trait]
    impl EmbeddingClient for StubEmbeddingClient {
        async fn generate_embeddings(
            &self,
            texts: Vec<String>,
        ) -> Result<Vec<Vec<f32>>, EmbeddingClientError> {
            Ok(texts
                .into_iter()
                .map(|text| {
                    if self.failing.contains(&text) {
                        Vec::new()
                    } else {
                        vec![0.1; self.dimension]
                    }
                })
                .collect())
        }
    }

    fn build_service(
        qdrant_url: String,
        couch_url: String,
        chat_url: String,
        failing_embeddings: Vec<String>,
    ) -> RagService {
        ensure_test_config();
        RagService {
            embedding_client: Box::new(StubEmbeddingClient {
                dimension: 3,
                failing: failing_embeddings,
            }),
            qdrant: QdrantService {
                client: reqwest::Client::new(),
                base_url: qdrant_url,
                api_key: None,
            },
            metadata: MetadataService {
                client: reqwest::Client::new(),
                base_url: couch_url,
                database: "mentor".into(),
                username: None,
                password: None,
            },
            chat_client: ChatClient {
                client: reqwest::Client::new(),
                base_url: chat_url,
                api_key: "test-key".into(),
                model: "gemini-2.0-flash".into(),
            },
            downloader: reqwest::Client::new(),
            metrics: Arc::new(IngestionMetrics::new()),
        }
    }

    fn chat_reply(text: &str) -> serde_json::Value {
        json!({
            "candidates": [
                { "content": { "parts": [{ "text": text }] } }
            ]
        })
    }

    #[tokio::test]
    async fn ask_without_file_id_never_touches_the_vector_store() {
        let qdrant = MockServer::start_async().await;
        let couch = MockServer::start_async().await;
        let chat = MockServer::start_async().await;

        let vector_catch_all = qdrant
            .mock_async(|when, then| {
                when.path_contains("/collections");
                then.status(500);
            })
            .await;
        let chat_mock = chat
            .mock_async(|when, then| {
                when.method(POST)
                    .path(CHAT_PATH)
                    .body_contains("what is osmosis?");
                then.status(200).json_body(chat_reply("A general answer."));
            })
            .await;

        let service = build_service(
            qdrant.base_url(),
            couch.base_url(),
            chat.base_url(),
            Vec::new(),
        );
        let outcome = service
            .ask("what is osmosis?", None)
            .await
            .expect("general chat mode");

        assert_eq!(outcome.answer, "A general answer.");
        assert!(outcome.sources.is_empty());
        assert_eq!(vector_catch_all.hits_async().await, 0);
        chat_mock.assert_async().await;
    }

    #[tokio::test]
    async fn ask_with_empty_retrieval_short_circuits_without_a_model_call() {
        let qdrant = MockServer::start_async().await;
        let couch = MockServer::start_async().await;
        let chat = MockServer::start_async().await;

        let query_mock = qdrant
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/collections/notes/points/query")
                    .body_contains(r#""value":"file-without-chunks""#);
                then.status(200)
                    .json_body(json!({ "status": "ok", "time": 0.0, "result": [] }));
            })
            .await;
        let chat_catch_all = chat
            .mock_async(|when, then| {
                when.path_contains("generateContent");
                then.status(500);
            })
            .await;

        let service = build_service(
            qdrant.base_url(),
            couch.base_url(),
            chat.base_url(),
            Vec::new(),
        );
        let outcome = service
            .ask("what is osmosis?", Some("file-without-chunks"))
            .await
            .expect("short-circuit answer");

        query_mock.assert_async().await;
        assert_eq!(outcome.answer, NO_NOTES_ANSWER);
        assert!(outcome.sources.is_empty());
        assert_eq!(chat_catch_all.hits_async().await, 0);
    }

    #[tokio::test]
    async fn ask_with_results_grounds_the_prompt_on_retrieved_chunks() {
        let qdrant = MockServer::start_async().await;
        let couch = MockServer::start_async().await;
        let chat = MockServer::start_async().await;

        let query_mock = qdrant
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/collections/notes/points/query")
                    .body_contains(r#""key":"file_id""#)
                    .body_contains(r#""value":"file-a""#);
                then.status(200).json_body(json!({
                    "status": "ok",
                    "time": 0.0,
                    "result": [
                        { "id": "p-1", "score": 0.9, "payload": { "text": "Cells are the basic unit of life.", "file_id": "file-a" } },
                        { "id": "p-2", "score": 0.7, "payload": { "text": "Mitochondria produce ATP.", "file_id": "file-a" } }
                    ]
                }));
            })
            .await;
        let chat_mock = chat
            .mock_async(|when, then| {
                when.method(POST)
                    .path(CHAT_PATH)
                    .body_contains("Use ONLY the context provided below")
                    .body_contains("Cells are the basic unit of life.")
                    .body_contains("what are cells?");
                then.status(200).json_body(chat_reply("A grounded answer."));
            })
            .await;

        let service = build_service(
            qdrant.base_url(),
            couch.base_url(),
            chat.base_url(),
            Vec::new(),
        );
        let outcome = service
            .ask("what are cells?", Some("file-a"))
            .await
            .expect("grounded answer");

        query_mock.assert_async().await;
        chat_mock.assert_async().await;
        assert_eq!(outcome.answer, "A grounded answer.");
        assert_eq!(
            outcome.sources,
            vec![
                "Cells are the basic unit of life.".to_string(),
                "Mitochondria produce ATP.".to_string()
            ]
        );
        assert_eq!(service.metrics_snapshot().questions_answered, 1);
    }

    #[tokio::test]
    async fn ask_degrades_to_the_fallback_reply_when_the_model_fails() {
        let qdrant = MockServer::start_async().await;
        let couch = MockServer::start_async().await;
        let chat = MockServer::start_async().await;

        let _query_mock = qdrant
            .mock_async(|when, then| {
                when.method(POST).path("/collections/notes/points/query");
                then.status(200).json_body(json!({
                    "status": "ok",
                    "time": 0.0,
                    "result": [
                        { "id": "p-1", "score": 0.9, "payload": { "text": "Osmosis moves water.", "file_id": "file-a" } }
                    ]
                }));
            })
            .await;
        let _chat_mock = chat
            .mock_async(|when, then| {
                when.method(POST).path(CHAT_PATH);
                then.status(503).body("overloaded");
            })
            .await;

        let service = build_service(
            qdrant.base_url(),
            couch.base_url(),
            chat.base_url(),
            Vec::new(),
        );
        let outcome = service
            .ask("define osmosis", Some("file-a"))
            .await
            .expect("degraded answer");

        assert_eq!(outcome.answer, FALLBACK_REPLY);
        assert_eq!(outcome.sources, vec!["Osmosis moves water.".to_string()]);
    }

    #[tokio::test]
    async fn ingestion_skips_chunks_whose_embedding_failed() {
        let qdrant = MockServer::start_async().await;
        let couch = MockServer::start_async().await;
        let chat = MockServer::start_async().await;

        let text = format!("{}{}", "a".repeat(400), "b".repeat(200));
        let failing_chunk = "b".repeat(200);
        let surviving_id = chunk_point_id("file-x", 0);

        let upsert_mock = qdrant
            .mock_async(move |when, then| {
                when.method(PUT)
                    .path("/collections/notes/points")
                    .body_contains(&surviving_id);
                then.status(200)
                    .json_body(json!({ "status": "ok", "time": 0.0, "result": {} }));
            })
            .await;
        let _rev_probe = couch
            .mock_async(|when, then| {
                when.method(GET).path("/mentor/file-x");
                then.status(404).json_body(json!({ "error": "not_found" }));
            })
            .await;
        let record_mock = couch
            .mock_async(|when, then| {
                when.method(PUT)
                    .path("/mentor/file-x")
                    .body_contains(r#""chunk_count":2"#);
                then.status(201)
                    .json_body(json!({ "ok": true, "id": "file-x", "rev": "1-a" }));
            })
            .await;

        let service = build_service(
            qdrant.base_url(),
            couch.base_url(),
            chat.base_url(),
            vec![failing_chunk],
        );
        let outcome = service
            .ingest_document(IngestRequest {
                bytes: text.into_bytes(),
                filename: "notes.txt".into(),
                user_id: Some("u1".into()),
                source_url: None,
                file_id: Some("file-x".into()),
            })
            .await
            .expect("ingestion");

        upsert_mock.assert_async().await;
        record_mock.assert_async().await;
        assert_eq!(outcome.file_id, "file-x");
        assert_eq!(outcome.chunk_count, 2);
        assert_eq!(outcome.skipped_embeddings, 1);
    }

    #[tokio::test]
    async fn chat_persists_both_sides_of_the_turn() {
        let qdrant = MockServer::start_async().await;
        let couch = MockServer::start_async().await;
        let chat = MockServer::start_async().await;

        let user_write = couch
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/mentor")
                    .body_contains(r#""role":"user""#)
                    .body_contains("explain diffusion");
                then.status(201)
                    .json_body(json!({ "ok": true, "id": "m-1", "rev": "1-a" }));
            })
            .await;
        let ai_write = couch
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/mentor")
                    .body_contains(r#""role":"ai""#)
                    .body_contains("Particles spread out.");
                then.status(201)
                    .json_body(json!({ "ok": true, "id": "m-2", "rev": "1-a" }));
            })
            .await;
        let _chat_mock = chat
            .mock_async(|when, then| {
                when.method(POST).path(CHAT_PATH);
                then.status(200).json_body(chat_reply("Particles spread out."));
            })
            .await;

        let service = build_service(
            qdrant.base_url(),
            couch.base_url(),
            chat.base_url(),
            Vec::new(),
        );
        let reply = service
            .chat("u1", "explain diffusion")
            .await
            .expect("chat turn");

        assert_eq!(reply, "Particles spread out.");
        user_write.assert_async().await;
        ai_write.assert_async().await;
    }

    #[tokio::test]
    async fn failed_download_aborts_before_the_pipeline() {
        let qdrant = MockServer::start_async().await;
        let couch = MockServer::start_async().await;
        let chat = MockServer::start_async().await;
        let storage = MockServer::start_async().await;

        let _missing = storage
            .mock_async(|when, then| {
                when.method(GET).path("/missing.pdf");
                then.status(404);
            })
            .await;
        let vector_catch_all = qdrant
            .mock_async(|when, then| {
                when.path_contains("/collections");
                then.status(500);
            })
            .await;

        let service = build_service(
            qdrant.base_url(),
            couch.base_url(),
            chat.base_url(),
            Vec::new(),
        );
        let error = service
            .process_remote_file(
                &format!("{}/missing.pdf", storage.base_url()),
                "missing.pdf",
                "u1",
            )
            .await
            .unwrap_err();

        assert!(matches!(error, ProcessingError::Download(_)));
        assert_eq!(vector_catch_all.hits_async().await, 0);
    }
}
