//! Core data types and error definitions for the processing pipeline.

use crate::{
    embedding::EmbeddingClientError, extract::ExtractError, metadata::MetadataError,
    qdrant::QdrantError,
};
use thiserror::Error;

/// Errors produced while splitting raw text into chunks.
#[derive(Debug, Error)]
pub enum ChunkingError {
    /// Ingestion configured an impossible window size.
    #[error("chunk size must be greater than zero")]
    InvalidChunkSize,
    /// Overlap that meets or exceeds the window size would never advance.
    #[error("chunk overlap ({overlap}) must be smaller than chunk size ({chunk_size})")]
    InvalidOverlap {
        /// Configured window size in characters.
        chunk_size: usize,
        /// Configured overlap in characters.
        overlap: usize,
    },
}

/// Errors emitted by the document ingestion pipeline.
#[derive(Debug, Error)]
pub enum ProcessingError {
    /// Remote source file could not be fetched.
    #[error("Failed to download source file: {0}")]
    Download(String),
    /// Text extraction rejected the document.
    #[error("Failed to extract text: {0}")]
    Extract(#[from] ExtractError),
    /// Chunking step failed to segment the document.
    #[error("Failed to chunk document: {0}")]
    Chunking(#[from] ChunkingError),
    /// Embedding provider failed to produce vectors for the input text.
    #[error("Failed to generate embeddings: {0}")]
    Embedding(#[from] EmbeddingClientError),
    /// Vector store interaction failed during ingestion.
    #[error("Qdrant request failed: {0}")]
    Qdrant(#[from] QdrantError),
    /// Metadata store write failed.
    #[error("Metadata store request failed: {0}")]
    Metadata(#[from] MetadataError),
}

/// Errors emitted while answering a question against stored notes.
#[derive(Debug, Error)]
pub enum AskError {
    /// Embedding provider failed to return vectors for the question.
    #[error("Failed to generate embeddings: {0}")]
    Embedding(#[from] EmbeddingClientError),
    /// Vector store query returned an error response.
    #[error("Qdrant request failed: {0}")]
    Qdrant(#[from] QdrantError),
    /// Embedding provider returned no usable vector for the question.
    #[error("Embedding provider returned no vector for the question")]
    EmptyQueryEmbedding,
    /// Returned embedding dimension does not match configuration.
    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Expected embedding dimension configured on the server.
        expected: usize,
        /// Actual embedding dimension produced by the provider.
        actual: usize,
    },
}

/// A document handed to the ingestion pipeline.
#[derive(Debug, Clone)]
pub struct IngestRequest {
    /// Raw document bytes (PDF or plain text).
    pub bytes: Vec<u8>,
    /// Original filename, used for format hints and metadata.
    pub filename: String,
    /// Owner of the document, when known.
    pub user_id: Option<String>,
    /// Public URL the document was fetched from, when applicable.
    pub source_url: Option<String>,
    /// Existing file identifier to reprocess; a fresh UUID is assigned when absent.
    pub file_id: Option<String>,
}

/// Summary of a completed ingestion.
#[derive(Debug, Clone)]
pub struct IngestOutcome {
    /// Identifier assigned to the processed document.
    pub file_id: String,
    /// Number of chunks produced for the document.
    pub chunk_count: usize,
    /// Chunks whose embedding failed and were skipped during storage.
    pub skipped_embeddings: usize,
}

/// Answer produced for an ask request.
#[derive(Debug, Clone)]
pub struct AskOutcome {
    /// Model answer, or a fixed informational reply when retrieval found nothing.
    pub answer: String,
    /// Raw chunk texts the answer was grounded on.
    pub sources: Vec<String>,
}
