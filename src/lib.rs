#![deny(missing_docs)]

//! Core library for the study mentor backend.
//!
//! Documents come in through the HTTP layer, get their text extracted,
//! split into overlapping chunks, embedded, and stored in a vector index;
//! questions are answered by retrieving the closest chunks of one file and
//! grounding a chat model on them.

/// HTTP routing and REST handlers.
pub mod api;
/// Chat completion client and grounding prompt assembly.
pub mod chat;
/// Environment-driven configuration management.
pub mod config;
/// Embedding client abstraction and provider adapters.
pub mod embedding;
/// Document text extraction.
pub mod extract;
/// Structured logging and tracing setup.
pub mod logging;
/// Metadata store integration (document database).
pub mod metadata;
/// Activity metrics helpers.
pub mod metrics;
/// Document processing pipeline and request orchestration.
pub mod processing;
/// Qdrant vector store integration.
pub mod qdrant;
