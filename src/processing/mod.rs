//! Document processing pipeline: extraction, chunking, embedding, and storage.

pub mod chunking;
mod service;
pub mod types;

pub use chunking::split_text;
pub use service::{BackendApi, RagService};
pub use types::{
    AskError, AskOutcome, ChunkingError, IngestOutcome, IngestRequest, ProcessingError,
};
