//! Metadata store integration (document database).

pub mod client;
pub mod types;

pub use client::MetadataService;
pub use types::{ChatMessageRecord, ChatRole, FileRecord, MetadataError};
