//! Record types and errors for the metadata store.

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::OffsetDateTime;

/// Errors returned while interacting with the document database.
#[derive(Debug, Error)]
pub enum MetadataError {
    /// Base URL failed to parse or normalize.
    #[error("Invalid metadata store URL: {0}")]
    InvalidUrl(String),
    /// HTTP layer failed before receiving a response.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// The store responded with an unexpected status code.
    #[error("Unexpected metadata store response ({status}): {body}")]
    UnexpectedStatus {
        /// HTTP status returned from the store.
        status: StatusCode,
        /// Body payload associated with the failing response.
        body: String,
    },
}

/// Author of a chat log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    /// Message written by the person chatting.
    User,
    /// Reply produced by the chat model.
    Ai,
}

/// Per-file metadata persisted on upload or processing.
///
/// The record is stored under the document id `file_id`, so reprocessing a
/// file replaces its record instead of creating a second one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRecord {
    /// Identifier assigned to the processed document.
    pub file_id: String,
    /// Owner of the document, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Original filename supplied by the caller.
    pub filename: String,
    /// Public URL the document was fetched from, when applicable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    /// Number of chunks produced for the document.
    pub chunk_count: usize,
    /// RFC3339 creation timestamp.
    pub created_at: String,
}

/// One entry of the append-only chat log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessageRecord {
    /// Document id assigned by the store; absent until persisted.
    #[serde(
        rename = "_id",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<String>,
    /// Owner of the chat log this entry belongs to.
    pub user_id: String,
    /// Author of the entry.
    pub role: ChatRole,
    /// Message body.
    pub text: String,
    /// RFC3339 timestamp; entries are listed in this order.
    pub timestamp: String,
}

#[derive(Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub(crate) struct FindResponse<T> {
    #[serde(default)]
    pub(crate) docs: Vec<T>,
}

#[derive(Deserialize)]
pub(crate) struct DocumentRevision {
    #[serde(rename = "_rev")]
    pub(crate) rev: String,
}

/// Current timestamp formatted for record storage.
pub(crate) fn current_timestamp_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}
