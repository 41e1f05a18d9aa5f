//! Helpers for constructing chunk payloads and deterministic point ids.

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use time::OffsetDateTime;
use uuid::Uuid;

/// Storage key for a chunk, unique within the collection.
pub(crate) fn chunk_key(file_id: &str, ordinal: usize) -> String {
    format!("{file_id}_{ordinal}")
}

/// Derive the Qdrant point id for a chunk.
///
/// Qdrant only accepts UUIDs or integers as point ids, so the chunk key is
/// hashed into a stable UUID. Reprocessing a file therefore overwrites its
/// points in place instead of accumulating duplicates.
pub(crate) fn chunk_point_id(file_id: &str, ordinal: usize) -> String {
    let mut hasher = Sha256::new();
    hasher.update(chunk_key(file_id, ordinal).as_bytes());
    let digest = hasher.finalize();
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest[..16]);
    Uuid::from_bytes(bytes).to_string()
}

/// Build the payload object stored alongside each indexed chunk.
pub(crate) fn build_chunk_payload(
    file_id: &str,
    ordinal: usize,
    text: &str,
    timestamp_rfc3339: &str,
) -> Value {
    let mut payload = Map::new();
    payload.insert("file_id".into(), Value::String(file_id.to_string()));
    payload.insert(
        "chunk_key".into(),
        Value::String(chunk_key(file_id, ordinal)),
    );
    payload.insert("ordinal".into(), Value::from(ordinal));
    payload.insert("text".into(), Value::String(text.to_string()));
    payload.insert(
        "timestamp".into(),
        Value::String(timestamp_rfc3339.to_string()),
    );
    Value::Object(payload)
}

/// Current timestamp formatted for payload storage.
pub(crate) fn current_timestamp_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}
