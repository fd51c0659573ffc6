//! Helpers for constructing and hashing Qdrant payloads.

use crate::qdrant::types::ChunkPoint;
use serde_json::{Value, json};
use sha2::{Digest, Sha256};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use uuid::Uuid;

/// Build the payload object stored alongside each indexed chunk.
pub(crate) fn build_payload(point: &ChunkPoint, timestamp_rfc3339: &str) -> Value {
    json!({
        "file_id": point.file_id,
        "chunk_index": point.chunk_index,
        "byte_offset": point.byte_offset,
        "chunk_hash": compute_chunk_hash(&point.text),
        "indexed_at": timestamp_rfc3339,
        "text": point.text,
    })
}

/// Filter restricting a search to the chunks of one document.
pub(crate) fn file_filter(file_id: &str) -> Value {
    json!({
        "must": [
            {
                "key": "file_id",
                "match": { "value": file_id }
            }
        ]
    })
}

/// Compute the stable SHA-256 digest used to identify chunk content.
pub fn compute_chunk_hash(text: &str) -> String {
    hex::encode(Sha256::digest(text.as_bytes()))
}

pub(crate) fn generate_point_id() -> String {
    Uuid::new_v4().to_string()
}

pub(crate) fn current_timestamp_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| OffsetDateTime::now_utc().unix_timestamp().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_carries_document_coordinates() {
        let point = ChunkPoint {
            file_id: "file-1".into(),
            chunk_index: 3,
            byte_offset: 120,
            text: "chunk body".into(),
            vector: vec![0.5, 0.5],
        };
        let payload = build_payload(&point, "2024-01-01T00:00:00Z");
        assert_eq!(payload["file_id"], "file-1");
        assert_eq!(payload["chunk_index"], 3);
        assert_eq!(payload["byte_offset"], 120);
        assert_eq!(payload["text"], "chunk body");
        assert_eq!(payload["chunk_hash"], compute_chunk_hash("chunk body"));
        assert!(payload.get("vector").is_none());
    }

    #[test]
    fn chunk_hash_is_stable() {
        assert_eq!(compute_chunk_hash("abc"), compute_chunk_hash("abc"));
        assert_ne!(compute_chunk_hash("abc"), compute_chunk_hash("abd"));
        assert_eq!(compute_chunk_hash("abc").len(), 64);
    }

    #[test]
    fn file_filter_matches_on_file_id() {
        let filter = file_filter("file-9");
        assert_eq!(filter["must"][0]["key"], "file_id");
        assert_eq!(filter["must"][0]["match"]["value"], "file-9");
    }
}
