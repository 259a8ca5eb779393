//! Content-addressable chunk identifiers.

use sha2::{Digest, Sha256};

/// Deterministic chunk id: lowercase hex SHA-256 over the identity tuple
/// `collector :: source :: item index :: chunk index :: chunk text`.
///
/// The same chunk of the same item from the same source always hashes to
/// the same id, so duplicate inserts across runs are impossible by
/// construction.
pub fn chunk_id(
    collector: &str,
    source: &str,
    item_index: usize,
    chunk_index: usize,
    text: &str,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(collector.as_bytes());
    hasher.update(b"::");
    hasher.update(source.as_bytes());
    hasher.update(b"::");
    hasher.update(item_index.to_string().as_bytes());
    hasher.update(b"::");
    hasher.update(chunk_index.to_string().as_bytes());
    hasher.update(b"::");
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}
