use sha2::{Digest, Sha256};
use std::path::Path;
use crate::error::Result;

/// SHA-256 of the file's bytes, hex encoded.
pub fn compute_file_hash(path: &Path) -> Result<String> {
    let content = std::fs::read(path)?;
    Ok(content_hash(&content))
}

pub fn content_hash(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    format!("{:x}", hasher.finalize())
}
