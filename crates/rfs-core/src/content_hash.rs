//! Content hash utilities for recognizing our own writes.
//!
//! The client records the hash of every file it writes during a pull. The next
//! local-change notification is only treated as an echo if the file on disk still
//! hashes to that value.

use sha2::{Digest, Sha256};

/// SHA-256 of a file's bytes, hex encoded.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContentHash(String);

impl ContentHash {
    /// Compute hash from content bytes.
    pub fn from_bytes(content: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(content);
        Self(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ContentHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Short form is enough to tell writes apart in logs
        f.write_str(&self.0[..12])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_hash_deterministic() {
        assert_eq!(ContentHash::from_bytes(b"hello"), ContentHash::from_bytes(b"hello"));
    }

    #[test]
    fn test_different_content_different_hash() {
        assert_ne!(ContentHash::from_bytes(b"hello"), ContentHash::from_bytes(b"hello\n"));
    }

    #[test]
    fn test_empty_content_hash() {
        let hash = ContentHash::from_bytes(b"");
        assert_eq!(
            hash.as_str(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_eq!(hash.to_string(), "e3b0c44298fc");
    }
}
