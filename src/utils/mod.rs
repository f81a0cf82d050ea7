//! Utility functions and helpers.

pub mod http;
pub mod log;
pub mod url;

/// Hex-encoded SHA-256 of page content.
pub fn content_hash(content: &str) -> String {
    use sha2::{Digest, Sha256};

    hex::encode(Sha256::digest(content.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_hash_is_stable_hex() {
        let a = content_hash("<html>hello</html>");
        assert_eq!(a.len(), 64);
        assert_eq!(a, content_hash("<html>hello</html>"));
        assert_ne!(a, content_hash("<html>hello!</html>"));
    }
}
