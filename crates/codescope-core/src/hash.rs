use sha2::{Digest, Sha256};

/// Hex SHA-256 of a code unit's content.
///
/// Scanners stamp entities and file-index rows with this, so embedding
/// staleness checks and file change detection compare like for like.
pub fn content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hasher
        .finalize()
        .iter()
        .map(|byte| format!("{:02x}", byte))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_the_known_empty_digest() {
        assert_eq!(
            content_hash(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn distinct_content_hashes_differently() {
        let a = content_hash("func Login() {}");
        let b = content_hash("func Login() { return }");
        assert_ne!(a, b);
        assert_eq!(a.len(), 64);
        assert_eq!(a, content_hash("func Login() {}"));
    }
}
