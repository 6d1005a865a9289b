use crate::{CodescopeError, Result};

/// Characters permitted in a revision ref (commit hash, branch, tag,
/// `HEAD[~N]`). Anything else is rejected before the ref reaches a backend.
fn is_allowed_ref_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '/' | '-' | '_' | '~' | '^' | '.')
}

/// Conservative ref validation. Rejects whitespace, quotes and SQL-meta
/// rather than trying to enumerate every valid git ref shape.
pub fn validate_ref(reference: &str) -> Result<()> {
    if reference.is_empty() {
        return Err(CodescopeError::Invalid("empty ref".to_string()));
    }
    if let Some(bad) = reference.chars().find(|c| !is_allowed_ref_char(*c)) {
        return Err(CodescopeError::Invalid(format!(
            "ref contains disallowed character {:?}: {}",
            bad, reference
        )));
    }
    // `--` never occurs in a ref and is the classic comment-injection marker.
    if reference.contains("--") {
        return Err(CodescopeError::Invalid(format!(
            "ref contains disallowed sequence '--': {}",
            reference
        )));
    }
    Ok(())
}

/// Whether a ref looks like an abbreviated commit hash that needs resolving.
pub fn is_short_hash(reference: &str) -> bool {
    reference.len() >= 4
        && reference.len() < 40
        && reference.chars().all(|c| c.is_ascii_hexdigit())
}

const CODE_EXTENSIONS: &[&str] = &[
    ".go", ".ts", ".tsx", ".js", ".jsx", ".py", ".rs", ".java", ".kt", ".cpp", ".cc", ".c", ".h",
    ".hpp", ".cs", ".rb", ".php",
];

/// Heuristic used by the impact analyzer to decide whether a target names a
/// file rather than an entity.
pub fn looks_like_file_path(target: &str) -> bool {
    if target.starts_with('/') || target.starts_with('.') {
        return true;
    }
    let lower = target.to_lowercase();
    CODE_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn well_formed_refs_pass() {
        for reference in ["HEAD", "HEAD~1", "HEAD^", "feature/x", "v1.2.3", "main"] {
            assert!(validate_ref(reference).is_ok(), "rejected {}", reference);
        }
        let long_hash = "a".repeat(32);
        assert!(validate_ref(&long_hash).is_ok());
    }

    #[test]
    fn injection_shaped_refs_are_rejected() {
        for reference in ["'; DROP TABLE --", "foo bar", "\"injection", "a;b", "x --"] {
            let err = validate_ref(reference).unwrap_err();
            assert!(
                matches!(err, CodescopeError::Invalid(_)),
                "expected Invalid for {:?}",
                reference
            );
        }
        assert!(validate_ref("").is_err());
    }

    #[test]
    fn short_hashes_are_recognized() {
        assert!(is_short_hash("deadbeef"));
        assert!(is_short_hash("a1b2"));
        assert!(!is_short_hash("abc"));
        assert!(!is_short_hash("feature/x"));
        let full = "0123456789abcdef0123456789abcdef01234567";
        assert!(!is_short_hash(full));
    }

    #[test]
    fn file_path_detection_covers_prefixes_and_extensions() {
        assert!(looks_like_file_path("/src/main.go"));
        assert!(looks_like_file_path("./handler.ts"));
        assert!(looks_like_file_path("internal/auth/login.go"));
        assert!(looks_like_file_path("Parser.RS"));
        assert!(!looks_like_file_path("LoginHandler"));
        assert!(!looks_like_file_path("parse_config"));
    }
}
