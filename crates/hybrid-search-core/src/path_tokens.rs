//! Privacy-mode path obfuscation: HMAC-keyed, truncated tokens instead of
//! plaintext path segments.
//!
//! Tokens use URL-safe base64 truncation rather than base32, keyed by
//! HMAC-SHA256 over each path segment. See DESIGN.md for the rationale.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Number of encoded characters kept per obfuscated path segment.
const TOKEN_LEN: usize = 12;

/// Tokenize a single path segment under the given salt.
///
/// Deterministic: the same segment and salt always produce the same token,
/// which is required so that directory-hint filters keep working against
/// obfuscated paths across requests.
pub fn tokenize_segment(segment: &str, salt: &str) -> String {
    let mut mac =
        HmacSha256::new_from_slice(salt.as_bytes()).expect("HMAC accepts keys of any length");
    mac.update(segment.as_bytes());
    let digest = mac.finalize().into_bytes();
    let encoded = URL_SAFE_NO_PAD.encode(digest);
    encoded.chars().take(TOKEN_LEN).collect()
}

/// Tokenize every segment of a `/`-separated relative path.
pub fn tokenize_path(rel_path: &str, salt: &str) -> Vec<String> {
    rel_path
        .split('/')
        .filter(|seg| !seg.is_empty())
        .map(|seg| tokenize_segment(seg, salt))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenize_is_deterministic_for_same_salt() {
        let a = tokenize_segment("src", "salt-v1");
        let b = tokenize_segment("src", "salt-v1");
        assert_eq!(a, b);
        assert_eq!(a.len(), TOKEN_LEN);
    }

    #[test]
    fn different_salts_produce_different_tokens() {
        let a = tokenize_segment("src", "salt-v1");
        let b = tokenize_segment("src", "salt-v2");
        assert_ne!(a, b);
    }

    #[test]
    fn tokenize_path_splits_on_slash_and_skips_empty_segments() {
        let tokens = tokenize_path("/src/lib.rs", "salt-v1");
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0], tokenize_segment("src", "salt-v1"));
        assert_eq!(tokens[1], tokenize_segment("lib.rs", "salt-v1"));
    }

    #[test]
    fn no_plaintext_segment_appears_in_output() {
        let tokens = tokenize_path("secret_module/internal.py", "salt-v1");
        for t in &tokens {
            assert!(!t.contains("secret"));
            assert!(!t.contains("internal"));
        }
    }
}
