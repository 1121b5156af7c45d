//! Password verifiers
//!
//! Credentials are stored as lowercase hex SHA-256 digests. This is an
//! opaque verifier, not real cryptographic authentication: no salt, no
//! key stretching.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// One-way hash of an account password
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PasswordHash(String);

impl PasswordHash {
    /// Hash a plaintext password
    pub fn digest(password: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(password.as_bytes());
        Self(hex::encode(hasher.finalize()))
    }

    /// Check a plaintext password against this hash
    pub fn verify(&self, password: &str) -> bool {
        Self::digest(password) == *self
    }

    /// Hex digest string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_deterministic() {
        assert_eq!(PasswordHash::digest("pw1"), PasswordHash::digest("pw1"));
        assert_ne!(PasswordHash::digest("pw1"), PasswordHash::digest("pw2"));
    }

    #[test]
    fn test_verify() {
        let hash = PasswordHash::digest("Spookytus");
        assert!(hash.verify("Spookytus"));
        assert!(!hash.verify("spookytus"));
        assert!(!hash.verify(""));
    }

    #[test]
    fn test_known_vector() {
        // sha256("abc")
        let hash = PasswordHash::digest("abc");
        assert_eq!(
            hash.as_str(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
