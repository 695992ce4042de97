//! Cache keys derived from the tail of a conversation.

use std::fmt;

use sha2::{Digest, Sha256};

/// SHA-256 of the last user message and the history length, hex encoded.
///
/// The length is part of the key so the same question asked at a different
/// point in a conversation is treated as a new request.
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Fingerprint of `last_user_text` at position `history_len`.
    pub fn of(last_user_text: &str, history_len: usize) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(history_len.to_string().as_bytes());
        hasher.update([0u8]);
        hasher.update(last_user_text.as_bytes());
        Self(format!("{:x}", hasher.finalize()))
    }

    /// Full hex digest.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 12 hex digits, for logs.
    pub fn short(&self) -> &str {
        &self.0[..12]
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
