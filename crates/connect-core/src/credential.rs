//! The reusable login credential carried inside a blob.

use std::fmt;

/// Decoded login credential: a username plus an opaque authentication payload.
///
/// Immutable once built. The payload is only meaningful to the blob codec and
/// the account backend, so `Debug` prints its length and never its bytes.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    username: String,
    payload: Vec<u8>,
}

impl Credential {
    pub fn new(username: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            username: username.into(),
            payload: payload.into(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// Opaque authentication payload.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn into_parts(self) -> (String, Vec<u8>) {
        (self.username, self.payload)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("username", &self.username)
            .field("payload_len", &self.payload.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accessors_return_constructed_values() {
        let credential = Credential::new("alice", vec![1, 2, 3]);
        assert_eq!(credential.username(), "alice");
        assert_eq!(credential.payload(), &[1, 2, 3]);
    }

    #[test]
    fn debug_output_hides_payload() {
        let credential = Credential::new("alice", b"secret-token".to_vec());
        let debug = format!("{:?}", credential);
        assert!(debug.contains("alice"));
        assert!(debug.contains("payload_len: 12"));
        assert!(!debug.contains("secret"));
    }

    #[test]
    fn into_parts_returns_owned_fields() {
        let (username, payload) = Credential::new("bob", vec![9u8; 4]).into_parts();
        assert_eq!(username, "bob");
        assert_eq!(payload, vec![9u8; 4]);
    }
}
