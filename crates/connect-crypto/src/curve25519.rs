//! Curve25519 ECDH for blob key agreement.

use connect_core::error::CryptoError;
use rand::rngs::OsRng;
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::ZeroizeOnDrop;

/// Length of an encoded Curve25519 public key.
pub const PUBLIC_KEY_LEN: usize = 32;

/// Curve25519 key pair for one pairing session.
///
/// Unlike a strictly ephemeral key, the target keeps the same pair for every
/// request of its session, so `diffie_hellman` borrows instead of consuming.
#[derive(ZeroizeOnDrop)]
pub struct EcdhKeyPair {
    #[zeroize(skip)]
    public: [u8; PUBLIC_KEY_LEN],
    secret: [u8; 32],
}

impl EcdhKeyPair {
    /// Generate a new random key pair.
    pub fn generate() -> Self {
        let secret = StaticSecret::random_from_rng(OsRng);
        Self::from_static(secret)
    }

    /// Rebuild a key pair from raw secret bytes.
    pub fn from_secret(secret: &[u8; 32]) -> Self {
        Self::from_static(StaticSecret::from(*secret))
    }

    fn from_static(secret: StaticSecret) -> Self {
        let public = PublicKey::from(&secret);
        Self {
            public: public.to_bytes(),
            secret: secret.to_bytes(),
        }
    }

    /// Public key as sent in `publicKey` / `clientKey` (before base64).
    pub fn public_key(&self) -> [u8; PUBLIC_KEY_LEN] {
        self.public
    }

    /// Derive the shared secret with a peer's encoded public key.
    ///
    /// Rejects keys of the wrong length, the all-zero key, and low-order
    /// points (which produce an all-zero shared secret).
    pub fn diffie_hellman(&self, peer_public: &[u8]) -> Result<[u8; 32], CryptoError> {
        let peer: [u8; PUBLIC_KEY_LEN] =
            peer_public
                .try_into()
                .map_err(|_| CryptoError::InvalidKeyLength {
                    expected: PUBLIC_KEY_LEN,
                    actual: peer_public.len(),
                })?;

        if peer.iter().all(|&b| b == 0) {
            return Err(CryptoError::KeyDerivation(
                "Invalid peer public key: all zeros".to_string(),
            ));
        }

        let secret = StaticSecret::from(self.secret);
        let shared = secret.diffie_hellman(&PublicKey::from(peer)).to_bytes();

        if shared.iter().all(|&b| b == 0) {
            return Err(CryptoError::KeyDerivation(
                "Weak ECDH: shared secret is all zeros (low-order point)".to_string(),
            ));
        }

        Ok(shared)
    }
}
