//! Credential blob sealing.
//!
//! A blob carries a credential payload from a source device to a target
//! device that has never seen it before. Both sides derive the same key from
//! one private key and the other side's public key, and bind the blob to the
//! target's device id and the account username.

use crate::curve25519::EcdhKeyPair;
use crate::hkdf;
use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    ChaCha20Poly1305, Key, Nonce,
};
use connect_core::error::CryptoError;
use connect_core::Credential;
use rand::{rngs::OsRng, RngCore};
use zeroize::Zeroize;

const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

/// Seals and opens credential blobs.
///
/// Implementations must satisfy the round trip: sealing with
/// (A private, B public) and opening with (B private, A public) under the
/// same device id and username yields the original payload, and any key,
/// device id or username mismatch fails.
pub trait BlobCodec: Send + Sync {
    /// Seal `payload` for the peer owning `peer_public`.
    fn encrypt(
        &self,
        own: &EcdhKeyPair,
        peer_public: &[u8],
        device_id: &str,
        username: &str,
        payload: &[u8],
    ) -> Result<Vec<u8>, CryptoError>;

    /// Open a blob sent by the peer owning `peer_public`.
    fn decrypt(
        &self,
        own: &EcdhKeyPair,
        peer_public: &[u8],
        device_id: &str,
        username: &str,
        ciphertext: &[u8],
    ) -> Result<Credential, CryptoError>;
}

/// Default codec: X25519 + HKDF-SHA512 + ChaCha20-Poly1305.
///
/// Wire layout: `nonce (12) || ciphertext || tag (16)`.
/// Associated data: `device_id || 0x00 || username`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SealedBlobCodec;

impl SealedBlobCodec {
    pub fn new() -> Self {
        Self
    }

    fn cipher(
        own: &EcdhKeyPair,
        peer_public: &[u8],
        device_id: &str,
    ) -> Result<ChaCha20Poly1305, CryptoError> {
        let mut shared = own.diffie_hellman(peer_public)?;
        let mut key = hkdf::derive_blob_key(&shared, device_id)?;
        let cipher = ChaCha20Poly1305::new(Key::from_slice(&key));
        shared.zeroize();
        key.zeroize();
        Ok(cipher)
    }

    fn associated_data(device_id: &str, username: &str) -> Vec<u8> {
        let mut aad = Vec::with_capacity(device_id.len() + 1 + username.len());
        aad.extend_from_slice(device_id.as_bytes());
        aad.push(0);
        aad.extend_from_slice(username.as_bytes());
        aad
    }
}

impl BlobCodec for SealedBlobCodec {
    fn encrypt(
        &self,
        own: &EcdhKeyPair,
        peer_public: &[u8],
        device_id: &str,
        username: &str,
        payload: &[u8],
    ) -> Result<Vec<u8>, CryptoError> {
        let cipher = Self::cipher(own, peer_public, device_id)?;
        let aad = Self::associated_data(device_id, username);

        let mut nonce = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce);

        let sealed = cipher
            .encrypt(
                Nonce::from_slice(&nonce),
                Payload {
                    msg: payload,
                    aad: &aad,
                },
            )
            .map_err(|e| CryptoError::Encryption(format!("Blob sealing failed: {}", e)))?;

        let mut out = Vec::with_capacity(NONCE_LEN + sealed.len());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&sealed);
        Ok(out)
    }

    fn decrypt(
        &self,
        own: &EcdhKeyPair,
        peer_public: &[u8],
        device_id: &str,
        username: &str,
        ciphertext: &[u8],
    ) -> Result<Credential, CryptoError> {
        if ciphertext.len() < NONCE_LEN + TAG_LEN {
            return Err(CryptoError::Decryption(format!(
                "Blob too short: {} bytes",
                ciphertext.len()
            )));
        }

        let cipher = Self::cipher(own, peer_public, device_id)?;
        let aad = Self::associated_data(device_id, username);
        let (nonce, sealed) = ciphertext.split_at(NONCE_LEN);

        let payload = cipher
            .decrypt(
                Nonce::from_slice(nonce),
                Payload {
                    msg: sealed,
                    aad: &aad,
                },
            )
            .map_err(|_| CryptoError::AuthTagMismatch)?;

        Ok(Credential::new(username, payload))
    }
}
