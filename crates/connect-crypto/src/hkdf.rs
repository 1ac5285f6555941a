//! HKDF-SHA512 key derivation for blob keys.

use connect_core::error::CryptoError;

use hkdf::Hkdf;
use sha2::Sha512;

/// Salt and info strings for blob sealing.
pub mod constants {
    pub const BLOB_SALT: &[u8] = b"Connect-Blob-Salt";
    pub const BLOB_KEY_INFO: &[u8] = b"Connect-Blob-Key";
}

/// Derive a 32-byte key using HKDF-SHA512.
pub fn derive_key_32(ikm: &[u8], salt: &[u8], info: &[u8]) -> Result<[u8; 32], CryptoError> {
    let hk = Hkdf::<Sha512>::new(Some(salt), ikm);
    let mut okm = [0u8; 32];
    hk.expand(info, &mut okm)
        .map_err(|_| CryptoError::KeyDerivation("HKDF expand failed".to_string()))?;
    Ok(okm)
}

/// Derive the blob encryption key for a given target device.
///
/// The device id is folded into `info` so that a blob sealed for one device
/// cannot be opened under another device's context.
pub fn derive_blob_key(shared_secret: &[u8], device_id: &str) -> Result<[u8; 32], CryptoError> {
    let mut info = Vec::with_capacity(constants::BLOB_KEY_INFO.len() + device_id.len());
    info.extend_from_slice(constants::BLOB_KEY_INFO);
    info.extend_from_slice(device_id.as_bytes());
    derive_key_32(shared_secret, constants::BLOB_SALT, &info)
}
