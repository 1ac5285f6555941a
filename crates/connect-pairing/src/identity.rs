//! Per-session device identity.
//!
//! The device id is stable for a given device name. The key pair is fresh
//! for every session and never persisted.

use crate::config::SessionConfig;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use connect_crypto::EcdhKeyPair;
use sha2::{Digest, Sha256};

/// Identity of this device for one pairing session.
pub struct Identity {
    device_id: String,
    device_name: String,
    keys: EcdhKeyPair,
}

impl Identity {
    /// Build the identity for a new session from configuration.
    pub fn generate(config: &SessionConfig) -> Self {
        let device_id = config
            .device_id
            .clone()
            .unwrap_or_else(|| Self::derive_device_id(&config.device_name));
        Self::with_keys(device_id, config.device_name.clone(), EcdhKeyPair::generate())
    }

    pub fn with_keys(
        device_id: impl Into<String>,
        device_name: impl Into<String>,
        keys: EcdhKeyPair,
    ) -> Self {
        Self {
            device_id: device_id.into(),
            device_name: device_name.into(),
            keys,
        }
    }

    /// Stable 40-character lowercase hex id derived from a device name.
    pub fn derive_device_id(device_name: &str) -> String {
        let digest = Sha256::digest(device_name.as_bytes());
        hex::encode(&digest[..20])
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    pub fn keys(&self) -> &EcdhKeyPair {
        &self.keys
    }

    /// Public key in the base64 form used on the wire.
    pub fn public_key_base64(&self) -> String {
        BASE64.encode(self.keys.public_key())
    }
}
