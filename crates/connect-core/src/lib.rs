//! # connect-core
//!
//! Core types and error definitions shared across all Connect pairing crates.
//!
//! This crate provides:
//! - The transportable login credential
//! - Discovered device representations (raw lookup entries and resolved entries)
//! - Common error types

pub mod credential;
pub mod device;
pub mod error;

pub use credential::Credential;
pub use device::{DeviceEntry, RawEntry};
pub use error::{
    CryptoError, DiscoveryError, Error, HandshakeError, HandshakeStep, PairingError, ParseError,
    Result, StorageError,
};

/// Well-known mDNS service type advertised by Connect devices.
pub const SERVICE_TYPE: &str = "_spotify-connect._tcp.local.";

/// TXT attribute carrying the protocol version string.
pub const VERSION_ATTRIBUTE: &str = "VERSION";

/// TXT attribute carrying the handshake callback path.
pub const PATH_ATTRIBUTE: &str = "CPath";
