//! Error types for Connect pairing.

use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

/// Primary error type for all pairing operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Discovery error: {0}")]
    Discovery(#[from] DiscoveryError),

    #[error("Failed to bind handshake listener on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("HTTP client setup failed: {0}")]
    HttpClient(String),

    #[error("Pairing error: {0}")]
    Pairing(#[from] PairingError),

    #[error("Handshake error: {0}")]
    Handshake(#[from] HandshakeError),

    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Operation timed out")]
    Timeout,
}

/// Errors while advertising or looking up devices over mDNS.
#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("mDNS daemon error: {0}")]
    Daemon(String),

    #[error("Advertisement failed: {0}")]
    Advertise(String),

    #[error("Lookup failed: {0}")]
    Lookup(String),

    #[error("No devices found")]
    NoDevicesFound,
}

/// Per-request errors on the receiving (target) side of the handshake.
///
/// None of these tear down a listening session.
#[derive(Error, Debug)]
pub enum PairingError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unknown action: {0}")]
    UnknownAction(String),

    #[error("Blob could not be decoded: {0}")]
    Decode(String),

    #[error("Invalid session state: {0}")]
    InvalidState(String),
}

/// Step of the outbound four-step handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandshakeStep {
    GetInfo,
    ResetUsers,
    RefreshInfo,
    AddUser,
}

impl HandshakeStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            HandshakeStep::GetInfo => "getInfo",
            HandshakeStep::ResetUsers => "resetUsers",
            HandshakeStep::RefreshInfo => "getInfo (refresh)",
            HandshakeStep::AddUser => "addUser",
        }
    }
}

impl fmt::Display for HandshakeStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure of the outbound handshake sequence, tagged with the failing step.
#[derive(Error, Debug)]
#[error("{step} failed: {reason}")]
pub struct HandshakeError {
    pub step: HandshakeStep,
    pub reason: String,
}

impl HandshakeError {
    pub fn new(step: HandshakeStep, reason: impl Into<String>) -> Self {
        Self {
            step,
            reason: reason.into(),
        }
    }
}

/// Credential persistence errors.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("No stored credential at {0}")]
    NotFound(PathBuf),

    #[error("Malformed credential file: {0}")]
    Format(String),
}

/// Cryptographic operation errors.
#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("Encryption failed: {0}")]
    Encryption(String),

    #[error("Decryption failed: {0}")]
    Decryption(String),

    #[error("Key derivation failed: {0}")]
    KeyDerivation(String),

    #[error("Invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },

    #[error("Authentication tag mismatch")]
    AuthTagMismatch,
}

/// Parsing errors for wire formats and attributes.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Invalid value: {0}")]
    InvalidValue(String),
}

impl Error {
    /// Whether this error ends the whole session rather than one request or target.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::Bind { .. } | Error::HttpClient(_) | Error::Discovery(_) | Error::Timeout
        )
    }
}

/// Convenience Result type.
pub type Result<T> = std::result::Result<T, Error>;
