//! # connect-crypto
//!
//! Cryptographic building blocks for Connect pairing.
//!
//! This crate provides:
//! - Curve25519 ECDH key pairs, one per pairing session
//! - HKDF-SHA512 key derivation
//! - The [`BlobCodec`] contract used to seal and open credential blobs,
//!   plus [`SealedBlobCodec`], the default ChaCha20-Poly1305 construction
//!
//! All secret material is zeroized on drop.

pub mod blob;
pub mod curve25519;
pub mod hkdf;

pub use blob::{BlobCodec, SealedBlobCodec};
pub use curve25519::{EcdhKeyPair, PUBLIC_KEY_LEN};
