//! # connect-pairing
//!
//! Zeroconf-style credential pairing between Connect devices.
//!
//! This crate implements:
//! - The target side of the handshake (`getInfo`, `resetUsers`, `addUser`)
//!   served over HTTP by [`HandshakeServer`]
//! - The source side of the handshake, [`HandshakeClient`]
//! - [`ReceiveSession`]: advertise, wait for a peer, receive a credential
//! - [`PushSession`]: discover peers and push an existing credential
//! - Credential persistence behind [`CredentialStore`]

mod client;
mod config;
mod identity;
mod info;
mod server;
mod session;
mod store;

pub use client::{HandshakeClient, TargetInfo};
pub use config::{SessionConfig, SessionConfigBuilder};
pub use identity::Identity;
pub use info::{GetInfoResponse, HandshakeParams, StatusResponse};
pub use server::{AddUserOutcome, HandshakeServer, ServerPhase};
pub use session::{PushSession, PushState, ReceiveHandle, ReceiveSession, ReceiveState};
pub use store::{CredentialStore, FileCredentialStore};
