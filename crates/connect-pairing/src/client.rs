//! Source side of the handshake.

use crate::identity::Identity;
use crate::info::StatusResponse;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use connect_core::error::{Error, HandshakeError, HandshakeStep};
use connect_core::Credential;
use connect_crypto::BlobCodec;
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Fields of a target's `getInfo` document used by the client.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetInfo {
    #[serde(default)]
    pub status: Option<i32>,
    #[serde(rename = "deviceID")]
    pub device_id: String,
    /// Base64 public key.
    pub public_key: String,
    #[serde(default)]
    pub remote_name: String,
    #[serde(default)]
    pub active_user: String,
}

impl TargetInfo {
    fn public_key_bytes(&self) -> Result<Vec<u8>, String> {
        BASE64
            .decode(self.public_key.as_bytes())
            .map_err(|e| format!("publicKey is not base64: {}", e))
    }
}

/// Runs the four-step handshake against one target.
///
/// Holds no per-target state: a failed sequence leaves nothing behind and a
/// retry starts again from `getInfo`.
pub struct HandshakeClient {
    http: Client,
    identity: Arc<Identity>,
    codec: Arc<dyn BlobCodec>,
}

impl HandshakeClient {
    /// Create a client with a per-request timeout.
    ///
    /// Fails with `Error::HttpClient` if the HTTP stack cannot be initialized.
    pub fn new(identity: Arc<Identity>, codec: Arc<dyn BlobCodec>) -> connect_core::Result<Self> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| Error::HttpClient(e.to_string()))?;
        Ok(Self::with_http_client(http, identity, codec))
    }

    pub fn with_http_client(http: Client, identity: Arc<Identity>, codec: Arc<dyn BlobCodec>) -> Self {
        Self {
            http,
            identity,
            codec,
        }
    }

    /// Push `credential` to the target whose callback URL is `address`.
    pub async fn pair(&self, address: &str, credential: &Credential) -> Result<(), HandshakeError> {
        info!("Pairing with {} as {}", address, credential.username());

        let first = self.get_info(address, HandshakeStep::GetInfo).await?;
        debug!(
            "Target {} ({}) reports active user {:?}",
            first.remote_name, first.device_id, first.active_user
        );

        self.reset_users(address).await?;

        // Keys may rotate between calls; the refreshed one is authoritative.
        let target = self.get_info(address, HandshakeStep::RefreshInfo).await?;
        if target.public_key != first.public_key {
            debug!("Target {} rotated its public key", target.device_id);
        }
        let target_public = target
            .public_key_bytes()
            .map_err(|reason| HandshakeError::new(HandshakeStep::RefreshInfo, reason))?;

        let blob = self
            .codec
            .encrypt(
                self.identity.keys(),
                &target_public,
                &target.device_id,
                credential.username(),
                credential.payload(),
            )
            .map_err(|e| HandshakeError::new(HandshakeStep::AddUser, e.to_string()))?;

        self.add_user(address, credential.username(), &blob).await?;
        info!("Credential for {} accepted by {}", credential.username(), address);
        Ok(())
    }

    async fn get_info(&self, address: &str, step: HandshakeStep) -> Result<TargetInfo, HandshakeError> {
        debug!("{} -> {}", step, address);
        let response = self
            .http
            .get(address)
            .query(&[("action", "getInfo")])
            .send()
            .await
            .map_err(|e| HandshakeError::new(step, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(HandshakeError::new(step, format!("HTTP {}", status)));
        }

        let info: TargetInfo = response
            .json()
            .await
            .map_err(|e| HandshakeError::new(step, format!("malformed response: {}", e)))?;

        match info.status {
            Some(code) if code != crate::info::STATUS_OK => {
                Err(HandshakeError::new(step, format!("target status {}", code)))
            }
            _ => Ok(info),
        }
    }

    async fn reset_users(&self, address: &str) -> Result<(), HandshakeError> {
        let step = HandshakeStep::ResetUsers;
        debug!("{} -> {}", step, address);
        let response = self
            .http
            .get(address)
            .query(&[("action", "resetUsers")])
            .send()
            .await
            .map_err(|e| HandshakeError::new(step, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(HandshakeError::new(step, format!("HTTP {}", status)));
        }
        Ok(())
    }

    async fn add_user(&self, address: &str, username: &str, blob: &[u8]) -> Result<(), HandshakeError> {
        let step = HandshakeStep::AddUser;
        debug!("{} -> {} ({} byte blob)", step, address, blob.len());

        let blob = BASE64.encode(blob);
        let client_key = self.identity.public_key_base64();
        let form = [
            ("action", "addUser"),
            ("userName", username),
            ("blob", blob.as_str()),
            ("clientKey", client_key.as_str()),
            ("deviceId", self.identity.device_id()),
            ("deviceName", self.identity.device_name()),
        ];

        let response = self
            .http
            .post(address)
            .form(&form)
            .send()
            .await
            .map_err(|e| HandshakeError::new(step, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(HandshakeError::new(step, format!("HTTP {}: {}", status, body)));
        }

        let ack: StatusResponse = response
            .json()
            .await
            .map_err(|e| HandshakeError::new(step, format!("malformed response: {}", e)))?;
        if !ack.is_ok() {
            return Err(HandshakeError::new(
                step,
                format!("target status {} {}", ack.status, ack.status_error),
            ));
        }
        Ok(())
    }
}
