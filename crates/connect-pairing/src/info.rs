//! Wire documents of the handshake protocol.

use crate::config::SessionConfig;
use crate::identity::Identity;
use connect_core::error::PairingError;
use serde::{Deserialize, Serialize};

pub const STATUS_OK: i32 = 101;
pub const STATUS_BAD_REQUEST: i32 = 102;
pub const STATUS_LOGIN_FAILED: i32 = 202;

const PROTOCOL_VERSION: &str = "1.3.0";

/// Status document answered to `getInfo` and `resetUsers`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetInfoResponse {
    pub status: i32,
    pub status_error: String,
    pub spotify_error: i32,
    pub version: String,
    #[serde(rename = "deviceID")]
    pub device_id: String,
    pub remote_name: String,
    pub active_user: String,
    /// Base64 public key of this session.
    pub public_key: String,
    pub device_type: String,
    pub library_version: String,
    pub account_req: String,
    pub brand_display_name: String,
    pub model_display_name: String,
}

impl GetInfoResponse {
    pub fn new(config: &SessionConfig, identity: &Identity, active_user: Option<&str>) -> Self {
        Self {
            status: STATUS_OK,
            status_error: "ERROR-OK".to_string(),
            spotify_error: 0,
            version: PROTOCOL_VERSION.to_string(),
            device_id: identity.device_id().to_string(),
            remote_name: identity.device_name().to_string(),
            active_user: active_user.unwrap_or_default().to_string(),
            public_key: identity.public_key_base64(),
            device_type: config.device_type.clone(),
            library_version: env!("CARGO_PKG_VERSION").to_string(),
            account_req: config.account_req.clone(),
            brand_display_name: config.brand_display_name.clone(),
            model_display_name: config.model_display_name.clone(),
        }
    }
}

/// Short acknowledgement or error document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub status: i32,
    pub status_error: String,
    pub spotify_error: i32,
}

impl StatusResponse {
    pub fn ok() -> Self {
        Self::with_status(STATUS_OK, "ERROR-OK")
    }

    pub fn bad_request() -> Self {
        Self::with_status(STATUS_BAD_REQUEST, "ERROR-BAD-REQUEST")
    }

    pub fn login_failed() -> Self {
        Self::with_status(STATUS_LOGIN_FAILED, "ERROR-LOGIN-FAILED")
    }

    fn with_status(status: i32, status_error: &str) -> Self {
        Self {
            status,
            status_error: status_error.to_string(),
            spotify_error: 0,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == STATUS_OK
    }
}

/// Query or form parameters of a handshake request.
///
/// Every field is optional on the wire; validation happens per action.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HandshakeParams {
    pub action: Option<String>,
    pub user_name: Option<String>,
    pub client_key: Option<String>,
    pub blob: Option<String>,
    pub device_id: Option<String>,
    pub device_name: Option<String>,
}

/// Validated `addUser` fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddUserRequest {
    pub user_name: String,
    pub client_key: String,
    pub blob: String,
}

impl HandshakeParams {
    /// Overlay `other` on top of `self`; fields present in `other` win.
    pub fn merge(self, other: HandshakeParams) -> HandshakeParams {
        HandshakeParams {
            action: other.action.or(self.action),
            user_name: other.user_name.or(self.user_name),
            client_key: other.client_key.or(self.client_key),
            blob: other.blob.or(self.blob),
            device_id: other.device_id.or(self.device_id),
            device_name: other.device_name.or(self.device_name),
        }
    }

    /// Extract the three required `addUser` fields.
    ///
    /// Empty values count as missing.
    pub fn add_user_request(&self) -> Result<AddUserRequest, PairingError> {
        fn present(value: &Option<String>) -> Option<String> {
            value.as_deref().filter(|v| !v.is_empty()).map(str::to_string)
        }

        let user_name = present(&self.user_name);
        let client_key = present(&self.client_key);
        let blob = present(&self.blob);

        match (user_name, client_key, blob) {
            (Some(user_name), Some(client_key), Some(blob)) => Ok(AddUserRequest {
                user_name,
                client_key,
                blob,
            }),
            (user_name, client_key, blob) => {
                let missing: Vec<&str> = [
                    ("userName", user_name.is_none()),
                    ("clientKey", client_key.is_none()),
                    ("blob", blob.is_none()),
                ]
                .iter()
                .filter(|(_, is_missing)| *is_missing)
                .map(|(name, _)| *name)
                .collect();
                Err(PairingError::BadRequest(format!(
                    "addUser missing {}",
                    missing.join(", ")
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(user: &str, key: &str, blob: &str) -> HandshakeParams {
        HandshakeParams {
            action: Some("addUser".to_string()),
            user_name: Some(user.to_string()),
            client_key: Some(key.to_string()),
            blob: Some(blob.to_string()),
            ..Default::default()
        }
    }

    mod get_info {
        use super::*;

        #[test]
        fn serializes_protocol_field_names() {
            let config = SessionConfig::default();
            let identity = Identity::generate(&config);
            let info = GetInfoResponse::new(&config, &identity, None);
            let json = serde_json::to_value(&info).unwrap();

            for key in [
                "status",
                "statusError",
                "spotifyError",
                "version",
                "deviceID",
                "remoteName",
                "activeUser",
                "publicKey",
                "deviceType",
                "libraryVersion",
                "accountReq",
                "brandDisplayName",
                "modelDisplayName",
            ] {
                assert!(json.get(key).is_some(), "missing {}", key);
            }
            assert_eq!(json["status"], 101);
            assert_eq!(json["statusError"], "ERROR-OK");
            assert_eq!(json["deviceID"], identity.device_id());
            assert_eq!(json["publicKey"], identity.public_key_base64());
            assert_eq!(json["activeUser"], "");
        }

        #[test]
        fn reports_active_user() {
            let config = SessionConfig::default();
            let identity = Identity::generate(&config);
            let info = GetInfoResponse::new(&config, &identity, Some("alice"));
            assert_eq!(info.active_user, "alice");
        }
    }

    mod params {
        use super::*;

        #[test]
        fn accepts_complete_add_user() {
            let request = params("alice", "a2V5", "YmxvYg==").add_user_request().unwrap();
            assert_eq!(request.user_name, "alice");
            assert_eq!(request.client_key, "a2V5");
            assert_eq!(request.blob, "YmxvYg==");
        }

        #[test]
        fn empty_field_is_bad_request() {
            let result = params("alice", "a2V5", "").add_user_request();
            match result {
                Err(PairingError::BadRequest(msg)) => assert!(msg.contains("blob")),
                other => panic!("expected BadRequest, got {:?}", other),
            }
        }

        #[test]
        fn lists_every_missing_field() {
            let result = HandshakeParams::default().add_user_request();
            match result {
                Err(PairingError::BadRequest(msg)) => {
                    assert!(msg.contains("userName"));
                    assert!(msg.contains("clientKey"));
                    assert!(msg.contains("blob"));
                }
                other => panic!("expected BadRequest, got {:?}", other),
            }
        }

        #[test]
        fn merge_prefers_overlay_fields() {
            let query = HandshakeParams {
                action: Some("addUser".to_string()),
                user_name: Some("from-query".to_string()),
                ..Default::default()
            };
            let form = HandshakeParams {
                user_name: Some("from-form".to_string()),
                blob: Some("b".to_string()),
                ..Default::default()
            };

            let merged = query.merge(form);
            assert_eq!(merged.action.as_deref(), Some("addUser"));
            assert_eq!(merged.user_name.as_deref(), Some("from-form"));
            assert_eq!(merged.blob.as_deref(), Some("b"));
        }

        #[test]
        fn deserializes_camel_case_keys() {
            let json = r#"{"action":"addUser","userName":"alice","clientKey":"k","blob":"b","deviceId":"d","deviceName":"n"}"#;
            let parsed: HandshakeParams = serde_json::from_str(json).unwrap();
            assert_eq!(parsed.user_name.as_deref(), Some("alice"));
            assert_eq!(parsed.device_id.as_deref(), Some("d"));
            assert_eq!(parsed.device_name.as_deref(), Some("n"));
        }
    }
}
