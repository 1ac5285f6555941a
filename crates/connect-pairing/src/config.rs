//! Session configuration.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

/// Configuration shared by the receive and push flows.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Advertised instance name, also reported as `remoteName`.
    pub device_name: String,
    /// Fixed device id; derived from `device_name` when absent.
    pub device_id: Option<String>,
    /// Handshake listener port. `0` picks an ephemeral port.
    pub port: u16,
    pub bind_addr: IpAddr,
    /// Handshake callback path advertised as `CPath`.
    pub path: String,
    /// Protocol version advertised as `VERSION`.
    pub version: String,
    pub device_type: String,
    pub account_req: String,
    pub brand_display_name: String,
    pub model_display_name: String,
    /// Where received credentials are saved and pushed credentials loaded from.
    pub credential_path: Option<PathBuf>,
    /// Publish an mDNS advertisement while receiving.
    pub advertise: bool,
}

impl SessionConfig {
    pub fn builder() -> SessionConfigBuilder {
        SessionConfigBuilder::new()
    }

    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_addr, self.port)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            device_name: "connect-pair".to_string(),
            device_id: None,
            port: 8080,
            bind_addr: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            path: "/".to_string(),
            version: "1.0".to_string(),
            device_type: "UNKNOWN".to_string(),
            account_req: "PREMIUM".to_string(),
            brand_display_name: "connect-pair".to_string(),
            model_display_name: "connect-pair".to_string(),
            credential_path: None,
            advertise: true,
        }
    }
}

/// Builder for [`SessionConfig`].
pub struct SessionConfigBuilder {
    config: SessionConfig,
}

impl SessionConfigBuilder {
    /// Create new builder with defaults.
    pub fn new() -> Self {
        Self {
            config: SessionConfig::default(),
        }
    }

    pub fn device_name(mut self, name: impl Into<String>) -> Self {
        self.config.device_name = name.into();
        self
    }

    pub fn device_id(mut self, id: impl Into<String>) -> Self {
        self.config.device_id = Some(id.into());
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    pub fn bind_addr(mut self, addr: IpAddr) -> Self {
        self.config.bind_addr = addr;
        self
    }

    /// Set the callback path. A missing leading slash is added.
    pub fn path(mut self, path: impl Into<String>) -> Self {
        let path = path.into();
        self.config.path = if path.starts_with('/') {
            path
        } else {
            format!("/{}", path)
        };
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.config.version = version.into();
        self
    }

    pub fn device_type(mut self, device_type: impl Into<String>) -> Self {
        self.config.device_type = device_type.into();
        self
    }

    pub fn account_req(mut self, account_req: impl Into<String>) -> Self {
        self.config.account_req = account_req.into();
        self
    }

    /// Set both brand and model display names.
    pub fn display_names(mut self, brand: impl Into<String>, model: impl Into<String>) -> Self {
        self.config.brand_display_name = brand.into();
        self.config.model_display_name = model.into();
        self
    }

    pub fn credential_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.credential_path = Some(path.into());
        self
    }

    /// Enable or disable the mDNS advertisement of the receive flow.
    pub fn advertise(mut self, enabled: bool) -> Self {
        self.config.advertise = enabled;
        self
    }

    pub fn build(self) -> SessionConfig {
        self.config
    }
}

impl Default for SessionConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
