//! Discovered device representations.

use std::net::IpAddr;

/// One unprocessed lookup response as it arrived from the network.
///
/// Duplicates are expected: a peer that retransmits its announcement
/// produces several identical entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEntry {
    /// Full advertised instance name (e.g. `Kitchen._spotify-connect._tcp.local.`).
    pub name: String,
    pub addresses: Vec<IpAddr>,
    pub port: u16,
    /// Free-form `key=value` attribute strings from the TXT record.
    pub attributes: Vec<String>,
}

/// A peer that can be handshaken with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceEntry {
    /// Human-readable name with the service suffix stripped.
    pub name: String,
    /// Callback endpoint, e.g. `http://192.168.1.20:8080/`.
    pub address: String,
}

impl RawEntry {
    /// Preferred address for the callback URL: first IPv4, else first IPv6.
    pub fn preferred_address(&self) -> Option<IpAddr> {
        self.addresses
            .iter()
            .find(|addr| addr.is_ipv4())
            .or_else(|| self.addresses.first())
            .copied()
    }
}

impl DeviceEntry {
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
        }
    }
}
