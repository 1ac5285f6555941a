//! TXT attribute parsing for Connect devices.

use connect_core::error::ParseError;
use connect_core::{DeviceEntry, RawEntry, PATH_ATTRIBUTE};
use std::net::IpAddr;

/// Parser turning raw lookup responses into handshake targets.
pub struct AttributeParser;

impl AttributeParser {
    /// Find the callback path among free-form `key=value` attributes.
    ///
    /// Keys compare case-insensitively. A path without a leading slash gets
    /// one; an empty value is treated as absent.
    pub fn find_path(attributes: &[String]) -> Option<String> {
        attributes.iter().find_map(|attr| {
            let (key, value) = attr.split_once('=')?;
            if !key.trim().eq_ignore_ascii_case(PATH_ATTRIBUTE) {
                return None;
            }
            let value = value.trim();
            if value.is_empty() {
                None
            } else if value.starts_with('/') {
                Some(value.to_string())
            } else {
                Some(format!("/{}", value))
            }
        })
    }

    /// Strip the service type suffix from an advertised instance name.
    pub fn device_name(fullname: &str, service_type: &str) -> String {
        let suffix = format!(".{}", service_type.trim_start_matches('.'));
        fullname
            .strip_suffix(suffix.as_str())
            .or_else(|| fullname.strip_suffix(suffix.trim_end_matches('.')))
            .unwrap_or(fullname)
            .to_string()
    }

    /// Build the handshake callback URL.
    pub fn callback_url(address: IpAddr, port: u16, path: &str) -> String {
        match address {
            IpAddr::V4(v4) => format!("http://{}:{}{}", v4, port, path),
            IpAddr::V6(v6) => format!("http://[{}]:{}{}", v6, port, path),
        }
    }

    /// Resolve a raw lookup response into a device entry.
    pub fn parse_entry(raw: &RawEntry, service_type: &str) -> Result<DeviceEntry, ParseError> {
        let path = Self::find_path(&raw.attributes).ok_or(ParseError::MissingField("CPath"))?;
        let address = raw.preferred_address().ok_or_else(|| {
            ParseError::InvalidValue(format!("{} has no resolved address", raw.name))
        })?;

        Ok(DeviceEntry {
            name: Self::device_name(&raw.name, service_type),
            address: Self::callback_url(address, raw.port, &path),
        })
    }
}
