//! mDNS lookup of Connect devices.

use crate::traits::{Locator, RawEntryStream};
use connect_core::error::DiscoveryError;
use connect_core::{RawEntry, Result};
use mdns_sd::{ServiceDaemon, ServiceEvent, ServiceInfo};
use std::net::IpAddr;
use std::sync::Mutex;
use tracing::{debug, trace, warn};

/// mDNS-backed [`Locator`].
pub struct MdnsLocator {
    daemon: ServiceDaemon,
    browsing: Mutex<Vec<String>>,
}

impl MdnsLocator {
    /// Create a new locator with its own mDNS daemon.
    pub fn new() -> Result<Self> {
        let daemon = ServiceDaemon::new()
            .map_err(|e| DiscoveryError::Daemon(format!("Failed to create mDNS daemon: {}", e)))?;

        Ok(Self {
            daemon,
            browsing: Mutex::new(Vec::new()),
        })
    }

    /// Convert a resolved service into a raw entry.
    ///
    /// Services without any address are skipped.
    fn to_raw_entry(info: &ServiceInfo) -> Option<RawEntry> {
        let addresses: Vec<IpAddr> = info.get_addresses().iter().copied().collect();
        if addresses.is_empty() {
            debug!("Service {} has no addresses, skipping", info.get_fullname());
            return None;
        }

        let attributes = info
            .get_properties()
            .iter()
            .map(|prop| format!("{}={}", prop.key(), prop.val_str()))
            .collect();

        Some(RawEntry {
            name: info.get_fullname().to_string(),
            addresses,
            port: info.get_port(),
            attributes,
        })
    }
}

impl Locator for MdnsLocator {
    fn lookup(&self, service_type: &str) -> Result<RawEntryStream> {
        let receiver = self
            .daemon
            .browse(service_type)
            .map_err(|e| DiscoveryError::Lookup(format!("Failed to browse {}: {}", service_type, e)))?;

        if let Ok(mut browsing) = self.browsing.lock() {
            browsing.push(service_type.to_string());
        }
        debug!("Browsing for {}", service_type);

        let stream = async_stream::stream! {
            while let Ok(event) = receiver.recv_async().await {
                match event {
                    ServiceEvent::ServiceResolved(info) => {
                        trace!("Service resolved: {}", info.get_fullname());
                        if let Some(raw) = Self::to_raw_entry(&info) {
                            yield raw;
                        }
                    }
                    ServiceEvent::SearchStopped(ty) => {
                        trace!("Search stopped: {}", ty);
                        break;
                    }
                    other => trace!("Ignoring mDNS event: {:?}", other),
                }
            }
        };

        Ok(Box::pin(stream))
    }

    fn stop(&self) {
        let service_types = match self.browsing.lock() {
            Ok(mut browsing) => std::mem::take(&mut *browsing),
            Err(_) => return,
        };
        for service_type in service_types {
            if let Err(e) = self.daemon.stop_browse(&service_type) {
                warn!("Failed to stop browsing {}: {}", service_type, e);
            }
        }
    }
}

impl Drop for MdnsLocator {
    fn drop(&mut self) {
        self.stop();
        let _ = self.daemon.shutdown();
    }
}
