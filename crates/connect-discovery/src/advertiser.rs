//! mDNS advertisement of this device.

use crate::traits::Advertisement;
use connect_core::error::DiscoveryError;
use connect_core::{Result, SERVICE_TYPE};
use mdns_sd::{ServiceDaemon, ServiceInfo};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Publishes this device under the Connect service type.
pub struct Advertiser {
    service_type: String,
}

impl Advertiser {
    pub fn new() -> Self {
        Self::with_service_type(SERVICE_TYPE)
    }

    pub fn with_service_type(service_type: impl Into<String>) -> Self {
        Self {
            service_type: service_type.into(),
        }
    }

    /// Start answering discovery queries for `instance_name` on `port`.
    ///
    /// `attributes` become TXT properties (e.g. `VERSION=1.0`, `CPath=/`).
    /// The returned handle must be stopped exactly once; stopping is
    /// idempotent so extra calls are harmless.
    pub fn start(
        &self,
        instance_name: &str,
        port: u16,
        attributes: &[(&str, &str)],
    ) -> Result<AdvertiseHandle> {
        let daemon = ServiceDaemon::new()
            .map_err(|e| DiscoveryError::Daemon(format!("Failed to create mDNS daemon: {}", e)))?;

        let properties: HashMap<String, String> = attributes
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        let host_name = format!("{}.local.", Self::host_label(instance_name));

        let registered = ServiceInfo::new(
            &self.service_type,
            instance_name,
            &host_name,
            "",
            port,
            properties,
        )
        .map(ServiceInfo::enable_addr_auto)
        .map_err(|e| DiscoveryError::Advertise(format!("Invalid service info: {}", e)))
        .and_then(|service| {
            let fullname = service.get_fullname().to_string();
            daemon
                .register(service)
                .map(|_| fullname)
                .map_err(|e| DiscoveryError::Advertise(format!("Register failed: {}", e)))
        });

        let fullname = match registered {
            Ok(fullname) => fullname,
            Err(e) => {
                // Don't leak the daemon thread and its sockets.
                let _ = daemon.shutdown();
                return Err(e.into());
            }
        };

        info!("Advertising {} on port {}", fullname, port);

        Ok(AdvertiseHandle {
            inner: Arc::new(HandleInner {
                daemon,
                fullname,
                stopped: AtomicBool::new(false),
            }),
        })
    }

    /// mDNS host label: alphanumerics and dashes only.
    fn host_label(instance_name: &str) -> String {
        let label: String = instance_name
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
            .collect();
        let label = label.trim_matches('-');
        if label.is_empty() {
            "connect".to_string()
        } else {
            label.to_string()
        }
    }
}

impl Default for Advertiser {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle to a running advertisement.
///
/// Cheap to clone; all clones refer to the same registration.
#[derive(Clone)]
pub struct AdvertiseHandle {
    inner: Arc<HandleInner>,
}

struct HandleInner {
    daemon: ServiceDaemon,
    fullname: String,
    stopped: AtomicBool,
}

impl AdvertiseHandle {
    /// Full service instance name being advertised.
    pub fn fullname(&self) -> &str {
        &self.inner.fullname
    }

    pub fn is_stopped(&self) -> bool {
        self.inner.stopped.load(Ordering::SeqCst)
    }

    /// End the advertisement.
    ///
    /// Idempotent and non-blocking: the goodbye packets are sent by the
    /// daemon thread and this call does not wait for them.
    pub fn stop(&self) {
        if self.inner.stopped.swap(true, Ordering::SeqCst) {
            return;
        }

        if let Err(e) = self.inner.daemon.unregister(&self.inner.fullname) {
            warn!("Failed to unregister {}: {}", self.inner.fullname, e);
        }
        if let Err(e) = self.inner.daemon.shutdown() {
            debug!("mDNS daemon shutdown: {}", e);
        }
        info!("Stopped advertising {}", self.inner.fullname);
    }
}

impl Advertisement for AdvertiseHandle {
    fn stop(&self) {
        AdvertiseHandle::stop(self)
    }

    fn is_stopped(&self) -> bool {
        AdvertiseHandle::is_stopped(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod host_label {
        use super::*;

        #[test]
        fn replaces_spaces_and_punctuation() {
            assert_eq!(Advertiser::host_label("Living Room's Mac"), "Living-Room-s-Mac");
        }

        #[test]
        fn falls_back_for_empty_label() {
            assert_eq!(Advertiser::host_label("  "), "connect");
        }
    }

    mod advertise {
        use super::*;

        #[test]
        #[ignore = "requires mDNS on the local network"]
        fn stop_is_idempotent() {
            let handle = Advertiser::new()
                .start("connect-test", 48080, &[("VERSION", "1.0"), ("CPath", "/")])
                .expect("advertise");
            assert!(!handle.is_stopped());
            assert!(handle.fullname().starts_with("connect-test."));

            let clone = handle.clone();
            handle.stop();
            clone.stop();
            assert!(handle.is_stopped());
            assert!(clone.is_stopped());
        }

        #[test]
        #[ignore = "requires mDNS on the local network"]
        fn stop_through_trait_object() {
            let handle = Advertiser::new()
                .start("connect-test-dyn", 48082, &[("VERSION", "1.0"), ("CPath", "/")])
                .expect("advertise");
            let advertisement: Arc<dyn Advertisement> = Arc::new(handle.clone());

            advertisement.stop();
            assert!(advertisement.is_stopped());
            assert!(handle.is_stopped());
        }

        #[test]
        #[ignore = "requires mDNS on the local network"]
        fn advertises_on_real_network() {
            let handle = Advertiser::new()
                .start("connect-pair-test", 48081, &[("VERSION", "1.0"), ("CPath", "/")])
                .expect("advertise");
            std::thread::sleep(std::time::Duration::from_secs(2));
            handle.stop();
        }
    }
}
