//! Registry of discovered peers fed by a lookup stream.

use crate::parser::AttributeParser;
use connect_core::{DeviceEntry, RawEntry, SERVICE_TYPE};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, RwLock};
use tokio_stream::{Stream, StreamExt};
use tracing::{debug, warn};

/// Append-only, concurrently readable list of discovered devices.
///
/// Entries keep arrival order and are never deduplicated: a peer that
/// retransmits its announcement appears once per response. Clones share
/// the same underlying list.
#[derive(Clone)]
pub struct DeviceRegistry {
    entries: Arc<RwLock<Vec<DeviceEntry>>>,
    count: Arc<watch::Sender<usize>>,
    service_type: Arc<str>,
}

impl DeviceRegistry {
    /// Create an empty registry for the Connect service type.
    pub fn new() -> Self {
        Self::with_service_type(SERVICE_TYPE)
    }

    /// Create an empty registry whose names are stripped of `service_type`.
    pub fn with_service_type(service_type: &str) -> Self {
        let (count, _) = watch::channel(0);
        Self {
            entries: Arc::new(RwLock::new(Vec::new())),
            count: Arc::new(count),
            service_type: Arc::from(service_type),
        }
    }

    /// Parse and append one lookup response.
    ///
    /// Entries without a usable callback path or address are dropped.
    /// Returns the appended entry.
    pub async fn on_entry(&self, raw: RawEntry) -> Option<DeviceEntry> {
        let entry = match AttributeParser::parse_entry(&raw, &self.service_type) {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Dropping lookup entry {}: {}", raw.name, e);
                return None;
            }
        };

        // Publish under the write guard so counts are never seen out of order.
        let len = {
            let mut entries = self.entries.write().await;
            entries.push(entry.clone());
            let len = entries.len();
            self.count.send_replace(len);
            len
        };

        debug!("Found device {} at {} ({} known)", entry.name, entry.address, len);
        Some(entry)
    }

    /// Copy of all entries appended so far, in arrival order.
    pub async fn snapshot(&self) -> Vec<DeviceEntry> {
        self.entries.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// First entry whose name contains `pattern`, ignoring case.
    pub async fn find(&self, pattern: &str) -> Option<DeviceEntry> {
        let pattern = pattern.to_lowercase();
        self.entries
            .read()
            .await
            .iter()
            .find(|entry| entry.name.to_lowercase().contains(&pattern))
            .cloned()
    }

    /// Wait until at least `min` entries are known or `timeout` elapses.
    ///
    /// Returns the number of entries known when the wait ended.
    pub async fn wait_for(&self, min: usize, timeout: Duration) -> usize {
        let mut rx = self.count.subscribe();
        let wait = async {
            loop {
                if *rx.borrow_and_update() >= min {
                    break;
                }
                if rx.changed().await.is_err() {
                    break;
                }
            }
        };
        let _ = tokio::time::timeout(timeout, wait).await;
        self.len().await
    }

    /// Feed every entry of a lookup stream into the registry.
    ///
    /// Runs until the stream ends, which for a live lookup only happens
    /// after the locator is stopped.
    pub async fn consume<S>(&self, stream: S)
    where
        S: Stream<Item = RawEntry> + Send,
    {
        tokio::pin!(stream);
        while let Some(raw) = stream.next().await {
            self.on_entry(raw).await;
        }
        debug!("Lookup stream closed");
    }
}

impl Default for DeviceRegistry {
    fn default() -> Self {
        Self::new()
    }
}
