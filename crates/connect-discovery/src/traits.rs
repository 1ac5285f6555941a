//! Trait definitions for device lookup (enables mocking in tests).

use connect_core::{RawEntry, Result};
use std::pin::Pin;
use tokio_stream::Stream;

/// Lazy, unbounded stream of lookup responses.
///
/// There is no guaranteed end-of-stream; duplicates are passed through.
pub type RawEntryStream = Pin<Box<dyn Stream<Item = RawEntry> + Send>>;

/// Network lookup of peers advertising a service type.
#[cfg_attr(test, mockall::automock)]
pub trait Locator: Send + Sync {
    /// Start querying for `service_type`.
    ///
    /// Fails only if the query cannot be issued at all. Malformed
    /// responses are skipped inside the stream.
    fn lookup(&self, service_type: &str) -> Result<RawEntryStream>;

    /// Stop all lookups started by this locator.
    fn stop(&self);
}

/// A published advertisement that can be withdrawn.
#[cfg_attr(test, mockall::automock)]
pub trait Advertisement: Send + Sync {
    /// Withdraw the advertisement. Must be idempotent and non-blocking.
    fn stop(&self);

    fn is_stopped(&self) -> bool;
}
