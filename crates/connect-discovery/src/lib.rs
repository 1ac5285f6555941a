//! # connect-discovery
//!
//! mDNS/DNS-SD advertisement and lookup for Connect devices.
//!
//! This crate provides:
//! - [`Advertiser`]: publish this device under the Connect service type
//! - [`Locator`] / [`MdnsLocator`]: stream lookup responses for peers
//! - [`DeviceRegistry`]: a concurrently readable, append-only view of peers
//! - TXT attribute parsing for the handshake callback path
//!
//! ## Example
//!
//! ```ignore
//! use connect_discovery::{DeviceRegistry, Locator, MdnsLocator};
//!
//! let locator = MdnsLocator::new()?;
//! let registry = DeviceRegistry::new();
//! let stream = locator.lookup(connect_core::SERVICE_TYPE)?;
//! tokio::spawn({
//!     let registry = registry.clone();
//!     async move { registry.consume(stream).await }
//! });
//! ```

mod advertiser;
mod browser;
mod parser;
mod registry;
mod traits;

pub use advertiser::{AdvertiseHandle, Advertiser};
pub use browser::MdnsLocator;
pub use parser::AttributeParser;
pub use registry::DeviceRegistry;
pub use traits::{Advertisement, Locator, RawEntryStream};

pub use connect_core::{PATH_ATTRIBUTE, SERVICE_TYPE, VERSION_ATTRIBUTE};
