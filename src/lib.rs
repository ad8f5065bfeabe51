//! Bridge between Naim network audio receivers and a smart-home accessory host
//!
//! This library discovers Naim receivers on the local network and exposes
//! each one to the host as accessories. It supports:
//!
//! - Discovery via SSDP and UPnP descriptor documents
//! - Reconciliation against accessories restored from the host's cache
//! - Power, play/pause, volume and mute control
//! - Input listing and selection
//! - Optimistic updates that are corrected by the device
//!
//! # Quick Start
//!
//! ```no_run
//! use naim_bridge::{AccessoryHost, NaimPlatform, PlatformConfig};
//! use std::sync::Arc;
//!
//! # fn host() -> Arc<dyn AccessoryHost> { unimplemented!() }
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = PlatformConfig::from_value(serde_json::json!({
//!         "platform": "NaimAudioPlatform",
//!         "discoveryTimeoutMs": 10000
//!     }))?;
//!
//!     // `host()` is the accessory framework's implementation of `AccessoryHost`
//!     let mut platform = NaimPlatform::new(config, host());
//!
//!     // Hand back cached accessories first, then discover
//!     let found = platform.did_finish_launching().await?;
//!     println!("Found {} receiver(s)", found);
//!
//!     for controller in platform.controllers() {
//!         println!("{}: {:?}", controller.name(), controller.state());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Direct Control
//!
//! If you know the address of a receiver, you can talk to its control API directly:
//!
//! ```no_run
//! use naim_bridge::{protocol, NaimClient};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = NaimClient::new("http://192.168.1.100:15081", Duration::from_secs(5))?;
//!
//!     let power = client.get_text(protocol::paths::POWER, protocol::keys::SYSTEM).await?;
//!     println!("Power: {:?}", power);
//!
//!     client
//!         .put(protocol::paths::ROOM_LEVELS, protocol::keys::VOLUME, "30", false)
//!         .await?;
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - **Platform**: Host entry points (restore, finished launching)
//! - **Discovery**: SSDP search window and descriptor resolution
//! - **Reconciler**: Reuse or create accessories per receiver
//! - **Controller**: Characteristic hooks backed by an optimistic cache
//! - **Client**: HTTP control API
//! - **Protocol**: Control API paths, keys and value encodings

mod client;
mod config;
mod controller;
mod descriptor;
mod discovery;
mod error;
mod host;
mod platform;
mod property;
pub mod protocol;
mod reconciler;
mod types;

// Public exports
pub use client::NaimClient;
pub use config::PlatformConfig;
pub use controller::AccessoryController;
pub use descriptor::{DescriptorResolver, DeviceDescription};
pub use discovery::{Discovery, DiscoveryState, SearchHit, DEFAULT_SEARCH_TARGET, DEFAULT_WINDOW};
pub use error::{NaimError, Result};
pub use host::{
    AccessoryContext, AccessoryHost, AccessoryInformation, Characteristic, CharacteristicHandler,
    CharacteristicValue, HapContext, InputSource, PlatformAccessory, ServiceRef,
};
pub use platform::{NaimPlatform, PLATFORM_NAME, PLUGIN_NAME};
pub use property::{Fallback, ReadTicket, RemoteProperty, WriteTicket};
pub use reconciler::{AccessoryRegistry, Reconciled, Reconciler};
pub use types::{
    AccessoryId, Capability, Category, InputDescriptor, InputSourceType, MediaState, ReceiverDescriptor,
    ReceiverState, Role, VolumeLevel,
};
