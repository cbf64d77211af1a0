//! # knx-app - Home Automation Device Screens
//!
//! Device list presentation models for the KNX home server, built on
//! `pmkit`.
//!
//! ## Public API
//!
//! - [`Device`], [`Item`], [`EventResponse`], [`ConnectionState`] - Domain types
//! - [`DeviceRepository`] - Home server operations; [`InMemoryRepository`] for
//!   local runs
//! - [`DevicesPm`] - Device list of one room
//! - [`Settings`], [`load_settings`] - `.masterknx/config.toml`

pub mod config;
pub mod device;
pub mod devices_pm;
pub mod events;
pub mod memory;
pub mod navigation;
pub mod repository;

pub use config::{load_settings, Settings};
pub use device::{ConnectionState, Device, DeviceKind, DeviceType, EventData, EventResponse, Item, Page};
pub use devices_pm::{DevicesPm, DevicesPmOptions};
pub use events::merge_event;
pub use memory::{demo_devices, InMemoryRepository};
pub use navigation::Back;
pub use repository::{DeviceRepository, LocalDeviceRepository};
