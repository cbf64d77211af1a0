//! Access to the home server's devices

use pmkit_core::prelude::*;

use crate::device::{ConnectionState, Device, EventResponse};

/// Device operations of the home server.
///
/// Writes only report success; the resulting value change arrives later on
/// [`events`](LocalDeviceRepository::events).
#[trait_variant::make(DeviceRepository: Send)]
pub trait LocalDeviceRepository {
    /// All devices with their last known value
    async fn devices(&self) -> Result<Vec<Device>>;

    async fn toggle_device(&self, id: i64) -> Result<()>;

    async fn set_digital_value(&self, id: i64, enable: bool) -> Result<()>;

    async fn set_analog_value(&self, id: i64, value: f64) -> Result<()>;

    /// Drive an analog output as on/off: 100 when enabled, 0 otherwise
    async fn toggle_analog_without_dimming(&self, id: i64, enable: bool) -> Result<()>;

    /// Socket connection state; replays the current one
    fn connection_status(&self) -> Observable<ConnectionState>;

    /// Value change events; replays the latest one
    fn events(&self) -> Observable<EventResponse>;
}
