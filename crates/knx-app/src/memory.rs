//! In-memory device repository

use std::sync::Mutex;

use pmkit_core::prelude::*;
use pmkit_core::sync::lock;
use pmkit_core::BehaviorRelay;

use crate::device::{ConnectionState, Device, DeviceKind, DeviceType, EventResponse, Page};
use crate::repository::DeviceRepository;

/// Repository holding devices in memory.
///
/// Each write updates the stored value and publishes the event the home
/// server would echo back on its socket.
pub struct InMemoryRepository {
    devices: Mutex<Vec<Device>>,
    connection: BehaviorRelay<ConnectionState>,
    events: BehaviorRelay<EventResponse>,
}

impl InMemoryRepository {
    pub fn new(devices: Vec<Device>) -> Self {
        Self {
            devices: Mutex::new(devices),
            connection: BehaviorRelay::with_value(ConnectionState::default()),
            events: BehaviorRelay::with_value(EventResponse::default()),
        }
    }

    /// Feed a socket event, as the socket reader does
    pub fn publish_event(&self, event: EventResponse) {
        {
            let mut devices = lock(&self.devices);
            if let Some(device) = devices.iter_mut().find(|d| d.id == event.data.id) {
                device.value = event.value();
            }
        }
        trace!(id = event.data.id, "socket event");
        self.events.accept(event);
    }

    pub fn set_connection(&self, state: ConnectionState) {
        debug!(?state, "connection status");
        self.connection.accept(state);
    }

    fn write(&self, id: i64, value: f64) -> Result<()> {
        if !lock(&self.devices).iter().any(|d| d.id == id) {
            return Err(Error::UnknownDevice { id });
        }
        self.publish_event(EventResponse::new(id, value.to_string()));
        Ok(())
    }

    fn current(&self, id: i64) -> Result<Device> {
        lock(&self.devices)
            .iter()
            .find(|d| d.id == id)
            .cloned()
            .ok_or(Error::UnknownDevice { id })
    }
}

/// Devices used when no `[[devices]]` are configured
pub fn demo_devices() -> Vec<Device> {
    let device = |id, device_type, name: &str, page, kind, value| Device {
        id,
        device_type,
        name: name.to_string(),
        page,
        kind,
        value,
    };
    vec![
        device(1, DeviceType::Switch, "Ceiling light", Page::MasterBedroom, DeviceKind::Light, 0.0),
        device(2, DeviceType::Analog, "Bedside lamp", Page::MasterBedroom, DeviceKind::Light, 40.0),
        device(3, DeviceType::AnalogWithoutDimming, "Curtains", Page::MasterBedroom, DeviceKind::Curtain, 0.0),
        device(4, DeviceType::Switch, "Floor lamp", Page::Lounge, DeviceKind::Light, 1.0),
        device(5, DeviceType::Analog, "Spotlights", Page::Lounge, DeviceKind::Light, 0.0),
        device(6, DeviceType::Switch, "TV socket", Page::Lounge, DeviceKind::Socket, 0.0),
        device(7, DeviceType::AnalogWithoutDimming, "Air conditioner", Page::Lounge, DeviceKind::Climate, 0.0),
    ]
}

impl DeviceRepository for InMemoryRepository {
    async fn devices(&self) -> Result<Vec<Device>> {
        Ok(lock(&self.devices).clone())
    }

    async fn toggle_device(&self, id: i64) -> Result<()> {
        let device = self.current(id)?;
        let value = if device.value > 0.0 { 0.0 } else { 1.0 };
        self.write(id, value)
    }

    async fn set_digital_value(&self, id: i64, enable: bool) -> Result<()> {
        self.write(id, if enable { 1.0 } else { 0.0 })
    }

    async fn set_analog_value(&self, id: i64, value: f64) -> Result<()> {
        self.write(id, value)
    }

    async fn toggle_analog_without_dimming(&self, id: i64, enable: bool) -> Result<()> {
        self.write(id, if enable { 100.0 } else { 0.0 })
    }

    fn connection_status(&self) -> Observable<ConnectionState> {
        self.connection.observable()
    }

    fn events(&self) -> Observable<EventResponse> {
        self.events.observable()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn repository() -> InMemoryRepository {
        InMemoryRepository::new(vec![Device {
            id: 5,
            device_type: DeviceType::AnalogWithoutDimming,
            name: "Fan".to_string(),
            page: Page::Lounge,
            kind: DeviceKind::Climate,
            value: 0.0,
        }])
    }

    fn record(repository: &InMemoryRepository) -> (Arc<Mutex<Vec<EventResponse>>>, Subscription) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = seen.clone();
        let sub = repository
            .events()
            .subscribe_fn(move |e| s.lock().unwrap().push(e));
        (seen, sub)
    }

    #[tokio::test]
    async fn test_write_publishes_event() {
        let repository = repository();
        let (seen, _sub) = record(&repository);

        repository.toggle_analog_without_dimming(5, true).await.unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[1].data.id, 5);
        assert_eq!(seen[1].value(), 100.0);
        drop(seen);
        assert_eq!(repository.devices().await.unwrap()[0].value, 100.0);
    }

    #[tokio::test]
    async fn test_toggle_device_flips_value() {
        let repository = repository();

        repository.toggle_device(5).await.unwrap();
        assert_eq!(repository.devices().await.unwrap()[0].value, 1.0);

        repository.toggle_device(5).await.unwrap();
        assert_eq!(repository.devices().await.unwrap()[0].value, 0.0);
    }

    #[tokio::test]
    async fn test_unknown_device() {
        let repository = repository();

        let err = repository.set_analog_value(99, 1.0).await.unwrap_err();
        assert!(matches!(err, Error::UnknownDevice { id: 99 }));
    }

    #[test]
    fn test_demo_devices_cover_both_pages() {
        let devices = demo_devices();
        for page in Page::ALL {
            assert!(devices.iter().any(|d| d.page == page));
        }
        let mut ids: Vec<i64> = devices.iter().map(|d| d.id).collect();
        ids.dedup();
        assert_eq!(ids.len(), devices.len());
    }

    #[test]
    fn test_connection_replays_current() {
        let repository = repository();
        repository.set_connection(ConnectionState::Connecting);

        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = seen.clone();
        let _sub = repository
            .connection_status()
            .subscribe_fn(move |c| s.lock().unwrap().push(c));
        repository.set_connection(ConnectionState::Connected);

        assert_eq!(
            *seen.lock().unwrap(),
            vec![ConnectionState::Connecting, ConnectionState::Connected]
        );
    }
}
