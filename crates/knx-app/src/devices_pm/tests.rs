use super::*;
use crate::device::{DeviceKind, EventResponse};
use crate::memory::InMemoryRepository;
use pmkit::{downcast, NavigationMessageRef};
use std::sync::Mutex;
use std::time::Duration;

fn device(id: i64, device_type: DeviceType, page: Page, value: f64) -> Device {
    Device {
        id,
        device_type,
        name: format!("device {id}"),
        page,
        kind: DeviceKind::Light,
        value,
    }
}

fn repository() -> Arc<InMemoryRepository> {
    Arc::new(InMemoryRepository::new(vec![
        device(1, DeviceType::Switch, Page::Lounge, 0.0),
        device(2, DeviceType::Analog, Page::Lounge, 30.0),
        device(3, DeviceType::AnalogWithoutDimming, Page::Lounge, 0.0),
        device(4, DeviceType::Switch, Page::MasterBedroom, 1.0),
    ]))
}

fn recorder<T: pmkit_core::Value>(
    observable: Observable<T>,
) -> (Arc<Mutex<Vec<T>>>, Subscription) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let s = seen.clone();
    let sub = observable.subscribe_fn(move |v| s.lock().unwrap().push(v));
    (seen, sub)
}

async fn eventually(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while !condition() {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("condition not reached in time");
}

fn advance(pm: &PresentationModel, steps: &[Lifecycle]) {
    for step in steps {
        pm.accept_lifecycle(*step).unwrap();
    }
}

fn last_items(seen: &Arc<Mutex<Vec<Vec<Item>>>>) -> Vec<Item> {
    seen.lock().unwrap().last().cloned().unwrap_or_default()
}

async fn resumed_pm(
    repository: Arc<InMemoryRepository>,
) -> (Arc<DevicesPm<InMemoryRepository>>, Arc<Mutex<Vec<Vec<Item>>>>, Subscription) {
    let pm = DevicesPm::new(
        Page::Lounge,
        repository,
        Handle::current(),
        DevicesPmOptions::default(),
    );
    let (content, sub) = recorder(pm.content.observable());
    advance(
        pm.pm(),
        &[Lifecycle::Created, Lifecycle::Binded, Lifecycle::Resumed],
    );
    eventually(|| !content.lock().unwrap().is_empty()).await;
    (pm, content, sub)
}

#[tokio::test]
async fn test_content_lists_page_devices() {
    let (pm, content, _sub) = resumed_pm(repository()).await;

    let ids: Vec<i64> = last_items(&content).iter().map(|i| i.device.id).collect();
    assert_eq!(ids, vec![1, 2, 3]);
    assert_eq!(pm.enabled.value().unwrap(), 1);
}

#[tokio::test]
async fn test_socket_event_updates_row() {
    let repository = repository();
    let (pm, content, _sub) = resumed_pm(repository.clone()).await;

    repository.publish_event(EventResponse::new(1, "1"));

    let items = last_items(&content);
    assert!(items[0].is_enabled);
    assert_eq!(items[0].device.value, 1.0);
    assert_eq!(pm.enabled.value().unwrap(), 2);
}

#[tokio::test]
async fn test_item_changed_writes_by_type() {
    let repository = repository();
    let (pm, content, _sub) = resumed_pm(repository.clone()).await;

    let fan = last_items(&content)[2].clone();
    pm.item_changed.accept(fan.toggled());
    eventually(|| last_items(&content)[2].device.value == 100.0).await;

    let dimmer = last_items(&content)[1].clone();
    pm.item_changed.accept(dimmer.with_value(55.0));
    eventually(|| last_items(&content)[1].device.value == 55.0).await;

    let switch = last_items(&content)[0].clone();
    pm.item_changed.accept(switch.toggled());
    eventually(|| last_items(&content)[0].is_enabled).await;
}

#[tokio::test]
async fn test_paused_view_gets_latest_list_on_resume() {
    let repository = repository();
    let (pm, content, _sub) = resumed_pm(repository.clone()).await;
    let before = content.lock().unwrap().len();

    pm.pm().accept_lifecycle(Lifecycle::Paused).unwrap();
    repository.publish_event(EventResponse::new(2, "10"));
    repository.publish_event(EventResponse::new(2, "20"));
    assert_eq!(content.lock().unwrap().len(), before);

    pm.pm().accept_lifecycle(Lifecycle::Resumed).unwrap();

    let seen = content.lock().unwrap();
    assert_eq!(seen.len(), before + 1);
    assert_eq!(seen[before][1].device.value, 20.0);
}

#[tokio::test]
async fn test_unbound_model_stops_listening() {
    let repository = repository();
    let (pm, content, _sub) = resumed_pm(repository.clone()).await;

    advance(pm.pm(), &[Lifecycle::Paused, Lifecycle::Unbinded]);
    let pending = pm.content.pending();
    repository.publish_event(EventResponse::new(2, "99"));

    assert_eq!(pm.content.pending(), pending);
    assert!(content
        .lock()
        .unwrap()
        .iter()
        .all(|items| items[1].device.value != 99.0));
}

#[tokio::test]
async fn test_connection_status_forwarded() {
    let repository = repository();
    let (pm, _content, _sub) = resumed_pm(repository.clone()).await;
    let (states, _states_sub) = recorder(pm.connection.observable());

    repository.set_connection(ConnectionState::Connecting);
    repository.set_connection(ConnectionState::Connected);

    assert_eq!(
        *states.lock().unwrap(),
        vec![ConnectionState::Connecting, ConnectionState::Connected]
    );
}

#[tokio::test]
async fn test_unknown_device_reported() {
    let (pm, _content, _sub) = resumed_pm(repository()).await;
    let (errors, _errors_sub) = recorder(pm.errors.observable());

    pm.item_changed
        .accept(Item::new(device(42, DeviceType::Switch, Page::Lounge, 0.0)));

    eventually(|| !errors.lock().unwrap().is_empty()).await;
    assert!(errors.lock().unwrap()[0].contains("42"));
}

struct Unreachable;

impl DeviceRepository for Unreachable {
    async fn devices(&self) -> pmkit_core::Result<Vec<Device>> {
        Err(Error::repository("connection refused"))
    }

    async fn toggle_device(&self, _id: i64) -> pmkit_core::Result<()> {
        Err(Error::repository("connection refused"))
    }

    async fn set_digital_value(&self, _id: i64, _enable: bool) -> pmkit_core::Result<()> {
        Err(Error::repository("connection refused"))
    }

    async fn set_analog_value(&self, _id: i64, _value: f64) -> pmkit_core::Result<()> {
        Err(Error::repository("connection refused"))
    }

    async fn toggle_analog_without_dimming(
        &self,
        _id: i64,
        _enable: bool,
    ) -> pmkit_core::Result<()> {
        Err(Error::repository("connection refused"))
    }

    fn connection_status(&self) -> Observable<ConnectionState> {
        Observable::just(vec![ConnectionState::Disconnected])
    }

    fn events(&self) -> Observable<crate::device::EventResponse> {
        Observable::never()
    }
}

#[tokio::test]
async fn test_fetch_failure_reported() {
    let pm = DevicesPm::new(
        Page::Lounge,
        Arc::new(Unreachable),
        Handle::current(),
        DevicesPmOptions::default(),
    );
    let (errors, _sub) = recorder(pm.errors.observable());
    advance(
        pm.pm(),
        &[Lifecycle::Created, Lifecycle::Binded, Lifecycle::Resumed],
    );

    eventually(|| !errors.lock().unwrap().is_empty()).await;
    assert!(errors.lock().unwrap()[0].contains("connection refused"));
    assert!(!pm.enabled.has_value());
}

#[tokio::test]
async fn test_back_sends_navigation_message() {
    let (pm, _content, _sub) = resumed_pm(repository()).await;
    let (messages, _nav_sub) = recorder::<NavigationMessageRef>(
        pm.pm().navigation_messages().unwrap().observable(),
    );

    pm.back.accept(());

    let messages = messages.lock().unwrap();
    assert_eq!(messages.len(), 1);
    assert!(downcast::<Back>(messages[0].as_ref()).is_some());
}
