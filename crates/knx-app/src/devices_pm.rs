//! Presentation model of one room's device list

use std::sync::Arc;

use futures_util::stream;
use tokio::runtime::Handle;

use pmkit::{install, Action, Command, DiffByEquals, Model, PresentationModel, State};
use pmkit_core::prelude::*;
use pmkit_core::{BufferPolicy, Callbacks, SchedulerRef};

use crate::device::{ConnectionState, Device, DeviceType, Item, Page};
use crate::events::{enabled_count, merge_event};
use crate::navigation::Back;
use crate::repository::DeviceRepository;

/// Construction options, usually taken from the settings
#[derive(Clone)]
pub struct DevicesPmOptions {
    pub buffer: BufferPolicy,
    pub diff_async: bool,
    pub view_scheduler: Option<SchedulerRef>,
    pub computation_scheduler: Option<SchedulerRef>,
}

impl Default for DevicesPmOptions {
    fn default() -> Self {
        Self {
            buffer: BufferPolicy::Latest,
            diff_async: false,
            view_scheduler: None,
            computation_scheduler: None,
        }
    }
}

/// Device list of one [`Page`].
///
/// While bound, the list is rebuilt from the fetched devices and every
/// socket event. Rows changed by the user go through
/// [`item_changed`](Self::item_changed); only the latest write is kept
/// running.
pub struct DevicesPm<R> {
    pm: PresentationModel,
    page: Page,
    repository: Arc<R>,
    runtime: Handle,

    pub content: Command<Vec<Item>>,
    pub connection: Command<ConnectionState>,
    pub errors: Command<String>,
    pub enabled: State<usize>,

    pub item_changed: Action<Item>,
    pub back: Action<()>,
}

impl<R: DeviceRepository + Sync + 'static> DevicesPm<R> {
    pub fn new(page: Page, repository: Arc<R>, runtime: Handle, options: DevicesPmOptions) -> Arc<Self> {
        let mut builder = PresentationModel::builder()
            .name(format!("devices.{}", page.as_str()))
            .navigational();
        if let Some(view) = options.view_scheduler {
            builder = builder.view_scheduler(view);
        }
        if let Some(computation) = options.computation_scheduler {
            builder = builder.computation_scheduler(computation);
        }
        let pm = builder.build();

        let content = Command::with_policy(&pm, options.buffer);
        let connection = Command::with_policy(&pm, options.buffer);
        let errors = Command::with_policy(&pm, BufferPolicy::Unbounded);
        let enabled = State::builder(&pm)
            .diff(DiffByEquals {
                compute_async: options.diff_async,
            })
            .build();

        let item_changed = {
            let repository = repository.clone();
            let runtime = runtime.clone();
            let errors = errors.clone();
            Action::with_chain(&pm, move |items| {
                items.switch_map(move |item: Item| {
                    write_item(repository.clone(), runtime.clone(), errors.clone(), item)
                })
            })
        };

        let back = match pm.navigation_messages().cloned() {
            Some(navigation) => Action::with_chain(&pm, move |clicks| {
                clicks.map(move |()| navigation.accept(Arc::new(Back)))
            }),
            None => Action::new(),
        };

        install(Self {
            pm,
            page,
            repository,
            runtime,
            content,
            connection,
            errors,
            enabled,
            item_changed,
            back,
        })
    }

    pub fn page(&self) -> Page {
        self.page
    }

    fn bind_content(&self) {
        let repository = self.repository.clone();
        let fetch = Observable::from_stream(self.runtime.clone(), move || {
            let repository = repository.clone();
            stream::once(async move { repository.devices().await })
        });

        let page = self.page;
        let events = self.repository.events();
        let content = self.content.clone();
        let enabled = self.enabled.clone();
        let errors = self.errors.clone();
        let name = self.pm.name().to_string();

        let subscription = fetch
            .switch_map(move |devices: Vec<Device>| {
                events
                    .clone()
                    .map(move |event| merge_event(&devices, page, &event))
            })
            .subscribe(
                Callbacks::new(move |items: Vec<Item>| {
                    enabled.accept(enabled_count(&items));
                    content.accept(items);
                })
                .on_error(move |e| {
                    error!(model = %name, "device list failed: {}", e);
                    errors.accept(e.to_string());
                })
                .into_ref(),
            );
        self.pm.until_unbind(subscription);
    }

    fn bind_connection(&self) {
        let connection = self.connection.clone();
        let subscription = self.repository.connection_status().subscribe_fn(move |state| {
            debug!(?state, "connection status");
            connection.accept(state);
        });
        self.pm.until_unbind(subscription);
    }
}

impl<R: DeviceRepository + Sync + 'static> Model for DevicesPm<R> {
    fn pm(&self) -> &PresentationModel {
        &self.pm
    }

    fn on_bind(&self) {
        self.bind_content();
        self.bind_connection();
    }
}

/// Write one changed row; failures are reported on `errors` and end the
/// write without a value.
fn write_item<R: DeviceRepository + Sync + 'static>(
    repository: Arc<R>,
    runtime: Handle,
    errors: Command<String>,
    item: Item,
) -> Observable<i64> {
    Observable::from_stream(runtime, move || {
        let repository = repository.clone();
        let errors = errors.clone();
        let item = item.clone();
        stream::once(async move {
            let id = item.device.id;
            let result = match item.device.device_type {
                DeviceType::Switch => repository.set_digital_value(id, item.is_enabled).await,
                DeviceType::Analog => repository.set_analog_value(id, item.device.value).await,
                DeviceType::AnalogWithoutDimming => {
                    repository
                        .toggle_analog_without_dimming(id, item.is_enabled)
                        .await
                }
            };
            if let Err(e) = &result {
                warn!(id, "device write failed: {}", e);
                errors.accept(e.to_string());
            }
            Ok::<_, Error>(id)
        })
    })
}

#[cfg(test)]
mod tests;
