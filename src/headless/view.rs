//! The headless stand-in for the device screen

use std::sync::{Arc, Mutex};

use tokio::runtime::Handle;

use knx_app::{DevicesPm, DevicesPmOptions, InMemoryRepository, Item, Page};
use pmkit::PmView;
use pmkit_core::prelude::*;
use pmkit_core::sync::lock;

use super::HeadlessEvent;

pub type Screen = DevicesPm<InMemoryRepository>;

/// What every incarnation of the view shares
pub struct ViewContext {
    pub page: Page,
    pub repository: Arc<InMemoryRepository>,
    pub runtime: Handle,
    pub options: DevicesPmOptions,
    /// Last rendered rows, used to resolve stdin row commands
    pub rendered: Mutex<Vec<Item>>,
}

impl ViewContext {
    pub fn item(&self, id: i64) -> Option<Item> {
        lock(&self.rendered)
            .iter()
            .find(|item| item.device.id == id)
            .cloned()
    }
}

/// Renders to stdout as NDJSON
pub struct HeadlessView {
    context: Arc<ViewContext>,
}

impl HeadlessView {
    pub fn new(context: Arc<ViewContext>) -> Self {
        Self { context }
    }
}

impl PmView for HeadlessView {
    type Pm = Screen;

    fn provide_presentation_model(&self) -> Arc<Screen> {
        info!(page = self.context.page.as_str(), "creating device list model");
        DevicesPm::new(
            self.context.page,
            self.context.repository.clone(),
            self.context.runtime.clone(),
            self.context.options.clone(),
        )
    }

    fn on_bind_presentation_model(&self, pm: &Arc<Screen>) {
        let context = self.context.clone();
        pm.content.bind_to(move |items: Vec<Item>| {
            *lock(&context.rendered) = items.clone();
            HeadlessEvent::content(context.page, items).emit();
        });
        pm.enabled
            .bind_to(|count| HeadlessEvent::enabled(count).emit());
        pm.connection
            .bind_to(|state| HeadlessEvent::connection(state).emit());
        pm.errors
            .bind_to(|message| HeadlessEvent::error(message, false).emit());
    }

    fn on_unbind_presentation_model(&self) {
        debug!("view unbound");
    }
}
