//! Socket events applied to the device list

use crate::device::{Device, EventResponse, Item, Page};

/// Rows for `page`, with the device named by `event` updated to the event's
/// value.
///
/// Other devices keep the value they were fetched with. An event for a
/// device on another page, or for an unknown id, leaves the rows unchanged.
pub fn merge_event(devices: &[Device], page: Page, event: &EventResponse) -> Vec<Item> {
    devices
        .iter()
        .filter(|device| device.page == page)
        .map(|device| {
            let mut device = device.clone();
            if device.id == event.data.id {
                device.value = event.value();
            }
            Item::new(device)
        })
        .collect()
}

/// Number of enabled rows
pub fn enabled_count(items: &[Item]) -> usize {
    items.iter().filter(|item| item.is_enabled).count()
}
