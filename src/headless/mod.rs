//! Headless host - NDJSON event output
//!
//! Plays the host role for the device list model without a UI: stdin lines
//! drive the host callbacks and user intents, and everything the view would
//! render is written to stdout as one JSON object per line.
//!
//! # Example Output
//!
//! ```json
//! {"event":"lifecycle","model":"devices.lounge","state":"resumed","timestamp":1704700001000}
//! {"event":"connection","state":"connected","timestamp":1704700002000}
//! {"event":"navigation","message":"back","timestamp":1704700003000}
//! ```

pub mod runner;
pub mod view;

use chrono::Utc;
use serde::Serialize;
use std::io::{self, Write};
use tracing::error;

use knx_app::{ConnectionState, Item, Page};
use pmkit_core::Lifecycle;

/// Events emitted in headless mode
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum HeadlessEvent {
    /// Host created (or recreated after a configuration change)
    HostCreated {
        page: Page,
        restored: bool,
        timestamp: i64,
    },

    /// Model lifecycle transition
    Lifecycle {
        model: String,
        state: String,
        timestamp: i64,
    },

    /// Device rows as rendered
    Content {
        page: Page,
        items: Vec<Item>,
        timestamp: i64,
    },

    /// Number of enabled rows changed
    Enabled { count: usize, timestamp: i64 },

    /// Socket connection status
    Connection {
        state: ConnectionState,
        timestamp: i64,
    },

    /// Navigation message handled by the host
    Navigation { message: String, timestamp: i64 },

    /// Error occurred
    Error {
        message: String,
        fatal: bool,
        timestamp: i64,
    },
}

impl HeadlessEvent {
    /// Emit this event to stdout as JSON
    pub fn emit(&self) {
        let json = match serde_json::to_string(self) {
            Ok(json) => json,
            Err(e) => {
                error!("Failed to serialize headless event: {}", e);
                return;
            }
        };

        // NDJSON: one event per line, flushed immediately
        let mut stdout = io::stdout().lock();
        if let Err(e) = writeln!(stdout, "{}", json) {
            error!("Failed to write headless event to stdout: {}", e);
            return;
        }
        if let Err(e) = stdout.flush() {
            error!("Failed to flush headless stdout: {}", e);
        }
    }

    fn now() -> i64 {
        Utc::now().timestamp_millis()
    }

    // ─────────────────────────────────────────────────────────
    // Convenience constructors
    // ─────────────────────────────────────────────────────────

    pub fn host_created(page: Page, restored: bool) -> Self {
        Self::HostCreated {
            page,
            restored,
            timestamp: Self::now(),
        }
    }

    pub fn lifecycle(model: &str, state: Lifecycle) -> Self {
        Self::Lifecycle {
            model: model.to_string(),
            state: state.as_str().to_string(),
            timestamp: Self::now(),
        }
    }

    pub fn content(page: Page, items: Vec<Item>) -> Self {
        Self::Content {
            page,
            items,
            timestamp: Self::now(),
        }
    }

    pub fn enabled(count: usize) -> Self {
        Self::Enabled {
            count,
            timestamp: Self::now(),
        }
    }

    pub fn connection(state: ConnectionState) -> Self {
        Self::Connection {
            state,
            timestamp: Self::now(),
        }
    }

    pub fn navigation(message: impl Into<String>) -> Self {
        Self::Navigation {
            message: message.into(),
            timestamp: Self::now(),
        }
    }

    pub fn error(message: impl Into<String>, fatal: bool) -> Self {
        Self::Error {
            message: message.into(),
            fatal,
            timestamp: Self::now(),
        }
    }
}
