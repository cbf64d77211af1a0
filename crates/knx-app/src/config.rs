//! Settings parser for .masterknx/config.toml

use std::path::Path;

use serde::{Deserialize, Serialize};

use pmkit::RetainMode;
use pmkit_core::prelude::*;
use pmkit_core::BufferPolicy;

use crate::device::{Device, Page};

const CONFIG_FILENAME: &str = "config.toml";
const CONFIG_DIR: &str = ".masterknx";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub host: HostSettings,

    #[serde(default)]
    pub commands: CommandSettings,

    #[serde(default)]
    pub state: StateSettings,

    #[serde(default)]
    pub app: AppSettings,

    /// Seed devices for the in-memory repository
    #[serde(default)]
    pub devices: Vec<Device>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HostSettings {
    #[serde(default)]
    pub retain_mode: RetainMode,
}

/// How commands hold values while the view is paused
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BufferKind {
    #[default]
    Latest,
    Bounded,
    Unbounded,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandSettings {
    #[serde(default)]
    pub buffer: BufferKind,

    /// Only used with `buffer = "bounded"`
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
}

fn default_buffer_size() -> usize {
    16
}

impl Default for CommandSettings {
    fn default() -> Self {
        Self {
            buffer: BufferKind::default(),
            buffer_size: default_buffer_size(),
        }
    }
}

impl CommandSettings {
    pub fn policy(&self) -> BufferPolicy {
        match self.buffer {
            BufferKind::Latest => BufferPolicy::Latest,
            BufferKind::Bounded => BufferPolicy::Bounded(self.buffer_size),
            BufferKind::Unbounded => BufferPolicy::Unbounded,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateSettings {
    /// Compare state values on the computation scheduler
    #[serde(default)]
    pub diff_async: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppSettings {
    #[serde(default)]
    pub page: Page,
}

/// Load settings from `<project>/.masterknx/config.toml`.
///
/// A missing file yields the defaults; an unreadable or malformed one is an
/// error.
pub fn load_settings(project_path: &Path) -> Result<Settings> {
    let config_path = project_path.join(CONFIG_DIR).join(CONFIG_FILENAME);

    if !config_path.exists() {
        debug!("No config file at {:?}, using defaults", config_path);
        return Ok(Settings::default());
    }

    let content = std::fs::read_to_string(&config_path)?;
    let settings: Settings = toml::from_str(&content).map_err(|e| {
        Error::config_invalid(format!("Failed to parse {}: {}", config_path.display(), e))
    })?;
    debug!("Loaded settings from {:?}", config_path);
    Ok(settings)
}
