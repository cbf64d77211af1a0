//! Error types with protocol-violation vs runtime classification

use std::path::PathBuf;
use thiserror::Error;

use crate::lifecycle::Lifecycle;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Error types organized by layer/domain
#[derive(Debug, Error)]
pub enum Error {
    // ─────────────────────────────────────────────────────────────
    // Common/Infrastructure Errors
    // ─────────────────────────────────────────────────────────────
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    // ─────────────────────────────────────────────────────────────
    // Lifecycle Protocol Errors
    // ─────────────────────────────────────────────────────────────
    #[error("Illegal lifecycle transition: {} -> {to}", describe(.from))]
    IllegalTransition {
        from: Option<Lifecycle>,
        to: Lifecycle,
    },

    #[error("Presentation model can't be attached to itself")]
    AttachToSelf,

    #[error("Presentation model can't be a child more than once (already {})", describe(.state))]
    AlreadyAttached { state: Option<Lifecycle> },

    #[error("Presentation model can't be attached to an already destroyed parent")]
    AttachToDestroyed,

    // ─────────────────────────────────────────────────────────────
    // Slot Errors
    // ─────────────────────────────────────────────────────────────
    #[error("The State has no value yet; use value_or_none() or pass an initial value")]
    StateUninitialized,

    #[error("Upstream error: {message}")]
    Upstream { message: String },

    // ─────────────────────────────────────────────────────────────
    // Channel/Scheduling Errors
    // ─────────────────────────────────────────────────────────────
    #[error("Channel send error: {message}")]
    ChannelSend { message: String },

    #[error("Channel closed unexpectedly")]
    ChannelClosed,

    // ─────────────────────────────────────────────────────────────
    // Configuration Errors
    // ─────────────────────────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    #[error("Invalid configuration: {message}")]
    ConfigInvalid { message: String },

    // ─────────────────────────────────────────────────────────────
    // Application Errors
    // ─────────────────────────────────────────────────────────────
    #[error("Repository error: {message}")]
    Repository { message: String },

    #[error("Unknown device: {id}")]
    UnknownDevice { id: i64 },

    #[error("Host error: {message}")]
    Host { message: String },
}

fn describe(state: &Option<Lifecycle>) -> String {
    match state {
        Some(state) => state.to_string(),
        None => "<none>".to_string(),
    }
}

// ─────────────────────────────────────────────────────────────────
// Convenience Constructors
// ─────────────────────────────────────────────────────────────────

impl Error {
    pub fn illegal_transition(from: Option<Lifecycle>, to: Lifecycle) -> Self {
        Self::IllegalTransition { from, to }
    }

    pub fn upstream(message: impl Into<String>) -> Self {
        Self::Upstream {
            message: message.into(),
        }
    }

    pub fn channel_send(message: impl Into<String>) -> Self {
        Self::ChannelSend {
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn config_invalid(message: impl Into<String>) -> Self {
        Self::ConfigInvalid {
            message: message.into(),
        }
    }

    pub fn repository(message: impl Into<String>) -> Self {
        Self::Repository {
            message: message.into(),
        }
    }

    pub fn host(message: impl Into<String>) -> Self {
        Self::Host {
            message: message.into(),
        }
    }

    /// Protocol violations: misuse of the lifecycle or slot contracts.
    ///
    /// These indicate an integration error and are never retried.
    pub fn is_protocol_violation(&self) -> bool {
        matches!(
            self,
            Error::IllegalTransition { .. }
                | Error::AttachToSelf
                | Error::AlreadyAttached { .. }
                | Error::AttachToDestroyed
                | Error::StateUninitialized
        )
    }

    /// Check if this is a recoverable error
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::Upstream { .. }
                | Error::ChannelSend { .. }
                | Error::Repository { .. }
                | Error::UnknownDevice { .. }
        )
    }

    /// Check if this error should stop the host
    pub fn is_fatal(&self) -> bool {
        self.is_protocol_violation()
            || matches!(
                self,
                Error::ChannelClosed | Error::ConfigInvalid { .. } | Error::Host { .. }
            )
    }
}

// ─────────────────────────────────────────────────────────────────
// Error Context Extensions
// ─────────────────────────────────────────────────────────────────

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context with a closure (lazy evaluation)
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E: Into<Error>> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| {
            let err = e.into();
            tracing::error!("{}: {:?}", context.into(), err);
            err
        })
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| {
            let err = e.into();
            tracing::error!("{}: {:?}", f(), err);
            err
        })
    }
}
