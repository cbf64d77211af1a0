//! # pmkit - Presentation Models
//!
//! Screen-level models whose reactive slots follow the binding lifecycle of
//! the view hosting them. Built on the primitives of `pmkit-core`.
//!
//! ## Public API
//!
//! ### Models (`model`)
//! - [`PresentationModel`] - Lifecycle engine, scoped registries, attachment
//! - [`Model`] - Lifecycle hooks, registered with [`install`]
//!
//! ### Slots
//! - [`State`] - Current value with change filtering ([`DiffStrategy`])
//! - [`Action`] - Intents from the view
//! - [`Command`] - One-off effects, held while the view is idle
//!
//! ### Hosts (`delegate`)
//! - [`PmView`] - View contract
//! - [`HostDelegate`], [`CommonDelegate`] - Host callbacks to lifecycle states
//! - [`PmStore`] - Models retained across host recreation
//!
//! ### Navigation and dialogs
//! - [`NavigationMessage`], [`NavigationDispatcher`] - Messages to the host
//! - [`DialogControl`] - Child model driving a dialog

pub mod action;
pub mod command;
pub mod delegate;
pub mod dialog;
pub mod model;
pub mod navigation;
pub mod state;

pub use action::Action;
pub use command::Command;
pub use delegate::{
    CommonDelegate, HostDelegate, HostStatus, PmStore, PmView, RetainMode, SavedState, PM_KEY,
};
pub use dialog::{dialog_control, DialogControl, DialogHandle, Display};
pub use model::{install, Model, PresentationModel, PresentationModelBuilder};
pub use navigation::{
    downcast, NavigationDispatcher, NavigationMessage, NavigationMessageHandler,
    NavigationMessageRef,
};
pub use state::{DiffByEquals, DiffByIdentity, DiffStrategy, State, StateBuilder};
