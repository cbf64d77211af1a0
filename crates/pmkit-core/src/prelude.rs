//! Prelude for common imports used throughout the masterknx crates

pub use crate::error::{Error, Result, ResultExt};
pub use crate::lifecycle::Lifecycle;
pub use crate::registry::Subscription;
pub use crate::stream::{Observable, Observer, ObserverRef};
pub use tracing::{debug, error, info, instrument, trace, warn};
