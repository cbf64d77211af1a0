//! # pmkit-core - Lifecycle and Stream Primitives
//!
//! Foundation crate for the presentation-model engine. Provides the lifecycle
//! state machine table, error handling, logging setup, subscriptions and
//! lifecycle-scoped registries, push-based streams and the execution
//! contexts they deliver on.
//!
//! This crate has **zero internal dependencies**.
//!
//! ## Public API
//!
//! ### Lifecycle (`lifecycle`)
//! - [`Lifecycle`] - Binding phase of a model (Created, Binded, Resumed, ...)
//!
//! ### Error Handling (`error`)
//! - [`Error`] - Error enum with `fatal` vs `recoverable` classification
//! - [`Result`] - Type alias for `std::result::Result<T, Error>`
//! - [`ResultExt`] - Extension trait for adding error context
//!
//! ### Subscriptions (`registry`)
//! - [`Subscription`] - Idempotent teardown handle
//! - [`Registry`], [`Scope`] - Subscriptions released together at a lifecycle boundary
//!
//! ### Streams (`stream`)
//! - [`Observable`] - Cold stream description with operators
//! - [`Observer`], [`Callbacks`] - Notification receivers
//! - [`PublishRelay`], [`BehaviorRelay`] - Hot multicast entry points
//! - [`Serialized`] - Ordered emitter for multi-producer delivery
//!
//! ### Idle Buffering (`idle`)
//! - [`IdleBuffer`], [`IdleGate`], [`BufferPolicy`] - Hold values while the consumer is idle
//!
//! ### Schedulers (`scheduler`)
//! - [`Scheduler`] - Execution context
//! - [`view_queue()`] - Host-drained view queue
//! - [`SerialExecutor`] - Sequential computation context
//!
//! ## Prelude
//!
//! Import commonly used types with:
//! ```rust
//! use pmkit_core::prelude::*;
//! ```

pub mod error;
pub mod idle;
pub mod lifecycle;
pub mod logging;
pub mod prelude;
pub mod registry;
pub mod scheduler;
pub mod stream;
pub mod sync;

pub use error::{Error, Result, ResultExt};
pub use idle::{BufferPolicy, IdleBuffer, IdleGate};
pub use lifecycle::Lifecycle;
pub use registry::{Registry, Scope, Subscription};
pub use scheduler::{
    immediate, view_queue, Immediate, Job, Scheduler, SchedulerRef, SerialExecutor,
    ViewReceiver, ViewScheduler,
};
pub use stream::{
    from_fn, BehaviorRelay, Callbacks, Observable, Observer, ObserverRef, PublishRelay,
    Serialized, Signal, Value,
};
