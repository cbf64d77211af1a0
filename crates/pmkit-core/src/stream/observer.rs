//! Observer side of the push-based streams

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::Error;

/// Receiver of stream notifications.
///
/// A stream delivers any number of `on_next` calls followed by at most one
/// terminal `on_error` or `on_complete`.
pub trait Observer<T>: Send + Sync {
    fn on_next(&self, value: T);

    /// Default: log and drop. Sinks that must never see an error override this.
    fn on_error(&self, error: Error) {
        tracing::error!("Unhandled stream error: {}", error);
    }

    fn on_complete(&self) {}
}

/// Shared, type-erased observer
pub type ObserverRef<T> = Arc<dyn Observer<T>>;

type NextFn<T> = Box<dyn Fn(T) + Send + Sync>;
type ErrorFn = Box<dyn Fn(Error) + Send + Sync>;
type CompleteFn = Box<dyn Fn() + Send + Sync>;

/// Observer assembled from closures
pub struct Callbacks<T> {
    next: NextFn<T>,
    error: Option<ErrorFn>,
    complete: Option<CompleteFn>,
}

impl<T> Callbacks<T> {
    pub fn new(next: impl Fn(T) + Send + Sync + 'static) -> Self {
        Self {
            next: Box::new(next),
            error: None,
            complete: None,
        }
    }

    pub fn on_error(mut self, f: impl Fn(Error) + Send + Sync + 'static) -> Self {
        self.error = Some(Box::new(f));
        self
    }

    pub fn on_complete(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.complete = Some(Box::new(f));
        self
    }

    pub fn into_ref(self) -> ObserverRef<T>
    where
        T: 'static,
    {
        Arc::new(self)
    }
}

impl<T> Observer<T> for Callbacks<T> {
    fn on_next(&self, value: T) {
        (self.next)(value)
    }

    fn on_error(&self, error: Error) {
        match &self.error {
            Some(f) => f(error),
            None => tracing::error!("Unhandled stream error: {}", error),
        }
    }

    fn on_complete(&self) {
        if let Some(f) = &self.complete {
            f()
        }
    }
}

/// Observer that only reacts to values
pub fn from_fn<T: 'static>(f: impl Fn(T) + Send + Sync + 'static) -> ObserverRef<T> {
    Callbacks::new(f).into_ref()
}

/// Forwards to `inner` until the gate closes.
///
/// Every subscription made through [`Observable::subscribe`] is wrapped in
/// one of these; disposing the subscription closes the gate first, so a value
/// already in flight on another thread is not delivered afterwards.
///
/// [`Observable::subscribe`]: crate::stream::Observable::subscribe
pub(crate) struct Gated<T> {
    pub(crate) closed: Arc<AtomicBool>,
    pub(crate) inner: ObserverRef<T>,
}

impl<T> Gated<T> {
    fn is_open(&self) -> bool {
        !self.closed.load(Ordering::Acquire)
    }
}

impl<T> Observer<T> for Gated<T> {
    fn on_next(&self, value: T) {
        if self.is_open() {
            self.inner.on_next(value);
        }
    }

    fn on_error(&self, error: Error) {
        if self.is_open() {
            self.closed.store(true, Ordering::Release);
            self.inner.on_error(error);
        }
    }

    fn on_complete(&self) {
        if self.is_open() {
            self.closed.store(true, Ordering::Release);
            self.inner.on_complete();
        }
    }
}
