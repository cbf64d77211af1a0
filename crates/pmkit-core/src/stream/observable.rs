//! Cold stream descriptions and their operators
//!
//! An [`Observable`] is a recipe: nothing flows until `subscribe` is called,
//! and each subscription runs the recipe independently. Hot sources are
//! relays exposed through `observable()`.

use std::fmt::Display;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use futures_util::{Stream, StreamExt};

use super::observer::{from_fn, Gated, Observer, ObserverRef};
use super::serialize::Serialized;
use crate::error::Error;
use crate::registry::Subscription;
use crate::scheduler::SchedulerRef;
use crate::sync::lock;

/// Bound shared by every value that travels through a stream
pub trait Value: Clone + Send + Sync + 'static {}

impl<T: Clone + Send + Sync + 'static> Value for T {}

type SubscribeFn<T> = dyn Fn(ObserverRef<T>) -> Subscription + Send + Sync;

/// A subscribable stream of `T`
pub struct Observable<T> {
    on_subscribe: Arc<SubscribeFn<T>>,
}

impl<T> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Self {
            on_subscribe: self.on_subscribe.clone(),
        }
    }
}

impl<T: Value> Observable<T> {
    /// Build an observable from its subscribe function
    pub fn new(f: impl Fn(ObserverRef<T>) -> Subscription + Send + Sync + 'static) -> Self {
        Self {
            on_subscribe: Arc::new(f),
        }
    }

    /// Emits `values` synchronously on subscribe, then completes
    pub fn just(values: Vec<T>) -> Self {
        Self::new(move |observer| {
            for value in values.iter().cloned() {
                observer.on_next(value);
            }
            observer.on_complete();
            Subscription::empty()
        })
    }

    /// Completes immediately
    pub fn empty() -> Self {
        Self::just(Vec::new())
    }

    /// Never emits
    pub fn never() -> Self {
        Self::new(|_| Subscription::empty())
    }

    /// Fails immediately with `message`
    pub fn fail(message: impl Into<String>) -> Self {
        let message = message.into();
        Self::new(move |observer| {
            observer.on_error(Error::upstream(message.clone()));
            Subscription::empty()
        })
    }

    /// Adapt an async stream of results.
    ///
    /// Each subscription calls `factory` and drives the stream on a task
    /// spawned on `handle`; disposing aborts the task. An `Err` item is
    /// forwarded as [`Error::Upstream`] and ends the stream.
    pub fn from_stream<S, E, F>(handle: tokio::runtime::Handle, factory: F) -> Self
    where
        F: Fn() -> S + Send + Sync + 'static,
        S: Stream<Item = std::result::Result<T, E>> + Send + 'static,
        E: Display,
    {
        Self::new(move |observer| {
            let mut stream = Box::pin(factory());
            let task = handle.spawn(async move {
                while let Some(item) = stream.next().await {
                    match item {
                        Ok(value) => observer.on_next(value),
                        Err(e) => {
                            observer.on_error(Error::upstream(e.to_string()));
                            return;
                        }
                    }
                }
                observer.on_complete();
            });
            Subscription::from_task(task)
        })
    }

    /// Start receiving notifications.
    ///
    /// Disposing the returned subscription closes a gate in front of
    /// `observer` before tearing down upstream, so nothing is delivered
    /// after disposal returns.
    pub fn subscribe(&self, observer: ObserverRef<T>) -> Subscription {
        let closed = Arc::new(AtomicBool::new(false));
        let gated: ObserverRef<T> = Arc::new(Gated {
            closed: closed.clone(),
            inner: observer,
        });
        let upstream = (self.on_subscribe)(gated);
        Subscription::new(move || {
            closed.store(true, Ordering::Release);
            upstream.dispose();
        })
    }

    pub fn subscribe_fn(&self, f: impl Fn(T) + Send + Sync + 'static) -> Subscription {
        self.subscribe(from_fn(f))
    }

    // ─────────────────────────────────────────────────────────
    // Operators
    // ─────────────────────────────────────────────────────────

    fn lift<U: Value>(
        self,
        make: impl Fn() -> Box<dyn Fn(T, &ObserverRef<U>) + Send + Sync> + Send + Sync + 'static,
    ) -> Observable<U> {
        Observable::new(move |down| {
            self.subscribe(Arc::new(Forward {
                down,
                next: make(),
            }))
        })
    }

    pub fn map<U: Value>(self, f: impl Fn(T) -> U + Send + Sync + 'static) -> Observable<U> {
        let f = Arc::new(f);
        self.lift(move || {
            let f = f.clone();
            Box::new(move |value, down| down.on_next(f(value)))
        })
    }

    pub fn filter(self, predicate: impl Fn(&T) -> bool + Send + Sync + 'static) -> Self {
        let predicate = Arc::new(predicate);
        self.lift(move || {
            let predicate = predicate.clone();
            Box::new(move |value, down| {
                if predicate(&value) {
                    down.on_next(value)
                }
            })
        })
    }

    /// Drop the first `count` values of each subscription
    pub fn skip(self, count: usize) -> Self {
        self.lift(move || {
            let seen = AtomicUsize::new(0);
            Box::new(move |value, down| {
                if seen.fetch_add(1, Ordering::AcqRel) >= count {
                    down.on_next(value)
                }
            })
        })
    }

    /// Suppress values the comparator considers the same as the previous one
    pub fn distinct_until_changed_by(
        self,
        same: impl Fn(&T, &T) -> bool + Send + Sync + 'static,
    ) -> Self {
        let same = Arc::new(same);
        self.lift(move || {
            let same = same.clone();
            let last: Mutex<Option<T>> = Mutex::new(None);
            Box::new(move |value, down| {
                {
                    let mut last = lock(&last);
                    if let Some(previous) = last.as_ref() {
                        if same(&value, previous) {
                            return;
                        }
                    }
                    *last = Some(value.clone());
                }
                down.on_next(value)
            })
        })
    }

    pub fn distinct_until_changed(self) -> Self
    where
        T: PartialEq,
    {
        self.distinct_until_changed_by(|a, b| a == b)
    }

    /// Emit `values` to each subscriber before the live stream
    pub fn start_with(self, values: Vec<T>) -> Self {
        Self::new(move |down| {
            for value in values.iter().cloned() {
                down.on_next(value);
            }
            self.subscribe(down)
        })
    }

    /// Forward values up to and including the first one matching `predicate`,
    /// then complete and release upstream.
    pub fn take_until(self, predicate: impl Fn(&T) -> bool + Send + Sync + 'static) -> Self {
        let predicate = Arc::new(predicate);
        self.take_with(move || {
            let predicate = predicate.clone();
            Box::new(move |value: &T| predicate(value))
        })
    }

    /// Forward the first `count` values, then complete
    pub fn take(self, count: usize) -> Self {
        if count == 0 {
            return Self::empty();
        }
        self.take_with(move || {
            let mut taken = 0;
            Box::new(move |_: &T| {
                taken += 1;
                taken >= count
            })
        })
    }

    fn take_with(
        self,
        make: impl Fn() -> Box<dyn FnMut(&T) -> bool + Send> + Send + Sync + 'static,
    ) -> Self {
        Self::new(move |down| {
            let cell = Arc::new(UpstreamCell::default());
            let observer = Arc::new(TakeUntil {
                down,
                is_last: Mutex::new(make()),
                done: AtomicBool::new(false),
                upstream: cell.clone(),
            });
            let subscription = self.subscribe(observer);
            cell.set(subscription.clone());
            subscription
        })
    }

    /// Map each value to an inner stream and forward only the most recent
    /// one; a new value disposes the previous inner subscription.
    ///
    /// Errors from either side are forwarded. Downstream completes once the
    /// outer stream has completed and the latest inner stream has too, so a
    /// one-shot outer keeps its inner stream flowing.
    pub fn switch_map<U: Value>(
        self,
        f: impl Fn(T) -> Observable<U> + Send + Sync + 'static,
    ) -> Observable<U> {
        let f = Arc::new(f);
        Observable::new(move |down: ObserverRef<U>| {
            let down: ObserverRef<U> = Arc::new(Serialized::new(down));
            let state: Arc<Mutex<SwitchState>> = Arc::default();
            let outer = self.subscribe(Arc::new(SwitchMap {
                down,
                f: f.clone(),
                state: state.clone(),
            }));
            Subscription::new(move || {
                outer.dispose();
                let inner = lock(&state).current.take();
                if let Some(inner) = inner {
                    inner.dispose();
                }
            })
        })
    }

    /// Deliver every notification through `scheduler`
    pub fn observe_on(self, scheduler: SchedulerRef) -> Self {
        Self::new(move |down| {
            self.subscribe(Arc::new(ObserveOn {
                down,
                scheduler: scheduler.clone(),
            }))
        })
    }
}

// ─────────────────────────────────────────────────────────────────
// Operator observers
// ─────────────────────────────────────────────────────────────────

type NextFn<T, U> = Box<dyn Fn(T, &ObserverRef<U>) + Send + Sync>;

struct Forward<T, U> {
    down: ObserverRef<U>,
    next: NextFn<T, U>,
}

impl<T, U> Observer<T> for Forward<T, U> {
    fn on_next(&self, value: T) {
        (self.next)(value, &self.down)
    }

    fn on_error(&self, error: Error) {
        self.down.on_error(error)
    }

    fn on_complete(&self) {
        self.down.on_complete()
    }
}

/// Holds an upstream subscription that may be requested to cancel before
/// `subscribe` has returned it (synchronous replay).
#[derive(Default)]
struct UpstreamCell {
    state: Mutex<(Option<Subscription>, bool)>,
}

impl UpstreamCell {
    fn set(&self, subscription: Subscription) {
        let mut state = lock(&self.state);
        if state.1 {
            drop(state);
            subscription.dispose();
        } else {
            state.0 = Some(subscription);
        }
    }

    fn cancel(&self) {
        let taken = {
            let mut state = lock(&self.state);
            state.1 = true;
            state.0.take()
        };
        if let Some(subscription) = taken {
            subscription.dispose();
        }
    }
}

struct TakeUntil<T> {
    down: ObserverRef<T>,
    is_last: Mutex<Box<dyn FnMut(&T) -> bool + Send>>,
    done: AtomicBool,
    upstream: Arc<UpstreamCell>,
}

impl<T> Observer<T> for TakeUntil<T> {
    fn on_next(&self, value: T) {
        if self.done.load(Ordering::Acquire) {
            return;
        }
        let last = (lock(&self.is_last))(&value);
        if last {
            if self.done.swap(true, Ordering::AcqRel) {
                return;
            }
            self.down.on_next(value);
            self.down.on_complete();
            self.upstream.cancel();
        } else {
            self.down.on_next(value);
        }
    }

    fn on_error(&self, error: Error) {
        if !self.done.swap(true, Ordering::AcqRel) {
            self.down.on_error(error);
        }
    }

    fn on_complete(&self) {
        if !self.done.swap(true, Ordering::AcqRel) {
            self.down.on_complete();
        }
    }
}

type SwitchFn<T, U> = Arc<dyn Fn(T) -> Observable<U> + Send + Sync>;

#[derive(Default)]
struct SwitchState {
    current: Option<Subscription>,
    /// Bumped for every inner stream; stale inners are ignored
    generation: u64,
    inner_active: bool,
    outer_done: bool,
}

struct SwitchMap<T, U> {
    down: ObserverRef<U>,
    f: SwitchFn<T, U>,
    state: Arc<Mutex<SwitchState>>,
}

impl<T, U: Value> Observer<T> for SwitchMap<T, U> {
    fn on_next(&self, value: T) {
        let (previous, generation) = {
            let mut state = lock(&self.state);
            state.generation += 1;
            state.inner_active = true;
            (state.current.take(), state.generation)
        };
        if let Some(previous) = previous {
            previous.dispose();
        }

        let inner = (self.f)(value);
        let subscription = inner.subscribe(Arc::new(SwitchInner {
            down: self.down.clone(),
            state: self.state.clone(),
            generation,
        }));

        let stale = {
            let mut state = lock(&self.state);
            if state.generation == generation {
                state.current.replace(subscription)
            } else {
                Some(subscription)
            }
        };
        if let Some(stale) = stale {
            stale.dispose();
        }
    }

    fn on_error(&self, error: Error) {
        self.down.on_error(error)
    }

    fn on_complete(&self) {
        let finished = {
            let mut state = lock(&self.state);
            state.outer_done = true;
            !state.inner_active
        };
        if finished {
            self.down.on_complete()
        }
    }
}

struct SwitchInner<U> {
    down: ObserverRef<U>,
    state: Arc<Mutex<SwitchState>>,
    generation: u64,
}

impl<U> Observer<U> for SwitchInner<U> {
    fn on_next(&self, value: U) {
        if lock(&self.state).generation == self.generation {
            self.down.on_next(value)
        }
    }

    fn on_error(&self, error: Error) {
        if lock(&self.state).generation == self.generation {
            self.down.on_error(error)
        }
    }

    fn on_complete(&self) {
        let finished = {
            let mut state = lock(&self.state);
            if state.generation != self.generation {
                return;
            }
            state.inner_active = false;
            state.outer_done
        };
        if finished {
            self.down.on_complete()
        }
    }
}

struct ObserveOn<T> {
    down: ObserverRef<T>,
    scheduler: SchedulerRef,
}

impl<T: Value> Observer<T> for ObserveOn<T> {
    fn on_next(&self, value: T) {
        let down = self.down.clone();
        self.scheduler.schedule(Box::new(move || down.on_next(value)));
    }

    fn on_error(&self, error: Error) {
        let down = self.down.clone();
        self.scheduler.schedule(Box::new(move || down.on_error(error)));
    }

    fn on_complete(&self) {
        let down = self.down.clone();
        self.scheduler.schedule(Box::new(move || down.on_complete()));
    }
}
