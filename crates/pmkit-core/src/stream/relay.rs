//! Hot multicast relays: the publish entry points of every slot
//!
//! A relay never errors or completes. Values accepted from any thread are
//! merged into one ordered sequence and fanned out to the observers that are
//! subscribed at the moment each value is dequeued.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, Weak};

use super::observable::{Observable, Value};
use super::observer::ObserverRef;
use crate::registry::Subscription;
use crate::sync::lock;

struct RelayInner<T> {
    replay: bool,
    state: Mutex<RelayState<T>>,
}

struct RelayState<T> {
    observers: Vec<(u64, ObserverRef<T>)>,
    next_id: u64,
    value: Option<T>,
    queue: VecDeque<T>,
    emitting: bool,
}

impl<T: Value> RelayInner<T> {
    fn new(replay: bool, value: Option<T>) -> Arc<Self> {
        Arc::new(Self {
            replay,
            state: Mutex::new(RelayState {
                observers: Vec::new(),
                next_id: 0,
                value,
                queue: VecDeque::new(),
                emitting: false,
            }),
        })
    }

    fn accept(&self, value: T) {
        {
            let mut state = lock(&self.state);
            state.queue.push_back(value);
            if state.emitting {
                return;
            }
            state.emitting = true;
        }

        let mut guard = DrainGuard {
            state: &self.state,
            armed: true,
        };
        loop {
            let (value, observers) = {
                let mut state = lock(&self.state);
                match state.queue.pop_front() {
                    Some(value) => {
                        if self.replay {
                            state.value = Some(value.clone());
                        }
                        let observers: Vec<_> =
                            state.observers.iter().map(|(_, o)| o.clone()).collect();
                        (value, observers)
                    }
                    None => {
                        state.emitting = false;
                        guard.armed = false;
                        return;
                    }
                }
            };
            for observer in observers {
                observer.on_next(value.clone());
            }
        }
    }

    fn subscribe(self: &Arc<Self>, observer: ObserverRef<T>) -> Subscription {
        let (id, replay) = {
            let mut state = lock(&self.state);
            let id = state.next_id;
            state.next_id += 1;
            state.observers.push((id, observer.clone()));
            let replay = if self.replay { state.value.clone() } else { None };
            (id, replay)
        };
        if let Some(value) = replay {
            observer.on_next(value);
        }

        let weak: Weak<Self> = Arc::downgrade(self);
        Subscription::new(move || {
            if let Some(inner) = weak.upgrade() {
                lock(&inner.state).observers.retain(|(oid, _)| *oid != id);
            }
        })
    }

    fn observer_count(&self) -> usize {
        lock(&self.state).observers.len()
    }
}

struct DrainGuard<'a, T> {
    state: &'a Mutex<RelayState<T>>,
    armed: bool,
}

impl<T> Drop for DrainGuard<'_, T> {
    fn drop(&mut self) {
        if self.armed {
            let mut state = lock(self.state);
            state.emitting = false;
            state.queue.clear();
        }
    }
}

/// Relay without replay; values accepted while nobody listens are lost.
pub struct PublishRelay<T> {
    inner: Arc<RelayInner<T>>,
}

impl<T> Clone for PublishRelay<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Value> Default for PublishRelay<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Value> PublishRelay<T> {
    pub fn new() -> Self {
        Self {
            inner: RelayInner::new(false, None),
        }
    }

    pub fn accept(&self, value: T) {
        self.inner.accept(value)
    }

    pub fn subscribe(&self, observer: ObserverRef<T>) -> Subscription {
        self.inner.subscribe(observer)
    }

    pub fn observable(&self) -> Observable<T> {
        let inner = self.inner.clone();
        Observable::new(move |observer| inner.subscribe(observer))
    }

    pub fn has_observers(&self) -> bool {
        self.inner.observer_count() > 0
    }
}

/// Relay that remembers its latest value and replays it to new observers.
pub struct BehaviorRelay<T> {
    inner: Arc<RelayInner<T>>,
}

impl<T> Clone for BehaviorRelay<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Value> Default for BehaviorRelay<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Value> BehaviorRelay<T> {
    /// Relay with no value yet
    pub fn new() -> Self {
        Self {
            inner: RelayInner::new(true, None),
        }
    }

    pub fn with_value(value: T) -> Self {
        Self {
            inner: RelayInner::new(true, Some(value)),
        }
    }

    pub fn accept(&self, value: T) {
        self.inner.accept(value)
    }

    pub fn value(&self) -> Option<T> {
        lock(&self.inner.state).value.clone()
    }

    pub fn has_value(&self) -> bool {
        lock(&self.inner.state).value.is_some()
    }

    pub fn subscribe(&self, observer: ObserverRef<T>) -> Subscription {
        self.inner.subscribe(observer)
    }

    pub fn observable(&self) -> Observable<T> {
        let inner = self.inner.clone();
        Observable::new(move |observer| inner.subscribe(observer))
    }

    pub fn has_observers(&self) -> bool {
        self.inner.observer_count() > 0
    }
}
