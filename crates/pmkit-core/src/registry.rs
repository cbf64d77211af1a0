//! Cancellable subscriptions and the lifecycle-scoped registries that own them
//!
//! A [`Subscription`] is a one-shot teardown handle. A [`Registry`] groups
//! subscriptions that are released together when the model crosses the
//! lifecycle boundary named by its [`Scope`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::sync::Mutex;

use crate::sync::lock;

type Teardown = Box<dyn FnOnce() + Send>;

/// Handle to an active subscription.
///
/// Cloning shares the handle; disposing any clone disposes all of them.
/// Disposal is idempotent and runs the teardown at most once.
#[derive(Clone)]
pub struct Subscription {
    inner: Arc<SubscriptionInner>,
}

struct SubscriptionInner {
    disposed: AtomicBool,
    teardown: Mutex<Option<Teardown>>,
}

impl Subscription {
    /// Create a subscription that runs `teardown` when disposed
    pub fn new(teardown: impl FnOnce() + Send + 'static) -> Self {
        Self {
            inner: Arc::new(SubscriptionInner {
                disposed: AtomicBool::new(false),
                teardown: Mutex::new(Some(Box::new(teardown))),
            }),
        }
    }

    /// A subscription with nothing to tear down
    pub fn empty() -> Self {
        Self {
            inner: Arc::new(SubscriptionInner {
                disposed: AtomicBool::new(false),
                teardown: Mutex::new(None),
            }),
        }
    }

    /// Subscription that aborts a spawned tokio task when disposed
    pub fn from_task<T: Send + 'static>(handle: tokio::task::JoinHandle<T>) -> Self {
        Self::new(move || handle.abort())
    }

    /// Combine several subscriptions into one handle
    pub fn all(subscriptions: Vec<Subscription>) -> Self {
        Self::new(move || {
            for subscription in subscriptions {
                subscription.dispose();
            }
        })
    }

    pub fn dispose(&self) {
        if self.inner.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        let teardown = lock(&self.inner.teardown).take();
        if let Some(teardown) = teardown {
            teardown();
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

/// Lifecycle boundary at which a [`Registry`] is cleared
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    /// Cleared on every entry into `Paused`
    Pause,
    /// Cleared on every entry into `Unbinded`
    Unbind,
    /// Disposed once on `Destroyed`
    Destroy,
}

impl Scope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Pause => "pause",
            Scope::Unbind => "unbind",
            Scope::Destroy => "destroy",
        }
    }
}

/// A group of subscriptions released together.
///
/// `clear` releases the current members and keeps the registry usable;
/// `dispose` releases them and makes every later `add` dispose its argument
/// immediately.
#[derive(Debug)]
pub struct Registry {
    scope: Scope,
    state: Mutex<RegistryState>,
}

#[derive(Debug, Default)]
struct RegistryState {
    items: Vec<Subscription>,
    disposed: bool,
}

impl Registry {
    pub fn new(scope: Scope) -> Self {
        Self {
            scope,
            state: Mutex::new(RegistryState::default()),
        }
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    /// Register a subscription in this scope
    pub fn add(&self, subscription: Subscription) {
        let mut state = lock(&self.state);
        if state.disposed {
            drop(state);
            subscription.dispose();
            return;
        }
        state.items.retain(|s| !s.is_disposed());
        state.items.push(subscription);
    }

    /// Dispose every registered subscription; returns how many were live.
    ///
    /// Members are detached under the lock and disposed outside it, so a
    /// teardown may register into this same registry.
    pub fn clear(&self) -> usize {
        let items = std::mem::take(&mut lock(&self.state).items);
        let mut released = 0;
        for item in items {
            if !item.is_disposed() {
                released += 1;
            }
            item.dispose();
        }
        tracing::trace!(scope = self.scope.as_str(), released, "registry cleared");
        released
    }

    /// Clear and refuse further members
    pub fn dispose(&self) -> usize {
        lock(&self.state).disposed = true;
        self.clear()
    }

    pub fn is_disposed(&self) -> bool {
        lock(&self.state).disposed
    }

    /// Number of live members
    pub fn len(&self) -> usize {
        lock(&self.state)
            .items
            .iter()
            .filter(|s| !s.is_disposed())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
