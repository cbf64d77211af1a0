//! One-shot instructions from a model to its view

use std::sync::Arc;

use pmkit_core::prelude::*;
use pmkit_core::{from_fn, BufferPolicy, Callbacks, IdleGate, PublishRelay, Value};

use crate::model::{PmRef, PresentationModel};

/// Hot stream of view instructions (show a message, open a screen, render a
/// fresh list).
///
/// Values published while the model is idle are held back by an idle gate
/// that is connected when the command is created, so values published before
/// any view subscribes are still delivered, within the buffer policy. The
/// gate lives until the model is destroyed.
pub struct Command<T> {
    inner: Arc<CommandInner<T>>,
}

struct CommandInner<T> {
    raw: PublishRelay<T>,
    output: PublishRelay<T>,
    gate: Arc<IdleGate<T>>,
    pm: PmRef,
}

impl<T> Clone for Command<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Value> Command<T> {
    /// Command keeping only the latest value while idle
    pub fn new(pm: &PresentationModel) -> Self {
        Self::with_policy(pm, BufferPolicy::default())
    }

    pub fn with_policy(pm: &PresentationModel, policy: BufferPolicy) -> Self {
        let raw = PublishRelay::new();
        let output = PublishRelay::new();

        let out = output.clone();
        let gate = Arc::new(IdleGate::new(policy, from_fn(move |value| out.accept(value))));

        let g = gate.clone();
        let idle = pm
            .idle()
            .subscribe(Callbacks::new(move |idle| g.set_idle(idle)).into_ref());
        let upstream = raw.subscribe(gate.clone());
        pm.until_destroy(Subscription::all(vec![upstream, idle]));

        Self {
            inner: Arc::new(CommandInner {
                raw,
                output,
                gate,
                pm: pm.downgrade(),
            }),
        }
    }

    /// Publish a value from any thread
    pub fn accept(&self, value: T) {
        self.inner.raw.accept(value)
    }

    pub fn consumer(&self) -> ObserverRef<T> {
        let raw = self.inner.raw.clone();
        from_fn(move |value| raw.accept(value))
    }

    /// Gated values, delivered on the model's view scheduler
    pub fn observable(&self) -> Observable<T> {
        let observable = self.inner.output.observable();
        match self.inner.pm.upgrade() {
            Some(pm) => observable.observe_on(pm.view_scheduler().clone()),
            None => observable,
        }
    }

    /// Values as published, before the idle gate
    pub(crate) fn raw_observable(&self) -> Observable<T> {
        self.inner.raw.observable()
    }

    /// Number of values currently held back
    pub fn pending(&self) -> usize {
        self.inner.gate.pending()
    }

    /// Deliver values to `f` until the view unbinds
    pub fn bind_to(&self, f: impl Fn(T) + Send + Sync + 'static) {
        let Some(pm) = self.inner.pm.upgrade() else {
            warn!("command bound after its model was dropped");
            return;
        };
        pm.until_unbind(self.observable().subscribe_fn(f));
    }
}
