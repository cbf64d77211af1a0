//! User intents flowing from the view into the model

use pmkit_core::prelude::*;
use pmkit_core::{from_fn, Callbacks, PublishRelay, Value};

use crate::model::PresentationModel;

/// Hot, non-replaying stream of intents. A value accepted while nothing is
/// subscribed is dropped.
pub struct Action<T> {
    relay: PublishRelay<T>,
}

impl<T> Clone for Action<T> {
    fn clone(&self) -> Self {
        Self {
            relay: self.relay.clone(),
        }
    }
}

impl<T: Value> Default for Action<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Value> Action<T> {
    pub fn new() -> Self {
        Self {
            relay: PublishRelay::new(),
        }
    }

    /// Action whose values run through a model-side pipeline.
    ///
    /// `chain` is applied once; the resulting stream is subscribed when the
    /// model is created and released when it is destroyed. Pipeline errors
    /// are logged.
    pub fn with_chain<U: Value>(
        pm: &PresentationModel,
        chain: impl FnOnce(Observable<T>) -> Observable<U>,
    ) -> Self {
        let action = Self::new();
        let pipeline = chain(action.observable());
        let pm_ref = pm.downgrade();
        let name = pm.name().to_string();
        let trigger = pm
            .lifecycle()
            .filter(|lifecycle| !lifecycle.is_terminal())
            .take(1)
            .subscribe_fn(move |_| {
                let Some(pm) = pm_ref.upgrade() else {
                    return;
                };
                let name = name.clone();
                let subscription = pipeline.subscribe(
                    Callbacks::new(|_| {})
                        .on_error(move |e| error!(model = %name, "action pipeline failed: {}", e))
                        .into_ref(),
                );
                pm.until_destroy(subscription);
            });
        pm.until_destroy(trigger);
        action
    }

    pub fn accept(&self, value: T) {
        self.relay.accept(value)
    }

    pub fn consumer(&self) -> ObserverRef<T> {
        let relay = self.relay.clone();
        from_fn(move |value| relay.accept(value))
    }

    pub fn observable(&self) -> Observable<T> {
        self.relay.observable()
    }
}
