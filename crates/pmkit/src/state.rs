//! Observable model state with an optional change filter

use std::sync::Arc;

use pmkit_core::prelude::*;
use pmkit_core::{BehaviorRelay, BufferPolicy, SchedulerRef, Serialized, Value};

use crate::model::{PmRef, PresentationModel};

/// Decides whether a new state value is a change worth publishing
pub trait DiffStrategy<T>: Send + Sync {
    fn are_the_same(&self, new: &T, old: &T) -> bool;

    /// Run comparisons on the model's computation scheduler instead of
    /// inline. Use for expensive comparisons such as large lists.
    fn compute_async(&self) -> bool {
        false
    }
}

/// Compares with `PartialEq`
#[derive(Debug, Clone, Copy, Default)]
pub struct DiffByEquals {
    pub compute_async: bool,
}

impl<T: PartialEq> DiffStrategy<T> for DiffByEquals {
    fn are_the_same(&self, new: &T, old: &T) -> bool {
        new == old
    }

    fn compute_async(&self) -> bool {
        self.compute_async
    }
}

/// Compares `Arc` pointers
#[derive(Debug, Clone, Copy, Default)]
pub struct DiffByIdentity;

impl<T: ?Sized + Send + Sync> DiffStrategy<Arc<T>> for DiffByIdentity {
    fn are_the_same(&self, new: &Arc<T>, old: &Arc<T>) -> bool {
        Arc::ptr_eq(new, old)
    }
}

struct DiffFn<F> {
    same: F,
    compute_async: bool,
}

impl<T, F> DiffStrategy<T> for DiffFn<F>
where
    F: Fn(&T, &T) -> bool + Send + Sync,
{
    fn are_the_same(&self, new: &T, old: &T) -> bool {
        (self.same)(new, old)
    }

    fn compute_async(&self) -> bool {
        self.compute_async
    }
}

/// Builder for [`State`]
pub struct StateBuilder<T> {
    pm: PresentationModel,
    initial: Option<T>,
    diff: Option<Arc<dyn DiffStrategy<T>>>,
    source: Option<Observable<T>>,
}

impl<T: Value> StateBuilder<T> {
    pub fn initial(mut self, value: T) -> Self {
        self.initial = Some(value);
        self
    }

    pub fn diff(mut self, strategy: impl DiffStrategy<T> + 'static) -> Self {
        self.diff = Some(Arc::new(strategy));
        self
    }

    pub fn diff_by_equals(self) -> Self
    where
        T: PartialEq,
    {
        self.diff(DiffByEquals::default())
    }

    pub fn diff_with(
        self,
        same: impl Fn(&T, &T) -> bool + Send + Sync + 'static,
        compute_async: bool,
    ) -> Self {
        self.diff(DiffFn {
            same,
            compute_async,
        })
    }

    /// Feed the state from `source`, subscribed once when the model is
    /// created and released when it is destroyed
    pub fn source(mut self, source: Observable<T>) -> Self {
        self.source = Some(source);
        self
    }

    pub fn build(self) -> State<T> {
        let relay = match self.initial {
            Some(value) => BehaviorRelay::with_value(value),
            None => BehaviorRelay::new(),
        };
        let sink = Arc::new(Serialized::new(Arc::new(DiffSink {
            relay: relay.clone(),
            diff: self.diff,
            computation: self.pm.computation_scheduler().clone(),
        })));
        let state = State {
            inner: Arc::new(StateInner {
                relay,
                sink,
                pm: self.pm.downgrade(),
            }),
        };

        if let Some(source) = self.source {
            state.connect_source(&self.pm, source);
        }
        state
    }
}

impl<T: Value> StateBuilder<Arc<T>> {
    pub fn diff_by_identity(self) -> Self
    where
        T: Send + Sync,
    {
        self.diff(DiffByIdentity)
    }
}

/// Current value plus its change stream.
///
/// "No value yet" is distinct from every value: [`State::value`] fails until
/// the first value arrives, while observers simply wait for it.
pub struct State<T> {
    inner: Arc<StateInner<T>>,
}

struct StateInner<T> {
    relay: BehaviorRelay<T>,
    sink: Arc<Serialized<T>>,
    pm: PmRef,
}

impl<T> Clone for State<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Value> State<T> {
    pub fn builder(pm: &PresentationModel) -> StateBuilder<T> {
        StateBuilder {
            pm: pm.clone(),
            initial: None,
            diff: None,
            source: None,
        }
    }

    /// State without a value and without change filtering
    pub fn new(pm: &PresentationModel) -> Self {
        Self::builder(pm).build()
    }

    pub fn with_initial(pm: &PresentationModel, value: T) -> Self {
        Self::builder(pm).initial(value).build()
    }

    fn connect_source(&self, pm: &PresentationModel, source: Observable<T>) {
        let sink = self.sink();
        let pm_ref = pm.downgrade();
        let trigger = pm
            .lifecycle()
            .filter(|lifecycle| !lifecycle.is_terminal())
            .take(1)
            .subscribe_fn(move |_| {
                if let Some(pm) = pm_ref.upgrade() {
                    pm.until_destroy(source.subscribe(sink.clone()));
                }
            });
        pm.until_destroy(trigger);
    }

    /// Publish a new value from any thread
    pub fn accept(&self, value: T) {
        self.inner.sink.on_next(value)
    }

    /// Entry point for a producer stream.
    ///
    /// Errors must not reach a state; one that does is treated as a bug and
    /// panics after being logged.
    pub fn sink(&self) -> ObserverRef<T> {
        self.inner.sink.clone()
    }

    pub fn observable(&self) -> Observable<T> {
        self.inner.relay.observable()
    }

    /// Current value, or [`Error::StateUninitialized`] before the first one
    pub fn value(&self) -> Result<T> {
        self.inner.relay.value().ok_or(Error::StateUninitialized)
    }

    pub fn value_or_none(&self) -> Option<T> {
        self.inner.relay.value()
    }

    pub fn has_value(&self) -> bool {
        self.inner.relay.has_value()
    }

    /// Render values with `f` on the view scheduler while the view is bound.
    ///
    /// While the model is idle only the newest value is kept.
    pub fn bind_to(&self, f: impl Fn(T) + Send + Sync + 'static) {
        let Some(pm) = self.inner.pm.upgrade() else {
            warn!("state bound after its model was dropped");
            return;
        };
        let subscription = self
            .observable()
            .observe_on(pm.view_scheduler().clone())
            .buffer_while_idle(pm.idle(), BufferPolicy::Latest)
            .subscribe_fn(f);
        pm.until_unbind(subscription);
    }
}

struct DiffSink<T> {
    relay: BehaviorRelay<T>,
    diff: Option<Arc<dyn DiffStrategy<T>>>,
    computation: SchedulerRef,
}

impl<T: Value> DiffSink<T> {
    fn compare_and_publish(relay: &BehaviorRelay<T>, diff: &dyn DiffStrategy<T>, value: T) {
        if let Some(old) = relay.value() {
            if diff.are_the_same(&value, &old) {
                trace!("state value unchanged, not published");
                return;
            }
        }
        relay.accept(value);
    }
}

impl<T: Value> Observer<T> for DiffSink<T> {
    fn on_next(&self, value: T) {
        let Some(diff) = &self.diff else {
            self.relay.accept(value);
            return;
        };
        if diff.compute_async() {
            let relay = self.relay.clone();
            let diff = diff.clone();
            self.computation.schedule(Box::new(move || {
                Self::compare_and_publish(&relay, diff.as_ref(), value)
            }));
        } else {
            Self::compare_and_publish(&self.relay, diff.as_ref(), value);
        }
    }

    fn on_error(&self, error: Error) {
        error!("State source failed: {}", error);
        panic!("a State source must not fail: {error}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pmkit_core::{PublishRelay, SerialExecutor};
    use std::sync::Mutex;

    fn record<T: Value>(state: &State<T>) -> (Subscription, Arc<Mutex<Vec<T>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = seen.clone();
        let sub = state
            .observable()
            .subscribe_fn(move |v| s.lock().unwrap().push(v));
        (sub, seen)
    }

    #[test]
    fn test_value_before_first_accept_fails() {
        let pm = PresentationModel::new();
        let state: State<i32> = State::new(&pm);

        assert!(matches!(state.value(), Err(Error::StateUninitialized)));
        assert_eq!(state.value_or_none(), None);
        assert!(!state.has_value());

        state.accept(3);
        assert_eq!(state.value().unwrap(), 3);
    }

    #[test]
    fn test_initial_value_is_replayed() {
        let pm = PresentationModel::new();
        let state = State::with_initial(&pm, "idle");
        let (_sub, seen) = record(&state);
        state.accept("busy");
        assert_eq!(*seen.lock().unwrap(), vec!["idle", "busy"]);
    }

    #[test]
    fn test_diff_by_equals_suppresses_repeats() {
        let pm = PresentationModel::new();
        let state = State::builder(&pm).initial(1).diff_by_equals().build();
        let (_sub, seen) = record(&state);

        for v in [1, 2, 2, 3, 3] {
            state.accept(v);
        }

        assert_eq!(*seen.lock().unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_diff_by_identity_compares_pointers() {
        let pm = PresentationModel::new();
        let first = Arc::new(vec![1]);
        let state = State::builder(&pm)
            .initial(first.clone())
            .diff_by_identity()
            .build();
        let (_sub, seen) = record(&state);

        state.accept(first.clone());
        state.accept(Arc::new(vec![1]));

        assert_eq!(seen.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_custom_diff() {
        let pm = PresentationModel::new();
        let state = State::builder(&pm)
            .diff_with(|a: &String, b: &String| a.eq_ignore_ascii_case(b), false)
            .build();
        let (_sub, seen) = record(&state);

        state.accept("on".to_string());
        state.accept("ON".to_string());
        state.accept("off".to_string());

        assert_eq!(*seen.lock().unwrap(), vec!["on", "off"]);
    }

    #[test]
    fn test_source_subscribed_on_create_and_released_on_destroy() {
        let pm = PresentationModel::new();
        let source = PublishRelay::new();
        let state = State::builder(&pm).source(source.observable()).build();

        source.accept(1);
        assert!(!state.has_value());
        assert!(!source.has_observers());

        pm.accept_lifecycle(Lifecycle::Created).unwrap();
        source.accept(2);
        assert_eq!(state.value().unwrap(), 2);

        pm.accept_lifecycle(Lifecycle::Destroyed).unwrap();
        assert!(!source.has_observers());
        source.accept(3);
        assert_eq!(state.value().unwrap(), 2);
    }

    #[test]
    fn test_source_subscribed_once_across_rebinds() {
        let pm = PresentationModel::new();
        let subscriptions = Arc::new(Mutex::new(0));
        let count = subscriptions.clone();
        let source = Observable::new(move |observer: ObserverRef<i32>| {
            *count.lock().unwrap() += 1;
            observer.on_next(1);
            Subscription::empty()
        });
        let _state = State::builder(&pm).source(source).build();

        for step in [
            Lifecycle::Created,
            Lifecycle::Binded,
            Lifecycle::Unbinded,
            Lifecycle::Binded,
        ] {
            pm.accept_lifecycle(step).unwrap();
        }

        assert_eq!(*subscriptions.lock().unwrap(), 1);
    }

    #[test]
    #[should_panic(expected = "must not fail")]
    fn test_source_error_panics() {
        let pm = PresentationModel::new();
        let _state: State<i32> = State::builder(&pm)
            .source(Observable::fail("socket closed"))
            .build();
        let _ = pm.accept_lifecycle(Lifecycle::Created);
    }

    #[test]
    fn test_bind_to_keeps_latest_while_paused() {
        let pm = PresentationModel::new();
        let state = State::with_initial(&pm, 0);
        let seen = Arc::new(Mutex::new(Vec::new()));

        pm.accept_lifecycle(Lifecycle::Created).unwrap();
        pm.accept_lifecycle(Lifecycle::Binded).unwrap();
        let s = seen.clone();
        state.bind_to(move |v| s.lock().unwrap().push(v));
        pm.accept_lifecycle(Lifecycle::Resumed).unwrap();

        pm.accept_lifecycle(Lifecycle::Paused).unwrap();
        state.accept(1);
        state.accept(2);
        pm.accept_lifecycle(Lifecycle::Resumed).unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![0, 2]);
    }

    #[tokio::test]
    async fn test_async_diff_runs_on_computation_scheduler() {
        let executor = SerialExecutor::spawn(&tokio::runtime::Handle::current());
        let pm = PresentationModel::builder()
            .computation_scheduler(Arc::new(executor))
            .build();
        let state = State::builder(&pm)
            .diff(DiffByEquals {
                compute_async: true,
            })
            .build();

        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let _sub = state.observable().subscribe_fn(move |v| {
            let _ = tx.send(v);
        });

        for v in [1, 1, 2, 2, 3] {
            state.accept(v);
        }

        let mut seen = Vec::new();
        while seen.len() < 3 {
            seen.push(rx.recv().await.unwrap());
        }
        assert_eq!(seen, vec![1, 2, 3]);
    }
}
