//! Hold values back while the consumer is idle
//!
//! While the idle signal is `true` values are retained according to a
//! [`BufferPolicy`]; when it turns `false` the retained values are released
//! in arrival order, ahead of anything that arrives afterwards. Errors and
//! completion pass straight through and end buffering.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::error::Error;
use crate::registry::Subscription;
use crate::stream::{Callbacks, Observable, Observer, ObserverRef, Serialized, Signal, Value};
use crate::sync::lock;

/// What an [`IdleBuffer`] retains while idle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BufferPolicy {
    /// Only the most recent value
    #[default]
    Latest,
    /// The most recent `n` values; older ones are dropped first
    Bounded(usize),
    /// Everything
    Unbounded,
}

impl BufferPolicy {
    fn retain<T>(&self, buffer: &mut VecDeque<T>, value: T) {
        match self {
            BufferPolicy::Latest => {
                buffer.clear();
                buffer.push_back(value);
            }
            BufferPolicy::Bounded(limit) => {
                if *limit == 0 {
                    return;
                }
                while buffer.len() >= *limit {
                    buffer.pop_front();
                }
                buffer.push_back(value);
            }
            BufferPolicy::Unbounded => buffer.push_back(value),
        }
    }
}

/// Buffering state machine.
///
/// Not idle until told otherwise. Pure bookkeeping: callers deliver what the
/// methods return.
#[derive(Debug)]
pub struct IdleBuffer<T> {
    policy: BufferPolicy,
    idle: bool,
    pending: VecDeque<T>,
    terminated: bool,
}

impl<T> IdleBuffer<T> {
    pub fn new(policy: BufferPolicy) -> Self {
        Self {
            policy,
            idle: false,
            pending: VecDeque::new(),
            terminated: false,
        }
    }

    /// Returns the value when it should be delivered now
    pub fn on_value(&mut self, value: T) -> Option<T> {
        if self.terminated {
            return None;
        }
        if self.idle {
            self.policy.retain(&mut self.pending, value);
            tracing::trace!(pending = self.pending.len(), "value held while idle");
            return None;
        }
        Some(value)
    }

    /// Returns the values released by leaving idle, oldest first
    pub fn on_idle_changed(&mut self, idle: bool) -> Vec<T> {
        self.idle = idle;
        if idle {
            return Vec::new();
        }
        self.pending.drain(..).collect()
    }

    /// Stop buffering; returns how many pending values were dropped
    pub fn on_terminate(&mut self) -> usize {
        self.terminated = true;
        let dropped = self.pending.len();
        self.pending.clear();
        dropped
    }

    pub fn is_idle(&self) -> bool {
        self.idle
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}

/// An [`IdleBuffer`] wired to a downstream observer.
///
/// Values, idle changes and terminal signals may arrive from any thread;
/// delivery order is fixed under the buffer lock and performed outside it
/// through a serializing emitter, so a flush is never overtaken by a value
/// that arrived after it.
pub struct IdleGate<T> {
    buffer: Mutex<IdleBuffer<T>>,
    output: Serialized<T>,
}

impl<T: Value> IdleGate<T> {
    pub fn new(policy: BufferPolicy, downstream: ObserverRef<T>) -> Self {
        Self {
            buffer: Mutex::new(IdleBuffer::new(policy)),
            output: Serialized::new(downstream),
        }
    }

    pub fn set_idle(&self, idle: bool) {
        let drain = {
            let mut buffer = lock(&self.buffer);
            if buffer.is_terminated() {
                return;
            }
            let released = buffer.on_idle_changed(idle);
            if !released.is_empty() {
                tracing::trace!(released = released.len(), "idle buffer flushed");
            }
            let mut drain = false;
            for value in released {
                drain |= self.output.enqueue(Signal::Next(value));
            }
            drain
        };
        if drain {
            self.output.drain();
        }
    }

    pub fn is_idle(&self) -> bool {
        lock(&self.buffer).is_idle()
    }

    pub fn pending(&self) -> usize {
        lock(&self.buffer).pending()
    }

    fn terminate(&self, signal: Signal<T>) {
        let drain = {
            let mut buffer = lock(&self.buffer);
            if buffer.is_terminated() {
                return;
            }
            let dropped = buffer.on_terminate();
            if dropped > 0 {
                tracing::debug!(dropped, "idle buffer discarded on termination");
            }
            self.output.enqueue(signal)
        };
        if drain {
            self.output.drain();
        }
    }
}

impl<T: Value> Observer<T> for IdleGate<T> {
    fn on_next(&self, value: T) {
        let drain = {
            let mut buffer = lock(&self.buffer);
            match buffer.on_value(value) {
                Some(value) => self.output.enqueue(Signal::Next(value)),
                None => false,
            }
        };
        if drain {
            self.output.drain();
        }
    }

    fn on_error(&self, error: Error) {
        self.terminate(Signal::Error(error))
    }

    fn on_complete(&self) {
        self.terminate(Signal::Complete)
    }
}

impl<T: Value> Observable<T> {
    /// Retain values while `idle` reports `true`, per `policy`.
    ///
    /// The idle signal is subscribed before the source so a replayed idle
    /// state applies to the source's first values.
    pub fn buffer_while_idle(self, idle: Observable<bool>, policy: BufferPolicy) -> Observable<T> {
        Observable::new(move |down| {
            let gate = Arc::new(IdleGate::new(policy, down));
            let g = gate.clone();
            let idle_subscription =
                idle.subscribe(Callbacks::new(move |idle| g.set_idle(idle)).into_ref());
            let source_subscription = self.subscribe(gate);
            Subscription::all(vec![source_subscription, idle_subscription])
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::{from_fn, BehaviorRelay, PublishRelay};
    use std::sync::atomic::{AtomicBool, Ordering};

    fn recorder() -> (ObserverRef<i32>, Arc<Mutex<Vec<i32>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = seen.clone();
        (from_fn(move |v| s.lock().unwrap().push(v)), seen)
    }

    #[test]
    fn test_passes_through_when_not_idle() {
        let mut buffer = IdleBuffer::new(BufferPolicy::Latest);
        assert_eq!(buffer.on_value("a"), Some("a"));
        assert_eq!(buffer.on_value("b"), Some("b"));
    }

    #[test]
    fn test_latest_keeps_last_value() {
        let mut buffer = IdleBuffer::new(BufferPolicy::Latest);
        buffer.on_idle_changed(true);
        assert_eq!(buffer.on_value("c"), None);
        assert_eq!(buffer.on_value("d"), None);
        assert_eq!(buffer.on_idle_changed(false), vec!["d"]);
    }

    #[test]
    fn test_flushed_value_is_not_emitted_twice() {
        let mut buffer = IdleBuffer::new(BufferPolicy::Latest);
        buffer.on_idle_changed(true);
        buffer.on_value(1);
        assert_eq!(buffer.on_idle_changed(false), vec![1]);
        buffer.on_idle_changed(true);
        assert!(buffer.on_idle_changed(false).is_empty());
    }

    #[test]
    fn test_unbounded_keeps_everything_in_order() {
        let mut buffer = IdleBuffer::new(BufferPolicy::Unbounded);
        buffer.on_idle_changed(true);
        for v in 1..=3 {
            buffer.on_value(v);
        }
        assert_eq!(buffer.on_idle_changed(false), vec![1, 2, 3]);
    }

    #[test]
    fn test_bounded_drops_oldest() {
        let mut buffer = IdleBuffer::new(BufferPolicy::Bounded(2));
        buffer.on_idle_changed(true);
        for v in 1..=4 {
            buffer.on_value(v);
        }
        assert_eq!(buffer.pending(), 2);
        assert_eq!(buffer.on_idle_changed(false), vec![3, 4]);
    }

    #[test]
    fn test_terminate_drops_pending_and_stops() {
        let mut buffer = IdleBuffer::new(BufferPolicy::Unbounded);
        buffer.on_idle_changed(true);
        buffer.on_value(1);
        buffer.on_value(2);
        assert_eq!(buffer.on_terminate(), 2);
        assert_eq!(buffer.on_value(3), None);
        assert!(buffer.on_idle_changed(false).is_empty());
    }

    #[test]
    fn test_gate_forwards_completion_immediately() {
        let completed = Arc::new(AtomicBool::new(false));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let (s, c) = (seen.clone(), completed.clone());
        let gate = IdleGate::new(
            BufferPolicy::Latest,
            Callbacks::new(move |v: i32| s.lock().unwrap().push(v))
                .on_complete(move || c.store(true, Ordering::SeqCst))
                .into_ref(),
        );

        gate.set_idle(true);
        gate.on_next(5);
        gate.on_complete();
        gate.set_idle(false);

        assert!(completed.load(Ordering::SeqCst));
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_gate_error_reaches_downstream() {
        let errored = Arc::new(AtomicBool::new(false));
        let e = errored.clone();
        let gate = IdleGate::new(
            BufferPolicy::Unbounded,
            Callbacks::new(|_: i32| {})
                .on_error(move |_| e.store(true, Ordering::SeqCst))
                .into_ref(),
        );

        gate.set_idle(true);
        gate.on_next(1);
        gate.on_error(Error::upstream("gone"));

        assert!(errored.load(Ordering::SeqCst));
        assert_eq!(gate.pending(), 0);
    }

    #[test]
    fn test_flush_precedes_values_pushed_by_downstream() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let gate: Arc<std::sync::OnceLock<Arc<IdleGate<i32>>>> = Arc::default();
        let (s, g) = (seen.clone(), gate.clone());
        let built = Arc::new(IdleGate::new(
            BufferPolicy::Unbounded,
            from_fn(move |v: i32| {
                s.lock().unwrap().push(v);
                if v == 1 {
                    g.get().unwrap().on_next(10);
                }
            }),
        ));
        let _ = gate.set(built.clone());

        built.set_idle(true);
        built.on_next(1);
        built.on_next(2);
        built.set_idle(false);

        assert_eq!(*seen.lock().unwrap(), vec![1, 2, 10]);
    }

    #[test]
    fn test_operator_applies_replayed_idle_state() {
        let idle = BehaviorRelay::with_value(true);
        let source = PublishRelay::new();
        let (observer, seen) = recorder();
        let _sub = source
            .observable()
            .buffer_while_idle(idle.observable(), BufferPolicy::Latest)
            .subscribe(observer);

        source.accept(1);
        source.accept(2);
        idle.accept(false);
        source.accept(3);

        assert_eq!(*seen.lock().unwrap(), vec![2, 3]);
    }

    #[test]
    fn test_operator_dispose_releases_both_sources() {
        let idle = BehaviorRelay::with_value(false);
        let source = PublishRelay::<i32>::new();
        let (observer, _) = recorder();
        let sub = source
            .observable()
            .buffer_while_idle(idle.observable(), BufferPolicy::Latest)
            .subscribe(observer);

        sub.dispose();

        assert!(!idle.has_observers());
        assert!(!source.has_observers());
    }
}
