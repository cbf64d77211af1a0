//! Serializing emitter: merges pushes from any thread into one ordered sequence

use std::collections::VecDeque;
use std::sync::Mutex;

use super::observer::{Observer, ObserverRef};
use crate::error::Error;
use crate::sync::lock;

/// A single stream notification
#[derive(Debug)]
pub enum Signal<T> {
    Next(T),
    Error(Error),
    Complete,
}

impl<T> Signal<T> {
    fn is_terminal(&self) -> bool {
        !matches!(self, Signal::Next(_))
    }
}

/// Observer wrapper that never calls its downstream concurrently or
/// re-entrantly.
///
/// Whoever pushes while nobody is emitting becomes the emitter and drains
/// the queue; a push that arrives during emission (from another thread, or
/// from inside the downstream itself) is queued and delivered by the current
/// emitter in push order. Nothing is delivered after a terminal signal.
pub struct Serialized<T> {
    downstream: ObserverRef<T>,
    state: Mutex<SerialState<T>>,
}

struct SerialState<T> {
    queue: VecDeque<Signal<T>>,
    emitting: bool,
    done: bool,
}

impl<T> Serialized<T> {
    pub fn new(downstream: ObserverRef<T>) -> Self {
        Self {
            downstream,
            state: Mutex::new(SerialState {
                queue: VecDeque::new(),
                emitting: false,
                done: false,
            }),
        }
    }

    /// Enqueue a signal, draining the queue if no one else is emitting
    pub fn push(&self, signal: Signal<T>) {
        if self.enqueue(signal) {
            self.drain();
        }
    }

    /// Enqueue without delivering.
    ///
    /// Returns `true` when the caller took the emitter role and must call
    /// [`drain`](Self::drain) once it has released its own locks. This lets
    /// an operator fix the delivery order under its lock without calling
    /// downstream while holding it.
    pub fn enqueue(&self, signal: Signal<T>) -> bool {
        let mut state = lock(&self.state);
        if state.done {
            return false;
        }
        if signal.is_terminal() {
            state.done = true;
        }
        state.queue.push_back(signal);
        if state.emitting {
            return false;
        }
        state.emitting = true;
        true
    }

    /// Deliver queued signals until the queue is empty.
    ///
    /// Only the caller that received `true` from `enqueue` may drain.
    pub fn drain(&self) {
        let mut guard = EmitGuard {
            state: &self.state,
            armed: true,
        };
        loop {
            let next = {
                let mut state = lock(&self.state);
                match state.queue.pop_front() {
                    Some(signal) => signal,
                    None => {
                        state.emitting = false;
                        guard.armed = false;
                        return;
                    }
                }
            };
            match next {
                Signal::Next(value) => self.downstream.on_next(value),
                Signal::Error(error) => self.downstream.on_error(error),
                Signal::Complete => self.downstream.on_complete(),
            }
        }
    }
}

impl<T: Send> Observer<T> for Serialized<T> {
    fn on_next(&self, value: T) {
        self.push(Signal::Next(value));
    }

    fn on_error(&self, error: Error) {
        self.push(Signal::Error(error));
    }

    fn on_complete(&self) {
        self.push(Signal::Complete);
    }
}

/// Releases the emitter role if a downstream call unwinds
struct EmitGuard<'a, T> {
    state: &'a Mutex<SerialState<T>>,
    armed: bool,
}

impl<T> Drop for EmitGuard<'_, T> {
    fn drop(&mut self) {
        if self.armed {
            let mut state = lock(self.state);
            state.emitting = false;
            state.queue.clear();
        }
    }
}
