//! Mutex helpers shared by the stream primitives

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Lock a mutex, recovering the guard if a previous holder panicked.
///
/// Stream state stays consistent across an observer panic because every
/// critical section only moves values in and out; nothing is left half-built.
pub fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
