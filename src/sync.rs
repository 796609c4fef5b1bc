//! Synchronisation primitives, swapped for `loom` models under `cfg(loom)`.

use std::sync::{PoisonError, TryLockError};

#[cfg(loom)]
pub(crate) use loom::sync::{
    Arc,
    Mutex,
    MutexGuard,
    atomic::{AtomicBool, AtomicU8, Ordering},
};
#[cfg(not(loom))]
pub(crate) use std::sync::{
    Arc,
    Mutex,
    MutexGuard,
    atomic::{AtomicBool, AtomicU8, Ordering},
};

/// Lock from the main loop. A poisoned lock still guards consistent state
/// because every mutation path resets on error, so the guard is recovered.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Lock from callback context without waiting. `None` means another context
/// holds the lock and the caller must skip this cycle.
pub(crate) fn try_lock<T>(mutex: &Mutex<T>) -> Option<MutexGuard<'_, T>> {
    match mutex.try_lock() {
        Ok(guard) => Some(guard),
        Err(TryLockError::Poisoned(poisoned)) => Some(poisoned.into_inner()),
        Err(TryLockError::WouldBlock) => None,
    }
}
