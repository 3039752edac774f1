//! Single-assignment resolution point and cooperative cancellation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};

#[derive(Debug)]
struct Slot<T> {
    resolved: bool,
    value: Option<T>,
}

/// Cell that accepts the first value written and discards the rest.
#[derive(Debug)]
pub struct Resolution<T> {
    slot: Mutex<Slot<T>>,
    ready: Condvar,
}

impl<T> Resolution<T> {
    /// Creates an unresolved cell.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            slot: Mutex::new(Slot {
                resolved: false,
                value: None,
            }),
            ready: Condvar::new(),
        }
    }

    /// Offers `value`; returns false, dropping it, when the cell was already resolved.
    pub fn resolve(&self, value: T) -> bool {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.resolved {
            return false;
        }
        slot.resolved = true;
        slot.value = Some(value);
        drop(slot);
        self.ready.notify_all();
        true
    }

    /// Returns true once a value has been accepted.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .resolved
    }

    /// Blocks until resolved and moves the winning value out.
    ///
    /// The cell has a single consumer: after the value is taken, later calls
    /// block forever.
    pub fn wait(&self) -> T {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            if let Some(value) = slot.value.take() {
                return value;
            }
            slot = self
                .ready
                .wait(slot)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }
}

impl<T> Default for Resolution<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Cooperative cancellation flag shared with the operation.
#[derive(Debug, Clone, Default)]
pub struct Cancellation {
    cancelled: Arc<AtomicBool>,
}

impl Cancellation {
    /// Creates a token that is not cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true once the session has resolved and the holder should stop.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Requests cancellation. Idempotent.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }
}
