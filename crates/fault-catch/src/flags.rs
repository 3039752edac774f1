//! Process-wide safety flags and scoped save/restore.

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Process-wide switches a catch session relaxes while it is armed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct SafetyFlags {
    /// Escalate runtime fatal errors to process termination.
    pub fatal_error_escalation: bool,
    /// Enforce exclusive-access checking.
    pub exclusivity_checking: bool,
}

impl SafetyFlags {
    /// Both checks enabled; the state of a process that never caught a fault.
    pub const STRICT: Self = Self {
        fatal_error_escalation: true,
        exclusivity_checking: true,
    };

    /// Both checks disabled, so a fault can be intercepted instead of terminating.
    pub const RELAXED: Self = Self {
        fatal_error_escalation: false,
        exclusivity_checking: false,
    };
}

impl Default for SafetyFlags {
    fn default() -> Self {
        Self::STRICT
    }
}

/// Storage holding the current [`SafetyFlags`].
///
/// Holders may overlap in any order. The flags in place before the first
/// holder entered are restored when the last holder exits.
pub trait SafetyFlagStore {
    /// Current flags.
    fn load(&self) -> SafetyFlags;

    /// Installs `flags` for one more holder and returns the flags the last
    /// exit will restore.
    fn enter(&self, flags: SafetyFlags) -> SafetyFlags;

    /// Ends one holder. The last one restores the saved flags; an exit with
    /// no holder is ignored.
    fn exit(&self);
}

#[derive(Debug)]
struct Holders {
    current: SafetyFlags,
    saved: SafetyFlags,
    depth: usize,
}

/// Lock-protected, depth-counted [`SafetyFlagStore`].
#[derive(Debug)]
pub struct SafetyFlagCell {
    holders: Mutex<Holders>,
}

impl SafetyFlagCell {
    /// Creates a store holding `flags` with no holders.
    #[must_use]
    pub const fn new(flags: SafetyFlags) -> Self {
        Self {
            holders: Mutex::new(Holders {
                current: flags,
                saved: flags,
                depth: 0,
            }),
        }
    }

    /// Holders currently inside the store.
    #[must_use]
    pub fn holders(&self) -> usize {
        self.lock().depth
    }

    fn lock(&self) -> MutexGuard<'_, Holders> {
        self.holders.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for SafetyFlagCell {
    fn default() -> Self {
        Self::new(SafetyFlags::default())
    }
}

impl SafetyFlagStore for SafetyFlagCell {
    fn load(&self) -> SafetyFlags {
        self.lock().current
    }

    fn enter(&self, flags: SafetyFlags) -> SafetyFlags {
        let mut holders = self.lock();
        if holders.depth == 0 {
            holders.saved = holders.current;
        }
        holders.current = flags;
        holders.depth += 1;
        holders.saved
    }

    fn exit(&self) {
        let mut holders = self.lock();
        match holders.depth {
            0 => {}
            1 => {
                holders.depth = 0;
                holders.current = holders.saved;
            }
            _ => holders.depth -= 1,
        }
    }
}

static PROCESS_FLAGS: SafetyFlagCell = SafetyFlagCell::new(SafetyFlags::STRICT);

/// The process-wide flag store used by [`crate::catch`].
#[must_use]
pub fn process_safety_flags() -> &'static SafetyFlagCell {
    &PROCESS_FLAGS
}

/// Enters a [`SafetyFlagStore`] on creation and exits it on drop.
#[derive(Debug)]
pub struct FlagGuard<'a, S: SafetyFlagStore + ?Sized> {
    store: &'a S,
    saved: SafetyFlags,
}

impl<'a, S: SafetyFlagStore + ?Sized> FlagGuard<'a, S> {
    /// Installs `flags` in `store` as one more holder.
    #[must_use]
    pub fn acquire(store: &'a S, flags: SafetyFlags) -> Self {
        let saved = store.enter(flags);
        Self { store, saved }
    }

    /// Flags the store restores once its last holder exits.
    #[must_use]
    pub const fn saved(&self) -> SafetyFlags {
        self.saved
    }
}

impl<S: SafetyFlagStore + ?Sized> Drop for FlagGuard<'_, S> {
    fn drop(&mut self) {
        self.store.exit();
    }
}
