//! Scoped ownership of one armed fault channel.

use fault_core::FaultMask;
use log::{debug, warn};

use crate::channel::{ChannelError, FaultChannel, FaultPort};
use crate::flags::{FlagGuard, SafetyFlagStore, SafetyFlags};

/// Lifecycle of one catch call: owns the channel and the relaxed safety flags.
///
/// Dropping the session disarms the channel exactly once and then restores the
/// saved flags, on every exit path.
#[derive(Debug)]
pub struct CatchSession<'s, C: FaultChannel, S: SafetyFlagStore + ?Sized> {
    channel: C,
    disarmed: bool,
    flags: FlagGuard<'s, S>,
}

impl<'s, C: FaultChannel, S: SafetyFlagStore + ?Sized> CatchSession<'s, C, S> {
    /// Installs `flags` in `store`, then arms a channel on `port` for `mask`.
    ///
    /// # Errors
    ///
    /// Returns the port's [`ChannelError`]; the saved flags are already
    /// restored when this returns.
    pub fn arm<P>(
        port: &P,
        mask: FaultMask,
        store: &'s S,
        flags: SafetyFlags,
    ) -> Result<Self, ChannelError>
    where
        P: FaultPort<Channel = C> + ?Sized,
    {
        let guard = FlagGuard::acquire(store, flags);
        let channel = port.arm(mask)?;
        debug!("armed fault channel for mask {:#x}", mask.bits());
        Ok(Self {
            channel,
            disarmed: false,
            flags: guard,
        })
    }

    /// The armed channel.
    #[allow(clippy::missing_const_for_fn)]
    pub fn channel_mut(&mut self) -> &mut C {
        &mut self.channel
    }

    /// Flags restored when the session ends.
    #[must_use]
    pub const fn saved_flags(&self) -> SafetyFlags {
        self.flags.saved()
    }

    /// Releases the channel now. Later calls, including the one on drop, are no-ops.
    ///
    /// # Errors
    ///
    /// Returns the channel's release error. The session still counts as
    /// disarmed, so release is never retried.
    pub fn disarm(&mut self) -> Result<(), ChannelError> {
        if self.disarmed {
            return Ok(());
        }
        self.disarmed = true;
        debug!("disarming fault channel");
        self.channel.disarm()
    }
}

impl<C: FaultChannel, S: SafetyFlagStore + ?Sized> Drop for CatchSession<'_, C, S> {
    fn drop(&mut self) {
        if let Err(error) = self.disarm() {
            warn!("fault channel teardown failed: {error}");
        }
    }
}
