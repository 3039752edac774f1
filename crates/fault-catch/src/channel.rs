//! Fault channel collaborator interface.
//!
//! A [`FaultPort`] registers interest in a set of fault categories and hands
//! back a [`FaultChannel`] through which notifications arrive. The race engine
//! owns the channel for exactly one catch session.

use std::time::Duration;

use fault_core::{FaultMask, RawFault};
use thiserror::Error;

/// Failure to allocate, register, or service a fault channel.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChannelError {
    /// No channel could be allocated.
    #[error("fault channel allocation failed: {0}")]
    Allocation(String),
    /// The kernel rejected the registration or handler install.
    #[error("fault channel registration rejected: {0}")]
    Rejected(String),
    /// A receive failed for a reason other than timing out.
    #[error("fault channel receive failed: {0}")]
    Receive(String),
    /// Releasing the channel failed.
    #[error("fault channel release failed: {0}")]
    Release(String),
}

/// Outcome of a bounded receive that produced no fault.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReceiveError {
    /// Nothing arrived within the timeout. Not a failure; the listener re-polls.
    #[error("no fault within the receive timeout")]
    TimedOut,
    /// The channel failed.
    #[error(transparent)]
    Failed(#[from] ChannelError),
}

/// Registers fault channels.
pub trait FaultPort {
    /// Channel produced by [`FaultPort::arm`].
    type Channel: FaultChannel;

    /// Registers interest in the categories of `mask` for the whole task.
    ///
    /// The race engine arms on the caller thread but runs the operation on a
    /// separate worker thread, so registration must cover every thread of the
    /// task. A backend that can only register the calling thread never sees
    /// the worker's faults.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError`] when allocation or registration fails.
    fn arm(&self, mask: FaultMask) -> Result<Self::Channel, ChannelError>;
}

/// An armed fault channel.
pub trait FaultChannel: Send {
    /// Blocks up to `timeout` for the next fault notification.
    ///
    /// # Errors
    ///
    /// Returns [`ReceiveError::TimedOut`] when nothing arrives in time and
    /// [`ReceiveError::Failed`] when the channel breaks.
    fn receive(&mut self, timeout: Duration) -> Result<RawFault, ReceiveError>;

    /// Releases the channel and restores prior fault routing. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::Release`] when the release is refused.
    fn disarm(&mut self) -> Result<(), ChannelError>;
}
