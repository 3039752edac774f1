//! Runs a unit of work while guarding it against hardware and kernel faults.
//!
//! [`catch`] arms a fault channel, races a listener against the operation,
//! and turns a fault that would otherwise be fatal into a [`CatchError`]
//! carrying the decoded fault.

/// Fault channel collaborator traits.
pub mod channel;
pub use channel::{ChannelError, FaultChannel, FaultPort, ReceiveError};

/// In-process fault port with fault injection.
pub mod loopback;
pub use loopback::{FaultInjector, LoopbackChannel, LoopbackPort};

/// Process-wide safety flags and scoped save/restore.
pub mod flags;
pub use flags::{process_safety_flags, FlagGuard, SafetyFlagCell, SafetyFlagStore, SafetyFlags};

/// Catch call configuration.
pub mod config;
pub use config::{CatchConfig, DEFAULT_LISTENER_TIMEOUT, DEFAULT_WORKER_NAME};

/// Single-assignment resolution and cancellation.
pub mod resolution;
pub use resolution::{Cancellation, Resolution};

/// Scoped channel and flag ownership for one catch call.
pub mod session;
pub use session::CatchSession;

/// The race engine entry points.
pub mod engine;
pub use engine::{catch, catch_with, catch_with_finally, CatchError};

#[cfg(test)]
use env_logger as _;
#[cfg(test)]
use rstest as _;
