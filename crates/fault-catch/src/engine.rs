//! Fault-catch race engine.
//!
//! A call moves through `Idle -> Armed -> Racing -> Resolved -> Torn-down`.
//! Arming installs the session flags and registers the fault channel. Racing
//! runs the listener on a scoped thread and the operation on a detached
//! worker, both writing into one [`Resolution`]. The first writer wins; the
//! caller then cancels the loser, joins the listener, and drops the session
//! before decoding or returning anything.

use std::any::Any;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use fault_core::{mask_for, DecodedFault, Decoder, FaultCategory, RawFault};
use log::{debug, info, trace, warn};
use thiserror::Error;

use crate::channel::{ChannelError, FaultChannel, FaultPort, ReceiveError};
use crate::config::CatchConfig;
use crate::flags::{process_safety_flags, SafetyFlagStore};
use crate::resolution::{Cancellation, Resolution};
use crate::session::CatchSession;

/// Failure outcome of a catch call.
#[derive(Debug, Error)]
pub enum CatchError<E> {
    /// The fault channel could not be armed, or broke while listening.
    #[error("fault channel registration failed: {0}")]
    Registration(#[source] ChannelError),
    /// A fault was caught and classified.
    #[error("caught {0}")]
    Fault(DecodedFault),
    /// A fault was caught but matched no known layout.
    #[error("unrecognized fault {0}")]
    Unrecognized(RawFault),
    /// The operation returned its own error.
    #[error("operation failed: {0}")]
    Operation(E),
    /// The operation worker thread could not be started.
    #[error("failed to start operation worker: {0}")]
    Spawn(#[source] io::Error),
}

impl<E> CatchError<E> {
    /// The decoded fault, when this error is one.
    #[must_use]
    pub const fn fault(&self) -> Option<&DecodedFault> {
        match self {
            Self::Fault(decoded) => Some(decoded),
            _ => None,
        }
    }

    /// Returns true for [`CatchError::Fault`] and [`CatchError::Unrecognized`].
    #[must_use]
    pub const fn is_fault(&self) -> bool {
        matches!(self, Self::Fault(_) | Self::Unrecognized(_))
    }
}

enum Outcome<T, E> {
    Operation(Result<T, E>),
    Panicked(Box<dyn Any + Send>),
    Fault(RawFault),
    ListenerFailed(ChannelError),
}

/// Runs `operation` while listening for `categories` on `port`.
///
/// Uses the process-wide safety flags and the default configuration with
/// `timeout` as the listener poll period.
///
/// # Errors
///
/// See [`catch_with`].
pub fn catch<P, I, F, T, E>(
    port: &P,
    categories: I,
    timeout: Duration,
    operation: F,
) -> Result<T, CatchError<E>>
where
    P: FaultPort + ?Sized,
    I: IntoIterator<Item = FaultCategory>,
    F: FnOnce(Cancellation) -> Result<T, E> + Send + 'static,
    T: Send + 'static,
    E: Send + 'static,
{
    let config = CatchConfig::default().with_listener_timeout(timeout);
    catch_with(port, process_safety_flags(), &config, categories, operation)
}

/// Runs `operation` while listening for `categories` on `port`, relaxing
/// `flags` to `config.session_flags` for the duration of the call.
///
/// The operation receives a [`Cancellation`] it may poll; it is never
/// interrupted. When a fault wins, an operation still running keeps running
/// on its worker and its eventual result is discarded. A panic in the
/// operation resumes on the caller after teardown.
///
/// # Errors
///
/// - [`CatchError::Registration`] when arming fails or the listener's receive
///   breaks.
/// - [`CatchError::Spawn`] when the worker thread cannot start.
/// - [`CatchError::Fault`] or [`CatchError::Unrecognized`] when a fault wins.
/// - [`CatchError::Operation`] when the operation returns an error.
///
/// The channel is released and `flags` restored before any of these return.
pub fn catch_with<P, S, I, F, T, E>(
    port: &P,
    flags: &S,
    config: &CatchConfig,
    categories: I,
    operation: F,
) -> Result<T, CatchError<E>>
where
    P: FaultPort + ?Sized,
    S: SafetyFlagStore + ?Sized,
    I: IntoIterator<Item = FaultCategory>,
    F: FnOnce(Cancellation) -> Result<T, E> + Send + 'static,
    T: Send + 'static,
    E: Send + 'static,
{
    catch_with_finally(port, flags, config, categories, operation, || {})
}

/// [`catch_with`], running `finally` once the race has resolved.
///
/// `finally` runs on the caller thread after teardown, whether the operation
/// returned, failed, or panicked, or a fault won. It does not run when the
/// call fails before racing ([`CatchError::Registration`] from arming, or
/// [`CatchError::Spawn`]).
///
/// # Errors
///
/// See [`catch_with`].
pub fn catch_with_finally<P, S, I, F, G, T, E>(
    port: &P,
    flags: &S,
    config: &CatchConfig,
    categories: I,
    operation: F,
    finally: G,
) -> Result<T, CatchError<E>>
where
    P: FaultPort + ?Sized,
    S: SafetyFlagStore + ?Sized,
    I: IntoIterator<Item = FaultCategory>,
    F: FnOnce(Cancellation) -> Result<T, E> + Send + 'static,
    G: FnOnce(),
    T: Send + 'static,
    E: Send + 'static,
{
    let mask = mask_for(categories);
    let mut session = CatchSession::arm(port, mask, flags, config.session_flags)
        .map_err(CatchError::Registration)?;

    let resolution = Arc::new(Resolution::new());
    let cancellation = Cancellation::new();
    let outcome = race(
        session.channel_mut(),
        config,
        &resolution,
        &cancellation,
        operation,
    )?;
    drop(session);
    debug!("catch session torn down");
    finally();

    match outcome {
        Outcome::Operation(Ok(value)) => Ok(value),
        Outcome::Operation(Err(error)) => Err(CatchError::Operation(error)),
        Outcome::Panicked(payload) => panic::resume_unwind(payload),
        Outcome::ListenerFailed(error) => Err(CatchError::Registration(error)),
        Outcome::Fault(raw) => {
            let decoder = config.arch.map_or_else(Decoder::host, Decoder::for_arch);
            match decoder.decode_raw(&raw) {
                Some(decoded) => {
                    info!("caught {decoded}");
                    Err(CatchError::Fault(decoded))
                }
                None => {
                    warn!("caught unrecognized fault {raw}");
                    Err(CatchError::Unrecognized(raw))
                }
            }
        }
    }
}

fn race<C, F, T, E>(
    channel: &mut C,
    config: &CatchConfig,
    resolution: &Arc<Resolution<Outcome<T, E>>>,
    cancellation: &Cancellation,
    operation: F,
) -> Result<Outcome<T, E>, CatchError<E>>
where
    C: FaultChannel,
    F: FnOnce(Cancellation) -> Result<T, E> + Send + 'static,
    T: Send + 'static,
    E: Send + 'static,
{
    let timeout = config.listener_timeout;
    thread::scope(|scope| {
        let _stop_listener = CancelOnDrop(cancellation);
        let listener_resolution: &Resolution<Outcome<T, E>> = resolution;
        scope.spawn(move || listen(channel, timeout, cancellation, listener_resolution));

        spawn_operation(
            &config.worker_name,
            operation,
            cancellation.clone(),
            Arc::clone(resolution),
        )
        .map_err(CatchError::Spawn)?;

        let outcome = resolution.wait();
        debug!("race resolved by the {}", outcome.winner());
        Ok(outcome)
    })
}

fn listen<C, T, E>(
    channel: &mut C,
    timeout: Duration,
    cancellation: &Cancellation,
    resolution: &Resolution<Outcome<T, E>>,
) where
    C: FaultChannel,
{
    while !cancellation.is_cancelled() {
        match channel.receive(timeout) {
            Ok(raw) => {
                resolution.resolve(Outcome::Fault(raw));
                return;
            }
            Err(ReceiveError::TimedOut) => trace!("no fault within {timeout:?}; polling again"),
            Err(ReceiveError::Failed(error)) => {
                resolution.resolve(Outcome::ListenerFailed(error));
                return;
            }
        }
    }
    debug!("listener observed cancellation");
}

fn spawn_operation<F, T, E>(
    name: &str,
    operation: F,
    cancellation: Cancellation,
    resolution: Arc<Resolution<Outcome<T, E>>>,
) -> io::Result<()>
where
    F: FnOnce(Cancellation) -> Result<T, E> + Send + 'static,
    T: Send + 'static,
    E: Send + 'static,
{
    thread::Builder::new()
        .name(name.to_string())
        .spawn(move || {
            let outcome = match panic::catch_unwind(AssertUnwindSafe(|| operation(cancellation))) {
                Ok(result) => Outcome::Operation(result),
                Err(payload) => Outcome::Panicked(payload),
            };
            if !resolution.resolve(outcome) {
                warn!("operation outlived its catch session; result discarded");
            }
        })
        .map(drop)
}

impl<T, E> Outcome<T, E> {
    const fn winner(&self) -> &'static str {
        match self {
            Self::Operation(_) | Self::Panicked(_) => "operation",
            Self::Fault(_) | Self::ListenerFailed(_) => "listener",
        }
    }
}

struct CancelOnDrop<'a>(&'a Cancellation);

impl Drop for CancelOnDrop<'_> {
    fn drop(&mut self) {
        self.0.cancel();
    }
}
