//! In-process fault port for injecting faults without kernel support.
//!
//! [`LoopbackPort`] hands out channels that deliver faults raised through a
//! [`FaultInjector`]. It counts arm and disarm calls and can be scripted to
//! fail, which makes every race engine exit path observable in tests and in
//! offline replays of captured triples.

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use fault_core::{FaultMask, RawFault};
use log::debug;

use crate::channel::{ChannelError, FaultChannel, FaultPort, ReceiveError};

#[derive(Debug, Default)]
struct State {
    pending: VecDeque<RawFault>,
    armed: Option<FaultMask>,
    arm_count: usize,
    disarm_count: usize,
    receive_count: usize,
    arm_failures: VecDeque<ChannelError>,
    receive_failures: VecDeque<ChannelError>,
}

#[derive(Debug, Default)]
struct Shared {
    state: Mutex<State>,
    delivered: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Fault port backed by an in-memory queue.
#[derive(Debug, Clone, Default)]
pub struct LoopbackPort {
    shared: Arc<Shared>,
}

impl LoopbackPort {
    /// Creates a port with nothing queued.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle that raises faults into this port.
    #[must_use]
    pub fn injector(&self) -> FaultInjector {
        FaultInjector {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Makes the next [`FaultPort::arm`] fail with `error`.
    pub fn fail_next_arm(&self, error: ChannelError) {
        self.shared.lock().arm_failures.push_back(error);
    }

    /// Makes the next non-timeout [`FaultChannel::receive`] fail with `error`.
    pub fn fail_next_receive(&self, error: ChannelError) {
        self.shared.lock().receive_failures.push_back(error);
        self.shared.delivered.notify_all();
    }

    /// Successful arm calls so far.
    #[must_use]
    pub fn arm_count(&self) -> usize {
        self.shared.lock().arm_count
    }

    /// Effective disarm calls so far; repeated disarms of one channel count once.
    #[must_use]
    pub fn disarm_count(&self) -> usize {
        self.shared.lock().disarm_count
    }

    /// Receive calls so far, including timeouts.
    #[must_use]
    pub fn receive_count(&self) -> usize {
        self.shared.lock().receive_count
    }

    /// Mask of the channel currently armed, if any.
    #[must_use]
    pub fn armed_mask(&self) -> Option<FaultMask> {
        self.shared.lock().armed
    }

    /// Faults routed to the armed channel but not yet received.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.shared.lock().pending.len()
    }
}

impl FaultPort for LoopbackPort {
    type Channel = LoopbackChannel;

    fn arm(&self, mask: FaultMask) -> Result<Self::Channel, ChannelError> {
        let mut state = self.shared.lock();
        if let Some(error) = state.arm_failures.pop_front() {
            return Err(error);
        }
        if state.armed.is_some() {
            return Err(ChannelError::Rejected(
                "a loopback channel is already armed".to_string(),
            ));
        }
        state.armed = Some(mask);
        state.arm_count += 1;
        drop(state);
        Ok(LoopbackChannel {
            shared: Arc::clone(&self.shared),
            mask,
            armed: true,
        })
    }
}

/// Channel produced by [`LoopbackPort`].
#[derive(Debug)]
pub struct LoopbackChannel {
    shared: Arc<Shared>,
    mask: FaultMask,
    armed: bool,
}

impl LoopbackChannel {
    /// Categories this channel was armed for.
    #[must_use]
    pub const fn mask(&self) -> FaultMask {
        self.mask
    }

    fn take_matching(&self, state: &mut State) -> Option<RawFault> {
        let index = state
            .pending
            .iter()
            .position(|raw| self.mask.includes(raw.category))?;
        state.pending.remove(index)
    }
}

impl FaultChannel for LoopbackChannel {
    fn receive(&mut self, timeout: Duration) -> Result<RawFault, ReceiveError> {
        if !self.armed {
            return Err(ChannelError::Receive("channel is disarmed".to_string()).into());
        }
        let deadline = Instant::now() + timeout;
        let mut state = self.shared.lock();
        state.receive_count += 1;
        loop {
            if let Some(error) = state.receive_failures.pop_front() {
                return Err(error.into());
            }
            if let Some(raw) = self.take_matching(&mut state) {
                return Ok(raw);
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(ReceiveError::TimedOut);
            }
            state = self
                .shared
                .delivered
                .wait_timeout(state, remaining)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }

    fn disarm(&mut self) -> Result<(), ChannelError> {
        if !self.armed {
            return Ok(());
        }
        self.armed = false;
        let mut state = self.shared.lock();
        state.armed = None;
        state.disarm_count += 1;
        state.pending.clear();
        Ok(())
    }
}

/// Raises faults into a [`LoopbackPort`] from any thread.
#[derive(Debug, Clone)]
pub struct FaultInjector {
    shared: Arc<Shared>,
}

impl FaultInjector {
    /// Queues `raw` for the armed channel and wakes any blocked receive.
    ///
    /// Returns false, dropping the fault, when no channel is armed for its
    /// category.
    pub fn raise(&self, raw: RawFault) -> bool {
        let mut state = self.shared.lock();
        if !state
            .armed
            .is_some_and(|mask| mask.includes(raw.category))
        {
            drop(state);
            debug!("dropping {raw}: no channel armed for {}", raw.category);
            return false;
        }
        state.pending.push_back(raw);
        drop(state);
        self.shared.delivered.notify_all();
        true
    }
}

#[cfg(test)]
mod tests {
    use std::thread;
    use std::time::Duration;

    use fault_core::{FaultCategory, FaultMask, RawFault};

    use super::LoopbackPort;
    use crate::channel::{ChannelError, FaultChannel, FaultPort, ReceiveError};

    const TICK: Duration = Duration::from_millis(5);

    #[test]
    fn receive_times_out_when_nothing_is_raised() {
        let port = LoopbackPort::new();
        let mut channel = port.arm(FaultMask::HARDWARE).expect("arm");
        assert_eq!(channel.receive(TICK), Err(ReceiveError::TimedOut));
        assert_eq!(port.receive_count(), 1);
    }

    #[test]
    fn raised_fault_is_delivered() {
        let port = LoopbackPort::new();
        let mut channel = port.arm(FaultMask::BAD_ACCESS).expect("arm");
        let raw = RawFault::with_codes(FaultCategory::BadAccess, 1, 0x10);
        assert!(port.injector().raise(raw));
        assert_eq!(channel.receive(TICK), Ok(raw));
        assert_eq!(port.pending(), 0);
    }

    #[test]
    fn fault_raised_from_another_thread_wakes_receiver() {
        let port = LoopbackPort::new();
        let mut channel = port.arm(FaultMask::BREAKPOINT).expect("arm");
        let injector = port.injector();
        let raw = RawFault::with_codes(FaultCategory::Breakpoint, 1, 0);
        let raiser = thread::spawn(move || {
            thread::sleep(TICK);
            injector.raise(raw)
        });
        assert_eq!(channel.receive(Duration::from_secs(5)), Ok(raw));
        assert!(raiser.join().expect("raiser thread"));
    }

    #[test]
    fn faults_outside_the_mask_are_not_delivered() {
        let port = LoopbackPort::new();
        let mut channel = port.arm(FaultMask::ARITHMETIC).expect("arm");
        let raw = RawFault::with_codes(FaultCategory::BadAccess, 1, 0);
        assert!(!port.injector().raise(raw));
        assert_eq!(channel.receive(TICK), Err(ReceiveError::TimedOut));
        assert_eq!(port.pending(), 0);
    }

    #[test]
    fn faults_raised_while_disarmed_are_dropped() {
        let port = LoopbackPort::new();
        let raw = RawFault::with_codes(FaultCategory::BadAccess, 13, 0);
        assert!(!port.injector().raise(raw));
        assert_eq!(port.pending(), 0);

        let mut channel = port.arm(FaultMask::BAD_ACCESS).expect("arm");
        assert_eq!(channel.receive(TICK), Err(ReceiveError::TimedOut));
    }

    #[test]
    fn disarm_discards_undelivered_faults() {
        let port = LoopbackPort::new();
        let mut first = port.arm(FaultMask::BAD_ACCESS).expect("first arm");
        assert!(port
            .injector()
            .raise(RawFault::with_codes(FaultCategory::BadAccess, 1, 0)));
        first.disarm().expect("disarm");
        assert_eq!(port.pending(), 0);

        let mut second = port.arm(FaultMask::BAD_ACCESS).expect("second arm");
        assert_eq!(second.receive(TICK), Err(ReceiveError::TimedOut));
    }

    #[test]
    fn scripted_failures_fire_once() {
        let port = LoopbackPort::new();
        port.fail_next_arm(ChannelError::Allocation("no ports".into()));
        assert!(port.arm(FaultMask::HARDWARE).is_err());
        assert_eq!(port.arm_count(), 0);

        let mut channel = port.arm(FaultMask::HARDWARE).expect("second arm");
        port.fail_next_receive(ChannelError::Receive("port died".into()));
        assert_eq!(
            channel.receive(TICK),
            Err(ReceiveError::Failed(ChannelError::Receive("port died".into())))
        );
        assert_eq!(channel.receive(TICK), Err(ReceiveError::TimedOut));
    }

    #[test]
    fn disarm_is_idempotent_and_counted_once() {
        let port = LoopbackPort::new();
        let mut channel = port.arm(FaultMask::HARDWARE).expect("arm");
        assert_eq!(port.armed_mask(), Some(FaultMask::HARDWARE));
        channel.disarm().expect("disarm");
        channel.disarm().expect("second disarm");
        assert_eq!(port.disarm_count(), 1);
        assert_eq!(port.armed_mask(), None);
        assert!(matches!(
            channel.receive(TICK),
            Err(ReceiveError::Failed(_))
        ));
    }

    #[test]
    fn only_one_channel_may_be_armed() {
        let port = LoopbackPort::new();
        let _channel = port.arm(FaultMask::HARDWARE).expect("arm");
        assert!(matches!(
            port.arm(FaultMask::HARDWARE),
            Err(ChannelError::Rejected(_))
        ));
    }
}
