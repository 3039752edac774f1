//! Catch session configuration.

use std::time::Duration;

use fault_core::Arch;

use crate::flags::SafetyFlags;

/// Listener poll period used when none is configured.
pub const DEFAULT_LISTENER_TIMEOUT: Duration = Duration::from_millis(10);

/// Thread name given to the operation worker by default.
pub const DEFAULT_WORKER_NAME: &str = "fault-catch-operation";

/// Tunables for one catch call.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct CatchConfig {
    /// Upper bound of each blocking receive; cancellation is observed between polls.
    pub listener_timeout: Duration,
    /// Flags installed while the session is armed.
    pub session_flags: SafetyFlags,
    /// Name of the operation worker thread.
    pub worker_name: String,
    /// Processor family for decoding; `None` uses the host family.
    pub arch: Option<Arch>,
}

impl CatchConfig {
    /// Replaces the listener poll period.
    #[must_use]
    #[allow(clippy::missing_const_for_fn)]
    pub fn with_listener_timeout(mut self, timeout: Duration) -> Self {
        self.listener_timeout = timeout;
        self
    }

    /// Replaces the flags installed while armed.
    #[must_use]
    #[allow(clippy::missing_const_for_fn)]
    pub fn with_session_flags(mut self, flags: SafetyFlags) -> Self {
        self.session_flags = flags;
        self
    }

    /// Replaces the operation worker's thread name.
    #[must_use]
    pub fn with_worker_name(mut self, name: impl Into<String>) -> Self {
        self.worker_name = name.into();
        self
    }

    /// Decodes faults for `arch` instead of the host family.
    #[must_use]
    #[allow(clippy::missing_const_for_fn)]
    pub fn with_arch(mut self, arch: Arch) -> Self {
        self.arch = Some(arch);
        self
    }
}

impl Default for CatchConfig {
    fn default() -> Self {
        Self {
            listener_timeout: DEFAULT_LISTENER_TIMEOUT,
            session_flags: SafetyFlags::RELAXED,
            worker_name: DEFAULT_WORKER_NAME.to_string(),
            arch: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use fault_core::Arch;

    use super::{CatchConfig, DEFAULT_LISTENER_TIMEOUT};
    use crate::flags::SafetyFlags;

    #[test]
    fn defaults_relax_both_flags() {
        let config = CatchConfig::default();
        assert_eq!(config.listener_timeout, DEFAULT_LISTENER_TIMEOUT);
        assert_eq!(config.session_flags, SafetyFlags::RELAXED);
        assert_eq!(config.arch, None);
    }

    #[test]
    fn builders_replace_single_fields() {
        let config = CatchConfig::default()
            .with_listener_timeout(Duration::from_millis(2))
            .with_worker_name("fault-worker")
            .with_arch(Arch::X86_64)
            .with_session_flags(SafetyFlags::STRICT);
        assert_eq!(config.listener_timeout, Duration::from_millis(2));
        assert_eq!(config.worker_name, "fault-worker");
        assert_eq!(config.arch, Some(Arch::X86_64));
        assert_eq!(config.session_flags, SafetyFlags::STRICT);
    }
}
