//! Kernel OS reason namespaces.

use std::fmt;

/// Subsystem that recorded an OS exit or guard reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
#[repr(u32)]
#[allow(missing_docs)]
pub enum OsReasonNamespace {
    Invalid = 0,
    Jetsam = 1,
    Signal = 2,
    CodeSigning = 3,
    HangTracer = 4,
    Test = 5,
    Dyld = 6,
    LibXpc = 7,
    ObjC = 8,
    Exec = 9,
    SpringBoard = 10,
    Tcc = 11,
    ReportCrash = 12,
    CoreAnimation = 13,
    Aggregated = 14,
    RunningBoard = 15,
    Assertiond = 16,
    Skywalk = 17,
    Settings = 18,
    LibSystem = 19,
    Foundation = 20,
    Watchdog = 21,
    Metal = 22,
    WatchKit = 23,
    Guard = 24,
    Analytics = 25,
    Sandbox = 26,
    Security = 27,
    EndpointSecurity = 28,
    PacException = 29,
    BluetoothChip = 30,
}

impl OsReasonNamespace {
    /// Every namespace in kernel numbering order.
    pub const ALL: [Self; 31] = [
        Self::Invalid,
        Self::Jetsam,
        Self::Signal,
        Self::CodeSigning,
        Self::HangTracer,
        Self::Test,
        Self::Dyld,
        Self::LibXpc,
        Self::ObjC,
        Self::Exec,
        Self::SpringBoard,
        Self::Tcc,
        Self::ReportCrash,
        Self::CoreAnimation,
        Self::Aggregated,
        Self::RunningBoard,
        Self::Assertiond,
        Self::Skywalk,
        Self::Settings,
        Self::LibSystem,
        Self::Foundation,
        Self::Watchdog,
        Self::Metal,
        Self::WatchKit,
        Self::Guard,
        Self::Analytics,
        Self::Sandbox,
        Self::Security,
        Self::EndpointSecurity,
        Self::PacException,
        Self::BluetoothChip,
    ];

    /// Looks up a namespace by its kernel number.
    #[must_use]
    pub fn from_raw(raw: u64) -> Option<Self> {
        usize::try_from(raw)
            .ok()
            .and_then(|index| Self::ALL.get(index).copied())
    }

    /// Kernel namespace number.
    #[must_use]
    pub const fn as_raw(self) -> u32 {
        self as u32
    }
}

impl fmt::Display for OsReasonNamespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}
