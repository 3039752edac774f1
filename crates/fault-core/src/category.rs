//! Fault category registry and category masks.
//!
//! Category numbers mirror the hosting kernel's exception-type numbering and
//! mask bits are `1 << number`, matching the fault channel's registration mask
//! bit-for-bit.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use bitflags::bitflags;
use thiserror::Error;

/// Number of exception-type slots in the kernel numbering, including the unused slot 0.
pub const EXCEPTION_TYPES_COUNT: usize = 14;

/// Class of hardware or kernel raised execution fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
#[repr(i32)]
pub enum FaultCategory {
    /// Memory read or write without access rights.
    BadAccess = 1,
    /// Illegal or undefined instruction or operand.
    BadInstruction = 2,
    /// Arithmetic fault such as divide-by-zero.
    Arithmetic = 3,
    /// Emulation support instruction encountered.
    Emulation = 4,
    /// Software generated exception.
    Software = 5,
    /// Trace, breakpoint, or watchpoint.
    Breakpoint = 6,
    /// BSD system call.
    Syscall = 7,
    /// Kernel (Mach) system call.
    KernelSyscall = 8,
    /// RPC alert.
    RpcAlert = 9,
    /// Abnormal process exit.
    Crash = 10,
    /// Resource consumption limit hit.
    ResourceLimit = 11,
    /// Guarded resource protection violated.
    GuardViolation = 12,
    /// Abnormal exit into a corpse state.
    CorpseNotify = 13,
}

impl FaultCategory {
    /// Every category in kernel numbering order.
    pub const ALL: [Self; 13] = [
        Self::BadAccess,
        Self::BadInstruction,
        Self::Arithmetic,
        Self::Emulation,
        Self::Software,
        Self::Breakpoint,
        Self::Syscall,
        Self::KernelSyscall,
        Self::RpcAlert,
        Self::Crash,
        Self::ResourceLimit,
        Self::GuardViolation,
        Self::CorpseNotify,
    ];

    /// Converts a kernel exception-type number into a category.
    #[must_use]
    pub const fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            1 => Some(Self::BadAccess),
            2 => Some(Self::BadInstruction),
            3 => Some(Self::Arithmetic),
            4 => Some(Self::Emulation),
            5 => Some(Self::Software),
            6 => Some(Self::Breakpoint),
            7 => Some(Self::Syscall),
            8 => Some(Self::KernelSyscall),
            9 => Some(Self::RpcAlert),
            10 => Some(Self::Crash),
            11 => Some(Self::ResourceLimit),
            12 => Some(Self::GuardViolation),
            13 => Some(Self::CorpseNotify),
            _ => None,
        }
    }

    /// Kernel exception-type number.
    #[must_use]
    pub const fn as_raw(self) -> i32 {
        self as i32
    }

    /// Single-bit mask selecting this category.
    #[must_use]
    pub const fn mask(self) -> FaultMask {
        FaultMask::from_bits_retain(1 << self.as_raw())
    }

    /// Stable kebab-case name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::BadAccess => "bad-access",
            Self::BadInstruction => "bad-instruction",
            Self::Arithmetic => "arithmetic",
            Self::Emulation => "emulation",
            Self::Software => "software",
            Self::Breakpoint => "breakpoint",
            Self::Syscall => "syscall",
            Self::KernelSyscall => "kernel-syscall",
            Self::RpcAlert => "rpc-alert",
            Self::Crash => "crash",
            Self::ResourceLimit => "resource-limit",
            Self::GuardViolation => "guard-violation",
            Self::CorpseNotify => "corpse-notify",
        }
    }
}

impl fmt::Display for FaultCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Parse failure for a category name or number.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown fault category `{0}`")]
pub struct UnknownCategory(pub String);

impl FromStr for FaultCategory {
    type Err = UnknownCategory;

    /// Accepts the kebab-case name or the kernel number.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Ok(raw) = trimmed.parse::<i32>() {
            return Self::from_raw(raw).ok_or_else(|| UnknownCategory(s.to_string()));
        }
        Self::ALL
            .into_iter()
            .find(|category| category.name().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| UnknownCategory(s.to_string()))
    }
}

bitflags! {
    /// Set of fault categories encoded as the kernel's registration mask.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    #[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
    pub struct FaultMask: u32 {
        /// [`FaultCategory::BadAccess`].
        const BAD_ACCESS = 1 << 1;
        /// [`FaultCategory::BadInstruction`].
        const BAD_INSTRUCTION = 1 << 2;
        /// [`FaultCategory::Arithmetic`].
        const ARITHMETIC = 1 << 3;
        /// [`FaultCategory::Emulation`].
        const EMULATION = 1 << 4;
        /// [`FaultCategory::Software`].
        const SOFTWARE = 1 << 5;
        /// [`FaultCategory::Breakpoint`].
        const BREAKPOINT = 1 << 6;
        /// [`FaultCategory::Syscall`].
        const SYSCALL = 1 << 7;
        /// [`FaultCategory::KernelSyscall`].
        const KERNEL_SYSCALL = 1 << 8;
        /// [`FaultCategory::RpcAlert`].
        const RPC_ALERT = 1 << 9;
        /// [`FaultCategory::Crash`].
        const CRASH = 1 << 10;
        /// [`FaultCategory::ResourceLimit`].
        const RESOURCE_LIMIT = 1 << 11;
        /// [`FaultCategory::GuardViolation`].
        const GUARD_VIOLATION = 1 << 12;
        /// [`FaultCategory::CorpseNotify`].
        const CORPSE_NOTIFY = 1 << 13;
    }
}

impl FaultMask {
    /// Every known category.
    pub const ALL_CATEGORIES: Self = Self::all();

    /// Hardware faults normally guarded around untrusted code.
    pub const HARDWARE: Self = Self::BAD_ACCESS
        .union(Self::BAD_INSTRUCTION)
        .union(Self::ARITHMETIC)
        .union(Self::BREAKPOINT);

    /// Converts a raw registration mask, dropping bits with no category.
    #[must_use]
    pub const fn from_exception_mask(raw: u32) -> Self {
        Self::from_bits_truncate(raw)
    }

    /// Raw registration mask passed to the fault channel.
    #[must_use]
    pub const fn exception_mask(self) -> u32 {
        self.bits()
    }

    /// Returns true when `category` is in the set.
    #[must_use]
    pub const fn includes(self, category: FaultCategory) -> bool {
        self.contains(category.mask())
    }

    /// Categories in the set, in kernel numbering order.
    #[must_use]
    pub fn categories(self) -> BTreeSet<FaultCategory> {
        categories_for(self)
    }
}

impl From<FaultCategory> for FaultMask {
    fn from(category: FaultCategory) -> Self {
        category.mask()
    }
}

impl FromIterator<FaultCategory> for FaultMask {
    fn from_iter<I: IntoIterator<Item = FaultCategory>>(iter: I) -> Self {
        mask_for(iter)
    }
}

/// OR-reduces the per-category bits of `categories`.
#[must_use]
pub fn mask_for<I>(categories: I) -> FaultMask
where
    I: IntoIterator<Item = FaultCategory>,
{
    categories
        .into_iter()
        .fold(FaultMask::empty(), |mask, category| mask | category.mask())
}

/// Inverse of [`mask_for`].
#[must_use]
pub fn categories_for(mask: FaultMask) -> BTreeSet<FaultCategory> {
    FaultCategory::ALL
        .into_iter()
        .filter(|category| mask.includes(*category))
        .collect()
}
