//! Breakpoint, watchpoint, and trace trap codes.

use crate::Arch;

use super::memory::EXC_ARM_DA_DEBUG;
use super::{narrow, unsigned};

/// ARM breakpoint trap.
pub const EXC_ARM_BREAKPOINT: i32 = 1;
/// First debugger trap instruction word.
pub const ARM_GDB_INSTR1: u32 = 0xe7ff_defe;
/// Second debugger trap instruction word.
pub const ARM_GDB_INSTR2: u32 = 0xe7ff_deff;

/// x86 single-step debug trap.
pub const EXC_I386_SGL: i32 = 1;
/// x86 breakpoint trap.
pub const EXC_I386_BPT: i32 = 2;
/// x86 BOUND range exceeded.
pub const EXC_I386_BOUND: i32 = 7;

/// Trap kind reported by `x86_64` breakpoint faults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum BreakpointTrap {
    /// Debug exception (single step or hardware breakpoint).
    Debug,
    /// `INT3` breakpoint.
    Breakpoint,
    /// `BOUND` range exceeded.
    OutOfBounds,
}

impl BreakpointTrap {
    const fn from_code(code: i32) -> Option<Self> {
        match code {
            EXC_I386_SGL => Some(Self::Debug),
            EXC_I386_BPT => Some(Self::Breakpoint),
            EXC_I386_BOUND => Some(Self::OutOfBounds),
            _ => None,
        }
    }
}

/// Decoded breakpoint fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum BreakpointInfo {
    /// Software breakpoint (arm64).
    Breakpoint {
        /// Address of the breakpoint.
        address: u64,
    },
    /// Debugger trap instruction (arm64).
    DebuggerTrap {
        /// One of [`ARM_GDB_INSTR1`] or [`ARM_GDB_INSTR2`].
        instruction: u32,
    },
    /// Hardware watchpoint hit (arm64).
    Watchpoint {
        /// Watched address that was accessed.
        address: u64,
    },
    /// Single-step trace trap (arm64).
    SingleStep,
    /// Trap on `x86_64`.
    Trap {
        /// Trap kind.
        kind: BreakpointTrap,
        /// Raw subcode reported with the trap.
        subcode: u64,
    },
}

pub(super) fn decode(arch: Arch, code: Option<i64>, subcode: Option<i64>) -> Option<BreakpointInfo> {
    let code = narrow(code?)?;
    let subcode = unsigned(subcode?);
    match arch {
        Arch::Arm64 => match code {
            EXC_ARM_BREAKPOINT => Some(arm64_breakpoint(subcode)),
            EXC_ARM_DA_DEBUG => Some(BreakpointInfo::Watchpoint { address: subcode }),
            _ => None,
        },
        Arch::X86_64 => {
            BreakpointTrap::from_code(code).map(|kind| BreakpointInfo::Trap { kind, subcode })
        }
    }
}

fn arm64_breakpoint(subcode: u64) -> BreakpointInfo {
    if subcode == 0 {
        return BreakpointInfo::SingleStep;
    }
    match u32::try_from(subcode) {
        Ok(instruction @ (ARM_GDB_INSTR1 | ARM_GDB_INSTR2)) => {
            BreakpointInfo::DebuggerTrap { instruction }
        }
        _ => BreakpointInfo::Breakpoint { address: subcode },
    }
}
