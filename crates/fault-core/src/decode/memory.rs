//! Bad-access (illegal memory access) codes.

use crate::Arch;

use super::{narrow, unsigned};

/// Lowest kernel return code, reported for a virtual-memory fault.
pub const KERN_SUCCESS: i32 = 0;
/// Highest kernel return code.
pub const KERN_RETURN_MAX: i32 = 0x100;

/// ARM data access alignment fault.
pub const EXC_ARM_DA_ALIGN: i32 = 0x101;
/// ARM data access debug (watchpoint) fault.
pub const EXC_ARM_DA_DEBUG: i32 = 0x102;
/// ARM stack pointer alignment fault.
pub const EXC_ARM_SP_ALIGN: i32 = 0x103;
/// ARM SWP instruction data abort.
pub const EXC_ARM_SWP: i32 = 0x104;
/// ARM pointer authentication failure.
pub const EXC_ARM_PAC_FAIL: i32 = 0x105;

/// `VM_PROT_READ | VM_PROT_EXECUTE`, reported for an FPU segment overrun.
pub const EXC_I386_FPU_SEGMENT_OVERRUN: i32 = 0x1 | 0x4;
/// x86 general protection trap number.
pub const EXC_I386_GPFLT: i32 = 13;

/// Cause of a bad-access fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum BadAccessCode {
    /// Virtual-memory fault carrying the kernel return code.
    VmFault {
        /// Kernel return code in `KERN_SUCCESS..=KERN_RETURN_MAX`.
        kern_return: i32,
    },
    /// Misaligned data access (arm64).
    DataAlignment,
    /// Watchpoint hit on data access (arm64).
    DataDebug,
    /// Misaligned stack pointer (arm64).
    StackPointerAlignment,
    /// SWP instruction data abort (arm64).
    SwapInstruction,
    /// Pointer authentication failure (arm64).
    PointerAuthentication,
    /// FPU overran a segment (`x86_64`).
    FpuSegmentOverrun,
    /// General protection fault (`x86_64`).
    GeneralProtection,
}

impl BadAccessCode {
    /// Classifies `code` for `arch`. Named codes win over the VM-fault range.
    #[must_use]
    pub fn from_code(arch: Arch, code: i64) -> Option<Self> {
        let code = narrow(code)?;
        let named = match arch {
            Arch::Arm64 => match code {
                EXC_ARM_DA_ALIGN => Some(Self::DataAlignment),
                EXC_ARM_DA_DEBUG => Some(Self::DataDebug),
                EXC_ARM_SP_ALIGN => Some(Self::StackPointerAlignment),
                EXC_ARM_SWP => Some(Self::SwapInstruction),
                EXC_ARM_PAC_FAIL => Some(Self::PointerAuthentication),
                _ => None,
            },
            Arch::X86_64 => match code {
                EXC_I386_FPU_SEGMENT_OVERRUN => Some(Self::FpuSegmentOverrun),
                EXC_I386_GPFLT => Some(Self::GeneralProtection),
                _ => None,
            },
        };
        named.or_else(|| {
            (KERN_SUCCESS..=KERN_RETURN_MAX)
                .contains(&code)
                .then_some(Self::VmFault { kern_return: code })
        })
    }
}

/// Decoded bad-access fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct BadAccessInfo {
    /// Cause of the fault.
    pub code: BadAccessCode,
    /// Faulting address on arm64; on `x86_64` the segment selector or IDT
    /// vector for a general protection fault raised while loading a
    /// descriptor, otherwise zero.
    pub address: u64,
}

pub(super) fn decode(arch: Arch, code: Option<i64>, subcode: Option<i64>) -> Option<BadAccessInfo> {
    let (code, subcode) = (code?, subcode?);
    Some(BadAccessInfo {
        code: BadAccessCode::from_code(arch, code)?,
        address: unsigned(subcode),
    })
}
