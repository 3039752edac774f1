//! Bad-instruction codes.

use crate::Arch;

use super::memory::{KERN_RETURN_MAX, KERN_SUCCESS};
use super::{narrow, unsigned};

/// ARM undefined instruction.
pub const EXC_ARM_UNDEFINED: i32 = 1;

/// x86 invalid opcode.
pub const EXC_I386_INVOP: i32 = 1;
/// x86 invalid TSS trap number.
pub const EXC_I386_INVTSSFLT: i32 = 10;
/// x86 segment not present trap number.
pub const EXC_I386_SEGNPFLT: i32 = 11;
/// x86 stack fault trap number.
pub const EXC_I386_STKFLT: i32 = 12;

/// Cause of a bad-instruction fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum BadInstructionCode {
    /// Undefined instruction (arm64).
    Undefined,
    /// Invalid opcode (`x86_64`).
    InvalidOpcode,
    /// Invalid task state segment (`x86_64`).
    InvalidTss,
    /// Segment not present (`x86_64`).
    SegmentNotPresent,
    /// Stack fault (`x86_64`).
    StackFault,
    /// Unhandled page fault carrying the kernel return code (`x86_64`).
    PageFault {
        /// Kernel return code in `KERN_SUCCESS..=KERN_RETURN_MAX`.
        kern_return: i32,
    },
}

impl BadInstructionCode {
    /// Classifies `code` for `arch`. Named traps win over the page-fault range.
    #[must_use]
    pub fn from_code(arch: Arch, code: i64) -> Option<Self> {
        let code = narrow(code)?;
        match arch {
            Arch::Arm64 => (code == EXC_ARM_UNDEFINED).then_some(Self::Undefined),
            Arch::X86_64 => match code {
                EXC_I386_INVOP => Some(Self::InvalidOpcode),
                EXC_I386_INVTSSFLT => Some(Self::InvalidTss),
                EXC_I386_SEGNPFLT => Some(Self::SegmentNotPresent),
                EXC_I386_STKFLT => Some(Self::StackFault),
                KERN_SUCCESS..=KERN_RETURN_MAX => Some(Self::PageFault { kern_return: code }),
                _ => None,
            },
        }
    }
}

/// Decoded bad-instruction fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct BadInstructionInfo {
    /// Family the code was decoded for.
    pub arch: Arch,
    /// Cause of the fault.
    pub code: BadInstructionCode,
    /// Raw subcode: instruction word on arm64, faulting address on `x86_64`.
    pub subcode: u64,
}

impl BadInstructionInfo {
    /// Offending instruction word (arm64 only).
    #[must_use]
    pub const fn instruction(&self) -> Option<u64> {
        match self.arch {
            Arch::Arm64 => Some(self.subcode),
            Arch::X86_64 => None,
        }
    }

    /// Address of an unhandled page fault, zero otherwise (`x86_64` only).
    #[must_use]
    pub const fn address(&self) -> Option<u64> {
        match self.arch {
            Arch::Arm64 => None,
            Arch::X86_64 => Some(self.subcode),
        }
    }
}

pub(super) fn decode(
    arch: Arch,
    code: Option<i64>,
    subcode: Option<i64>,
) -> Option<BadInstructionInfo> {
    let (code, subcode) = (code?, subcode?);
    Some(BadInstructionInfo {
        arch,
        code: BadInstructionCode::from_code(arch, code)?,
        subcode: unsigned(subcode),
    })
}
