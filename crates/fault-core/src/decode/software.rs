//! Software-generated and emulation faults.

use super::unsigned;

/// Highest code reserved for hardware-originated software exceptions.
pub const EXC_SOFT_HARDWARE_MAX: i64 = 0xffff;
/// Unix bad system call.
pub const EXC_UNIX_BAD_SYSCALL: i64 = 0x10000;
/// Unix write to a pipe with no reader.
pub const EXC_UNIX_BAD_PIPE: i64 = 0x10001;
/// Unix abort.
pub const EXC_UNIX_ABORT: i64 = 0x10002;
/// Unix signal delivered as an exception.
pub const EXC_SOFT_SIGNAL: i64 = 0x10003;

/// Cause of a software exception.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum SoftwareCode {
    /// Code in the hardware-reserved range `0..=0xffff`.
    Hardware(u16),
    /// Bad system call.
    BadSyscall,
    /// Write to a pipe with no reader.
    BadPipe,
    /// Process abort.
    Abort,
    /// Signal raised as an exception; the subcode is the signal number.
    Signal,
}

impl SoftwareCode {
    /// Classifies a software exception code.
    #[must_use]
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            EXC_UNIX_BAD_SYSCALL => Some(Self::BadSyscall),
            EXC_UNIX_BAD_PIPE => Some(Self::BadPipe),
            EXC_UNIX_ABORT => Some(Self::Abort),
            EXC_SOFT_SIGNAL => Some(Self::Signal),
            _ => u16::try_from(code).ok().map(Self::Hardware),
        }
    }
}

/// Decoded software exception.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct SoftwareInfo {
    /// Cause of the exception.
    pub code: SoftwareCode,
    /// Raw subcode.
    pub subcode: u64,
}

impl SoftwareInfo {
    /// Signal number for [`SoftwareCode::Signal`].
    #[must_use]
    pub const fn signal(&self) -> Option<u64> {
        match self.code {
            SoftwareCode::Signal => Some(self.subcode),
            _ => None,
        }
    }
}

/// Emulation exception; the codes carry no further structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct EmulationInfo {
    /// Raw code.
    pub code: i64,
    /// Raw subcode.
    pub subcode: i64,
}

pub(super) fn decode_software(code: Option<i64>, subcode: Option<i64>) -> Option<SoftwareInfo> {
    let (code, subcode) = (code?, subcode?);
    Some(SoftwareInfo {
        code: SoftwareCode::from_code(code)?,
        subcode: unsigned(subcode),
    })
}

pub(super) fn decode_emulation(code: Option<i64>, subcode: Option<i64>) -> Option<EmulationInfo> {
    Some(EmulationInfo {
        code: code?,
        subcode: subcode?,
    })
}
