//! Fault code decoder.
//!
//! Turns a `(category, code, subcode)` triple into a structured
//! [`DecodedFault`]. Decoding is pure: no channel, no process state. Inputs
//! that match no known layout yield `None` rather than an error, so callers
//! can tell decoder gaps apart from classified faults.

pub mod arithmetic;
pub mod breakpoint;
pub mod corpse;
pub mod crash;
pub mod guard;
pub mod instruction;
pub mod memory;
pub mod reason;
pub mod resource;
pub mod software;
pub mod syscall;

use thiserror::Error;

use crate::{Arch, FaultCategory, RawFault};

pub use arithmetic::{ArithmeticCode, ArithmeticInfo};
pub use breakpoint::{BreakpointInfo, BreakpointTrap};
pub use corpse::CorpseInfo;
pub use crash::CrashInfo;
pub use guard::{FdGuardFlavor, GuardInfo, PortGuardReason, VnodeGuardOps};
pub use instruction::{BadInstructionCode, BadInstructionInfo};
pub use memory::{BadAccessCode, BadAccessInfo};
pub use reason::OsReasonNamespace;
pub use resource::{CpuFlavor, IoFlavor, MemoryFlavor, ResourceInfo, ThreadsFlavor, WakeupsFlavor};
pub use software::{EmulationInfo, SoftwareCode, SoftwareInfo};
pub use syscall::{RpcAlertInfo, SyscallInfo};

/// Structured interpretation of a fault, one variant per category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde", serde(tag = "category", content = "info", rename_all = "kebab-case"))]
pub enum DecodedFault {
    /// Illegal memory access.
    #[error("bad access: {0:?}")]
    BadAccess(BadAccessInfo),
    /// Illegal or undefined instruction.
    #[error("bad instruction: {0:?}")]
    BadInstruction(BadInstructionInfo),
    /// Arithmetic fault.
    #[error("arithmetic fault: {0:?}")]
    Arithmetic(ArithmeticInfo),
    /// Emulation instruction.
    #[error("emulation: {0:?}")]
    Emulation(EmulationInfo),
    /// Software generated exception.
    #[error("software exception: {0:?}")]
    Software(SoftwareInfo),
    /// Breakpoint, watchpoint, or trace trap.
    #[error("breakpoint: {0:?}")]
    Breakpoint(BreakpointInfo),
    /// Intercepted BSD system call.
    #[error("syscall {}", .0.number)]
    Syscall(SyscallInfo),
    /// Intercepted kernel system call.
    #[error("kernel syscall {}", .0.number)]
    KernelSyscall(SyscallInfo),
    /// RPC alert.
    #[error("rpc alert for pid {}", .0.pid)]
    RpcAlert(RpcAlertInfo),
    /// Abnormal process exit.
    #[error("crash: {0:?}")]
    Crash(CrashInfo),
    /// Resource limit hit.
    #[error("resource limit: {0:?}")]
    ResourceLimit(ResourceInfo),
    /// Guarded resource protection violated.
    #[error("guard violation: {0:?}")]
    GuardViolation(GuardInfo),
    /// Corpse notification.
    #[error("corpse notify: {0:?}")]
    CorpseNotify(CorpseInfo),
}

impl DecodedFault {
    /// Category this payload belongs to.
    #[must_use]
    pub const fn category(&self) -> FaultCategory {
        match self {
            Self::BadAccess(_) => FaultCategory::BadAccess,
            Self::BadInstruction(_) => FaultCategory::BadInstruction,
            Self::Arithmetic(_) => FaultCategory::Arithmetic,
            Self::Emulation(_) => FaultCategory::Emulation,
            Self::Software(_) => FaultCategory::Software,
            Self::Breakpoint(_) => FaultCategory::Breakpoint,
            Self::Syscall(_) => FaultCategory::Syscall,
            Self::KernelSyscall(_) => FaultCategory::KernelSyscall,
            Self::RpcAlert(_) => FaultCategory::RpcAlert,
            Self::Crash(_) => FaultCategory::Crash,
            Self::ResourceLimit(_) => FaultCategory::ResourceLimit,
            Self::GuardViolation(_) => FaultCategory::GuardViolation,
            Self::CorpseNotify(_) => FaultCategory::CorpseNotify,
        }
    }
}

/// Decoder bound to one processor family.
///
/// Processor-specific categories (bad access, bad instruction, arithmetic,
/// breakpoint) decode to `None` when no family is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Decoder {
    arch: Option<Arch>,
}

impl Decoder {
    /// Decoder for the compile target's family.
    #[must_use]
    pub const fn host() -> Self {
        Self { arch: Arch::host() }
    }

    /// Decoder for an explicit family.
    #[must_use]
    pub const fn for_arch(arch: Arch) -> Self {
        Self { arch: Some(arch) }
    }

    /// Family this decoder applies, if any.
    #[must_use]
    pub const fn arch(&self) -> Option<Arch> {
        self.arch
    }

    /// Decodes one triple. Absent words are distinct from zero.
    #[must_use]
    pub fn decode(
        &self,
        category: FaultCategory,
        code: Option<i64>,
        subcode: Option<i64>,
    ) -> Option<DecodedFault> {
        match category {
            FaultCategory::BadAccess => {
                memory::decode(self.arch?, code, subcode).map(DecodedFault::BadAccess)
            }
            FaultCategory::BadInstruction => {
                instruction::decode(self.arch?, code, subcode).map(DecodedFault::BadInstruction)
            }
            FaultCategory::Arithmetic => {
                arithmetic::decode(self.arch?, code, subcode).map(DecodedFault::Arithmetic)
            }
            FaultCategory::Breakpoint => {
                breakpoint::decode(self.arch?, code, subcode).map(DecodedFault::Breakpoint)
            }
            FaultCategory::Emulation => {
                software::decode_emulation(code, subcode).map(DecodedFault::Emulation)
            }
            FaultCategory::Software => {
                software::decode_software(code, subcode).map(DecodedFault::Software)
            }
            FaultCategory::Syscall => syscall::decode_syscall(code).map(DecodedFault::Syscall),
            FaultCategory::KernelSyscall => {
                syscall::decode_syscall(code).map(DecodedFault::KernelSyscall)
            }
            FaultCategory::RpcAlert => {
                syscall::decode_rpc_alert(code, subcode).map(DecodedFault::RpcAlert)
            }
            FaultCategory::Crash => crash::decode(code, subcode).map(DecodedFault::Crash),
            FaultCategory::ResourceLimit => {
                resource::decode(code, subcode).map(DecodedFault::ResourceLimit)
            }
            FaultCategory::GuardViolation => {
                guard::decode(code, subcode).map(DecodedFault::GuardViolation)
            }
            FaultCategory::CorpseNotify => {
                corpse::decode(self, code, subcode).map(DecodedFault::CorpseNotify)
            }
        }
    }

    /// Decodes a [`RawFault`].
    #[must_use]
    pub fn decode_raw(&self, raw: &RawFault) -> Option<DecodedFault> {
        self.decode(raw.category, raw.code, raw.subcode)
    }
}

impl Default for Decoder {
    fn default() -> Self {
        Self::host()
    }
}

/// Decodes a triple for the compile target's processor family.
#[must_use]
pub fn decode(
    category: FaultCategory,
    code: Option<i64>,
    subcode: Option<i64>,
) -> Option<DecodedFault> {
    Decoder::host().decode(category, code, subcode)
}

/// Decodes a triple captured on `arch`, regardless of the host.
#[must_use]
pub fn decode_for(
    arch: Arch,
    category: FaultCategory,
    code: Option<i64>,
    subcode: Option<i64>,
) -> Option<DecodedFault> {
    Decoder::for_arch(arch).decode(category, code, subcode)
}

/// Narrows a kernel code to the 32-bit range the named constants use.
pub(super) fn narrow(code: i64) -> Option<i32> {
    i32::try_from(code).ok()
}

/// Reinterprets a signed code word as the unsigned address or register it carries.
#[allow(clippy::cast_sign_loss)]
pub(super) const fn unsigned(code: i64) -> u64 {
    code as u64
}
