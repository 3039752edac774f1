//! Fault classification core: category registry, packed code codec, and decoder.

/// Named bit-field access over packed 64-bit codes.
pub mod bitfield;
pub use bitfield::{FieldSpec, FieldTable, PackedCode, UnknownField, PACKED_CODE_BITS};

/// Fault categories and the kernel registration mask.
pub mod category;
pub use category::{
    categories_for, mask_for, FaultCategory, FaultMask, UnknownCategory, EXCEPTION_TYPES_COUNT,
};

/// Processor families with distinct code layouts.
pub mod arch;
pub use arch::{Arch, UnknownArch};

/// Unclassified fault triples.
pub mod raw;
pub use raw::RawFault;

/// Per-category, per-family decoding of fault codes.
pub mod decode;
pub use decode::{
    decode, decode_for, ArithmeticCode, ArithmeticInfo, BadAccessCode, BadAccessInfo,
    BadInstructionCode, BadInstructionInfo, BreakpointInfo, BreakpointTrap, CorpseInfo,
    CpuFlavor, CrashInfo, DecodedFault, Decoder, EmulationInfo, FdGuardFlavor, GuardInfo,
    IoFlavor, MemoryFlavor, OsReasonNamespace, PortGuardReason, ResourceInfo, RpcAlertInfo,
    SoftwareCode, SoftwareInfo, SyscallInfo, ThreadsFlavor, VnodeGuardOps, WakeupsFlavor,
};

#[cfg(test)]
use proptest as _;
