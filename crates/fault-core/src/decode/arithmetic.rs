//! Arithmetic fault codes.

use crate::Arch;

use super::{narrow, unsigned};

/// ARM floating-point undefined error.
pub const EXC_ARM_FP_UNDEFINED: i32 = 0;
/// ARM invalid floating-point operation.
pub const EXC_ARM_FP_IO: i32 = 1;
/// ARM floating-point divide by zero.
pub const EXC_ARM_FP_DZ: i32 = 2;
/// ARM floating-point overflow.
pub const EXC_ARM_FP_OF: i32 = 3;
/// ARM floating-point underflow.
pub const EXC_ARM_FP_UF: i32 = 4;
/// ARM inexact floating-point result.
pub const EXC_ARM_FP_IX: i32 = 5;
/// ARM floating-point denormal input.
pub const EXC_ARM_FP_ID: i32 = 6;

/// x86 integer divide error.
pub const EXC_I386_DIV: i32 = 1;
/// x86 INTO overflow.
pub const EXC_I386_INTO: i32 = 2;
/// x86 FPU not available.
pub const EXC_I386_NOEXT: i32 = 3;
/// x86 FPU error.
pub const EXC_I386_EXTERR: i32 = 5;
/// x86 SSE floating-point error.
pub const EXC_I386_SSEEXTERR: i32 = 8;

/// Cause of an arithmetic fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum ArithmeticCode {
    /// Unclassified floating-point error (arm64).
    Undefined,
    /// Invalid floating-point operation (arm64).
    InvalidOperation,
    /// Divide by zero.
    DivideByZero,
    /// Overflow.
    Overflow,
    /// Floating-point underflow (arm64).
    Underflow,
    /// Inexact floating-point result (arm64).
    Inexact,
    /// Denormal floating-point input (arm64).
    DenormalInput,
    /// No floating-point unit available (`x86_64`).
    NoFpu,
    /// x87 floating-point error (`x86_64`).
    FpuError,
    /// SSE floating-point error (`x86_64`).
    SimdError,
}

impl ArithmeticCode {
    /// Classifies `code` for `arch`.
    #[must_use]
    pub fn from_code(arch: Arch, code: i64) -> Option<Self> {
        let code = narrow(code)?;
        match arch {
            Arch::Arm64 => match code {
                EXC_ARM_FP_UNDEFINED => Some(Self::Undefined),
                EXC_ARM_FP_IO => Some(Self::InvalidOperation),
                EXC_ARM_FP_DZ => Some(Self::DivideByZero),
                EXC_ARM_FP_OF => Some(Self::Overflow),
                EXC_ARM_FP_UF => Some(Self::Underflow),
                EXC_ARM_FP_IX => Some(Self::Inexact),
                EXC_ARM_FP_ID => Some(Self::DenormalInput),
                _ => None,
            },
            Arch::X86_64 => match code {
                EXC_I386_DIV => Some(Self::DivideByZero),
                EXC_I386_INTO => Some(Self::Overflow),
                EXC_I386_NOEXT => Some(Self::NoFpu),
                EXC_I386_EXTERR => Some(Self::FpuError),
                EXC_I386_SSEEXTERR => Some(Self::SimdError),
                _ => None,
            },
        }
    }
}

/// Decoded arithmetic fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct ArithmeticInfo {
    /// Family the code was decoded for.
    pub arch: Arch,
    /// Cause of the fault.
    pub code: ArithmeticCode,
    /// Raw subcode: instruction word on arm64, FPU CSR or SSE MXCSR on `x86_64`.
    pub subcode: u64,
}

impl ArithmeticInfo {
    /// Offending instruction word (arm64 only).
    #[must_use]
    pub const fn instruction(&self) -> Option<u64> {
        match self.arch {
            Arch::Arm64 => Some(self.subcode),
            Arch::X86_64 => None,
        }
    }

    /// Control/status register at the time of the fault (`x86_64` only).
    #[must_use]
    pub const fn csr(&self) -> Option<u64> {
        match self.arch {
            Arch::Arm64 => None,
            Arch::X86_64 => Some(self.subcode),
        }
    }
}

pub(super) fn decode(arch: Arch, code: Option<i64>, subcode: Option<i64>) -> Option<ArithmeticInfo> {
    let (code, subcode) = (code?, subcode?);
    Some(ArithmeticInfo {
        arch,
        code: ArithmeticCode::from_code(arch, code)?,
        subcode: unsigned(subcode),
    })
}
