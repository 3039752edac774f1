//! Crash exception code layout.

use crate::bitfield::{FieldSpec, FieldTable, PackedCode};
use crate::FaultCategory;

/// Code of the fault that caused the crash.
pub const CRASH_ORIGINAL_CODE: FieldSpec = FieldSpec::new("original_code", 0, 19);
/// Exception type of the fault that caused the crash.
pub const CRASH_ORIGINAL_EXCEPTION: FieldSpec = FieldSpec::new("original_exception", 20, 23);
/// Signal that terminated the process.
pub const CRASH_SIGNAL: FieldSpec = FieldSpec::new("signal", 24, 31);

/// Fields of a crash `code`.
pub const CRASH_CODE_FIELDS: FieldTable = FieldTable::new(
    "crash",
    &[CRASH_ORIGINAL_CODE, CRASH_ORIGINAL_EXCEPTION, CRASH_SIGNAL],
);

/// Decoded crash exception.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct CrashInfo {
    /// Exception-type number of the original fault.
    pub original_exception: u8,
    /// Truncated code of the original fault.
    pub original_code: u32,
    /// Terminating signal.
    pub signal: u8,
}

impl CrashInfo {
    /// Reads the crash fields out of a packed code.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn from_code(code: PackedCode) -> Self {
        Self {
            original_exception: code.get(CRASH_ORIGINAL_EXCEPTION) as u8,
            original_code: code.get(CRASH_ORIGINAL_CODE) as u32,
            signal: code.get(CRASH_SIGNAL) as u8,
        }
    }

    /// Category of the original fault, when the number is known.
    #[must_use]
    pub fn original_category(&self) -> Option<FaultCategory> {
        FaultCategory::from_raw(i32::from(self.original_exception))
    }

    /// Packs the fields back into a crash `code`.
    #[must_use]
    pub fn to_code(&self) -> PackedCode {
        PackedCode::default()
            .with(CRASH_ORIGINAL_EXCEPTION, u64::from(self.original_exception))
            .with(CRASH_ORIGINAL_CODE, u64::from(self.original_code))
            .with(CRASH_SIGNAL, u64::from(self.signal))
    }
}

pub(super) fn decode(code: Option<i64>, subcode: Option<i64>) -> Option<CrashInfo> {
    let code = code?;
    subcode?;
    Some(CrashInfo::from_code(PackedCode::from_i64(code)))
}
