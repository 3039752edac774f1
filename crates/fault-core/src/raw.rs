//! Unclassified fault triples as delivered by the fault channel.

use std::fmt;

use crate::FaultCategory;

/// `(category, code, subcode)` triple; absent values are distinct from zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct RawFault {
    /// Category the fault was delivered under.
    pub category: FaultCategory,
    /// First code word, when the kernel supplied one.
    pub code: Option<i64>,
    /// Second code word, when the kernel supplied one.
    pub subcode: Option<i64>,
}

impl RawFault {
    /// Creates a triple.
    #[must_use]
    pub const fn new(category: FaultCategory, code: Option<i64>, subcode: Option<i64>) -> Self {
        Self {
            category,
            code,
            subcode,
        }
    }

    /// Creates a triple with both code words present.
    #[must_use]
    pub const fn with_codes(category: FaultCategory, code: i64, subcode: i64) -> Self {
        Self::new(category, Some(code), Some(subcode))
    }

    /// Builds a triple from a kernel exception-type number and code array.
    ///
    /// Returns `None` for an exception type with no category. Codes beyond
    /// the second are ignored.
    #[must_use]
    pub fn from_exception(exception: i32, codes: &[i64]) -> Option<Self> {
        let category = FaultCategory::from_raw(exception)?;
        Some(Self::new(
            category,
            codes.first().copied(),
            codes.get(1).copied(),
        ))
    }
}

impl fmt::Display for RawFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.category)?;
        write_code(f, self.code)?;
        f.write_str(", ")?;
        write_code(f, self.subcode)?;
        f.write_str(")")
    }
}

fn write_code(f: &mut fmt::Formatter<'_>, code: Option<i64>) -> fmt::Result {
    match code {
        Some(value) => write!(f, "{value:#x}"),
        None => f.write_str("-"),
    }
}
