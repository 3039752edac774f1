//! Corpse notifications wrapping crash, resource, and guard exceptions.

use crate::bitfield::{FieldSpec, FieldTable, PackedCode};
use crate::FaultCategory;

use super::guard::GuardInfo;
use super::reason::OsReasonNamespace;
use super::resource::ResourceInfo;
use super::{DecodedFault, Decoder};

/// OS reason code of a corpse crash.
pub const CORPSE_CRASH_REASON: FieldSpec = FieldSpec::new("reason", 0, 31);
/// OS reason namespace of a corpse crash.
pub const CORPSE_CRASH_NAMESPACE: FieldSpec = FieldSpec::new("namespace", 32, 63);

/// Fields of a corpse crash `subcode`.
pub const CORPSE_CRASH_SUBCODE_FIELDS: FieldTable = FieldTable::new(
    "corpse crash subcode",
    &[CORPSE_CRASH_REASON, CORPSE_CRASH_NAMESPACE],
);

/// Decoded corpse notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum CorpseInfo {
    /// The last thread of a BSD process terminated with crash information.
    Crash {
        /// Subsystem that recorded the exit reason.
        namespace: OsReasonNamespace,
        /// Namespace-specific exit reason.
        reason: u64,
    },
    /// Corpse fork produced by a resource exception.
    Resource(ResourceInfo),
    /// Corpse fork produced by a guard exception.
    Guard(GuardInfo),
}

pub(super) fn decode(
    decoder: &Decoder,
    code: Option<i64>,
    subcode: Option<i64>,
) -> Option<CorpseInfo> {
    let (code, subcode) = (code?, subcode?);
    let nested = FaultCategory::from_raw(i32::try_from(code).ok()?)?;
    match nested {
        FaultCategory::Crash => {
            let packed = PackedCode::from_i64(subcode);
            Some(CorpseInfo::Crash {
                namespace: OsReasonNamespace::from_raw(packed.get(CORPSE_CRASH_NAMESPACE))?,
                reason: packed.get(CORPSE_CRASH_REASON),
            })
        }
        FaultCategory::ResourceLimit | FaultCategory::GuardViolation => {
            match decoder.decode(nested, Some(subcode), Some(0))? {
                DecodedFault::ResourceLimit(info) => Some(CorpseInfo::Resource(info)),
                DecodedFault::GuardViolation(info) => Some(CorpseInfo::Guard(info)),
                _ => None,
            }
        }
        _ => None,
    }
}
