//! Resource-limit exception layouts.
//!
//! The `code` word carries the resource `type` and `flavor` discriminants in
//! its top bits and the configured limit or interval below them; the
//! `subcode` word carries the observed value. Which low fields apply depends
//! on `type`, so the per-resource fields overlap.

use crate::bitfield::{FieldSpec, FieldTable, PackedCode};

/// Resource type discriminant.
pub const RESOURCE_TYPE: FieldSpec = FieldSpec::new("type", 61, 63);
/// Flavor discriminant within a resource type.
pub const RESOURCE_FLAVOR: FieldSpec = FieldSpec::new("flavor", 58, 60);
/// CPU observation interval in seconds.
pub const CPU_INTERVAL: FieldSpec = FieldSpec::new("cpu_interval", 7, 31);
/// CPU limit in percent.
pub const CPU_LIMIT: FieldSpec = FieldSpec::new("cpu_limit", 0, 6);
/// Wakeups observation interval in seconds.
pub const WAKEUPS_INTERVAL: FieldSpec = FieldSpec::new("wakeups_interval", 20, 31);
/// Permitted wakeups per second.
pub const WAKEUPS_PERMITTED: FieldSpec = FieldSpec::new("wakeups_permitted", 0, 19);
/// Memory high watermark in MB.
pub const MEMORY_HWM_LIMIT: FieldSpec = FieldSpec::new("memory_hwm_limit", 0, 12);
/// I/O observation interval in seconds.
pub const IO_INTERVAL: FieldSpec = FieldSpec::new("io_interval", 15, 31);
/// I/O limit in MB.
pub const IO_LIMIT: FieldSpec = FieldSpec::new("io_limit", 0, 14);
/// Thread count high watermark.
pub const THREADS_COUNT: FieldSpec = FieldSpec::new("threads_count", 0, 30);

/// Measured CPU utilization in percent.
pub const CPU_UTILIZATION: FieldSpec = FieldSpec::new("cpu_utilization", 0, 6);
/// Observed wakeups per second.
pub const WAKEUPS_OBSERVED: FieldSpec = FieldSpec::new("wakeups_observed", 0, 6);
/// Observed I/O in MB.
pub const IO_COUNT: FieldSpec = FieldSpec::new("io_count", 0, 14);

/// Fields of a resource `code`.
pub const RESOURCE_CODE_FIELDS: FieldTable = FieldTable::new(
    "resource code",
    &[
        RESOURCE_TYPE,
        RESOURCE_FLAVOR,
        CPU_INTERVAL,
        CPU_LIMIT,
        WAKEUPS_INTERVAL,
        WAKEUPS_PERMITTED,
        MEMORY_HWM_LIMIT,
        IO_INTERVAL,
        IO_LIMIT,
        THREADS_COUNT,
    ],
);

/// Fields of a resource `subcode`.
pub const RESOURCE_SUBCODE_FIELDS: FieldTable = FieldTable::new(
    "resource subcode",
    &[CPU_UTILIZATION, WAKEUPS_OBSERVED, IO_COUNT],
);

/// CPU resource type.
pub const RESOURCE_TYPE_CPU: u64 = 1;
/// Wakeups resource type.
pub const RESOURCE_TYPE_WAKEUPS: u64 = 2;
/// Memory resource type.
pub const RESOURCE_TYPE_MEMORY: u64 = 3;
/// I/O resource type.
pub const RESOURCE_TYPE_IO: u64 = 4;
/// Thread count resource type.
pub const RESOURCE_TYPE_THREADS: u64 = 5;

/// Flavor of a CPU resource exception.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum CpuFlavor {
    /// A thread consumed an excessive share of the CPU.
    Monitor = 1,
    /// As [`CpuFlavor::Monitor`], and the process is terminated.
    MonitorFatal = 2,
}

/// Flavor of a wakeups resource exception.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum WakeupsFlavor {
    /// Excessive idle wakeups.
    Monitor = 1,
}

/// Flavor of a memory resource exception.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum MemoryFlavor {
    /// Footprint crossed the high watermark.
    HighWatermark = 1,
}

/// Flavor of an I/O resource exception.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum IoFlavor {
    /// Excessive physical writes.
    PhysicalWrites = 1,
    /// Excessive logical writes.
    LogicalWrites = 2,
}

/// Flavor of a thread count resource exception.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum ThreadsFlavor {
    /// Thread count crossed the high watermark.
    HighWatermark = 1,
}

impl CpuFlavor {
    const fn from_raw(raw: u64) -> Option<Self> {
        match raw {
            1 => Some(Self::Monitor),
            2 => Some(Self::MonitorFatal),
            _ => None,
        }
    }
}

impl WakeupsFlavor {
    const fn from_raw(raw: u64) -> Option<Self> {
        match raw {
            1 => Some(Self::Monitor),
            _ => None,
        }
    }
}

impl MemoryFlavor {
    const fn from_raw(raw: u64) -> Option<Self> {
        match raw {
            1 => Some(Self::HighWatermark),
            _ => None,
        }
    }
}

impl IoFlavor {
    const fn from_raw(raw: u64) -> Option<Self> {
        match raw {
            1 => Some(Self::PhysicalWrites),
            2 => Some(Self::LogicalWrites),
            _ => None,
        }
    }
}

impl ThreadsFlavor {
    const fn from_raw(raw: u64) -> Option<Self> {
        match raw {
            1 => Some(Self::HighWatermark),
            _ => None,
        }
    }
}

/// Decoded resource-limit exception.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum ResourceInfo {
    /// CPU monitor tripped.
    Cpu {
        /// Reason for the exception.
        flavor: CpuFlavor,
        /// Observation interval in seconds.
        interval: u64,
        /// CPU limit in percent.
        limit: u64,
        /// Measured utilization in percent.
        utilization: u64,
    },
    /// Idle wakeup monitor tripped.
    Wakeups {
        /// Reason for the exception.
        flavor: WakeupsFlavor,
        /// Observation interval in seconds.
        interval: u64,
        /// Permitted wakeups per second.
        permitted: u64,
        /// Observed wakeups per second.
        observed: u64,
    },
    /// Memory high watermark crossed.
    Memory {
        /// Reason for the exception.
        flavor: MemoryFlavor,
        /// High watermark in MB.
        high_watermark: u64,
    },
    /// I/O limit crossed.
    Io {
        /// Reason for the exception.
        flavor: IoFlavor,
        /// Observation interval in seconds.
        interval: u64,
        /// I/O limit in MB.
        limit: u64,
        /// Observed I/O in MB.
        count: u64,
    },
    /// Thread limit crossed.
    Threads {
        /// Reason for the exception.
        flavor: ThreadsFlavor,
        /// Thread count at the watermark.
        count: u64,
    },
}

impl ResourceInfo {
    /// Decodes a resource `code`/`subcode` pair.
    #[must_use]
    pub fn from_codes(code: PackedCode, subcode: PackedCode) -> Option<Self> {
        let flavor = code.get(RESOURCE_FLAVOR);
        match code.get(RESOURCE_TYPE) {
            RESOURCE_TYPE_CPU => Some(Self::Cpu {
                flavor: CpuFlavor::from_raw(flavor)?,
                interval: code.get(CPU_INTERVAL),
                limit: code.get(CPU_LIMIT),
                utilization: subcode.get(CPU_UTILIZATION),
            }),
            RESOURCE_TYPE_WAKEUPS => Some(Self::Wakeups {
                flavor: WakeupsFlavor::from_raw(flavor)?,
                interval: code.get(WAKEUPS_INTERVAL),
                permitted: code.get(WAKEUPS_PERMITTED),
                observed: subcode.get(WAKEUPS_OBSERVED),
            }),
            RESOURCE_TYPE_MEMORY => Some(Self::Memory {
                flavor: MemoryFlavor::from_raw(flavor)?,
                high_watermark: code.get(MEMORY_HWM_LIMIT),
            }),
            RESOURCE_TYPE_IO => Some(Self::Io {
                flavor: IoFlavor::from_raw(flavor)?,
                interval: code.get(IO_INTERVAL),
                limit: code.get(IO_LIMIT),
                count: subcode.get(IO_COUNT),
            }),
            RESOURCE_TYPE_THREADS => Some(Self::Threads {
                flavor: ThreadsFlavor::from_raw(flavor)?,
                count: code.get(THREADS_COUNT),
            }),
            _ => None,
        }
    }
}

pub(super) fn decode(code: Option<i64>, subcode: Option<i64>) -> Option<ResourceInfo> {
    ResourceInfo::from_codes(PackedCode::from_i64(code?), PackedCode::from_i64(subcode?))
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::{
        decode, CpuFlavor, IoFlavor, MemoryFlavor, ResourceInfo, ThreadsFlavor, WakeupsFlavor,
        CPU_INTERVAL, CPU_LIMIT, CPU_UTILIZATION, IO_COUNT, IO_INTERVAL, IO_LIMIT,
        MEMORY_HWM_LIMIT, RESOURCE_CODE_FIELDS, RESOURCE_FLAVOR, RESOURCE_SUBCODE_FIELDS,
        RESOURCE_TYPE, THREADS_COUNT, WAKEUPS_INTERVAL, WAKEUPS_OBSERVED, WAKEUPS_PERMITTED,
    };
    use crate::bitfield::PackedCode;

    fn code(kind: u64, flavor: u64) -> PackedCode {
        PackedCode::default()
            .with(RESOURCE_TYPE, kind)
            .with(RESOURCE_FLAVOR, flavor)
    }

    fn run(code: PackedCode, subcode: PackedCode) -> Option<ResourceInfo> {
        decode(Some(code.as_i64()), Some(subcode.as_i64()))
    }

    #[rstest]
    #[case(1, CpuFlavor::Monitor)]
    #[case(2, CpuFlavor::MonitorFatal)]
    fn cpu_monitor(#[case] raw: u64, #[case] flavor: CpuFlavor) {
        let code = code(1, raw).with(CPU_INTERVAL, 180).with(CPU_LIMIT, 50);
        let subcode = PackedCode::default().with(CPU_UTILIZATION, 99);
        assert_eq!(
            run(code, subcode),
            Some(ResourceInfo::Cpu {
                flavor,
                interval: 180,
                limit: 50,
                utilization: 99,
            })
        );
    }

    #[test]
    fn wakeups_monitor() {
        let code = code(2, 1)
            .with(WAKEUPS_INTERVAL, 300)
            .with(WAKEUPS_PERMITTED, 150);
        let subcode = PackedCode::default().with(WAKEUPS_OBSERVED, 45);
        assert_eq!(
            run(code, subcode),
            Some(ResourceInfo::Wakeups {
                flavor: WakeupsFlavor::Monitor,
                interval: 300,
                permitted: 150,
                observed: 45,
            })
        );
    }

    #[test]
    fn memory_high_watermark() {
        let code = code(3, 1).with(MEMORY_HWM_LIMIT, 2048);
        assert_eq!(
            run(code, PackedCode::default()),
            Some(ResourceInfo::Memory {
                flavor: MemoryFlavor::HighWatermark,
                high_watermark: 2048,
            })
        );
    }

    #[rstest]
    #[case(1, IoFlavor::PhysicalWrites)]
    #[case(2, IoFlavor::LogicalWrites)]
    fn io_writes(#[case] raw: u64, #[case] flavor: IoFlavor) {
        let code = code(4, raw).with(IO_INTERVAL, 86_400).with(IO_LIMIT, 2048);
        let subcode = PackedCode::default().with(IO_COUNT, 4096);
        assert_eq!(
            run(code, subcode),
            Some(ResourceInfo::Io {
                flavor,
                interval: 86_400,
                limit: 2048,
                count: 4096,
            })
        );
    }

    #[test]
    fn threads_high_watermark() {
        let code = code(5, 1).with(THREADS_COUNT, 0x7fff_ffff);
        assert_eq!(
            run(code, PackedCode::default()),
            Some(ResourceInfo::Threads {
                flavor: ThreadsFlavor::HighWatermark,
                count: 0x7fff_ffff,
            })
        );
    }

    #[rstest]
    #[case(0, 1)]
    #[case(6, 1)]
    #[case(1, 3)]
    #[case(2, 2)]
    #[case(3, 0)]
    #[case(4, 3)]
    #[case(5, 7)]
    fn unknown_type_or_flavor_is_unrecognized(#[case] kind: u64, #[case] flavor: u64) {
        assert_eq!(run(code(kind, flavor), PackedCode::default()), None);
    }

    #[test]
    fn both_words_are_required() {
        assert_eq!(decode(Some(code(3, 1).as_i64()), None), None);
        assert_eq!(decode(None, Some(0)), None);
    }

    #[test]
    fn tables_expose_every_field_by_name() {
        assert_eq!(RESOURCE_CODE_FIELDS.lookup("io_limit"), Ok(IO_LIMIT));
        assert_eq!(RESOURCE_SUBCODE_FIELDS.lookup("io_count"), Ok(IO_COUNT));
        assert!(RESOURCE_CODE_FIELDS.lookup("io_count").is_err());
        assert!(!RESOURCE_CODE_FIELDS.overlapping().is_empty());
    }
}
