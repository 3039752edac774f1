//! Guard-violation exception layout.

use std::fmt;

use bitflags::bitflags;

use crate::bitfield::{FieldSpec, FieldTable, PackedCode};

use super::reason::OsReasonNamespace;

/// Guard type discriminant.
pub const GUARD_TYPE: FieldSpec = FieldSpec::new("type", 61, 63);
/// Guard flavor.
pub const GUARD_FLAVOR: FieldSpec = FieldSpec::new("flavor", 32, 60);
/// Guarded target.
pub const GUARD_TARGET: FieldSpec = FieldSpec::new("target", 0, 31);
/// Mach port name (mach-port guards).
pub const GUARD_PORT_NAME: FieldSpec = FieldSpec::new("port_name", 0, 31);
/// Violation reason (mach-port guards).
pub const GUARD_REASON: FieldSpec = FieldSpec::new("reason", 32, 60);
/// File descriptor (fd guards).
pub const GUARD_FILE_DESCRIPTOR: FieldSpec = FieldSpec::new("file_descriptor", 0, 31);
/// Reason namespace (user guards).
pub const GUARD_NAMESPACE: FieldSpec = FieldSpec::new("namespace", 0, 31);
/// Offending process (vnode guards).
pub const GUARD_PID: FieldSpec = FieldSpec::new("pid", 0, 31);

/// Fields of a guard `code`.
pub const GUARD_CODE_FIELDS: FieldTable = FieldTable::new(
    "guard code",
    &[
        GUARD_TYPE,
        GUARD_FLAVOR,
        GUARD_TARGET,
        GUARD_PORT_NAME,
        GUARD_REASON,
        GUARD_FILE_DESCRIPTOR,
        GUARD_NAMESPACE,
        GUARD_PID,
    ],
);

/// Lingering guard with no target.
pub const GUARD_TYPE_NONE: u64 = 0;
/// Guarded Mach port.
pub const GUARD_TYPE_MACH_PORT: u64 = 1;
/// Guarded file descriptor.
pub const GUARD_TYPE_FD: u64 = 2;
/// User-defined guard.
pub const GUARD_TYPE_USER: u64 = 3;
/// Guarded vnode.
pub const GUARD_TYPE_VN: u64 = 4;
/// Guarded virtual memory.
pub const GUARD_TYPE_VIRT_MEMORY: u64 = 5;

/// Reason code of a Mach port guard violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct PortGuardReason(pub u64);

impl PortGuardReason {
    /// Destroyed a guarded port.
    pub const DESTROY: Self = Self(1);
    /// Modified references of a guarded port.
    pub const MOD_REFS: Self = Self(1 << 1);
    /// Changed the context of a guarded port.
    pub const SET_CONTEXT: Self = Self(1 << 2);
    /// Unguarded a port that was not guarded.
    pub const UNGUARDED: Self = Self(1 << 3);
    /// Supplied the wrong guard.
    pub const INCORRECT_GUARD: Self = Self(1 << 4);
    /// Moved an immovable right.
    pub const IMMOVABLE: Self = Self(1 << 5);
    /// Violated strict reply semantics.
    pub const STRICT_REPLY: Self = Self(1 << 6);
    /// Message was filtered.
    pub const MSG_FILTERED: Self = Self(1 << 7);
    /// Used an invalid right.
    pub const INVALID_RIGHT: Self = Self(1 << 8);
    /// Used an invalid name.
    pub const INVALID_NAME: Self = Self(1 << 9);
    /// Used an invalid value.
    pub const INVALID_VALUE: Self = Self(1 << 10);
    /// Passed an invalid argument.
    pub const INVALID_ARGUMENT: Self = Self(1 << 11);
    /// Right already exists.
    pub const RIGHT_EXISTS: Self = Self(1 << 12);
    /// Port name space exhausted.
    pub const KERN_NO_SPACE: Self = Self(1 << 13);
    /// Generic kernel failure.
    pub const KERN_FAILURE: Self = Self(1 << 14);
    /// Kernel resource shortage.
    pub const KERN_RESOURCE: Self = Self(1 << 15);
    /// Sent with an invalid reply port.
    pub const SEND_INVALID_REPLY: Self = Self(1 << 16);
    /// Sent with an invalid voucher.
    pub const SEND_INVALID_VOUCHER: Self = Self(1 << 17);
    /// Sent with an invalid right.
    pub const SEND_INVALID_RIGHT: Self = Self(1 << 18);
    /// Received on an invalid name.
    pub const RCV_INVALID_NAME: Self = Self(1 << 19);
    /// Received a guarded descriptor.
    pub const RCV_GUARDED_DESC: Self = Self(1 << 20);

    const NAMES: [(Self, &'static str); 21] = [
        (Self::DESTROY, "destroy"),
        (Self::MOD_REFS, "mod-refs"),
        (Self::SET_CONTEXT, "set-context"),
        (Self::UNGUARDED, "unguarded"),
        (Self::INCORRECT_GUARD, "incorrect-guard"),
        (Self::IMMOVABLE, "immovable"),
        (Self::STRICT_REPLY, "strict-reply"),
        (Self::MSG_FILTERED, "msg-filtered"),
        (Self::INVALID_RIGHT, "invalid-right"),
        (Self::INVALID_NAME, "invalid-name"),
        (Self::INVALID_VALUE, "invalid-value"),
        (Self::INVALID_ARGUMENT, "invalid-argument"),
        (Self::RIGHT_EXISTS, "right-exists"),
        (Self::KERN_NO_SPACE, "kern-no-space"),
        (Self::KERN_FAILURE, "kern-failure"),
        (Self::KERN_RESOURCE, "kern-resource"),
        (Self::SEND_INVALID_REPLY, "send-invalid-reply"),
        (Self::SEND_INVALID_VOUCHER, "send-invalid-voucher"),
        (Self::SEND_INVALID_RIGHT, "send-invalid-right"),
        (Self::RCV_INVALID_NAME, "rcv-invalid-name"),
        (Self::RCV_GUARDED_DESC, "rcv-guarded-desc"),
    ];

    /// Stable name of a known reason.
    #[must_use]
    pub fn name(self) -> Option<&'static str> {
        Self::NAMES
            .iter()
            .find(|(reason, _)| *reason == self)
            .map(|(_, name)| *name)
    }
}

impl fmt::Display for PortGuardReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None => write!(f, "{:#x}", self.0),
        }
    }
}

bitflags! {
    /// Operations that tripped a file descriptor guard.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    #[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
    pub struct FdGuardFlavor: u32 {
        /// Closed a guarded descriptor.
        const CLOSE = 1 << 0;
        /// Duplicated a guarded descriptor.
        const DUP = 1 << 1;
        /// Cleared close-on-exec.
        const NOCLOEXEC = 1 << 2;
        /// Sent a guarded descriptor over a socket.
        const SOCKET_IPC = 1 << 3;
        /// Created a fileport for a guarded descriptor.
        const FILEPORT = 1 << 4;
        /// Supplied the wrong guard.
        const MISMATCH = 1 << 5;
        /// Wrote through a guarded descriptor.
        const WRITE = 1 << 6;
    }
}

bitflags! {
    /// Operations that tripped a vnode guard.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    #[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
    pub struct VnodeGuardOps: u64 {
        /// Renamed onto the guarded file.
        const RENAME_TO = 1 << 0;
        /// Renamed the guarded file away.
        const RENAME_FROM = 1 << 1;
        /// Unlinked the guarded file.
        const UNLINK = 1 << 2;
        /// Another process wrote to the file.
        const WRITE_OTHER = 1 << 3;
        /// Another process truncated the file.
        const TRUNCATE_OTHER = 1 << 4;
        /// Hard-linked the guarded file.
        const LINK = 1 << 5;
        /// Exchanged data with the guarded file.
        const EXCHDATA = 1 << 6;
    }
}

/// Decoded guard-violation exception.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum GuardInfo {
    /// Lingering guard on the process.
    None,
    /// Guarded Mach port protection violated.
    MachPort {
        /// Port name.
        port: u32,
        /// Violation reason.
        reason: PortGuardReason,
        /// Guard that was violated.
        guard_id: i64,
    },
    /// Guarded file descriptor protection violated.
    FileDescriptor {
        /// Descriptor number.
        fd: i32,
        /// Operations that tripped the guard.
        flavor: FdGuardFlavor,
        /// Guard that was violated.
        guard_id: i64,
    },
    /// User-defined guard violated.
    User {
        /// Namespace of the reason.
        namespace: OsReasonNamespace,
        /// Namespace-specific reason.
        reason: i64,
    },
    /// Guarded vnode protection violated.
    Vnode {
        /// Offending process.
        pid: i32,
        /// Operations that tripped the guard.
        ops: VnodeGuardOps,
    },
    /// Guarded virtual memory protection violated.
    VirtualMemory {
        /// Offset of the offending access.
        offset: i64,
    },
}

impl GuardInfo {
    /// Decodes a guard `code` with the raw `subcode`.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
    pub fn from_codes(code: PackedCode, subcode: i64) -> Option<Self> {
        match code.get(GUARD_TYPE) {
            GUARD_TYPE_NONE => Some(Self::None),
            GUARD_TYPE_MACH_PORT => Some(Self::MachPort {
                port: code.get(GUARD_PORT_NAME) as u32,
                reason: PortGuardReason(code.get(GUARD_REASON)),
                guard_id: subcode,
            }),
            GUARD_TYPE_FD => Some(Self::FileDescriptor {
                fd: code.get(GUARD_FILE_DESCRIPTOR) as i32,
                flavor: FdGuardFlavor::from_bits_retain(code.get(GUARD_FLAVOR) as u32),
                guard_id: subcode,
            }),
            GUARD_TYPE_USER => Some(Self::User {
                namespace: OsReasonNamespace::from_raw(code.get(GUARD_NAMESPACE))?,
                reason: subcode,
            }),
            GUARD_TYPE_VN => Some(Self::Vnode {
                pid: code.get(GUARD_PID) as i32,
                ops: VnodeGuardOps::from_bits_retain(PackedCode::from_i64(subcode).value()),
            }),
            GUARD_TYPE_VIRT_MEMORY => Some(Self::VirtualMemory { offset: subcode }),
            _ => None,
        }
    }
}

pub(super) fn decode(code: Option<i64>, subcode: Option<i64>) -> Option<GuardInfo> {
    GuardInfo::from_codes(PackedCode::from_i64(code?), subcode?)
}
