//! System call interception and RPC alerts.

/// Sentinel code carried by every RPC alert.
pub const RPC_ALERT_CODE: i64 = 0xff00_0001;

/// Intercepted system call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct SyscallInfo {
    /// System call number.
    pub number: i64,
}

/// RPC alert raised against a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct RpcAlertInfo {
    /// Process identifier the alert names.
    pub pid: i64,
}

pub(super) fn decode_syscall(code: Option<i64>) -> Option<SyscallInfo> {
    code.map(|number| SyscallInfo { number })
}

pub(super) fn decode_rpc_alert(code: Option<i64>, subcode: Option<i64>) -> Option<RpcAlertInfo> {
    let (code, pid) = (code?, subcode?);
    (code == RPC_ALERT_CODE).then_some(RpcAlertInfo { pid })
}
