//! Processor families with distinct fault code layouts.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Processor family selecting which code tables the decoder applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Arch {
    /// ARM family: codes name the virtual-memory or FP fault directly.
    Arm64,
    /// Intel family: codes carry x86 trap numbers.
    X86_64,
}

impl Arch {
    /// Family of the compile target, when it has a known layout.
    #[must_use]
    pub const fn host() -> Option<Self> {
        if cfg!(any(target_arch = "aarch64", target_arch = "arm")) {
            Some(Self::Arm64)
        } else if cfg!(any(target_arch = "x86_64", target_arch = "x86")) {
            Some(Self::X86_64)
        } else {
            None
        }
    }

    /// Stable lowercase name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Arm64 => "arm64",
            Self::X86_64 => "x86_64",
        }
    }
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Parse failure for an architecture name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown architecture `{0}` (expected arm64 or x86_64)")]
pub struct UnknownArch(pub String);

impl FromStr for Arch {
    type Err = UnknownArch;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "arm64" | "aarch64" | "arm" => Ok(Self::Arm64),
            "x86_64" | "x86-64" | "amd64" | "x86" | "i386" => Ok(Self::X86_64),
            _ => Err(UnknownArch(s.to_string())),
        }
    }
}
