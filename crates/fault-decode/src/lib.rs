//! Offline decoding of fault triples copied out of crash logs.
//!
//! Input lines are `<category> <code> <subcode>`, where the category is a
//! kebab-case name or kernel number and each code is decimal, `0x` hex, or
//! negative. `-` and `none` mark an absent code word.

use env_logger as _;
use fault_core::{
    categories_for, Arch, DecodedFault, Decoder, FaultCategory, FaultMask, RawFault,
    UnknownArch, UnknownCategory,
};
use log::{debug, warn};
#[cfg(test)]
use tempfile as _;
use thiserror::Error;

/// Output rendering for decoded faults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Format {
    /// `category: <payload>` or `unrecognized: <raw>`.
    #[default]
    Text,
    /// One JSON object per fault.
    Json,
}

/// Malformed command-line or batch input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputError {
    /// Category name or number not recognized.
    #[error(transparent)]
    Category(#[from] UnknownCategory),
    /// Architecture name not recognized.
    #[error(transparent)]
    Arch(#[from] UnknownArch),
    /// Code word is not a decimal, hex, or absent marker.
    #[error("invalid code word `{0}`")]
    Code(String),
    /// Mask is not a decimal or hex 32-bit value.
    #[error("invalid mask `{0}`")]
    Mask(String),
    /// A triple line did not have exactly three fields.
    #[error("expected 3 fields, found {0}")]
    FieldCount(usize),
}

/// A batch line that failed to parse.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line}: {error}")]
pub struct LineError {
    /// 1-indexed line number.
    pub line: usize,
    /// What was wrong with it.
    #[source]
    pub error: InputError,
}

/// Parses an architecture name.
///
/// # Errors
///
/// Returns [`InputError::Arch`] for an unknown name.
pub fn parse_arch(s: &str) -> Result<Arch, InputError> {
    Ok(s.parse()?)
}

/// Parses one code word; `-` and `none` yield `None`.
///
/// Hex values above `i64::MAX` wrap into the signed range so that full
/// 64-bit addresses round trip.
///
/// # Errors
///
/// Returns [`InputError::Code`] when the word is not a number.
#[allow(clippy::cast_possible_wrap)]
pub fn parse_code(s: &str) -> Result<Option<i64>, InputError> {
    let word = s.trim();
    if word == "-" || word.eq_ignore_ascii_case("none") {
        return Ok(None);
    }
    let invalid = || InputError::Code(s.to_string());
    let (negative, digits) = word
        .strip_prefix('-')
        .map_or((false, word), |rest| (true, rest));
    let magnitude = if let Some(hex) = digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        u64::from_str_radix(&hex.replace('_', ""), 16).map_err(|_| invalid())?
    } else {
        digits.parse::<u64>().map_err(|_| invalid())?
    };
    if negative {
        if magnitude > i64::MIN.unsigned_abs() {
            return Err(invalid());
        }
        Ok(Some(0_i64.wrapping_sub_unsigned(magnitude)))
    } else {
        Ok(Some(magnitude as i64))
    }
}

/// Parses a triple from its three words.
///
/// # Errors
///
/// Returns the first word that fails to parse.
pub fn parse_triple(category: &str, code: &str, subcode: &str) -> Result<RawFault, InputError> {
    let category: FaultCategory = category.parse()?;
    Ok(RawFault::new(category, parse_code(code)?, parse_code(subcode)?))
}

/// Parses one batch line; blank lines and `#` comments yield `None`.
///
/// Fields may be separated by whitespace or commas.
///
/// # Errors
///
/// Returns [`InputError::FieldCount`] or the field's parse error.
pub fn parse_line(line: &str) -> Result<Option<RawFault>, InputError> {
    let content = line.split('#').next().unwrap_or_default().trim();
    if content.is_empty() {
        return Ok(None);
    }
    let fields: Vec<&str> = content
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|field| !field.is_empty())
        .collect();
    match fields.as_slice() {
        [category, code, subcode] => parse_triple(category, code, subcode).map(Some),
        other => Err(InputError::FieldCount(other.len())),
    }
}

/// Parses every line of a batch file.
///
/// # Errors
///
/// Returns every failing line when at least one line fails.
pub fn parse_batch(text: &str) -> Result<Vec<RawFault>, Vec<LineError>> {
    let mut faults = Vec::new();
    let mut errors = Vec::new();
    for (index, line) in text.lines().enumerate() {
        match parse_line(line) {
            Ok(Some(raw)) => faults.push(raw),
            Ok(None) => {}
            Err(error) => errors.push(LineError {
                line: index + 1,
                error,
            }),
        }
    }
    debug!(
        "parsed batch: {} triples, {} bad lines",
        faults.len(),
        errors.len()
    );
    if errors.is_empty() {
        Ok(faults)
    } else {
        Err(errors)
    }
}

/// Decodes `raw` and renders it in `format`.
///
/// # Errors
///
/// Returns the serializer error for [`Format::Json`].
pub fn render(
    decoder: &Decoder,
    raw: &RawFault,
    format: Format,
) -> Result<String, serde_json::Error> {
    let decoded = decoder.decode_raw(raw);
    match format {
        Format::Text => Ok(decoded.map_or_else(
            || format!("unrecognized: {raw}"),
            |decoded| format!("{}: {}", decoded.category(), payload(&decoded)),
        )),
        Format::Json => match decoded {
            Some(decoded) => serde_json::to_string(&decoded),
            None => serde_json::to_string(&serde_json::json!({ "unrecognized": raw })),
        },
    }
}

fn payload(decoded: &DecodedFault) -> String {
    match decoded {
        DecodedFault::BadAccess(info) => format!("{info:?}"),
        DecodedFault::BadInstruction(info) => format!("{info:?}"),
        DecodedFault::Arithmetic(info) => format!("{info:?}"),
        DecodedFault::Emulation(info) => format!("{info:?}"),
        DecodedFault::Software(info) => format!("{info:?}"),
        DecodedFault::Breakpoint(info) => format!("{info:?}"),
        DecodedFault::Syscall(info) | DecodedFault::KernelSyscall(info) => format!("{info:?}"),
        DecodedFault::RpcAlert(info) => format!("{info:?}"),
        DecodedFault::Crash(info) => format!("{info:?}"),
        DecodedFault::ResourceLimit(info) => format!("{info:?}"),
        DecodedFault::GuardViolation(info) => format!("{info:?}"),
        DecodedFault::CorpseNotify(info) => format!("{info:?}"),
    }
}

/// Combines category names or numbers into a registration mask.
///
/// # Errors
///
/// Returns [`InputError::Category`] for the first unknown category.
pub fn mask_of<S: AsRef<str>>(categories: &[S]) -> Result<FaultMask, InputError> {
    categories
        .iter()
        .map(|name| name.as_ref().parse::<FaultCategory>().map_err(InputError::from))
        .collect()
}

/// Parses a decimal or `0x` hex registration mask.
///
/// Bits with no category are dropped with a warning.
///
/// # Errors
///
/// Returns [`InputError::Mask`] when the value is not a 32-bit number.
pub fn parse_mask(s: &str) -> Result<FaultMask, InputError> {
    let word = s.trim();
    let bits = word
        .strip_prefix("0x")
        .or_else(|| word.strip_prefix("0X"))
        .map_or_else(|| word.parse::<u32>(), |hex| u32::from_str_radix(hex, 16))
        .map_err(|_| InputError::Mask(s.to_string()))?;
    let mask = FaultMask::from_exception_mask(bits);
    let dropped = bits & !mask.exception_mask();
    if dropped != 0 {
        warn!("ignoring mask bits {dropped:#x} with no category");
    }
    Ok(mask)
}

/// Formats a mask the way [`parse_mask`] reads it back.
#[must_use]
pub fn format_mask(mask: FaultMask) -> String {
    format!("{:#x}", mask.exception_mask())
}

/// Category names in `mask`, in kernel numbering order.
#[must_use]
pub fn category_names(mask: FaultMask) -> Vec<&'static str> {
    categories_for(mask).into_iter().map(FaultCategory::name).collect()
}
