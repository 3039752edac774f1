//! Named bit-field access over packed 64-bit kernel fault codes.
//!
//! Every decodable code layout publishes its fields as `const` [`FieldSpec`]
//! values, so the decoders address fields by constant rather than by string.
//! A [`FieldTable`] groups the same constants for name-based lookup, which
//! reports [`UnknownField`] instead of silently reading zero.

use thiserror::Error;

/// Width in bits of every packed code handled by the codec.
pub const PACKED_CODE_BITS: u8 = 64;

/// Inclusive bit range `lsb..=msb` with a stable name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FieldSpec {
    name: &'static str,
    lsb: u8,
    msb: u8,
}

impl FieldSpec {
    /// Creates a field covering bits `lsb..=msb`.
    ///
    /// # Panics
    ///
    /// Panics (at compile time when used in a `const`) if `lsb > msb` or
    /// `msb` is outside the 64-bit code.
    #[must_use]
    pub const fn new(name: &'static str, lsb: u8, msb: u8) -> Self {
        assert!(lsb <= msb, "field lsb must not exceed msb");
        assert!(msb < PACKED_CODE_BITS, "field must fit in 64 bits");
        Self { name, lsb, msb }
    }

    /// Field name used for table lookup.
    #[must_use]
    pub const fn name(self) -> &'static str {
        self.name
    }

    /// Index of the least significant bit.
    #[must_use]
    pub const fn lsb(self) -> u8 {
        self.lsb
    }

    /// Index of the most significant bit.
    #[must_use]
    pub const fn msb(self) -> u8 {
        self.msb
    }

    /// Number of bits covered by the field.
    #[must_use]
    pub const fn width(self) -> u8 {
        self.msb - self.lsb + 1
    }

    /// Right-aligned mask of `width()` ones.
    ///
    /// A full 64-bit field yields `u64::MAX` rather than overflowing to zero.
    #[must_use]
    pub const fn mask(self) -> u64 {
        if self.width() >= PACKED_CODE_BITS {
            u64::MAX
        } else {
            (1u64 << self.width()) - 1
        }
    }

    /// Reads this field out of `packed`.
    #[must_use]
    pub const fn extract(self, packed: u64) -> u64 {
        (packed >> self.lsb) & self.mask()
    }

    /// Returns `packed` with this field replaced by `value` (truncated to width).
    #[must_use]
    pub const fn insert(self, packed: u64, value: u64) -> u64 {
        let cleared = packed & !(self.mask() << self.lsb);
        cleared | ((value & self.mask()) << self.lsb)
    }

    /// Returns true when both fields share at least one bit.
    #[must_use]
    pub const fn overlaps(self, other: Self) -> bool {
        self.lsb <= other.msb && other.lsb <= self.msb
    }
}

/// Lookup failure for a field name absent from a layout table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Error)]
#[error("unknown field `{name}` in layout `{layout}`")]
pub struct UnknownField {
    /// Layout that was searched.
    pub layout: &'static str,
    /// Name that was requested.
    pub name: String,
}

/// Static set of named fields describing one packed code layout.
///
/// Overlapping fields are permitted: several layouts reuse the same bit range
/// under different interpretations selected by a discriminant field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldTable {
    layout: &'static str,
    fields: &'static [FieldSpec],
}

impl FieldTable {
    /// Creates a table named `layout`.
    #[must_use]
    pub const fn new(layout: &'static str, fields: &'static [FieldSpec]) -> Self {
        Self { layout, fields }
    }

    /// Layout name, used in error reports.
    #[must_use]
    pub const fn layout(&self) -> &'static str {
        self.layout
    }

    /// All fields in declaration order.
    #[must_use]
    pub const fn fields(&self) -> &'static [FieldSpec] {
        self.fields
    }

    /// Finds a field by name.
    ///
    /// # Errors
    ///
    /// Returns [`UnknownField`] when no field has that name.
    pub fn lookup(&self, name: &str) -> Result<FieldSpec, UnknownField> {
        self.fields
            .iter()
            .find(|field| field.name == name)
            .copied()
            .ok_or_else(|| UnknownField {
                layout: self.layout,
                name: name.to_string(),
            })
    }

    /// Returns every pair of fields sharing bits.
    #[must_use]
    pub fn overlapping(&self) -> Vec<(FieldSpec, FieldSpec)> {
        let mut pairs = Vec::new();
        for (index, first) in self.fields.iter().enumerate() {
            for second in &self.fields[index + 1..] {
                if first.overlaps(*second) {
                    pairs.push((*first, *second));
                }
            }
        }
        pairs
    }
}

/// One packed 64-bit code value with field accessors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct PackedCode(u64);

impl PackedCode {
    /// Wraps a raw unsigned value.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Wraps a signed kernel code, preserving its bit pattern.
    #[must_use]
    #[allow(clippy::cast_sign_loss)]
    pub const fn from_i64(value: i64) -> Self {
        Self(value as u64)
    }

    /// Raw unsigned value.
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }

    /// Bit pattern reinterpreted as the kernel's signed code type.
    #[must_use]
    #[allow(clippy::cast_possible_wrap)]
    pub const fn as_i64(self) -> i64 {
        self.0 as i64
    }

    /// Reads a field.
    #[must_use]
    pub const fn get(self, field: FieldSpec) -> u64 {
        field.extract(self.0)
    }

    /// Writes a field in place.
    #[allow(clippy::missing_const_for_fn)]
    pub fn set(&mut self, field: FieldSpec, value: u64) {
        self.0 = field.insert(self.0, value);
    }

    /// Builder form of [`PackedCode::set`].
    #[must_use]
    pub const fn with(self, field: FieldSpec, value: u64) -> Self {
        Self(field.insert(self.0, value))
    }

    /// Reads a field by name from `table`.
    ///
    /// # Errors
    ///
    /// Returns [`UnknownField`] when `table` has no such field.
    pub fn get_named(self, table: &FieldTable, name: &str) -> Result<u64, UnknownField> {
        table.lookup(name).map(|field| self.get(field))
    }

    /// Writes a field by name from `table`; the value is left untouched on error.
    ///
    /// # Errors
    ///
    /// Returns [`UnknownField`] when `table` has no such field.
    pub fn set_named(
        &mut self,
        table: &FieldTable,
        name: &str,
        value: u64,
    ) -> Result<(), UnknownField> {
        let field = table.lookup(name)?;
        self.set(field, value);
        Ok(())
    }
}
