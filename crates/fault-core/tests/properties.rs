//! Property coverage for the codec, the registry, and the decoder.

#![allow(clippy::pedantic, clippy::nursery, clippy::cast_possible_truncation)]

use std::collections::BTreeSet;

use bitflags as _;
use fault_core::{
    categories_for, decode_for, mask_for, Arch, FaultCategory, FaultMask, FieldSpec, PackedCode,
    RawFault,
};
use proptest::prelude::*;
use rstest as _;
#[cfg(feature = "serde")]
use serde as _;
use thiserror as _;

fn field() -> impl Strategy<Value = FieldSpec> {
    (0u8..64)
        .prop_flat_map(|lsb| (Just(lsb), lsb..64))
        .prop_map(|(lsb, msb)| FieldSpec::new("field", lsb, msb))
}

fn category() -> impl Strategy<Value = FaultCategory> {
    prop::sample::select(FaultCategory::ALL.to_vec())
}

fn arch() -> impl Strategy<Value = Arch> {
    prop_oneof![Just(Arch::Arm64), Just(Arch::X86_64)]
}

proptest! {
    #[test]
    fn property_set_then_get_returns_value_mod_width(
        spec in field(),
        packed in any::<u64>(),
        value in any::<u64>(),
    ) {
        let code = PackedCode::new(packed).with(spec, value);
        prop_assert_eq!(code.get(spec), value & spec.mask());
    }

    #[test]
    fn property_set_leaves_other_bits_alone(
        spec in field(),
        packed in any::<u64>(),
        value in any::<u64>(),
    ) {
        let outside = !(spec.mask() << spec.lsb());
        let code = PackedCode::new(packed).with(spec, value);
        prop_assert_eq!(code.value() & outside, packed & outside);
    }

    #[test]
    fn property_mask_round_trip(selection in prop::collection::btree_set(category(), 0..=13)) {
        let mask = mask_for(selection.iter().copied());
        prop_assert_eq!(categories_for(mask), selection);
    }

    #[test]
    fn property_raw_mask_bits_survive_only_when_known(raw in any::<u32>()) {
        let mask = FaultMask::from_exception_mask(raw);
        prop_assert_eq!(mask.exception_mask(), raw & FaultMask::ALL_CATEGORIES.bits());
    }

    #[test]
    fn property_decode_is_total_and_deterministic(
        arch in arch(),
        category in category(),
        code in proptest::option::of(any::<i64>()),
        subcode in proptest::option::of(any::<i64>()),
    ) {
        let first = decode_for(arch, category, code, subcode);
        let second = decode_for(arch, category, code, subcode);
        prop_assert_eq!(first, second);
        if let Some(decoded) = first {
            prop_assert_eq!(decoded.category(), category);
        }
    }

    #[test]
    fn property_absent_code_never_decodes(
        arch in arch(),
        category in category(),
        subcode in proptest::option::of(any::<i64>()),
    ) {
        prop_assert_eq!(decode_for(arch, category, None, subcode), None);
    }

    #[test]
    fn property_absent_subcode_decodes_only_syscalls(
        arch in arch(),
        category in category(),
        code in any::<i64>(),
    ) {
        let decoded = decode_for(arch, category, Some(code), None);
        if !matches!(category, FaultCategory::Syscall | FaultCategory::KernelSyscall) {
            prop_assert_eq!(decoded, None);
        } else {
            prop_assert!(decoded.is_some());
        }
    }

    #[test]
    fn property_raw_fault_from_exception_keeps_codes(
        category in category(),
        codes in prop::collection::vec(any::<i64>(), 0..4),
    ) {
        let raw = RawFault::from_exception(category.as_raw(), &codes).expect("known category");
        prop_assert_eq!(raw.category, category);
        prop_assert_eq!(raw.code, codes.first().copied());
        prop_assert_eq!(raw.subcode, codes.get(1).copied());
    }
}

#[test]
fn empty_and_full_masks_round_trip() {
    assert_eq!(categories_for(FaultMask::empty()), BTreeSet::new());
    let all: BTreeSet<_> = FaultCategory::ALL.into_iter().collect();
    assert_eq!(categories_for(FaultMask::ALL_CATEGORIES), all);
    assert_eq!(mask_for(all), FaultMask::ALL_CATEGORIES);
}
