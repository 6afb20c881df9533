use pretty_assertions::assert_eq;
use proptest::prelude::*;

use super::*;

#[test]
fn bits_are_masked_to_width() {
    let bits = Bits::new(4, 0x1f).unwrap_or_else(|e| panic!("{e}"));
    assert_eq!(bits.value(), 0xf);
    assert_eq!(bits.to_string(), "bits[4]:15");
}

#[test]
fn negative_values_use_twos_complement() {
    let bits = Bits::from_i128(8, -1).unwrap_or_else(|e| panic!("{e}"));
    assert_eq!(bits.value(), 0xff);
    assert_eq!(bits.to_signed(), -1);
}

#[test]
fn widths_above_128_are_rejected() {
    assert_eq!(Bits::new(129, 0), Err(ValueError::TooWide(129)));
    assert!(Bits::new(128, u128::MAX).is_ok());
}

#[test]
fn aggregate_types_and_display() {
    let a = Value::ubits(8, 1).unwrap_or_else(|e| panic!("{e}"));
    let b = Value::ubits(8, 2).unwrap_or_else(|e| panic!("{e}"));
    let arr = Value::array(vec![a.clone(), b]).unwrap_or_else(|e| panic!("{e}"));
    assert_eq!(arr.ty(), Type::array(Type::Bits(8), 2));
    assert_eq!(arr.to_string(), "[bits[8]:1, bits[8]:2]");

    let tuple = Value::Tuple(vec![a, Value::Bits(Bits::bool(true))]);
    assert_eq!(tuple.ty().to_string(), "(bits[8], bits[1])");
    assert_eq!(tuple.ty().flat_bit_count(), 9);
}

#[test]
fn mixed_arrays_are_rejected() {
    let a = Value::ubits(8, 1).unwrap_or_else(|e| panic!("{e}"));
    let b = Value::ubits(4, 1).unwrap_or_else(|e| panic!("{e}"));
    assert_eq!(Value::array(vec![a, b]), Err(ValueError::MixedArray));
    assert_eq!(Value::array(Vec::new()), Err(ValueError::EmptyArray));
}

proptest! {
    #[test]
    fn masking_keeps_value_in_range(width in 1u64..=128, value in any::<u128>()) {
        let bits = Bits::new(width, value).unwrap_or_else(|e| panic!("{e}"));
        if width < 128 {
            prop_assert!(bits.value() < (1u128 << width));
        }
        prop_assert_eq!(Bits::new(width, bits.value()), Ok(bits));
    }

    #[test]
    fn signed_round_trip(value in -128i128..128) {
        let bits = Bits::from_i128(8, value).unwrap_or_else(|e| panic!("{e}"));
        prop_assert_eq!(bits.to_signed(), value);
    }
}
