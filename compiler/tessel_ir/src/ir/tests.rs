use pretty_assertions::assert_eq;

use super::*;
use crate::{Bits, FunctionBuilder};

fn lit(b: &mut FunctionBuilder, width: u64, value: u128) -> NodeRef {
    let bits = Bits::new(width, value).unwrap_or_else(|e| panic!("{e}"));
    b.literal(Value::Bits(bits), None)
}

#[test]
fn text_form_of_simple_function() {
    let mut b = FunctionBuilder::new("__m__add");
    let x = b.param("x", Type::Bits(8), None);
    let y = b.param("y", Type::Bits(8), None);
    b.add_op(Op::Add, &[x, y], Some(Span::new(10, 15)))
        .unwrap_or_else(|e| panic!("{e}"));
    let f = b.build().unwrap_or_else(|e| panic!("{e}"));

    assert_eq!(
        f.to_string(),
        "fn __m__add(x: bits[8] id=0, y: bits[8] id=1) -> bits[8] {\n  \
         ret add.2: bits[8] = add(x, y, id=2, pos=10..15)\n}"
    );
}

#[test]
fn attributes_are_printed() {
    let mut b = FunctionBuilder::new("f");
    let x = b.param("x", Type::Bits(8), None);
    let slice = b
        .add_op(Op::BitSlice { start: 2, width: 4 }, &[x], None)
        .unwrap_or_else(|e| panic!("{e}"));
    b.set_name(slice, "mid");
    let f = b.build().unwrap_or_else(|e| panic!("{e}"));

    assert!(f
        .to_string()
        .contains("ret mid: bits[4] = bit_slice(x, start=2, width=4, id=1)"));
}

#[test]
fn returned_param_gets_ret_line() {
    let mut b = FunctionBuilder::new("id");
    b.param("x", Type::Bits(4), None);
    let f = b.build().unwrap_or_else(|e| panic!("{e}"));
    assert_eq!(f.to_string(), "fn id(x: bits[4] id=0) -> bits[4] {\n  ret x\n}");
}

#[test]
fn result_types() {
    let t8 = Type::Bits(8);
    let t4 = Type::Bits(4);
    assert_eq!(Op::Concat.result_type(&[&t8, &t4]), Ok(Some(Type::Bits(12))));
    assert_eq!(Op::ULt.result_type(&[&t8, &t8]), Ok(Some(Type::Bits(1))));
    assert!(Op::Add.result_type(&[&t8, &t4]).is_err());
    assert_eq!(
        Op::OneHot { lsb_prio: true }.result_type(&[&t4]),
        Ok(Some(Type::Bits(5)))
    );
    assert_eq!(
        Op::SignExt { new_bit_count: 16 }.result_type(&[&t8]),
        Ok(Some(Type::Bits(16)))
    );
    assert!(Op::ZeroExt { new_bit_count: 4 }.result_type(&[&t8]).is_err());
    assert_eq!(Op::Invoke { callee: "g".into() }.result_type(&[&t8]), Ok(None));
}

#[test]
fn select_case_counts() {
    let t1 = Type::Bits(1);
    let t2 = Type::Bits(2);
    let t8 = Type::Bits(8);
    let sel = Op::Select { has_default: false };
    assert_eq!(sel.result_type(&[&t1, &t8, &t8]), Ok(Some(t8.clone())));
    assert!(sel.result_type(&[&t2, &t8, &t8]).is_err());
    let with_default = Op::Select { has_default: true };
    assert_eq!(
        with_default.result_type(&[&t2, &t8, &t8, &t8]),
        Ok(Some(t8.clone()))
    );
    assert_eq!(
        Op::PrioritySelect.result_type(&[&t2, &t8, &t8, &t8]),
        Ok(Some(t8))
    );
}

#[test]
fn select_without_cases_is_rejected() {
    let t1 = Type::Bits(1);
    assert_eq!(
        Op::Select { has_default: true }.result_type(&[&t1]),
        Err("sel with a default needs a default case".to_string())
    );
    assert!(Op::Select { has_default: false }.result_type(&[&t1]).is_err());
}

#[test]
fn aggregate_ops() {
    let mut b = FunctionBuilder::new("agg");
    let a = lit(&mut b, 8, 1);
    let c = lit(&mut b, 8, 2);
    let arr = b.add_op(Op::Array, &[a, c], None).unwrap_or_else(|e| panic!("{e}"));
    let idx = lit(&mut b, 1, 1);
    let elem = b
        .add_op(Op::ArrayIndex, &[arr, idx], None)
        .unwrap_or_else(|e| panic!("{e}"));
    let tuple = b
        .add_op(Op::Tuple, &[elem, idx], None)
        .unwrap_or_else(|e| panic!("{e}"));
    b.add_op(Op::TupleIndex { index: 1 }, &[tuple], None)
        .unwrap_or_else(|e| panic!("{e}"));
    let f = b.build().unwrap_or_else(|e| panic!("{e}"));

    assert_eq!(f.node(arr).ty, Type::array(Type::Bits(8), 2));
    assert_eq!(f.return_type(), &Type::Bits(1));
    assert_eq!(f.nodes_where(|op| matches!(op, Op::Literal(_))).count(), 3);
}
