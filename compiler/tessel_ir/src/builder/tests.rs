use pretty_assertions::assert_eq;

use super::*;
use crate::verify_function;

fn identity_fn(name: &str, width: u32) -> Function {
    let mut b = FunctionBuilder::new(name);
    let x = b.param("x", Type::Bits(width), None);
    b.add_op(Op::Identity, &[x], None)
        .unwrap_or_else(|e| panic!("{e}"));
    b.build().unwrap_or_else(|e| panic!("{e}"))
}

#[test]
fn empty_builder_cannot_build() {
    let b = FunctionBuilder::new("nothing");
    assert_eq!(
        b.build(),
        Err(VerifyError::EmptyFunction {
            function: "nothing".into()
        })
    );
}

#[test]
fn names_are_made_unique() {
    let mut b = FunctionBuilder::new("f");
    let x = b.param("x", Type::Bits(4), None);
    let y = b.add_op(Op::Neg, &[x], None).unwrap_or_else(|e| panic!("{e}"));
    assert_eq!(b.set_name(y, "x"), "x__1");
    let z = b.add_op(Op::Not, &[y], None).unwrap_or_else(|e| panic!("{e}"));
    assert_eq!(b.set_name(z, "x"), "x__2");
    let f = b.build().unwrap_or_else(|e| panic!("{e}"));
    assert_eq!(verify_function(&f), Ok(()));
}

#[test]
fn ill_typed_ops_are_rejected() {
    let mut b = FunctionBuilder::new("f");
    let x = b.param("x", Type::Bits(4), None);
    let y = b.param("y", Type::Bits(8), None);
    let err = b.add_op(Op::Add, &[x, y], None);
    assert!(matches!(err, Err(VerifyError::IllTyped { node: 2, .. })));
    assert_eq!(b.node_count(), 2);
}

#[test]
fn call_ops_need_a_callee() {
    let mut b = FunctionBuilder::new("f");
    let x = b.param("x", Type::Bits(4), None);
    let err = b.add_op(Op::Invoke { callee: "g".into() }, &[x], None);
    assert!(matches!(err, Err(VerifyError::IllTyped { .. })));
}

#[test]
fn invoke_checks_signature() {
    let callee = identity_fn("g", 8);
    let mut b = FunctionBuilder::new("f");
    let narrow = b.param("a", Type::Bits(4), None);
    let wide = b.param("b", Type::Bits(8), None);
    assert!(matches!(
        b.invoke(&callee, &[narrow], None),
        Err(VerifyError::SignatureMismatch { .. })
    ));
    let call = b.invoke(&callee, &[wide], None).unwrap_or_else(|e| panic!("{e}"));
    assert_eq!(b.ty(call), &Type::Bits(8));
}

#[test]
fn map_result_is_array_of_callee_results() {
    let callee = identity_fn("g", 8);
    let mut b = FunctionBuilder::new("f");
    let arr = b.param("arr", Type::array(Type::Bits(8), 3), None);
    let mapped = b.map(&callee, arr, None).unwrap_or_else(|e| panic!("{e}"));
    assert_eq!(b.ty(mapped), &Type::array(Type::Bits(8), 3));
}

#[test]
fn counted_for_matches_body_signature() {
    let mut body = FunctionBuilder::new("body");
    let i = body.param("i", Type::Bits(32), None);
    let acc = body.param("acc", Type::Bits(32), None);
    let k = body.param("k", Type::Bits(32), None);
    let sum = body.add_op(Op::Add, &[acc, i], None).unwrap_or_else(|e| panic!("{e}"));
    body.add_op(Op::Add, &[sum, k], None).unwrap_or_else(|e| panic!("{e}"));
    let body = body.build().unwrap_or_else(|e| panic!("{e}"));

    let mut b = FunctionBuilder::new("f");
    let init = b.param("init", Type::Bits(32), None);
    let inv = b.param("k", Type::Bits(32), None);
    assert!(matches!(
        b.counted_for(&body, 4, 1, init, &[], None),
        Err(VerifyError::SignatureMismatch { .. })
    ));
    let looped = b
        .counted_for(&body, 4, 1, init, &[inv], None)
        .unwrap_or_else(|e| panic!("{e}"));
    let f = b.build().unwrap_or_else(|e| panic!("{e}"));
    assert_eq!(f.node(looped).operands.as_slice(), &[init, inv]);
    assert!(f.to_string().contains("trip_count=4, stride=1, body=body"));
}
