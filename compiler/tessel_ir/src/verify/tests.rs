use pretty_assertions::assert_eq;

use super::*;
use crate::{FunctionBuilder, NodeRef};

fn identity_fn(name: &str) -> Function {
    let mut b = FunctionBuilder::new(name);
    let x = b.param("x", Type::Bits(8), None);
    b.add_op(Op::Identity, &[x], None)
        .unwrap_or_else(|e| panic!("{e}"));
    b.build().unwrap_or_else(|e| panic!("{e}"))
}

fn caller(name: &str, callee: &Function) -> Function {
    let mut b = FunctionBuilder::new(name);
    let x = b.param("x", Type::Bits(8), None);
    b.invoke(callee, &[x], None).unwrap_or_else(|e| panic!("{e}"));
    b.build().unwrap_or_else(|e| panic!("{e}"))
}

#[test]
fn built_functions_verify() {
    assert_eq!(verify_function(&identity_fn("g")), Ok(()));
}

#[test]
fn forward_references_are_caught() {
    let mut f = identity_fn("g");
    f.nodes[1].operands[0] = NodeRef::new(1);
    assert!(matches!(
        verify_function(&f),
        Err(VerifyError::ForwardReference { node: 1, operand: 1, .. })
    ));
}

#[test]
fn tampered_types_are_caught() {
    let mut f = identity_fn("g");
    f.nodes[1].ty = Type::Bits(9);
    assert!(matches!(
        verify_function(&f),
        Err(VerifyError::TypeMismatch { node: 1, .. })
    ));
}

#[test]
fn duplicate_names_are_caught() {
    let mut f = identity_fn("g");
    f.nodes[1].name = Some("x".into());
    assert_eq!(
        verify_function(&f),
        Err(VerifyError::DuplicateName {
            function: "g".into(),
            name: "x".into()
        })
    );
}

#[test]
fn package_requires_callee_before_caller() {
    let g = identity_fn("g");
    let f = caller("f", &g);

    let mut ordered = Package::new("p");
    ordered.add_function(g.clone()).unwrap_or_else(|e| panic!("{e}"));
    ordered.add_function(f.clone()).unwrap_or_else(|e| panic!("{e}"));
    assert_eq!(verify_package(&ordered), Ok(()));

    let mut reversed = Package::new("p");
    reversed.add_function(f).unwrap_or_else(|e| panic!("{e}"));
    reversed.add_function(g).unwrap_or_else(|e| panic!("{e}"));
    assert_eq!(
        verify_package(&reversed),
        Err(VerifyError::CalleeAfterCaller {
            function: "f".into(),
            callee: "g".into()
        })
    );
}

#[test]
fn package_reports_unknown_callee() {
    let g = identity_fn("g");
    let f = caller("f", &g);
    let mut package = Package::new("p");
    package.add_function(f).unwrap_or_else(|e| panic!("{e}"));
    assert!(matches!(
        verify_package(&package),
        Err(VerifyError::UnknownCallee { .. })
    ));
}
