use pretty_assertions::assert_eq;
use proptest::prelude::*;

use super::*;

fn bindings(pairs: &[(&str, u64)]) -> SymbolicBindings {
    pairs.iter().map(|&(k, v)| (k, v)).collect()
}

#[test]
fn plain_function() {
    assert_eq!(
        mangle_name("std.bits", "clz8", &[], &SymbolicBindings::new()),
        Ok("__std_Dbits__clz8".to_string())
    );
}

#[test]
fn underscores_are_escaped() {
    let b = bindings(&[("N_MAX", 4)]);
    assert_eq!(
        mangle_name("a_b", "f_g", &["N_MAX"], &b),
        Ok("__a_Ub__f_Ug__N_UMAX_4".to_string())
    );
}

#[test]
fn bindings_cannot_be_spelled_in_the_function_name() {
    let parametric = mangle_name("m", "f", &["N"], &bindings(&[("N", 4)])).unwrap();
    let plain = mangle_name("m", "f__N_4", &[], &SymbolicBindings::new()).unwrap();
    assert_ne!(parametric, plain);
}

#[test]
fn dotted_and_underscored_modules_differ() {
    let empty = SymbolicBindings::new();
    assert_ne!(
        mangle_name("a.b", "f", &[], &empty).unwrap(),
        mangle_name("a_b", "f", &[], &empty).unwrap()
    );
    assert_ne!(
        mangle_name("a", "b__f", &[], &empty).unwrap(),
        mangle_name("a__b", "f", &[], &empty).unwrap()
    );
}

#[test]
fn bindings_follow_key_order() {
    let b = bindings(&[("N", 4), ("M", 8)]);
    assert_eq!(
        mangle_name("top", "pad", &["N", "M"], &b),
        Ok("__top__pad__M_8__N_4".to_string())
    );
}

#[test]
fn undeclared_bindings_are_ignored() {
    let b = bindings(&[("N", 4), ("EXTRA", 1)]);
    assert_eq!(
        mangle_name("top", "id", &["N"], &b),
        Ok("__top__id__N_4".to_string())
    );
}

#[test]
fn missing_binding_is_reported() {
    let b = bindings(&[("M", 3)]);
    let err = mangle_name("top", "pad", &["N", "M"], &b).unwrap_err();
    assert_eq!(
        err,
        ConversionError::InsufficientBindings {
            function: "pad".into(),
            needed: vec!["M".into(), "N".into()],
            got: vec!["M".into()],
        }
    );
}

fn ident() -> impl Strategy<Value = String> {
    "[a-z_][a-zA-Z0-9_]{0,5}"
}

fn module_path() -> impl Strategy<Value = String> {
    prop::collection::vec(ident(), 1..3).prop_map(|parts| parts.join("."))
}

fn binding_set() -> impl Strategy<Value = Vec<(String, u64)>> {
    prop::collection::btree_map("[A-Z_][A-Z_0-9]{0,2}", 0u64..64, 0..3)
        .prop_map(|m| m.into_iter().collect())
}

proptest! {
    #[test]
    fn identical_triples_agree(module in module_path(), function in ident(), pairs in binding_set()) {
        let keys: Vec<&str> = pairs.iter().map(|(k, _)| k.as_str()).collect();
        let b: SymbolicBindings = pairs.iter().map(|(k, v)| (k.clone(), *v)).collect();
        prop_assert_eq!(
            mangle_name(&module, &function, &keys, &b),
            mangle_name(&module, &function, &keys, &b)
        );
    }

    #[test]
    fn distinct_triples_differ(
        m1 in module_path(), f1 in ident(), p1 in binding_set(),
        m2 in module_path(), f2 in ident(), p2 in binding_set(),
    ) {
        prop_assume!((&m1, &f1, &p1) != (&m2, &f2, &p2));

        let k1: Vec<&str> = p1.iter().map(|(k, _)| k.as_str()).collect();
        let k2: Vec<&str> = p2.iter().map(|(k, _)| k.as_str()).collect();
        let b1: SymbolicBindings = p1.iter().map(|(k, v)| (k.clone(), *v)).collect();
        let b2: SymbolicBindings = p2.iter().map(|(k, v)| (k.clone(), *v)).collect();
        let n1 = mangle_name(&m1, &f1, &k1, &b1).unwrap();
        let n2 = mangle_name(&m2, &f2, &k2, &b2).unwrap();
        prop_assert_ne!(n1, n2);
    }
}
