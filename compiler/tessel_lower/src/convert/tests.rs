use pretty_assertions::assert_eq;
use tessel_ast::{
    BinopKind, ColonSubject, ConcreteType, Dim, ModuleId, PatternLeaf, Program, ProgramBuilder,
    SymbolicBindings, TypeInfo,
};
use tessel_ir::{Function, Op, Package, Type, Value};

use crate::{convert_module, EvaluationError, LowerError, LowerOptions};

fn no_evaluation(
    _: &Program,
    _: ModuleId,
    name: &str,
    _: &[Value],
    _: &SymbolicBindings,
) -> Result<Value, EvaluationError> {
    Err(EvaluationError::new(format!("`{name}` cannot be evaluated here")))
}

fn convert(program: &Program, types: &TypeInfo, module: ModuleId) -> Result<Package, LowerError> {
    convert_module(program, module, types, &no_evaluation, LowerOptions::default())
}

fn only_function(package: &Package) -> &Function {
    assert_eq!(package.len(), 1, "{}", package.dump_ir());
    &package.functions()[0]
}

/// Mnemonics of the non-parameter nodes, in order.
fn ops(function: &Function) -> Vec<&'static str> {
    function
        .nodes()
        .iter()
        .filter(|n| n.op != Op::Param)
        .map(|n| n.op.mnemonic())
        .collect()
}

fn operand_names(function: &Function, op: &str) -> Vec<String> {
    let node = function
        .nodes()
        .iter()
        .find(|n| n.op.mnemonic() == op)
        .unwrap_or_else(|| panic!("no `{op}` node in\n{function}"));
    node.operands
        .iter()
        .map(|o| function.node(*o).display_name())
        .collect()
}

fn u(width: u64) -> ConcreteType {
    ConcreteType::ubits(width)
}

#[test]
fn ternary_puts_alternate_in_case_zero() {
    let mut b = ProgramBuilder::new();
    let m = b.module("m");
    let mut f = b.begin_function("pick");
    let c = b.param(&mut f, "c", u(1));
    let x = b.param(&mut f, "x", u(8));
    let y = b.param(&mut f, "y", u(8));
    let test = b.name_ref(c);
    let consequent = b.name_ref(x);
    let alternate = b.name_ref(y);
    let body = b.ternary(test, consequent, alternate, u(8));
    b.finish_function(m, f, body);
    let (program, types) = b.finish();

    let package = convert(&program, &types, m).unwrap();
    let function = only_function(&package);
    assert_eq!(function.name(), "__m__pick");
    assert_eq!(ops(function), vec!["sel"]);
    assert_eq!(operand_names(function, "sel"), vec!["c", "y", "x"]);
    assert_eq!(function.return_type(), &Type::Bits(8));
}

#[test]
fn parameter_tail_is_returned_through_identity() {
    let mut b = ProgramBuilder::new();
    let m = b.module("m");
    let mut f = b.begin_function("pass");
    let x = b.param(&mut f, "x", u(8));
    let body = b.name_ref(x);
    b.finish_function(m, f, body);
    let (program, types) = b.finish();

    let package = convert(&program, &types, m).unwrap();
    let function = only_function(&package);
    assert_eq!(ops(function), vec!["identity"]);
    assert_eq!(function.return_node().op, Op::Identity);
    assert_eq!(operand_names(function, "identity"), vec!["x"]);
}

#[test]
fn literal_tail_is_returned_directly() {
    let mut b = ProgramBuilder::new();
    let m = b.module("m");
    let f = b.begin_function("five");
    let body = b.number(5, u(8));
    b.finish_function(m, f, body);
    let (program, types) = b.finish();

    let package = convert(&program, &types, m).unwrap();
    let function = only_function(&package);
    assert_eq!(ops(function), vec!["literal"]);
    assert_eq!(
        function.return_node().op,
        Op::Literal(Value::ubits(8, 5).unwrap())
    );
}

#[test]
fn same_width_cast_of_a_parameter_is_returned_through_identity() {
    let mut b = ProgramBuilder::new();
    let m = b.module("m");
    let mut f = b.begin_function("reinterpret");
    let x = b.param(&mut f, "x", u(8));
    let x_ref = b.name_ref(x);
    let body = b.cast(x_ref, ConcreteType::sbits(8));
    b.finish_function(m, f, body);
    let (program, types) = b.finish();

    let package = convert(&program, &types, m).unwrap();
    let function = only_function(&package);
    assert_eq!(ops(function), vec!["identity"]);
    assert_eq!(function.return_node().op, Op::Identity);
    assert_eq!(operand_names(function, "identity"), vec!["x"]);
}

#[test]
fn casts_truncate_and_extend() {
    let mut b = ProgramBuilder::new();
    let m = b.module("m");
    let mut f = b.begin_function("casts");
    let x = b.param(&mut f, "x", u(8));
    let s = b.param(&mut f, "s", ConcreteType::sbits(4));
    let x_ref = b.name_ref(x);
    let narrow = b.cast(x_ref, u(4));
    let s_ref = b.name_ref(s);
    let signed = b.cast(s_ref, ConcreteType::sbits(8));
    let x_ref = b.name_ref(x);
    let unsigned = b.cast(x_ref, u(16));
    let body = b.tuple(
        vec![narrow, signed, unsigned],
        ConcreteType::tuple([u(4), ConcreteType::sbits(8), u(16)]),
    );
    b.finish_function(m, f, body);
    let (program, types) = b.finish();

    let package = convert(&program, &types, m).unwrap();
    let function = only_function(&package);
    let ops: Vec<&Op> = function
        .nodes()
        .iter()
        .filter(|n| n.op != Op::Param)
        .map(|n| &n.op)
        .collect();
    assert_eq!(
        ops,
        vec![
            &Op::BitSlice { start: 0, width: 4 },
            &Op::SignExt { new_bit_count: 8 },
            &Op::ZeroExt { new_bit_count: 16 },
            &Op::Tuple,
        ]
    );
}

#[test]
fn division_and_comparison_follow_signedness() {
    let mut b = ProgramBuilder::new();
    let m = b.module("m");
    let mut f = b.begin_function("div");
    let a = b.param(&mut f, "a", ConcreteType::sbits(8));
    let c = b.param(&mut f, "c", ConcreteType::sbits(8));
    let lhs = b.name_ref(a);
    let rhs = b.name_ref(c);
    let quotient = b.binop(BinopKind::Div, lhs, rhs, ConcreteType::sbits(8));
    let lhs = b.name_ref(a);
    let rhs = b.name_ref(c);
    let less = b.binop(BinopKind::Lt, lhs, rhs, u(1));
    let body = b.tuple(
        vec![quotient, less],
        ConcreteType::tuple([ConcreteType::sbits(8), u(1)]),
    );
    b.finish_function(m, f, body);
    let (program, types) = b.finish();

    let package = convert(&program, &types, m).unwrap();
    assert_eq!(ops(only_function(&package)), vec!["sdiv", "slt", "tuple"]);
}

#[test]
fn match_lowers_to_priority_select() {
    let mut b = ProgramBuilder::new();
    let m = b.module("m");
    let mut f = b.begin_function("decode");
    let x = b.param(&mut f, "x", u(2));
    let subject = b.name_ref(x);
    let zero = b.number(0, u(2));
    let zero = b.pattern_leaf(PatternLeaf::Number(zero));
    let one = b.number(1, u(2));
    let one = b.pattern_leaf(PatternLeaf::Number(one));
    let default = b.wildcard();
    let first = b.number(10, u(4));
    let second = b.number(11, u(4));
    let fallback = b.number(12, u(4));
    let body = b.match_(
        subject,
        vec![
            (vec![zero], first),
            (vec![one], second),
            (vec![default], fallback),
        ],
        u(4),
    );
    b.finish_function(m, f, body);
    let (program, types) = b.finish();

    let package = convert(&program, &types, m).unwrap();
    let function = only_function(&package);
    let select = function.return_node();
    assert_eq!(select.op, Op::PrioritySelect);
    assert_eq!(select.operands.len(), 4);

    let selector = function.node(select.operands[0]);
    assert_eq!(selector.op, Op::Concat);
    assert_eq!(selector.ty, Type::Bits(2));
    // Arm 0 owns the least significant selector bit.
    let low = function.node(selector.operands[1]);
    let expected = function.node(low.operands[0]);
    assert_eq!(expected.op, Op::Literal(Value::ubits(2, 0).unwrap()));

    let default = function.node(select.operands[3]);
    assert_eq!(default.op, Op::Literal(Value::ubits(4, 12).unwrap()));
}

#[test]
fn match_with_only_a_default_is_an_identity() {
    let mut b = ProgramBuilder::new();
    let m = b.module("m");
    let mut f = b.begin_function("always");
    let x = b.param(&mut f, "x", u(2));
    let subject = b.name_ref(x);
    let (pattern, y) = b.bind("y", u(2));
    let value = b.name_ref(y);
    let body = b.match_(subject, vec![(vec![pattern], value)], u(2));
    b.finish_function(m, f, body);
    let (program, types) = b.finish();

    let package = convert(&program, &types, m).unwrap();
    let function = only_function(&package);
    assert_eq!(ops(function), vec!["identity"]);
    assert_eq!(operand_names(function, "identity"), vec!["x"]);
}

#[test]
fn match_without_trailing_default_is_structural() {
    let mut b = ProgramBuilder::new();
    let m = b.module("m");
    let mut f = b.begin_function("partial");
    let x = b.param(&mut f, "x", u(1));
    let subject = b.name_ref(x);
    let zero = b.number(0, u(1));
    let zero = b.pattern_leaf(PatternLeaf::Number(zero));
    let one = b.number(1, u(1));
    let one = b.pattern_leaf(PatternLeaf::Number(one));
    let a = b.number(3, u(4));
    let c = b.number(4, u(4));
    let body = b.match_(subject, vec![(vec![zero], a), (vec![one], c)], u(4));
    b.finish_function(m, f, body);
    let (program, types) = b.finish();

    let err = convert(&program, &types, m).unwrap_err();
    assert_eq!(
        err,
        LowerError::structural(
            program.arena.span(body),
            "Only matches with trailing irrefutable patterns are currently supported for IR conversion.",
        )
    );
}

#[test]
fn let_destructures_tuples_skipping_wildcards() {
    let mut b = ProgramBuilder::new();
    let m = b.module("m");
    let pair = ConcreteType::tuple([u(8), u(4)]);
    let mut f = b.begin_function("first");
    let p = b.param(&mut f, "p", pair.clone());
    let (a_tree, a) = b.bind("a", u(8));
    let skip = b.wildcard();
    let pattern = b.tuple_pattern(vec![a_tree, skip], pair);
    let rhs = b.name_ref(p);
    let tail = b.name_ref(a);
    let body = b.let_(pattern, rhs, tail);
    b.finish_function(m, f, body);
    let (program, types) = b.finish();

    let package = convert(&program, &types, m).unwrap();
    let function = only_function(&package);
    assert_eq!(ops(function), vec!["tuple_index", "identity"]);
    assert_eq!(operand_names(function, "identity"), vec!["a"]);
    assert_eq!(function.return_type(), &Type::Bits(8));
}

#[test]
fn struct_members_follow_declaration_order() {
    let mut b = ProgramBuilder::new();
    let m = b.module("m");
    let point = b.struct_def(m, "Point", &["hi", "lo"]);
    let ty = ConcreteType::Tuple {
        members: vec![(Some("hi".into()), u(4)), (Some("lo".into()), u(4))],
    };
    let mut f = b.begin_function("make");
    let l = b.param(&mut f, "l", u(4));
    let h = b.param(&mut f, "h", u(4));
    let lo = b.name_ref(l);
    let hi = b.name_ref(h);
    let body = b.struct_instance(point, vec![("lo".into(), lo), ("hi".into(), hi)], ty);
    b.finish_function(m, f, body);
    let (program, types) = b.finish();

    let package = convert(&program, &types, m).unwrap();
    assert_eq!(operand_names(only_function(&package), "tuple"), vec!["h", "l"]);
}

#[test]
fn array_ellipsis_repeats_the_last_member() {
    let mut b = ProgramBuilder::new();
    let m = b.module("m");
    let mut f = b.begin_function("fill");
    let x = b.param(&mut f, "x", u(8));
    let y = b.param(&mut f, "y", u(8));
    let first = b.name_ref(x);
    let last = b.name_ref(y);
    let body = b.array(vec![first, last], true, ConcreteType::array(u(8), 4));
    b.finish_function(m, f, body);
    let (program, types) = b.finish();

    let package = convert(&program, &types, m).unwrap();
    let function = only_function(&package);
    assert_eq!(operand_names(function, "array"), vec!["x", "y", "y", "y"]);
    assert_eq!(function.return_type(), &Type::array(Type::Bits(8), 4));
}

#[test]
fn module_constants_are_named_literals() {
    let mut b = ProgramBuilder::new();
    let m = b.module("m");
    let three = b.number(3, u(8));
    let (_, k) = b.constant(m, "K", three, u(8));
    let mut f = b.begin_function("bump");
    let x = b.param(&mut f, "x", u(8));
    let lhs = b.name_ref(x);
    let rhs = b.const_ref(k);
    let body = b.binop(BinopKind::Add, lhs, rhs, u(8));
    b.finish_function(m, f, body);
    let (program, types) = b.finish();

    let package = convert(&program, &types, m).unwrap();
    let function = only_function(&package);
    assert_eq!(ops(function), vec!["literal", "add"]);
    assert_eq!(operand_names(function, "add"), vec!["x", "K"]);
}

#[test]
fn enum_members_are_literals() {
    let mut b = ProgramBuilder::new();
    let m = b.module("m");
    let enum_ty = ConcreteType::Enum { size: Dim::Known(2) };
    let a = b.number(1, enum_ty.clone());
    let c = b.number(2, enum_ty.clone());
    let colour = b.enum_def(m, "Colour", vec![("A".into(), a), ("B".into(), c)]);
    let f = b.begin_function("blue");
    let body = b.colon_ref(ColonSubject::Enum(colour), "B", Some(enum_ty));
    b.finish_function(m, f, body);
    let (program, types) = b.finish();

    let package = convert(&program, &types, m).unwrap();
    let function = only_function(&package);
    assert_eq!(ops(function), vec!["literal", "identity"]);
    assert_eq!(function.return_type(), &Type::Bits(2));
}

#[test]
fn signex_takes_its_width_from_the_second_argument() {
    let mut b = ProgramBuilder::new();
    let m = b.module("m");
    let mut f = b.begin_function("widen");
    let x = b.param(&mut f, "x", u(4));
    let y = b.param(&mut f, "y", ConcreteType::sbits(8));
    let value = b.name_ref(x);
    let like = b.name_ref(y);
    let body = b.invoke_builtin("signex", vec![value, like], Some(ConcreteType::sbits(8)));
    b.finish_function(m, f, body);
    let (program, types) = b.finish();

    let package = convert(&program, &types, m).unwrap();
    let function = only_function(&package);
    assert_eq!(function.return_node().op, Op::SignExt { new_bit_count: 8 });
    assert_eq!(operand_names(function, "sign_ext"), vec!["x"]);
}

#[test]
fn bit_slice_needs_known_bounds() {
    let mut b = ProgramBuilder::new();
    let m = b.module("m");
    let mut f = b.begin_function("slice");
    let x = b.param(&mut f, "x", u(8));
    let s = b.param(&mut f, "s", u(8));
    let value = b.name_ref(x);
    let start = b.name_ref(s);
    let width = b.number(2, u(8));
    let body = b.invoke_builtin("bit_slice", vec![value, start, width], Some(u(2)));
    b.finish_function(m, f, body);
    let (program, types) = b.finish();

    let err = convert(&program, &types, m).unwrap_err();
    assert!(!err.is_fatal());
    assert_eq!(err.span(), Some(program.arena.span(start)));
}

#[test]
fn unknown_builtin_is_structural() {
    let mut b = ProgramBuilder::new();
    let m = b.module("m");
    let mut f = b.begin_function("odd");
    let x = b.param(&mut f, "x", u(8));
    let arg = b.name_ref(x);
    let body = b.invoke_builtin("frobnicate", vec![arg], Some(u(8)));
    b.finish_function(m, f, body);
    let (program, types) = b.finish();

    let err = convert(&program, &types, m).unwrap_err();
    assert_eq!(
        err,
        LowerError::structural(
            program.arena.span(body),
            "`frobnicate` is neither a builtin nor a converted function",
        )
    );
}

#[test]
fn oversized_parameters_are_structural() {
    let mut b = ProgramBuilder::new();
    let m = b.module("m");
    let mut f = b.begin_function("huge");
    let x = b.param(&mut f, "x", u(200));
    let body = b.name_ref(x);
    b.finish_function(m, f, body);
    let (program, types) = b.finish();

    let err = convert(&program, &types, m).unwrap_err();
    assert!(!err.is_fatal());
}

#[test]
fn unbound_local_reference_is_fatal() {
    let mut b = ProgramBuilder::new();
    let m = b.module("m");
    let (_, ghost) = b.bind("ghost", u(8));
    let f = b.begin_function("haunted");
    let body = b.name_ref(ghost);
    b.finish_function(m, f, body);
    let (program, types) = b.finish();

    let err = convert(&program, &types, m).unwrap_err();
    assert!(err.is_fatal());
}

#[test]
fn positions_can_be_left_out() {
    let mut b = ProgramBuilder::new();
    let m = b.module("m");
    let mut f = b.begin_function("add");
    let x = b.param(&mut f, "x", u(8));
    let y = b.param(&mut f, "y", u(8));
    let lhs = b.name_ref(x);
    let rhs = b.name_ref(y);
    let body = b.binop(BinopKind::Add, lhs, rhs, u(8));
    b.finish_function(m, f, body);
    let (program, types) = b.finish();

    let with = convert(&program, &types, m).unwrap();
    assert!(only_function(&with).nodes().iter().all(|n| n.span.is_some()));

    let options = LowerOptions::default().with_emit_positions(false);
    let without = convert_module(&program, m, &types, &no_evaluation, options).unwrap();
    assert!(only_function(&without).nodes().iter().all(|n| n.span.is_none()));
    assert!(!without.dump_ir().contains("pos="));
}
