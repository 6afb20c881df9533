//! Counted `for` loops.
//!
//! `for (i, carry) in range(0, N) { body }(init)` becomes a `counted_for`
//! over a synthesized body function
//!
//! ```text
//! fn __<enclosing>_counted_for_<k>_body(i, carry, captures...) -> carry
//! ```
//!
//! The captures are the body's free variables other than the loop's own
//! names, functions and types. They are passed as the loop's invariant
//! operands in exactly the order the body declares them.

use rustc_hash::FxHashSet;
use tessel_ast::{
    free_variables, ConcreteType, Definer, NameDefTree, NodeId, NodeKind, PatternLeaf,
};
use tessel_ir::{Function, NodeRef, Type, Value};
use tracing::debug;

use super::{identifier, FunctionConverter, IrValue};
use crate::LowerError;

/// A free variable of a loop body, passed in as a trailing parameter.
struct Capture {
    def: NodeId,
    identifier: String,
    value: NodeRef,
    ty: Type,
    /// Known value in the enclosing function, kept so the body can still
    /// fold with it.
    constant: Option<Value>,
}

impl FunctionConverter<'_, '_> {
    pub(super) fn visit_for(
        &mut self,
        node: NodeId,
        names: NodeId,
        iterable: NodeId,
        body: NodeId,
        init: NodeId,
    ) -> Result<(), LowerError> {
        self.visit(init)?;
        let init_value = self.use_node(init)?;
        let (trip_count, induction_ty) = self.trip_count(node, iterable)?;
        let (induction, carry) = self.loop_names(names)?;

        let captures = self.loop_captures(names, body)?;
        let invariants: Vec<NodeRef> = captures.iter().map(|c| c.value).collect();

        // Mangled names never contain `_c`, so the suffix cannot be confused
        // with an escaped part of the enclosing name.
        let body_name = format!(
            "__{}_counted_for_{}_body",
            self.builder.name(),
            self.counted_for_ordinal
        );
        self.counted_for_ordinal += 1;
        debug!(
            function = self.builder.name(),
            body = %body_name,
            trip_count,
            captures = captures.len(),
            "lower counted for"
        );

        let carry_ty = self.builder.ty(init_value).clone();
        let body_converter = FunctionConverter::new(
            self.cx,
            &mut *self.package,
            self.module,
            body_name.clone(),
            self.bindings.clone(),
        );
        let body_fn = body_converter.lower_loop_body(
            body,
            induction,
            carry,
            induction_ty,
            carry_ty,
            &captures,
        )?;
        self.package.add_function(body_fn)?;

        let span = self.span_for(node);
        let body_fn = self.package.get_function(&body_name).ok_or_else(|| {
            LowerError::invariant(
                format!("loop body `{body_name}` left the package"),
                Some(self.node_span(node)),
            )
        })?;
        let ir = self
            .builder
            .counted_for(body_fn, trip_count, 1, init_value, &invariants, span)?;
        self.node_map.insert(node, IrValue::Node(ir));
        Ok(())
    }

    /// Trip count and induction type of a `range(0, N)` iterable.
    fn trip_count(&mut self, node: NodeId, iterable: NodeId) -> Result<(u64, Type), LowerError> {
        let arena = self.arena();
        let unsupported = |detail: &str| {
            LowerError::structural(
                arena.span(node),
                format!(
                    "For-loop is of an unsupported form for IR conversion; only a 'range(0, const)' call is supported, {detail}."
                ),
            )
        };

        let NodeKind::Invocation { callee, args } = arena.kind(iterable) else {
            return Err(unsupported("found non-invocation iterable"));
        };
        let is_range = match arena.kind(*callee) {
            NodeKind::NameRef { def, .. } => matches!(
                arena.kind(*def),
                NodeKind::BuiltinNameDef { identifier } if identifier == "range"
            ),
            _ => false,
        };
        if !is_range {
            return Err(unsupported("found non-range callee"));
        }
        let [start, limit] = args.as_slice() else {
            return Err(unsupported("found inappropriate number of arguments"));
        };
        if !matches!(arena.kind(*start), NodeKind::Number { value: 0 }) {
            return Err(unsupported("found a start other than literal 0"));
        }

        self.visit(*limit)?;
        let trip_count = self
            .const_value(*limit)
            .and_then(Value::to_u64)
            .ok_or_else(|| {
                unsupported(&format!(
                    "did not find a const value for the {} bound",
                    arena.kind(*limit).name()
                ))
            })?;
        Ok((trip_count, self.ir_type_of(*limit)?))
    }

    /// Split the loop pattern into its induction and carry parts.
    fn loop_names(&self, names: NodeId) -> Result<(NodeId, NodeId), LowerError> {
        let arena = self.arena();
        let parts: &[NodeId] = match arena.name_def_tree(names) {
            Some(NameDefTree::Tuple(parts)) => parts.as_slice(),
            _ => &[],
        };
        let &[induction, carry] = parts else {
            return Err(LowerError::invariant(
                format!(
                    "for-loop binding must be an (induction, carry) pair, found {} parts",
                    parts.len()
                ),
                Some(arena.span(names)),
            ));
        };
        if !matches!(
            arena.name_def_tree(induction),
            Some(NameDefTree::Leaf(PatternLeaf::NameDef(_) | PatternLeaf::Wildcard))
        ) {
            return Err(self.unexpected(induction, "a plain induction variable"));
        }
        Ok((induction, carry))
    }

    /// Free variables of `body` that must be passed in, in stable order.
    fn loop_captures(&self, names: NodeId, body: NodeId) -> Result<Vec<Capture>, LowerError> {
        let arena = self.arena();
        let mut loop_defs = FxHashSet::default();
        let mut stack = vec![names];
        while let Some(id) = stack.pop() {
            if let NodeKind::NameDef { .. } = arena.kind(id) {
                loop_defs.insert(id);
            }
            stack.extend(arena.children(id));
        }

        let mut captures = Vec::new();
        for var in &free_variables(arena, body).drop_builtin_defs(arena) {
            if loop_defs.contains(&var.def) {
                continue;
            }
            let captured = match arena.definer(var.def) {
                Some(
                    Definer::Function(_)
                    | Definer::TypeDef(_)
                    | Definer::StructDef(_)
                    | Definer::EnumDef(_)
                    | Definer::Import(_),
                )
                | None => false,
                Some(
                    Definer::Constant(_)
                    | Definer::Param(_)
                    | Definer::ParametricBinding(_)
                    | Definer::Local,
                ) => true,
            };
            let is_function_value = matches!(
                self.cx.type_info.get_type(var.def),
                Some(ConcreteType::Function { .. })
            );
            if !captured || is_function_value {
                continue;
            }
            let outer = self.use_value(var.def)?;
            captures.push(Capture {
                def: var.def,
                identifier: var.identifier.clone(),
                value: outer.node(),
                ty: self.builder.ty(outer.node()).clone(),
                constant: outer.constant().cloned(),
            });
        }
        Ok(captures)
    }

    /// Convert a loop body; consumes the body's converter.
    fn lower_loop_body(
        mut self,
        body: NodeId,
        induction: NodeId,
        carry: NodeId,
        induction_ty: Type,
        carry_ty: Type,
        captures: &[Capture],
    ) -> Result<Function, LowerError> {
        let arena = self.arena();

        let induction_name = match arena.name_def_tree(induction) {
            Some(NameDefTree::Leaf(PatternLeaf::NameDef(def))) => Some(*def),
            _ => None,
        };
        let name = match induction_name {
            Some(def) => identifier(arena, def)?,
            None => "__induction",
        };
        let span = self.span_for(induction);
        let index = self.builder.param(name, induction_ty, span);
        if let Some(def) = induction_name {
            self.node_map.insert(def, IrValue::Node(index));
        }

        // A tuple carry arrives as one parameter and is destructured once
        // every parameter exists.
        let span = self.span_for(carry);
        let carry_param = match arena.name_def_tree(carry) {
            Some(NameDefTree::Leaf(PatternLeaf::NameDef(def))) => {
                let param = self.builder.param(identifier(arena, *def)?, carry_ty, span);
                self.node_map.insert(*def, IrValue::Node(param));
                None
            }
            Some(NameDefTree::Leaf(PatternLeaf::Wildcard)) => {
                self.builder.param("__loop_carry", carry_ty, span);
                None
            }
            Some(NameDefTree::Tuple(_)) => Some(self.builder.param("__loop_carry", carry_ty, span)),
            _ => return Err(self.unexpected(carry, "an irrefutable loop carry")),
        };

        for capture in captures {
            let span = self.span_for(capture.def);
            let param = self
                .builder
                .param(&capture.identifier, capture.ty.clone(), span);
            let value = match &capture.constant {
                Some(value) => IrValue::Const {
                    value: value.clone(),
                    node: param,
                },
                None => IrValue::Node(param),
            };
            self.node_map.insert(capture.def, value);
        }

        if let Some(param) = carry_param {
            self.bind_pattern(carry, IrValue::Node(param))?;
        }

        self.visit(body)?;
        self.finish(body)
    }
}
