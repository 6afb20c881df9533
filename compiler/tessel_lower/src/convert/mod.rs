//! Conversion of one function instantiation into an IR function.
//!
//! A [`FunctionConverter`] owns one [`FunctionBuilder`] and one node map for
//! its whole life and is consumed when the function is finalized. Loop
//! bodies get their own converter (see `loops`), which borrows the package
//! for the duration of the body and hands it back before the enclosing
//! converter emits its `counted_for`.
//!
//! Every AST node that produces a value is recorded in the node map, keyed
//! by its arena index. Name references alias the entry of their definition
//! instead of emitting anything. Entries created from literals or folded
//! calls carry their value, which is how "known at conversion time" is
//! decided everywhere else.

mod builtins;
mod const_fold;
mod expr;
mod loops;
mod patterns;
mod types;

use rustc_hash::{FxHashMap, FxHashSet};
use tessel_ast::{
    free_variables, AstArena, ConcreteType, Definer, ModuleId, NodeId, NodeKind, Program, Span,
    SymbolicBindings, TypeInfo,
};
use tessel_ir::{verify_function, Bits, Function, FunctionBuilder, NodeRef, Op, Package, Type, Value};
use tracing::{debug, trace};

use crate::{
    ensure_sufficient_stack, mangle_name, ConstEvaluator, ConversionRecord, LowerError,
    LowerOptions,
};

pub(crate) use builtins::Builtin;

/// Read-only inputs shared by every converter of one module conversion.
#[derive(Clone, Copy)]
pub(crate) struct ConversionContext<'a> {
    pub program: &'a Program,
    pub type_info: &'a TypeInfo,
    pub evaluator: &'a dyn ConstEvaluator,
    pub options: LowerOptions,
}

/// Node-map entry.
#[derive(Clone, Debug)]
enum IrValue {
    Node(NodeRef),
    /// Value known at conversion time, materialized as a literal.
    Const { value: Value, node: NodeRef },
}

impl IrValue {
    fn node(&self) -> NodeRef {
        match self {
            IrValue::Node(node) | IrValue::Const { node, .. } => *node,
        }
    }

    fn constant(&self) -> Option<&Value> {
        match self {
            IrValue::Node(_) => None,
            IrValue::Const { value, .. } => Some(value),
        }
    }
}

pub(crate) struct FunctionConverter<'a, 'p> {
    cx: ConversionContext<'a>,
    package: &'p mut Package,
    /// Module whose function (or loop body) is being converted.
    module: ModuleId,
    builder: FunctionBuilder,
    node_map: FxHashMap<NodeId, IrValue>,
    bindings: SymbolicBindings,
    /// Next loop-body ordinal within this function.
    counted_for_ordinal: u32,
    /// Constants whose value is currently being emitted.
    pending_constants: FxHashSet<NodeId>,
}

/// Convert the instantiation described by `record` and append it to
/// `package`.
pub(crate) fn convert_function(
    cx: ConversionContext<'_>,
    package: &mut Package,
    record: &ConversionRecord,
) -> Result<(), LowerError> {
    let arena = &cx.program.arena;
    let function = arena.function(record.function).ok_or_else(|| {
        LowerError::invariant(
            format!(
                "conversion record names a {} node, not a function",
                arena.kind(record.function).name()
            ),
            Some(arena.span(record.function)),
        )
    })?;
    let name = identifier(arena, function.name)?;
    let free_keys = function
        .parametric_bindings
        .iter()
        .map(|&binding| identifier(arena, binding))
        .collect::<Result<Vec<_>, _>>()?;

    let module_name = &cx.program.module(record.module).name;
    let mangled = mangle_name(module_name, name, &free_keys, &record.bindings)?;
    debug!(function = %mangled, bindings = %record.bindings, "convert function");

    let converter = FunctionConverter::new(
        cx,
        package,
        record.module,
        mangled,
        record.bindings.clone(),
    );
    let ir = converter.lower_function(record.function)?;
    package.add_function(ir)?;
    Ok(())
}

fn identifier(arena: &AstArena, node: NodeId) -> Result<&str, LowerError> {
    arena.identifier(node).ok_or_else(|| {
        LowerError::invariant(
            format!("{} node has no identifier", arena.kind(node).name()),
            Some(arena.span(node)),
        )
    })
}

impl<'a, 'p> FunctionConverter<'a, 'p> {
    fn new(
        cx: ConversionContext<'a>,
        package: &'p mut Package,
        module: ModuleId,
        name: String,
        bindings: SymbolicBindings,
    ) -> Self {
        Self {
            cx,
            package,
            module,
            builder: FunctionBuilder::new(name),
            node_map: FxHashMap::default(),
            bindings,
            counted_for_ordinal: 0,
            pending_constants: FxHashSet::default(),
        }
    }

    /// Params, parametric values, constant dependencies, then the body.
    fn lower_function(mut self, item: NodeId) -> Result<Function, LowerError> {
        let arena = self.arena();
        let function = arena.function(item).ok_or_else(|| {
            LowerError::invariant("expected a function item", Some(arena.span(item)))
        })?;
        let constants = self.constant_dependencies(item)?;

        for &param in &function.params {
            let NodeKind::Param { name } = *arena.kind(param) else {
                return Err(self.unexpected(param, "parameter"));
            };
            let ty = self.ir_type_of(name)?;
            let span = self.span_for(param);
            let node = self.builder.param(identifier(arena, name)?, ty, span);
            self.node_map.insert(name, IrValue::Node(node));
        }

        for &binding in &function.parametric_bindings {
            let NodeKind::ParametricBinding { name } = *arena.kind(binding) else {
                return Err(self.unexpected(binding, "parametric binding"));
            };
            let key = identifier(arena, name)?;
            let value = self.bindings.get(key).ok_or_else(|| {
                LowerError::invariant(
                    format!("parametric `{key}` is unbound"),
                    Some(arena.span(binding)),
                )
            })?;
            let value = self.bits_value(name, i128::from(value))?;
            self.def_const(binding, value)?;
            self.def_alias(binding, name)?;
        }

        for constant in constants {
            self.ensure_constant(constant)?;
        }

        self.visit(function.body)?;
        self.finish(function.body)
    }

    /// Top-level constants the function references, in free-variable order.
    ///
    /// Functions, types and imports need nothing up front. Anything else
    /// free at module scope means name resolution went wrong.
    fn constant_dependencies(&self, item: NodeId) -> Result<Vec<NodeId>, LowerError> {
        let arena = self.arena();
        let free = free_variables(arena, item).drop_builtin_defs(arena);
        let mut constants = Vec::new();
        for var in &free {
            match arena.definer(var.def) {
                Some(
                    Definer::Function(_)
                    | Definer::TypeDef(_)
                    | Definer::StructDef(_)
                    | Definer::EnumDef(_)
                    | Definer::Import(_),
                ) => {}
                Some(Definer::Constant(constant)) => constants.push(constant),
                Some(Definer::Param(_) | Definer::ParametricBinding(_) | Definer::Local) | None => {
                    return Err(LowerError::invariant(
                        format!(
                            "cannot convert free variable `{}`; it is not a constant, function, type or import",
                            var.identifier
                        ),
                        Some(arena.span(var.def)),
                    ));
                }
            }
        }
        Ok(constants)
    }

    /// Emit `constant` (and the constants its value uses) unless this
    /// function already has it. Returns the node holding its value.
    fn ensure_constant(&mut self, constant: NodeId) -> Result<NodeRef, LowerError> {
        let arena = self.arena();
        let NodeKind::Constant { name, value } = *arena.kind(constant) else {
            return Err(self.unexpected(constant, "constant"));
        };
        if let Some(existing) = self.node_map.get(&name) {
            return Ok(existing.node());
        }
        if !self.pending_constants.insert(constant) {
            return Err(LowerError::invariant(
                format!("constant `{}` depends on itself", identifier(arena, name)?),
                Some(arena.span(constant)),
            ));
        }

        for var in &free_variables(arena, value) {
            if let Some(Definer::Constant(dependency)) = arena.definer(var.def) {
                self.ensure_constant(dependency)?;
            }
        }
        self.visit(value)?;
        let node = self.def_alias(value, name)?;
        self.pending_constants.remove(&constant);
        Ok(node)
    }

    /// Return the body's value, through an explicit identity when the body
    /// ends in a bare name, its value is a parameter, or its value is not the
    /// newest node.
    fn finish(mut self, body: NodeId) -> Result<Function, LowerError> {
        let arena = self.arena();
        let mut tail = body;
        while let NodeKind::Let { body, .. } = arena.kind(tail) {
            tail = *body;
        }
        let ret = self.use_node(body)?;
        let is_alias = matches!(
            arena.kind(tail),
            NodeKind::NameRef { .. } | NodeKind::ConstRef { .. } | NodeKind::ColonRef { .. }
        );
        if is_alias || self.builder.is_param(ret) || self.builder.last_node() != Some(ret) {
            self.emit(Op::Identity, &[ret], tail)?;
        }

        let function = self.builder.build()?;
        verify_function(&function)?;
        debug!(
            function = function.name(),
            nodes = function.nodes().len(),
            "finalized"
        );
        Ok(function)
    }

    /// Convert `node` and everything below it.
    fn visit(&mut self, node: NodeId) -> Result<(), LowerError> {
        ensure_sufficient_stack(|| self.visit_node(node))
    }

    // Node map

    #[inline]
    fn arena(&self) -> &'a AstArena {
        &self.cx.program.arena
    }

    #[inline]
    fn node_span(&self, node: NodeId) -> Span {
        self.arena().span(node)
    }

    /// Span recorded on emitted instructions.
    fn span_for(&self, node: NodeId) -> Option<Span> {
        self.cx
            .options
            .emit_positions
            .then(|| self.node_span(node))
    }

    /// Add an instruction positioned at `node` without recording it.
    fn emit(&mut self, op: Op, operands: &[NodeRef], node: NodeId) -> Result<NodeRef, LowerError> {
        let span = self.span_for(node);
        Ok(self.builder.add_op(op, operands, span)?)
    }

    /// Add an instruction defining `node`.
    fn def(&mut self, node: NodeId, op: Op, operands: &[NodeRef]) -> Result<NodeRef, LowerError> {
        let ir = self.emit(op, operands, node)?;
        trace!(ast = node.raw(), ir = ir.raw(), "def");
        self.node_map.insert(node, IrValue::Node(ir));
        Ok(ir)
    }

    /// Add a literal defining `node` and remember its value.
    fn def_const(&mut self, node: NodeId, value: Value) -> Result<NodeRef, LowerError> {
        let span = self.span_for(node);
        let ir = self.builder.literal(value.clone(), span);
        trace!(ast = node.raw(), ir = ir.raw(), %value, "def const");
        self.node_map.insert(node, IrValue::Const { value, node: ir });
        Ok(ir)
    }

    fn use_value(&self, node: NodeId) -> Result<IrValue, LowerError> {
        self.node_map.get(&node).cloned().ok_or_else(|| {
            LowerError::invariant(
                format!(
                    "{} node was used before it was converted",
                    self.arena().kind(node).name()
                ),
                Some(self.node_span(node)),
            )
        })
    }

    fn use_node(&self, node: NodeId) -> Result<NodeRef, LowerError> {
        self.use_value(node).map(|value| value.node())
    }

    fn const_value(&self, node: NodeId) -> Option<&Value> {
        self.node_map.get(&node).and_then(IrValue::constant)
    }

    /// Known unsigned value of `node`; `what` names it in the error.
    fn const_u64(&self, node: NodeId, what: &str) -> Result<u64, LowerError> {
        self.const_value(node)
            .and_then(Value::to_u64)
            .ok_or_else(|| {
                LowerError::structural(
                    self.node_span(node),
                    format!("{what} must be a constant known at conversion time"),
                )
            })
    }

    /// Make the `NameDef` `name` refer to whatever `from` converted to.
    fn def_alias(&mut self, from: NodeId, name: NodeId) -> Result<NodeRef, LowerError> {
        let value = self.use_value(from)?;
        self.bind_name(name, value)
    }

    /// Record `value` for the `NameDef` `name`, naming the instruction after
    /// it unless it already has a name.
    fn bind_name(&mut self, name: NodeId, value: IrValue) -> Result<NodeRef, LowerError> {
        let ir = value.node();
        if self.builder.node_name(ir).is_none() {
            let identifier = identifier(self.arena(), name)?;
            self.builder.set_name(ir, identifier);
        }
        trace!(name = name.raw(), ir = ir.raw(), "alias");
        self.node_map.insert(name, value);
        Ok(ir)
    }

    // Types

    fn resolve_type(&self, node: NodeId) -> Result<ConcreteType, LowerError> {
        let ty = self.cx.type_info.get_type(node).ok_or_else(|| {
            LowerError::invariant(
                format!("{} node has no type", self.arena().kind(node).name()),
                Some(self.node_span(node)),
            )
        })?;
        ty.resolve(&self.bindings).map_err(|symbol| {
            LowerError::invariant(
                format!("`{symbol}` is unbound in type `{ty}` under {}", self.bindings),
                Some(self.node_span(node)),
            )
        })
    }

    fn ir_type_of(&self, node: NodeId) -> Result<Type, LowerError> {
        types::ir_type(&self.resolve_type(node)?, self.node_span(node))
    }

    /// `value` as a bits value of the width `node`'s type gives it.
    fn bits_value(&self, node: NodeId, value: i128) -> Result<Value, LowerError> {
        let width = self.bits_width(node)?;
        Bits::from_i128(u64::from(width), value)
            .map(Value::from)
            .map_err(|err| LowerError::structural(self.node_span(node), err.to_string()))
    }

    fn bits_width(&self, node: NodeId) -> Result<u32, LowerError> {
        let ty = self.ir_type_of(node)?;
        ty.bit_count().ok_or_else(|| {
            LowerError::invariant(
                format!("expected a bits type, found {ty}"),
                Some(self.node_span(node)),
            )
        })
    }

    fn unexpected(&self, node: NodeId, expected: &str) -> LowerError {
        LowerError::invariant(
            format!(
                "expected {expected}, found {} node",
                self.arena().kind(node).name()
            ),
            Some(self.node_span(node)),
        )
    }
}

#[cfg(test)]
mod tests;
