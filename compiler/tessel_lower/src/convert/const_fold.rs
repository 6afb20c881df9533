//! Invocations: builtin dispatch, constant folding and `invoke`.
//!
//! A call whose arguments are all known (vacuously so for a call without
//! arguments) is run through the [`ConstEvaluator`](crate::ConstEvaluator)
//! and replaced by a literal. The evaluator sees the bindings of this call
//! site, which differ from the caller's own when the callee is parametric.

use tessel_ast::{ModuleId, NodeId, NodeKind, SymbolicBindings};
use tessel_ir::{NodeRef, Value};
use tracing::debug;

use super::{identifier, Builtin, FunctionConverter, IrValue};
use crate::{mangle_name, ConversionError, LowerError};

impl FunctionConverter<'_, '_> {
    pub(super) fn visit_invocation(
        &mut self,
        node: NodeId,
        callee: NodeId,
        args: &[NodeId],
    ) -> Result<(), LowerError> {
        let arena = self.arena();
        if let NodeKind::NameRef { def, identifier } = arena.kind(callee) {
            if let NodeKind::BuiltinNameDef { .. } = arena.kind(*def) {
                let builtin = Builtin::from_name(identifier).ok_or_else(|| {
                    LowerError::structural(
                        self.node_span(node),
                        format!("`{identifier}` is neither a builtin nor a converted function"),
                    )
                })?;
                return self.visit_builtin(node, builtin, args);
            }
        }

        let (module, item) = self.resolve_function_ref(callee)?;
        let bindings = self.call_site_bindings(node, item)?;
        let mangled = self.require_converted(node, module, item, &bindings)?;

        let operands = self.visit_all(args)?;
        let known: Option<Vec<Value>> = args
            .iter()
            .map(|&arg| self.const_value(arg).cloned())
            .collect();
        match known {
            Some(values) => self.fold(node, module, item, &mangled, &values, &bindings),
            None => self.invoke(node, &mangled, &operands),
        }
    }

    /// Bindings the call `node` instantiates `item` with under this
    /// function's own bindings. Empty for non-parametric callees.
    pub(super) fn call_site_bindings(
        &self,
        node: NodeId,
        item: NodeId,
    ) -> Result<SymbolicBindings, LowerError> {
        let arena = self.arena();
        let function = arena
            .function(item)
            .ok_or_else(|| self.unexpected(item, "a function"))?;
        if !function.is_parametric() {
            return Ok(SymbolicBindings::new());
        }
        self.cx
            .type_info
            .invocation_bindings(node, &self.bindings)
            .cloned()
            .ok_or_else(|| {
                LowerError::invariant(
                    format!(
                        "no bindings recorded for the call of `{}` under {}",
                        arena.identifier(item).unwrap_or("?"),
                        self.bindings
                    ),
                    Some(self.node_span(node)),
                )
            })
    }

    /// Mangled name of the callee instantiation, which must already be in
    /// the package.
    pub(super) fn require_converted(
        &self,
        node: NodeId,
        module: ModuleId,
        item: NodeId,
        bindings: &SymbolicBindings,
    ) -> Result<String, LowerError> {
        let arena = self.arena();
        let function = arena
            .function(item)
            .ok_or_else(|| self.unexpected(item, "a function"))?;
        let name = identifier(arena, function.name)?;
        let free_keys = function
            .parametric_bindings
            .iter()
            .map(|&binding| identifier(arena, binding))
            .collect::<Result<Vec<_>, _>>()?;
        let module_name = &self.cx.program.module(module).name;
        let mangled = mangle_name(module_name, name, &free_keys, bindings)?;
        if !self.package.contains(&mangled) {
            return Err(LowerError::structural(
                self.node_span(node),
                format!("call of `{name}` before `{mangled}` was converted"),
            ));
        }
        Ok(mangled)
    }

    fn fold(
        &mut self,
        node: NodeId,
        module: ModuleId,
        item: NodeId,
        mangled: &str,
        args: &[Value],
        bindings: &SymbolicBindings,
    ) -> Result<(), LowerError> {
        let arena = self.arena();
        let span = self.node_span(node);
        let name = identifier(arena, item)?;
        let value = self
            .cx
            .evaluator
            .evaluate(self.cx.program, module, name, args, bindings)
            .map_err(|err| ConversionError::Evaluation {
                span,
                message: err.message,
            })?;

        let expected = self
            .package
            .get_function(mangled)
            .map(|f| f.return_type().clone())
            .ok_or_else(|| LowerError::invariant(format!("`{mangled}` left the package"), Some(span)))?;
        if value.ty() != expected {
            return Err(ConversionError::Evaluation {
                span,
                message: format!(
                    "`{name}` evaluated to a {} value, but returns {expected}",
                    value.ty()
                ),
            }
            .into());
        }
        debug!(callee = mangled, %value, "folded constant invocation");
        self.def_const(node, value)?;
        Ok(())
    }

    fn invoke(&mut self, node: NodeId, mangled: &str, args: &[NodeRef]) -> Result<(), LowerError> {
        let span = self.span_for(node);
        let callee = self.package.get_function(mangled).ok_or_else(|| {
            LowerError::invariant(
                format!("`{mangled}` left the package"),
                Some(self.node_span(node)),
            )
        })?;
        let ir = self.builder.invoke(callee, args, span)?;
        self.node_map.insert(node, IrValue::Node(ir));
        Ok(())
    }
}
