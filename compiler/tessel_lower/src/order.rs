//! Conversion order.
//!
//! The converter needs every callee instantiation in the package before the
//! caller is converted. [`DependencyOrder`] produces such an order by a
//! depth-first post-order walk of the call graph, starting from each
//! non-parametric function of the module in declaration order. Parametric
//! callees are reached with the bindings their call site records under the
//! caller's own bindings, so each distinct instantiation appears exactly
//! once.

use rustc_hash::FxHashSet;
use tessel_ast::{
    ColonSubject, Definer, ModuleId, NodeId, NodeKind, Program, SymbolicBindings, TypeInfo,
};
use tracing::trace;

use crate::convert::Builtin;
use crate::{ensure_sufficient_stack, LowerError};

/// One function instantiation to convert.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ConversionRecord {
    /// Module that defines `function`.
    pub module: ModuleId,
    /// The `Function` item.
    pub function: NodeId,
    pub bindings: SymbolicBindings,
}

/// Produces the worklist for a module conversion.
///
/// Implementations must list callees before callers and must not repeat an
/// instantiation.
pub trait ConversionOrder {
    fn order(
        &self,
        program: &Program,
        module: ModuleId,
        type_info: &TypeInfo,
        include_tests: bool,
    ) -> Result<Vec<ConversionRecord>, LowerError>;
}

/// Call-graph post-order; see the module docs.
#[derive(Copy, Clone, Debug, Default)]
pub struct DependencyOrder;

impl ConversionOrder for DependencyOrder {
    fn order(
        &self,
        program: &Program,
        module: ModuleId,
        type_info: &TypeInfo,
        include_tests: bool,
    ) -> Result<Vec<ConversionRecord>, LowerError> {
        let mut walker = OrderWalker::new(program, type_info);
        let source = program.module(module);
        for item in source.functions(&program.arena) {
            let concrete = program
                .arena
                .function(item)
                .is_some_and(|f| !f.is_parametric());
            if concrete {
                walker.visit_function(module, item, SymbolicBindings::new())?;
            }
        }
        if include_tests {
            for &test in &source.tests {
                walker.walk(test, &SymbolicBindings::new())?;
            }
        }
        Ok(walker.records)
    }
}

impl DependencyOrder {
    /// Instantiations reachable from the non-parametric function `root`,
    /// ending with `root` itself.
    pub fn reachable_from(
        &self,
        program: &Program,
        type_info: &TypeInfo,
        root: NodeId,
    ) -> Result<Vec<ConversionRecord>, LowerError> {
        let module = program.owning_module(root).ok_or_else(|| {
            LowerError::invariant(
                "entry function belongs to no module",
                Some(program.arena.span(root)),
            )
        })?;
        let mut walker = OrderWalker::new(program, type_info);
        walker.visit_function(module, root, SymbolicBindings::new())?;
        Ok(walker.records)
    }
}

struct OrderWalker<'a> {
    program: &'a Program,
    type_info: &'a TypeInfo,
    records: Vec<ConversionRecord>,
    done: FxHashSet<(NodeId, SymbolicBindings)>,
    /// Functions on the current call path.
    active: FxHashSet<NodeId>,
    walked_constants: FxHashSet<NodeId>,
}

impl<'a> OrderWalker<'a> {
    fn new(program: &'a Program, type_info: &'a TypeInfo) -> Self {
        Self {
            program,
            type_info,
            records: Vec::new(),
            done: FxHashSet::default(),
            active: FxHashSet::default(),
            walked_constants: FxHashSet::default(),
        }
    }

    fn visit_function(
        &mut self,
        module: ModuleId,
        item: NodeId,
        bindings: SymbolicBindings,
    ) -> Result<(), LowerError> {
        let program = self.program;
        let arena = &program.arena;
        let key = (item, bindings);
        if self.done.contains(&key) {
            return Ok(());
        }
        let name = arena.identifier(item).unwrap_or("?");
        if !self.active.insert(item) {
            return Err(LowerError::structural(
                arena.span(item),
                format!("`{name}` calls itself; recursive functions cannot be converted"),
            ));
        }
        let function = arena.function(item).ok_or_else(|| {
            LowerError::invariant(
                format!("`{name}` is not a function"),
                Some(arena.span(item)),
            )
        })?;

        ensure_sufficient_stack(|| self.walk(function.body, &key.1))?;

        self.active.remove(&item);
        trace!(function = name, bindings = %key.1, "order");
        self.records.push(ConversionRecord {
            module,
            function: item,
            bindings: key.1.clone(),
        });
        self.done.insert(key);
        Ok(())
    }

    /// Visit every function and constant `root` depends on.
    fn walk(&mut self, root: NodeId, bindings: &SymbolicBindings) -> Result<(), LowerError> {
        let program = self.program;
        let arena = &program.arena;
        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            match arena.kind(node) {
                NodeKind::Invocation { callee, args } => {
                    if let Some((module, item)) = self.callee(*callee)? {
                        self.visit_call(node, module, item, bindings)?;
                    }
                    if self.is_builtin(*callee, Builtin::Map) {
                        if let Some(&function) = args.get(1) {
                            if let Some((module, item)) = self.callee(function)? {
                                self.visit_call(node, module, item, bindings)?;
                            }
                        }
                    }
                }
                NodeKind::NameRef { def, .. } | NodeKind::ConstRef { def, .. } => {
                    if let Some(Definer::Constant(constant)) = arena.definer(*def) {
                        self.walk_constant(constant)?;
                    }
                }
                NodeKind::ColonRef {
                    subject: ColonSubject::Import(import),
                    attr,
                } => {
                    if let NodeKind::Import { module, .. } = *arena.kind(*import) {
                        if let Some(constant) = program.module(module).get_constant(arena, attr)
                        {
                            self.walk_constant(constant)?;
                        }
                    }
                }
                _ => {}
            }
            stack.extend(arena.children(node).into_iter().rev());
        }
        Ok(())
    }

    fn walk_constant(&mut self, constant: NodeId) -> Result<(), LowerError> {
        if !self.walked_constants.insert(constant) {
            return Ok(());
        }
        if let NodeKind::Constant { value, .. } = *self.program.arena.kind(constant) {
            ensure_sufficient_stack(|| self.walk(value, &SymbolicBindings::new()))?;
        }
        Ok(())
    }

    fn visit_call(
        &mut self,
        invocation: NodeId,
        module: ModuleId,
        item: NodeId,
        caller: &SymbolicBindings,
    ) -> Result<(), LowerError> {
        let program = self.program;
        let arena = &program.arena;
        let parametric = arena.function(item).is_some_and(|f| f.is_parametric());
        let bindings = if parametric {
            self.type_info
                .invocation_bindings(invocation, caller)
                .cloned()
                .ok_or_else(|| {
                    LowerError::invariant(
                        format!(
                            "no bindings recorded for the call of `{}` under {caller}",
                            arena.identifier(item).unwrap_or("?")
                        ),
                        Some(arena.span(invocation)),
                    )
                })?
        } else {
            SymbolicBindings::new()
        };
        self.visit_function(module, item, bindings)
    }

    fn is_builtin(&self, callee: NodeId, builtin: Builtin) -> bool {
        let arena = &self.program.arena;
        match arena.kind(callee) {
            NodeKind::NameRef { def, identifier } => {
                matches!(arena.kind(*def), NodeKind::BuiltinNameDef { .. })
                    && Builtin::from_name(identifier) == Some(builtin)
            }
            _ => false,
        }
    }

    /// The program function a callee expression names, if any. Builtins and
    /// unresolvable names are left for the converter to report.
    fn callee(&self, callee: NodeId) -> Result<Option<(ModuleId, NodeId)>, LowerError> {
        let arena = &self.program.arena;
        match arena.kind(callee) {
            NodeKind::NameRef { def, .. } => match arena.definer(*def) {
                Some(Definer::Function(item)) => {
                    let module = self.program.owning_module(item).ok_or_else(|| {
                        LowerError::invariant(
                            "function belongs to no module",
                            Some(arena.span(item)),
                        )
                    })?;
                    Ok(Some((module, item)))
                }
                _ => Ok(None),
            },
            NodeKind::ColonRef {
                subject: ColonSubject::Import(import),
                attr,
            } => match *arena.kind(*import) {
                NodeKind::Import { module, .. } => Ok(self
                    .program
                    .module(module)
                    .get_function(arena, attr)
                    .map(|item| (module, item))),
                _ => Ok(None),
            },
            _ => Ok(None),
        }
    }
}
