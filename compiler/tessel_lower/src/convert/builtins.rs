//! Builtin dispatch.
//!
//! Builtins have no definition in the program; each name maps to a fixed
//! emission routine. Arguments are converted left to right before the
//! routine runs, except for `map`, whose second argument names a function.

use tessel_ast::{ColonSubject, Definer, ModuleId, NodeId, NodeKind, SymbolicBindings};
use tessel_ir::{FunctionBuilder, NodeRef, Op, Type};
use tracing::debug;

use super::{FunctionConverter, IrValue};
use crate::{mangle_name, LowerError};

/// Signed comparison builtins (`sgt` and friends).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum SignedCmp {
    Gt,
    Ge,
    Lt,
    Le,
}

impl SignedCmp {
    fn op(self) -> Op {
        match self {
            SignedCmp::Gt => Op::SGt,
            SignedCmp::Ge => Op::SGe,
            SignedCmp::Lt => Op::SLt,
            SignedCmp::Le => Op::SLe,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Builtin {
    /// `fail!(x)`: passes `x` through.
    Fail,
    /// `trace(x)`: passes `x` through.
    Trace,
    Update,
    Signex,
    Clz,
    Ctz,
    Map,
    OneHot,
    OneHotSel,
    BitSlice,
    Rev,
    SignedCmp(SignedCmp),
    AndReduce,
    OrReduce,
    XorReduce,
}

impl Builtin {
    pub(crate) fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "fail!" => Builtin::Fail,
            "trace" => Builtin::Trace,
            "update" => Builtin::Update,
            "signex" => Builtin::Signex,
            "clz" => Builtin::Clz,
            "ctz" => Builtin::Ctz,
            "map" => Builtin::Map,
            "one_hot" => Builtin::OneHot,
            "one_hot_sel" => Builtin::OneHotSel,
            "bit_slice" => Builtin::BitSlice,
            "rev" => Builtin::Rev,
            "sgt" => Builtin::SignedCmp(SignedCmp::Gt),
            "sge" => Builtin::SignedCmp(SignedCmp::Ge),
            "slt" => Builtin::SignedCmp(SignedCmp::Lt),
            "sle" => Builtin::SignedCmp(SignedCmp::Le),
            "and_reduce" => Builtin::AndReduce,
            "or_reduce" => Builtin::OrReduce,
            "xor_reduce" => Builtin::XorReduce,
            _ => return None,
        })
    }

    fn arity(self) -> usize {
        match self {
            Builtin::Fail
            | Builtin::Trace
            | Builtin::Clz
            | Builtin::Ctz
            | Builtin::Rev
            | Builtin::AndReduce
            | Builtin::OrReduce
            | Builtin::XorReduce => 1,
            Builtin::Signex
            | Builtin::Map
            | Builtin::OneHot
            | Builtin::OneHotSel
            | Builtin::SignedCmp(_) => 2,
            Builtin::Update | Builtin::BitSlice => 3,
        }
    }
}

impl FunctionConverter<'_, '_> {
    pub(super) fn visit_builtin(
        &mut self,
        node: NodeId,
        builtin: Builtin,
        args: &[NodeId],
    ) -> Result<(), LowerError> {
        if args.len() != builtin.arity() {
            return Err(LowerError::invariant(
                format!(
                    "{builtin:?} takes {} arguments, found {}",
                    builtin.arity(),
                    args.len()
                ),
                Some(self.node_span(node)),
            ));
        }
        if builtin == Builtin::Map {
            return self.visit_map(node, args[0], args[1]);
        }

        let operands = self.visit_all(args)?;
        let op = match builtin {
            Builtin::Fail | Builtin::Trace => Op::Identity,
            Builtin::Update => Op::ArrayUpdate,
            Builtin::Clz => Op::Clz,
            Builtin::Ctz => Op::Ctz,
            Builtin::Rev => Op::Reverse,
            Builtin::AndReduce => Op::AndReduce,
            Builtin::OrReduce => Op::OrReduce,
            Builtin::XorReduce => Op::XorReduce,
            Builtin::SignedCmp(cmp) => cmp.op(),
            Builtin::Signex => {
                // The second argument only supplies the target width.
                let new_bit_count = self.bits_width(args[1])?;
                self.def(node, Op::SignExt { new_bit_count }, &operands[..1])?;
                return Ok(());
            }
            Builtin::OneHot => {
                let lsb_prio = self
                    .const_value(args[1])
                    .and_then(|v| v.as_bits())
                    .map(|bits| !bits.is_zero())
                    .ok_or_else(|| {
                        LowerError::structural(
                            self.node_span(args[1]),
                            "one_hot priority must be a constant known at conversion time",
                        )
                    })?;
                self.def(node, Op::OneHot { lsb_prio }, &operands[..1])?;
                return Ok(());
            }
            Builtin::OneHotSel => {
                let NodeKind::Array { members, .. } = self.arena().kind(args[1]) else {
                    return Err(LowerError::structural(
                        self.node_span(args[1]),
                        "one_hot_sel cases must be written as an array literal",
                    ));
                };
                let mut sel_operands = vec![operands[0]];
                for &member in members {
                    sel_operands.push(self.use_node(member)?);
                }
                self.def(node, Op::OneHotSelect, &sel_operands)?;
                return Ok(());
            }
            Builtin::BitSlice => {
                let start = self.const_u64(args[1], "bit_slice start")?;
                let width = self.const_u64(args[2], "bit_slice width")?;
                let op = Op::BitSlice {
                    start: self.narrow_u32(args[1], start)?,
                    width: self.narrow_u32(args[2], width)?,
                };
                self.def(node, op, &operands[..1])?;
                return Ok(());
            }
            Builtin::Map => {
                return Err(LowerError::invariant(
                    "map dispatched with converted arguments",
                    Some(self.node_span(node)),
                ))
            }
        };
        self.def(node, op, &operands)?;
        Ok(())
    }

    /// `map(array, f)`: `f` is a function reference, possibly parametric,
    /// possibly imported, or one of the `clz`/`ctz` builtins.
    fn visit_map(&mut self, node: NodeId, array: NodeId, function: NodeId) -> Result<(), LowerError> {
        self.visit(array)?;
        let array_node = self.use_node(array)?;
        let arena = self.arena();

        let callee_name = match arena.kind(function) {
            NodeKind::NameRef { def, identifier }
                if matches!(arena.kind(*def), NodeKind::BuiltinNameDef { .. }) =>
            {
                match Builtin::from_name(identifier) {
                    Some(builtin @ (Builtin::Clz | Builtin::Ctz)) => {
                        self.map_helper(node, builtin, array_node)?
                    }
                    _ => {
                        return Err(LowerError::structural(
                            self.node_span(function),
                            format!("builtin `{identifier}` cannot be mapped"),
                        ))
                    }
                }
            }
            _ => {
                let (module, item) = self.resolve_function_ref(function)?;
                let bindings = self.call_site_bindings(node, item)?;
                self.require_converted(node, module, item, &bindings)?
            }
        };

        let span = self.span_for(node);
        let callee = self.package.get_function(&callee_name).ok_or_else(|| {
            LowerError::invariant(
                format!("mapped function `{callee_name}` vanished from the package"),
                Some(self.node_span(node)),
            )
        })?;
        let ir = self.builder.map(callee, array_node, span)?;
        self.node_map.insert(node, IrValue::Node(ir));
        Ok(())
    }

    /// One-parameter `clz`/`ctz` helper over the array's element type,
    /// synthesized once per element width.
    fn map_helper(
        &mut self,
        node: NodeId,
        builtin: Builtin,
        array: NodeRef,
    ) -> Result<String, LowerError> {
        let width = match self.builder.ty(array) {
            Type::Array { element, .. } => element.bit_count(),
            _ => None,
        }
        .ok_or_else(|| {
            LowerError::structural(
                self.node_span(node),
                "map over clz/ctz needs an array of bits",
            )
        })?;
        let (identifier, op) = match builtin {
            Builtin::Clz => ("clz", Op::Clz),
            _ => ("ctz", Op::Ctz),
        };
        let bindings: SymbolicBindings = [("N", u64::from(width))].into_iter().collect();
        let module_name = &self.cx.program.module(self.module).name;
        let name = mangle_name(module_name, identifier, &["N"], &bindings)?;
        if self.package.contains(&name) {
            return Ok(name);
        }

        let mut helper = FunctionBuilder::new(name.clone());
        let arg = helper.param("arg", Type::Bits(width), None);
        helper.add_op(op, &[arg], None)?;
        let helper = helper.build()?;
        debug!(function = %name, "synthesized map helper");
        self.package.add_function(helper)?;
        Ok(name)
    }

    fn narrow_u32(&self, node: NodeId, value: u64) -> Result<u32, LowerError> {
        u32::try_from(value).map_err(|_| {
            LowerError::structural(self.node_span(node), format!("{value} does not fit in 32 bits"))
        })
    }

    /// The `(module, function item)` a callee expression names, if it names
    /// a program function.
    pub(super) fn resolve_function_ref(
        &self,
        callee: NodeId,
    ) -> Result<(ModuleId, NodeId), LowerError> {
        let arena = self.arena();
        let program = self.cx.program;
        match arena.kind(callee) {
            NodeKind::NameRef { def, identifier } => match arena.definer(*def) {
                Some(Definer::Function(item)) => {
                    let module = program.owning_module(item).ok_or_else(|| {
                        LowerError::invariant(
                            format!("function `{identifier}` belongs to no module"),
                            Some(arena.span(item)),
                        )
                    })?;
                    Ok((module, item))
                }
                _ => Err(LowerError::structural(
                    self.node_span(callee),
                    format!("`{identifier}` is not a function"),
                )),
            },
            NodeKind::ColonRef {
                subject: ColonSubject::Import(import),
                attr,
            } => {
                let NodeKind::Import { module, .. } = *arena.kind(*import) else {
                    return Err(self.unexpected(*import, "an import"));
                };
                let target = program.module(module);
                let item = target.get_function(arena, attr).ok_or_else(|| {
                    LowerError::structural(
                        self.node_span(callee),
                        format!("module `{}` has no function `{attr}`", target.name),
                    )
                })?;
                Ok((module, item))
            }
            other => Err(LowerError::structural(
                self.node_span(callee),
                format!("cannot call a {} expression", other.name()),
            )),
        }
    }
}
