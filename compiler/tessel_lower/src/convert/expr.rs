//! Expression dispatch.

use tessel_ast::{BinopKind, ColonSubject, IndexRhs, NodeId, NodeKind, UnopKind};
use tessel_ir::{Bits, NodeRef, Op, Type, Value};

use super::{FunctionConverter, IrValue};
use crate::LowerError;

impl<'a> FunctionConverter<'a, '_> {
    pub(super) fn visit_node(&mut self, node: NodeId) -> Result<(), LowerError> {
        let arena = self.arena();
        match arena.kind(node) {
            NodeKind::Number { value } => {
                let value = self.bits_value(node, *value)?;
                self.def_const(node, value)?;
            }
            NodeKind::NameRef { def, .. } | NodeKind::ConstRef { def, .. } => {
                let value = self.use_value(*def)?;
                self.node_map.insert(node, value);
            }
            NodeKind::ColonRef { subject, attr } => self.visit_colon_ref(node, *subject, attr)?,
            NodeKind::Unop { op, operand } => {
                self.visit(*operand)?;
                let operand = self.use_node(*operand)?;
                let op = match op {
                    UnopKind::Negate => Op::Neg,
                    UnopKind::Invert => Op::Not,
                };
                self.def(node, op, &[operand])?;
            }
            NodeKind::Binop { op, lhs, rhs } => self.visit_binop(node, *op, *lhs, *rhs)?,
            NodeKind::Ternary {
                test,
                consequent,
                alternate,
            } => {
                let operands = self.visit_all(&[*test, *consequent, *alternate])?;
                // Case 0 is taken when the test is false.
                self.def(
                    node,
                    Op::Select { has_default: false },
                    &[operands[0], operands[2], operands[1]],
                )?;
            }
            NodeKind::Tuple { members } => {
                let operands = self.visit_all(members)?;
                let value = self.all_const(members).map(Value::Tuple);
                self.def_aggregate(node, Op::Tuple, &operands, value)?;
            }
            NodeKind::Array {
                members,
                has_ellipsis,
            } => self.visit_array(node, members, *has_ellipsis)?,
            NodeKind::Index { lhs, rhs } => self.visit_index(node, *lhs, rhs)?,
            NodeKind::Attr { lhs, attr } => {
                self.visit(*lhs)?;
                let ty = self.resolve_type(*lhs)?;
                let index = ty.member_index(attr).ok_or_else(|| {
                    LowerError::invariant(
                        format!("`{ty}` has no member `{attr}`"),
                        Some(self.node_span(node)),
                    )
                })?;
                let operand = self.use_node(*lhs)?;
                let ir = self.def(node, tuple_index(index)?, &[operand])?;
                let name = match self.builder.node_name(operand) {
                    Some(base) => format!("{base}_{attr}"),
                    None => attr.clone(),
                };
                self.builder.set_name(ir, &name);
            }
            NodeKind::Cast { expr } => self.visit_cast(node, *expr)?,
            NodeKind::StructInstance {
                struct_def,
                members,
            } => {
                let fields = self.struct_fields(*struct_def)?;
                let mut ordered = Vec::with_capacity(fields.len());
                for field in fields {
                    let expr = members
                        .iter()
                        .find(|(name, _)| name == field)
                        .map(|(_, expr)| *expr)
                        .ok_or_else(|| {
                            LowerError::invariant(
                                format!("struct instance is missing member `{field}`"),
                                Some(self.node_span(node)),
                            )
                        })?;
                    ordered.push(expr);
                }
                let operands = self.visit_all(&ordered)?;
                let value = self.all_const(&ordered).map(Value::Tuple);
                self.def_aggregate(node, Op::Tuple, &operands, value)?;
            }
            NodeKind::SplatStructInstance {
                struct_def,
                members,
                splatted,
            } => {
                self.visit(*splatted)?;
                let original = self.use_node(*splatted)?;
                let fields = self.struct_fields(*struct_def)?;
                let mut operands = Vec::with_capacity(fields.len());
                for (index, field) in fields.iter().enumerate() {
                    match members.iter().find(|(name, _)| name == field) {
                        Some((_, expr)) => {
                            self.visit(*expr)?;
                            operands.push(self.use_node(*expr)?);
                        }
                        None => {
                            operands.push(self.emit(tuple_index(index)?, &[original], node)?);
                        }
                    }
                }
                self.def(node, Op::Tuple, &operands)?;
            }
            NodeKind::Invocation { callee, args } => self.visit_invocation(node, *callee, args)?,
            NodeKind::Let { pattern, rhs, body } => {
                self.visit(*rhs)?;
                let value = self.use_value(*rhs)?;
                self.bind_pattern(*pattern, value)?;
                self.visit(*body)?;
                let value = self.use_value(*body)?;
                self.node_map.insert(node, value);
            }
            NodeKind::Match { matched, arms } => self.visit_match(node, *matched, arms)?,
            NodeKind::For {
                names,
                iterable,
                body,
                init,
            } => self.visit_for(node, *names, *iterable, *body, *init)?,
            NodeKind::NameDef { .. }
            | NodeKind::BuiltinNameDef { .. }
            | NodeKind::NameDefTree(_)
            | NodeKind::Param { .. }
            | NodeKind::ParametricBinding { .. }
            | NodeKind::Function(_)
            | NodeKind::Constant { .. }
            | NodeKind::StructDef { .. }
            | NodeKind::EnumDef { .. }
            | NodeKind::TypeDef { .. }
            | NodeKind::Import { .. } => return Err(self.unexpected(node, "an expression")),
        }
        Ok(())
    }

    /// Convert `nodes` in order and return their instructions.
    pub(super) fn visit_all(&mut self, nodes: &[NodeId]) -> Result<Vec<NodeRef>, LowerError> {
        nodes
            .iter()
            .map(|&node| {
                self.visit(node)?;
                self.use_node(node)
            })
            .collect()
    }

    /// Values of `nodes` if every one of them is known.
    fn all_const(&self, nodes: &[NodeId]) -> Option<Vec<Value>> {
        nodes
            .iter()
            .map(|&node| self.const_value(node).cloned())
            .collect()
    }

    /// Define an aggregate; a known `value` keeps the node constant while
    /// still emitting the structural instruction.
    fn def_aggregate(
        &mut self,
        node: NodeId,
        op: Op,
        operands: &[NodeRef],
        value: Option<Value>,
    ) -> Result<(), LowerError> {
        let ir = self.def(node, op, operands)?;
        if let Some(value) = value {
            self.node_map.insert(node, IrValue::Const { value, node: ir });
        }
        Ok(())
    }

    fn visit_colon_ref(
        &mut self,
        node: NodeId,
        subject: ColonSubject,
        attr: &str,
    ) -> Result<(), LowerError> {
        let arena = self.arena();
        match subject {
            ColonSubject::Import(import) => {
                let NodeKind::Import { module, .. } = *arena.kind(import) else {
                    return Err(self.unexpected(import, "an import"));
                };
                let target = self.cx.program.module(module);
                let constant = target.get_constant(arena, attr).ok_or_else(|| {
                    LowerError::structural(
                        self.node_span(node),
                        format!("`{}::{attr}` is not a constant", target.name),
                    )
                })?;
                self.ensure_constant(constant)?;
                let NodeKind::Constant { name, .. } = *arena.kind(constant) else {
                    return Err(self.unexpected(constant, "a constant"));
                };
                let value = self.use_value(name)?;
                self.node_map.insert(node, value);
            }
            ColonSubject::Enum(enum_def) => {
                let NodeKind::EnumDef { name, values } = arena.kind(enum_def) else {
                    return Err(self.unexpected(enum_def, "an enum"));
                };
                let expr = values
                    .iter()
                    .find(|(member, _)| member == attr)
                    .map(|(_, expr)| *expr)
                    .ok_or_else(|| {
                        LowerError::invariant(
                            format!(
                                "enum `{}` has no member `{attr}`",
                                arena.identifier(*name).unwrap_or("?")
                            ),
                            Some(self.node_span(node)),
                        )
                    })?;
                if !self.node_map.contains_key(&expr) {
                    self.visit(expr)?;
                }
                let value = self.use_value(expr)?;
                self.node_map.insert(node, value);
            }
        }
        Ok(())
    }

    fn visit_binop(
        &mut self,
        node: NodeId,
        op: BinopKind,
        lhs: NodeId,
        rhs: NodeId,
    ) -> Result<(), LowerError> {
        let operands = self.visit_all(&[lhs, rhs])?;
        let signed = self.resolve_type(lhs)?.is_signed();
        let pick = |signed_op: Op, unsigned_op: Op| if signed { signed_op } else { unsigned_op };
        let op = match op {
            BinopKind::Add => Op::Add,
            BinopKind::Sub => Op::Sub,
            BinopKind::Mul => pick(Op::SMul, Op::UMul),
            BinopKind::Div => pick(Op::SDiv, Op::UDiv),
            BinopKind::Shll => Op::Shll,
            BinopKind::Shrl => Op::Shrl,
            BinopKind::Shra => Op::Shra,
            BinopKind::And | BinopKind::LogicalAnd => Op::And,
            BinopKind::Or | BinopKind::LogicalOr => Op::Or,
            BinopKind::Xor => Op::Xor,
            BinopKind::Eq => Op::Eq,
            BinopKind::Ne => Op::Ne,
            BinopKind::Lt => pick(Op::SLt, Op::ULt),
            BinopKind::Le => pick(Op::SLe, Op::ULe),
            BinopKind::Gt => pick(Op::SGt, Op::UGt),
            BinopKind::Ge => pick(Op::SGe, Op::UGe),
            BinopKind::Concat => match self.ir_type_of(node)? {
                Type::Array { .. } => Op::ArrayConcat,
                _ => Op::Concat,
            },
        };
        self.def(node, op, &operands)?;
        Ok(())
    }

    fn visit_array(
        &mut self,
        node: NodeId,
        members: &[NodeId],
        has_ellipsis: bool,
    ) -> Result<(), LowerError> {
        let Some(&last) = members.last() else {
            return Err(LowerError::structural(
                self.node_span(node),
                "empty array literals cannot be lowered",
            ));
        };
        let mut filled = members.to_vec();
        if has_ellipsis {
            let Type::Array { size, .. } = self.ir_type_of(node)? else {
                return Err(self.unexpected(node, "an array-typed literal"));
            };
            filled.resize(size as usize, last);
        }

        let mut operands = self.visit_all(members)?;
        if let Some(&fill) = operands.last() {
            operands.resize(filled.len(), fill);
        }
        let value = match self.all_const(&filled) {
            Some(elements) => Some(Value::array(elements).map_err(|err| {
                LowerError::invariant(err.to_string(), Some(self.node_span(node)))
            })?),
            None => None,
        };
        self.def_aggregate(node, Op::Array, &operands, value)
    }

    fn visit_index(&mut self, node: NodeId, lhs: NodeId, rhs: &IndexRhs) -> Result<(), LowerError> {
        self.visit(lhs)?;
        let base = self.use_node(lhs)?;
        match (self.ir_type_of(lhs)?, rhs) {
            (Type::Tuple(_), IndexRhs::Expr(index)) => {
                self.visit(*index)?;
                let index = self.const_u64(*index, "tuple index")?;
                self.def(node, tuple_index(index)?, &[base])?;
            }
            (Type::Bits(_), IndexRhs::Slice { .. }) => {
                let bounds = self
                    .cx
                    .type_info
                    .slice_start_and_width(node, &self.bindings)
                    .ok_or_else(|| {
                        LowerError::invariant(
                            format!("no slice bounds recorded under {}", self.bindings),
                            Some(self.node_span(node)),
                        )
                    })?;
                let op = Op::BitSlice {
                    start: self.narrow(node, bounds.start)?,
                    width: self.narrow(node, bounds.width)?,
                };
                self.def(node, op, &[base])?;
            }
            (Type::Bits(_), IndexRhs::WidthSlice { start }) => {
                self.visit(*start)?;
                let start = self.use_node(*start)?;
                let width = self.bits_width(node)?;
                self.def(node, Op::DynamicBitSlice { width }, &[base, start])?;
            }
            (Type::Array { .. }, IndexRhs::Expr(index)) => {
                self.visit(*index)?;
                let index = self.use_node(*index)?;
                self.def(node, Op::ArrayIndex, &[base, index])?;
            }
            (ty, _) => {
                return Err(LowerError::structural(
                    self.node_span(node),
                    format!("unsupported index form on a value of type {ty}"),
                ))
            }
        }
        Ok(())
    }

    fn visit_cast(&mut self, node: NodeId, expr: NodeId) -> Result<(), LowerError> {
        self.visit(expr)?;
        let input = self.use_node(expr)?;
        let from = self.ir_type_of(expr)?;
        let to = self.ir_type_of(node)?;
        match (&from, &to) {
            (Type::Bits(_), Type::Array { element, size }) => {
                let Type::Bits(element_bits) = **element else {
                    return Err(self.unsupported_cast(node, &from, &to));
                };
                // Element 0 holds the most significant bits.
                let mut slices = Vec::with_capacity(*size as usize);
                for i in 0..*size {
                    let start = i.checked_mul(element_bits).ok_or_else(|| {
                        self.unsupported_cast(node, &from, &to)
                    })?;
                    let slice = Op::BitSlice {
                        start,
                        width: element_bits,
                    };
                    slices.push(self.emit(slice, &[input], node)?);
                }
                slices.reverse();
                self.def(node, Op::Array, &slices)?;
            }
            (Type::Array { size, .. }, Type::Bits(_)) => {
                let mut elements = Vec::with_capacity(*size as usize);
                for i in 0..*size {
                    let position = Bits::new(32, u128::from(i)).map_err(|err| {
                        LowerError::invariant(err.to_string(), Some(self.node_span(node)))
                    })?;
                    let span = self.span_for(node);
                    let index = self.builder.literal(Value::from(position), span);
                    elements.push(self.emit(Op::ArrayIndex, &[input, index], node)?);
                }
                self.def(node, Op::Concat, &elements)?;
            }
            (Type::Bits(old), Type::Bits(new)) => {
                let signed = self.resolve_type(expr)?.is_signed();
                if new < old {
                    self.def(node, Op::BitSlice { start: 0, width: *new }, &[input])?;
                } else if new > old {
                    let op = if signed {
                        Op::SignExt { new_bit_count: *new }
                    } else {
                        Op::ZeroExt { new_bit_count: *new }
                    };
                    self.def(node, op, &[input])?;
                } else {
                    let value = self.use_value(expr)?;
                    self.node_map.insert(node, value);
                }
            }
            _ => return Err(self.unsupported_cast(node, &from, &to)),
        }
        Ok(())
    }

    fn unsupported_cast(&self, node: NodeId, from: &Type, to: &Type) -> LowerError {
        LowerError::structural(
            self.node_span(node),
            format!("cannot cast {from} to {to}"),
        )
    }

    /// Member names of a struct definition, in declaration order.
    fn struct_fields(&self, struct_def: NodeId) -> Result<&'a [String], LowerError> {
        match self.arena().kind(struct_def) {
            NodeKind::StructDef { members, .. } => Ok(members),
            _ => Err(self.unexpected(struct_def, "a struct definition")),
        }
    }

    fn narrow(&self, node: NodeId, value: u64) -> Result<u32, LowerError> {
        u32::try_from(value).map_err(|_| {
            LowerError::structural(self.node_span(node), format!("{value} does not fit in 32 bits"))
        })
    }
}

/// `TupleIndex` for a member position.
pub(super) fn tuple_index(index: impl TryInto<u32>) -> Result<Op, LowerError> {
    let index = index
        .try_into()
        .map_err(|_| LowerError::invariant("tuple index does not fit in 32 bits", None))?;
    Ok(Op::TupleIndex { index })
}
