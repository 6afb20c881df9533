//! Function builder.
//!
//! A [`FunctionBuilder`] is owned by exactly one converter. It accepts
//! nodes while open and is consumed by [`FunctionBuilder::build`], so a
//! finalized function can never receive further nodes.

use rustc_hash::FxHashSet;
use smallvec::SmallVec;
use tessel_ast::Span;
use tracing::trace;

use crate::verify::call_result_type;
use crate::{Function, Node, NodeRef, Op, Type, Value, VerifyError};

pub struct FunctionBuilder {
    name: String,
    params: Vec<NodeRef>,
    nodes: Vec<Node>,
    names: FxHashSet<String>,
}

impl FunctionBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
            nodes: Vec::new(),
            names: FxHashSet::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Type of an already-added node.
    ///
    /// # Panics
    /// Panics if `node` was not produced by this builder.
    pub fn ty(&self, node: NodeRef) -> &Type {
        &self.nodes[node.index()].ty
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_param(&self, node: NodeRef) -> bool {
        self.params.contains(&node)
    }

    pub fn node_name(&self, node: NodeRef) -> Option<&str> {
        self.nodes.get(node.index()).and_then(|n| n.name.as_deref())
    }

    /// Most recently added node.
    pub fn last_node(&self) -> Option<NodeRef> {
        self.nodes.last().map(|n| n.id)
    }

    #[expect(
        clippy::cast_possible_truncation,
        reason = "node counts never exceed u32"
    )]
    fn push(&mut self, op: Op, operands: &[NodeRef], ty: Type, span: Option<Span>) -> NodeRef {
        let id = NodeRef::new(self.nodes.len() as u32);
        trace!(function = %self.name, id = id.raw(), op = op.mnemonic(), %ty, "add node");
        self.nodes.push(Node {
            id,
            op,
            operands: SmallVec::from_slice(operands),
            ty,
            name: None,
            span,
        });
        id
    }

    fn ill_typed(&self, message: String) -> VerifyError {
        VerifyError::IllTyped {
            function: self.name.clone(),
            node: u32::try_from(self.nodes.len()).unwrap_or(u32::MAX),
            message,
        }
    }

    fn operand_types(&self, operands: &[NodeRef]) -> Result<Vec<&Type>, VerifyError> {
        operands
            .iter()
            .map(|o| {
                self.nodes
                    .get(o.index())
                    .map(|n| &n.ty)
                    .ok_or_else(|| VerifyError::ForwardReference {
                        function: self.name.clone(),
                        node: u32::try_from(self.nodes.len()).unwrap_or(u32::MAX),
                        operand: o.raw(),
                    })
            })
            .collect()
    }

    /// Append a formal parameter named `name` (made unique if taken).
    pub fn param(&mut self, name: &str, ty: Type, span: Option<Span>) -> NodeRef {
        let id = self.push(Op::Param, &[], ty, span);
        self.params.push(id);
        self.set_name(id, name);
        id
    }

    pub fn literal(&mut self, value: Value, span: Option<Span>) -> NodeRef {
        let ty = value.ty();
        self.push(Op::Literal(value), &[], ty, span)
    }

    /// Add a non-call node; its type is inferred from the operands.
    pub fn add_op(
        &mut self,
        op: Op,
        operands: &[NodeRef],
        span: Option<Span>,
    ) -> Result<NodeRef, VerifyError> {
        let types = self.operand_types(operands)?;
        let ty = match op.result_type(&types) {
            Ok(Some(ty)) => ty,
            Ok(None) => {
                return Err(self.ill_typed(format!(
                    "`{}` cannot be added without a callee",
                    op.mnemonic()
                )))
            }
            Err(message) => return Err(self.ill_typed(message)),
        };
        Ok(self.push(op, operands, ty, span))
    }

    fn add_call(
        &mut self,
        op: Op,
        callee: &Function,
        operands: &[NodeRef],
        span: Option<Span>,
    ) -> Result<NodeRef, VerifyError> {
        let types = self.operand_types(operands)?;
        let ty = call_result_type(&op, callee, &types).map_err(|message| {
            VerifyError::SignatureMismatch {
                function: self.name.clone(),
                callee: callee.name().to_string(),
                message,
            }
        })?;
        Ok(self.push(op, operands, ty, span))
    }

    pub fn invoke(
        &mut self,
        callee: &Function,
        args: &[NodeRef],
        span: Option<Span>,
    ) -> Result<NodeRef, VerifyError> {
        let op = Op::Invoke {
            callee: callee.name().to_string(),
        };
        self.add_call(op, callee, args, span)
    }

    pub fn map(
        &mut self,
        callee: &Function,
        array: NodeRef,
        span: Option<Span>,
    ) -> Result<NodeRef, VerifyError> {
        let op = Op::Map {
            callee: callee.name().to_string(),
        };
        self.add_call(op, callee, &[array], span)
    }

    /// Bounded loop calling `body` `trip_count` times.
    pub fn counted_for(
        &mut self,
        body: &Function,
        trip_count: u64,
        stride: u64,
        init: NodeRef,
        invariants: &[NodeRef],
        span: Option<Span>,
    ) -> Result<NodeRef, VerifyError> {
        let op = Op::CountedFor {
            trip_count,
            stride,
            body: body.name().to_string(),
        };
        let mut operands = Vec::with_capacity(invariants.len() + 1);
        operands.push(init);
        operands.extend_from_slice(invariants);
        self.add_call(op, body, &operands, span)
    }

    /// Name `node`, appending `__N` if the name is already used. Returns the
    /// name actually assigned.
    pub fn set_name(&mut self, node: NodeRef, name: &str) -> String {
        let mut candidate = name.to_string();
        let mut suffix = 1u32;
        while self.names.contains(&candidate) {
            candidate = format!("{name}__{suffix}");
            suffix += 1;
        }
        self.names.insert(candidate.clone());
        if let Some(slot) = self.nodes.get_mut(node.index()) {
            if let Some(old) = slot.name.replace(candidate.clone()) {
                self.names.remove(&old);
            }
        }
        candidate
    }

    /// Finalize, returning the last added node.
    pub fn build(self) -> Result<Function, VerifyError> {
        let ret = self.last_node().ok_or_else(|| VerifyError::EmptyFunction {
            function: self.name.clone(),
        })?;
        Ok(Function {
            name: self.name,
            params: self.params,
            nodes: self.nodes,
            ret,
        })
    }
}

#[cfg(test)]
mod tests;
