//! IR functions, nodes and operations.
//!
//! A [`Function`] is a flat list of [`Node`]s in definition order: every
//! operand refers to an earlier node, and the return value is one node of
//! the list. Parameters are ordinary nodes with [`Op::Param`].

use std::fmt;

use smallvec::SmallVec;
use tessel_ast::Span;

use crate::{Type, Value};

/// Index of a node within its [`Function`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(transparent)]
pub struct NodeRef(u32);

impl NodeRef {
    #[inline]
    pub fn new(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    pub fn raw(self) -> u32 {
        self.0
    }

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Op {
    Param,
    Literal(Value),
    Identity,

    // Arithmetic and logic
    Neg,
    Not,
    Add,
    Sub,
    UMul,
    SMul,
    UDiv,
    SDiv,
    Shll,
    Shrl,
    Shra,
    /// N-ary bitwise ops (two or more operands).
    And,
    Or,
    Xor,

    // Comparisons (result is `bits[1]`)
    Eq,
    Ne,
    ULt,
    ULe,
    UGt,
    UGe,
    SLt,
    SLe,
    SGt,
    SGe,

    // Aggregates and bit manipulation
    Concat,
    ArrayConcat,
    Tuple,
    TupleIndex { index: u32 },
    Array,
    ArrayIndex,
    ArrayUpdate,
    BitSlice { start: u32, width: u32 },
    DynamicBitSlice { width: u32 },
    SignExt { new_bit_count: u32 },
    ZeroExt { new_bit_count: u32 },
    /// Operands: selector, cases, then the default when `has_default`.
    Select { has_default: bool },
    /// Operands: selector of `n` bits, `n` cases, default.
    PrioritySelect,
    OneHot { lsb_prio: bool },
    /// Operands: one-hot selector of `n` bits, `n` cases.
    OneHotSelect,
    Clz,
    Ctz,
    Reverse,
    AndReduce,
    OrReduce,
    XorReduce,

    // Calls
    Invoke { callee: String },
    Map { callee: String },
    /// Operands: initial carry, then the invariant arguments.
    CountedFor {
        trip_count: u64,
        stride: u64,
        body: String,
    },
}

impl Op {
    /// Mnemonic used in the text form.
    pub fn mnemonic(&self) -> &'static str {
        match self {
            Op::Param => "param",
            Op::Literal(_) => "literal",
            Op::Identity => "identity",
            Op::Neg => "neg",
            Op::Not => "not",
            Op::Add => "add",
            Op::Sub => "sub",
            Op::UMul => "umul",
            Op::SMul => "smul",
            Op::UDiv => "udiv",
            Op::SDiv => "sdiv",
            Op::Shll => "shll",
            Op::Shrl => "shrl",
            Op::Shra => "shra",
            Op::And => "and",
            Op::Or => "or",
            Op::Xor => "xor",
            Op::Eq => "eq",
            Op::Ne => "ne",
            Op::ULt => "ult",
            Op::ULe => "ule",
            Op::UGt => "ugt",
            Op::UGe => "uge",
            Op::SLt => "slt",
            Op::SLe => "sle",
            Op::SGt => "sgt",
            Op::SGe => "sge",
            Op::Concat => "concat",
            Op::ArrayConcat => "array_concat",
            Op::Tuple => "tuple",
            Op::TupleIndex { .. } => "tuple_index",
            Op::Array => "array",
            Op::ArrayIndex => "array_index",
            Op::ArrayUpdate => "array_update",
            Op::BitSlice { .. } => "bit_slice",
            Op::DynamicBitSlice { .. } => "dynamic_bit_slice",
            Op::SignExt { .. } => "sign_ext",
            Op::ZeroExt { .. } => "zero_ext",
            Op::Select { .. } => "sel",
            Op::PrioritySelect => "priority_sel",
            Op::OneHot { .. } => "one_hot",
            Op::OneHotSelect => "one_hot_sel",
            Op::Clz => "clz",
            Op::Ctz => "ctz",
            Op::Reverse => "reverse",
            Op::AndReduce => "and_reduce",
            Op::OrReduce => "or_reduce",
            Op::XorReduce => "xor_reduce",
            Op::Invoke { .. } => "invoke",
            Op::Map { .. } => "map",
            Op::CountedFor { .. } => "counted_for",
        }
    }

    /// Name of the function this op calls, if any.
    pub fn callee(&self) -> Option<&str> {
        match self {
            Op::Invoke { callee } | Op::Map { callee } => Some(callee),
            Op::CountedFor { body, .. } => Some(body),
            _ => None,
        }
    }

    /// Result type from operand types, for every op whose result does not
    /// depend on another function's signature.
    ///
    /// Returns `Ok(None)` for `Param` and the call ops.
    pub fn result_type(&self, operands: &[&Type]) -> Result<Option<Type>, String> {
        let ty = match self {
            Op::Param | Op::Invoke { .. } | Op::Map { .. } | Op::CountedFor { .. } => {
                return Ok(None)
            }
            Op::Literal(value) => {
                arity(operands, 0)?;
                value.ty()
            }
            Op::Identity => {
                arity(operands, 1)?;
                operands[0].clone()
            }
            Op::Neg | Op::Not | Op::Reverse | Op::Clz | Op::Ctz => {
                arity(operands, 1)?;
                Type::Bits(bits(operands[0])?)
            }
            Op::Add | Op::Sub | Op::UMul | Op::SMul | Op::UDiv | Op::SDiv => {
                arity(operands, 2)?;
                same_bits(operands)?
            }
            Op::Shll | Op::Shrl | Op::Shra => {
                arity(operands, 2)?;
                bits(operands[1])?;
                Type::Bits(bits(operands[0])?)
            }
            Op::And | Op::Or | Op::Xor => {
                if operands.len() < 2 {
                    return Err(format!("expected at least 2 operands, got {}", operands.len()));
                }
                same_bits(operands)?
            }
            Op::Eq | Op::Ne => {
                arity(operands, 2)?;
                if operands[0] != operands[1] {
                    return Err(format!("cannot compare {} with {}", operands[0], operands[1]));
                }
                Type::Bits(1)
            }
            Op::ULt | Op::ULe | Op::UGt | Op::UGe | Op::SLt | Op::SLe | Op::SGt | Op::SGe => {
                arity(operands, 2)?;
                same_bits(operands)?;
                Type::Bits(1)
            }
            Op::AndReduce | Op::OrReduce | Op::XorReduce => {
                arity(operands, 1)?;
                bits(operands[0])?;
                Type::Bits(1)
            }
            Op::Concat => {
                let mut width = 0u32;
                for operand in operands {
                    width = width
                        .checked_add(bits(operand)?)
                        .ok_or_else(|| "concat width overflows".to_string())?;
                }
                Type::Bits(width)
            }
            Op::ArrayConcat => {
                let mut element_ty = None;
                let mut total = 0u32;
                for operand in operands {
                    let Type::Array { element, size } = operand else {
                        return Err(format!("array_concat operand is {operand}"));
                    };
                    if element_ty.is_some_and(|e: &Type| e != element.as_ref()) {
                        return Err("array_concat element types differ".to_string());
                    }
                    element_ty = Some(element.as_ref());
                    total += size;
                }
                let element = element_ty.ok_or_else(|| "array_concat needs operands".to_string())?;
                Type::array(element.clone(), total)
            }
            Op::Tuple => Type::Tuple(operands.iter().map(|t| (*t).clone()).collect()),
            Op::TupleIndex { index } => {
                arity(operands, 1)?;
                match operands[0] {
                    Type::Tuple(members) => members
                        .get(*index as usize)
                        .cloned()
                        .ok_or_else(|| format!("tuple index {index} out of range"))?,
                    other => return Err(format!("tuple_index operand is {other}")),
                }
            }
            Op::Array => {
                let first = operands
                    .first()
                    .ok_or_else(|| "array needs at least one element".to_string())?;
                if operands.iter().any(|t| t != first) {
                    return Err("array elements differ in type".to_string());
                }
                let size = u32::try_from(operands.len()).map_err(|e| e.to_string())?;
                Type::array((*first).clone(), size)
            }
            Op::ArrayIndex => {
                arity(operands, 2)?;
                bits(operands[1])?;
                array_element(operands[0])?.clone()
            }
            Op::ArrayUpdate => {
                arity(operands, 3)?;
                bits(operands[1])?;
                if array_element(operands[0])? != operands[2] {
                    return Err("array_update value does not match element type".to_string());
                }
                operands[0].clone()
            }
            Op::BitSlice { start, width } => {
                arity(operands, 1)?;
                let input = bits(operands[0])?;
                if u64::from(*start) + u64::from(*width) > u64::from(input) {
                    return Err(format!(
                        "bit_slice [{start}, +{width}) exceeds {input} bits"
                    ));
                }
                Type::Bits(*width)
            }
            Op::DynamicBitSlice { width } => {
                arity(operands, 2)?;
                bits(operands[1])?;
                if *width > bits(operands[0])? {
                    return Err(format!("dynamic_bit_slice width {width} exceeds input"));
                }
                Type::Bits(*width)
            }
            Op::SignExt { new_bit_count } | Op::ZeroExt { new_bit_count } => {
                arity(operands, 1)?;
                if *new_bit_count < bits(operands[0])? {
                    return Err(format!("extension to {new_bit_count} bits narrows"));
                }
                Type::Bits(*new_bit_count)
            }
            Op::Select { has_default } => {
                let (selector, rest) = operands
                    .split_first()
                    .ok_or_else(|| "sel needs a selector".to_string())?;
                let selector_width = bits(selector)?;
                let cases = rest
                    .len()
                    .checked_sub(usize::from(*has_default))
                    .ok_or_else(|| "sel with a default needs a default case".to_string())?;
                let case_ty = uniform(rest)?;
                let reachable = 1u128.checked_shl(selector_width).unwrap_or(u128::MAX);
                let cases_u128 = cases as u128;
                if (*has_default && cases_u128 >= reachable)
                    || (!*has_default && cases_u128 != reachable)
                {
                    return Err(format!(
                        "sel with {selector_width}-bit selector has {cases} cases"
                    ));
                }
                case_ty
            }
            Op::PrioritySelect => {
                let (selector, rest) = operands
                    .split_first()
                    .ok_or_else(|| "priority_sel needs a selector".to_string())?;
                let width = bits(selector)? as usize;
                if rest.len() != width + 1 {
                    return Err(format!(
                        "priority_sel with {width}-bit selector needs {width} cases plus a default"
                    ));
                }
                uniform(rest)?
            }
            Op::OneHot { .. } => {
                arity(operands, 1)?;
                Type::Bits(bits(operands[0])? + 1)
            }
            Op::OneHotSelect => {
                let (selector, rest) = operands
                    .split_first()
                    .ok_or_else(|| "one_hot_sel needs a selector".to_string())?;
                if bits(selector)? as usize != rest.len() {
                    return Err("one_hot_sel selector width must equal the case count".to_string());
                }
                uniform(rest)?
            }
        };
        Ok(Some(ty))
    }
}

fn arity(operands: &[&Type], expected: usize) -> Result<(), String> {
    if operands.len() == expected {
        Ok(())
    } else {
        Err(format!("expected {expected} operands, got {}", operands.len()))
    }
}

fn bits(ty: &Type) -> Result<u32, String> {
    ty.bit_count().ok_or_else(|| format!("expected bits, got {ty}"))
}

fn same_bits(operands: &[&Type]) -> Result<Type, String> {
    let width = bits(operands[0])?;
    for operand in &operands[1..] {
        if bits(operand)? != width {
            return Err(format!("operand widths differ: {} vs {operand}", operands[0]));
        }
    }
    Ok(Type::Bits(width))
}

fn array_element(ty: &Type) -> Result<&Type, String> {
    match ty {
        Type::Array { element, .. } => Ok(element),
        other => Err(format!("expected array, got {other}")),
    }
}

fn uniform(cases: &[&Type]) -> Result<Type, String> {
    let first = cases
        .first()
        .ok_or_else(|| "expected at least one case".to_string())?;
    if cases.iter().any(|t| t != first) {
        return Err("case types differ".to_string());
    }
    Ok((*first).clone())
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Node {
    pub id: NodeRef,
    pub op: Op,
    pub operands: SmallVec<[NodeRef; 4]>,
    pub ty: Type,
    pub name: Option<String>,
    pub span: Option<Span>,
}

impl Node {
    /// Name used to refer to this node in the text form.
    pub fn display_name(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => format!("{}.{}", self.op.mnemonic(), self.id.raw()),
        }
    }
}

/// A finalized IR function.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Function {
    pub(crate) name: String,
    pub(crate) params: Vec<NodeRef>,
    pub(crate) nodes: Vec<Node>,
    pub(crate) ret: NodeRef,
}

impl Function {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> impl Iterator<Item = &Node> {
        self.params.iter().map(|p| self.node(*p))
    }

    pub fn param_types(&self) -> Vec<&Type> {
        self.params().map(|p| &p.ty).collect()
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// # Panics
    /// Panics if `r` does not belong to this function.
    #[inline]
    pub fn node(&self, r: NodeRef) -> &Node {
        &self.nodes[r.index()]
    }

    pub fn return_node(&self) -> &Node {
        self.node(self.ret)
    }

    pub fn return_type(&self) -> &Type {
        &self.return_node().ty
    }

    /// Nodes whose op satisfies `pred`.
    pub fn nodes_where<'a>(
        &'a self,
        pred: impl Fn(&Op) -> bool + 'a,
    ) -> impl Iterator<Item = &'a Node> + 'a {
        self.nodes.iter().filter(move |n| pred(&n.op))
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fn {}(", self.name)?;
        for (i, param) in self.params().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {} id={}", param.display_name(), param.ty, param.id.raw())?;
        }
        writeln!(f, ") -> {} {{", self.return_type())?;
        for node in &self.nodes {
            if node.op == Op::Param {
                continue;
            }
            let ret = if node.id == self.ret { "ret " } else { "" };
            write!(
                f,
                "  {ret}{}: {} = {}(",
                node.display_name(),
                node.ty,
                node.op.mnemonic()
            )?;
            for operand in &node.operands {
                write!(f, "{}, ", self.node(*operand).display_name())?;
            }
            write_attributes(f, &node.op)?;
            write!(f, "id={}", node.id.raw())?;
            if let Some(span) = node.span {
                write!(f, ", pos={span}")?;
            }
            writeln!(f, ")")?;
        }
        // A parameter returned directly still needs a `ret` line.
        if self.return_node().op == Op::Param {
            writeln!(f, "  ret {}", self.return_node().display_name())?;
        }
        write!(f, "}}")
    }
}

fn write_attributes(f: &mut fmt::Formatter<'_>, op: &Op) -> fmt::Result {
    match op {
        Op::Literal(value) => write!(f, "value={value}, "),
        Op::TupleIndex { index } => write!(f, "index={index}, "),
        Op::BitSlice { start, width } => write!(f, "start={start}, width={width}, "),
        Op::DynamicBitSlice { width } => write!(f, "width={width}, "),
        Op::SignExt { new_bit_count } | Op::ZeroExt { new_bit_count } => {
            write!(f, "new_bit_count={new_bit_count}, ")
        }
        Op::Select { has_default } => write!(f, "has_default={has_default}, "),
        Op::OneHot { lsb_prio } => write!(f, "lsb_prio={lsb_prio}, "),
        Op::Invoke { callee } | Op::Map { callee } => write!(f, "to_apply={callee}, "),
        Op::CountedFor {
            trip_count,
            stride,
            body,
        } => write!(f, "trip_count={trip_count}, stride={stride}, body={body}, "),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests;
