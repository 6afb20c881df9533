//! `let` destructuring and `match` lowering.
//!
//! A match becomes one `priority_sel`: each non-default arm contributes a
//! 1-bit selector (bit `i` for arm `i`, so earlier arms win) and the final
//! irrefutable arm supplies the default.

use tessel_ast::{MatchArm, NameDefTree, NodeId, PatternLeaf};
use tessel_ir::{Bits, NodeRef, Op, Value};

use super::expr::tuple_index;
use super::{FunctionConverter, IrValue};
use crate::LowerError;

impl FunctionConverter<'_, '_> {
    fn pattern(&self, node: NodeId) -> Result<&NameDefTree, LowerError> {
        self.arena()
            .name_def_tree(node)
            .ok_or_else(|| self.unexpected(node, "a binding pattern"))
    }

    /// Bind the names in an irrefutable `pattern` to `value`.
    pub(super) fn bind_pattern(&mut self, pattern: NodeId, value: IrValue) -> Result<(), LowerError> {
        match self.pattern(pattern)?.clone() {
            NameDefTree::Leaf(PatternLeaf::NameDef(name)) => {
                self.bind_name(name, value)?;
            }
            NameDefTree::Leaf(PatternLeaf::Wildcard) => {}
            NameDefTree::Leaf(
                PatternLeaf::Number(_) | PatternLeaf::NameRef(_) | PatternLeaf::ColonRef(_),
            ) => return Err(self.unexpected(pattern, "an irrefutable pattern")),
            NameDefTree::Tuple(children) => {
                let tuple = value.node();
                for (index, child) in children.into_iter().enumerate() {
                    if matches!(
                        self.pattern(child)?,
                        NameDefTree::Leaf(PatternLeaf::Wildcard)
                    ) {
                        continue;
                    }
                    let element = self.emit(tuple_index(index)?, &[tuple], child)?;
                    self.bind_pattern(child, IrValue::Node(element))?;
                }
            }
        }
        Ok(())
    }

    pub(super) fn visit_match(
        &mut self,
        node: NodeId,
        matched: NodeId,
        arms: &[MatchArm],
    ) -> Result<(), LowerError> {
        self.visit(matched)?;
        let subject = self.use_node(matched)?;

        let Some((default_arm, arms)) = arms.split_last() else {
            return Err(self.unexpected(node, "a match with at least one arm"));
        };
        let [default_pattern] = default_arm.patterns.as_slice() else {
            return Err(LowerError::structural(
                default_arm.span,
                "Multiple patterns in the default arm are not supported for IR conversion.",
            ));
        };
        if !self.pattern(*default_pattern)?.is_irrefutable() {
            return Err(LowerError::structural(
                self.node_span(node),
                "Only matches with trailing irrefutable patterns are currently supported for IR conversion.",
            ));
        }

        let mut selectors = Vec::with_capacity(arms.len());
        let mut values = Vec::with_capacity(arms.len() + 1);
        for arm in arms {
            let mut alternatives = Vec::with_capacity(arm.patterns.len());
            for &pattern in &arm.patterns {
                alternatives.push(self.matcher(pattern, subject)?);
            }
            let selector = match alternatives.as_slice() {
                [] => return Err(self.unexpected(arm.expr, "an arm with a pattern")),
                [single] => *single,
                _ => self.emit(Op::Or, &alternatives, arm.expr)?,
            };
            selectors.push(selector);
            self.visit(arm.expr)?;
            values.push(self.use_node(arm.expr)?);
        }

        self.bind_pattern(*default_pattern, IrValue::Node(subject))?;
        self.visit(default_arm.expr)?;
        let default = self.use_node(default_arm.expr)?;

        if selectors.is_empty() {
            self.def(node, Op::Identity, &[default])?;
            return Ok(());
        }
        let selector = if selectors.len() == 1 {
            selectors[0]
        } else {
            // concat puts its first operand in the high bits.
            selectors.reverse();
            self.emit(Op::Concat, &selectors, node)?
        };
        let mut operands = Vec::with_capacity(values.len() + 2);
        operands.push(selector);
        operands.extend(values);
        operands.push(default);
        self.def(node, Op::PrioritySelect, &operands)?;
        Ok(())
    }

    /// 1-bit value that is set when `subject` matches `pattern`, binding
    /// any names the pattern introduces.
    fn matcher(&mut self, pattern: NodeId, subject: NodeRef) -> Result<NodeRef, LowerError> {
        match self.pattern(pattern)?.clone() {
            NameDefTree::Leaf(PatternLeaf::Wildcard) => Ok(self.matches_anything(pattern)),
            NameDefTree::Leaf(PatternLeaf::NameDef(name)) => {
                self.bind_name(name, IrValue::Node(subject))?;
                Ok(self.matches_anything(pattern))
            }
            NameDefTree::Leaf(
                PatternLeaf::Number(expected)
                | PatternLeaf::NameRef(expected)
                | PatternLeaf::ColonRef(expected),
            ) => {
                self.visit(expected)?;
                let expected_value = self.use_node(expected)?;
                self.emit(Op::Eq, &[expected_value, subject], pattern)
            }
            NameDefTree::Tuple(children) => {
                let mut conjuncts = Vec::with_capacity(children.len());
                for (index, child) in children.into_iter().enumerate() {
                    let element = self.emit(tuple_index(index)?, &[subject], child)?;
                    conjuncts.push(self.matcher(child, element)?);
                }
                match conjuncts.as_slice() {
                    [] => Ok(self.matches_anything(pattern)),
                    [single] => Ok(*single),
                    _ => self.emit(Op::And, &conjuncts, pattern),
                }
            }
        }
    }

    fn matches_anything(&mut self, pattern: NodeId) -> NodeRef {
        let span = self.span_for(pattern);
        self.builder.literal(Value::from(Bits::bool(true)), span)
    }
}
