//! Mapping from resolved AST types to IR types.

use tessel_ast::{ConcreteType, Span};
use tessel_ir::{Type, MAX_BIT_WIDTH};

use crate::LowerError;

/// Convert a fully resolved type. `span` locates the node for diagnostics.
///
/// Enums lower to their underlying bits; function types have no IR form.
pub(crate) fn ir_type(ty: &ConcreteType, span: Span) -> Result<Type, LowerError> {
    match ty {
        ConcreteType::Bits { size, .. } | ConcreteType::Enum { size } => {
            let width = known(size.known(), span)?;
            match u32::try_from(width) {
                Ok(width) if width <= MAX_BIT_WIDTH => Ok(Type::Bits(width)),
                _ => Err(LowerError::structural(
                    span,
                    format!("bits[{width}] exceeds the {MAX_BIT_WIDTH}-bit limit of the IR"),
                )),
            }
        }
        ConcreteType::Array { element, size } => {
            let element = ir_type(element, span)?;
            let size = known(size.known(), span)?;
            let size = u32::try_from(size).map_err(|_| {
                LowerError::structural(span, format!("array of {size} elements is too large"))
            })?;
            Ok(Type::array(element, size))
        }
        ConcreteType::Tuple { members } => members
            .iter()
            .map(|(_, member)| ir_type(member, span))
            .collect::<Result<Vec<_>, _>>()
            .map(Type::Tuple),
        ConcreteType::Function { .. } => Err(LowerError::structural(
            span,
            format!("function-typed value `{ty}` cannot be lowered"),
        )),
    }
}

fn known(size: Option<u64>, span: Span) -> Result<u64, LowerError> {
    size.ok_or_else(|| LowerError::invariant("type still has a parametric dimension", Some(span)))
}
