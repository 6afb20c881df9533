//! Structural verification of functions and packages.
//!
//! The builder already rejects ill-typed nodes as they are added; the
//! verifier re-checks a finished function from scratch and, at package
//! level, checks every call against the callee's signature and that callees
//! are defined before their callers.

use rustc_hash::FxHashSet;
use thiserror::Error;

use crate::{Function, Op, Package, Type};

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum VerifyError {
    #[error("function `{function}` has no nodes")]
    EmptyFunction { function: String },

    #[error("`{function}`: node {node} uses node {operand} before it is defined")]
    ForwardReference {
        function: String,
        node: u32,
        operand: u32,
    },

    #[error("`{function}`: node {node} is ill-typed: {message}")]
    IllTyped {
        function: String,
        node: u32,
        message: String,
    },

    #[error("`{function}`: node {node} has type {found}, expected {expected}")]
    TypeMismatch {
        function: String,
        node: u32,
        expected: Type,
        found: Type,
    },

    #[error("`{function}`: duplicate node name `{name}`")]
    DuplicateName { function: String, name: String },

    #[error("`{function}`: parameter list is inconsistent at node {node}")]
    BadParam { function: String, node: u32 },

    #[error("`{function}` calls unknown function `{callee}`")]
    UnknownCallee { function: String, callee: String },

    #[error("`{function}` calls `{callee}`, which is defined after it")]
    CalleeAfterCaller { function: String, callee: String },

    #[error("`{function}`: call to `{callee}` does not match its signature: {message}")]
    SignatureMismatch {
        function: String,
        callee: String,
        message: String,
    },
}

/// Result type of a call op given the callee and the operand types.
pub(crate) fn call_result_type(op: &Op, callee: &Function, operands: &[&Type]) -> Result<Type, String> {
    let params = callee.param_types();
    match op {
        Op::Invoke { .. } => {
            if params.len() != operands.len() {
                return Err(format!(
                    "expected {} arguments, got {}",
                    params.len(),
                    operands.len()
                ));
            }
            for (i, (param, arg)) in params.iter().zip(operands).enumerate() {
                if param != arg {
                    return Err(format!("argument {i} is {arg}, parameter is {param}"));
                }
            }
            Ok(callee.return_type().clone())
        }
        Op::Map { .. } => {
            let [Type::Array { element, size }] = operands else {
                return Err("map takes exactly one array operand".to_string());
            };
            if params.as_slice() != [element.as_ref()] {
                return Err(format!("mapped function must take a single {element}"));
            }
            Ok(Type::array(callee.return_type().clone(), *size))
        }
        Op::CountedFor { .. } => {
            let (init, invariants) = operands
                .split_first()
                .ok_or_else(|| "counted_for needs an initial value".to_string())?;
            if params.len() != invariants.len() + 2 {
                return Err(format!(
                    "body takes {} parameters, loop supplies {}",
                    params.len(),
                    invariants.len() + 2
                ));
            }
            if params[0].bit_count().is_none() {
                return Err("induction variable must be bits".to_string());
            }
            if params[1] != *init || callee.return_type() != *init {
                return Err(format!("loop carry type {init} does not match body"));
            }
            for (i, (param, arg)) in params[2..].iter().zip(invariants).enumerate() {
                if param != arg {
                    return Err(format!("invariant {i} is {arg}, parameter is {param}"));
                }
            }
            Ok((*init).clone())
        }
        other => Err(format!("`{}` is not a call", other.mnemonic())),
    }
}

/// Check one function in isolation.
pub fn verify_function(function: &Function) -> Result<(), VerifyError> {
    let name = || function.name().to_string();
    if function.nodes().is_empty() || function.ret.index() >= function.nodes().len() {
        return Err(VerifyError::EmptyFunction { function: name() });
    }

    let mut names = FxHashSet::default();
    let mut params = function.params.iter();
    for (index, node) in function.nodes().iter().enumerate() {
        if node.id.index() != index {
            return Err(VerifyError::BadParam {
                function: name(),
                node: node.id.raw(),
            });
        }
        if let Some(node_name) = &node.name {
            if !names.insert(node_name.as_str()) {
                return Err(VerifyError::DuplicateName {
                    function: name(),
                    name: node_name.clone(),
                });
            }
        }
        if node.op == Op::Param {
            if params.next() != Some(&node.id) {
                return Err(VerifyError::BadParam {
                    function: name(),
                    node: node.id.raw(),
                });
            }
            continue;
        }
        for operand in &node.operands {
            if operand.index() >= index {
                return Err(VerifyError::ForwardReference {
                    function: name(),
                    node: node.id.raw(),
                    operand: operand.raw(),
                });
            }
        }
        let operand_types: Vec<&Type> = node
            .operands
            .iter()
            .map(|o| &function.node(*o).ty)
            .collect();
        let expected = node
            .op
            .result_type(&operand_types)
            .map_err(|message| VerifyError::IllTyped {
                function: name(),
                node: node.id.raw(),
                message,
            })?;
        if let Some(expected) = expected {
            if expected != node.ty {
                return Err(VerifyError::TypeMismatch {
                    function: name(),
                    node: node.id.raw(),
                    expected,
                    found: node.ty.clone(),
                });
            }
        }
    }
    if let Some(extra) = params.next() {
        return Err(VerifyError::BadParam {
            function: name(),
            node: extra.raw(),
        });
    }
    Ok(())
}

/// Check every function, then every call edge: callees must exist, be
/// defined earlier in the package, and match the call's operand types.
pub fn verify_package(package: &Package) -> Result<(), VerifyError> {
    let mut defined = FxHashSet::default();
    for function in package.functions() {
        verify_function(function)?;
        for node in function.nodes() {
            let Some(callee_name) = node.op.callee() else {
                continue;
            };
            let callee = package
                .get_function(callee_name)
                .ok_or_else(|| VerifyError::UnknownCallee {
                    function: function.name().to_string(),
                    callee: callee_name.to_string(),
                })?;
            if !defined.contains(callee_name) {
                return Err(VerifyError::CalleeAfterCaller {
                    function: function.name().to_string(),
                    callee: callee_name.to_string(),
                });
            }
            let operand_types: Vec<&Type> = node
                .operands
                .iter()
                .map(|o| &function.node(*o).ty)
                .collect();
            let expected = call_result_type(&node.op, callee, &operand_types).map_err(|message| {
                VerifyError::SignatureMismatch {
                    function: function.name().to_string(),
                    callee: callee_name.to_string(),
                    message,
                }
            })?;
            if expected != node.ty {
                return Err(VerifyError::TypeMismatch {
                    function: function.name().to_string(),
                    node: node.id.raw(),
                    expected,
                    found: node.ty.clone(),
                });
            }
        }
        defined.insert(function.name());
    }
    Ok(())
}

#[cfg(test)]
mod tests;
