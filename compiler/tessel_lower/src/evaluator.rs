//! Interface to the constant evaluator used for folding.

use tessel_ast::{ModuleId, Program, SymbolicBindings};
use tessel_ir::Value;
use thiserror::Error;

/// The evaluator trapped or could not run the function.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct EvaluationError {
    pub message: String,
}

impl EvaluationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Runs a function on concrete arguments at conversion time.
///
/// `bindings` are the parametric values of the *call site*, which may differ
/// from those of the function containing the call.
pub trait ConstEvaluator {
    fn evaluate(
        &self,
        program: &Program,
        module: ModuleId,
        function_name: &str,
        args: &[Value],
        bindings: &SymbolicBindings,
    ) -> Result<Value, EvaluationError>;
}

impl<F> ConstEvaluator for F
where
    F: Fn(&Program, ModuleId, &str, &[Value], &SymbolicBindings) -> Result<Value, EvaluationError>,
{
    fn evaluate(
        &self,
        program: &Program,
        module: ModuleId,
        function_name: &str,
        args: &[Value],
        bindings: &SymbolicBindings,
    ) -> Result<Value, EvaluationError> {
        self(program, module, function_name, args, bindings)
    }
}
