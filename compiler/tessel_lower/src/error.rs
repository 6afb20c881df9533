//! Lowering errors.
//!
//! Two severities are kept apart at the type level. A [`ConversionError`]
//! describes input that cannot be lowered and is reported to the user. An
//! [`InvariantViolation`] means an upstream stage handed over something it
//! should have rejected; it is never expected on well-formed input.

use tessel_ast::Span;
use tessel_ir::{PackageError, VerifyError};
use thiserror::Error;

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ConversionError {
    /// A construct that cannot be lowered.
    #[error("{span}: {message}")]
    Structural { span: Span, message: String },

    #[error(
        "not enough symbolic bindings to convert function `{function}`; need {{{}}} got {{{}}}",
        .needed.join(", "),
        .got.join(", ")
    )]
    InsufficientBindings {
        function: String,
        needed: Vec<String>,
        got: Vec<String>,
    },

    /// The constant evaluator trapped while folding an invocation.
    #[error("{span}: constant evaluation failed: {message}")]
    Evaluation { span: Span, message: String },

    #[error("IR verification failed: {0}")]
    Verification(#[from] VerifyError),

    #[error("function `{0}` was converted twice")]
    DuplicateFunction(String),
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("internal invariant violated: {message}")]
pub struct InvariantViolation {
    pub message: String,
    pub span: Option<Span>,
}

/// Error returned by every lowering entry point.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum LowerError {
    #[error(transparent)]
    Conversion(#[from] ConversionError),
    #[error(transparent)]
    Invariant(#[from] InvariantViolation),
}

impl LowerError {
    pub fn structural(span: Span, message: impl Into<String>) -> Self {
        LowerError::Conversion(ConversionError::Structural {
            span,
            message: message.into(),
        })
    }

    pub fn invariant(message: impl Into<String>, span: Option<Span>) -> Self {
        LowerError::Invariant(InvariantViolation {
            message: message.into(),
            span,
        })
    }

    /// Whether this is an upstream contract breach rather than a
    /// user-facing conversion failure.
    pub fn is_fatal(&self) -> bool {
        matches!(self, LowerError::Invariant(_))
    }

    pub fn span(&self) -> Option<Span> {
        match self {
            LowerError::Conversion(
                ConversionError::Structural { span, .. } | ConversionError::Evaluation { span, .. },
            ) => Some(*span),
            LowerError::Conversion(_) => None,
            LowerError::Invariant(violation) => violation.span,
        }
    }
}

impl From<VerifyError> for LowerError {
    fn from(err: VerifyError) -> Self {
        LowerError::Conversion(ConversionError::Verification(err))
    }
}

impl From<PackageError> for LowerError {
    fn from(err: PackageError) -> Self {
        match err {
            PackageError::DuplicateFunction(name) => {
                LowerError::Conversion(ConversionError::DuplicateFunction(name))
            }
        }
    }
}
