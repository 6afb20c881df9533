//! Lowering from the typed tessel AST to the function IR.
//!
//! The pass converts one module (plus whatever it reaches in imported
//! modules) into a single [`tessel_ir::Package`]:
//!
//! - parametric functions are monomorphized into one IR function per
//!   distinct binding set, named by [`mangle_name`];
//! - invocations whose arguments are all known at conversion time are
//!   folded through a [`ConstEvaluator`] into literals;
//! - `for` loops over `range(0, N)` become `counted_for` instructions whose
//!   bodies are synthesized functions taking their free variables as
//!   trailing parameters;
//! - functions are appended in the order a [`ConversionOrder`] produces,
//!   so every callee precedes its callers.
//!
//! Errors split into user-facing [`ConversionError`]s and fatal
//! [`InvariantViolation`]s; see [`LowerError`].

mod assemble;
mod convert;
mod error;
mod evaluator;
mod mangle;
mod options;
mod order;
mod stack;

use std::sync::Once;

pub use assemble::{
    convert_entry_function, convert_module, convert_module_to_text, convert_module_with_order,
};
pub use error::{ConversionError, InvariantViolation, LowerError};
pub use evaluator::{ConstEvaluator, EvaluationError};
pub use mangle::mangle_name;
pub use options::LowerOptions;
pub use order::{ConversionOrder, ConversionRecord, DependencyOrder};

pub(crate) use stack::ensure_sufficient_stack;

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for debug output.
///
/// Safe to call more than once. Enable with `RUST_LOG=tessel_lower=debug`
/// (function and loop milestones) or `RUST_LOG=tessel_lower=trace` (every
/// emitted node).
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        // Only initialize if RUST_LOG is set
        if std::env::var("RUST_LOG").is_ok() {
            let filter = EnvFilter::from_default_env();
            tracing_subscriber::registry()
                .with(fmt::layer().with_target(true).with_level(true))
                .with(filter)
                .init();
        }
    });
}
