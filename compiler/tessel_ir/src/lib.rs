//! Function-oriented IR for tessel.
//!
//! - [`FunctionBuilder`]: open builder, consumed by `build`
//! - [`Function`]: flat node list with parameters and a return node
//! - [`Package`]: append-only, uniquely named functions
//! - [`verify_function`] / [`verify_package`]: structural checks
//!
//! Every node carries its result type. Types are inferred when a node is
//! added and re-derived by the verifier.

mod builder;
mod ir;
mod package;
mod value;
mod verify;

pub use builder::FunctionBuilder;
pub use ir::{Function, Node, NodeRef, Op};
pub use package::{Package, PackageError};
pub use value::{Bits, Type, Value, ValueError, MAX_BIT_WIDTH};
pub use verify::{verify_function, verify_package, VerifyError};
