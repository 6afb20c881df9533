//! Typed AST for the tessel hardware description language.
//!
//! This crate holds what the lowering pass consumes: a program-wide node
//! arena with resolved names, concrete types with parametric dimensions,
//! per-instantiation symbolic bindings, and the type checker's side tables.
//!
//! # Design
//!
//! - **Flat arena**: nodes are addressed by [`NodeId`], never by pointer.
//! - **Closed node kinds**: [`NodeKind`] is one enum, matched exhaustively.
//! - **Resolved input**: every reference already points at its definition.

mod ast;
mod builder;
mod free_vars;
mod ids;
mod span;
mod type_info;
mod types;

pub use ast::{
    AstArena, BinopKind, ColonSubject, Definer, Function, IndexRhs, MatchArm, Module,
    NameDefTree, Node, NodeKind, PatternLeaf, Program, UnopKind,
};
pub use builder::{FunctionDraft, ProgramBuilder};
pub use free_vars::{free_variables, FreeVariable, FreeVariables};
pub use ids::{ModuleId, NodeId};
pub use span::Span;
pub use type_info::TypeInfo;
pub use types::{ConcreteType, Dim, ParametricExpr, StartAndWidth, SymbolicBindings};
