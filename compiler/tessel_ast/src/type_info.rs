//! Type-checker output consumed by later passes.
//!
//! [`TypeInfo`] is a read-only oracle once type checking has finished:
//! it answers "what is the type of this node" and "which parametric values
//! does this call site instantiate its callee with". Call-site bindings are
//! keyed by the *caller's* bindings too, because a call inside a parametric
//! function can instantiate its callee differently per caller instantiation.

use rustc_hash::FxHashMap;

use crate::{ConcreteType, NodeId, StartAndWidth, SymbolicBindings};

#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TypeInfo {
    types: FxHashMap<NodeId, ConcreteType>,
    /// invocation -> [(caller bindings, callee bindings)]
    invocation_bindings: FxHashMap<NodeId, Vec<(SymbolicBindings, SymbolicBindings)>>,
    /// slice index node -> [(caller bindings, resolved bounds)]
    slices: FxHashMap<NodeId, Vec<(SymbolicBindings, StartAndWidth)>>,
}

impl TypeInfo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_type(&mut self, node: NodeId, ty: ConcreteType) {
        self.types.insert(node, ty);
    }

    pub fn get_type(&self, node: NodeId) -> Option<&ConcreteType> {
        self.types.get(&node)
    }

    /// Record the bindings `invocation` instantiates its callee with when
    /// the enclosing function runs under `caller`.
    pub fn add_invocation_bindings(
        &mut self,
        invocation: NodeId,
        caller: SymbolicBindings,
        callee: SymbolicBindings,
    ) {
        let entries = self.invocation_bindings.entry(invocation).or_default();
        match entries.iter_mut().find(|(c, _)| *c == caller) {
            Some(entry) => entry.1 = callee,
            None => entries.push((caller, callee)),
        }
    }

    pub fn invocation_bindings(
        &self,
        invocation: NodeId,
        caller: &SymbolicBindings,
    ) -> Option<&SymbolicBindings> {
        self.invocation_bindings
            .get(&invocation)?
            .iter()
            .find(|(c, _)| c == caller)
            .map(|(_, callee)| callee)
    }

    pub fn add_slice(&mut self, index: NodeId, caller: SymbolicBindings, bounds: StartAndWidth) {
        let entries = self.slices.entry(index).or_default();
        match entries.iter_mut().find(|(c, _)| *c == caller) {
            Some(entry) => entry.1 = bounds,
            None => entries.push((caller, bounds)),
        }
    }

    /// Resolved bounds of the static slice on `index` under `caller`.
    pub fn slice_start_and_width(
        &self,
        index: NodeId,
        caller: &SymbolicBindings,
    ) -> Option<StartAndWidth> {
        self.slices
            .get(&index)?
            .iter()
            .find(|(c, _)| c == caller)
            .map(|(_, bounds)| *bounds)
    }
}
