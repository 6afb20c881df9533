//! Free-variable enumeration over AST subtrees.
//!
//! A name is free in a subtree when the subtree references it but its
//! `NameDef` is introduced outside the subtree. Function parameters are free
//! in a function body; `for` bindings are free in the loop body (they are
//! introduced by the `for` node, not by the body).

use rustc_hash::FxHashSet;

use crate::{AstArena, ColonSubject, NodeId, NodeKind};

/// One free reference: the identifier and the node that defines it
/// (`NameDef` or `BuiltinNameDef`).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FreeVariable {
    pub identifier: String,
    pub def: NodeId,
}

/// Free variables of a subtree, ordered by identifier and then by defining
/// node, with one entry per distinct definition.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FreeVariables {
    vars: Vec<FreeVariable>,
}

impl FreeVariables {
    pub fn iter(&self) -> std::slice::Iter<'_, FreeVariable> {
        self.vars.iter()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.vars.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Drop references to builtins (`clz`, `range`, ...), which have no
    /// definition to capture.
    #[must_use]
    pub fn drop_builtin_defs(mut self, arena: &AstArena) -> Self {
        self.vars
            .retain(|v| !matches!(arena.kind(v.def), NodeKind::BuiltinNameDef { .. }));
        self
    }
}

impl<'a> IntoIterator for &'a FreeVariables {
    type Item = &'a FreeVariable;
    type IntoIter = std::slice::Iter<'a, FreeVariable>;

    fn into_iter(self) -> Self::IntoIter {
        self.vars.iter()
    }
}

/// Enumerate the free variables of the subtree rooted at `root`.
pub fn free_variables(arena: &AstArena, root: NodeId) -> FreeVariables {
    let mut introduced = FxHashSet::default();
    let mut referenced: Vec<NodeId> = Vec::new();
    let mut stack = vec![root];

    while let Some(id) = stack.pop() {
        match arena.kind(id) {
            NodeKind::NameDef { .. } => {
                introduced.insert(id);
            }
            NodeKind::NameRef { def, .. } | NodeKind::ConstRef { def, .. } => referenced.push(*def),
            NodeKind::ColonRef { subject, .. } => {
                let (ColonSubject::Import(item) | ColonSubject::Enum(item)) = *subject;
                referenced.extend(item_name(arena, item));
            }
            NodeKind::StructInstance { struct_def, .. }
            | NodeKind::SplatStructInstance { struct_def, .. } => {
                referenced.extend(item_name(arena, *struct_def));
            }
            _ => {}
        }
        // Reverse so children are visited in source order.
        stack.extend(arena.children(id).into_iter().rev());
    }

    let mut seen = FxHashSet::default();
    let mut vars: Vec<FreeVariable> = referenced
        .into_iter()
        .filter(|def| !introduced.contains(def) && seen.insert(*def))
        .filter_map(|def| {
            arena.identifier(def).map(|identifier| FreeVariable {
                identifier: identifier.to_string(),
                def,
            })
        })
        .collect();
    vars.sort_by(|a, b| a.identifier.cmp(&b.identifier).then(a.def.cmp(&b.def)));
    FreeVariables { vars }
}

/// `NameDef` naming a module item.
fn item_name(arena: &AstArena, item: NodeId) -> Option<NodeId> {
    match arena.kind(item) {
        NodeKind::StructDef { name, .. }
        | NodeKind::EnumDef { name, .. }
        | NodeKind::TypeDef { name }
        | NodeKind::Import { name, .. }
        | NodeKind::Constant { name, .. } => Some(*name),
        NodeKind::Function(f) => Some(f.name),
        _ => None,
    }
}
