//! AST node definitions.
//!
//! The tree is flat: every node is stored in an [`AstArena`] and children are
//! referenced by [`NodeId`]. Node kinds form one closed enum ([`NodeKind`]),
//! so every consumer dispatches with an exhaustive `match` and adding a kind
//! is a compile-time obligation for all of them.
//!
//! Name resolution has already happened by the time a tree reaches this
//! crate: every [`NodeKind::NameRef`] points at its defining
//! [`NodeKind::NameDef`], and every `NameDef` records its [`Definer`].

use std::fmt;

use crate::{ModuleId, NodeId, Span};

// Operators

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum UnopKind {
    /// Two's complement negation (`-x`).
    Negate,
    /// Bitwise inversion (`!x`).
    Invert,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BinopKind {
    Add,
    Sub,
    Mul,
    Div,
    Shll,
    Shrl,
    Shra,
    And,
    Or,
    Xor,
    LogicalAnd,
    LogicalOr,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    /// `++`: bit concatenation or array concatenation depending on type.
    Concat,
}

impl BinopKind {
    pub fn as_symbol(self) -> &'static str {
        match self {
            BinopKind::Add => "+",
            BinopKind::Sub => "-",
            BinopKind::Mul => "*",
            BinopKind::Div => "/",
            BinopKind::Shll => "<<",
            BinopKind::Shrl => ">>",
            BinopKind::Shra => ">>>",
            BinopKind::And => "&",
            BinopKind::Or => "|",
            BinopKind::Xor => "^",
            BinopKind::LogicalAnd => "&&",
            BinopKind::LogicalOr => "||",
            BinopKind::Eq => "==",
            BinopKind::Ne => "!=",
            BinopKind::Lt => "<",
            BinopKind::Le => "<=",
            BinopKind::Gt => ">",
            BinopKind::Ge => ">=",
            BinopKind::Concat => "++",
        }
    }
}

// Name resolution results

/// What introduced a [`NodeKind::NameDef`].
///
/// The payload is the defining item (or parameter) node.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Definer {
    Function(NodeId),
    Constant(NodeId),
    TypeDef(NodeId),
    StructDef(NodeId),
    EnumDef(NodeId),
    Import(NodeId),
    Param(NodeId),
    ParametricBinding(NodeId),
    /// `let`, `match` arm or `for` binding inside a function body.
    Local,
}

/// Left-hand side of a `::` reference.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ColonSubject {
    /// `import_name::attr`: the payload is the `Import` item.
    Import(NodeId),
    /// `EnumName::Member`: the payload is the `EnumDef` item.
    Enum(NodeId),
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum IndexRhs {
    /// `a[i]`: array element or (constant) tuple index.
    Expr(NodeId),
    /// `x[start:limit]`: static bit slice; bounds are resolved by the type
    /// checker (see [`TypeInfo::slice_start_and_width`](crate::TypeInfo::slice_start_and_width)).
    Slice {
        start: Option<NodeId>,
        limit: Option<NodeId>,
    },
    /// `x[start +: uN]`: dynamic start, width taken from the result type.
    WidthSlice { start: NodeId },
}

/// Leaf of a binding/match pattern.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PatternLeaf {
    /// Binds the matched value to a fresh name.
    NameDef(NodeId),
    /// `_`
    Wildcard,
    /// Literal comparison.
    Number(NodeId),
    /// Equality against an existing binding.
    NameRef(NodeId),
    /// Equality against an enum member or imported constant.
    ColonRef(NodeId),
}

/// Binding pattern: a leaf or a tuple of nested pattern nodes.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum NameDefTree {
    Leaf(PatternLeaf),
    /// Children are `NodeKind::NameDefTree` nodes.
    Tuple(Vec<NodeId>),
}

impl NameDefTree {
    #[inline]
    pub fn is_leaf(&self) -> bool {
        matches!(self, NameDefTree::Leaf(_))
    }

    /// Wildcards and plain names match anything.
    pub fn is_irrefutable(&self) -> bool {
        matches!(
            self,
            NameDefTree::Leaf(PatternLeaf::Wildcard | PatternLeaf::NameDef(_))
        )
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MatchArm {
    /// Alternative patterns (`a | b => ...`), each a `NameDefTree` node.
    pub patterns: Vec<NodeId>,
    pub expr: NodeId,
    pub span: Span,
}

/// A function item.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Function {
    /// `NameDef` of the function identifier.
    pub name: NodeId,
    /// `Param` nodes in declaration order.
    pub params: Vec<NodeId>,
    /// `ParametricBinding` nodes in declaration order.
    pub parametric_bindings: Vec<NodeId>,
    pub body: NodeId,
    pub is_public: bool,
}

impl Function {
    #[inline]
    pub fn is_parametric(&self) -> bool {
        !self.parametric_bindings.is_empty()
    }
}

// Nodes

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum NodeKind {
    // Expressions
    Number {
        value: i128,
    },
    NameRef {
        identifier: String,
        def: NodeId,
    },
    /// Reference to a module-level constant.
    ConstRef {
        identifier: String,
        def: NodeId,
    },
    ColonRef {
        subject: ColonSubject,
        attr: String,
    },
    Unop {
        op: UnopKind,
        operand: NodeId,
    },
    Binop {
        op: BinopKind,
        lhs: NodeId,
        rhs: NodeId,
    },
    Ternary {
        test: NodeId,
        consequent: NodeId,
        alternate: NodeId,
    },
    Tuple {
        members: Vec<NodeId>,
    },
    Array {
        members: Vec<NodeId>,
        /// `[a, b, ...]` fills the remaining elements with the last member.
        has_ellipsis: bool,
    },
    Index {
        lhs: NodeId,
        rhs: IndexRhs,
    },
    Attr {
        lhs: NodeId,
        attr: String,
    },
    Cast {
        expr: NodeId,
    },
    StructInstance {
        struct_def: NodeId,
        members: Vec<(String, NodeId)>,
    },
    SplatStructInstance {
        struct_def: NodeId,
        members: Vec<(String, NodeId)>,
        splatted: NodeId,
    },
    Invocation {
        callee: NodeId,
        args: Vec<NodeId>,
    },
    /// `let pattern = rhs; body`
    Let {
        pattern: NodeId,
        rhs: NodeId,
        body: NodeId,
    },
    Match {
        matched: NodeId,
        arms: Vec<MatchArm>,
    },
    /// `for names in iterable { body }(init)`
    For {
        names: NodeId,
        iterable: NodeId,
        body: NodeId,
        init: NodeId,
    },

    // Definitions and patterns
    NameDef {
        identifier: String,
        definer: Definer,
    },
    BuiltinNameDef {
        identifier: String,
    },
    NameDefTree(NameDefTree),
    Param {
        name: NodeId,
    },
    ParametricBinding {
        name: NodeId,
    },

    // Module items
    Function(Function),
    Constant {
        name: NodeId,
        value: NodeId,
    },
    StructDef {
        name: NodeId,
        members: Vec<String>,
    },
    EnumDef {
        name: NodeId,
        values: Vec<(String, NodeId)>,
    },
    TypeDef {
        name: NodeId,
    },
    Import {
        name: NodeId,
        module: ModuleId,
    },
}

impl NodeKind {
    /// Short kind name for diagnostics and logging.
    pub fn name(&self) -> &'static str {
        match self {
            NodeKind::Number { .. } => "Number",
            NodeKind::NameRef { .. } => "NameRef",
            NodeKind::ConstRef { .. } => "ConstRef",
            NodeKind::ColonRef { .. } => "ColonRef",
            NodeKind::Unop { .. } => "Unop",
            NodeKind::Binop { .. } => "Binop",
            NodeKind::Ternary { .. } => "Ternary",
            NodeKind::Tuple { .. } => "Tuple",
            NodeKind::Array { .. } => "Array",
            NodeKind::Index { .. } => "Index",
            NodeKind::Attr { .. } => "Attr",
            NodeKind::Cast { .. } => "Cast",
            NodeKind::StructInstance { .. } => "StructInstance",
            NodeKind::SplatStructInstance { .. } => "SplatStructInstance",
            NodeKind::Invocation { .. } => "Invocation",
            NodeKind::Let { .. } => "Let",
            NodeKind::Match { .. } => "Match",
            NodeKind::For { .. } => "For",
            NodeKind::NameDef { .. } => "NameDef",
            NodeKind::BuiltinNameDef { .. } => "BuiltinNameDef",
            NodeKind::NameDefTree(_) => "NameDefTree",
            NodeKind::Param { .. } => "Param",
            NodeKind::ParametricBinding { .. } => "ParametricBinding",
            NodeKind::Function(_) => "Function",
            NodeKind::Constant { .. } => "Constant",
            NodeKind::StructDef { .. } => "StructDef",
            NodeKind::EnumDef { .. } => "EnumDef",
            NodeKind::TypeDef { .. } => "TypeDef",
            NodeKind::Import { .. } => "Import",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Node {
    pub kind: NodeKind,
    pub span: Span,
}

// Arena

/// Program-wide node storage.
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AstArena {
    nodes: Vec<Node>,
}

impl AstArena {
    pub fn new() -> Self {
        Self::default()
    }

    #[expect(
        clippy::cast_possible_truncation,
        reason = "node counts never exceed u32"
    )]
    pub fn alloc(&mut self, kind: NodeKind, span: Span) -> NodeId {
        let id = NodeId::new(self.nodes.len() as u32);
        self.nodes.push(Node { kind, span });
        id
    }

    /// Get a node by ID.
    ///
    /// # Panics
    /// Panics if `id` was not allocated by this arena.
    #[inline]
    pub fn get(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    #[inline]
    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.get(id).kind
    }

    #[inline]
    pub fn span(&self, id: NodeId) -> Span {
        self.get(id).span
    }

    pub(crate) fn get_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.index()]
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Identifier of a `NameDef`/`BuiltinNameDef` node, or of the `NameDef`
    /// a `Param`/`ParametricBinding`/item node names.
    pub fn identifier(&self, id: NodeId) -> Option<&str> {
        match self.kind(id) {
            NodeKind::NameDef { identifier, .. } | NodeKind::BuiltinNameDef { identifier } => {
                Some(identifier)
            }
            NodeKind::Param { name }
            | NodeKind::ParametricBinding { name }
            | NodeKind::Constant { name, .. }
            | NodeKind::StructDef { name, .. }
            | NodeKind::EnumDef { name, .. }
            | NodeKind::TypeDef { name }
            | NodeKind::Import { name, .. }
            | NodeKind::Function(Function { name, .. }) => self.identifier(*name),
            _ => None,
        }
    }

    pub fn definer(&self, name_def: NodeId) -> Option<Definer> {
        match self.kind(name_def) {
            NodeKind::NameDef { definer, .. } => Some(*definer),
            _ => None,
        }
    }

    pub fn function(&self, id: NodeId) -> Option<&Function> {
        match self.kind(id) {
            NodeKind::Function(f) => Some(f),
            _ => None,
        }
    }

    pub fn name_def_tree(&self, id: NodeId) -> Option<&NameDefTree> {
        match self.kind(id) {
            NodeKind::NameDefTree(tree) => Some(tree),
            _ => None,
        }
    }

    /// Direct children of `id` that are expressions or patterns, in source
    /// order. Item-level references (callee definitions, struct defs,
    /// import targets) are not children.
    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        match self.kind(id) {
            NodeKind::Number { .. }
            | NodeKind::NameRef { .. }
            | NodeKind::ConstRef { .. }
            | NodeKind::ColonRef { .. }
            | NodeKind::NameDef { .. }
            | NodeKind::BuiltinNameDef { .. }
            | NodeKind::StructDef { .. }
            | NodeKind::TypeDef { .. }
            | NodeKind::Import { .. } => Vec::new(),
            NodeKind::Unop { operand, .. } => vec![*operand],
            NodeKind::Binop { lhs, rhs, .. } => vec![*lhs, *rhs],
            NodeKind::Ternary {
                test,
                consequent,
                alternate,
            } => vec![*test, *consequent, *alternate],
            NodeKind::Tuple { members } | NodeKind::Array { members, .. } => members.clone(),
            NodeKind::Index { lhs, rhs } => {
                let mut out = vec![*lhs];
                match rhs {
                    IndexRhs::Expr(e) => out.push(*e),
                    IndexRhs::Slice { start, limit } => {
                        out.extend(start.iter().copied());
                        out.extend(limit.iter().copied());
                    }
                    IndexRhs::WidthSlice { start } => out.push(*start),
                }
                out
            }
            NodeKind::Attr { lhs, .. } => vec![*lhs],
            NodeKind::Cast { expr } => vec![*expr],
            NodeKind::StructInstance { members, .. } => members.iter().map(|(_, e)| *e).collect(),
            NodeKind::SplatStructInstance {
                members, splatted, ..
            } => {
                let mut out: Vec<NodeId> = members.iter().map(|(_, e)| *e).collect();
                out.push(*splatted);
                out
            }
            NodeKind::Invocation { callee, args } => {
                let mut out = vec![*callee];
                out.extend(args.iter().copied());
                out
            }
            NodeKind::Let { pattern, rhs, body } => vec![*pattern, *rhs, *body],
            NodeKind::Match { matched, arms } => {
                let mut out = vec![*matched];
                for arm in arms {
                    out.extend(arm.patterns.iter().copied());
                    out.push(arm.expr);
                }
                out
            }
            NodeKind::For {
                names,
                iterable,
                body,
                init,
            } => vec![*names, *iterable, *body, *init],
            NodeKind::NameDefTree(tree) => match tree {
                NameDefTree::Leaf(
                    PatternLeaf::NameDef(n)
                    | PatternLeaf::Number(n)
                    | PatternLeaf::NameRef(n)
                    | PatternLeaf::ColonRef(n),
                ) => vec![*n],
                NameDefTree::Leaf(PatternLeaf::Wildcard) => Vec::new(),
                NameDefTree::Tuple(nodes) => nodes.clone(),
            },
            NodeKind::Param { name } | NodeKind::ParametricBinding { name } => vec![*name],
            NodeKind::Function(f) => {
                let mut out = f.params.clone();
                out.extend(f.parametric_bindings.iter().copied());
                out.push(f.body);
                out
            }
            NodeKind::Constant { value, .. } => vec![*value],
            NodeKind::EnumDef { values, .. } => values.iter().map(|(_, e)| *e).collect(),
        }
    }
}

// Modules

/// One source module: an ordered list of items plus test bodies.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Module {
    /// Dotted module path, e.g. `std.bits`.
    pub name: String,
    /// Item nodes (`Function`, `Constant`, `StructDef`, `EnumDef`,
    /// `TypeDef`, `Import`) in declaration order.
    pub items: Vec<NodeId>,
    /// Bodies of test constructs. Never converted themselves, only walked
    /// for the functions they call.
    pub tests: Vec<NodeId>,
}

impl Module {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            items: Vec::new(),
            tests: Vec::new(),
        }
    }

    /// Function items in declaration order.
    pub fn functions<'a>(&'a self, arena: &'a AstArena) -> impl Iterator<Item = NodeId> + 'a {
        self.items
            .iter()
            .copied()
            .filter(|&item| matches!(arena.kind(item), NodeKind::Function(_)))
    }

    pub fn get_function(&self, arena: &AstArena, name: &str) -> Option<NodeId> {
        self.find_item(arena, name, |kind| matches!(kind, NodeKind::Function(_)))
    }

    pub fn get_constant(&self, arena: &AstArena, name: &str) -> Option<NodeId> {
        self.find_item(arena, name, |kind| matches!(kind, NodeKind::Constant { .. }))
    }

    fn find_item(
        &self,
        arena: &AstArena,
        name: &str,
        pred: impl Fn(&NodeKind) -> bool,
    ) -> Option<NodeId> {
        self.items
            .iter()
            .copied()
            .find(|&item| pred(arena.kind(item)) && arena.identifier(item) == Some(name))
    }
}

/// All modules of one compilation, sharing a single arena.
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Program {
    pub arena: AstArena,
    modules: Vec<Module>,
}

impl Program {
    pub fn new() -> Self {
        Self::default()
    }

    #[expect(
        clippy::cast_possible_truncation,
        reason = "module counts never exceed u32"
    )]
    pub fn add_module(&mut self, module: Module) -> ModuleId {
        let id = ModuleId::new(self.modules.len() as u32);
        self.modules.push(module);
        id
    }

    /// # Panics
    /// Panics if `id` was not returned by [`add_module`](Self::add_module).
    #[inline]
    pub fn module(&self, id: ModuleId) -> &Module {
        &self.modules[id.index()]
    }

    pub(crate) fn module_mut(&mut self, id: ModuleId) -> &mut Module {
        &mut self.modules[id.index()]
    }

    pub fn modules(&self) -> impl Iterator<Item = (ModuleId, &Module)> {
        self.modules
            .iter()
            .enumerate()
            .map(|(i, m)| (ModuleId::new(u32::try_from(i).unwrap_or(u32::MAX)), m))
    }

    /// Module that owns `item` as a top-level item.
    pub fn owning_module(&self, item: NodeId) -> Option<ModuleId> {
        self.modules()
            .find(|(_, m)| m.items.contains(&item))
            .map(|(id, _)| id)
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "module {}", self.name)
    }
}
