//! Programmatic AST construction.
//!
//! [`ProgramBuilder`] is what a front end (or a test) uses to produce a
//! resolved, typed [`Program`]: it allocates nodes, wires `NameRef`s to their
//! definitions, patches [`Definer`]s once the defining item exists, and
//! records node types into the accompanying [`TypeInfo`].
//!
//! Every node gets a distinct synthetic span unless one is set explicitly
//! with [`ProgramBuilder::set_span`].

use rustc_hash::FxHashMap;

use crate::{
    BinopKind, ColonSubject, ConcreteType, Definer, Function, IndexRhs, MatchArm, Module,
    ModuleId, NameDefTree, NodeId, NodeKind, PatternLeaf, Program, Span, SymbolicBindings,
    TypeInfo, UnopKind,
};

/// Function under construction: parameters are allocated before the body so
/// the body can reference them.
#[derive(Debug)]
pub struct FunctionDraft {
    name: NodeId,
    params: Vec<NodeId>,
    parametric_bindings: Vec<NodeId>,
    is_public: bool,
}

impl FunctionDraft {
    /// `NameDef` of the function identifier.
    pub fn name(&self) -> NodeId {
        self.name
    }
}

#[derive(Debug, Default)]
pub struct ProgramBuilder {
    program: Program,
    type_info: TypeInfo,
    builtins: FxHashMap<String, NodeId>,
    next_offset: u32,
}

impl ProgramBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn finish(self) -> (Program, TypeInfo) {
        (self.program, self.type_info)
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    pub fn type_info_mut(&mut self) -> &mut TypeInfo {
        &mut self.type_info
    }

    pub fn module(&mut self, name: impl Into<String>) -> ModuleId {
        self.program.add_module(Module::new(name))
    }

    pub fn set_span(&mut self, node: NodeId, span: Span) {
        self.program.arena.get_mut(node).span = span;
    }

    pub fn set_type(&mut self, node: NodeId, ty: ConcreteType) {
        self.type_info.set_type(node, ty);
    }

    /// Record the callee bindings of a parametric call site.
    pub fn bind_invocation(
        &mut self,
        invocation: NodeId,
        caller: SymbolicBindings,
        callee: SymbolicBindings,
    ) {
        self.type_info
            .add_invocation_bindings(invocation, caller, callee);
    }

    fn alloc(&mut self, kind: NodeKind) -> NodeId {
        let start = self.next_offset;
        self.next_offset += 4;
        self.program.arena.alloc(kind, Span::new(start, start + 3))
    }

    fn alloc_typed(&mut self, kind: NodeKind, ty: Option<ConcreteType>) -> NodeId {
        let id = self.alloc(kind);
        if let Some(ty) = ty {
            self.type_info.set_type(id, ty);
        }
        id
    }

    fn name_def(&mut self, identifier: &str, definer: Definer, ty: Option<ConcreteType>) -> NodeId {
        self.alloc_typed(
            NodeKind::NameDef {
                identifier: identifier.to_string(),
                definer,
            },
            ty,
        )
    }

    fn patch_definer(&mut self, name_def: NodeId, new_definer: Definer) {
        if let NodeKind::NameDef { definer, .. } = &mut self.program.arena.get_mut(name_def).kind {
            *definer = new_definer;
        }
    }

    // Functions

    pub fn begin_function(&mut self, identifier: &str) -> FunctionDraft {
        let name = self.name_def(identifier, Definer::Local, None);
        FunctionDraft {
            name,
            params: Vec::new(),
            parametric_bindings: Vec::new(),
            is_public: false,
        }
    }

    /// Add a parameter; returns its `NameDef`.
    pub fn param(&mut self, draft: &mut FunctionDraft, identifier: &str, ty: ConcreteType) -> NodeId {
        let name = self.name_def(identifier, Definer::Local, Some(ty.clone()));
        let param = self.alloc_typed(NodeKind::Param { name }, Some(ty));
        self.patch_definer(name, Definer::Param(param));
        draft.params.push(param);
        name
    }

    /// Add a parametric binding with its declared bit-width type; returns
    /// its `NameDef`.
    pub fn parametric(
        &mut self,
        draft: &mut FunctionDraft,
        identifier: &str,
        ty: ConcreteType,
    ) -> NodeId {
        let name = self.name_def(identifier, Definer::Local, Some(ty.clone()));
        let binding = self.alloc_typed(NodeKind::ParametricBinding { name }, Some(ty));
        self.patch_definer(name, Definer::ParametricBinding(binding));
        draft.parametric_bindings.push(binding);
        name
    }

    pub fn make_public(&mut self, draft: &mut FunctionDraft) {
        draft.is_public = true;
    }

    /// Allocate the `Function` item and append it to `module`.
    pub fn finish_function(&mut self, module: ModuleId, draft: FunctionDraft, body: NodeId) -> NodeId {
        let name = draft.name;
        let item = self.alloc(NodeKind::Function(Function {
            name,
            params: draft.params,
            parametric_bindings: draft.parametric_bindings,
            body,
            is_public: draft.is_public,
        }));
        self.patch_definer(name, Definer::Function(item));
        self.program.module_mut(module).items.push(item);
        item
    }

    // Other module items

    pub fn constant(
        &mut self,
        module: ModuleId,
        identifier: &str,
        value: NodeId,
        ty: ConcreteType,
    ) -> (NodeId, NodeId) {
        let name = self.name_def(identifier, Definer::Local, Some(ty.clone()));
        let item = self.alloc_typed(NodeKind::Constant { name, value }, Some(ty));
        self.patch_definer(name, Definer::Constant(item));
        self.program.module_mut(module).items.push(item);
        (item, name)
    }

    pub fn struct_def(&mut self, module: ModuleId, identifier: &str, members: &[&str]) -> NodeId {
        let name = self.name_def(identifier, Definer::Local, None);
        let item = self.alloc(NodeKind::StructDef {
            name,
            members: members.iter().map(ToString::to_string).collect(),
        });
        self.patch_definer(name, Definer::StructDef(item));
        self.program.module_mut(module).items.push(item);
        item
    }

    pub fn enum_def(
        &mut self,
        module: ModuleId,
        identifier: &str,
        values: Vec<(String, NodeId)>,
    ) -> NodeId {
        let name = self.name_def(identifier, Definer::Local, None);
        let item = self.alloc(NodeKind::EnumDef { name, values });
        self.patch_definer(name, Definer::EnumDef(item));
        self.program.module_mut(module).items.push(item);
        item
    }

    pub fn type_def(&mut self, module: ModuleId, identifier: &str) -> NodeId {
        let name = self.name_def(identifier, Definer::Local, None);
        let item = self.alloc(NodeKind::TypeDef { name });
        self.patch_definer(name, Definer::TypeDef(item));
        self.program.module_mut(module).items.push(item);
        item
    }

    pub fn import(&mut self, module: ModuleId, identifier: &str, target: ModuleId) -> NodeId {
        let name = self.name_def(identifier, Definer::Local, None);
        let item = self.alloc(NodeKind::Import {
            name,
            module: target,
        });
        self.patch_definer(name, Definer::Import(item));
        self.program.module_mut(module).items.push(item);
        item
    }

    pub fn add_test(&mut self, module: ModuleId, body: NodeId) {
        self.program.module_mut(module).tests.push(body);
    }

    // Expressions

    pub fn number(&mut self, value: i128, ty: ConcreteType) -> NodeId {
        self.alloc_typed(NodeKind::Number { value }, Some(ty))
    }

    /// Reference to `def`; inherits the definition's type when known.
    pub fn name_ref(&mut self, def: NodeId) -> NodeId {
        let identifier = self
            .program
            .arena
            .identifier(def)
            .unwrap_or_default()
            .to_string();
        let ty = self.type_info.get_type(def).cloned();
        self.alloc_typed(NodeKind::NameRef { identifier, def }, ty)
    }

    pub fn const_ref(&mut self, def: NodeId) -> NodeId {
        let identifier = self
            .program
            .arena
            .identifier(def)
            .unwrap_or_default()
            .to_string();
        let ty = self.type_info.get_type(def).cloned();
        self.alloc_typed(NodeKind::ConstRef { identifier, def }, ty)
    }

    pub fn colon_ref(&mut self, subject: ColonSubject, attr: &str, ty: Option<ConcreteType>) -> NodeId {
        self.alloc_typed(
            NodeKind::ColonRef {
                subject,
                attr: attr.to_string(),
            },
            ty,
        )
    }

    /// Shared `BuiltinNameDef` for `identifier`.
    pub fn builtin(&mut self, identifier: &str) -> NodeId {
        if let Some(&def) = self.builtins.get(identifier) {
            return def;
        }
        let def = self.alloc(NodeKind::BuiltinNameDef {
            identifier: identifier.to_string(),
        });
        self.builtins.insert(identifier.to_string(), def);
        def
    }

    pub fn unop(&mut self, op: UnopKind, operand: NodeId, ty: ConcreteType) -> NodeId {
        self.alloc_typed(NodeKind::Unop { op, operand }, Some(ty))
    }

    pub fn binop(&mut self, op: BinopKind, lhs: NodeId, rhs: NodeId, ty: ConcreteType) -> NodeId {
        self.alloc_typed(NodeKind::Binop { op, lhs, rhs }, Some(ty))
    }

    pub fn ternary(
        &mut self,
        test: NodeId,
        consequent: NodeId,
        alternate: NodeId,
        ty: ConcreteType,
    ) -> NodeId {
        self.alloc_typed(
            NodeKind::Ternary {
                test,
                consequent,
                alternate,
            },
            Some(ty),
        )
    }

    pub fn tuple(&mut self, members: Vec<NodeId>, ty: ConcreteType) -> NodeId {
        self.alloc_typed(NodeKind::Tuple { members }, Some(ty))
    }

    pub fn array(&mut self, members: Vec<NodeId>, has_ellipsis: bool, ty: ConcreteType) -> NodeId {
        self.alloc_typed(
            NodeKind::Array {
                members,
                has_ellipsis,
            },
            Some(ty),
        )
    }

    pub fn index(&mut self, lhs: NodeId, rhs: IndexRhs, ty: ConcreteType) -> NodeId {
        self.alloc_typed(NodeKind::Index { lhs, rhs }, Some(ty))
    }

    pub fn attr(&mut self, lhs: NodeId, attr: &str, ty: ConcreteType) -> NodeId {
        self.alloc_typed(
            NodeKind::Attr {
                lhs,
                attr: attr.to_string(),
            },
            Some(ty),
        )
    }

    pub fn cast(&mut self, expr: NodeId, ty: ConcreteType) -> NodeId {
        self.alloc_typed(NodeKind::Cast { expr }, Some(ty))
    }

    pub fn struct_instance(
        &mut self,
        struct_def: NodeId,
        members: Vec<(String, NodeId)>,
        ty: ConcreteType,
    ) -> NodeId {
        self.alloc_typed(NodeKind::StructInstance { struct_def, members }, Some(ty))
    }

    pub fn splat_struct_instance(
        &mut self,
        struct_def: NodeId,
        members: Vec<(String, NodeId)>,
        splatted: NodeId,
        ty: ConcreteType,
    ) -> NodeId {
        self.alloc_typed(
            NodeKind::SplatStructInstance {
                struct_def,
                members,
                splatted,
            },
            Some(ty),
        )
    }

    /// Call of the function or builtin defined by `callee_def`.
    pub fn invoke(&mut self, callee_def: NodeId, args: Vec<NodeId>, ty: Option<ConcreteType>) -> NodeId {
        let callee = self.name_ref(callee_def);
        self.alloc_typed(NodeKind::Invocation { callee, args }, ty)
    }

    /// Call through an arbitrary callee expression (e.g. a `ColonRef`).
    pub fn invoke_expr(&mut self, callee: NodeId, args: Vec<NodeId>, ty: Option<ConcreteType>) -> NodeId {
        self.alloc_typed(NodeKind::Invocation { callee, args }, ty)
    }

    pub fn invoke_builtin(&mut self, name: &str, args: Vec<NodeId>, ty: Option<ConcreteType>) -> NodeId {
        let def = self.builtin(name);
        self.invoke(def, args, ty)
    }

    pub fn let_(&mut self, pattern: NodeId, rhs: NodeId, body: NodeId) -> NodeId {
        let ty = self.type_info.get_type(body).cloned();
        self.alloc_typed(NodeKind::Let { pattern, rhs, body }, ty)
    }

    pub fn match_(&mut self, matched: NodeId, arms: Vec<(Vec<NodeId>, NodeId)>, ty: ConcreteType) -> NodeId {
        let arms = arms
            .into_iter()
            .map(|(patterns, expr)| MatchArm {
                patterns,
                span: self.program.arena.span(expr),
                expr,
            })
            .collect();
        self.alloc_typed(NodeKind::Match { matched, arms }, Some(ty))
    }

    pub fn for_loop(
        &mut self,
        names: NodeId,
        iterable: NodeId,
        body: NodeId,
        init: NodeId,
        ty: ConcreteType,
    ) -> NodeId {
        self.alloc_typed(
            NodeKind::For {
                names,
                iterable,
                body,
                init,
            },
            Some(ty),
        )
    }

    // Patterns

    /// Leaf pattern binding a fresh local name; returns `(tree, name_def)`.
    pub fn bind(&mut self, identifier: &str, ty: ConcreteType) -> (NodeId, NodeId) {
        let name = self.name_def(identifier, Definer::Local, Some(ty.clone()));
        let tree = self.alloc_typed(
            NodeKind::NameDefTree(NameDefTree::Leaf(PatternLeaf::NameDef(name))),
            Some(ty),
        );
        (tree, name)
    }

    pub fn wildcard(&mut self) -> NodeId {
        self.alloc(NodeKind::NameDefTree(NameDefTree::Leaf(PatternLeaf::Wildcard)))
    }

    pub fn pattern_leaf(&mut self, leaf: PatternLeaf) -> NodeId {
        self.alloc(NodeKind::NameDefTree(NameDefTree::Leaf(leaf)))
    }

    pub fn tuple_pattern(&mut self, children: Vec<NodeId>, ty: ConcreteType) -> NodeId {
        self.alloc_typed(NodeKind::NameDefTree(NameDefTree::Tuple(children)), Some(ty))
    }
}
