//! Constraint-based type inference
//!
//! Inference runs in three phases per unit. **Generate** walks the AST once,
//! assigning fixed types to literals, threading one shared inference
//! variable through every use of an un-annotated symbol, and emitting
//! constraints for everything else. **Solve** iterates the live constraint
//! list to a fixed point: each pass attempts every constraint, removes the
//! solved and failed ones (order-independent swap-removal), and stops when a
//! full pass removes nothing. **Assign** follows binding chains to a fixed
//! point and writes resolved types back onto nodes and symbols,
//! deep-substituting through compound types.
//!
//! Blocking on an unresolved variable is not an error — the constraint
//! defers to a later pass. Genuine mistakes are recorded as diagnostics and
//! never thrown, so one run reports every problem in the unit.

use crate::ast::{
    AstStore, BinaryOp, LiteralValue, MatchArm, NodeId, NodeKind, PatternKind, StrId, TypeExpr,
    UnaryOp, Unit,
};
use crate::common::{SemaError, SemaResult, Span};
use crate::sema::diagnostics::{Diagnostic, DiagnosticCode, FileSpan};
use crate::sema::exhaustive::{self, Pattern, PatternLiteral};
use crate::sema::scope::{Symbol, SymbolId, SymbolKind, SymbolTable, Visibility};
use crate::sema::types::{
    InferVarId, PrimitiveKind, TypeId, TypeIdVec, TypeKind, TypeRegistry,
};
use std::collections::HashMap;
use tracing::{debug, trace};

/// Chain-following guard: binding chains longer than this (or cyclic ones)
/// resolve to the unresolved sentinel instead of recursing forever
const MAX_CHAIN: usize = 64;

/// Depth guard for substitution through compound types
const MAX_SUBST_DEPTH: usize = 64;

/// A type relation awaiting resolution
///
/// Generated while walking the AST, consumed destructively by the solver.
#[derive(Debug, Clone)]
pub enum Constraint {
    /// The two types must unify
    Equality { lhs: TypeId, rhs: TypeId, span: Span },
    /// A value of `sub` must be able to flow into a location of `sup`
    Subtype { sub: TypeId, sup: TypeId, span: Span },
    /// `callee` applied to `args` yields `result`
    FunctionCall {
        callee: TypeId,
        args: TypeIdVec,
        result: TypeId,
        span: Span,
    },
    /// `array[index]` yields `element`
    ArrayAccess {
        array: TypeId,
        index: TypeId,
        element: TypeId,
        span: Span,
    },
    /// `base.name` yields `field`
    FieldAccess {
        base: TypeId,
        name: StrId,
        field: TypeId,
        span: Span,
    },
    /// The type must be numeric (defaults to i32 while unresolved)
    Numeric { ty: TypeId, span: Span },
    /// The type must support ordering comparisons
    Comparable { ty: TypeId, span: Span },
    /// Iterating `collection` yields `element`
    Iterable {
        collection: TypeId,
        element: TypeId,
        span: Span,
    },
}

impl Constraint {
    fn span(&self) -> Span {
        match self {
            Self::Equality { span, .. }
            | Self::Subtype { span, .. }
            | Self::FunctionCall { span, .. }
            | Self::ArrayAccess { span, .. }
            | Self::FieldAccess { span, .. }
            | Self::Numeric { span, .. }
            | Self::Comparable { span, .. }
            | Self::Iterable { span, .. } => *span,
        }
    }
}

/// Tri-state result of one solve attempt
enum Outcome {
    /// Resolved; remove the constraint
    Solved,
    /// Principal type still an unresolved variable; keep for a later pass
    Deferred,
    /// Genuine mistake; record the diagnostic and remove the constraint
    Failed(Diagnostic),
}

/// The inference-variable binding table
///
/// Directional, first-writer-binds: a variable is bound exactly once, to a
/// concrete type or to another variable. Unification is confluent under this
/// rule, so final bindings do not depend on solve order.
#[derive(Debug, Default)]
pub struct Bindings {
    slots: Vec<Option<TypeId>>,
}

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh unbound variable and return its placeholder type
    pub fn fresh(&mut self, registry: &mut TypeRegistry) -> TypeId {
        let var = InferVarId(self.slots.len() as u32);
        self.slots.push(None);
        registry.inference_var(var)
    }

    /// Bind a variable. Callers resolve first, so the slot is always empty;
    /// a filled slot here is a broken first-writer invariant.
    pub fn bind(&mut self, var: InferVarId, to: TypeId) {
        debug_assert!(
            self.slots[var.index()].is_none(),
            "inference variable bound twice"
        );
        self.slots[var.index()] = Some(to);
    }

    /// Follow a binding chain to its end, stopping at the first unbound
    /// variable (the unresolved sentinel). Bounded: a cyclic or over-deep
    /// chain yields whatever variable the walk stopped on, which callers
    /// treat as unresolved.
    pub fn resolve(&self, registry: &TypeRegistry, ty: TypeId) -> TypeId {
        let mut current = ty;
        for _ in 0..MAX_CHAIN {
            match registry.is_inference_var(current) {
                Some(var) => match self.slots[var.index()] {
                    Some(next) => current = next,
                    None => return current,
                },
                None => return current,
            }
        }
        current
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

/// What inference leaves behind for the validator and for hover
#[derive(Debug, Default)]
pub struct InferenceOutput {
    /// Resolved type of every walked node
    pub node_types: HashMap<NodeId, TypeId>,
    /// Symbol each identifier node resolved to
    pub resolutions: HashMap<NodeId, SymbolId>,
}

/// A match whose exhaustiveness check waits for the scrutinee to resolve
#[derive(Debug)]
struct PendingMatch {
    scrutinee: TypeId,
    patterns: Vec<Pattern>,
    span: Span,
}

/// The constraint-generation and solving engine for one unit
pub struct InferenceEngine<'a> {
    ast: &'a AstStore,
    unit: &'a Unit,
    registry: &'a mut TypeRegistry,
    symbols: &'a mut SymbolTable,
    diagnostics: &'a mut Vec<Diagnostic>,
    constraints: Vec<Constraint>,
    bindings: Bindings,
    node_types: HashMap<NodeId, TypeId>,
    resolutions: HashMap<NodeId, SymbolId>,
    fn_signatures: HashMap<NodeId, (TypeIdVec, TypeId)>,
    pending_matches: Vec<PendingMatch>,
    current_return: Option<TypeId>,
    max_passes: usize,
}

impl<'a> InferenceEngine<'a> {
    pub fn new(
        ast: &'a AstStore,
        unit: &'a Unit,
        registry: &'a mut TypeRegistry,
        symbols: &'a mut SymbolTable,
        diagnostics: &'a mut Vec<Diagnostic>,
        max_passes: usize,
    ) -> Self {
        Self {
            ast,
            unit,
            registry,
            symbols,
            diagnostics,
            constraints: Vec::new(),
            bindings: Bindings::new(),
            node_types: HashMap::new(),
            resolutions: HashMap::new(),
            fn_signatures: HashMap::new(),
            pending_matches: Vec::new(),
            current_return: None,
            max_passes,
        }
    }

    /// Run all three phases and hand back the per-node results
    pub fn run(mut self) -> SemaResult<InferenceOutput> {
        self.declare_roots()?;
        for root in self.unit.roots() {
            self.generate(*root)?;
        }
        debug!(
            constraints = self.constraints.len(),
            variables = self.bindings.len(),
            "constraint generation complete"
        );
        self.solve();
        self.assign();
        Ok(InferenceOutput {
            node_types: self.node_types,
            resolutions: self.resolutions,
        })
    }

    fn file_span(&self, span: Span) -> FileSpan {
        FileSpan::of(self.unit, span)
    }

    fn report(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    // ==================== Declarations ====================

    /// Register unit-level type declarations and function signatures so
    /// bodies can refer to them regardless of declaration order
    fn declare_roots(&mut self) -> SemaResult<()> {
        for root in self.unit.roots() {
            let node = self.unit.node(*root);
            match node.kind.clone() {
                NodeKind::StructDecl { name, fields, .. } => {
                    let mut resolved = Vec::with_capacity(fields.len());
                    for field in &fields {
                        let ty = self.resolve_type_expr(&field.ty, field.span);
                        resolved.push((field.name, ty));
                    }
                    let ty = self.registry.struct_type(name, &resolved);
                    self.declare_type_name(name, ty, node.span);
                }
                NodeKind::EnumDecl { name, variants, .. } => {
                    let tags: Vec<StrId> = variants.iter().map(|v| v.name).collect();
                    let ty = self.registry.enum_type(name, &tags);
                    self.declare_type_name(name, ty, node.span);
                }
                NodeKind::Function { .. } => {
                    self.declare_function(*root)?;
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn declare_type_name(&mut self, name: StrId, ty: TypeId, span: Span) {
        if self.symbols.define_type(name, ty).is_err() {
            let name = self.ast.resolve(name).to_string();
            let diag = Diagnostic::new(
                DiagnosticCode::DuplicateDefinition,
                format!("type '{name}' is already defined in this scope"),
                self.file_span(span),
            );
            self.report(diag);
        }
    }

    /// Build a function's signature and register its symbol. Unannotated
    /// parameters become fresh inference variables; an omitted return type
    /// means void.
    fn declare_function(&mut self, id: NodeId) -> SemaResult<()> {
        let node = self.unit.node(id);
        let NodeKind::Function {
            name,
            public,
            params,
            return_type,
            ..
        } = node.kind.clone()
        else {
            return Err(SemaError::invalid_ast("expected function node", node.span));
        };

        let mut param_types = TypeIdVec::new();
        for param in &params {
            let ty = match &param.ty {
                Some(annotation) => self.resolve_type_expr(annotation, param.span),
                None => self.bindings.fresh(self.registry),
            };
            param_types.push(ty);
        }
        let ret = match &return_type {
            Some(annotation) => self.resolve_type_expr(annotation, node.span),
            None => self.registry.void(),
        };
        let fn_ty = self.registry.function_type(param_types.clone(), ret);
        self.fn_signatures.insert(id, (param_types, ret));
        self.node_types.insert(id, fn_ty);

        let symbol = Symbol {
            name,
            kind: SymbolKind::Function,
            ty: Some(fn_ty),
            declaration_span: node.span,
            scope: self.symbols.current_scope(),
            visibility: if public {
                Visibility::Public
            } else {
                Visibility::Private
            },
            mutable: false,
            has_initializer: true,
        };
        let span = node.span;
        match self.symbols.define(symbol) {
            Ok(symbol_id) => {
                self.resolutions.insert(id, symbol_id);
            }
            Err(existing) => self.report_duplicate(name, span, existing),
        }
        Ok(())
    }

    fn report_duplicate(&mut self, name: StrId, span: Span, existing: SymbolId) {
        let previous = self.symbols.symbol(existing).declaration_span;
        let name = self.ast.resolve(name).to_string();
        let diag = Diagnostic::new(
            DiagnosticCode::DuplicateDefinition,
            format!("'{name}' is already defined in this scope"),
            self.file_span(span),
        )
        .with_secondary(self.file_span(previous), "previous definition here");
        self.report(diag);
    }

    // ==================== Type annotations ====================

    /// Resolve a syntactic annotation to a canonical type. Unknown names are
    /// recorded and replaced by a fresh variable so analysis continues.
    fn resolve_type_expr(&mut self, expr: &TypeExpr, span: Span) -> TypeId {
        match expr {
            TypeExpr::Named(name) => {
                let text = self.ast.resolve(*name);
                if let Some(primitive) = PrimitiveKind::from_name(text) {
                    return self.registry.primitive(primitive);
                }
                if let Some(ty) = self.symbols.resolve_type(self.symbols.current_scope(), *name) {
                    return ty;
                }
                let text = text.to_string();
                let diag = Diagnostic::new(
                    DiagnosticCode::UndefinedSymbol,
                    format!("unknown type '{text}'"),
                    self.file_span(span),
                );
                self.report(diag);
                self.bindings.fresh(self.registry)
            }
            TypeExpr::Pointer(pointee) => {
                let pointee = self.resolve_type_expr(pointee, span);
                self.registry.pointer_type(pointee)
            }
            TypeExpr::Array { element, len } => {
                let element = self.resolve_type_expr(element, span);
                self.registry.array_type(element, *len)
            }
            TypeExpr::Slice(element) => {
                let element = self.resolve_type_expr(element, span);
                self.registry.slice_type(element)
            }
            TypeExpr::Optional(payload) => {
                let payload = self.resolve_type_expr(payload, span);
                self.registry.optional_type(payload)
            }
            TypeExpr::Range(element) => {
                let element = self.resolve_type_expr(element, span);
                self.registry.range_type(element)
            }
            TypeExpr::Function { params, ret } => {
                let params: TypeIdVec = params
                    .iter()
                    .map(|p| self.resolve_type_expr(p, span))
                    .collect();
                let ret = self.resolve_type_expr(ret, span);
                self.registry.function_type(params, ret)
            }
            TypeExpr::Tensor {
                element,
                dims,
                space,
            } => {
                let element = self.resolve_type_expr(element, span);
                self.registry.tensor_type(element, dims, *space)
            }
            TypeExpr::Allocator => self.registry.allocator_type(),
            TypeExpr::ContextBound(name) => self.registry.context_bound_type(*name),
        }
    }

    // ==================== Constraint generation ====================

    fn constrain(&mut self, constraint: Constraint) {
        self.constraints.push(constraint);
    }

    /// Walk one node, record its type, and emit its constraints
    fn generate(&mut self, id: NodeId) -> SemaResult<TypeId> {
        let node = self.unit.node(id);
        let span = node.span;
        let ty = match node.kind.clone() {
            // Literals bind fixed primitives directly
            NodeKind::IntLiteral(_) => self.registry.i32(),
            NodeKind::FloatLiteral(_) => self.registry.f64(),
            NodeKind::BoolLiteral(_) => self.registry.bool(),
            NodeKind::StringLiteral(_) => self.registry.string(),

            NodeKind::Identifier(name) => self.generate_identifier(id, name, span),

            NodeKind::Binary { op, lhs, rhs } => {
                let lhs_ty = self.generate(lhs)?;
                let rhs_ty = self.generate(rhs)?;
                self.generate_binary(op, lhs_ty, rhs_ty, span)
            }
            NodeKind::Unary { op, operand } => {
                let operand_ty = self.generate(operand)?;
                self.generate_unary(op, operand_ty, span)
            }

            NodeKind::Call { callee, args } => {
                let callee_ty = self.generate(callee)?;
                let mut arg_types = TypeIdVec::new();
                for arg in &args {
                    arg_types.push(self.generate(*arg)?);
                }
                let result = self.bindings.fresh(self.registry);
                self.constrain(Constraint::FunctionCall {
                    callee: callee_ty,
                    args: arg_types,
                    result,
                    span,
                });
                result
            }
            NodeKind::Index { base, index } => {
                let base_ty = self.generate(base)?;
                let index_ty = self.generate(index)?;
                let element = self.bindings.fresh(self.registry);
                self.constrain(Constraint::ArrayAccess {
                    array: base_ty,
                    index: index_ty,
                    element,
                    span,
                });
                element
            }
            NodeKind::Field { base, name } => {
                let base_ty = self.generate(base)?;
                let field = self.bindings.fresh(self.registry);
                self.constrain(Constraint::FieldAccess {
                    base: base_ty,
                    name,
                    field,
                    span,
                });
                field
            }

            // Every element unifies into one fresh common variable, so
            // heterogeneous-looking literals with compatible widenings
            // still type-check
            NodeKind::ArrayLiteral { elements } => {
                let element = self.bindings.fresh(self.registry);
                for e in &elements {
                    let e_ty = self.generate(*e)?;
                    let e_span = self.unit.node(*e).span;
                    self.constrain(Constraint::Equality {
                        lhs: element,
                        rhs: e_ty,
                        span: e_span,
                    });
                }
                self.registry.array_type(element, elements.len() as u64)
            }

            NodeKind::Let {
                name,
                mutable,
                annotation,
                init,
            } => {
                self.generate_let(id, name, mutable, annotation.as_ref(), init, span)?;
                self.registry.void()
            }
            NodeKind::Assign { target, value } => {
                let target_ty = self.generate(target)?;
                let value_ty = self.generate(value)?;
                self.constrain(Constraint::Subtype {
                    sub: value_ty,
                    sup: target_ty,
                    span,
                });
                self.registry.void()
            }

            NodeKind::Block { stmts } => {
                self.symbols.push_scope();
                for stmt in &stmts {
                    self.generate(*stmt)?;
                }
                self.pop_scope(span)?;
                self.registry.void()
            }
            NodeKind::If {
                condition,
                then_block,
                else_block,
            } => {
                let cond_ty = self.generate(condition)?;
                let bool_ty = self.registry.bool();
                let cond_span = self.unit.node(condition).span;
                self.constrain(Constraint::Equality {
                    lhs: cond_ty,
                    rhs: bool_ty,
                    span: cond_span,
                });
                self.generate(then_block)?;
                if let Some(else_block) = else_block {
                    self.generate(else_block)?;
                }
                self.registry.void()
            }
            NodeKind::While { condition, body } => {
                let cond_ty = self.generate(condition)?;
                let bool_ty = self.registry.bool();
                let cond_span = self.unit.node(condition).span;
                self.constrain(Constraint::Equality {
                    lhs: cond_ty,
                    rhs: bool_ty,
                    span: cond_span,
                });
                self.generate(body)?;
                self.registry.void()
            }
            NodeKind::For {
                binding,
                iterable,
                body,
            } => {
                let collection = self.generate(iterable)?;
                let element = self.bindings.fresh(self.registry);
                let iter_span = self.unit.node(iterable).span;
                self.constrain(Constraint::Iterable {
                    collection,
                    element,
                    span: iter_span,
                });

                self.symbols.push_scope();
                let symbol = Symbol {
                    name: binding,
                    kind: SymbolKind::Variable,
                    ty: Some(element),
                    declaration_span: span,
                    scope: self.symbols.current_scope(),
                    visibility: Visibility::Private,
                    mutable: false,
                    has_initializer: true,
                };
                match self.symbols.define(symbol) {
                    Ok(symbol_id) => {
                        self.resolutions.insert(id, symbol_id);
                    }
                    Err(existing) => self.report_duplicate(binding, span, existing),
                }
                self.generate(body)?;
                self.pop_scope(span)?;
                self.registry.void()
            }

            NodeKind::Match { scrutinee, arms } => {
                self.generate_match(scrutinee, &arms, span)?;
                self.registry.void()
            }
            NodeKind::Pattern(_) => {
                return Err(SemaError::invalid_ast(
                    "pattern node outside a match arm",
                    span,
                ));
            }

            NodeKind::Return { value } => {
                if let Some(value) = value {
                    let value_ty = self.generate(value)?;
                    if let Some(expected) = self.current_return {
                        self.constrain(Constraint::Subtype {
                            sub: value_ty,
                            sup: expected,
                            span,
                        });
                    }
                }
                self.registry.never()
            }
            NodeKind::Break | NodeKind::Continue => self.registry.never(),

            NodeKind::Function { .. } => {
                self.generate_function(id)?;
                // signature was recorded during declaration
                self.node_types[&id]
            }

            // Registered during declare_roots; nothing to walk
            NodeKind::StructDecl { .. } | NodeKind::EnumDecl { .. } => self.registry.void(),
        };

        self.node_types.insert(id, ty);
        Ok(ty)
    }

    fn generate_identifier(&mut self, id: NodeId, name: StrId, span: Span) -> TypeId {
        let scope = self.symbols.current_scope();
        match self.symbols.resolve(scope, name) {
            Some(symbol_id) => {
                self.resolutions.insert(id, symbol_id);
                // first encounter mints the symbol's shared variable; every
                // later use converges on it
                match self.symbols.symbol(symbol_id).ty {
                    Some(ty) => ty,
                    None => {
                        let var = self.bindings.fresh(self.registry);
                        self.symbols.symbol_mut(symbol_id).ty = Some(var);
                        var
                    }
                }
            }
            None => {
                let wanted = self.ast.resolve(name).to_string();
                let mut diag = Diagnostic::new(
                    DiagnosticCode::UndefinedSymbol,
                    format!("undefined symbol '{wanted}'"),
                    self.file_span(span),
                );
                for (candidate, confidence) in
                    self.symbols.suggest(scope, &wanted, self.ast.interner())
                {
                    diag = diag.with_suggestion(
                        format!("did you mean '{candidate}'?"),
                        confidence,
                        Some(candidate),
                    );
                }
                self.report(diag);
                self.bindings.fresh(self.registry)
            }
        }
    }

    fn generate_binary(&mut self, op: BinaryOp, lhs: TypeId, rhs: TypeId, span: Span) -> TypeId {
        match op {
            _ if op.is_arithmetic() => {
                self.constrain(Constraint::Equality { lhs, rhs, span });
                self.constrain(Constraint::Numeric { ty: lhs, span });
                lhs
            }
            _ if op.is_comparison() => {
                self.constrain(Constraint::Equality { lhs, rhs, span });
                self.constrain(Constraint::Comparable { ty: lhs, span });
                self.registry.bool()
            }
            _ if op.is_logical() => {
                let bool_ty = self.registry.bool();
                self.constrain(Constraint::Equality {
                    lhs,
                    rhs: bool_ty,
                    span,
                });
                self.constrain(Constraint::Equality {
                    lhs: rhs,
                    rhs: bool_ty,
                    span,
                });
                bool_ty
            }
            // Range operands must agree exactly; the residual operator rule
            // re-checks the resolved types
            _ => {
                self.constrain(Constraint::Equality { lhs, rhs, span });
                self.constrain(Constraint::Numeric { ty: lhs, span });
                self.registry.range_type(lhs)
            }
        }
    }

    fn generate_unary(&mut self, op: UnaryOp, operand: TypeId, span: Span) -> TypeId {
        match op {
            UnaryOp::Neg => {
                self.constrain(Constraint::Numeric { ty: operand, span });
                operand
            }
            UnaryOp::Not => {
                let bool_ty = self.registry.bool();
                self.constrain(Constraint::Equality {
                    lhs: operand,
                    rhs: bool_ty,
                    span,
                });
                bool_ty
            }
            UnaryOp::AddressOf => self.registry.pointer_type(operand),
            UnaryOp::Deref => {
                let pointee = self.bindings.fresh(self.registry);
                let pointer = self.registry.pointer_type(pointee);
                self.constrain(Constraint::Equality {
                    lhs: operand,
                    rhs: pointer,
                    span,
                });
                pointee
            }
        }
    }

    fn generate_let(
        &mut self,
        id: NodeId,
        name: StrId,
        mutable: bool,
        annotation: Option<&TypeExpr>,
        init: Option<NodeId>,
        span: Span,
    ) -> SemaResult<()> {
        let init_ty = match init {
            Some(init) => Some(self.generate(init)?),
            None => None,
        };

        let var_ty = match (annotation, init_ty) {
            (Some(annotation), Some(init_ty)) => {
                let annotated = self.resolve_type_expr(annotation, span);
                self.constrain(Constraint::Subtype {
                    sub: init_ty,
                    sup: annotated,
                    span,
                });
                annotated
            }
            (Some(annotation), None) => self.resolve_type_expr(annotation, span),
            (None, Some(init_ty)) => init_ty,
            // neither: resolved by later assignments through the shared var
            (None, None) => self.bindings.fresh(self.registry),
        };

        let symbol = Symbol {
            name,
            kind: SymbolKind::Variable,
            ty: Some(var_ty),
            declaration_span: span,
            scope: self.symbols.current_scope(),
            visibility: Visibility::Private,
            mutable,
            has_initializer: init.is_some(),
        };
        match self.symbols.define(symbol) {
            Ok(symbol_id) => {
                self.resolutions.insert(id, symbol_id);
            }
            Err(existing) => self.report_duplicate(name, span, existing),
        }
        Ok(())
    }

    fn generate_function(&mut self, id: NodeId) -> SemaResult<()> {
        if !self.fn_signatures.contains_key(&id) {
            // local function: not seen by declare_roots
            self.declare_function(id)?;
        }
        let (param_types, ret) = self.fn_signatures[&id].clone();
        let node = self.unit.node(id);
        let NodeKind::Function { params, body, .. } = node.kind.clone() else {
            return Err(SemaError::invalid_ast("expected function node", node.span));
        };

        self.symbols.push_scope();
        for (param, ty) in params.iter().zip(param_types.iter()) {
            let symbol = Symbol {
                name: param.name,
                kind: SymbolKind::Variable,
                ty: Some(*ty),
                declaration_span: param.span,
                scope: self.symbols.current_scope(),
                visibility: Visibility::Private,
                mutable: false,
                has_initializer: true,
            };
            if let Err(existing) = self.symbols.define(symbol) {
                self.report_duplicate(param.name, param.span, existing);
            }
        }

        let saved_return = self.current_return.replace(ret);
        self.generate(body)?;
        self.current_return = saved_return;
        self.pop_scope(node.span)?;
        Ok(())
    }

    fn generate_match(
        &mut self,
        scrutinee: NodeId,
        arms: &[MatchArm],
        span: Span,
    ) -> SemaResult<()> {
        let scrutinee_ty = self.generate(scrutinee)?;
        let common = self.bindings.fresh(self.registry);
        let mut patterns = Vec::with_capacity(arms.len());

        for arm in arms {
            self.symbols.push_scope();
            let pattern_node = self.unit.node(arm.pattern);
            let pattern_span = pattern_node.span;

            // literal patterns must agree with the scrutinee; binding
            // patterns adopt its type
            let pattern = self.convert_pattern(arm.pattern)?;
            match &pattern {
                Pattern::Literal(literal) => {
                    let literal_ty = self.literal_type(*literal);
                    self.constrain(Constraint::Equality {
                        lhs: scrutinee_ty,
                        rhs: literal_ty,
                        span: pattern_span,
                    });
                }
                Pattern::Identifier(name) => {
                    let symbol = Symbol {
                        name: *name,
                        kind: SymbolKind::Variable,
                        ty: Some(scrutinee_ty),
                        declaration_span: pattern_span,
                        scope: self.symbols.current_scope(),
                        visibility: Visibility::Private,
                        mutable: false,
                        has_initializer: true,
                    };
                    match self.symbols.define(symbol) {
                        Ok(symbol_id) => {
                            self.resolutions.insert(arm.pattern, symbol_id);
                        }
                        Err(existing) => self.report_duplicate(*name, pattern_span, existing),
                    }
                }
                _ => {}
            }
            patterns.push(pattern);

            let body_ty = self.generate(arm.body)?;
            let body_span = self.unit.node(arm.body).span;
            self.constrain(Constraint::Equality {
                lhs: common,
                rhs: body_ty,
                span: body_span,
            });
            self.pop_scope(span)?;
        }

        // the verdict needs the solved scrutinee; checked during assignment
        self.pending_matches.push(PendingMatch {
            scrutinee: scrutinee_ty,
            patterns,
            span,
        });
        Ok(())
    }

    fn convert_pattern(&self, id: NodeId) -> SemaResult<Pattern> {
        let node = self.unit.node(id);
        let NodeKind::Pattern(kind) = &node.kind else {
            return Err(SemaError::invalid_ast("expected pattern node", node.span));
        };
        Ok(match kind {
            PatternKind::Wildcard => Pattern::Wildcard,
            PatternKind::Literal(value) => Pattern::Literal(match value {
                LiteralValue::Bool(v) => PatternLiteral::Bool(*v),
                LiteralValue::Int(v) => PatternLiteral::Int(*v),
                LiteralValue::Float(v) => PatternLiteral::Float(*v),
                LiteralValue::Str(v) => PatternLiteral::Str(*v),
            }),
            PatternKind::Binding(name) => Pattern::Identifier(*name),
            PatternKind::Variant(name) => Pattern::Variant(*name),
            PatternKind::Tuple(elements) => Pattern::Tuple(
                elements
                    .iter()
                    .map(|e| self.convert_pattern(*e))
                    .collect::<SemaResult<_>>()?,
            ),
            PatternKind::Struct(fields) => Pattern::Struct(
                fields
                    .iter()
                    .map(|(name, p)| Ok((*name, self.convert_pattern(*p)?)))
                    .collect::<SemaResult<_>>()?,
            ),
        })
    }

    fn literal_type(&self, literal: PatternLiteral) -> TypeId {
        match literal {
            PatternLiteral::Bool(_) => self.registry.bool(),
            PatternLiteral::Int(_) => self.registry.i32(),
            PatternLiteral::Float(_) => self.registry.f64(),
            PatternLiteral::Str(_) => self.registry.string(),
        }
    }

    fn pop_scope(&mut self, span: Span) -> SemaResult<()> {
        if self.symbols.pop_scope() {
            Ok(())
        } else {
            Err(SemaError::invalid_ast("unbalanced scope pop", span))
        }
    }

    // ==================== Solving ====================

    /// Iterate the live constraint list to a fixed point. Solved and failed
    /// constraints are swap-removed; a pass that removes nothing ends the
    /// loop. Unification is confluent under first-writer-binds, so the scan
    /// order does not affect final bindings.
    fn solve(&mut self) {
        let mut passes = 0usize;
        loop {
            let before = self.constraints.len();
            let mut index = 0;
            while index < self.constraints.len() {
                let constraint = self.constraints[index].clone();
                match self.try_solve(&constraint) {
                    Outcome::Solved => {
                        self.constraints.swap_remove(index);
                    }
                    Outcome::Failed(diagnostic) => {
                        self.report(diagnostic);
                        self.constraints.swap_remove(index);
                    }
                    Outcome::Deferred => index += 1,
                }
            }
            passes += 1;
            trace!(
                pass = passes,
                remaining = self.constraints.len(),
                "solver pass complete"
            );
            if self.constraints.len() == before || passes >= self.max_passes {
                break;
            }
        }
        debug!(
            passes,
            unsolved = self.constraints.len(),
            "solver reached fixpoint"
        );
    }

    fn try_solve(&mut self, constraint: &Constraint) -> Outcome {
        match constraint {
            Constraint::Equality { lhs, rhs, span } => match self.unify(*lhs, *rhs) {
                Ok(()) => Outcome::Solved,
                Err((found, expected)) => Outcome::Failed(self.mismatch(found, expected, *span)),
            },
            Constraint::Subtype { sub, sup, span } => self.solve_subtype(*sub, *sup, *span),
            Constraint::Numeric { ty, span } => self.solve_class(
                *ty,
                *span,
                |registry, ty| registry.is_numeric(ty),
                "numeric",
            ),
            Constraint::Comparable { ty, span } => self.solve_class(
                *ty,
                *span,
                |registry, ty| registry.is_comparable(ty),
                "comparable",
            ),
            Constraint::FunctionCall {
                callee,
                args,
                result,
                span,
            } => self.solve_call(*callee, args, *result, *span),
            Constraint::ArrayAccess {
                array,
                index,
                element,
                span,
            } => self.solve_index(*array, *index, *element, *span),
            Constraint::FieldAccess {
                base,
                name,
                field,
                span,
            } => self.solve_field(*base, *name, *field, *span),
            Constraint::Iterable {
                collection,
                element,
                span,
            } => self.solve_iterable(*collection, *element, *span),
        }
    }

    /// Structural unification through the binding table.
    ///
    /// Either side being an unresolved variable binds it to the other
    /// (first-writer-binds). Same-kind compounds unify children; different
    /// kinds fall back to either-direction assignability. Errors carry the
    /// resolved pair for diagnostics.
    fn unify(&mut self, a: TypeId, b: TypeId) -> Result<(), (TypeId, TypeId)> {
        let a = self.bindings.resolve(self.registry, a);
        let b = self.bindings.resolve(self.registry, b);
        if a == b {
            return Ok(());
        }
        if let Some(var) = self.registry.is_inference_var(a) {
            self.bindings.bind(var, b);
            return Ok(());
        }
        if let Some(var) = self.registry.is_inference_var(b) {
            self.bindings.bind(var, a);
            return Ok(());
        }

        match (self.registry.kind(a).clone(), self.registry.kind(b).clone()) {
            (TypeKind::Pointer(x), TypeKind::Pointer(y)) => self.unify(x, y),
            (
                TypeKind::Array { element: x, len: lx },
                TypeKind::Array { element: y, len: ly },
            ) if lx == ly => self.unify(x, y),
            (TypeKind::Slice(x), TypeKind::Slice(y)) => self.unify(x, y),
            (TypeKind::Optional(x), TypeKind::Optional(y)) => self.unify(x, y),
            (TypeKind::Range(x), TypeKind::Range(y)) => self.unify(x, y),
            (TypeKind::ErrorUnion { payload: x }, TypeKind::ErrorUnion { payload: y }) => {
                self.unify(x, y)
            }
            (
                TypeKind::Function {
                    params: px,
                    ret: rx,
                },
                TypeKind::Function {
                    params: py,
                    ret: ry,
                },
            ) if px.len() == py.len() => {
                for (x, y) in px.iter().zip(py.iter()) {
                    self.unify(*x, *y)?;
                }
                self.unify(rx, ry)
            }
            (
                TypeKind::Tensor {
                    element: x,
                    dims: dx,
                    space: sx,
                },
                TypeKind::Tensor {
                    element: y,
                    dims: dy,
                    space: sy,
                },
            ) if dx == dy && sx == sy => self.unify(x, y),
            _ => {
                if self.registry.is_compatible(a, b) || self.registry.is_compatible(b, a) {
                    Ok(())
                } else {
                    Err((a, b))
                }
            }
        }
    }

    fn solve_subtype(&mut self, sub: TypeId, sup: TypeId, span: Span) -> Outcome {
        let sub = self.bindings.resolve(self.registry, sub);
        let sup = self.bindings.resolve(self.registry, sup);
        match (
            self.registry.is_inference_var(sub),
            self.registry.is_inference_var(sup),
        ) {
            (Some(_), Some(_)) => Outcome::Deferred,
            (Some(var), None) => {
                self.bindings.bind(var, sup);
                Outcome::Solved
            }
            (None, Some(var)) => {
                self.bindings.bind(var, sub);
                Outcome::Solved
            }
            (None, None) => {
                if self.registry.is_compatible(sub, sup) {
                    Outcome::Solved
                } else {
                    Outcome::Failed(self.mismatch(sub, sup, span))
                }
            }
        }
    }

    /// Numeric/Comparable share this: unresolved defaults to i32 (the
    /// documented literal default), concrete types are membership-checked
    fn solve_class(
        &mut self,
        ty: TypeId,
        span: Span,
        allows: fn(&TypeRegistry, TypeId) -> bool,
        class: &'static str,
    ) -> Outcome {
        let resolved = self.bindings.resolve(self.registry, ty);
        if let Some(var) = self.registry.is_inference_var(resolved) {
            let default = self.registry.i32();
            self.bindings.bind(var, default);
            return Outcome::Solved;
        }
        if allows(self.registry, resolved) {
            Outcome::Solved
        } else {
            let rendered = self.registry.display(resolved, self.ast.interner());
            Outcome::Failed(Diagnostic::new(
                DiagnosticCode::TypeMismatch,
                format!("expected a {class} type, found {rendered}"),
                self.file_span(span),
            ))
        }
    }

    fn solve_call(
        &mut self,
        callee: TypeId,
        args: &TypeIdVec,
        result: TypeId,
        span: Span,
    ) -> Outcome {
        let callee = self.bindings.resolve(self.registry, callee);
        if self.registry.is_inference_var(callee).is_some() {
            return Outcome::Deferred;
        }
        let TypeKind::Function { params, ret } = self.registry.kind(callee).clone() else {
            let rendered = self.registry.display(callee, self.ast.interner());
            return Outcome::Failed(Diagnostic::new(
                DiagnosticCode::NotAFunction,
                format!("cannot call a value of type {rendered}"),
                self.file_span(span),
            ));
        };

        if params.len() != args.len() {
            return Outcome::Failed(Diagnostic::new(
                DiagnosticCode::ArgumentCountMismatch,
                format!(
                    "this call takes {} argument{} but {} {} supplied",
                    params.len(),
                    if params.len() == 1 { "" } else { "s" },
                    args.len(),
                    if args.len() == 1 { "was" } else { "were" },
                ),
                self.file_span(span),
            ));
        }

        for (arg, param) in args.iter().zip(params.iter()) {
            if let Err((found, expected)) = self.flow_into(*arg, *param) {
                return Outcome::Failed(self.mismatch(found, expected, span));
            }
        }
        match self.unify(result, ret) {
            Ok(()) => Outcome::Solved,
            Err((found, expected)) => Outcome::Failed(self.mismatch(found, expected, span)),
        }
    }

    /// Directional argument flow: unify when a variable is involved,
    /// otherwise one-directional assignability
    fn flow_into(&mut self, sub: TypeId, sup: TypeId) -> Result<(), (TypeId, TypeId)> {
        let sub_r = self.bindings.resolve(self.registry, sub);
        let sup_r = self.bindings.resolve(self.registry, sup);
        if self.registry.is_inference_var(sub_r).is_some()
            || self.registry.is_inference_var(sup_r).is_some()
        {
            return self.unify(sub_r, sup_r);
        }
        if self.registry.is_compatible(sub_r, sup_r) {
            Ok(())
        } else {
            Err((sub_r, sup_r))
        }
    }

    fn solve_index(&mut self, array: TypeId, index: TypeId, element: TypeId, span: Span) -> Outcome {
        let array = self.bindings.resolve(self.registry, array);
        if self.registry.is_inference_var(array).is_some() {
            return Outcome::Deferred;
        }

        // index must be an integer; an unresolved index defaults to i32
        let index = self.bindings.resolve(self.registry, index);
        if let Some(var) = self.registry.is_inference_var(index) {
            let default = self.registry.i32();
            self.bindings.bind(var, default);
        } else if !self.registry.is_integer(index) {
            let rendered = self.registry.display(index, self.ast.interner());
            return Outcome::Failed(Diagnostic::new(
                DiagnosticCode::TypeMismatch,
                format!("index must be an integer, found {rendered}"),
                self.file_span(span),
            ));
        }

        let yielded = match self.registry.kind(array).clone() {
            TypeKind::Array { element, .. } => element,
            TypeKind::Slice(element) => element,
            TypeKind::Tensor { element, .. } => element,
            _ => {
                let rendered = self.registry.display(array, self.ast.interner());
                return Outcome::Failed(Diagnostic::new(
                    DiagnosticCode::NotIndexable,
                    format!("type {rendered} cannot be indexed"),
                    self.file_span(span),
                ));
            }
        };
        match self.unify(element, yielded) {
            Ok(()) => Outcome::Solved,
            Err((found, expected)) => Outcome::Failed(self.mismatch(found, expected, span)),
        }
    }

    fn solve_field(&mut self, base: TypeId, name: StrId, field: TypeId, span: Span) -> Outcome {
        let base = self.bindings.resolve(self.registry, base);
        if self.registry.is_inference_var(base).is_some() {
            return Outcome::Deferred;
        }
        let TypeKind::Struct {
            name: struct_name,
            fields,
        } = self.registry.kind(base).clone()
        else {
            let rendered = self.registry.display(base, self.ast.interner());
            return Outcome::Failed(Diagnostic::new(
                DiagnosticCode::TypeNotStruct,
                format!("type {rendered} is not a struct"),
                self.file_span(span),
            ));
        };

        let Some(found) = fields.iter().find(|f| f.name == name) else {
            let field_name = self.ast.resolve(name).to_string();
            let struct_name = self.ast.resolve(struct_name).to_string();
            return Outcome::Failed(Diagnostic::new(
                DiagnosticCode::FieldNotFound,
                format!("no field '{field_name}' on struct '{struct_name}'"),
                self.file_span(span),
            ));
        };
        match self.unify(field, found.ty) {
            Ok(()) => Outcome::Solved,
            Err((found, expected)) => Outcome::Failed(self.mismatch(found, expected, span)),
        }
    }

    fn solve_iterable(&mut self, collection: TypeId, element: TypeId, span: Span) -> Outcome {
        let collection = self.bindings.resolve(self.registry, collection);
        if self.registry.is_inference_var(collection).is_some() {
            return Outcome::Deferred;
        }
        let Some(yielded) = self.registry.iterable_element(collection) else {
            let rendered = self.registry.display(collection, self.ast.interner());
            return Outcome::Failed(Diagnostic::new(
                DiagnosticCode::TypeMismatch,
                format!("type {rendered} is not iterable"),
                self.file_span(span),
            ));
        };
        match self.unify(element, yielded) {
            Ok(()) => Outcome::Solved,
            Err((found, expected)) => Outcome::Failed(self.mismatch(found, expected, span)),
        }
    }

    /// Render a type mismatch; a pair of tensors disagreeing on shape gets
    /// the dedicated shape code
    fn mismatch(&self, found: TypeId, expected: TypeId, span: Span) -> Diagnostic {
        let code = match (self.registry.kind(found), self.registry.kind(expected)) {
            (TypeKind::Tensor { dims: a, .. }, TypeKind::Tensor { dims: b, .. }) if a != b => {
                DiagnosticCode::IncompatibleShapes
            }
            _ => DiagnosticCode::TypeMismatch,
        };
        let found = self.registry.display(found, self.ast.interner());
        let expected = self.registry.display(expected, self.ast.interner());
        Diagnostic::new(
            code,
            format!("mismatched types: expected {expected}, found {found}"),
            self.file_span(span),
        )
    }

    // ==================== Assignment ====================

    /// Write solved types back onto nodes and symbols, run the deferred
    /// exhaustiveness checks, and report what stayed unresolved
    fn assign(&mut self) {
        let node_ids: Vec<NodeId> = self.node_types.keys().copied().collect();
        for id in node_ids {
            let ty = self.node_types[&id];
            let resolved = self.substitute(ty, 0);
            self.node_types.insert(id, resolved);
        }

        let mut unresolved_symbols = Vec::new();
        let symbol_ids: Vec<SymbolId> = self.symbols.symbols().map(|(id, _)| id).collect();
        for id in symbol_ids {
            if let Some(ty) = self.symbols.symbol(id).ty {
                let resolved = self.substitute(ty, 0);
                self.symbols.symbol_mut(id).ty = Some(resolved);
                if self.registry.is_inference_var(resolved).is_some() {
                    unresolved_symbols.push(id);
                }
            }
        }
        for id in unresolved_symbols {
            let symbol = self.symbols.symbol(id);
            let name = self.ast.resolve(symbol.name).to_string();
            let span = symbol.declaration_span;
            let diag = Diagnostic::new(
                DiagnosticCode::CannotInferType,
                format!("cannot infer the type of '{name}'"),
                self.file_span(span),
            )
            .with_note("consider adding a type annotation");
            self.report(diag);
        }

        // deferred exhaustiveness checks, now that scrutinees are solved
        let pending = std::mem::take(&mut self.pending_matches);
        for check in pending {
            let scrutinee = self.substitute(check.scrutinee, 0);
            let report = exhaustive::check_exhaustiveness(self.registry, scrutinee, &check.patterns);
            if !report.is_exhaustive {
                let missing: Vec<String> = report
                    .missing
                    .iter()
                    .map(|p| p.render(self.ast.interner()))
                    .collect();
                let diag = Diagnostic::new(
                    DiagnosticCode::NonExhaustiveMatch,
                    format!("non-exhaustive match: missing {}", missing.join(", ")),
                    self.file_span(check.span),
                )
                .with_note(format!(
                    "add arm{} for: {}",
                    if missing.len() == 1 { "" } else { "s" },
                    missing.join(", ")
                ));
                self.report(diag);
            }
        }

        // constraints still deferred at the fixpoint could not make progress
        let leftovers = std::mem::take(&mut self.constraints);
        for constraint in leftovers {
            let span = constraint.span();
            let diag = Diagnostic::new(
                DiagnosticCode::CannotInferType,
                "cannot infer the type of this expression",
                self.file_span(span),
            )
            .with_note("consider adding a type annotation");
            self.report(diag);
        }
    }

    /// Resolve a type through the binding table and rebuild compound types
    /// from their resolved children. Depth-bounded; a cyclic binding leaves
    /// the type as-is rather than recursing forever.
    fn substitute(&mut self, ty: TypeId, depth: usize) -> TypeId {
        if depth > MAX_SUBST_DEPTH {
            return ty;
        }
        let resolved = self.bindings.resolve(self.registry, ty);
        match self.registry.kind(resolved).clone() {
            TypeKind::Pointer(pointee) => {
                let pointee = self.substitute(pointee, depth + 1);
                self.registry.pointer_type(pointee)
            }
            TypeKind::Array { element, len } => {
                let element = self.substitute(element, depth + 1);
                self.registry.array_type(element, len)
            }
            TypeKind::Slice(element) => {
                let element = self.substitute(element, depth + 1);
                self.registry.slice_type(element)
            }
            TypeKind::Range(element) => {
                let element = self.substitute(element, depth + 1);
                self.registry.range_type(element)
            }
            TypeKind::Optional(payload) => {
                let payload = self.substitute(payload, depth + 1);
                self.registry.optional_type(payload)
            }
            TypeKind::ErrorUnion { payload } => {
                let payload = self.substitute(payload, depth + 1);
                self.registry.error_union_type(payload)
            }
            TypeKind::Function { params, ret } => {
                let params: TypeIdVec = params
                    .iter()
                    .map(|p| self.substitute(*p, depth + 1))
                    .collect();
                let ret = self.substitute(ret, depth + 1);
                self.registry.function_type(params, ret)
            }
            TypeKind::Tensor {
                element,
                dims,
                space,
            } => {
                let element = self.substitute(element, depth + 1);
                self.registry.tensor_type(element, &dims, space)
            }
            _ => resolved,
        }
    }
}
