//! Multi-pass semantic validation
//!
//! Four ordered passes over a unit, all running after inference so node and
//! symbol types are resolved:
//!
//! 1. **Profile compliance** — node kinds map to required features; every
//!    violation is recorded, none is fatal.
//! 2. **Definite assignment** — per-symbol initialized flags, seeded by the
//!    declaration and flipped by assignments; a read while false is
//!    `UseBeforeDefinition` with the declaration attached as context.
//! 3. **Control flow** — a three-state termination lattice per statement.
//!    The tri-state (not a boolean) is what classifies partial termination
//!    correctly and drives missing-return and unreachable-code diagnostics.
//! 4. **Residual rules** — an open registry of smaller legality rules.

use crate::ast::{AstStore, MatchArm, NodeId, NodeKind, TypeExpr, UnaryOp, Unit};
use crate::common::Span;
use crate::sema::diagnostics::{Diagnostic, DiagnosticCode, FileSpan};
use crate::sema::infer::InferenceOutput;
use crate::sema::profile::{Feature, ProfileManager, Violation, ViolationKind};
use crate::sema::scope::{SymbolId, SymbolKind, SymbolTable};
use crate::sema::types::{PrimitiveKind, TypeId, TypeKind, TypeRegistry};
use std::collections::HashMap;
use tracing::debug;

/// Termination lattice for control-flow analysis
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// Execution always falls through to the next statement
    Continues,
    /// Some paths terminate, some fall through
    MaybeTerminates,
    /// No path falls through (return/break/continue on every path)
    Terminates,
}

impl Termination {
    fn branch_join(branches: &[Termination]) -> Termination {
        if branches.is_empty() {
            return Termination::Continues;
        }
        if branches.iter().all(|t| *t == Termination::Terminates) {
            Termination::Terminates
        } else if branches.iter().any(|t| *t != Termination::Continues) {
            Termination::MaybeTerminates
        } else {
            Termination::Continues
        }
    }
}

/// Read-only context handed to residual rules
pub struct RuleContext<'a> {
    pub ast: &'a AstStore,
    pub unit: &'a Unit,
    pub registry: &'a TypeRegistry,
    pub symbols: &'a SymbolTable,
    pub inference: &'a InferenceOutput,
}

impl RuleContext<'_> {
    pub fn node_type(&self, id: NodeId) -> Option<TypeId> {
        self.inference.node_types.get(&id).copied()
    }

    pub fn resolution(&self, id: NodeId) -> Option<SymbolId> {
        self.inference.resolutions.get(&id).copied()
    }

    pub fn file_span(&self, span: Span) -> FileSpan {
        FileSpan::of(self.unit, span)
    }
}

/// One residual legality rule
pub trait ValidationRule {
    fn name(&self) -> &'static str;

    /// Inspect one node; push any diagnostics
    fn check(&self, cx: &RuleContext<'_>, node: NodeId, out: &mut Vec<Diagnostic>);
}

/// Assignment targets must be mutable places
struct MutabilityRule;

impl ValidationRule for MutabilityRule {
    fn name(&self) -> &'static str {
        "assignment-mutability"
    }

    fn check(&self, cx: &RuleContext<'_>, node: NodeId, out: &mut Vec<Diagnostic>) {
        let NodeKind::Assign { target, .. } = &cx.unit.node(node).kind else {
            return;
        };
        let target_node = cx.unit.node(*target);
        if !target_node.kind.is_place() {
            out.push(Diagnostic::new(
                DiagnosticCode::InvalidOperator,
                "invalid assignment target",
                cx.file_span(target_node.span),
            ));
            return;
        }
        if let NodeKind::Identifier(_) = &target_node.kind {
            let Some(symbol_id) = cx.resolution(*target) else {
                return;
            };
            let symbol = cx.symbols.symbol(symbol_id);
            // deferred initialization of a `let` without a value is legal;
            // reassignment after an initializer needs `mut`
            if symbol.kind == SymbolKind::Variable && !symbol.mutable && symbol.has_initializer {
                let name = cx.ast.resolve(symbol.name).to_string();
                out.push(
                    Diagnostic::new(
                        DiagnosticCode::ImmutableAssignment,
                        format!("cannot assign to immutable variable '{name}'"),
                        cx.file_span(target_node.span),
                    )
                    .with_secondary(
                        cx.file_span(symbol.declaration_span),
                        "declared immutable here",
                    )
                    .with_suggestion(
                        format!("declare it as 'let mut {name}'"),
                        0.9,
                        Some(format!("let mut {name}")),
                    ),
                );
            }
        }
    }
}

/// Range endpoints must resolve to exactly the same type — widening that is
/// fine elsewhere is not fine inside a range
struct RangeOperandRule;

impl ValidationRule for RangeOperandRule {
    fn name(&self) -> &'static str {
        "range-operands"
    }

    fn check(&self, cx: &RuleContext<'_>, node: NodeId, out: &mut Vec<Diagnostic>) {
        let NodeKind::Binary { op, lhs, rhs } = &cx.unit.node(node).kind else {
            return;
        };
        if !op.is_range() {
            return;
        }
        let (Some(lhs_ty), Some(rhs_ty)) = (cx.node_type(*lhs), cx.node_type(*rhs)) else {
            return;
        };
        if lhs_ty != rhs_ty
            && cx.registry.is_inference_var(lhs_ty).is_none()
            && cx.registry.is_inference_var(rhs_ty).is_none()
        {
            let interner = cx.ast.interner();
            out.push(Diagnostic::new(
                DiagnosticCode::TypeMismatch,
                format!(
                    "range endpoints must have exactly the same type: {} vs {}",
                    cx.registry.display(lhs_ty, interner),
                    cx.registry.display(rhs_ty, interner),
                ),
                cx.file_span(cx.unit.node(node).span),
            ));
        }
    }
}

/// No void-typed value may be passed as a call argument
struct CallArgumentRule;

impl ValidationRule for CallArgumentRule {
    fn name(&self) -> &'static str {
        "call-arguments"
    }

    fn check(&self, cx: &RuleContext<'_>, node: NodeId, out: &mut Vec<Diagnostic>) {
        let NodeKind::Call { args, .. } = &cx.unit.node(node).kind else {
            return;
        };
        for arg in args {
            if cx.node_type(*arg).is_some_and(|ty| cx.registry.is_void(ty)) {
                out.push(Diagnostic::new(
                    DiagnosticCode::InvalidOperator,
                    "void value used as a call argument",
                    cx.file_span(cx.unit.node(*arg).span),
                ));
            }
        }
    }
}

/// The four-pass validator for one unit
pub struct Validator<'a> {
    ast: &'a AstStore,
    unit: &'a Unit,
    registry: &'a TypeRegistry,
    symbols: &'a SymbolTable,
    inference: &'a InferenceOutput,
    profiles: &'a mut ProfileManager,
    diagnostics: &'a mut Vec<Diagnostic>,
    rules: Vec<Box<dyn ValidationRule>>,
}

impl<'a> Validator<'a> {
    pub fn new(
        ast: &'a AstStore,
        unit: &'a Unit,
        registry: &'a TypeRegistry,
        symbols: &'a SymbolTable,
        inference: &'a InferenceOutput,
        profiles: &'a mut ProfileManager,
        diagnostics: &'a mut Vec<Diagnostic>,
    ) -> Self {
        Self {
            ast,
            unit,
            registry,
            symbols,
            inference,
            profiles,
            diagnostics,
            rules: vec![
                Box::new(MutabilityRule),
                Box::new(RangeOperandRule),
                Box::new(CallArgumentRule),
            ],
        }
    }

    /// Register an extra residual rule ahead of `run`
    pub fn add_rule(&mut self, rule: Box<dyn ValidationRule>) {
        self.rules.push(rule);
    }

    /// Run all four passes in order
    pub fn run(&mut self) {
        self.check_profiles();
        self.check_definite_assignment();
        self.check_control_flow();
        self.check_residual_rules();
        debug!(diagnostics = self.diagnostics.len(), "validation complete");
    }

    fn file_span(&self, span: Span) -> FileSpan {
        FileSpan::of(self.unit, span)
    }

    // ==================== Pass 1: profile compliance ====================

    fn check_profiles(&mut self) {
        for root in self.unit.roots() {
            self.profile_walk(*root);
        }
        let violations = self.profiles.take_violations();
        for violation in violations {
            let diagnostic = self.render_violation(&violation);
            self.diagnostics.push(diagnostic);
        }
    }

    fn profile_walk(&mut self, id: NodeId) {
        let node = self.unit.node(id);
        let span = node.span;
        match &node.kind {
            NodeKind::Let { annotation, .. } => {
                self.profiles.validate_feature(Feature::Variables, span);
                if let Some(annotation) = annotation.clone() {
                    self.check_type_expr(&annotation, span);
                }
            }
            NodeKind::Function { params, return_type, .. } => {
                self.profiles.validate_feature(Feature::Functions, span);
                self.profiles.validate_param_count(params.len(), span);
                for param in params.clone() {
                    if let Some(ty) = &param.ty {
                        self.check_type_expr(ty, param.span);
                    }
                }
                if let Some(ret) = return_type.clone() {
                    self.check_type_expr(&ret, span);
                }
            }
            NodeKind::Binary { op, .. } => {
                let op = *op;
                self.profiles.validate_binary_op(op, span);
                if op.is_arithmetic() {
                    self.profiles.validate_feature(Feature::Arithmetic, span);
                } else if op.is_range() {
                    self.profiles.validate_feature(Feature::Ranges, span);
                }
            }
            NodeKind::Unary { op, .. } => {
                let op = *op;
                self.profiles.validate_unary_op(op, span);
                if matches!(op, UnaryOp::AddressOf | UnaryOp::Deref) {
                    self.profiles.validate_feature(Feature::RawPointers, span);
                }
            }
            NodeKind::ArrayLiteral { .. } => {
                self.profiles.validate_feature(Feature::Arrays, span);
            }
            NodeKind::If { .. } | NodeKind::While { .. } => {
                self.profiles.validate_feature(Feature::ControlFlow, span);
            }
            NodeKind::For { .. } => {
                self.profiles.validate_feature(Feature::ForLoops, span);
            }
            NodeKind::Match { .. } => {
                self.profiles.validate_feature(Feature::MatchStatements, span);
            }
            NodeKind::StructDecl { fields, .. } => {
                self.profiles.validate_feature(Feature::Structs, span);
                for field in fields.clone() {
                    self.check_type_expr(&field.ty, field.span);
                }
            }
            NodeKind::EnumDecl { .. } => {
                self.profiles.validate_feature(Feature::Enums, span);
            }
            _ => {}
        }
        for child in self.unit.children(id) {
            self.profile_walk(child);
        }
    }

    /// Annotations are gated too: the types a profile admits are part of its
    /// surface, independent of the expressions that use them
    fn check_type_expr(&mut self, expr: &TypeExpr, span: Span) {
        match expr {
            TypeExpr::Named(name) => {
                if let Some(primitive) = PrimitiveKind::from_name(self.ast.resolve(*name)) {
                    self.profiles.validate_primitive(primitive, span);
                }
            }
            TypeExpr::Pointer(inner) => {
                self.profiles.validate_feature(Feature::RawPointers, span);
                self.check_type_expr(inner, span);
            }
            TypeExpr::Array { element, .. } => {
                self.profiles.validate_feature(Feature::Arrays, span);
                self.check_type_expr(element, span);
            }
            TypeExpr::Slice(element) => {
                self.profiles.validate_feature(Feature::Slices, span);
                self.check_type_expr(element, span);
            }
            TypeExpr::Optional(payload) => {
                self.profiles.validate_feature(Feature::Optionals, span);
                self.check_type_expr(payload, span);
            }
            TypeExpr::Range(element) => {
                self.profiles.validate_feature(Feature::Ranges, span);
                self.check_type_expr(element, span);
            }
            TypeExpr::Function { params, ret } => {
                for param in params {
                    self.check_type_expr(param, span);
                }
                self.check_type_expr(ret, span);
            }
            TypeExpr::Tensor { element, space, .. } => {
                self.profiles.validate_feature(Feature::Tensors, span);
                if *space != crate::ast::MemorySpace::Host {
                    self.profiles.validate_feature(Feature::NpuOffload, span);
                }
                self.check_type_expr(element, span);
            }
            TypeExpr::Allocator => {
                self.profiles.validate_feature(Feature::Allocators, span);
            }
            TypeExpr::ContextBound(_) => {
                self.profiles.validate_feature(Feature::ContextBounds, span);
            }
        }
    }

    fn render_violation(&self, violation: &Violation) -> Diagnostic {
        let current = violation.current;
        match &violation.kind {
            ViolationKind::Feature(feature) => {
                let required = violation.required.expect("feature violations carry a rank");
                Diagnostic::new(
                    DiagnosticCode::ProfileViolation,
                    format!(
                        "feature '{feature}' requires profile '{required}' but the current profile is '{current}'"
                    ),
                    self.file_span(violation.span),
                )
            }
            ViolationKind::Operator(symbol) => {
                let required = violation.required.expect("operator violations carry a rank");
                Diagnostic::new(
                    DiagnosticCode::ProfileViolation,
                    format!(
                        "operator '{symbol}' requires profile '{required}' but the current profile is '{current}'"
                    ),
                    self.file_span(violation.span),
                )
            }
            ViolationKind::PrimitiveType(primitive) => {
                let mut diagnostic = Diagnostic::new(
                    DiagnosticCode::ProfileViolation,
                    format!(
                        "primitive type '{}' is not available under profile '{current}'",
                        primitive.name()
                    ),
                    self.file_span(violation.span),
                );
                if let Some(required) = violation.required {
                    diagnostic =
                        diagnostic.with_note(format!("available from profile '{required}'"));
                }
                diagnostic
            }
            ViolationKind::ParamCount { count, max } => Diagnostic::new(
                DiagnosticCode::ProfileViolation,
                format!(
                    "function has {count} parameters but profile '{current}' allows at most {max}"
                ),
                self.file_span(violation.span),
            ),
            ViolationKind::NpuGate(feature) => Diagnostic::new(
                DiagnosticCode::NpuGateViolation,
                format!("feature '{feature}' requires NPU support, which is disabled"),
                self.file_span(violation.span),
            ),
        }
    }

    // ==================== Pass 2: definite assignment ====================

    fn check_definite_assignment(&mut self) {
        let mut state: HashMap<SymbolId, bool> = HashMap::new();
        let roots: Vec<NodeId> = self.unit.roots().to_vec();
        for root in roots {
            self.assignment_walk(root, &mut state);
        }
    }

    fn assignment_walk(&mut self, id: NodeId, state: &mut HashMap<SymbolId, bool>) {
        let node = self.unit.node(id);
        match node.kind.clone() {
            NodeKind::Let { init, .. } => {
                if let Some(init) = init {
                    self.assignment_walk(init, state);
                }
                if let Some(symbol) = self.inference.resolutions.get(&id).copied() {
                    state.insert(symbol, self.symbols.symbol(symbol).has_initializer);
                }
            }
            NodeKind::Assign { target, value } => {
                self.assignment_walk(value, state);
                let target_node = self.unit.node(target);
                if let NodeKind::Identifier(_) = target_node.kind {
                    // a plain write, not a read
                    if let Some(symbol) = self.inference.resolutions.get(&target).copied() {
                        state.insert(symbol, true);
                    }
                } else {
                    // writes through an index/field/deref read the base
                    self.assignment_walk(target, state);
                }
            }
            NodeKind::Identifier(_) => {
                if let Some(symbol_id) = self.inference.resolutions.get(&id).copied() {
                    let symbol = self.symbols.symbol(symbol_id);
                    let initialized = state
                        .get(&symbol_id)
                        .copied()
                        .unwrap_or(symbol.has_initializer);
                    if symbol.kind == SymbolKind::Variable && !initialized {
                        let name = self.ast.resolve(symbol.name).to_string();
                        let declaration = symbol.declaration_span;
                        let diagnostic = Diagnostic::new(
                            DiagnosticCode::UseBeforeDefinition,
                            format!("'{name}' is used before it is assigned a value"),
                            self.file_span(node.span),
                        )
                        .with_secondary(
                            self.file_span(declaration),
                            "declared here without a value",
                        );
                        self.diagnostics.push(diagnostic);
                    }
                }
            }
            NodeKind::If {
                condition,
                then_block,
                else_block,
            } => {
                self.assignment_walk(condition, state);
                let mut then_state = state.clone();
                self.assignment_walk(then_block, &mut then_state);
                match else_block {
                    Some(else_block) => {
                        let mut else_state = state.clone();
                        self.assignment_walk(else_block, &mut else_state);
                        // initialized after the if only when both branches
                        // initialized it
                        for (symbol, value) in then_state {
                            if value && else_state.get(&symbol).copied().unwrap_or(false) {
                                state.insert(symbol, true);
                            }
                        }
                    }
                    None => {
                        // branch may not run; its assignments do not count
                    }
                }
            }
            NodeKind::While { condition, body } => {
                self.assignment_walk(condition, state);
                let mut body_state = state.clone();
                self.assignment_walk(body, &mut body_state);
            }
            NodeKind::For {
                iterable, body, ..
            } => {
                self.assignment_walk(iterable, state);
                let mut body_state = state.clone();
                if let Some(symbol) = self.inference.resolutions.get(&id).copied() {
                    body_state.insert(symbol, true);
                }
                self.assignment_walk(body, &mut body_state);
            }
            NodeKind::Match { scrutinee, arms } => {
                self.assignment_walk(scrutinee, state);
                let mut arm_states = Vec::with_capacity(arms.len());
                for arm in &arms {
                    let mut arm_state = state.clone();
                    if let Some(symbol) = self.inference.resolutions.get(&arm.pattern).copied() {
                        arm_state.insert(symbol, true);
                    }
                    self.assignment_walk(arm.body, &mut arm_state);
                    arm_states.push(arm_state);
                }
                // a symbol counts as initialized only when every arm
                // initialized it (the match is exhaustive or already an
                // error)
                if let Some(first) = arm_states.first() {
                    for (symbol, _) in first.iter().filter(|(_, v)| **v) {
                        if arm_states
                            .iter()
                            .all(|s| s.get(symbol).copied().unwrap_or(false))
                        {
                            state.insert(*symbol, true);
                        }
                    }
                }
            }
            NodeKind::Function { body, .. } => {
                // nested bodies run later; their reads see a fresh state
                // seeded only by declarations
                let mut body_state = state.clone();
                self.assignment_walk(body, &mut body_state);
            }
            _ => {
                for child in self.unit.children(id) {
                    self.assignment_walk(child, state);
                }
            }
        }
    }

    // ==================== Pass 3: control flow ====================

    fn check_control_flow(&mut self) {
        let roots: Vec<NodeId> = self.unit.roots().to_vec();
        for root in roots {
            let node = self.unit.node(root);
            if let NodeKind::Function { .. } = node.kind {
                self.check_function_flow(root);
            } else {
                self.termination_of(root);
            }
        }
    }

    fn check_function_flow(&mut self, id: NodeId) {
        let node = self.unit.node(id);
        let NodeKind::Function { name, body, .. } = node.kind.clone() else {
            return;
        };
        let termination = self.termination_of(body);

        // a non-void return type demands that every path returns
        let returns_value = self
            .inference
            .node_types
            .get(&id)
            .map(|ty| match self.registry.kind(*ty) {
                TypeKind::Function { ret, .. } => !self.registry.is_void(*ret),
                _ => false,
            })
            .unwrap_or(false);
        if returns_value && termination != Termination::Terminates {
            let name = self.ast.resolve(name).to_string();
            let diagnostic = Diagnostic::new(
                DiagnosticCode::MissingReturn,
                format!("missing return: not all paths through '{name}' return a value"),
                self.file_span(node.span),
            );
            self.diagnostics.push(diagnostic);
        }
    }

    /// Classify one statement on the termination lattice, reporting
    /// unreachable statements along the way
    fn termination_of(&mut self, id: NodeId) -> Termination {
        let node = self.unit.node(id);
        match node.kind.clone() {
            NodeKind::Return { .. } | NodeKind::Break | NodeKind::Continue => {
                Termination::Terminates
            }
            NodeKind::Block { stmts } => {
                let mut result = Termination::Continues;
                let mut iter = stmts.iter();
                for stmt in iter.by_ref() {
                    let t = self.termination_of(*stmt);
                    match t {
                        Termination::Terminates => {
                            result = Termination::Terminates;
                            break;
                        }
                        Termination::MaybeTerminates => result = Termination::MaybeTerminates,
                        Termination::Continues => {}
                    }
                }
                // everything after a terminating statement is unreachable
                if let Some(first_dead) = iter.next() {
                    let span = self.unit.node(*first_dead).span;
                    let diagnostic = Diagnostic::new(
                        DiagnosticCode::UnreachableCode,
                        "unreachable statement",
                        self.file_span(span),
                    );
                    self.diagnostics.push(diagnostic);
                    // still analyze the dead tail for nested problems
                    self.termination_of(*first_dead);
                    for stmt in iter {
                        self.termination_of(*stmt);
                    }
                }
                result
            }
            NodeKind::If {
                then_block,
                else_block,
                ..
            } => {
                let then_t = self.termination_of(then_block);
                match else_block {
                    Some(else_block) => {
                        let else_t = self.termination_of(else_block);
                        Termination::branch_join(&[then_t, else_t])
                    }
                    None => {
                        if then_t == Termination::Continues {
                            Termination::Continues
                        } else {
                            Termination::MaybeTerminates
                        }
                    }
                }
            }
            NodeKind::Match { arms, .. } => {
                let outcomes: Vec<Termination> = arms
                    .iter()
                    .map(|arm: &MatchArm| self.termination_of(arm.body))
                    .collect();
                Termination::branch_join(&outcomes)
            }
            // loops may run zero times; the body is analyzed for its own
            // diagnostics but the loop itself falls through
            NodeKind::While { body, .. } | NodeKind::For { body, .. } => {
                self.termination_of(body);
                Termination::Continues
            }
            NodeKind::Function { .. } => {
                self.check_function_flow(id);
                Termination::Continues
            }
            _ => Termination::Continues,
        }
    }

    // ==================== Pass 4: residual rules ====================

    fn check_residual_rules(&mut self) {
        let cx = RuleContext {
            ast: self.ast,
            unit: self.unit,
            registry: self.registry,
            symbols: self.symbols,
            inference: self.inference,
        };
        let mut produced = Vec::new();
        for id in self.unit.node_ids() {
            for rule in &self.rules {
                rule.check(&cx, id, &mut produced);
            }
        }
        self.diagnostics.append(&mut produced);
    }
}
