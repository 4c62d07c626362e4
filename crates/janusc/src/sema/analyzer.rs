//! Analysis sessions
//!
//! One [`SemanticAnalyzer`] serves one AST store. Each analyzed unit gets
//! its own session state — symbol table, type registry, inference bindings,
//! diagnostics — constructed for the `analyze_unit` call and owned
//! exclusively by the session, so analyzing N units concurrently is N
//! independent analyzers with nothing shared. Configuration is an explicit,
//! immutable value resolved by the caller; the core never reads the
//! environment.

use crate::ast::{AstStore, UnitId};
use crate::common::{LineCol, SemaError, SemaResult, Span};
use crate::sema::diagnostics::{Diagnostic, DiagnosticCode, FileSpan, Suggestion};
use crate::sema::infer::{InferenceEngine, InferenceOutput};
use crate::sema::profile::{Profile, ProfileManager};
use crate::sema::scope::{SymbolId, SymbolKind, SymbolTable, Visibility};
use crate::sema::types::TypeRegistry;
use crate::sema::validate::Validator;
use std::collections::HashMap;
use std::time::Instant;
use tracing::debug;

/// Immutable session configuration, supplied by the caller
#[derive(Debug, Clone)]
pub struct AnalyzerConfig {
    /// Language profile the unit is checked against
    pub profile: Profile,
    /// Whether NPU-gated features are available
    pub npu_enabled: bool,
    /// Upper bound on solver fixpoint passes
    pub max_solver_passes: usize,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            profile: Profile::Sovereign,
            npu_enabled: false,
            max_solver_passes: 64,
        }
    }
}

/// Aggregate counters across every unit this analyzer has processed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Statistics {
    pub units_analyzed: u64,
    pub symbols_resolved: u64,
    pub types_inferred: u64,
    pub errors_found: u64,
    pub elapsed_ms: u64,
}

/// Hover-style information about the symbol at a position
#[derive(Debug, Clone, PartialEq)]
pub struct SemanticInfo {
    pub symbol_name: String,
    pub symbol_kind: SymbolKind,
    pub type_signature: Option<String>,
    pub definition_span: FileSpan,
    pub visibility: Visibility,
}

/// One entry of the error report surface
#[derive(Debug, Clone)]
pub struct SemanticError {
    pub kind: DiagnosticCode,
    pub message: String,
    pub span: FileSpan,
    pub suggestions: Vec<Suggestion>,
}

/// Everything a finished session leaves behind for queries
struct UnitAnalysis {
    registry: TypeRegistry,
    symbols: SymbolTable,
    inference: InferenceOutput,
    diagnostics: Vec<Diagnostic>,
}

/// The semantic-analysis entry point
pub struct SemanticAnalyzer<'a> {
    ast: &'a AstStore,
    config: AnalyzerConfig,
    sessions: HashMap<UnitId, UnitAnalysis>,
    stats: Statistics,
}

impl<'a> SemanticAnalyzer<'a> {
    pub fn new(ast: &'a AstStore, config: AnalyzerConfig) -> Self {
        Self {
            ast,
            config,
            sessions: HashMap::new(),
            stats: Statistics::default(),
        }
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    /// Analyze one unit: register declarations, infer types, validate.
    ///
    /// Semantic mistakes land in the unit's diagnostics list; an `Err` here
    /// means the session hit a state it could not continue from (malformed
    /// AST, broken invariant) and was abandoned rather than left partially
    /// built.
    pub fn analyze_unit(&mut self, unit_id: UnitId) -> SemaResult<()> {
        let started = Instant::now();
        let unit = self.ast.unit(unit_id).ok_or(SemaError::UnknownUnit {
            unit: unit_id.raw(),
        })?;
        debug!(unit = unit_id.raw(), file = %unit.file, "analyzing unit");

        let mut registry = TypeRegistry::new();
        let mut symbols = SymbolTable::new();
        let mut diagnostics = Vec::new();

        let engine = InferenceEngine::new(
            self.ast,
            unit,
            &mut registry,
            &mut symbols,
            &mut diagnostics,
            self.config.max_solver_passes,
        );
        let inference = engine.run()?;

        let mut profiles = ProfileManager::new(self.config.profile, self.config.npu_enabled);
        Validator::new(
            self.ast,
            unit,
            &registry,
            &symbols,
            &inference,
            &mut profiles,
            &mut diagnostics,
        )
        .run();

        self.stats.units_analyzed += 1;
        self.stats.symbols_resolved += inference.resolutions.len() as u64;
        self.stats.types_inferred += inference
            .node_types
            .values()
            .filter(|ty| registry.is_inference_var(**ty).is_none())
            .count() as u64;
        self.stats.errors_found += diagnostics.iter().filter(|d| d.is_error()).count() as u64;
        self.stats.elapsed_ms += started.elapsed().as_millis() as u64;

        self.sessions.insert(
            unit_id,
            UnitAnalysis {
                registry,
                symbols,
                inference,
                diagnostics,
            },
        );
        Ok(())
    }

    /// Whether a unit has been analyzed and has no errors (warnings never
    /// block)
    pub fn is_valid(&self, unit: UnitId) -> bool {
        self.sessions
            .get(&unit)
            .is_some_and(|s| !s.diagnostics.iter().any(Diagnostic::is_error))
    }

    /// All diagnostics recorded for a unit, in emission order
    pub fn diagnostics(&self, unit: UnitId) -> &[Diagnostic] {
        self.sessions
            .get(&unit)
            .map(|s| s.diagnostics.as_slice())
            .unwrap_or(&[])
    }

    /// Deep-copy the diagnostics out of the session. The returned list is
    /// caller-owned and stays valid after the analyzer is dropped.
    pub fn take_diagnostics(&mut self, unit: UnitId) -> Vec<Diagnostic> {
        self.sessions
            .get_mut(&unit)
            .map(|s| std::mem::take(&mut s.diagnostics))
            .unwrap_or_default()
    }

    /// The error-severity subset, shaped for tooling
    pub fn semantic_errors(&self, unit: UnitId) -> Vec<SemanticError> {
        self.diagnostics(unit)
            .iter()
            .filter(|d| d.is_error())
            .map(|d| SemanticError {
                kind: d.code,
                message: d.message.clone(),
                span: d.primary.clone(),
                suggestions: d.suggestions.clone(),
            })
            .collect()
    }

    /// Hover lookup: the symbol under `file:line:col`, if any
    pub fn semantic_info(&self, file: &str, line: u32, col: u32) -> Option<SemanticInfo> {
        let (unit_id, unit) = self.ast.units().find(|(_, u)| u.file == file)?;
        let session = self.sessions.get(&unit_id)?;
        let offset = unit.offset_at(LineCol::new(line, col))?;

        // smallest resolved node covering the position wins
        let mut best: Option<(Span, SymbolId)> = None;
        for (node_id, symbol_id) in &session.inference.resolutions {
            let span = unit.node(*node_id).span;
            if span.contains(offset)
                && best.is_none_or(|(current, _)| span.len() < current.len())
            {
                best = Some((span, *symbol_id));
            }
        }
        let (_, symbol_id) = best?;
        let symbol = session.symbols.symbol(symbol_id);

        Some(SemanticInfo {
            symbol_name: self.ast.resolve(symbol.name).to_string(),
            symbol_kind: symbol.kind,
            type_signature: symbol
                .ty
                .map(|ty| session.registry.display(ty, self.ast.interner())),
            definition_span: FileSpan::of(unit, symbol.declaration_span),
            visibility: symbol.visibility,
        })
    }

    pub fn statistics(&self) -> Statistics {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{
        AstStore, BinaryOp, LiteralValue, MemorySpace, TypeExpr, UnaryOp, UnitBuilder,
    };
    use crate::sema::types::{TypeId, TypeKind};
    use pretty_assertions::assert_eq;

    fn analyze_with(
        config: AnalyzerConfig,
        build: impl FnOnce(&mut UnitBuilder<'_>),
    ) -> (AstStore, UnitId, Vec<Diagnostic>) {
        let mut ast = AstStore::new();
        let mut builder = ast.build_unit("test.jns");
        build(&mut builder);
        let unit = builder.finish();

        let mut analyzer = SemanticAnalyzer::new(&ast, config);
        analyzer.analyze_unit(unit).expect("analysis completes");
        let diagnostics = analyzer.take_diagnostics(unit);
        drop(analyzer);
        (ast, unit, diagnostics)
    }

    fn analyze(build: impl FnOnce(&mut UnitBuilder<'_>)) -> (AstStore, UnitId, Vec<Diagnostic>) {
        analyze_with(AnalyzerConfig::default(), build)
    }

    fn codes(diagnostics: &[Diagnostic]) -> Vec<DiagnosticCode> {
        diagnostics.iter().map(|d| d.code).collect()
    }

    fn named(b: &mut UnitBuilder<'_>, name: &str) -> TypeExpr {
        TypeExpr::Named(b.intern(name))
    }

    // ==================== Inference ====================

    #[test]
    fn literal_types_flow_into_let() {
        let (_, _, diagnostics) = analyze(|b| {
            let one = b.int(1);
            let x = b.let_binding("x", false, None, Some(one));
            b.root(x);
            let use_x = b.ident("x");
            let two = b.int(2);
            let sum = b.binary(BinaryOp::Add, use_x, two);
            let y = b.let_binding("y", false, None, Some(sum));
            b.root(y);
        });
        assert!(diagnostics.is_empty(), "unexpected: {diagnostics:?}");
    }

    #[test]
    fn annotation_accepts_widening_initializer() {
        let (_, _, diagnostics) = analyze(|b| {
            let one = b.int(1);
            let annotation = named(b, "i64");
            let x = b.let_binding("x", false, Some(annotation), Some(one));
            b.root(x);
        });
        assert!(diagnostics.is_empty(), "unexpected: {diagnostics:?}");
    }

    #[test]
    fn annotation_rejects_narrowing_initializer() {
        let (_, _, diagnostics) = analyze(|b| {
            let v = b.float(1.5);
            let annotation = named(b, "i32");
            let x = b.let_binding("x", false, Some(annotation), Some(v));
            b.root(x);
        });
        assert_eq!(codes(&diagnostics), vec![DiagnosticCode::TypeMismatch]);
    }

    #[test]
    fn deferred_initialization_resolves_through_assignment() {
        let (_, _, diagnostics) = analyze(|b| {
            let x = b.let_binding("x", false, None, None);
            b.root(x);
            let target = b.ident("x");
            let five = b.int(5);
            let assign = b.assign(target, five);
            b.root(assign);
        });
        assert!(diagnostics.is_empty(), "unexpected: {diagnostics:?}");
    }

    #[test]
    fn uninferable_symbol_is_reported() {
        let (_, _, diagnostics) = analyze(|b| {
            let x = b.let_binding("x", false, None, None);
            b.root(x);
        });
        assert_eq!(codes(&diagnostics), vec![DiagnosticCode::CannotInferType]);
    }

    #[test]
    fn function_call_infers_result_and_checks_arity() {
        let (_, _, diagnostics) = analyze(|b| {
            // fn double(n: i32) -> i32 { return n + n }
            let n1 = b.ident("n");
            let n2 = b.ident("n");
            let sum = b.binary(BinaryOp::Add, n1, n2);
            let ret = b.ret(Some(sum));
            let body = b.block(vec![ret]);
            let n_ty = named(b, "i32");
            let param = b.param("n", Some(n_ty));
            let ret_ty = named(b, "i32");
            let f = b.function("double", vec![param], Some(ret_ty), body);
            b.root(f);

            // let a = double(21)
            let callee = b.ident("double");
            let arg = b.int(21);
            let call = b.call(callee, vec![arg]);
            let a = b.let_binding("a", false, None, Some(call));
            b.root(a);

            // double(1, 2) — one argument too many
            let callee = b.ident("double");
            let one = b.int(1);
            let two = b.int(2);
            let bad = b.call(callee, vec![one, two]);
            let c = b.let_binding("c", false, None, Some(bad));
            b.root(c);
        });
        assert_eq!(
            codes(&diagnostics),
            vec![
                DiagnosticCode::ArgumentCountMismatch,
                // the bad call's result variable never resolves
                DiagnosticCode::CannotInferType,
            ]
        );
    }

    #[test]
    fn calling_a_non_function_is_reported() {
        let (_, _, diagnostics) = analyze(|b| {
            let one = b.int(1);
            let x = b.let_binding("x", false, None, Some(one));
            b.root(x);
            let callee = b.ident("x");
            let call = b.call(callee, vec![]);
            let y = b.let_binding("y", false, None, Some(call));
            b.root(y);
        });
        assert!(codes(&diagnostics).contains(&DiagnosticCode::NotAFunction));
    }

    #[test]
    fn indexing_arrays_and_rejecting_scalars() {
        let (_, _, diagnostics) = analyze(|b| {
            let e0 = b.int(1);
            let e1 = b.int(2);
            let arr = b.array(vec![e0, e1]);
            let xs = b.let_binding("xs", false, None, Some(arr));
            b.root(xs);

            let base = b.ident("xs");
            let idx = b.int(0);
            let elem = b.index(base, idx);
            let first = b.let_binding("first", false, None, Some(elem));
            b.root(first);

            // indexing an i32
            let one = b.int(1);
            let n = b.let_binding("n", false, None, Some(one));
            b.root(n);
            let base = b.ident("n");
            let idx = b.int(0);
            let bad = b.index(base, idx);
            let oops = b.let_binding("oops", false, None, Some(bad));
            b.root(oops);
        });
        assert!(codes(&diagnostics).contains(&DiagnosticCode::NotIndexable));
        assert!(!codes(&diagnostics).contains(&DiagnosticCode::TypeMismatch));
    }

    #[test]
    fn field_access_on_structs() {
        let (_, _, diagnostics) = analyze(|b| {
            let x_ty = named(b, "i32");
            let y_ty = named(b, "i32");
            let fx = b.field_def("x", x_ty);
            let fy = b.field_def("y", y_ty);
            let decl = b.struct_decl("Point", vec![fx, fy]);
            b.root(decl);

            let p_ty = named(b, "Point");
            let p = b.let_binding("p", false, Some(p_ty), None);
            b.root(p);
            // p gets assigned elsewhere; reads here only drive inference
            let base = b.ident("p");
            let good = b.field(base, "x");
            let a = b.let_binding("a", false, None, Some(good));
            b.root(a);

            let base = b.ident("p");
            let bad = b.field(base, "z");
            let c = b.let_binding("c", false, None, Some(bad));
            b.root(c);
        });
        let codes = codes(&diagnostics);
        assert!(codes.contains(&DiagnosticCode::FieldNotFound));
        // the z access also leaves its result unresolved
        assert!(codes.contains(&DiagnosticCode::CannotInferType));
    }

    #[test]
    fn field_access_on_non_struct_is_reported() {
        let (_, _, diagnostics) = analyze(|b| {
            let one = b.int(1);
            let n = b.let_binding("n", false, None, Some(one));
            b.root(n);
            let base = b.ident("n");
            let bad = b.field(base, "x");
            let y = b.let_binding("y", false, None, Some(bad));
            b.root(y);
        });
        assert!(codes(&diagnostics).contains(&DiagnosticCode::TypeNotStruct));
    }

    #[test]
    fn undefined_symbol_gets_suggestions() {
        let (_, _, diagnostics) = analyze(|b| {
            let one = b.int(1);
            let counter = b.let_binding("counter", false, None, Some(one));
            b.root(counter);
            let typo = b.ident("countr");
            let x = b.let_binding("x", false, None, Some(typo));
            b.root(x);
        });
        let undefined: Vec<&Diagnostic> = diagnostics
            .iter()
            .filter(|d| d.code == DiagnosticCode::UndefinedSymbol)
            .collect();
        assert_eq!(undefined.len(), 1);
        assert_eq!(undefined[0].suggestions.len(), 1);
        assert_eq!(undefined[0].suggestions[0].replacement.as_deref(), Some("counter"));
    }

    #[test]
    fn duplicate_definition_and_legal_shadowing() {
        let (_, _, diagnostics) = analyze(|b| {
            let one = b.int(1);
            let first = b.let_binding("x", false, None, Some(one));
            b.root(first);
            let two = b.int(2);
            let second = b.let_binding("x", false, None, Some(two));
            b.root(second);

            // shadowing inside a block is fine
            let three = b.int(3);
            let inner = b.let_binding("x", false, None, Some(three));
            let block = b.block(vec![inner]);
            b.root(block);
        });
        assert_eq!(codes(&diagnostics), vec![DiagnosticCode::DuplicateDefinition]);
    }

    #[test]
    fn for_loops_iterate_ranges_and_arrays() {
        let (_, _, diagnostics) = analyze(|b| {
            let lo = b.int(0);
            let hi = b.int(10);
            let range = b.binary(BinaryOp::RangeExclusive, lo, hi);
            let i = b.ident("i");
            let one = b.int(1);
            let sum = b.binary(BinaryOp::Add, i, one);
            let x = b.let_binding("x", false, None, Some(sum));
            let body = b.block(vec![x]);
            let loop_ = b.for_stmt("i", range, body);
            b.root(loop_);
        });
        assert!(diagnostics.is_empty(), "unexpected: {diagnostics:?}");
    }

    #[test]
    fn logical_operators_demand_bools() {
        let (_, _, diagnostics) = analyze(|b| {
            let t = b.boolean(true);
            let one = b.int(1);
            let and = b.binary(BinaryOp::And, t, one);
            let x = b.let_binding("x", false, None, Some(and));
            b.root(x);
        });
        assert_eq!(codes(&diagnostics), vec![DiagnosticCode::TypeMismatch]);
    }

    // ==================== Exhaustiveness through the pipeline ====================

    #[test]
    fn bool_match_missing_false_is_a_hard_error() {
        let (_, _, diagnostics) = analyze(|b| {
            let flag = b.boolean(true);
            let scrutinee = b.let_binding("flag", false, None, Some(flag));
            b.root(scrutinee);

            let read = b.ident("flag");
            let pat = b.literal_pattern(LiteralValue::Bool(true));
            let body = b.block(vec![]);
            let arm = b.arm(pat, body);
            let m = b.match_stmt(read, vec![arm]);
            b.root(m);
        });
        let non_exhaustive: Vec<&Diagnostic> = diagnostics
            .iter()
            .filter(|d| d.code == DiagnosticCode::NonExhaustiveMatch)
            .collect();
        assert_eq!(non_exhaustive.len(), 1);
        assert!(non_exhaustive[0].is_error());
        assert!(non_exhaustive[0].message.contains("false"));
    }

    #[test]
    fn int_match_without_wildcard_reports_missing_wildcard() {
        let (_, _, diagnostics) = analyze(|b| {
            let n = b.int(3);
            let scrutinee = b.let_binding("n", false, None, Some(n));
            b.root(scrutinee);

            let read = b.ident("n");
            let p0 = b.literal_pattern(LiteralValue::Int(0));
            let b0 = b.block(vec![]);
            let arm0 = b.arm(p0, b0);
            let p1 = b.literal_pattern(LiteralValue::Int(1));
            let b1 = b.block(vec![]);
            let arm1 = b.arm(p1, b1);
            let m = b.match_stmt(read, vec![arm0, arm1]);
            b.root(m);
        });
        let non_exhaustive: Vec<&Diagnostic> = diagnostics
            .iter()
            .filter(|d| d.code == DiagnosticCode::NonExhaustiveMatch)
            .collect();
        assert_eq!(non_exhaustive.len(), 1);
        assert!(non_exhaustive[0].message.contains('_'));
    }

    #[test]
    fn wildcard_and_binding_arms_close_any_match() {
        let (_, _, diagnostics) = analyze(|b| {
            let n = b.int(3);
            let scrutinee = b.let_binding("n", false, None, Some(n));
            b.root(scrutinee);

            let read = b.ident("n");
            let p0 = b.literal_pattern(LiteralValue::Int(0));
            let b0 = b.block(vec![]);
            let arm0 = b.arm(p0, b0);
            // binding arm: reads the bound value in its body
            let pat = b.binding_pattern("other");
            let use_other = b.ident("other");
            let rebound = b.let_binding("copy", false, None, Some(use_other));
            let body = b.block(vec![rebound]);
            let arm1 = b.arm(pat, body);
            let m = b.match_stmt(read, vec![arm0, arm1]);
            b.root(m);
        });
        assert!(diagnostics.is_empty(), "unexpected: {diagnostics:?}");
    }

    // ==================== Definite assignment ====================

    #[test]
    fn read_before_assignment_is_reported_with_context() {
        let (_, _, diagnostics) = analyze(|b| {
            let x = b.let_binding("x", false, None, None);
            b.root(x);
            let read = b.ident("x");
            let y = b.let_binding("y", false, None, Some(read));
            b.root(y);
            // assign later so inference can still type it
            let target = b.ident("x");
            let one = b.int(1);
            let assign = b.assign(target, one);
            b.root(assign);
        });
        let use_before: Vec<&Diagnostic> = diagnostics
            .iter()
            .filter(|d| d.code == DiagnosticCode::UseBeforeDefinition)
            .collect();
        assert_eq!(use_before.len(), 1);
        assert_eq!(use_before[0].secondary.len(), 1);
    }

    #[test]
    fn initialized_declaration_reads_cleanly() {
        let (_, _, diagnostics) = analyze(|b| {
            let one = b.int(1);
            let x = b.let_binding("x", false, None, Some(one));
            b.root(x);
            let read = b.ident("x");
            let y = b.let_binding("y", false, None, Some(read));
            b.root(y);
        });
        assert!(diagnostics.is_empty(), "unexpected: {diagnostics:?}");
    }

    #[test]
    fn assignment_in_one_branch_does_not_initialize() {
        let (_, _, diagnostics) = analyze(|b| {
            let x = b.let_binding("x", false, None, None);
            b.root(x);
            let cond = b.boolean(true);
            let target = b.ident("x");
            let one = b.int(1);
            let assign = b.assign(target, one);
            let then_block = b.block(vec![assign]);
            let if_ = b.if_stmt(cond, then_block, None);
            b.root(if_);
            let read = b.ident("x");
            let y = b.let_binding("y", false, None, Some(read));
            b.root(y);
        });
        assert!(codes(&diagnostics).contains(&DiagnosticCode::UseBeforeDefinition));
    }

    #[test]
    fn assignment_in_both_branches_initializes() {
        let (_, _, diagnostics) = analyze(|b| {
            let x = b.let_binding("x", true, None, None);
            b.root(x);
            let cond = b.boolean(true);
            let t1 = b.ident("x");
            let one = b.int(1);
            let a1 = b.assign(t1, one);
            let then_block = b.block(vec![a1]);
            let t2 = b.ident("x");
            let two = b.int(2);
            let a2 = b.assign(t2, two);
            let else_block = b.block(vec![a2]);
            let if_ = b.if_stmt(cond, then_block, Some(else_block));
            b.root(if_);
            let read = b.ident("x");
            let y = b.let_binding("y", false, None, Some(read));
            b.root(y);
        });
        assert!(diagnostics.is_empty(), "unexpected: {diagnostics:?}");
    }

    // ==================== Control flow ====================

    #[test]
    fn trailing_statements_after_return_are_unreachable() {
        let (_, _, diagnostics) = analyze(|b| {
            let one = b.int(1);
            let ret = b.ret(Some(one));
            let dead = b.int(2);
            let dead_let = b.let_binding("dead", false, None, Some(dead));
            let body = b.block(vec![ret, dead_let]);
            let ret_ty = named(b, "i32");
            let f = b.function("f", vec![], Some(ret_ty), body);
            b.root(f);
        });
        let warnings: Vec<&Diagnostic> = diagnostics
            .iter()
            .filter(|d| d.code == DiagnosticCode::UnreachableCode)
            .collect();
        assert_eq!(warnings.len(), 1);
        assert!(!warnings[0].is_error());
        // the block still terminates, so the return value is covered
        assert!(!codes(&diagnostics).contains(&DiagnosticCode::MissingReturn));
    }

    #[test]
    fn one_returning_branch_is_a_missing_return() {
        let (_, _, diagnostics) = analyze(|b| {
            let cond = b.boolean(true);
            let one = b.int(1);
            let ret = b.ret(Some(one));
            let then_block = b.block(vec![ret]);
            let if_ = b.if_stmt(cond, then_block, None);
            let body = b.block(vec![if_]);
            let ret_ty = named(b, "i32");
            let f = b.function("f", vec![], Some(ret_ty), body);
            b.root(f);
        });
        assert!(codes(&diagnostics).contains(&DiagnosticCode::MissingReturn));
    }

    #[test]
    fn both_branches_returning_terminates() {
        let (_, _, diagnostics) = analyze(|b| {
            let cond = b.boolean(true);
            let one = b.int(1);
            let r1 = b.ret(Some(one));
            let then_block = b.block(vec![r1]);
            let two = b.int(2);
            let r2 = b.ret(Some(two));
            let else_block = b.block(vec![r2]);
            let if_ = b.if_stmt(cond, then_block, Some(else_block));
            let body = b.block(vec![if_]);
            let ret_ty = named(b, "i32");
            let f = b.function("f", vec![], Some(ret_ty), body);
            b.root(f);
        });
        assert!(diagnostics.is_empty(), "unexpected: {diagnostics:?}");
    }

    #[test]
    fn void_functions_need_no_return() {
        let (_, _, diagnostics) = analyze(|b| {
            let one = b.int(1);
            let x = b.let_binding("x", false, None, Some(one));
            let body = b.block(vec![x]);
            let f = b.function("setup", vec![], None, body);
            b.root(f);
        });
        assert!(diagnostics.is_empty(), "unexpected: {diagnostics:?}");
    }

    // ==================== Profiles ====================

    #[test]
    fn sovereign_feature_under_core_profile() {
        let config = AnalyzerConfig {
            profile: Profile::Core,
            ..AnalyzerConfig::default()
        };
        let (_, _, diagnostics) = analyze_with(config, |b| {
            let one = b.int(1);
            let x = b.let_binding("x", false, None, Some(one));
            b.root(x);
            let read = b.ident("x");
            let addr = b.unary(UnaryOp::AddressOf, read);
            let p = b.let_binding("p", false, None, Some(addr));
            b.root(p);
        });
        let violations: Vec<&Diagnostic> = diagnostics
            .iter()
            .filter(|d| d.code == DiagnosticCode::ProfileViolation)
            .collect();
        assert!(!violations.is_empty());
        assert!(violations
            .iter()
            .any(|d| d.message.contains("sovereign") && d.message.contains("core")));
    }

    #[test]
    fn same_construct_under_sovereign_is_clean() {
        let (_, _, diagnostics) = analyze(|b| {
            let one = b.int(1);
            let x = b.let_binding("x", false, None, Some(one));
            b.root(x);
            let read = b.ident("x");
            let addr = b.unary(UnaryOp::AddressOf, read);
            let p = b.let_binding("p", false, None, Some(addr));
            b.root(p);
        });
        assert!(
            !codes(&diagnostics).contains(&DiagnosticCode::ProfileViolation),
            "unexpected: {diagnostics:?}"
        );
    }

    #[test]
    fn device_tensor_annotation_needs_the_npu_gate() {
        let config = AnalyzerConfig {
            profile: Profile::Compute,
            npu_enabled: false,
            ..AnalyzerConfig::default()
        };
        let (_, _, diagnostics) = analyze_with(config, |b| {
            let element = Box::new(named(b, "f32"));
            let annotation = TypeExpr::Tensor {
                element,
                dims: vec![8, 16],
                space: MemorySpace::Device,
            };
            let t = b.let_binding("t", false, Some(annotation), None);
            b.root(t);
        });
        assert!(codes(&diagnostics).contains(&DiagnosticCode::NpuGateViolation));
    }

    // ==================== Residual rules ====================

    #[test]
    fn reassigning_an_initialized_immutable_is_an_error() {
        let (_, _, diagnostics) = analyze(|b| {
            let one = b.int(1);
            let x = b.let_binding("x", false, None, Some(one));
            b.root(x);
            let target = b.ident("x");
            let two = b.int(2);
            let assign = b.assign(target, two);
            b.root(assign);
        });
        assert_eq!(codes(&diagnostics), vec![DiagnosticCode::ImmutableAssignment]);
    }

    #[test]
    fn mutable_reassignment_is_fine() {
        let (_, _, diagnostics) = analyze(|b| {
            let one = b.int(1);
            let x = b.let_binding("x", true, None, Some(one));
            b.root(x);
            let target = b.ident("x");
            let two = b.int(2);
            let assign = b.assign(target, two);
            b.root(assign);
        });
        assert!(diagnostics.is_empty(), "unexpected: {diagnostics:?}");
    }

    #[test]
    fn range_endpoints_must_match_exactly() {
        let (_, _, diagnostics) = analyze(|b| {
            let lo = b.int(0);
            let hi_annotation = named(b, "i64");
            let hi_decl = b.let_binding("hi", false, Some(hi_annotation), None);
            b.root(hi_decl);
            let hi = b.ident("hi");
            let range = b.binary(BinaryOp::RangeExclusive, lo, hi);
            let r = b.let_binding("r", false, None, Some(range));
            b.root(r);
        });
        assert!(codes(&diagnostics).contains(&DiagnosticCode::TypeMismatch));
    }

    // ==================== Queries ====================

    #[test]
    fn hover_reports_symbol_and_type() {
        let mut ast = AstStore::new();
        let mut builder = ast.build_unit("hover.jns");
        let one = builder.int(1);
        let decl = builder.let_binding("answer", false, None, Some(one));
        builder.root(decl);
        let read_id = builder.ident("answer");
        let copy = builder.let_binding("copy", false, None, Some(read_id));
        builder.root(copy);
        let unit = builder.finish();

        let mut analyzer = SemanticAnalyzer::new(&ast, AnalyzerConfig::default());
        analyzer.analyze_unit(unit).unwrap();

        let span = ast.unit(unit).unwrap().node(read_id).span;
        let position = ast.unit(unit).unwrap().line_col(span.start);
        let info = analyzer
            .semantic_info("hover.jns", position.line, position.col)
            .expect("symbol under cursor");
        assert_eq!(info.symbol_name, "answer");
        assert_eq!(info.symbol_kind, SymbolKind::Variable);
        assert_eq!(info.type_signature.as_deref(), Some("i32"));
        assert_eq!(info.visibility, Visibility::Private);
    }

    #[test]
    fn statistics_accumulate_per_unit() {
        let mut ast = AstStore::new();
        let mut builder = ast.build_unit("stats.jns");
        let one = builder.int(1);
        let x = builder.let_binding("x", false, None, Some(one));
        builder.root(x);
        let read = builder.ident("x");
        let y = builder.let_binding("y", false, None, Some(read));
        builder.root(y);
        let unit = builder.finish();

        let mut analyzer = SemanticAnalyzer::new(&ast, AnalyzerConfig::default());
        analyzer.analyze_unit(unit).unwrap();
        let stats = analyzer.statistics();
        assert_eq!(stats.units_analyzed, 1);
        assert!(stats.symbols_resolved >= 3);
        assert!(stats.types_inferred >= 4);
        assert_eq!(stats.errors_found, 0);
    }

    #[test]
    fn unknown_unit_is_a_fatal_error() {
        let ast = AstStore::new();
        let mut analyzer = SemanticAnalyzer::new(&ast, AnalyzerConfig::default());
        let missing = {
            // no units were built; forge an id via a store round trip
            let mut other = AstStore::new();
            other.build_unit("ghost.jns").finish()
        };
        assert!(matches!(
            analyzer.analyze_unit(missing),
            Err(SemaError::UnknownUnit { .. })
        ));
    }

    #[test]
    fn array_types_are_canonical_across_expressions() {
        let mut ast = AstStore::new();
        let mut builder = ast.build_unit("canon.jns");
        let a0 = builder.int(1);
        let a1 = builder.int(2);
        let first = builder.array(vec![a0, a1]);
        let xs = builder.let_binding("xs", false, None, Some(first));
        builder.root(xs);
        let b0 = builder.int(3);
        let b1 = builder.int(4);
        let second = builder.array(vec![b0, b1]);
        let ys = builder.let_binding("ys", false, None, Some(second));
        builder.root(ys);
        let first_node = first;
        let second_node = second;
        let unit = builder.finish();

        let mut analyzer = SemanticAnalyzer::new(&ast, AnalyzerConfig::default());
        analyzer.analyze_unit(unit).unwrap();
        let session = analyzer.sessions.get(&unit).unwrap();
        let a = session.inference.node_types[&first_node];
        let b = session.inference.node_types[&second_node];
        assert_eq!(a, b);
        assert!(matches!(
            session.registry.kind(a),
            TypeKind::Array {
                element: TypeId::I32,
                len: 2
            }
        ));
    }
}
