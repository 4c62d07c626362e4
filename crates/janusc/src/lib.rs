//! Janus semantic-analysis core
//!
//! This library is the analysis heart of the Janus compiler: it takes an
//! already-built, read-only AST and produces per-node/per-symbol type
//! annotations plus a diagnostics list. Parsing, IR lowering, codegen and
//! the runtime live in sibling crates.
//!
//! ## Architecture
//!
//! - **Common** (`common/`): spans and fatal error types
//! - **AST** (`ast/`): the flat, interned syntax tree interface the
//!   analyzer consumes
//! - **Sema** (`sema/`): the analysis passes — canonical type registry,
//!   constraint-based inference, match exhaustiveness, profile gating,
//!   scoped symbol table, and the multi-pass validator
//!
//! One [`sema::SemanticAnalyzer`] session analyzes units independently;
//! nothing is shared between sessions, so concurrent analysis is just
//! concurrent sessions.

pub mod ast;
pub mod common;
pub mod sema;

// Re-exports for convenience
pub use ast::{AstStore, NodeId, StrId, Unit, UnitBuilder, UnitId};
pub use common::{SemaError, SemaResult, Span};
pub use sema::{
    AnalyzerConfig, Diagnostic, DiagnosticCode, DiagnosticReporter, Profile, SemanticAnalyzer,
    Severity, TypeId, TypeRegistry,
};
