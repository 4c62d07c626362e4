//! Semantic analysis: types, inference, exhaustiveness, profiles, validation

pub mod analyzer;
pub mod diagnostics;
pub mod exhaustive;
pub mod infer;
pub mod profile;
pub mod scope;
pub mod shape;
pub mod types;
pub mod validate;

pub use analyzer::{AnalyzerConfig, SemanticAnalyzer, SemanticError, SemanticInfo, Statistics};
pub use diagnostics::{Diagnostic, DiagnosticCode, DiagnosticReporter, Severity, Suggestion};
pub use exhaustive::{check_exhaustiveness, ExhaustivenessReport, Pattern, PatternLiteral};
pub use infer::{Bindings, Constraint, InferenceEngine, InferenceOutput};
pub use profile::{Feature, Profile, ProfileManager, TypeRestriction};
pub use scope::{ScopeId, Symbol, SymbolId, SymbolKind, SymbolTable, Visibility};
pub use shape::{compute_broadcast_shape, is_broadcastable, is_shape_divisible_by, shapes_equal};
pub use types::{PrimitiveKind, TypeId, TypeInfo, TypeKind, TypeRegistry};
pub use validate::{Termination, ValidationRule, Validator};
