//! Match-arm exhaustiveness checking
//!
//! Runs after inference has resolved the scrutinee type. For `bool` it
//! checks literal coverage; every other scrutinee — integers, floats,
//! strings, compound or unrecognized types — has an effectively infinite or
//! unenumerated domain and requires an explicit wildcard. A non-exhaustive
//! match is a hard compile error: the language's coverage guarantee depends
//! on it never being downgraded to a warning.
//!
//! The pattern type here is deliberately independent of both the AST's
//! pattern nodes and the type system: the checker answers one question and
//! owns the vocabulary it answers it in.

use crate::ast::{Interner, StrId};
use crate::sema::types::{PrimitiveKind, TypeId, TypeKind, TypeRegistry};

/// Literal payloads a pattern can test against
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PatternLiteral {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(StrId),
}

/// Abstract shape of one match arm's left-hand side
#[derive(Debug, Clone, PartialEq)]
pub enum Pattern {
    /// `_` — matches anything
    Wildcard,
    /// A literal that must compare equal to the scrutinee
    Literal(PatternLiteral),
    /// A bare name — matches anything and binds it
    Identifier(StrId),
    /// An enum variant tag
    Variant(StrId),
    Tuple(Vec<Pattern>),
    Struct(Vec<(StrId, Pattern)>),
}

impl Pattern {
    /// Whether this pattern alone covers every value of any scrutinee
    pub fn is_catch_all(&self) -> bool {
        matches!(self, Self::Wildcard | Self::Identifier(_))
    }

    /// Render for a missing-pattern diagnostic
    pub fn render(&self, interner: &Interner) -> String {
        match self {
            Self::Wildcard => "_".to_string(),
            Self::Literal(PatternLiteral::Bool(v)) => v.to_string(),
            Self::Literal(PatternLiteral::Int(v)) => v.to_string(),
            Self::Literal(PatternLiteral::Float(v)) => v.to_string(),
            Self::Literal(PatternLiteral::Str(s)) => {
                format!("\"{}\"", interner.resolve(*s).unwrap_or("?"))
            }
            Self::Identifier(name) | Self::Variant(name) => {
                interner.resolve(*name).unwrap_or("?").to_string()
            }
            Self::Tuple(elements) => {
                let inner: Vec<String> = elements.iter().map(|p| p.render(interner)).collect();
                format!("({})", inner.join(", "))
            }
            Self::Struct(fields) => {
                let inner: Vec<String> = fields
                    .iter()
                    .map(|(name, p)| {
                        format!(
                            "{}: {}",
                            interner.resolve(*name).unwrap_or("?"),
                            p.render(interner)
                        )
                    })
                    .collect();
                format!("{{ {} }}", inner.join(", "))
            }
        }
    }
}

/// Verdict of an exhaustiveness check
///
/// When not exhaustive, `missing` enumerates concrete patterns that would
/// complete the match — never an empty list.
#[derive(Debug, Clone, PartialEq)]
pub struct ExhaustivenessReport {
    pub is_exhaustive: bool,
    pub missing: Vec<Pattern>,
}

impl ExhaustivenessReport {
    fn exhaustive() -> Self {
        Self {
            is_exhaustive: true,
            missing: Vec::new(),
        }
    }

    fn missing(missing: Vec<Pattern>) -> Self {
        debug_assert!(!missing.is_empty());
        Self {
            is_exhaustive: false,
            missing,
        }
    }
}

/// Check whether `patterns` covers every value of `scrutinee`
pub fn check_exhaustiveness(
    registry: &TypeRegistry,
    scrutinee: TypeId,
    patterns: &[Pattern],
) -> ExhaustivenessReport {
    // A catch-all anywhere in the arm list settles it for any scrutinee
    if patterns.iter().any(Pattern::is_catch_all) {
        return ExhaustivenessReport::exhaustive();
    }

    match registry.kind(scrutinee) {
        TypeKind::Primitive(PrimitiveKind::Bool) => check_bool(patterns),
        // Everything else is an infinite or unenumerated domain: an
        // explicit wildcard is the only way to close the match.
        // Enum-variant, Optional and nested tuple/struct coverage would
        // slot in here as further arms.
        _ => ExhaustivenessReport::missing(vec![Pattern::Wildcard]),
    }
}

fn check_bool(patterns: &[Pattern]) -> ExhaustivenessReport {
    let mut has_true = false;
    let mut has_false = false;

    for pattern in patterns {
        match pattern {
            Pattern::Literal(PatternLiteral::Bool(true)) => has_true = true,
            Pattern::Literal(PatternLiteral::Bool(false)) => has_false = true,
            _ => {}
        }
    }

    let mut missing = Vec::new();
    if !has_true {
        missing.push(Pattern::Literal(PatternLiteral::Bool(true)));
    }
    if !has_false {
        missing.push(Pattern::Literal(PatternLiteral::Bool(false)));
    }

    if missing.is_empty() {
        ExhaustivenessReport::exhaustive()
    } else {
        ExhaustivenessReport::missing(missing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sema::types::PrimitiveKind;
    use pretty_assertions::assert_eq;

    fn lit_bool(v: bool) -> Pattern {
        Pattern::Literal(PatternLiteral::Bool(v))
    }

    fn lit_int(v: i64) -> Pattern {
        Pattern::Literal(PatternLiteral::Int(v))
    }

    #[test]
    fn both_bool_literals_are_exhaustive() {
        let registry = TypeRegistry::new();
        let report =
            check_exhaustiveness(&registry, TypeId::BOOL, &[lit_bool(true), lit_bool(false)]);
        assert!(report.is_exhaustive);
        assert!(report.missing.is_empty());
    }

    #[test]
    fn single_bool_literal_reports_the_other() {
        let registry = TypeRegistry::new();
        let report = check_exhaustiveness(&registry, TypeId::BOOL, &[lit_bool(true)]);
        assert!(!report.is_exhaustive);
        assert_eq!(report.missing, vec![lit_bool(false)]);
    }

    #[test]
    fn empty_bool_match_reports_both() {
        let registry = TypeRegistry::new();
        let report = check_exhaustiveness(&registry, TypeId::BOOL, &[]);
        assert_eq!(report.missing, vec![lit_bool(true), lit_bool(false)]);
    }

    #[test]
    fn wildcard_settles_any_scrutinee() {
        let mut registry = TypeRegistry::new();
        let slice = registry.slice_type(TypeId::F64);
        for scrutinee in [TypeId::BOOL, TypeId::I32, TypeId::STRING, slice] {
            let report = check_exhaustiveness(&registry, scrutinee, &[Pattern::Wildcard]);
            assert!(report.is_exhaustive);
        }
    }

    #[test]
    fn binding_identifier_is_a_catch_all() {
        let mut interner = Interner::new();
        let name = interner.get_or_intern("other");
        let registry = TypeRegistry::new();
        let report = check_exhaustiveness(
            &registry,
            TypeId::I32,
            &[lit_int(0), Pattern::Identifier(name)],
        );
        assert!(report.is_exhaustive);
    }

    #[test]
    fn integer_literals_never_close_the_domain() {
        let registry = TypeRegistry::new();
        let report = check_exhaustiveness(&registry, TypeId::I32, &[lit_int(0), lit_int(1)]);
        assert!(!report.is_exhaustive);
        assert_eq!(report.missing, vec![Pattern::Wildcard]);
    }

    #[test]
    fn compound_scrutinee_requires_wildcard() {
        let mut interner = Interner::new();
        let mut registry = TypeRegistry::new();
        let name = interner.get_or_intern("Color");
        let red = interner.get_or_intern("Red");
        let color = registry.enum_type(name, &[red]);

        let report = check_exhaustiveness(&registry, color, &[Pattern::Variant(red)]);
        assert!(!report.is_exhaustive);
        assert_eq!(report.missing, vec![Pattern::Wildcard]);
    }

    #[test]
    fn missing_patterns_render_for_diagnostics() {
        let interner = Interner::new();
        assert_eq!(Pattern::Wildcard.render(&interner), "_");
        assert_eq!(lit_bool(false).render(&interner), "false");
        let tuple = Pattern::Tuple(vec![lit_int(1), Pattern::Wildcard]);
        assert_eq!(tuple.render(&interner), "(1, _)");
    }
}
