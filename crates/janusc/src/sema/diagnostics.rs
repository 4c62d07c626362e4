//! Diagnostic records produced by the analysis passes
//!
//! Diagnostics are plain owned data: the analyzer accumulates them during a
//! session and hands them out as deep copies, so they stay valid after the
//! session (symbol table, type registry, bindings) is torn down.

use crate::common::{LineCol, Span};
use codespan_reporting::diagnostic::{Diagnostic as CsDiagnostic, Label};
use codespan_reporting::files::SimpleFiles;
use codespan_reporting::term;
use codespan_reporting::term::termcolor::{ColorChoice, StandardStream};
use std::fmt;

/// Diagnostic severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Hint,
    Info,
    Warning,
    Error,
}

/// Stable identity of every diagnostic the core can produce
///
/// Numbering: E20xx type system, E21xx inference, E22xx symbols,
/// E23xx profiles, E24xx validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticCode {
    // Type system
    TypeMismatch,
    IncompatibleShapes,
    // Inference
    ArgumentCountMismatch,
    FieldNotFound,
    NotIndexable,
    NotAFunction,
    TypeNotStruct,
    CannotInferType,
    NonExhaustiveMatch,
    // Symbol table
    DuplicateDefinition,
    UndefinedSymbol,
    // Profile manager
    ProfileViolation,
    NpuGateViolation,
    // Validator
    UseBeforeDefinition,
    MissingReturn,
    UnreachableCode,
    ImmutableAssignment,
    InvalidOperator,
}

impl DiagnosticCode {
    pub fn number(self) -> u16 {
        match self {
            Self::TypeMismatch => 2001,
            Self::IncompatibleShapes => 2002,
            Self::ArgumentCountMismatch => 2101,
            Self::FieldNotFound => 2102,
            Self::NotIndexable => 2103,
            Self::NotAFunction => 2104,
            Self::TypeNotStruct => 2105,
            Self::CannotInferType => 2106,
            Self::NonExhaustiveMatch => 2107,
            Self::DuplicateDefinition => 2201,
            Self::UndefinedSymbol => 2202,
            Self::ProfileViolation => 2301,
            Self::NpuGateViolation => 2302,
            Self::UseBeforeDefinition => 2401,
            Self::MissingReturn => 2402,
            Self::UnreachableCode => 2403,
            Self::ImmutableAssignment => 2404,
            Self::InvalidOperator => 2405,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::TypeMismatch => "TypeMismatch",
            Self::IncompatibleShapes => "IncompatibleShapes",
            Self::ArgumentCountMismatch => "ArgumentCountMismatch",
            Self::FieldNotFound => "FieldNotFound",
            Self::NotIndexable => "NotIndexable",
            Self::NotAFunction => "NotAFunction",
            Self::TypeNotStruct => "TypeNotStruct",
            Self::CannotInferType => "CannotInferType",
            Self::NonExhaustiveMatch => "NonExhaustiveMatch",
            Self::DuplicateDefinition => "DuplicateDefinition",
            Self::UndefinedSymbol => "UndefinedSymbol",
            Self::ProfileViolation => "ProfileViolation",
            Self::NpuGateViolation => "NpuGateViolation",
            Self::UseBeforeDefinition => "UseBeforeDefinition",
            Self::MissingReturn => "MissingReturn",
            Self::UnreachableCode => "UnreachableCode",
            Self::ImmutableAssignment => "ImmutableAssignment",
            Self::InvalidOperator => "InvalidOperator",
        }
    }

    /// Default severity. Only unreachable code is a warning; every other
    /// code in the taxonomy invalidates the unit.
    pub fn severity(self) -> Severity {
        match self {
            Self::UnreachableCode => Severity::Warning,
            _ => Severity::Error,
        }
    }

    /// Format as "Exxxx" / "Wxxxx"
    pub fn code_string(self) -> String {
        let prefix = if self.severity() == Severity::Warning {
            "W"
        } else {
            "E"
        };
        format!("{}{:04}", prefix, self.number())
    }
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A span resolved to a file and line/column endpoints
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FileSpan {
    pub file: String,
    pub span: Span,
    pub start: LineCol,
    pub end: LineCol,
}

impl FileSpan {
    /// Resolve a byte span against its unit's position table
    pub fn of(unit: &crate::ast::Unit, span: Span) -> Self {
        Self {
            file: unit.file.clone(),
            span,
            start: unit.line_col(span.start),
            end: unit.line_col(span.end),
        }
    }
}

/// A secondary span with its own message ("declared here", ...)
#[derive(Debug, Clone)]
pub struct LabeledSpan {
    pub location: FileSpan,
    pub message: String,
}

/// A machine-applicable fix candidate
#[derive(Debug, Clone)]
pub struct Suggestion {
    pub message: String,
    /// 0..1, how likely the replacement is what the author meant
    pub confidence: f32,
    pub replacement: Option<String>,
}

/// One diagnostic record
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: DiagnosticCode,
    pub message: String,
    pub primary: FileSpan,
    pub secondary: Vec<LabeledSpan>,
    pub suggestions: Vec<Suggestion>,
    pub notes: Vec<String>,
}

impl Diagnostic {
    /// New diagnostic at the code's default severity
    pub fn new(code: DiagnosticCode, message: impl Into<String>, primary: FileSpan) -> Self {
        Self {
            severity: code.severity(),
            code,
            message: message.into(),
            primary,
            secondary: Vec::new(),
            suggestions: Vec::new(),
            notes: Vec::new(),
        }
    }

    pub fn with_secondary(mut self, location: FileSpan, message: impl Into<String>) -> Self {
        self.secondary.push(LabeledSpan {
            location,
            message: message.into(),
        });
        self
    }

    pub fn with_suggestion(
        mut self,
        message: impl Into<String>,
        confidence: f32,
        replacement: Option<String>,
    ) -> Self {
        self.suggestions.push(Suggestion {
            message: message.into(),
            confidence: confidence.clamp(0.0, 1.0),
            replacement,
        });
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

/// Diagnostic reporter for pretty terminal output
pub struct DiagnosticReporter {
    files: SimpleFiles<String, String>,
    writer: StandardStream,
    config: term::Config,
}

impl DiagnosticReporter {
    pub fn new() -> Self {
        Self {
            files: SimpleFiles::new(),
            writer: StandardStream::stderr(ColorChoice::Auto),
            config: term::Config::default(),
        }
    }

    /// Register a file's source text so labels can render source lines
    pub fn add_file(&mut self, name: impl Into<String>, source: impl Into<String>) -> usize {
        self.files.add(name.into(), source.into())
    }

    /// Render one diagnostic to the terminal
    pub fn emit(&self, file_id: usize, diagnostic: &Diagnostic) {
        let mut rendered = match diagnostic.severity {
            Severity::Error => CsDiagnostic::error(),
            Severity::Warning => CsDiagnostic::warning(),
            Severity::Info => CsDiagnostic::note(),
            Severity::Hint => CsDiagnostic::help(),
        }
        .with_code(diagnostic.code.code_string())
        .with_message(&diagnostic.message)
        .with_labels(vec![Label::primary(
            file_id,
            diagnostic.primary.span.start..diagnostic.primary.span.end,
        )]);

        for secondary in &diagnostic.secondary {
            rendered = rendered.with_labels(vec![Label::secondary(
                file_id,
                secondary.location.span.start..secondary.location.span.end,
            )
            .with_message(&secondary.message)]);
        }

        let mut notes = diagnostic.notes.clone();
        for suggestion in &diagnostic.suggestions {
            notes.push(format!("help: {}", suggestion.message));
        }
        rendered = rendered.with_notes(notes);

        let _ = term::emit(
            &mut self.writer.lock(),
            &self.config,
            &self.files,
            &rendered,
        );
    }
}

impl Default for DiagnosticReporter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_strings() {
        assert_eq!(DiagnosticCode::TypeMismatch.code_string(), "E2001");
        assert_eq!(DiagnosticCode::UnreachableCode.code_string(), "W2403");
        assert_eq!(DiagnosticCode::NonExhaustiveMatch.name(), "NonExhaustiveMatch");
    }

    #[test]
    fn only_unreachable_code_warns() {
        let codes = [
            DiagnosticCode::TypeMismatch,
            DiagnosticCode::NonExhaustiveMatch,
            DiagnosticCode::ProfileViolation,
            DiagnosticCode::UseBeforeDefinition,
        ];
        for code in codes {
            assert_eq!(code.severity(), Severity::Error, "{code}");
        }
        assert_eq!(
            DiagnosticCode::UnreachableCode.severity(),
            Severity::Warning
        );
    }

    #[test]
    fn suggestion_confidence_is_clamped() {
        let d = Diagnostic::new(
            DiagnosticCode::UndefinedSymbol,
            "undefined symbol 'fobar'",
            FileSpan::default(),
        )
        .with_suggestion("did you mean 'foobar'?", 1.7, Some("foobar".into()));
        assert_eq!(d.suggestions[0].confidence, 1.0);
    }
}
