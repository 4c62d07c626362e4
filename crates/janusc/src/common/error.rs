//! Fatal analysis errors
//!
//! Ordinary semantic mistakes in the analyzed program are *recorded* as
//! diagnostics and never surface here. `SemaError` is reserved for states
//! the analyzer cannot continue from: malformed AST shapes, unknown unit
//! handles, broken internal invariants. Hitting one aborts the unit's
//! analysis session.

use super::Span;
use thiserror::Error;

/// Fatal error that aborts a unit's analysis
#[derive(Error, Debug)]
pub enum SemaError {
    #[error("Invalid AST at {span}: {message}")]
    InvalidAst { message: String, span: Span },

    #[error("Unknown compilation unit {unit}")]
    UnknownUnit { unit: u32 },

    #[error("Internal analyzer error: {message}")]
    Internal { message: String },
}

impl SemaError {
    pub fn invalid_ast(message: impl Into<String>, span: Span) -> Self {
        Self::InvalidAst {
            message: message.into(),
            span,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

pub type SemaResult<T> = Result<T, SemaError>;
