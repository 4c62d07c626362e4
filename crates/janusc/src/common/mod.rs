//! Common infrastructure shared across the analysis core

mod error;
mod span;

pub use error::{SemaError, SemaResult};
pub use span::{LineCol, Span};
