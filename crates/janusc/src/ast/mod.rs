//! Read-only AST interface consumed by semantic analysis
//!
//! The analysis core never parses source text. The parser (an external
//! collaborator) produces one [`Unit`] per source file — a flat node arena
//! with interned identifiers — and the analyzer walks it without mutating
//! anything. [`UnitBuilder`] constructs units the way the parser would and
//! doubles as the test harness for the analysis passes.

mod node;
mod types;
mod unit;

pub use node::{
    BinaryOp, FieldDef, LiteralValue, MatchArm, Node, NodeId, NodeKind, Param, PatternKind,
    UnaryOp, VariantDef,
};
pub use types::{MemorySpace, TypeExpr};
pub use unit::{AstStore, Unit, UnitBuilder, UnitId};

use string_interner::{DefaultStringInterner, DefaultSymbol};

/// Interned string handle used for every identifier in the tree
pub type StrId = DefaultSymbol;

/// The interner shared by all units of a store
pub type Interner = DefaultStringInterner;
