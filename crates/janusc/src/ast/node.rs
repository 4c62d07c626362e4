//! Node definitions for the flat AST arena

use super::{StrId, TypeExpr};
use crate::common::Span;

/// Handle to a node inside its unit's arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A single AST node: kind plus the source range it covers
#[derive(Debug, Clone)]
pub struct Node {
    pub kind: NodeKind,
    pub span: Span,
}

impl Node {
    pub fn new(kind: NodeKind, span: Span) -> Self {
        Self { kind, span }
    }
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    // Arithmetic
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    // Comparison
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    // Logical
    And,
    Or,
    // Ranges
    RangeExclusive,
    RangeInclusive,
}

impl BinaryOp {
    /// Whether this operator is `+ - * / %`
    pub fn is_arithmetic(self) -> bool {
        matches!(
            self,
            Self::Add | Self::Sub | Self::Mul | Self::Div | Self::Rem
        )
    }

    /// Whether this operator yields a bool from an ordering/equality test
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            Self::Eq | Self::Ne | Self::Lt | Self::Le | Self::Gt | Self::Ge
        )
    }

    pub fn is_logical(self) -> bool {
        matches!(self, Self::And | Self::Or)
    }

    pub fn is_range(self) -> bool {
        matches!(self, Self::RangeExclusive | Self::RangeInclusive)
    }

    /// Operator spelling as written in source
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Rem => "%",
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::And => "and",
            Self::Or => "or",
            Self::RangeExclusive => "..",
            Self::RangeInclusive => "..=",
        }
    }
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    /// Arithmetic negation: -x
    Neg,
    /// Logical not: not x
    Not,
    /// Address-of: &x
    AddressOf,
    /// Pointer dereference: x.*
    Deref,
}

impl UnaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Neg => "-",
            Self::Not => "not",
            Self::AddressOf => "&",
            Self::Deref => ".*",
        }
    }
}

/// Literal payloads shared by expression and pattern nodes
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LiteralValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(StrId),
}

/// One arm of a match statement
#[derive(Debug, Clone)]
pub struct MatchArm {
    /// A `NodeKind::Pattern` node
    pub pattern: NodeId,
    pub body: NodeId,
}

/// A function parameter
#[derive(Debug, Clone)]
pub struct Param {
    pub name: StrId,
    /// Unannotated parameters get their type inferred from call sites
    pub ty: Option<TypeExpr>,
    pub span: Span,
}

/// A struct field declaration
#[derive(Debug, Clone)]
pub struct FieldDef {
    pub name: StrId,
    pub ty: TypeExpr,
    pub span: Span,
}

/// An enum variant declaration
#[derive(Debug, Clone)]
pub struct VariantDef {
    pub name: StrId,
    pub span: Span,
}

/// Match-arm pattern shapes as the parser produces them
#[derive(Debug, Clone)]
pub enum PatternKind {
    /// `_`
    Wildcard,
    /// `true`, `42`, `"x"` — a literal that must equal the scrutinee
    Literal(LiteralValue),
    /// A bare name: matches anything and binds it in the arm's scope
    Binding(StrId),
    /// An enum variant name
    Variant(StrId),
    /// `(p1, p2, ...)` — child `NodeKind::Pattern` nodes
    Tuple(Vec<NodeId>),
    /// `{ field: p, ... }` — child `NodeKind::Pattern` nodes
    Struct(Vec<(StrId, NodeId)>),
}

/// Node kinds, covering expressions, statements and declarations
#[derive(Debug, Clone)]
pub enum NodeKind {
    // ==================== Literals ====================
    /// Integer literal: 42
    IntLiteral(i64),
    /// Float literal: 3.14
    FloatLiteral(f64),
    /// Boolean literal: true, false
    BoolLiteral(bool),
    /// String literal: "hello"
    StringLiteral(StrId),

    /// Identifier reference: x
    Identifier(StrId),

    // ==================== Operators ====================
    /// Binary operation: a + b
    Binary {
        op: BinaryOp,
        lhs: NodeId,
        rhs: NodeId,
    },
    /// Unary operation: -x, not x, &x, x.*
    Unary { op: UnaryOp, operand: NodeId },

    // ==================== Postfix ====================
    /// Function call: f(a, b)
    Call { callee: NodeId, args: Vec<NodeId> },
    /// Indexing: a[i]
    Index { base: NodeId, index: NodeId },
    /// Field access: s.name
    Field { base: NodeId, name: StrId },

    /// Array literal: [1, 2, 3]
    ArrayLiteral { elements: Vec<NodeId> },

    // ==================== Statements ====================
    /// Variable declaration: let [mut] x [: T] [= init]
    Let {
        name: StrId,
        mutable: bool,
        annotation: Option<TypeExpr>,
        init: Option<NodeId>,
    },
    /// Assignment: target = value
    Assign { target: NodeId, value: NodeId },
    /// Statement block: { ... }
    Block { stmts: Vec<NodeId> },
    /// Conditional: if cond { } [else { }]
    If {
        condition: NodeId,
        then_block: NodeId,
        else_block: Option<NodeId>,
    },
    /// While loop: while cond { }
    While { condition: NodeId, body: NodeId },
    /// For loop: for x in iterable { }
    For {
        binding: StrId,
        iterable: NodeId,
        body: NodeId,
    },
    /// Match statement over a scrutinee
    Match {
        scrutinee: NodeId,
        arms: Vec<MatchArm>,
    },
    /// A match-arm pattern (only ever referenced from `MatchArm`)
    Pattern(PatternKind),
    /// Return from the enclosing function
    Return { value: Option<NodeId> },
    Break,
    Continue,

    // ==================== Declarations ====================
    /// Function declaration
    Function {
        name: StrId,
        public: bool,
        params: Vec<Param>,
        return_type: Option<TypeExpr>,
        body: NodeId,
    },
    /// Struct type declaration
    StructDecl {
        name: StrId,
        public: bool,
        fields: Vec<FieldDef>,
    },
    /// Enum type declaration
    EnumDecl {
        name: StrId,
        public: bool,
        variants: Vec<VariantDef>,
    },
}

impl NodeKind {
    /// Whether this node can appear as an assignment target
    pub fn is_place(&self) -> bool {
        matches!(
            self,
            Self::Identifier(_)
                | Self::Index { .. }
                | Self::Field { .. }
                | Self::Unary {
                    op: UnaryOp::Deref,
                    ..
                }
        )
    }
}
