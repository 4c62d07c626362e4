//! Type annotations as written in source
//!
//! `TypeExpr` is the syntactic form of a type. The semantic analyzer
//! resolves each annotation into a canonical `TypeId`; nothing here knows
//! about the type registry.

use super::StrId;

/// Where a tensor's storage lives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MemorySpace {
    /// Ordinary host memory
    #[default]
    Host,
    /// NPU-local memory
    Device,
    /// Host/device coherent memory
    Unified,
}

impl MemorySpace {
    pub fn name(self) -> &'static str {
        match self {
            Self::Host => "host",
            Self::Device => "device",
            Self::Unified => "unified",
        }
    }
}

/// A type annotation as the parser produced it
#[derive(Debug, Clone)]
pub enum TypeExpr {
    /// A named type: a primitive name or a declared struct/enum
    Named(StrId),
    /// `*T`
    Pointer(Box<TypeExpr>),
    /// `[N]T`
    Array { element: Box<TypeExpr>, len: u64 },
    /// `[]T`
    Slice(Box<TypeExpr>),
    /// `?T`
    Optional(Box<TypeExpr>),
    /// `range[T]`
    Range(Box<TypeExpr>),
    /// `fn(A, B) -> R`
    Function {
        params: Vec<TypeExpr>,
        ret: Box<TypeExpr>,
    },
    /// `tensor[T; d0, d1, ...] @space`
    Tensor {
        element: Box<TypeExpr>,
        dims: Vec<u64>,
        space: MemorySpace,
    },
    /// The allocator capability type
    Allocator,
    /// A named context-bound capability
    ContextBound(StrId),
}
