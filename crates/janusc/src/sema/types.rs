//! Canonical, deduplicated type registry
//!
//! Every type the analyzer ever talks about is interned here exactly once:
//! structurally identical type descriptions always resolve to the same
//! [`TypeId`], so type equality is an integer compare and type creation is
//! O(1) amortized even under heavy synthetic-type generation (inferred
//! array/function/tensor types). Child types are `TypeId`s, which makes the
//! structural hash a plain derived hash over the kind — no raw pointers are
//! ever hashed.

use crate::ast::{Interner, MemorySpace, StrId};
use hashbrown::HashMap;
use smallvec::SmallVec;

/// Handle to an interned type
///
/// `Copy`, trivially comparable and hashable. Two structurally identical
/// types always share one `TypeId`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeId(u32);

impl TypeId {
    // ==================== Reserved ids for the primitive cache ====================
    // Guaranteed to be interned at these indices by TypeRegistry::new()

    pub const I32: TypeId = TypeId(0);
    pub const I64: TypeId = TypeId(1);
    pub const F32: TypeId = TypeId(2);
    pub const F64: TypeId = TypeId(3);
    pub const BOOL: TypeId = TypeId(4);
    pub const STRING: TypeId = TypeId(5);
    pub const VOID: TypeId = TypeId(6);
    pub const NEVER: TypeId = TypeId(7);

    /// First index handed out to non-primitive types
    pub const FIRST_DYNAMIC: u32 = 8;

    pub fn index(self) -> usize {
        self.0 as usize
    }

    #[inline]
    pub fn is_primitive(self) -> bool {
        self.0 < Self::FIRST_DYNAMIC
    }
}

/// Inference-variable index within one analysis session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InferVarId(pub u32);

impl InferVarId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// The eight primitive kinds, cached at fixed registry indices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    I32,
    I64,
    F32,
    F64,
    Bool,
    String,
    Void,
    Never,
}

impl PrimitiveKind {
    pub const ALL: [PrimitiveKind; 8] = [
        Self::I32,
        Self::I64,
        Self::F32,
        Self::F64,
        Self::Bool,
        Self::String,
        Self::Void,
        Self::Never,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::I32 => "i32",
            Self::I64 => "i64",
            Self::F32 => "f32",
            Self::F64 => "f64",
            Self::Bool => "bool",
            Self::String => "string",
            Self::Void => "void",
            Self::Never => "never",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|p| p.name() == name)
    }

    pub fn is_numeric(self) -> bool {
        matches!(self, Self::I32 | Self::I64 | Self::F32 | Self::F64)
    }

    pub fn is_integer(self) -> bool {
        matches!(self, Self::I32 | Self::I64)
    }

    pub fn is_float(self) -> bool {
        matches!(self, Self::F32 | Self::F64)
    }

    /// One-directional widening: a value of `self` may flow into `target`
    /// without loss of meaning. Never the reverse.
    pub fn widens_to(self, target: PrimitiveKind) -> bool {
        matches!(
            (self, target),
            (Self::I32, Self::I64)
                | (Self::I32, Self::F32)
                | (Self::I32, Self::F64)
                | (Self::I64, Self::F64)
                | (Self::F32, Self::F64)
        )
    }

    fn layout(self) -> (u32, u32) {
        match self {
            Self::I32 | Self::F32 => (4, 4),
            Self::I64 | Self::F64 => (8, 8),
            Self::Bool => (1, 1),
            // ptr + len
            Self::String => (16, 8),
            Self::Void | Self::Never => (0, 1),
        }
    }
}

/// SmallVec for child type lists — inline up to 4 covers most functions,
/// field lists and tensor ranks
pub type TypeIdVec = SmallVec<[TypeId; 4]>;

/// SmallVec for tensor dimensions
pub type DimVec = SmallVec<[u64; 4]>;

/// A struct field with its computed byte offset
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StructField {
    pub name: StrId,
    pub ty: TypeId,
    pub offset: u32,
}

/// Structural description of a type
///
/// Children are canonical `TypeId`s, so derived `Hash`/`Eq` on this enum is
/// exactly the structural hash canonicalization needs.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeKind {
    Primitive(PrimitiveKind),
    /// `*T`
    Pointer(TypeId),
    /// `[N]T`
    Array { element: TypeId, len: u64 },
    /// `[]T`
    Slice(TypeId),
    /// `range[T]` — a half-open or inclusive interval over T
    Range(TypeId),
    /// `fn(params) -> ret`
    Function { params: TypeIdVec, ret: TypeId },
    /// Nominal struct with ordered, offset-assigned fields
    Struct {
        name: StrId,
        fields: SmallVec<[StructField; 4]>,
    },
    /// Nominal enum; variants are tags without payloads
    Enum {
        name: StrId,
        variants: SmallVec<[StrId; 4]>,
    },
    /// `?T`
    Optional(TypeId),
    /// `!T` — a value or an error code
    ErrorUnion { payload: TypeId },
    /// An instantiated generic: `Name[args...]`
    Generic { name: StrId, args: TypeIdVec },
    /// `tensor[T; dims] @space`
    Tensor {
        element: TypeId,
        dims: DimVec,
        space: MemorySpace,
    },
    /// The allocator capability
    Allocator,
    /// A named context-bound capability
    ContextBound(StrId),
    /// Placeholder awaiting constraint resolution
    Inference(InferVarId),
}

/// An interned type: structural kind plus its memory layout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeInfo {
    pub kind: TypeKind,
    /// Size in bytes
    pub size: u32,
    /// Alignment in bytes
    pub align: u32,
}

/// Per-session type registry with automatic interning/deduplication
#[derive(Debug)]
pub struct TypeRegistry {
    /// Interned types, indexed by TypeId
    types: Vec<TypeInfo>,
    /// Structural dedup map
    intern_map: HashMap<TypeKind, TypeId>,
    /// Pre-interned primitive cache, indexed by PrimitiveKind discriminant order
    primitives: [TypeId; 8],
}

impl TypeRegistry {
    /// Create a registry with the 8 primitives pre-interned at fixed indices
    pub fn new() -> Self {
        let mut registry = Self {
            types: Vec::new(),
            intern_map: HashMap::new(),
            primitives: [TypeId(0); 8],
        };

        for (slot, kind) in PrimitiveKind::ALL.into_iter().enumerate() {
            registry.primitives[slot] = registry.intern(TypeKind::Primitive(kind));
        }
        debug_assert_eq!(registry.primitives[0], TypeId::I32);
        debug_assert_eq!(registry.primitives[4], TypeId::BOOL);
        debug_assert_eq!(registry.primitives[7], TypeId::NEVER);

        registry
    }

    /// Intern a structural kind, returning the existing id when one matches.
    ///
    /// Build-then-intern: the candidate `kind` is fully constructed before
    /// the probe; on a hit it is dropped here and the canonical id returned,
    /// on a miss its ownership moves into the table.
    fn intern(&mut self, kind: TypeKind) -> TypeId {
        if let Some(&existing) = self.intern_map.get(&kind) {
            return existing;
        }
        let (size, align) = self.layout_of(&kind);
        let id = TypeId(self.types.len() as u32);
        self.intern_map.insert(kind.clone(), id);
        self.types.push(TypeInfo { kind, size, align });
        id
    }

    /// Get the interned record for an id. Panics on a foreign id; the
    /// registry never shrinks within a session.
    pub fn get(&self, id: TypeId) -> &TypeInfo {
        &self.types[id.index()]
    }

    pub fn kind(&self, id: TypeId) -> &TypeKind {
        &self.get(id).kind
    }

    /// Number of interned types (primitives included)
    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    // ==================== Type constructors ====================

    /// O(1) lookup from the fixed primitive cache
    pub fn primitive(&self, kind: PrimitiveKind) -> TypeId {
        self.primitives[PrimitiveKind::ALL
            .iter()
            .position(|p| *p == kind)
            .expect("exhaustive primitive table")]
    }

    pub fn i32(&self) -> TypeId {
        TypeId::I32
    }

    pub fn i64(&self) -> TypeId {
        TypeId::I64
    }

    pub fn f32(&self) -> TypeId {
        TypeId::F32
    }

    pub fn f64(&self) -> TypeId {
        TypeId::F64
    }

    pub fn bool(&self) -> TypeId {
        TypeId::BOOL
    }

    pub fn string(&self) -> TypeId {
        TypeId::STRING
    }

    pub fn void(&self) -> TypeId {
        TypeId::VOID
    }

    pub fn never(&self) -> TypeId {
        TypeId::NEVER
    }

    pub fn pointer_type(&mut self, pointee: TypeId) -> TypeId {
        self.intern(TypeKind::Pointer(pointee))
    }

    pub fn array_type(&mut self, element: TypeId, len: u64) -> TypeId {
        self.intern(TypeKind::Array { element, len })
    }

    pub fn slice_type(&mut self, element: TypeId) -> TypeId {
        self.intern(TypeKind::Slice(element))
    }

    pub fn range_type(&mut self, element: TypeId) -> TypeId {
        self.intern(TypeKind::Range(element))
    }

    pub fn function_type(&mut self, params: TypeIdVec, ret: TypeId) -> TypeId {
        self.intern(TypeKind::Function { params, ret })
    }

    /// Struct construction assigns field offsets and the overall layout
    pub fn struct_type(&mut self, name: StrId, fields: &[(StrId, TypeId)]) -> TypeId {
        let mut laid_out = SmallVec::new();
        let mut offset = 0u32;
        for (field_name, field_ty) in fields {
            let info = self.get(*field_ty);
            offset = align_up(offset, info.align.max(1));
            laid_out.push(StructField {
                name: *field_name,
                ty: *field_ty,
                offset,
            });
            offset += info.size;
        }
        self.intern(TypeKind::Struct {
            name,
            fields: laid_out,
        })
    }

    pub fn enum_type(&mut self, name: StrId, variants: &[StrId]) -> TypeId {
        self.intern(TypeKind::Enum {
            name,
            variants: variants.iter().copied().collect(),
        })
    }

    pub fn optional_type(&mut self, payload: TypeId) -> TypeId {
        self.intern(TypeKind::Optional(payload))
    }

    pub fn error_union_type(&mut self, payload: TypeId) -> TypeId {
        self.intern(TypeKind::ErrorUnion { payload })
    }

    pub fn generic_type(&mut self, name: StrId, args: TypeIdVec) -> TypeId {
        self.intern(TypeKind::Generic { name, args })
    }

    pub fn tensor_type(&mut self, element: TypeId, dims: &[u64], space: MemorySpace) -> TypeId {
        self.intern(TypeKind::Tensor {
            element,
            dims: dims.iter().copied().collect(),
            space,
        })
    }

    pub fn allocator_type(&mut self) -> TypeId {
        self.intern(TypeKind::Allocator)
    }

    pub fn context_bound_type(&mut self, name: StrId) -> TypeId {
        self.intern(TypeKind::ContextBound(name))
    }

    /// Placeholder type for one inference variable. Same variable, same id.
    pub fn inference_var(&mut self, var: InferVarId) -> TypeId {
        self.intern(TypeKind::Inference(var))
    }

    // ==================== Type queries ====================

    pub fn is_numeric(&self, id: TypeId) -> bool {
        matches!(self.kind(id), TypeKind::Primitive(p) if p.is_numeric())
    }

    pub fn is_integer(&self, id: TypeId) -> bool {
        matches!(self.kind(id), TypeKind::Primitive(p) if p.is_integer())
    }

    pub fn is_bool(&self, id: TypeId) -> bool {
        id == TypeId::BOOL
    }

    pub fn is_void(&self, id: TypeId) -> bool {
        id == TypeId::VOID
    }

    /// Whether ordering comparisons are defined for this type
    pub fn is_comparable(&self, id: TypeId) -> bool {
        self.is_numeric(id) || id == TypeId::STRING
    }

    pub fn is_inference_var(&self, id: TypeId) -> Option<InferVarId> {
        match self.kind(id) {
            TypeKind::Inference(var) => Some(*var),
            _ => None,
        }
    }

    /// Element type yielded by iterating a collection, if it is iterable
    pub fn iterable_element(&self, id: TypeId) -> Option<TypeId> {
        match self.kind(id) {
            TypeKind::Array { element, .. }
            | TypeKind::Slice(element)
            | TypeKind::Range(element)
            | TypeKind::Tensor { element, .. } => Some(*element),
            _ => None,
        }
    }

    // ==================== Compatibility ====================

    /// Whether a value of `source` may flow into a location of `target`.
    ///
    /// Identity is the fast path (canonical ids make it an integer compare);
    /// the rest is kind-directed: one-directional numeric widening,
    /// never-coerces-anywhere, array-to-slice covariance, payload coercion
    /// into optionals and error unions, and strict tensor compatibility.
    pub fn is_compatible(&self, source: TypeId, target: TypeId) -> bool {
        if source == target {
            return true;
        }

        match (self.kind(source), self.kind(target)) {
            (TypeKind::Primitive(PrimitiveKind::Never), _) => true,
            (TypeKind::Primitive(from), TypeKind::Primitive(to)) => from.widens_to(*to),
            (TypeKind::Array { element, .. }, TypeKind::Slice(target_elem)) => {
                self.is_compatible(*element, *target_elem)
            }
            (_, TypeKind::Optional(payload)) => self.is_compatible(source, *payload),
            (_, TypeKind::ErrorUnion { payload }) => self.is_compatible(source, *payload),
            (
                TypeKind::Tensor {
                    element: se,
                    dims: sd,
                    space: ss,
                },
                TypeKind::Tensor {
                    element: te,
                    dims: td,
                    space: ts,
                },
            ) => sd == td && ss == ts && self.is_compatible(*se, *te),
            _ => false,
        }
    }

    // ==================== Rendering ====================

    /// Human-readable signature for hover output and diagnostics
    pub fn display(&self, id: TypeId, interner: &Interner) -> String {
        let resolve = |s: StrId| interner.resolve(s).unwrap_or("?").to_string();
        match self.kind(id) {
            TypeKind::Primitive(p) => p.name().to_string(),
            TypeKind::Pointer(pointee) => format!("*{}", self.display(*pointee, interner)),
            TypeKind::Array { element, len } => {
                format!("[{}]{}", len, self.display(*element, interner))
            }
            TypeKind::Slice(element) => format!("[]{}", self.display(*element, interner)),
            TypeKind::Range(element) => format!("range[{}]", self.display(*element, interner)),
            TypeKind::Function { params, ret } => {
                let params: Vec<String> =
                    params.iter().map(|p| self.display(*p, interner)).collect();
                format!("fn({}) -> {}", params.join(", "), self.display(*ret, interner))
            }
            TypeKind::Struct { name, .. } | TypeKind::Enum { name, .. } => resolve(*name),
            TypeKind::Optional(payload) => format!("?{}", self.display(*payload, interner)),
            TypeKind::ErrorUnion { payload } => format!("!{}", self.display(*payload, interner)),
            TypeKind::Generic { name, args } => {
                let args: Vec<String> = args.iter().map(|a| self.display(*a, interner)).collect();
                format!("{}[{}]", resolve(*name), args.join(", "))
            }
            TypeKind::Tensor {
                element,
                dims,
                space,
            } => {
                let dims: Vec<String> = dims.iter().map(|d| d.to_string()).collect();
                format!(
                    "tensor[{}; {} @{}]",
                    self.display(*element, interner),
                    dims.join("x"),
                    space.name()
                )
            }
            TypeKind::Allocator => "allocator".to_string(),
            TypeKind::ContextBound(name) => format!("ctx[{}]", resolve(*name)),
            TypeKind::Inference(var) => format!("'t{}", var.0),
        }
    }

    // ==================== Layout ====================

    fn layout_of(&self, kind: &TypeKind) -> (u32, u32) {
        match kind {
            TypeKind::Primitive(p) => p.layout(),
            TypeKind::Pointer(_) | TypeKind::Function { .. } => (8, 8),
            TypeKind::Array { element, len } => {
                let info = self.get(*element);
                (info.size * (*len as u32), info.align)
            }
            // ptr + len
            TypeKind::Slice(_) => (16, 8),
            TypeKind::Range(element) => {
                let info = self.get(*element);
                (info.size * 2, info.align)
            }
            TypeKind::Struct { fields, .. } => {
                let mut align = 1;
                let mut end = 0;
                for field in fields {
                    let info = self.get(field.ty);
                    align = align.max(info.align);
                    end = end.max(field.offset + info.size);
                }
                (align_up(end, align), align)
            }
            // bare tag
            TypeKind::Enum { .. } => (4, 4),
            TypeKind::Optional(payload) => {
                let info = self.get(*payload);
                let align = info.align.max(1);
                (align_up(info.size + 1, align), align)
            }
            TypeKind::ErrorUnion { payload } => {
                let info = self.get(*payload);
                let align = info.align.max(4);
                (align_up(info.size + 4, align), align)
            }
            // erased handle
            TypeKind::Generic { .. } => (8, 8),
            TypeKind::Tensor { element, dims, .. } => {
                let elem = self.get(*element).size as u64;
                let total = dims.iter().product::<u64>() * elem;
                (total as u32, 64)
            }
            // vtable ptr + state ptr
            TypeKind::Allocator => (16, 8),
            TypeKind::ContextBound(_) => (8, 8),
            TypeKind::Inference(_) => (0, 1),
        }
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn align_up(value: u32, align: u32) -> u32 {
    debug_assert!(align.is_power_of_two() || align == 1);
    value.div_ceil(align) * align
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn primitive_cache_is_fixed() {
        let registry = TypeRegistry::new();
        assert_eq!(registry.primitive(PrimitiveKind::I32), TypeId::I32);
        assert_eq!(registry.primitive(PrimitiveKind::Never), TypeId::NEVER);
        assert_eq!(registry.len(), 8);
    }

    #[test]
    fn structurally_identical_types_share_one_id() {
        let mut registry = TypeRegistry::new();
        let a = registry.array_type(TypeId::I32, 5);
        let b = registry.array_type(TypeId::I32, 5);
        assert_eq!(a, b);

        let c = registry.array_type(TypeId::I32, 6);
        assert_ne!(a, c);

        let count = registry.len();
        let f1 = registry.function_type(TypeIdVec::from_slice(&[TypeId::I32]), TypeId::F64);
        let f2 = registry.function_type(TypeIdVec::from_slice(&[TypeId::I32]), TypeId::F64);
        assert_eq!(f1, f2);
        assert_eq!(registry.len(), count + 1);
    }

    #[test]
    fn tensor_canonicalization() {
        let mut registry = TypeRegistry::new();
        let a = registry.tensor_type(TypeId::F32, &[8, 16], MemorySpace::Device);
        let b = registry.tensor_type(TypeId::F32, &[8, 16], MemorySpace::Device);
        let c = registry.tensor_type(TypeId::F32, &[8, 16], MemorySpace::Host);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn numeric_widening_is_one_directional() {
        let registry = TypeRegistry::new();
        assert!(registry.is_compatible(TypeId::I32, TypeId::I64));
        assert!(registry.is_compatible(TypeId::I32, TypeId::F64));
        assert!(registry.is_compatible(TypeId::I64, TypeId::F64));
        assert!(registry.is_compatible(TypeId::F32, TypeId::F64));

        assert!(!registry.is_compatible(TypeId::I64, TypeId::I32));
        assert!(!registry.is_compatible(TypeId::F64, TypeId::I64));
        assert!(!registry.is_compatible(TypeId::F64, TypeId::F32));

        assert!(!registry.is_compatible(TypeId::BOOL, TypeId::I32));
        assert!(!registry.is_compatible(TypeId::I32, TypeId::BOOL));
    }

    #[test]
    fn array_to_slice_is_covariant() {
        let mut registry = TypeRegistry::new();
        let arr = registry.array_type(TypeId::I32, 4);
        let slice_i32 = registry.slice_type(TypeId::I32);
        let slice_i64 = registry.slice_type(TypeId::I64);
        assert!(registry.is_compatible(arr, slice_i32));
        assert!(registry.is_compatible(arr, slice_i64));
        assert!(!registry.is_compatible(slice_i32, arr));
    }

    #[test]
    fn never_coerces_to_anything() {
        let mut registry = TypeRegistry::new();
        let slice = registry.slice_type(TypeId::F64);
        assert!(registry.is_compatible(TypeId::NEVER, TypeId::I32));
        assert!(registry.is_compatible(TypeId::NEVER, slice));
    }

    #[test]
    fn payload_coerces_into_optional_and_error_union() {
        let mut registry = TypeRegistry::new();
        let opt = registry.optional_type(TypeId::I64);
        let eu = registry.error_union_type(TypeId::BOOL);
        assert!(registry.is_compatible(TypeId::I64, opt));
        // widening applies through the payload
        assert!(registry.is_compatible(TypeId::I32, opt));
        assert!(registry.is_compatible(TypeId::BOOL, eu));
        assert!(!registry.is_compatible(opt, TypeId::I64));
    }

    #[test]
    fn tensor_compatibility_requires_exact_shape_and_space() {
        let mut registry = TypeRegistry::new();
        let a = registry.tensor_type(TypeId::F32, &[8, 16], MemorySpace::Host);
        let b = registry.tensor_type(TypeId::F32, &[8, 16], MemorySpace::Host);
        let wrong_dims = registry.tensor_type(TypeId::F32, &[8, 32], MemorySpace::Host);
        let wrong_space = registry.tensor_type(TypeId::F32, &[8, 16], MemorySpace::Device);
        let widened = registry.tensor_type(TypeId::F64, &[8, 16], MemorySpace::Host);

        assert!(registry.is_compatible(a, b));
        assert!(!registry.is_compatible(a, wrong_dims));
        assert!(!registry.is_compatible(a, wrong_space));
        // element compatibility is directional like scalars
        let f32_into_f64 = registry.tensor_type(TypeId::F32, &[8, 16], MemorySpace::Host);
        assert!(registry.is_compatible(f32_into_f64, widened));
        assert!(!registry.is_compatible(widened, f32_into_f64));
    }

    #[test]
    fn struct_layout_assigns_aligned_offsets() {
        let mut registry = TypeRegistry::new();
        let mut interner = Interner::new();
        let name = interner.get_or_intern("Pair");
        let a = interner.get_or_intern("a");
        let b = interner.get_or_intern("b");

        let id = registry.struct_type(name, &[(a, TypeId::BOOL), (b, TypeId::I64)]);
        let TypeKind::Struct { fields, .. } = registry.kind(id) else {
            panic!("expected struct");
        };
        assert_eq!(fields[0].offset, 0);
        assert_eq!(fields[1].offset, 8);
        assert_eq!(registry.get(id).size, 16);
        assert_eq!(registry.get(id).align, 8);
    }

    #[test]
    fn display_renders_signatures() {
        let mut registry = TypeRegistry::new();
        let mut interner = Interner::new();
        let arr = registry.array_type(TypeId::I32, 3);
        let f = registry.function_type(TypeIdVec::from_slice(&[arr, TypeId::BOOL]), TypeId::VOID);
        assert_eq!(registry.display(f, &interner), "fn([3]i32, bool) -> void");

        let t = registry.tensor_type(TypeId::F32, &[8, 16], MemorySpace::Device);
        assert_eq!(registry.display(t, &interner), "tensor[f32; 8x16 @device]");

        let name = interner.get_or_intern("Shape");
        let e = registry.enum_type(name, &[]);
        assert_eq!(registry.display(e, &interner), "Shape");
    }

    #[test]
    fn same_inference_var_is_same_type() {
        let mut registry = TypeRegistry::new();
        let a = registry.inference_var(InferVarId(0));
        let b = registry.inference_var(InferVarId(0));
        let c = registry.inference_var(InferVarId(1));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
