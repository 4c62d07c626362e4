//! Compilation units and the store that owns them

use super::node::{MatchArm, Node, NodeId, NodeKind, PatternKind};
use super::{Interner, StrId};
use crate::common::{LineCol, Span};

/// Handle to a unit inside an [`AstStore`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UnitId(pub(crate) u32);

impl UnitId {
    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub fn raw(self) -> u32 {
        self.0
    }
}

/// One parsed source file: a flat node arena plus position info
#[derive(Debug)]
pub struct Unit {
    /// Path of the source file this unit was parsed from
    pub file: String,
    /// Byte offset of each line start, for line/col mapping
    line_starts: Vec<usize>,
    nodes: Vec<Node>,
    roots: Vec<NodeId>,
}

impl Unit {
    fn new(file: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            line_starts: vec![0],
            nodes: Vec::new(),
            roots: Vec::new(),
        }
    }

    /// Get a node by id. Panics on a foreign id; units never shrink.
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    /// Top-level declarations and statements, in source order
    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Iterate every node id in the unit
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.nodes.len() as u32).map(NodeId)
    }

    /// Direct children of a node, in source order
    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        match &self.node(id).kind {
            NodeKind::IntLiteral(_)
            | NodeKind::FloatLiteral(_)
            | NodeKind::BoolLiteral(_)
            | NodeKind::StringLiteral(_)
            | NodeKind::Identifier(_)
            | NodeKind::Break
            | NodeKind::Continue
            | NodeKind::StructDecl { .. }
            | NodeKind::EnumDecl { .. } => {}
            NodeKind::Binary { lhs, rhs, .. } => out.extend([*lhs, *rhs]),
            NodeKind::Unary { operand, .. } => out.push(*operand),
            NodeKind::Call { callee, args } => {
                out.push(*callee);
                out.extend(args.iter().copied());
            }
            NodeKind::Index { base, index } => out.extend([*base, *index]),
            NodeKind::Field { base, .. } => out.push(*base),
            NodeKind::ArrayLiteral { elements } => out.extend(elements.iter().copied()),
            NodeKind::Let { init, .. } => out.extend(init.iter().copied()),
            NodeKind::Assign { target, value } => out.extend([*target, *value]),
            NodeKind::Block { stmts } => out.extend(stmts.iter().copied()),
            NodeKind::If {
                condition,
                then_block,
                else_block,
            } => {
                out.extend([*condition, *then_block]);
                out.extend(else_block.iter().copied());
            }
            NodeKind::While { condition, body } => out.extend([*condition, *body]),
            NodeKind::For { iterable, body, .. } => out.extend([*iterable, *body]),
            NodeKind::Match { scrutinee, arms } => {
                out.push(*scrutinee);
                for arm in arms {
                    out.extend([arm.pattern, arm.body]);
                }
            }
            NodeKind::Pattern(pattern) => match pattern {
                PatternKind::Tuple(elements) => out.extend(elements.iter().copied()),
                PatternKind::Struct(fields) => out.extend(fields.iter().map(|(_, p)| *p)),
                _ => {}
            },
            NodeKind::Return { value } => out.extend(value.iter().copied()),
            NodeKind::Function { body, .. } => out.push(*body),
        }
        out
    }

    /// Map a byte offset to a 1-indexed line/column
    pub fn line_col(&self, offset: usize) -> LineCol {
        let line = match self.line_starts.binary_search(&offset) {
            Ok(idx) => idx,
            Err(idx) => idx - 1,
        };
        let col = offset - self.line_starts[line];
        LineCol::new(line as u32 + 1, col as u32 + 1)
    }

    /// Map a 1-indexed line/column back to a byte offset
    pub fn offset_at(&self, pos: LineCol) -> Option<usize> {
        if pos.line == 0 || pos.col == 0 {
            return None;
        }
        let start = *self.line_starts.get(pos.line as usize - 1)?;
        Some(start + pos.col as usize - 1)
    }
}

/// Owns every unit of a compilation plus the shared string interner
#[derive(Default)]
pub struct AstStore {
    interner: Interner,
    units: Vec<Unit>,
}

impl std::fmt::Debug for AstStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AstStore")
            .field("units", &self.units.len())
            .field("strings", &self.interner.len())
            .finish()
    }
}

impl AstStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn unit(&self, id: UnitId) -> Option<&Unit> {
        self.units.get(id.index())
    }

    pub fn units(&self) -> impl Iterator<Item = (UnitId, &Unit)> {
        self.units
            .iter()
            .enumerate()
            .map(|(i, u)| (UnitId(i as u32), u))
    }

    pub fn intern(&mut self, name: &str) -> StrId {
        self.interner.get_or_intern(name)
    }

    /// Resolve an interned string. Panics on a foreign symbol.
    pub fn resolve(&self, id: StrId) -> &str {
        self.interner
            .resolve(id)
            .expect("symbol from a different interner")
    }

    pub fn interner(&self) -> &Interner {
        &self.interner
    }

    /// Start building a new unit for `file`
    pub fn build_unit(&mut self, file: impl Into<String>) -> UnitBuilder<'_> {
        UnitBuilder {
            unit: Unit::new(file),
            store: self,
            cursor: 0,
        }
    }
}

/// Constructs a [`Unit`] node by node, the way the parser does
///
/// Every push returns the new node's [`NodeId`]; spans default to a
/// synthetic increasing range so each node stays distinguishable in
/// diagnostics, and can be overridden with [`UnitBuilder::spanned`].
pub struct UnitBuilder<'a> {
    store: &'a mut AstStore,
    unit: Unit,
    cursor: usize,
}

impl<'a> UnitBuilder<'a> {
    pub fn intern(&mut self, name: &str) -> StrId {
        self.store.intern(name)
    }

    /// Push a node with a synthetic span
    pub fn push(&mut self, kind: NodeKind) -> NodeId {
        let start = self.cursor;
        self.cursor += 4;
        self.spanned(kind, Span::new(start, start + 3))
    }

    /// Push a node with an explicit span
    pub fn spanned(&mut self, kind: NodeKind, span: Span) -> NodeId {
        let id = NodeId(self.unit.nodes.len() as u32);
        self.unit.nodes.push(Node::new(kind, span));
        id
    }

    /// Mark a node as a top-level root
    pub fn root(&mut self, id: NodeId) {
        self.unit.roots.push(id);
    }

    /// Override the unit's line-start table
    pub fn line_starts(&mut self, starts: Vec<usize>) {
        self.unit.line_starts = starts;
    }

    // ==================== Expression helpers ====================

    pub fn int(&mut self, value: i64) -> NodeId {
        self.push(NodeKind::IntLiteral(value))
    }

    pub fn float(&mut self, value: f64) -> NodeId {
        self.push(NodeKind::FloatLiteral(value))
    }

    pub fn boolean(&mut self, value: bool) -> NodeId {
        self.push(NodeKind::BoolLiteral(value))
    }

    pub fn string(&mut self, value: &str) -> NodeId {
        let id = self.intern(value);
        self.push(NodeKind::StringLiteral(id))
    }

    pub fn ident(&mut self, name: &str) -> NodeId {
        let id = self.intern(name);
        self.push(NodeKind::Identifier(id))
    }

    pub fn binary(&mut self, op: super::BinaryOp, lhs: NodeId, rhs: NodeId) -> NodeId {
        self.push(NodeKind::Binary { op, lhs, rhs })
    }

    pub fn unary(&mut self, op: super::UnaryOp, operand: NodeId) -> NodeId {
        self.push(NodeKind::Unary { op, operand })
    }

    pub fn call(&mut self, callee: NodeId, args: Vec<NodeId>) -> NodeId {
        self.push(NodeKind::Call { callee, args })
    }

    pub fn index(&mut self, base: NodeId, index: NodeId) -> NodeId {
        self.push(NodeKind::Index { base, index })
    }

    pub fn field(&mut self, base: NodeId, name: &str) -> NodeId {
        let name = self.intern(name);
        self.push(NodeKind::Field { base, name })
    }

    pub fn array(&mut self, elements: Vec<NodeId>) -> NodeId {
        self.push(NodeKind::ArrayLiteral { elements })
    }

    // ==================== Statement helpers ====================

    pub fn let_binding(
        &mut self,
        name: &str,
        mutable: bool,
        annotation: Option<super::TypeExpr>,
        init: Option<NodeId>,
    ) -> NodeId {
        let name = self.intern(name);
        self.push(NodeKind::Let {
            name,
            mutable,
            annotation,
            init,
        })
    }

    pub fn assign(&mut self, target: NodeId, value: NodeId) -> NodeId {
        self.push(NodeKind::Assign { target, value })
    }

    pub fn block(&mut self, stmts: Vec<NodeId>) -> NodeId {
        self.push(NodeKind::Block { stmts })
    }

    pub fn if_stmt(
        &mut self,
        condition: NodeId,
        then_block: NodeId,
        else_block: Option<NodeId>,
    ) -> NodeId {
        self.push(NodeKind::If {
            condition,
            then_block,
            else_block,
        })
    }

    pub fn while_stmt(&mut self, condition: NodeId, body: NodeId) -> NodeId {
        self.push(NodeKind::While { condition, body })
    }

    pub fn for_stmt(&mut self, binding: &str, iterable: NodeId, body: NodeId) -> NodeId {
        let binding = self.intern(binding);
        self.push(NodeKind::For {
            binding,
            iterable,
            body,
        })
    }

    pub fn match_stmt(&mut self, scrutinee: NodeId, arms: Vec<MatchArm>) -> NodeId {
        self.push(NodeKind::Match { scrutinee, arms })
    }

    pub fn arm(&mut self, pattern: NodeId, body: NodeId) -> MatchArm {
        MatchArm { pattern, body }
    }

    pub fn pattern(&mut self, kind: PatternKind) -> NodeId {
        self.push(NodeKind::Pattern(kind))
    }

    pub fn wildcard_pattern(&mut self) -> NodeId {
        self.pattern(PatternKind::Wildcard)
    }

    pub fn literal_pattern(&mut self, value: super::LiteralValue) -> NodeId {
        self.pattern(PatternKind::Literal(value))
    }

    pub fn binding_pattern(&mut self, name: &str) -> NodeId {
        let name = self.intern(name);
        self.pattern(PatternKind::Binding(name))
    }

    pub fn variant_pattern(&mut self, name: &str) -> NodeId {
        let name = self.intern(name);
        self.pattern(PatternKind::Variant(name))
    }

    pub fn ret(&mut self, value: Option<NodeId>) -> NodeId {
        self.push(NodeKind::Return { value })
    }

    pub fn brk(&mut self) -> NodeId {
        self.push(NodeKind::Break)
    }

    pub fn cont(&mut self) -> NodeId {
        self.push(NodeKind::Continue)
    }

    // ==================== Declaration helpers ====================

    pub fn function(
        &mut self,
        name: &str,
        params: Vec<super::Param>,
        return_type: Option<super::TypeExpr>,
        body: NodeId,
    ) -> NodeId {
        let name = self.intern(name);
        self.push(NodeKind::Function {
            name,
            public: false,
            params,
            return_type,
            body,
        })
    }

    pub fn param(&mut self, name: &str, ty: Option<super::TypeExpr>) -> super::Param {
        let name = self.intern(name);
        super::Param {
            name,
            ty,
            span: Span::default(),
        }
    }

    pub fn struct_decl(&mut self, name: &str, fields: Vec<super::FieldDef>) -> NodeId {
        let name = self.intern(name);
        self.push(NodeKind::StructDecl {
            name,
            public: false,
            fields,
        })
    }

    pub fn field_def(&mut self, name: &str, ty: super::TypeExpr) -> super::FieldDef {
        let name = self.intern(name);
        super::FieldDef {
            name,
            ty,
            span: Span::default(),
        }
    }

    pub fn enum_decl(&mut self, name: &str, variants: &[&str]) -> NodeId {
        let variants = variants
            .iter()
            .map(|v| super::VariantDef {
                name: self.store.intern(v),
                span: Span::default(),
            })
            .collect();
        let name = self.intern(name);
        self.push(NodeKind::EnumDecl {
            name,
            public: false,
            variants,
        })
    }

    /// Finish the unit and register it in the store
    pub fn finish(self) -> UnitId {
        let id = UnitId(self.store.units.len() as u32);
        self.store.units.push(self.unit);
        id
    }
}

#[cfg(test)]
mod tests {
    use super::super::{BinaryOp, NodeKind};
    use super::*;
    use crate::common::LineCol;

    #[test]
    fn builder_assigns_sequential_ids() {
        let mut ast = AstStore::new();
        let mut b = ast.build_unit("test.jns");
        let one = b.int(1);
        let two = b.int(2);
        let sum = b.binary(BinaryOp::Add, one, two);
        b.root(sum);
        let unit = b.finish();

        let unit = ast.unit(unit).unwrap();
        assert_eq!(unit.node_count(), 3);
        assert_eq!(unit.roots(), &[sum]);
        assert_eq!(unit.children(sum), vec![one, two]);
    }

    #[test]
    fn interner_round_trips() {
        let mut ast = AstStore::new();
        let a = ast.intern("answer");
        let b = ast.intern("answer");
        assert_eq!(a, b);
        assert_eq!(ast.resolve(a), "answer");
    }

    #[test]
    fn line_col_mapping() {
        let mut ast = AstStore::new();
        let mut b = ast.build_unit("pos.jns");
        b.line_starts(vec![0, 10, 25]);
        let id = b.finish();
        let unit = ast.unit(id).unwrap();

        assert_eq!(unit.line_col(0), LineCol::new(1, 1));
        assert_eq!(unit.line_col(9), LineCol::new(1, 10));
        assert_eq!(unit.line_col(10), LineCol::new(2, 1));
        assert_eq!(unit.line_col(27), LineCol::new(3, 3));
        assert_eq!(unit.offset_at(LineCol::new(2, 3)), Some(12));
        assert_eq!(unit.offset_at(LineCol::new(0, 1)), None);
    }

    #[test]
    fn children_of_match() {
        let mut ast = AstStore::new();
        let mut b = ast.build_unit("m.jns");
        let scrut = b.ident("flag");
        let pat = b.wildcard_pattern();
        let body = b.int(0);
        let arm = b.arm(pat, body);
        let m = b.match_stmt(scrut, vec![arm]);
        assert!(matches!(b.unit.node(m).kind, NodeKind::Match { .. }));
        assert_eq!(b.unit.children(m), vec![scrut, pat, body]);
    }
}
