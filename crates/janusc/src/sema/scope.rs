//! Scoped symbol table
//!
//! Scopes form a tree linked by parent ids — an arena, so scopes survive
//! after they are popped and later passes (hover, validation) can still
//! inspect them. Name resolution walks outward and returns `None` on a miss;
//! callers decide the error policy, which is what lets the analyzer attach
//! edit-distance suggestions to unresolved identifiers.

use crate::ast::{Interner, StrId};
use crate::common::Span;
use crate::sema::types::TypeId;
use std::collections::HashMap;

/// Handle to a symbol in the table's arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SymbolId(u32);

impl SymbolId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Handle to a scope in the table's arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(u32);

impl ScopeId {
    /// The unit-level root scope
    pub const ROOT: ScopeId = ScopeId(0);

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Symbol visibility outside its declaring unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Visibility {
    Public,
    #[default]
    Private,
}

impl Visibility {
    pub fn name(self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Private => "private",
        }
    }
}

/// Kind of named value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Variable,
    Function,
}

impl SymbolKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::Variable => "variable",
            Self::Function => "function",
        }
    }
}

/// A declared name
///
/// `ty` starts unset and is filled in when inference concludes; before that
/// every use of the symbol shares one inference variable through this field.
#[derive(Debug, Clone)]
pub struct Symbol {
    pub name: StrId,
    pub kind: SymbolKind,
    pub ty: Option<TypeId>,
    pub declaration_span: Span,
    pub scope: ScopeId,
    pub visibility: Visibility,
    pub mutable: bool,
    /// Whether the declaration carried an initializer (seeds definite
    /// assignment)
    pub has_initializer: bool,
}

/// One scope: symbols and type names declared directly in it
#[derive(Debug, Default)]
struct Scope {
    parent: Option<ScopeId>,
    symbols: HashMap<StrId, SymbolId>,
    types: HashMap<StrId, TypeId>,
}

/// The scoped symbol table for one analysis session
#[derive(Debug)]
pub struct SymbolTable {
    scopes: Vec<Scope>,
    symbols: Vec<Symbol>,
    current: ScopeId,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self {
            scopes: vec![Scope::default()],
            symbols: Vec::new(),
            current: ScopeId::ROOT,
        }
    }

    pub fn current_scope(&self) -> ScopeId {
        self.current
    }

    /// Enter a new child scope of the current one
    pub fn push_scope(&mut self) -> ScopeId {
        let id = ScopeId(self.scopes.len() as u32);
        self.scopes.push(Scope {
            parent: Some(self.current),
            ..Scope::default()
        });
        self.current = id;
        id
    }

    /// Leave the current scope. Returns false when already at the root,
    /// which callers treat as a broken push/pop invariant.
    pub fn pop_scope(&mut self) -> bool {
        match self.scopes[self.current.index()].parent {
            Some(parent) => {
                self.current = parent;
                true
            }
            None => false,
        }
    }

    /// Declare a symbol in the current scope.
    ///
    /// Redeclaring a name already present in the *same* scope is an error
    /// and returns the existing symbol (its declaration span feeds the
    /// `DuplicateDefinition` diagnostic). Shadowing an outer scope is legal.
    pub fn define(&mut self, symbol: Symbol) -> Result<SymbolId, SymbolId> {
        if let Some(&existing) = self.scopes[self.current.index()].symbols.get(&symbol.name) {
            return Err(existing);
        }
        let id = SymbolId(self.symbols.len() as u32);
        self.scopes[self.current.index()].symbols.insert(symbol.name, id);
        self.symbols.push(symbol);
        Ok(id)
    }

    pub fn symbol(&self, id: SymbolId) -> &Symbol {
        &self.symbols[id.index()]
    }

    pub fn symbol_mut(&mut self, id: SymbolId) -> &mut Symbol {
        &mut self.symbols[id.index()]
    }

    pub fn symbol_count(&self) -> usize {
        self.symbols.len()
    }

    pub fn symbols(&self) -> impl Iterator<Item = (SymbolId, &Symbol)> {
        self.symbols
            .iter()
            .enumerate()
            .map(|(i, s)| (SymbolId(i as u32), s))
    }

    /// Look up a name in one scope only, ignoring parents
    pub fn lookup_local(&self, scope: ScopeId, name: StrId) -> Option<SymbolId> {
        self.scopes[scope.index()].symbols.get(&name).copied()
    }

    /// Resolve a name by walking outward from `scope` through parent links.
    /// Returns `None` when no scope on the path declares it.
    pub fn resolve(&self, scope: ScopeId, name: StrId) -> Option<SymbolId> {
        let mut cursor = Some(scope);
        while let Some(id) = cursor {
            let scope = &self.scopes[id.index()];
            if let Some(&symbol) = scope.symbols.get(&name) {
                return Some(symbol);
            }
            cursor = scope.parent;
        }
        None
    }

    /// Resolve from the current scope
    pub fn resolve_current(&self, name: StrId) -> Option<SymbolId> {
        self.resolve(self.current, name)
    }

    // ==================== Type namespace ====================

    /// Declare a type name (struct/enum) in the current scope
    pub fn define_type(&mut self, name: StrId, ty: TypeId) -> Result<(), TypeId> {
        match self.scopes[self.current.index()].types.get(&name) {
            Some(&existing) => Err(existing),
            None => {
                self.scopes[self.current.index()].types.insert(name, ty);
                Ok(())
            }
        }
    }

    /// Resolve a type name by walking outward from `scope`
    pub fn resolve_type(&self, scope: ScopeId, name: StrId) -> Option<TypeId> {
        let mut cursor = Some(scope);
        while let Some(id) = cursor {
            let scope = &self.scopes[id.index()];
            if let Some(&ty) = scope.types.get(&name) {
                return Some(ty);
            }
            cursor = scope.parent;
        }
        None
    }

    // ==================== Suggestions ====================

    /// Every symbol visible from `scope` (innermost first). Shadowed outer
    /// symbols are still produced; suggestion ranking does not care.
    pub fn visible_symbols(&self, scope: ScopeId) -> Vec<SymbolId> {
        let mut out = Vec::new();
        let mut cursor = Some(scope);
        while let Some(id) = cursor {
            let scope = &self.scopes[id.index()];
            out.extend(scope.symbols.values().copied());
            cursor = scope.parent;
        }
        out
    }

    /// Rank visible names by edit distance to a misspelled identifier.
    ///
    /// Returns up to two candidates within a distance cutoff of one third of
    /// the name's length (at least one edit), best first, each with a
    /// confidence in 0..1.
    pub fn suggest(&self, scope: ScopeId, wanted: &str, interner: &Interner) -> Vec<(String, f32)> {
        let cutoff = (wanted.len() / 3).max(1);
        let mut candidates: Vec<(String, usize)> = self
            .visible_symbols(scope)
            .into_iter()
            .filter_map(|id| interner.resolve(self.symbol(id).name))
            .filter(|name| *name != wanted)
            .map(|name| (name.to_string(), edit_distance(wanted, name)))
            .filter(|(_, dist)| *dist <= cutoff)
            .collect();
        candidates.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
        candidates.dedup();

        let longest = wanted.len().max(1);
        candidates
            .into_iter()
            .take(2)
            .map(|(name, dist)| (name, 1.0 - dist as f32 / longest as f32))
            .collect()
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Levenshtein distance, two-row iterative form
pub fn edit_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut row = vec![0usize; b.len() + 1];
    for (i, &ca) in a.iter().enumerate() {
        row[0] = i + 1;
        for (j, &cb) in b.iter().enumerate() {
            let substitute = prev[j] + usize::from(ca != cb);
            row[j + 1] = substitute.min(prev[j + 1] + 1).min(row[j] + 1);
        }
        std::mem::swap(&mut prev, &mut row);
    }
    prev[b.len()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn variable(name: StrId, scope: ScopeId) -> Symbol {
        Symbol {
            name,
            kind: SymbolKind::Variable,
            ty: None,
            declaration_span: Span::default(),
            scope,
            visibility: Visibility::Private,
            mutable: false,
            has_initializer: false,
        }
    }

    #[test]
    fn duplicate_in_same_scope_is_rejected() {
        let mut interner = Interner::new();
        let x = interner.get_or_intern("x");
        let mut table = SymbolTable::new();

        let first = table.define(variable(x, table.current_scope())).unwrap();
        let err = table.define(variable(x, table.current_scope()));
        assert_eq!(err, Err(first));
    }

    #[test]
    fn shadowing_in_nested_scope_is_legal() {
        let mut interner = Interner::new();
        let x = interner.get_or_intern("x");
        let mut table = SymbolTable::new();

        let outer = table.define(variable(x, table.current_scope())).unwrap();
        let inner_scope = table.push_scope();
        let inner = table.define(variable(x, inner_scope)).unwrap();
        assert_ne!(outer, inner);

        // inner scope sees the shadow, outer still sees the original
        assert_eq!(table.resolve(inner_scope, x), Some(inner));
        assert!(table.pop_scope());
        assert_eq!(table.resolve_current(x), Some(outer));
    }

    #[test]
    fn resolve_walks_parents_and_misses_cleanly() {
        let mut interner = Interner::new();
        let x = interner.get_or_intern("x");
        let y = interner.get_or_intern("y");
        let mut table = SymbolTable::new();

        let outer = table.define(variable(x, table.current_scope())).unwrap();
        table.push_scope();
        table.push_scope();
        assert_eq!(table.resolve_current(x), Some(outer));
        assert_eq!(table.resolve_current(y), None);
        // lookup_local ignores parents
        assert_eq!(table.lookup_local(table.current_scope(), x), None);
    }

    #[test]
    fn pop_at_root_reports_imbalance() {
        let mut table = SymbolTable::new();
        assert!(!table.pop_scope());
        table.push_scope();
        assert!(table.pop_scope());
        assert!(!table.pop_scope());
    }

    #[test]
    fn edit_distance_basics() {
        assert_eq!(edit_distance("", "abc"), 3);
        assert_eq!(edit_distance("kitten", "sitting"), 3);
        assert_eq!(edit_distance("count", "count"), 0);
        assert_eq!(edit_distance("count", "count_"), 1);
    }

    #[test]
    fn suggestions_rank_by_distance() {
        let mut interner = Interner::new();
        let mut table = SymbolTable::new();
        for name in ["counter", "center", "pointer"] {
            let id = interner.get_or_intern(name);
            table.define(variable(id, table.current_scope())).unwrap();
        }

        let suggestions = table.suggest(table.current_scope(), "countr", &interner);
        assert_eq!(suggestions.len(), 1);
        assert_eq!(suggestions[0].0, "counter");
        assert!(suggestions[0].1 > 0.8);

        // nothing close enough
        assert!(table
            .suggest(table.current_scope(), "zzz", &interner)
            .is_empty());
    }
}
