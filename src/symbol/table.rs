//! The per-translation-unit symbol table: owns every [`Symbol`] and the
//! scope tree used to resolve identifiers against the right namespace.
//!
//! Symbols outlive AST lowering (spec.md §3 Lifecycle), so the table is
//! owned by the translation unit rather than by individual AST nodes —
//! the same ownership split the teacher uses between its `TILSection`
//! (owns all `Type`s) and the AST-like `id0` entries that merely reference
//! them by ordinal.

use std::collections::HashMap;

use crate::ast::NodeId;
use crate::types::CType;

use super::{InitializerImage, Linkage, Namespace, StorageDuration, Symbol, SymbolId};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ScopeId(pub u32);

struct Scope {
    parent: Option<ScopeId>,
    bindings: HashMap<(String, Namespace), SymbolId>,
}

pub struct SymbolTable {
    symbols: Vec<Symbol>,
    scopes: Vec<Scope>,
    /// Per-name counters used to mint `disambiguator` values (spec.md §3:
    /// "a disambiguator number (assembly-level uniqueness)").
    name_counters: HashMap<String, u32>,
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

impl SymbolTable {
    pub fn new() -> Self {
        let file_scope = Scope { parent: None, bindings: HashMap::new() };
        SymbolTable { symbols: Vec::new(), scopes: vec![file_scope], name_counters: HashMap::new() }
    }

    pub fn file_scope(&self) -> ScopeId {
        ScopeId(0)
    }

    pub fn push_scope(&mut self, parent: ScopeId) -> ScopeId {
        self.scopes.push(Scope { parent: Some(parent), bindings: HashMap::new() });
        ScopeId((self.scopes.len() - 1) as u32)
    }

    pub fn parent_scope(&self, scope: ScopeId) -> Option<ScopeId> {
        self.scopes[scope.0 as usize].parent
    }

    /// Declares a new symbol in `scope`'s namespace-keyed binding map,
    /// minting a fresh disambiguator. Does not check for a pre-existing
    /// incompatible declaration — that constraint belongs to the semantic
    /// analyzer (spec.md §4.3), not the table itself.
    #[allow(clippy::too_many_arguments)]
    pub fn declare(
        &mut self,
        scope: ScopeId,
        name: &str,
        namespace: Namespace,
        ty: CType,
        declaring_node: Option<NodeId>,
        linkage: Linkage,
        storage_duration: StorageDuration,
        is_typedef: bool,
    ) -> SymbolId {
        let id = SymbolId(self.symbols.len() as u32);
        let disambiguator = {
            let counter = self.name_counters.entry(name.to_string()).or_insert(0);
            let d = *counter;
            *counter += 1;
            d
        };
        let symbol = Symbol {
            id,
            name: name.to_string(),
            namespace: namespace.clone(),
            declaring_node,
            ty,
            disambiguator,
            stack_offset: None,
            asm_name: None,
            linkage,
            storage_duration,
            initializer: None,
            is_typedef,
            enum_constant_value: None,
        };
        self.symbols.push(symbol);
        self.scopes[scope.0 as usize].bindings.insert((name.to_string(), namespace), id);
        id
    }

    /// Looks up `name` in `namespace` starting at `scope` and walking
    /// parents, the usual block-scope shadowing rule (C99 6.2.1).
    pub fn lookup(&self, scope: ScopeId, name: &str, namespace: &Namespace) -> Option<SymbolId> {
        let mut cur = Some(scope);
        while let Some(s) = cur {
            let key = (name.to_string(), namespace.clone());
            if let Some(id) = self.scopes[s.0 as usize].bindings.get(&key) {
                return Some(*id);
            }
            cur = self.scopes[s.0 as usize].parent;
        }
        None
    }

    /// Looks up `name` declared directly in `scope`, without walking to
    /// parents — used by the duplicate-declaration constraint check
    /// (spec.md §4.3: "duplicate declarations in the same scope &
    /// namespace").
    pub fn lookup_local(&self, scope: ScopeId, name: &str, namespace: &Namespace) -> Option<SymbolId> {
        self.scopes[scope.0 as usize].bindings.get(&(name.to_string(), namespace.clone())).copied()
    }

    pub fn get(&self, id: SymbolId) -> &Symbol {
        &self.symbols[id.0 as usize]
    }

    /// Finds the symbol a parser-time tentative declaration installed for
    /// `node` (a declarator), by the `declaring_node` back-link rather than
    /// by a fresh scope lookup — robust against a later shadowing
    /// declaration of the same name landing in the same scope before the
    /// typing pass gets around to this one.
    pub fn find_by_declaring_node(&self, node: NodeId) -> Option<SymbolId> {
        self.symbols.iter().find(|s| s.declaring_node == Some(node)).map(|s| s.id)
    }

    pub fn get_mut(&mut self, id: SymbolId) -> &mut Symbol {
        &mut self.symbols[id.0 as usize]
    }

    pub fn set_initializer(&mut self, id: SymbolId, image: InitializerImage) {
        self.get_mut(id).initializer = Some(image);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Symbol> {
        self.symbols.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CType;

    #[test]
    fn block_scope_shadows_file_scope() {
        let mut table = SymbolTable::new();
        let file = table.file_scope();
        let outer = table.declare(
            file,
            "x",
            Namespace::Ordinary,
            CType::int(),
            None,
            Linkage::External,
            StorageDuration::Static,
            false,
        );
        let block = table.push_scope(file);
        let inner = table.declare(
            block,
            "x",
            Namespace::Ordinary,
            CType::int(),
            None,
            Linkage::None,
            StorageDuration::Automatic,
            false,
        );
        assert_ne!(outer, inner);
        assert_eq!(table.lookup(block, "x", &Namespace::Ordinary), Some(inner));
        assert_eq!(table.lookup(file, "x", &Namespace::Ordinary), Some(outer));
    }

    #[test]
    fn distinct_namespaces_do_not_collide() {
        let mut table = SymbolTable::new();
        let file = table.file_scope();
        let tag = table.declare(
            file,
            "point",
            Namespace::TagStruct,
            CType::int(),
            None,
            Linkage::None,
            StorageDuration::Static,
            false,
        );
        let ordinary = table.declare(
            file,
            "point",
            Namespace::Ordinary,
            CType::int(),
            None,
            Linkage::External,
            StorageDuration::Static,
            false,
        );
        assert_ne!(tag, ordinary);
    }
}
