//! Recursive-descent parser (spec.md §4.1, §2 stage 4).
//!
//! Consumes the token stream produced by the excluded lexer/preprocessor
//! and produces a `SC_TRANSLATION_UNIT`-equivalent [`NodeId`] plus the
//! owning [`Ast`] arena, [`SymbolTable`], and [`DiagnosticBag`]. The parser
//! performs no semantic checks beyond those implicit in the grammar
//! (spec.md §4.1); everything else is the semantic analyzer's job
//! (`sema.rs`).

pub mod cursor;
pub mod decl;
pub mod expr;
pub mod stmt;

use cursor::TokenCursor;

use crate::ast::query::ScopeMap;
use crate::ast::{Ast, NodeId, NodeKind};
use crate::diag::DiagnosticBag;
use crate::symbol::table::ScopeId;
use crate::symbol::{Namespace, SymbolTable};
use crate::token::Token;

pub struct ParseResult {
    pub ast: Ast,
    pub symtab: SymbolTable,
    pub scopes: ScopeMap,
    pub root: NodeId,
    pub diags: DiagnosticBag,
}

pub struct Parser<'a> {
    pub(crate) cursor: TokenCursor<'a>,
    pub(crate) ast: Ast,
    pub(crate) symtab: SymbolTable,
    pub(crate) scopes: ScopeMap,
    pub(crate) diags: DiagnosticBag,
    pub(crate) scope_stack: Vec<ScopeId>,
}

impl<'a> Parser<'a> {
    pub fn new(tokens: &'a [Token]) -> Self {
        let symtab = SymbolTable::new();
        let file_scope = symtab.file_scope();
        Parser {
            cursor: TokenCursor::new(tokens),
            ast: Ast::new(),
            symtab,
            scopes: ScopeMap::new(),
            diags: DiagnosticBag::new(),
            scope_stack: vec![file_scope],
        }
    }

    pub(crate) fn current_scope(&self) -> ScopeId {
        *self.scope_stack.last().expect("scope stack is never empty")
    }

    pub(crate) fn push_scope(&mut self) -> ScopeId {
        let parent = self.current_scope();
        let child = self.symtab.push_scope(parent);
        self.scope_stack.push(child);
        child
    }

    pub(crate) fn pop_scope(&mut self) {
        self.scope_stack.pop();
    }

    /// Wires every id in `children` to `parent`'s back-link; the one place
    /// every grammar production goes through after allocating a node, so
    /// it lives once on `Parser` rather than being redefined per submodule.
    pub(crate) fn link(&mut self, parent: NodeId, children: &[NodeId]) {
        for &c in children {
            self.ast.set_parent(c, parent);
        }
    }

    /// An identifier token is a typedef-name only when a symbol of that
    /// name declared with the typedef storage class is in scope
    /// (spec.md §4.1) — the parser consults the symbol table live, the
    /// same "lexer hack" every hand-written C parser needs.
    pub(crate) fn is_typedef_name(&self, name: &str) -> bool {
        self.symtab
            .lookup(self.current_scope(), name, &Namespace::Ordinary)
            .is_some_and(|id| self.symtab.get(id).is_typedef)
    }

    pub fn parse_translation_unit(mut self) -> ParseResult {
        let root = self.ast.alloc(NodeKind::TranslationUnit { external_declarations: vec![] }, 1, 1);
        let mut decls = Vec::new();
        while !self.cursor.at_end() {
            if let Some(decl) = self.parse_external_declaration(root) {
                decls.push(decl);
            } else if self.cursor.advance_any().is_none() {
                break;
            }
        }
        if let NodeKind::TranslationUnit { external_declarations } = &mut self.ast.node_mut(root).kind {
            *external_declarations = decls;
        }
        ParseResult { ast: self.ast, symtab: self.symtab, scopes: self.scopes, root, diags: self.diags }
    }
}
