//! Semantic analysis (spec.md §4.2 "Typing", §4.3 "Constraints & Analysis",
//! §2 stage 5): two passes over the parser's output, typing then
//! constraints, sharing one [`SemaCtx`].
//!
//! Grounded on the reference's two-pass `analyze_declaration`/
//! `analyze_expression` split (`analyze.c`): typing must finish completely
//! before constraint checking runs, since constraints (non-modifiable
//! lvalue, case-value duplication, bit-field width) all read attached types
//! (spec.md §5 "Pass sequencing").

pub mod constraints;
pub mod typing;

use crate::ast::query::ScopeMap;
use crate::ast::{Ast, NodeId};
use crate::diag::DiagnosticBag;
use crate::symbol::table::ScopeId;
use crate::symbol::SymbolTable;

/// Shared mutable state threaded through both sema passes. Holds its own
/// scope stack mirroring the parser's push/pop sequence, re-derived from
/// [`ScopeMap`] rather than persisted from parsing, so each pass can walk
/// the tree independently.
pub struct SemaCtx<'a> {
    pub ast: &'a mut Ast,
    pub symtab: &'a mut SymbolTable,
    pub scopes: &'a ScopeMap,
    pub diags: &'a mut DiagnosticBag,
    scope_stack: Vec<ScopeId>,
}

impl<'a> SemaCtx<'a> {
    pub fn current_scope(&self) -> ScopeId {
        *self.scope_stack.last().expect("scope stack is never empty")
    }

    /// Enters the scope the parser recorded for `node` (a compound
    /// statement, `for` header, or function declarator), if any.
    pub fn enter_recorded_scope(&mut self, node: NodeId) {
        let scope = self.scopes.get(node).unwrap_or_else(|| self.current_scope());
        self.scope_stack.push(scope);
    }

    pub fn exit_scope(&mut self) {
        self.scope_stack.pop();
    }
}

/// Runs typing then constraint checking over `root` (spec.md §4.3: "gate
/// further compilation on zero collected errors").
pub fn analyze(ast: &mut Ast, symtab: &mut SymbolTable, scopes: &ScopeMap, root: NodeId, diags: &mut DiagnosticBag) {
    let file_scope = symtab.file_scope();
    {
        let mut ctx = SemaCtx { ast: &mut *ast, symtab: &mut *symtab, scopes, diags: &mut *diags, scope_stack: vec![file_scope] };
        typing::run(&mut ctx, root);
    }
    let mut ctx = SemaCtx { ast: &mut *ast, symtab: &mut *symtab, scopes, diags: &mut *diags, scope_stack: vec![file_scope] };
    constraints::run(&mut ctx, root);
}
