//! Utility queries over the AST (spec.md §2 stage 3: "utility queries
//! (enclosing scope, declarator identifier, lvalue predicate)").

use std::collections::HashMap;

use super::{Ast, DeclKind, DeclaratorKind, ExprKind, NodeId, NodeKind};
use crate::symbol::table::ScopeId;

/// Maps the AST nodes that introduce a new scope (translation unit,
/// function body, compound statement, `for` loop header) to the
/// [`ScopeId`] the symbol table allocated for them. Populated by the
/// parser as it descends, consulted by `enclosing_scope` and by the
/// semantic analyzer when resolving an identifier.
#[derive(Default)]
pub struct ScopeMap {
    scopes: HashMap<NodeId, ScopeId>,
}

impl ScopeMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, node: NodeId, scope: ScopeId) {
        self.scopes.insert(node, scope);
    }

    pub fn get(&self, node: NodeId) -> Option<ScopeId> {
        self.scopes.get(&node).copied()
    }
}

/// Walks `node`'s parent chain to find the scope it executes in,
/// returning `file_scope` if no ancestor introduced one.
pub fn enclosing_scope(ast: &Ast, scopes: &ScopeMap, node: NodeId, file_scope: ScopeId) -> ScopeId {
    let mut cur = Some(node);
    while let Some(n) = cur {
        if let Some(s) = scopes.get(n) {
            return s;
        }
        cur = ast.parent(n);
    }
    file_scope
}

/// The identifier a declarator chain ultimately names, or `None` for an
/// abstract declarator (spec.md §4.1: "A declarator whose direct-declarator
/// terminates in an identifier records that identifier as a declaring
/// occurrence").
pub fn declarator_identifier(ast: &Ast, declarator: NodeId) -> Option<String> {
    let mut cur = declarator;
    loop {
        match &ast.node(cur).kind {
            NodeKind::Decl(DeclKind::Declarator(DeclaratorKind::Identifier(name))) => return Some(name.clone()),
            NodeKind::Decl(DeclKind::Declarator(DeclaratorKind::Abstract)) => return None,
            NodeKind::Decl(DeclKind::Declarator(DeclaratorKind::Pointer { inner, .. }))
            | NodeKind::Decl(DeclKind::Declarator(DeclaratorKind::Array { inner, .. }))
            | NodeKind::Decl(DeclKind::Declarator(DeclaratorKind::Function { inner, .. })) => cur = *inner,
            _ => return None,
        }
    }
}

/// C99 6.3.2.1p1's lvalue predicate, narrowed to what the typing pass can
/// decide once a node's type is attached: an identifier designating an
/// object (not a function, not an enumeration constant), a dereference,
/// a subscript, a member access whose base is itself an lvalue (or whose
/// base is a pointer, for `->`), a string literal, or a compound literal.
/// Everything else — arithmetic results, calls, casts, assignments
/// (whose *result* is a value, even though C allows `(a = b) = c` is
/// rejected precisely because it is not an lvalue) — is not.
pub fn is_lvalue(ast: &Ast, node: NodeId) -> bool {
    let n = ast.node(node);
    if let Some(ty) = &n.ty {
        if ty.is_function() {
            return false;
        }
    }
    match &n.kind {
        NodeKind::Expr(ExprKind::Identifier { .. }) => true,
        NodeKind::Expr(ExprKind::StringLiteral { .. }) => true,
        NodeKind::Expr(ExprKind::CompoundLiteral { .. }) => true,
        NodeKind::Expr(ExprKind::Unary { op, .. }) if *op == super::UnaryOp::Dereference => true,
        NodeKind::Expr(ExprKind::Subscript { .. }) => true,
        NodeKind::Expr(ExprKind::DereferenceMember { .. }) => true,
        NodeKind::Expr(ExprKind::Member { base, .. }) => is_lvalue(ast, *base),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{DeclKind, DeclaratorKind, ExprKind, NodeKind};

    #[test]
    fn declarator_identifier_walks_through_pointer_layers() {
        let mut ast = Ast::new();
        let id = ast.alloc(NodeKind::Decl(DeclKind::Declarator(DeclaratorKind::Identifier("p".into()))), 1, 1);
        let ptr = ast.alloc(
            NodeKind::Decl(DeclKind::Declarator(DeclaratorKind::Pointer {
                qualifiers: crate::types::Qualifiers::NONE,
                inner: id,
            })),
            1,
            1,
        );
        assert_eq!(declarator_identifier(&ast, ptr).as_deref(), Some("p"));
    }

    #[test]
    fn identifier_is_lvalue_call_is_not() {
        let mut ast = Ast::new();
        let ident = ast.alloc(NodeKind::Expr(ExprKind::Identifier { name: "x".into(), resolved: None }), 1, 1);
        assert!(is_lvalue(&ast, ident));
        let callee = ast.alloc(NodeKind::Expr(ExprKind::Identifier { name: "f".into(), resolved: None }), 1, 1);
        let call = ast.alloc(NodeKind::Expr(ExprKind::Call { callee, arguments: vec![] }), 1, 1);
        assert!(!is_lvalue(&ast, call));
    }
}
