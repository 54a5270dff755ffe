//! The constraints & analysis pass (spec.md §4.3): a second walk over the
//! already-typed tree that rejects programs a grammar-only parse accepts
//! but C99's constraints forbid.
//!
//! Grounded on the reference's `analyze.c` constraint checks, run as a
//! separate pass from typing (`sema.rs`'s `analyze`) since several checks
//! here (non-modifiable lvalue, bit-field width, case duplication) need
//! every node's type already attached.

use std::collections::{HashMap, HashSet};

use crate::ast::decl::{DeclarationSpecifiers, NonBasicTypeSpecifier, StorageClass};
use crate::ast::query::{declarator_identifier, is_lvalue};
use crate::ast::{DeclKind, DeclaratorKind, ExprKind, NodeId, NodeKind, StmtKind};
use crate::constexpr;
use crate::symbol::table::ScopeId;
use crate::symbol::{Linkage, Namespace};
use crate::types::{is_compatible, CType, TypeClass};

use super::SemaCtx;

pub fn run(ctx: &mut SemaCtx, root: NodeId) {
    let external = match &ctx.ast.node(root).kind {
        NodeKind::TranslationUnit { external_declarations } => external_declarations.clone(),
        _ => return,
    };
    let mut function_shapes: HashMap<String, (bool, NodeId)> = HashMap::new();
    for decl in external {
        visit_external_declaration(ctx, &mut function_shapes, decl);
    }
}

fn visit_external_declaration(ctx: &mut SemaCtx, function_shapes: &mut HashMap<String, (bool, NodeId)>, node: NodeId) {
    let op = match &ctx.ast.node(node).kind {
        NodeKind::Decl(DeclKind::Declaration { specifiers, init_declarators }) => {
            check_storage_class_at_file_scope(ctx, node, specifiers.storage_class);
            Some((init_declarators.clone(), None))
        }
        NodeKind::Decl(DeclKind::FunctionDefinition { specifiers, declarator, body }) => {
            check_function_definition_declarator(ctx, *declarator, specifiers);
            check_record_member_storage_classes(ctx, specifiers);
            Some((vec![], Some((*declarator, *body))))
        }
        _ => None,
    };
    let Some((init_declarators, def)) = op else { return };
    for init_decl in init_declarators {
        let declarator = match &ctx.ast.node(init_decl).kind {
            NodeKind::Decl(DeclKind::InitDeclarator { declarator, .. }) => Some(*declarator),
            _ => None,
        };
        if let Some(declarator) = declarator {
            check_function_shape_consistency(ctx, function_shapes, declarator);
        }
        if let NodeKind::Decl(DeclKind::InitDeclarator { initializer: Some(init), .. }) = &ctx.ast.node(init_decl).kind {
            let init = *init;
            visit_initializer_expr(ctx, init);
        }
    }
    if let Some((declarator, body)) = def {
        check_function_shape_consistency(ctx, function_shapes, declarator);
        let labels = collect_labels(ctx, body);
        let mut fctx = FunctionCtx { labels, switch_stack: Vec::new(), declared_in_scope: HashMap::new() };
        ctx.enter_recorded_scope(declarator);
        visit_statement(ctx, &mut fctx, body);
        ctx.exit_scope();
    }
}

/// Tracks, per function name seen at file scope so far, whether its
/// declarator used a prototyped parameter list or a K&R identifier list
/// (spec.md §4.3: "K&R declarations mixed with a prototyped parameter
/// list"), flagging the second, differently-shaped sighting — whether that
/// is an earlier forward declaration followed by a K&R definition, or the
/// reverse. `parse_parameter_type_list` only produces `is_prototyped: false`
/// for a parenthesized identifier list, so an empty `()` or a `(void)`
/// declarator is never treated as K&R here.
fn check_function_shape_consistency(ctx: &mut SemaCtx, function_shapes: &mut HashMap<String, (bool, NodeId)>, declarator: NodeId) {
    let NodeKind::Decl(DeclKind::Declarator(DeclaratorKind::Function { is_prototyped, .. })) = &ctx.ast.node(declarator).kind else {
        return;
    };
    let is_prototyped = *is_prototyped;
    let Some(name) = declarator_identifier(ctx.ast, declarator) else { return };
    match function_shapes.get(&name) {
        Some((prev_prototyped, _)) if *prev_prototyped != is_prototyped => {
            let n = ctx.ast.node(declarator);
            ctx.diags.error(n.row, n.col, format!("'{name}' is declared with a K&R parameter list in one place and a prototyped parameter list in another"));
        }
        _ => {
            function_shapes.insert(name, (is_prototyped, declarator));
        }
    }
}

fn check_storage_class_at_file_scope(ctx: &mut SemaCtx, node: NodeId, storage_class: Option<StorageClass>) {
    if matches!(storage_class, Some(StorageClass::Auto) | Some(StorageClass::Register)) {
        let n = ctx.ast.node(node);
        ctx.diags.error(n.row, n.col, "'auto' or 'register' storage class is not allowed at file scope");
    }
}

fn check_function_definition_declarator(ctx: &mut SemaCtx, declarator: NodeId, specifiers: &DeclarationSpecifiers) {
    let is_function = matches!(&ctx.ast.node(declarator).kind, NodeKind::Decl(DeclKind::Declarator(DeclaratorKind::Function { .. })));
    if !is_function {
        let n = ctx.ast.node(declarator);
        ctx.diags.error(n.row, n.col, "a function definition's declarator must declare a function");
        return;
    }
    if specifiers.is_inline && declarator_identifier(ctx.ast, declarator).as_deref() == Some("main") {
        let n = ctx.ast.node(declarator);
        ctx.diags.error(n.row, n.col, "'main' may not be declared 'inline'");
    }
}

/// The merged declaration-specifier/specifier-qualifier-list shape (see
/// `ast/decl.rs`'s module doc) lets a storage-class specifier parse inside
/// a `struct`/`union` member list even though C99's grammar never allows
/// one there — this check rejects it after the fact instead of splitting
/// the parser's specifier list into two node kinds.
fn check_record_member_storage_classes(ctx: &mut SemaCtx, specifiers: &DeclarationSpecifiers) {
    let Some(NonBasicTypeSpecifier::StructOrUnion(spec_node)) = &specifiers.non_basic else { return };
    let members = match &ctx.ast.node(*spec_node).kind {
        NodeKind::Decl(DeclKind::StructUnionSpecifier { members: Some(members), .. }) => members.clone(),
        _ => return,
    };
    for member in members {
        let member_specifiers = match &ctx.ast.node(member).kind {
            NodeKind::Decl(DeclKind::StructDeclaration { specifiers, .. }) => specifiers.clone(),
            _ => continue,
        };
        if let Some(sc) = member_specifiers.storage_class {
            let n = ctx.ast.node(member);
            ctx.diags.error(n.row, n.col, format!("storage-class specifier '{sc:?}' is not allowed in a structure or union member declaration"));
        }
        check_record_member_storage_classes(ctx, &member_specifiers);
    }
}

/// Checks the two block-scope constraints from spec.md §4.3 that
/// `declared_in_scope`/the file-scope symbol table make possible:
/// "duplicate declarations in the same scope & namespace with incompatible
/// types" and "`static` identifiers at block scope that alias file-scope
/// linkage". `SymbolTable::declare` always overwrites a scope's binding for
/// a name, so `lookup_local` alone can only ever see the latest declaration
/// — `fctx.declared_in_scope` is the independent record of what was first
/// seen.
fn check_duplicate_block_declaration(ctx: &mut SemaCtx, fctx: &mut FunctionCtx, declarator: NodeId, storage_class: Option<StorageClass>) {
    let Some(name) = declarator_identifier(ctx.ast, declarator) else { return };
    let Some(symbol_id) = ctx.symtab.find_by_declaring_node(declarator) else { return };
    let ty = ctx.symtab.get(symbol_id).ty.clone();

    let key = (ctx.current_scope(), name.clone());
    match fctx.declared_in_scope.get(&key) {
        Some(prev_ty) if !is_compatible(prev_ty, &ty) => {
            let n = ctx.ast.node(declarator);
            ctx.diags.error(n.row, n.col, format!("'{name}' redeclared with an incompatible type in the same scope"));
        }
        Some(_) => {}
        None => {
            fctx.declared_in_scope.insert(key, ty);
        }
    }

    if storage_class == Some(StorageClass::Static) {
        if let Some(file_symbol) = ctx.symtab.lookup_local(ctx.symtab.file_scope(), &name, &Namespace::Ordinary) {
            if ctx.symtab.get(file_symbol).linkage != Linkage::None {
                let n = ctx.ast.node(declarator);
                ctx.diags.warn(n.row, n.col, format!("'{name}' has static storage duration here but aliases a file-scope identifier with linkage"));
            }
        }
    }
}

fn collect_labels(ctx: &SemaCtx, node: NodeId) -> HashSet<String> {
    let mut labels = HashSet::new();
    collect_labels_rec(ctx, node, &mut labels);
    labels
}

fn collect_labels_rec(ctx: &SemaCtx, node: NodeId, labels: &mut HashSet<String>) {
    match &ctx.ast.node(node).kind {
        NodeKind::Stmt(StmtKind::Labeled { label, statement }) => {
            labels.insert(label.clone());
            collect_labels_rec(ctx, *statement, labels);
        }
        NodeKind::Stmt(StmtKind::CaseLabeled { statement, .. }) => collect_labels_rec(ctx, *statement, labels),
        NodeKind::Stmt(StmtKind::Compound { block_items }) => {
            for item in block_items.clone() {
                collect_labels_rec(ctx, item, labels);
            }
        }
        NodeKind::Stmt(StmtKind::If { then_stmt, else_stmt, .. }) => {
            collect_labels_rec(ctx, *then_stmt, labels);
            if let Some(e) = else_stmt {
                collect_labels_rec(ctx, *e, labels);
            }
        }
        NodeKind::Stmt(StmtKind::Switch { body, .. }) => collect_labels_rec(ctx, *body, labels),
        NodeKind::Stmt(StmtKind::Do { body, .. }) | NodeKind::Stmt(StmtKind::While { body, .. }) => {
            collect_labels_rec(ctx, *body, labels)
        }
        NodeKind::Stmt(StmtKind::For { body, .. }) => collect_labels_rec(ctx, *body, labels),
        _ => {}
    }
}

struct FunctionCtx {
    labels: HashSet<String>,
    /// One entry per enclosing `switch`, holding the `i64` case values seen
    /// so far (spec.md §4.3: "duplicated case values").
    switch_stack: Vec<Vec<i64>>,
    /// The type each ordinary-namespace identifier was first declared with
    /// in a given scope (spec.md §4.3: "duplicate declarations in the same
    /// scope & namespace with incompatible types"). `ScopeId`s are never
    /// reused across the translation unit, so sibling blocks never collide
    /// in this map even though it is not reset between them.
    declared_in_scope: HashMap<(ScopeId, String), CType>,
}

enum StmtOp {
    Labeled(NodeId),
    CaseLabeled(Option<NodeId>, NodeId, u32, u32),
    Compound(Vec<NodeId>),
    Expression(Option<NodeId>),
    If(NodeId, NodeId, Option<NodeId>),
    Switch(NodeId, NodeId),
    Do(NodeId, NodeId),
    While(NodeId, NodeId),
    For(Option<NodeId>, Option<NodeId>, Option<NodeId>, NodeId),
    Goto(String, u32, u32),
    Return(Option<NodeId>),
    Other,
}

fn visit_statement(ctx: &mut SemaCtx, fctx: &mut FunctionCtx, node: NodeId) {
    let n = ctx.ast.node(node);
    let (row, col) = (n.row, n.col);
    let op = match &n.kind {
        NodeKind::Stmt(StmtKind::Labeled { statement, .. }) => StmtOp::Labeled(*statement),
        NodeKind::Stmt(StmtKind::CaseLabeled { value, statement }) => StmtOp::CaseLabeled(*value, *statement, row, col),
        NodeKind::Stmt(StmtKind::Compound { block_items }) => StmtOp::Compound(block_items.clone()),
        NodeKind::Stmt(StmtKind::Expression { expr }) => StmtOp::Expression(*expr),
        NodeKind::Stmt(StmtKind::If { cond, then_stmt, else_stmt }) => StmtOp::If(*cond, *then_stmt, *else_stmt),
        NodeKind::Stmt(StmtKind::Switch { controlling_expr, body }) => StmtOp::Switch(*controlling_expr, *body),
        NodeKind::Stmt(StmtKind::Do { body, cond }) => StmtOp::Do(*body, *cond),
        NodeKind::Stmt(StmtKind::While { cond, body }) => StmtOp::While(*cond, *body),
        NodeKind::Stmt(StmtKind::For { init, cond, post, body }) => StmtOp::For(*init, *cond, *post, *body),
        NodeKind::Stmt(StmtKind::Goto { label }) => StmtOp::Goto(label.clone(), row, col),
        NodeKind::Stmt(StmtKind::Return { expr }) => StmtOp::Return(*expr),
        NodeKind::Stmt(_) => StmtOp::Other,
        NodeKind::Decl(DeclKind::Declaration { .. }) => {
            check_block_declaration(ctx, fctx, node);
            return;
        }
        _ => return,
    };
    match op {
        StmtOp::Labeled(s) => visit_statement(ctx, fctx, s),
        StmtOp::CaseLabeled(value, s, row, col) => {
            check_case_label(ctx, fctx, value, row, col);
            visit_statement(ctx, fctx, s);
        }
        StmtOp::Compound(items) => {
            ctx.enter_recorded_scope(node);
            for item in items {
                visit_statement(ctx, fctx, item);
            }
            ctx.exit_scope();
        }
        StmtOp::Expression(expr) => {
            if let Some(e) = expr {
                visit_expr(ctx, e);
            }
        }
        StmtOp::If(cond, then_stmt, else_stmt) => {
            visit_expr(ctx, cond);
            visit_statement(ctx, fctx, then_stmt);
            if let Some(e) = else_stmt {
                visit_statement(ctx, fctx, e);
            }
        }
        StmtOp::Switch(controlling, body) => {
            visit_expr(ctx, controlling);
            fctx.switch_stack.push(Vec::new());
            visit_statement(ctx, fctx, body);
            fctx.switch_stack.pop();
        }
        StmtOp::Do(body, cond) => {
            visit_statement(ctx, fctx, body);
            visit_expr(ctx, cond);
        }
        StmtOp::While(cond, body) => {
            visit_expr(ctx, cond);
            visit_statement(ctx, fctx, body);
        }
        StmtOp::For(init, cond, post, body) => {
            ctx.enter_recorded_scope(node);
            if let Some(i) = init {
                let is_decl = matches!(ctx.ast.node(i).kind, NodeKind::Decl(_));
                if is_decl {
                    check_block_declaration(ctx, fctx, i);
                } else {
                    visit_expr(ctx, i);
                }
            }
            if let Some(c) = cond {
                visit_expr(ctx, c);
            }
            if let Some(p) = post {
                visit_expr(ctx, p);
            }
            visit_statement(ctx, fctx, body);
            ctx.exit_scope();
        }
        StmtOp::Goto(label, row, col) => {
            if !fctx.labels.contains(&label) {
                ctx.diags.error(row, col, format!("use of undeclared label '{label}'"));
            }
        }
        StmtOp::Return(expr) => {
            if let Some(e) = expr {
                visit_expr(ctx, e);
            }
        }
        StmtOp::Other => {}
    }
}

fn check_case_label(ctx: &mut SemaCtx, fctx: &mut FunctionCtx, value: Option<NodeId>, row: u32, col: u32) {
    let Some(seen) = fctx.switch_stack.last_mut() else {
        ctx.diags.error(row, col, "'case'/'default' label not within a switch statement");
        return;
    };
    let Some(expr) = value else {
        // `default:` carries no value to deduplicate.
        return;
    };
    match constexpr::fold_to_i64(ctx.ast, expr) {
        Some(v) => {
            if seen.contains(&v) {
                ctx.diags.error(row, col, format!("duplicate case value '{v}'"));
            } else {
                seen.push(v);
            }
        }
        None => {
            ctx.diags.error(row, col, "case label does not reduce to an integer constant expression");
        }
    }
}

fn check_block_declaration(ctx: &mut SemaCtx, fctx: &mut FunctionCtx, node: NodeId) {
    let (specifiers, init_declarators) = match &ctx.ast.node(node).kind {
        NodeKind::Decl(DeclKind::Declaration { specifiers, init_declarators }) => (specifiers.clone(), init_declarators.clone()),
        _ => return,
    };
    check_record_member_storage_classes(ctx, &specifiers);
    for init_decl in init_declarators {
        let Some(declarator) = (match &ctx.ast.node(init_decl).kind {
            NodeKind::Decl(DeclKind::InitDeclarator { declarator, .. }) => Some(*declarator),
            _ => None,
        }) else {
            continue;
        };
        check_duplicate_block_declaration(ctx, fctx, declarator, specifiers.storage_class);
        if let NodeKind::Decl(DeclKind::InitDeclarator { initializer: Some(init), .. }) = &ctx.ast.node(init_decl).kind {
            let init = *init;
            visit_initializer_expr(ctx, init);
        }
    }
}

fn visit_initializer_expr(ctx: &mut SemaCtx, node: NodeId) {
    let items = match &ctx.ast.node(node).kind {
        NodeKind::Decl(DeclKind::InitializerList { items }) => Some(items.iter().map(|(_, v)| *v).collect::<Vec<_>>()),
        _ => None,
    };
    match items {
        Some(values) => {
            for v in values {
                visit_initializer_expr(ctx, v);
            }
        }
        None => visit_expr(ctx, node),
    }
}

fn visit_expr(ctx: &mut SemaCtx, node: NodeId) {
    let n = ctx.ast.node(node);
    let (row, col) = (n.row, n.col);
    match &n.kind {
        NodeKind::Expr(ExprKind::Assignment { target, value, .. }) => {
            let target = *target;
            let value = *value;
            check_modifiable_lvalue(ctx, target);
            visit_expr(ctx, target);
            visit_expr(ctx, value);
        }
        NodeKind::Expr(ExprKind::Binary { lhs, rhs, .. }) => {
            let (lhs, rhs) = (*lhs, *rhs);
            visit_expr(ctx, lhs);
            visit_expr(ctx, rhs);
        }
        NodeKind::Expr(ExprKind::Conditional { cond, then_expr, else_expr }) => {
            let (cond, then_expr, else_expr) = (*cond, *then_expr, *else_expr);
            visit_expr(ctx, cond);
            visit_expr(ctx, then_expr);
            visit_expr(ctx, else_expr);
        }
        NodeKind::Expr(ExprKind::Cast { operand, .. }) => {
            let operand = *operand;
            visit_expr(ctx, operand);
        }
        NodeKind::Expr(ExprKind::PrefixIncDec { operand, .. }) | NodeKind::Expr(ExprKind::PostfixIncDec { operand, .. }) => {
            let operand = *operand;
            check_modifiable_lvalue(ctx, operand);
            visit_expr(ctx, operand);
        }
        NodeKind::Expr(ExprKind::Unary { operand, .. }) => {
            let operand = *operand;
            visit_expr(ctx, operand);
        }
        NodeKind::Expr(ExprKind::Sizeof { operand }) => {
            let operand = *operand;
            visit_expr(ctx, operand);
        }
        NodeKind::Expr(ExprKind::Member { base, .. }) | NodeKind::Expr(ExprKind::DereferenceMember { base, .. }) => {
            let base = *base;
            visit_expr(ctx, base);
        }
        NodeKind::Expr(ExprKind::Call { callee, arguments }) => {
            let callee = *callee;
            let arguments = arguments.clone();
            visit_expr(ctx, callee);
            for a in arguments {
                visit_expr(ctx, a);
            }
        }
        NodeKind::Expr(ExprKind::Subscript { base, index }) => {
            let (base, index) = (*base, *index);
            visit_expr(ctx, base);
            visit_expr(ctx, index);
        }
        NodeKind::Expr(ExprKind::InitializerList { initializer_list }) => {
            let list = *initializer_list;
            visit_initializer_expr(ctx, list);
        }
        NodeKind::Expr(ExprKind::CompoundLiteral { initializer_list, .. }) => {
            let list = *initializer_list;
            visit_initializer_expr(ctx, list);
        }
        NodeKind::Expr(ExprKind::Comma { operands }) => {
            let operands = operands.clone();
            for o in operands {
                visit_expr(ctx, o);
            }
        }
        _ => {
            let _ = (row, col);
        }
    }
}

fn check_modifiable_lvalue(ctx: &mut SemaCtx, node: NodeId) {
    if !is_lvalue(ctx.ast, node) {
        let n = ctx.ast.node(node);
        ctx.diags.error(n.row, n.col, "expression is not assignable");
        return;
    }
    if let Some(ty) = ctx.ast.ty(node) {
        if ty.qualifiers.is_const() {
            let n = ctx.ast.node(node);
            ctx.diags.error(n.row, n.col, "assignment to a 'const'-qualified lvalue");
        }
        if matches!(ty.class, TypeClass::Array) {
            let n = ctx.ast.node(node);
            ctx.diags.error(n.row, n.col, "array type is not assignable");
        }
    }
}
