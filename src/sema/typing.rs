//! The typing pass (spec.md §4.2): constructs every declarator's [`CType`],
//! attaches a type to every expression node, finalizes struct/union/enum
//! specifiers, and resolves identifiers against the symbol table.
//!
//! Grounded on the reference's `analyze_expression`/`analyze_declarator`
//! pair (`analyze.c`), generalized here into one recursive walk per AST
//! sub-tree kind (declarator, specifier, statement, expression) since the
//! arena holds all three in one `NodeKind`.

use crate::ast::decl::{BasicTypeSpecifier as B, NonBasicTypeSpecifier, StorageClass};
use crate::ast::query::declarator_identifier;
use crate::ast::{
    BinOp, DeclKind, DeclarationSpecifiers, DeclaratorKind, ExprKind, NodeId, NodeKind, StmtKind, UnaryOp,
};
use crate::constexpr;
use crate::symbol::{Linkage, Namespace, StorageDuration};
use crate::types::function::FunctionType;
use crate::types::r#enum::{EnumType, Enumerator};
use crate::types::record::{RecordMember, RecordType};
use crate::types::{convert, CType, Derivation, Qualifiers, RecordKind, TypeClass};

use super::SemaCtx;

pub fn run(ctx: &mut SemaCtx, root: NodeId) {
    let external = match &ctx.ast.node(root).kind {
        NodeKind::TranslationUnit { external_declarations } => external_declarations.clone(),
        _ => return,
    };
    for decl in external {
        visit_external_declaration(ctx, decl);
    }
}

// ---- declaration specifiers / declarators ----

fn class_from_basic_specifiers(specs: &[B]) -> TypeClass {
    let has = |v: B| specs.contains(&v);
    let long_count = specs.iter().filter(|s| **s == B::Long).count();
    if has(B::Void) {
        return TypeClass::Void;
    }
    if has(B::Bool) {
        return TypeClass::Bool;
    }
    if has(B::Float) {
        return if has(B::Complex) {
            TypeClass::FloatComplex
        } else if has(B::Imaginary) {
            TypeClass::FloatImaginary
        } else {
            TypeClass::Float
        };
    }
    if has(B::Double) {
        return if long_count > 0 {
            if has(B::Complex) {
                TypeClass::LongDoubleComplex
            } else if has(B::Imaginary) {
                TypeClass::LongDoubleImaginary
            } else {
                TypeClass::LongDouble
            }
        } else if has(B::Complex) {
            TypeClass::DoubleComplex
        } else if has(B::Imaginary) {
            TypeClass::DoubleImaginary
        } else {
            TypeClass::Double
        };
    }
    if has(B::Char) {
        return if has(B::Unsigned) {
            TypeClass::UnsignedChar
        } else if has(B::Signed) {
            TypeClass::SignedChar
        } else {
            TypeClass::Char
        };
    }
    if has(B::Short) {
        return if has(B::Unsigned) { TypeClass::UnsignedShortInt } else { TypeClass::ShortInt };
    }
    if long_count >= 2 {
        return if has(B::Unsigned) { TypeClass::UnsignedLongLongInt } else { TypeClass::LongLongInt };
    }
    if long_count == 1 {
        return if has(B::Unsigned) { TypeClass::UnsignedLongInt } else { TypeClass::LongInt };
    }
    if has(B::Unsigned) {
        return TypeClass::UnsignedInt;
    }
    // Bare `int`, `signed`, `signed int`, or an empty specifier list (which
    // only a malformed declaration-specifiers list would produce, already
    // flagged by the constraint pass).
    TypeClass::Int
}

fn type_from_specifiers(ctx: &mut SemaCtx, specifiers: &DeclarationSpecifiers) -> CType {
    let base = match &specifiers.non_basic {
        Some(NonBasicTypeSpecifier::StructOrUnion(node)) => type_for_record_node(ctx, *node),
        Some(NonBasicTypeSpecifier::Enum(node)) => type_for_enum_node(ctx, *node),
        Some(NonBasicTypeSpecifier::TypedefName(name)) => {
            match ctx.symtab.lookup(ctx.current_scope(), name, &Namespace::Ordinary) {
                Some(id) => ctx.symtab.get(id).ty.clone(),
                None => CType::error(),
            }
        }
        None => CType::basic(class_from_basic_specifiers(&specifiers.basic_specifiers)),
    };
    let mut ty = base.qualified(specifiers.qualifiers);
    ty.is_inline = specifiers.is_inline;
    ty
}

enum DeclOp {
    Leaf,
    Pointer(Qualifiers, NodeId),
    Array(Option<NodeId>, NodeId),
    Function(Vec<NodeId>, bool, bool, NodeId),
}

/// Builds the type a declarator chain denotes given the base type its
/// specifiers contributed. The parser's `Pointer` node wraps the *entire*
/// remaining declarator (including any array/function suffix applied
/// directly to the identifier), so each layer computes a new base and
/// passes it down into `inner`; the leaf returns its accumulated base
/// unchanged. `int *a[3]` (`Pointer{inner: Array{inner: a}}`) yields
/// "array of pointer to int"; `int (*a)[3]` (`Array{inner: Pointer{inner:
/// a}}`) yields "pointer to array of int" — the parenthesization the
/// grammar already resolved into AST shape.
fn type_from_declarator(ctx: &mut SemaCtx, node: NodeId, base: CType) -> CType {
    let op = match &ctx.ast.node(node).kind {
        NodeKind::Decl(DeclKind::Declarator(DeclaratorKind::Identifier(_) | DeclaratorKind::Abstract)) => DeclOp::Leaf,
        NodeKind::Decl(DeclKind::Declarator(DeclaratorKind::Pointer { qualifiers, inner })) => {
            DeclOp::Pointer(*qualifiers, *inner)
        }
        NodeKind::Decl(DeclKind::Declarator(DeclaratorKind::Array { inner, len })) => DeclOp::Array(*len, *inner),
        NodeKind::Decl(DeclKind::Declarator(DeclaratorKind::Function { inner, parameters, is_variadic, is_prototyped })) => {
            DeclOp::Function(parameters.clone(), *is_variadic, *is_prototyped, *inner)
        }
        _ => DeclOp::Leaf,
    };
    match op {
        DeclOp::Leaf => base,
        DeclOp::Pointer(q, inner) => {
            let wrapped = CType::pointer_to(base).qualified(q);
            type_from_declarator(ctx, inner, wrapped)
        }
        DeclOp::Array(len_expr, inner) => {
            let length = len_expr.and_then(|e| constexpr::fold_to_i64(ctx.ast, e)).map(|v| v.max(0) as u64);
            let wrapped = CType::array_of(base, length);
            type_from_declarator(ctx, inner, wrapped)
        }
        DeclOp::Function(parameters, is_variadic, is_prototyped, inner) => {
            let param_scope = ctx.scopes.get(node);
            let ft = build_function_type(ctx, base, &parameters, is_variadic, is_prototyped, param_scope);
            let wrapped = CType {
                class: TypeClass::Function,
                qualifiers: Qualifiers::NONE,
                is_inline: false,
                derivation: Derivation::Function(ft),
            };
            type_from_declarator(ctx, inner, wrapped)
        }
    }
}

fn build_function_type(
    ctx: &mut SemaCtx,
    return_type: CType,
    parameters: &[NodeId],
    is_variadic: bool,
    is_prototyped: bool,
    declare_in_scope: Option<crate::symbol::table::ScopeId>,
) -> FunctionType {
    let mut ft = FunctionType::new(return_type);
    ft.is_variadic = is_variadic;
    ft.is_prototyped = is_prototyped;
    for &param in parameters {
        let (specifiers, declarator) = match &ctx.ast.node(param).kind {
            NodeKind::Decl(DeclKind::ParameterDeclaration { specifiers, declarator }) => (specifiers.clone(), *declarator),
            _ => continue,
        };
        let base = type_from_specifiers(ctx, &specifiers);
        let ty = match declarator {
            Some(d) => type_from_declarator(ctx, d, base),
            None => base,
        };
        let decayed = convert::decay_for_parameter(&ty);
        ctx.ast.set_ty(param, decayed.clone());
        if is_prototyped {
            ft.parameters.push(decayed.clone());
        }
        if let (Some(scope), Some(d)) = (declare_in_scope, declarator) {
            if let Some(name) = declarator_identifier(ctx.ast, d) {
                ctx.symtab.declare(
                    scope,
                    &name,
                    Namespace::Ordinary,
                    decayed,
                    Some(d),
                    Linkage::None,
                    StorageDuration::Automatic,
                    false,
                );
            }
        }
    }
    ft
}

// ---- struct/union/enum specifiers ----

fn type_for_record_node(ctx: &mut SemaCtx, node: NodeId) -> CType {
    let (kind, tag, members) = match &ctx.ast.node(node).kind {
        NodeKind::Decl(DeclKind::StructUnionSpecifier { kind, tag, members }) => (*kind, tag.clone(), members.clone()),
        _ => return CType::error(),
    };
    let tag_ns = if kind == RecordKind::Struct { Namespace::TagStruct } else { Namespace::TagUnion };
    let class = if kind == RecordKind::Struct { TypeClass::Structure } else { TypeClass::Union };

    let Some(member_nodes) = members else {
        // A reference to a tag with no body here: find the (possibly still
        // incomplete) type declared elsewhere, or declare a fresh
        // incomplete one if this is the first mention.
        let Some(tag_name) = &tag else { return CType::error() };
        if let Some(id) = ctx.symtab.lookup(ctx.current_scope(), tag_name, &tag_ns) {
            return ctx.symtab.get(id).ty.clone();
        }
        let incomplete = CType {
            class,
            qualifiers: Qualifiers::NONE,
            is_inline: false,
            derivation: Derivation::Record(RecordType::new(kind, tag.clone())),
        };
        ctx.symtab.declare(ctx.current_scope(), tag_name, tag_ns, incomplete.clone(), Some(node), Linkage::None, StorageDuration::Static, false);
        return incomplete;
    };

    let mut record = RecordType::new(kind, tag.clone());
    record.is_incomplete = false;
    for member_node in &member_nodes {
        let (specifiers, declarators) = match &ctx.ast.node(*member_node).kind {
            NodeKind::Decl(DeclKind::StructDeclaration { specifiers, declarators }) => (specifiers.clone(), declarators.clone()),
            _ => continue,
        };
        let base = type_from_specifiers(ctx, &specifiers);
        for (declarator, width) in declarators {
            let member_ty = match declarator {
                Some(d) => type_from_declarator(ctx, d, base.clone()),
                None => base.clone(),
            };
            if let Some(d) = declarator {
                ctx.ast.set_ty(d, member_ty.clone());
            }
            let bitfield_width = width.and_then(|w| constexpr::fold_to_i64(ctx.ast, w)).map(|v| v.max(0) as u32);
            let name = declarator.and_then(|d| declarator_identifier(ctx.ast, d));
            record.members.push(RecordMember { name, ty: member_ty, bitfield_width });
        }
    }

    let ty = CType { class, qualifiers: Qualifiers::NONE, is_inline: false, derivation: Derivation::Record(record) };
    ctx.ast.set_ty(node, ty.clone());
    if let Some(tag_name) = &tag {
        match ctx.symtab.lookup_local(ctx.current_scope(), tag_name, &tag_ns) {
            Some(id) => ctx.symtab.get_mut(id).ty = ty.clone(),
            None => {
                ctx.symtab.declare(ctx.current_scope(), tag_name, tag_ns, ty.clone(), Some(node), Linkage::None, StorageDuration::Static, false);
            }
        }
    }
    ty
}

fn type_for_enum_node(ctx: &mut SemaCtx, node: NodeId) -> CType {
    let (tag, enumerators) = match &ctx.ast.node(node).kind {
        NodeKind::Decl(DeclKind::EnumSpecifier { tag, enumerators }) => (tag.clone(), enumerators.clone()),
        _ => return CType::error(),
    };
    let mut constants = Vec::new();
    if let Some(list) = &enumerators {
        let mut next_value: i64 = 0;
        for (name, expr) in list {
            let value = match expr {
                Some(e) => match constexpr::fold_to_i64(ctx.ast, *e) {
                    Some(v) => v,
                    None => {
                        let n = ctx.ast.node(*e);
                        ctx.diags.error(n.row, n.col, "enumerator value is not an integer constant expression");
                        next_value
                    }
                },
                None => next_value,
            };
            next_value = value + 1;
            constants.push(Enumerator { name: name.clone(), value });
            if let Some(id) = ctx.symtab.lookup_local(ctx.current_scope(), name, &Namespace::Ordinary) {
                ctx.symtab.get_mut(id).enum_constant_value = Some(value);
            }
        }
    }
    let ty = CType {
        class: TypeClass::Enumerated,
        qualifiers: Qualifiers::NONE,
        is_inline: false,
        derivation: Derivation::Enum(EnumType { tag: tag.clone(), constants }),
    };
    ctx.ast.set_ty(node, ty.clone());
    if let Some(tag_name) = &tag {
        if let Some(id) = ctx.symtab.lookup_local(ctx.current_scope(), tag_name, &Namespace::TagEnum) {
            ctx.symtab.get_mut(id).ty = ty.clone();
        }
    }
    ty
}

// ---- external declarations, statements ----

enum ExtOp {
    Declaration(DeclarationSpecifiers, Vec<NodeId>),
    FunctionDefinition(DeclarationSpecifiers, NodeId, NodeId),
}

fn visit_external_declaration(ctx: &mut SemaCtx, node: NodeId) {
    let op = match &ctx.ast.node(node).kind {
        NodeKind::Decl(DeclKind::Declaration { specifiers, init_declarators }) => {
            ExtOp::Declaration(specifiers.clone(), init_declarators.clone())
        }
        NodeKind::Decl(DeclKind::FunctionDefinition { specifiers, declarator, body }) => {
            ExtOp::FunctionDefinition(specifiers.clone(), *declarator, *body)
        }
        _ => return,
    };
    match op {
        ExtOp::Declaration(specifiers, init_declarators) => visit_declaration(ctx, &specifiers, &init_declarators),
        ExtOp::FunctionDefinition(specifiers, declarator, body) => {
            let base = type_from_specifiers(ctx, &specifiers);
            let fn_ty = type_from_declarator(ctx, declarator, base);
            ctx.ast.set_ty(declarator, fn_ty.clone());
            if let Some(id) = ctx.symtab.find_by_declaring_node(declarator) {
                ctx.symtab.get_mut(id).ty = fn_ty;
            }
            ctx.enter_recorded_scope(declarator);
            visit_statement(ctx, body);
            ctx.exit_scope();
        }
    }
}

fn visit_declaration(ctx: &mut SemaCtx, specifiers: &DeclarationSpecifiers, init_declarators: &[NodeId]) {
    let base = type_from_specifiers(ctx, specifiers);
    let is_typedef = specifiers.storage_class == Some(StorageClass::Typedef);
    for &init_decl in init_declarators {
        let (declarator, initializer) = match &ctx.ast.node(init_decl).kind {
            NodeKind::Decl(DeclKind::InitDeclarator { declarator, initializer }) => (*declarator, *initializer),
            _ => continue,
        };
        let ty = type_from_declarator(ctx, declarator, base.clone());
        ctx.ast.set_ty(declarator, ty.clone());
        if let Some(id) = ctx.symtab.find_by_declaring_node(declarator) {
            let sym = ctx.symtab.get_mut(id);
            sym.ty = ty.clone();
            sym.is_typedef = is_typedef;
        }
        if let Some(init) = initializer {
            visit_initializer(ctx, init);
        }
    }
}

fn visit_initializer(ctx: &mut SemaCtx, node: NodeId) {
    let items = match &ctx.ast.node(node).kind {
        NodeKind::Decl(DeclKind::InitializerList { items }) => Some(items.iter().map(|(_, v)| *v).collect::<Vec<_>>()),
        _ => None,
    };
    match items {
        Some(values) => {
            for v in values {
                visit_initializer(ctx, v);
            }
        }
        None => {
            visit_expr(ctx, node);
        }
    }
}

enum StmtOp {
    Labeled(NodeId),
    CaseLabeled(Option<NodeId>, NodeId),
    Compound(Vec<NodeId>),
    Expression(Option<NodeId>),
    If(NodeId, NodeId, Option<NodeId>),
    Switch(NodeId, NodeId),
    Do(NodeId, NodeId),
    While(NodeId, NodeId),
    For(Option<NodeId>, Option<NodeId>, Option<NodeId>, NodeId),
    Return(Option<NodeId>),
    Other,
}

fn visit_statement(ctx: &mut SemaCtx, node: NodeId) {
    let op = match &ctx.ast.node(node).kind {
        NodeKind::Stmt(StmtKind::Labeled { statement, .. }) => StmtOp::Labeled(*statement),
        NodeKind::Stmt(StmtKind::CaseLabeled { value, statement }) => StmtOp::CaseLabeled(*value, *statement),
        NodeKind::Stmt(StmtKind::Compound { block_items }) => StmtOp::Compound(block_items.clone()),
        NodeKind::Stmt(StmtKind::Expression { expr }) => StmtOp::Expression(*expr),
        NodeKind::Stmt(StmtKind::If { cond, then_stmt, else_stmt }) => StmtOp::If(*cond, *then_stmt, *else_stmt),
        NodeKind::Stmt(StmtKind::Switch { controlling_expr, body }) => StmtOp::Switch(*controlling_expr, *body),
        NodeKind::Stmt(StmtKind::Do { body, cond }) => StmtOp::Do(*body, *cond),
        NodeKind::Stmt(StmtKind::While { cond, body }) => StmtOp::While(*cond, *body),
        NodeKind::Stmt(StmtKind::For { init, cond, post, body }) => StmtOp::For(*init, *cond, *post, *body),
        NodeKind::Stmt(StmtKind::Return { expr }) => StmtOp::Return(*expr),
        NodeKind::Stmt(_) => StmtOp::Other,
        NodeKind::Decl(DeclKind::Declaration { specifiers, init_declarators }) => {
            let specifiers = specifiers.clone();
            let init_declarators = init_declarators.clone();
            visit_declaration(ctx, &specifiers, &init_declarators);
            return;
        }
        _ => return,
    };
    match op {
        StmtOp::Labeled(s) => visit_statement(ctx, s),
        StmtOp::CaseLabeled(value, s) => {
            if let Some(v) = value {
                visit_expr(ctx, v);
            }
            visit_statement(ctx, s);
        }
        StmtOp::Compound(items) => {
            ctx.enter_recorded_scope(node);
            for item in items {
                let is_decl = matches!(ctx.ast.node(item).kind, NodeKind::Decl(_));
                if is_decl {
                    let (specifiers, init_declarators) = match &ctx.ast.node(item).kind {
                        NodeKind::Decl(DeclKind::Declaration { specifiers, init_declarators }) => {
                            (specifiers.clone(), init_declarators.clone())
                        }
                        _ => continue,
                    };
                    visit_declaration(ctx, &specifiers, &init_declarators);
                } else {
                    visit_statement(ctx, item);
                }
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
            visit_statement(ctx, then_stmt);
            if let Some(e) = else_stmt {
                visit_statement(ctx, e);
            }
        }
        StmtOp::Switch(controlling, body) => {
            visit_expr(ctx, controlling);
            visit_statement(ctx, body);
        }
        StmtOp::Do(body, cond) => {
            visit_statement(ctx, body);
            visit_expr(ctx, cond);
        }
        StmtOp::While(cond, body) => {
            visit_expr(ctx, cond);
            visit_statement(ctx, body);
        }
        StmtOp::For(init, cond, post, body) => {
            ctx.enter_recorded_scope(node);
            if let Some(i) = init {
                let is_decl = matches!(ctx.ast.node(i).kind, NodeKind::Decl(_));
                if is_decl {
                    let (specifiers, init_declarators) = match &ctx.ast.node(i).kind {
                        NodeKind::Decl(DeclKind::Declaration { specifiers, init_declarators }) => {
                            (specifiers.clone(), init_declarators.clone())
                        }
                        _ => (DeclarationSpecifiers::default(), vec![]),
                    };
                    visit_declaration(ctx, &specifiers, &init_declarators);
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
            visit_statement(ctx, body);
            ctx.exit_scope();
        }
        StmtOp::Return(expr) => {
            if let Some(e) = expr {
                visit_expr(ctx, e);
            }
        }
        StmtOp::Other => {}
    }
}

// ---- expressions ----

enum ExprOp {
    Identifier(String),
    Literal(CType),
    Assignment(NodeId, NodeId, Option<BinOp>),
    Binary(BinOp, NodeId, NodeId),
    Conditional(NodeId, NodeId, NodeId),
    Cast(NodeId, NodeId),
    IncDec(NodeId),
    Unary(UnaryOp, NodeId),
    Sizeof(NodeId),
    SizeofType(NodeId),
    Member(NodeId, String),
    DereferenceMember(NodeId, String),
    Call(NodeId, Vec<NodeId>),
    Subscript(NodeId, NodeId),
    InitializerList(NodeId),
    CompoundLiteral(NodeId, NodeId),
    Comma(Vec<NodeId>),
    AlreadyEnum(i64),
    Other,
}

fn visit_expr(ctx: &mut SemaCtx, node: NodeId) -> CType {
    let op = match &ctx.ast.node(node).kind {
        NodeKind::Expr(ExprKind::Identifier { name, .. }) => ExprOp::Identifier(name.clone()),
        NodeKind::Expr(ExprKind::IntegerConstant(i)) => ExprOp::Literal(i.suffix_type.clone().unwrap_or_else(CType::int)),
        NodeKind::Expr(ExprKind::FloatingConstant(f)) => ExprOp::Literal(f.ty.clone()),
        NodeKind::Expr(ExprKind::CharacterConstant(_)) => ExprOp::Literal(CType::int()),
        NodeKind::Expr(ExprKind::StringLiteral { bytes, .. }) => {
            ExprOp::Literal(CType::array_of(CType::basic(TypeClass::Char), Some(bytes.len() as u64 + 1)))
        }
        NodeKind::Expr(ExprKind::EnumerationConstant { value, .. }) => ExprOp::AlreadyEnum(*value),
        NodeKind::Expr(ExprKind::Assignment { target, value, compound_op }) => ExprOp::Assignment(*target, *value, *compound_op),
        NodeKind::Expr(ExprKind::Binary { op, lhs, rhs }) => ExprOp::Binary(*op, *lhs, *rhs),
        NodeKind::Expr(ExprKind::Conditional { cond, then_expr, else_expr }) => ExprOp::Conditional(*cond, *then_expr, *else_expr),
        NodeKind::Expr(ExprKind::Cast { type_name, operand }) => ExprOp::Cast(*type_name, *operand),
        NodeKind::Expr(ExprKind::PrefixIncDec { operand, .. }) => ExprOp::IncDec(*operand),
        NodeKind::Expr(ExprKind::PostfixIncDec { operand, .. }) => ExprOp::IncDec(*operand),
        NodeKind::Expr(ExprKind::Unary { op, operand }) => ExprOp::Unary(*op, *operand),
        NodeKind::Expr(ExprKind::Sizeof { operand }) => ExprOp::Sizeof(*operand),
        NodeKind::Expr(ExprKind::SizeofType { type_name }) => ExprOp::SizeofType(*type_name),
        NodeKind::Expr(ExprKind::Member { base, member }) => ExprOp::Member(*base, member.clone()),
        NodeKind::Expr(ExprKind::DereferenceMember { base, member }) => ExprOp::DereferenceMember(*base, member.clone()),
        NodeKind::Expr(ExprKind::Call { callee, arguments }) => ExprOp::Call(*callee, arguments.clone()),
        NodeKind::Expr(ExprKind::Subscript { base, index }) => ExprOp::Subscript(*base, *index),
        NodeKind::Expr(ExprKind::InitializerList { initializer_list }) => ExprOp::InitializerList(*initializer_list),
        NodeKind::Expr(ExprKind::CompoundLiteral { type_name, initializer_list }) => {
            ExprOp::CompoundLiteral(*type_name, *initializer_list)
        }
        NodeKind::Expr(ExprKind::Comma { operands }) => ExprOp::Comma(operands.clone()),
        _ => ExprOp::Other,
    };

    let ty = match op {
        ExprOp::Identifier(name) => visit_identifier(ctx, node, &name),
        ExprOp::Literal(ty) => ty,
        ExprOp::AlreadyEnum(_) => CType::basic(TypeClass::Enumerated),
        ExprOp::Assignment(target, value, compound_op) => {
            let target_ty = visit_expr(ctx, target);
            let value_ty = visit_expr(ctx, value);
            let _ = (compound_op, value_ty);
            target_ty
        }
        ExprOp::Binary(op, lhs, rhs) => {
            let lty = visit_expr(ctx, lhs);
            let rty = visit_expr(ctx, rhs);
            if op.is_relational_or_equality() || op.is_logical() {
                CType::int()
            } else if lty.is_pointer() || rty.is_pointer() {
                if lty.is_pointer() { lty } else { rty }
            } else {
                convert::usual_arithmetic_conversions(&lty, &rty)
            }
        }
        ExprOp::Conditional(cond, then_expr, else_expr) => {
            visit_expr(ctx, cond);
            let tty = visit_expr(ctx, then_expr);
            let ety = visit_expr(ctx, else_expr);
            convert::conditional_result_type(&tty, &ety)
        }
        ExprOp::Cast(type_name, operand) => {
            let ty = visit_type_name(ctx, type_name);
            visit_expr(ctx, operand);
            ty
        }
        ExprOp::IncDec(operand) => visit_expr(ctx, operand),
        ExprOp::Unary(op, operand) => {
            let operand_ty = visit_expr(ctx, operand);
            match op {
                UnaryOp::AddressOf => CType::pointer_to(operand_ty),
                UnaryOp::Dereference => operand_ty.pointee().cloned().unwrap_or_else(CType::error),
                UnaryOp::Not => CType::int(),
                _ => convert::integer_promote(&operand_ty),
            }
        }
        ExprOp::Sizeof(operand) => {
            visit_expr(ctx, operand);
            CType::basic(TypeClass::UnsignedLongInt)
        }
        ExprOp::SizeofType(type_name) => {
            visit_type_name(ctx, type_name);
            CType::basic(TypeClass::UnsignedLongInt)
        }
        ExprOp::Member(base, member) => {
            let base_ty = visit_expr(ctx, base);
            member_type(&base_ty, &member)
        }
        ExprOp::DereferenceMember(base, member) => {
            let base_ty = visit_expr(ctx, base);
            let pointee = base_ty.pointee().cloned().unwrap_or_else(CType::error);
            member_type(&pointee, &member)
        }
        ExprOp::Call(callee, arguments) => {
            let callee_ty = visit_expr(ctx, callee);
            for a in &arguments {
                visit_expr(ctx, *a);
            }
            let fn_ty = callee_ty.pointee().unwrap_or(&callee_ty).as_function().cloned();
            fn_ty.map(|f| (*f.return_type).clone()).unwrap_or_else(CType::error)
        }
        ExprOp::Subscript(base, index) => {
            let base_ty = visit_expr(ctx, base);
            visit_expr(ctx, index);
            let decayed = convert::array_to_pointer_decay(&base_ty);
            decayed.pointee().cloned().unwrap_or_else(CType::error)
        }
        ExprOp::InitializerList(list) => {
            visit_initializer(ctx, list);
            CType::error()
        }
        ExprOp::CompoundLiteral(type_name, initializer_list) => {
            let ty = visit_type_name(ctx, type_name);
            visit_initializer(ctx, initializer_list);
            ty
        }
        ExprOp::Comma(operands) => {
            let mut last = CType::void();
            for o in operands {
                last = visit_expr(ctx, o);
            }
            last
        }
        ExprOp::Other => CType::error(),
    };
    ctx.ast.set_ty(node, ty.clone());
    ty
}

fn member_type(base_ty: &CType, member: &str) -> CType {
    base_ty.as_record().and_then(|r| r.member(member)).map(|(_, m)| m.ty.clone()).unwrap_or_else(CType::error)
}

fn visit_identifier(ctx: &mut SemaCtx, node: NodeId, name: &str) -> CType {
    let Some(id) = ctx.symtab.lookup(ctx.current_scope(), name, &Namespace::Ordinary) else {
        let n = ctx.ast.node(node);
        ctx.diags.error(n.row, n.col, format!("use of undeclared identifier '{name}'"));
        return CType::error();
    };
    let sym = ctx.symtab.get(id);
    if let Some(value) = sym.enum_constant_value {
        let ty = sym.ty.clone();
        ctx.ast.node_mut(node).kind = NodeKind::Expr(ExprKind::EnumerationConstant { name: name.to_string(), value });
        return ty;
    }
    ctx.ast.node_mut(node).kind = NodeKind::Expr(ExprKind::Identifier { name: name.to_string(), resolved: Some(id) });
    ctx.symtab.get(id).ty.clone()
}

fn visit_type_name(ctx: &mut SemaCtx, node: NodeId) -> CType {
    let (specifiers, abstract_declarator) = match &ctx.ast.node(node).kind {
        NodeKind::Decl(DeclKind::TypeName { specifiers, abstract_declarator }) => (specifiers.clone(), *abstract_declarator),
        _ => return CType::error(),
    };
    let base = type_from_specifiers(ctx, &specifiers);
    let ty = match abstract_declarator {
        Some(d) => type_from_declarator(ctx, d, base),
        None => base,
    };
    ctx.ast.set_ty(node, ty.clone());
    ty
}
