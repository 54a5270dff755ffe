//! Lowers the typed AST to AIR (spec.md §4.5, §2 stage 7).
//!
//! Grounded on the typing pass's own traversal shape (`sema/typing.rs`):
//! one recursive walk per external declaration / statement / expression,
//! extracting an owned descriptor from the node's `kind` before recursing
//! so no borrow of `ctx.ast` outlives the match. Where spec.md describes
//! lvalue-vs-rvalue lowering as "context detection" against an
//! identifier's parent node, this walk gets the same result more
//! directly: each call site already knows which position it is lowering
//! and calls [`lower_addr`] or [`lower_rvalue`] accordingly, rather than
//! inspecting the parent after the fact.

use std::collections::HashMap;

use crate::air::{AirModule, DataObject, LabelId, Opcode, Operand, RoDataObject, Routine, VReg};
use crate::ast::decl::{DeclKind, DeclaratorKind};
use crate::ast::{Ast, BinOp, ExprKind, IncDecOp, NodeId, NodeKind, StmtKind, UnaryOp};
use crate::diag::DiagnosticBag;
use crate::symbol::{InitializerImage, Linkage, Namespace, StorageDuration, SymbolId, SymbolTable};
use crate::types::layout::TypeSizeSolver;
use crate::types::{CType, TypeClass};

/// Lowers every function definition and file-scope object declaration in
/// `root` into one [`AirModule`]. A static initializer that overruns its
/// own object's storage (spec.md §8 Boundaries) is reported through `diags`
/// rather than built, so the offending symbol's image may come back short
/// or incomplete — callers must check `diags.has_errors()` before trusting
/// the module.
pub fn build(ast: &Ast, symtab: &mut SymbolTable, diags: &mut DiagnosticBag, root: NodeId) -> AirModule {
    let mut module = AirModule::default();
    let externals = match &ast.node(root).kind {
        NodeKind::TranslationUnit { external_declarations } => external_declarations.clone(),
        _ => return module,
    };
    for decl in externals {
        lower_external_declaration(ast, symtab, diags, &mut module, decl);
    }
    module
}

enum Frame {
    Loop { break_label: LabelId, continue_label: LabelId },
    Switch { break_label: LabelId },
}

struct BuilderCtx<'a> {
    ast: &'a Ast,
    symtab: &'a mut SymbolTable,
    diags: &'a mut DiagnosticBag,
    routine: Routine,
    rodata: Vec<SymbolId>,
    frames: Vec<Frame>,
    labels: HashMap<String, LabelId>,
    /// Case/default statement node -> the label the enclosing switch's
    /// prescan minted for it, consulted when the walk reaches that node.
    case_labels: HashMap<NodeId, LabelId>,
    solver: TypeSizeSolver,
    interned: u32,
}

impl<'a> BuilderCtx<'a> {
    fn label_for(&mut self, name: &str) -> LabelId {
        if let Some(id) = self.labels.get(name) {
            return *id;
        }
        let id = self.routine.fresh_label();
        self.labels.insert(name.to_string(), id);
        id
    }

    fn break_label(&self) -> LabelId {
        for frame in self.frames.iter().rev() {
            match frame {
                Frame::Loop { break_label, .. } => return *break_label,
                Frame::Switch { break_label } => return *break_label,
            }
        }
        panic!("break outside loop/switch should have been rejected by the constraint pass");
    }

    fn continue_label(&self) -> LabelId {
        for frame in self.frames.iter().rev() {
            if let Frame::Loop { continue_label, .. } = frame {
                return *continue_label;
            }
        }
        panic!("continue outside loop should have been rejected by the constraint pass");
    }

    /// Declares a synthetic file-scope static object and gives it a byte
    /// image, the mechanism string literals, floating constants, and
    /// file-scope compound literals all share (spec.md §4.5: compound
    /// literals at file scope "create a static-duration synthetic
    /// symbol").
    fn intern_static(&mut self, ty: CType, bytes: Vec<u8>, is_rodata: bool) -> SymbolId {
        self.interned += 1;
        let name = format!("$const{}", self.interned);
        let scope = self.symtab.file_scope();
        let id = self.symtab.declare(scope, &name, Namespace::Ordinary, ty, None, Linkage::None, StorageDuration::Static, false);
        self.symtab.set_initializer(id, InitializerImage { bytes, relocations: vec![] });
        if is_rodata {
            self.rodata.push(id);
        }
        id
    }
}

fn find_function_layer(ast: &Ast, node: NodeId) -> Option<(NodeId, Vec<NodeId>)> {
    let mut cur = node;
    loop {
        match &ast.node(cur).kind {
            NodeKind::Decl(DeclKind::Declarator(DeclaratorKind::Function { inner, parameters, .. })) => {
                return Some((*inner, parameters.clone()))
            }
            NodeKind::Decl(DeclKind::Declarator(DeclaratorKind::Pointer { inner, .. }))
            | NodeKind::Decl(DeclKind::Declarator(DeclaratorKind::Array { inner, .. })) => cur = *inner,
            _ => return None,
        }
    }
}

fn function_parameter_symbols(ast: &Ast, symtab: &SymbolTable, declarator: NodeId) -> Vec<SymbolId> {
    let Some((_, parameters)) = find_function_layer(ast, declarator) else { return vec![] };
    parameters
        .iter()
        .filter_map(|&p| match &ast.node(p).kind {
            NodeKind::Decl(DeclKind::ParameterDeclaration { declarator: Some(d), .. }) => symtab.find_by_declaring_node(*d),
            _ => None,
        })
        .collect()
}

fn lower_external_declaration(ast: &Ast, symtab: &mut SymbolTable, diags: &mut DiagnosticBag, module: &mut AirModule, node: NodeId) {
    match &ast.node(node).kind {
        NodeKind::Decl(DeclKind::FunctionDefinition { declarator, body, .. }) => {
            let Some(sym_id) = symtab.find_by_declaring_node(*declarator) else { return };
            let name = symtab.get(sym_id).assembly_name();
            let params = function_parameter_symbols(ast, symtab, *declarator);
            let mut routine = Routine::new(name, sym_id);
            routine.params = params.clone();
            routine.uses_va_start = body_calls(ast, *body, "__builtin_va_start");
            for &param in &params {
                routine.push(Opcode::Declare, symtab.get(param).ty.clone(), vec![Operand::Symbol(param)]);
            }
            let mut ctx = BuilderCtx {
                ast,
                symtab,
                diags,
                routine,
                rodata: Vec::new(),
                frames: Vec::new(),
                labels: HashMap::new(),
                case_labels: HashMap::new(),
                solver: TypeSizeSolver::new(),
                interned: 0,
            };
            lower_statement(&mut ctx, *body);
            for sym in ctx.rodata {
                module.rodata.push(RoDataObject { symbol: sym });
            }
            module.routines.push(ctx.routine);
        }
        NodeKind::Decl(DeclKind::Declaration { init_declarators, .. }) => {
            for &init_decl in init_declarators {
                let declarator = match &ast.node(init_decl).kind {
                    NodeKind::Decl(DeclKind::InitDeclarator { declarator, .. }) => *declarator,
                    _ => continue,
                };
                let Some(sym_id) = symtab.find_by_declaring_node(declarator) else { continue };
                let ty = symtab.get(sym_id).ty.clone();
                if ty.is_function() || symtab.get(sym_id).is_typedef {
                    continue;
                }
                module.data.push(DataObject { symbol: sym_id });
            }
        }
        _ => {}
    }
}

/// Crude scan for a call to a named function anywhere under `node`, used
/// only to detect `va_start` usage for the selector's variadic save area
/// (spec.md §4.8). Good enough since this is a yes/no routine-wide flag,
/// not a per-call-site decision.
fn body_calls(ast: &Ast, node: NodeId, name: &str) -> bool {
    match &ast.node(node).kind {
        NodeKind::Expr(ExprKind::Call { callee, arguments }) => {
            let is_match = matches!(&ast.node(*callee).kind, NodeKind::Expr(ExprKind::Identifier { name: n, .. }) if n == name);
            is_match || body_calls(ast, *callee, name) || arguments.iter().any(|a| body_calls(ast, *a, name))
        }
        NodeKind::Stmt(StmtKind::Compound { block_items }) => block_items.iter().any(|&i| body_calls(ast, i, name)),
        NodeKind::Stmt(StmtKind::Labeled { statement, .. }) => body_calls(ast, *statement, name),
        NodeKind::Stmt(StmtKind::CaseLabeled { statement, .. }) => body_calls(ast, *statement, name),
        NodeKind::Stmt(StmtKind::Expression { expr: Some(e) }) => body_calls(ast, *e, name),
        NodeKind::Stmt(StmtKind::If { cond, then_stmt, else_stmt }) => {
            body_calls(ast, *cond, name) || body_calls(ast, *then_stmt, name) || else_stmt.is_some_and(|e| body_calls(ast, e, name))
        }
        NodeKind::Stmt(StmtKind::Switch { controlling_expr, body }) => {
            body_calls(ast, *controlling_expr, name) || body_calls(ast, *body, name)
        }
        NodeKind::Stmt(StmtKind::Do { body, cond }) | NodeKind::Stmt(StmtKind::While { cond, body }) => {
            body_calls(ast, *cond, name) || body_calls(ast, *body, name)
        }
        NodeKind::Stmt(StmtKind::For { init, cond, post, body }) => {
            init.is_some_and(|n| body_calls(ast, n, name))
                || cond.is_some_and(|n| body_calls(ast, n, name))
                || post.is_some_and(|n| body_calls(ast, n, name))
                || body_calls(ast, *body, name)
        }
        NodeKind::Decl(DeclKind::Declaration { init_declarators, .. }) => init_declarators.iter().any(|&d| body_calls(ast, d, name)),
        NodeKind::Decl(DeclKind::InitDeclarator { initializer: Some(i), .. }) => body_calls(ast, *i, name),
        _ => false,
    }
}

// ---- statements ----

enum StmtOp {
    Labeled(String, NodeId),
    CaseLabeled(NodeId),
    Compound(Vec<NodeId>),
    Expression(Option<NodeId>),
    If(NodeId, NodeId, Option<NodeId>),
    Switch(NodeId, NodeId),
    Do(NodeId, NodeId),
    While(NodeId, NodeId),
    For(Option<NodeId>, Option<NodeId>, Option<NodeId>, NodeId),
    Goto(String),
    Continue,
    Break,
    Return(Option<NodeId>),
    Declaration(Vec<NodeId>),
    Other,
}

fn lower_statement(ctx: &mut BuilderCtx, node: NodeId) {
    let op = match &ctx.ast.node(node).kind {
        NodeKind::Stmt(StmtKind::Labeled { label, statement }) => StmtOp::Labeled(label.clone(), *statement),
        NodeKind::Stmt(StmtKind::CaseLabeled { statement, .. }) => StmtOp::CaseLabeled(*statement),
        NodeKind::Stmt(StmtKind::Compound { block_items }) => StmtOp::Compound(block_items.clone()),
        NodeKind::Stmt(StmtKind::Expression { expr }) => StmtOp::Expression(*expr),
        NodeKind::Stmt(StmtKind::If { cond, then_stmt, else_stmt }) => StmtOp::If(*cond, *then_stmt, *else_stmt),
        NodeKind::Stmt(StmtKind::Switch { controlling_expr, body }) => StmtOp::Switch(*controlling_expr, *body),
        NodeKind::Stmt(StmtKind::Do { body, cond }) => StmtOp::Do(*body, *cond),
        NodeKind::Stmt(StmtKind::While { cond, body }) => StmtOp::While(*cond, *body),
        NodeKind::Stmt(StmtKind::For { init, cond, post, body }) => StmtOp::For(*init, *cond, *post, *body),
        NodeKind::Stmt(StmtKind::Goto { label }) => StmtOp::Goto(label.clone()),
        NodeKind::Stmt(StmtKind::Continue) => StmtOp::Continue,
        NodeKind::Stmt(StmtKind::Break) => StmtOp::Break,
        NodeKind::Stmt(StmtKind::Return { expr }) => StmtOp::Return(*expr),
        NodeKind::Decl(DeclKind::Declaration { init_declarators, .. }) => StmtOp::Declaration(init_declarators.clone()),
        _ => StmtOp::Other,
    };
    match op {
        StmtOp::Labeled(name, stmt) => {
            let lbl = ctx.label_for(&name);
            ctx.routine.push(Opcode::Label, CType::void(), vec![Operand::Label(lbl)]);
            lower_statement(ctx, stmt);
        }
        StmtOp::CaseLabeled(stmt) => {
            if let Some(&lbl) = ctx.case_labels.get(&node) {
                ctx.routine.push(Opcode::Label, CType::void(), vec![Operand::Label(lbl)]);
            }
            lower_statement(ctx, stmt);
        }
        StmtOp::Compound(items) => {
            for item in items {
                lower_statement(ctx, item);
            }
        }
        StmtOp::Expression(expr) => {
            if let Some(e) = expr {
                lower_rvalue(ctx, e);
                ctx.routine.push(Opcode::SequencePoint, CType::void(), vec![]);
            }
        }
        StmtOp::If(cond, then_stmt, else_stmt) => lower_if(ctx, cond, then_stmt, else_stmt),
        StmtOp::Switch(controlling, body) => lower_switch(ctx, controlling, body),
        StmtOp::Do(body, cond) => lower_do_while(ctx, body, cond),
        StmtOp::While(cond, body) => lower_while(ctx, cond, body),
        StmtOp::For(init, cond, post, body) => lower_for(ctx, init, cond, post, body),
        StmtOp::Goto(label) => {
            let lbl = ctx.label_for(&label);
            ctx.routine.push(Opcode::Jmp, CType::void(), vec![Operand::Label(lbl)]);
        }
        StmtOp::Continue => {
            let lbl = ctx.continue_label();
            ctx.routine.push(Opcode::Jmp, CType::void(), vec![Operand::Label(lbl)]);
        }
        StmtOp::Break => {
            let lbl = ctx.break_label();
            ctx.routine.push(Opcode::Jmp, CType::void(), vec![Operand::Label(lbl)]);
        }
        StmtOp::Return(expr) => {
            match expr {
                Some(e) => {
                    let v = lower_rvalue(ctx, e);
                    ctx.routine.push(Opcode::Return, ctx.ast.ty(e).cloned().unwrap_or(CType::void()), vec![Operand::VReg(v)]);
                }
                None => {
                    ctx.routine.push(Opcode::Return, CType::void(), vec![]);
                }
            }
        }
        StmtOp::Declaration(init_declarators) => lower_block_declaration(ctx, &init_declarators),
        StmtOp::Other => {}
    }
}

fn lower_if(ctx: &mut BuilderCtx, cond: NodeId, then_stmt: NodeId, else_stmt: Option<NodeId>) {
    let cond_vreg = lower_rvalue(ctx, cond);
    let else_label = ctx.routine.fresh_label();
    ctx.routine.push(Opcode::Jz, CType::void(), vec![Operand::VReg(cond_vreg), Operand::Label(else_label)]);
    lower_statement(ctx, then_stmt);
    match else_stmt {
        Some(e) => {
            let end_label = ctx.routine.fresh_label();
            ctx.routine.push(Opcode::Jmp, CType::void(), vec![Operand::Label(end_label)]);
            ctx.routine.push(Opcode::Label, CType::void(), vec![Operand::Label(else_label)]);
            lower_statement(ctx, e);
            ctx.routine.push(Opcode::Label, CType::void(), vec![Operand::Label(end_label)]);
        }
        None => {
            ctx.routine.push(Opcode::Label, CType::void(), vec![Operand::Label(else_label)]);
        }
    }
}

/// `while (cond) body` becomes `jmp cond_label; body_label: body;
/// cond_label: cond; jnz body_label; end_label:` — the init-less form of
/// the `for` shape spec.md §4.5 spells out (§8 scenario 6: "exactly two
/// labels, one unconditional jump to the condition label, and one jnz").
fn lower_while(ctx: &mut BuilderCtx, cond: NodeId, body: NodeId) {
    let cond_label = ctx.routine.fresh_label();
    let body_label = ctx.routine.fresh_label();
    let end_label = ctx.routine.fresh_label();
    ctx.routine.push(Opcode::Jmp, CType::void(), vec![Operand::Label(cond_label)]);
    ctx.routine.push(Opcode::Label, CType::void(), vec![Operand::Label(body_label)]);
    ctx.frames.push(Frame::Loop { break_label: end_label, continue_label: cond_label });
    lower_statement(ctx, body);
    ctx.frames.pop();
    ctx.routine.push(Opcode::Label, CType::void(), vec![Operand::Label(cond_label)]);
    let v = lower_rvalue(ctx, cond);
    ctx.routine.push(Opcode::Jnz, CType::void(), vec![Operand::VReg(v), Operand::Label(body_label)]);
    ctx.routine.push(Opcode::Label, CType::void(), vec![Operand::Label(end_label)]);
}

/// `do body while (cond)` reorders: `body_label: body; cond_label: cond;
/// jnz body_label; end_label:` (spec.md §4.5: "`do … while` reorders").
fn lower_do_while(ctx: &mut BuilderCtx, body: NodeId, cond: NodeId) {
    let body_label = ctx.routine.fresh_label();
    let cond_label = ctx.routine.fresh_label();
    let end_label = ctx.routine.fresh_label();
    ctx.routine.push(Opcode::Label, CType::void(), vec![Operand::Label(body_label)]);
    ctx.frames.push(Frame::Loop { break_label: end_label, continue_label: cond_label });
    lower_statement(ctx, body);
    ctx.frames.pop();
    ctx.routine.push(Opcode::Label, CType::void(), vec![Operand::Label(cond_label)]);
    let v = lower_rvalue(ctx, cond);
    ctx.routine.push(Opcode::Jnz, CType::void(), vec![Operand::VReg(v), Operand::Label(body_label)]);
    ctx.routine.push(Opcode::Label, CType::void(), vec![Operand::Label(end_label)]);
}

/// `for (init; cond; post) body` becomes `init; jmp cond; body_label:
/// body; post; cond_label: cond; jnz body_label` verbatim (spec.md §4.5).
fn lower_for(ctx: &mut BuilderCtx, init: Option<NodeId>, cond: Option<NodeId>, post: Option<NodeId>, body: NodeId) {
    if let Some(i) = init {
        let is_decl = matches!(ctx.ast.node(i).kind, NodeKind::Decl(_));
        if is_decl {
            lower_statement(ctx, i);
        } else {
            lower_rvalue(ctx, i);
        }
    }
    let cond_label = ctx.routine.fresh_label();
    let body_label = ctx.routine.fresh_label();
    let end_label = ctx.routine.fresh_label();
    ctx.routine.push(Opcode::Jmp, CType::void(), vec![Operand::Label(cond_label)]);
    ctx.routine.push(Opcode::Label, CType::void(), vec![Operand::Label(body_label)]);
    ctx.frames.push(Frame::Loop { break_label: end_label, continue_label: cond_label });
    lower_statement(ctx, body);
    ctx.frames.pop();
    if let Some(p) = post {
        lower_rvalue(ctx, p);
    }
    ctx.routine.push(Opcode::Label, CType::void(), vec![Operand::Label(cond_label)]);
    match cond {
        Some(c) => {
            let v = lower_rvalue(ctx, c);
            ctx.routine.push(Opcode::Jnz, CType::void(), vec![Operand::VReg(v), Operand::Label(body_label)]);
        }
        None => {
            ctx.routine.push(Opcode::Jmp, CType::void(), vec![Operand::Label(body_label)]);
        }
    }
    ctx.routine.push(Opcode::Label, CType::void(), vec![Operand::Label(end_label)]);
}

fn lower_switch(ctx: &mut BuilderCtx, controlling: NodeId, body: NodeId) {
    let ty = ctx.ast.ty(controlling).cloned().unwrap_or(CType::int());
    let ctrl_vreg = lower_rvalue(ctx, controlling);

    let mut cases: Vec<(i64, LabelId)> = Vec::new();
    let mut default_label: Option<LabelId> = None;
    collect_switch_cases(ctx, body, &mut cases, &mut default_label);

    for (value, label) in &cases {
        let cmp = ctx.routine.fresh_vreg();
        ctx.routine.push(Opcode::CmpEq, ty.clone(), vec![Operand::VReg(cmp), Operand::VReg(ctrl_vreg), Operand::IntConst(*value)]);
        ctx.routine.push(Opcode::Jnz, CType::void(), vec![Operand::VReg(cmp), Operand::Label(*label)]);
    }
    let end_label = ctx.routine.fresh_label();
    match default_label {
        Some(lbl) => ctx.routine.push(Opcode::Jmp, CType::void(), vec![Operand::Label(lbl)]),
        None => ctx.routine.push(Opcode::Jmp, CType::void(), vec![Operand::Label(end_label)]),
    };

    ctx.frames.push(Frame::Switch { break_label: end_label });
    lower_statement(ctx, body);
    ctx.frames.pop();
    ctx.routine.push(Opcode::Label, CType::void(), vec![Operand::Label(end_label)]);
}

/// Prescans a switch body for `case`/`default` labels, minting each a
/// label up front so the dispatch chain can jump forward to code the walk
/// hasn't lowered yet. Descends into nested loops (Duff's-device cases
/// still belong to the enclosing switch) but not into a nested `switch`,
/// whose cases belong to it instead.
fn collect_switch_cases(ctx: &mut BuilderCtx, node: NodeId, cases: &mut Vec<(i64, LabelId)>, default_label: &mut Option<LabelId>) {
    match &ctx.ast.node(node).kind {
        NodeKind::Stmt(StmtKind::CaseLabeled { value, statement }) => {
            let statement = *statement;
            let label = ctx.routine.fresh_label();
            match value {
                Some(v) => {
                    let folded = crate::constexpr::fold_to_i64(ctx.ast, *v).unwrap_or(0);
                    cases.push((folded, label));
                }
                None => *default_label = Some(label),
            }
            ctx.case_labels.insert(node, label);
            collect_switch_cases(ctx, statement, cases, default_label);
        }
        NodeKind::Stmt(StmtKind::Labeled { statement, .. }) => collect_switch_cases(ctx, *statement, cases, default_label),
        NodeKind::Stmt(StmtKind::Compound { block_items }) => {
            for item in block_items.clone() {
                collect_switch_cases(ctx, item, cases, default_label);
            }
        }
        NodeKind::Stmt(StmtKind::If { then_stmt, else_stmt, .. }) => {
            collect_switch_cases(ctx, *then_stmt, cases, default_label);
            if let Some(e) = else_stmt {
                collect_switch_cases(ctx, *e, cases, default_label);
            }
        }
        NodeKind::Stmt(StmtKind::While { body, .. }) | NodeKind::Stmt(StmtKind::Do { body, .. }) => {
            collect_switch_cases(ctx, *body, cases, default_label)
        }
        NodeKind::Stmt(StmtKind::For { body, .. }) => collect_switch_cases(ctx, *body, cases, default_label),
        _ => {}
    }
}

fn lower_block_declaration(ctx: &mut BuilderCtx, init_declarators: &[NodeId]) {
    for &init_decl in init_declarators {
        let (declarator, initializer) = match &ctx.ast.node(init_decl).kind {
            NodeKind::Decl(DeclKind::InitDeclarator { declarator, initializer }) => (*declarator, *initializer),
            _ => continue,
        };
        let Some(sym_id) = ctx.symtab.find_by_declaring_node(declarator) else { continue };
        let sym = ctx.symtab.get(sym_id);
        if sym.ty.is_function() || sym.is_typedef {
            continue;
        }
        ctx.routine.push(Opcode::Declare, sym.ty.clone(), vec![Operand::Symbol(sym_id)]);
        if let Some(init) = initializer {
            match ctx.symtab.get(sym_id).storage_duration {
                StorageDuration::Static => lower_static_initializer(ctx, sym_id, init),
                _ => lower_auto_initializer(ctx, sym_id, init),
            }
        }
    }
}

/// Lowers an automatic-duration initializer to a sequence of
/// `store-address` instructions, offset by each designation (spec.md
/// §4.5). Designated initializers beyond plain positional ones are out of
/// scope for this simplified pass — positional brace lists and scalar
/// initializers are handled, which covers every form the constraint pass
/// admits for a non-aggregate or simply-nested aggregate declaration.
fn lower_auto_initializer(ctx: &mut BuilderCtx, sym_id: SymbolId, node: NodeId) {
    fn walk(ctx: &mut BuilderCtx, sym_id: SymbolId, node: NodeId, base_offset: u64) {
        let items = match &ctx.ast.node(node).kind {
            NodeKind::Decl(DeclKind::InitializerList { items }) => Some(items.clone()),
            _ => None,
        };
        match items {
            Some(items) => {
                let elem_ty = ctx
                    .symtab
                    .get(sym_id)
                    .ty
                    .array_element()
                    .cloned()
                    .unwrap_or(CType::int());
                let elem_size = ctx.solver.layout_of(&elem_ty).size;
                for (i, (_, value)) in items.iter().enumerate() {
                    walk(ctx, sym_id, *value, base_offset + elem_size * i as u64);
                }
            }
            None => {
                let value = lower_rvalue(ctx, node);
                let ty = ctx.ast.ty(node).cloned().unwrap_or(CType::int());
                let base_addr = ctx.routine.fresh_vreg();
                ctx.routine.push(Opcode::LoadAddr, CType::pointer_to(ty.clone()), vec![Operand::VReg(base_addr), Operand::Symbol(sym_id)]);
                ctx.routine.push(
                    Opcode::StoreAddr,
                    ty,
                    vec![Operand::Indirect { base: base_addr, offset: base_offset as i64, index: None }, Operand::VReg(value)],
                );
            }
        }
    }
    walk(ctx, sym_id, node, 0);
}

/// Static-duration initializers populate the symbol's byte image and
/// relocation list directly and emit no runtime code (spec.md §4.5).
fn lower_static_initializer(ctx: &mut BuilderCtx, sym_id: SymbolId, node: NodeId) {
    let ty = ctx.symtab.get(sym_id).ty.clone();
    let size = ctx.solver.layout_of(&ty).size as usize;
    let mut image = InitializerImage { bytes: vec![0u8; size], relocations: Vec::new() };
    fill_static_image(ctx, &mut image, 0, &ty, node);
    ctx.symtab.set_initializer(sym_id, image);
}

/// Writes one scalar (or recurses into one initializer-list layer) into
/// `image` at `offset`. An over-provisioned initializer — more elements
/// than the target object has room for — can ask to write past
/// `image.bytes.len()`; rather than let the slice index panic, that case
/// is diagnosed and the out-of-range write is dropped (spec.md §8: a
/// syntactically valid but constraint-violating input must never crash the
/// compiler).
fn fill_static_image(ctx: &mut BuilderCtx, image: &mut InitializerImage, offset: u64, ty: &CType, node: NodeId) {
    let items = match &ctx.ast.node(node).kind {
        NodeKind::Decl(DeclKind::InitializerList { items }) => Some(items.clone()),
        _ => None,
    };
    match items {
        Some(items) => {
            let elem_ty = ty.array_element().cloned().unwrap_or(CType::int());
            let elem_size = ctx.solver.layout_of(&elem_ty).size;
            for (i, (_, value)) in items.iter().enumerate() {
                fill_static_image(ctx, image, offset + elem_size * i as u64, &elem_ty, *value);
            }
        }
        None => {
            if offset as usize >= image.bytes.len() {
                let n = ctx.ast.node(node);
                ctx.diags.error(n.row, n.col, "initializer has more elements than the object it initializes");
                return;
            }
            let eval = crate::constexpr::evaluate_address(ctx.ast, node);
            if let Some(crate::constexpr::ConstValue::Address { value: addr, .. }) = eval.into_value() {
                let end = (offset as usize + 8).min(image.bytes.len());
                if let Some(target) = addr.symbol {
                    image.relocations.push(crate::symbol::Relocation { offset_in_image: offset, target, addend: addr.offset });
                } else {
                    image.bytes[offset as usize..end].copy_from_slice(&addr.offset.to_le_bytes()[..end - offset as usize]);
                }
                return;
            }
            if let Some(v) = crate::constexpr::fold_to_i64(ctx.ast, node) {
                let width = ctx.solver.layout_of(ty).size as usize;
                let end = (offset as usize + width).min(image.bytes.len());
                let bytes = v.to_le_bytes();
                image.bytes[offset as usize..end].copy_from_slice(&bytes[..end - offset as usize]);
            }
        }
    }
}

// ---- expressions ----

/// Lowers `node` for its value, decaying an array/function designator to
/// its address per C99 6.3.2.1.
fn lower_rvalue(ctx: &mut BuilderCtx, node: NodeId) -> VReg {
    let ty = ctx.ast.ty(node).cloned().unwrap_or(CType::error());
    if ty.is_array() || ty.is_function() {
        return lower_addr(ctx, node);
    }
    match &ctx.ast.node(node).kind {
        NodeKind::Expr(ExprKind::Identifier { resolved: Some(sym), .. }) => {
            let sym = *sym;
            let r = ctx.routine.fresh_vreg();
            ctx.routine.push(Opcode::Load, ty, vec![Operand::VReg(r), Operand::Symbol(sym)]);
            r
        }
        NodeKind::Expr(ExprKind::Identifier { resolved: None, .. }) => ctx.routine.fresh_vreg(),
        NodeKind::Expr(ExprKind::IntegerConstant(ic)) => {
            let r = ctx.routine.fresh_vreg();
            ctx.routine.push(Opcode::Assign, ty, vec![Operand::VReg(r), Operand::IntConst(ic.value as i64)]);
            r
        }
        NodeKind::Expr(ExprKind::CharacterConstant(cc)) => {
            let r = ctx.routine.fresh_vreg();
            ctx.routine.push(Opcode::Assign, ty, vec![Operand::VReg(r), Operand::IntConst(cc.value)]);
            r
        }
        NodeKind::Expr(ExprKind::EnumerationConstant { value, .. }) => {
            let r = ctx.routine.fresh_vreg();
            ctx.routine.push(Opcode::Assign, ty, vec![Operand::VReg(r), Operand::IntConst(*value)]);
            r
        }
        NodeKind::Expr(ExprKind::FloatingConstant(fc)) => {
            let r = ctx.routine.fresh_vreg();
            ctx.routine.push(Opcode::Assign, ty, vec![Operand::VReg(r), Operand::FloatConst(fc.value)]);
            r
        }
        NodeKind::Expr(ExprKind::StringLiteral { bytes, .. }) => {
            let mut image = bytes.clone();
            image.push(0);
            let array_ty = CType::array_of(CType::basic(TypeClass::Char), Some(image.len() as u64));
            let sym = ctx.intern_static(array_ty, image, true);
            let r = ctx.routine.fresh_vreg();
            ctx.routine.push(Opcode::LoadAddr, ty, vec![Operand::VReg(r), Operand::Symbol(sym)]);
            r
        }
        NodeKind::Expr(ExprKind::Assignment { target, value, compound_op }) => lower_assignment(ctx, *target, *value, *compound_op),
        NodeKind::Expr(ExprKind::Binary { op, lhs, rhs }) => lower_binary(ctx, *op, *lhs, *rhs, ty),
        NodeKind::Expr(ExprKind::Conditional { cond, then_expr, else_expr }) => lower_conditional(ctx, *cond, *then_expr, *else_expr, ty),
        NodeKind::Expr(ExprKind::Cast { operand, .. }) => {
            let from_ty = ctx.ast.ty(*operand).cloned().unwrap_or(CType::int());
            let v = lower_rvalue(ctx, *operand);
            convert_value(ctx, v, &from_ty, &ty)
        }
        NodeKind::Expr(ExprKind::PrefixIncDec { op, operand }) => lower_inc_dec(ctx, *op, *operand, true),
        NodeKind::Expr(ExprKind::PostfixIncDec { op, operand }) => lower_inc_dec(ctx, *op, *operand, false),
        NodeKind::Expr(ExprKind::Unary { op, operand }) => lower_unary(ctx, *op, *operand, ty),
        NodeKind::Expr(ExprKind::Sizeof { operand }) => {
            let operand_ty = ctx.ast.ty(*operand).cloned().unwrap_or(CType::int());
            let size = ctx.solver.layout_of(&operand_ty).size as i64;
            let r = ctx.routine.fresh_vreg();
            ctx.routine.push(Opcode::Assign, ty, vec![Operand::VReg(r), Operand::IntConst(size)]);
            r
        }
        NodeKind::Expr(ExprKind::SizeofType { type_name }) => {
            let named_ty = ctx.ast.ty(*type_name).cloned().unwrap_or(CType::int());
            let size = ctx.solver.layout_of(&named_ty).size as i64;
            let r = ctx.routine.fresh_vreg();
            ctx.routine.push(Opcode::Assign, ty, vec![Operand::VReg(r), Operand::IntConst(size)]);
            r
        }
        NodeKind::Expr(ExprKind::Member { .. }) | NodeKind::Expr(ExprKind::DereferenceMember { .. }) => {
            let addr = lower_addr(ctx, node);
            let r = ctx.routine.fresh_vreg();
            ctx.routine.push(Opcode::Load, ty, vec![Operand::VReg(r), Operand::Indirect { base: addr, offset: 0, index: None }]);
            r
        }
        NodeKind::Expr(ExprKind::Subscript { .. }) => {
            let addr = lower_addr(ctx, node);
            let r = ctx.routine.fresh_vreg();
            ctx.routine.push(Opcode::Load, ty, vec![Operand::VReg(r), Operand::Indirect { base: addr, offset: 0, index: None }]);
            r
        }
        NodeKind::Expr(ExprKind::Call { callee, arguments }) => lower_call(ctx, *callee, arguments, ty),
        NodeKind::Expr(ExprKind::Comma { operands }) => {
            let mut last = ctx.routine.fresh_vreg();
            for (i, &operand) in operands.iter().enumerate() {
                last = lower_rvalue(ctx, operand);
                if i + 1 != operands.len() {
                    ctx.routine.push(Opcode::SequencePoint, CType::void(), vec![]);
                }
            }
            last
        }
        NodeKind::Expr(ExprKind::InitializerList { .. }) | NodeKind::Expr(ExprKind::CompoundLiteral { .. }) => lower_addr(ctx, node),
        _ => ctx.routine.fresh_vreg(),
    }
}

/// Lowers `node` for its address; `node` must be an lvalue, a function
/// designator, or an array (whose "address" is the decayed pointer value
/// itself — the two notions coincide for arrays).
fn lower_addr(ctx: &mut BuilderCtx, node: NodeId) -> VReg {
    match &ctx.ast.node(node).kind {
        NodeKind::Expr(ExprKind::Identifier { resolved: Some(sym), .. }) => {
            let sym = *sym;
            let r = ctx.routine.fresh_vreg();
            ctx.routine.push(Opcode::LoadAddr, CType::pointer_to(ctx.ast.ty(node).cloned().unwrap_or(CType::int())), vec![Operand::VReg(r), Operand::Symbol(sym)]);
            r
        }
        NodeKind::Expr(ExprKind::Unary { op: UnaryOp::Dereference, operand }) => lower_rvalue(ctx, *operand),
        NodeKind::Expr(ExprKind::Subscript { base, index }) => {
            let base_ty = ctx.ast.ty(*base).cloned().unwrap_or(CType::int());
            let elem_ty = base_ty.pointee().or_else(|| base_ty.array_element()).cloned().unwrap_or(CType::int());
            let scale = ctx.solver.layout_of(&elem_ty).size;
            let base_v = lower_rvalue(ctx, *base);
            let index_v = lower_rvalue(ctx, *index);
            let r = ctx.routine.fresh_vreg();
            let ptr_ty = CType::pointer_to(elem_ty);
            ctx.routine.push(
                Opcode::Add,
                ptr_ty,
                vec![Operand::VReg(r), Operand::VReg(base_v), Operand::Indirect { base: index_v, offset: 0, index: Some((index_v, scale.min(8) as u8)) }],
            );
            r
        }
        NodeKind::Expr(ExprKind::Member { base, member }) => {
            let base_addr = lower_addr(ctx, *base);
            let offset = member_offset(ctx, *base, member);
            offset_addr(ctx, base_addr, offset)
        }
        NodeKind::Expr(ExprKind::DereferenceMember { base, member }) => {
            let base_ty = ctx.ast.ty(*base).cloned().unwrap_or(CType::int());
            let record_ty = base_ty.pointee().cloned().unwrap_or(CType::int());
            let base_v = lower_rvalue(ctx, *base);
            let offset = record_member_offset(ctx, &record_ty, member);
            offset_addr(ctx, base_v, offset)
        }
        NodeKind::Expr(ExprKind::StringLiteral { .. }) | NodeKind::Expr(ExprKind::CompoundLiteral { .. }) | NodeKind::Expr(ExprKind::InitializerList { .. }) => {
            lower_compound_literal_addr(ctx, node)
        }
        _ => lower_rvalue(ctx, node),
    }
}

fn offset_addr(ctx: &mut BuilderCtx, base: VReg, offset: u64) -> VReg {
    if offset == 0 {
        return base;
    }
    let r = ctx.routine.fresh_vreg();
    ctx.routine.push(Opcode::Add, CType::int(), vec![Operand::VReg(r), Operand::VReg(base), Operand::IntConst(offset as i64)]);
    r
}

fn member_offset(ctx: &mut BuilderCtx, base: NodeId, member: &str) -> u64 {
    let base_ty = ctx.ast.ty(base).cloned().unwrap_or(CType::int());
    record_member_offset(ctx, &base_ty, member)
}

fn record_member_offset(ctx: &mut BuilderCtx, record_ty: &CType, member: &str) -> u64 {
    let Some(record) = record_ty.as_record() else { return 0 };
    let Some((index, _)) = record.member(member) else { return 0 };
    ctx.solver.member_offset(record, index)
}

/// A compound literal (or a bare brace initializer list reached in value
/// position) lowers to a synthetic symbol the way a declared object with
/// the same initializer would (spec.md §4.5).
fn lower_compound_literal_addr(ctx: &mut BuilderCtx, node: NodeId) -> VReg {
    let ty = ctx.ast.ty(node).cloned().unwrap_or(CType::int());
    let init_list = match &ctx.ast.node(node).kind {
        NodeKind::Expr(ExprKind::CompoundLiteral { initializer_list, .. }) => *initializer_list,
        _ => node,
    };
    let size = ctx.solver.layout_of(&ty).size as usize;
    let sym = ctx.intern_static(ty, vec![0u8; size], false);
    lower_auto_initializer(ctx, sym, init_list);
    let r = ctx.routine.fresh_vreg();
    ctx.routine.push(Opcode::LoadAddr, CType::pointer_to(ctx.ast.ty(node).cloned().unwrap_or(CType::int())), vec![Operand::VReg(r), Operand::Symbol(sym)]);
    r
}

/// Assignment lowers right-to-left: rhs, then the lhs address, then a
/// typed cast if needed, then `store-address` (spec.md §4.5). A compound
/// assignment (`+=` etc.) additionally loads the current lhs value first.
fn lower_assignment(ctx: &mut BuilderCtx, target: NodeId, value: NodeId, compound_op: Option<BinOp>) -> VReg {
    let lhs_ty = ctx.ast.ty(target).cloned().unwrap_or(CType::int());
    let rhs_v = lower_rvalue(ctx, value);
    let target_addr = lower_addr(ctx, target);
    let stored = match compound_op {
        None => {
            let rhs_ty = ctx.ast.ty(value).cloned().unwrap_or(lhs_ty.clone());
            convert_value(ctx, rhs_v, &rhs_ty, &lhs_ty)
        }
        Some(op) => {
            let current = ctx.routine.fresh_vreg();
            ctx.routine.push(Opcode::Load, lhs_ty.clone(), vec![Operand::VReg(current), Operand::Indirect { base: target_addr, offset: 0, index: None }]);
            let result = ctx.routine.fresh_vreg();
            ctx.routine.push(binop_opcode(op), lhs_ty.clone(), vec![Operand::VReg(result), Operand::VReg(current), Operand::VReg(rhs_v)]);
            result
        }
    };
    ctx.routine.push(Opcode::StoreAddr, lhs_ty, vec![Operand::Indirect { base: target_addr, offset: 0, index: None }, Operand::VReg(stored)]);
    stored
}

fn binop_opcode(op: BinOp) -> Opcode {
    match op {
        BinOp::Add => Opcode::Add,
        BinOp::Subtract => Opcode::Sub,
        BinOp::Multiply => Opcode::Mul,
        BinOp::Divide => Opcode::Div,
        BinOp::Modulo => Opcode::Mod,
        BinOp::BitwiseAnd => Opcode::BitAnd,
        BinOp::BitwiseOr => Opcode::BitOr,
        BinOp::BitwiseXor => Opcode::BitXor,
        BinOp::ShiftLeft => Opcode::Shl,
        BinOp::ShiftRight => Opcode::Shr,
        BinOp::Equal => Opcode::CmpEq,
        BinOp::NotEqual => Opcode::CmpNe,
        BinOp::Less => Opcode::CmpLt,
        BinOp::Greater => Opcode::CmpGt,
        BinOp::LessEqual => Opcode::CmpLe,
        BinOp::GreaterEqual => Opcode::CmpGe,
        BinOp::LogicalAnd | BinOp::LogicalOr => unreachable!("handled by lower_binary's short-circuit path"),
    }
}

/// Binary operators lower to the matching AIR opcode; equality/relational
/// opcodes are typed by their *operand* type, not their result (spec.md
/// §4.5). `&&`/`||` short-circuit via branches instead of a direct
/// opcode, since C mandates the second operand not be evaluated once the
/// result is determined.
fn lower_binary(ctx: &mut BuilderCtx, op: BinOp, lhs: NodeId, rhs: NodeId, result_ty: CType) -> VReg {
    if op.is_logical() {
        return lower_short_circuit(ctx, op, lhs, rhs, result_ty);
    }
    let operand_ty = if op.is_relational_or_equality() {
        ctx.ast.ty(lhs).cloned().unwrap_or(result_ty.clone())
    } else {
        result_ty.clone()
    };
    let lhs_v = lower_rvalue(ctx, lhs);
    let rhs_v = lower_rvalue(ctx, rhs);
    let r = ctx.routine.fresh_vreg();
    let ty = if op.is_relational_or_equality() { operand_ty } else { result_ty };
    ctx.routine.push(binop_opcode(op), ty, vec![Operand::VReg(r), Operand::VReg(lhs_v), Operand::VReg(rhs_v)]);
    r
}

fn lower_short_circuit(ctx: &mut BuilderCtx, op: BinOp, lhs: NodeId, rhs: NodeId, result_ty: CType) -> VReg {
    let result = ctx.routine.fresh_vreg();
    let lhs_v = lower_rvalue(ctx, lhs);
    let short_circuit_label = ctx.routine.fresh_label();
    let branch = if op == BinOp::LogicalAnd { Opcode::Jz } else { Opcode::Jnz };
    ctx.routine.push(Opcode::Assign, result_ty.clone(), vec![Operand::VReg(result), Operand::VReg(lhs_v)]);
    ctx.routine.push(branch, CType::void(), vec![Operand::VReg(lhs_v), Operand::Label(short_circuit_label)]);
    let rhs_v = lower_rvalue(ctx, rhs);
    let zero = ctx.routine.fresh_vreg();
    ctx.routine.push(Opcode::CmpNe, result_ty.clone(), vec![Operand::VReg(zero), Operand::VReg(rhs_v), Operand::IntConst(0)]);
    ctx.routine.push(Opcode::Assign, result_ty, vec![Operand::VReg(result), Operand::VReg(zero)]);
    ctx.routine.push(Opcode::Label, CType::void(), vec![Operand::Label(short_circuit_label)]);
    result
}

fn lower_conditional(ctx: &mut BuilderCtx, cond: NodeId, then_expr: NodeId, else_expr: NodeId, result_ty: CType) -> VReg {
    let result = ctx.routine.fresh_vreg();
    let cond_v = lower_rvalue(ctx, cond);
    let else_label = ctx.routine.fresh_label();
    let end_label = ctx.routine.fresh_label();
    ctx.routine.push(Opcode::Jz, CType::void(), vec![Operand::VReg(cond_v), Operand::Label(else_label)]);
    let then_v = lower_rvalue(ctx, then_expr);
    ctx.routine.push(Opcode::Assign, result_ty.clone(), vec![Operand::VReg(result), Operand::VReg(then_v)]);
    ctx.routine.push(Opcode::Jmp, CType::void(), vec![Operand::Label(end_label)]);
    ctx.routine.push(Opcode::Label, CType::void(), vec![Operand::Label(else_label)]);
    let else_v = lower_rvalue(ctx, else_expr);
    ctx.routine.push(Opcode::Assign, result_ty, vec![Operand::VReg(result), Operand::VReg(else_v)]);
    ctx.routine.push(Opcode::Label, CType::void(), vec![Operand::Label(end_label)]);
    result
}

fn lower_inc_dec(ctx: &mut BuilderCtx, op: IncDecOp, operand: NodeId, is_prefix: bool) -> VReg {
    let ty = ctx.ast.ty(operand).cloned().unwrap_or(CType::int());
    let addr = lower_addr(ctx, operand);
    let current = ctx.routine.fresh_vreg();
    ctx.routine.push(Opcode::Load, ty.clone(), vec![Operand::VReg(current), Operand::Indirect { base: addr, offset: 0, index: None }]);
    let step = if ty.is_pointer() { ctx.solver.layout_of(ty.pointee().expect("pointer")).size as i64 } else { 1 };
    let updated = ctx.routine.fresh_vreg();
    let opcode = if op == IncDecOp::Increment { Opcode::Add } else { Opcode::Sub };
    ctx.routine.push(opcode, ty.clone(), vec![Operand::VReg(updated), Operand::VReg(current), Operand::IntConst(step)]);
    ctx.routine.push(Opcode::StoreAddr, ty, vec![Operand::Indirect { base: addr, offset: 0, index: None }, Operand::VReg(updated)]);
    if is_prefix {
        updated
    } else {
        current
    }
}

fn lower_unary(ctx: &mut BuilderCtx, op: UnaryOp, operand: NodeId, result_ty: CType) -> VReg {
    match op {
        UnaryOp::AddressOf => lower_addr(ctx, operand),
        UnaryOp::Dereference => {
            let addr = lower_rvalue(ctx, operand);
            let r = ctx.routine.fresh_vreg();
            ctx.routine.push(Opcode::Load, result_ty, vec![Operand::VReg(r), Operand::Indirect { base: addr, offset: 0, index: None }]);
            r
        }
        UnaryOp::Posate => lower_rvalue(ctx, operand),
        UnaryOp::Negate => {
            let v = lower_rvalue(ctx, operand);
            let zero = ctx.routine.fresh_vreg();
            ctx.routine.push(Opcode::Assign, result_ty.clone(), vec![Operand::VReg(zero), Operand::IntConst(0)]);
            let r = ctx.routine.fresh_vreg();
            ctx.routine.push(Opcode::Sub, result_ty, vec![Operand::VReg(r), Operand::VReg(zero), Operand::VReg(v)]);
            r
        }
        UnaryOp::Complement => {
            let v = lower_rvalue(ctx, operand);
            let all_ones = ctx.routine.fresh_vreg();
            ctx.routine.push(Opcode::Assign, result_ty.clone(), vec![Operand::VReg(all_ones), Operand::IntConst(-1)]);
            let r = ctx.routine.fresh_vreg();
            ctx.routine.push(Opcode::BitXor, result_ty, vec![Operand::VReg(r), Operand::VReg(v), Operand::VReg(all_ones)]);
            r
        }
        UnaryOp::Not => {
            let v = lower_rvalue(ctx, operand);
            let r = ctx.routine.fresh_vreg();
            ctx.routine.push(Opcode::CmpEq, result_ty, vec![Operand::VReg(r), Operand::VReg(v), Operand::IntConst(0)]);
            r
        }
    }
}

/// Function calls lower their arguments in reverse order, then the
/// callee, then a `func-call` whose operand 0 is the result register,
/// operand 1 the callee, operands 2..n the argument registers (spec.md
/// §4.5). Prototype coercion/default-argument promotion is applied per
/// argument before the call is emitted.
fn lower_call(ctx: &mut BuilderCtx, callee: NodeId, arguments: &[NodeId], result_ty: CType) -> VReg {
    let callee_ty = ctx.ast.ty(callee).cloned().unwrap_or(CType::int());
    let prototype = callee_ty.pointee().or(Some(&callee_ty)).and_then(|t| t.as_function()).cloned();

    let mut arg_vregs = vec![VReg(0); arguments.len()];
    for i in (0..arguments.len()).rev() {
        let arg = arguments[i];
        let arg_ty = ctx.ast.ty(arg).cloned().unwrap_or(CType::int());
        let v = lower_rvalue(ctx, arg);
        arg_vregs[i] = match &prototype {
            Some(proto) if i < proto.parameters.len() => convert_value(ctx, v, &arg_ty, &proto.parameters[i]),
            _ => default_argument_promote(ctx, v, &arg_ty),
        };
    }
    let callee_v = lower_rvalue(ctx, callee);

    let r = ctx.routine.fresh_vreg();
    let mut operands = vec![Operand::VReg(r), Operand::VReg(callee_v)];
    operands.extend(arg_vregs.into_iter().map(Operand::VReg));
    ctx.routine.push(Opcode::FuncCall, result_ty, operands);
    r
}

/// Default argument promotions for a variadic position / unprototyped
/// call: integer types narrower than `int` promote to `int`; `float`
/// promotes to `double` (C99 6.5.2.2p6-7).
fn default_argument_promote(ctx: &mut BuilderCtx, v: VReg, ty: &CType) -> VReg {
    if ty.is_integer() && ty.integer_rank() < CType::int().integer_rank() {
        return convert_value(ctx, v, ty, &CType::int());
    }
    if ty.class == TypeClass::Float {
        return convert_value(ctx, v, ty, &CType::basic(TypeClass::Double));
    }
    v
}

/// Inserts the AIR conversion opcode matching a class change between
/// `from` and `to`, or returns `v` unchanged when no conversion is
/// needed.
fn convert_value(ctx: &mut BuilderCtx, v: VReg, from: &CType, to: &CType) -> VReg {
    if from.class == to.class {
        return v;
    }
    let opcode = if from.is_integer() && to.is_integer() {
        if to.integer_rank() > from.integer_rank() {
            if from.is_unsigned() { Opcode::Zext } else { Opcode::Sext }
        } else {
            Opcode::Assign
        }
    } else if from.is_real_floating() && to.is_real_floating() {
        if matches!(to.class, TypeClass::Double | TypeClass::LongDouble) { Opcode::S2D } else { Opcode::D2S }
    } else if from.is_integer() && to.is_real_floating() {
        if from.is_unsigned() { Opcode::Ui2S } else { Opcode::Si2S }
    } else if from.is_real_floating() && to.is_integer() {
        if to.is_unsigned() { Opcode::S2Ui } else { Opcode::S2Si }
    } else {
        Opcode::Assign
    };
    let r = ctx.routine.fresh_vreg();
    ctx.routine.push(opcode, to.clone(), vec![Operand::VReg(r), Operand::VReg(v)]);
    r
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::NodeKind;
    use crate::symbol::{Linkage, StorageDuration};

    fn make_return_zero() -> (Ast, SymbolTable, NodeId) {
        let mut ast = Ast::new();
        let mut symtab = SymbolTable::new();
        let zero = ast.alloc(NodeKind::Expr(ExprKind::IntegerConstant(crate::token::IntegerConstant {
            value: 0,
            suffix_type: None,
            is_unsigned_suffix: false,
        })), 1, 1);
        ast.set_ty(zero, CType::int());
        let ret = ast.alloc(NodeKind::Stmt(StmtKind::Return { expr: Some(zero) }), 1, 1);
        let body = ast.alloc(NodeKind::Stmt(StmtKind::Compound { block_items: vec![ret] }), 1, 1);
        let declarator = ast.alloc(
            NodeKind::Decl(DeclKind::Declarator(DeclaratorKind::Function {
                inner: ast.alloc(NodeKind::Decl(DeclKind::Declarator(DeclaratorKind::Identifier("main".into()))), 1, 1),
                parameters: vec![],
                is_variadic: false,
                is_prototyped: true,
            })),
            1,
            1,
        );
        let fn_node = ast.alloc(
            NodeKind::Decl(DeclKind::FunctionDefinition {
                specifiers: crate::ast::DeclarationSpecifiers::default(),
                declarator,
                body,
            }),
            1,
            1,
        );
        let scope = symtab.file_scope();
        let sym = symtab.declare(scope, "main", Namespace::Ordinary, CType::int(), Some(declarator), Linkage::External, StorageDuration::Static, false);
        let _ = sym;
        let root = ast.alloc(NodeKind::TranslationUnit { external_declarations: vec![fn_node] }, 1, 1);
        (ast, symtab, root)
    }

    #[test]
    fn lowers_int_main_return_zero_to_one_routine() {
        let (ast, mut symtab, root) = make_return_zero();
        let mut diags = DiagnosticBag::new();
        let module = build(&ast, &mut symtab, &mut diags, root);
        assert_eq!(module.routines.len(), 1);
        let routine = &module.routines[0];
        assert_eq!(routine.name, "main");
        assert!(routine.instrs.iter().any(|i| i.opcode == Opcode::Return));
    }

    #[test]
    fn for_loop_emits_two_labels_and_one_jnz() {
        let mut ast = Ast::new();
        let mut symtab = SymbolTable::new();
        let empty_body = ast.alloc(NodeKind::Stmt(StmtKind::Compound { block_items: vec![] }), 1, 1);
        let cond = ast.alloc(NodeKind::Expr(ExprKind::IntegerConstant(crate::token::IntegerConstant {
            value: 1,
            suffix_type: None,
            is_unsigned_suffix: false,
        })), 1, 1);
        ast.set_ty(cond, CType::int());
        let for_stmt = ast.alloc(NodeKind::Stmt(StmtKind::For { init: None, cond: Some(cond), post: None, body: empty_body }), 1, 1);
        let mut diags = DiagnosticBag::new();
        let mut ctx = BuilderCtx {
            ast: &ast,
            symtab: &mut symtab,
            diags: &mut diags,
            routine: Routine::new("f".into(), SymbolId(0)),
            rodata: Vec::new(),
            frames: Vec::new(),
            labels: HashMap::new(),
            case_labels: HashMap::new(),
            solver: TypeSizeSolver::new(),
            interned: 0,
        };
        lower_statement(&mut ctx, for_stmt);
        let label_count = ctx.routine.instrs.iter().filter(|i| i.opcode == Opcode::Label).count();
        let jnz_count = ctx.routine.instrs.iter().filter(|i| i.opcode == Opcode::Jnz).count();
        assert_eq!(label_count, 3); // body, cond, end
        assert_eq!(jnz_count, 1);
    }

    #[test]
    fn over_provisioned_static_initializer_is_diagnosed_not_a_panic() {
        let mut ast = Ast::new();
        let mut symtab = SymbolTable::new();
        let mut lit = |v: u64| {
            let n = ast.alloc(
                NodeKind::Expr(ExprKind::IntegerConstant(crate::token::IntegerConstant { value: v, suffix_type: None, is_unsigned_suffix: false })),
                1,
                1,
            );
            ast.set_ty(n, CType::int());
            (Vec::new(), n)
        };
        let items = vec![lit(1), lit(2), lit(3)];
        let init_list = ast.alloc(NodeKind::Decl(DeclKind::InitializerList { items }), 1, 1);

        let mut diags = DiagnosticBag::new();
        let mut ctx = BuilderCtx {
            ast: &ast,
            symtab: &mut symtab,
            diags: &mut diags,
            routine: Routine::new("f".into(), SymbolId(0)),
            rodata: Vec::new(),
            frames: Vec::new(),
            labels: HashMap::new(),
            case_labels: HashMap::new(),
            solver: TypeSizeSolver::new(),
            interned: 0,
        };
        // a 1-element array of `int` (4 bytes) initialized with 3 elements.
        let array_ty = CType::array_of(CType::int(), Some(1));
        let mut image = InitializerImage { bytes: vec![0u8; 4], relocations: Vec::new() };
        fill_static_image(&mut ctx, &mut image, 0, &array_ty, init_list);

        assert!(diags.has_errors(), "an over-provisioned initializer should have been diagnosed");
    }
}
