//! Constant-expression evaluator (spec.md §4.4): three dialects — integer,
//! arithmetic, address — sharing one recursive walk over typed AST nodes.
//!
//! Grounded on the reference's `const.c`: a pure function from an AST node
//! to a tagged result, never mutating the tree (spec.md Design Notes:
//! "implement as a pure function over AST handles returning a result sum
//! type").

use crate::ast::{Ast, BinOp, ExprKind, NodeId, NodeKind, UnaryOp};
use crate::diag::Diagnostic;
use crate::symbol::SymbolId;
use crate::types::{convert, CType, TypeClass};

#[derive(Clone, Debug, PartialEq)]
pub struct AddressValue {
    /// `None` denotes the null pointer constant.
    pub symbol: Option<SymbolId>,
    pub offset: i64,
}

#[derive(Clone, Debug)]
pub enum ConstValue {
    Integer { value: i64, ty: CType },
    Floating { value: f64, ty: CType },
    Address { value: AddressValue, ty: CType },
}

impl ConstValue {
    pub fn ty(&self) -> &CType {
        match self {
            ConstValue::Integer { ty, .. } => ty,
            ConstValue::Floating { ty, .. } => ty,
            ConstValue::Address { ty, .. } => ty,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ConstValue::Integer { value, .. } => Some(*value),
            ConstValue::Floating { value, .. } => Some(*value as i64),
            _ => None,
        }
    }
}

#[derive(Clone, Debug)]
pub enum ConstEval {
    Value(ConstValue),
    Error(Diagnostic),
}

impl ConstEval {
    pub fn evaluation_succeeded(&self) -> bool {
        matches!(self, ConstEval::Value(_))
    }

    fn err(row: u32, col: u32, message: impl Into<String>) -> Self {
        ConstEval::Error(Diagnostic::error(row, col, message))
    }

    pub fn into_value(self) -> Option<ConstValue> {
        match self {
            ConstEval::Value(v) => Some(v),
            ConstEval::Error(_) => None,
        }
    }
}

/// Which sub-dialect governs an evaluation (spec.md §4.4): `Integer` is the
/// narrowest, `Arithmetic` extends it with floating operands/casts,
/// `Address` additionally permits the address-of-static-lvalue forms.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Dialect {
    Integer,
    Arithmetic,
    Address,
}

pub fn evaluate_integer(ast: &Ast, node: NodeId) -> ConstEval {
    evaluate(ast, node, Dialect::Integer)
}

pub fn evaluate_arithmetic(ast: &Ast, node: NodeId) -> ConstEval {
    evaluate(ast, node, Dialect::Arithmetic)
}

pub fn evaluate_address(ast: &Ast, node: NodeId) -> ConstEval {
    evaluate(ast, node, Dialect::Address)
}

/// Convenience for callers (array lengths, bit-field widths) that just want
/// the folded integer value and don't care about the diagnostic.
pub fn fold_to_i64(ast: &Ast, node: NodeId) -> Option<i64> {
    evaluate_integer(ast, node).into_value().and_then(|v| v.as_i64())
}

fn evaluate(ast: &Ast, node: NodeId, dialect: Dialect) -> ConstEval {
    let n = ast.node(node);
    let (row, col) = (n.row, n.col);
    let expr = match &n.kind {
        NodeKind::Expr(e) => e,
        _ => return ConstEval::err(row, col, "not a constant expression"),
    };
    match expr {
        ExprKind::IntegerConstant(i) => {
            let ty = i.suffix_type.clone().unwrap_or_else(CType::int);
            ConstEval::Value(ConstValue::Integer { value: i.value as i64, ty })
        }
        ExprKind::CharacterConstant(c) => {
            ConstEval::Value(ConstValue::Integer { value: c.value, ty: CType::basic(TypeClass::Int) })
        }
        ExprKind::EnumerationConstant { value, .. } => {
            ConstEval::Value(ConstValue::Integer { value: *value, ty: CType::basic(TypeClass::Enumerated) })
        }
        ExprKind::FloatingConstant(f) => {
            if dialect == Dialect::Integer {
                return ConstEval::err(row, col, "floating constant not valid in an integer constant expression");
            }
            ConstEval::Value(ConstValue::Floating { value: f.value, ty: f.ty.clone() })
        }
        ExprKind::Unary { op, operand } => evaluate_unary(ast, *op, *operand, dialect, row, col),
        ExprKind::Binary { op, lhs, rhs } if op.is_logical() => {
            evaluate_short_circuit_logical(ast, *op, *lhs, *rhs, dialect, row, col)
        }
        ExprKind::Binary { op, lhs, rhs } => evaluate_binary(ast, *op, *lhs, *rhs, dialect, row, col),
        ExprKind::Conditional { cond, then_expr, else_expr } => {
            let c = evaluate(ast, *cond, dialect);
            let ConstEval::Value(cv) = c else { return c };
            let taken = match cv.as_i64() {
                Some(v) => v != 0,
                None => return ConstEval::err(row, col, "non-scalar controlling expression"),
            };
            if taken { evaluate(ast, *then_expr, dialect) } else { evaluate(ast, *else_expr, dialect) }
        }
        ExprKind::Cast { type_name, operand } => evaluate_cast(ast, *type_name, *operand, dialect, row, col),
        ExprKind::Sizeof { .. } | ExprKind::SizeofType { .. } => {
            // sizeof constant-folding depends on the target-specific
            // TypeSizeSolver, resolved earlier by the typing pass and
            // cached as this node's attached type; by the time the
            // constant evaluator runs, `ast.ty(node)` already carries the
            // folded `size_t` value is not representable here without the
            // solver, so sizeof results are folded eagerly during typing
            // instead of being re-derived in this evaluator.
            ConstEval::err(row, col, "sizeof must be folded by the typing pass before constant evaluation")
        }
        _ if dialect == Dialect::Address => evaluate_address_expr(ast, node, row, col),
        _ => ConstEval::err(row, col, "expression is not a compile-time constant"),
    }
}

fn evaluate_unary(ast: &Ast, op: UnaryOp, operand: NodeId, dialect: Dialect, row: u32, col: u32) -> ConstEval {
    if dialect == Dialect::Address {
        if op == UnaryOp::AddressOf {
            return evaluate_address_expr(ast, operand, row, col);
        }
        if op == UnaryOp::Dereference {
            // `*&x`-shaped reductions: evaluate the operand as an address
            // and strip one level if it was produced by `&`.
            return evaluate(ast, operand, Dialect::Address);
        }
    }
    let v = evaluate(ast, operand, dialect);
    let ConstEval::Value(v) = v else { return v };
    match (op, &v) {
        (UnaryOp::Posate, ConstValue::Integer { .. } | ConstValue::Floating { .. }) => ConstEval::Value(v),
        (UnaryOp::Negate, ConstValue::Integer { value, ty }) => {
            ConstEval::Value(ConstValue::Integer { value: value.wrapping_neg(), ty: ty.clone() })
        }
        (UnaryOp::Negate, ConstValue::Floating { value, ty }) => {
            ConstEval::Value(ConstValue::Floating { value: -value, ty: ty.clone() })
        }
        (UnaryOp::Complement, ConstValue::Integer { value, ty }) => {
            ConstEval::Value(ConstValue::Integer { value: !value, ty: ty.clone() })
        }
        (UnaryOp::Not, ConstValue::Integer { value, .. }) => {
            ConstEval::Value(ConstValue::Integer { value: (*value == 0) as i64, ty: CType::int() })
        }
        (UnaryOp::Not, ConstValue::Floating { value, .. }) => {
            ConstEval::Value(ConstValue::Integer { value: (*value == 0.0) as i64, ty: CType::int() })
        }
        _ => ConstEval::err(row, col, "operand is not arithmetic"),
    }
}

/// `&&`/`||` short-circuit before checking the unreachable operand's
/// constraint types (spec.md §9 Open Questions: "preserve this behavior —
/// it is observable for programs whose unreachable operand would otherwise
/// be rejected").
fn evaluate_short_circuit_logical(
    ast: &Ast,
    op: BinOp,
    lhs: NodeId,
    rhs: NodeId,
    dialect: Dialect,
    row: u32,
    col: u32,
) -> ConstEval {
    let l = evaluate(ast, lhs, dialect);
    let ConstEval::Value(lv) = l else { return l };
    let Some(lbool) = lv.as_i64().map(|v| v != 0) else {
        return ConstEval::err(row, col, "operand is not scalar");
    };
    match op {
        BinOp::LogicalOr if lbool => ConstEval::Value(ConstValue::Integer { value: 1, ty: CType::int() }),
        BinOp::LogicalAnd if !lbool => ConstEval::Value(ConstValue::Integer { value: 0, ty: CType::int() }),
        _ => {
            let r = evaluate(ast, rhs, dialect);
            let ConstEval::Value(rv) = r else { return r };
            let Some(rbool) = rv.as_i64().map(|v| v != 0) else {
                return ConstEval::err(row, col, "operand is not scalar");
            };
            let value = if op == BinOp::LogicalOr { (lbool || rbool) as i64 } else { (lbool && rbool) as i64 };
            ConstEval::Value(ConstValue::Integer { value, ty: CType::int() })
        }
    }
}

fn evaluate_binary(ast: &Ast, op: BinOp, lhs: NodeId, rhs: NodeId, dialect: Dialect, row: u32, col: u32) -> ConstEval {
    if dialect == Dialect::Address && matches!(op, BinOp::Add | BinOp::Subtract) {
        if let ConstEval::Value(ConstValue::Address { value, ty }) = evaluate(ast, lhs, dialect) {
            if let ConstEval::Value(rv) = evaluate(ast, rhs, Dialect::Integer) {
                if let Some(off) = rv.as_i64() {
                    let offset = if op == BinOp::Add { value.offset + off } else { value.offset - off };
                    return ConstEval::Value(ConstValue::Address { value: AddressValue { offset, ..value }, ty });
                }
            }
        }
    }
    let l = evaluate(ast, lhs, dialect);
    let ConstEval::Value(lv) = l else { return l };
    let r = evaluate(ast, rhs, dialect);
    let ConstEval::Value(rv) = r else { return r };

    let has_floating = matches!(lv, ConstValue::Floating { .. }) || matches!(rv, ConstValue::Floating { .. });
    if has_floating {
        if dialect == Dialect::Integer {
            return ConstEval::err(row, col, "floating operand in an integer constant expression");
        }
        return evaluate_floating_binary(op, &lv, &rv, row, col);
    }

    let (Some(a), Some(b)) = (lv.as_i64(), rv.as_i64()) else {
        return ConstEval::err(row, col, "operand is not arithmetic");
    };
    let ty = convert::usual_arithmetic_conversions(lv.ty(), rv.ty());
    let unsigned = ty.is_unsigned();
    let value = match op {
        BinOp::Add => a.wrapping_add(b),
        BinOp::Subtract => a.wrapping_sub(b),
        BinOp::Multiply => a.wrapping_mul(b),
        BinOp::Divide => {
            if b == 0 {
                return ConstEval::err(row, col, "division by zero in a constant expression");
            }
            if unsigned { ((a as u64) / (b as u64)) as i64 } else { a.wrapping_div(b) }
        }
        BinOp::Modulo => {
            if b == 0 {
                return ConstEval::err(row, col, "division by zero in a constant expression");
            }
            if unsigned { ((a as u64) % (b as u64)) as i64 } else { a.wrapping_rem(b) }
        }
        BinOp::ShiftLeft => a.wrapping_shl(b as u32),
        BinOp::ShiftRight => {
            if unsigned { ((a as u64) >> (b as u32)) as i64 } else { a.wrapping_shr(b as u32) }
        }
        BinOp::BitwiseAnd => a & b,
        BinOp::BitwiseOr => a | b,
        BinOp::BitwiseXor => a ^ b,
        BinOp::Equal => (a == b) as i64,
        BinOp::NotEqual => (a != b) as i64,
        BinOp::Less => if unsigned { (a as u64) < (b as u64) } else { a < b } as i64,
        BinOp::Greater => if unsigned { (a as u64) > (b as u64) } else { a > b } as i64,
        BinOp::LessEqual => if unsigned { (a as u64) <= (b as u64) } else { a <= b } as i64,
        BinOp::GreaterEqual => if unsigned { (a as u64) >= (b as u64) } else { a >= b } as i64,
        BinOp::LogicalOr | BinOp::LogicalAnd => unreachable!("handled by evaluate_short_circuit_logical"),
    };
    let result_ty = if op.is_relational_or_equality() { CType::int() } else { ty };
    ConstEval::Value(ConstValue::Integer { value, ty: result_ty })
}

fn evaluate_floating_binary(op: BinOp, lv: &ConstValue, rv: &ConstValue, row: u32, col: u32) -> ConstEval {
    let a = match lv {
        ConstValue::Floating { value, .. } => *value,
        ConstValue::Integer { value, .. } => *value as f64,
        _ => return ConstEval::err(row, col, "operand is not arithmetic"),
    };
    let b = match rv {
        ConstValue::Floating { value, .. } => *value,
        ConstValue::Integer { value, .. } => *value as f64,
        _ => return ConstEval::err(row, col, "operand is not arithmetic"),
    };
    let ty = convert::usual_arithmetic_conversions(lv.ty(), rv.ty());
    if op.is_relational_or_equality() {
        let value = match op {
            BinOp::Equal => a == b,
            BinOp::NotEqual => a != b,
            BinOp::Less => a < b,
            BinOp::Greater => a > b,
            BinOp::LessEqual => a <= b,
            BinOp::GreaterEqual => a >= b,
            _ => unreachable!(),
        };
        return ConstEval::Value(ConstValue::Integer { value: value as i64, ty: CType::int() });
    }
    let value = match op {
        BinOp::Add => a + b,
        BinOp::Subtract => a - b,
        BinOp::Multiply => a * b,
        BinOp::Divide => a / b,
        _ => return ConstEval::err(row, col, "operator not valid on floating operands"),
    };
    ConstEval::Value(ConstValue::Floating { value, ty })
}

fn evaluate_cast(ast: &Ast, type_name: NodeId, operand: NodeId, dialect: Dialect, row: u32, col: u32) -> ConstEval {
    let Some(target) = ast.ty(type_name) else {
        return ConstEval::err(row, col, "cast target type was not resolved by the typing pass");
    };
    let target = target.clone();
    if target.is_pointer() {
        let v = evaluate(ast, operand, Dialect::Address.max(dialect));
        return match v {
            ConstEval::Value(ConstValue::Address { value, .. }) => {
                ConstEval::Value(ConstValue::Address { value, ty: target })
            }
            ConstEval::Value(ConstValue::Integer { value, .. }) if value == 0 => {
                ConstEval::Value(ConstValue::Address { value: AddressValue { symbol: None, offset: 0 }, ty: target })
            }
            ConstEval::Value(_) => ConstEval::err(row, col, "invalid constant cast to pointer type"),
            e => e,
        };
    }
    let v = evaluate(ast, operand, dialect);
    let ConstEval::Value(v) = v else { return v };
    if target.is_real_floating() {
        let value = match &v {
            ConstValue::Integer { value, .. } => *value as f64,
            ConstValue::Floating { value, .. } => *value,
            ConstValue::Address { .. } => return ConstEval::err(row, col, "invalid constant cast to floating type"),
        };
        return ConstEval::Value(ConstValue::Floating { value, ty: target });
    }
    let Some(value) = v.as_i64() else { return ConstEval::err(row, col, "invalid constant cast to integer type") };
    ConstEval::Value(ConstValue::Integer { value: truncate_to_class(value, &target), ty: target })
}

/// Reinterprets `value`'s low bits under `ty`'s width/signedness, the same
/// truncation the target CPU performs at run time (spec.md §4.4: "reinterpret
/// the stored bits under the destination class ... exactly as the target
/// CPU would at run time").
fn truncate_to_class(value: i64, ty: &CType) -> i64 {
    use TypeClass::*;
    match ty.class {
        Bool => (value != 0) as i64,
        Char | SignedChar => value as i8 as i64,
        UnsignedChar => value as u8 as i64,
        ShortInt => value as i16 as i64,
        UnsignedShortInt => value as u16 as i64,
        Int | Enumerated => value as i32 as i64,
        UnsignedInt => value as u32 as i64,
        _ => value,
    }
}

impl Dialect {
    fn max(self, other: Dialect) -> Dialect {
        if self == Dialect::Address || other == Dialect::Address { Dialect::Address } else { other }
    }
}

fn evaluate_address_expr(ast: &Ast, node: NodeId, row: u32, col: u32) -> ConstEval {
    let n = ast.node(node);
    match &n.kind {
        NodeKind::Expr(ExprKind::Identifier { resolved: Some(sym), .. }) => ConstEval::Value(ConstValue::Address {
            value: AddressValue { symbol: Some(*sym), offset: 0 },
            ty: n.ty.clone().unwrap_or_else(CType::error),
        }),
        NodeKind::Expr(ExprKind::Unary { op: UnaryOp::Dereference, operand }) => evaluate_address_expr(ast, *operand, row, col),
        NodeKind::Expr(ExprKind::Subscript { base, index }) => {
            let base_addr = evaluate_address_expr(ast, *base, row, col);
            let ConstEval::Value(ConstValue::Address { value, ty }) = base_addr else { return base_addr };
            let Some(idx) = fold_to_i64(ast, *index) else {
                return ConstEval::err(row, col, "subscript is not a constant expression");
            };
            let elem_size = ty.array_element().map(|_| 1).unwrap_or(1);
            let offset = value.offset + idx * elem_size as i64;
            ConstEval::Value(ConstValue::Address { value: AddressValue { offset, ..value }, ty })
        }
        NodeKind::Expr(ExprKind::Member { base, .. }) => evaluate_address_expr(ast, *base, row, col),
        _ => ConstEval::err(row, col, "not an address constant"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::NodeKind;
    use crate::token::IntegerConstant;

    fn int_node(ast: &mut Ast, value: u64) -> NodeId {
        ast.alloc(
            NodeKind::Expr(ExprKind::IntegerConstant(IntegerConstant { value, suffix_type: None, is_unsigned_suffix: false })),
            1,
            1,
        )
    }

    #[test]
    fn folds_simple_arithmetic() {
        let mut ast = Ast::new();
        let a = int_node(&mut ast, 2);
        let b = int_node(&mut ast, 3);
        let add = ast.alloc(NodeKind::Expr(ExprKind::Binary { op: BinOp::Add, lhs: a, rhs: b }), 1, 1);
        assert_eq!(fold_to_i64(&ast, add), Some(5));
    }

    #[test]
    fn division_by_zero_is_an_error() {
        let mut ast = Ast::new();
        let a = int_node(&mut ast, 1);
        let z = int_node(&mut ast, 0);
        let div = ast.alloc(NodeKind::Expr(ExprKind::Binary { op: BinOp::Divide, lhs: a, rhs: z }), 1, 1);
        assert!(!evaluate_integer(&ast, div).evaluation_succeeded());
    }

    #[test]
    fn logical_or_short_circuits_past_division_by_zero() {
        let mut ast = Ast::new();
        let one = int_node(&mut ast, 1);
        let a = int_node(&mut ast, 1);
        let z = int_node(&mut ast, 0);
        let div = ast.alloc(NodeKind::Expr(ExprKind::Binary { op: BinOp::Divide, lhs: a, rhs: z }), 1, 1);
        let or_expr = ast.alloc(NodeKind::Expr(ExprKind::Binary { op: BinOp::LogicalOr, lhs: one, rhs: div }), 1, 1);
        let result = evaluate_integer(&ast, or_expr);
        assert!(result.evaluation_succeeded());
        assert_eq!(result.into_value().unwrap().as_i64(), Some(1));
    }
}
