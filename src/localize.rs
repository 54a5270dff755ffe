//! Target localization (spec.md §4.6, §2 stage 8): rewrites builder-
//! produced AIR so every instruction has a direct x86-64 encoding, ahead
//! of register allocation.
//!
//! Grounded on the reference's `localize.c` ABI-shaping pass; here
//! expressed as a sequence of per-routine rewrites over [`crate::air`]'s
//! shared `Opcode`/`Operand` model, the same "small rewrite passes over
//! one shared IR" structure `til::size_calculator` uses for a single
//! concern (layout) rather than `localize.c`'s single large function.

pub mod x86_64;

use std::collections::HashMap;

use crate::air::{AirModule, Opcode, Operand, Routine, VReg};
use crate::symbol::SymbolTable;
use crate::types::CType;
use x86_64::PhysReg;

/// Runs every localization rewrite over each routine in `module`, in the
/// order spec.md §4.6 lists them (parameter pinning first, so later passes
/// see the incoming-register moves as ordinary instructions; call fan-out
/// next, since it determines which vregs are pinned before the generic
/// two-operand rewrite runs).
pub fn run(module: &mut AirModule, symtab: &SymbolTable) {
    for routine in &mut module.routines {
        log::debug!("localize: {}", routine.name);
        pin_incoming_parameters(routine, symtab);
        rewrite_calls_and_returns(routine);
        rewrite_two_operand_arithmetic(routine);
        rewrite_div_mod(routine);
        rewrite_shift_counts(routine);
    }
}

/// Emits, right after each parameter's `Declare`, a move from its ABI
/// argument register into its storage (spec.md §4.6: "parameters are
/// moved from their incoming argument registers into their declared
/// storage at routine entry"). Parameters beyond the register-passed
/// positions already live on the caller's stack per the SysV ABI and need
/// no entry move.
fn pin_incoming_parameters(routine: &mut Routine, symtab: &SymbolTable) {
    let mut int_idx = 0usize;
    let mut sse_idx = 0usize;
    let mut rebuilt: Vec<(Opcode, CType, Vec<Operand>)> = Vec::with_capacity(routine.instrs.len() + routine.params.len());
    for instr in routine.instrs.clone() {
        let declared_param = match instr.opcode {
            Opcode::Declare => match instr.operands.first() {
                Some(Operand::Symbol(sym)) if routine.params.contains(sym) => Some(*sym),
                _ => None,
            },
            _ => None,
        };
        rebuilt.push((instr.opcode, instr.ty, instr.operands));
        let Some(param) = declared_param else { continue };
        let ty = symtab.get(param).ty.clone();
        let reg = if is_sse_class(&ty) {
            let r = PhysReg::sse_arg_order().get(sse_idx).copied();
            sse_idx += 1;
            r
        } else {
            let r = PhysReg::integer_arg_order().get(int_idx).copied();
            int_idx += 1;
            r
        };
        if let Some(reg) = reg {
            rebuilt.push((Opcode::Assign, ty, vec![Operand::Symbol(param), Operand::Reg(reg)]));
        }
    }
    routine.replace_instrs(rebuilt);
}

/// Integer vs. SSE argument classification (spec.md §4.6: "Integer
/// function arguments ... SSE arguments ...").
fn is_sse_class(ty: &CType) -> bool {
    ty.is_real_floating()
}

/// Rewrites `func-call` operand lists so each argument operand already
/// occupies its ABI-mandated register, and each `return` occupies RAX or
/// XMM0 (spec.md §4.6 bullets 1-2). Struct arguments/returns beyond the
/// simple scalar case are left to a later pass (see DESIGN.md).
fn rewrite_calls_and_returns(routine: &mut Routine) {
    let vreg_types = result_vreg_types(routine);
    let mut rebuilt = Vec::with_capacity(routine.instrs.len());
    for instr in routine.instrs.clone() {
        match instr.opcode {
            Opcode::FuncCall => {
                let mut operands = instr.operands;
                // operands[0] = result (or Nop sentinel), [1] = callee, [2..] = args
                let mut int_idx = 0usize;
                let mut sse_idx = 0usize;
                for (arg_ty, operand) in instr_arg_types(&operands, &vreg_types).into_iter().zip(operands.iter_mut().skip(2)) {
                    let is_sse = is_sse_class(&arg_ty);
                    let Some(vreg) = operand.as_vreg() else { continue };
                    let target = if is_sse {
                        let reg = x86_64::PhysReg::sse_arg_order().get(sse_idx).copied();
                        sse_idx += 1;
                        reg
                    } else {
                        let reg = x86_64::PhysReg::integer_arg_order().get(int_idx).copied();
                        int_idx += 1;
                        reg
                    };
                    match target {
                        Some(reg) => {
                            rebuilt.push((Opcode::Assign, arg_ty.clone(), vec![Operand::Reg(reg), Operand::VReg(vreg)]));
                            *operand = Operand::Reg(reg);
                        }
                        None => {
                            // Beyond the register-passed positions: spill to the stack
                            // right-to-left (spec.md §4.6: "remaining arguments spill
                            // to the stack right-to-left").
                            rebuilt.push((Opcode::Push, arg_ty.clone(), vec![Operand::VReg(vreg)]));
                        }
                    }
                }
                rebuilt.push((Opcode::FuncCall, instr.ty, operands));
            }
            Opcode::Return => {
                let mut operands = instr.operands;
                if let Some(first) = operands.first_mut() {
                    if let Some(vreg) = first.as_vreg() {
                        let reg = if is_sse_class(&instr.ty) { PhysReg::Xmm0 } else { PhysReg::Rax };
                        rebuilt.push((Opcode::Assign, instr.ty.clone(), vec![Operand::Reg(reg), Operand::VReg(vreg)]));
                        *first = Operand::Reg(reg);
                    }
                }
                rebuilt.push((Opcode::Return, instr.ty, operands));
            }
            _ => rebuilt.push((instr.opcode, instr.ty, instr.operands)),
        }
    }
    routine.replace_instrs(rebuilt);
}

/// Maps each vreg to the type of the instruction that produced it (its
/// `operands[0]`), so a call's argument vregs can be classified by their
/// own type instead of the call's result type.
fn result_vreg_types(routine: &Routine) -> HashMap<VReg, CType> {
    let mut map = HashMap::new();
    for instr in &routine.instrs {
        if let Some(Operand::VReg(v)) = instr.operands.first() {
            map.insert(*v, instr.ty.clone());
        }
    }
    map
}

/// Each `func-call`'s argument vregs were typed by the instruction that
/// defines them; falls back to `int` for an argument vreg with no
/// recorded producer (e.g. a physical register already pinned by an
/// earlier pass), adequate since such an operand is never reclassified
/// anyway. Struct-by-value argument classification is out of scope here
/// (see DESIGN.md).
fn instr_arg_types(operands: &[Operand], vreg_types: &HashMap<VReg, CType>) -> Vec<CType> {
    operands
        .iter()
        .skip(2)
        .map(|op| op.as_vreg().and_then(|v| vreg_types.get(&v).cloned()).unwrap_or_else(CType::int))
        .collect()
}

/// `r = a op b` becomes `r := a; r op= b` (spec.md §4.6 bullet 3),
/// inserting a temporary when `r` aliases `b` for a non-commutative
/// operator (subtraction, division, modulo, shifts).
fn rewrite_two_operand_arithmetic(routine: &mut Routine) {
    let mut rebuilt = Vec::with_capacity(routine.instrs.len());
    let mut next_tmp = routine.instrs.len() as u32 + 1_000_000;
    for instr in routine.instrs.clone() {
        let Some(assign_op) = dyadic_to_in_place(instr.opcode) else {
            rebuilt.push((instr.opcode, instr.ty, instr.operands));
            continue;
        };
        let [result, a, b]: [Operand; 3] = match instr.operands.try_into() {
            Ok(triple) => triple,
            Err(operands) => {
                rebuilt.push((instr.opcode, instr.ty, operands));
                continue;
            }
        };
        let non_commutative = matches!(
            instr.opcode,
            Opcode::Sub | Opcode::Div | Opcode::Mod | Opcode::Shl | Opcode::Shr
        );
        let result_aliases_b = non_commutative && result == b;
        if result_aliases_b {
            let tmp = VReg(next_tmp);
            next_tmp += 1;
            rebuilt.push((Opcode::Assign, instr.ty.clone(), vec![Operand::VReg(tmp), a]));
            rebuilt.push((assign_op, instr.ty.clone(), vec![Operand::VReg(tmp), b]));
            rebuilt.push((Opcode::Assign, instr.ty, vec![result, Operand::VReg(tmp)]));
        } else {
            rebuilt.push((Opcode::Assign, instr.ty.clone(), vec![result.clone(), a]));
            rebuilt.push((assign_op, instr.ty, vec![result, b]));
        }
    }
    routine.replace_instrs(rebuilt);
}

fn dyadic_to_in_place(op: Opcode) -> Option<Opcode> {
    Some(match op {
        Opcode::Add => Opcode::AddAssign,
        Opcode::Sub => Opcode::SubAssign,
        Opcode::Mul => Opcode::MulAssign,
        Opcode::BitAnd => Opcode::BitAndAssign,
        Opcode::BitOr => Opcode::BitOrAssign,
        Opcode::BitXor => Opcode::BitXorAssign,
        _ => return None,
    })
}

/// `div`/`mod` pin the dividend into RAX and clear/sign-extend RDX before
/// the operation, then read the quotient from RAX or the remainder from
/// RDX (spec.md §4.6 bullet 4).
fn rewrite_div_mod(routine: &mut Routine) {
    let mut rebuilt = Vec::with_capacity(routine.instrs.len());
    for instr in routine.instrs.clone() {
        if !matches!(instr.opcode, Opcode::Div | Opcode::Mod) {
            rebuilt.push((instr.opcode, instr.ty, instr.operands));
            continue;
        }
        let [result, dividend, divisor]: [Operand; 3] = match instr.operands.try_into() {
            Ok(t) => t,
            Err(operands) => {
                rebuilt.push((instr.opcode, instr.ty, operands));
                continue;
            }
        };
        let is_signed = !instr.ty.is_unsigned();
        rebuilt.push((Opcode::Assign, instr.ty.clone(), vec![Operand::Reg(PhysReg::Rax), dividend]));
        let extend_op = if is_signed { Opcode::Sext } else { Opcode::Zext };
        rebuilt.push((
            extend_op,
            instr.ty.clone(),
            vec![Operand::Reg(PhysReg::Rdx), Operand::Reg(PhysReg::Rax)],
        ));
        rebuilt.push((instr.opcode, instr.ty.clone(), vec![Operand::Reg(PhysReg::Rax), Operand::Reg(PhysReg::Rax), divisor]));
        let source = if instr.opcode == Opcode::Div { PhysReg::Rax } else { PhysReg::Rdx };
        rebuilt.push((Opcode::Assign, instr.ty, vec![result, Operand::Reg(source)]));
    }
    routine.replace_instrs(rebuilt);
}

/// Shift counts must reside in CL; a move is inserted when the count
/// operand isn't already a constant (spec.md §4.6 bullet 5).
fn rewrite_shift_counts(routine: &mut Routine) {
    let mut rebuilt = Vec::with_capacity(routine.instrs.len());
    for instr in routine.instrs.clone() {
        if !matches!(instr.opcode, Opcode::Shl | Opcode::Shr | Opcode::ShlAssign | Opcode::ShrAssign) {
            rebuilt.push((instr.opcode, instr.ty, instr.operands));
            continue;
        }
        let mut operands = instr.operands;
        if let Some(count) = operands.last_mut() {
            if !matches!(count, Operand::IntConst(_)) {
                rebuilt.push((Opcode::Assign, CType::basic(crate::types::TypeClass::Int), vec![Operand::Reg(PhysReg::Rcx), count.clone()]));
                *count = Operand::Reg(PhysReg::Rcx);
            }
        }
        rebuilt.push((instr.opcode, instr.ty, operands));
    }
    routine.replace_instrs(rebuilt);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbol::{Linkage, Namespace, SymbolId, StorageDuration};

    #[test]
    fn parameter_is_pinned_from_its_abi_register_after_its_declare() {
        let mut symtab = SymbolTable::new();
        let scope = symtab.file_scope();
        let param = symtab.declare(scope, "x", Namespace::Ordinary, CType::int(), None, Linkage::None, StorageDuration::Automatic, false);
        let mut routine = Routine::new("f".into(), SymbolId(0));
        routine.params = vec![param];
        routine.push(Opcode::Declare, CType::int(), vec![Operand::Symbol(param)]);
        pin_incoming_parameters(&mut routine, &symtab);
        assert_eq!(routine.instrs.len(), 2);
        assert_eq!(routine.instrs[0].opcode, Opcode::Declare);
        assert_eq!(routine.instrs[1].opcode, Opcode::Assign);
        assert_eq!(routine.instrs[1].operands[0], Operand::Symbol(param));
        assert_eq!(routine.instrs[1].operands[1], Operand::Reg(PhysReg::integer_arg_order()[0]));
    }

    #[test]
    fn three_operand_add_becomes_assign_then_in_place() {
        let mut routine = Routine::new("f".into(), SymbolId(0));
        let r = routine.fresh_vreg();
        let a = routine.fresh_vreg();
        let b = routine.fresh_vreg();
        routine.push(Opcode::Add, CType::int(), vec![Operand::VReg(r), Operand::VReg(a), Operand::VReg(b)]);
        rewrite_two_operand_arithmetic(&mut routine);
        assert_eq!(routine.instrs.len(), 2);
        assert_eq!(routine.instrs[0].opcode, Opcode::Assign);
        assert_eq!(routine.instrs[1].opcode, Opcode::AddAssign);
    }

    #[test]
    fn float_argument_is_classified_into_sse_register() {
        let mut routine = Routine::new("f".into(), SymbolId(0));
        let result = routine.fresh_vreg();
        let callee = routine.fresh_vreg();
        let arg = routine.fresh_vreg();
        let double = CType::basic(crate::types::TypeClass::Double);
        routine.push(Opcode::Assign, double.clone(), vec![Operand::VReg(arg), Operand::FloatConst(1.0)]);
        routine.push(
            Opcode::FuncCall,
            double,
            vec![Operand::VReg(result), Operand::VReg(callee), Operand::VReg(arg)],
        );
        rewrite_calls_and_returns(&mut routine);
        let pins_xmm0 = routine.instrs.iter().any(|i| i.opcode == Opcode::Assign && i.operands[0] == Operand::Reg(PhysReg::Xmm0));
        assert!(pins_xmm0, "float argument should be pinned into xmm0, not an integer register");
    }

    #[test]
    fn div_pins_dividend_into_rax() {
        let mut routine = Routine::new("f".into(), SymbolId(0));
        let r = routine.fresh_vreg();
        let a = routine.fresh_vreg();
        let b = routine.fresh_vreg();
        routine.push(Opcode::Div, CType::int(), vec![Operand::VReg(r), Operand::VReg(a), Operand::VReg(b)]);
        rewrite_div_mod(&mut routine);
        assert_eq!(routine.instrs[0].operands[0], Operand::Reg(PhysReg::Rax));
    }
}
