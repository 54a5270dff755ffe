//! Linear-scan register allocator (spec.md §4.7).
//!
//! Grounded on `localize.rs`'s own pass shape (one function per routine,
//! rewriting `Instr`/`Operand` in place) — allocation is just another
//! rewrite over the same AIR, except its per-instruction bookkeeping
//! (live mappings, expiries) can't be expressed as a single `instrs.clone()`
//! iteration the way localization's independent rewrites can, since a
//! vreg's physical register depends on what's already live when it's
//! assigned.

use std::collections::HashMap;

use anyhow::{anyhow, Result};

use crate::air::{AirModule, Opcode, Operand, Routine, VReg};
use crate::localize::x86_64::PhysReg;

/// A routine whose every `Operand::VReg` has been replaced by
/// `Operand::Reg` (spec.md §8: "After allocation, no operand references a
/// virtual register").
#[derive(Clone, Debug)]
pub struct AllocatedRoutine {
    pub routine: Routine,
}

#[derive(Clone, Debug)]
pub struct AllocatedModule {
    pub routines: Vec<AllocatedRoutine>,
    pub data: Vec<crate::air::DataObject>,
    pub rodata: Vec<crate::air::RoDataObject>,
}

/// Runs linear-scan allocation over every routine in `module`. A routine
/// that runs out of physical registers with no spill candidate is a fatal
/// internal error, not a collected diagnostic (spec.md §4.7: "the
/// specified scope does not require general spill support").
pub fn run(module: &AirModule) -> Result<AllocatedModule> {
    let mut routines = Vec::with_capacity(module.routines.len());
    for routine in &module.routines {
        routines.push(AllocatedRoutine { routine: allocate_routine(routine)? });
    }
    Ok(AllocatedModule { routines, data: module.data.clone(), rodata: module.rodata.clone() })
}

fn operand_reads_vreg(op: &Operand, vreg: VReg) -> bool {
    match op {
        Operand::VReg(v) => *v == vreg,
        Operand::Indirect { base, index, .. } => *base == vreg || index.is_some_and(|(v, _)| v == vreg),
        _ => false,
    }
}

/// The last instruction index that reads `vreg`, used as its expiry.
fn last_use(routine: &Routine, vreg: VReg, from: usize) -> usize {
    let mut last = from;
    for (i, instr) in routine.instrs.iter().enumerate().skip(from) {
        if instr.operands.iter().any(|op| operand_reads_vreg(op, vreg)) {
            last = i;
        }
    }
    last
}

fn is_sse_instr(opcode: Opcode, ty: &crate::types::CType) -> bool {
    matches!(opcode, Opcode::Assign | Opcode::Load | Opcode::Add | Opcode::Sub | Opcode::Mul | Opcode::Div) && ty.is_real_floating()
}

fn allocate_routine(routine: &Routine) -> Result<Routine> {
    let mut out = routine.clone();
    // mapping: vreg -> (physical register, expiry instruction index)
    let mut live: HashMap<VReg, (PhysReg, usize)> = HashMap::new();
    let mut free_integer: Vec<PhysReg> = PhysReg::allocatable_integer().iter().rev().copied().collect();
    let mut free_sse: Vec<PhysReg> = PhysReg::allocatable_sse().iter().rev().copied().collect();
    let mut in_use: std::collections::HashSet<PhysReg> = std::collections::HashSet::new();

    // A `while` loop over a live index, not `for idx in 0..out.instrs.len()`:
    // `insert_retain_restore` below inserts instructions mid-vector, which
    // shifts everything at or after the insertion point, including the
    // instruction the loop is currently sitting on.
    let mut idx = 0usize;
    while idx < out.instrs.len() {
        if matches!(out.instrs[idx].opcode, Opcode::Retain | Opcode::Restore) {
            idx += 1;
            continue;
        }

        // Step 1: substitute non-result vreg operands (and already-pinned
        // Reg operands stay untouched) with the currently mapped register.
        let result_vreg = out.instrs[idx].operands.first().and_then(|o| o.as_vreg());
        for (slot, operand) in out.instrs[idx].operands.iter_mut().enumerate() {
            if slot == 0 {
                continue;
            }
            match operand {
                Operand::VReg(v) => {
                    let (reg, _) = *live
                        .get(v)
                        .ok_or_else(|| anyhow!("regalloc: use of vreg {:?} before a mapping was recorded", v))?;
                    *operand = Operand::Reg(reg);
                }
                Operand::Indirect { base, offset, index } => {
                    let (base_reg, _) = *live
                        .get(base)
                        .ok_or_else(|| anyhow!("regalloc: use of vreg {:?} before a mapping was recorded", base))?;
                    let index_reg = match index {
                        Some((v, scale)) => {
                            let (r, _) = *live
                                .get(v)
                                .ok_or_else(|| anyhow!("regalloc: use of vreg {:?} before a mapping was recorded", v))?;
                            Some((r, *scale))
                        }
                        None => None,
                    };
                    *operand = Operand::IndirectReg { base: base_reg, offset: *offset, index: index_reg };
                }
                _ => {}
            }
        }

        // Step 2: release mappings whose expiry is this instruction.
        let expired: Vec<VReg> = live.iter().filter(|(_, (_, expiry))| *expiry == idx).map(|(v, _)| *v).collect();
        for v in expired {
            if let Some((reg, _)) = live.remove(&v) {
                in_use.remove(&reg);
                if reg.is_sse() {
                    free_sse.push(reg);
                } else {
                    free_integer.push(reg);
                }
            }
        }

        // Step 3: no result vreg, nothing more to do for this instruction.
        let Some(result) = result_vreg else {
            idx += 1;
            continue;
        };
        let already_pinned = matches!(out.instrs[idx].operands[0], Operand::Reg(_));
        if already_pinned {
            idx += 1;
            continue;
        }

        // Step 4: compute expiry and reserved-register demand.
        let mut expiry = last_use(&out, result, idx + 1);
        let is_sse = is_sse_instr(out.instrs[idx].opcode, &out.instrs[idx].ty);
        let reserved = reserved_register_for_call_argument(&out, result, idx);

        let chosen = match reserved {
            Some(reg) => {
                if in_use.contains(&reg) {
                    let (new_idx, new_expiry) = insert_retain_restore(&mut out, &mut live, idx, expiry, reg)?;
                    idx = new_idx;
                    expiry = new_expiry;
                } else if reg.is_sse() {
                    free_sse.retain(|r| *r != reg);
                } else {
                    free_integer.retain(|r| *r != reg);
                }
                reg
            }
            None => {
                let pool = if is_sse { &mut free_sse } else { &mut free_integer };
                pool.pop().ok_or_else(|| anyhow!("regalloc: out of {} registers in routine {}", if is_sse { "SSE" } else { "integer" }, out.name))?
            }
        };

        in_use.insert(chosen);
        live.insert(result, (chosen, expiry));
        out.instrs[idx].operands[0] = Operand::Reg(chosen);
        idx += 1;
    }
    Ok(out)
}

/// If `result` is consumed as an argument operand of a later `func-call`
/// before any other definition, its ABI register is reserved up front
/// (spec.md §4.7 step 4) — `localize.rs` has already pinned call
/// arguments into `Operand::Reg` via an `Assign`, so this looks for the
/// *destination* register of the very next `Assign` that reads `result`.
fn reserved_register_for_call_argument(routine: &Routine, result: VReg, from: usize) -> Option<PhysReg> {
    for instr in routine.instrs.iter().skip(from + 1) {
        if instr.opcode != Opcode::Assign {
            continue;
        }
        if instr.operands.get(1).and_then(|o| o.as_vreg()) != Some(result) {
            continue;
        }
        if let Some(Operand::Reg(reg)) = instr.operands.first() {
            return Some(*reg);
        }
        return None;
    }
    None
}

/// Spills whatever currently occupies `reg` around the reserved window
/// `[idx, expiry]` via `Retain`/`Restore` pseudo-instructions (spec.md
/// §4.7 step 4: "insert a `retain` before the current instruction and a
/// matching `restore` after the expiry").
///
/// Both inserts shift every instruction at or after the insertion point
/// forward by one slot, which invalidates any index that already pointed
/// into that range — the caller's `idx` (the instruction currently being
/// allocated) and every expiry already recorded in `live`. Returns the
/// post-shift `(idx, expiry)` the caller must resume with; `live`'s
/// expiries are corrected in place.
fn insert_retain_restore(
    routine: &mut Routine,
    live: &mut HashMap<VReg, (PhysReg, usize)>,
    idx: usize,
    expiry: usize,
    reg: PhysReg,
) -> Result<(usize, usize)> {
    let ty = crate::types::CType::int();
    let retain = crate::air::Instr {
        id: crate::air::InstrId(routine.instrs.len() as u32),
        opcode: Opcode::Retain,
        ty: ty.clone(),
        operands: vec![Operand::Reg(reg)],
        prev: None,
        next: None,
    };
    routine.instrs.insert(idx, retain);
    shift_expiries_at_or_after(live, idx);
    let idx = idx + 1;
    let expiry = expiry + 1;

    let restore_at = (expiry + 2).min(routine.instrs.len());
    let restore = crate::air::Instr {
        id: crate::air::InstrId(routine.instrs.len() as u32),
        opcode: Opcode::Restore,
        ty,
        operands: vec![Operand::Reg(reg)],
        prev: None,
        next: None,
    };
    routine.instrs.insert(restore_at, restore);
    shift_expiries_at_or_after(live, restore_at);

    Ok((idx, expiry))
}

/// Bumps every expiry in `live` at or after `at` by one, keeping recorded
/// last-use positions in sync with an instruction just inserted at `at`.
fn shift_expiries_at_or_after(live: &mut HashMap<VReg, (PhysReg, usize)>, at: usize) {
    for (_reg, expiry) in live.values_mut() {
        if *expiry >= at {
            *expiry += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbol::SymbolId;
    use crate::types::CType;

    #[test]
    fn assigns_disjoint_registers_to_overlapping_vregs() {
        let mut routine = Routine::new("f".into(), SymbolId(0));
        let a = routine.fresh_vreg();
        let b = routine.fresh_vreg();
        let r = routine.fresh_vreg();
        routine.push(Opcode::Assign, CType::int(), vec![Operand::VReg(a), Operand::IntConst(1)]);
        routine.push(Opcode::Assign, CType::int(), vec![Operand::VReg(b), Operand::IntConst(2)]);
        routine.push(Opcode::Add, CType::int(), vec![Operand::VReg(r), Operand::VReg(a), Operand::VReg(b)]);
        let allocated = allocate_routine(&routine).unwrap();
        let Operand::Reg(reg_a) = allocated.instrs[0].operands[0] else { panic!("expected Reg") };
        let Operand::Reg(reg_b) = allocated.instrs[1].operands[0] else { panic!("expected Reg") };
        assert_ne!(reg_a, reg_b);
    }

    #[test]
    fn no_operand_references_a_vreg_after_allocation() {
        let mut routine = Routine::new("f".into(), SymbolId(0));
        let a = routine.fresh_vreg();
        let b = routine.fresh_vreg();
        let r = routine.fresh_vreg();
        routine.push(Opcode::Assign, CType::int(), vec![Operand::VReg(a), Operand::IntConst(1)]);
        routine.push(Opcode::Assign, CType::int(), vec![Operand::VReg(b), Operand::IntConst(2)]);
        routine.push(Opcode::Add, CType::int(), vec![Operand::VReg(r), Operand::VReg(a), Operand::VReg(b)]);
        let allocated = allocate_routine(&routine).unwrap();
        for instr in &allocated.instrs {
            for operand in &instr.operands {
                assert!(!matches!(operand, Operand::VReg(_)));
            }
        }
    }

    /// Two vregs are each pinned into `Rdi` for back-to-back call
    /// arguments, with the second pin landing while the first is still
    /// live — forcing `insert_retain_restore` to run before either vreg's
    /// producing instruction has been patched. Both producers must still
    /// end up with a physical register, not a leftover `VReg`, and the
    /// `Retain`/`Restore` pair must actually appear in the output.
    #[test]
    fn a_reserved_register_conflict_inserts_retain_restore_without_losing_the_patch() {
        use crate::localize::x86_64::PhysReg;

        let mut routine = Routine::new("f".into(), SymbolId(0));
        let t1 = routine.fresh_vreg();
        let t2 = routine.fresh_vreg();
        routine.push(Opcode::Assign, CType::int(), vec![Operand::VReg(t1), Operand::IntConst(1)]);
        routine.push(Opcode::Assign, CType::int(), vec![Operand::VReg(t2), Operand::IntConst(2)]);
        routine.push(Opcode::Assign, CType::int(), vec![Operand::Reg(PhysReg::Rdi), Operand::VReg(t1)]);
        routine.push(Opcode::Assign, CType::int(), vec![Operand::Reg(PhysReg::Rdi), Operand::VReg(t2)]);
        routine.push(Opcode::Return, CType::void(), vec![]);

        let allocated = allocate_routine(&routine).unwrap();

        // the two defining instructions were patched to real registers, not
        // left pointing at a just-inserted Retain pseudo-instruction.
        let Operand::Reg(reg_t1) = allocated.instrs[0].operands[0] else { panic!("t1's define was not patched to a Reg") };
        let Operand::Reg(reg_t2) = allocated.instrs[1].operands[0] else { panic!("t2's define was not patched to a Reg") };
        assert_eq!(reg_t1, PhysReg::Rdi);
        assert_eq!(reg_t2, PhysReg::Rdi);

        assert!(allocated.instrs.iter().any(|i| i.opcode == Opcode::Retain), "expected a Retain pseudo-instruction to be inserted");
        assert!(allocated.instrs.iter().any(|i| i.opcode == Opcode::Restore), "expected a Restore pseudo-instruction to be inserted");

        for instr in &allocated.instrs {
            for operand in &instr.operands {
                assert!(!matches!(operand, Operand::VReg(_)), "operand {operand:?} still references a vreg after allocation");
            }
        }
    }
}
