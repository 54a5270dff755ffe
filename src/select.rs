//! Instruction selection and the concrete x86-64 instruction model feeding
//! the assembly writer (spec.md §4.8).
//!
//! Grounded on `localize.rs`'s per-routine rewrite shape, one stage later:
//! where localization and allocation rewrite [`crate::air::Opcode`] in
//! place, selection translates the now fully-allocated AIR into
//! [`Insn`] — a flat, one-mnemonic-per-value struct closer to the text
//! `emit.rs` ultimately prints than to AIR's three-address model.

pub mod x86_64;

use std::collections::HashSet;

use anyhow::Result;

pub use x86_64::Insn;

use crate::air::Operand;
use crate::localize::x86_64::PhysReg;
use crate::regalloc::AllocatedModule;
use crate::symbol::{StorageDuration, SymbolTable};

/// 176 bytes: six 8-byte integer-argument-register slots plus eight
/// 16-byte XMM slots (spec.md §4.8: "the 176-byte variadic save area").
const VARARG_SAVE_AREA_BYTES: i64 = 176;

#[derive(Clone, Debug)]
pub struct SelectedRoutine {
    pub name: String,
    pub is_global: bool,
    pub frame_size: i64,
    pub clobbered_nonvolatiles: Vec<PhysReg>,
    pub uses_va_start: bool,
    pub body: Vec<Insn>,
    pub epilogue_label: String,
}

#[derive(Clone, Debug)]
pub struct Program {
    pub routines: Vec<SelectedRoutine>,
    pub data: Vec<crate::symbol::SymbolId>,
    pub rodata: Vec<crate::symbol::SymbolId>,
}

/// Translates every routine in `module` into its [`SelectedRoutine`] form.
/// Assigns each automatic-duration symbol touched by `Declare` a stack
/// slot (bumping a running offset, per spec.md §4.8: "frame size is the
/// running maximum of symbol stack offsets").
pub fn run(module: &AllocatedModule, symtab: &SymbolTable) -> Result<Program> {
    let mut routines = Vec::with_capacity(module.routines.len());
    for allocated in &module.routines {
        routines.push(select_routine(&allocated.routine, symtab)?);
    }
    Ok(Program {
        routines,
        data: module.data.iter().map(|d| d.symbol).collect(),
        rodata: module.rodata.iter().map(|r| r.symbol).collect(),
    })
}

fn select_routine(routine: &crate::air::Routine, symtab: &SymbolTable) -> Result<SelectedRoutine> {
    use crate::air::Opcode;

    let mut stack_offsets: std::collections::HashMap<crate::symbol::SymbolId, i64> = std::collections::HashMap::new();
    let mut next_offset: i64 = 0;
    let mut body = Vec::with_capacity(routine.instrs.len());
    let mut clobbered: HashSet<PhysReg> = HashSet::new();
    let epilogue_label = format!(".LR{}", routine.symbol.0);

    for instr in &routine.instrs {
        for operand in &instr.operands {
            if let Operand::Reg(reg) = operand {
                if reg.is_callee_saved() {
                    clobbered.insert(*reg);
                }
            }
        }
        match instr.opcode {
            Opcode::Declare => {
                if let Some(Operand::Symbol(sym)) = instr.operands.first() {
                    if symtab.get(*sym).storage_duration == StorageDuration::Automatic {
                        let mut solver = crate::types::TypeSizeSolver::new();
                        let layout = solver.layout_of(&symtab.get(*sym).ty);
                        next_offset = crate::types::layout::align_up(next_offset, layout.align) as i64 + layout.size as i64;
                        stack_offsets.insert(*sym, -next_offset);
                    }
                }
            }
            Opcode::Return => {
                body.push(Insn::jmp(&epilogue_label));
            }
            _ => body.push(x86_64::select_instr(instr, &stack_offsets, symtab)),
        }
    }

    let frame_size = crate::types::layout::align_up(next_offset as u64, 16) as i64
        + if routine.uses_va_start { VARARG_SAVE_AREA_BYTES } else { 0 };

    Ok(SelectedRoutine {
        name: routine.name.clone(),
        is_global: symtab.get(routine.symbol).linkage == crate::symbol::Linkage::External,
        frame_size,
        clobbered_nonvolatiles: clobbered.into_iter().collect(),
        uses_va_start: routine.uses_va_start,
        body,
        epilogue_label,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::air::{Opcode, Routine};
    use crate::symbol::{Linkage, Namespace};
    use crate::types::CType;

    #[test]
    fn return_becomes_jump_to_epilogue_label() {
        let mut symtab = SymbolTable::new();
        let scope = symtab.file_scope();
        let sym = symtab.declare(scope, "f", Namespace::Ordinary, CType::int(), None, Linkage::External, crate::symbol::StorageDuration::Static, false);
        let mut routine = Routine::new("f".into(), sym);
        routine.push(Opcode::Return, CType::void(), vec![]);
        let module = AllocatedModule { routines: vec![crate::regalloc::AllocatedRoutine { routine }], data: vec![], rodata: vec![] };
        let program = run(&module, &symtab).unwrap();
        assert_eq!(program.routines[0].body.len(), 1);
        assert!(program.routines[0].body[0].mnemonic.starts_with("jmp"));
    }
}
