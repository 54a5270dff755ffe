//! GAS-syntax assembly writer (spec.md §6 Output, §4.8).
//!
//! Grounded on the pipeline's own layering: every earlier pass
//! (localization, allocation, selection) already produced the fully
//! concrete form this module prints, so `emit.rs` does no reasoning of
//! its own — it is pure formatting, the same role the teacher's
//! `tools/dump_til.rs` plays for its own structures, just targeting GAS
//! text instead of a debug dump.

use crate::options::CompileOptions;
use crate::select::{Program, SelectedRoutine};
use crate::symbol::SymbolTable;

/// Renders `program` to one GAS-syntax assembly text stream (spec.md §6:
/// "Data sections precede text").
pub fn emit(program: &Program, symtab: &SymbolTable, options: &CompileOptions) -> String {
    let mut out = String::new();
    emit_data(&mut out, program, symtab);
    emit_rodata(&mut out, program, symtab);
    out.push_str(".text\n");
    for routine in &program.routines {
        emit_routine(&mut out, routine, options);
    }
    out
}

fn emit_data(out: &mut String, program: &Program, symtab: &SymbolTable) {
    if program.data.is_empty() {
        return;
    }
    out.push_str(".data\n");
    for &sym in &program.data {
        emit_object(out, sym, symtab);
    }
}

fn emit_rodata(out: &mut String, program: &Program, symtab: &SymbolTable) {
    if program.rodata.is_empty() {
        return;
    }
    out.push_str(".section .rodata\n");
    for &sym in &program.rodata {
        emit_object(out, sym, symtab);
    }
}

fn emit_object(out: &mut String, sym: crate::symbol::SymbolId, symtab: &SymbolTable) {
    let symbol = symtab.get(sym);
    let mut solver = crate::types::TypeSizeSolver::new();
    let align = solver.layout_of(&symbol.ty).align;
    if symbol.linkage == crate::symbol::Linkage::External {
        out.push_str(&format!(".globl {}\n", symbol.assembly_name()));
    }
    out.push_str(&format!(".align {align}\n"));
    out.push_str(&format!("{}:\n", symbol.assembly_name()));
    let Some(init) = &symbol.initializer else {
        out.push_str(&format!("    .zero {}\n", solver.layout_of(&symbol.ty).size));
        return;
    };
    let mut cursor = 0usize;
    let mut relocations: Vec<_> = init.relocations.iter().collect();
    relocations.sort_by_key(|r| r.offset_in_image);
    for reloc in relocations {
        if reloc.offset_in_image as usize > cursor {
            emit_byte_run(out, &init.bytes[cursor..reloc.offset_in_image as usize]);
        }
        let target_name = symtab.get(reloc.target).assembly_name();
        if reloc.addend == 0 {
            out.push_str(&format!("    .quad {target_name}\n"));
        } else {
            out.push_str(&format!("    .quad {target_name}+{}\n", reloc.addend));
        }
        cursor = reloc.offset_in_image as usize + 8;
    }
    if cursor < init.bytes.len() {
        emit_byte_run(out, &init.bytes[cursor..]);
    }
}

fn emit_byte_run(out: &mut String, bytes: &[u8]) {
    if bytes.is_empty() {
        return;
    }
    let rendered: Vec<String> = bytes.iter().map(|b| b.to_string()).collect();
    out.push_str(&format!("    .byte {}\n", rendered.join(",")));
}

fn emit_routine(out: &mut String, routine: &SelectedRoutine, options: &CompileOptions) {
    if routine.is_global {
        out.push_str(&format!(".globl {}\n", routine.name));
    }
    out.push_str(&format!("{}:\n", routine.name));
    out.push_str("    pushq %rbp\n");
    out.push_str("    movq %rsp, %rbp\n");
    if routine.frame_size > 0 {
        out.push_str(&format!("    subq ${}, %rsp\n", routine.frame_size));
    }
    for reg in &routine.clobbered_nonvolatiles {
        out.push_str(&format!("    push {}\n", reg.name_sized(8)));
    }
    if routine.uses_va_start {
        emit_vararg_save_area(out);
    }

    let body = if options.peephole { peephole(&routine.body) } else { routine.body.clone() };
    for insn in &body {
        emit_insn(out, insn);
    }

    out.push_str(&format!("{}:\n", routine.epilogue_label));
    for reg in routine.clobbered_nonvolatiles.iter().rev() {
        out.push_str(&format!("    pop {}\n", reg.name_sized(8)));
    }
    out.push_str("    leave\n");
    out.push_str("    ret\n");
}

fn emit_vararg_save_area(out: &mut String) {
    use crate::localize::x86_64::PhysReg;
    for (i, reg) in PhysReg::integer_arg_order().iter().enumerate() {
        out.push_str(&format!("    movq {}, {}(%rbp)\n", reg.name_sized(8), -176 + i as i64 * 8));
    }
    for (i, reg) in PhysReg::sse_arg_order().iter().enumerate() {
        out.push_str(&format!("    movq {}, {}(%rbp)\n", reg.name_sized(8), -176 + 48 + i as i64 * 16));
    }
}

fn emit_insn(out: &mut String, insn: &crate::select::Insn) {
    if insn.operands.is_empty() && insn.mnemonic.ends_with(':') {
        out.push_str(&format!("{}\n", insn.mnemonic));
        return;
    }
    if insn.mnemonic == "nop" && insn.operands.is_empty() {
        return;
    }
    if insn.operands.is_empty() {
        out.push_str(&format!("    {}\n", insn.mnemonic));
    } else {
        out.push_str(&format!("    {} {}\n", insn.mnemonic, insn.operands.join(", ")));
    }
    for line in &insn.extra_lines {
        out.push_str(&format!("    {line}\n"));
    }
}

/// Drops `nop`/redundant-label pairs left behind by earlier passes (spec.md
/// §1: "optimization beyond simple local peephole passes" is out of scope,
/// but this much cleanup is explicitly in).
fn peephole(body: &[crate::select::Insn]) -> Vec<crate::select::Insn> {
    body.iter().filter(|insn| !(insn.mnemonic == "nop" && insn.operands.is_empty())).cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::select::{Insn, Program, SelectedRoutine};

    #[test]
    fn emits_globl_label_and_unified_epilogue() {
        let symtab = SymbolTable::new();
        let routine = SelectedRoutine {
            name: "main".into(),
            is_global: true,
            frame_size: 0,
            clobbered_nonvolatiles: vec![],
            uses_va_start: false,
            body: vec![Insn::jmp(".LR0")],
            epilogue_label: ".LR0".into(),
        };
        let program = Program { routines: vec![routine], data: vec![], rodata: vec![] };
        let text = emit(&program, &symtab, &CompileOptions::default());
        assert!(text.contains(".globl main"));
        assert!(text.contains("main:"));
        assert!(text.contains(".LR0:"));
        assert!(text.trim_end().ends_with("ret"));
    }

    #[test]
    fn peephole_drops_bare_nops() {
        let body = vec![Insn::jmp("x"), Insn::nop()];
        let cleaned = peephole(&body);
        assert_eq!(cleaned.len(), 1);
    }
}
