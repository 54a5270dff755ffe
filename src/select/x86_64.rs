//! Per-opcode x86-64 AT&T-syntax translation (spec.md §4.8, §6 Output:
//! "AT&T source-then-destination operand order and size suffixes b/w/l/q
//! inferred from operand C type").

use std::collections::HashMap;

use crate::air::{Instr, Opcode, Operand};
use crate::localize::x86_64::PhysReg;
use crate::symbol::{SymbolId, SymbolTable};
use crate::types::CType;

/// One assembly line's worth of mnemonic plus already-formatted operands,
/// AT&T source-then-destination order. `emit.rs` joins these with a comma
/// and indentation; `extra_lines` holds any further lines the opcode
/// expanded into (comparisons: `cmp` then `setcc`; branches: `test` then
/// `je`/`jne`), printed immediately after.
#[derive(Clone, Debug)]
pub struct Insn {
    pub mnemonic: String,
    pub operands: Vec<String>,
    pub extra_lines: Vec<String>,
}

impl Insn {
    fn new(mnemonic: impl Into<String>, operands: Vec<String>) -> Self {
        Insn { mnemonic: mnemonic.into(), operands, extra_lines: vec![] }
    }

    pub fn jmp(label: &str) -> Self {
        Insn::new("jmp", vec![label.to_string()])
    }

    pub fn label(name: &str) -> Self {
        Insn { mnemonic: format!("{name}:"), operands: vec![], extra_lines: vec![] }
    }

    pub fn nop() -> Self {
        Insn::new("nop", vec![])
    }
}

fn size_suffix(ty: &CType) -> char {
    let mut solver = crate::types::TypeSizeSolver::new();
    match solver.layout_of(ty).size {
        1 => 'b',
        2 => 'w',
        4 => 'l',
        _ => 'q',
    }
}

fn reg_operand(reg: PhysReg, ty: &CType) -> String {
    let mut solver = crate::types::TypeSizeSolver::new();
    let bytes = solver.layout_of(ty).size.max(4);
    reg.name_sized(bytes)
}

fn format_operand(op: &Operand, ty: &CType, symtab: &SymbolTable) -> String {
    match op {
        Operand::Reg(reg) => reg_operand(*reg, ty),
        Operand::IntConst(v) => format!("${v}"),
        Operand::FloatConst(v) => format!("${}", v.to_bits()),
        Operand::Symbol(sym) => format!("{}(%rip)", symtab.get(*sym).assembly_name()),
        Operand::IndirectSymbol(sym) => format!("{}(%rip)", symtab.get(*sym).assembly_name()),
        Operand::IndirectReg { base, offset, index } => match index {
            Some((idx_reg, scale)) => {
                format!("{offset}({}, {}, {scale})", reg_operand(*base, &CType::pointer_to(CType::void())), reg_operand(*idx_reg, &CType::int()))
            }
            None => format!("{offset}({})", reg_operand(*base, &CType::pointer_to(CType::void()))),
        },
        Operand::Label(l) => format!(".L{}", l.0),
        // `VReg`/`Indirect` must not survive regalloc (spec.md §8); reaching
        // here means an earlier pass's invariant was violated.
        Operand::VReg(_) | Operand::Indirect { .. } | Operand::Type(_) => {
            debug_assert!(false, "operand {op:?} reached instruction selection unresolved");
            String::from("<unresolved>")
        }
    }
}

fn binary_mnemonic(op: Opcode) -> &'static str {
    match op {
        Opcode::AddAssign => "add",
        Opcode::SubAssign => "sub",
        Opcode::MulAssign => "imul",
        Opcode::BitAndAssign => "and",
        Opcode::BitOrAssign => "or",
        Opcode::BitXorAssign => "xor",
        Opcode::ShlAssign => "shl",
        Opcode::ShrAssign => "sar",
        _ => "nop",
    }
}

fn cmp_setcc(op: Opcode) -> &'static str {
    match op {
        Opcode::CmpEq => "sete",
        Opcode::CmpNe => "setne",
        Opcode::CmpLt => "setl",
        Opcode::CmpGt => "setg",
        Opcode::CmpLe => "setle",
        Opcode::CmpGe => "setge",
        _ => "sete",
    }
}

/// Translates one AIR instruction into its x86-64 form. `stack_offsets`
/// resolves an automatic-duration `Symbol` operand to a `%rbp`-relative
/// address instead of the RIP-relative form used for static-duration
/// symbols (spec.md §4.8: frame slots are relative to the frame pointer).
pub fn select_instr(instr: &Instr, stack_offsets: &HashMap<SymbolId, i64>, symtab: &SymbolTable) -> Insn {
    let fmt = |op: &Operand| -> String {
        if let Operand::Symbol(sym) = op {
            if let Some(offset) = stack_offsets.get(sym) {
                return format!("{offset}(%rbp)");
            }
        }
        format_operand(op, &instr.ty, symtab)
    };
    let suffix = size_suffix(&instr.ty);

    match instr.opcode {
        Opcode::LoadAddr => Insn::new("lea", vec![fmt(&instr.operands[1]), fmt(&instr.operands[0])]),
        Opcode::Assign | Opcode::Load => Insn::new(format!("mov{suffix}"), vec![fmt(&instr.operands[1]), fmt(&instr.operands[0])]),
        Opcode::StoreAddr => Insn::new(format!("mov{suffix}"), vec![fmt(&instr.operands[1]), fmt(&instr.operands[0])]),
        Opcode::Add
        | Opcode::Sub
        | Opcode::Mul
        | Opcode::BitAnd
        | Opcode::BitOr
        | Opcode::BitXor
        | Opcode::AddAssign
        | Opcode::SubAssign
        | Opcode::MulAssign
        | Opcode::BitAndAssign
        | Opcode::BitOrAssign
        | Opcode::BitXorAssign
        | Opcode::ShlAssign
        | Opcode::ShrAssign => {
            let mnemonic = format!("{}{suffix}", binary_mnemonic(instr.opcode));
            Insn::new(mnemonic, vec![fmt(&instr.operands[1]), fmt(&instr.operands[0])])
        }
        Opcode::Shl | Opcode::Shr => {
            let mnemonic = if instr.opcode == Opcode::Shl { "shl" } else if instr.ty.is_unsigned() { "shr" } else { "sar" };
            let dest = fmt(&instr.operands[0]);
            let mut insn = Insn::new(format!("mov{suffix}"), vec![fmt(&instr.operands[1]), dest.clone()]);
            insn.extra_lines.push(format!("{mnemonic}{suffix} {}, {dest}", fmt(&instr.operands[2])));
            insn
        }
        Opcode::Declare => Insn::nop(),
        Opcode::Div | Opcode::Mod => {
            let mnemonic = if instr.ty.is_unsigned() { format!("div{suffix}") } else { format!("idiv{suffix}") };
            Insn::new(mnemonic, vec![fmt(&instr.operands[2])])
        }
        Opcode::CmpEq | Opcode::CmpNe | Opcode::CmpLt | Opcode::CmpGt | Opcode::CmpLe | Opcode::CmpGe => {
            let dest = fmt(&instr.operands[0]);
            let mut insn = Insn::new(format!("cmp{suffix}"), vec![fmt(&instr.operands[2]), fmt(&instr.operands[1])]);
            insn.extra_lines.push(format!("{} {dest}", cmp_setcc(instr.opcode)));
            insn
        }
        Opcode::Sext => Insn::new("movsx", vec![fmt(&instr.operands[1]), fmt(&instr.operands[0])]),
        Opcode::Zext => Insn::new("movzx", vec![fmt(&instr.operands[1]), fmt(&instr.operands[0])]),
        Opcode::S2D => Insn::new("cvtss2sd", vec![fmt(&instr.operands[1]), fmt(&instr.operands[0])]),
        Opcode::D2S => Insn::new("cvtsd2ss", vec![fmt(&instr.operands[1]), fmt(&instr.operands[0])]),
        Opcode::Si2S | Opcode::Ui2S => Insn::new("cvtsi2sd", vec![fmt(&instr.operands[1]), fmt(&instr.operands[0])]),
        Opcode::S2Si | Opcode::S2Ui => Insn::new("cvttsd2si", vec![fmt(&instr.operands[1]), fmt(&instr.operands[0])]),
        Opcode::Jmp => Insn::jmp(&fmt(&instr.operands[0])),
        Opcode::Jz | Opcode::Jnz => {
            let test_reg = fmt(&instr.operands[0]);
            let target = fmt(&instr.operands[1]);
            let branch = if instr.opcode == Opcode::Jz { "je" } else { "jne" };
            let mut insn = Insn::new(format!("test{suffix}"), vec![test_reg.clone(), test_reg]);
            insn.extra_lines.push(format!("{branch} {target}"));
            insn
        }
        Opcode::Label => Insn::label(&fmt(&instr.operands[0])),
        Opcode::Push => Insn::new("push", vec![fmt(&instr.operands[0])]),
        Opcode::FuncCall => Insn::new("call", vec![fmt(&instr.operands[1])]),
        Opcode::Retain => retain_insn(&instr.operands[0]),
        Opcode::Restore => restore_insn(&instr.operands[0]),
        Opcode::Return | Opcode::Leave | Opcode::Nop | Opcode::Phi | Opcode::SequencePoint => Insn::new("nop", vec![]),
    }
}

/// Saves the register the allocator is about to hand to a reserved call-
/// argument slot (spec.md §4.7's `retain`/`restore` pseudo-instructions).
/// General-purpose registers spill with `push`; `push`/`pop` don't accept
/// an XMM operand, so an SSE register gets an explicit stack slot instead.
fn retain_insn(op: &Operand) -> Insn {
    match op {
        Operand::Reg(reg) if reg.is_sse() => {
            let mut insn = Insn::new("sub", vec!["$8".to_string(), "%rsp".to_string()]);
            insn.extra_lines.push(format!("movsd {}, (%rsp)", reg.name_sized(8)));
            insn
        }
        Operand::Reg(reg) => Insn::new("push", vec![reg.name_sized(8)]),
        _ => {
            debug_assert!(false, "Retain operand must be a Reg, got {op:?}");
            Insn::nop()
        }
    }
}

fn restore_insn(op: &Operand) -> Insn {
    match op {
        Operand::Reg(reg) if reg.is_sse() => {
            let mut insn = Insn::new("movsd", vec!["(%rsp)".to_string(), reg.name_sized(8)]);
            insn.extra_lines.push("add $8, %rsp".to_string());
            insn
        }
        Operand::Reg(reg) => Insn::new("pop", vec![reg.name_sized(8)]),
        _ => {
            debug_assert!(false, "Restore operand must be a Reg, got {op:?}");
            Insn::nop()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::air::{InstrId, Instr};
    use crate::symbol::SymbolTable;

    fn instr(opcode: Opcode, operands: Vec<Operand>) -> Instr {
        Instr { id: InstrId(0), opcode, ty: CType::int(), operands, prev: None, next: None }
    }

    #[test]
    fn retain_and_restore_spill_an_integer_register_with_push_and_pop() {
        let symtab = SymbolTable::new();
        let offsets = HashMap::new();

        let retain = instr(Opcode::Retain, vec![Operand::Reg(PhysReg::Rdi)]);
        let insn = select_instr(&retain, &offsets, &symtab);
        assert_eq!(insn.mnemonic, "push");
        assert_eq!(insn.operands, vec!["%rdi".to_string()]);

        let restore = instr(Opcode::Restore, vec![Operand::Reg(PhysReg::Rdi)]);
        let insn = select_instr(&restore, &offsets, &symtab);
        assert_eq!(insn.mnemonic, "pop");
        assert_eq!(insn.operands, vec!["%rdi".to_string()]);
    }

    #[test]
    fn retain_and_restore_spill_an_sse_register_through_the_stack() {
        let symtab = SymbolTable::new();
        let offsets = HashMap::new();

        let retain = instr(Opcode::Retain, vec![Operand::Reg(PhysReg::Xmm0)]);
        let insn = select_instr(&retain, &offsets, &symtab);
        assert_eq!(insn.mnemonic, "sub");
        assert!(insn.extra_lines.iter().any(|l| l.contains("movsd") && l.contains("%xmm0")));

        let restore = instr(Opcode::Restore, vec![Operand::Reg(PhysReg::Xmm0)]);
        let insn = select_instr(&restore, &offsets, &symtab);
        assert_eq!(insn.mnemonic, "movsd");
        assert!(insn.extra_lines.iter().any(|l| l.contains("add")));
    }
}
