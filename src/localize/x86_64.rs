//! The concrete x86-64 SysV register file (spec.md §4.6, §6 "Target
//! ABI"), shared by localization, the register allocator, and the
//! instruction selector — one enum rather than three, since all three
//! passes read and write the same [`crate::air::Operand::Reg`] slots.

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PhysReg {
    Rax,
    Rbx,
    Rcx,
    Rdx,
    Rsi,
    Rdi,
    Rbp,
    Rsp,
    R8,
    R9,
    R10,
    R11,
    R12,
    R13,
    R14,
    R15,
    Xmm0,
    Xmm1,
    Xmm2,
    Xmm3,
    Xmm4,
    Xmm5,
    Xmm6,
    Xmm7,
}

impl PhysReg {
    pub fn is_sse(self) -> bool {
        matches!(
            self,
            PhysReg::Xmm0
                | PhysReg::Xmm1
                | PhysReg::Xmm2
                | PhysReg::Xmm3
                | PhysReg::Xmm4
                | PhysReg::Xmm5
                | PhysReg::Xmm6
                | PhysReg::Xmm7
        )
    }

    /// Registers that may be clobbered across a call without being saved
    /// by the callee (spec.md §4.7: "integer (caller-saved: RAX, RDI, RSI,
    /// RDX, RCX, R8–R11 ...)").
    pub fn is_caller_saved(self) -> bool {
        use PhysReg::*;
        matches!(self, Rax | Rdi | Rsi | Rdx | Rcx | R8 | R9 | R10 | R11) || self.is_sse()
    }

    /// Registers the selector must push/pop in the prologue/epilogue if
    /// written (spec.md §4.7: "callee-saved: RBX, R12–R15"; §6: "callee-
    /// saved RBX, R12–R15, RBP, RSP").
    pub fn is_callee_saved(self) -> bool {
        matches!(self, PhysReg::Rbx | PhysReg::R12 | PhysReg::R13 | PhysReg::R14 | PhysReg::R15)
    }

    /// The integer argument-passing order (spec.md §6): RDI, RSI, RDX,
    /// RCX, R8, R9.
    pub fn integer_arg_order() -> &'static [PhysReg] {
        &[PhysReg::Rdi, PhysReg::Rsi, PhysReg::Rdx, PhysReg::Rcx, PhysReg::R8, PhysReg::R9]
    }

    /// The SSE argument-passing order (spec.md §4.6): XMM0–XMM7.
    pub fn sse_arg_order() -> &'static [PhysReg] {
        &[
            PhysReg::Xmm0,
            PhysReg::Xmm1,
            PhysReg::Xmm2,
            PhysReg::Xmm3,
            PhysReg::Xmm4,
            PhysReg::Xmm5,
            PhysReg::Xmm6,
            PhysReg::Xmm7,
        ]
    }

    /// Integer registers the allocator may hand out, in preference order
    /// (caller-saved scratch first, callee-saved last since those cost a
    /// prologue push/pop).
    pub fn allocatable_integer() -> &'static [PhysReg] {
        use PhysReg::*;
        &[Rax, R10, R11, Rdi, Rsi, Rdx, Rcx, R8, R9, Rbx, R12, R13, R14, R15]
    }

    pub fn allocatable_sse() -> &'static [PhysReg] {
        Self::sse_arg_order()
    }

    /// AT&T-syntax register name sized to `bytes` (1/2/4/8), used by the
    /// assembly writer (spec.md §6: "size suffixes b/w/l/q inferred from
    /// operand C type").
    pub fn name_sized(self, bytes: u64) -> String {
        use PhysReg::*;
        if self.is_sse() {
            return format!("%{}", format!("{self:?}").to_lowercase());
        }
        let (q, d, w, b) = match self {
            Rax => ("rax", "eax", "ax", "al"),
            Rbx => ("rbx", "ebx", "bx", "bl"),
            Rcx => ("rcx", "ecx", "cx", "cl"),
            Rdx => ("rdx", "edx", "dx", "dl"),
            Rsi => ("rsi", "esi", "si", "sil"),
            Rdi => ("rdi", "edi", "di", "dil"),
            Rbp => ("rbp", "ebp", "bp", "bpl"),
            Rsp => ("rsp", "esp", "sp", "spl"),
            R8 => ("r8", "r8d", "r8w", "r8b"),
            R9 => ("r9", "r9d", "r9w", "r9b"),
            R10 => ("r10", "r10d", "r10w", "r10b"),
            R11 => ("r11", "r11d", "r11w", "r11b"),
            R12 => ("r12", "r12d", "r12w", "r12b"),
            R13 => ("r13", "r13d", "r13w", "r13b"),
            R14 => ("r14", "r14d", "r14w", "r14b"),
            R15 => ("r15", "r15d", "r15w", "r15b"),
            _ => unreachable!("SSE handled above"),
        };
        let name = match bytes {
            1 => b,
            2 => w,
            4 => d,
            _ => q,
        };
        format!("%{name}")
    }
}
