//! The three-address intermediate representation (spec.md §3 "AIR
//! Instruction", §2 stage 7).
//!
//! One [`Opcode`] tag plus a generic ordered [`Operand`] list per
//! instruction, the same "tag enum + payload list" shape the teacher uses
//! for `til::Type` vs. its submodule structs — here the payload lives in
//! `Instr::operands` rather than per-variant fields, since the same small
//! set of operand kinds (symbol, register, indirect, constant, label,
//! type) is shared across every opcode and across every later pass
//! (localization, allocation, selection) that rewrites this same enum in
//! place rather than translating to a new one.

pub mod builder;

use crate::localize::x86_64::PhysReg;
use crate::symbol::SymbolId;
use crate::types::CType;

/// Handle into a [`Routine`]'s instruction list. Meaningful only paired
/// with the routine that owns it — an [`crate::ast::AstNode::ir_head`]
/// back-link is only ever read while its owning routine is in scope.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct InstrId(pub u32);

/// A fresh virtual register identity (spec.md GLOSSARY): one logical
/// SSA-like value minted per expression-producing AST node, consumed by
/// [`crate::regalloc`] and gone by the time [`crate::select`] runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct VReg(pub u32);

/// A jump target minted by the builder; resolved to a concrete assembly
/// label by [`crate::select`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct LabelId(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Opcode {
    Declare,
    Load,
    LoadAddr,
    Assign,
    StoreAddr,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    /// Two-operand in-place form a target localization rewrites three-
    /// operand arithmetic into (spec.md §4.6: "`r := a; r op= b`").
    AddAssign,
    SubAssign,
    MulAssign,
    DivAssign,
    ModAssign,
    BitAndAssign,
    BitOrAssign,
    BitXorAssign,
    ShlAssign,
    ShrAssign,
    CmpEq,
    CmpNe,
    CmpLt,
    CmpGt,
    CmpLe,
    CmpGe,
    /// Sign-extend.
    Sext,
    /// Zero-extend.
    Zext,
    /// `float` to `double`.
    S2D,
    /// `double` to `float`.
    D2S,
    /// Floating to signed integer.
    S2Si,
    /// Floating to unsigned integer.
    S2Ui,
    /// Signed integer to floating.
    Si2S,
    /// Unsigned integer to floating.
    Ui2S,
    Jmp,
    Jz,
    Jnz,
    Label,
    Push,
    FuncCall,
    Return,
    Leave,
    Nop,
    Phi,
    SequencePoint,
    /// Register-allocator pseudo-instruction: spill a caller-saved
    /// register around a call site that needs it (spec.md §4.7 step 4).
    Retain,
    Restore,
}

/// One operand slot. `Symbol`/`IndirectSymbol` name a [`SymbolId`] whose
/// assembly address the selector resolves; `VReg` is replaced in place by
/// `Reg` once [`crate::regalloc`] runs (spec.md §8: "After allocation, no
/// operand references a virtual register").
#[derive(Clone, Debug, PartialEq)]
pub enum Operand {
    Symbol(SymbolId),
    VReg(VReg),
    Reg(PhysReg),
    Indirect { base: VReg, offset: i64, index: Option<(VReg, u8)> },
    IndirectReg { base: PhysReg, offset: i64, index: Option<(PhysReg, u8)> },
    IndirectSymbol(SymbolId),
    IntConst(i64),
    FloatConst(f64),
    Label(LabelId),
    Type(CType),
}

impl Operand {
    pub fn as_vreg(&self) -> Option<VReg> {
        match self {
            Operand::VReg(v) => Some(*v),
            _ => None,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Instr {
    pub id: InstrId,
    pub opcode: Opcode,
    /// The instruction's result C type (spec.md §3: "Each instruction
    /// carries its result C type"); `CType::void()` for opcodes that
    /// produce no value.
    pub ty: CType,
    pub operands: Vec<Operand>,
    pub prev: Option<InstrId>,
    pub next: Option<InstrId>,
}

/// One function's lowered body: an owned, doubly-linked instruction list
/// (spec.md §3 Lifecycle: "each function's instruction list is owned by
/// the AIR container").
#[derive(Clone, Debug, Default)]
pub struct Routine {
    pub name: String,
    pub symbol: SymbolId,
    /// Parameter symbols in declaration order, consulted by localization
    /// to emit the entry moves from ABI argument registers into each
    /// parameter's storage (spec.md §4.6).
    pub params: Vec<SymbolId>,
    pub instrs: Vec<Instr>,
    next_vreg: u32,
    next_label: u32,
    /// Nonvolatile registers selection writes to, filled in by the
    /// instruction selector (spec.md §4.8).
    pub clobbered_nonvolatiles: Vec<PhysReg>,
    pub uses_va_start: bool,
}

impl Routine {
    pub fn new(name: String, symbol: SymbolId) -> Self {
        Routine { name, symbol, ..Default::default() }
    }

    pub fn fresh_vreg(&mut self) -> VReg {
        let v = VReg(self.next_vreg);
        self.next_vreg += 1;
        v
    }

    pub fn fresh_label(&mut self) -> LabelId {
        let l = LabelId(self.next_label);
        self.next_label += 1;
        l
    }

    /// Appends `instr` to the end of the list, wiring `prev`/`next` to the
    /// previously-last instruction.
    pub fn push(&mut self, opcode: Opcode, ty: CType, operands: Vec<Operand>) -> InstrId {
        let id = InstrId(self.instrs.len() as u32);
        if let Some(last) = self.instrs.last_mut() {
            last.next = Some(id);
        }
        let prev = self.instrs.last().map(|i| i.id);
        self.instrs.push(Instr { id, opcode, ty, operands, prev, next: None });
        id
    }

    pub fn instr(&self, id: InstrId) -> &Instr {
        &self.instrs[id.0 as usize]
    }

    pub fn instr_mut(&mut self, id: InstrId) -> &mut Instr {
        &mut self.instrs[id.0 as usize]
    }

    /// Replaces the instruction list wholesale, renumbering ids and
    /// prev/next links — used by passes (localization) that expand one
    /// instruction into several.
    pub fn replace_instrs(&mut self, new: Vec<(Opcode, CType, Vec<Operand>)>) {
        self.instrs.clear();
        for (opcode, ty, operands) in new {
            self.push(opcode, ty, operands);
        }
    }
}

/// A static-storage-duration object's data (spec.md §2 stage 7: "a data
/// section per static-storage-duration object").
#[derive(Clone, Debug)]
pub struct DataObject {
    pub symbol: SymbolId,
}

/// A string literal or floating constant promoted to read-only storage
/// (spec.md §2 stage 7: "a read-only data section per string literal /
/// floating constant"). The byte image lives on the symbol itself, the
/// same `InitializerImage` every static-duration object carries — this
/// list only tells the selector which symbols belong in `.rodata` rather
/// than `.data`.
#[derive(Clone, Debug)]
pub struct RoDataObject {
    pub symbol: SymbolId,
}

#[derive(Clone, Debug, Default)]
pub struct AirModule {
    pub routines: Vec<Routine>,
    pub data: Vec<DataObject>,
    pub rodata: Vec<RoDataObject>,
}
