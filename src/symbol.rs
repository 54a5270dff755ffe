//! Symbol table & namespaces (spec.md §3 "Symbol", "Namespace"; §2 stage 2).
//!
//! Grounded on the teacher's `id0` section: a disambiguated name-to-entry
//! table where entries of the same name in different scopes/categories are
//! distinct records, each carrying its own address/type/storage metadata
//! (`id0.rs`'s per-netnode entries keyed by name plus a numeric suffix).

pub mod namespace;
pub mod table;

pub use namespace::Namespace;
pub use table::SymbolTable;

use crate::ast::NodeId;
use crate::types::CType;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Linkage {
    External,
    Internal,
    None,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StorageDuration {
    Static,
    Automatic,
    Allocated,
}

/// A relocation in a static-duration object's initializer image: the byte
/// offset within the image that should be patched to the (possibly
/// offset) address of another symbol (spec.md §3 "Symbol": "a byte image
/// plus a list of relocation addresses referring to other symbols").
#[derive(Clone, Debug)]
pub struct Relocation {
    pub offset_in_image: u64,
    pub target: SymbolId,
    pub addend: i64,
}

#[derive(Clone, Debug, Default)]
pub struct InitializerImage {
    pub bytes: Vec<u8>,
    pub relocations: Vec<Relocation>,
}

/// Opaque handle into a [`SymbolTable`] (spec.md Design Notes: symbols
/// outlive lowering, so later passes hold a stable index rather than a
/// reference).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SymbolId(pub u32);

#[derive(Clone, Debug)]
pub struct Symbol {
    pub id: SymbolId,
    pub name: String,
    pub namespace: Namespace,
    pub declaring_node: Option<NodeId>,
    pub ty: CType,
    /// Assembly-level disambiguator for symbols that share a source name
    /// across nested scopes (spec.md §3: "a disambiguator number").
    pub disambiguator: u32,
    /// Filled during code generation for automatic-duration objects.
    pub stack_offset: Option<i64>,
    /// Explicit assembly name for static-duration objects; defaults to
    /// `name` for external linkage, mangled with `disambiguator` for
    /// internal/none linkage collisions.
    pub asm_name: Option<String>,
    pub linkage: Linkage,
    pub storage_duration: StorageDuration,
    pub initializer: Option<InitializerImage>,
    /// Set for symbols declared with the `typedef` storage-class
    /// specifier; consulted by the parser's typedef-name lexer hack
    /// (spec.md §4.1).
    pub is_typedef: bool,
    /// Filled by the typing pass for an enumeration-constant symbol (spec.md
    /// §4.2, §8 scenario 3): the constant's folded `int` value, so later
    /// identifier references can be rewritten into a self-contained
    /// `EnumerationConstant` node without re-consulting the symbol table.
    pub enum_constant_value: Option<i64>,
}

impl Symbol {
    pub fn assembly_name(&self) -> String {
        if let Some(n) = &self.asm_name {
            return n.clone();
        }
        match self.linkage {
            Linkage::External => self.name.clone(),
            _ => format!(".L{}${}", self.name, self.disambiguator),
        }
    }
}
