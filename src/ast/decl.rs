//! Declaration, declarator, and type-specifier node kinds (spec.md §3;
//! the `SC_DECLARATION`/`SC_DECLARATOR`/`SC_*_SPECIFIER` family of the
//! reference).
//!
//! Open Question (spec.md §9): the reference distinguishes a full
//! declaration-specifier list from a specifier-qualifier list at several
//! grammar sites (`struct`/`union` member declarations, `typedef`
//! parameters) but performs identical work on both. [`DeclarationSpecifiers`]
//! unifies them into one struct used everywhere a C grammar production
//! would otherwise need two near-identical node kinds — decided as
//! directed by spec.md §9's explicit permission to do so once grammar
//! disambiguation is complete.

use super::NodeId;
use crate::types::{Qualifiers, RecordKind};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StorageClass {
    Typedef,
    Auto,
    Register,
    Static,
    Extern,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BasicTypeSpecifier {
    Void,
    Char,
    Short,
    Int,
    Long,
    Float,
    Double,
    Signed,
    Unsigned,
    Bool,
    Complex,
    Imaginary,
}

/// Non-basic type specifiers each carry an AST node (struct/union/enum
/// specifier) or a resolved typedef name.
#[derive(Clone, Debug)]
pub enum NonBasicTypeSpecifier {
    StructOrUnion(NodeId),
    Enum(NodeId),
    TypedefName(String),
}

/// The merged declaration-specifier / specifier-qualifier list (see the
/// module's Open Question note above).
#[derive(Clone, Debug, Default)]
pub struct DeclarationSpecifiers {
    pub storage_class: Option<StorageClass>,
    /// Multiple tokens combine, e.g. `unsigned long long int`; empty when
    /// `non_basic` is set.
    pub basic_specifiers: Vec<BasicTypeSpecifier>,
    pub non_basic: Option<NonBasicTypeSpecifier>,
    pub qualifiers: Qualifiers,
    pub is_inline: bool,
}

/// A single declarator layer, recursively wrapping the declarator it
/// derives from. Each layer is its own arena node so the parser can build
/// the pointer/array/function chain iteratively the way the reference's
/// recursive-descent `parse_declarator` does, without a dedicated
/// "declarator" indirection struct outside the arena.
#[derive(Debug)]
pub enum DeclaratorKind {
    Identifier(String),
    /// An abstract declarator's innermost layer has no identifier (used in
    /// `sizeof(int *)`/cast type names/abstract function parameters).
    Abstract,
    Pointer { qualifiers: Qualifiers, inner: NodeId },
    /// `len` is `None` for an unspecified-size array (`int xs[]`); VLA
    /// length expressions are out of scope (spec.md §1 Non-goals).
    Array { inner: NodeId, len: Option<NodeId> },
    Function { inner: NodeId, parameters: Vec<NodeId>, is_variadic: bool, is_prototyped: bool },
}

/// One designator in a designated initializer: `.field` or `[index]`
/// (spec.md Glossary "Designation").
#[derive(Clone, Debug)]
pub enum Designator {
    Field(String),
    Index(NodeId),
}

#[derive(Debug)]
pub enum DeclKind {
    Declarator(DeclaratorKind),
    ParameterDeclaration { specifiers: DeclarationSpecifiers, declarator: Option<NodeId> },
    InitDeclarator { declarator: NodeId, initializer: Option<NodeId> },
    Declaration { specifiers: DeclarationSpecifiers, init_declarators: Vec<NodeId> },
    FunctionDefinition { specifiers: DeclarationSpecifiers, declarator: NodeId, body: NodeId },
    TypeName { specifiers: DeclarationSpecifiers, abstract_declarator: Option<NodeId> },
    StructUnionSpecifier { kind: RecordKind, tag: Option<String>, members: Option<Vec<NodeId>> },
    StructDeclaration {
        specifiers: DeclarationSpecifiers,
        /// `(declarator, bit-field width expression)`; an anonymous
        /// bit-field has `declarator: None`.
        declarators: Vec<(Option<NodeId>, Option<NodeId>)>,
    },
    EnumSpecifier { tag: Option<String>, enumerators: Option<Vec<(String, Option<NodeId>)>> },
    /// Either an assignment-expression initializer or a brace-enclosed
    /// list; list items carry their (possibly empty) designation.
    InitializerList { items: Vec<(Vec<Designator>, NodeId)> },
}

pub use DeclaratorKind as Declarator;
