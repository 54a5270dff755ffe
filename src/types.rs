//! The C type system library (spec.md §3 "C Type", §2 stage 1).
//!
//! [`CType`] is the canonical representation every later pass reads from:
//! the parser never forges one directly (outside of the predeclared basic
//! types), the typing pass constructs them from declaration specifiers and
//! declarators. Derived types hold a `Box<CType>` to the type they derive
//! from, mirroring the teacher's `Type::Pointer(Pointer { typ: Box<Type>
//! .. })` / `Type::Array` shape in `til.rs`.

pub mod layout;
pub mod qualify;
pub mod r#enum;
pub mod function;
pub mod record;
pub mod convert;

use std::fmt;

pub use layout::TypeSizeSolver;
pub use qualify::Qualifiers;
pub use r#enum::EnumType;
pub use function::FunctionType;
pub use record::{RecordKind, RecordMember, RecordType};

/// The class tag of a [`CType`], spec.md §3: "A type has a *class* tag
/// from {bool, char, signed/unsigned integer ranks, float, double, long
/// double, ..., enumerated, void, pointer, array, structure, union,
/// function, label, error}".
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TypeClass {
    Bool,
    Char,
    SignedChar,
    ShortInt,
    Int,
    LongInt,
    LongLongInt,
    UnsignedChar,
    UnsignedShortInt,
    UnsignedInt,
    UnsignedLongInt,
    UnsignedLongLongInt,
    Float,
    Double,
    LongDouble,
    FloatComplex,
    DoubleComplex,
    LongDoubleComplex,
    FloatImaginary,
    DoubleImaginary,
    LongDoubleImaginary,
    Enumerated,
    Void,
    Array,
    Structure,
    Union,
    Function,
    Pointer,
    Label,
    Error,
}

/// Derived-type payload; only classes that derive from another type carry
/// one. Mirrors `til::Type`'s `Pointer`/`Array`/`Function`/`Struct`/`Union`
/// variants, each wrapping their own submodule type.
#[derive(Clone, Debug)]
pub enum Derivation {
    None,
    Pointer { pointee: Box<CType> },
    /// `len` absent denotes an unspecified-size array (spec.md §3); the
    /// VLA length expression is intentionally not modeled — spec.md §1
    /// Non-goals excludes "variably modified types with runtime extents".
    Array { element: Box<CType>, len: Option<u64> },
    Function(FunctionType),
    Record(RecordType),
    Enum(EnumType),
}

/// A C type: class tag, qualifier/specifier bitmasks, and an optional
/// derivation. Invariant (spec.md §3): every constructed `CType` is either
/// basic (`Derivation::None`) or derives from exactly one type.
#[derive(Clone, Debug)]
pub struct CType {
    pub class: TypeClass,
    pub qualifiers: Qualifiers,
    pub is_inline: bool,
    pub derivation: Derivation,
}

impl CType {
    pub fn basic(class: TypeClass) -> Self {
        CType { class, qualifiers: Qualifiers::NONE, is_inline: false, derivation: Derivation::None }
    }

    pub fn void() -> Self {
        Self::basic(TypeClass::Void)
    }

    pub fn int() -> Self {
        Self::basic(TypeClass::Int)
    }

    pub fn error() -> Self {
        Self::basic(TypeClass::Error)
    }

    pub fn pointer_to(pointee: CType) -> Self {
        CType {
            class: TypeClass::Pointer,
            qualifiers: Qualifiers::NONE,
            is_inline: false,
            derivation: Derivation::Pointer { pointee: Box::new(pointee) },
        }
    }

    pub fn array_of(element: CType, len: Option<u64>) -> Self {
        CType {
            class: TypeClass::Array,
            qualifiers: Qualifiers::NONE,
            is_inline: false,
            derivation: Derivation::Array { element: Box::new(element), len },
        }
    }

    pub fn qualified(mut self, q: Qualifiers) -> Self {
        self.qualifiers = self.qualifiers.union(q);
        self
    }

    pub fn pointee(&self) -> Option<&CType> {
        match &self.derivation {
            Derivation::Pointer { pointee } => Some(pointee),
            _ => None,
        }
    }

    pub fn array_element(&self) -> Option<&CType> {
        match &self.derivation {
            Derivation::Array { element, .. } => Some(element),
            _ => None,
        }
    }

    pub fn array_len(&self) -> Option<u64> {
        match &self.derivation {
            Derivation::Array { len, .. } => *len,
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&FunctionType> {
        match &self.derivation {
            Derivation::Function(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&RecordType> {
        match &self.derivation {
            Derivation::Record(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_enum(&self) -> Option<&EnumType> {
        match &self.derivation {
            Derivation::Enum(e) => Some(e),
            _ => None,
        }
    }

    // -- predicates (spec.md §1 "predicates (integer/arithmetic/scalar/
    //    object/complete/compatible)") --

    pub fn is_integer(&self) -> bool {
        use TypeClass::*;
        matches!(
            self.class,
            Bool | Char
                | SignedChar
                | ShortInt
                | Int
                | LongInt
                | LongLongInt
                | UnsignedChar
                | UnsignedShortInt
                | UnsignedInt
                | UnsignedLongInt
                | UnsignedLongLongInt
                | Enumerated
        )
    }

    pub fn is_floating(&self) -> bool {
        use TypeClass::*;
        matches!(
            self.class,
            Float | Double
                | LongDouble
                | FloatComplex
                | DoubleComplex
                | LongDoubleComplex
                | FloatImaginary
                | DoubleImaginary
                | LongDoubleImaginary
        )
    }

    pub fn is_real_floating(&self) -> bool {
        matches!(self.class, TypeClass::Float | TypeClass::Double | TypeClass::LongDouble)
    }

    pub fn is_arithmetic(&self) -> bool {
        self.is_integer() || self.is_floating()
    }

    pub fn is_scalar(&self) -> bool {
        self.is_arithmetic() || self.class == TypeClass::Pointer
    }

    pub fn is_pointer(&self) -> bool {
        self.class == TypeClass::Pointer
    }

    pub fn is_void(&self) -> bool {
        self.class == TypeClass::Void
    }

    pub fn is_function(&self) -> bool {
        self.class == TypeClass::Function
    }

    pub fn is_array(&self) -> bool {
        self.class == TypeClass::Array
    }

    pub fn is_record(&self) -> bool {
        matches!(self.class, TypeClass::Structure | TypeClass::Union)
    }

    pub fn is_unsigned(&self) -> bool {
        use TypeClass::*;
        matches!(
            self.class,
            Bool | UnsignedChar | UnsignedShortInt | UnsignedInt | UnsignedLongInt | UnsignedLongLongInt
        )
    }

    /// An object type is a complete type that is not a function type
    /// (spec.md §1 predicate list).
    pub fn is_object(&self) -> bool {
        !self.is_function() && self.class != TypeClass::Error
    }

    /// A type is complete unless it is an incomplete array (no length),
    /// `void`, or a forward-declared (fieldless and not a reference to
    /// another) structure/union (C99 6.2.5p19-28).
    pub fn is_complete(&self) -> bool {
        match &self.derivation {
            Derivation::Array { len, .. } => len.is_some(),
            Derivation::Record(r) => !r.is_incomplete,
            _ => self.class != TypeClass::Void,
        }
    }

    /// Integer conversion rank used by the usual arithmetic conversions
    /// (C99 6.3.1.1). Higher rank wins ties broken by signedness in
    /// `convert::usual_arithmetic_conversions`.
    pub fn integer_rank(&self) -> u8 {
        use TypeClass::*;
        match self.class {
            Bool => 0,
            Char | SignedChar | UnsignedChar => 1,
            ShortInt | UnsignedShortInt => 2,
            Int | UnsignedInt | Enumerated => 3,
            LongInt | UnsignedLongInt => 4,
            LongLongInt | UnsignedLongLongInt => 5,
            _ => 0,
        }
    }
}

/// Shallow equality: class, qualifiers, and inline-ness. Deliberately
/// ignores `derivation`'s structure — AIR operand comparisons (the only
/// callers) only need to distinguish result types by class, and a full
/// recursive comparison would force `Derivation`'s record/function/enum
/// payloads to implement `PartialEq` too.
impl PartialEq for CType {
    fn eq(&self, other: &Self) -> bool {
        self.class == other.class && self.qualifiers == other.qualifiers && self.is_inline == other.is_inline
    }
}

impl fmt::Display for CType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.derivation {
            Derivation::Pointer { pointee } => write!(f, "{pointee}*"),
            Derivation::Array { element, len: Some(n) } => write!(f, "{element}[{n}]"),
            Derivation::Array { element, len: None } => write!(f, "{element}[]"),
            Derivation::Function(ft) => write!(f, "{}(...)->{}", "fn", ft.return_type),
            Derivation::Record(r) => write!(f, "{:?} {}", r.kind, r.tag.as_deref().unwrap_or("<anon>")),
            Derivation::Enum(e) => write!(f, "enum {}", e.tag.as_deref().unwrap_or("<anon>")),
            Derivation::None => write!(f, "{:?}", self.class),
        }
    }
}

/// Type compatibility, C99 6.2.7: reflexive and symmetric, recursive over
/// derivations (spec.md §3).
pub fn is_compatible(a: &CType, b: &CType) -> bool {
    if a.class != b.class {
        return false;
    }
    if a.qualifiers != b.qualifiers {
        return false;
    }
    match (&a.derivation, &b.derivation) {
        (Derivation::None, Derivation::None) => true,
        (Derivation::Pointer { pointee: pa }, Derivation::Pointer { pointee: pb }) => is_compatible(pa, pb),
        (Derivation::Array { element: ea, len: la }, Derivation::Array { element: eb, len: lb }) => {
            is_compatible(ea, eb) && (la.is_none() || lb.is_none() || la == lb)
        }
        (Derivation::Function(fa), Derivation::Function(fb)) => function::is_compatible(fa, fb),
        (Derivation::Record(ra), Derivation::Record(rb)) => record::is_compatible(ra, rb),
        (Derivation::Enum(ea), Derivation::Enum(eb)) => ea.tag == eb.tag,
        _ => false,
    }
}

/// The composite type of two compatible types (C99 6.2.7p3): refines
/// unspecified sub-parts, e.g. picks the specified length when composing
/// an unspecified-size array with a sized one (spec.md §4.2).
pub fn composite(a: &CType, b: &CType) -> CType {
    debug_assert!(is_compatible(a, b), "composite() requires compatible operands");
    match (&a.derivation, &b.derivation) {
        (Derivation::Array { element: ea, len: la }, Derivation::Array { element: eb, len: lb }) => {
            let element = composite(ea, eb);
            let len = la.or(*lb);
            CType::array_of(element, len)
        }
        (Derivation::Pointer { pointee: pa }, Derivation::Pointer { pointee: pb }) => {
            CType::pointer_to(composite(pa, pb)).qualified(a.qualifiers)
        }
        _ => a.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn composite_prefers_specified_array_length() {
        let unspecified = CType::array_of(CType::int(), None);
        let specified = CType::array_of(CType::int(), Some(5));
        let c = composite(&unspecified, &specified);
        assert_eq!(c.array_len(), Some(5));
    }

    #[test]
    fn compatibility_is_symmetric_and_reflexive() {
        let p1 = CType::pointer_to(CType::int());
        let p2 = CType::pointer_to(CType::int());
        assert!(is_compatible(&p1, &p1));
        assert!(is_compatible(&p1, &p2));
        assert!(is_compatible(&p2, &p1));
    }

    #[test]
    fn integer_rank_orders_by_width_not_signedness() {
        assert!(CType::basic(TypeClass::LongInt).integer_rank() > CType::basic(TypeClass::Int).integer_rank());
        assert_eq!(
            CType::basic(TypeClass::Int).integer_rank(),
            CType::basic(TypeClass::UnsignedInt).integer_rank()
        );
    }
}
