//! Namespace disambiguation (spec.md §3 "Namespace"): {label, tag-struct,
//! tag-union, tag-enum, member-of-struct S, member-of-union U, ordinary}.

/// Member namespaces carry the containing aggregate's tag so that two
/// members named `x` in different structures are distinct symbols
/// (spec.md §3).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Namespace {
    Label,
    TagStruct,
    TagUnion,
    TagEnum,
    MemberOfStruct(String),
    MemberOfUnion(String),
    Ordinary,
}

impl Namespace {
    pub fn is_tag(&self) -> bool {
        matches!(self, Namespace::TagStruct | Namespace::TagUnion | Namespace::TagEnum)
    }

    pub fn is_member(&self) -> bool {
        matches!(self, Namespace::MemberOfStruct(_) | Namespace::MemberOfUnion(_))
    }
}
