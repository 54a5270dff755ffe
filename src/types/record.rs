//! Structure/union types (spec.md §3: "Structure/union carry ordered
//! member names, member types, bit-field widths; the type also stores its
//! tag name").

use super::CType;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecordKind {
    Struct,
    Union,
}

#[derive(Clone, Debug)]
pub struct RecordMember {
    pub name: Option<String>,
    pub ty: CType,
    /// `Some(width)` for a bit-field member (spec.md §4.3: "bit-field
    /// width exceeding the underlying type" is a constraint violation).
    pub bitfield_width: Option<u32>,
}

#[derive(Clone, Debug)]
pub struct RecordType {
    pub kind: RecordKind,
    pub tag: Option<String>,
    pub members: Vec<RecordMember>,
    /// A tag declared without a body (`struct foo;`) is incomplete until a
    /// matching body is parsed in the same or an enclosing scope.
    pub is_incomplete: bool,
}

impl RecordType {
    pub fn new(kind: RecordKind, tag: Option<String>) -> Self {
        RecordType { kind, tag, members: Vec::new(), is_incomplete: true }
    }

    pub fn member(&self, name: &str) -> Option<(usize, &RecordMember)> {
        self.members.iter().enumerate().find(|(_, m)| m.name.as_deref() == Some(name))
    }

    /// A flexible array member: the last member of a struct with more than
    /// one member, itself an incomplete array (C99 6.7.2.1p16). Its offset
    /// equals the struct's size (spec.md §8 Boundaries).
    pub fn flexible_array_member(&self) -> Option<&RecordMember> {
        if self.kind != RecordKind::Struct || self.members.len() < 2 {
            return None;
        }
        let last = self.members.last()?;
        if last.ty.is_array() && last.ty.array_len().is_none() {
            Some(last)
        } else {
            None
        }
    }
}

pub fn is_compatible(a: &RecordType, b: &RecordType) -> bool {
    if a.kind != b.kind {
        return false;
    }
    // Two structure/union types declared in separate translation units are
    // compatible if they have the same tag, size, and member sequence
    // (C99 6.2.7p1); within one translation unit, tag identity suffices.
    match (&a.tag, &b.tag) {
        (Some(ta), Some(tb)) => ta == tb,
        _ => {
            a.members.len() == b.members.len()
                && a.members.iter().zip(b.members.iter()).all(|(ma, mb)| {
                    ma.name == mb.name
                        && ma.bitfield_width == mb.bitfield_width
                        && super::is_compatible(&ma.ty, &mb.ty)
                })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TypeClass;

    #[test]
    fn flexible_array_member_detection() {
        let mut r = RecordType::new(RecordKind::Struct, Some("buf".into()));
        r.members.push(RecordMember {
            name: Some("len".into()),
            ty: CType::basic(TypeClass::Int),
            bitfield_width: None,
        });
        r.members.push(RecordMember {
            name: Some("data".into()),
            ty: CType::array_of(CType::basic(TypeClass::Char), None),
            bitfield_width: None,
        });
        assert!(r.flexible_array_member().is_some());
    }
}
