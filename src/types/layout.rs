//! Size/alignment computation (spec.md §1: "size/alignment computation").
//!
//! Grounded on the teacher's `til::size_calculator::TILTypeSizeSolver`: a
//! small stateful solver rather than a free function, because structure
//! members can refer back to their own tag through a pointer (never by
//! value, since that would make the type infinite — but a solver still
//! needs a recursion guard to avoid re-walking shared substructure) and
//! because repeated queries for the same type should be cheap.

use std::collections::HashMap;

use super::{CType, Derivation, RecordKind, TypeClass};

#[derive(Clone, Copy, Debug)]
pub struct Layout {
    pub size: u64,
    pub align: u64,
}

impl Layout {
    pub fn scalar(size: u64) -> Self {
        Layout { size, align: size }
    }
}

fn basic_layout(class: TypeClass) -> Option<Layout> {
    use TypeClass::*;
    Some(match class {
        Bool | Char | SignedChar | UnsignedChar => Layout::scalar(1),
        ShortInt | UnsignedShortInt => Layout::scalar(2),
        Int | UnsignedInt | Float | Enumerated => Layout::scalar(4),
        LongInt | UnsignedLongInt | LongLongInt | UnsignedLongLongInt | Double | Pointer => {
            Layout::scalar(8)
        }
        LongDouble => Layout { size: 16, align: 16 },
        _ => return None,
    })
}

/// Rounds `offset` up to the next multiple of `align` (`align` a power of
/// two), the same rounding the reference applies when placing each
/// structure member and when sizing the whole aggregate to a multiple of
/// its alignment (C99 6.7.2.1p13).
pub fn align_up(offset: u64, align: u64) -> u64 {
    debug_assert!(align.is_power_of_two());
    (offset + align - 1) & !(align - 1)
}

/// Caches solved record layouts keyed by tag name, exactly like
/// `TILTypeSizeSolver::solved`'s stable-index keying — not by the
/// `RecordType` value's address, which isn't a stable identity once a
/// caller holds its record in a short-lived clone (as `Derivation::Record`
/// does). Tag-based keying matches `record::is_compatible`'s own notion of
/// record identity within one translation unit (same tag, same type); an
/// anonymous record (no tag) has no such identity, so its layout is never
/// cached and gets recomputed on every query.
pub struct TypeSizeSolver {
    solved: HashMap<String, Layout>,
}

impl Default for TypeSizeSolver {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeSizeSolver {
    pub fn new() -> Self {
        TypeSizeSolver { solved: HashMap::new() }
    }

    pub fn layout_of(&mut self, ty: &CType) -> Layout {
        match &ty.derivation {
            Derivation::Pointer { .. } | Derivation::None => {
                basic_layout(ty.class).unwrap_or(Layout::scalar(4))
            }
            Derivation::Array { element, len } => {
                let inner = self.layout_of(element);
                let n = len.unwrap_or(0);
                Layout { size: inner.size * n, align: inner.align }
            }
            Derivation::Function(_) => Layout { size: 0, align: 1 },
            Derivation::Enum(_) => Layout::scalar(4),
            Derivation::Record(r) => match &r.tag {
                Some(tag) => {
                    if let Some(l) = self.solved.get(tag) {
                        return *l;
                    }
                    let l = self.record_layout(r);
                    self.solved.insert(tag.clone(), l);
                    l
                }
                None => self.record_layout(r),
            },
        }
    }

    fn record_layout(&mut self, r: &super::RecordType) -> Layout {
        match r.kind {
            RecordKind::Struct => self.struct_layout(r),
            RecordKind::Union => self.union_layout(r),
        }
    }

    fn struct_layout(&mut self, r: &super::RecordType) -> Layout {
        let mut offset = 0u64;
        let mut max_align = 1u64;
        let mut bitfield_unit_bits: u32 = 0;
        for (i, member) in r.members.iter().enumerate() {
            let is_flexible_array =
                i + 1 == r.members.len() && r.members.len() > 1 && member.ty.is_array() && member.ty.array_len().is_none();
            if is_flexible_array {
                // A flexible array member contributes no size of its own;
                // its offset equals the struct's size so far (spec.md §8
                // Boundaries).
                bitfield_unit_bits = 0;
                continue;
            }
            let layout = self.layout_of(&member.ty);
            max_align = max_align.max(layout.align);
            if let Some(width) = member.bitfield_width {
                let unit_bits = (layout.size * 8) as u32;
                if bitfield_unit_bits == 0 || bitfield_unit_bits + width > unit_bits {
                    offset = align_up(offset, layout.align);
                    offset += layout.size;
                    bitfield_unit_bits = width;
                } else {
                    bitfield_unit_bits += width;
                }
                continue;
            }
            bitfield_unit_bits = 0;
            offset = align_up(offset, layout.align);
            offset += layout.size;
        }
        let size = align_up(offset, max_align);
        Layout { size, align: max_align }
    }

    /// Byte offset of `r.members[index]` within an instance of `r` (always
    /// 0 for a union member). A bit-field member's offset is its shared
    /// storage unit's start, not a bit position — the AIR builder lowers
    /// bit-field member access through that unit plus a shift/mask rather
    /// than a sub-byte address.
    pub fn member_offset(&mut self, r: &super::RecordType, index: usize) -> u64 {
        if r.kind == RecordKind::Union {
            return 0;
        }
        let mut offset = 0u64;
        let mut bitfield_unit_bits: u32 = 0;
        let mut unit_start = 0u64;
        for (i, member) in r.members.iter().enumerate() {
            let is_flexible_array = i + 1 == r.members.len()
                && r.members.len() > 1
                && member.ty.is_array()
                && member.ty.array_len().is_none();
            if is_flexible_array {
                return offset;
            }
            let layout = self.layout_of(&member.ty);
            if let Some(width) = member.bitfield_width {
                let unit_bits = (layout.size * 8) as u32;
                if bitfield_unit_bits == 0 || bitfield_unit_bits + width > unit_bits {
                    offset = align_up(offset, layout.align);
                    unit_start = offset;
                    offset += layout.size;
                    bitfield_unit_bits = width;
                } else {
                    bitfield_unit_bits += width;
                }
                if i == index {
                    return unit_start;
                }
                continue;
            }
            bitfield_unit_bits = 0;
            offset = align_up(offset, layout.align);
            if i == index {
                return offset;
            }
            offset += layout.size;
        }
        offset
    }

    fn union_layout(&mut self, r: &super::RecordType) -> Layout {
        let mut size = 0u64;
        let mut align = 1u64;
        for member in &r.members {
            let layout = self.layout_of(&member.ty);
            size = size.max(layout.size);
            align = align.max(layout.align);
        }
        Layout { size: align_up(size, align), align }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{RecordMember, RecordType};

    #[test]
    fn align_up_rounds_to_power_of_two() {
        assert_eq!(align_up(5, 8), 8);
        assert_eq!(align_up(8, 8), 8);
        assert_eq!(align_up(9, 4), 12);
    }

    #[test]
    fn flexible_array_member_does_not_grow_struct_size() {
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
        let mut solver = TypeSizeSolver::new();
        let layout = solver.struct_layout(&r);
        assert_eq!(layout.size, 4);
    }

    #[test]
    fn two_tagged_structs_solved_through_short_lived_clones_keep_distinct_layouts() {
        // mirrors the AIR builder's pattern of cloning a symbol's `CType`
        // out of the symbol table into a short-lived local before calling
        // `layout_of` on it; the solver must not let the second clone's
        // lookup land on the first clone's cached layout just because they
        // were allocated to the same stack address in sequence.
        let mut small = RecordType::new(RecordKind::Struct, Some("small".into()));
        small.members.push(RecordMember { name: Some("a".into()), ty: CType::basic(TypeClass::Char), bitfield_width: None });

        let mut large = RecordType::new(RecordKind::Struct, Some("large".into()));
        large.members.push(RecordMember { name: Some("a".into()), ty: CType::basic(TypeClass::LongLongInt), bitfield_width: None });
        large.members.push(RecordMember { name: Some("b".into()), ty: CType::basic(TypeClass::LongLongInt), bitfield_width: None });

        let mut solver = TypeSizeSolver::new();

        {
            let ty = CType { derivation: Derivation::Record(small.clone()), ..CType::basic(TypeClass::Int) };
            let layout = solver.layout_of(&ty);
            assert_eq!(layout.size, 1);
        }
        {
            let ty = CType { derivation: Derivation::Record(large.clone()), ..CType::basic(TypeClass::Int) };
            let layout = solver.layout_of(&ty);
            assert_eq!(layout.size, 16);
        }
        // re-querying the first tag afterward must still see its own layout.
        {
            let ty = CType { derivation: Derivation::Record(small), ..CType::basic(TypeClass::Int) };
            let layout = solver.layout_of(&ty);
            assert_eq!(layout.size, 1);
        }
    }

    #[test]
    fn struct_packs_bitfields_into_shared_storage_unit() {
        let mut r = RecordType::new(RecordKind::Struct, None);
        for _ in 0..3 {
            r.members.push(RecordMember {
                name: None,
                ty: CType::basic(TypeClass::UnsignedInt),
                bitfield_width: Some(10),
            });
        }
        let mut solver = TypeSizeSolver::new();
        let layout = solver.struct_layout(&r);
        assert_eq!(layout.size, 4);
    }
}
