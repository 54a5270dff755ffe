//! Integer promotions, usual arithmetic conversions, default argument
//! promotions, and array/function decay (spec.md §1, §4.2, §4.6).

use super::{CType, Qualifiers, TypeClass};

/// C99 6.3.1.1p2: any type whose integer rank is less than `int`'s
/// promotes to `int` (or `unsigned int` if `int` cannot represent all its
/// values — never the case for our rank-3-or-below types, which all fit in
/// `int`).
pub fn integer_promote(ty: &CType) -> CType {
    if !ty.is_integer() {
        return ty.clone();
    }
    if ty.integer_rank() < CType::basic(TypeClass::Int).integer_rank() {
        CType::basic(TypeClass::Int)
    } else {
        ty.clone()
    }
}

/// C99 6.5.2.2p6: variadic and unprototyped arguments undergo integer
/// promotions, and `float` promotes to `double` (spec.md §4.5: "variadic
/// positions receive default argument promotions").
pub fn default_argument_promote(ty: &CType) -> CType {
    if ty.class == TypeClass::Float {
        CType::basic(TypeClass::Double)
    } else if ty.is_integer() {
        integer_promote(ty)
    } else {
        ty.clone()
    }
}

/// C99 6.3.2.1p3: array-to-pointer decay, suppressed inside `sizeof`,
/// unary `&`, and string-literal initialization of a character array
/// (spec.md §4.2).
pub fn array_to_pointer_decay(ty: &CType) -> CType {
    match ty.array_element() {
        Some(elem) => CType::pointer_to(elem.clone()).qualified(ty.qualifiers),
        None => ty.clone(),
    }
}

/// C99 6.3.2.1p4: function-to-pointer decay.
pub fn function_to_pointer_decay(ty: &CType) -> CType {
    if ty.is_function() {
        CType::pointer_to(ty.clone())
    } else {
        ty.clone()
    }
}

/// The usual arithmetic conversions (C99 6.3.1.8), applied to a pair of
/// already-promoted arithmetic operands to find their common result type.
pub fn usual_arithmetic_conversions(a: &CType, b: &CType) -> CType {
    if a.is_real_floating() || b.is_real_floating() {
        return floating_rank_max(a, b);
    }
    let a = integer_promote(a);
    let b = integer_promote(b);
    if a.class == b.class {
        return a;
    }
    let ra = a.integer_rank();
    let rb = b.integer_rank();
    let (higher, higher_unsigned, lower, lower_unsigned) = if ra >= rb {
        (a.clone(), a.is_unsigned(), b.clone(), b.is_unsigned())
    } else {
        (b.clone(), b.is_unsigned(), a.clone(), a.is_unsigned())
    };
    if higher_unsigned == lower_unsigned {
        return higher;
    }
    if higher_unsigned {
        return higher;
    }
    // higher is signed, lower is unsigned with lower-or-equal rank: if the
    // signed type can represent every value of the unsigned one, convert
    // to the signed type; the only case in our supported rank set where it
    // cannot is same-rank signed/unsigned (already bypassed since
    // `ra != rb` was checked above via rank comparison producing a strict
    // `higher`), so converting to the unsigned counterpart of the higher
    // rank is correct here per C99 6.3.1.8p1 bullet 4.
    let _ = lower_unsigned;
    unsigned_counterpart(&higher)
}

fn floating_rank(ty: &CType) -> u8 {
    match ty.class {
        TypeClass::LongDouble => 3,
        TypeClass::Double => 2,
        TypeClass::Float => 1,
        _ => 0,
    }
}

fn floating_rank_max(a: &CType, b: &CType) -> CType {
    if floating_rank(a) >= floating_rank(b) && a.is_real_floating() {
        a.clone()
    } else if b.is_real_floating() {
        b.clone()
    } else {
        // one operand is floating, the other integer: result is the
        // floating operand's type (C99 6.3.1.8p1 bullet 1).
        if a.is_real_floating() {
            a.clone()
        } else {
            b.clone()
        }
    }
}

fn unsigned_counterpart(ty: &CType) -> CType {
    use TypeClass::*;
    let class = match ty.class {
        Int => UnsignedInt,
        LongInt => UnsignedLongInt,
        LongLongInt => UnsignedLongLongInt,
        Char => UnsignedChar,
        ShortInt => UnsignedShortInt,
        other => other,
    };
    CType::basic(class)
}

/// Composite pointer type for a conditional expression with two pointer
/// operands of differing qualification (spec.md §4.2): pointer to the
/// qualified composite pointee.
pub fn composite_pointer_type(a: &CType, b: &CType) -> Option<CType> {
    let pa = a.pointee()?;
    let pb = b.pointee()?;
    let merged_quals = pa.qualifiers.union(pb.qualifiers);
    let pointee = super::composite(pa, pb).qualified(merged_quals);
    Some(CType::pointer_to(pointee))
}

/// The result type of `cond ? a : b` for arithmetic/pointer/void operands
/// (spec.md §4.2).
pub fn conditional_result_type(a: &CType, b: &CType) -> CType {
    if a.is_arithmetic() && b.is_arithmetic() {
        return usual_arithmetic_conversions(a, b);
    }
    if a.is_void() || b.is_void() {
        return CType::void();
    }
    if a.is_pointer() && b.is_pointer() {
        if let Some(p) = composite_pointer_type(a, b) {
            return p;
        }
    }
    a.clone()
}

/// Top-level qualifiers dropped on a function parameter of array type
/// after decay keep the element's qualifiers, not the array's own
/// (spec.md §4.2 decay rules).
pub fn decay_for_parameter(ty: &CType) -> CType {
    if ty.is_array() {
        array_to_pointer_decay(ty)
    } else if ty.is_function() {
        function_to_pointer_decay(ty)
    } else {
        ty.clone()
    }
    .qualified(Qualifiers::NONE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn char_promotes_to_int() {
        let promoted = integer_promote(&CType::basic(TypeClass::Char));
        assert_eq!(promoted.class, TypeClass::Int);
    }

    #[test]
    fn int_does_not_promote_further() {
        let promoted = integer_promote(&CType::int());
        assert_eq!(promoted.class, TypeClass::Int);
    }

    #[test]
    fn uac_prefers_floating_over_integer() {
        let r = usual_arithmetic_conversions(&CType::int(), &CType::basic(TypeClass::Double));
        assert_eq!(r.class, TypeClass::Double);
    }

    #[test]
    fn uac_same_rank_signed_unsigned_yields_unsigned() {
        let r = usual_arithmetic_conversions(&CType::int(), &CType::basic(TypeClass::UnsignedInt));
        assert_eq!(r.class, TypeClass::UnsignedInt);
    }

    #[test]
    fn float_default_promotes_to_double_for_varargs() {
        let r = default_argument_promote(&CType::basic(TypeClass::Float));
        assert_eq!(r.class, TypeClass::Double);
    }
}
