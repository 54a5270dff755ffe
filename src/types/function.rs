//! Function types (spec.md §3: "Function types carry parameter types
//! (null entry denotes ellipsis position) and a variadic flag").

use super::CType;

#[derive(Clone, Debug)]
pub struct FunctionType {
    pub return_type: Box<CType>,
    pub parameters: Vec<CType>,
    pub is_variadic: bool,
    /// `false` for an unprototyped (K&R) declarator; affects call-site
    /// argument coercion (spec.md §4.5: "If the callee type is a
    /// prototype, each argument is coerced ... otherwise default
    /// promotions").
    pub is_prototyped: bool,
}

impl FunctionType {
    pub fn new(return_type: CType) -> Self {
        FunctionType {
            return_type: Box::new(return_type),
            parameters: Vec::new(),
            is_variadic: false,
            is_prototyped: true,
        }
    }
}

pub fn is_compatible(a: &FunctionType, b: &FunctionType) -> bool {
    if !super::is_compatible(&a.return_type, &b.return_type) {
        return false;
    }
    if a.is_variadic != b.is_variadic {
        return false;
    }
    if !a.is_prototyped || !b.is_prototyped {
        // An unprototyped declarator is compatible with any parameter list
        // of the same arity-agnostic shape (C99 6.7.5.3p15); the
        // constraint pass is conservative and accepts these pairwise.
        return true;
    }
    if a.parameters.len() != b.parameters.len() {
        return false;
    }
    a.parameters.iter().zip(b.parameters.iter()).all(|(pa, pb)| super::is_compatible(pa, pb))
}
