//! The token stream contract between this crate and its excluded
//! lexer/preprocessor collaborator (spec.md §6 "Input").
//!
//! Tokens are a consumed input: nothing in this module produces them from
//! raw source text. The shape here is the boundary contract, grounded on
//! the reference's `token_t`/`c_keyword_t`/`punctuator_type_t`
//! (`ecc.h`), translated to an owned, singly linked-via-`Vec` sequence
//! rather than the reference's intrusive linked list.

use crate::types::CType;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, num_enum::TryFromPrimitive)]
#[repr(u8)]
pub enum Keyword {
    Auto,
    Break,
    Case,
    Char,
    Const,
    Continue,
    Default,
    Do,
    Double,
    Else,
    Enum,
    Extern,
    Float,
    For,
    Goto,
    If,
    Inline,
    Int,
    Long,
    Register,
    Restrict,
    Return,
    Short,
    Signed,
    Sizeof,
    Static,
    Struct,
    Switch,
    Typedef,
    Union,
    Unsigned,
    Void,
    Volatile,
    While,
    Bool,
    Complex,
    Imaginary,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Punctuator {
    LeftBracket,
    RightBracket,
    LeftParen,
    RightParen,
    LeftBrace,
    RightBrace,
    Period,
    Arrow,
    Increment,
    Decrement,
    Amp,
    Star,
    Plus,
    Minus,
    Tilde,
    Bang,
    Slash,
    Percent,
    LeftShift,
    RightShift,
    Less,
    Greater,
    LessEqual,
    GreaterEqual,
    Equal,
    NotEqual,
    Caret,
    Pipe,
    LogicalAnd,
    LogicalOr,
    Question,
    Colon,
    Semicolon,
    Ellipsis,
    Assign,
    MulAssign,
    DivAssign,
    ModAssign,
    AddAssign,
    SubAssign,
    ShlAssign,
    ShrAssign,
    AndAssign,
    XorAssign,
    OrAssign,
    Comma,
}

/// Typed payload for an integer constant: the lexer's recognized suffixes
/// already resolved to a C type class (spec.md §8 boundary: unsuffixed
/// decimal literals beyond `int` range promote to `long int`, etc. — that
/// promotion is the parser/typing pass's job, not the lexer's; the lexer
/// only reports the literal value and any explicit suffix-derived type).
#[derive(Clone, Debug, PartialEq)]
pub struct IntegerConstant {
    pub value: u64,
    /// `None` when unsuffixed; the typing pass picks the narrowest type
    /// that represents `value` starting from `int`.
    pub suffix_type: Option<CType>,
    pub is_unsigned_suffix: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FloatingConstant {
    pub value: f64,
    pub ty: CType,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CharacterConstant {
    pub value: i64,
    pub is_wide: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct StringLiteral {
    pub bytes: Vec<u8>,
    pub is_wide: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub enum TokenKind {
    Keyword(Keyword),
    Identifier(String),
    Punctuator(Punctuator),
    Integer(IntegerConstant),
    Floating(FloatingConstant),
    Character(CharacterConstant),
    StringLit(StringLiteral),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub row: u32,
    pub col: u32,
}

impl Token {
    pub fn new(kind: TokenKind, row: u32, col: u32) -> Self {
        Token { kind, row, col }
    }

    pub fn as_identifier(&self) -> Option<&str> {
        match &self.kind {
            TokenKind::Identifier(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn is_keyword(&self, kw: Keyword) -> bool {
        matches!(&self.kind, TokenKind::Keyword(k) if *k == kw)
    }

    pub fn is_punctuator(&self, p: Punctuator) -> bool {
        matches!(&self.kind, TokenKind::Punctuator(pp) if *pp == p)
    }
}
