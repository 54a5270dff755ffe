//! Token cursor with the parser's three request modes (spec.md §4.1):
//! **check** (peek-only), **optional** (advance on match, leave position
//! untouched on miss), **expected** (advance on match, record a diagnostic
//! with the production's depth on miss).
//!
//! Grounded on the teacher's `IdaGenericBufUnpack` combinators
//! (`ida_reader.rs`), which layer the same three shapes over a byte
//! cursor: a plain `Read` for positions that must succeed, an
//! `Option`-returning peek for positions that may or may not be present,
//! and `Context`-wrapped reads for positions whose absence is a real
//! parse failure.

use crate::diag::DiagnosticBag;
use crate::token::{Keyword, Punctuator, Token, TokenKind};

pub struct TokenCursor<'a> {
    tokens: &'a [Token],
    pos: usize,
    /// Current recursion depth into nested grammar productions, stamped
    /// onto every `expected`-mode diagnostic so the deepest failure can be
    /// picked out afterward (spec.md §4.1).
    pub depth: u32,
}

impl<'a> TokenCursor<'a> {
    pub fn new(tokens: &'a [Token]) -> Self {
        TokenCursor { tokens, pos: 0, depth: 0 }
    }

    pub fn enter(&mut self) -> DepthGuard<'_, 'a> {
        self.depth += 1;
        DepthGuard { cursor: self }
    }

    pub fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    pub fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset)
    }

    pub fn position(&self) -> u32 {
        self.peek().map(|t| t.row).unwrap_or(0)
    }

    pub fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn advance(&mut self) -> &Token {
        let t = &self.tokens[self.pos];
        self.pos += 1;
        t
    }

    // -- check: peek-only --

    pub fn check_keyword(&self, kw: Keyword) -> bool {
        self.peek().is_some_and(|t| t.is_keyword(kw))
    }

    pub fn check_punct(&self, p: Punctuator) -> bool {
        self.peek().is_some_and(|t| t.is_punctuator(p))
    }

    pub fn check_identifier(&self) -> bool {
        matches!(self.peek().map(|t| &t.kind), Some(TokenKind::Identifier(_)))
    }

    // -- optional: advance on match, untouched on miss --

    pub fn optional_keyword(&mut self, kw: Keyword) -> bool {
        if self.check_keyword(kw) {
            self.advance();
            true
        } else {
            false
        }
    }

    pub fn optional_punct(&mut self, p: Punctuator) -> bool {
        if self.check_punct(p) {
            self.advance();
            true
        } else {
            false
        }
    }

    pub fn optional_identifier(&mut self) -> Option<String> {
        if let Some(Token { kind: TokenKind::Identifier(name), .. }) = self.peek() {
            let name = name.clone();
            self.advance();
            Some(name)
        } else {
            None
        }
    }

    // -- expected: advance on match, diagnostic on miss --

    pub fn expected_punct(&mut self, p: Punctuator, diags: &mut DiagnosticBag) -> bool {
        if self.optional_punct(p) {
            true
        } else {
            let (row, col) = self.peek().map(|t| (t.row, t.col)).unwrap_or((0, 0));
            diags.push(
                crate::diag::Diagnostic::error(row, col, format!("expected {p:?}"))
                    .with_depth(self.depth),
            );
            false
        }
    }

    pub fn expected_identifier(&mut self, diags: &mut DiagnosticBag) -> Option<String> {
        if let Some(name) = self.optional_identifier() {
            Some(name)
        } else {
            let (row, col) = self.peek().map(|t| (t.row, t.col)).unwrap_or((0, 0));
            diags.push(
                crate::diag::Diagnostic::error(row, col, "expected identifier").with_depth(self.depth),
            );
            None
        }
    }

    pub fn advance_any(&mut self) -> Option<&Token> {
        if self.at_end() {
            None
        } else {
            Some(self.advance())
        }
    }
}

/// RAII depth tracker: every grammar production wraps its body in
/// `let _g = cursor.enter();` so depth decrements automatically regardless
/// of which branch returns first.
pub struct DepthGuard<'c, 'a> {
    cursor: &'c mut TokenCursor<'a>,
}

impl<'c, 'a> std::ops::Deref for DepthGuard<'c, 'a> {
    type Target = TokenCursor<'a>;
    fn deref(&self) -> &Self::Target {
        self.cursor
    }
}

impl<'c, 'a> std::ops::DerefMut for DepthGuard<'c, 'a> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.cursor
    }
}

impl<'c, 'a> Drop for DepthGuard<'c, 'a> {
    fn drop(&mut self) {
        self.cursor.depth -= 1;
    }
}
