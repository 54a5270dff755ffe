//! Expression grammar (C99 6.5), recursive descent with each C grammar
//! level as its own method — the usual shape a hand-written C parser
//! takes, mirrored here instead of a generic precedence-climbing loop so
//! each method reads as the grammar production it implements.

use crate::ast::{BinOp, DeclKind, ExprKind, IncDecOp, NodeId, NodeKind, UnaryOp};
use crate::token::{Punctuator as P, TokenKind};

use super::Parser;

impl<'a> Parser<'a> {
    fn alloc_expr(&mut self, kind: ExprKind, row: u32, col: u32) -> NodeId {
        self.ast.alloc(NodeKind::Expr(kind), row, col)
    }

    /// `expression`: a possibly comma-separated sequence; each comma is a
    /// sequence point (spec.md §3 AIR opcode `sequence-point`).
    pub(crate) fn parse_expression(&mut self) -> NodeId {
        let _g = self.cursor.enter();
        let first = self.parse_assignment_expression();
        if !self.cursor.check_punct(P::Comma) {
            return first;
        }
        let row = self.cursor.position();
        let mut operands = vec![first];
        while self.cursor.optional_punct(P::Comma) {
            operands.push(self.parse_assignment_expression());
        }
        let node = self.alloc_expr(ExprKind::Comma { operands: operands.clone() }, row, 1);
        self.link(node, &operands);
        node
    }

    pub(crate) fn parse_assignment_expression(&mut self) -> NodeId {
        let _g = self.cursor.enter();
        let lhs = self.parse_conditional_expression();
        let compound_op = self.cursor.peek().and_then(|t| match &t.kind {
            TokenKind::Punctuator(P::Assign) => Some(None),
            TokenKind::Punctuator(P::MulAssign) => Some(Some(BinOp::Multiply)),
            TokenKind::Punctuator(P::DivAssign) => Some(Some(BinOp::Divide)),
            TokenKind::Punctuator(P::ModAssign) => Some(Some(BinOp::Modulo)),
            TokenKind::Punctuator(P::AddAssign) => Some(Some(BinOp::Add)),
            TokenKind::Punctuator(P::SubAssign) => Some(Some(BinOp::Subtract)),
            TokenKind::Punctuator(P::ShlAssign) => Some(Some(BinOp::ShiftLeft)),
            TokenKind::Punctuator(P::ShrAssign) => Some(Some(BinOp::ShiftRight)),
            TokenKind::Punctuator(P::AndAssign) => Some(Some(BinOp::BitwiseAnd)),
            TokenKind::Punctuator(P::XorAssign) => Some(Some(BinOp::BitwiseXor)),
            TokenKind::Punctuator(P::OrAssign) => Some(Some(BinOp::BitwiseOr)),
            _ => None,
        });
        let Some(op) = compound_op else { return lhs };
        let row = self.cursor.position();
        self.cursor.advance_any();
        let rhs = self.parse_assignment_expression();
        let node = self.alloc_expr(ExprKind::Assignment { target: lhs, value: rhs, compound_op: op }, row, 1);
        self.link(node, &[lhs, rhs]);
        node
    }

    pub(crate) fn parse_conditional_expression(&mut self) -> NodeId {
        let _g = self.cursor.enter();
        let cond = self.parse_logical_or_expression();
        if !self.cursor.optional_punct(P::Question) {
            return cond;
        }
        let row = self.cursor.position();
        let then_expr = self.parse_expression();
        self.cursor.expected_punct(P::Colon, &mut self.diags);
        let else_expr = self.parse_conditional_expression();
        let node = self.alloc_expr(ExprKind::Conditional { cond, then_expr, else_expr }, row, 1);
        self.link(node, &[cond, then_expr, else_expr]);
        node
    }

    fn binary_level(
        &mut self,
        next: fn(&mut Self) -> NodeId,
        ops: &[(P, BinOp)],
    ) -> NodeId {
        let mut lhs = next(self);
        loop {
            let matched = ops.iter().find(|(p, _)| self.cursor.check_punct(*p));
            let Some((_, op)) = matched else { break };
            let op = *op;
            let row = self.cursor.position();
            self.cursor.advance_any();
            let rhs = next(self);
            let node = self.alloc_expr(ExprKind::Binary { op, lhs, rhs }, row, 1);
            self.link(node, &[lhs, rhs]);
            lhs = node;
        }
        lhs
    }

    fn parse_logical_or_expression(&mut self) -> NodeId {
        self.binary_level(Self::parse_logical_and_expression, &[(P::LogicalOr, BinOp::LogicalOr)])
    }

    fn parse_logical_and_expression(&mut self) -> NodeId {
        self.binary_level(Self::parse_bitwise_or_expression, &[(P::LogicalAnd, BinOp::LogicalAnd)])
    }

    fn parse_bitwise_or_expression(&mut self) -> NodeId {
        self.binary_level(Self::parse_bitwise_xor_expression, &[(P::Pipe, BinOp::BitwiseOr)])
    }

    fn parse_bitwise_xor_expression(&mut self) -> NodeId {
        self.binary_level(Self::parse_bitwise_and_expression, &[(P::Caret, BinOp::BitwiseXor)])
    }

    fn parse_bitwise_and_expression(&mut self) -> NodeId {
        self.binary_level(Self::parse_equality_expression, &[(P::Amp, BinOp::BitwiseAnd)])
    }

    fn parse_equality_expression(&mut self) -> NodeId {
        self.binary_level(
            Self::parse_relational_expression,
            &[(P::Equal, BinOp::Equal), (P::NotEqual, BinOp::NotEqual)],
        )
    }

    fn parse_relational_expression(&mut self) -> NodeId {
        self.binary_level(
            Self::parse_shift_expression,
            &[
                (P::Less, BinOp::Less),
                (P::Greater, BinOp::Greater),
                (P::LessEqual, BinOp::LessEqual),
                (P::GreaterEqual, BinOp::GreaterEqual),
            ],
        )
    }

    fn parse_shift_expression(&mut self) -> NodeId {
        self.binary_level(
            Self::parse_additive_expression,
            &[(P::LeftShift, BinOp::ShiftLeft), (P::RightShift, BinOp::ShiftRight)],
        )
    }

    fn parse_additive_expression(&mut self) -> NodeId {
        self.binary_level(
            Self::parse_multiplicative_expression,
            &[(P::Plus, BinOp::Add), (P::Minus, BinOp::Subtract)],
        )
    }

    fn parse_multiplicative_expression(&mut self) -> NodeId {
        self.binary_level(
            Self::parse_cast_expression,
            &[(P::Star, BinOp::Multiply), (P::Slash, BinOp::Divide), (P::Percent, BinOp::Modulo)],
        )
    }

    /// `( type-name ) cast-expression`, disambiguated from a parenthesized
    /// expression by whether the parenthesized content starts a
    /// type-specifier (spec.md §4.1: typedef-name lookahead participates
    /// in the grammar).
    fn parse_cast_expression(&mut self) -> NodeId {
        let _g = self.cursor.enter();
        if self.cursor.check_punct(P::LeftParen) && self.starts_type_name_at(1) {
            let row = self.cursor.position();
            self.cursor.advance_any();
            let type_name = self.parse_type_name();
            self.cursor.expected_punct(P::RightParen, &mut self.diags);
            if self.cursor.check_punct(P::LeftBrace) {
                // compound literal, not a cast
                let init = self.parse_braced_initializer_list();
                let node = self.alloc_expr(ExprKind::CompoundLiteral { type_name, initializer_list: init }, row, 1);
                self.link(node, &[type_name, init]);
                return self.parse_postfix_tail(node);
            }
            let operand = self.parse_cast_expression();
            let node = self.alloc_expr(ExprKind::Cast { type_name, operand }, row, 1);
            self.link(node, &[type_name, operand]);
            return node;
        }
        self.parse_unary_expression()
    }

    fn parse_unary_expression(&mut self) -> NodeId {
        let _g = self.cursor.enter();
        let row = self.cursor.position();
        if self.cursor.optional_punct(P::Increment) {
            let operand = self.parse_unary_expression();
            let node = self.alloc_expr(ExprKind::PrefixIncDec { op: IncDecOp::Increment, operand }, row, 1);
            self.link(node, &[operand]);
            return node;
        }
        if self.cursor.optional_punct(P::Decrement) {
            let operand = self.parse_unary_expression();
            let node = self.alloc_expr(ExprKind::PrefixIncDec { op: IncDecOp::Decrement, operand }, row, 1);
            self.link(node, &[operand]);
            return node;
        }
        let unary_op = self.cursor.peek().and_then(|t| match &t.kind {
            TokenKind::Punctuator(P::Amp) => Some(UnaryOp::AddressOf),
            TokenKind::Punctuator(P::Star) => Some(UnaryOp::Dereference),
            TokenKind::Punctuator(P::Plus) => Some(UnaryOp::Posate),
            TokenKind::Punctuator(P::Minus) => Some(UnaryOp::Negate),
            TokenKind::Punctuator(P::Tilde) => Some(UnaryOp::Complement),
            TokenKind::Punctuator(P::Bang) => Some(UnaryOp::Not),
            _ => None,
        });
        if let Some(op) = unary_op {
            self.cursor.advance_any();
            let operand = self.parse_cast_expression();
            let node = self.alloc_expr(ExprKind::Unary { op, operand }, row, 1);
            self.link(node, &[operand]);
            return node;
        }
        if self.cursor.check_keyword(crate::token::Keyword::Sizeof) {
            self.cursor.advance_any();
            if self.cursor.check_punct(P::LeftParen) && self.starts_type_name_at(1) {
                self.cursor.advance_any();
                let type_name = self.parse_type_name();
                self.cursor.expected_punct(P::RightParen, &mut self.diags);
                let node = self.alloc_expr(ExprKind::SizeofType { type_name }, row, 1);
                self.link(node, &[type_name]);
                return node;
            }
            let operand = self.parse_unary_expression();
            let node = self.alloc_expr(ExprKind::Sizeof { operand }, row, 1);
            self.link(node, &[operand]);
            return node;
        }
        self.parse_postfix_expression()
    }

    fn parse_postfix_expression(&mut self) -> NodeId {
        let primary = self.parse_primary_expression();
        self.parse_postfix_tail(primary)
    }

    fn parse_postfix_tail(&mut self, mut base: NodeId) -> NodeId {
        loop {
            let row = self.cursor.position();
            if self.cursor.optional_punct(P::LeftBracket) {
                let index = self.parse_expression();
                self.cursor.expected_punct(P::RightBracket, &mut self.diags);
                let node = self.alloc_expr(ExprKind::Subscript { base, index }, row, 1);
                self.link(node, &[base, index]);
                base = node;
            } else if self.cursor.optional_punct(P::LeftParen) {
                let mut args = Vec::new();
                if !self.cursor.check_punct(P::RightParen) {
                    args.push(self.parse_assignment_expression());
                    while self.cursor.optional_punct(P::Comma) {
                        args.push(self.parse_assignment_expression());
                    }
                }
                self.cursor.expected_punct(P::RightParen, &mut self.diags);
                let node = self.alloc_expr(ExprKind::Call { callee: base, arguments: args.clone() }, row, 1);
                let mut children = vec![base];
                children.extend(&args);
                self.link(node, &children);
                base = node;
            } else if self.cursor.optional_punct(P::Period) {
                let member = self.cursor.expected_identifier(&mut self.diags).unwrap_or_default();
                let node = self.alloc_expr(ExprKind::Member { base, member }, row, 1);
                self.link(node, &[base]);
                base = node;
            } else if self.cursor.optional_punct(P::Arrow) {
                let member = self.cursor.expected_identifier(&mut self.diags).unwrap_or_default();
                let node = self.alloc_expr(ExprKind::DereferenceMember { base, member }, row, 1);
                self.link(node, &[base]);
                base = node;
            } else if self.cursor.optional_punct(P::Increment) {
                let node = self.alloc_expr(ExprKind::PostfixIncDec { op: IncDecOp::Increment, operand: base }, row, 1);
                self.link(node, &[base]);
                base = node;
            } else if self.cursor.optional_punct(P::Decrement) {
                let node = self.alloc_expr(ExprKind::PostfixIncDec { op: IncDecOp::Decrement, operand: base }, row, 1);
                self.link(node, &[base]);
                base = node;
            } else {
                break;
            }
        }
        base
    }

    fn parse_primary_expression(&mut self) -> NodeId {
        let row = self.cursor.position();
        if self.cursor.optional_punct(P::LeftParen) {
            let inner = self.parse_expression();
            self.cursor.expected_punct(P::RightParen, &mut self.diags);
            return inner;
        }
        let Some(tok) = self.cursor.peek().cloned() else {
            return self.alloc_expr(ExprKind::Identifier { name: String::new(), resolved: None }, row, 1);
        };
        match tok.kind {
            TokenKind::Identifier(name) => {
                self.cursor.advance_any();
                if let Some(sym) = self.symtab.lookup(self.current_scope(), &name, &crate::symbol::Namespace::Ordinary) {
                    // an enumeration constant is an ordinary-namespace
                    // symbol whose type class is the enum's; the typing
                    // pass still re-resolves the node, this only seeds it.
                    let _ = sym;
                }
                self.alloc_expr(ExprKind::Identifier { name, resolved: None }, row, tok.col)
            }
            TokenKind::Integer(i) => {
                self.cursor.advance_any();
                self.alloc_expr(ExprKind::IntegerConstant(i), row, tok.col)
            }
            TokenKind::Floating(f) => {
                self.cursor.advance_any();
                self.alloc_expr(ExprKind::FloatingConstant(f), row, tok.col)
            }
            TokenKind::Character(c) => {
                self.cursor.advance_any();
                self.alloc_expr(ExprKind::CharacterConstant(c), row, tok.col)
            }
            TokenKind::StringLit(s) => {
                self.cursor.advance_any();
                self.alloc_expr(ExprKind::StringLiteral { bytes: s.bytes, is_wide: s.is_wide }, row, tok.col)
            }
            _ => {
                self.diags.push(
                    crate::diag::Diagnostic::error(tok.row, tok.col, "expected expression")
                        .with_depth(self.cursor.depth),
                );
                self.cursor.advance_any();
                self.alloc_expr(ExprKind::Identifier { name: String::new(), resolved: None }, row, tok.col)
            }
        }
    }

    /// `constant-expression` is grammatically just `conditional-expression`
    /// (C99 6.6p1); kept as a distinct entry point so callers documenting
    /// "this must be constant" read clearly, even though evaluability is
    /// checked later by the constant-expression evaluator.
    pub(crate) fn parse_constant_expression(&mut self) -> NodeId {
        self.parse_conditional_expression()
    }

    fn parse_braced_initializer_list(&mut self) -> NodeId {
        let row = self.cursor.position();
        self.cursor.expected_punct(P::LeftBrace, &mut self.diags);
        let mut items = Vec::new();
        let mut children = Vec::new();
        while !self.cursor.check_punct(P::RightBrace) && !self.cursor.at_end() {
            let designation = self.parse_designation();
            let value = if self.cursor.check_punct(P::LeftBrace) {
                self.parse_braced_initializer_list()
            } else {
                self.parse_assignment_expression()
            };
            children.push(value);
            items.push((designation, value));
            if !self.cursor.optional_punct(P::Comma) {
                break;
            }
        }
        self.cursor.expected_punct(P::RightBrace, &mut self.diags);
        let node = self.ast.alloc(NodeKind::Decl(DeclKind::InitializerList { items }), row, 1);
        self.link(node, &children);
        node
    }

    fn parse_designation(&mut self) -> Vec<crate::ast::decl::Designator> {
        let mut designators = Vec::new();
        loop {
            if self.cursor.optional_punct(P::Period) {
                let name = self.cursor.expected_identifier(&mut self.diags).unwrap_or_default();
                designators.push(crate::ast::decl::Designator::Field(name));
            } else if self.cursor.optional_punct(P::LeftBracket) {
                let index = self.parse_constant_expression();
                self.cursor.expected_punct(P::RightBracket, &mut self.diags);
                designators.push(crate::ast::decl::Designator::Index(index));
            } else {
                break;
            }
        }
        if !designators.is_empty() {
            self.cursor.expected_punct(P::Assign, &mut self.diags);
        }
        designators
    }

    pub(crate) fn parse_initializer(&mut self) -> NodeId {
        if self.cursor.check_punct(P::LeftBrace) {
            self.parse_braced_initializer_list()
        } else {
            self.parse_assignment_expression()
        }
    }
}
