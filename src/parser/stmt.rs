//! Statement grammar (C99 6.8), recursive descent.

use crate::ast::{NodeId, NodeKind, StmtKind};
use crate::token::{Keyword as K, Punctuator as P, TokenKind};

use super::Parser;

impl<'a> Parser<'a> {
    fn alloc_stmt(&mut self, kind: StmtKind, row: u32, col: u32) -> NodeId {
        self.ast.alloc(NodeKind::Stmt(kind), row, col)
    }

    /// `compound-statement`: `{` block-item-list? `}`, each item either a
    /// declaration or a statement (C99 distinguishes the two grammar
    /// productions; nothing here needs to, since [`starts_type_specifier`]
    /// already disambiguates the way the typedef-name lookahead requires).
    ///
    /// [`starts_type_specifier`]: Parser::starts_type_specifier
    pub(crate) fn parse_compound_statement(&mut self) -> NodeId {
        let row = self.cursor.position();
        self.cursor.expected_punct(P::LeftBrace, &mut self.diags);
        let scope = self.push_scope();
        let mut items = Vec::new();
        while !self.cursor.check_punct(P::RightBrace) && !self.cursor.at_end() {
            items.push(self.parse_block_item());
        }
        self.cursor.expected_punct(P::RightBrace, &mut self.diags);
        self.pop_scope();
        let node = self.alloc_stmt(StmtKind::Compound { block_items: items.clone() }, row, 1);
        self.link(node, &items);
        self.scopes.record(node, scope);
        node
    }

    fn parse_block_item(&mut self) -> NodeId {
        if self.starts_type_specifier() {
            self.parse_block_declaration()
        } else {
            self.parse_statement()
        }
    }

    pub(crate) fn parse_statement(&mut self) -> NodeId {
        let row = self.cursor.position();
        if self.cursor.check_punct(P::LeftBrace) {
            return self.parse_compound_statement();
        }
        if self.cursor.check_identifier()
            && matches!(self.cursor.peek_at(1).map(|t| &t.kind), Some(TokenKind::Punctuator(P::Colon)))
        {
            let label = self.cursor.optional_identifier().expect("checked above");
            self.cursor.advance_any();
            let statement = self.parse_statement();
            let node = self.alloc_stmt(StmtKind::Labeled { label, statement }, row, 1);
            self.link(node, &[statement]);
            return node;
        }
        if self.cursor.optional_keyword(K::Case) {
            let value = self.parse_constant_expression();
            self.cursor.expected_punct(P::Colon, &mut self.diags);
            let statement = self.parse_statement();
            let node = self.alloc_stmt(StmtKind::CaseLabeled { value: Some(value), statement }, row, 1);
            self.link(node, &[value, statement]);
            return node;
        }
        if self.cursor.optional_keyword(K::Default) {
            self.cursor.expected_punct(P::Colon, &mut self.diags);
            let statement = self.parse_statement();
            let node = self.alloc_stmt(StmtKind::CaseLabeled { value: None, statement }, row, 1);
            self.link(node, &[statement]);
            return node;
        }
        if self.cursor.optional_keyword(K::If) {
            self.cursor.expected_punct(P::LeftParen, &mut self.diags);
            let cond = self.parse_expression();
            self.cursor.expected_punct(P::RightParen, &mut self.diags);
            let then_stmt = self.parse_statement();
            let else_stmt = if self.cursor.optional_keyword(K::Else) { Some(self.parse_statement()) } else { None };
            let node = self.alloc_stmt(StmtKind::If { cond, then_stmt, else_stmt }, row, 1);
            let mut children = vec![cond, then_stmt];
            if let Some(e) = else_stmt {
                children.push(e);
            }
            self.link(node, &children);
            return node;
        }
        if self.cursor.optional_keyword(K::Switch) {
            self.cursor.expected_punct(P::LeftParen, &mut self.diags);
            let controlling_expr = self.parse_expression();
            self.cursor.expected_punct(P::RightParen, &mut self.diags);
            let body = self.parse_statement();
            let node = self.alloc_stmt(StmtKind::Switch { controlling_expr, body }, row, 1);
            self.link(node, &[controlling_expr, body]);
            return node;
        }
        if self.cursor.optional_keyword(K::While) {
            self.cursor.expected_punct(P::LeftParen, &mut self.diags);
            let cond = self.parse_expression();
            self.cursor.expected_punct(P::RightParen, &mut self.diags);
            let body = self.parse_statement();
            let node = self.alloc_stmt(StmtKind::While { cond, body }, row, 1);
            self.link(node, &[cond, body]);
            return node;
        }
        if self.cursor.optional_keyword(K::Do) {
            let body = self.parse_statement();
            if !self.cursor.optional_keyword(K::While) {
                let (r, c) = self.cursor.peek().map(|t| (t.row, t.col)).unwrap_or((0, 0));
                self.diags.push(crate::diag::Diagnostic::error(r, c, "expected 'while'").with_depth(self.cursor.depth));
            }
            self.cursor.expected_punct(P::LeftParen, &mut self.diags);
            let cond = self.parse_expression();
            self.cursor.expected_punct(P::RightParen, &mut self.diags);
            self.cursor.expected_punct(P::Semicolon, &mut self.diags);
            let node = self.alloc_stmt(StmtKind::Do { body, cond }, row, 1);
            self.link(node, &[body, cond]);
            return node;
        }
        if self.cursor.optional_keyword(K::For) {
            self.cursor.expected_punct(P::LeftParen, &mut self.diags);
            let scope = self.push_scope();
            let init = if self.cursor.check_punct(P::Semicolon) {
                self.cursor.advance_any();
                None
            } else if self.starts_type_specifier() {
                Some(self.parse_block_declaration())
            } else {
                let e = self.parse_expression();
                self.cursor.expected_punct(P::Semicolon, &mut self.diags);
                Some(e)
            };
            let cond = if self.cursor.check_punct(P::Semicolon) { None } else { Some(self.parse_expression()) };
            self.cursor.expected_punct(P::Semicolon, &mut self.diags);
            let post = if self.cursor.check_punct(P::RightParen) { None } else { Some(self.parse_expression()) };
            self.cursor.expected_punct(P::RightParen, &mut self.diags);
            let body = self.parse_statement();
            self.pop_scope();
            let node = self.alloc_stmt(StmtKind::For { init, cond, post, body }, row, 1);
            let mut children = Vec::new();
            children.extend(init);
            children.extend(cond);
            children.extend(post);
            children.push(body);
            self.link(node, &children);
            self.scopes.record(node, scope);
            return node;
        }
        if self.cursor.optional_keyword(K::Goto) {
            let label = self.cursor.expected_identifier(&mut self.diags).unwrap_or_default();
            self.cursor.expected_punct(P::Semicolon, &mut self.diags);
            return self.alloc_stmt(StmtKind::Goto { label }, row, 1);
        }
        if self.cursor.optional_keyword(K::Continue) {
            self.cursor.expected_punct(P::Semicolon, &mut self.diags);
            return self.alloc_stmt(StmtKind::Continue, row, 1);
        }
        if self.cursor.optional_keyword(K::Break) {
            self.cursor.expected_punct(P::Semicolon, &mut self.diags);
            return self.alloc_stmt(StmtKind::Break, row, 1);
        }
        if self.cursor.optional_keyword(K::Return) {
            let expr = if self.cursor.check_punct(P::Semicolon) { None } else { Some(self.parse_expression()) };
            self.cursor.expected_punct(P::Semicolon, &mut self.diags);
            let node = self.alloc_stmt(StmtKind::Return { expr }, row, 1);
            if let Some(e) = expr {
                self.link(node, &[e]);
            }
            return node;
        }
        if self.cursor.optional_punct(P::Semicolon) {
            return self.alloc_stmt(StmtKind::Expression { expr: None }, row, 1);
        }
        let expr = self.parse_expression();
        self.cursor.expected_punct(P::Semicolon, &mut self.diags);
        let node = self.alloc_stmt(StmtKind::Expression { expr: Some(expr) }, row, 1);
        self.link(node, &[expr]);
        node
    }
}
