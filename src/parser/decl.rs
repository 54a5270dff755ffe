//! Declaration, declarator, and type grammar (C99 6.7), recursive descent.

use crate::ast::decl::{BasicTypeSpecifier as B, NonBasicTypeSpecifier, StorageClass};
use crate::ast::{DeclKind, DeclarationSpecifiers, DeclaratorKind, NodeId, NodeKind};
use crate::symbol::{Linkage, Namespace, StorageDuration};
use crate::token::{Keyword as K, Punctuator as P, TokenKind};
use crate::types::{Qualifiers, RecordKind};

use super::Parser;

impl<'a> Parser<'a> {
    fn alloc_decl(&mut self, kind: DeclKind, row: u32, col: u32) -> NodeId {
        self.ast.alloc(NodeKind::Decl(kind), row, col)
    }

    /// Whether the current token can begin a declaration-specifier /
    /// specifier-qualifier list: a storage-class keyword, a basic type
    /// keyword, `struct`/`union`/`enum`, a type qualifier, `inline`, or an
    /// identifier that is a typedef-name in the current scope
    /// (spec.md §4.1).
    pub(crate) fn starts_type_specifier(&self) -> bool {
        let Some(tok) = self.cursor.peek() else { return false };
        match &tok.kind {
            TokenKind::Keyword(kw) => matches!(
                kw,
                K::Typedef
                    | K::Extern
                    | K::Static
                    | K::Auto
                    | K::Register
                    | K::Void
                    | K::Char
                    | K::Short
                    | K::Int
                    | K::Long
                    | K::Float
                    | K::Double
                    | K::Signed
                    | K::Unsigned
                    | K::Bool
                    | K::Complex
                    | K::Imaginary
                    | K::Struct
                    | K::Union
                    | K::Enum
                    | K::Const
                    | K::Restrict
                    | K::Volatile
                    | K::Inline
            ),
            TokenKind::Identifier(name) => self.is_typedef_name(name),
            _ => false,
        }
    }

    /// Look-ahead variant of [`starts_type_specifier`] used to disambiguate
    /// `(type-name)` casts/compound-literals from parenthesized
    /// expressions without consuming tokens.
    pub(crate) fn starts_type_name_at(&self, offset: usize) -> bool {
        match self.cursor.peek_at(offset) {
            Some(tok) => match &tok.kind {
                TokenKind::Keyword(kw) => matches!(
                    kw,
                    K::Void
                        | K::Char
                        | K::Short
                        | K::Int
                        | K::Long
                        | K::Float
                        | K::Double
                        | K::Signed
                        | K::Unsigned
                        | K::Bool
                        | K::Complex
                        | K::Imaginary
                        | K::Struct
                        | K::Union
                        | K::Enum
                        | K::Const
                        | K::Restrict
                        | K::Volatile
                ),
                TokenKind::Identifier(name) => self.is_typedef_name(name),
                _ => false,
            },
            None => false,
        }
    }

    pub(crate) fn parse_declaration_specifiers(&mut self) -> DeclarationSpecifiers {
        let mut spec = DeclarationSpecifiers::default();
        loop {
            let Some(tok) = self.cursor.peek() else { break };
            match &tok.kind {
                TokenKind::Keyword(K::Typedef) => {
                    spec.storage_class = Some(StorageClass::Typedef);
                    self.cursor.advance_any();
                }
                TokenKind::Keyword(K::Extern) => {
                    spec.storage_class = Some(StorageClass::Extern);
                    self.cursor.advance_any();
                }
                TokenKind::Keyword(K::Static) => {
                    spec.storage_class = Some(StorageClass::Static);
                    self.cursor.advance_any();
                }
                TokenKind::Keyword(K::Auto) => {
                    spec.storage_class = Some(StorageClass::Auto);
                    self.cursor.advance_any();
                }
                TokenKind::Keyword(K::Register) => {
                    spec.storage_class = Some(StorageClass::Register);
                    self.cursor.advance_any();
                }
                TokenKind::Keyword(K::Const) => {
                    spec.qualifiers = spec.qualifiers.union(Qualifiers::CONST);
                    self.cursor.advance_any();
                }
                TokenKind::Keyword(K::Restrict) => {
                    spec.qualifiers = spec.qualifiers.union(Qualifiers::RESTRICT);
                    self.cursor.advance_any();
                }
                TokenKind::Keyword(K::Volatile) => {
                    spec.qualifiers = spec.qualifiers.union(Qualifiers::VOLATILE);
                    self.cursor.advance_any();
                }
                TokenKind::Keyword(K::Inline) => {
                    spec.is_inline = true;
                    self.cursor.advance_any();
                }
                TokenKind::Keyword(K::Void) => {
                    spec.basic_specifiers.push(B::Void);
                    self.cursor.advance_any();
                }
                TokenKind::Keyword(K::Char) => {
                    spec.basic_specifiers.push(B::Char);
                    self.cursor.advance_any();
                }
                TokenKind::Keyword(K::Short) => {
                    spec.basic_specifiers.push(B::Short);
                    self.cursor.advance_any();
                }
                TokenKind::Keyword(K::Int) => {
                    spec.basic_specifiers.push(B::Int);
                    self.cursor.advance_any();
                }
                TokenKind::Keyword(K::Long) => {
                    spec.basic_specifiers.push(B::Long);
                    self.cursor.advance_any();
                }
                TokenKind::Keyword(K::Float) => {
                    spec.basic_specifiers.push(B::Float);
                    self.cursor.advance_any();
                }
                TokenKind::Keyword(K::Double) => {
                    spec.basic_specifiers.push(B::Double);
                    self.cursor.advance_any();
                }
                TokenKind::Keyword(K::Signed) => {
                    spec.basic_specifiers.push(B::Signed);
                    self.cursor.advance_any();
                }
                TokenKind::Keyword(K::Unsigned) => {
                    spec.basic_specifiers.push(B::Unsigned);
                    self.cursor.advance_any();
                }
                TokenKind::Keyword(K::Bool) => {
                    spec.basic_specifiers.push(B::Bool);
                    self.cursor.advance_any();
                }
                TokenKind::Keyword(K::Complex) => {
                    spec.basic_specifiers.push(B::Complex);
                    self.cursor.advance_any();
                }
                TokenKind::Keyword(K::Imaginary) => {
                    spec.basic_specifiers.push(B::Imaginary);
                    self.cursor.advance_any();
                }
                TokenKind::Keyword(K::Struct) | TokenKind::Keyword(K::Union) => {
                    let node = self.parse_struct_or_union_specifier();
                    spec.non_basic = Some(NonBasicTypeSpecifier::StructOrUnion(node));
                }
                TokenKind::Keyword(K::Enum) => {
                    let node = self.parse_enum_specifier();
                    spec.non_basic = Some(NonBasicTypeSpecifier::Enum(node));
                }
                TokenKind::Identifier(name) if spec.non_basic.is_none() && spec.basic_specifiers.is_empty() && self.is_typedef_name(name) => {
                    spec.non_basic = Some(NonBasicTypeSpecifier::TypedefName(name.clone()));
                    self.cursor.advance_any();
                }
                _ => break,
            }
        }
        spec
    }

    fn parse_struct_or_union_specifier(&mut self) -> NodeId {
        let row = self.cursor.position();
        let kind = if self.cursor.optional_keyword(K::Struct) { RecordKind::Struct } else {
            self.cursor.optional_keyword(K::Union);
            RecordKind::Union
        };
        let tag = self.cursor.optional_identifier();
        let ns = if kind == RecordKind::Struct { Namespace::TagStruct } else { Namespace::TagUnion };
        // A tagged struct/union specifier with a body declares its tag
        // *before* parsing the member list, so a member declarator can
        // refer back to the (still incomplete) tag through a pointer —
        // the ordinary self-referential `struct node { struct node *next; }`
        // idiom (spec.md §3 "C Type" incompleteness).
        if self.cursor.check_punct(P::LeftBrace) {
            if let Some(t) = &tag {
                self.symtab.declare(
                    self.current_scope(),
                    t,
                    ns.clone(),
                    crate::types::CType {
                        class: if kind == RecordKind::Struct { crate::types::TypeClass::Structure } else { crate::types::TypeClass::Union },
                        qualifiers: crate::types::Qualifiers::NONE,
                        is_inline: false,
                        derivation: crate::types::Derivation::Record(crate::types::RecordType::new(kind, tag.clone())),
                    },
                    None,
                    Linkage::None,
                    StorageDuration::Static,
                    false,
                );
            }
        }
        let members = if self.cursor.optional_punct(P::LeftBrace) {
            let mut v = Vec::new();
            while !self.cursor.check_punct(P::RightBrace) && !self.cursor.at_end() {
                v.push(self.parse_struct_declaration());
            }
            self.cursor.expected_punct(P::RightBrace, &mut self.diags);
            Some(v)
        } else {
            None
        };
        let children: Vec<NodeId> = members.clone().unwrap_or_default();
        let node = self.alloc_decl(DeclKind::StructUnionSpecifier { kind, tag, members }, row, 1);
        self.link(node, &children);
        node
    }

    fn parse_struct_declaration(&mut self) -> NodeId {
        let row = self.cursor.position();
        let specifiers = self.parse_declaration_specifiers();
        let mut declarators = Vec::new();
        let mut children = Vec::new();
        loop {
            let declarator = if self.cursor.check_punct(P::Colon) { None } else { Some(self.parse_declarator()) };
            let width = if self.cursor.optional_punct(P::Colon) { Some(self.parse_constant_expression()) } else { None };
            if let Some(d) = declarator {
                children.push(d);
            }
            if let Some(w) = width {
                children.push(w);
            }
            declarators.push((declarator, width));
            if !self.cursor.optional_punct(P::Comma) {
                break;
            }
        }
        self.cursor.expected_punct(P::Semicolon, &mut self.diags);
        let node = self.alloc_decl(DeclKind::StructDeclaration { specifiers, declarators }, row, 1);
        self.link(node, &children);
        node
    }

    fn parse_enum_specifier(&mut self) -> NodeId {
        let row = self.cursor.position();
        self.cursor.optional_keyword(K::Enum);
        let tag = self.cursor.optional_identifier();
        let enumerators = if self.cursor.optional_punct(P::LeftBrace) {
            let mut v = Vec::new();
            while !self.cursor.check_punct(P::RightBrace) && !self.cursor.at_end() {
                let Some(name) = self.cursor.expected_identifier(&mut self.diags) else { break };
                let value = if self.cursor.optional_punct(P::Assign) { Some(self.parse_constant_expression()) } else { None };
                self.symtab.declare(
                    self.current_scope(),
                    &name,
                    Namespace::Ordinary,
                    crate::types::CType::int(),
                    None,
                    Linkage::None,
                    StorageDuration::Static,
                    false,
                );
                v.push((name, value));
                if !self.cursor.optional_punct(P::Comma) {
                    break;
                }
            }
            self.cursor.expected_punct(P::RightBrace, &mut self.diags);
            Some(v)
        } else {
            None
        };
        if let Some(t) = &tag {
            self.symtab.declare(
                self.current_scope(),
                t,
                Namespace::TagEnum,
                crate::types::CType::error(),
                None,
                Linkage::None,
                StorageDuration::Static,
                false,
            );
        }
        let children: Vec<NodeId> =
            enumerators.as_ref().map(|v| v.iter().filter_map(|(_, e)| *e).collect()).unwrap_or_default();
        let node = self.alloc_decl(DeclKind::EnumSpecifier { tag, enumerators }, row, 1);
        self.link(node, &children);
        node
    }

    pub(crate) fn parse_declarator(&mut self) -> NodeId {
        let row = self.cursor.position();
        if self.cursor.optional_punct(P::Star) {
            let mut quals = Qualifiers::NONE;
            loop {
                if self.cursor.optional_keyword(K::Const) {
                    quals = quals.union(Qualifiers::CONST);
                } else if self.cursor.optional_keyword(K::Restrict) {
                    quals = quals.union(Qualifiers::RESTRICT);
                } else if self.cursor.optional_keyword(K::Volatile) {
                    quals = quals.union(Qualifiers::VOLATILE);
                } else {
                    break;
                }
            }
            let inner = self.parse_declarator();
            let node = self.alloc_decl(DeclKind::Declarator(DeclaratorKind::Pointer { qualifiers: quals, inner }), row, 1);
            self.link(node, &[inner]);
            return node;
        }
        self.parse_direct_declarator()
    }

    fn parse_direct_declarator(&mut self) -> NodeId {
        let row = self.cursor.position();
        let mut base = if self.cursor.optional_punct(P::LeftParen) {
            let inner = self.parse_declarator();
            self.cursor.expected_punct(P::RightParen, &mut self.diags);
            inner
        } else if let Some(name) = self.cursor.optional_identifier() {
            self.alloc_decl(DeclKind::Declarator(DeclaratorKind::Identifier(name)), row, 1)
        } else {
            self.alloc_decl(DeclKind::Declarator(DeclaratorKind::Abstract), row, 1)
        };
        loop {
            let row = self.cursor.position();
            if self.cursor.optional_punct(P::LeftBracket) {
                let len = if self.cursor.check_punct(P::RightBracket) { None } else { Some(self.parse_constant_expression()) };
                self.cursor.expected_punct(P::RightBracket, &mut self.diags);
                let node = self.alloc_decl(DeclKind::Declarator(DeclaratorKind::Array { inner: base, len }), row, 1);
                let mut children = vec![base];
                if let Some(l) = len {
                    children.push(l);
                }
                self.link(node, &children);
                base = node;
            } else if self.cursor.optional_punct(P::LeftParen) {
                let (params, is_variadic, is_prototyped) = self.parse_parameter_type_list();
                self.cursor.expected_punct(P::RightParen, &mut self.diags);
                let node = self.alloc_decl(
                    DeclKind::Declarator(DeclaratorKind::Function { inner: base, parameters: params.clone(), is_variadic, is_prototyped }),
                    row,
                    1,
                );
                let mut children = vec![base];
                children.extend(&params);
                self.link(node, &children);
                base = node;
            } else {
                break;
            }
        }
        base
    }

    /// Parses a function declarator's parenthesized parameter list: an
    /// empty list, `void`, a prototyped parameter-type-list (optionally
    /// variadic), or a K&R identifier-list (spec.md §4.3: "K&R
    /// declarations mixed with a prototyped parameter list" is a
    /// constraint the semantic analyzer checks once both shapes can
    /// appear across a declaration and its definition).
    fn parse_parameter_type_list(&mut self) -> (Vec<NodeId>, bool, bool) {
        if self.cursor.check_punct(P::RightParen) {
            return (Vec::new(), false, true);
        }
        if self.cursor.check_keyword(K::Void) && matches!(self.cursor.peek_at(1).map(|t| &t.kind), Some(TokenKind::Punctuator(P::RightParen))) {
            self.cursor.advance_any();
            return (Vec::new(), false, true);
        }
        if self.cursor.check_identifier() && !self.starts_type_specifier() {
            let mut params = Vec::new();
            loop {
                let row = self.cursor.position();
                let Some(name) = self.cursor.optional_identifier() else { break };
                let declarator = self.alloc_decl(DeclKind::Declarator(DeclaratorKind::Identifier(name)), row, 1);
                let node = self.alloc_decl(
                    DeclKind::ParameterDeclaration { specifiers: DeclarationSpecifiers::default(), declarator: Some(declarator) },
                    row,
                    1,
                );
                self.link(node, &[declarator]);
                params.push(node);
                if !self.cursor.optional_punct(P::Comma) {
                    break;
                }
            }
            return (params, false, false);
        }
        let mut params = Vec::new();
        let mut is_variadic = false;
        loop {
            if self.cursor.optional_punct(P::Ellipsis) {
                is_variadic = true;
                break;
            }
            let row = self.cursor.position();
            let specifiers = self.parse_declaration_specifiers();
            let declarator = if self.cursor.check_punct(P::Comma) || self.cursor.check_punct(P::RightParen) {
                None
            } else {
                Some(self.parse_declarator())
            };
            let mut children = Vec::new();
            if let Some(d) = declarator {
                children.push(d);
            }
            let node = self.alloc_decl(DeclKind::ParameterDeclaration { specifiers, declarator }, row, 1);
            self.link(node, &children);
            params.push(node);
            if !self.cursor.optional_punct(P::Comma) {
                break;
            }
        }
        (params, is_variadic, true)
    }

    pub(crate) fn parse_abstract_declarator(&mut self) -> NodeId {
        self.parse_declarator()
    }

    pub(crate) fn parse_type_name(&mut self) -> NodeId {
        let row = self.cursor.position();
        let specifiers = self.parse_declaration_specifiers();
        let abstract_declarator = if self.cursor.check_punct(P::RightParen) || self.cursor.check_punct(P::RightBracket) {
            None
        } else {
            Some(self.parse_abstract_declarator())
        };
        let mut children = Vec::new();
        if let Some(d) = abstract_declarator {
            children.push(d);
        }
        let node = self.alloc_decl(DeclKind::TypeName { specifiers, abstract_declarator }, row, 1);
        self.link(node, &children);
        node
    }

    /// `external-declaration`: either a function definition (a declarator
    /// whose direct-declarator is a function declarator, followed by a
    /// compound-statement body) or an ordinary declaration
    /// (spec.md §4.3: "function definitions whose declarator is not a
    /// function declarator" is a constraint checked once typing has run).
    pub(crate) fn parse_external_declaration(&mut self, parent: NodeId) -> Option<NodeId> {
        if self.cursor.optional_punct(P::Semicolon) {
            return None;
        }
        let row = self.cursor.position();
        let specifiers = self.parse_declaration_specifiers();
        if self.cursor.check_punct(P::Semicolon) {
            self.cursor.advance_any();
            let node = self.alloc_decl(DeclKind::Declaration { specifiers, init_declarators: vec![] }, row, 1);
            self.ast.set_parent(node, parent);
            return Some(node);
        }
        let declarator = self.parse_declarator();
        if self.cursor.check_punct(P::LeftBrace) {
            let name = crate::ast::query::declarator_identifier(&self.ast, declarator);
            let is_typedef = specifiers.storage_class == Some(StorageClass::Typedef);
            if let Some(name) = &name {
                self.symtab.declare(
                    self.current_scope(),
                    name,
                    Namespace::Ordinary,
                    crate::types::CType::error(),
                    Some(declarator),
                    Linkage::External,
                    StorageDuration::Static,
                    is_typedef,
                );
            }
            let param_scope = self.push_scope();
            self.scopes.record(declarator, param_scope);
            let body = self.parse_compound_statement();
            self.pop_scope();
            let node = self.alloc_decl(DeclKind::FunctionDefinition { specifiers, declarator, body }, row, 1);
            self.link(node, &[declarator, body]);
            self.ast.set_parent(node, parent);
            return Some(node);
        }
        let init_declarators = self.parse_init_declarator_list(declarator, &specifiers);
        self.cursor.expected_punct(P::Semicolon, &mut self.diags);
        let node = self.alloc_decl(DeclKind::Declaration { specifiers, init_declarators: init_declarators.clone() }, row, 1);
        self.link(node, &init_declarators);
        self.ast.set_parent(node, parent);
        Some(node)
    }

    /// Parses the rest of an init-declarator-list given its first
    /// declarator has already been parsed (both the external-declaration
    /// and the block-scope declaration productions share this tail).
    fn parse_init_declarator_list(&mut self, first_declarator: NodeId, specifiers: &DeclarationSpecifiers) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut declarator = first_declarator;
        loop {
            let row = self.cursor.position();
            let name = crate::ast::query::declarator_identifier(&self.ast, declarator);
            let is_typedef = specifiers.storage_class == Some(StorageClass::Typedef);
            let (linkage, duration) = self.infer_linkage_and_duration(specifiers);
            if let Some(name) = &name {
                self.symtab.declare(
                    self.current_scope(),
                    name,
                    Namespace::Ordinary,
                    crate::types::CType::error(),
                    Some(declarator),
                    linkage,
                    duration,
                    is_typedef,
                );
            }
            let initializer = if self.cursor.optional_punct(P::Assign) { Some(self.parse_initializer()) } else { None };
            let mut children = vec![declarator];
            if let Some(i) = initializer {
                children.push(i);
            }
            let node = self.alloc_decl(DeclKind::InitDeclarator { declarator, initializer }, row, 1);
            self.link(node, &children);
            out.push(node);
            if !self.cursor.optional_punct(P::Comma) {
                break;
            }
            declarator = self.parse_declarator();
        }
        out
    }

    /// Rough linkage/storage-duration classification from the declaration
    /// specifiers and current scope, sufficient for the parser's
    /// tentative-symbol installation (spec.md §4.1); the semantic
    /// analyzer re-derives and validates these precisely once the full
    /// declarator type and enclosing scope are known (spec.md §2 stage 5).
    fn infer_linkage_and_duration(&self, specifiers: &DeclarationSpecifiers) -> (Linkage, StorageDuration) {
        let at_file_scope = self.current_scope() == self.symtab.file_scope();
        match specifiers.storage_class {
            Some(StorageClass::Static) => (Linkage::Internal, StorageDuration::Static),
            Some(StorageClass::Extern) => (Linkage::External, StorageDuration::Static),
            Some(StorageClass::Register) | Some(StorageClass::Auto) => (Linkage::None, StorageDuration::Automatic),
            _ if at_file_scope => (Linkage::External, StorageDuration::Static),
            _ => (Linkage::None, StorageDuration::Automatic),
        }
    }

    /// Block-scope declaration production, shared by compound-statement
    /// parsing.
    pub(crate) fn parse_block_declaration(&mut self) -> NodeId {
        let row = self.cursor.position();
        let specifiers = self.parse_declaration_specifiers();
        if self.cursor.optional_punct(P::Semicolon) {
            return self.alloc_decl(DeclKind::Declaration { specifiers, init_declarators: vec![] }, row, 1);
        }
        let declarator = self.parse_declarator();
        let init_declarators = self.parse_init_declarator_list(declarator, &specifiers);
        self.cursor.expected_punct(P::Semicolon, &mut self.diags);
        let node = self.alloc_decl(DeclKind::Declaration { specifiers, init_declarators: init_declarators.clone() }, row, 1);
        self.link(node, &init_declarators);
        node
    }
}
