use crate::ast::*;
use crate::consts::PARSER_MAX_NESTING;

use super::error::{ParseError, ParseResult};
use super::lexer::{unescape, LexicalToken, Token};
use super::scanner::Scanner;
use super::span::Location;

type Result<T> = ParseResult<T>;

/// Recursive descent parser operating on a shared [`Scanner`]
///
/// The parser never owns the token stream: the fragment wrappers interleave
/// their own synthesized declarations with calls into the parser, and the
/// scanner position is shared between them.
pub struct Parser<'s> {
    scanner: &'s mut Scanner,
    depth: usize,
}

impl<'s> Parser<'s> {
    pub fn new(scanner: &'s mut Scanner) -> Self {
        Self { scanner, depth: 0 }
    }

    /// No tokens left
    pub fn is_at_end(&self) -> bool {
        self.scanner.is_eof()
    }

    // Helper methods

    fn peek(&self) -> &LexicalToken {
        self.scanner.peek()
    }

    fn peek_nth(&self, n: usize) -> &LexicalToken {
        self.scanner.peek_nth(n)
    }

    fn check(&self, token_type: &Token) -> bool {
        self.peek().is(token_type)
    }

    fn check_nth(&self, n: usize, token_type: &Token) -> bool {
        self.peek_nth(n).is(token_type)
    }

    fn advance(&mut self) -> LexicalToken {
        self.scanner.read()
    }

    fn location(&self) -> Location {
        self.scanner.location()
    }

    fn match_token(&mut self, token_type: &Token) -> bool {
        if self.check(token_type) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn error_expected(&self, expected: &str) -> ParseError {
        let token = self.peek();
        if token.is(&Token::Eof) {
            ParseError::unexpected_end_of_input(expected, token.location)
        } else {
            ParseError::unexpected_token(expected, &token.describe(), token.location)
        }
    }

    fn consume(&mut self, token_type: &Token, expected: &str) -> Result<LexicalToken> {
        if self.check(token_type) {
            Ok(self.advance())
        } else {
            Err(self.error_expected(expected))
        }
    }

    fn consume_identifier(&mut self, expected: &str) -> Result<(String, Location)> {
        let token = self.consume(&Token::Identifier, expected)?;
        Ok((token.lexeme, token.location))
    }

    fn enter(&mut self) -> Result<()> {
        self.depth += 1;
        if self.depth > PARSER_MAX_NESTING {
            return Err(ParseError::invalid_syntax("fragment is nested too deeply", self.location()));
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    fn unsupported(&self, what: &str) -> ParseError {
        ParseError::invalid_syntax(&format!("{} is not supported", what), self.location())
    }

    // Names and types

    /// `Identifier (. Identifier)*`
    pub fn parse_qualified_name(&mut self) -> Result<(String, Location)> {
        let (mut name, location) = self.consume_identifier("identifier")?;
        while self.check(&Token::Dot) && self.check_nth(1, &Token::Identifier) {
            self.advance();
            let (segment, _) = self.consume_identifier("identifier")?;
            name.push('.');
            name.push_str(&segment);
        }
        Ok((name, location))
    }

    fn parse_dims(&mut self) -> usize {
        let mut dims = 0;
        while self.check(&Token::LBracket) && self.check_nth(1, &Token::RBracket) {
            self.advance();
            self.advance();
            dims += 1;
        }
        dims
    }

    /// Primitive or class type, with trailing `[]` pairs; `void` is accepted
    pub fn parse_type(&mut self) -> Result<TypeRef> {
        let location = self.location();
        let name = if self.peek().token.is_primitive_type() {
            self.advance().lexeme
        } else if self.check(&Token::Identifier) {
            self.parse_qualified_name()?.0
        } else {
            return Err(self.error_expected("type"));
        };
        if self.check(&Token::Lt) {
            return Err(self.unsupported("generic type"));
        }
        let array_dims = self.parse_dims();
        if name == "void" && array_dims > 0 {
            return Err(ParseError::invalid_syntax("array of void", location));
        }
        Ok(TypeRef::named(name, array_dims, location))
    }

    /// Skip over what could be a type starting at lookahead `n`; returns the
    /// lookahead index just past it
    fn scan_type(&self, mut n: usize) -> Option<usize> {
        let first = self.peek_nth(n);
        if first.token.is_primitive_type() {
            n += 1;
        } else if first.is(&Token::Identifier) {
            n += 1;
            while self.check_nth(n, &Token::Dot) && self.check_nth(n + 1, &Token::Identifier) {
                n += 2;
            }
        } else {
            return None;
        }
        while self.check_nth(n, &Token::LBracket) && self.check_nth(n + 1, &Token::RBracket) {
            n += 2;
        }
        Some(n)
    }

    /// `Type Identifier` at the cursor, i.e. a local variable declaration
    fn looks_like_declaration(&self) -> bool {
        if self.check(&Token::Final) {
            return true;
        }
        match self.scan_type(0) {
            Some(n) => {
                self.check_nth(n, &Token::Identifier)
                    && matches!(
                        self.peek_nth(n + 1).token,
                        Token::Assign | Token::Semicolon | Token::Comma | Token::LBracket | Token::Colon
                    )
            }
            None => false,
        }
    }

    // Imports

    /// `import [static] a.b.C [.*] ;` with the cursor on `import`
    pub fn parse_import_declaration(&mut self) -> Result<ImportDecl> {
        let location = self.consume(&Token::Import, "'import'")?.location;
        let is_static = self.match_token(&Token::Static);
        let (name, _) = self.parse_qualified_name()?;
        let on_demand = if self.match_token(&Token::Dot) {
            self.consume(&Token::Star, "'*'")?;
            true
        } else {
            false
        };
        self.consume(&Token::Semicolon, "';'")?;
        let import = match (is_static, on_demand) {
            (false, false) => ImportDecl::SingleType { name, location },
            (false, true) => ImportDecl::OnDemand { package: name, location },
            (true, true) => ImportDecl::StaticOnDemand { type_name: name, location },
            (true, false) => match name.rsplit_once('.') {
                Some((type_name, member)) => ImportDecl::StaticSingle {
                    type_name: type_name.to_string(),
                    member: member.to_string(),
                    location,
                },
                None => {
                    return Err(ParseError::invalid_syntax(
                        "static import must name a type member",
                        location,
                    ))
                }
            },
        };
        Ok(import)
    }

    // Class bodies

    fn parse_modifiers(&mut self) -> Result<Modifiers> {
        let mut modifiers = Modifiers::default();
        loop {
            let modifier = match self.peek().token {
                Token::Public => Modifier::Public,
                Token::Protected => Modifier::Protected,
                Token::Private => Modifier::Private,
                Token::Abstract => Modifier::Abstract,
                Token::Static => Modifier::Static,
                Token::Final => Modifier::Final,
                Token::Native => Modifier::Native,
                Token::Synchronized => Modifier::Synchronized,
                Token::Transient => Modifier::Transient,
                Token::Volatile => Modifier::Volatile,
                Token::Strictfp => Modifier::Strictfp,
                Token::At => return Err(self.unsupported("annotation")),
                _ => break,
            };
            if modifiers.has(modifier) {
                return Err(ParseError::invalid_syntax(
                    &format!("duplicate modifier '{}'", self.peek().lexeme),
                    self.location(),
                ));
            }
            self.advance();
            modifiers.add(modifier);
        }
        Ok(modifiers)
    }

    /// One member of the body of `class_id`: field, method, constructor,
    /// initializer or member type
    pub fn parse_class_body_declaration(
        &mut self,
        unit: &mut CompilationUnit,
        class_id: ClassId,
    ) -> Result<()> {
        if self.match_token(&Token::Semicolon) {
            return Ok(());
        }
        let location = self.location();
        let is_interface = unit.class(class_id).is_interface;

        // Initializer blocks
        if self.check(&Token::LBrace) || (self.check(&Token::Static) && self.check_nth(1, &Token::LBrace)) {
            if is_interface {
                return Err(ParseError::invalid_syntax("interfaces cannot have initializers", location));
            }
            let is_static = self.match_token(&Token::Static);
            let body = self.parse_block()?;
            let class = unit.class_mut(class_id);
            class.initializers.push(Initializer { is_static, body, location });
            let index = class.initializers.len() - 1;
            class.init_order.push(InitItem::Block(index));
            return Ok(());
        }

        let mut modifiers = self.parse_modifiers()?;

        if self.check(&Token::Class) || self.check(&Token::Interface) {
            self.parse_member_type(unit, class_id, modifiers)?;
            return Ok(());
        }
        if self.check(&Token::Enum) {
            return Err(self.unsupported("enum declaration"));
        }
        if self.check(&Token::Lt) {
            return Err(self.unsupported("generic method"));
        }

        // Constructor
        let class_name = unit.class(class_id).name.clone();
        if self.check(&Token::Identifier)
            && self.peek().lexeme == class_name
            && self.check_nth(1, &Token::LParen)
        {
            if is_interface {
                return Err(ParseError::invalid_syntax("interfaces cannot have constructors", location));
            }
            self.advance();
            let parameters = self.parse_formal_parameters()?;
            let throws = self.parse_throws()?;
            let (explicit_invocation, body) = self.parse_constructor_body()?;
            unit.add_method(MethodDecl {
                declaring_class: class_id,
                kind: MethodKind::Constructor,
                modifiers,
                return_type: TypeRef::Resolved(crate::descriptor::Descriptor::void()),
                name: "<init>".to_string(),
                parameters,
                throws,
                explicit_invocation,
                body: Some(body),
                location,
            });
            return Ok(());
        }

        let type_ref = self.parse_type()?;
        let (name, name_location) = self.consume_identifier("member name")?;

        if self.check(&Token::LParen) {
            let parameters = self.parse_formal_parameters()?;
            let extra_dims = self.parse_dims();
            let return_type = type_ref.with_extra_dims(extra_dims);
            let throws = self.parse_throws()?;
            let body = if self.match_token(&Token::Semicolon) {
                None
            } else {
                Some(self.parse_block()?)
            };
            if is_interface {
                if body.is_some() {
                    return Err(ParseError::invalid_syntax(
                        "interface methods cannot have a body",
                        name_location,
                    ));
                }
                modifiers.add(Modifier::Public);
                modifiers.add(Modifier::Abstract);
            } else if body.is_none() && !modifiers.is_abstract() && !modifiers.has(Modifier::Native) {
                return Err(ParseError::invalid_syntax("method body expected", name_location));
            }
            unit.add_method(MethodDecl {
                declaring_class: class_id,
                kind: MethodKind::Method,
                modifiers,
                return_type,
                name,
                parameters,
                throws,
                explicit_invocation: None,
                body,
                location: name_location,
            });
            return Ok(());
        }

        if type_ref.is_void() {
            return Err(ParseError::invalid_syntax("fields cannot have type void", name_location));
        }
        if is_interface {
            modifiers.add(Modifier::Public);
            modifiers.add(Modifier::Static);
            modifiers.add(Modifier::Final);
        }
        let mut declarator_name = (name, name_location);
        loop {
            let (name, location) = declarator_name;
            let dims = self.parse_dims();
            let field_type = type_ref.clone().with_extra_dims(dims);
            let initializer = if self.match_token(&Token::Assign) {
                Some(self.parse_variable_initializer()?)
            } else {
                None
            };
            let field = unit.add_field(FieldDecl {
                declaring_class: class_id,
                modifiers: modifiers.clone(),
                type_ref: field_type,
                name,
                initializer,
                location,
            });
            unit.class_mut(class_id).init_order.push(InitItem::Field(field));
            if !self.match_token(&Token::Comma) {
                break;
            }
            declarator_name = self.consume_identifier("field name")?;
        }
        self.consume(&Token::Semicolon, "';'")?;
        Ok(())
    }

    fn parse_member_type(
        &mut self,
        unit: &mut CompilationUnit,
        outer: ClassId,
        mut modifiers: Modifiers,
    ) -> Result<ClassId> {
        let location = self.location();
        let is_interface = self.advance().is(&Token::Interface);
        let (name, _) = self.consume_identifier("type name")?;
        if self.check(&Token::Lt) {
            return Err(self.unsupported("generic type declaration"));
        }
        // Member types never capture an outer instance
        modifiers.add(Modifier::Static);
        if is_interface {
            modifiers.add(Modifier::Abstract);
        }
        let mut decl = ClassDecl::new(name, location);
        decl.is_interface = is_interface;
        decl.outer = Some(outer);
        if is_interface {
            if self.match_token(&Token::Extends) {
                decl.implements = self.parse_type_list()?;
            }
        } else {
            if self.match_token(&Token::Extends) {
                decl.extends = Some(self.parse_type()?);
            }
            if self.match_token(&Token::Implements) {
                decl.implements = self.parse_type_list()?;
            }
        }
        decl.modifiers = modifiers;
        let id = unit.add_class(decl);
        self.consume(&Token::LBrace, "'{'")?;
        while !self.check(&Token::RBrace) {
            if self.scanner.is_eof() {
                return Err(self.error_expected("'}'"));
            }
            self.parse_class_body_declaration(unit, id)?;
        }
        self.advance();
        Ok(id)
    }

    fn parse_type_list(&mut self) -> Result<Vec<TypeRef>> {
        let mut types = vec![self.parse_type()?];
        while self.match_token(&Token::Comma) {
            types.push(self.parse_type()?);
        }
        Ok(types)
    }

    fn parse_throws(&mut self) -> Result<Vec<TypeRef>> {
        if self.match_token(&Token::Throws) {
            self.parse_type_list()
        } else {
            Ok(Vec::new())
        }
    }

    fn parse_formal_parameters(&mut self) -> Result<Vec<Parameter>> {
        self.consume(&Token::LParen, "'('")?;
        let mut parameters = Vec::new();
        if self.match_token(&Token::RParen) {
            return Ok(parameters);
        }
        loop {
            let modifiers = self.parse_modifiers()?;
            let type_ref = self.parse_type()?;
            let (name, location) = self.consume_identifier("parameter name")?;
            let dims = self.parse_dims();
            parameters.push(Parameter {
                modifiers,
                type_ref: type_ref.with_extra_dims(dims),
                name,
                location,
            });
            if !self.match_token(&Token::Comma) {
                break;
            }
        }
        self.consume(&Token::RParen, "')'")?;
        Ok(parameters)
    }

    fn parse_constructor_body(&mut self) -> Result<(Option<ExplicitConstructorInvocation>, Block)> {
        let location = self.consume(&Token::LBrace, "'{'")?.location;
        let explicit = if (self.check(&Token::This) || self.check(&Token::Super))
            && self.check_nth(1, &Token::LParen)
        {
            let token = self.advance();
            let arguments = self.parse_arguments()?;
            self.consume(&Token::Semicolon, "';'")?;
            Some(ExplicitConstructorInvocation {
                is_super: token.is(&Token::Super),
                arguments,
                location: token.location,
            })
        } else {
            None
        };
        let statements = self.parse_block_statements()?;
        self.consume(&Token::RBrace, "'}'")?;
        Ok((explicit, Block { statements, location }))
    }

    // Statements

    pub fn parse_block(&mut self) -> Result<Block> {
        let location = self.consume(&Token::LBrace, "'{'")?.location;
        let statements = self.parse_block_statements()?;
        self.consume(&Token::RBrace, "'}'")?;
        Ok(Block { statements, location })
    }

    /// Statements up to the closing `}` or the end of input, neither consumed
    pub fn parse_block_statements(&mut self) -> Result<Vec<Stmt>> {
        let mut statements = Vec::new();
        while !self.check(&Token::RBrace) && !self.scanner.is_eof() {
            statements.push(self.parse_block_statement()?);
        }
        Ok(statements)
    }

    fn parse_block_statement(&mut self) -> Result<Stmt> {
        if self.check(&Token::Class) || self.check(&Token::Interface) {
            return Err(self.unsupported("local class declaration"));
        }
        if self.looks_like_declaration() {
            let stmt = self.parse_local_variable_declaration()?;
            self.consume(&Token::Semicolon, "';'")?;
            return Ok(Stmt::Declaration(stmt));
        }
        self.parse_statement()
    }

    fn parse_local_variable_declaration(&mut self) -> Result<VarDeclStmt> {
        let location = self.location();
        let modifiers = self.parse_modifiers()?;
        let type_ref = self.parse_type()?;
        if type_ref.is_void() {
            return Err(ParseError::invalid_syntax("variables cannot have type void", location));
        }
        let mut variables = Vec::new();
        loop {
            let (name, var_location) = self.consume_identifier("variable name")?;
            let array_dims = self.parse_dims();
            let initializer = if self.match_token(&Token::Assign) {
                Some(self.parse_variable_initializer()?)
            } else {
                None
            };
            variables.push(VariableDeclarator { name, array_dims, initializer, location: var_location });
            if !self.match_token(&Token::Comma) {
                break;
            }
        }
        Ok(VarDeclStmt { modifiers, type_ref, variables, location })
    }

    fn parse_variable_initializer(&mut self) -> Result<Expr> {
        if self.check(&Token::LBrace) {
            Ok(Expr::ArrayInitializer(self.parse_array_initializer()?))
        } else {
            self.parse_expression()
        }
    }

    fn parse_array_initializer(&mut self) -> Result<ArrayInitializerExpr> {
        let location = self.consume(&Token::LBrace, "'{'")?.location;
        let mut elements = Vec::new();
        while !self.check(&Token::RBrace) {
            elements.push(self.parse_variable_initializer()?);
            if !self.match_token(&Token::Comma) {
                break;
            }
        }
        self.consume(&Token::RBrace, "'}'")?;
        Ok(ArrayInitializerExpr { elements, location })
    }

    pub fn parse_statement(&mut self) -> Result<Stmt> {
        self.enter()?;
        let result = self.parse_statement_inner();
        self.leave();
        result
    }

    fn parse_statement_inner(&mut self) -> Result<Stmt> {
        let location = self.location();
        let token = self.peek().token.clone();
        match token {
            Token::LBrace => Ok(Stmt::Block(self.parse_block()?)),
            Token::Semicolon => {
                self.advance();
                Ok(Stmt::Empty(location))
            }
            Token::If => {
                self.advance();
                let condition = self.parse_par_expression()?;
                let then_branch = Box::new(self.parse_statement()?);
                let else_branch = if self.match_token(&Token::Else) {
                    Some(Box::new(self.parse_statement()?))
                } else {
                    None
                };
                Ok(Stmt::If(IfStmt { condition, then_branch, else_branch, location }))
            }
            Token::While => {
                self.advance();
                let condition = self.parse_par_expression()?;
                let body = Box::new(self.parse_statement()?);
                Ok(Stmt::While(WhileStmt { condition, body, location }))
            }
            Token::Do => {
                self.advance();
                let body = Box::new(self.parse_statement()?);
                self.consume(&Token::While, "'while'")?;
                let condition = self.parse_par_expression()?;
                self.consume(&Token::Semicolon, "';'")?;
                Ok(Stmt::DoWhile(DoWhileStmt { body, condition, location }))
            }
            Token::For => self.parse_for_statement(),
            Token::Return => {
                self.advance();
                let value = if self.check(&Token::Semicolon) {
                    None
                } else {
                    Some(self.parse_expression()?)
                };
                self.consume(&Token::Semicolon, "';'")?;
                Ok(Stmt::Return(ReturnStmt { value, location }))
            }
            Token::Break => {
                self.advance();
                if self.check(&Token::Identifier) {
                    return Err(self.unsupported("labelled break"));
                }
                self.consume(&Token::Semicolon, "';'")?;
                Ok(Stmt::Break(BreakStmt { location }))
            }
            Token::Continue => {
                self.advance();
                if self.check(&Token::Identifier) {
                    return Err(self.unsupported("labelled continue"));
                }
                self.consume(&Token::Semicolon, "';'")?;
                Ok(Stmt::Continue(ContinueStmt { location }))
            }
            Token::Throw => {
                self.advance();
                let expr = self.parse_expression()?;
                self.consume(&Token::Semicolon, "';'")?;
                Ok(Stmt::Throw(ThrowStmt { expr, location }))
            }
            Token::Switch => Err(self.unsupported("switch statement")),
            Token::Try => Err(self.unsupported("try statement")),
            Token::Synchronized => Err(self.unsupported("synchronized statement")),
            Token::Assert => Err(self.unsupported("assert statement")),
            Token::Identifier if self.check_nth(1, &Token::Colon) => Err(self.unsupported("labelled statement")),
            _ => {
                let expr = self.parse_expression()?;
                self.consume(&Token::Semicolon, "';'")?;
                Ok(Stmt::Expression(ExprStmt { expr, location }))
            }
        }
    }

    fn parse_par_expression(&mut self) -> Result<Expr> {
        self.consume(&Token::LParen, "'('")?;
        let expr = self.parse_expression()?;
        self.consume(&Token::RParen, "')'")?;
        Ok(expr)
    }

    fn parse_for_statement(&mut self) -> Result<Stmt> {
        let location = self.consume(&Token::For, "'for'")?.location;
        self.consume(&Token::LParen, "'('")?;
        let mut init = Vec::new();
        if !self.check(&Token::Semicolon) {
            if self.looks_like_declaration() {
                let decl = self.parse_local_variable_declaration()?;
                if self.check(&Token::Colon) {
                    return Err(self.unsupported("enhanced for statement"));
                }
                init.push(Stmt::Declaration(decl));
            } else {
                loop {
                    let expr_location = self.location();
                    let expr = self.parse_expression()?;
                    init.push(Stmt::Expression(ExprStmt { expr, location: expr_location }));
                    if !self.match_token(&Token::Comma) {
                        break;
                    }
                }
            }
        }
        self.consume(&Token::Semicolon, "';'")?;
        let condition = if self.check(&Token::Semicolon) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.consume(&Token::Semicolon, "';'")?;
        let mut update = Vec::new();
        if !self.check(&Token::RParen) {
            loop {
                update.push(self.parse_expression()?);
                if !self.match_token(&Token::Comma) {
                    break;
                }
            }
        }
        self.consume(&Token::RParen, "')'")?;
        let body = Box::new(self.parse_statement()?);
        Ok(Stmt::For(ForStmt { init, condition, update, body, location }))
    }

    // Expressions

    pub fn parse_expression(&mut self) -> Result<Expr> {
        self.enter()?;
        let result = self.parse_assignment_expr();
        self.leave();
        result
    }

    fn parse_assignment_expr(&mut self) -> Result<Expr> {
        let left = self.parse_conditional_expr()?;
        let operator = match self.peek().token {
            Token::Assign => AssignmentOp::Assign,
            Token::AddAssign => AssignmentOp::AddAssign,
            Token::SubAssign => AssignmentOp::SubAssign,
            Token::MulAssign => AssignmentOp::MulAssign,
            Token::DivAssign => AssignmentOp::DivAssign,
            Token::ModAssign => AssignmentOp::ModAssign,
            Token::AndAssign => AssignmentOp::AndAssign,
            Token::OrAssign => AssignmentOp::OrAssign,
            Token::XorAssign => AssignmentOp::XorAssign,
            Token::LShiftAssign => AssignmentOp::LShiftAssign,
            Token::RShiftAssign => AssignmentOp::RShiftAssign,
            Token::URShiftAssign => AssignmentOp::URShiftAssign,
            _ => return Ok(left),
        };
        let location = self.advance().location;
        if !matches!(
            left.unparenthesized(),
            Expr::Identifier(_) | Expr::FieldAccess(_) | Expr::ArrayAccess(_)
        ) {
            return Err(ParseError::invalid_syntax("invalid assignment target", location));
        }
        let value = self.parse_expression()?;
        Ok(Expr::Assignment(AssignmentExpr {
            target: Box::new(left),
            operator,
            value: Box::new(value),
            location,
        }))
    }

    fn parse_conditional_expr(&mut self) -> Result<Expr> {
        let condition = self.parse_logical_or_expr()?;
        if !self.check(&Token::Question) {
            return Ok(condition);
        }
        let location = self.advance().location;
        let then_expr = self.parse_expression()?;
        self.consume(&Token::Colon, "':'")?;
        self.enter()?;
        let else_expr = self.parse_conditional_expr();
        self.leave();
        Ok(Expr::Conditional(ConditionalExpr {
            condition: Box::new(condition),
            then_expr: Box::new(then_expr),
            else_expr: Box::new(else_expr?),
            location,
        }))
    }

    /// One left-associative precedence level
    fn parse_binary_level(
        &mut self,
        operators: &[(Token, BinaryOp)],
        next: fn(&mut Self) -> Result<Expr>,
    ) -> Result<Expr> {
        let mut expr = next(self)?;
        'outer: loop {
            for (token, operator) in operators {
                if self.check(token) {
                    let location = self.advance().location;
                    let right = next(self)?;
                    expr = Expr::Binary(BinaryExpr {
                        left: Box::new(expr),
                        operator: *operator,
                        right: Box::new(right),
                        location,
                    });
                    continue 'outer;
                }
            }
            return Ok(expr);
        }
    }

    fn parse_logical_or_expr(&mut self) -> Result<Expr> {
        self.parse_binary_level(&[(Token::PipePipe, BinaryOp::LogicalOr)], Self::parse_logical_and_expr)
    }

    fn parse_logical_and_expr(&mut self) -> Result<Expr> {
        self.parse_binary_level(&[(Token::AndAnd, BinaryOp::LogicalAnd)], Self::parse_bitwise_or_expr)
    }

    fn parse_bitwise_or_expr(&mut self) -> Result<Expr> {
        self.parse_binary_level(&[(Token::Pipe, BinaryOp::Or)], Self::parse_bitwise_xor_expr)
    }

    fn parse_bitwise_xor_expr(&mut self) -> Result<Expr> {
        self.parse_binary_level(&[(Token::Caret, BinaryOp::Xor)], Self::parse_bitwise_and_expr)
    }

    fn parse_bitwise_and_expr(&mut self) -> Result<Expr> {
        self.parse_binary_level(&[(Token::Amp, BinaryOp::And)], Self::parse_equality_expr)
    }

    fn parse_equality_expr(&mut self) -> Result<Expr> {
        self.parse_binary_level(
            &[(Token::Eq, BinaryOp::Eq), (Token::Ne, BinaryOp::Ne)],
            Self::parse_relational_expr,
        )
    }

    fn parse_relational_expr(&mut self) -> Result<Expr> {
        let mut expr = self.parse_shift_expr()?;
        loop {
            let token = self.peek().token.clone();
            let operator = match token {
                Token::Lt => BinaryOp::Lt,
                Token::Le => BinaryOp::Le,
                Token::Gt => BinaryOp::Gt,
                Token::Ge => BinaryOp::Ge,
                Token::InstanceOf => {
                    let location = self.advance().location;
                    let target_type = self.parse_type()?;
                    expr = Expr::InstanceOf(InstanceOfExpr {
                        expr: Box::new(expr),
                        target_type,
                        location,
                    });
                    continue;
                }
                _ => return Ok(expr),
            };
            let location = self.advance().location;
            let right = self.parse_shift_expr()?;
            expr = Expr::Binary(BinaryExpr {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
                location,
            });
        }
    }

    fn parse_shift_expr(&mut self) -> Result<Expr> {
        self.parse_binary_level(
            &[
                (Token::LShift, BinaryOp::LShift),
                (Token::RShift, BinaryOp::RShift),
                (Token::URShift, BinaryOp::URShift),
            ],
            Self::parse_additive_expr,
        )
    }

    fn parse_additive_expr(&mut self) -> Result<Expr> {
        self.parse_binary_level(
            &[(Token::Plus, BinaryOp::Add), (Token::Minus, BinaryOp::Sub)],
            Self::parse_multiplicative_expr,
        )
    }

    fn parse_multiplicative_expr(&mut self) -> Result<Expr> {
        self.parse_binary_level(
            &[
                (Token::Star, BinaryOp::Mul),
                (Token::Slash, BinaryOp::Div),
                (Token::Percent, BinaryOp::Mod),
            ],
            Self::parse_unary_expr,
        )
    }

    fn parse_unary_expr(&mut self) -> Result<Expr> {
        self.enter()?;
        let result = self.parse_unary_expr_inner();
        self.leave();
        result
    }

    fn parse_unary_expr_inner(&mut self) -> Result<Expr> {
        let location = self.location();
        let token = self.peek().token.clone();
        let operator = match token {
            Token::Plus => UnaryOp::Plus,
            Token::Minus => {
                // The one place where 2147483648 and 9223372036854775808L are legal
                if self.check_nth(1, &Token::IntegerLiteral) {
                    let lexeme = self.peek_nth(1).lexeme.replace('_', "");
                    let value = match lexeme.as_str() {
                        "2147483648" => Some(Literal::Int(i32::MIN)),
                        "9223372036854775808L" | "9223372036854775808l" => Some(Literal::Long(i64::MIN)),
                        _ => None,
                    };
                    if let Some(value) = value {
                        self.advance();
                        self.advance();
                        return self.parse_postfix(Expr::Literal(LiteralExpr { value, location }));
                    }
                }
                UnaryOp::Minus
            }
            Token::Bang => UnaryOp::Not,
            Token::Tilde => UnaryOp::BitNot,
            Token::Inc => UnaryOp::PreInc,
            Token::Dec => UnaryOp::PreDec,
            Token::LParen if self.looks_like_cast() => {
                self.advance();
                let target_type = self.parse_type()?;
                self.consume(&Token::RParen, "')'")?;
                let expr = self.parse_unary_expr()?;
                return Ok(Expr::Cast(CastExpr { target_type, expr: Box::new(expr), location }));
            }
            _ => {
                let primary = self.parse_primary()?;
                return self.parse_postfix(primary);
            }
        };
        self.advance();
        let operand = self.parse_unary_expr()?;
        Ok(Expr::Unary(UnaryExpr { operator, operand: Box::new(operand), location }))
    }

    /// `( Type )` followed by something that can start an operand
    fn looks_like_cast(&self) -> bool {
        if self.peek_nth(1).token.is_primitive_type() {
            return match self.scan_type(1) {
                Some(n) => self.check_nth(n, &Token::RParen),
                None => false,
            };
        }
        let n = match self.scan_type(1) {
            Some(n) if self.check_nth(n, &Token::RParen) => n,
            _ => return false,
        };
        let next = &self.peek_nth(n + 1).token;
        matches!(
            next,
            Token::Identifier
                | Token::LParen
                | Token::Bang
                | Token::Tilde
                | Token::This
                | Token::Super
                | Token::New
        ) || (next.is_literal())
    }

    fn parse_postfix(&mut self, mut expr: Expr) -> Result<Expr> {
        loop {
            let location = self.location();
            let token = self.peek().token.clone();
            match token {
                Token::Dot => {
                    self.advance();
                    if self.check(&Token::New) || self.check(&Token::This) || self.check(&Token::Class) {
                        return Err(self.unsupported(&format!("qualified '{}'", self.peek().lexeme)));
                    }
                    let (name, name_location) = self.consume_identifier("member name")?;
                    if self.check(&Token::LParen) {
                        let arguments = self.parse_arguments()?;
                        expr = Expr::MethodCall(MethodCallExpr {
                            target: Some(Box::new(expr)),
                            name,
                            arguments,
                            location: name_location,
                        });
                    } else {
                        expr = Expr::FieldAccess(FieldAccessExpr {
                            target: Box::new(expr),
                            name,
                            location: name_location,
                        });
                    }
                }
                Token::LBracket => {
                    self.advance();
                    let index = self.parse_expression()?;
                    self.consume(&Token::RBracket, "']'")?;
                    expr = Expr::ArrayAccess(ArrayAccessExpr {
                        array: Box::new(expr),
                        index: Box::new(index),
                        location,
                    });
                }
                Token::Inc | Token::Dec => {
                    let operator = if self.advance().is(&Token::Inc) {
                        UnaryOp::PostInc
                    } else {
                        UnaryOp::PostDec
                    };
                    expr = Expr::Unary(UnaryExpr { operator, operand: Box::new(expr), location });
                }
                _ => return Ok(expr),
            }
        }
    }

    fn parse_arguments(&mut self) -> Result<Vec<Expr>> {
        self.consume(&Token::LParen, "'('")?;
        let mut arguments = Vec::new();
        if self.match_token(&Token::RParen) {
            return Ok(arguments);
        }
        loop {
            arguments.push(self.parse_expression()?);
            if !self.match_token(&Token::Comma) {
                break;
            }
        }
        self.consume(&Token::RParen, "')'")?;
        Ok(arguments)
    }

    fn parse_primary(&mut self) -> Result<Expr> {
        let location = self.location();
        let token = self.peek().token.clone();
        match token {
            Token::IntegerLiteral
            | Token::FloatingLiteral
            | Token::CharLiteral
            | Token::StringLiteral
            | Token::True
            | Token::False
            | Token::Null => {
                let token = self.advance();
                let value = parse_literal(&token)?;
                Ok(Expr::Literal(LiteralExpr { value, location }))
            }
            Token::This => {
                self.advance();
                if self.check(&Token::LParen) {
                    return Err(ParseError::invalid_syntax(
                        "constructor invocation must be the first statement",
                        location,
                    ));
                }
                Ok(Expr::This(location))
            }
            Token::Super => {
                self.advance();
                if !self.check(&Token::Dot) {
                    return Err(self.error_expected("'.'"));
                }
                Ok(Expr::Super(location))
            }
            Token::LParen => {
                self.advance();
                let expr = self.parse_expression()?;
                self.consume(&Token::RParen, "')'")?;
                Ok(Expr::Parenthesized(Box::new(expr)))
            }
            Token::New => self.parse_new_expr(),
            Token::Identifier => {
                let token = self.advance();
                if self.check(&Token::LParen) {
                    let arguments = self.parse_arguments()?;
                    Ok(Expr::MethodCall(MethodCallExpr {
                        target: None,
                        name: token.lexeme,
                        arguments,
                        location,
                    }))
                } else {
                    Ok(Expr::Identifier(IdentifierExpr { name: token.lexeme, location }))
                }
            }
            _ if token.is_primitive_type() => Err(self.unsupported("class literal")),
            _ => Err(self.error_expected("expression")),
        }
    }

    fn parse_new_expr(&mut self) -> Result<Expr> {
        let location = self.consume(&Token::New, "'new'")?.location;
        let type_location = self.location();
        let name = if self.peek().token.is_primitive_type() && !self.check(&Token::Void) {
            self.advance().lexeme
        } else if self.check(&Token::Identifier) {
            self.parse_qualified_name()?.0
        } else {
            return Err(self.error_expected("type"));
        };
        if self.check(&Token::Lt) {
            return Err(self.unsupported("generic instantiation"));
        }

        if self.check(&Token::LBracket) {
            // new T[n][]... or new T[]...{ ... }
            let mut dimension = None;
            let mut dims = 0;
            if !self.check_nth(1, &Token::RBracket) {
                self.advance();
                dimension = Some(Box::new(self.parse_expression()?));
                self.consume(&Token::RBracket, "']'")?;
                dims = 1;
                if self.check(&Token::LBracket) && !self.check_nth(1, &Token::RBracket) {
                    return Err(self.unsupported("multi-dimensional array creation"));
                }
            }
            dims += self.parse_dims();
            let array_type = TypeRef::named(name, dims, type_location);
            let initializer = if dimension.is_none() {
                if !self.check(&Token::LBrace) {
                    return Err(self.error_expected("array dimension or initializer"));
                }
                Some(self.parse_array_initializer()?)
            } else {
                None
            };
            return Ok(Expr::NewArray(NewArrayExpr { array_type, dimension, initializer, location }));
        }

        if TypeRef::named(name.clone(), 0, type_location).is_void() || is_primitive_name(&name) {
            return Err(self.error_expected("'['"));
        }
        let arguments = self.parse_arguments()?;
        if self.check(&Token::LBrace) {
            return Err(self.unsupported("anonymous class"));
        }
        Ok(Expr::New(NewExpr {
            target_type: TypeRef::named(name, 0, type_location),
            arguments,
            location,
        }))
    }
}

fn is_primitive_name(name: &str) -> bool {
    matches!(name, "boolean" | "byte" | "short" | "int" | "long" | "char" | "float" | "double")
}

/// Decode the value of a literal token
pub fn parse_literal(token: &LexicalToken) -> Result<Literal> {
    let location = token.location;
    let lexeme = token.lexeme.as_str();
    let invalid = |message: String| ParseError::invalid_syntax(&message, location);
    match token.token {
        Token::True => Ok(Literal::Boolean(true)),
        Token::False => Ok(Literal::Boolean(false)),
        Token::Null => Ok(Literal::Null),
        Token::IntegerLiteral => {
            let text = lexeme.replace('_', "");
            let (digits, is_long) = match text.strip_suffix(['l', 'L']) {
                Some(digits) => (digits.to_string(), true),
                None => (text.clone(), false),
            };
            let (radix, body) = if let Some(hex) = digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
                (16, hex)
            } else if let Some(bin) = digits.strip_prefix("0b").or_else(|| digits.strip_prefix("0B")) {
                (2, bin)
            } else if digits.len() > 1 && digits.starts_with('0') {
                (8, &digits[1..])
            } else {
                (10, digits.as_str())
            };
            let out_of_range = || invalid(format!("integer literal '{}' out of range", lexeme));
            if is_long {
                let value = if radix == 10 {
                    body.parse::<i64>().map_err(|_| out_of_range())?
                } else {
                    u64::from_str_radix(body, radix).map_err(|_| out_of_range())? as i64
                };
                Ok(Literal::Long(value))
            } else {
                let value = if radix == 10 {
                    body.parse::<i32>().map_err(|_| out_of_range())?
                } else {
                    u32::from_str_radix(body, radix).map_err(|_| out_of_range())? as i32
                };
                Ok(Literal::Int(value))
            }
        }
        Token::FloatingLiteral => {
            let text = lexeme.replace('_', "");
            if let Some(body) = text.strip_suffix(['f', 'F']) {
                let value = body
                    .parse::<f32>()
                    .map_err(|_| invalid(format!("invalid float literal '{}'", lexeme)))?;
                if value.is_infinite() {
                    return Err(invalid(format!("float literal '{}' out of range", lexeme)));
                }
                Ok(Literal::Float(value))
            } else {
                let body = text.strip_suffix(['d', 'D']).unwrap_or(&text);
                let value = body
                    .parse::<f64>()
                    .map_err(|_| invalid(format!("invalid double literal '{}'", lexeme)))?;
                if value.is_infinite() {
                    return Err(invalid(format!("double literal '{}' out of range", lexeme)));
                }
                Ok(Literal::Double(value))
            }
        }
        Token::CharLiteral => {
            let body = &lexeme[1..lexeme.len() - 1];
            let text = unescape(body).map_err(invalid)?;
            let units: Vec<u16> = text.encode_utf16().collect();
            match units.as_slice() {
                [unit] => Ok(Literal::Char(*unit)),
                _ => Err(invalid(format!("invalid character literal {}", lexeme))),
            }
        }
        Token::StringLiteral => {
            let body = &lexeme[1..lexeme.len() - 1];
            Ok(Literal::String(unescape(body).map_err(invalid)?))
        }
        _ => Err(ParseError::unexpected_token("literal", &token.describe(), location)),
    }
}
