use crate::ast::{Expr, FunctionDecl, Literal, Stmt};
use crate::diagnostic::Diagnostic;
use crate::token::{Token, TokenKind};
use std::rc::Rc;

/// The most parameters a function may declare, and the most arguments a call may pass.
pub const MAX_ARITY: usize = 255;

#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub token: Token,
    pub message: String,
}

impl ParseError {
    pub fn new(token: &Token, message: impl Into<String>) -> Self {
        Self {
            token: token.clone(),
            message: message.into(),
        }
    }

    pub fn line(&self) -> usize {
        self.token.line
    }

    pub fn to_diagnostic(&self) -> Diagnostic {
        Diagnostic::syntax(&self.token, self.message.clone())
    }
}

pub struct ParseResult {
    pub statements: Vec<Stmt>,
    pub errors: Vec<ParseError>,
}

impl ParseResult {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FunctionKind {
    None,
    Function,
    Method,
    Initializer,
}

impl FunctionKind {
    fn describe(self) -> &'static str {
        match self {
            FunctionKind::Method | FunctionKind::Initializer => "method",
            FunctionKind::None | FunctionKind::Function => "function",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ClassKind {
    None,
    Class,
    Subclass,
}

/// Recursive-descent parser over a token sequence ending in `Eof`.
///
/// Besides grammar errors it tracks the enclosing function and class so it can
/// reject `return`, `this` and `super` where they make no sense. Those
/// structural errors are only surfaced when the program is otherwise well formed.
pub struct Parser {
    tokens: Vec<Token>,
    current: usize,
    errors: Vec<ParseError>,
    structural: Vec<ParseError>,
    function: FunctionKind,
    class: ClassKind,
}

impl Parser {
    pub fn new(mut tokens: Vec<Token>) -> Self {
        if !tokens.last().is_some_and(Token::is_eof) {
            let line = tokens.last().map(|token| token.line).unwrap_or(1);
            tokens.push(Token::eof(line));
        }
        Self {
            tokens,
            current: 0,
            errors: Vec::new(),
            structural: Vec::new(),
            function: FunctionKind::None,
            class: ClassKind::None,
        }
    }

    pub fn parse(mut self) -> ParseResult {
        let mut statements = Vec::new();
        while !self.is_at_end() {
            if let Some(statement) = self.declaration() {
                statements.push(statement);
            }
        }

        let errors = if self.errors.is_empty() {
            self.structural
        } else {
            self.errors
        };
        tracing::debug!(
            statements = statements.len(),
            errors = errors.len(),
            "parsed program"
        );
        ParseResult { statements, errors }
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.current]
    }

    fn previous(&self) -> &Token {
        &self.tokens[self.current.saturating_sub(1)]
    }

    fn is_at_end(&self) -> bool {
        self.peek().is_eof()
    }

    fn check(&self, kind: &TokenKind) -> bool {
        !self.is_at_end() && self.peek().kind.same_kind(kind)
    }

    fn advance(&mut self) -> Token {
        if !self.is_at_end() {
            self.current += 1;
        }
        self.previous().clone()
    }

    fn match_kind(&mut self, kinds: &[TokenKind]) -> bool {
        if kinds.iter().any(|kind| self.check(kind)) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind, message: &str) -> Result<Token, ParseError> {
        if self.check(&kind) {
            Ok(self.advance())
        } else {
            Err(ParseError::new(self.peek(), message))
        }
    }

    /// Report an error without unwinding; parsing carries on from here.
    fn add_error(&mut self, token: &Token, message: &str) {
        self.errors.push(ParseError::new(token, message));
    }

    fn add_structural_error(&mut self, token: &Token, message: &str) {
        self.structural.push(ParseError::new(token, message));
    }

    /// Skip to the next likely statement boundary after an error.
    fn synchronize(&mut self) {
        self.advance();
        while !self.is_at_end() {
            if self.previous().kind == TokenKind::Semicolon {
                return;
            }
            if self.peek().kind.starts_statement() {
                return;
            }
            self.advance();
        }
    }

    fn declaration(&mut self) -> Option<Stmt> {
        let result = if self.match_kind(&[TokenKind::Class]) {
            self.class_declaration()
        } else if self.match_kind(&[TokenKind::Fun]) {
            self.function(FunctionKind::Function).map(Stmt::Function)
        } else if self.match_kind(&[TokenKind::Var]) {
            self.var_declaration()
        } else {
            self.statement()
        };

        match result {
            Ok(statement) => Some(statement),
            Err(error) => {
                tracing::trace!(line = error.line(), message = %error.message, "recovering from syntax error");
                self.errors.push(error);
                self.synchronize();
                None
            }
        }
    }

    fn class_declaration(&mut self) -> Result<Stmt, ParseError> {
        let name = self.expect(TokenKind::Identifier, "Expect class name.")?;

        let superclass = if self.match_kind(&[TokenKind::Less]) {
            let superclass_name = self.expect(TokenKind::Identifier, "Expect superclass name.")?;
            if superclass_name.lexeme == name.lexeme {
                self.add_structural_error(&superclass_name, "A class can't inherit from itself.");
            }
            Some(Expr::Variable {
                name: superclass_name,
            })
        } else {
            None
        };

        self.expect(TokenKind::LeftBrace, "Expect '{' before class body.")?;

        let kind = if superclass.is_some() {
            ClassKind::Subclass
        } else {
            ClassKind::Class
        };
        let enclosing = std::mem::replace(&mut self.class, kind);
        let methods = self.class_body();
        self.class = enclosing;
        let methods = methods?;

        self.expect(TokenKind::RightBrace, "Expect '}' after class body.")?;
        Ok(Stmt::Class {
            name,
            superclass,
            methods,
        })
    }

    fn class_body(&mut self) -> Result<Vec<Rc<FunctionDecl>>, ParseError> {
        let mut methods = Vec::new();
        while !self.check(&TokenKind::RightBrace) && !self.is_at_end() {
            methods.push(self.function(FunctionKind::Method)?);
        }
        Ok(methods)
    }

    fn function(&mut self, kind: FunctionKind) -> Result<Rc<FunctionDecl>, ParseError> {
        let noun = kind.describe();
        let name = self.expect(TokenKind::Identifier, &format!("Expect {} name.", noun))?;
        self.expect(
            TokenKind::LeftParen,
            &format!("Expect '(' after {} name.", noun),
        )?;

        let mut params = Vec::new();
        if !self.check(&TokenKind::RightParen) {
            loop {
                if params.len() >= MAX_ARITY {
                    let token = self.peek().clone();
                    self.add_error(&token, "Can't have more than 255 parameters.");
                }
                params.push(self.expect(TokenKind::Identifier, "Expect parameter name.")?);
                if !self.match_kind(&[TokenKind::Comma]) {
                    break;
                }
            }
        }
        self.expect(TokenKind::RightParen, "Expect ')' after parameters.")?;
        self.expect(
            TokenKind::LeftBrace,
            &format!("Expect '{{' before {} body.", noun),
        )?;

        let body_kind = if kind == FunctionKind::Method && name.lexeme == crate::value::INITIALIZER {
            FunctionKind::Initializer
        } else {
            kind
        };
        let enclosing = std::mem::replace(&mut self.function, body_kind);
        let body = self.block();
        self.function = enclosing;

        Ok(Rc::new(FunctionDecl {
            name,
            params,
            body: body?,
        }))
    }

    fn var_declaration(&mut self) -> Result<Stmt, ParseError> {
        let name = self.expect(TokenKind::Identifier, "Expect variable name.")?;
        let initializer = if self.match_kind(&[TokenKind::Equal]) {
            Some(self.expression()?)
        } else {
            None
        };
        self.expect(
            TokenKind::Semicolon,
            "Expect ';' after variable declaration.",
        )?;
        Ok(Stmt::Var { name, initializer })
    }

    fn statement(&mut self) -> Result<Stmt, ParseError> {
        match self.peek().kind {
            TokenKind::For => {
                self.advance();
                self.for_statement()
            }
            TokenKind::If => {
                self.advance();
                self.if_statement()
            }
            TokenKind::Print => {
                let keyword = self.advance();
                let value = self.expression()?;
                self.expect(TokenKind::Semicolon, "Expect ';' after value.")?;
                Ok(Stmt::Print { keyword, value })
            }
            TokenKind::Return => {
                self.advance();
                self.return_statement()
            }
            TokenKind::While => {
                self.advance();
                self.while_statement()
            }
            TokenKind::LeftBrace => {
                self.advance();
                Ok(Stmt::Block(self.block()?))
            }
            _ => self.expression_statement(),
        }
    }

    /// `for` has no node of its own; it becomes a block around a `while`.
    fn for_statement(&mut self) -> Result<Stmt, ParseError> {
        self.expect(TokenKind::LeftParen, "Expect '(' after 'for'.")?;

        let initializer = if self.match_kind(&[TokenKind::Semicolon]) {
            None
        } else if self.match_kind(&[TokenKind::Var]) {
            Some(self.var_declaration()?)
        } else {
            Some(self.expression_statement()?)
        };

        let condition = if self.check(&TokenKind::Semicolon) {
            None
        } else {
            Some(self.expression()?)
        };
        self.expect(TokenKind::Semicolon, "Expect ';' after loop condition.")?;

        let increment = if self.check(&TokenKind::RightParen) {
            None
        } else {
            Some(self.expression()?)
        };
        self.expect(TokenKind::RightParen, "Expect ')' after for clauses.")?;

        let mut body = self.statement()?;

        if let Some(increment) = increment {
            body = Stmt::Block(vec![body, Stmt::Expression(increment)]);
        }

        body = Stmt::While {
            condition: condition.unwrap_or(Expr::Literal(Literal::Bool(true))),
            body: Box::new(body),
        };

        if let Some(initializer) = initializer {
            body = Stmt::Block(vec![initializer, body]);
        }

        Ok(body)
    }

    fn if_statement(&mut self) -> Result<Stmt, ParseError> {
        self.expect(TokenKind::LeftParen, "Expect '(' after 'if'.")?;
        let condition = self.expression()?;
        self.expect(TokenKind::RightParen, "Expect ')' after if condition.")?;

        let then_branch = Box::new(self.statement()?);
        let else_branch = if self.match_kind(&[TokenKind::Else]) {
            Some(Box::new(self.statement()?))
        } else {
            None
        };

        Ok(Stmt::If {
            condition,
            then_branch,
            else_branch,
        })
    }

    fn return_statement(&mut self) -> Result<Stmt, ParseError> {
        let keyword = self.previous().clone();
        if self.function == FunctionKind::None {
            self.add_structural_error(&keyword, "Can't return from top-level code.");
        }

        let value = if self.check(&TokenKind::Semicolon) {
            None
        } else {
            Some(self.expression()?)
        };
        if value.is_some() && self.function == FunctionKind::Initializer {
            self.add_structural_error(&keyword, "Can't return a value from an initializer.");
        }

        self.expect(TokenKind::Semicolon, "Expect ';' after return value.")?;
        Ok(Stmt::Return { keyword, value })
    }

    fn while_statement(&mut self) -> Result<Stmt, ParseError> {
        self.expect(TokenKind::LeftParen, "Expect '(' after 'while'.")?;
        let condition = self.expression()?;
        self.expect(TokenKind::RightParen, "Expect ')' after condition.")?;
        let body = Box::new(self.statement()?);
        Ok(Stmt::While { condition, body })
    }

    /// Parses declarations up to the closing brace; the opening brace is
    /// already consumed. Errors inside the block are recovered here.
    fn block(&mut self) -> Result<Vec<Stmt>, ParseError> {
        let mut statements = Vec::new();
        while !self.check(&TokenKind::RightBrace) && !self.is_at_end() {
            if let Some(statement) = self.declaration() {
                statements.push(statement);
            }
        }
        self.expect(TokenKind::RightBrace, "Expect '}' after block.")?;
        Ok(statements)
    }

    fn expression_statement(&mut self) -> Result<Stmt, ParseError> {
        let expr = self.expression()?;
        self.expect(TokenKind::Semicolon, "Expect ';' after expression.")?;
        Ok(Stmt::Expression(expr))
    }

    fn expression(&mut self) -> Result<Expr, ParseError> {
        self.assignment()
    }

    fn assignment(&mut self) -> Result<Expr, ParseError> {
        let expr = self.binary(1)?;

        if self.match_kind(&[TokenKind::Equal]) {
            let equals = self.previous().clone();
            let value = Box::new(self.assignment()?);

            return match expr {
                Expr::Variable { name } => Ok(Expr::Assign { name, value }),
                Expr::Get { object, name } => Ok(Expr::Set {
                    object,
                    name,
                    value,
                }),
                other => {
                    self.add_error(&equals, "Invalid assignment target.");
                    Ok(other)
                }
            };
        }

        Ok(expr)
    }

    /// Precedence and whether the operator short-circuits.
    fn binary_operator(kind: &TokenKind) -> Option<(u8, bool)> {
        match kind {
            TokenKind::Or => Some((1, true)),
            TokenKind::And => Some((2, true)),
            TokenKind::BangEqual | TokenKind::EqualEqual => Some((3, false)),
            TokenKind::Greater
            | TokenKind::GreaterEqual
            | TokenKind::Less
            | TokenKind::LessEqual => Some((4, false)),
            TokenKind::Minus | TokenKind::Plus => Some((5, false)),
            TokenKind::Slash | TokenKind::Star => Some((6, false)),
            _ => None,
        }
    }

    fn binary(&mut self, min_precedence: u8) -> Result<Expr, ParseError> {
        let mut left = self.unary()?;

        while let Some((precedence, logical)) = Self::binary_operator(&self.peek().kind) {
            if precedence < min_precedence {
                break;
            }
            let operator = self.advance();
            let right = Box::new(self.binary(precedence + 1)?);
            let lhs = Box::new(left);
            left = if logical {
                Expr::Logical {
                    left: lhs,
                    operator,
                    right,
                }
            } else {
                Expr::Binary {
                    left: lhs,
                    operator,
                    right,
                }
            };
        }

        Ok(left)
    }

    fn unary(&mut self) -> Result<Expr, ParseError> {
        if self.match_kind(&[TokenKind::Bang, TokenKind::Minus]) {
            let operator = self.previous().clone();
            let right = Box::new(self.unary()?);
            return Ok(Expr::Unary { operator, right });
        }
        self.call()
    }

    fn call(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.primary()?;

        loop {
            if self.match_kind(&[TokenKind::LeftParen]) {
                expr = self.finish_call(expr)?;
            } else if self.match_kind(&[TokenKind::Dot]) {
                let name =
                    self.expect(TokenKind::Identifier, "Expect property name after '.'.")?;
                expr = Expr::Get {
                    object: Box::new(expr),
                    name,
                };
            } else {
                break;
            }
        }

        Ok(expr)
    }

    fn finish_call(&mut self, callee: Expr) -> Result<Expr, ParseError> {
        let mut arguments = Vec::new();
        if !self.check(&TokenKind::RightParen) {
            loop {
                if arguments.len() >= MAX_ARITY {
                    let token = self.peek().clone();
                    self.add_error(&token, "Can't have more than 255 arguments.");
                }
                arguments.push(self.expression()?);
                if !self.match_kind(&[TokenKind::Comma]) {
                    break;
                }
            }
        }

        let paren = self.expect(TokenKind::RightParen, "Expect ')' after arguments.")?;
        Ok(Expr::Call {
            callee: Box::new(callee),
            paren,
            arguments,
        })
    }

    fn primary(&mut self) -> Result<Expr, ParseError> {
        match self.peek().kind {
            TokenKind::False => {
                self.advance();
                Ok(Expr::Literal(Literal::Bool(false)))
            }
            TokenKind::True => {
                self.advance();
                Ok(Expr::Literal(Literal::Bool(true)))
            }
            TokenKind::Nil => {
                self.advance();
                Ok(Expr::Literal(Literal::Nil))
            }
            TokenKind::Number(_) | TokenKind::String(_) => {
                let token = self.advance();
                Ok(Expr::Literal(token.literal().unwrap_or(Literal::Nil)))
            }
            TokenKind::Super => {
                let keyword = self.advance();
                self.expect(TokenKind::Dot, "Expect '.' after 'super'.")?;
                let method =
                    self.expect(TokenKind::Identifier, "Expect superclass method name.")?;
                match self.class {
                    ClassKind::None => {
                        self.add_structural_error(&keyword, "Can't use 'super' outside of a class.")
                    }
                    ClassKind::Class => self.add_structural_error(
                        &keyword,
                        "Can't use 'super' in a class with no superclass.",
                    ),
                    ClassKind::Subclass => {}
                }
                Ok(Expr::Super { keyword, method })
            }
            TokenKind::This => {
                let keyword = self.advance();
                if self.class == ClassKind::None {
                    self.add_structural_error(&keyword, "Can't use 'this' outside of a class.");
                }
                Ok(Expr::This { keyword })
            }
            TokenKind::Identifier => {
                let name = self.advance();
                Ok(Expr::Variable { name })
            }
            TokenKind::LeftParen => {
                self.advance();
                let expr = self.expression()?;
                self.expect(TokenKind::RightParen, "Expect ')' after expression.")?;
                Ok(Expr::Grouping(Box::new(expr)))
            }
            _ => Err(ParseError::new(self.peek(), "Expect expression.")),
        }
    }
}
