use std::rc::Rc;

use crate::{
    ast::{
        AlterArm, BinaryOp, ClassDecl, Expr, ExprKind, FunctionBody, FunctionDecl, Literal,
        Program, Stmt, StmtKind, UnaryOp,
    },
    diagnostics::{Diagnostic, DiagnosticKind, SourceSpan},
    lexer::{Keyword, Lexer, Operator, Punctuation, Token, TokenKind},
};

pub fn parse_program(source: &str) -> Result<Program, Diagnostic> {
    let tokens = Lexer::new(source).tokenize()?;
    Parser::new(tokens).parse_program()
}

/// Recursive-descent parser over a token stream ending in [`TokenKind::End`].
pub struct Parser {
    tokens: Vec<Token>,
    current: usize,
}

impl Parser {
    pub fn new(mut tokens: Vec<Token>) -> Self {
        if tokens.last().is_none_or(|token| token.kind != TokenKind::End) {
            let span = tokens.last().map_or(SourceSpan::new(1, 1), |token| token.span);
            tokens.push(Token {
                kind: TokenKind::End,
                lexeme: String::new(),
                span,
            });
        }
        Self { tokens, current: 0 }
    }

    pub fn parse_program(&mut self) -> Result<Program, Diagnostic> {
        let mut items = Vec::new();
        while !self.is_at_end() {
            items.push(self.parse_statement()?);
        }
        Ok(Program { items })
    }

    fn parse_block_items(&mut self) -> Result<Vec<Stmt>, Diagnostic> {
        let mut items = Vec::new();
        while !self.check_punct(Punctuation::RBrace) && !self.is_at_end() {
            items.push(self.parse_statement()?);
        }
        self.consume_punct(Punctuation::RBrace, "`}` to close block")?;
        Ok(items)
    }

    fn parse_block(&mut self) -> Result<Vec<Stmt>, Diagnostic> {
        self.consume_punct(Punctuation::LBrace, "`{` to start block")?;
        self.parse_block_items()
    }

    /// A `{ block }` or the one-line `-> stmt` form.
    fn parse_body(&mut self) -> Result<Vec<Stmt>, Diagnostic> {
        if self.matches_op(Operator::Arrow) {
            Ok(vec![self.parse_statement()?])
        } else {
            self.parse_block()
        }
    }

    fn parse_statement(&mut self) -> Result<Stmt, Diagnostic> {
        let stmt = self.parse_statement_kind()?;
        self.consume_optional_semicolon();
        Ok(stmt)
    }

    fn parse_statement_kind(&mut self) -> Result<Stmt, Diagnostic> {
        let token = self.peek().clone();
        match token.kind {
            TokenKind::Keyword(Keyword::Give) => self.parse_print(),
            TokenKind::Keyword(Keyword::Ask) => self.parse_ask_statement(),
            TokenKind::Keyword(Keyword::Func) => {
                let decl = self.parse_function()?;
                Ok(Stmt {
                    span: decl.span,
                    kind: StmtKind::Function(Rc::new(decl)),
                })
            }
            TokenKind::Keyword(Keyword::Class) => self.parse_class(),
            TokenKind::Keyword(Keyword::If) => self.parse_if(),
            TokenKind::Keyword(Keyword::Loop) => self.parse_loop(),
            TokenKind::Keyword(Keyword::Repeat) => self.parse_repeat(),
            TokenKind::Keyword(Keyword::Return) => self.parse_return(),
            TokenKind::Keyword(Keyword::Break) => {
                self.advance();
                Ok(Stmt {
                    span: token.span,
                    kind: StmtKind::Break,
                })
            }
            TokenKind::Keyword(Keyword::Continue) => {
                self.advance();
                Ok(Stmt {
                    span: token.span,
                    kind: StmtKind::Continue,
                })
            }
            TokenKind::Keyword(Keyword::Try) => self.parse_try(),
            TokenKind::Keyword(Keyword::Alter) => self.parse_alter(),
            TokenKind::Keyword(Keyword::Task) => self.parse_task(),
            TokenKind::Keyword(Keyword::Aik) => self.parse_codegen(),
            TokenKind::Punctuation(Punctuation::LBrace) => {
                self.advance();
                let items = self.parse_block_items()?;
                Ok(Stmt {
                    span: token.span,
                    kind: StmtKind::Block(items),
                })
            }
            _ => self.parse_expression_statement(),
        }
    }

    fn parse_print(&mut self) -> Result<Stmt, Diagnostic> {
        self.parse_print_parts(true)
    }

    /// `give` with its comma-separated parts. Inline `alter` arms pass
    /// `false` so a trailing `,` separates arms instead.
    fn parse_print_parts(&mut self, allow_list: bool) -> Result<Stmt, Diagnostic> {
        let start = self.consume_keyword(Keyword::Give)?.span;
        let mut parts = vec![self.parse_expression()?];
        while allow_list && self.matches_punct(Punctuation::Comma) {
            parts.push(self.parse_expression()?);
        }
        Ok(Stmt {
            span: start,
            kind: StmtKind::Print(parts),
        })
    }

    fn parse_ask_statement(&mut self) -> Result<Stmt, Diagnostic> {
        let input = self.parse_input()?;
        if self.matches_op(Operator::Arrow) {
            let name = self.consume_identifier("variable name after `->`")?;
            return Ok(Stmt {
                span: input.span,
                kind: StmtKind::Assign {
                    target: Expr {
                        span: name.span,
                        kind: ExprKind::Variable(name.lexeme),
                    },
                    op: None,
                    value: input,
                },
            });
        }
        Ok(Stmt {
            span: input.span,
            kind: StmtKind::Expr(input),
        })
    }

    fn parse_input(&mut self) -> Result<Expr, Diagnostic> {
        let start = self.consume_keyword(Keyword::Ask)?.span;
        let prompt = if self.check(TokenKind::String) {
            let token = self.advance();
            Some(Box::new(Expr {
                span: token.span,
                kind: ExprKind::Literal(Literal::String(token.lexeme)),
            }))
        } else {
            None
        };
        Ok(Expr {
            span: start,
            kind: ExprKind::Input(prompt),
        })
    }

    fn parse_function(&mut self) -> Result<FunctionDecl, Diagnostic> {
        let start = self.consume_keyword(Keyword::Func)?.span;
        let name = self.consume_identifier("function name")?;
        self.consume_punct(Punctuation::LParen, "`(` after function name")?;
        let mut params = Vec::new();
        if !self.check_punct(Punctuation::RParen) {
            loop {
                params.push(self.consume_identifier("parameter name")?.lexeme);
                if !self.matches_punct(Punctuation::Comma) {
                    break;
                }
            }
        }
        self.consume_punct(Punctuation::RParen, "`)` after parameters")?;
        let body = if self.matches_op(Operator::Arrow) {
            FunctionBody::Expr(self.parse_expression()?)
        } else {
            FunctionBody::Block(self.parse_block()?)
        };
        Ok(FunctionDecl {
            name: name.lexeme,
            params,
            body,
            span: start,
        })
    }

    fn parse_class(&mut self) -> Result<Stmt, Diagnostic> {
        let start = self.consume_keyword(Keyword::Class)?.span;
        let name = self.consume_identifier("class name")?;
        self.consume_punct(Punctuation::LBrace, "`{` after class name")?;
        let mut fields = Vec::new();
        let mut methods = Vec::new();
        while !self.check_punct(Punctuation::RBrace) && !self.is_at_end() {
            let member = self.parse_statement()?;
            match member.kind {
                StmtKind::Function(decl) => methods.push(decl),
                StmtKind::Assign {
                    target:
                        Expr {
                            kind: ExprKind::Variable(field),
                            ..
                        },
                    op: None,
                    value,
                } => fields.push((field, value)),
                _ => {
                    return Err(Diagnostic::new(
                        DiagnosticKind::Parser,
                        "expected field assignment or method definition in class body",
                    )
                    .with_span(member.span));
                }
            }
        }
        self.consume_punct(Punctuation::RBrace, "`}` to close class body")?;
        Ok(Stmt {
            span: start,
            kind: StmtKind::Class(Rc::new(ClassDecl {
                name: name.lexeme,
                fields,
                methods,
            })),
        })
    }

    fn parse_if(&mut self) -> Result<Stmt, Diagnostic> {
        let start = self.consume_keyword(Keyword::If)?.span;
        let condition = self.parse_expression()?;
        let then_branch = self.parse_body()?;
        let else_branch = if self.matches_keyword(Keyword::Else) {
            if self.check(TokenKind::Keyword(Keyword::If)) {
                Some(vec![self.parse_if()?])
            } else {
                Some(self.parse_body()?)
            }
        } else {
            None
        };
        Ok(Stmt {
            span: start,
            kind: StmtKind::If {
                condition,
                then_branch,
                else_branch,
            },
        })
    }

    fn parse_loop(&mut self) -> Result<Stmt, Diagnostic> {
        let start = self.consume_keyword(Keyword::Loop)?.span;
        let binding = self.consume_identifier("loop variable")?.lexeme;
        self.consume_keyword(Keyword::In)?;
        let first = self.parse_expression()?;
        if self.matches_op(Operator::DotDot) {
            let end = self.parse_expression()?;
            let step = if self.matches_punct(Punctuation::Comma) {
                Some(self.parse_expression()?)
            } else {
                None
            };
            let body = self.parse_body()?;
            return Ok(Stmt {
                span: start,
                kind: StmtKind::NumericFor {
                    binding,
                    start: first,
                    end,
                    step,
                    body,
                },
            });
        }
        let body = self.parse_body()?;
        Ok(Stmt {
            span: start,
            kind: StmtKind::ForEach {
                binding,
                iterable: first,
                body,
            },
        })
    }

    fn parse_repeat(&mut self) -> Result<Stmt, Diagnostic> {
        let start = self.consume_keyword(Keyword::Repeat)?.span;
        let condition = self.parse_expression()?;
        let body = self.parse_body()?;
        Ok(Stmt {
            span: start,
            kind: StmtKind::Repeat { condition, body },
        })
    }

    fn parse_return(&mut self) -> Result<Stmt, Diagnostic> {
        let token = self.consume_keyword(Keyword::Return)?;
        let expr = if self.check_punct(Punctuation::Semicolon)
            || self.check_punct(Punctuation::RBrace)
            || self.is_at_end()
        {
            None
        } else {
            Some(self.parse_expression()?)
        };
        Ok(Stmt {
            span: token.span,
            kind: StmtKind::Return(expr),
        })
    }

    fn parse_try(&mut self) -> Result<Stmt, Diagnostic> {
        let start = self.consume_keyword(Keyword::Try)?.span;
        let body = self.parse_block()?;
        let catch = if self.matches_keyword(Keyword::Catch) {
            Some(self.parse_block()?)
        } else {
            None
        };
        let finally = if self.matches_keyword(Keyword::Finally) {
            Some(self.parse_block()?)
        } else {
            None
        };
        if catch.is_none() && finally.is_none() {
            return Err(self.error(self.peek(), "`catch` or `finally` after try block"));
        }
        Ok(Stmt {
            span: start,
            kind: StmtKind::Try {
                body,
                catch,
                finally,
            },
        })
    }

    fn parse_alter(&mut self) -> Result<Stmt, Diagnostic> {
        let start = self.consume_keyword(Keyword::Alter)?.span;
        let subject = self.parse_expression()?;
        self.consume_punct(Punctuation::LBrace, "`{` after alter subject")?;
        let mut arms = Vec::new();
        let mut default = None;
        while !self.check_punct(Punctuation::RBrace) && !self.is_at_end() {
            if self.matches_keyword(Keyword::Else) {
                self.expect_op(Operator::Arrow, "`->` after `else`")?;
                default = Some(self.parse_arm_body()?);
            } else {
                let case = self.parse_expression()?;
                self.expect_op(Operator::Arrow, "`->` after alter case")?;
                let body = self.parse_arm_body()?;
                arms.push(AlterArm { case, body });
            }
            self.matches_punct(Punctuation::Comma);
        }
        self.consume_punct(Punctuation::RBrace, "`}` to close alter")?;
        Ok(Stmt {
            span: start,
            kind: StmtKind::Alter {
                subject,
                arms,
                default,
            },
        })
    }

    fn parse_arm_body(&mut self) -> Result<Vec<Stmt>, Diagnostic> {
        if self.check_punct(Punctuation::LBrace) {
            self.parse_block()
        } else if self.check(TokenKind::Keyword(Keyword::Give)) {
            let stmt = self.parse_print_parts(false)?;
            self.consume_optional_semicolon();
            Ok(vec![stmt])
        } else {
            Ok(vec![self.parse_statement()?])
        }
    }

    fn parse_task(&mut self) -> Result<Stmt, Diagnostic> {
        let start = self.consume_keyword(Keyword::Task)?.span;
        let name = self.consume_identifier("task name")?.lexeme;
        let body = self.parse_block()?;
        Ok(Stmt {
            span: start,
            kind: StmtKind::Task {
                name,
                body: Rc::new(body),
            },
        })
    }

    fn parse_codegen(&mut self) -> Result<Stmt, Diagnostic> {
        let start = self.consume_keyword(Keyword::Aik)?.span;
        self.matches_op(Operator::At);
        self.consume_punct(Punctuation::LBrace, "`{` after `aik`")?;
        let prompt = self.consume(TokenKind::String, "prompt string")?;
        self.consume_punct(Punctuation::RBrace, "`}` after prompt")?;
        Ok(Stmt {
            span: start,
            kind: StmtKind::CodeGen(prompt.lexeme),
        })
    }

    fn parse_expression_statement(&mut self) -> Result<Stmt, Diagnostic> {
        let expr = self.parse_expression()?;
        let span = expr.span;

        if matches!(expr.kind, ExprKind::Variable(_)) && self.matches_op(Operator::Colon) {
            // Type annotations are accepted and ignored.
            self.consume_identifier("type name after `:`")?;
            self.expect_op(Operator::Assign, "`=` after type annotation")?;
            let value = self.parse_expression()?;
            return Ok(Stmt {
                span,
                kind: StmtKind::Assign {
                    target: expr,
                    op: None,
                    value,
                },
            });
        }

        let op = match self.peek().kind {
            TokenKind::Operator(Operator::Assign) => None,
            TokenKind::Operator(Operator::PlusAssign) => Some(BinaryOp::Add),
            TokenKind::Operator(Operator::MinusAssign) => Some(BinaryOp::Sub),
            TokenKind::Operator(Operator::StarAssign) => Some(BinaryOp::Mul),
            TokenKind::Operator(Operator::SlashAssign) => Some(BinaryOp::Div),
            TokenKind::Operator(Operator::PercentAssign) => Some(BinaryOp::Mod),
            _ => {
                return Ok(Stmt {
                    span,
                    kind: StmtKind::Expr(expr),
                });
            }
        };
        let operator = self.advance();
        if !matches!(
            expr.kind,
            ExprKind::Variable(_) | ExprKind::Attribute { .. }
        ) {
            return Err(Diagnostic::new(
                DiagnosticKind::Parser,
                format!(
                    "expected variable or attribute before `{}`, found expression",
                    operator.lexeme
                ),
            )
            .with_span(span));
        }
        let value = self.parse_expression()?;
        Ok(Stmt {
            span,
            kind: StmtKind::Assign {
                target: expr,
                op,
                value,
            },
        })
    }

    pub fn parse_expression(&mut self) -> Result<Expr, Diagnostic> {
        self.parse_pipeline()
    }

    fn parse_pipeline(&mut self) -> Result<Expr, Diagnostic> {
        let mut expr = self.parse_logical()?;
        while self.matches_op(Operator::Pipeline) {
            let right = self.parse_logical()?;
            expr = binary(BinaryOp::Pipeline, expr, right);
        }
        Ok(expr)
    }

    fn parse_logical(&mut self) -> Result<Expr, Diagnostic> {
        let mut expr = self.parse_comparison()?;
        while let Some(op) = self.match_binary(&[
            (Operator::DoubleAmpersand, BinaryOp::And),
            (Operator::DoublePipe, BinaryOp::Or),
        ]) {
            let right = self.parse_comparison()?;
            expr = binary(op, expr, right);
        }
        Ok(expr)
    }

    fn parse_comparison(&mut self) -> Result<Expr, Diagnostic> {
        let mut expr = self.parse_additive()?;
        while let Some(op) = self.match_binary(&[
            (Operator::EqualEqual, BinaryOp::Equal),
            (Operator::BangEqual, BinaryOp::NotEqual),
            (Operator::LessEqual, BinaryOp::LessEqual),
            (Operator::GreaterEqual, BinaryOp::GreaterEqual),
            (Operator::Less, BinaryOp::Less),
            (Operator::Greater, BinaryOp::Greater),
        ]) {
            let right = self.parse_additive()?;
            expr = binary(op, expr, right);
        }
        Ok(expr)
    }

    fn parse_additive(&mut self) -> Result<Expr, Diagnostic> {
        let mut expr = self.parse_multiplicative()?;
        while let Some(op) = self.match_binary(&[
            (Operator::Plus, BinaryOp::Add),
            (Operator::Minus, BinaryOp::Sub),
        ]) {
            let right = self.parse_multiplicative()?;
            expr = binary(op, expr, right);
        }
        Ok(expr)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, Diagnostic> {
        let mut expr = self.parse_unary()?;
        while let Some(op) = self.match_binary(&[
            (Operator::Star, BinaryOp::Mul),
            (Operator::Slash, BinaryOp::Div),
            (Operator::Percent, BinaryOp::Mod),
        ]) {
            let right = self.parse_unary()?;
            expr = binary(op, expr, right);
        }
        Ok(expr)
    }

    fn parse_unary(&mut self) -> Result<Expr, Diagnostic> {
        let op = match self.peek().kind {
            TokenKind::Operator(Operator::Minus) => Some(UnaryOp::Negate),
            TokenKind::Operator(Operator::Plus) => Some(UnaryOp::Plus),
            TokenKind::Operator(Operator::Bang) => Some(UnaryOp::Not),
            _ => None,
        };
        if let Some(op) = op {
            let operator = self.advance();
            let operand = self.parse_unary()?;
            return Ok(Expr {
                span: operator.span,
                kind: ExprKind::Unary {
                    op,
                    expr: Box::new(operand),
                },
            });
        }
        if self.check(TokenKind::Keyword(Keyword::Await)) {
            let start = self.advance().span;
            let operand = self.parse_unary()?;
            return Ok(Expr {
                span: start,
                kind: ExprKind::Await(Box::new(operand)),
            });
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<Expr, Diagnostic> {
        let mut expr = self.parse_primary()?;
        loop {
            if self.matches_punct(Punctuation::LParen) {
                let mut args = Vec::new();
                if !self.check_punct(Punctuation::RParen) {
                    loop {
                        args.push(self.parse_expression()?);
                        if !self.matches_punct(Punctuation::Comma) {
                            break;
                        }
                    }
                }
                self.consume_punct(Punctuation::RParen, "`)` after arguments")?;
                expr = Expr {
                    span: expr.span,
                    kind: ExprKind::Call {
                        callee: Box::new(expr),
                        args,
                    },
                };
            } else if self.matches_punct(Punctuation::Dot) {
                let name = self.consume_identifier("attribute name after `.`")?;
                expr = Expr {
                    span: name.span,
                    kind: ExprKind::Attribute {
                        target: Box::new(expr),
                        name: name.lexeme,
                    },
                };
            } else if self.matches_punct(Punctuation::LBracket) {
                let index = self.parse_expression()?;
                self.consume_punct(Punctuation::RBracket, "`]` after index")?;
                expr = Expr {
                    span: expr.span,
                    kind: ExprKind::Index {
                        target: Box::new(expr),
                        index: Box::new(index),
                    },
                };
            } else {
                break;
            }
        }
        Ok(expr)
    }

    fn parse_primary(&mut self) -> Result<Expr, Diagnostic> {
        let token = self.peek().clone();
        let kind = match token.kind {
            TokenKind::Number => {
                self.advance();
                ExprKind::Literal(number_literal(&token)?)
            }
            TokenKind::String => {
                self.advance();
                ExprKind::Literal(Literal::String(token.lexeme))
            }
            TokenKind::Keyword(Keyword::True) => {
                self.advance();
                ExprKind::Literal(Literal::Bool(true))
            }
            TokenKind::Keyword(Keyword::False) => {
                self.advance();
                ExprKind::Literal(Literal::Bool(false))
            }
            TokenKind::Keyword(Keyword::Nil) => {
                self.advance();
                ExprKind::Literal(Literal::Nil)
            }
            TokenKind::Keyword(Keyword::Ask) => return self.parse_input(),
            TokenKind::Identifier => {
                self.advance();
                ExprKind::Variable(token.lexeme)
            }
            TokenKind::Punctuation(Punctuation::LParen) => {
                self.advance();
                let inner = self.parse_expression()?;
                self.consume_punct(Punctuation::RParen, "`)` after expression")?;
                return Ok(inner);
            }
            TokenKind::Punctuation(Punctuation::LBracket) => {
                self.advance();
                let mut elements = Vec::new();
                if !self.check_punct(Punctuation::RBracket) {
                    loop {
                        elements.push(self.parse_expression()?);
                        if !self.matches_punct(Punctuation::Comma) {
                            break;
                        }
                    }
                }
                self.consume_punct(Punctuation::RBracket, "`]` after list literal")?;
                ExprKind::ListLiteral(elements)
            }
            TokenKind::Punctuation(Punctuation::LBrace) => {
                self.advance();
                let mut entries = Vec::new();
                if !self.check_punct(Punctuation::RBrace) {
                    loop {
                        let key = self.parse_expression()?;
                        self.expect_op(Operator::Colon, "`:` in map literal")?;
                        let value = self.parse_expression()?;
                        entries.push((key, value));
                        if !self.matches_punct(Punctuation::Comma) {
                            break;
                        }
                    }
                }
                self.consume_punct(Punctuation::RBrace, "`}` after map literal")?;
                ExprKind::MapLiteral(entries)
            }
            _ => return Err(self.error(&token, "expression")),
        };
        Ok(Expr {
            kind,
            span: token.span,
        })
    }

    fn match_binary(&mut self, table: &[(Operator, BinaryOp)]) -> Option<BinaryOp> {
        let TokenKind::Operator(found) = self.peek().kind else {
            return None;
        };
        let op = table
            .iter()
            .find(|(operator, _)| *operator == found)
            .map(|(_, op)| *op)?;
        self.advance();
        Some(op)
    }

    fn consume_optional_semicolon(&mut self) {
        while self.matches_punct(Punctuation::Semicolon) {}
    }

    fn matches_op(&mut self, op: Operator) -> bool {
        self.matches(TokenKind::Operator(op))
    }

    fn matches_punct(&mut self, punct: Punctuation) -> bool {
        self.matches(TokenKind::Punctuation(punct))
    }

    fn matches_keyword(&mut self, keyword: Keyword) -> bool {
        self.matches(TokenKind::Keyword(keyword))
    }

    fn matches(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect_op(&mut self, op: Operator, expected: &str) -> Result<Token, Diagnostic> {
        self.consume(TokenKind::Operator(op), expected)
    }

    fn consume_punct(&mut self, punct: Punctuation, expected: &str) -> Result<Token, Diagnostic> {
        self.consume(TokenKind::Punctuation(punct), expected)
    }

    fn consume_keyword(&mut self, keyword: Keyword) -> Result<Token, Diagnostic> {
        let expected = format!("keyword `{}`", format!("{keyword:?}").to_lowercase());
        self.consume(TokenKind::Keyword(keyword), &expected)
    }

    fn consume_identifier(&mut self, expected: &str) -> Result<Token, Diagnostic> {
        self.consume(TokenKind::Identifier, expected)
    }

    fn consume(&mut self, kind: TokenKind, expected: &str) -> Result<Token, Diagnostic> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(self.error(self.peek(), expected))
        }
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.peek().kind == kind
    }

    fn check_punct(&self, punct: Punctuation) -> bool {
        self.check(TokenKind::Punctuation(punct))
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if !self.is_at_end() {
            self.current += 1;
        }
        token
    }

    fn peek(&self) -> &Token {
        // `new` guarantees the stream ends with an `End` token.
        &self.tokens[self.current.min(self.tokens.len() - 1)]
    }

    fn is_at_end(&self) -> bool {
        self.peek().kind == TokenKind::End
    }

    fn error(&self, found: &Token, expected: &str) -> Diagnostic {
        let description = match found.kind {
            TokenKind::End => "end of input".to_string(),
            TokenKind::String => format!("string \"{}\"", found.lexeme),
            _ => format!("`{}`", found.lexeme),
        };
        Diagnostic::new(
            DiagnosticKind::Parser,
            format!("expected {expected}, found {description}"),
        )
        .with_span(found.span)
    }
}

fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
    Expr {
        span: left.span,
        kind: ExprKind::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        },
    }
}

fn number_literal(token: &Token) -> Result<Literal, Diagnostic> {
    // Integers too wide for i64 fall back to Float, like overflowing arithmetic.
    let literal = if token.lexeme.contains('.') {
        token.lexeme.parse().map(Literal::Float).ok()
    } else {
        token
            .lexeme
            .parse()
            .map(Literal::Int)
            .or_else(|_| token.lexeme.parse().map(Literal::Float))
            .ok()
    };
    literal.ok_or_else(|| {
        Diagnostic::new(
            DiagnosticKind::Parser,
            format!("expected numeric literal in range, found `{}`", token.lexeme),
        )
        .with_span(token.span)
    })
}
