use std::{iter::Peekable, str::CharIndices};

use crate::diagnostics::{Diagnostic, DiagnosticKind, SourceSpan};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    Func,
    Class,
    If,
    Else,
    Loop,
    Repeat,
    In,
    Give,
    Ask,
    Return,
    Break,
    Continue,
    Try,
    Catch,
    Finally,
    True,
    False,
    Nil,
    Aik,
    Alter,
    Task,
    Await,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Assign,
    EqualEqual,
    BangEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    Bang,
    DoubleAmpersand,
    DoublePipe,
    Arrow,
    DotDot,
    Pipeline,
    PlusAssign,
    MinusAssign,
    StarAssign,
    SlashAssign,
    PercentAssign,
    Colon,
    At,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Punctuation {
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Comma,
    Dot,
    Semicolon,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Number,
    String,
    Identifier,
    Keyword(Keyword),
    Operator(Operator),
    Punctuation(Punctuation),
    End,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// Source text of the token; string literals hold their decoded contents.
    pub lexeme: String,
    pub span: SourceSpan,
}

/// Convenience wrapper around [`Lexer::tokenize`].
pub fn tokenize(source: &str) -> Result<Vec<Token>, Diagnostic> {
    Lexer::new(source).tokenize()
}

pub struct Lexer<'a> {
    source: &'a str,
    chars: Peekable<CharIndices<'a>>,
    current: usize,
    line: usize,
    column: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.char_indices().peekable(),
            current: 0,
            line: 1,
            column: 1,
        }
    }

    fn bump(&mut self) -> Option<char> {
        let (idx, ch) = self.chars.next()?;
        self.current = idx + ch.len_utf8();
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(ch)
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().map(|&(_, ch)| ch)
    }

    fn peek_second(&self) -> Option<char> {
        let mut lookahead = self.chars.clone();
        lookahead.next();
        lookahead.next().map(|(_, ch)| ch)
    }

    fn match_next(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn collect_while<F>(&mut self, mut predicate: F)
    where
        F: FnMut(char) -> bool,
    {
        while let Some(ch) = self.peek() {
            if !predicate(ch) {
                break;
            }
            self.bump();
        }
    }

    fn skip_whitespace_and_comments(&mut self) {
        while let Some(ch) = self.peek() {
            if ch.is_whitespace() {
                self.bump();
            } else if ch == '#' {
                self.collect_while(|ch| ch != '\n');
            } else {
                break;
            }
        }
    }

    fn identifier_or_keyword(&mut self, start: usize, span: SourceSpan) -> Token {
        self.collect_while(|ch| ch.is_ascii_alphanumeric() || ch == '_');
        let lexeme = self.source[start..self.current].to_string();
        let kind = keyword_for(&lexeme)
            .map(TokenKind::Keyword)
            .unwrap_or(TokenKind::Identifier);
        Token { kind, lexeme, span }
    }

    fn number_literal(&mut self, start: usize, span: SourceSpan) -> Token {
        self.collect_while(|ch| ch.is_ascii_digit());
        // `1..3` is a range, so a dot only belongs to the number when a digit follows it.
        if self.peek() == Some('.') && self.peek_second().is_some_and(|ch| ch.is_ascii_digit()) {
            self.bump();
            self.collect_while(|ch| ch.is_ascii_digit());
        }
        Token {
            kind: TokenKind::Number,
            lexeme: self.source[start..self.current].to_string(),
            span,
        }
    }

    fn string_literal(&mut self, span: SourceSpan) -> Result<Token, Diagnostic> {
        let mut value = String::new();
        while let Some(ch) = self.bump() {
            match ch {
                '"' => {
                    return Ok(Token {
                        kind: TokenKind::String,
                        lexeme: value,
                        span,
                    });
                }
                '\\' => match self.bump() {
                    Some('n') => value.push('\n'),
                    Some('t') => value.push('\t'),
                    Some('r') => value.push('\r'),
                    Some(other) => value.push(other),
                    None => break,
                },
                _ => value.push(ch),
            }
        }
        Err(Diagnostic::new(DiagnosticKind::Lexer, "unterminated string literal").with_span(span))
    }

    fn operator(&mut self, ch: char) -> Option<TokenKind> {
        use self::Operator as Op;
        let op = match ch {
            '+' if self.match_next('=') => Op::PlusAssign,
            '+' => Op::Plus,
            '-' if self.match_next('>') => Op::Arrow,
            '-' if self.match_next('=') => Op::MinusAssign,
            '-' => Op::Minus,
            '*' if self.match_next('=') => Op::StarAssign,
            '*' => Op::Star,
            '/' if self.match_next('=') => Op::SlashAssign,
            '/' => Op::Slash,
            '%' if self.match_next('=') => Op::PercentAssign,
            '%' => Op::Percent,
            '=' if self.match_next('=') => Op::EqualEqual,
            '=' => Op::Assign,
            '!' if self.match_next('=') => Op::BangEqual,
            '!' => Op::Bang,
            '<' if self.match_next('=') => Op::LessEqual,
            '<' => Op::Less,
            '>' if self.match_next('=') => Op::GreaterEqual,
            '>' => Op::Greater,
            '&' if self.match_next('&') => Op::DoubleAmpersand,
            '|' if self.match_next('|') => Op::DoublePipe,
            '|' if self.match_next('>') => Op::Pipeline,
            '.' if self.match_next('.') => Op::DotDot,
            ':' => Op::Colon,
            '@' => Op::At,
            _ => return None,
        };
        Some(TokenKind::Operator(op))
    }

    fn punctuation(ch: char) -> Option<TokenKind> {
        use self::Punctuation as P;
        let punct = match ch {
            '(' => P::LParen,
            ')' => P::RParen,
            '{' => P::LBrace,
            '}' => P::RBrace,
            '[' => P::LBracket,
            ']' => P::RBracket,
            ',' => P::Comma,
            '.' => P::Dot,
            ';' => P::Semicolon,
            _ => return None,
        };
        Some(TokenKind::Punctuation(punct))
    }

    pub fn tokenize(mut self) -> Result<Vec<Token>, Diagnostic> {
        let mut tokens = Vec::new();
        loop {
            self.skip_whitespace_and_comments();
            let span = SourceSpan::new(self.line, self.column);
            let start = self.current_offset();
            let Some(ch) = self.bump() else {
                tokens.push(Token {
                    kind: TokenKind::End,
                    lexeme: String::new(),
                    span,
                });
                break;
            };

            let token = match ch {
                '"' => self.string_literal(span)?,
                '0'..='9' => self.number_literal(start, span),
                'a'..='z' | 'A'..='Z' | '_' => self.identifier_or_keyword(start, span),
                _ => {
                    let kind = self
                        .operator(ch)
                        .or_else(|| Self::punctuation(ch))
                        .ok_or_else(|| {
                            Diagnostic::new(
                                DiagnosticKind::Lexer,
                                format!("unexpected character `{ch}`"),
                            )
                            .with_span(span)
                        })?;
                    Token {
                        kind,
                        lexeme: self.source[start..self.current].to_string(),
                        span,
                    }
                }
            };
            tokens.push(token);
        }
        Ok(tokens)
    }

    fn current_offset(&mut self) -> usize {
        self.chars
            .peek()
            .map(|&(idx, _)| idx)
            .unwrap_or(self.source.len())
    }
}

fn keyword_for(ident: &str) -> Option<Keyword> {
    use self::Keyword as Kw;
    let keyword = match ident {
        "func" => Kw::Func,
        "class" => Kw::Class,
        "if" => Kw::If,
        "else" => Kw::Else,
        "loop" => Kw::Loop,
        "repeat" => Kw::Repeat,
        "in" => Kw::In,
        "give" => Kw::Give,
        "ask" => Kw::Ask,
        "return" | "ret" => Kw::Return,
        "break" => Kw::Break,
        "continue" => Kw::Continue,
        "try" => Kw::Try,
        "catch" => Kw::Catch,
        "finally" => Kw::Finally,
        "true" => Kw::True,
        "false" => Kw::False,
        "nil" => Kw::Nil,
        "aik" => Kw::Aik,
        "alter" => Kw::Alter,
        "task" => Kw::Task,
        "await" => Kw::Await,
        _ => return None,
    };
    Some(keyword)
}
