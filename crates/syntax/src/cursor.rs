//! Token-stream cursor shared by the AST parser and the syntax checker.

use crate::ast::{BinOp, Ident, Span};
use crate::errors::SourceError;
use crate::lexer::Token;

pub(crate) struct TokenCursor<'a> {
    tokens: &'a [(Token, Span)],
    pos: usize,
}

impl<'a> TokenCursor<'a> {
    pub fn new(tokens: &'a [(Token, Span)]) -> Self {
        Self { tokens, pos: 0 }
    }

    pub fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    pub fn peek_ahead(&self, n: usize) -> Option<&Token> {
        self.tokens.get(self.pos + n).map(|(t, _)| t)
    }

    pub fn is_at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    /// Span of the current token, or a zero-width span just past the last
    /// token when input is exhausted.
    pub fn current_span(&self) -> Span {
        match self.tokens.get(self.pos) {
            Some((_, span)) => *span,
            None => self
                .tokens
                .last()
                .map(|(_, s)| Span::new(s.end, s.end))
                .unwrap_or_default(),
        }
    }

    pub fn prev_span(&self) -> Span {
        if self.pos == 0 {
            Span::default()
        } else {
            self.tokens[self.pos - 1].1
        }
    }

    pub fn advance(&mut self) -> Option<(Token, Span)> {
        let pair = self.tokens.get(self.pos).cloned();
        if pair.is_some() {
            self.pos += 1;
        }
        pair
    }

    pub fn at(&self, token: &Token) -> bool {
        self.peek() == Some(token)
    }

    pub fn eat(&mut self, token: &Token) -> bool {
        if self.at(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    pub fn expect(&mut self, token: Token, what: &str) -> Result<Span, SourceError> {
        if self.at(&token) {
            let span = self.current_span();
            self.pos += 1;
            Ok(span)
        } else {
            Err(self.unexpected(what))
        }
    }

    pub fn expect_ident(&mut self, what: &str) -> Result<Ident, SourceError> {
        if let Some((Token::Ident(name), span)) = self.tokens.get(self.pos).cloned() {
            self.pos += 1;
            Ok(Ident::new(name, span))
        } else {
            Err(self.unexpected(what))
        }
    }

    pub fn unexpected(&self, what: &str) -> SourceError {
        let found = match self.peek() {
            Some(t) => format!("`{}`", t),
            None => "end of input".to_string(),
        };
        SourceError::parse(
            format!("expected {}, found {}", what, found),
            self.current_span(),
        )
    }

    /// Consume a type name: a base type keyword or a struct name.
    pub fn type_name(&mut self) -> Result<String, SourceError> {
        let name = match self.peek() {
            Some(Token::IntType) => "int".to_string(),
            Some(Token::DoubleType) => "double".to_string(),
            Some(Token::BoolType) => "bool".to_string(),
            Some(Token::CharType) => "char".to_string(),
            Some(Token::StringType) => "string".to_string(),
            Some(Token::Ident(name)) => name.clone(),
            _ => return Err(self.unexpected("a type name")),
        };
        self.pos += 1;
        Ok(name)
    }

    /// True when the current token starts a declared type.
    pub fn at_type_start(&self) -> bool {
        matches!(
            self.peek(),
            Some(
                Token::IntType
                    | Token::DoubleType
                    | Token::BoolType
                    | Token::CharType
                    | Token::StringType
                    | Token::Array
            )
        )
    }

    pub fn at_literal(&self) -> bool {
        matches!(
            self.peek(),
            Some(
                Token::Int(_)
                    | Token::Double(_)
                    | Token::Bool(_)
                    | Token::Char(_)
                    | Token::Str(_)
                    | Token::Null
            )
        )
    }

    /// Consume a binary operator if one is next.
    pub fn bin_op(&mut self) -> Option<BinOp> {
        let op = match self.peek()? {
            Token::Plus => BinOp::Add,
            Token::Minus => BinOp::Sub,
            Token::Star => BinOp::Mul,
            Token::Slash => BinOp::Div,
            Token::And => BinOp::And,
            Token::Or => BinOp::Or,
            Token::Less => BinOp::Lt,
            Token::LessEq => BinOp::Le,
            Token::Greater => BinOp::Gt,
            Token::GreaterEq => BinOp::Ge,
            Token::EqEq => BinOp::Eq,
            Token::NotEq => BinOp::Ne,
            _ => return None,
        };
        self.pos += 1;
        Some(op)
    }
}
