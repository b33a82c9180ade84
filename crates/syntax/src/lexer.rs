//! Tokenizer for Quill source, built on logos.
//!
//! `#` starts a comment that runs to end of line. Malformed literals get
//! their own token variants so [`lex`] can report them precisely instead
//! of collapsing everything into "unrecognized symbol".

use std::fmt;

use logos::{Lexer, Logos};

use crate::ast::Span;
use crate::errors::SourceError;

fn string_body(lex: &mut Lexer<Token>) -> String {
    let s = lex.slice();
    s[1..s.len() - 1].to_string()
}

fn char_body(lex: &mut Lexer<Token>) -> Option<char> {
    let s = lex.slice();
    let inner = &s[1..s.len() - 1];
    let mut chars = inner.chars();
    match chars.next()? {
        '\\' => match chars.next()? {
            'n' => Some('\n'),
            't' => Some('\t'),
            'r' => Some('\r'),
            '0' => Some('\0'),
            other => Some(other),
        },
        c => Some(c),
    }
}

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n\f]+")]
#[logos(skip r"#[^\n]*")]
pub enum Token {
    // punctuation
    #[token(".")]
    Dot,
    #[token(",")]
    Comma,
    #[token(";")]
    Semicolon,
    #[token(":")]
    Colon,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,

    // operators
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("==")]
    EqEq,
    #[token("!=")]
    NotEq,
    #[token("<=")]
    LessEq,
    #[token(">=")]
    GreaterEq,
    #[token("<")]
    Less,
    #[token(">")]
    Greater,
    #[token("=")]
    Assign,

    // keywords
    #[token("struct")]
    Struct,
    #[token("array")]
    Array,
    #[token("int")]
    IntType,
    #[token("double")]
    DoubleType,
    #[token("bool")]
    BoolType,
    #[token("char")]
    CharType,
    #[token("string")]
    StringType,
    #[token("void")]
    Void,
    #[token("null")]
    Null,
    #[token("new")]
    New,
    #[token("not")]
    Not,
    #[token("and")]
    And,
    #[token("or")]
    Or,
    #[token("if")]
    If,
    #[token("elseif")]
    Elseif,
    #[token("else")]
    Else,
    #[token("while")]
    While,
    #[token("for")]
    For,
    #[token("return")]
    Return,
    #[token("switch")]
    Switch,
    #[token("case")]
    Case,
    #[token("default")]
    Default,
    #[token("break")]
    Break,

    // literals
    #[token("true", |_| true)]
    #[token("false", |_| false)]
    Bool(bool),
    #[regex(r"[0-9]+", |lex| lex.slice().parse::<i64>().ok())]
    Int(i64),
    #[regex(r"[0-9]+\.[0-9]+", |lex| lex.slice().parse::<f64>().ok())]
    Double(f64),
    #[regex(r#""[^"\n]*""#, string_body)]
    Str(String),
    #[regex(r"'(\\.|[^'\\\n])'", char_body)]
    Char(char),
    #[regex(r"[a-zA-Z][a-zA-Z0-9_]*", |lex| lex.slice().to_string())]
    Ident(String),

    // malformed literals, surfaced as errors by `lex`
    #[regex(r"0[0-9]+", priority = 3)]
    LeadingZeroInt,
    #[regex(r"[0-9]+\.", priority = 3)]
    MissingFraction,
    #[regex(r#""[^"\n]*"#, priority = 1)]
    UnterminatedStr,
    #[token("''")]
    EmptyChar,
    #[regex(r"'(\\.|[^'\\\n])?", priority = 1)]
    UnterminatedChar,
}

/// Lexeme-flavored rendering for "expected X, found Y" messages.
impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Token::*;
        match self {
            Dot => write!(f, "."),
            Comma => write!(f, ","),
            Semicolon => write!(f, ";"),
            Colon => write!(f, ":"),
            LParen => write!(f, "("),
            RParen => write!(f, ")"),
            LBrace => write!(f, "{{"),
            RBrace => write!(f, "}}"),
            LBracket => write!(f, "["),
            RBracket => write!(f, "]"),
            Plus => write!(f, "+"),
            Minus => write!(f, "-"),
            Star => write!(f, "*"),
            Slash => write!(f, "/"),
            EqEq => write!(f, "=="),
            NotEq => write!(f, "!="),
            LessEq => write!(f, "<="),
            GreaterEq => write!(f, ">="),
            Less => write!(f, "<"),
            Greater => write!(f, ">"),
            Assign => write!(f, "="),
            Struct => write!(f, "struct"),
            Array => write!(f, "array"),
            IntType => write!(f, "int"),
            DoubleType => write!(f, "double"),
            BoolType => write!(f, "bool"),
            CharType => write!(f, "char"),
            StringType => write!(f, "string"),
            Void => write!(f, "void"),
            Null => write!(f, "null"),
            New => write!(f, "new"),
            Not => write!(f, "not"),
            And => write!(f, "and"),
            Or => write!(f, "or"),
            If => write!(f, "if"),
            Elseif => write!(f, "elseif"),
            Else => write!(f, "else"),
            While => write!(f, "while"),
            For => write!(f, "for"),
            Return => write!(f, "return"),
            Switch => write!(f, "switch"),
            Case => write!(f, "case"),
            Default => write!(f, "default"),
            Break => write!(f, "break"),
            Bool(b) => write!(f, "{}", b),
            Int(i) => write!(f, "{}", i),
            Double(x) => write!(f, "{}", x),
            Str(s) => write!(f, "\"{}\"", s),
            Char(c) => write!(f, "'{}'", c),
            Ident(name) => write!(f, "{}", name),
            LeadingZeroInt => write!(f, "<leading-zero number>"),
            MissingFraction => write!(f, "<incomplete number>"),
            UnterminatedStr => write!(f, "<unterminated string>"),
            EmptyChar => write!(f, "<empty char>"),
            UnterminatedChar => write!(f, "<unterminated char>"),
        }
    }
}

/// Tokenize a whole source file, stopping at the first lexical error.
pub fn lex(source: &str) -> Result<Vec<(Token, Span)>, SourceError> {
    let mut tokens = Vec::new();
    for (result, range) in Token::lexer(source).spanned() {
        let span = Span::new(range.start, range.end);
        let token = result.map_err(|()| SourceError::lex("unrecognized symbol", span))?;
        match token {
            Token::LeadingZeroInt => {
                return Err(SourceError::lex("leading zero in number", span)
                    .with_hint("drop the leading zero"));
            }
            Token::MissingFraction => {
                return Err(SourceError::lex("missing digits after decimal point", span));
            }
            Token::UnterminatedStr => {
                return Err(SourceError::lex("unterminated string literal", span));
            }
            Token::EmptyChar => {
                return Err(SourceError::lex("empty character literal", span));
            }
            Token::UnterminatedChar => {
                return Err(SourceError::lex("unterminated character literal", span));
            }
            other => tokens.push((other, span)),
        }
    }
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<Token> {
        lex(source).unwrap().into_iter().map(|(t, _)| t).collect()
    }

    #[test]
    fn keywords_and_idents() {
        assert_eq!(
            kinds("struct while whales int ints"),
            vec![
                Token::Struct,
                Token::While,
                Token::Ident("whales".to_string()),
                Token::IntType,
                Token::Ident("ints".to_string()),
            ]
        );
    }

    #[test]
    fn literals() {
        assert_eq!(
            kinds(r#"0 42 3.14 "hi" 'a' '\n' true false null"#),
            vec![
                Token::Int(0),
                Token::Int(42),
                Token::Double(3.14),
                Token::Str("hi".to_string()),
                Token::Char('a'),
                Token::Char('\n'),
                Token::Bool(true),
                Token::Bool(false),
                Token::Null,
            ]
        );
    }

    #[test]
    fn operators_longest_match() {
        assert_eq!(
            kinds("< <= == != >= > ="),
            vec![
                Token::Less,
                Token::LessEq,
                Token::EqEq,
                Token::NotEq,
                Token::GreaterEq,
                Token::Greater,
                Token::Assign,
            ]
        );
    }

    #[test]
    fn comments_are_skipped() {
        assert_eq!(
            kinds("x # the rest is ignored\ny"),
            vec![Token::Ident("x".to_string()), Token::Ident("y".to_string())]
        );
    }

    #[test]
    fn leading_zero_is_an_error() {
        let err = lex("0123").unwrap_err();
        assert!(err.message.contains("leading zero"));
        assert_eq!(err.span, Span::new(0, 4));
    }

    #[test]
    fn missing_fraction_is_an_error() {
        let err = lex("x = 3.").unwrap_err();
        assert!(err.message.contains("decimal point"));
    }

    #[test]
    fn unterminated_string_is_an_error() {
        let err = lex("\"oops").unwrap_err();
        assert!(err.message.contains("unterminated string"));
    }

    #[test]
    fn empty_char_is_an_error() {
        let err = lex("''").unwrap_err();
        assert!(err.message.contains("empty character"));
    }

    #[test]
    fn stray_symbol_is_an_error() {
        let err = lex("x ! y").unwrap_err();
        assert!(err.message.contains("unrecognized"));
        assert_eq!(err.span, Span::new(2, 3));
    }
}
