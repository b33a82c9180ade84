//! Syntax-only checker: walks the grammar over the token stream and
//! reports the first error, building nothing. Useful for fast syntax
//! checking (`--parse` mode) and as a cross-check of the AST parser.

use crate::cursor::TokenCursor;
use crate::errors::SourceError;
use crate::lexer::Token;

use crate::ast::Span;

/// Check that the token stream is a syntactically valid program.
pub fn validate(tokens: &[(Token, Span)]) -> Result<(), SourceError> {
    Validator { t: TokenCursor::new(tokens) }.program()
}

struct Validator<'a> {
    t: TokenCursor<'a>,
}

impl<'a> Validator<'a> {
    fn program(&mut self) -> Result<(), SourceError> {
        while !self.t.is_at_end() {
            if self.t.at(&Token::Struct) {
                self.struct_def()?;
            } else {
                self.fun_def()?;
            }
        }
        Ok(())
    }

    fn struct_def(&mut self) -> Result<(), SourceError> {
        self.t.expect(Token::Struct, "`struct`")?;
        self.t.expect_ident("a struct name")?;
        self.t.expect(Token::LBrace, "`{`")?;
        if !self.t.at(&Token::RBrace) {
            loop {
                self.data_type()?;
                self.t.expect_ident("a field name")?;
                if !self.t.eat(&Token::Comma) {
                    break;
                }
            }
        }
        self.t.expect(Token::RBrace, "`}`")?;
        Ok(())
    }

    fn fun_def(&mut self) -> Result<(), SourceError> {
        if !self.t.eat(&Token::Void) {
            self.data_type()?;
        }
        self.t.expect_ident("a function name")?;
        self.t.expect(Token::LParen, "`(`")?;
        if !self.t.at(&Token::RParen) {
            loop {
                self.data_type()?;
                self.t.expect_ident("a parameter name")?;
                if !self.t.eat(&Token::Comma) {
                    break;
                }
            }
        }
        self.t.expect(Token::RParen, "`)`")?;
        self.block()
    }

    fn data_type(&mut self) -> Result<(), SourceError> {
        self.t.eat(&Token::Array);
        self.t.type_name()?;
        Ok(())
    }

    fn block(&mut self) -> Result<(), SourceError> {
        self.t.expect(Token::LBrace, "`{`")?;
        while !self.t.at(&Token::RBrace) {
            if self.t.is_at_end() {
                return Err(self.t.unexpected("`}`"));
            }
            self.stmt()?;
        }
        self.t.expect(Token::RBrace, "`}`")?;
        Ok(())
    }

    fn stmt(&mut self) -> Result<(), SourceError> {
        match self.t.peek() {
            Some(Token::If) => self.if_stmt(),
            Some(Token::While) => self.while_stmt(),
            Some(Token::For) => self.for_stmt(),
            Some(Token::Return) => self.return_stmt(),
            Some(Token::Switch) => self.switch_stmt(),
            _ if self.t.at_type_start() => self.var_decl_stmt(),
            Some(Token::Ident(_)) => match self.t.peek_ahead(1) {
                Some(Token::LParen) => {
                    self.t.expect_ident("a function name")?;
                    self.call_args()
                }
                Some(Token::Ident(_)) => self.var_decl_stmt(),
                _ => self.assign_stmt(),
            },
            _ => Err(self.t.unexpected("a statement")),
        }
    }

    fn var_decl_stmt(&mut self) -> Result<(), SourceError> {
        self.data_type()?;
        self.t.expect_ident("a variable name")?;
        self.t.expect(Token::Assign, "`=`")?;
        self.expr()
    }

    fn assign_stmt(&mut self) -> Result<(), SourceError> {
        self.path()?;
        self.t.expect(Token::Assign, "`=`")?;
        self.expr()
    }

    fn path(&mut self) -> Result<(), SourceError> {
        self.t.expect_ident("a variable name")?;
        self.index_suffix()?;
        while self.t.eat(&Token::Dot) {
            self.t.expect_ident("a field name")?;
            self.index_suffix()?;
        }
        Ok(())
    }

    fn index_suffix(&mut self) -> Result<(), SourceError> {
        if self.t.eat(&Token::LBracket) {
            self.expr()?;
            self.t.expect(Token::RBracket, "`]`")?;
        }
        Ok(())
    }

    fn paren_expr(&mut self) -> Result<(), SourceError> {
        self.t.expect(Token::LParen, "`(`")?;
        self.expr()?;
        self.t.expect(Token::RParen, "`)`")?;
        Ok(())
    }

    fn if_stmt(&mut self) -> Result<(), SourceError> {
        self.t.expect(Token::If, "`if`")?;
        self.paren_expr()?;
        self.block()?;
        loop {
            if self.t.eat(&Token::Elseif) {
                self.paren_expr()?;
                self.block()?;
            } else if self.t.eat(&Token::Else) {
                return self.block();
            } else {
                return Ok(());
            }
        }
    }

    fn while_stmt(&mut self) -> Result<(), SourceError> {
        self.t.expect(Token::While, "`while`")?;
        self.paren_expr()?;
        self.block()
    }

    fn for_stmt(&mut self) -> Result<(), SourceError> {
        self.t.expect(Token::For, "`for`")?;
        self.t.expect(Token::LParen, "`(`")?;
        self.var_decl_stmt()?;
        self.t.expect(Token::Semicolon, "`;`")?;
        self.expr()?;
        self.t.expect(Token::Semicolon, "`;`")?;
        self.assign_stmt()?;
        self.t.expect(Token::RParen, "`)`")?;
        self.block()
    }

    fn return_stmt(&mut self) -> Result<(), SourceError> {
        self.t.expect(Token::Return, "`return`")?;
        self.expr()
    }

    fn switch_stmt(&mut self) -> Result<(), SourceError> {
        self.t.expect(Token::Switch, "`switch`")?;
        self.t.expect(Token::LParen, "`(`")?;
        self.expr()?;
        self.t.expect(Token::RParen, "`)`")?;
        self.t.expect(Token::LBrace, "`{`")?;
        while self.t.eat(&Token::Case) {
            self.literal()?;
            self.t.expect(Token::Colon, "`:`")?;
            while !matches!(
                self.t.peek(),
                Some(Token::Case | Token::Default | Token::Break | Token::RBrace) | None
            ) {
                self.stmt()?;
            }
            self.t.eat(&Token::Break);
        }
        if self.t.eat(&Token::Default) {
            self.t.expect(Token::Colon, "`:`")?;
            while !self.t.at(&Token::RBrace) {
                if self.t.is_at_end() {
                    return Err(self.t.unexpected("`}`"));
                }
                self.stmt()?;
            }
        }
        self.t.expect(Token::RBrace, "`}`")?;
        Ok(())
    }

    fn literal(&mut self) -> Result<(), SourceError> {
        if self.t.at_literal() {
            self.t.advance();
            Ok(())
        } else {
            Err(self.t.unexpected("a literal"))
        }
    }

    fn expr(&mut self) -> Result<(), SourceError> {
        if self.t.eat(&Token::Not) {
            return self.expr();
        }
        if self.t.eat(&Token::LParen) {
            self.expr()?;
            self.t.expect(Token::RParen, "`)`")?;
        } else {
            self.rvalue()?;
        }
        if self.t.bin_op().is_some() {
            self.expr()?;
        }
        Ok(())
    }

    fn rvalue(&mut self) -> Result<(), SourceError> {
        match self.t.peek() {
            Some(Token::New) => self.new_expr(),
            Some(Token::Ident(_)) => {
                self.t.expect_ident("a name")?;
                if self.t.at(&Token::LParen) {
                    self.call_args()
                } else {
                    self.index_suffix()?;
                    while self.t.eat(&Token::Dot) {
                        self.t.expect_ident("a field name")?;
                        self.index_suffix()?;
                    }
                    Ok(())
                }
            }
            _ => self.literal(),
        }
    }

    fn call_args(&mut self) -> Result<(), SourceError> {
        self.t.expect(Token::LParen, "`(`")?;
        if !self.t.at(&Token::RParen) {
            loop {
                self.expr()?;
                if !self.t.eat(&Token::Comma) {
                    break;
                }
            }
        }
        self.t.expect(Token::RParen, "`)`")?;
        Ok(())
    }

    fn new_expr(&mut self) -> Result<(), SourceError> {
        self.t.expect(Token::New, "`new`")?;
        if matches!(self.t.peek(), Some(Token::Ident(_))) {
            self.t.expect_ident("a type name")?;
            self.index_suffix()
        } else {
            self.t.type_name()?;
            self.t.expect(Token::LBracket, "`[`")?;
            self.expr()?;
            self.t.expect(Token::RBracket, "`]`")?;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::lex;

    fn check(source: &str) -> Result<(), SourceError> {
        validate(&lex(source).unwrap())
    }

    #[test]
    fn accepts_well_formed_programs() {
        let src = "
            struct Point { int x, int y }
            int add(int a, int b) { return a + b }
            void main() {
              Point p = new Point
              p.x = add(1, 2)
              for (int i = 0; i < 3; i = i + 1) { print(i) }
              while (p.x > 0) { p.x = p.x - 1 }
              switch (p.y) { case 1: print(1) default: print(0) }
            }
        ";
        assert!(check(src).is_ok());
    }

    #[test]
    fn rejects_what_the_ast_parser_rejects() {
        for bad in [
            "void main() { int x 1 }",
            "void main() { if x > 0 { } }",
            "struct P { int x int y }",
            "void main() { return }",
            "int f( { }",
        ] {
            assert!(check(bad).is_err(), "should reject: {}", bad);
        }
    }
}
