//! Recursive-descent parser producing the AST.
//!
//! Expressions parse as a right-leaning chain (`first op rest`) with no
//! precedence levels; parentheses group explicitly. `not` applies to the
//! whole chain that follows it.

use crate::ast::*;
use crate::cursor::TokenCursor;
use crate::errors::SourceError;
use crate::lexer::Token;

/// Parse a token stream into a program.
pub fn parse(tokens: &[(Token, Span)]) -> Result<Program, SourceError> {
    Parser { t: TokenCursor::new(tokens) }.program()
}

struct Parser<'a> {
    t: TokenCursor<'a>,
}

impl<'a> Parser<'a> {
    fn program(&mut self) -> Result<Program, SourceError> {
        let mut program = Program::default();
        while !self.t.is_at_end() {
            if self.t.at(&Token::Struct) {
                program.structs.push(self.struct_def()?);
            } else {
                program.functions.push(self.fun_def()?);
            }
        }
        Ok(program)
    }

    fn struct_def(&mut self) -> Result<StructDef, SourceError> {
        self.t.expect(Token::Struct, "`struct`")?;
        let name = self.t.expect_ident("a struct name")?;
        self.t.expect(Token::LBrace, "`{`")?;
        let mut fields = Vec::new();
        if !self.t.at(&Token::RBrace) {
            loop {
                let ty = self.data_type()?;
                let field = self.t.expect_ident("a field name")?;
                fields.push(VarDef { ty, name: field });
                if !self.t.eat(&Token::Comma) {
                    break;
                }
            }
        }
        self.t.expect(Token::RBrace, "`}`")?;
        Ok(StructDef { name, fields })
    }

    fn fun_def(&mut self) -> Result<FunDef, SourceError> {
        let return_type = if self.t.eat(&Token::Void) {
            DataType::void()
        } else {
            self.data_type()?
        };
        let name = self.t.expect_ident("a function name")?;
        self.t.expect(Token::LParen, "`(`")?;
        let mut params = Vec::new();
        if !self.t.at(&Token::RParen) {
            loop {
                let ty = self.data_type()?;
                let pname = self.t.expect_ident("a parameter name")?;
                params.push(VarDef { ty, name: pname });
                if !self.t.eat(&Token::Comma) {
                    break;
                }
            }
        }
        self.t.expect(Token::RParen, "`)`")?;
        let body = self.block()?;
        Ok(FunDef { return_type, name, params, body })
    }

    fn data_type(&mut self) -> Result<DataType, SourceError> {
        if self.t.eat(&Token::Array) {
            Ok(DataType::array_of(self.t.type_name()?))
        } else {
            Ok(DataType::new(self.t.type_name()?))
        }
    }

    fn block(&mut self) -> Result<Vec<Stmt>, SourceError> {
        self.t.expect(Token::LBrace, "`{`")?;
        let mut stmts = Vec::new();
        while !self.t.at(&Token::RBrace) {
            if self.t.is_at_end() {
                return Err(self.t.unexpected("`}`"));
            }
            stmts.push(self.stmt()?);
        }
        self.t.expect(Token::RBrace, "`}`")?;
        Ok(stmts)
    }

    fn stmt(&mut self) -> Result<Stmt, SourceError> {
        match self.t.peek() {
            Some(Token::If) => Ok(Stmt::If(self.if_stmt()?)),
            Some(Token::While) => Ok(Stmt::While(self.while_stmt()?)),
            Some(Token::For) => Ok(Stmt::For(self.for_stmt()?)),
            Some(Token::Return) => Ok(Stmt::Return(self.return_stmt()?)),
            Some(Token::Switch) => Ok(Stmt::Switch(self.switch_stmt()?)),
            _ if self.t.at_type_start() => Ok(Stmt::VarDecl(self.var_decl_stmt()?)),
            Some(Token::Ident(_)) => match self.t.peek_ahead(1) {
                // `f(...)` is a call statement, `T x = ...` a declaration
                // with a struct type, anything else an assignment.
                Some(Token::LParen) => {
                    let name = self.t.expect_ident("a function name")?;
                    Ok(Stmt::Call(self.call_args(name)?))
                }
                Some(Token::Ident(_)) => Ok(Stmt::VarDecl(self.var_decl_stmt()?)),
                _ => Ok(Stmt::Assign(self.assign_stmt()?)),
            },
            _ => Err(self.t.unexpected("a statement")),
        }
    }

    fn var_decl_stmt(&mut self) -> Result<VarDeclStmt, SourceError> {
        let ty = self.data_type()?;
        let name = self.t.expect_ident("a variable name")?;
        self.t.expect(Token::Assign, "`=`")?;
        let value = self.expr()?;
        Ok(VarDeclStmt { var: VarDef { ty, name }, value })
    }

    fn assign_stmt(&mut self) -> Result<AssignStmt, SourceError> {
        let target = self.path_expr()?;
        self.t.expect(Token::Assign, "`=`")?;
        let value = self.expr()?;
        Ok(AssignStmt { target, value })
    }

    fn path_expr(&mut self) -> Result<PathExpr, SourceError> {
        let root = self.t.expect_ident("a variable name")?;
        let start = root.span;
        let mut segments = vec![self.path_segment(root)?];
        while self.t.eat(&Token::Dot) {
            let field = self.t.expect_ident("a field name")?;
            segments.push(self.path_segment(field)?);
        }
        Ok(PathExpr { segments, span: start.merge(self.t.prev_span()) })
    }

    fn path_segment(&mut self, name: Ident) -> Result<PathSegment, SourceError> {
        let index = if self.t.eat(&Token::LBracket) {
            let e = self.expr()?;
            self.t.expect(Token::RBracket, "`]`")?;
            Some(Box::new(e))
        } else {
            None
        };
        Ok(PathSegment { name, index })
    }

    fn paren_expr(&mut self) -> Result<Expr, SourceError> {
        self.t.expect(Token::LParen, "`(`")?;
        let e = self.expr()?;
        self.t.expect(Token::RParen, "`)`")?;
        Ok(e)
    }

    fn if_stmt(&mut self) -> Result<IfStmt, SourceError> {
        self.t.expect(Token::If, "`if`")?;
        let condition = self.paren_expr()?;
        let body = self.block()?;
        let mut stmt = IfStmt {
            if_part: BasicIf { condition, body },
            else_ifs: Vec::new(),
            else_body: Vec::new(),
        };
        loop {
            if self.t.eat(&Token::Elseif) {
                let condition = self.paren_expr()?;
                let body = self.block()?;
                stmt.else_ifs.push(BasicIf { condition, body });
            } else if self.t.eat(&Token::Else) {
                stmt.else_body = self.block()?;
                break;
            } else {
                break;
            }
        }
        Ok(stmt)
    }

    fn while_stmt(&mut self) -> Result<WhileStmt, SourceError> {
        self.t.expect(Token::While, "`while`")?;
        let condition = self.paren_expr()?;
        let body = self.block()?;
        Ok(WhileStmt { condition, body })
    }

    fn for_stmt(&mut self) -> Result<ForStmt, SourceError> {
        self.t.expect(Token::For, "`for`")?;
        self.t.expect(Token::LParen, "`(`")?;
        let init = self.var_decl_stmt()?;
        self.t.expect(Token::Semicolon, "`;`")?;
        let condition = self.expr()?;
        self.t.expect(Token::Semicolon, "`;`")?;
        let update = self.assign_stmt()?;
        self.t.expect(Token::RParen, "`)`")?;
        let body = self.block()?;
        Ok(ForStmt { init, condition, update, body })
    }

    fn return_stmt(&mut self) -> Result<ReturnStmt, SourceError> {
        let start = self.t.expect(Token::Return, "`return`")?;
        let value = self.expr()?;
        Ok(ReturnStmt { span: start.merge(value.span), value })
    }

    fn switch_stmt(&mut self) -> Result<SwitchStmt, SourceError> {
        let start = self.t.expect(Token::Switch, "`switch`")?;
        self.t.expect(Token::LParen, "`(`")?;
        let scrutinee = self.expr()?;
        self.t.expect(Token::RParen, "`)`")?;
        self.t.expect(Token::LBrace, "`{`")?;
        let mut cases = Vec::new();
        while self.t.eat(&Token::Case) {
            let value = self.literal_expr()?;
            self.t.expect(Token::Colon, "`:`")?;
            let mut body = Vec::new();
            while !matches!(
                self.t.peek(),
                Some(Token::Case | Token::Default | Token::Break | Token::RBrace) | None
            ) {
                body.push(self.stmt()?);
            }
            // A trailing `break` is accepted but has no effect; arms
            // never fall through.
            self.t.eat(&Token::Break);
            cases.push(CaseArm { value, body });
        }
        let mut default_body = Vec::new();
        if self.t.eat(&Token::Default) {
            self.t.expect(Token::Colon, "`:`")?;
            while !self.t.at(&Token::RBrace) {
                if self.t.is_at_end() {
                    return Err(self.t.unexpected("`}`"));
                }
                default_body.push(self.stmt()?);
            }
        }
        let end = self.t.expect(Token::RBrace, "`}`")?;
        Ok(SwitchStmt { scrutinee, cases, default_body, span: start.merge(end) })
    }

    fn literal_expr(&mut self) -> Result<LiteralExpr, SourceError> {
        if !self.t.at_literal() {
            return Err(self.t.unexpected("a literal"));
        }
        let Some((token, span)) = self.t.advance() else {
            return Err(self.t.unexpected("a literal"));
        };
        let value = match token {
            Token::Int(i) => Literal::Int(i),
            Token::Double(x) => Literal::Double(x),
            Token::Bool(b) => Literal::Bool(b),
            Token::Char(c) => Literal::Char(c),
            Token::Str(s) => Literal::Str(s),
            Token::Null => Literal::Null,
            _ => return Err(self.t.unexpected("a literal")),
        };
        Ok(LiteralExpr { value, span })
    }

    fn expr(&mut self) -> Result<Expr, SourceError> {
        let start = self.t.current_span();
        if self.t.eat(&Token::Not) {
            let mut e = self.expr()?;
            e.negated = !e.negated;
            e.span = start.merge(e.span);
            return Ok(e);
        }
        let first = if self.t.eat(&Token::LParen) {
            let inner = self.expr()?;
            self.t.expect(Token::RParen, "`)`")?;
            Term::Grouped(Box::new(inner))
        } else {
            Term::Simple(self.rvalue()?)
        };
        let mut e = Expr {
            negated: false,
            first,
            op: None,
            rest: None,
            ty: None,
            span: start.merge(self.t.prev_span()),
        };
        if let Some(op) = self.t.bin_op() {
            let rest = self.expr()?;
            e.span = e.span.merge(rest.span);
            e.op = Some(op);
            e.rest = Some(Box::new(rest));
        }
        Ok(e)
    }

    fn rvalue(&mut self) -> Result<RValue, SourceError> {
        match self.t.peek() {
            Some(Token::New) => Ok(RValue::New(self.new_expr()?)),
            Some(Token::Ident(_)) => {
                let name = self.t.expect_ident("a name")?;
                if self.t.at(&Token::LParen) {
                    Ok(RValue::Call(self.call_args(name)?))
                } else {
                    let start = name.span;
                    let mut segments = vec![self.path_segment(name)?];
                    while self.t.eat(&Token::Dot) {
                        let field = self.t.expect_ident("a field name")?;
                        segments.push(self.path_segment(field)?);
                    }
                    let span = start.merge(self.t.prev_span());
                    Ok(RValue::Path(PathExpr { segments, span }))
                }
            }
            _ => Ok(RValue::Literal(self.literal_expr()?)),
        }
    }

    fn call_args(&mut self, name: Ident) -> Result<CallExpr, SourceError> {
        let start = name.span;
        self.t.expect(Token::LParen, "`(`")?;
        let mut args = Vec::new();
        if !self.t.at(&Token::RParen) {
            loop {
                args.push(self.expr()?);
                if !self.t.eat(&Token::Comma) {
                    break;
                }
            }
        }
        let end = self.t.expect(Token::RParen, "`)`")?;
        Ok(CallExpr { name, args, span: start.merge(end) })
    }

    /// `new T`, `new T[size]`, or `new base[size]`. A bare struct `new`
    /// takes no brackets; array allocation always does.
    fn new_expr(&mut self) -> Result<NewExpr, SourceError> {
        let start = self.t.expect(Token::New, "`new`")?;
        if matches!(self.t.peek(), Some(Token::Ident(_))) {
            let type_name = self.t.expect_ident("a type name")?;
            let array_size = if self.t.eat(&Token::LBracket) {
                let size = self.expr()?;
                self.t.expect(Token::RBracket, "`]`")?;
                Some(Box::new(size))
            } else {
                None
            };
            Ok(NewExpr { type_name, array_size, span: start.merge(self.t.prev_span()) })
        } else {
            let name_span = self.t.current_span();
            let type_name = Ident::new(self.t.type_name()?, name_span);
            self.t.expect(Token::LBracket, "`[`")?;
            let size = self.expr()?;
            self.t.expect(Token::RBracket, "`]`")?;
            Ok(NewExpr {
                type_name,
                array_size: Some(Box::new(size)),
                span: start.merge(self.t.prev_span()),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::lex;

    fn parse_source(source: &str) -> Program {
        parse(&lex(source).unwrap()).unwrap()
    }

    fn parse_err(source: &str) -> SourceError {
        parse(&lex(source).unwrap()).unwrap_err()
    }

    #[test]
    fn empty_main() {
        let p = parse_source("void main() {}");
        assert_eq!(p.functions.len(), 1);
        assert_eq!(p.functions[0].name.name, "main");
        assert!(p.functions[0].return_type.is_void());
        assert!(p.functions[0].body.is_empty());
    }

    #[test]
    fn struct_with_fields() {
        let p = parse_source("struct Point { int x, int y }");
        assert_eq!(p.structs.len(), 1);
        let s = &p.structs[0];
        assert_eq!(s.name.name, "Point");
        assert_eq!(s.fields.len(), 2);
        assert_eq!(s.fields[0].name.name, "x");
        assert_eq!(s.fields[1].ty, DataType::new("int"));
    }

    #[test]
    fn params_and_array_types() {
        let p = parse_source("int f(array int xs, Point p) { return 0 }");
        let f = &p.functions[0];
        assert_eq!(f.params[0].ty, DataType::array_of("int"));
        assert_eq!(f.params[1].ty, DataType::new("Point"));
    }

    #[test]
    fn statement_dispatch_on_leading_ident() {
        let p = parse_source(
            "void main() { \
               Point p = new Point \
               p.x = 1 \
               f(2) \
             }",
        );
        let body = &p.functions[0].body;
        assert!(matches!(body[0], Stmt::VarDecl(_)));
        assert!(matches!(body[1], Stmt::Assign(_)));
        assert!(matches!(body[2], Stmt::Call(_)));
    }

    #[test]
    fn expression_chains_lean_right() {
        let p = parse_source("void main() { int x = 1 + 2 * 3 }");
        let Stmt::VarDecl(decl) = &p.functions[0].body[0] else {
            panic!("expected a declaration");
        };
        // 1 + (2 * 3): op on the outer node, rest holds the chain
        assert_eq!(decl.value.op, Some(BinOp::Add));
        let rest = decl.value.rest.as_ref().unwrap();
        assert_eq!(rest.op, Some(BinOp::Mul));
        assert!(rest.rest.as_ref().unwrap().op.is_none());
    }

    #[test]
    fn not_negates_the_whole_chain() {
        let p = parse_source("void main() { bool b = not x > 5 }");
        let Stmt::VarDecl(decl) = &p.functions[0].body[0] else {
            panic!("expected a declaration");
        };
        assert!(decl.value.negated);
        assert_eq!(decl.value.op, Some(BinOp::Gt));
    }

    #[test]
    fn path_with_fields_and_indexes() {
        let p = parse_source("void main() { orders[i].customer.name = \"ada\" }");
        let Stmt::Assign(assign) = &p.functions[0].body[0] else {
            panic!("expected an assignment");
        };
        let segs = &assign.target.segments;
        assert_eq!(segs.len(), 3);
        assert_eq!(segs[0].name.name, "orders");
        assert!(segs[0].index.is_some());
        assert_eq!(segs[1].name.name, "customer");
        assert!(segs[1].index.is_none());
        assert_eq!(segs[2].name.name, "name");
    }

    #[test]
    fn new_forms() {
        let p = parse_source(
            "void main() { \
               Point p = new Point \
               array int xs = new int[10] \
               array Point ps = new Point[n] \
             }",
        );
        let body = &p.functions[0].body;
        let Stmt::VarDecl(d0) = &body[0] else { panic!() };
        let Term::Simple(RValue::New(n0)) = &d0.value.first else { panic!() };
        assert!(n0.array_size.is_none());
        let Stmt::VarDecl(d1) = &body[1] else { panic!() };
        let Term::Simple(RValue::New(n1)) = &d1.value.first else { panic!() };
        assert_eq!(n1.type_name.name, "int");
        assert!(n1.array_size.is_some());
    }

    #[test]
    fn switch_cases_and_default() {
        let p = parse_source(
            "void main() { \
               switch (x) { \
                 case 1: print(\"one\") break \
                 case 2: print(\"two\") \
                 default: print(\"other\") \
               } \
             }",
        );
        let Stmt::Switch(s) = &p.functions[0].body[0] else {
            panic!("expected a switch");
        };
        assert_eq!(s.cases.len(), 2);
        assert_eq!(s.cases[0].value.value, Literal::Int(1));
        assert_eq!(s.cases[1].body.len(), 1);
        assert_eq!(s.default_body.len(), 1);
    }

    #[test]
    fn for_loop_shape() {
        let p = parse_source("void main() { for (int i = 0; i < 3; i = i + 1) { print(i) } }");
        let Stmt::For(f) = &p.functions[0].body[0] else {
            panic!("expected a for loop");
        };
        assert_eq!(f.init.var.name.name, "i");
        assert_eq!(f.update.target.segments[0].name.name, "i");
        assert_eq!(f.body.len(), 1);
    }

    #[test]
    fn missing_close_brace_is_reported() {
        let err = parse_err("void main() { int x = 1 ");
        assert!(err.message.contains("expected"));
    }

    #[test]
    fn missing_assign_in_declaration() {
        let err = parse_err("void main() { int x 1 }");
        assert!(err.message.contains("expected `=`"));
    }
}
