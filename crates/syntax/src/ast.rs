//! Abstract syntax tree for Quill programs.
//!
//! Expressions carry an optional resolved type, `None` straight out of
//! the parser and filled in by the semantic checker. The compiler relies
//! on those annotations (for example to pick the array or string form of
//! `length`).

use std::fmt;

/// Byte-offset range into the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Smallest span covering both.
    pub fn merge(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

/// A name together with where it appeared.
#[derive(Debug, Clone, PartialEq)]
pub struct Ident {
    pub name: String,
    pub span: Span,
}

impl Ident {
    pub fn new(name: impl Into<String>, span: Span) -> Self {
        Self { name: name.into(), span }
    }
}

/// A declared type: a base type (`int`, `double`, `bool`, `char`,
/// `string`, `void`), a struct name, or an array of either.
#[derive(Debug, Clone, PartialEq)]
pub struct DataType {
    pub is_array: bool,
    pub name: String,
}

impl DataType {
    pub fn new(name: impl Into<String>) -> Self {
        Self { is_array: false, name: name.into() }
    }

    pub fn array_of(name: impl Into<String>) -> Self {
        Self { is_array: true, name: name.into() }
    }

    pub fn void() -> Self {
        Self::new("void")
    }

    pub fn is_void(&self) -> bool {
        !self.is_array && self.name == "void"
    }

    pub fn is_base(&self) -> bool {
        matches!(self.name.as_str(), "int" | "double" | "bool" | "char" | "string")
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_array {
            write!(f, "array {}", self.name)
        } else {
            write!(f, "{}", self.name)
        }
    }
}

/// A typed name: a struct field, function parameter, or declared
/// variable.
#[derive(Debug, Clone, PartialEq)]
pub struct VarDef {
    pub ty: DataType,
    pub name: Ident,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StructDef {
    pub name: Ident,
    pub fields: Vec<VarDef>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunDef {
    pub return_type: DataType,
    pub name: Ident,
    pub params: Vec<VarDef>,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Program {
    pub structs: Vec<StructDef>,
    pub functions: Vec<FunDef>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Int(i64),
    Double(f64),
    Bool(bool),
    Char(char),
    Str(String),
    Null,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LiteralExpr {
    pub value: Literal,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    And,
    Or,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
}

impl BinOp {
    pub fn is_arithmetic(self) -> bool {
        matches!(self, BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div)
    }

    pub fn is_logical(self) -> bool {
        matches!(self, BinOp::And | BinOp::Or)
    }

    pub fn is_relational(self) -> bool {
        matches!(self, BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge)
    }

    pub fn is_equality(self) -> bool {
        matches!(self, BinOp::Eq | BinOp::Ne)
    }
}

impl fmt::Display for BinOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::And => "and",
            BinOp::Or => "or",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
        };
        write!(f, "{}", text)
    }
}

/// A (possibly chained) expression: `first` then optionally `op rest`,
/// right-leaning as parsed. `negated` wraps the whole chain in `not`.
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub negated: bool,
    pub first: Term,
    pub op: Option<BinOp>,
    pub rest: Option<Box<Expr>>,
    /// Filled in by the semantic checker.
    pub ty: Option<DataType>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Term {
    Simple(RValue),
    Grouped(Box<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum RValue {
    Literal(LiteralExpr),
    New(NewExpr),
    Path(PathExpr),
    Call(CallExpr),
}

/// `new T` for structs, `new T[size]` for arrays (element type may be a
/// base type or a struct name).
#[derive(Debug, Clone, PartialEq)]
pub struct NewExpr {
    pub type_name: Ident,
    pub array_size: Option<Box<Expr>>,
    pub span: Span,
}

/// A variable access path: root name, then field and index hops, e.g.
/// `orders[i].customer.name`.
#[derive(Debug, Clone, PartialEq)]
pub struct PathExpr {
    pub segments: Vec<PathSegment>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PathSegment {
    pub name: Ident,
    pub index: Option<Box<Expr>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CallExpr {
    pub name: Ident,
    pub args: Vec<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    VarDecl(VarDeclStmt),
    Assign(AssignStmt),
    If(IfStmt),
    While(WhileStmt),
    For(ForStmt),
    Return(ReturnStmt),
    Switch(SwitchStmt),
    Call(CallExpr),
}

#[derive(Debug, Clone, PartialEq)]
pub struct VarDeclStmt {
    pub var: VarDef,
    pub value: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssignStmt {
    pub target: PathExpr,
    pub value: Expr,
}

/// One `if`/`elseif` arm: condition plus body.
#[derive(Debug, Clone, PartialEq)]
pub struct BasicIf {
    pub condition: Expr,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IfStmt {
    pub if_part: BasicIf,
    pub else_ifs: Vec<BasicIf>,
    pub else_body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WhileStmt {
    pub condition: Expr,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForStmt {
    pub init: VarDeclStmt,
    pub condition: Expr,
    pub update: AssignStmt,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReturnStmt {
    pub value: Expr,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SwitchStmt {
    pub scrutinee: Expr,
    pub cases: Vec<CaseArm>,
    pub default_body: Vec<Stmt>,
    pub span: Span,
}

/// `case <literal>: body`. A trailing `break` is accepted by the grammar
/// but carries no meaning; arms never fall through.
#[derive(Debug, Clone, PartialEq)]
pub struct CaseArm {
    pub value: LiteralExpr,
    pub body: Vec<Stmt>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn span_merge_covers_both() {
        let a = Span::new(4, 9);
        let b = Span::new(1, 6);
        assert_eq!(a.merge(b), Span::new(1, 9));
    }

    #[test]
    fn data_type_display() {
        assert_eq!(DataType::new("int").to_string(), "int");
        assert_eq!(DataType::array_of("Point").to_string(), "array Point");
        assert!(DataType::void().is_void());
        assert!(!DataType::new("Point").is_base());
    }
}
