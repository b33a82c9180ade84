//! The checking pass: two sweeps over the program.
//!
//! Sweep one registers struct and function signatures so definitions may
//! appear in any order. Sweep two types every expression bottom-up,
//! writing the result into `Expr::ty`.

use std::collections::HashMap;

use thiserror::Error;

use quill_syntax::ast::*;
use quill_syntax::SourceError;

/// Functions the language provides; user functions may not reuse these
/// names.
pub const BUILTINS: &[&str] = &[
    "print",
    "input",
    "get",
    "length",
    "to_int",
    "to_double",
    "to_string",
    "concat",
];

#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct CheckError {
    pub message: String,
    pub span: Span,
}

impl CheckError {
    fn new(message: impl Into<String>, span: Span) -> Self {
        Self { message: message.into(), span }
    }

    pub fn to_source_error(&self) -> SourceError {
        SourceError::check(&self.message, self.span)
    }
}

/// Check the program and annotate expression types in place.
pub fn check(program: &mut Program) -> Result<(), CheckError> {
    let mut checker = Checker::new(program)?;
    checker.check_main(program)?;
    for fun in &mut program.functions {
        checker.check_fun(fun)?;
    }
    Ok(())
}

#[derive(Debug, Clone)]
struct FunSig {
    params: Vec<DataType>,
    ret: DataType,
}

struct Checker {
    structs: HashMap<String, StructDef>,
    funs: HashMap<String, FunSig>,
    table: SymbolTable,
    current_return: DataType,
}

impl Checker {
    /// Sweep one: build the struct and function tables.
    fn new(program: &Program) -> Result<Self, CheckError> {
        let mut structs: HashMap<String, StructDef> = HashMap::new();
        for s in &program.structs {
            if structs.contains_key(&s.name.name) {
                return Err(CheckError::new(
                    format!("struct `{}` is defined more than once", s.name.name),
                    s.name.span,
                ));
            }
            let mut seen = HashMap::new();
            for field in &s.fields {
                if seen.insert(field.name.name.clone(), ()).is_some() {
                    return Err(CheckError::new(
                        format!(
                            "struct `{}` declares field `{}` more than once",
                            s.name.name, field.name.name
                        ),
                        field.name.span,
                    ));
                }
            }
            structs.insert(s.name.name.clone(), s.clone());
        }

        let mut funs: HashMap<String, FunSig> = HashMap::new();
        for f in &program.functions {
            let name = &f.name.name;
            if BUILTINS.contains(&name.as_str()) {
                return Err(CheckError::new(
                    format!("function `{}` shadows a builtin", name),
                    f.name.span,
                ));
            }
            if funs.contains_key(name) {
                return Err(CheckError::new(
                    format!("function `{}` is defined more than once", name),
                    f.name.span,
                ));
            }
            funs.insert(
                name.clone(),
                FunSig {
                    params: f.params.iter().map(|p| p.ty.clone()).collect(),
                    ret: f.return_type.clone(),
                },
            );
        }

        let checker = Self {
            structs,
            funs,
            table: SymbolTable::default(),
            current_return: DataType::void(),
        };

        // Field and signature types may reference any struct, so validate
        // them only after everything is registered.
        for s in &program.structs {
            for field in &s.fields {
                checker.require_type(&field.ty, field.name.span)?;
            }
        }
        for f in &program.functions {
            for p in &f.params {
                checker.require_type(&p.ty, p.name.span)?;
            }
            if !f.return_type.is_void() {
                checker.require_type(&f.return_type, f.name.span)?;
            }
        }
        Ok(checker)
    }

    fn check_main(&self, program: &Program) -> Result<(), CheckError> {
        let Some(main) = program.functions.iter().find(|f| f.name.name == "main") else {
            return Err(CheckError::new("no `main` function defined", Span::default()));
        };
        if !main.return_type.is_void() || !main.params.is_empty() {
            return Err(CheckError::new(
                "`main` must return void and take no parameters",
                main.name.span,
            ));
        }
        Ok(())
    }

    fn require_type(&self, ty: &DataType, span: Span) -> Result<(), CheckError> {
        if ty.is_base() || self.structs.contains_key(&ty.name) {
            Ok(())
        } else {
            Err(CheckError::new(format!("unknown type `{}`", ty.name), span))
        }
    }

    fn check_fun(&mut self, fun: &mut FunDef) -> Result<(), CheckError> {
        self.current_return = fun.return_type.clone();
        self.table = SymbolTable::default();
        self.table.push_scope();
        for p in &fun.params {
            self.table.declare(&p.name, p.ty.clone())?;
        }
        self.check_block(&mut fun.body)?;
        self.table.pop_scope();
        Ok(())
    }

    fn check_block(&mut self, stmts: &mut [Stmt]) -> Result<(), CheckError> {
        self.table.push_scope();
        for stmt in stmts.iter_mut() {
            self.check_stmt(stmt)?;
        }
        self.table.pop_scope();
        Ok(())
    }

    fn check_stmt(&mut self, stmt: &mut Stmt) -> Result<(), CheckError> {
        match stmt {
            Stmt::VarDecl(d) => self.check_var_decl(d),
            Stmt::Assign(a) => {
                let target_ty = self.check_path(&mut a.target)?;
                let value_ty = self.check_expr(&mut a.value)?;
                self.require_compatible(&target_ty, &value_ty, a.value.span)
            }
            Stmt::If(i) => {
                self.require_bool_condition(&mut i.if_part.condition)?;
                self.check_block(&mut i.if_part.body)?;
                for arm in &mut i.else_ifs {
                    self.require_bool_condition(&mut arm.condition)?;
                    self.check_block(&mut arm.body)?;
                }
                self.check_block(&mut i.else_body)
            }
            Stmt::While(w) => {
                self.require_bool_condition(&mut w.condition)?;
                self.check_block(&mut w.body)
            }
            Stmt::For(f) => {
                // the loop variable's scope covers header and body
                self.table.push_scope();
                self.check_var_decl(&mut f.init)?;
                self.require_bool_condition(&mut f.condition)?;
                let target_ty = self.check_path(&mut f.update.target)?;
                let value_ty = self.check_expr(&mut f.update.value)?;
                self.require_compatible(&target_ty, &value_ty, f.update.value.span)?;
                self.check_block(&mut f.body)?;
                self.table.pop_scope();
                Ok(())
            }
            Stmt::Return(r) => {
                let value_ty = self.check_expr(&mut r.value)?;
                if self.current_return.is_void() {
                    if !is_null(&value_ty) {
                        return Err(CheckError::new(
                            "a void function can only `return null`",
                            r.span,
                        ));
                    }
                    Ok(())
                } else {
                    let expected = self.current_return.clone();
                    self.require_compatible(&expected, &value_ty, r.span)
                }
            }
            Stmt::Switch(s) => self.check_switch(s),
            Stmt::Call(c) => self.check_call(c).map(|_| ()),
        }
    }

    fn check_var_decl(&mut self, d: &mut VarDeclStmt) -> Result<(), CheckError> {
        self.require_type(&d.var.ty, d.var.name.span)?;
        let value_ty = self.check_expr(&mut d.value)?;
        self.require_compatible(&d.var.ty.clone(), &value_ty, d.value.span)?;
        self.table.declare(&d.var.name, d.var.ty.clone())
    }

    fn check_switch(&mut self, s: &mut SwitchStmt) -> Result<(), CheckError> {
        let scrutinee_ty = self.check_expr(&mut s.scrutinee)?;
        if scrutinee_ty.is_array
            || !matches!(scrutinee_ty.name.as_str(), "int" | "char" | "string" | "bool")
        {
            return Err(CheckError::new(
                format!("cannot switch on a value of type `{}`", scrutinee_ty),
                s.scrutinee.span,
            ));
        }
        for arm in &mut s.cases {
            let case_ty = literal_type(&arm.value.value);
            if case_ty != scrutinee_ty {
                return Err(CheckError::new(
                    format!(
                        "case constant has type `{}` but the switch value has type `{}`",
                        case_ty, scrutinee_ty
                    ),
                    arm.value.span,
                ));
            }
            self.check_block(&mut arm.body)?;
        }
        self.check_block(&mut s.default_body)
    }

    fn require_bool_condition(&mut self, condition: &mut Expr) -> Result<(), CheckError> {
        let ty = self.check_expr(condition)?;
        if ty.is_array || ty.name != "bool" {
            return Err(CheckError::new(
                format!("condition must be bool, found `{}`", ty),
                condition.span,
            ));
        }
        Ok(())
    }

    /// Type an expression bottom-up, recording the result on every node.
    fn check_expr(&mut self, e: &mut Expr) -> Result<DataType, CheckError> {
        let first_ty = match &mut e.first {
            Term::Simple(rv) => self.check_rvalue(rv, e.span)?,
            Term::Grouped(inner) => self.check_expr(inner)?,
        };
        let ty = match (e.op, &mut e.rest) {
            (Some(op), Some(rest)) => {
                let rest_ty = self.check_expr(rest)?;
                combine(op, &first_ty, &rest_ty, e.span)?
            }
            _ => first_ty,
        };
        if e.negated && (ty.is_array || ty.name != "bool") {
            return Err(CheckError::new(
                format!("`not` requires a bool operand, found `{}`", ty),
                e.span,
            ));
        }
        e.ty = Some(ty.clone());
        Ok(ty)
    }

    fn check_rvalue(&mut self, rv: &mut RValue, span: Span) -> Result<DataType, CheckError> {
        match rv {
            RValue::Literal(lit) => Ok(literal_type(&lit.value)),
            RValue::Path(p) => self.check_path(p),
            RValue::Call(c) => self.check_call(c),
            RValue::New(n) => {
                let name = n.type_name.name.clone();
                match &mut n.array_size {
                    Some(size) => {
                        let size_ty = self.check_expr(size)?;
                        if size_ty.is_array || size_ty.name != "int" {
                            return Err(CheckError::new(
                                format!("array size must be int, found `{}`", size_ty),
                                size.span,
                            ));
                        }
                        self.require_type(&DataType::new(name.clone()), span)?;
                        Ok(DataType::array_of(name))
                    }
                    None => {
                        if !self.structs.contains_key(&name) {
                            return Err(CheckError::new(
                                format!("unknown struct type `{}`", name),
                                n.type_name.span,
                            ));
                        }
                        Ok(DataType::new(name))
                    }
                }
            }
        }
    }

    /// Walk a variable path, validating each field hop and index.
    fn check_path(&mut self, p: &mut PathExpr) -> Result<DataType, CheckError> {
        let mut segments = p.segments.iter_mut();
        let Some(first) = segments.next() else {
            return Err(CheckError::new("empty variable path", p.span));
        };
        let mut current = match self.table.lookup(&first.name.name) {
            Some(ty) => ty.clone(),
            None => {
                return Err(CheckError::new(
                    format!("unknown variable `{}`", first.name.name),
                    first.name.span,
                ));
            }
        };
        current = self.apply_index(current, first)?;
        for seg in segments {
            if current.is_array {
                return Err(CheckError::new(
                    format!("cannot access field `{}` of an array", seg.name.name),
                    seg.name.span,
                ));
            }
            let field_ty = match self.structs.get(&current.name) {
                Some(sdef) => sdef
                    .fields
                    .iter()
                    .find(|f| f.name.name == seg.name.name)
                    .map(|f| f.ty.clone()),
                None => {
                    return Err(CheckError::new(
                        format!("cannot access field `{}` of `{}`", seg.name.name, current),
                        seg.name.span,
                    ));
                }
            };
            current = match field_ty {
                Some(ty) => ty,
                None => {
                    return Err(CheckError::new(
                        format!("struct `{}` has no field `{}`", current.name, seg.name.name),
                        seg.name.span,
                    ));
                }
            };
            current = self.apply_index(current, seg)?;
        }
        Ok(current)
    }

    fn apply_index(
        &mut self,
        current: DataType,
        seg: &mut PathSegment,
    ) -> Result<DataType, CheckError> {
        let Some(index) = seg.index.as_deref_mut() else {
            return Ok(current);
        };
        if !current.is_array {
            return Err(CheckError::new(
                format!("cannot index `{}`, which is not an array", seg.name.name),
                seg.name.span,
            ));
        }
        let index_ty = self.check_expr(index)?;
        if index_ty.is_array || index_ty.name != "int" {
            return Err(CheckError::new(
                format!("array index must be int, found `{}`", index_ty),
                index.span,
            ));
        }
        Ok(DataType::new(current.name))
    }

    fn check_call(&mut self, c: &mut CallExpr) -> Result<DataType, CheckError> {
        let mut arg_types = Vec::with_capacity(c.args.len());
        for arg in &mut c.args {
            arg_types.push(self.check_expr(arg)?);
        }
        let name = c.name.name.as_str();
        match name {
            "print" => {
                self.require_arity(c, 1)?;
                if !arg_types[0].is_base() || arg_types[0].is_array {
                    return Err(CheckError::new(
                        format!("print expects a base-type value, found `{}`", arg_types[0]),
                        c.args[0].span,
                    ));
                }
                Ok(DataType::void())
            }
            "input" => {
                self.require_arity(c, 0)?;
                Ok(DataType::new("string"))
            }
            "get" => {
                self.require_arity(c, 2)?;
                require_base(&arg_types[0], "int", &c.args[0])?;
                require_base(&arg_types[1], "string", &c.args[1])?;
                Ok(DataType::new("char"))
            }
            "length" => {
                self.require_arity(c, 1)?;
                let ty = &arg_types[0];
                if !ty.is_array && ty.name != "string" {
                    return Err(CheckError::new(
                        format!("length expects a string or array, found `{}`", ty),
                        c.args[0].span,
                    ));
                }
                Ok(DataType::new("int"))
            }
            "to_int" => {
                self.require_arity(c, 1)?;
                let ty = &arg_types[0];
                if ty.is_array || !matches!(ty.name.as_str(), "string" | "double" | "char") {
                    return Err(CheckError::new(
                        format!("to_int expects a string, double, or char, found `{}`", ty),
                        c.args[0].span,
                    ));
                }
                Ok(DataType::new("int"))
            }
            "to_double" => {
                self.require_arity(c, 1)?;
                let ty = &arg_types[0];
                if ty.is_array || !matches!(ty.name.as_str(), "string" | "int") {
                    return Err(CheckError::new(
                        format!("to_double expects a string or int, found `{}`", ty),
                        c.args[0].span,
                    ));
                }
                Ok(DataType::new("double"))
            }
            "to_string" => {
                self.require_arity(c, 1)?;
                let ty = &arg_types[0];
                if ty.is_array || !matches!(ty.name.as_str(), "int" | "double" | "char" | "bool") {
                    return Err(CheckError::new(
                        format!("to_string expects a base value, found `{}`", ty),
                        c.args[0].span,
                    ));
                }
                Ok(DataType::new("string"))
            }
            "concat" => {
                self.require_arity(c, 2)?;
                require_base(&arg_types[0], "string", &c.args[0])?;
                require_base(&arg_types[1], "string", &c.args[1])?;
                Ok(DataType::new("string"))
            }
            _ => {
                let sig = match self.funs.get(name) {
                    Some(sig) => sig.clone(),
                    None => {
                        return Err(CheckError::new(
                            format!("unknown function `{}`", name),
                            c.name.span,
                        ));
                    }
                };
                if sig.params.len() != arg_types.len() {
                    return Err(CheckError::new(
                        format!(
                            "function `{}` expects {} argument{}, but {} {} provided",
                            name,
                            sig.params.len(),
                            if sig.params.len() == 1 { "" } else { "s" },
                            arg_types.len(),
                            if arg_types.len() == 1 { "was" } else { "were" }
                        ),
                        c.span,
                    ));
                }
                for (i, (param, arg)) in sig.params.iter().zip(&arg_types).enumerate() {
                    self.require_compatible(param, arg, c.args[i].span)?;
                }
                Ok(sig.ret)
            }
        }
    }

    fn require_arity(&self, c: &CallExpr, expected: usize) -> Result<(), CheckError> {
        if c.args.len() == expected {
            Ok(())
        } else {
            Err(CheckError::new(
                format!(
                    "function `{}` expects {} argument{}, but {} {} provided",
                    c.name.name,
                    expected,
                    if expected == 1 { "" } else { "s" },
                    c.args.len(),
                    if c.args.len() == 1 { "was" } else { "were" }
                ),
                c.span,
            ))
        }
    }

    /// Types match exactly, or the value is null (null fits anything).
    fn require_compatible(
        &self,
        expected: &DataType,
        found: &DataType,
        span: Span,
    ) -> Result<(), CheckError> {
        if expected == found || is_null(found) {
            Ok(())
        } else {
            Err(CheckError::new(
                format!("type mismatch: expected `{}`, found `{}`", expected, found),
                span,
            ))
        }
    }
}

/// `null` carries the non-array `void` type.
fn is_null(ty: &DataType) -> bool {
    !ty.is_array && ty.name == "void"
}

fn literal_type(lit: &Literal) -> DataType {
    match lit {
        Literal::Int(_) => DataType::new("int"),
        Literal::Double(_) => DataType::new("double"),
        Literal::Bool(_) => DataType::new("bool"),
        Literal::Char(_) => DataType::new("char"),
        Literal::Str(_) => DataType::new("string"),
        Literal::Null => DataType::void(),
    }
}

fn require_base(ty: &DataType, expected: &str, arg: &Expr) -> Result<(), CheckError> {
    if !ty.is_array && ty.name == expected {
        Ok(())
    } else {
        Err(CheckError::new(
            format!("expected `{}`, found `{}`", expected, ty),
            arg.span,
        ))
    }
}

fn combine(op: BinOp, lhs: &DataType, rhs: &DataType, span: Span) -> Result<DataType, CheckError> {
    if op.is_arithmetic() {
        if lhs == rhs && !lhs.is_array && matches!(lhs.name.as_str(), "int" | "double") {
            Ok(lhs.clone())
        } else {
            Err(CheckError::new(
                format!(
                    "operator `{}` requires two ints or two doubles, found `{}` and `{}`",
                    op, lhs, rhs
                ),
                span,
            ))
        }
    } else if op.is_logical() {
        if !lhs.is_array && lhs.name == "bool" && !rhs.is_array && rhs.name == "bool" {
            Ok(DataType::new("bool"))
        } else {
            Err(CheckError::new(
                format!(
                    "operator `{}` requires bool operands, found `{}` and `{}`",
                    op, lhs, rhs
                ),
                span,
            ))
        }
    } else if op.is_relational() {
        if lhs == rhs
            && !lhs.is_array
            && matches!(lhs.name.as_str(), "int" | "double" | "char" | "string")
        {
            Ok(DataType::new("bool"))
        } else {
            Err(CheckError::new(
                format!(
                    "operator `{}` requires matching comparable operands, found `{}` and `{}`",
                    op, lhs, rhs
                ),
                span,
            ))
        }
    } else {
        // equality: matching types, or either side null
        if lhs == rhs || is_null(lhs) || is_null(rhs) {
            Ok(DataType::new("bool"))
        } else {
            Err(CheckError::new(
                format!(
                    "operator `{}` requires matching operands, found `{}` and `{}`",
                    op, lhs, rhs
                ),
                span,
            ))
        }
    }
}

/// Lexically scoped symbol table for variable declarations.
#[derive(Debug, Default)]
struct SymbolTable {
    scopes: Vec<HashMap<String, DataType>>,
}

impl SymbolTable {
    fn push_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    fn pop_scope(&mut self) {
        self.scopes.pop();
    }

    fn declare(&mut self, name: &Ident, ty: DataType) -> Result<(), CheckError> {
        let Some(scope) = self.scopes.last_mut() else {
            return Err(CheckError::new("declaration outside any scope", name.span));
        };
        if scope.insert(name.name.clone(), ty).is_some() {
            return Err(CheckError::new(
                format!("`{}` is declared more than once in this scope", name.name),
                name.span,
            ));
        }
        Ok(())
    }

    fn lookup(&self, name: &str) -> Option<&DataType> {
        self.scopes.iter().rev().find_map(|scope| scope.get(name))
    }
}
