//! AST to bytecode translation.
//!
//! The compiler expects a program that already went through the semantic
//! checker: names resolve, types line up, and every expression carries a
//! type annotation. The errors here are internal-consistency guards, not
//! user-facing diagnostics.
//!
//! Each function becomes one [`FrameTemplate`]. Forward jumps are emitted
//! with the [`UNPATCHED`] sentinel and resolved once their target index
//! is known.

use std::collections::HashMap;

use thiserror::Error;

use quill_syntax::ast::{
    AssignStmt, BinOp, CallExpr, Expr, ForStmt, FunDef, IfStmt, Literal, NewExpr, PathExpr,
    Program, RValue, ReturnStmt, Span, Stmt, StructDef, SwitchStmt, Term, VarDeclStmt, WhileStmt,
};
use quill_vm::{disassemble_program, FrameTemplate, Instruction, Value, UNPATCHED};

/// Raised only when the input program was not checked first.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompileError {
    #[error("unknown variable `{name}`")]
    UnknownVariable { name: String, span: Span },
    #[error("unknown struct type `{name}`")]
    UnknownStruct { name: String, span: Span },
    #[error("expression was not type-annotated")]
    MissingAnnotation { span: Span },
}

impl CompileError {
    pub fn span(&self) -> Span {
        match self {
            CompileError::UnknownVariable { span, .. }
            | CompileError::UnknownStruct { span, .. }
            | CompileError::MissingAnnotation { span } => *span,
        }
    }
}

/// The compiled program: one frame template per function, keyed by name.
#[derive(Debug, Clone, Default)]
pub struct CompiledProgram {
    pub templates: HashMap<String, FrameTemplate>,
}

impl CompiledProgram {
    pub fn into_templates(self) -> HashMap<String, FrameTemplate> {
        self.templates
    }

    /// Listing of every frame, sorted by function name.
    pub fn disassemble(&self) -> String {
        disassemble_program(self.templates.values())
    }
}

/// Compile a checked program down to frame templates.
pub fn compile(program: &Program) -> Result<CompiledProgram, CompileError> {
    let mut struct_fields = HashMap::new();
    for s in &program.structs {
        struct_fields.insert(s.name.name.clone(), field_order(s));
    }
    let mut templates = HashMap::new();
    for fun in &program.functions {
        let template = FunCompiler::new(&struct_fields).compile_fun(fun)?;
        templates.insert(fun.name.name.clone(), template);
    }
    Ok(CompiledProgram { templates })
}

/// Field names in declaration order; `new` initializes them in this
/// order so disassembly is stable.
fn field_order(s: &StructDef) -> Vec<String> {
    s.fields.iter().map(|f| f.name.name.clone()).collect()
}

/// Per-function compilation state: the template being filled and the
/// name-to-slot mapping for locals.
struct FunCompiler<'a> {
    struct_fields: &'a HashMap<String, Vec<String>>,
    template: FrameTemplate,
    locals: LocalScopes,
}

impl<'a> FunCompiler<'a> {
    fn new(struct_fields: &'a HashMap<String, Vec<String>>) -> Self {
        Self {
            struct_fields,
            template: FrameTemplate::default(),
            locals: LocalScopes::default(),
        }
    }

    fn compile_fun(mut self, fun: &FunDef) -> Result<FrameTemplate, CompileError> {
        self.template = FrameTemplate::new(fun.name.name.clone(), fun.params.len());
        self.locals.push_scope();
        // CALL moves arguments so the first one ends up on top; storing
        // them in declaration order puts each in its own slot.
        for param in &fun.params {
            let slot = self.locals.declare(&param.name.name);
            self.template.emit(Instruction::Store(slot));
        }
        self.compile_block(&fun.body)?;
        if !self.template.ends_with_return() {
            self.template.emit(Instruction::Push(Value::Null));
            self.template.emit(Instruction::Ret);
        }
        self.locals.pop_scope();
        Ok(self.template)
    }

    fn compile_block(&mut self, stmts: &[Stmt]) -> Result<(), CompileError> {
        self.locals.push_scope();
        for stmt in stmts {
            self.compile_stmt(stmt)?;
        }
        self.locals.pop_scope();
        Ok(())
    }

    fn compile_stmt(&mut self, stmt: &Stmt) -> Result<(), CompileError> {
        match stmt {
            Stmt::VarDecl(decl) => self.compile_var_decl(decl),
            Stmt::Assign(assign) => self.compile_assign(assign),
            Stmt::If(stmt) => self.compile_if(stmt),
            Stmt::While(stmt) => self.compile_while(stmt),
            Stmt::For(stmt) => self.compile_for(stmt),
            Stmt::Return(stmt) => self.compile_return(stmt),
            Stmt::Switch(stmt) => self.compile_switch(stmt),
            Stmt::Call(call) => {
                // a statement-level call discards the callee's result
                if self.compile_call(call)? {
                    self.template.emit(Instruction::Pop);
                }
                Ok(())
            }
        }
    }

    fn compile_var_decl(&mut self, decl: &VarDeclStmt) -> Result<(), CompileError> {
        self.compile_expr(&decl.value)?;
        let slot = self.locals.declare(&decl.var.name.name);
        self.template.emit(Instruction::Store(slot));
        Ok(())
    }

    fn compile_assign(&mut self, assign: &AssignStmt) -> Result<(), CompileError> {
        let segments = &assign.target.segments;
        let first = &segments[0];
        let slot = self.lookup(&first.name.name, first.name.span)?;
        if segments.len() == 1 && first.index.is_none() {
            self.compile_expr(&assign.value)?;
            self.template.emit(Instruction::Store(slot));
            return Ok(());
        }
        self.template.emit(Instruction::Load(slot));
        if let Some(index) = &first.index {
            if segments.len() == 1 {
                // SETI pops value, index, then the array id
                self.compile_expr(index)?;
                self.compile_expr(&assign.value)?;
                self.template.emit(Instruction::SetIndex);
                return Ok(());
            }
            self.compile_expr(index)?;
            self.template.emit(Instruction::GetIndex);
        }
        for (i, seg) in segments.iter().enumerate().skip(1) {
            let last = i == segments.len() - 1;
            match (&seg.index, last) {
                (None, false) => {
                    self.template.emit(Instruction::GetField(seg.name.name.clone()));
                }
                (Some(index), false) => {
                    self.template.emit(Instruction::GetField(seg.name.name.clone()));
                    self.compile_expr(index)?;
                    self.template.emit(Instruction::GetIndex);
                }
                (None, true) => {
                    self.compile_expr(&assign.value)?;
                    self.template.emit(Instruction::SetField(seg.name.name.clone()));
                }
                (Some(index), true) => {
                    self.template.emit(Instruction::GetField(seg.name.name.clone()));
                    self.compile_expr(index)?;
                    self.compile_expr(&assign.value)?;
                    self.template.emit(Instruction::SetIndex);
                }
            }
        }
        Ok(())
    }

    /// Each arm tests its condition and falls through a JMPF to the next
    /// arm's landing NOP; every arm body jumps to one shared exit NOP.
    fn compile_if(&mut self, stmt: &IfStmt) -> Result<(), CompileError> {
        let mut exit_jumps = Vec::new();
        let mut pending: Option<usize> = None;
        for arm in std::iter::once(&stmt.if_part).chain(stmt.else_ifs.iter()) {
            if let Some(jump) = pending.take() {
                let landing = self.template.emit(Instruction::Nop);
                self.template.patch_jump(jump, landing);
            }
            self.compile_expr(&arm.condition)?;
            pending = Some(self.template.emit(Instruction::JumpIfFalse(UNPATCHED)));
            self.compile_block(&arm.body)?;
            exit_jumps.push(self.template.emit(Instruction::Jump(UNPATCHED)));
        }
        if let Some(jump) = pending {
            let landing = self.template.emit(Instruction::Nop);
            self.template.patch_jump(jump, landing);
        }
        self.compile_block(&stmt.else_body)?;
        let exit = self.template.emit(Instruction::Nop);
        for jump in exit_jumps {
            self.template.patch_jump(jump, exit);
        }
        Ok(())
    }

    fn compile_while(&mut self, stmt: &WhileStmt) -> Result<(), CompileError> {
        let loop_start = self.template.instructions.len();
        self.compile_expr(&stmt.condition)?;
        let exit_jump = self.template.emit(Instruction::JumpIfFalse(UNPATCHED));
        self.compile_block(&stmt.body)?;
        self.template.emit(Instruction::Jump(loop_start));
        let exit = self.template.emit(Instruction::Nop);
        self.template.patch_jump(exit_jump, exit);
        Ok(())
    }

    /// A for loop is a while loop whose counter lives in a scope covering
    /// the header and body.
    fn compile_for(&mut self, stmt: &ForStmt) -> Result<(), CompileError> {
        self.locals.push_scope();
        self.compile_var_decl(&stmt.init)?;
        let loop_start = self.template.instructions.len();
        self.compile_expr(&stmt.condition)?;
        let exit_jump = self.template.emit(Instruction::JumpIfFalse(UNPATCHED));
        self.compile_block(&stmt.body)?;
        self.compile_assign(&stmt.update)?;
        self.template.emit(Instruction::Jump(loop_start));
        let exit = self.template.emit(Instruction::Nop);
        self.template.patch_jump(exit_jump, exit);
        self.locals.pop_scope();
        Ok(())
    }

    fn compile_return(&mut self, stmt: &ReturnStmt) -> Result<(), CompileError> {
        self.compile_expr(&stmt.value)?;
        self.template.emit(Instruction::Ret);
        Ok(())
    }

    /// The scrutinee is evaluated once into a scratch slot; each arm
    /// reloads it and compares against the arm's constant. Arms never
    /// fall through.
    fn compile_switch(&mut self, stmt: &SwitchStmt) -> Result<(), CompileError> {
        self.locals.push_scope();
        self.compile_expr(&stmt.scrutinee)?;
        let slot = self.locals.declare_scratch();
        self.template.emit(Instruction::Store(slot));
        let mut exit_jumps = Vec::new();
        let mut pending: Option<usize> = None;
        for arm in &stmt.cases {
            if let Some(jump) = pending.take() {
                let landing = self.template.emit(Instruction::Nop);
                self.template.patch_jump(jump, landing);
            }
            self.template.emit(Instruction::Push(literal_value(&arm.value.value)));
            self.template.emit(Instruction::Load(slot));
            self.template.emit(Instruction::CmpEq);
            pending = Some(self.template.emit(Instruction::JumpIfFalse(UNPATCHED)));
            self.compile_block(&arm.body)?;
            exit_jumps.push(self.template.emit(Instruction::Jump(UNPATCHED)));
        }
        if let Some(jump) = pending {
            let landing = self.template.emit(Instruction::Nop);
            self.template.patch_jump(jump, landing);
        }
        self.compile_block(&stmt.default_body)?;
        let exit = self.template.emit(Instruction::Nop);
        for jump in exit_jumps {
            self.template.patch_jump(jump, exit);
        }
        self.locals.pop_scope();
        Ok(())
    }

    /// Pushes the first term, then the rest of the chain, then the
    /// operator; the VM pops the right operand first.
    fn compile_expr(&mut self, expr: &Expr) -> Result<(), CompileError> {
        match &expr.first {
            Term::Simple(rvalue) => self.compile_rvalue(rvalue)?,
            Term::Grouped(inner) => self.compile_expr(inner)?,
        }
        if let (Some(op), Some(rest)) = (expr.op, &expr.rest) {
            self.compile_expr(rest)?;
            self.template.emit(bin_op_instruction(op));
        }
        if expr.negated {
            self.template.emit(Instruction::Not);
        }
        Ok(())
    }

    fn compile_rvalue(&mut self, rvalue: &RValue) -> Result<(), CompileError> {
        match rvalue {
            RValue::Literal(lit) => {
                self.template.emit(Instruction::Push(literal_value(&lit.value)));
                Ok(())
            }
            RValue::New(new) => self.compile_new(new),
            RValue::Path(path) => self.compile_path_load(path),
            RValue::Call(call) => {
                self.compile_call(call)?;
                Ok(())
            }
        }
    }

    fn compile_new(&mut self, new: &NewExpr) -> Result<(), CompileError> {
        if let Some(size) = &new.array_size {
            self.compile_expr(size)?;
            self.template.emit(Instruction::Push(Value::Null));
            self.template.emit(Instruction::AllocArray);
            return Ok(());
        }
        let fields = self
            .struct_fields
            .get(&new.type_name.name)
            .ok_or_else(|| CompileError::UnknownStruct {
                name: new.type_name.name.clone(),
                span: new.type_name.span,
            })?
            .clone();
        self.template.emit(Instruction::AllocStruct);
        for field in fields {
            self.template.emit(Instruction::Dup);
            self.template.emit(Instruction::AddField(field.clone()));
            self.template.emit(Instruction::Dup);
            self.template.emit(Instruction::Push(Value::Null));
            self.template.emit(Instruction::SetField(field));
        }
        Ok(())
    }

    fn compile_path_load(&mut self, path: &PathExpr) -> Result<(), CompileError> {
        let first = &path.segments[0];
        let slot = self.lookup(&first.name.name, first.name.span)?;
        self.template.emit(Instruction::Load(slot));
        if let Some(index) = &first.index {
            self.compile_expr(index)?;
            self.template.emit(Instruction::GetIndex);
        }
        for seg in &path.segments[1..] {
            self.template.emit(Instruction::GetField(seg.name.name.clone()));
            if let Some(index) = &seg.index {
                self.compile_expr(index)?;
                self.template.emit(Instruction::GetIndex);
            }
        }
        Ok(())
    }

    /// Compile a call, returning whether it leaves a result on the stack
    /// (everything except `print` does).
    fn compile_call(&mut self, call: &CallExpr) -> Result<bool, CompileError> {
        for arg in &call.args {
            self.compile_expr(arg)?;
        }
        let pushes = match call.name.name.as_str() {
            "print" => {
                self.template.emit(Instruction::Write);
                false
            }
            "input" => {
                self.template.emit(Instruction::Read);
                true
            }
            "get" => {
                self.template.emit(Instruction::GetChar);
                true
            }
            "length" => {
                // the checker annotated the argument, so we know whether
                // this is the array or the string form
                let is_array = match call.args.first().and_then(|arg| arg.ty.as_ref()) {
                    Some(ty) => ty.is_array,
                    None => return Err(CompileError::MissingAnnotation { span: call.span }),
                };
                if is_array {
                    self.template.emit(Instruction::ArrLen);
                } else {
                    self.template.emit(Instruction::StrLen);
                }
                true
            }
            "to_int" => {
                self.template.emit(Instruction::ToInt);
                true
            }
            "to_double" => {
                self.template.emit(Instruction::ToDouble);
                true
            }
            "to_string" => {
                self.template.emit(Instruction::ToStr);
                true
            }
            "concat" => {
                self.template.emit(Instruction::Concat);
                true
            }
            name => {
                self.template.emit(Instruction::Call(name.to_string()));
                true
            }
        };
        Ok(pushes)
    }

    fn lookup(&self, name: &str, span: Span) -> Result<usize, CompileError> {
        self.locals.lookup(name).ok_or_else(|| CompileError::UnknownVariable {
            name: name.to_string(),
            span,
        })
    }
}

fn bin_op_instruction(op: BinOp) -> Instruction {
    match op {
        BinOp::Add => Instruction::Add,
        BinOp::Sub => Instruction::Sub,
        BinOp::Mul => Instruction::Mul,
        BinOp::Div => Instruction::Div,
        BinOp::And => Instruction::And,
        BinOp::Or => Instruction::Or,
        BinOp::Lt => Instruction::CmpLt,
        BinOp::Le => Instruction::CmpLe,
        BinOp::Gt => Instruction::CmpGt,
        BinOp::Ge => Instruction::CmpGe,
        BinOp::Eq => Instruction::CmpEq,
        BinOp::Ne => Instruction::CmpNe,
    }
}

/// Characters are one-character strings at runtime.
fn literal_value(lit: &Literal) -> Value {
    match lit {
        Literal::Int(i) => Value::Int(*i),
        Literal::Double(x) => Value::Float(*x),
        Literal::Bool(b) => Value::Bool(*b),
        Literal::Char(c) => Value::string(c.to_string()),
        Literal::Str(s) => Value::string(s.clone()),
        Literal::Null => Value::Null,
    }
}

/// Lexically scoped name-to-slot mapping. Slots are handed out by a
/// counter that rewinds when a scope pops, so sibling blocks reuse slots.
#[derive(Default)]
struct LocalScopes {
    scopes: Vec<Scope>,
    next_slot: usize,
}

struct Scope {
    names: HashMap<String, usize>,
    base: usize,
}

impl LocalScopes {
    fn push_scope(&mut self) {
        self.scopes.push(Scope {
            names: HashMap::new(),
            base: self.next_slot,
        });
    }

    fn pop_scope(&mut self) {
        if let Some(scope) = self.scopes.pop() {
            self.next_slot = scope.base;
        }
    }

    fn declare(&mut self, name: &str) -> usize {
        let slot = self.next_slot;
        self.next_slot += 1;
        if let Some(scope) = self.scopes.last_mut() {
            scope.names.insert(name.to_string(), slot);
        }
        slot
    }

    /// An anonymous slot, used to hold a switch scrutinee.
    fn declare_scratch(&mut self) -> usize {
        let slot = self.next_slot;
        self.next_slot += 1;
        slot
    }

    fn lookup(&self, name: &str) -> Option<usize> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.names.get(name).copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quill_syntax::{lex, parse};
    use Instruction::*;

    fn compile_source(source: &str) -> CompiledProgram {
        let program = parse(&lex(source).unwrap()).unwrap();
        compile(&program).unwrap()
    }

    fn main_code(source: &str) -> Vec<Instruction> {
        compile_source(source).templates["main"].instructions.clone()
    }

    #[test]
    fn print_literal() {
        let code = main_code("void main() { print(42) }");
        assert_eq!(code, vec![Push(Value::Int(42)), Write, Push(Value::Null), Ret]);
    }

    #[test]
    fn explicit_return_suppresses_epilogue() {
        let code = main_code("void main() { return null }");
        assert_eq!(code, vec![Push(Value::Null), Ret]);
    }

    #[test]
    fn params_store_in_declaration_order() {
        let compiled = compile_source("int f(int a, int b) { return b } void main() {}");
        let f = &compiled.templates["f"];
        assert_eq!(f.arg_count, 2);
        assert_eq!(&f.instructions[..2], &[Store(0), Store(1)]);
        assert_eq!(f.instructions[2], Load(1));
    }

    #[test]
    fn chain_pushes_left_operand_first() {
        let code = main_code("void main() { int x = 1 - 2 }");
        assert_eq!(
            &code[..4],
            &[Push(Value::Int(1)), Push(Value::Int(2)), Sub, Store(0)]
        );
    }

    #[test]
    fn negation_wraps_whole_chain() {
        let code = main_code("void main() { bool b = not (1 < 2) }");
        assert_eq!(
            &code[..5],
            &[Push(Value::Int(1)), Push(Value::Int(2)), CmpLt, Not, Store(0)]
        );
    }

    #[test]
    fn while_loop_shape() {
        let code = main_code("void main() { while (true) { print(0) } }");
        // 0 PUSH true, 1 JMPF 5, 2 PUSH 0, 3 WRITE, 4 JMP 0, 5 NOP
        assert_eq!(code[1], JumpIfFalse(5));
        assert_eq!(code[4], Jump(0));
        assert_eq!(code[5], Nop);
    }

    #[test]
    fn if_arms_share_one_exit() {
        let code = main_code(
            "void main() { if (true) { print(1) } elseif (false) { print(2) } else { print(3) } }",
        );
        let exit = code.len() - 3; // NOP before the epilogue
        assert_eq!(code[exit], Nop);
        let exit_jumps: Vec<_> = code
            .iter()
            .filter(|i| matches!(i, Jump(t) if *t == exit))
            .collect();
        assert_eq!(exit_jumps.len(), 2);
        assert!(!code.iter().any(|i| matches!(i, Jump(t) | JumpIfFalse(t) if *t == UNPATCHED)));
    }

    #[test]
    fn switch_compares_against_scratch_slot() {
        let code = main_code(
            "void main() { switch (2) { case 1: print(\"one\") case 2: print(\"two\") } }",
        );
        assert_eq!(&code[..2], &[Push(Value::Int(2)), Store(0)]);
        assert_eq!(
            &code[2..5],
            &[Push(Value::Int(1)), Load(0), CmpEq]
        );
        assert!(matches!(code[5], JumpIfFalse(_)));
    }

    #[test]
    fn new_struct_initializes_every_field_to_null() {
        let code = main_code("struct P { int x, int y } void main() { P p = new P }");
        assert_eq!(code[0], AllocStruct);
        assert_eq!(
            &code[1..6],
            &[
                Dup,
                AddField("x".to_string()),
                Dup,
                Push(Value::Null),
                SetField("x".to_string())
            ]
        );
        assert_eq!(code[6], Dup);
        assert_eq!(code[7], AddField("y".to_string()));
    }

    #[test]
    fn new_array_pushes_size_then_fill() {
        let code = main_code("void main() { array int xs = new int[3] }");
        assert_eq!(
            &code[..3],
            &[Push(Value::Int(3)), Push(Value::Null), AllocArray]
        );
    }

    #[test]
    fn index_assignment_orders_array_index_value() {
        let code = main_code("void main() { array int xs = new int[3] xs[0] = 7 }");
        assert_eq!(
            &code[4..8],
            &[Load(0), Push(Value::Int(0)), Push(Value::Int(7)), SetIndex]
        );
    }

    #[test]
    fn field_assignment_loads_then_sets() {
        let code = main_code("struct P { int x } void main() { P p = new P p.x = 5 }");
        let n = code.len();
        assert_eq!(
            &code[n - 5..n - 2],
            &[Load(0), Push(Value::Int(5)), SetField("x".to_string())]
        );
    }

    #[test]
    fn length_picks_array_or_string_form() {
        let src = "void main() { array int xs = new int[2] print(length(xs)) print(length(\"hi\")) }";
        let mut program = parse(&lex(src).unwrap()).unwrap();
        quill_types::check(&mut program).unwrap();
        let code = compile(&program).unwrap().templates["main"].instructions.clone();
        assert!(code.contains(&ArrLen));
        assert!(code.contains(&StrLen));
    }

    #[test]
    fn statement_call_discards_result() {
        let code = main_code("int f() { return 1 } void main() { f() }");
        assert_eq!(&code[..2], &[Call("f".to_string()), Pop]);
    }

    #[test]
    fn print_leaves_nothing_to_discard() {
        let code = main_code("void main() { print(1) }");
        assert!(!code.contains(&Pop));
    }

    #[test]
    fn sibling_blocks_reuse_slots() {
        let code = main_code(
            "void main() { if (true) { int a = 1 } else { int b = 2 } int c = 3 }",
        );
        let stores: Vec<_> = code
            .iter()
            .filter_map(|i| match i {
                Store(slot) => Some(*slot),
                _ => None,
            })
            .collect();
        assert_eq!(stores, vec![0, 0, 0]);
    }

    #[test]
    fn unknown_variable_is_an_internal_error() {
        let program = parse(&lex("void main() { x = 1 }").unwrap()).unwrap();
        let err = compile(&program).unwrap_err();
        assert!(matches!(err, CompileError::UnknownVariable { .. }));
    }
}
