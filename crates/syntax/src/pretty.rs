//! Pretty printer: renders an AST back to canonical source text.

use crate::ast::*;

/// Render a whole program, two-space indentation, one statement per line.
pub fn print_program(program: &Program) -> String {
    let mut p = Printer { out: String::new(), indent: 0 };
    for s in &program.structs {
        p.struct_def(s);
        p.out.push('\n');
    }
    for (i, f) in program.functions.iter().enumerate() {
        if i > 0 {
            p.out.push('\n');
        }
        p.fun_def(f);
    }
    p.out
}

struct Printer {
    out: String,
    indent: usize,
}

impl Printer {
    fn line(&mut self, text: &str) {
        for _ in 0..self.indent {
            self.out.push_str("  ");
        }
        self.out.push_str(text);
        self.out.push('\n');
    }

    fn struct_def(&mut self, s: &StructDef) {
        self.line(&format!("struct {} {{", s.name.name));
        self.indent += 1;
        for (i, field) in s.fields.iter().enumerate() {
            let comma = if i + 1 < s.fields.len() { "," } else { "" };
            self.line(&format!("{} {}{}", field.ty, field.name.name, comma));
        }
        self.indent -= 1;
        self.line("}");
    }

    fn fun_def(&mut self, f: &FunDef) {
        let params: Vec<String> = f
            .params
            .iter()
            .map(|p| format!("{} {}", p.ty, p.name.name))
            .collect();
        self.line(&format!(
            "{} {}({}) {{",
            f.return_type,
            f.name.name,
            params.join(", ")
        ));
        self.indent += 1;
        for stmt in &f.body {
            self.stmt(stmt);
        }
        self.indent -= 1;
        self.line("}");
    }

    fn stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::VarDecl(d) => self.line(&var_decl(d)),
            Stmt::Assign(a) => self.line(&assign(a)),
            Stmt::Return(r) => self.line(&format!("return {}", expr(&r.value))),
            Stmt::Call(c) => self.line(&call(c)),
            Stmt::While(w) => {
                self.line(&format!("while ({}) {{", expr(&w.condition)));
                self.body(&w.body);
                self.line("}");
            }
            Stmt::For(f) => {
                self.line(&format!(
                    "for ({}; {}; {}) {{",
                    var_decl(&f.init),
                    expr(&f.condition),
                    assign(&f.update)
                ));
                self.body(&f.body);
                self.line("}");
            }
            Stmt::If(i) => {
                self.line(&format!("if ({}) {{", expr(&i.if_part.condition)));
                self.body(&i.if_part.body);
                for arm in &i.else_ifs {
                    self.line(&format!("}} elseif ({}) {{", expr(&arm.condition)));
                    self.body(&arm.body);
                }
                if !i.else_body.is_empty() {
                    self.line("} else {");
                    self.body(&i.else_body);
                }
                self.line("}");
            }
            Stmt::Switch(s) => {
                self.line(&format!("switch ({}) {{", expr(&s.scrutinee)));
                self.indent += 1;
                for arm in &s.cases {
                    self.line(&format!("case {}:", literal(&arm.value.value)));
                    self.body(&arm.body);
                }
                if !s.default_body.is_empty() {
                    self.line("default:");
                    self.body(&s.default_body);
                }
                self.indent -= 1;
                self.line("}");
            }
        }
    }

    fn body(&mut self, stmts: &[Stmt]) {
        self.indent += 1;
        for s in stmts {
            self.stmt(s);
        }
        self.indent -= 1;
    }
}

fn var_decl(d: &VarDeclStmt) -> String {
    format!("{} {} = {}", d.var.ty, d.var.name.name, expr(&d.value))
}

fn assign(a: &AssignStmt) -> String {
    format!("{} = {}", path(&a.target), expr(&a.value))
}

fn expr(e: &Expr) -> String {
    let first = match &e.first {
        Term::Simple(rv) => rvalue(rv),
        Term::Grouped(inner) => format!("({})", expr(inner)),
    };
    let mut text = match (&e.op, &e.rest) {
        (Some(op), Some(rest)) => format!("{} {} {}", first, op, expr(rest)),
        _ => first,
    };
    if e.negated {
        text = format!("not {}", text);
    }
    text
}

fn rvalue(rv: &RValue) -> String {
    match rv {
        RValue::Literal(lit) => literal(&lit.value),
        RValue::Path(p) => path(p),
        RValue::Call(c) => call(c),
        RValue::New(n) => match &n.array_size {
            Some(size) => format!("new {}[{}]", n.type_name.name, expr(size)),
            None => format!("new {}", n.type_name.name),
        },
    }
}

fn path(p: &PathExpr) -> String {
    let mut text = String::new();
    for (i, seg) in p.segments.iter().enumerate() {
        if i > 0 {
            text.push('.');
        }
        text.push_str(&seg.name.name);
        if let Some(index) = &seg.index {
            text.push('[');
            text.push_str(&expr(index));
            text.push(']');
        }
    }
    text
}

fn call(c: &CallExpr) -> String {
    let args: Vec<String> = c.args.iter().map(expr).collect();
    format!("{}({})", c.name.name, args.join(", "))
}

fn literal(lit: &Literal) -> String {
    match lit {
        Literal::Int(i) => i.to_string(),
        Literal::Double(x) => {
            // keep a decimal point so the output re-lexes as a double
            if x.fract() == 0.0 && x.is_finite() {
                format!("{:.1}", x)
            } else {
                x.to_string()
            }
        }
        Literal::Bool(b) => b.to_string(),
        Literal::Str(s) => format!("\"{}\"", s),
        Literal::Char(c) => match c {
            '\n' => "'\\n'".to_string(),
            '\t' => "'\\t'".to_string(),
            '\r' => "'\\r'".to_string(),
            '\\' => "'\\\\'".to_string(),
            '\'' => "'\\''".to_string(),
            c => format!("'{}'", c),
        },
        Literal::Null => "null".to_string(),
    }
}
