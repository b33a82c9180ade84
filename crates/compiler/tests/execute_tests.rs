//! Whole-pipeline tests: source text through the checker and compiler,
//! executed on the VM with captured output.

use std::io::Cursor;

use quill_compiler::compile;
use quill_syntax::{lex, parse};
use quill_types::check;
use quill_vm::{FaultKind, RuntimeError, VM};

fn build(source: &str) -> VM {
    let mut program = parse(&lex(source).unwrap()).unwrap();
    check(&mut program).unwrap();
    let templates = compile(&program).unwrap().into_templates();
    VM::new(templates).capture_output()
}

fn run(source: &str) -> String {
    let mut vm = build(source);
    vm.run().unwrap();
    vm.output()
}

fn run_err(source: &str) -> RuntimeError {
    build(source).run().unwrap_err()
}

#[test]
fn while_loop_counts() {
    let out = run(
        "void main() {
           int i = 0
           while (i < 3) {
             print(i)
             i = i + 1
           }
         }",
    );
    assert_eq!(out, "012");
}

#[test]
fn for_loop_counts_down() {
    let out = run(
        "void main() {
           for (int i = 3; i > 0; i = i - 1) {
             print(i)
           }
         }",
    );
    assert_eq!(out, "321");
}

#[test]
fn recursive_factorial() {
    let out = run(
        "int fact(int n) {
           if (n <= 1) { return 1 }
           return n * fact(n - 1)
         }
         void main() { print(fact(5)) }",
    );
    assert_eq!(out, "120");
}

#[test]
fn elseif_chain_picks_one_arm() {
    let out = run(
        "void pick(int n) {
           if (n == 1) { print(\"one\") }
           elseif (n == 2) { print(\"two\") }
           else { print(\"many\") }
         }
         void main() {
           pick(1)
           pick(2)
           pick(9)
         }",
    );
    assert_eq!(out, "onetwomany");
}

#[test]
fn struct_fields_roundtrip() {
    let out = run(
        "struct Point { int x, int y }
         void main() {
           Point p = new Point
           p.x = 3
           p.y = 4
           print(p.x * p.x + p.y * p.y)
         }",
    );
    assert_eq!(out, "25");
}

#[test]
fn nested_struct_paths() {
    let out = run(
        "struct Inner { int value }
         struct Outer { Inner inner }
         void main() {
           Outer o = new Outer
           o.inner = new Inner
           o.inner.value = 11
           print(o.inner.value)
         }",
    );
    assert_eq!(out, "11");
}

#[test]
fn array_fill_and_sum() {
    let out = run(
        "void main() {
           array int xs = new int[4]
           for (int i = 0; i < 4; i = i + 1) {
             xs[i] = i * i
           }
           int sum = 0
           for (int i = 0; i < 4; i = i + 1) {
             sum = sum + xs[i]
           }
           print(sum)
         }",
    );
    assert_eq!(out, "14");
}

#[test]
fn array_of_structs() {
    let out = run(
        "struct Box { int n }
         void main() {
           array Box boxes = new Box[2]
           boxes[0] = new Box
           boxes[0].n = 7
           print(boxes[0].n)
         }",
    );
    assert_eq!(out, "7");
}

#[test]
fn switch_dispatches_and_defaults() {
    let out = run(
        "void label(int n) {
           switch (n) {
             case 1: print(\"a\")
             case 2: print(\"b\") break
             default: print(\"z\")
           }
         }
         void main() {
           label(2)
           label(1)
           label(42)
         }",
    );
    assert_eq!(out, "baz");
}

#[test]
fn switch_on_strings() {
    let out = run(
        "void main() {
           string cmd = \"stop\"
           switch (cmd) {
             case \"go\": print(1)
             case \"stop\": print(0)
           }
         }",
    );
    assert_eq!(out, "0");
}

#[test]
fn string_builtins_compose() {
    let out = run(
        "void main() {
           string s = concat(\"ab\", \"cd\")
           print(s)
           print(length(s))
           print(get(1, s))
         }",
    );
    assert_eq!(out, "abcd4b");
}

#[test]
fn conversions_roundtrip() {
    let out = run(
        "void main() {
           print(to_int(\"42\"))
           print(to_int(2.9))
           print(to_string(7))
           print(to_double(1))
         }",
    );
    assert_eq!(out, "42271");
}

#[test]
fn read_feeds_from_injected_input() {
    let src = "void main() {
           string name = input()
           print(concat(\"hi \", name))
         }";
    let mut program = parse(&lex(src).unwrap()).unwrap();
    check(&mut program).unwrap();
    let templates = compile(&program).unwrap().into_templates();
    let mut vm = VM::new(templates)
        .with_input(Cursor::new("ada\n"))
        .capture_output();
    vm.run().unwrap();
    assert_eq!(vm.output(), "hi ada");
}

#[test]
fn null_arithmetic_fault_names_the_function() {
    let err = run_err(
        "void main() {
           int x = null
           int y = x + 1
         }",
    );
    match err {
        RuntimeError::Fault { kind, function, .. } => {
            assert_eq!(kind, FaultKind::NullReference);
            assert_eq!(function, "main");
        }
        other => panic!("unexpected error {:?}", other),
    }
}

#[test]
fn fault_in_callee_names_the_callee() {
    let err = run_err(
        "int half(int n) { return n / 0 }
         void main() { print(half(4)) }",
    );
    match err {
        RuntimeError::Fault { kind, function, instruction, .. } => {
            assert_eq!(kind, FaultKind::DivisionByZero);
            assert_eq!(function, "half");
            assert_eq!(instruction, "DIV");
        }
        other => panic!("unexpected error {:?}", other),
    }
}

#[test]
fn out_of_bounds_assignment_faults() {
    let err = run_err(
        "void main() {
           array int xs = new int[3]
           xs[5] = 1
         }",
    );
    assert_eq!(
        err.kind(),
        Some(&FaultKind::ArrayIndexOutOfBounds { index: 5, length: 3 })
    );
}

#[test]
fn negative_index_assignment_faults() {
    let err = run_err(
        "void main() {
           array int xs = new int[3]
           xs[0 - 1] = 1
         }",
    );
    assert_eq!(
        err.kind(),
        Some(&FaultKind::ArrayIndexOutOfBounds { index: -1, length: 3 })
    );
}

#[test]
fn negative_array_size_faults() {
    let err = run_err("void main() { array int xs = new int[0 - 1] }");
    assert_eq!(err.kind(), Some(&FaultKind::BadArraySize(-1)));
}

#[test]
fn values_pass_through_functions_by_reference_for_objects() {
    let out = run(
        "struct Counter { int n }
         void bump(Counter c) { c.n = c.n + 1 }
         void main() {
           Counter c = new Counter
           c.n = 0
           bump(c)
           bump(c)
           print(c.n)
         }",
    );
    assert_eq!(out, "2");
}

#[test]
fn disassembly_lists_every_function() {
    let src = "int f() { return 1 } void main() { print(f()) }";
    let mut program = parse(&lex(src).unwrap()).unwrap();
    check(&mut program).unwrap();
    let compiled = compile(&program).unwrap();
    let listing = compiled.disassemble();
    assert!(listing.contains("Frame 'f' (args: 0)"));
    assert!(listing.contains("Frame 'main' (args: 0)"));
    assert!(listing.contains("CALL f"));
    assert!(!listing.contains("<unpatched>"));
}
