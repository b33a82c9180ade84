//! Scenario tests over hand-assembled frames: control flow shapes the
//! compiler emits, run end to end through the interpreter.

use std::collections::HashMap;

use quill_vm::{FaultKind, FrameTemplate, Instruction::*, RuntimeError, Value, VM};

fn run_main(instructions: Vec<quill_vm::Instruction>) -> VM {
    let mut t = FrameTemplate::new("main", 0);
    t.instructions = instructions;
    let mut templates = HashMap::new();
    templates.insert("main".to_string(), t);
    let mut vm = VM::new(templates).capture_output();
    vm.run().expect("program should run to completion");
    vm
}

#[test]
fn while_loop_counts_up() {
    // i = 0; while (i < 3) { print(i); i = i + 1 }
    let vm = run_main(vec![
        Push(Value::Int(0)),
        Store(0),
        Load(0), // 2: condition start
        Push(Value::Int(3)),
        CmpLt,
        JumpIfFalse(13),
        Load(0),
        Write,
        Load(0),
        Push(Value::Int(1)),
        Add,
        Store(0),
        Jump(2),
        Nop, // 13: loop exit
        Push(Value::Null),
        Ret,
    ]);
    assert_eq!(vm.output(), "012");
}

#[test]
fn if_else_chain_takes_exactly_one_branch() {
    // x = 2; if (x == 1) .. elseif (x == 2) .. else ..
    let vm = run_main(vec![
        Push(Value::Int(2)),
        Store(0),
        Load(0),
        Push(Value::Int(1)),
        CmpEq,
        JumpIfFalse(9), // to next test
        Push(Value::string("one")),
        Write,
        Jump(18), // to exit
        Nop,      // 9
        Load(0),
        Push(Value::Int(2)),
        CmpEq,
        JumpIfFalse(17), // to else
        Push(Value::string("two")),
        Write,
        Jump(18),
        Nop, // 17: else is empty
        Nop, // 18: exit
    ]);
    assert_eq!(vm.output(), "two");
}

#[test]
fn recursion_depth_and_unwind() {
    // f(n) { if (n > 0) { f(n - 1) } print(n) }
    let mut f = FrameTemplate::new("f", 1);
    f.instructions = vec![
        Store(0),
        Load(0),
        Push(Value::Int(0)),
        CmpGt,
        JumpIfFalse(10),
        Load(0),
        Push(Value::Int(1)),
        Sub,
        Call("f".to_string()),
        Pop,
        Nop, // 10
        Load(0),
        Write,
        Push(Value::Null),
        Ret,
    ];
    let mut main = FrameTemplate::new("main", 0);
    main.instructions = vec![
        Push(Value::Int(3)),
        Call("f".to_string()),
        Pop,
        Push(Value::Null),
        Ret,
    ];
    let mut templates = HashMap::new();
    templates.insert("f".to_string(), f);
    templates.insert("main".to_string(), main);
    let mut vm = VM::new(templates).capture_output();
    vm.run().unwrap();
    assert_eq!(vm.output(), "0123");
}

#[test]
fn fault_in_callee_names_the_callee() {
    let mut f = FrameTemplate::new("f", 0);
    f.instructions = vec![Push(Value::Null), Push(Value::Int(1)), Div];
    let mut main = FrameTemplate::new("main", 0);
    main.instructions = vec![Call("f".to_string())];
    let mut templates = HashMap::new();
    templates.insert("f".to_string(), f);
    templates.insert("main".to_string(), main);
    let mut vm = VM::new(templates);
    let err = vm.run().unwrap_err();
    match err {
        RuntimeError::Fault { kind, function, pc, instruction } => {
            assert_eq!(kind, FaultKind::NullReference);
            assert_eq!(function, "f");
            assert_eq!(pc, 2);
            assert_eq!(instruction, "DIV");
        }
        other => panic!("unexpected error {:?}", other),
    }
}

#[test]
fn struct_construction_shape() {
    // The sequence the compiler emits for `new Point` with fields x, y,
    // then p.x = 8; print(p.x)
    let vm = run_main(vec![
        AllocStruct,
        Dup,
        AddField("x".to_string()),
        Dup,
        Push(Value::Null),
        SetField("x".to_string()),
        Dup,
        AddField("y".to_string()),
        Dup,
        Push(Value::Null),
        SetField("y".to_string()),
        Store(0),
        Load(0),
        Push(Value::Int(8)),
        SetField("x".to_string()),
        Load(0),
        GetField("x".to_string()),
        Write,
    ]);
    assert_eq!(vm.output(), "8");
}

#[test]
fn nested_heap_objects() {
    // outer struct holding an array; write through the path
    let vm = run_main(vec![
        AllocStruct,
        Dup,
        AddField("items".to_string()),
        Store(0),
        Load(0),
        Push(Value::Int(2)),
        Push(Value::Null),
        AllocArray,
        SetField("items".to_string()),
        // s.items[0] = 9
        Load(0),
        GetField("items".to_string()),
        Push(Value::Int(0)),
        Push(Value::Int(9)),
        SetIndex,
        // print(s.items[0])
        Load(0),
        GetField("items".to_string()),
        Push(Value::Int(0)),
        GetIndex,
        Write,
    ]);
    assert_eq!(vm.output(), "9");
}
