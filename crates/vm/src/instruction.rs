//! Bytecode instructions and the per-function instruction container.

use std::fmt;

use crate::value::Value;

/// Sentinel jump operand for jumps emitted before their target is known.
/// Every placeholder must be resolved with [`FrameTemplate::patch_jump`]
/// before the code runs.
pub const UNPATCHED: usize = usize::MAX;

/// One VM instruction. Operands are carried inline; jump operands are the
/// only ones mutated after emission (by `patch_jump`).
#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    // constants and stack shuffling
    Push(Value),
    Pop,
    Dup,
    Nop,
    // local slots
    Load(usize),
    Store(usize),
    // arithmetic and logic (binary ops take y then x with x on top,
    // computing y OP x)
    Add,
    Sub,
    Mul,
    Div,
    And,
    Or,
    Not,
    CmpLt,
    CmpLe,
    CmpGt,
    CmpGe,
    CmpEq,
    CmpNe,
    // control flow
    Jump(usize),
    JumpIfFalse(usize),
    Call(String),
    Ret,
    // builtins
    Write,
    Read,
    StrLen,
    ArrLen,
    GetChar,
    ToInt,
    ToDouble,
    ToStr,
    Concat,
    // heap
    AllocStruct,
    AllocArray,
    AddField(String),
    SetField(String),
    GetField(String),
    SetIndex,
    GetIndex,
}

/// Mnemonic rendering used by the disassembler and by fault messages.
impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Instruction::*;
        match self {
            Push(Value::String(s)) => write!(f, "PUSH {:?}", s),
            Push(v) => write!(f, "PUSH {}", v),
            Pop => write!(f, "POP"),
            Dup => write!(f, "DUP"),
            Nop => write!(f, "NOP"),
            Load(slot) => write!(f, "LOAD {}", slot),
            Store(slot) => write!(f, "STORE {}", slot),
            Add => write!(f, "ADD"),
            Sub => write!(f, "SUB"),
            Mul => write!(f, "MUL"),
            Div => write!(f, "DIV"),
            And => write!(f, "AND"),
            Or => write!(f, "OR"),
            Not => write!(f, "NOT"),
            CmpLt => write!(f, "CMPLT"),
            CmpLe => write!(f, "CMPLE"),
            CmpGt => write!(f, "CMPGT"),
            CmpGe => write!(f, "CMPGE"),
            CmpEq => write!(f, "CMPEQ"),
            CmpNe => write!(f, "CMPNE"),
            Jump(t) if *t == UNPATCHED => write!(f, "JMP <unpatched>"),
            Jump(t) => write!(f, "JMP {}", t),
            JumpIfFalse(t) if *t == UNPATCHED => write!(f, "JMPF <unpatched>"),
            JumpIfFalse(t) => write!(f, "JMPF {}", t),
            Call(name) => write!(f, "CALL {}", name),
            Ret => write!(f, "RET"),
            Write => write!(f, "WRITE"),
            Read => write!(f, "READ"),
            StrLen => write!(f, "SLEN"),
            ArrLen => write!(f, "ALEN"),
            GetChar => write!(f, "GETC"),
            ToInt => write!(f, "TOINT"),
            ToDouble => write!(f, "TODBL"),
            ToStr => write!(f, "TOSTR"),
            Concat => write!(f, "CONCAT"),
            AllocStruct => write!(f, "ALLOCS"),
            AllocArray => write!(f, "ALLOCA"),
            AddField(name) => write!(f, "ADDF {}", name),
            SetField(name) => write!(f, "SETF {}", name),
            GetField(name) => write!(f, "GETF {}", name),
            SetIndex => write!(f, "SETI"),
            GetIndex => write!(f, "GETI"),
        }
    }
}

/// The compiled form of one function: its name, how many arguments a CALL
/// transfers into it, and its instruction sequence.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FrameTemplate {
    pub name: String,
    pub arg_count: usize,
    pub instructions: Vec<Instruction>,
}

impl FrameTemplate {
    pub fn new(name: impl Into<String>, arg_count: usize) -> Self {
        Self {
            name: name.into(),
            arg_count,
            instructions: Vec::new(),
        }
    }

    /// Append an instruction, returning its index for later patching.
    pub fn emit(&mut self, instr: Instruction) -> usize {
        self.instructions.push(instr);
        self.instructions.len() - 1
    }

    /// Resolve a placeholder jump at `at` to point at `target`.
    ///
    /// Panics if `at` does not hold a jump: that is a code-generation bug,
    /// never a property of the program being compiled. The target must be
    /// in range (the landing instruction is emitted before patching).
    pub fn patch_jump(&mut self, at: usize, target: usize) {
        debug_assert!(
            target <= self.instructions.len(),
            "jump target {} out of range",
            target
        );
        match &mut self.instructions[at] {
            Instruction::Jump(t) | Instruction::JumpIfFalse(t) => *t = target,
            other => panic!("cannot patch non-jump instruction {}", other),
        }
    }

    /// True when the function already ends in RET and needs no implicit
    /// epilogue.
    pub fn ends_with_return(&self) -> bool {
        matches!(self.instructions.last(), Some(Instruction::Ret))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emit_returns_index() {
        let mut t = FrameTemplate::new("f", 0);
        assert_eq!(t.emit(Instruction::Nop), 0);
        assert_eq!(t.emit(Instruction::Ret), 1);
    }

    #[test]
    fn patch_jump_rewrites_target() {
        let mut t = FrameTemplate::new("f", 0);
        let j = t.emit(Instruction::JumpIfFalse(UNPATCHED));
        t.emit(Instruction::Nop);
        let exit = t.emit(Instruction::Nop);
        t.patch_jump(j, exit);
        assert_eq!(t.instructions[j], Instruction::JumpIfFalse(exit));
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn patch_jump_rejects_out_of_range_target() {
        let mut t = FrameTemplate::new("f", 0);
        let j = t.emit(Instruction::Jump(UNPATCHED));
        t.patch_jump(j, 5);
    }

    #[test]
    #[should_panic(expected = "non-jump")]
    fn patch_jump_rejects_non_jump() {
        let mut t = FrameTemplate::new("f", 0);
        let at = t.emit(Instruction::Nop);
        t.patch_jump(at, 0);
    }

    #[test]
    fn mnemonics() {
        assert_eq!(Instruction::Push(Value::Int(42)).to_string(), "PUSH 42");
        assert_eq!(Instruction::Push(Value::string("hi")).to_string(), "PUSH \"hi\"");
        assert_eq!(Instruction::JumpIfFalse(7).to_string(), "JMPF 7");
        assert_eq!(Instruction::Call("f".to_string()).to_string(), "CALL f");
        assert_eq!(Instruction::GetField("x".to_string()).to_string(), "GETF x");
    }
}
