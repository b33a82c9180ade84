//! Runtime values and runtime error types.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

/// Handle into the VM heap. Ids are handed out by a monotonically
/// increasing counter and are never reused.
pub type ObjectId = usize;

/// A value on the operand stack or in a local slot.
///
/// Strings are reference-counted so stack shuffling stays cheap. Structs
/// and arrays live on the heap and are passed around by id.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Int(i64),
    Float(f64),
    Bool(bool),
    String(Arc<String>),
    Object(ObjectId),
}

impl Value {
    /// Convenience constructor for string values.
    pub fn string(s: impl Into<String>) -> Self {
        Value::String(Arc::new(s.into()))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Int(_) => "int",
            Value::Float(_) => "double",
            Value::Bool(_) => "bool",
            Value::String(_) => "string",
            Value::Object(_) => "object",
        }
    }
}

/// Rendering used by WRITE and TOSTR: text unquoted, booleans as
/// `true`/`false`, objects as their raw id.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Bool(b) => write!(f, "{}", b),
            Value::String(s) => write!(f, "{}", s),
            Value::Object(id) => write!(f, "{}", id),
        }
    }
}

/// What went wrong during a single instruction, before frame context is
/// attached.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FaultKind {
    #[error("null reference")]
    NullReference,
    #[error("division by zero")]
    DivisionByZero,
    #[error("out-of-bounds array index {index} (length {length})")]
    ArrayIndexOutOfBounds { index: i64, length: usize },
    #[error("out-of-bounds string index {index} (length {length})")]
    StringIndexOutOfBounds { index: i64, length: usize },
    #[error("invalid array size {0}")]
    BadArraySize(i64),
    #[error("cannot convert string to int: `{0}`")]
    BadIntParse(String),
    #[error("cannot convert string to double: `{0}`")]
    BadFloatParse(String),
    #[error("call to undefined function `{0}`")]
    UndefinedFunction(String),
    #[error("invalid object id {0}")]
    InvalidObject(ObjectId),
    #[error("object {0} is not a struct")]
    NotAStruct(ObjectId),
    #[error("object {0} is not an array")]
    NotAnArray(ObjectId),
    #[error("struct has no field `{0}`")]
    UnknownField(String),
    #[error("unset local slot {0}")]
    BadLocal(usize),
    #[error("operand stack underflow")]
    StackUnderflow,
    #[error("no active frame")]
    NoFrame,
    #[error("read error: {0}")]
    Io(String),
    #[error("expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },
}

/// A runtime fault. Except for a missing entry function, every fault
/// names the function it occurred in, the index of the faulting
/// instruction, and the instruction's rendered text.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuntimeError {
    #[error("no `{0}` function defined")]
    MissingEntry(String),
    #[error("{kind} (in {function} at instruction {pc}: {instruction})")]
    Fault {
        kind: FaultKind,
        function: String,
        pc: usize,
        instruction: String,
    },
}

impl RuntimeError {
    pub fn kind(&self) -> Option<&FaultKind> {
        match self {
            RuntimeError::Fault { kind, .. } => Some(kind),
            RuntimeError::MissingEntry(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_rendering() {
        assert_eq!(Value::Int(42).to_string(), "42");
        assert_eq!(Value::Float(3.25).to_string(), "3.25");
        assert_eq!(Value::Bool(true).to_string(), "true");
        assert_eq!(Value::string("hi").to_string(), "hi");
        assert_eq!(Value::Null.to_string(), "null");
    }

    #[test]
    fn fault_message_carries_context() {
        let err = RuntimeError::Fault {
            kind: FaultKind::NullReference,
            function: "main".to_string(),
            pc: 3,
            instruction: "ADD".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("null reference"));
        assert!(msg.contains("main"));
        assert!(msg.contains("3"));
        assert!(msg.contains("ADD"));
    }
}
