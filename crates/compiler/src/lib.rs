//! Bytecode compiler: checked AST in, frame templates out.

pub mod compile;

pub use compile::{compile, CompileError, CompiledProgram};
