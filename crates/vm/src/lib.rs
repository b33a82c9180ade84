//! Stack-based virtual machine for Quill bytecode.
//!
//! A compiled program is a set of [`FrameTemplate`]s, one per function.
//! The [`VM`] starts in `main`, executing each frame's instructions over
//! an operand stack and indexable local slots. Structs and arrays live on
//! a shared heap and are passed by id.

pub mod frame;
pub mod heap;
pub mod inspect;
pub mod instruction;
pub mod value;
pub mod vm;

pub use frame::CallFrame;
pub use inspect::{disassemble, disassemble_program};
pub use heap::{Heap, HeapObject};
pub use instruction::{FrameTemplate, Instruction, UNPATCHED};
pub use value::{FaultKind, ObjectId, RuntimeError, Value};
pub use vm::{ENTRY_FUNCTION, VM};
