//! Call frames: one per active function invocation.

use std::rc::Rc;

use crate::instruction::FrameTemplate;
use crate::value::{FaultKind, Value};

/// An active invocation of a function. Holds the instruction cursor, the
/// operand stack, and the indexable local slots.
#[derive(Debug)]
pub struct CallFrame {
    pub template: Rc<FrameTemplate>,
    pub pc: usize,
    pub stack: Vec<Value>,
    pub locals: Vec<Value>,
}

impl CallFrame {
    pub fn new(template: Rc<FrameTemplate>) -> Self {
        Self {
            template,
            pc: 0,
            stack: Vec::new(),
            locals: Vec::new(),
        }
    }

    pub fn push(&mut self, value: Value) {
        self.stack.push(value);
    }

    pub fn pop(&mut self) -> Result<Value, FaultKind> {
        self.stack.pop().ok_or(FaultKind::StackUnderflow)
    }

    /// Read a local slot; the slot must have been written by a STORE.
    pub fn load(&self, slot: usize) -> Result<Value, FaultKind> {
        self.locals.get(slot).cloned().ok_or(FaultKind::BadLocal(slot))
    }

    /// Write a local slot. The first store to a fresh slot extends the
    /// locals vector; later stores overwrite in place.
    pub fn store(&mut self, slot: usize, value: Value) {
        if slot < self.locals.len() {
            self.locals[slot] = value;
        } else {
            self.locals.push(value);
        }
    }
}
