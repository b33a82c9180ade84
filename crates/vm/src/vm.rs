//! The interpreter: fetch, decode, execute.

use std::collections::HashMap;
use std::io::{self, BufRead, Write as IoWrite};
use std::rc::Rc;

use crate::frame::CallFrame;
use crate::heap::Heap;
use crate::instruction::{FrameTemplate, Instruction};
use crate::value::{FaultKind, ObjectId, RuntimeError, Value};

/// Name of the function execution starts in.
pub const ENTRY_FUNCTION: &str = "main";

/// A virtual machine holding the compiled frame templates, the heap, and
/// the I/O channels for READ and WRITE.
///
/// Output capture and input injection exist for tests and embedding; by
/// default WRITE goes to stdout and READ pulls lines from stdin.
pub struct VM {
    templates: HashMap<String, Rc<FrameTemplate>>,
    heap: Heap,
    input: Box<dyn BufRead>,
    captured: Option<Vec<String>>,
}

impl VM {
    pub fn new(templates: HashMap<String, FrameTemplate>) -> Self {
        Self {
            templates: templates
                .into_iter()
                .map(|(name, t)| (name, Rc::new(t)))
                .collect(),
            heap: Heap::new(),
            input: Box::new(io::BufReader::new(io::stdin())),
            captured: None,
        }
    }

    /// Replace the READ source.
    pub fn with_input(mut self, input: impl BufRead + 'static) -> Self {
        self.input = Box::new(input);
        self
    }

    /// Buffer WRITE output instead of printing it; retrieve it with
    /// [`VM::output`].
    pub fn capture_output(mut self) -> Self {
        self.captured = Some(Vec::new());
        self
    }

    /// Everything WRITE produced so far, when capturing.
    pub fn output(&self) -> String {
        match &self.captured {
            Some(chunks) => chunks.concat(),
            None => String::new(),
        }
    }

    /// Execute from the entry function until the call stack empties or
    /// the current frame runs off the end of its instructions.
    pub fn run(&mut self) -> Result<(), RuntimeError> {
        let entry = self
            .templates
            .get(ENTRY_FUNCTION)
            .cloned()
            .ok_or_else(|| RuntimeError::MissingEntry(ENTRY_FUNCTION.to_string()))?;
        let mut frames = vec![CallFrame::new(entry)];
        loop {
            let Some(frame) = frames.last_mut() else { break };
            if frame.pc >= frame.template.instructions.len() {
                break;
            }
            let template = Rc::clone(&frame.template);
            let pc = frame.pc;
            frame.pc += 1;
            let instr = template.instructions[pc].clone();
            self.step(&mut frames, instr).map_err(|kind| RuntimeError::Fault {
                kind,
                function: template.name.clone(),
                pc,
                instruction: template.instructions[pc].to_string(),
            })?;
        }
        Ok(())
    }

    fn step(&mut self, frames: &mut Vec<CallFrame>, instr: Instruction) -> Result<(), FaultKind> {
        use Instruction::*;
        match instr {
            Push(v) => top(frames)?.push(v),
            Pop => {
                top(frames)?.pop()?;
            }
            Dup => {
                let frame = top(frames)?;
                let v = frame.pop()?;
                frame.push(v.clone());
                frame.push(v);
            }
            Nop => {}

            Load(slot) => {
                let frame = top(frames)?;
                let v = frame.load(slot)?;
                frame.push(v);
            }
            Store(slot) => {
                let frame = top(frames)?;
                let v = frame.pop()?;
                frame.store(slot, v);
            }

            Add | Sub | Mul | Div => {
                let frame = top(frames)?;
                let x = nonnull(frame.pop()?)?;
                let y = nonnull(frame.pop()?)?;
                frame.push(arith(&instr, y, x)?);
            }
            And | Or => {
                let frame = top(frames)?;
                let x = as_bool(&nonnull(frame.pop()?)?)?;
                let y = as_bool(&nonnull(frame.pop()?)?)?;
                let r = if matches!(instr, And) { y && x } else { y || x };
                frame.push(Value::Bool(r));
            }
            Not => {
                let frame = top(frames)?;
                let b = as_bool(&nonnull(frame.pop()?)?)?;
                frame.push(Value::Bool(!b));
            }
            CmpLt | CmpLe | CmpGt | CmpGe => {
                let frame = top(frames)?;
                let x = frame.pop()?;
                let y = frame.pop()?;
                frame.push(Value::Bool(relational(&instr, &y, &x)?));
            }
            CmpEq => {
                let frame = top(frames)?;
                let x = frame.pop()?;
                let y = frame.pop()?;
                frame.push(Value::Bool(y == x));
            }
            CmpNe => {
                let frame = top(frames)?;
                let x = frame.pop()?;
                let y = frame.pop()?;
                frame.push(Value::Bool(y != x));
            }

            Jump(target) => top(frames)?.pc = target,
            JumpIfFalse(target) => {
                let frame = top(frames)?;
                let v = nonnull(frame.pop()?)?;
                if !as_bool(&v)? {
                    frame.pc = target;
                }
            }
            Call(name) => {
                let callee = self
                    .templates
                    .get(&name)
                    .cloned()
                    .ok_or_else(|| FaultKind::UndefinedFunction(name.clone()))?;
                let mut next = CallFrame::new(callee);
                let frame = top(frames)?;
                // Arguments land on the callee stack top-first; the
                // callee prologue's STOREs put them back in declaration
                // order.
                for _ in 0..next.template.arg_count {
                    let v = frame.pop()?;
                    next.push(v);
                }
                frames.push(next);
            }
            Ret => {
                let value = top(frames)?.pop()?;
                frames.pop();
                if let Some(caller) = frames.last_mut() {
                    caller.push(value);
                }
            }

            Write => {
                let v = top(frames)?.pop()?;
                self.write_text(v.to_string());
            }
            Read => {
                let mut line = String::new();
                self.input
                    .read_line(&mut line)
                    .map_err(|e| FaultKind::Io(e.to_string()))?;
                while line.ends_with('\n') || line.ends_with('\r') {
                    line.pop();
                }
                top(frames)?.push(Value::string(line));
            }
            StrLen => {
                let frame = top(frames)?;
                let v = nonnull(frame.pop()?)?;
                let n = as_string(&v)?.chars().count() as i64;
                frame.push(Value::Int(n));
            }
            ArrLen => {
                let frame = top(frames)?;
                let v = nonnull(frame.pop()?)?;
                let n = self.heap.array(as_object(&v)?)?.len() as i64;
                frame.push(Value::Int(n));
            }
            GetChar => {
                let frame = top(frames)?;
                let s_val = nonnull(frame.pop()?)?;
                let i_val = nonnull(frame.pop()?)?;
                let s = as_string(&s_val)?;
                let i = as_int(&i_val)?;
                let length = s.chars().count();
                let c = if i >= 0 { s.chars().nth(i as usize) } else { None };
                match c {
                    Some(c) => frame.push(Value::string(c.to_string())),
                    None => {
                        return Err(FaultKind::StringIndexOutOfBounds { index: i, length })
                    }
                }
            }
            ToInt => {
                let frame = top(frames)?;
                let v = nonnull(frame.pop()?)?;
                let r = match v {
                    Value::Int(i) => i,
                    Value::Float(x) => x as i64,
                    Value::String(s) => s
                        .trim()
                        .parse()
                        .map_err(|_| FaultKind::BadIntParse(s.to_string()))?,
                    other => return Err(mismatch("int, double, or string", &other)),
                };
                frame.push(Value::Int(r));
            }
            ToDouble => {
                let frame = top(frames)?;
                let v = nonnull(frame.pop()?)?;
                let r = match v {
                    Value::Int(i) => i as f64,
                    Value::Float(x) => x,
                    Value::String(s) => s
                        .trim()
                        .parse()
                        .map_err(|_| FaultKind::BadFloatParse(s.to_string()))?,
                    other => return Err(mismatch("int, double, or string", &other)),
                };
                frame.push(Value::Float(r));
            }
            ToStr => {
                let frame = top(frames)?;
                let v = nonnull(frame.pop()?)?;
                frame.push(Value::string(v.to_string()));
            }
            Concat => {
                let frame = top(frames)?;
                let x = nonnull(frame.pop()?)?;
                let y = nonnull(frame.pop()?)?;
                let joined = format!("{}{}", as_string(&y)?, as_string(&x)?);
                frame.push(Value::string(joined));
            }

            AllocStruct => {
                let id = self.heap.alloc_struct();
                top(frames)?.push(Value::Object(id));
            }
            AllocArray => {
                let frame = top(frames)?;
                let fill = frame.pop()?;
                let size = nonnull(frame.pop()?)?;
                let n = as_int(&size)?;
                if n < 0 {
                    return Err(FaultKind::BadArraySize(n));
                }
                let id = self.heap.alloc_array(n as usize, fill);
                frame.push(Value::Object(id));
            }
            AddField(name) => {
                let v = nonnull(top(frames)?.pop()?)?;
                let id = as_object(&v)?;
                self.heap.struct_fields_mut(id)?.insert(name, Value::Null);
            }
            SetField(name) => {
                let frame = top(frames)?;
                let value = frame.pop()?;
                let obj = nonnull(frame.pop()?)?;
                let id = as_object(&obj)?;
                self.heap.struct_fields_mut(id)?.insert(name, value);
            }
            GetField(name) => {
                let frame = top(frames)?;
                let obj = nonnull(frame.pop()?)?;
                let id = as_object(&obj)?;
                let v = self
                    .heap
                    .struct_fields(id)?
                    .get(&name)
                    .cloned()
                    .ok_or(FaultKind::UnknownField(name))?;
                frame.push(v);
            }
            SetIndex => {
                let frame = top(frames)?;
                let value = nonnull(frame.pop()?)?;
                let idx = nonnull(frame.pop()?)?;
                let obj = nonnull(frame.pop()?)?;
                let i = as_int(&idx)?;
                let id = as_object(&obj)?;
                let elems = self.heap.array_mut(id)?;
                if i < 0 || i as usize >= elems.len() {
                    return Err(FaultKind::ArrayIndexOutOfBounds {
                        index: i,
                        length: elems.len(),
                    });
                }
                elems[i as usize] = value;
            }
            GetIndex => {
                let frame = top(frames)?;
                let idx = nonnull(frame.pop()?)?;
                let obj = nonnull(frame.pop()?)?;
                let i = as_int(&idx)?;
                let id = as_object(&obj)?;
                let elems = self.heap.array(id)?;
                if i < 0 || i as usize >= elems.len() {
                    return Err(FaultKind::ArrayIndexOutOfBounds {
                        index: i,
                        length: elems.len(),
                    });
                }
                frame.push(elems[i as usize].clone());
            }
        }
        Ok(())
    }

    fn write_text(&mut self, text: String) {
        match &mut self.captured {
            Some(chunks) => chunks.push(text),
            None => {
                print!("{}", text);
                let _ = io::stdout().flush();
            }
        }
    }
}

fn top<'a>(frames: &'a mut Vec<CallFrame>) -> Result<&'a mut CallFrame, FaultKind> {
    frames.last_mut().ok_or(FaultKind::NoFrame)
}

fn nonnull(v: Value) -> Result<Value, FaultKind> {
    if v.is_null() {
        Err(FaultKind::NullReference)
    } else {
        Ok(v)
    }
}

fn mismatch(expected: &'static str, found: &Value) -> FaultKind {
    FaultKind::TypeMismatch {
        expected,
        found: found.type_name(),
    }
}

fn as_bool(v: &Value) -> Result<bool, FaultKind> {
    match v {
        Value::Bool(b) => Ok(*b),
        other => Err(mismatch("bool", other)),
    }
}

fn as_int(v: &Value) -> Result<i64, FaultKind> {
    match v {
        Value::Int(i) => Ok(*i),
        other => Err(mismatch("int", other)),
    }
}

fn as_object(v: &Value) -> Result<ObjectId, FaultKind> {
    match v {
        Value::Object(id) => Ok(*id),
        other => Err(mismatch("object", other)),
    }
}

fn as_string(v: &Value) -> Result<&str, FaultKind> {
    match v {
        Value::String(s) => Ok(s.as_str()),
        other => Err(mismatch("string", other)),
    }
}

/// Integer arithmetic wraps; integer division by zero faults. Float
/// division by zero follows IEEE-754.
fn arith(instr: &Instruction, y: Value, x: Value) -> Result<Value, FaultKind> {
    use Instruction::*;
    match (y, x) {
        (Value::Int(a), Value::Int(b)) => {
            let r = match instr {
                Add => a.wrapping_add(b),
                Sub => a.wrapping_sub(b),
                Mul => a.wrapping_mul(b),
                Div => {
                    if b == 0 {
                        return Err(FaultKind::DivisionByZero);
                    }
                    a.wrapping_div(b)
                }
                _ => unreachable!("arith called with non-arithmetic instruction"),
            };
            Ok(Value::Int(r))
        }
        (Value::Float(a), Value::Float(b)) => {
            let r = match instr {
                Add => a + b,
                Sub => a - b,
                Mul => a * b,
                Div => a / b,
                _ => unreachable!("arith called with non-arithmetic instruction"),
            };
            Ok(Value::Float(r))
        }
        (_, x) => Err(mismatch("two ints or two doubles", &x)),
    }
}

/// Ordering comparisons tolerate null: both-null compares true, null
/// against anything else compares false.
fn relational(instr: &Instruction, y: &Value, x: &Value) -> Result<bool, FaultKind> {
    fn ord<T: PartialOrd + ?Sized>(instr: &Instruction, a: &T, b: &T) -> bool {
        match instr {
            Instruction::CmpLt => a.lt(b),
            Instruction::CmpLe => a.le(b),
            Instruction::CmpGt => a.gt(b),
            Instruction::CmpGe => a.ge(b),
            _ => unreachable!("relational called with non-relational instruction"),
        }
    }
    match (y, x) {
        (Value::Null, Value::Null) => Ok(true),
        (Value::Null, _) | (_, Value::Null) => Ok(false),
        (Value::Int(a), Value::Int(b)) => Ok(ord(instr, a, b)),
        (Value::Float(a), Value::Float(b)) => Ok(ord(instr, a, b)),
        (Value::Bool(a), Value::Bool(b)) => Ok(ord(instr, a, b)),
        (Value::String(a), Value::String(b)) => Ok(ord(instr, a.as_str(), b.as_str())),
        (_, x) => Err(mismatch("matching comparable operands", x)),
    }
}
