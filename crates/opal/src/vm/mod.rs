//! The stack virtual machine.
//!
//! The VM executes bytecode produced by the compiler. It owns:
//! - the operand stack (fixed 2048 slots)
//! - the globals array (fixed 65536 slots, addressable from any frame)
//! - the frame stack (one frame per active call)
//! - the constant pool handed over in the bytecode
//!
//! Start-up wraps the top-level instruction stream in a closure with no free
//! variables and pushes a root frame for it; the decode loop runs until the
//! root frame exhausts its stream. Calls push frames whose base pointer
//! marks where their local window begins; returns unwind the window and the
//! callee in one stack-pointer move.
//!
//! Runtime errors terminate `run` with a descriptive message. They are not
//! catchable from within the language; the in-language `Error` value that
//! builtins produce is an ordinary value, not one of these.

pub mod frame;
pub mod stack;

use std::collections::HashMap;
use std::sync::Arc;

use crate::code::{Op, read_u8, read_u16};
use crate::compiler::Bytecode;
use crate::object::{Closure, CompiledFunction, HashKey, Value, builtins};
use frame::Frame;
use stack::{Stack, StackError};

pub use stack::STACK_SIZE;

/// Number of slots in the globals array. `SetGlobal`'s operand is 16 bits,
/// so this bound cannot be exceeded by compiled code.
pub const GLOBALS_SIZE: usize = 65536;

/// Maximum call depth.
pub const MAX_FRAMES: usize = 1024;

/// VM execution error.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VmError {
    Stack(StackError),
    FrameOverflow,
    InvalidOpcode(u8),
    UnexpectedEnd,
    UnsupportedBinary {
        left: &'static str,
        right: &'static str,
    },
    UnknownStringOperator(&'static str),
    UnknownOperator {
        op: &'static str,
        left: &'static str,
        right: &'static str,
    },
    UnsupportedNegation(&'static str),
    DivisionByZero,
    CallingNonFunction,
    WrongArity {
        want: usize,
        got: usize,
    },
    UnknownBuiltin(usize),
    UnusableHashKey(&'static str),
    IndexNotSupported(&'static str),
    NotAFunction(&'static str),
}

impl std::fmt::Display for VmError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stack(e) => write!(f, "{}", e),
            Self::FrameOverflow => write!(f, "frame stack overflow"),
            Self::InvalidOpcode(op) => write!(f, "invalid opcode: 0x{:02X}", op),
            Self::UnexpectedEnd => write!(f, "unexpected end of bytecode"),
            Self::UnsupportedBinary { left, right } => {
                write!(f, "unsupported types for binary operation: {} {}", left, right)
            }
            Self::UnknownStringOperator(op) => write!(f, "unknown string operator: {}", op),
            Self::UnknownOperator { op, left, right } => {
                write!(f, "unknown operator: {} ({} {})", op, left, right)
            }
            Self::UnsupportedNegation(t) => write!(f, "unsupported type for negation: {}", t),
            Self::DivisionByZero => write!(f, "division by zero"),
            Self::CallingNonFunction => write!(f, "calling non-function"),
            Self::WrongArity { want, got } => {
                write!(f, "wrong number of arguments: want={}, got={}", want, got)
            }
            Self::UnknownBuiltin(idx) => write!(f, "unknown builtin: {}", idx),
            Self::UnusableHashKey(t) => write!(f, "unusable as hash key: {}", t),
            Self::IndexNotSupported(t) => write!(f, "index operator not supported: {}", t),
            Self::NotAFunction(t) => write!(f, "not a function: {}", t),
        }
    }
}

impl std::error::Error for VmError {}

impl From<StackError> for VmError {
    fn from(e: StackError) -> Self {
        Self::Stack(e)
    }
}

/// The virtual machine.
pub struct Vm {
    constants: Vec<Value>,
    stack: Stack,
    globals: Vec<Value>,
    frames: Vec<Frame>,
}

impl Vm {
    /// Create a VM for a compiled program with a fresh globals array.
    pub fn new(bytecode: Bytecode) -> Self {
        Self::with_globals(bytecode, vec![Value::Null; GLOBALS_SIZE])
    }

    /// Create a VM reusing an existing globals array. The REPL threads one
    /// array through every submission so definitions persist.
    pub fn with_globals(bytecode: Bytecode, globals: Vec<Value>) -> Self {
        let function = Arc::new(CompiledFunction {
            instructions: bytecode.instructions.into(),
            num_locals: 0,
            num_parameters: 0,
        });
        let root = Arc::new(Closure {
            function,
            free: Vec::new(),
        });
        let mut frames = Vec::with_capacity(MAX_FRAMES);
        frames.push(Frame::new(root, 0));

        Self {
            constants: bytecode.constants,
            stack: Stack::new(),
            globals,
            frames,
        }
    }

    /// Take back the globals array for the next `with_globals` round.
    pub fn into_globals(self) -> Vec<Value> {
        self.globals
    }

    /// The value most recently popped off the stack. After a normal run
    /// this is the final expression's value.
    pub fn last_popped(&self) -> &Value {
        self.stack.last_popped()
    }

    /// The fetch/decode/execute loop.
    pub fn run(&mut self) -> Result<(), VmError> {
        loop {
            let frame = self.current_frame();
            let ip = frame.ip;
            let ins = Arc::clone(frame.instructions());
            if ip >= ins.len() {
                // Only the root frame ends by exhausting its stream;
                // function frames leave through Return/ReturnValue.
                return Ok(());
            }

            let byte = ins[ip];
            let op = Op::from_byte(byte).ok_or(VmError::InvalidOpcode(byte))?;
            self.current_frame_mut().ip += 1;

            match op {
                // === Constants and literals ===
                Op::Constant => {
                    let idx = self.read_u16_operand(&ins, ip + 1)?;
                    let constant = self.constants[idx].clone();
                    self.stack.push(constant)?;
                }
                Op::True => self.stack.push(Value::Boolean(true))?,
                Op::False => self.stack.push(Value::Boolean(false))?,
                Op::Null => self.stack.push(Value::Null)?,

                // === Arithmetic and comparison ===
                Op::Add | Op::Sub | Op::Mul | Op::Div => self.execute_binary_operation(op)?,
                Op::Equal | Op::NotEqual | Op::GreaterThan => self.execute_comparison(op)?,
                Op::Bang => {
                    let operand = self.stack.pop()?;
                    self.stack.push(Value::Boolean(!operand.is_truthy()))?;
                }
                Op::Minus => {
                    let operand = self.stack.pop()?;
                    match operand {
                        Value::Integer(n) => self.stack.push(Value::Integer(n.wrapping_neg()))?,
                        other => return Err(VmError::UnsupportedNegation(other.type_name())),
                    }
                }

                // === Jumps ===
                Op::Jump => {
                    let target = self.read_u16_operand(&ins, ip + 1)?;
                    self.current_frame_mut().ip = target;
                }
                Op::JumpNotTruthy => {
                    let target = self.read_u16_operand(&ins, ip + 1)?;
                    let condition = self.stack.pop()?;
                    if !condition.is_truthy() {
                        self.current_frame_mut().ip = target;
                    }
                }
                Op::Pop => {
                    self.stack.pop()?;
                }

                // === Globals and locals ===
                Op::SetGlobal => {
                    let idx = self.read_u16_operand(&ins, ip + 1)?;
                    self.globals[idx] = self.stack.pop()?;
                }
                Op::GetGlobal => {
                    let idx = self.read_u16_operand(&ins, ip + 1)?;
                    self.stack.push(self.globals[idx].clone())?;
                }
                Op::SetLocal => {
                    let idx = self.read_u8_operand(&ins, ip + 1)?;
                    let base = self.current_frame().base_pointer;
                    let value = self.stack.pop()?;
                    self.stack.set(base + idx, value);
                }
                Op::GetLocal => {
                    let idx = self.read_u8_operand(&ins, ip + 1)?;
                    let base = self.current_frame().base_pointer;
                    let value = self.stack.get(base + idx).clone();
                    self.stack.push(value)?;
                }

                // === Composite construction and indexing ===
                Op::Array => {
                    let count = self.read_u16_operand(&ins, ip + 1)?;
                    let start = self.stack.sp() - count;
                    let items = self.stack.view(start).to_vec();
                    self.stack.set_sp(start)?;
                    self.stack.push(Value::array(items))?;
                }
                Op::Hash => {
                    let count = self.read_u16_operand(&ins, ip + 1)?;
                    let start = self.stack.sp() - count;
                    let hash = build_hash(self.stack.view(start))?;
                    self.stack.set_sp(start)?;
                    self.stack.push(hash)?;
                }
                Op::Index => {
                    let index = self.stack.pop()?;
                    let left = self.stack.pop()?;
                    self.execute_index(left, index)?;
                }

                // === Calls and returns ===
                Op::Call => {
                    let num_args = self.read_u8_operand(&ins, ip + 1)?;
                    self.execute_call(num_args)?;
                }
                Op::ReturnValue => {
                    let value = self.stack.pop()?;
                    if self.frames.len() == 1 {
                        // A top-level `return` halts the program; the value
                        // stays observable through last_popped().
                        return Ok(());
                    }
                    let frame = self.pop_frame();
                    self.stack.set_sp(frame.base_pointer - 1)?;
                    self.stack.push(value)?;
                }
                Op::Return => {
                    if self.frames.len() == 1 {
                        self.stack.push(Value::Null)?;
                        self.stack.pop()?;
                        return Ok(());
                    }
                    let frame = self.pop_frame();
                    self.stack.set_sp(frame.base_pointer - 1)?;
                    self.stack.push(Value::Null)?;
                }

                // === Closures and builtins ===
                Op::GetBuiltin => {
                    let idx = self.read_u8_operand(&ins, ip + 1)?;
                    self.stack.push(Value::Builtin(idx))?;
                }
                Op::Closure => {
                    let const_idx = self.read_u16_operand(&ins, ip + 1)?;
                    let num_free = self.read_u8_operand(&ins, ip + 3)?;
                    self.push_closure(const_idx, num_free)?;
                }
                Op::GetFree => {
                    let idx = self.read_u8_operand(&ins, ip + 1)?;
                    let value = self.current_frame().closure().free[idx].clone();
                    self.stack.push(value)?;
                }
            }
        }
    }

    // === Operand decoding ===

    /// Read a u16 operand at `at` and advance the instruction pointer.
    fn read_u16_operand(&mut self, ins: &[u8], at: usize) -> Result<usize, VmError> {
        if at + 2 > ins.len() {
            return Err(VmError::UnexpectedEnd);
        }
        self.current_frame_mut().ip += 2;
        Ok(read_u16(&ins[at..]) as usize)
    }

    /// Read a u8 operand at `at` and advance the instruction pointer.
    fn read_u8_operand(&mut self, ins: &[u8], at: usize) -> Result<usize, VmError> {
        if at >= ins.len() {
            return Err(VmError::UnexpectedEnd);
        }
        self.current_frame_mut().ip += 1;
        Ok(read_u8(&ins[at..]) as usize)
    }

    // === Frames ===

    fn current_frame(&self) -> &Frame {
        self.frames.last().expect("frame stack is never empty")
    }

    fn current_frame_mut(&mut self) -> &mut Frame {
        self.frames.last_mut().expect("frame stack is never empty")
    }

    fn push_frame(&mut self, frame: Frame) -> Result<(), VmError> {
        if self.frames.len() >= MAX_FRAMES {
            return Err(VmError::FrameOverflow);
        }
        self.frames.push(frame);
        Ok(())
    }

    fn pop_frame(&mut self) -> Frame {
        self.frames.pop().expect("frame stack is never empty")
    }

    // === Operations ===

    fn execute_binary_operation(&mut self, op: Op) -> Result<(), VmError> {
        let right = self.stack.pop()?;
        let left = self.stack.pop()?;
        match (&left, &right) {
            (Value::Integer(l), Value::Integer(r)) => {
                let result = match op {
                    Op::Add => l.wrapping_add(*r),
                    Op::Sub => l.wrapping_sub(*r),
                    Op::Mul => l.wrapping_mul(*r),
                    Op::Div => {
                        if *r == 0 {
                            return Err(VmError::DivisionByZero);
                        }
                        l.wrapping_div(*r)
                    }
                    _ => unreachable!("non-arithmetic opcode {:?}", op),
                };
                self.stack.push(Value::Integer(result))?;
            }
            (Value::String(l), Value::String(r)) => {
                if op != Op::Add {
                    return Err(VmError::UnknownStringOperator(op.def().name));
                }
                self.stack.push(Value::string(format!("{}{}", l, r)))?;
            }
            _ => {
                return Err(VmError::UnsupportedBinary {
                    left: left.type_name(),
                    right: right.type_name(),
                });
            }
        }
        Ok(())
    }

    fn execute_comparison(&mut self, op: Op) -> Result<(), VmError> {
        let right = self.stack.pop()?;
        let left = self.stack.pop()?;

        if let (Value::Integer(l), Value::Integer(r)) = (&left, &right) {
            let result = match op {
                Op::Equal => l == r,
                Op::NotEqual => l != r,
                Op::GreaterThan => l > r,
                _ => unreachable!("non-comparison opcode {:?}", op),
            };
            self.stack.push(Value::Boolean(result))?;
            return Ok(());
        }

        match op {
            Op::Equal => self.stack.push(Value::Boolean(left == right))?,
            Op::NotEqual => self.stack.push(Value::Boolean(left != right))?,
            _ => {
                return Err(VmError::UnknownOperator {
                    op: op.def().name,
                    left: left.type_name(),
                    right: right.type_name(),
                });
            }
        }
        Ok(())
    }

    fn execute_index(&mut self, left: Value, index: Value) -> Result<(), VmError> {
        match (&left, &index) {
            (Value::Array(items), Value::Integer(i)) => {
                let value = usize::try_from(*i)
                    .ok()
                    .and_then(|i| items.get(i).cloned())
                    .unwrap_or(Value::Null);
                self.stack.push(value)?;
            }
            (Value::Hash(pairs), _) => {
                let key = HashKey::from_value(&index)
                    .ok_or_else(|| VmError::UnusableHashKey(index.type_name()))?;
                let value = pairs.get(&key).cloned().unwrap_or(Value::Null);
                self.stack.push(value)?;
            }
            _ => return Err(VmError::IndexNotSupported(left.type_name())),
        }
        Ok(())
    }

    fn execute_call(&mut self, num_args: usize) -> Result<(), VmError> {
        let callee = self.stack.get(self.stack.sp() - 1 - num_args).clone();
        match callee {
            Value::Closure(closure) => self.call_closure(closure, num_args),
            Value::Builtin(index) => self.call_builtin(index, num_args),
            _ => Err(VmError::CallingNonFunction),
        }
    }

    fn call_closure(&mut self, closure: Arc<Closure>, num_args: usize) -> Result<(), VmError> {
        if num_args != closure.function.num_parameters {
            return Err(VmError::WrongArity {
                want: closure.function.num_parameters,
                got: num_args,
            });
        }

        let base_pointer = self.stack.sp() - num_args;
        let num_locals = closure.function.num_locals;
        self.push_frame(Frame::new(closure, base_pointer))?;

        // Reserve the local window; parameters already occupy the first
        // slots, the rest start out null.
        self.stack.set_sp(base_pointer + num_locals)?;
        for slot in base_pointer + num_args..base_pointer + num_locals {
            self.stack.set(slot, Value::Null);
        }
        Ok(())
    }

    fn call_builtin(&mut self, index: usize, num_args: usize) -> Result<(), VmError> {
        let args_start = self.stack.sp() - num_args;
        let args = self.stack.view(args_start).to_vec();
        let result = builtins::invoke(index, &args).ok_or(VmError::UnknownBuiltin(index))?;

        // Drop the arguments and the builtin handle, then push the result
        // (which may be an in-language Error value).
        self.stack.set_sp(args_start - 1)?;
        self.stack.push(result)?;
        Ok(())
    }

    fn push_closure(&mut self, const_idx: usize, num_free: usize) -> Result<(), VmError> {
        let function = match &self.constants[const_idx] {
            Value::CompiledFunction(function) => Arc::clone(function),
            other => return Err(VmError::NotAFunction(other.type_name())),
        };

        let start = self.stack.sp() - num_free;
        let free = self.stack.view(start).to_vec();
        self.stack.set_sp(start)?;
        self.stack.push(Value::Closure(Arc::new(Closure { function, free })))?;
        Ok(())
    }
}

/// Build a hash from an even-length slice of key/value pairs in push order.
fn build_hash(pairs: &[Value]) -> Result<Value, VmError> {
    let mut hash = HashMap::with_capacity(pairs.len() / 2);
    for pair in pairs.chunks_exact(2) {
        let key = HashKey::from_value(&pair[0])
            .ok_or_else(|| VmError::UnusableHashKey(pair[0].type_name()))?;
        hash.insert(key, pair[1].clone());
    }
    Ok(Value::Hash(Arc::new(hash)))
}
