//! Bytecode instruction set and binary encoding.
//!
//! An instruction stream is a flat byte sequence. Each instruction is a
//! one-byte opcode followed by zero or more operands; operand widths are
//! fixed per opcode and multi-byte operands are big-endian unsigned. Jump
//! targets are absolute byte offsets into the containing stream.
//!
//! The enumeration order below is the binary contract between compiler and
//! VM — it is observable through the encoded byte and must not change.

use std::fmt::Write as _;

use smallvec::SmallVec;

/// Bytecode opcodes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Op {
    /// Push `constants[idx]`. Operand: constant pool index (u16).
    Constant = 0,
    /// Push `true`.
    True,
    /// Push `false`.
    False,
    /// Push `null`.
    Null,

    /// Pop two, push their sum (integers) or concatenation (strings).
    Add,
    /// Pop two, push the difference.
    Sub,
    /// Pop two, push the product.
    Mul,
    /// Pop two, push the quotient.
    Div,

    /// Pop two, push whether they are equal.
    Equal,
    /// Pop two, push whether they differ.
    NotEqual,
    /// Pop two, push `left > right` (the compiler rewrites `<` into this).
    GreaterThan,

    /// Logical not of the truthiness of the top value.
    Bang,
    /// Integer negation of the top value.
    Minus,

    /// Pop; jump to the target if the value is not truthy. Operand: absolute
    /// byte offset (u16).
    JumpNotTruthy,
    /// Unconditional jump. Operand: absolute byte offset (u16).
    Jump,
    /// Discard the top of the stack.
    Pop,

    /// Pop into `globals[idx]`. Operand: global index (u16).
    SetGlobal,
    /// Push `globals[idx]`. Operand: global index (u16).
    GetGlobal,
    /// Pop into the current frame's local slot. Operand: local index (u8).
    SetLocal,
    /// Push the current frame's local slot. Operand: local index (u8).
    GetLocal,

    /// Pop N values, push an array of them in source order. Operand: N (u16).
    Array,
    /// Pop 2N values as key/value pairs, push a hash. Operand: 2N (u16).
    Hash,
    /// Pop index and target, push `target[index]`.
    Index,

    /// Call the closure or builtin sitting below the arguments.
    /// Operand: argument count (u8).
    Call,
    /// Return the top value from the current frame.
    ReturnValue,
    /// Return `null` from the current frame.
    Return,

    /// Push a handle to `builtins[idx]`. Operand: builtin index (u8).
    GetBuiltin,
    /// Pop `numFree` captured values, wrap `constants[constIdx]` as a
    /// closure, push it. Operands: constant index (u16), numFree (u8).
    Closure,
    /// Push the current closure's free variable. Operand: free index (u8).
    GetFree,
}

/// Per-opcode name and operand layout.
#[derive(Debug, PartialEq, Eq)]
pub struct Definition {
    /// Human-readable name used by the disassembler.
    pub name: &'static str,
    /// Width in bytes of each operand, in order.
    pub operand_widths: &'static [usize],
}

impl Op {
    /// Try to decode an opcode from a byte.
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(Op::Constant),
            1 => Some(Op::True),
            2 => Some(Op::False),
            3 => Some(Op::Null),
            4 => Some(Op::Add),
            5 => Some(Op::Sub),
            6 => Some(Op::Mul),
            7 => Some(Op::Div),
            8 => Some(Op::Equal),
            9 => Some(Op::NotEqual),
            10 => Some(Op::GreaterThan),
            11 => Some(Op::Bang),
            12 => Some(Op::Minus),
            13 => Some(Op::JumpNotTruthy),
            14 => Some(Op::Jump),
            15 => Some(Op::Pop),
            16 => Some(Op::SetGlobal),
            17 => Some(Op::GetGlobal),
            18 => Some(Op::SetLocal),
            19 => Some(Op::GetLocal),
            20 => Some(Op::Array),
            21 => Some(Op::Hash),
            22 => Some(Op::Index),
            23 => Some(Op::Call),
            24 => Some(Op::ReturnValue),
            25 => Some(Op::Return),
            26 => Some(Op::GetBuiltin),
            27 => Some(Op::Closure),
            28 => Some(Op::GetFree),
            _ => None,
        }
    }

    /// The byte representation of this opcode.
    pub fn as_byte(self) -> u8 {
        self as u8
    }

    /// The opcode's name and operand layout.
    pub fn def(self) -> &'static Definition {
        match self {
            Op::Constant => &Definition {
                name: "Constant",
                operand_widths: &[2],
            },
            Op::True => &Definition {
                name: "True",
                operand_widths: &[],
            },
            Op::False => &Definition {
                name: "False",
                operand_widths: &[],
            },
            Op::Null => &Definition {
                name: "Null",
                operand_widths: &[],
            },
            Op::Add => &Definition {
                name: "Add",
                operand_widths: &[],
            },
            Op::Sub => &Definition {
                name: "Sub",
                operand_widths: &[],
            },
            Op::Mul => &Definition {
                name: "Mul",
                operand_widths: &[],
            },
            Op::Div => &Definition {
                name: "Div",
                operand_widths: &[],
            },
            Op::Equal => &Definition {
                name: "Equal",
                operand_widths: &[],
            },
            Op::NotEqual => &Definition {
                name: "NotEqual",
                operand_widths: &[],
            },
            Op::GreaterThan => &Definition {
                name: "GreaterThan",
                operand_widths: &[],
            },
            Op::Bang => &Definition {
                name: "Bang",
                operand_widths: &[],
            },
            Op::Minus => &Definition {
                name: "Minus",
                operand_widths: &[],
            },
            Op::JumpNotTruthy => &Definition {
                name: "JumpNotTruthy",
                operand_widths: &[2],
            },
            Op::Jump => &Definition {
                name: "Jump",
                operand_widths: &[2],
            },
            Op::Pop => &Definition {
                name: "Pop",
                operand_widths: &[],
            },
            Op::SetGlobal => &Definition {
                name: "SetGlobal",
                operand_widths: &[2],
            },
            Op::GetGlobal => &Definition {
                name: "GetGlobal",
                operand_widths: &[2],
            },
            Op::SetLocal => &Definition {
                name: "SetLocal",
                operand_widths: &[1],
            },
            Op::GetLocal => &Definition {
                name: "GetLocal",
                operand_widths: &[1],
            },
            Op::Array => &Definition {
                name: "Array",
                operand_widths: &[2],
            },
            Op::Hash => &Definition {
                name: "Hash",
                operand_widths: &[2],
            },
            Op::Index => &Definition {
                name: "Index",
                operand_widths: &[],
            },
            Op::Call => &Definition {
                name: "Call",
                operand_widths: &[1],
            },
            Op::ReturnValue => &Definition {
                name: "ReturnValue",
                operand_widths: &[],
            },
            Op::Return => &Definition {
                name: "Return",
                operand_widths: &[],
            },
            Op::GetBuiltin => &Definition {
                name: "GetBuiltin",
                operand_widths: &[1],
            },
            Op::Closure => &Definition {
                name: "Closure",
                operand_widths: &[2, 1],
            },
            Op::GetFree => &Definition {
                name: "GetFree",
                operand_widths: &[1],
            },
        }
    }
}

/// Operands decoded from a single instruction. No opcode takes more than
/// two, so this never spills to the heap.
pub type Operands = SmallVec<[usize; 2]>;

/// Assemble an instruction: opcode byte followed by big-endian operands.
///
/// Operands beyond the opcode's definition are ignored; missing operands
/// are encoded as zero (useful for jump placeholders that are back-patched
/// later).
pub fn make(op: Op, operands: &[usize]) -> Vec<u8> {
    let def = op.def();
    let len = 1 + def.operand_widths.iter().sum::<usize>();
    let mut instruction = Vec::with_capacity(len);
    instruction.push(op.as_byte());

    for (i, &width) in def.operand_widths.iter().enumerate() {
        let operand = operands.get(i).copied().unwrap_or(0);
        match width {
            2 => instruction.extend_from_slice(&(operand as u16).to_be_bytes()),
            1 => instruction.push(operand as u8),
            _ => unreachable!("unsupported operand width {}", width),
        }
    }
    instruction
}

/// Decode the operands of an instruction (the bytes after the opcode).
/// Returns the operands and the number of bytes consumed.
pub fn read_operands(def: &Definition, ins: &[u8]) -> (Operands, usize) {
    let mut operands = Operands::new();
    let mut offset = 0;

    for &width in def.operand_widths {
        match width {
            2 => operands.push(read_u16(&ins[offset..]) as usize),
            1 => operands.push(read_u8(&ins[offset..]) as usize),
            _ => unreachable!("unsupported operand width {}", width),
        }
        offset += width;
    }
    (operands, offset)
}

/// Read a big-endian u16 from the start of a byte slice.
pub fn read_u16(ins: &[u8]) -> u16 {
    u16::from_be_bytes([ins[0], ins[1]])
}

/// Read a u8 from the start of a byte slice.
pub fn read_u8(ins: &[u8]) -> u8 {
    ins[0]
}

/// Render an instruction stream as one `NNNN Name op0 op1` line per
/// instruction, indexed by absolute byte offset.
///
/// This is diagnostic output only: an unknown opcode renders inline as
/// `ERROR: opcode N undefined` and decoding skips one byte.
pub fn disassemble(ins: &[u8]) -> String {
    let mut out = String::new();
    let mut offset = 0;

    while offset < ins.len() {
        let Some(op) = Op::from_byte(ins[offset]) else {
            let _ = writeln!(out, "ERROR: opcode {} undefined", ins[offset]);
            offset += 1;
            continue;
        };
        let def = op.def();
        let (operands, read) = read_operands(def, &ins[offset + 1..]);
        let _ = writeln!(out, "{:04} {}", offset, fmt_instruction(def, &operands));
        offset += 1 + read;
    }
    out
}

fn fmt_instruction(def: &Definition, operands: &[usize]) -> String {
    if operands.len() != def.operand_widths.len() {
        return format!(
            "ERROR: operand len {} does not match defined {}",
            operands.len(),
            def.operand_widths.len()
        );
    }
    match operands {
        [] => def.name.to_string(),
        [a] => format!("{} {}", def.name, a),
        [a, b] => format!("{} {} {}", def.name, a, b),
        _ => format!("ERROR: unhandled operand count for {}", def.name),
    }
}
