//! Bytecode opcodes for the LSO VM
//!
//! This module defines the closed instruction set executed by the engine.
//! Operand layouts are documented per variant; see [`crate::instruction`] for
//! the decoded form.

/// Bytecode opcode enumeration
///
/// All opcodes are single-byte instructions. Some opcodes take additional operands
/// that follow the opcode byte in the bytecode stream.
///
/// Opcodes are organized into categories:
/// - 0x00-0x0F: Stack manipulation & constants
/// - 0x10-0x1F: Local and global variables
/// - 0x20-0x2F: Typed arithmetic
/// - 0x30-0x3F: Typed comparison
/// - 0x40-0x4F: Integer bitwise & boolean logic
/// - 0x50-0x5F: Type conversion
/// - 0x90-0x9F: Control flow, calls & state changes
/// - 0xB0-0xBF: Host output
/// - 0xC0-0xCF: Library calls
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    // ===== Stack Manipulation & Constants (0x00-0x0F) =====
    /// No operation
    Nop = 0x00,
    /// Pop top value from stack
    Pop = 0x01,
    /// Duplicate top stack value
    Dup = 0x02,
    /// Swap top two stack values
    Swap = 0x03,
    /// Push 32-bit integer constant (operand: i32)
    PushInt = 0x04,
    /// Push 32-bit float constant (operand: f32)
    PushFloat = 0x05,
    /// Push string from the string pool (operand: u32 index)
    PushString = 0x06,
    /// Push key from the string pool (operand: u32 index)
    PushKey = 0x07,
    /// Pop three floats (z on top) and push a vector
    BuildVector = 0x08,
    /// Pop four floats (s on top) and push a rotation
    BuildRotation = 0x09,
    /// Pop N values and push them as a list (operand: u16 count)
    BuildList = 0x0A,

    // ===== Variables (0x10-0x1F) =====
    /// Load local variable onto stack (operand: u16 index)
    LoadLocal = 0x10,
    /// Pop into local variable (operand: u16 index)
    StoreLocal = 0x11,
    /// Load global variable onto stack (operand: u16 index)
    LoadGlobal = 0x12,
    /// Pop into global variable (operand: u16 index)
    StoreGlobal = 0x13,

    // ===== Typed Arithmetic (0x20-0x2F) =====
    /// Add (operand: u8 operand types)
    Add = 0x20,
    /// Subtract (operand: u8 operand types)
    Sub = 0x21,
    /// Multiply (operand: u8 operand types)
    Mul = 0x22,
    /// Divide (operand: u8 operand types)
    Div = 0x23,
    /// Modulo, or cross product for vectors (operand: u8 operand types)
    Mod = 0x24,
    /// Negate (operand: u8 type)
    Neg = 0x25,

    // ===== Typed Comparison (0x30-0x3F) =====
    /// Equal (operand: u8 operand types)
    Eq = 0x30,
    /// Not equal (operand: u8 operand types)
    Neq = 0x31,
    /// Less than (operand: u8 operand types)
    Lt = 0x32,
    /// Greater than (operand: u8 operand types)
    Gt = 0x33,
    /// Less or equal (operand: u8 operand types)
    Le = 0x34,
    /// Greater or equal (operand: u8 operand types)
    Ge = 0x35,

    // ===== Integer Bitwise & Boolean (0x40-0x4F) =====
    /// Bitwise AND
    BitAnd = 0x40,
    /// Bitwise OR
    BitOr = 0x41,
    /// Bitwise XOR
    BitXor = 0x42,
    /// Bitwise NOT
    BitNot = 0x43,
    /// Shift left
    Shl = 0x44,
    /// Arithmetic shift right
    Shr = 0x45,
    /// Logical AND (both operands evaluated)
    BoolAnd = 0x46,
    /// Logical OR (both operands evaluated)
    BoolOr = 0x47,
    /// Logical NOT
    BoolNot = 0x48,

    // ===== Conversion (0x50-0x5F) =====
    /// Cast top of stack (operand: u8 target type)
    Cast = 0x50,

    // ===== Control Flow (0x90-0x9F) =====
    /// Unconditional jump (operand: i32 offset from next instruction)
    Jump = 0x90,
    /// Pop and jump if truthy (operand: i32 offset)
    JumpIf = 0x91,
    /// Pop and jump if falsy (operand: i32 offset)
    JumpIfNot = 0x92,
    /// Call user function (operand: u16 function index)
    Call = 0x93,
    /// Return from function or event handler
    Return = 0x94,
    /// Change script state (operand: u16 state index)
    State = 0x95,
    /// Stop the script
    Halt = 0x9F,

    // ===== Host Output (0xB0-0xBF) =====
    /// Pop a value and send its string form to the chat sink
    Print = 0xB0,

    // ===== Library Calls (0xC0-0xCF) =====
    /// Call a library import (operand: u16 import index)
    CallLib = 0xC0,
}

impl Opcode {
    /// Convert a byte to an opcode
    ///
    /// Returns None if the byte is not a valid opcode.
    pub fn from_u8(byte: u8) -> Option<Self> {
        match byte {
            0x00 => Some(Self::Nop),
            0x01 => Some(Self::Pop),
            0x02 => Some(Self::Dup),
            0x03 => Some(Self::Swap),
            0x04 => Some(Self::PushInt),
            0x05 => Some(Self::PushFloat),
            0x06 => Some(Self::PushString),
            0x07 => Some(Self::PushKey),
            0x08 => Some(Self::BuildVector),
            0x09 => Some(Self::BuildRotation),
            0x0A => Some(Self::BuildList),

            0x10 => Some(Self::LoadLocal),
            0x11 => Some(Self::StoreLocal),
            0x12 => Some(Self::LoadGlobal),
            0x13 => Some(Self::StoreGlobal),

            0x20 => Some(Self::Add),
            0x21 => Some(Self::Sub),
            0x22 => Some(Self::Mul),
            0x23 => Some(Self::Div),
            0x24 => Some(Self::Mod),
            0x25 => Some(Self::Neg),

            0x30 => Some(Self::Eq),
            0x31 => Some(Self::Neq),
            0x32 => Some(Self::Lt),
            0x33 => Some(Self::Gt),
            0x34 => Some(Self::Le),
            0x35 => Some(Self::Ge),

            0x40 => Some(Self::BitAnd),
            0x41 => Some(Self::BitOr),
            0x42 => Some(Self::BitXor),
            0x43 => Some(Self::BitNot),
            0x44 => Some(Self::Shl),
            0x45 => Some(Self::Shr),
            0x46 => Some(Self::BoolAnd),
            0x47 => Some(Self::BoolOr),
            0x48 => Some(Self::BoolNot),

            0x50 => Some(Self::Cast),

            0x90 => Some(Self::Jump),
            0x91 => Some(Self::JumpIf),
            0x92 => Some(Self::JumpIfNot),
            0x93 => Some(Self::Call),
            0x94 => Some(Self::Return),
            0x95 => Some(Self::State),
            0x9F => Some(Self::Halt),

            0xB0 => Some(Self::Print),

            0xC0 => Some(Self::CallLib),

            _ => None,
        }
    }

    /// Convert opcode to byte
    #[inline]
    pub fn to_u8(self) -> u8 {
        self as u8
    }

    /// Get the mnemonic name of this opcode
    pub fn name(self) -> &'static str {
        match self {
            Self::Nop => "NOP",
            Self::Pop => "POP",
            Self::Dup => "DUP",
            Self::Swap => "SWAP",
            Self::PushInt => "PUSHI",
            Self::PushFloat => "PUSHF",
            Self::PushString => "PUSHS",
            Self::PushKey => "PUSHK",
            Self::BuildVector => "BUILDVEC",
            Self::BuildRotation => "BUILDROT",
            Self::BuildList => "BUILDLIST",
            Self::LoadLocal => "LOADL",
            Self::StoreLocal => "STOREL",
            Self::LoadGlobal => "LOADG",
            Self::StoreGlobal => "STOREG",
            Self::Add => "ADD",
            Self::Sub => "SUB",
            Self::Mul => "MUL",
            Self::Div => "DIV",
            Self::Mod => "MOD",
            Self::Neg => "NEG",
            Self::Eq => "EQ",
            Self::Neq => "NEQ",
            Self::Lt => "LT",
            Self::Gt => "GT",
            Self::Le => "LE",
            Self::Ge => "GE",
            Self::BitAnd => "BITAND",
            Self::BitOr => "BITOR",
            Self::BitXor => "BITXOR",
            Self::BitNot => "BITNOT",
            Self::Shl => "SHL",
            Self::Shr => "SHR",
            Self::BoolAnd => "BOOLAND",
            Self::BoolOr => "BOOLOR",
            Self::BoolNot => "BOOLNOT",
            Self::Cast => "CAST",
            Self::Jump => "JUMP",
            Self::JumpIf => "JUMPIF",
            Self::JumpIfNot => "JUMPNIF",
            Self::Call => "CALL",
            Self::Return => "RETURN",
            Self::State => "STATE",
            Self::Halt => "HALT",
            Self::Print => "PRINT",
            Self::CallLib => "CALLLIB",
        }
    }

    /// Size in bytes of the operands that follow this opcode
    pub fn operand_size(self) -> usize {
        match self {
            Self::PushInt
            | Self::PushFloat
            | Self::PushString
            | Self::PushKey
            | Self::Jump
            | Self::JumpIf
            | Self::JumpIfNot => 4,
            Self::BuildList
            | Self::LoadLocal
            | Self::StoreLocal
            | Self::LoadGlobal
            | Self::StoreGlobal
            | Self::Call
            | Self::State
            | Self::CallLib => 2,
            Self::Add
            | Self::Sub
            | Self::Mul
            | Self::Div
            | Self::Mod
            | Self::Neg
            | Self::Eq
            | Self::Neq
            | Self::Lt
            | Self::Gt
            | Self::Le
            | Self::Ge
            | Self::Cast => 1,
            _ => 0,
        }
    }

    /// Check if this is a jump instruction
    pub fn is_jump(self) -> bool {
        matches!(self, Self::Jump | Self::JumpIf | Self::JumpIfNot)
    }

    /// Check if this is a call instruction
    pub fn is_call(self) -> bool {
        matches!(self, Self::Call | Self::CallLib)
    }

    /// Check if execution never falls through to the next instruction
    pub fn is_terminator(self) -> bool {
        matches!(self, Self::Jump | Self::Return | Self::State | Self::Halt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: &[Opcode] = &[
        Opcode::Nop,
        Opcode::Pop,
        Opcode::Dup,
        Opcode::Swap,
        Opcode::PushInt,
        Opcode::PushFloat,
        Opcode::PushString,
        Opcode::PushKey,
        Opcode::BuildVector,
        Opcode::BuildRotation,
        Opcode::BuildList,
        Opcode::LoadLocal,
        Opcode::StoreLocal,
        Opcode::LoadGlobal,
        Opcode::StoreGlobal,
        Opcode::Add,
        Opcode::Sub,
        Opcode::Mul,
        Opcode::Div,
        Opcode::Mod,
        Opcode::Neg,
        Opcode::Eq,
        Opcode::Neq,
        Opcode::Lt,
        Opcode::Gt,
        Opcode::Le,
        Opcode::Ge,
        Opcode::BitAnd,
        Opcode::BitOr,
        Opcode::BitXor,
        Opcode::BitNot,
        Opcode::Shl,
        Opcode::Shr,
        Opcode::BoolAnd,
        Opcode::BoolOr,
        Opcode::BoolNot,
        Opcode::Cast,
        Opcode::Jump,
        Opcode::JumpIf,
        Opcode::JumpIfNot,
        Opcode::Call,
        Opcode::Return,
        Opcode::State,
        Opcode::Halt,
        Opcode::Print,
        Opcode::CallLib,
    ];

    #[test]
    fn test_opcode_roundtrip() {
        for opcode in ALL {
            let byte = opcode.to_u8();
            assert_eq!(Opcode::from_u8(byte), Some(*opcode), "Failed roundtrip for {:?}", opcode);
        }
    }

    #[test]
    fn test_invalid_opcode() {
        assert_eq!(Opcode::from_u8(0x0B), None);
        assert_eq!(Opcode::from_u8(0x60), None);
        assert_eq!(Opcode::from_u8(0xFF), None);
    }

    #[test]
    fn test_opcode_names() {
        assert_eq!(Opcode::Nop.name(), "NOP");
        assert_eq!(Opcode::JumpIfNot.name(), "JUMPNIF");
        assert_eq!(Opcode::CallLib.name(), "CALLLIB");
    }

    #[test]
    fn test_names_are_unique() {
        let mut names: Vec<_> = ALL.iter().map(|op| op.name()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), ALL.len());
    }

    #[test]
    fn test_control_flow_classification() {
        assert!(Opcode::Jump.is_jump());
        assert!(Opcode::JumpIfNot.is_jump());
        assert!(!Opcode::Call.is_jump());
        assert!(Opcode::CallLib.is_call());
        assert!(Opcode::Halt.is_terminator());
        assert!(Opcode::State.is_terminator());
        assert!(!Opcode::JumpIf.is_terminator());
    }

    #[test]
    fn test_operand_sizes() {
        assert_eq!(Opcode::PushInt.operand_size(), 4);
        assert_eq!(Opcode::CallLib.operand_size(), 2);
        assert_eq!(Opcode::Add.operand_size(), 1);
        assert_eq!(Opcode::Return.operand_size(), 0);
    }
}
