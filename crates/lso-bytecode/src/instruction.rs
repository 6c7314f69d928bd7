//! Decoded instruction representation
//!
//! The engine decodes exactly one [`Instruction`] per step and then matches on
//! it, so operand parsing happens in one place and every instruction is
//! executed from a fully validated value.

use crate::encoder::{BytecodeReader, DecodeError};
use crate::opcode::Opcode;
use crate::types::{OperandTypes, ValueType};
use std::fmt;

/// Arithmetic operators that take an operand-type pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArithOp {
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`
    Div,
    /// `%`
    Mod,
}

/// Comparison operators that take an operand-type pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    /// `==`
    Eq,
    /// `!=`
    Neq,
    /// `<`
    Lt,
    /// `>`
    Gt,
    /// `<=`
    Le,
    /// `>=`
    Ge,
}

/// Integer-only bitwise and boolean operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntOp {
    /// `&`
    BitAnd,
    /// `|`
    BitOr,
    /// `^`
    BitXor,
    /// `~` (unary)
    BitNot,
    /// `<<`
    Shl,
    /// `>>`
    Shr,
    /// `&&`
    BoolAnd,
    /// `||`
    BoolOr,
    /// `!` (unary)
    BoolNot,
}

impl IntOp {
    /// Whether the operator takes a single operand
    pub fn is_unary(self) -> bool {
        matches!(self, Self::BitNot | Self::BoolNot)
    }
}

/// A single decoded instruction
///
/// Variants mirror [`Opcode`]; see there for operand meanings.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Instruction {
    Nop,
    Pop,
    Dup,
    Swap,
    PushInt(i32),
    PushFloat(f32),
    PushString(u32),
    PushKey(u32),
    BuildVector,
    BuildRotation,
    BuildList(u16),
    LoadLocal(u16),
    StoreLocal(u16),
    LoadGlobal(u16),
    StoreGlobal(u16),
    Binary(ArithOp, OperandTypes),
    Neg(ValueType),
    Compare(CompareOp, OperandTypes),
    Int(IntOp),
    Cast(ValueType),
    Jump(i32),
    JumpIf(i32),
    JumpIfNot(i32),
    Call(u16),
    Return,
    State(u16),
    Halt,
    Print,
    CallLib(u16),
}

impl Instruction {
    /// Decode the instruction starting at `offset`
    ///
    /// Returns the instruction and the offset of the next one.
    pub fn decode(code: &[u8], offset: usize) -> Result<(Self, usize), DecodeError> {
        let mut reader = BytecodeReader::at(code, offset);
        let opcode = reader.read_opcode()?;

        let instruction = match opcode {
            Opcode::Nop => Self::Nop,
            Opcode::Pop => Self::Pop,
            Opcode::Dup => Self::Dup,
            Opcode::Swap => Self::Swap,
            Opcode::PushInt => Self::PushInt(reader.read_i32()?),
            Opcode::PushFloat => Self::PushFloat(reader.read_f32()?),
            Opcode::PushString => Self::PushString(reader.read_u32()?),
            Opcode::PushKey => Self::PushKey(reader.read_u32()?),
            Opcode::BuildVector => Self::BuildVector,
            Opcode::BuildRotation => Self::BuildRotation,
            Opcode::BuildList => Self::BuildList(reader.read_u16()?),

            Opcode::LoadLocal => Self::LoadLocal(reader.read_u16()?),
            Opcode::StoreLocal => Self::StoreLocal(reader.read_u16()?),
            Opcode::LoadGlobal => Self::LoadGlobal(reader.read_u16()?),
            Opcode::StoreGlobal => Self::StoreGlobal(reader.read_u16()?),

            Opcode::Add => Self::Binary(ArithOp::Add, read_pair(&mut reader)?),
            Opcode::Sub => Self::Binary(ArithOp::Sub, read_pair(&mut reader)?),
            Opcode::Mul => Self::Binary(ArithOp::Mul, read_pair(&mut reader)?),
            Opcode::Div => Self::Binary(ArithOp::Div, read_pair(&mut reader)?),
            Opcode::Mod => Self::Binary(ArithOp::Mod, read_pair(&mut reader)?),
            Opcode::Neg => Self::Neg(reader.read_type()?),

            Opcode::Eq => Self::Compare(CompareOp::Eq, read_pair(&mut reader)?),
            Opcode::Neq => Self::Compare(CompareOp::Neq, read_pair(&mut reader)?),
            Opcode::Lt => Self::Compare(CompareOp::Lt, read_pair(&mut reader)?),
            Opcode::Gt => Self::Compare(CompareOp::Gt, read_pair(&mut reader)?),
            Opcode::Le => Self::Compare(CompareOp::Le, read_pair(&mut reader)?),
            Opcode::Ge => Self::Compare(CompareOp::Ge, read_pair(&mut reader)?),

            Opcode::BitAnd => Self::Int(IntOp::BitAnd),
            Opcode::BitOr => Self::Int(IntOp::BitOr),
            Opcode::BitXor => Self::Int(IntOp::BitXor),
            Opcode::BitNot => Self::Int(IntOp::BitNot),
            Opcode::Shl => Self::Int(IntOp::Shl),
            Opcode::Shr => Self::Int(IntOp::Shr),
            Opcode::BoolAnd => Self::Int(IntOp::BoolAnd),
            Opcode::BoolOr => Self::Int(IntOp::BoolOr),
            Opcode::BoolNot => Self::Int(IntOp::BoolNot),

            Opcode::Cast => Self::Cast(reader.read_type()?),

            Opcode::Jump => Self::Jump(reader.read_i32()?),
            Opcode::JumpIf => Self::JumpIf(reader.read_i32()?),
            Opcode::JumpIfNot => Self::JumpIfNot(reader.read_i32()?),
            Opcode::Call => Self::Call(reader.read_u16()?),
            Opcode::Return => Self::Return,
            Opcode::State => Self::State(reader.read_u16()?),
            Opcode::Halt => Self::Halt,

            Opcode::Print => Self::Print,
            Opcode::CallLib => Self::CallLib(reader.read_u16()?),
        };

        Ok((instruction, reader.position()))
    }

    /// The opcode this instruction encodes to
    pub fn opcode(&self) -> Opcode {
        match self {
            Self::Nop => Opcode::Nop,
            Self::Pop => Opcode::Pop,
            Self::Dup => Opcode::Dup,
            Self::Swap => Opcode::Swap,
            Self::PushInt(_) => Opcode::PushInt,
            Self::PushFloat(_) => Opcode::PushFloat,
            Self::PushString(_) => Opcode::PushString,
            Self::PushKey(_) => Opcode::PushKey,
            Self::BuildVector => Opcode::BuildVector,
            Self::BuildRotation => Opcode::BuildRotation,
            Self::BuildList(_) => Opcode::BuildList,
            Self::LoadLocal(_) => Opcode::LoadLocal,
            Self::StoreLocal(_) => Opcode::StoreLocal,
            Self::LoadGlobal(_) => Opcode::LoadGlobal,
            Self::StoreGlobal(_) => Opcode::StoreGlobal,
            Self::Binary(op, _) => match op {
                ArithOp::Add => Opcode::Add,
                ArithOp::Sub => Opcode::Sub,
                ArithOp::Mul => Opcode::Mul,
                ArithOp::Div => Opcode::Div,
                ArithOp::Mod => Opcode::Mod,
            },
            Self::Neg(_) => Opcode::Neg,
            Self::Compare(op, _) => match op {
                CompareOp::Eq => Opcode::Eq,
                CompareOp::Neq => Opcode::Neq,
                CompareOp::Lt => Opcode::Lt,
                CompareOp::Gt => Opcode::Gt,
                CompareOp::Le => Opcode::Le,
                CompareOp::Ge => Opcode::Ge,
            },
            Self::Int(op) => match op {
                IntOp::BitAnd => Opcode::BitAnd,
                IntOp::BitOr => Opcode::BitOr,
                IntOp::BitXor => Opcode::BitXor,
                IntOp::BitNot => Opcode::BitNot,
                IntOp::Shl => Opcode::Shl,
                IntOp::Shr => Opcode::Shr,
                IntOp::BoolAnd => Opcode::BoolAnd,
                IntOp::BoolOr => Opcode::BoolOr,
                IntOp::BoolNot => Opcode::BoolNot,
            },
            Self::Cast(_) => Opcode::Cast,
            Self::Jump(_) => Opcode::Jump,
            Self::JumpIf(_) => Opcode::JumpIf,
            Self::JumpIfNot(_) => Opcode::JumpIfNot,
            Self::Call(_) => Opcode::Call,
            Self::Return => Opcode::Return,
            Self::State(_) => Opcode::State,
            Self::Halt => Opcode::Halt,
            Self::Print => Opcode::Print,
            Self::CallLib(_) => Opcode::CallLib,
        }
    }

    /// Encoded length in bytes
    pub fn encoded_len(&self) -> usize {
        1 + self.opcode().operand_size()
    }

    /// Absolute jump target, given the offset of the following instruction
    pub fn jump_target(&self, next: usize) -> Option<i64> {
        match self {
            Self::Jump(off) | Self::JumpIf(off) | Self::JumpIfNot(off) => {
                Some(next as i64 + *off as i64)
            }
            _ => None,
        }
    }
}

fn read_pair(reader: &mut BytecodeReader<'_>) -> Result<OperandTypes, DecodeError> {
    let at = reader.position();
    let byte = reader.read_u8()?;
    OperandTypes::from_u8(byte).ok_or(DecodeError::InvalidType(byte, at))
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.opcode().name();
        match self {
            Self::PushInt(v) => write!(f, "{name} {v}"),
            Self::PushFloat(v) => write!(f, "{name} {v:?}"),
            Self::PushString(i) | Self::PushKey(i) => write!(f, "{name} #{i}"),
            Self::BuildList(n) => write!(f, "{name} {n}"),
            Self::LoadLocal(i) | Self::StoreLocal(i) => write!(f, "{name} l{i}"),
            Self::LoadGlobal(i) | Self::StoreGlobal(i) => write!(f, "{name} g{i}"),
            Self::Binary(_, types) | Self::Compare(_, types) => write!(f, "{name} {types}"),
            Self::Neg(ty) | Self::Cast(ty) => write!(f, "{name} {ty}"),
            Self::Jump(off) | Self::JumpIf(off) | Self::JumpIfNot(off) => {
                write!(f, "{name} {off:+}")
            }
            Self::Call(i) => write!(f, "{name} fn{i}"),
            Self::State(i) => write!(f, "{name} s{i}"),
            Self::CallLib(i) => write!(f, "{name} lib{i}"),
            _ => f.write_str(name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::BytecodeWriter;

    #[test]
    fn test_decode_sequence() {
        let program = [
            Instruction::PushInt(7),
            Instruction::PushFloat(2.5),
            Instruction::Binary(
                ArithOp::Add,
                OperandTypes::new(ValueType::Integer, ValueType::Float),
            ),
            Instruction::Cast(ValueType::String),
            Instruction::CallLib(3),
            Instruction::Halt,
        ];

        let mut writer = BytecodeWriter::new();
        for instr in &program {
            writer.emit(instr);
        }
        let code = writer.into_bytes();

        let mut offset = 0;
        for expected in &program {
            let (instr, next) = Instruction::decode(&code, offset).unwrap();
            assert_eq!(&instr, expected);
            assert_eq!(next - offset, expected.encoded_len());
            offset = next;
        }
        assert_eq!(offset, code.len());
    }

    #[test]
    fn test_decode_invalid_opcode() {
        assert_eq!(
            Instruction::decode(&[0x00, 0xEE], 1),
            Err(DecodeError::InvalidOpcode(0xEE, 1))
        );
    }

    #[test]
    fn test_decode_truncated_operand() {
        let code = [Opcode::PushInt.to_u8(), 0x01, 0x02];
        assert_eq!(
            Instruction::decode(&code, 0),
            Err(DecodeError::UnexpectedEnd(1))
        );
    }

    #[test]
    fn test_decode_bad_operand_types() {
        let code = [Opcode::Add.to_u8(), 0x1F];
        assert_eq!(
            Instruction::decode(&code, 0),
            Err(DecodeError::InvalidType(0x1F, 1))
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(Instruction::PushInt(-3).to_string(), "PUSHI -3");
        assert_eq!(Instruction::Jump(-6).to_string(), "JUMP -6");
        assert_eq!(
            Instruction::Compare(CompareOp::Lt, OperandTypes::same(ValueType::Float)).to_string(),
            "LT float,float"
        );
    }

    #[test]
    fn test_jump_target() {
        assert_eq!(Instruction::Jump(-6).jump_target(6), Some(0));
        assert_eq!(Instruction::Return.jump_target(6), None);
    }
}
