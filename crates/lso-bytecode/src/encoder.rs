//! Bytecode encoding and decoding utilities
//!
//! This module provides tools for encoding and decoding LSO bytecode instructions
//! and the primitive fields of the image format.

use crate::instruction::Instruction;
use crate::opcode::Opcode;
use crate::types::ValueType;
use thiserror::Error;

/// Errors that can occur during bytecode decoding
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Unexpected end of bytecode stream
    #[error("Unexpected end of bytecode at offset {0}")]
    UnexpectedEnd(usize),

    /// Invalid UTF-8 string
    #[error("Invalid UTF-8 string at offset {0}")]
    InvalidUtf8(usize),

    /// Invalid opcode
    #[error("Invalid opcode {0:#04x} at offset {1}")]
    InvalidOpcode(u8, usize),

    /// Invalid type tag
    #[error("Invalid type tag {0:#04x} at offset {1}")]
    InvalidType(u8, usize),
}

/// Bytecode writer for encoding instructions
///
/// Provides methods for emitting opcodes and their operands into a binary buffer.
pub struct BytecodeWriter {
    /// Internal buffer containing the bytecode
    pub(crate) buffer: Vec<u8>,
}

impl BytecodeWriter {
    /// Create a new bytecode writer
    pub fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    /// Create a new bytecode writer with capacity
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity),
        }
    }

    /// Get the current bytecode buffer
    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    /// Consume the writer and return the bytecode buffer
    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }

    /// Get the current offset (length of bytecode)
    pub fn offset(&self) -> usize {
        self.buffer.len()
    }

    // ===== Basic Emission =====

    /// Emit a raw byte
    pub fn emit_u8(&mut self, value: u8) {
        self.buffer.push(value);
    }

    /// Emit a 16-bit unsigned integer (little-endian)
    pub fn emit_u16(&mut self, value: u16) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    /// Emit a 32-bit unsigned integer (little-endian)
    pub fn emit_u32(&mut self, value: u32) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    /// Emit a 32-bit signed integer (little-endian)
    pub fn emit_i32(&mut self, value: i32) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    /// Emit a 32-bit float (little-endian)
    pub fn emit_f32(&mut self, value: f32) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    /// Emit a length-prefixed UTF-8 string
    pub fn emit_string(&mut self, value: &str) {
        self.emit_u32(value.len() as u32);
        self.buffer.extend_from_slice(value.as_bytes());
    }

    /// Emit a type tag
    pub fn emit_type(&mut self, ty: ValueType) {
        self.emit_u8(ty.to_u8());
    }

    /// Emit a count-prefixed list of type tags
    pub fn emit_types(&mut self, types: &[ValueType]) {
        self.emit_u16(types.len() as u16);
        for ty in types {
            self.emit_type(*ty);
        }
    }

    /// Emit raw bytes
    pub fn emit_bytes(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    // ===== Instructions =====

    /// Emit an opcode
    pub fn emit_opcode(&mut self, opcode: Opcode) {
        self.emit_u8(opcode.to_u8());
    }

    /// Emit a fully decoded instruction with its operands
    pub fn emit(&mut self, instruction: &Instruction) {
        self.emit_opcode(instruction.opcode());
        match *instruction {
            Instruction::PushInt(v) => self.emit_i32(v),
            Instruction::PushFloat(v) => self.emit_f32(v),
            Instruction::PushString(i) | Instruction::PushKey(i) => self.emit_u32(i),
            Instruction::BuildList(n) => self.emit_u16(n),
            Instruction::LoadLocal(i)
            | Instruction::StoreLocal(i)
            | Instruction::LoadGlobal(i)
            | Instruction::StoreGlobal(i)
            | Instruction::Call(i)
            | Instruction::State(i)
            | Instruction::CallLib(i) => self.emit_u16(i),
            Instruction::Binary(_, types) | Instruction::Compare(_, types) => {
                self.emit_u8(types.to_u8())
            }
            Instruction::Neg(ty) | Instruction::Cast(ty) => self.emit_type(ty),
            Instruction::Jump(off) | Instruction::JumpIf(off) | Instruction::JumpIfNot(off) => {
                self.emit_i32(off)
            }
            _ => {}
        }
    }

    /// Emit a jump with a placeholder offset
    ///
    /// Returns the position of the offset operand for [`patch_jump_here`](Self::patch_jump_here)
    /// or [`patch_jump_to`](Self::patch_jump_to).
    pub fn emit_jump_placeholder(&mut self, opcode: Opcode) -> usize {
        debug_assert!(opcode.is_jump());
        self.emit_opcode(opcode);
        self.reserve_i32()
    }

    /// Point a placeholder jump at the current offset
    pub fn patch_jump_here(&mut self, operand_at: usize) {
        let target = self.offset();
        self.patch_jump_to(operand_at, target);
    }

    /// Point a placeholder jump at an absolute code offset
    pub fn patch_jump_to(&mut self, operand_at: usize, target: usize) {
        let next = operand_at + 4;
        self.patch_i32(operand_at, target as i32 - next as i32);
    }

    /// Emit a jump back to an already known offset
    pub fn emit_jump_back(&mut self, opcode: Opcode, target: usize) {
        let at = self.emit_jump_placeholder(opcode);
        self.patch_jump_to(at, target);
    }

    // ===== Patching (for forward jumps) =====

    /// Patch a previously emitted i32 value at the given offset
    pub fn patch_i32(&mut self, offset: usize, value: i32) {
        let bytes = value.to_le_bytes();
        self.buffer[offset..offset + 4].copy_from_slice(&bytes);
    }

    /// Patch a previously emitted u32 value at the given offset
    pub fn patch_u32(&mut self, offset: usize, value: u32) {
        let bytes = value.to_le_bytes();
        self.buffer[offset..offset + 4].copy_from_slice(&bytes);
    }

    /// Reserve space for an i32 value (returns offset for later patching)
    pub fn reserve_i32(&mut self) -> usize {
        let offset = self.offset();
        self.emit_i32(0);
        offset
    }
}

impl Default for BytecodeWriter {
    fn default() -> Self {
        Self::new()
    }
}

/// Bytecode reader for decoding instructions
///
/// Provides methods for reading opcodes and their operands from a binary buffer.
pub struct BytecodeReader<'a> {
    buffer: &'a [u8],
    position: usize,
}

impl<'a> BytecodeReader<'a> {
    /// Create a new bytecode reader
    pub fn new(buffer: &'a [u8]) -> Self {
        Self {
            buffer,
            position: 0,
        }
    }

    /// Create a reader positioned at `position`
    pub fn at(buffer: &'a [u8], position: usize) -> Self {
        Self { buffer, position }
    }

    /// Get the current position in the buffer
    pub fn position(&self) -> usize {
        self.position
    }

    /// Get the remaining bytes in the buffer
    pub fn remaining(&self) -> usize {
        self.buffer.len().saturating_sub(self.position)
    }

    /// Check if there are more bytes to read
    pub fn has_more(&self) -> bool {
        self.position < self.buffer.len()
    }

    /// Seek to a specific position
    pub fn seek(&mut self, position: usize) {
        self.position = position;
    }

    // ===== Basic Reading =====

    fn take<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let end = self
            .position
            .checked_add(N)
            .filter(|end| *end <= self.buffer.len())
            .ok_or(DecodeError::UnexpectedEnd(self.position))?;
        let mut bytes = [0u8; N];
        bytes.copy_from_slice(&self.buffer[self.position..end]);
        self.position = end;
        Ok(bytes)
    }

    /// Read a single byte
    pub fn read_u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.take::<1>()?[0])
    }

    /// Read a 16-bit unsigned integer (little-endian)
    pub fn read_u16(&mut self) -> Result<u16, DecodeError> {
        Ok(u16::from_le_bytes(self.take()?))
    }

    /// Read a 32-bit unsigned integer (little-endian)
    pub fn read_u32(&mut self) -> Result<u32, DecodeError> {
        Ok(u32::from_le_bytes(self.take()?))
    }

    /// Read a 32-bit signed integer (little-endian)
    pub fn read_i32(&mut self) -> Result<i32, DecodeError> {
        Ok(i32::from_le_bytes(self.take()?))
    }

    /// Read a 32-bit float (little-endian)
    pub fn read_f32(&mut self) -> Result<f32, DecodeError> {
        Ok(f32::from_le_bytes(self.take()?))
    }

    /// Read raw bytes
    pub fn read_bytes(&mut self, len: usize) -> Result<Vec<u8>, DecodeError> {
        let end = self
            .position
            .checked_add(len)
            .filter(|end| *end <= self.buffer.len())
            .ok_or(DecodeError::UnexpectedEnd(self.position))?;
        let bytes = self.buffer[self.position..end].to_vec();
        self.position = end;
        Ok(bytes)
    }

    /// Read a length-prefixed UTF-8 string
    pub fn read_string(&mut self) -> Result<String, DecodeError> {
        let start = self.position;
        let len = self.read_u32()? as usize;
        let bytes = self.read_bytes(len)?;
        String::from_utf8(bytes).map_err(|_| DecodeError::InvalidUtf8(start))
    }

    /// Read a type tag
    pub fn read_type(&mut self) -> Result<ValueType, DecodeError> {
        let at = self.position;
        let byte = self.read_u8()?;
        ValueType::from_u8(byte).ok_or(DecodeError::InvalidType(byte, at))
    }

    /// Read a count-prefixed list of type tags
    pub fn read_types(&mut self) -> Result<Vec<ValueType>, DecodeError> {
        let count = self.read_u16()? as usize;
        (0..count).map(|_| self.read_type()).collect()
    }

    /// Read an opcode
    pub fn read_opcode(&mut self) -> Result<Opcode, DecodeError> {
        let at = self.position;
        let byte = self.read_u8()?;
        Opcode::from_u8(byte).ok_or(DecodeError::InvalidOpcode(byte, at))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primitive_roundtrip() {
        let mut writer = BytecodeWriter::new();
        writer.emit_u8(7);
        writer.emit_u16(0xBEEF);
        writer.emit_i32(-42);
        writer.emit_f32(1.5);
        writer.emit_string("héllo");

        let bytes = writer.into_bytes();
        let mut reader = BytecodeReader::new(&bytes);
        assert_eq!(reader.read_u8().unwrap(), 7);
        assert_eq!(reader.read_u16().unwrap(), 0xBEEF);
        assert_eq!(reader.read_i32().unwrap(), -42);
        assert_eq!(reader.read_f32().unwrap(), 1.5);
        assert_eq!(reader.read_string().unwrap(), "héllo");
        assert!(!reader.has_more());
    }

    #[test]
    fn test_unexpected_end() {
        let bytes = [1u8, 2];
        let mut reader = BytecodeReader::new(&bytes);
        assert_eq!(reader.read_u32(), Err(DecodeError::UnexpectedEnd(0)));
        // A failed read leaves the position untouched
        assert_eq!(reader.position(), 0);
    }

    #[test]
    fn test_invalid_utf8() {
        let mut writer = BytecodeWriter::new();
        writer.emit_u32(2);
        writer.emit_bytes(&[0xC3, 0x28]);
        let bytes = writer.into_bytes();
        assert_eq!(
            BytecodeReader::new(&bytes).read_string(),
            Err(DecodeError::InvalidUtf8(0))
        );
    }

    #[test]
    fn test_forward_jump_patching() {
        let mut writer = BytecodeWriter::new();
        let at = writer.emit_jump_placeholder(Opcode::Jump);
        writer.emit_opcode(Opcode::Nop);
        writer.emit_opcode(Opcode::Nop);
        writer.patch_jump_here(at);

        let bytes = writer.into_bytes();
        let mut reader = BytecodeReader::at(&bytes, 1);
        assert_eq!(reader.read_i32().unwrap(), 2);
    }

    #[test]
    fn test_backward_jump() {
        let mut writer = BytecodeWriter::new();
        writer.emit_opcode(Opcode::Nop);
        writer.emit_jump_back(Opcode::Jump, 0);
        let bytes = writer.into_bytes();
        let mut reader = BytecodeReader::at(&bytes, 2);
        // next instruction at 6, target 0
        assert_eq!(reader.read_i32().unwrap(), -6);
    }
}
