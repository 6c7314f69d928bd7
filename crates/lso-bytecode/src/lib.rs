//! LSO Bytecode Definitions
//!
//! This crate provides the instruction set, the image container format and
//! the structural verifier for compiled LSL scripts. It has no notion of
//! execution; see `lso-core` for the engine.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod encoder;
pub mod image;
pub mod instruction;
pub mod opcode;
pub mod types;
pub mod verify;

pub use encoder::{BytecodeReader, BytecodeWriter, DecodeError};
pub use image::{
    Constant, EventHandler, FunctionDef, GlobalDef, ImageError, LibraryImport, ScriptImage,
    StateDef, DEFAULT_HEAP_SIZE, DEFAULT_STACK_SIZE, MAGIC, STATE_ENTRY, STATE_EXIT, VERSION,
};
pub use instruction::{ArithOp, CompareOp, Instruction, IntOp};
pub use opcode::Opcode;
pub use types::{OperandTypes, ValueType};
pub use verify::{verify_image, VerifyError};
