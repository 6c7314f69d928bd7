//! LSO VM Core Runtime
//!
//! This crate provides the execution side of the LSO toolchain:
//! - Typed values with LSL conversion rules and vector/rotation math
//! - Operand stack, compacting heap and register file
//! - Library dispatch table and the builtin `ll*` functions
//! - Execution engine driven in bounded quanta
//! - Round-robin scheduler for hosting many scripts

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod convert;
pub mod gc;
pub mod library;
pub mod math;
pub mod registers;
pub mod scheduler;
pub mod stack;
pub mod value;
pub mod vm;

pub use gc::{GcStats, Heap, HeapObject, HeapRef};
pub use library::{
    CallContext, HostServices, LibraryError, LibraryTable, NativeFunction, Signature,
};
pub use math::{Quaternion, Vector};
pub use registers::RegisterFile;
pub use scheduler::{RoundReport, SchedulerStats, ScriptId, ScriptScheduler, ScriptTask};
pub use stack::{CallFrame, Slot, Stack};
pub use value::Value;
pub use vm::{
    EngineOptions, EngineStats, Event, ExecutionState, QuantumReport, ResourceLimits,
    ScriptEngine, DEFAULT_MAX_PENDING_EVENTS, DEFAULT_TIME_SLICE,
};

use lso_bytecode::ValueType;
use std::fmt;

/// VM execution errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum VmError {
    /// Byte at the instruction pointer is not an opcode, or operands are truncated
    #[error("Illegal opcode 0x{0:02X}")]
    IllegalOpcode(u8),

    /// Stack overflow
    #[error("Stack overflow")]
    StackOverflow,

    /// Stack underflow
    #[error("Stack underflow")]
    StackUnderflow,

    /// Heap budget exhausted even after compaction
    #[error("Heap exhausted: {requested} bytes requested, {available} available")]
    HeapExhausted {
        /// Size of the failed allocation
        requested: usize,
        /// Free bytes after compaction
        available: usize,
    },

    /// Library function was never registered
    #[error("Unknown library function: {0}")]
    UnknownFunction(String),

    /// Argument count disagrees with a declaration
    #[error("Arity mismatch calling {name}: expected {expected}, got {actual}")]
    ArityMismatch {
        /// Callee name
        name: String,
        /// Declared parameter count
        expected: usize,
        /// Supplied argument count
        actual: usize,
    },

    /// Operand tag disagrees with the expected type
    #[error("Type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        /// Type the instruction or callee declared
        expected: ValueType,
        /// Runtime type found
        found: ValueType,
    },

    /// Operator is not defined for an operand type pair
    #[error("Unsupported operand types for {op}: {lhs}, {rhs}")]
    InvalidOperands {
        /// Operator mnemonic
        op: &'static str,
        /// Left operand type
        lhs: ValueType,
        /// Right operand type
        rhs: ValueType,
    },

    /// Image format version is not supported
    #[error("Unsupported image version: {0}")]
    UnsupportedVersion(u32),

    /// Index outside a table, frame or code region
    #[error("Bounds violation: {0}")]
    BoundsViolation(String),

    /// Division or modulo by zero
    #[error("Math error: {0}")]
    MathError(&'static str),

    /// A builtin rejected its arguments
    #[error("Library call {name} failed: {message}")]
    LibraryFailure {
        /// Callee name
        name: String,
        /// Diagnostic from the builtin
        message: String,
    },
}

impl VmError {
    /// Build a type mismatch error
    pub fn type_mismatch(expected: ValueType, found: ValueType) -> Self {
        Self::TypeMismatch { expected, found }
    }

    /// Discriminant of this error
    pub fn kind(&self) -> FaultKind {
        match self {
            Self::IllegalOpcode(_) => FaultKind::IllegalOpcode,
            Self::StackOverflow => FaultKind::StackOverflow,
            Self::StackUnderflow => FaultKind::StackUnderflow,
            Self::HeapExhausted { .. } => FaultKind::HeapExhausted,
            Self::UnknownFunction(_) => FaultKind::UnknownFunction,
            Self::ArityMismatch { .. } => FaultKind::ArityMismatch,
            Self::TypeMismatch { .. } | Self::InvalidOperands { .. } => FaultKind::TypeMismatch,
            Self::UnsupportedVersion(_) => FaultKind::UnsupportedVersion,
            Self::BoundsViolation(_) => FaultKind::BoundsViolation,
            Self::MathError(_) => FaultKind::MathError,
            Self::LibraryFailure { .. } => FaultKind::LibraryFailure,
        }
    }
}

/// VM execution result
pub type VmResult<T> = Result<T, VmError>;

/// Fault category, without diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultKind {
    /// See [`VmError::IllegalOpcode`]
    IllegalOpcode,
    /// See [`VmError::StackOverflow`]
    StackOverflow,
    /// See [`VmError::StackUnderflow`]
    StackUnderflow,
    /// See [`VmError::HeapExhausted`]
    HeapExhausted,
    /// See [`VmError::UnknownFunction`]
    UnknownFunction,
    /// See [`VmError::ArityMismatch`]
    ArityMismatch,
    /// See [`VmError::TypeMismatch`]
    TypeMismatch,
    /// See [`VmError::UnsupportedVersion`]
    UnsupportedVersion,
    /// See [`VmError::BoundsViolation`]
    BoundsViolation,
    /// See [`VmError::MathError`]
    MathError,
    /// See [`VmError::LibraryFailure`]
    LibraryFailure,
}

impl FaultKind {
    /// Stable name used in diagnostics
    pub fn name(self) -> &'static str {
        match self {
            Self::IllegalOpcode => "IllegalOpcode",
            Self::StackOverflow => "StackOverflow",
            Self::StackUnderflow => "StackUnderflow",
            Self::HeapExhausted => "HeapExhausted",
            Self::UnknownFunction => "UnknownFunction",
            Self::ArityMismatch => "ArityMismatch",
            Self::TypeMismatch => "TypeMismatch",
            Self::UnsupportedVersion => "UnsupportedVersion",
            Self::BoundsViolation => "BoundsViolation",
            Self::MathError => "MathError",
            Self::LibraryFailure => "LibraryFailure",
        }
    }
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A fault recorded in the execution state
#[derive(Debug, Clone, PartialEq)]
pub struct Fault {
    /// What went wrong
    pub error: VmError,
    /// Offset of the faulting instruction
    pub ip: usize,
}

impl Fault {
    /// Fault category
    pub fn kind(&self) -> FaultKind {
        self.error.kind()
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at ip 0x{:X}: {}", self.kind(), self.ip, self.error)
    }
}
