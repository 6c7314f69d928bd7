//! Stack and call frame management
//!
//! This module provides the operand stack and call frame infrastructure for
//! handler and function execution.
//!
//! # Architecture
//!
//! The stack holds typed [`Slot`]s. Scalars are stored inline; strings, keys
//! and lists are references into the engine's [`Heap`](crate::gc::Heap).
//! Each frame owns a contiguous block of locals (parameters first, then
//! extra locals) followed by its operands.
//!
//! # Memory Layout
//!
//! ```text
//! ┌─────────────────────────────────────┐
//! │ Operands (top)                      │  ← sp (stack pointer)
//! │   value₁                            │
//! │   value₀                            │
//! ├─────────────────────────────────────┤
//! │ Call Frame N (current)              │
//! │   local₁                            │
//! │   param₀                            │  ← bp (base pointer)
//! ├─────────────────────────────────────┤
//! │ Call Frame N-1                      │
//! │   ...                               │
//! └─────────────────────────────────────┘
//! ```
//!
//! Every access is bounds checked. A pop that would reach into the current
//! frame's locals is a [`VmError::StackUnderflow`], so corrupt bytecode is
//! reported as a fault rather than silently reading a caller's data.

use crate::gc::HeapRef;
use crate::math::{Quaternion, Vector};
use crate::{VmError, VmResult};
use lso_bytecode::ValueType;

/// Default maximum stack size (in slots)
pub const DEFAULT_MAX_STACK_SIZE: usize = 1024;

/// Default maximum call depth
pub const DEFAULT_MAX_CALL_DEPTH: usize = 128;

/// A stack or global slot
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Slot {
    /// Inline integer
    Integer(i32),
    /// Inline float
    Float(f32),
    /// Inline vector
    Vector(Vector),
    /// Inline rotation
    Rotation(Quaternion),
    /// String block in the heap
    String(HeapRef),
    /// Key block in the heap
    Key(HeapRef),
    /// List block in the heap
    List(HeapRef),
}

impl Slot {
    /// Runtime type tag
    pub fn value_type(&self) -> ValueType {
        match self {
            Self::Integer(_) => ValueType::Integer,
            Self::Float(_) => ValueType::Float,
            Self::Vector(_) => ValueType::Vector,
            Self::Rotation(_) => ValueType::Rotation,
            Self::String(_) => ValueType::String,
            Self::Key(_) => ValueType::Key,
            Self::List(_) => ValueType::List,
        }
    }

    /// Heap block referenced by this slot, if any
    #[inline]
    pub fn heap_ref(&self) -> Option<HeapRef> {
        match self {
            Self::String(r) | Self::Key(r) | Self::List(r) => Some(*r),
            _ => None,
        }
    }

    /// Mutable access to the heap reference, used by compaction
    #[inline]
    pub fn heap_ref_mut(&mut self) -> Option<&mut HeapRef> {
        match self {
            Self::String(r) | Self::Key(r) | Self::List(r) => Some(r),
            _ => None,
        }
    }

    /// Fail with `TypeMismatch` unless the slot has the given type
    #[inline]
    pub fn expect_type(&self, expected: ValueType) -> VmResult<()> {
        let found = self.value_type();
        if found == expected {
            Ok(())
        } else {
            Err(VmError::type_mismatch(expected, found))
        }
    }
}

/// What a frame is executing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// Event handler at the bottom of the stack
    Handler,
    /// User function, by index
    Function(u16),
}

/// Call frame for handler or function invocation
#[derive(Debug, Clone)]
pub struct CallFrame {
    /// What this frame executes
    pub kind: FrameKind,

    /// Return instruction pointer (unused for handlers)
    pub return_ip: usize,

    /// Base pointer (first parameter slot)
    pub base_pointer: usize,

    /// Number of parameters plus extra locals
    pub local_count: usize,

    /// Declared return type
    pub return_type: ValueType,
}

impl CallFrame {
    /// Index one past the last local
    #[inline]
    pub fn operands_start(&self) -> usize {
        self.base_pointer + self.local_count
    }
}

/// Operand and call frame stack for the VM
pub struct Stack {
    /// Stack slots (locals + operands)
    slots: Vec<Slot>,

    /// Call frames
    frames: Vec<CallFrame>,

    /// Maximum stack size (in slots)
    max_size: usize,

    /// Maximum number of frames
    max_depth: usize,
}

impl Stack {
    /// Create a new stack with default limits
    pub fn new() -> Self {
        Self::with_limits(DEFAULT_MAX_STACK_SIZE, DEFAULT_MAX_CALL_DEPTH)
    }

    /// Create a stack with specific limits
    pub fn with_limits(max_size: usize, max_depth: usize) -> Self {
        Self {
            slots: Vec::with_capacity(max_size.min(256)),
            frames: Vec::with_capacity(max_depth.min(16)),
            max_size,
            max_depth,
        }
    }

    // ========================================================================
    // Operand Stack Operations
    // ========================================================================

    /// Push a slot onto the stack
    ///
    /// # Errors
    ///
    /// Returns `VmError::StackOverflow` if the stack is full.
    #[inline]
    pub fn push(&mut self, slot: Slot) -> VmResult<()> {
        if self.slots.len() >= self.max_size {
            return Err(VmError::StackOverflow);
        }
        self.slots.push(slot);
        Ok(())
    }

    /// Pop an operand
    ///
    /// # Errors
    ///
    /// Returns `VmError::StackUnderflow` if the current frame has no operands.
    #[inline]
    pub fn pop(&mut self) -> VmResult<Slot> {
        if self.slots.len() <= self.floor() {
            return Err(VmError::StackUnderflow);
        }
        self.slots.pop().ok_or(VmError::StackUnderflow)
    }

    /// Pop `n` operands, returned bottom-first
    ///
    /// The last pushed operand ends up last, so arguments pushed
    /// first-to-last come back in declaration order.
    pub fn pop_n(&mut self, n: usize) -> VmResult<Vec<Slot>> {
        if self.slots.len() < self.floor() + n {
            return Err(VmError::StackUnderflow);
        }
        let at = self.slots.len() - n;
        Ok(self.slots.split_off(at))
    }

    /// Peek at the operand `n` slots from the top (0 = top)
    #[inline]
    pub fn peek(&self, n: usize) -> VmResult<Slot> {
        if self.slots.len() <= self.floor() + n {
            return Err(VmError::StackUnderflow);
        }
        Ok(self.slots[self.slots.len() - 1 - n])
    }

    /// Number of operands above the current frame's locals
    #[inline]
    pub fn operand_count(&self) -> usize {
        self.slots.len() - self.floor()
    }

    /// Lowest index operands may occupy
    #[inline]
    fn floor(&self) -> usize {
        self.frames.last().map_or(0, CallFrame::operands_start)
    }

    /// Current stack depth (the SP register)
    #[inline]
    pub fn depth(&self) -> usize {
        self.slots.len()
    }

    /// Check if stack is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Get maximum stack size
    #[inline]
    pub fn max_size(&self) -> usize {
        self.max_size
    }

    // ========================================================================
    // Call Frame Management
    // ========================================================================

    /// Push a new call frame
    ///
    /// The top `param_count` operands become the frame's parameters and
    /// `extra_locals` are pushed after them.
    ///
    /// # Errors
    ///
    /// Returns `VmError::StackOverflow` if the call depth or stack size
    /// limit is exceeded, and `VmError::StackUnderflow` if fewer than
    /// `param_count` operands are available.
    pub fn push_frame(
        &mut self,
        kind: FrameKind,
        return_ip: usize,
        param_count: usize,
        extra_locals: &[Slot],
        return_type: ValueType,
    ) -> VmResult<()> {
        if self.frames.len() >= self.max_depth {
            return Err(VmError::StackOverflow);
        }
        if self.operand_count() < param_count {
            return Err(VmError::StackUnderflow);
        }
        if self.slots.len() + extra_locals.len() > self.max_size {
            return Err(VmError::StackOverflow);
        }

        let base_pointer = self.slots.len() - param_count;
        self.slots.extend_from_slice(extra_locals);
        self.frames.push(CallFrame {
            kind,
            return_ip,
            base_pointer,
            local_count: param_count + extra_locals.len(),
            return_type,
        });
        Ok(())
    }

    /// Pop the current call frame, discarding its locals and operands
    ///
    /// # Errors
    ///
    /// Returns `VmError::StackUnderflow` if no frame is active.
    pub fn pop_frame(&mut self) -> VmResult<CallFrame> {
        let frame = self.frames.pop().ok_or(VmError::StackUnderflow)?;
        self.slots.truncate(frame.base_pointer);
        Ok(frame)
    }

    /// Get the current call frame
    #[inline]
    pub fn current_frame(&self) -> Option<&CallFrame> {
        self.frames.last()
    }

    /// Get the number of active frames
    #[inline]
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// Base pointer of the current frame (the BP register)
    #[inline]
    pub fn base_pointer(&self) -> usize {
        self.frames.last().map_or(0, |f| f.base_pointer)
    }

    /// Drop every frame and operand
    pub fn clear(&mut self) {
        self.slots.clear();
        self.frames.clear();
    }

    // ========================================================================
    // Local Variable Access
    // ========================================================================

    fn local_index(&self, index: usize) -> VmResult<usize> {
        let frame = self
            .current_frame()
            .ok_or_else(|| VmError::BoundsViolation("no active call frame".to_string()))?;

        if index >= frame.local_count {
            return Err(VmError::BoundsViolation(format!(
                "local index {} out of bounds (frame has {})",
                index, frame.local_count
            )));
        }
        Ok(frame.base_pointer + index)
    }

    /// Load a local variable by index
    #[inline]
    pub fn load_local(&self, index: usize) -> VmResult<Slot> {
        let at = self.local_index(index)?;
        Ok(self.slots[at])
    }

    /// Store to a local variable
    ///
    /// The stored slot must keep the local's declared type.
    #[inline]
    pub fn store_local(&mut self, index: usize, slot: Slot) -> VmResult<()> {
        let at = self.local_index(index)?;
        slot.expect_type(self.slots[at].value_type())?;
        self.slots[at] = slot;
        Ok(())
    }

    // ========================================================================
    // GC Root Integration
    // ========================================================================

    /// All live slots
    pub fn as_slice(&self) -> &[Slot] {
        &self.slots
    }

    /// All live slots, mutably, so compaction can relocate references
    pub fn slots_mut(&mut self) -> &mut [Slot] {
        &mut self.slots
    }

    /// Iterate over all call frames, outermost first
    pub fn frames(&self) -> impl Iterator<Item = &CallFrame> + '_ {
        self.frames.iter()
    }
}

impl Default for Stack {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_pop() {
        let mut stack = Stack::new();
        stack.push(Slot::Integer(1)).unwrap();
        stack.push(Slot::Float(2.0)).unwrap();
        assert_eq!(stack.depth(), 2);
        assert_eq!(stack.pop().unwrap(), Slot::Float(2.0));
        assert_eq!(stack.pop().unwrap(), Slot::Integer(1));
        assert_eq!(stack.pop(), Err(VmError::StackUnderflow));
    }

    #[test]
    fn test_overflow() {
        let mut stack = Stack::with_limits(2, 4);
        stack.push(Slot::Integer(1)).unwrap();
        stack.push(Slot::Integer(2)).unwrap();
        assert_eq!(stack.push(Slot::Integer(3)), Err(VmError::StackOverflow));
    }

    #[test]
    fn test_pop_n_preserves_order() {
        let mut stack = Stack::new();
        for i in 0..4 {
            stack.push(Slot::Integer(i)).unwrap();
        }
        let args = stack.pop_n(3).unwrap();
        assert_eq!(args, vec![Slot::Integer(1), Slot::Integer(2), Slot::Integer(3)]);
        assert_eq!(stack.depth(), 1);
        assert_eq!(stack.pop_n(2), Err(VmError::StackUnderflow));
    }

    #[test]
    fn test_frame_locals() {
        let mut stack = Stack::new();
        stack.push(Slot::Integer(7)).unwrap();
        stack
            .push_frame(FrameKind::Function(0), 42, 1, &[Slot::Float(0.0)], ValueType::Void)
            .unwrap();
        assert_eq!(stack.base_pointer(), 0);
        assert_eq!(stack.load_local(0).unwrap(), Slot::Integer(7));
        assert_eq!(stack.load_local(1).unwrap(), Slot::Float(0.0));
        assert!(matches!(stack.load_local(2), Err(VmError::BoundsViolation(_))));

        stack.store_local(1, Slot::Float(3.5)).unwrap();
        assert!(matches!(
            stack.store_local(1, Slot::Integer(1)),
            Err(VmError::TypeMismatch { .. })
        ));

        // Locals are not operands
        assert_eq!(stack.pop(), Err(VmError::StackUnderflow));

        let frame = stack.pop_frame().unwrap();
        assert_eq!(frame.return_ip, 42);
        assert!(stack.is_empty());
    }

    #[test]
    fn test_call_depth_limit() {
        let mut stack = Stack::with_limits(64, 2);
        stack.push_frame(FrameKind::Handler, 0, 0, &[], ValueType::Void).unwrap();
        stack.push_frame(FrameKind::Function(0), 0, 0, &[], ValueType::Void).unwrap();
        assert_eq!(
            stack.push_frame(FrameKind::Function(0), 0, 0, &[], ValueType::Void),
            Err(VmError::StackOverflow)
        );
    }
}
