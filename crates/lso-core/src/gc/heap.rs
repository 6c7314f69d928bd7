//! Script heap
//!
//! The heap is an arena of immutable blocks with a fixed byte budget. Each
//! allocation appends a block, advancing the HR register (block cursor) and
//! the HP register (bytes in use). Blocks are never mutated: an LSL
//! assignment copies the reference, and every "modification" allocates a
//! fresh block, which gives value semantics without copying on every load.

use super::collector::GcStats;
use crate::value::{Value, BLOCK_HEADER_BYTES};
use crate::{VmError, VmResult};
use std::fmt;

/// Reference to a heap block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HeapRef(u32);

impl HeapRef {
    /// Create a reference from a block index
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    /// Block index
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for HeapRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.0)
    }
}

/// Contents of a heap block
#[derive(Debug, Clone, PartialEq)]
pub enum HeapObject {
    /// String or key text
    Text(String),
    /// List elements
    List(Vec<Value>),
}

impl HeapObject {
    /// Bytes charged against the heap budget
    pub fn size(&self) -> usize {
        match self {
            Self::Text(s) => BLOCK_HEADER_BYTES + s.len(),
            Self::List(items) => {
                BLOCK_HEADER_BYTES + items.iter().map(Value::heap_size).sum::<usize>()
            }
        }
    }
}

#[derive(Debug)]
pub(super) struct Block {
    pub(super) object: HeapObject,
    pub(super) size: usize,
    pub(super) marked: bool,
}

/// Fixed-budget arena for strings, keys and lists
#[derive(Debug)]
pub struct Heap {
    /// Live blocks, in allocation order
    pub(super) blocks: Vec<Block>,

    /// Bytes in use
    pub(super) used: usize,

    /// Byte budget
    capacity: usize,

    /// Collection statistics
    pub(super) stats: GcStats,
}

impl Heap {
    /// Create an empty heap with a byte budget
    pub fn new(capacity: usize) -> Self {
        Self {
            blocks: Vec::new(),
            used: 0,
            capacity,
            stats: GcStats::default(),
        }
    }

    /// Byte budget
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Bytes in use (the HP register)
    pub fn used(&self) -> usize {
        self.used
    }

    /// Bytes still free
    pub fn available(&self) -> usize {
        self.capacity.saturating_sub(self.used)
    }

    /// Allocation cursor: number of blocks (the HR register)
    pub fn cursor(&self) -> usize {
        self.blocks.len()
    }

    /// Collection statistics
    pub fn stats(&self) -> &GcStats {
        &self.stats
    }

    /// Allocate a block if it fits in the remaining budget
    ///
    /// On failure the object is handed back so the caller can compact and
    /// retry without cloning it.
    pub fn try_allocate(&mut self, object: HeapObject) -> Result<HeapRef, HeapObject> {
        let size = object.size();
        if size > self.available() || self.blocks.len() >= u32::MAX as usize {
            return Err(object);
        }
        let r = HeapRef(self.blocks.len() as u32);
        self.blocks.push(Block {
            object,
            size,
            marked: false,
        });
        self.used += size;
        Ok(r)
    }

    /// Look up a block
    pub fn get(&self, r: HeapRef) -> VmResult<&HeapObject> {
        self.blocks
            .get(r.index())
            .map(|b| &b.object)
            .ok_or_else(|| VmError::BoundsViolation(format!("dangling heap reference {r}")))
    }

    /// Text of a string or key block
    pub fn text(&self, r: HeapRef) -> VmResult<&str> {
        match self.get(r)? {
            HeapObject::Text(s) => Ok(s),
            HeapObject::List(_) => Err(VmError::BoundsViolation(format!(
                "heap reference {r} is a list, expected text"
            ))),
        }
    }

    /// Elements of a list block
    pub fn list(&self, r: HeapRef) -> VmResult<&[Value]> {
        match self.get(r)? {
            HeapObject::List(items) => Ok(items),
            HeapObject::Text(_) => Err(VmError::BoundsViolation(format!(
                "heap reference {r} is text, expected a list"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocation_accounting() {
        let mut heap = Heap::new(64);
        let a = heap.try_allocate(HeapObject::Text("hello".into())).unwrap();
        assert_eq!(heap.used(), 9);
        assert_eq!(heap.cursor(), 1);
        assert_eq!(heap.text(a).unwrap(), "hello");

        let b = heap
            .try_allocate(HeapObject::List(vec![Value::Integer(1), Value::string("ab")]))
            .unwrap();
        assert_eq!(heap.used(), 9 + 14);
        assert_eq!(heap.list(b).unwrap().len(), 2);
        assert!(heap.text(b).is_err());
    }

    #[test]
    fn test_budget_rejects_and_returns_object() {
        let mut heap = Heap::new(8);
        let object = HeapObject::Text("too long".into());
        let rejected = heap.try_allocate(object.clone()).unwrap_err();
        assert_eq!(rejected, object);
        assert_eq!(heap.used(), 0);
    }

    #[test]
    fn test_dangling_reference() {
        let heap = Heap::new(8);
        assert!(matches!(
            heap.get(HeapRef::new(3)),
            Err(VmError::BoundsViolation(_))
        ));
    }
}
