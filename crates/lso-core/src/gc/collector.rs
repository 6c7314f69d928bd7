//! Mark-compact collection
//!
//! Roots are the engine's stack slots and globals. Marking flags every block
//! a root references (blocks hold owned values, so there are no interior
//! references to trace). Compaction slides surviving blocks down in
//! allocation order and rewrites every root through a forwarding table.

use super::heap::{Heap, HeapRef};
use crate::stack::Slot;
use std::time::{Duration, Instant};

/// Garbage collector statistics
#[derive(Debug, Clone, Default)]
pub struct GcStats {
    /// Total number of collections
    pub collections: usize,

    /// Total blocks freed
    pub blocks_freed: usize,

    /// Total bytes freed
    pub bytes_freed: usize,

    /// Total pause time
    pub total_pause_time: Duration,

    /// Last collection duration
    pub last_pause_time: Duration,
}

impl Heap {
    /// Run a mark-compact collection
    ///
    /// Every slot in `roots` that references the heap is kept alive and
    /// rewritten to the block's new position. Returns the bytes freed.
    pub fn collect(&mut self, roots: &mut [&mut [Slot]]) -> usize {
        let start = Instant::now();

        // Mark phase
        for block in &mut self.blocks {
            block.marked = false;
        }
        for slot in roots.iter().flat_map(|r| r.iter()) {
            if let Some(r) = slot.heap_ref() {
                if let Some(block) = self.blocks.get_mut(r.index()) {
                    block.marked = true;
                }
            }
        }

        // Compact phase
        let mut forward: Vec<Option<HeapRef>> = Vec::with_capacity(self.blocks.len());
        let mut next = 0u32;
        for block in &self.blocks {
            if block.marked {
                forward.push(Some(HeapRef::new(next)));
                next += 1;
            } else {
                forward.push(None);
            }
        }

        let before_blocks = self.blocks.len();
        let before_bytes = self.used;
        self.blocks.retain(|b| b.marked);
        self.used = self.blocks.iter().map(|b| b.size).sum();

        // Fix up roots
        for slot in roots.iter_mut().flat_map(|r| r.iter_mut()) {
            if let Some(r) = slot.heap_ref_mut() {
                if let Some(Some(moved)) = forward.get(r.index()) {
                    *r = *moved;
                }
            }
        }

        let freed = before_bytes - self.used;
        let duration = start.elapsed();
        self.stats.collections += 1;
        self.stats.blocks_freed += before_blocks - self.blocks.len();
        self.stats.bytes_freed += freed;
        self.stats.last_pause_time = duration;
        self.stats.total_pause_time += duration;

        tracing::debug!(
            freed_bytes = freed,
            live_blocks = self.blocks.len(),
            used = self.used,
            "heap compacted"
        );
        freed
    }
}
