//! Heap and garbage collection
//!
//! Strings, keys and lists live in a fixed-budget [`Heap`] of immutable
//! blocks. When an allocation does not fit, the engine runs
//! [`Heap::collect`], a mark-compact pass rooted at the stack and globals,
//! and retries once before faulting with `HeapExhausted`.
//!
//! # Memory Layout
//!
//! ```text
//! ┌──────────┬──────────┬──────────┬───────────────────┐
//! │ block 0  │ block 1  │ block 2  │ free              │
//! └──────────┴──────────┴──────────┴───────────────────┘
//!                                  ↑ HR = 3 blocks
//! HP = bytes used by blocks 0..3
//! ```

mod collector;
mod heap;

pub use collector::GcStats;
pub use heap::{Heap, HeapObject, HeapRef};
