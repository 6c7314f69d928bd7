//! Engine configuration

use crate::stack::{DEFAULT_MAX_CALL_DEPTH, DEFAULT_MAX_STACK_SIZE};
use serde::Deserialize;

/// Default depth of the pending event queue
pub const DEFAULT_MAX_PENDING_EVENTS: usize = 64;

/// Resource limits for one script instance
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ResourceLimits {
    /// Maximum stack size in slots (the image may ask for less)
    pub max_stack_slots: usize,

    /// Maximum number of nested frames
    pub max_call_depth: usize,

    /// Heap budget in bytes (None = the image's declared heap size)
    pub max_heap_bytes: Option<usize>,

    /// Maximum number of queued events
    pub max_pending_events: usize,

    /// Instruction cap per quantum, on top of the time slice (None = no cap)
    pub max_instructions_per_quantum: Option<u64>,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            max_stack_slots: DEFAULT_MAX_STACK_SIZE,
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
            max_heap_bytes: None,
            max_pending_events: DEFAULT_MAX_PENDING_EVENTS,
            max_instructions_per_quantum: None,
        }
    }
}

impl ResourceLimits {
    /// Default limits without any optional cap
    pub fn unlimited() -> Self {
        Self::default()
    }

    /// Create resource limits with a specific heap budget
    pub fn with_heap_limit(max_heap_bytes: usize) -> Self {
        Self {
            max_heap_bytes: Some(max_heap_bytes),
            ..Default::default()
        }
    }

    /// Create resource limits with a per-quantum instruction cap
    pub fn with_instruction_cap(max_instructions: u64) -> Self {
        Self {
            max_instructions_per_quantum: Some(max_instructions),
            ..Default::default()
        }
    }

    /// Create resource limits with a specific stack size and call depth
    pub fn with_stack_limit(max_stack_slots: usize, max_call_depth: usize) -> Self {
        Self {
            max_stack_slots,
            max_call_depth,
            ..Default::default()
        }
    }
}

/// Options for creating a [`ScriptEngine`](super::ScriptEngine)
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct EngineOptions {
    /// Resource limits
    pub limits: ResourceLimits,

    /// Heap usage in bytes above which the engine compacts between handlers
    /// (None = compact only when an allocation fails)
    pub gc_threshold: Option<usize>,
}

impl EngineOptions {
    /// Options with the given limits
    pub fn with_limits(limits: ResourceLimits) -> Self {
        Self {
            limits,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let limits = ResourceLimits::default();
        assert_eq!(limits.max_stack_slots, 1024);
        assert_eq!(limits.max_call_depth, 128);
        assert_eq!(limits.max_pending_events, 64);
        assert!(limits.max_heap_bytes.is_none());
        assert_eq!(ResourceLimits::unlimited(), limits);
    }

    #[test]
    fn test_constructors() {
        assert_eq!(ResourceLimits::with_heap_limit(512).max_heap_bytes, Some(512));
        assert_eq!(
            ResourceLimits::with_instruction_cap(10).max_instructions_per_quantum,
            Some(10)
        );
        let limits = ResourceLimits::with_stack_limit(32, 4);
        assert_eq!((limits.max_stack_slots, limits.max_call_depth), (32, 4));
    }
}
