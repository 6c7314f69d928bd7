//! Hosted script instances

use crate::vm::{QuantumReport, ScriptEngine};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Unique identifier for a hosted script
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScriptId(u64);

static NEXT_SCRIPT_ID: AtomicU64 = AtomicU64::new(1);

impl ScriptId {
    /// Generate a new unique ScriptId
    pub fn new() -> Self {
        ScriptId(NEXT_SCRIPT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the numeric ID value
    pub fn as_u64(self) -> u64 {
        self.0
    }

    /// Create a ScriptId from a u64 value
    pub fn from_u64(id: u64) -> Self {
        ScriptId(id)
    }
}

impl Default for ScriptId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ScriptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "script#{}", self.0)
    }
}

/// One script owned by the scheduler
pub struct ScriptTask {
    /// Scheduler handle
    id: ScriptId,
    /// Object the script is attached to
    object_id: Uuid,
    /// Isolated engine instance
    engine: ScriptEngine,
    /// When the script was spawned
    spawned_at: Instant,
    /// Outcome of the most recent quantum
    last_report: Option<QuantumReport>,
}

impl ScriptTask {
    pub(super) fn new(engine: ScriptEngine, object_id: Uuid) -> Self {
        Self {
            id: ScriptId::new(),
            object_id,
            engine,
            spawned_at: Instant::now(),
            last_report: None,
        }
    }

    /// Scheduler handle
    pub fn id(&self) -> ScriptId {
        self.id
    }

    /// Object the script is attached to
    pub fn object_id(&self) -> Uuid {
        self.object_id
    }

    /// The engine
    pub fn engine(&self) -> &ScriptEngine {
        &self.engine
    }

    /// The engine, mutably
    pub fn engine_mut(&mut self) -> &mut ScriptEngine {
        &mut self.engine
    }

    /// When the script was spawned
    pub fn spawned_at(&self) -> Instant {
        self.spawned_at
    }

    /// Outcome of the most recent quantum
    pub fn last_report(&self) -> Option<&QuantumReport> {
        self.last_report.as_ref()
    }

    pub(super) fn run(&mut self, debug: bool, time_slice: Duration) -> QuantumReport {
        let report = self.engine.run_quanta(debug, self.object_id, time_slice);
        self.last_report = Some(report);
        report
    }

    pub(super) fn into_engine(self) -> ScriptEngine {
        self.engine
    }
}

impl fmt::Debug for ScriptTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptTask")
            .field("id", &self.id)
            .field("object_id", &self.object_id)
            .field("state", self.engine.state())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_ids_are_unique() {
        let a = ScriptId::new();
        let b = ScriptId::new();
        assert_ne!(a, b);
        assert!(b.as_u64() > a.as_u64());
    }

    #[test]
    fn test_script_id_round_trips_through_u64() {
        let id = ScriptId::from_u64(42);
        assert_eq!(id.as_u64(), 42);
        assert_eq!(id.to_string(), "script#42");
    }
}
