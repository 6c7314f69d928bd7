//! Script execution engine
//!
//! A [`ScriptEngine`] runs one instance of a compiled script. It owns the
//! register file, stack, heap and globals exclusively; the image and the
//! library table are shared by reference, so many engines can run the same
//! program side by side without observing each other.
//!
//! The host drives the engine with [`ScriptEngine::run_quanta`], which
//! executes instructions until the time slice runs out, the script stops,
//! or a fault occurs. Nothing in the engine blocks: a script waiting for an
//! event simply reports [`ExecutionState::WaitingForEvent`] and resumes when
//! the host posts one and runs another quantum.
//!
//! # State machine
//!
//! ```text
//!             run_quanta
//!   Idle ───────────────► Running ◄──────────────┐
//!                          │  │  │               │ post_event
//!                HALT /    │  │  └──► WaitingForEvent
//!           no handlers    │  │
//!                          ▼  ▼ fault
//!                   Finished  Faulted
//! ```

mod events;
mod interpreter;
mod ops;
mod options;
mod quantum;

pub use options::{EngineOptions, ResourceLimits, DEFAULT_MAX_PENDING_EVENTS};
pub use quantum::{QuantumReport, DEFAULT_TIME_SLICE};

use crate::gc::{Heap, HeapObject, HeapRef};
use crate::library::{HostServices, LibraryTable};
use crate::registers::RegisterFile;
use crate::stack::{Slot, Stack};
use crate::value::Value;
use crate::{Fault, VmError, VmResult};
use lso_bytecode::{ScriptImage, ValueType};
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Execution state of a script instance
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionState {
    /// Loaded, never run
    Idle,
    /// Has a handler in progress or work queued
    Running,
    /// Blocked until the host posts an event
    WaitingForEvent,
    /// Halted, or reached the end of a state with nothing to listen for
    Finished,
    /// Stopped by a fault
    Faulted(Fault),
}

impl ExecutionState {
    /// Whether no further instruction will ever run
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished | Self::Faulted(_))
    }

    /// Short name used in logs and reports
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::WaitingForEvent => "waiting",
            Self::Finished => "finished",
            Self::Faulted(_) => "faulted",
        }
    }
}

impl fmt::Display for ExecutionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Faulted(fault) => write!(f, "faulted: {fault}"),
            other => f.write_str(other.name()),
        }
    }
}

/// An event delivered by the host
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    /// Handler name, e.g. `touch_start`
    pub name: String,
    /// Arguments, matching the handler's parameter types
    pub args: Vec<Value>,
}

impl Event {
    /// Create an event
    pub fn new(name: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }

    /// Create an event without arguments
    pub fn named(name: impl Into<String>) -> Self {
        Self::new(name, Vec::new())
    }
}

/// Lifetime telemetry of an engine
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngineStats {
    /// Instructions executed
    pub instructions: u64,
    /// Handlers started (including `state_entry`/`state_exit`)
    pub events_processed: u64,
    /// Quanta run
    pub quanta: u64,
    /// Wall-clock time spent inside `run_quanta`
    pub busy_time: Duration,
}

/// One running instance of a compiled script
pub struct ScriptEngine {
    /// Program (shared, read-only)
    image: Arc<ScriptImage>,
    /// Library dispatch table (shared, read-only)
    library: Arc<LibraryTable>,
    /// Clock, randomness, hashing and chat
    services: HostServices,
    /// Limits and tuning
    options: EngineOptions,

    /// Operand stack and frames
    stack: Stack,
    /// String, key and list storage
    heap: Heap,
    /// Global variables, initialized on the first quantum
    globals: Vec<Slot>,
    /// Instruction pointer
    ip: usize,

    /// Execution state
    state: ExecutionState,
    /// Index of the current script state
    current_state: u16,
    /// State to switch to once the active handler ends
    pending_state: Option<u16>,
    /// Whether `state_entry` still has to run for the current state
    pending_entry: bool,
    /// Whether the active handler is `state_exit`
    in_exit: bool,
    /// Queued host events
    events: VecDeque<Event>,

    /// Lifetime telemetry
    stats: EngineStats,
}

impl ScriptEngine {
    /// Create an engine for an image
    ///
    /// Nothing runs until the first [`run_quanta`](Self::run_quanta), which
    /// also validates the image version and initializes globals.
    pub fn new(
        image: Arc<ScriptImage>,
        library: Arc<LibraryTable>,
        services: HostServices,
        options: EngineOptions,
    ) -> Self {
        let limits = &options.limits;
        let stack_slots = (image.stack_size as usize).min(limits.max_stack_slots);
        let heap_bytes = limits.max_heap_bytes.unwrap_or(image.heap_size as usize);

        Self {
            stack: Stack::with_limits(stack_slots, limits.max_call_depth),
            heap: Heap::new(heap_bytes),
            globals: Vec::with_capacity(image.globals.len()),
            ip: 0,
            state: ExecutionState::Idle,
            current_state: 0,
            pending_state: None,
            pending_entry: false,
            in_exit: false,
            events: VecDeque::new(),
            stats: EngineStats::default(),
            image,
            library,
            services,
            options,
        }
    }

    // ===== Queries =====

    /// The program this engine runs
    pub fn image(&self) -> &Arc<ScriptImage> {
        &self.image
    }

    /// Current execution state
    pub fn state(&self) -> &ExecutionState {
        &self.state
    }

    /// Whether the script has finished or faulted
    pub fn is_finished(&self) -> bool {
        self.state.is_terminal()
    }

    /// The fault that stopped the script, if any
    pub fn fault(&self) -> Option<&Fault> {
        match &self.state {
            ExecutionState::Faulted(fault) => Some(fault),
            _ => None,
        }
    }

    /// Whether another quantum would execute anything
    pub fn is_runnable(&self) -> bool {
        match self.state {
            ExecutionState::Idle | ExecutionState::Running => true,
            ExecutionState::WaitingForEvent => !self.events.is_empty(),
            ExecutionState::Finished | ExecutionState::Faulted(_) => false,
        }
    }

    /// Snapshot of the register file
    pub fn registers(&self) -> RegisterFile {
        RegisterFile {
            ip: self.ip,
            sp: self.stack.depth(),
            bp: self.stack.base_pointer(),
            hr: self.heap.cursor(),
            hp: self.heap.used(),
        }
    }

    /// Index of the current script state
    pub fn current_state(&self) -> u16 {
        self.current_state
    }

    /// Name of the current script state
    pub fn current_state_name(&self) -> &str {
        self.image
            .states
            .get(self.current_state as usize)
            .map_or("", |s| s.name.as_str())
    }

    /// Number of queued events
    pub fn pending_events(&self) -> usize {
        self.events.len()
    }

    /// Lifetime telemetry
    pub fn stats(&self) -> &EngineStats {
        &self.stats
    }

    /// The engine's heap
    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    /// The engine's stack
    pub fn stack(&self) -> &Stack {
        &self.stack
    }

    /// Engine options
    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// Current value of a global by name
    ///
    /// Returns `None` before the first quantum or for an unknown name.
    pub fn global(&self, name: &str) -> Option<Value> {
        let index = self.image.globals.iter().position(|g| g.name == name)?;
        let slot = *self.globals.get(index)?;
        self.materialize(slot).ok()
    }

    /// Compact the heap now, returning the bytes freed
    pub fn collect_garbage(&mut self) -> usize {
        let freed = self
            .heap
            .collect(&mut [self.stack.slots_mut(), &mut self.globals[..]]);
        tracing::debug!(freed, used = self.heap.used(), "heap compacted");
        freed
    }

    // ===== Slots and values =====

    /// Copy a slot out into an owned value
    fn materialize(&self, slot: Slot) -> VmResult<Value> {
        Ok(match slot {
            Slot::Integer(v) => Value::Integer(v),
            Slot::Float(v) => Value::Float(v),
            Slot::Vector(v) => Value::Vector(v),
            Slot::Rotation(q) => Value::Rotation(q),
            Slot::String(r) => Value::String(self.heap.text(r)?.to_string()),
            Slot::Key(r) => Value::Key(self.heap.text(r)?.to_string()),
            Slot::List(r) => Value::List(self.heap.list(r)?.to_vec()),
        })
    }

    /// Store a value into a slot, allocating heap blocks as needed
    ///
    /// Only slots on the stack or in globals survive a compaction, so
    /// operands must be materialized before anything is stored.
    fn store(&mut self, value: Value) -> VmResult<Slot> {
        Ok(match value {
            Value::Integer(v) => Slot::Integer(v),
            Value::Float(v) => Slot::Float(v),
            Value::Vector(v) => Slot::Vector(v),
            Value::Rotation(q) => Slot::Rotation(q),
            Value::String(s) => Slot::String(self.allocate(HeapObject::Text(s))?),
            Value::Key(s) => Slot::Key(self.allocate(HeapObject::Text(s))?),
            Value::List(items) => Slot::List(self.allocate(HeapObject::List(items))?),
        })
    }

    fn allocate(&mut self, object: HeapObject) -> VmResult<HeapRef> {
        let object = match self.heap.try_allocate(object) {
            Ok(r) => return Ok(r),
            Err(object) => object,
        };

        self.collect_garbage();
        let requested = object.size();
        self.heap
            .try_allocate(object)
            .map_err(|_| VmError::HeapExhausted {
                requested,
                available: self.heap.available(),
            })
    }

    /// Store the zero value of a type
    fn default_slot(&mut self, ty: ValueType) -> VmResult<Slot> {
        let value = Value::default_for(ty)
            .ok_or_else(|| VmError::BoundsViolation(format!("variable of type {ty}")))?;
        self.store(value)
    }

    /// Record a fault and stop, leaving IP at the faulting instruction
    fn record_fault(&mut self, error: VmError, ip: usize) {
        self.ip = ip;
        let fault = Fault { error, ip };
        tracing::warn!(state = self.current_state_name(), %fault, "script faulted");
        self.state = ExecutionState::Faulted(fault);
    }
}

impl fmt::Debug for ScriptEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptEngine")
            .field("state", &self.state)
            .field("current_state", &self.current_state)
            .field("registers", &self.registers())
            .field("pending_events", &self.events.len())
            .finish_non_exhaustive()
    }
}
