//! Script Scheduler - Round-Robin Quanta
//!
//! Hosts many scripts in one thread. Each round gives every runnable
//! script one quantum, in spawn order, so a busy loop in one script only
//! delays the others by its time slice. Scripts never share state: each
//! owns its engine, and only the image, the library table and the host
//! services are shared.

mod task;

pub use task::{ScriptId, ScriptTask};

use crate::library::{HostServices, LibraryTable};
use crate::vm::{EngineOptions, Event, ExecutionState, ScriptEngine, DEFAULT_TIME_SLICE};
use lso_bytecode::ScriptImage;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Outcome of one scheduling round
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RoundReport {
    /// Scripts given a quantum
    pub scripts_run: usize,
    /// Instructions executed across all scripts
    pub instructions: u64,
    /// Scripts that stopped during this round
    pub stopped: usize,
    /// Wall-clock time for the round
    pub elapsed: Duration,
}

/// Scheduler telemetry
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    /// Scripts spawned
    pub spawned: u64,
    /// Scripts reaped after finishing
    pub finished: u64,
    /// Scripts reaped after faulting
    pub faulted: u64,
    /// Rounds run
    pub rounds: u64,
    /// Quanta run
    pub quanta: u64,
    /// Instructions executed
    pub instructions: u64,
}

/// Round-robin host for many scripts
pub struct ScriptScheduler {
    /// Dispatch table shared by every script
    library: Arc<LibraryTable>,
    /// Services shared by every script
    services: HostServices,
    /// Options for newly spawned engines
    options: EngineOptions,
    /// Trace every instruction
    debug: bool,
    /// Hosted scripts, in spawn order
    tasks: Vec<ScriptTask>,
    /// Telemetry
    stats: SchedulerStats,
}

impl ScriptScheduler {
    /// Create a scheduler with default engine options
    pub fn new(library: Arc<LibraryTable>, services: HostServices) -> Self {
        Self {
            library,
            services,
            options: EngineOptions::default(),
            debug: false,
            tasks: Vec::new(),
            stats: SchedulerStats::default(),
        }
    }

    /// Use these options for scripts spawned from now on
    pub fn with_options(mut self, options: EngineOptions) -> Self {
        self.options = options;
        self
    }

    /// Trace every instruction of every script
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    // ===== Lifecycle =====

    /// Host a new instance of `image` on a fresh object
    pub fn spawn(&mut self, image: Arc<ScriptImage>) -> ScriptId {
        self.spawn_on(image, Uuid::new_v4())
    }

    /// Host a new instance of `image` attached to `object_id`
    pub fn spawn_on(&mut self, image: Arc<ScriptImage>, object_id: Uuid) -> ScriptId {
        let engine = ScriptEngine::new(
            image,
            Arc::clone(&self.library),
            self.services.clone(),
            self.options.clone(),
        );
        let task = ScriptTask::new(engine, object_id);
        let id = task.id();
        tracing::debug!(%id, %object_id, "script spawned");

        self.tasks.push(task);
        self.stats.spawned += 1;
        id
    }

    /// Stop hosting a script and hand back its engine
    pub fn remove(&mut self, id: ScriptId) -> Option<ScriptEngine> {
        let index = self.tasks.iter().position(|t| t.id() == id)?;
        let task = self.tasks.remove(index);
        tracing::debug!(%id, state = task.engine().state().name(), "script removed");
        Some(task.into_engine())
    }

    /// Remove every finished or faulted script
    ///
    /// Returns the removed scripts with their final states.
    pub fn reap_terminated(&mut self) -> Vec<(ScriptId, ExecutionState)> {
        let mut reaped = Vec::new();
        let mut kept = Vec::with_capacity(self.tasks.len());

        for task in self.tasks.drain(..) {
            let state = task.engine().state().clone();
            match &state {
                ExecutionState::Finished => self.stats.finished += 1,
                ExecutionState::Faulted(fault) => {
                    tracing::warn!(id = %task.id(), object_id = %task.object_id(), %fault, "reaping faulted script");
                    self.stats.faulted += 1;
                }
                _ => {
                    kept.push(task);
                    continue;
                }
            }
            reaped.push((task.id(), state));
        }

        self.tasks = kept;
        reaped
    }

    // ===== Events =====

    /// Queue an event for one script
    ///
    /// Returns `false` for an unknown id or when the engine drops the event.
    pub fn post_event(&mut self, id: ScriptId, event: Event) -> bool {
        match self.get_mut(id) {
            Some(task) => task.engine_mut().post_event(event),
            None => {
                tracing::debug!(%id, event = %event.name, "unknown script, dropping event");
                false
            }
        }
    }

    /// Queue an event for every script attached to `object_id`
    ///
    /// Returns how many scripts accepted it.
    pub fn post_to_object(&mut self, object_id: Uuid, event: Event) -> usize {
        self.tasks
            .iter_mut()
            .filter(|t| t.object_id() == object_id)
            .map(|t| t.engine_mut().post_event(event.clone()))
            .filter(|&accepted| accepted)
            .count()
    }

    /// Queue an event for every hosted script
    ///
    /// Returns how many scripts accepted it.
    pub fn broadcast(&mut self, event: Event) -> usize {
        self.tasks
            .iter_mut()
            .map(|t| t.engine_mut().post_event(event.clone()))
            .filter(|&accepted| accepted)
            .count()
    }

    // ===== Execution =====

    /// Give every runnable script one quantum of `time_slice`
    pub fn run_round(&mut self, time_slice: Duration) -> RoundReport {
        let started = Instant::now();
        let mut report = RoundReport::default();

        for task in &mut self.tasks {
            if !task.engine().is_runnable() {
                continue;
            }
            let quantum = task.run(self.debug, time_slice);
            report.scripts_run += 1;
            report.instructions += quantum.instructions;
            if !quantum.still_running {
                report.stopped += 1;
            }
        }

        report.elapsed = started.elapsed();
        self.stats.rounds += 1;
        self.stats.quanta += report.scripts_run as u64;
        self.stats.instructions += report.instructions;
        tracing::trace!(
            scripts = report.scripts_run,
            instructions = report.instructions,
            stopped = report.stopped,
            "round complete"
        );
        report
    }

    /// Run rounds until no script is runnable or `max_rounds` is reached
    ///
    /// Returns the number of rounds run.
    pub fn run_until_idle(&mut self, max_rounds: usize) -> usize {
        let mut rounds = 0;
        while rounds < max_rounds && self.has_runnable() {
            self.run_round(DEFAULT_TIME_SLICE);
            rounds += 1;
        }
        rounds
    }

    // ===== Queries =====

    /// Whether any script would execute in the next round
    pub fn has_runnable(&self) -> bool {
        self.tasks.iter().any(|t| t.engine().is_runnable())
    }

    /// Look up a hosted script
    pub fn get(&self, id: ScriptId) -> Option<&ScriptTask> {
        self.tasks.iter().find(|t| t.id() == id)
    }

    /// Look up a hosted script mutably
    pub fn get_mut(&mut self, id: ScriptId) -> Option<&mut ScriptTask> {
        self.tasks.iter_mut().find(|t| t.id() == id)
    }

    /// Ids of hosted scripts, in spawn order
    pub fn ids(&self) -> Vec<ScriptId> {
        self.tasks.iter().map(ScriptTask::id).collect()
    }

    /// Number of hosted scripts
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Whether no scripts are hosted
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Telemetry
    pub fn stats(&self) -> &SchedulerStats {
        &self.stats
    }
}

impl fmt::Debug for ScriptScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptScheduler")
            .field("tasks", &self.tasks)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::CollectingSink;
    use lso_bytecode::{BytecodeWriter, EventHandler, Instruction, StateDef, STATE_ENTRY};

    fn scheduler() -> (ScriptScheduler, Arc<CollectingSink>) {
        let chat = Arc::new(CollectingSink::new());
        let services = HostServices::system().with_chat(chat.clone());
        let scheduler = ScriptScheduler::new(Arc::new(LibraryTable::with_builtins()), services);
        (scheduler, chat)
    }

    /// `state_entry { print "<text>"; }`
    fn printing_image(text: &str) -> Arc<ScriptImage> {
        let mut image = ScriptImage::new();
        let s = image.intern(text);
        let mut w = BytecodeWriter::new();
        w.emit(&Instruction::PushString(s));
        w.emit(&Instruction::Print);
        w.emit(&Instruction::Return);
        image.code = w.into_bytes();
        image.add_handler(0, EventHandler::new(STATE_ENTRY, 0));
        Arc::new(image)
    }

    /// `touch_start { print "touched"; }`
    fn listening_image() -> Arc<ScriptImage> {
        let mut image = ScriptImage::new();
        let s = image.intern("touched");
        let mut w = BytecodeWriter::new();
        w.emit(&Instruction::PushString(s));
        w.emit(&Instruction::Print);
        w.emit(&Instruction::Return);
        image.code = w.into_bytes();
        image.add_handler(0, EventHandler::new("touch_start", 0));
        Arc::new(image)
    }

    #[test]
    fn test_round_runs_scripts_in_spawn_order() {
        let (mut scheduler, chat) = scheduler();
        scheduler.spawn(printing_image("first"));
        scheduler.spawn(printing_image("second"));

        let report = scheduler.run_round(DEFAULT_TIME_SLICE);
        assert_eq!(report.scripts_run, 2);
        assert_eq!(report.stopped, 2);
        assert_eq!(chat.texts(), vec!["first", "second"]);
    }

    #[test]
    fn test_reap_removes_finished_scripts() {
        let (mut scheduler, _) = scheduler();
        let done = scheduler.spawn(printing_image("bye"));
        let waiting = scheduler.spawn(listening_image());
        scheduler.run_round(DEFAULT_TIME_SLICE);

        let reaped = scheduler.reap_terminated();
        assert_eq!(reaped, vec![(done, ExecutionState::Finished)]);
        assert_eq!(scheduler.ids(), vec![waiting]);
        assert_eq!(scheduler.stats().finished, 1);
    }

    #[test]
    fn test_waiting_script_skipped_until_event() {
        let (mut scheduler, chat) = scheduler();
        let id = scheduler.spawn(listening_image());
        scheduler.run_round(DEFAULT_TIME_SLICE);
        assert!(!scheduler.has_runnable());
        assert_eq!(scheduler.run_round(DEFAULT_TIME_SLICE).scripts_run, 0);

        assert!(scheduler.post_event(id, Event::named("touch_start")));
        assert!(scheduler.has_runnable());
        scheduler.run_round(DEFAULT_TIME_SLICE);
        assert_eq!(chat.texts(), vec!["touched"]);
        assert_eq!(
            scheduler.get(id).map(|t| t.engine().state().clone()),
            Some(ExecutionState::WaitingForEvent)
        );
    }

    #[test]
    fn test_post_to_unknown_script_is_dropped() {
        let (mut scheduler, _) = scheduler();
        assert!(!scheduler.post_event(ScriptId::from_u64(u64::MAX), Event::named("touch_start")));
    }

    #[test]
    fn test_broadcast_and_object_targeting() {
        let (mut scheduler, chat) = scheduler();
        let object = Uuid::new_v4();
        scheduler.spawn_on(listening_image(), object);
        scheduler.spawn(listening_image());
        scheduler.run_until_idle(4);

        assert_eq!(scheduler.post_to_object(object, Event::named("touch_start")), 1);
        scheduler.run_until_idle(4);
        assert_eq!(chat.messages().len(), 1);
        assert_eq!(chat.messages()[0].object_id, object);

        assert_eq!(scheduler.broadcast(Event::named("touch_start")), 2);
        scheduler.run_until_idle(4);
        assert_eq!(chat.messages().len(), 3);
    }

    #[test]
    fn test_remove_hands_back_engine() {
        let (mut scheduler, _) = scheduler();
        let id = scheduler.spawn(listening_image());
        let engine = scheduler.remove(id);
        assert!(engine.is_some());
        assert!(scheduler.is_empty());
        assert!(scheduler.remove(id).is_none());
    }

    #[test]
    fn test_states_without_handlers_finish_immediately() {
        let (mut scheduler, _) = scheduler();
        let mut image = ScriptImage::new();
        image.add_state(StateDef::new("other"));
        let id = scheduler.spawn(Arc::new(image));
        scheduler.run_round(DEFAULT_TIME_SLICE);
        assert_eq!(
            scheduler.get(id).map(|t| t.engine().is_finished()),
            Some(true)
        );
    }
}
