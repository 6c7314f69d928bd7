//! Quantum loop
//!
//! A quantum is one bounded call into the engine. The deadline is checked
//! between instructions, never inside one, so a quantum always ends on an
//! instruction boundary and a zero slice still makes one instruction of
//! progress when the script is runnable.

use super::{ExecutionState, ScriptEngine};
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Default time slice for one quantum
pub const DEFAULT_TIME_SLICE: Duration = Duration::from_millis(10);

/// Outcome of one quantum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QuantumReport {
    /// Instructions completed in this quantum
    pub instructions: u64,
    /// Handlers started in this quantum
    pub events_processed: u64,
    /// Wall-clock time spent
    pub elapsed: Duration,
    /// Whether the script has neither finished nor faulted
    pub still_running: bool,
}

impl QuantumReport {
    /// Throughput of this quantum
    pub fn instructions_per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.instructions as f64 / secs
        } else {
            0.0
        }
    }
}

impl ScriptEngine {
    /// Run one quantum
    ///
    /// Executes instructions until `time_slice` has elapsed, the optional
    /// per-quantum instruction cap is reached, the script stops, or it has
    /// nothing to do until the host posts an event. `object_id` identifies
    /// the object running the script to builtins and the chat sink. With
    /// `debug` set every instruction is traced.
    pub fn run_quanta(&mut self, debug: bool, object_id: Uuid, time_slice: Duration) -> QuantumReport {
        let started = Instant::now();
        let deadline = started.checked_add(time_slice);
        let cap = self.options.limits.max_instructions_per_quantum;
        let events_before = self.stats.events_processed;
        let mut instructions = 0u64;

        if self.state == ExecutionState::Idle {
            self.state = ExecutionState::Running;
            if let Err(error) = self.start() {
                self.record_fault(error, 0);
            }
        }

        while !self.state.is_terminal() {
            if self.stack.frame_count() == 0 {
                match self.dispatch_next() {
                    Ok(true) => self.state = ExecutionState::Running,
                    Ok(false) => {
                        self.settle();
                        break;
                    }
                    Err(error) => {
                        let ip = self.ip;
                        self.record_fault(error, ip);
                        break;
                    }
                }
            }

            let ip = self.ip;
            if let Err(error) = self.step(debug, object_id) {
                self.record_fault(error, ip);
                break;
            }
            instructions += 1;

            if cap.is_some_and(|cap| instructions >= cap) {
                break;
            }
            if deadline.map_or(false, |deadline| Instant::now() >= deadline) {
                break;
            }
        }

        let elapsed = started.elapsed();
        self.stats.instructions += instructions;
        self.stats.quanta += 1;
        self.stats.busy_time += elapsed;

        let report = QuantumReport {
            instructions,
            events_processed: self.stats.events_processed - events_before,
            elapsed,
            still_running: !self.is_finished(),
        };
        if debug {
            tracing::debug!(
                instructions = report.instructions,
                events = report.events_processed,
                state = self.state.name(),
                registers = %self.registers().to_string().replace('\n', " "),
                "quantum complete"
            );
        }
        report
    }
}
