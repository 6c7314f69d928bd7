//! Event queue, handler dispatch and state changes

use super::{Event, ExecutionState, ScriptEngine};
use crate::stack::FrameKind;
use crate::value::Value;
use crate::{VmError, VmResult};
use lso_bytecode::{EventHandler, ValueType, STATE_ENTRY, STATE_EXIT, VERSION};
use std::sync::Arc;

impl ScriptEngine {
    /// Queue an event for the current state
    ///
    /// Returns `false` if the event was dropped: the script has stopped,
    /// the queue is full, or the name is one of the reserved state events.
    pub fn post_event(&mut self, event: Event) -> bool {
        if self.state.is_terminal() {
            tracing::debug!(event = %event.name, "script stopped, dropping event");
            return false;
        }
        if event.name == STATE_ENTRY || event.name == STATE_EXIT {
            tracing::warn!(event = %event.name, "state events cannot be posted by the host");
            return false;
        }
        let limit = self.options.limits.max_pending_events;
        if self.events.len() >= limit {
            tracing::warn!(event = %event.name, limit, "event queue full, dropping event");
            return false;
        }
        tracing::trace!(event = %event.name, queued = self.events.len() + 1, "event posted");
        self.events.push_back(event);
        true
    }

    /// Check the image and initialize globals
    pub(super) fn start(&mut self) -> VmResult<()> {
        if self.image.version != VERSION {
            return Err(VmError::UnsupportedVersion(self.image.version));
        }
        if self.image.states.is_empty() {
            return Err(VmError::BoundsViolation("image declares no states".to_string()));
        }

        let image = Arc::clone(&self.image);
        for global in &image.globals {
            let value = Value::from(&global.init);
            if value.value_type() != global.ty {
                return Err(VmError::type_mismatch(global.ty, value.value_type()));
            }
            let slot = self.store(value)?;
            self.globals.push(slot);
        }

        self.current_state = 0;
        self.pending_entry = true;
        tracing::info!(
            globals = image.globals.len(),
            states = image.states.len(),
            code_bytes = image.code.len(),
            heap_bytes = self.heap.capacity(),
            "script started"
        );
        Ok(())
    }

    /// Start the next handler that is due
    ///
    /// Applies a pending state change, then runs `state_entry` if the state
    /// was just entered, then the oldest queued event with a matching
    /// handler. Returns `false` if nothing is left to run.
    pub(super) fn dispatch_next(&mut self) -> VmResult<bool> {
        if let Some(target) = self.pending_state.take() {
            self.switch_state(target);
        }

        let image = Arc::clone(&self.image);
        let state = image.states.get(self.current_state as usize).ok_or_else(|| {
            VmError::BoundsViolation(format!("state index {} out of range", self.current_state))
        })?;

        if std::mem::take(&mut self.pending_entry) {
            if let Some(handler) = state.handler(STATE_ENTRY) {
                self.begin_handler(handler, Vec::new())?;
                return Ok(true);
            }
        }

        while let Some(event) = self.events.pop_front() {
            let Some(handler) = state.handler(&event.name) else {
                tracing::debug!(state = %state.name, event = %event.name, "no handler, dropping event");
                continue;
            };
            if !args_match(&handler.params, &event.args) {
                tracing::warn!(
                    state = %state.name,
                    event = %event.name,
                    expected = handler.params.len(),
                    actual = event.args.len(),
                    "event arguments do not match handler, dropping event"
                );
                continue;
            }
            self.begin_handler(handler, event.args)?;
            return Ok(true);
        }
        Ok(false)
    }

    /// Settle into `WaitingForEvent` or `Finished` once nothing can run
    pub(super) fn settle(&mut self) {
        let listens = self
            .image
            .states
            .get(self.current_state as usize)
            .is_some_and(|s| s.listens_for_events());

        if listens {
            self.state = ExecutionState::WaitingForEvent;
        } else {
            tracing::info!(state = self.current_state_name(), "no handlers left, script finished");
            self.state = ExecutionState::Finished;
        }
    }

    fn switch_state(&mut self, target: u16) {
        let from = self.current_state;
        self.current_state = target;
        self.pending_entry = true;
        let dropped = self.events.len();
        self.events.clear();
        tracing::info!(from, to = self.current_state_name(), dropped, "state change");
    }

    fn begin_handler(&mut self, handler: &EventHandler, args: Vec<Value>) -> VmResult<()> {
        for arg in args {
            let slot = self.store(arg)?;
            self.stack.push(slot)?;
        }
        for &ty in &handler.locals {
            let slot = self.default_slot(ty)?;
            self.stack.push(slot)?;
        }
        self.stack.push_frame(
            FrameKind::Handler,
            0,
            handler.params.len() + handler.locals.len(),
            &[],
            ValueType::Void,
        )?;

        self.ip = handler.entry as usize;
        self.in_exit = handler.event == STATE_EXIT;
        self.stats.events_processed += 1;
        tracing::debug!(
            state = self.current_state_name(),
            event = %handler.event,
            entry = self.ip,
            "handler started"
        );
        Ok(())
    }

    /// Drop the active handler's frames and operands
    pub(super) fn end_handler(&mut self) {
        self.stack.clear();
        self.in_exit = false;
        if let Some(threshold) = self.options.gc_threshold {
            if self.heap.used() > threshold {
                self.collect_garbage();
            }
        }
    }

    /// `STATE n`
    ///
    /// Ends the active handler. A change to another state runs the old
    /// state's `state_exit` first; the switch itself happens once that
    /// handler returns. A `STATE` executed inside `state_exit` only
    /// retargets the pending change.
    pub(super) fn change_state(&mut self, target: u16) -> VmResult<()> {
        if target as usize >= self.image.states.len() {
            return Err(VmError::BoundsViolation(format!(
                "state index {target} out of range"
            )));
        }

        if self.in_exit {
            self.pending_state = Some(target);
            self.end_handler();
            return Ok(());
        }

        self.end_handler();
        if target == self.current_state {
            return Ok(());
        }
        self.pending_state = Some(target);

        let image = Arc::clone(&self.image);
        if let Some(exit) = image
            .states
            .get(self.current_state as usize)
            .and_then(|s| s.handler(STATE_EXIT))
        {
            self.begin_handler(exit, Vec::new())?;
        }
        Ok(())
    }
}

fn args_match(params: &[ValueType], args: &[Value]) -> bool {
    params.len() == args.len()
        && params
            .iter()
            .zip(args)
            .all(|(ty, arg)| *ty == arg.value_type())
}
