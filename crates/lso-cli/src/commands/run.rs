//! `lso run`: execute an image in quanta until it stops or goes idle.

use crate::config::{slice_from_secs, CliConfig};
use crate::output::StyledOutput;
use lso_core::library::StdoutSink;
use lso_core::{Event, ExecutionState, HostServices, LibraryTable, ScriptEngine};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use termcolor::ColorChoice;
use uuid::Uuid;

pub struct RunArgs {
    pub image: PathBuf,
    pub debug: bool,
    pub time_slice: Option<f64>,
    pub max_instructions: Option<u64>,
    pub events: Vec<String>,
    pub config: Option<PathBuf>,
}

/// Run the image and return the process exit code
pub fn execute(args: RunArgs, color: ColorChoice) -> anyhow::Result<i32> {
    let config = match &args.config {
        Some(path) => CliConfig::load(path)?,
        None => CliConfig::default(),
    };
    let mut options = config.engine.clone();
    if let Some(cap) = args.max_instructions {
        options.limits.max_instructions_per_quantum = Some(cap);
    }
    let time_slice = args
        .time_slice
        .map_or_else(|| config.time_slice(), slice_from_secs);

    let image = super::load_image(&args.image)?;
    let services = HostServices::system().with_chat(Arc::new(StdoutSink));
    let mut engine = ScriptEngine::new(
        Arc::new(image),
        Arc::new(LibraryTable::with_builtins()),
        services,
        options,
    );

    let mut out = StyledOutput::new(color);
    let object_id = Uuid::new_v4();
    let mut driver = Driver {
        engine: &mut engine,
        out: &mut out,
        object_id,
        time_slice,
        debug: args.debug,
    };

    driver.drain();
    for name in &args.events {
        if driver.engine.is_finished() {
            break;
        }
        if driver.engine.post_event(Event::named(name.as_str())) {
            driver.drain();
        } else {
            driver.out.warning(&format!("Event {name} was not accepted"));
        }
    }

    report(&engine, &mut out);
    Ok(exit_code(engine.state()))
}

struct Driver<'a> {
    engine: &'a mut ScriptEngine,
    out: &'a mut StyledOutput,
    object_id: Uuid,
    time_slice: Duration,
    debug: bool,
}

impl Driver<'_> {
    /// Run quanta until nothing is runnable
    fn drain(&mut self) {
        while self.engine.is_runnable() {
            let quantum = self
                .engine
                .run_quanta(self.debug, self.object_id, self.time_slice);
            if self.debug {
                self.out.dim(&format!(
                    "-- quantum: {} instructions, {} events, {}",
                    quantum.instructions,
                    quantum.events_processed,
                    self.engine.state().name()
                ));
                self.out.dim(&self.engine.registers().to_string());
            }
        }
        self.out.flush();
    }
}

fn report(engine: &ScriptEngine, out: &mut StyledOutput) {
    let stats = engine.stats();
    let secs = stats.busy_time.as_secs_f64();
    let rate = if secs > 0.0 {
        stats.instructions as f64 / secs
    } else {
        0.0
    };

    out.info(&format!("{} instructions in {:.6} seconds", stats.instructions, secs));
    out.info(&format!("{:.3}K instructions per second", rate / 1000.0));

    match engine.state() {
        ExecutionState::Faulted(fault) => out.error(&format!(
            "Fault: {} at ip 0x{:X}: {}",
            fault.kind(),
            fault.ip,
            fault.error
        )),
        ExecutionState::WaitingForEvent => out.success(&format!(
            "Waiting for events in state {}",
            engine.current_state_name()
        )),
        state => out.success(&format!("Script {}", state.name())),
    }
}

fn exit_code(state: &ExecutionState) -> i32 {
    match state {
        ExecutionState::Faulted(_) => 1,
        _ => 0,
    }
}
