//! LSO command-line driver
//!
//! Loads compiled LSO images and drives them through the quantum engine:
//! `lso run` executes a script, `lso inspect` prints its tables and code.

mod commands;
mod config;
mod output;

use clap::{Parser, Subcommand};
use commands::{inspect, run};
use std::path::PathBuf;
use tracing_subscriber::filter::EnvFilter;

#[derive(Parser)]
#[command(name = "lso")]
#[command(about = "Run and inspect compiled LSL bytecode", long_about = None)]
#[command(version)]
struct Cli {
    /// Color output: auto, always or never
    #[arg(long, global = true)]
    color: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a compiled image until it finishes, faults or waits for events
    Run {
        /// Image file
        image: PathBuf,
        /// Trace every instruction and dump registers after each quantum
        #[arg(short, long)]
        debug: bool,
        /// Quantum length in seconds (negative values count as zero)
        #[arg(long, allow_negative_numbers = true)]
        time_slice: Option<f64>,
        /// Instruction cap per quantum
        #[arg(long)]
        max_instructions: Option<u64>,
        /// Event to deliver once the script is idle (repeatable)
        #[arg(long = "event", value_name = "NAME")]
        events: Vec<String>,
        /// Engine configuration file (TOML)
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Print an image's header, tables and optionally its code
    Inspect {
        /// Image file
        image: PathBuf,
        /// Disassemble the code section
        #[arg(long)]
        disassemble: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let debug = matches!(cli.command, Commands::Run { debug: true, .. });
    init_tracing(debug)?;

    let color = output::resolve_color_choice(cli.color.as_deref());

    match cli.command {
        Commands::Run {
            image,
            debug,
            time_slice,
            max_instructions,
            events,
            config,
        } => {
            let code = run::execute(
                run::RunArgs {
                    image,
                    debug,
                    time_slice,
                    max_instructions,
                    events,
                    config,
                },
                color,
            )?;
            if code != 0 {
                std::process::exit(code);
            }
        }

        Commands::Inspect { image, disassemble } => {
            inspect::execute(&image, disassemble, color)?;
        }
    }

    Ok(())
}

/// Log to stderr so script chat on stdout stays clean
fn init_tracing(debug: bool) -> anyhow::Result<()> {
    let mut filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if debug {
        filter = filter
            .add_directive("lso_core=trace".parse()?)
            .add_directive("lso_cli=trace".parse()?);
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}
