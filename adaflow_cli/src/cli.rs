//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "adaflow", version, about = "Adaptive flow controller CLI")]
pub struct Cli {
    /// Path to config TOML (typed)
    #[arg(long, value_name = "FILE", default_value = "etc/adaflow.toml")]
    pub config: PathBuf,

    /// Path to the persisted state store
    #[arg(long, value_name = "FILE", default_value = "adaflow_state.toml")]
    pub state: PathBuf,

    /// Print replies as JSON instead of text
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace)
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "info")]
    pub log_level: String,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a session against the simulated printer
    Run {
        /// Material profile to print with
        #[arg(long, default_value = "pla")]
        material: String,
        /// Session length in seconds
        #[arg(long, value_name = "SECONDS", default_value_t = 30)]
        seconds: u64,
        /// Stream this G-code file through the command tap instead of the
        /// built-in demo toolpath
        #[arg(long, value_name = "FILE")]
        gcode: Option<PathBuf>,
        /// Enable real-time setup (SCHED_FIFO + mlockall, Linux only)
        #[arg(long, action = ArgAction::SetTrue)]
        rt: bool,
    },
    /// Show controller status for a material (store-backed, no session)
    Status {
        #[arg(long, default_value = "pla")]
        material: String,
    },
    /// Set the persisted pressure advance for a material
    SetPa {
        #[arg(long)]
        material: String,
        #[arg(long)]
        value: f32,
    },
    /// Read the pressure advance for a material
    GetPa {
        #[arg(long)]
        material: String,
    },
    /// Set a named control gain for this invocation's profile
    SetGain {
        #[arg(long)]
        name: String,
        #[arg(long)]
        value: f32,
        #[arg(long, default_value = "pla")]
        material: String,
    },
    /// Cap the boosted target temperature
    SetMaxTemp {
        #[arg(long)]
        value: f32,
        #[arg(long, default_value = "pla")]
        material: String,
    },
    /// Clear all persisted learned state
    ResetState,
}
