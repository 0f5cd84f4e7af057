//! CLI command definitions for the `hourglass` binary.

pub mod show;
pub mod simulate;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use clap_complete::Shell;

use hourglass_types::session::TemplateLength;

/// Turn-based collaborative story sessions.
#[derive(Parser)]
#[command(name = "hourglass", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Log line format.
    #[arg(long, value_enum, default_value_t = LogFormatArg::Pretty, global = true)]
    pub log_format: LogFormatArg,

    /// Export spans to stdout via OpenTelemetry.
    #[arg(long, global = true)]
    pub otel: bool,

    /// Data directory holding `config.toml` and `hourglass.db`.
    #[arg(long, env = "HOURGLASS_DATA_DIR", global = true)]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LogFormatArg {
    Pretty,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the REST API server.
    Serve {
        /// Port to listen on.
        #[arg(short, long, default_value = "3000")]
        port: u16,

        /// Host to bind to.
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
    },

    /// Run a session end to end in memory and print its vault entry.
    Simulate {
        /// Story length class.
        #[arg(long, default_value = "quick")]
        length: TemplateLength,

        /// Genre flavoring the intro (heist, fantasy, comedy, ...).
        #[arg(long)]
        genre: Option<String>,

        /// Number of turns answered by simulated players; the rest expire.
        #[arg(long, default_value = "2")]
        answered: usize,

        /// Wait out the real one-minute deadlines instead of firing them.
        #[arg(long)]
        wait: bool,
    },

    /// Show a stored session with its turns.
    Show {
        /// Session id.
        id: String,
    },

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}
