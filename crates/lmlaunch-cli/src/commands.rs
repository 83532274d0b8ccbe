//! Top-level subcommands.

use clap::Subcommand;

use crate::config_commands::ConfigCommand;

/// Available commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Start the selected model and supervise it until Ctrl+C
    Serve {
        /// Model label to run instead of the configured one (see `models`)
        #[arg(short, long)]
        model: Option<String>,

        /// Do not echo the server's output
        #[arg(short, long)]
        quiet: bool,

        /// Seconds between telemetry summaries
        #[arg(long, default_value_t = 30)]
        stats_interval: u64,
    },

    /// List models found in the model directory
    Models,

    /// Show metadata for a model without starting it
    Info {
        /// Model label; defaults to the configured model
        label: Option<String>,

        /// Also print the tensor table
        #[arg(long)]
        tensors: bool,
    },

    /// Show or change settings
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}
