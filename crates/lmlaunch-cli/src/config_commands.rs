//! `config` subcommands.

use clap::Subcommand;

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Print the current settings as JSON
    Show,

    /// Print the settings file location
    Path,

    /// Set one value, e.g. `llamacpp.port 8081` or `general.model "a.gguf [llama.cpp]"`
    Set {
        /// Dotted key: `<section>.<field>`
        key: String,
        /// JSON value; anything that is not valid JSON is taken as a string
        value: String,
    },

    /// Restore the default settings
    Reset,
}
