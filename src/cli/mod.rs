//! Command line interface for stackpilot.
//!
//! Argument parsing, logging setup, command dispatch and user feedback.

mod args;
pub mod commands;
mod output;

pub use args::{Args, Command, RestoreCommand, RuntimeConfig, SourceArgs};
pub use commands::execute_command;
pub use output::OutputManager;

use crate::error::Result;

/// Main CLI entry point
pub async fn run() -> Result<i32> {
    let args = Args::parse_args();
    init_logging(args.verbose);
    execute_command(args).await
}

/// Install the env_logger backend.
///
/// `RUST_LOG` wins when set; otherwise `-v` shows debug output from this
/// crate and the default is warnings only.
pub fn init_logging(verbose: bool) {
    let default_filter = if verbose { "stackpilot=debug" } else { "warn" };
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp(None)
        .try_init();
}
