//! Command execution: one module per top-level command.
//!
//! Every executor returns the process exit code. Errors bubble up here,
//! are printed with recovery suggestions, and become exit code 1.

mod deploy;
mod helpers;
mod restore;
mod status;
mod teardown;

use crate::cli::{Args, Command, RuntimeConfig};
use crate::error::Result;

use deploy::execute_deploy;
use restore::execute_restore;
use status::execute_status;
use teardown::execute_teardown;

/// Execute the main command based on parsed arguments
pub async fn execute_command(args: Args) -> Result<i32> {
    if let Err(validation_error) = args.validate() {
        // Never quiet for validation errors
        let output = super::OutputManager::new(false, false);
        output.error(&format!("Invalid arguments: {validation_error}"));
        return Ok(2);
    }

    let config = RuntimeConfig::from(&args);
    log::debug!("Running '{}' with {:?}", args.command.name(), config.operation);

    let result = match &args.command {
        Command::Deploy { .. } => execute_deploy(&args, &config).await,
        Command::Teardown { .. } => execute_teardown(&args, &config).await,
        Command::Status { .. } => execute_status(&args, &config).await,
        Command::Restore { action } => execute_restore(action, &config).await,
    };

    match result {
        Ok(exit_code) => Ok(exit_code),
        Err(e) => {
            config.error_println(&format!("Command '{}' failed: {e}", args.command.name()));

            let suggestions = e.recovery_suggestions();
            if !suggestions.is_empty() && !config.is_quiet() {
                config.println("\n💡 Recovery suggestions:");
                for suggestion in suggestions {
                    config.println(&format!("  • {suggestion}"));
                }
            }

            Ok(1)
        }
    }
}
