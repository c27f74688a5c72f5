use clap::Parser;
use scoreline::cli::Cli;
use scoreline::config::{AppConfig, LoggingConfig};
use scoreline::error::ScorelineError;
use std::process::ExitCode;
use tracing::error;

mod main_dispatch;
mod main_runtime;

/// Exit code when the store or configuration is unusable (auth, schema, config)
const EXIT_FATAL: u8 = 2;
/// Exit code when a cycle could not complete for any other reason
const EXIT_FAILED: u8 = 1;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match AppConfig::load_from(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            let _guard = main_runtime::init_logging(&LoggingConfig::default());
            error!(error = %e, dir = %cli.config, "Failed to load configuration");
            return ExitCode::from(EXIT_FATAL);
        }
    };
    let _guard = main_runtime::init_logging(&config.logging);

    if let Err(errors) = config.validate() {
        for e in &errors {
            error!("config: {e}");
        }
        return exit_code(&ScorelineError::InvalidConfig(errors.join("; ")));
    }

    match main_dispatch::run(&cli, &config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(command = cli.command.name(), error = %e, fatal = e.is_fatal(), "Command failed");
            exit_code(&e)
        }
    }
}

fn exit_code(err: &ScorelineError) -> ExitCode {
    if err.is_fatal() {
        ExitCode::from(EXIT_FATAL)
    } else {
        ExitCode::from(EXIT_FAILED)
    }
}
