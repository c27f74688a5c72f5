use scoreline::adapters::PostgresStore;
use scoreline::cli::output::{self, OutputMode};
use scoreline::cli::{Cli, Commands};
use scoreline::config::AppConfig;
use scoreline::coordinator;
use scoreline::error::Result;
use tracing::info;

pub(crate) async fn run(cli: &Cli, config: &AppConfig) -> Result<()> {
    let now = chrono::Utc::now().naive_utc();
    let store = PostgresStore::connect(&config.database).await?;

    match &cli.command {
        Commands::Migrate => {
            store.migrate().await?;
        }
        Commands::Collect { hours } => {
            let mut pipeline = config.pipeline.clone();
            if let Some(hours) = hours {
                pipeline.hours_ahead = *hours;
            }
            let report = coordinator::run_pick_cycle(&store, &pipeline, now).await?;
            output::print_cycle_report(&report, OutputMode::Table)?;
        }
        Commands::Learn { days } => {
            let days = days.unwrap_or(config.learner.window_days);
            let outcome =
                coordinator::run_learning_cycle(&store, &config.learner, days, now).await?;
            output::print_learn_outcome(&outcome, OutputMode::Table)?;
        }
        Commands::Report { days, json } => {
            let days = days.unwrap_or(config.learner.window_days);
            let report = coordinator::analyze_window(&store, &config.learner, days, now).await?;
            output::print_learning_report(&report, OutputMode::from_json_flag(*json))?;
        }
        Commands::Run { hours } => {
            let mut config = config.clone();
            if let Some(hours) = hours {
                config.pipeline.hours_ahead = *hours;
            }
            let run = coordinator::run_scheduled(&store, &config, now).await?;
            output::print_scheduled_run(&run, OutputMode::Table)?;
        }
    }

    info!(command = cli.command.name(), "Command completed");
    Ok(())
}
