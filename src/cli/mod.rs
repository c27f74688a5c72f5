//! Scoreline CLI
//!
//! Commands:
//! - `scoreline collect` - Score upcoming matches and persist picks
//! - `scoreline learn` - Derive calibration adjustments from resolved picks
//! - `scoreline report` - Show the learner analysis without writing anything
//! - `scoreline run` - Pick cycle, then learning when the schedule says so
//! - `scoreline migrate` - Apply database migrations

pub mod output;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "scoreline")]
#[command(version = "0.1.0")]
#[command(
    about = "Football pick scoring engine with a self-calibrating learning loop",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config directory (default.toml plus $SCORELINE_ENV.toml)
    #[arg(short, long, global = true, default_value = "config", env = "SCORELINE_CONFIG_DIR")]
    pub config: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one pick cycle over upcoming matches
    Collect {
        /// Upcoming-match window in hours (default: pipeline.hours_ahead)
        #[arg(long)]
        hours: Option<u32>,
    },

    /// Run one learning cycle over resolved picks
    Learn {
        /// Trailing window in days (default: learner.window_days)
        #[arg(long)]
        days: Option<u32>,
    },

    /// Print calibration, market, league and timing performance
    Report {
        /// Trailing window in days (default: learner.window_days)
        #[arg(long)]
        days: Option<u32>,
        /// Output JSON instead of tables
        #[arg(long)]
        json: bool,
    },

    /// Pick cycle followed by a learning cycle when one is due
    Run {
        /// Upcoming-match window in hours (default: pipeline.hours_ahead)
        #[arg(long)]
        hours: Option<u32>,
    },

    /// Apply pending database migrations
    Migrate,
}

impl Commands {
    pub fn name(&self) -> &'static str {
        match self {
            Commands::Collect { .. } => "collect",
            Commands::Learn { .. } => "learn",
            Commands::Report { .. } => "report",
            Commands::Run { .. } => "run",
            Commands::Migrate => "migrate",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_collect_hours() {
        let cli = Cli::try_parse_from(["scoreline", "collect", "--hours", "24"]).unwrap();
        assert!(matches!(cli.command, Commands::Collect { hours: Some(24) }));
        assert_eq!(cli.config, "config");
    }

    #[test]
    fn test_parse_report_json_with_global_config() {
        let cli =
            Cli::try_parse_from(["scoreline", "report", "--days", "30", "--json", "-c", "/etc/sl"])
                .unwrap();
        match cli.command {
            Commands::Report { days, json } => {
                assert_eq!(days, Some(30));
                assert!(json);
            }
            other => panic!("unexpected command {other:?}"),
        }
        assert_eq!(cli.config, "/etc/sl");
    }

    #[test]
    fn test_learn_defaults_to_config_window() {
        let cli = Cli::try_parse_from(["scoreline", "learn"]).unwrap();
        assert!(matches!(cli.command, Commands::Learn { days: None }));
        assert_eq!(cli.command.name(), "learn");
    }
}
