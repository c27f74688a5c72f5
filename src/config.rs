use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub learner: LearnerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub name: String,
    pub user: String,
    #[serde(default)]
    pub password: String,
    /// Maximum connections in pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Per-call timeout applied to every store query
    #[serde(default = "default_statement_timeout_ms")]
    pub statement_timeout_ms: u64,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

fn default_max_connections() -> u32 {
    2
}

fn default_statement_timeout_ms() -> u64 {
    10_000
}

fn default_connect_timeout_ms() -> u64 {
    5_000
}

impl DatabaseConfig {
    pub fn statement_timeout(&self) -> Duration {
        Duration::from_millis(self.statement_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

/// Pick cycle parameters
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Upcoming-match window in hours
    #[serde(default = "default_hours_ahead")]
    pub hours_ahead: u32,
    /// Picks scoring below this are dropped
    #[serde(default = "default_min_score")]
    pub min_score: f64,
    /// Number of picks per match flagged as top-k
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Bookmaker whose snapshot series feeds the CLV validator
    #[serde(default = "default_gold_bookmaker")]
    pub gold_bookmaker: String,
}

fn default_hours_ahead() -> u32 {
    48
}

fn default_min_score() -> f64 {
    55.0
}

fn default_top_k() -> usize {
    3
}

fn default_gold_bookmaker() -> String {
    "pinnacle".to_string()
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            hours_ahead: default_hours_ahead(),
            min_score: default_min_score(),
            top_k: default_top_k(),
            gold_bookmaker: default_gold_bookmaker(),
        }
    }
}

/// Learning cycle parameters
#[derive(Debug, Clone, Deserialize)]
pub struct LearnerConfig {
    /// Trailing window of resolved picks, in days
    #[serde(default = "default_window_days")]
    pub window_days: u32,
    /// Minimum resolved picks per bucket/market/league
    #[serde(default = "default_min_samples")]
    pub min_samples: usize,
    /// Never learn more often than this
    #[serde(default = "default_min_interval_hours")]
    pub min_interval_hours: i64,
    /// Always learn once this much time has passed
    #[serde(default = "default_max_interval_hours")]
    pub max_interval_hours: i64,
    /// New resolved picks needed to learn before the max interval
    #[serde(default = "default_min_new_samples")]
    pub min_new_samples: i64,
}

fn default_window_days() -> u32 {
    60
}

fn default_min_samples() -> usize {
    3
}

fn default_min_interval_hours() -> i64 {
    24
}

fn default_max_interval_hours() -> i64 {
    168
}

fn default_min_new_samples() -> i64 {
    20
}

impl Default for LearnerConfig {
    fn default() -> Self {
        Self {
            window_days: default_window_days(),
            min_samples: default_min_samples(),
            min_interval_hours: default_min_interval_hours(),
            max_interval_hours: default_max_interval_hours(),
            min_new_samples: default_min_new_samples(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Enable JSON formatted logs
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl AppConfig {
    /// Load configuration from files and environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("config")
    }

    /// Load configuration from a specific directory
    pub fn load_from<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();

        let builder = Config::builder()
            // Start with default values
            .set_default("database.host", "localhost")?
            .set_default("database.port", 5432)?
            .set_default("database.name", "scoreline")?
            .set_default("database.user", "postgres")?
            .set_default("database.password", "")?
            .set_default("logging.level", "info")?
            .set_default("logging.json", false)?
            // Load default config file
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Load environment-specific config (e.g., config/production.toml)
            .add_source(
                File::from(config_dir.join(
                    std::env::var("SCORELINE_ENV").unwrap_or_else(|_| "development".to_string()),
                ))
                .required(false),
            )
            // Override with environment variables (SCORELINE__DATABASE__HOST, etc.)
            .add_source(
                Environment::with_prefix("SCORELINE")
                    .separator("__")
                    .try_parsing(true),
            )
            // Plain store connection variables win over everything else
            .set_override_option("database.host", std::env::var("DB_HOST").ok())?
            .set_override_option("database.port", std::env::var("DB_PORT").ok())?
            .set_override_option("database.name", std::env::var("DB_NAME").ok())?
            .set_override_option("database.user", std::env::var("DB_USER").ok())?
            .set_override_option("database.password", std::env::var("DB_PASSWORD").ok())?;

        builder.build()?.try_deserialize()
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.database.host.trim().is_empty() {
            errors.push("database.host must not be empty".to_string());
        }
        if self.database.port == 0 {
            errors.push("database.port must be non-zero".to_string());
        }
        if self.database.max_connections == 0 {
            errors.push("database.max_connections must be at least 1".to_string());
        }
        if self.database.statement_timeout_ms == 0 {
            errors.push("database.statement_timeout_ms must be positive".to_string());
        }

        if self.pipeline.hours_ahead == 0 {
            errors.push("pipeline.hours_ahead must be positive".to_string());
        }
        if !(20.0..=85.0).contains(&self.pipeline.min_score) {
            errors.push(format!(
                "pipeline.min_score must lie in [20, 85], got {}",
                self.pipeline.min_score
            ));
        }
        if self.pipeline.top_k == 0 {
            errors.push("pipeline.top_k must be at least 1".to_string());
        }

        if self.learner.window_days == 0 {
            errors.push("learner.window_days must be positive".to_string());
        }
        if self.learner.min_samples == 0 {
            errors.push("learner.min_samples must be at least 1".to_string());
        }
        if self.learner.min_interval_hours > self.learner.max_interval_hours {
            errors.push(
                "learner.min_interval_hours should not exceed learner.max_interval_hours"
                    .to_string(),
            );
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
