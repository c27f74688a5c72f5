use thiserror::Error;

/// Main error type for the scoring engine
#[derive(Error, Debug)]
pub enum ScorelineError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // Database errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Store call timed out: {op}")]
    StoreTimeout { op: String },

    // Serialization errors
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    // Input errors
    #[error("Input missing: {0}")]
    InputMissing(String),

    #[error("Unknown market: {0}")]
    UnknownMarket(String),

    // Validation errors
    #[error("Validation failed: {0}")]
    Validation(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

/// Result type alias for ScorelineError
pub type Result<T> = std::result::Result<T, ScorelineError>;

impl ScorelineError {
    /// Connection-level failures that a reconnect and a single retry may cure.
    pub fn is_transient(&self) -> bool {
        match self {
            ScorelineError::StoreTimeout { .. } => true,
            ScorelineError::Database(err) => is_transient_sqlx(err),
            _ => false,
        }
    }

    /// Failures that must abort the cycle with a non-zero exit.
    pub fn is_fatal(&self) -> bool {
        match self {
            ScorelineError::Config(_)
            | ScorelineError::InvalidConfig(_)
            | ScorelineError::Migration(_) => true,
            ScorelineError::Database(err) => is_fatal_sqlx(err),
            _ => false,
        }
    }
}

fn is_transient_sqlx(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Io(_)
        | sqlx::Error::PoolClosed
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::WorkerCrashed => true,
        sqlx::Error::Protocol(msg) => msg.contains("closed"),
        // 57014 = query_canceled (statement_timeout), 08xxx = connection exceptions
        sqlx::Error::Database(db) => db
            .code()
            .map(|code| code == "57014" || code.starts_with("08"))
            .unwrap_or(false),
        _ => false,
    }
}

fn is_fatal_sqlx(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Configuration(_) | sqlx::Error::Tls(_) => true,
        // 28xxx = invalid authorization, 3D000 = unknown database, 42P01 = missing table
        sqlx::Error::Database(db) => db
            .code()
            .map(|code| code.starts_with("28") || code == "3D000" || code == "42P01")
            .unwrap_or(false),
        _ => false,
    }
}
