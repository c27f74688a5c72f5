use scoreline::config::LoggingConfig;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// Console logging, plus a daily-rotating file when `SCORELINE_LOG_DIR` is
/// set and writable. The returned guard flushes the file writer on drop.
pub fn init_logging(config: &LoggingConfig) -> Option<WorkerGuard> {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{},sqlx=warn", config.level)));

    // `tracing_appender::rolling::daily` panics if it cannot create the first
    // file, so writability is checked up front.
    let log_dir = std::env::var("SCORELINE_LOG_DIR").ok();
    let mut guard = None;
    let file_layer = match log_dir.as_deref() {
        Some(dir) if std::fs::create_dir_all(dir).is_ok() => {
            let test_path = std::path::Path::new(dir).join(".scoreline_write_test");
            match std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&test_path)
            {
                Ok(_) => {
                    let _ = std::fs::remove_file(&test_path);
                    let file_appender = tracing_appender::rolling::daily(dir, "scoreline.log");
                    let (non_blocking, file_guard) = tracing_appender::non_blocking(file_appender);
                    guard = Some(file_guard);
                    Some(
                        tracing_subscriber::fmt::layer()
                            .json()
                            .with_writer(non_blocking)
                            .with_ansi(false)
                            .with_target(true),
                    )
                }
                Err(e) => {
                    eprintln!(
                        "Warning: Could not write to log directory {} ({}), file logging disabled",
                        dir, e
                    );
                    None
                }
            }
        }
        Some(dir) => {
            eprintln!(
                "Warning: Could not create log directory {}, file logging disabled",
                dir
            );
            None
        }
        None => None,
    };

    let (plain_layer, json_layer) = if config.json {
        (
            None,
            Some(tracing_subscriber::fmt::layer().json().with_target(true)),
        )
    } else {
        (
            Some(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            ),
            None,
        )
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(plain_layer)
        .with(json_layer)
        .with(file_layer)
        .init();

    if let (Some(dir), Some(_)) = (log_dir.as_deref(), guard.as_ref()) {
        eprintln!("Logging to: {}/scoreline.log", dir);
    }
    guard
}
