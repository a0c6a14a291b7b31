//! Logging configuration for LoiLibre

use std::path::Path;

use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::fmt::{
    self,
};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::Registry;

use crate::config::AppConfig;
use crate::Result;

const LOG_FILE_PREFIX: &str = "loilibre.log";

/// Initialize logging with configuration
pub fn init_logging_with_config(config: Option<&AppConfig>) -> Result<()> {
    match config {
        Some(config) => init_logging(&config.logging.level, &config.logging.directory),
        None => {
            // Fallback to environment variable or default
            let level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
            init_logging(&level, "logs")
        }
    }
}

/// Initialize logging with a level and log directory, console and daily rolling file
pub fn init_logging(level: &str, directory: &str) -> Result<()> {
    // Create logs directory if it doesn't exist
    let logs_dir = Path::new(directory);
    if !logs_dir.exists() {
        std::fs::create_dir_all(logs_dir)?;
    }

    let env_filter = EnvFilter::try_new(format!("{level},loilibre={level}"))
        .unwrap_or_else(|_| EnvFilter::new("info,loilibre=debug"));

    let file_appender = tracing_appender::rolling::daily(logs_dir, LOG_FILE_PREFIX);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let console_layer = fmt::layer()
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_writer(std::io::stderr);

    let file_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_writer(non_blocking)
        .with_ansi(false); // No colors in file

    Registry::default()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| crate::LoiLibreError::ConfigError(format!("logging already set up: {e}")))?;

    tracing::info!("Logging initialized with level: {}", level);
    tracing::info!(
        "Log files will be saved to: {}/{}.YYYY-MM-DD",
        directory,
        LOG_FILE_PREFIX
    );

    // The writer must outlive main; leak the guard so buffered lines flush
    std::mem::forget(guard);

    Ok(())
}

/// Initialize simple console logging for testing
pub fn init_simple_logging() -> Result<()> {
    tracing_subscriber::fmt()
        .with_target(true)
        .with_max_level(tracing::Level::INFO)
        .try_init()
        .map_err(|e| crate::LoiLibreError::ConfigError(format!("logging already set up: {e}")))?;

    tracing::info!("Simple logging initialized");
    Ok(())
}
