//! Structured logging setup (§2 [NEW] "Structured logging").
//!
//! Directly adapted from the `LoggerImpl::init`
//! (`infrastructure/logging/logger.rs`): env-filter-driven level, JSON or
//! pretty stdout format, optional rotated file output via
//! `tracing-appender`. Same layering approach, generalized role name from
//! "abathur" to "delegate-engine" in the log file prefix.

use anyhow::Result;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::Layer;
use tracing_subscriber::EnvFilter;

use crate::domain::models::config::{LogConfig, LogFormat, RotationPolicy};

/// Holds the non-blocking file appender's guard alive for the process
/// lifetime; dropping it flushes buffered log lines.
pub struct LoggerGuard {
    _guard: Option<WorkerGuard>,
}

/// Initialize the global `tracing` subscriber from `config`. Must be called
/// exactly once, as early as possible in `main`.
pub fn init(config: &LogConfig) -> Result<LoggerGuard> {
    let default_level = parse_log_level(&config.level)?;
    let env_filter = EnvFilter::builder().with_default_directive(default_level.into()).from_env_lossy();

    let guard = if let Some(log_dir) = &config.log_dir {
        let file_appender = match config.rotation {
            RotationPolicy::Daily => rolling::daily(log_dir, "delegate-engine.log"),
            RotationPolicy::Hourly => rolling::hourly(log_dir, "delegate-engine.log"),
            RotationPolicy::Never => rolling::never(log_dir, "delegate-engine.log"),
        };
        let (non_blocking_file, guard) = tracing_appender::non_blocking(file_appender);
        let file_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_writer(non_blocking_file)
            .with_ansi(false)
            .with_target(true)
            .with_filter(env_filter.clone());

        if config.enable_stdout {
            build_registry_with_stdout(file_layer, config.format, env_filter);
        } else {
            tracing_subscriber::registry().with(file_layer).init();
        }
        Some(guard)
    } else {
        build_stdout_only(config.format, env_filter);
        None
    };

    tracing::info!(level = %config.level, format = ?config.format, file_output = config.log_dir.is_some(), "logger initialized");
    Ok(LoggerGuard { _guard: guard })
}

fn build_registry_with_stdout<L>(file_layer: L, format: LogFormat, env_filter: EnvFilter)
where
    L: tracing_subscriber::Layer<tracing_subscriber::Registry> + Send + Sync + 'static,
{
    match format {
        LogFormat::Json => {
            let stdout_layer = tracing_subscriber::fmt::layer().json().with_target(true).with_filter(env_filter);
            tracing_subscriber::registry().with(file_layer).with(stdout_layer).init();
        }
        LogFormat::Pretty => {
            let stdout_layer = tracing_subscriber::fmt::layer()
                .pretty()
                .with_target(true)
                .with_span_events(FmtSpan::CLOSE)
                .with_filter(env_filter);
            tracing_subscriber::registry().with(file_layer).with(stdout_layer).init();
        }
    }
}

fn build_stdout_only(format: LogFormat, env_filter: EnvFilter) {
    match format {
        LogFormat::Json => {
            let stdout_layer = tracing_subscriber::fmt::layer().json().with_target(true).with_filter(env_filter);
            tracing_subscriber::registry().with(stdout_layer).init();
        }
        LogFormat::Pretty => {
            let stdout_layer = tracing_subscriber::fmt::layer()
                .pretty()
                .with_target(true)
                .with_span_events(FmtSpan::CLOSE)
                .with_filter(env_filter);
            tracing_subscriber::registry().with(stdout_layer).init();
        }
    }
}

fn parse_log_level(level: &str) -> Result<Level> {
    match level.to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        other => anyhow::bail!("invalid log level: {other}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_levels_case_insensitively() {
        assert!(matches!(parse_log_level("INFO"), Ok(Level::INFO)));
        assert!(matches!(parse_log_level("warn"), Ok(Level::WARN)));
        assert!(parse_log_level("nonsense").is_err());
    }
}
