use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry};

use crate::config::{LogFormat, LoggingConfig};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Install the global subscriber: stdout plus an optional daily rolling file.
///
/// Keep the returned guard alive for the life of the process, dropping it
/// flushes the file writer.
pub fn init_logger(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_new(resolve_filter(config, std::env::var("RUST_LOG").ok()))
        .context("Invalid log filter")?;
    let format = resolve_format(config, std::env::var("LOG_FORMAT").ok());

    let mut layers: Vec<BoxedLayer> = vec![stdout_layer(format)];

    let guard = if config.directory.trim().is_empty() {
        None
    } else {
        let appender = RollingFileAppender::builder()
            .rotation(Rotation::DAILY)
            .filename_prefix(&config.file_prefix)
            .filename_suffix("log")
            .build(&config.directory)
            .with_context(|| format!("Failed to open log directory {}", config.directory))?;
        let (writer, guard) = tracing_appender::non_blocking(appender);

        // Files are always JSON so they can be shipped as-is
        layers.push(
            fmt::layer()
                .json()
                .with_writer(writer)
                .with_target(true)
                .with_thread_ids(true)
                .with_ansi(false)
                .boxed(),
        );
        Some(guard)
    };

    tracing_subscriber::registry()
        .with(layers)
        .with(filter)
        .try_init()
        .context("Logger already initialized")?;

    Ok(guard)
}

fn stdout_layer(format: LogFormat) -> BoxedLayer {
    match format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_writer(std::io::stdout)
            .with_target(true)
            .with_thread_ids(true)
            .boxed(),
        LogFormat::Pretty => fmt::layer()
            .pretty()
            .with_writer(std::io::stdout)
            .with_target(true)
            .boxed(),
    }
}

fn resolve_filter(config: &LoggingConfig, env: Option<String>) -> String {
    env.filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| config.level.clone())
}

fn resolve_format(config: &LoggingConfig, env: Option<String>) -> LogFormat {
    match env.as_deref().map(str::trim) {
        Some(v) if v.eq_ignore_ascii_case("json") => LogFormat::Json,
        Some(v) if v.eq_ignore_ascii_case("pretty") => LogFormat::Pretty,
        _ => config.format,
    }
}
