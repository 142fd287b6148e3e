use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;
use tracing_subscriber::Registry;

use crate::settings::LogSettings;

const LOG_FILE_PREFIX: &str = "benchlaunch.log";

/// Level directive for the given settings and number of `-v` flags
pub fn level_directive(settings: &LogSettings, verbose: u8) -> String {
    match verbose {
        0 => settings.level.clone(),
        1 => "debug".to_string(),
        _ => "trace".to_string(),
    }
}

/// Sets up the logging system with a stderr layer and, when a log directory is
/// configured, a daily-rolling file layer.
///
/// `RUST_LOG` takes precedence over the configured level. The returned guard must be
/// held until exit so buffered file output is flushed.
pub fn setup_logging(settings: &LogSettings, verbose: u8) -> Result<Option<WorkerGuard>> {
    let directive = level_directive(settings, verbose);
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&directive))
        .with_context(|| format!("Invalid log level '{}'", directive))?;

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact();

    let mut guard = None;
    let mut json_layer = None;
    let mut text_layer = None;
    if let Some(dir) = &settings.directory {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
        let appender = RollingFileAppender::new(Rotation::DAILY, dir, LOG_FILE_PREFIX);
        let (writer, worker_guard) = tracing_appender::non_blocking(appender);
        guard = Some(worker_guard);
        if settings.json {
            json_layer = Some(fmt::layer().json().with_writer(writer));
        } else {
            text_layer = Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_file(true)
                    .with_line_number(true)
                    .with_writer(writer),
            );
        }
    }

    Registry::default()
        .with(env_filter)
        .with(console_layer)
        .with(json_layer)
        .with(text_layer)
        .try_init()
        .context("Failed to initialize logging")?;

    Ok(guard)
}
