use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Arc;

use color_eyre::Result;
use color_eyre::eyre::Context;
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

/// Console level used when neither `--log-level` nor `LOG_LEVEL` is given.
/// `DEBUG=1` raises it to debug.
pub fn default_console_level() -> &'static str {
    match std::env::var("DEBUG") {
        Ok(value) if matches!(value.trim(), "1" | "true" | "yes") => "debug",
        _ => "info",
    }
}

/// Install the global subscriber: a console layer at `console_level` and,
/// when `log_file` is set, a plain text file layer at `file_level`.
pub fn init_tracing(console_level: &str, log_file: Option<&Path>, file_level: &str) -> Result<()> {
    let console_filter =
        EnvFilter::try_new(console_level).wrap_err("Failed to create console tracing filter")?;
    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(console_filter);

    let file_layer = match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .wrap_err_with(|| format!("Failed to open log file: {}", path.display()))?;
            let file_filter =
                EnvFilter::try_new(file_level).wrap_err("Failed to create file tracing filter")?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(Arc::new(file))
                    .with_filter(file_filter),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .wrap_err("Failed to install tracing subscriber")?;

    Ok(())
}
