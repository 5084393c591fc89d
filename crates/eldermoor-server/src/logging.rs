//! Structured logging for the server process.
//!
//! Console output goes through the `tracing` subscriber with uptime
//! timestamps and module targets; debug builds additionally write JSON lines
//! to a file for post-mortem reading. The filter honours `RUST_LOG` first and
//! falls back to the configured log level.

use std::path::Path;

use eldermoor_config::Config;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global tracing subscriber.
///
/// `log_dir` is only used in debug builds, for the JSON file layer. The
/// configured `debug.log_level` seeds the filter unless `RUST_LOG` is set.
pub fn init_logging(log_dir: Option<&Path>, debug_build: bool, config: Option<&Config>) {
    let filter_str = match config {
        Some(config) if !config.debug.log_level.is_empty() => config.debug.log_level.clone(),
        _ => "info".to_string(),
    };

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&filter_str));

    let console_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        // The game thread is named; worth showing next to net-task output.
        .with_thread_names(true)
        .with_level(true)
        .with_timer(fmt::time::uptime());

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer);

    if debug_build
        && let Some(log_dir) = log_dir
        && std::fs::create_dir_all(log_dir).is_ok()
        && let Ok(log_file) = std::fs::File::create(log_dir.join("eldermoor.log"))
    {
        let file_layer = fmt::layer()
            .with_writer(log_file)
            .with_ansi(false)
            .with_target(true)
            .with_timer(fmt::time::uptime())
            .json();

        subscriber.with(file_layer).init();
        return;
    }

    subscriber.init();
}

/// The filter used when neither `RUST_LOG` nor the config says otherwise.
pub fn default_env_filter() -> EnvFilter {
    EnvFilter::new("info")
}
