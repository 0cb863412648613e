// node/src/logging.rs

//! Tracing subscriber setup. `RUST_LOG` takes precedence over the
//! configured level.

use crate::config::{LogFormat, LoggingConfig};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global subscriber; call once per process
pub fn init_logging(config: &LoggingConfig, debug: bool) {
    let level = if debug { "debug" } else { config.level.as_str() };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    match config.format {
        LogFormat::Human => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_thread_names(true))
                .init();
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_thread_names(true))
                .init();
        }
    }
}
