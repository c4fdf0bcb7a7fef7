//! Tracing setup for the CLI and tests.
//!
//! Events go to stderr so that stdout stays free for progress lines and
//! JSON printed by the binary.

use tracing_subscriber::{fmt, EnvFilter};

use crate::config::LoggingConfig;

/// Filter used when neither `RUST_LOG` nor the configured level parses.
const FALLBACK_LEVEL: &str = "info";

/// Resolve the event filter: `RUST_LOG` first, then `config.level`.
pub fn log_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new(FALLBACK_LEVEL))
}

/// Install the global subscriber.
///
/// Returns `false` when a subscriber was already installed, which is
/// harmless (tests may call this repeatedly).
pub fn init_logging(config: &LoggingConfig) -> bool {
    let builder = fmt::Subscriber::builder()
        .with_env_filter(log_filter(config))
        .with_writer(std::io::stderr);

    let installed = if config.json {
        tracing::subscriber::set_global_default(builder.json().with_current_span(false).finish())
    } else {
        // Export workers run on the blocking pool; thread names tell parts apart.
        tracing::subscriber::set_global_default(
            builder
                .with_target(false)
                .with_thread_names(config.level.contains("debug"))
                .finish(),
        )
    };
    installed.is_ok()
}
