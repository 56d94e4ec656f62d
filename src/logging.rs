// Logging - tracing subscriber setup for the CLI

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub const DEFAULT_FILTER: &str = "info";

/// Install the global subscriber.
///
/// `RUST_LOG` wins over `level`; an empty `level` falls back to [`DEFAULT_FILTER`].
/// Calling this twice is harmless, the second install is ignored.
pub fn init_logging(level: &str) {
    let directive = if level.trim().is_empty() {
        DEFAULT_FILTER
    } else {
        level
    };

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive));

    let console_layer = fmt::layer()
        .with_target(true)
        .with_level(true)
        .with_writer(std::io::stderr);

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .try_init();
}
