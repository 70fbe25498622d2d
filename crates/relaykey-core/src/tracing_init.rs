//! Shared tracing/logging initialization.
//!
//! Logs always go to stderr so command output on stdout stays
//! machine-readable. `RUST_LOG` wins over the configured level.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::LoggingConfig;

/// Filter directive for a configured level. A bare level such as `debug`
/// is scoped to the `relaykey` crates; anything containing `=` or `,` is
/// taken as a full directive.
pub fn filter_directive(level: &str) -> String {
    let level = level.trim();
    if level.is_empty() {
        "relaykey=info".to_string()
    } else if level.contains('=') || level.contains(',') {
        level.to_string()
    } else {
        format!("relaykey={level}")
    }
}

/// Install the global tracing subscriber described by `logging`.
pub fn init_tracing(logging: &LoggingConfig) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directive(&logging.level)));
    let registry = tracing_subscriber::registry().with(env_filter);
    if logging.json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}
