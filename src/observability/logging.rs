//! Structured logging.
//!
//! `RUST_LOG` wins over `observability.log_level` when set. JSON output is
//! meant for CI logs, the pretty format for terminals.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::ObservabilityConfig;

/// Default directive when `RUST_LOG` is unset.
pub fn default_directive(config: &ObservabilityConfig) -> String {
    format!("uniswap_deployer={},warn", config.log_level)
}

/// Install the global subscriber. Later calls are ignored.
pub fn init_logging(config: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(config)));

    let registry = tracing_subscriber::registry().with(filter);
    let result = if config.json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_current_span(true))
            .try_init()
    } else {
        registry.with(tracing_subscriber::fmt::layer()).try_init()
    };

    if let Err(e) = result {
        eprintln!("logging already initialised: {}", e);
    }
}

/// Span wrapping one CLI run, tagged with a fresh run id.
pub fn run_span(command: &str) -> tracing::Span {
    let run_id = uuid::Uuid::new_v4();
    tracing::info_span!("run", %run_id, command)
}
