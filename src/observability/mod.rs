//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! config.observability + RUST_LOG
//!     → logging.rs (EnvFilter + pretty or JSON fmt layer)
//!
//! main.rs
//!     → run span carrying a UUID v4 run id
//!     → every deploy / verify / scenario event nests under it
//! ```

pub mod logging;

pub use logging::{init_logging, run_span};
