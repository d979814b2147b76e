//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! .env (dotenvy, binary only)
//!     → config file (TOML, optional)
//!     → loader.rs (parse, overlay ETHERSCAN_KEY / DEPLOY_NETWORK / ...)
//!     → validation.rs (semantic checks)
//!     → DeployConfig (validated, immutable)
//!     → passed by reference to deployer, verifier and harness
//! ```
//!
//! # Design Decisions
//! - The environment is read once, at start-up
//! - All fields have defaults to allow minimal configs
//! - A missing explorer key disables verification, never deployment

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, resolve_config, ConfigError};
pub use schema::{
    known_network, ArtifactsConfig, CompilerConfig, DeployConfig, ExplorerConfig, NetworkConfig,
    ObservabilityConfig, VerificationConfig, KNOWN_NETWORKS,
};
