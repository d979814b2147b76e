//! Deployment, explorer verification and mainnet-fork scenarios for the
//! TokenSwap / LiquidityManager Uniswap V3 contracts.

pub mod config;
pub mod blockchain;
pub mod contracts;
pub mod deploy;
pub mod verify;
pub mod harness;
pub mod lifecycle;
pub mod observability;
pub mod resilience;

pub use config::schema::DeployConfig;
pub use deploy::{Deployer, Deployment};
pub use lifecycle::Shutdown;
pub use verify::Verifier;
