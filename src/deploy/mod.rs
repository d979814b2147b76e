//! Contract deployment.
//!
//! # Data Flow
//! ```text
//! ArtifactStore (creation bytecode)
//!     → Deployer::deploy_all
//!         1. TokenSwap                     → confirmed receipt
//!         2. LiquidityManager(tokenSwap)   → confirmed receipt
//!     → Deployment
//! ```
//!
//! Any failure aborts the rest of the sequence. Nothing is retried and
//! contracts already created are left in place.

pub mod deployer;

pub use deployer::{DeployError, DeployedContract, Deployer, Deployment};
