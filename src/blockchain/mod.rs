//! Blockchain integration subsystem.
//!
//! # Data Flow
//! ```text
//! Environment Variables (private key) + NetworkConfig
//!     → wallet.rs (key loading, signing)
//!     → client.rs (RPC connection with timeouts, receipt polling)
//!     → transaction.rs (build, sign, broadcast, confirm)
//! ```
//!
//! # Security Constraints
//! - Private keys ONLY from environment variables
//! - Never log private keys or sensitive data
//! - All RPC calls have configurable timeouts

pub mod client;
pub mod transaction;
pub mod types;
pub mod wallet;

pub use client::BlockchainClient;
pub use transaction::{TransactionSender, TxBuilder};
pub use types::{BlockchainError, BlockchainResult, ChainId, NetworkConfig};
pub use wallet::Wallet;
