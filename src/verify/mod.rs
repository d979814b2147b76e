//! Explorer source verification.
//!
//! # Data Flow
//! ```text
//! Deployment / addresses
//!     → verifier.rs, per contract:
//!         1. eth_getCode on our node (address is live)
//!         2. poll explorer eth_getCode until indexed   ┐
//!         3. submit standard-JSON input                ├ backoff + deadline + Ctrl-C
//!         4. poll checkverifystatus until decided      ┘
//!     → VerificationReport (one outcome per contract)
//! ```
//!
//! # Design Decisions
//! - A failure on one contract never stops the other
//! - Verification never changes the deployment result or exit code
//! - Missing API key or a local network skips verification with an error log

pub mod explorer;
pub mod verifier;

pub use explorer::{ExplorerClient, ExplorerError, Submission, VerificationRequest, VerificationStatus};
pub use verifier::{
    ContractVerification, VerificationOutcome, VerificationReport, VerificationTarget, Verifier,
};
