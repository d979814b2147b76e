//! Lifecycle management.
//!
//! The only lifecycle event a run has is an early stop: Ctrl-C cancels
//! explorer polling. Deployment transactions already sent stay on chain.

pub mod shutdown;

pub use shutdown::Shutdown;
