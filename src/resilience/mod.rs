//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Waiting on an eventually-consistent service (block explorer):
//!     → backoff.rs (policy: initial delay, exponential growth, cap, jitter)
//!     → poll.rs (bounded attempts, overall deadline, shutdown cancellation)
//! ```
//!
//! # Design Decisions
//! - Every wait has both an attempt budget and a wall-clock deadline
//! - Probes decide what is transient (Pending) and what is fatal (Err)
//! - Cancellation comes from the lifecycle shutdown signal

pub mod backoff;
pub mod poll;

pub use backoff::{calculate_backoff, BackoffPolicy};
pub use poll::{poll_with_backoff, PollError, Probe};
