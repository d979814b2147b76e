//! Contract-facing types: ABI bindings, compiled artifacts and event decoding.
//!
//! # Data Flow
//! ```text
//! artifacts/<source>/<Name>.json → artifact.rs (ContractArtifact)
//!     → creation code for the deployer
//! build-info/*.json              → artifact.rs (BuildInfo)
//!     → standard-JSON input for explorer verification
//! receipt logs                   → events.rs (typed events via bindings.rs)
//! ```

pub mod artifact;
pub mod bindings;
pub mod events;

pub use artifact::{ArtifactError, ArtifactStore, BuildInfo, ContractArtifact};
pub use bindings::{LiquidityManager, TokenSwap, IERC20};
pub use events::{find_event, first_event};
