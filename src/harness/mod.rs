//! Mainnet-fork test harness.
//!
//! Drives the deployed contracts on an Anvil fork: impersonates token
//! holders, funds accounts, submits swaps and liquidity operations, then
//! asserts on emitted events and balance deltas.

pub mod assertions;
pub mod erc20;
pub mod fork;
pub mod scenarios;

pub use assertions::{
    check_deposit, check_swap_deltas, require_event, BalanceSnapshot, DepositRecord, HarnessError,
    HarnessResult,
};
pub use erc20::{call_view, send_call, Erc20};
pub use fork::{ForkNode, NodeAccount};
pub use scenarios::{Scenario, ScenarioReport, Scenarios, SwapKind, SwapOutcome};
