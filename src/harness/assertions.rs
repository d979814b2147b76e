//! Scenario errors and the checks run against receipts and balances.

use alloy::primitives::{Address, TxHash, U256};
use alloy::rpc::types::TransactionReceipt;
use alloy::sol_types::SolEvent;
use thiserror::Error;

use crate::blockchain::{BlockchainClient, BlockchainError};
use crate::contracts::{find_event, ArtifactError};
use crate::deploy::DeployError;
use crate::harness::erc20::Erc20;

/// Errors that fail a scenario.
#[derive(Debug, Error)]
pub enum HarnessError {
    #[error(transparent)]
    Blockchain(#[from] BlockchainError),

    #[error(transparent)]
    Deploy(#[from] DeployError),

    #[error(transparent)]
    Artifact(#[from] ArtifactError),

    #[error("could not start fork node: {0}")]
    NodeSpawn(String),

    #[error("node has no unlocked accounts")]
    NoAccounts,

    #[error("could not decode {call} result: {message}")]
    Decode { call: &'static str, message: String },

    #[error("transaction {tx_hash} did not emit {event}")]
    MissingEvent { event: &'static str, tx_hash: TxHash },

    #[error("{token} balance of {holder}: expected {expected}, got {actual}")]
    BalanceMismatch {
        token: &'static str,
        holder: Address,
        expected: U256,
        actual: U256,
    },

    #[error("assertion failed: {0}")]
    Assertion(String),
}

pub type HarnessResult<T> = Result<T, HarnessError>;

/// Decode the first `E` that `emitter` logged in `receipt`, or fail naming
/// the missing event.
pub fn require_event<E: SolEvent>(receipt: &TransactionReceipt, emitter: Address) -> HarnessResult<E> {
    find_event::<E>(receipt, emitter).ok_or(HarnessError::MissingEvent {
        event: E::SIGNATURE,
        tx_hash: receipt.transaction_hash,
    })
}

/// Fail with `message` unless `condition` holds.
pub fn ensure(condition: bool, message: impl FnOnce() -> String) -> HarnessResult<()> {
    if condition {
        Ok(())
    } else {
        Err(HarnessError::Assertion(message()))
    }
}

/// Token balances of one holder for an input/output pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BalanceSnapshot {
    pub holder: Address,
    pub token_in: U256,
    pub token_out: U256,
}

impl BalanceSnapshot {
    /// Read both balances of `holder`.
    pub async fn take(
        chain: &BlockchainClient,
        holder: Address,
        token_in: &Erc20,
        token_out: &Erc20,
    ) -> HarnessResult<Self> {
        Ok(Self {
            holder,
            token_in: token_in.balance_of(chain, holder).await?,
            token_out: token_out.balance_of(chain, holder).await?,
        })
    }
}

/// Check that a swap moved exactly `spent` of the input token out of the
/// holder's balance and `received` of the output token in.
pub fn check_swap_deltas(
    before: &BalanceSnapshot,
    after: &BalanceSnapshot,
    (token_in, token_out): (&'static str, &'static str),
    spent: U256,
    received: U256,
) -> HarnessResult<()> {
    let expected_in = before.token_in.checked_sub(spent).ok_or_else(|| {
        HarnessError::Assertion(format!(
            "{} spent {} exceeds starting balance {}",
            token_in, spent, before.token_in
        ))
    })?;
    if after.token_in != expected_in {
        return Err(HarnessError::BalanceMismatch {
            token: token_in,
            holder: before.holder,
            expected: expected_in,
            actual: after.token_in,
        });
    }

    let expected_out = before.token_out.saturating_add(received);
    if after.token_out != expected_out {
        return Err(HarnessError::BalanceMismatch {
            token: token_out,
            holder: before.holder,
            expected: expected_out,
            actual: after.token_out,
        });
    }
    Ok(())
}

/// Recorded state of a minted position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DepositRecord {
    pub owner: Address,
    pub liquidity: u128,
    pub token0: Address,
    pub token1: Address,
}

/// Check the manager's deposit record against the expected owner and pair.
pub fn check_deposit(
    deposit: &DepositRecord,
    owner: Address,
    token0: Address,
    token1: Address,
) -> HarnessResult<()> {
    ensure(deposit.owner == owner, || {
        format!("deposit owner {} != {}", deposit.owner, owner)
    })?;
    ensure(deposit.liquidity > 0, || "deposit has zero liquidity".to_string())?;
    ensure(deposit.token0 == token0 && deposit.token1 == token1, || {
        format!(
            "deposit pair ({}, {}) != ({}, {})",
            deposit.token0, deposit.token1, token0, token1
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contracts::TokenSwap;
    use alloy::primitives::{address, B256};

    const HOLDER: Address = address!("60FaAe176336dAb62e284Fe19B885B095d29fB7F");

    fn snapshot(token_in: u64, token_out: u64) -> BalanceSnapshot {
        BalanceSnapshot {
            holder: HOLDER,
            token_in: U256::from(token_in),
            token_out: U256::from(token_out),
        }
    }

    fn receipt_with_logs(logs: serde_json::Value) -> TransactionReceipt {
        let json = serde_json::json!({
            "transactionHash": B256::repeat_byte(7),
            "transactionIndex": "0x0",
            "blockHash": B256::ZERO,
            "blockNumber": "0x1",
            "from": HOLDER,
            "to": Address::repeat_byte(1),
            "cumulativeGasUsed": "0x5208",
            "gasUsed": "0x5208",
            "effectiveGasPrice": "0x1",
            "contractAddress": null,
            "logs": logs,
            "logsBloom": format!("0x{}", "00".repeat(256)),
            "type": "0x2",
            "status": "0x1"
        });
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_swap_deltas_match() {
        check_swap_deltas(&snapshot(1000, 5), &snapshot(900, 8), ("DAI", "WETH"), U256::from(100), U256::from(3))
            .unwrap();
    }

    #[test]
    fn test_swap_deltas_input_mismatch() {
        let err = check_swap_deltas(
            &snapshot(1000, 5),
            &snapshot(950, 8),
            ("DAI", "WETH"),
            U256::from(100),
            U256::from(3),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            HarnessError::BalanceMismatch { token: "DAI", expected, actual, .. }
                if expected == U256::from(900) && actual == U256::from(950)
        ));
    }

    #[test]
    fn test_swap_deltas_output_mismatch() {
        let err = check_swap_deltas(
            &snapshot(1000, 5),
            &snapshot(900, 5),
            ("DAI", "WETH"),
            U256::from(100),
            U256::from(3),
        )
        .unwrap_err();
        assert!(matches!(err, HarnessError::BalanceMismatch { token: "WETH", .. }));
    }

    #[test]
    fn test_swap_spending_more_than_held() {
        let err = check_swap_deltas(&snapshot(10, 0), &snapshot(0, 1), ("DAI", "WETH"), U256::from(11), U256::from(1))
            .unwrap_err();
        assert!(matches!(err, HarnessError::Assertion(_)));
    }

    #[test]
    fn test_check_deposit() {
        let owner = Address::repeat_byte(1);
        let dai = Address::repeat_byte(2);
        let usdc = Address::repeat_byte(3);
        let deposit = DepositRecord {
            owner,
            liquidity: 42,
            token0: dai,
            token1: usdc,
        };
        check_deposit(&deposit, owner, dai, usdc).unwrap();

        let err = check_deposit(&deposit, Address::repeat_byte(9), dai, usdc).unwrap_err();
        assert!(err.to_string().contains("deposit owner"));

        let empty = DepositRecord { liquidity: 0, ..deposit };
        assert!(check_deposit(&empty, owner, dai, usdc).is_err());

        let err = check_deposit(&deposit, owner, usdc, dai).unwrap_err();
        assert!(err.to_string().contains("deposit pair"));
    }

    #[test]
    fn test_missing_event_fails_loudly() {
        let receipt = receipt_with_logs(serde_json::json!([]));
        let err = require_event::<TokenSwap::swapExactInputSingleEvent>(&receipt, Address::repeat_byte(1)).unwrap_err();
        match err {
            HarnessError::MissingEvent { event, tx_hash } => {
                assert_eq!(event, "swapExactInputSingleEvent(uint256)");
                assert_eq!(tx_hash, B256::repeat_byte(7));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_require_event_decodes() {
        let event = TokenSwap::swapExactInputSingleEvent {
            amountOut: U256::from(12345),
        };
        let data = event.encode_log_data();
        let receipt = receipt_with_logs(serde_json::json!([{
            "address": Address::repeat_byte(1),
            "topics": data.topics(),
            "data": data.data,
            "blockHash": B256::ZERO,
            "blockNumber": "0x1",
            "transactionHash": B256::repeat_byte(7),
            "transactionIndex": "0x0",
            "logIndex": "0x0",
            "removed": false
        }]));

        let decoded = require_event::<TokenSwap::swapExactInputSingleEvent>(&receipt, Address::repeat_byte(1)).unwrap();
        assert_eq!(decoded.amountOut, U256::from(12345));

        let err = require_event::<TokenSwap::swapExactInputSingleEvent>(&receipt, Address::repeat_byte(2)).unwrap_err();
        assert!(matches!(err, HarnessError::MissingEvent { .. }));
    }
}
