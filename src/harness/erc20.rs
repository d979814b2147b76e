//! Contract call helpers and an ERC-20 handle.

use alloy::network::TransactionBuilder;
use alloy::primitives::{Address, U256};
use alloy::rpc::types::{TransactionReceipt, TransactionRequest};
use alloy::sol_types::SolCall;

use crate::blockchain::{BlockchainClient, TransactionSender};
use crate::contracts::IERC20;
use crate::harness::assertions::{HarnessError, HarnessResult};

/// `eth_call` a view function and decode its return.
pub async fn call_view<C: SolCall>(
    chain: &BlockchainClient,
    to: Address,
    call: &C,
) -> HarnessResult<C::Return> {
    let tx = TransactionRequest::default()
        .with_to(to)
        .with_input(call.abi_encode());
    let output = chain.call(&tx).await?;
    C::abi_decode_returns(&output).map_err(|e| HarnessError::Decode {
        call: C::SIGNATURE,
        message: e.to_string(),
    })
}

/// Send a state-changing call from `sender` and wait for its receipt.
pub async fn send_call<S: TransactionSender, C: SolCall>(
    sender: &S,
    to: Address,
    call: &C,
) -> HarnessResult<TransactionReceipt> {
    let tx = TransactionRequest::default()
        .with_to(to)
        .with_input(call.abi_encode());
    tracing::debug!(from = %sender.sender(), to = %to, call = C::SIGNATURE, "Sending call");
    Ok(sender.send(tx).await?)
}

/// A deployed ERC-20 token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Erc20 {
    pub symbol: &'static str,
    pub address: Address,
    pub decimals: u8,
}

impl Erc20 {
    pub const fn new(symbol: &'static str, address: Address, decimals: u8) -> Self {
        Self {
            symbol,
            address,
            decimals,
        }
    }

    /// `whole` tokens in base units.
    pub fn units(&self, whole: u64) -> U256 {
        U256::from(whole) * U256::from(10u64).pow(U256::from(self.decimals))
    }

    pub async fn balance_of(&self, chain: &BlockchainClient, holder: Address) -> HarnessResult<U256> {
        call_view(chain, self.address, &IERC20::balanceOfCall { account: holder }).await
    }

    pub async fn transfer<S: TransactionSender>(
        &self,
        sender: &S,
        to: Address,
        amount: U256,
    ) -> HarnessResult<TransactionReceipt> {
        send_call(sender, self.address, &IERC20::transferCall { to, amount }).await
    }

    pub async fn approve<S: TransactionSender>(
        &self,
        sender: &S,
        spender: Address,
        amount: U256,
    ) -> HarnessResult<TransactionReceipt> {
        send_call(sender, self.address, &IERC20::approveCall { spender, amount }).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_units() {
        let dai = Erc20::new("DAI", Address::ZERO, 18);
        assert_eq!(dai.units(1), U256::from(1_000_000_000_000_000_000u128));

        let usdc = Erc20::new("USDC", Address::ZERO, 6);
        assert_eq!(usdc.units(100), U256::from(100_000_000u64));
    }

    #[test]
    fn test_balance_of_encoding() {
        let holder = Address::repeat_byte(0x11);
        let data = IERC20::balanceOfCall { account: holder }.abi_encode();
        assert_eq!(&data[..4], &IERC20::balanceOfCall::SELECTOR);
        assert_eq!(&data[16..], holder.as_slice());
    }
}
