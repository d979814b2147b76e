//! Transaction building, signing, and confirmation.
//!
//! # Responsibilities
//! - Build transactions with nonce sync and gas estimation
//! - Sign locally and broadcast
//! - Wait for confirmations
//!
//! Anything that can turn a request into a confirmed receipt implements
//! [`TransactionSender`]; the deployer and the fork harness are generic over it.

use alloy::eips::eip2718::Encodable2718;
use alloy::network::{Ethereum, TransactionBuilder};
use alloy::primitives::Address;
use alloy::rpc::types::{TransactionReceipt, TransactionRequest};

use crate::blockchain::client::BlockchainClient;
use crate::blockchain::types::{BlockchainError, BlockchainResult};
use crate::blockchain::wallet::Wallet;

/// Gas estimate headroom, in percent.
const GAS_LIMIT_HEADROOM_PCT: u64 = 20;

/// Submits a transaction and resolves once it is confirmed.
#[allow(async_fn_in_trait)]
pub trait TransactionSender {
    /// Address the transactions are sent from.
    fn sender(&self) -> Address;

    /// Send `tx` (only `to`, `input` and `value` need to be set) and wait for it.
    async fn send(&self, tx: TransactionRequest) -> BlockchainResult<TransactionReceipt>;
}

/// Transaction builder signing with a local wallet.
#[derive(Debug, Clone)]
pub struct TxBuilder {
    client: BlockchainClient,
    wallet: Wallet,
}

impl TxBuilder {
    /// Create a new transaction builder.
    pub fn new(client: BlockchainClient, wallet: Wallet) -> Self {
        Self { client, wallet }
    }

    /// Fill nonce, gas price, gas limit and chain id on a request.
    pub async fn prepare(&self, tx: TransactionRequest) -> BlockchainResult<TransactionRequest> {
        // Get current nonce from chain and sync wallet
        let chain_nonce = self.client.get_transaction_count(self.wallet.address()).await?;
        self.wallet.sync_nonce(chain_nonce);

        let gas_price = self.client.get_gas_price().await?;
        let gas_price_gwei = gas_price / 1_000_000_000;

        let config = self.client.config();
        if gas_price_gwei > config.max_gas_price_gwei as u128 {
            return Err(BlockchainError::GasPriceTooHigh {
                current_gwei: gas_price_gwei as u64,
                max_gwei: config.max_gas_price_gwei,
            });
        }

        // Apply multiplier for safety margin
        let adjusted_gas_price = (gas_price as f64 * config.gas_price_multiplier) as u128;

        let tx = tx
            .with_from(self.wallet.address())
            .with_gas_price(adjusted_gas_price)
            .with_chain_id(self.wallet.chain_id());

        let estimate = self.client.estimate_gas(&tx).await?;
        let gas_limit = with_headroom(estimate);

        let nonce = self.wallet.take_nonce();
        Ok(tx.with_nonce(nonce).with_gas_limit(gas_limit))
    }

    /// Get the wallet address.
    pub fn address(&self) -> Address {
        self.wallet.address()
    }
}

impl TransactionSender for TxBuilder {
    fn sender(&self) -> Address {
        self.wallet.address()
    }

    async fn send(&self, tx: TransactionRequest) -> BlockchainResult<TransactionReceipt> {
        let tx = self.prepare(tx).await?;
        let nonce = tx.nonce;

        let envelope = <TransactionRequest as TransactionBuilder<Ethereum>>::build(
            tx,
            &self.wallet.ethereum_wallet(),
        )
        .await
        .map_err(|e| BlockchainError::Build(e.to_string()))?;

        let tx_hash = self
            .client
            .send_raw_transaction(&envelope.encoded_2718())
            .await?;

        tracing::debug!(tx_hash = %tx_hash, nonce = ?nonce, "Transaction broadcast");

        self.client
            .wait_for_receipt(tx_hash, self.client.config().confirmation_timeout_secs)
            .await
    }
}

fn with_headroom(estimate: u64) -> u64 {
    estimate.saturating_add(estimate.saturating_mul(GAS_LIMIT_HEADROOM_PCT) / 100)
}
