//! Local fork node control: unlocked accounts, impersonation, balances.

use alloy::network::TransactionBuilder;
use alloy::node_bindings::{Anvil, AnvilInstance};
use alloy::primitives::{Address, U256};
use alloy::providers::ext::AnvilApi;
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::rpc::types::{TransactionReceipt, TransactionRequest};

use crate::blockchain::{BlockchainClient, BlockchainError, BlockchainResult, NetworkConfig, TransactionSender};
use crate::harness::assertions::{HarnessError, HarnessResult};

/// A development node (Anvil) forking an upstream network.
#[derive(Clone)]
pub struct ForkNode {
    chain: BlockchainClient,
    provider: DynProvider,
}

impl ForkNode {
    /// Connect to the node at `config.rpc_url`.
    pub async fn connect(config: &NetworkConfig) -> HarnessResult<Self> {
        let url: url::Url = config.rpc_url.parse().map_err(|e| {
            BlockchainError::Rpc(format!("Invalid RPC URL '{}': {}", config.rpc_url, e))
        })?;
        let provider = ProviderBuilder::new().connect_http(url).erased();
        let chain = BlockchainClient::new(config.clone()).await?;

        Ok(Self { chain, provider })
    }

    /// Start an Anvil node forking `fork_url` and connect to it.
    ///
    /// The node is killed when the returned instance is dropped.
    pub async fn spawn(fork_url: &str, base: &NetworkConfig) -> HarnessResult<(AnvilInstance, Self)> {
        let anvil = Anvil::new()
            .fork(fork_url)
            .try_spawn()
            .map_err(|e| HarnessError::NodeSpawn(e.to_string()))?;

        let config = NetworkConfig {
            name: "anvil".to_string(),
            rpc_url: anvil.endpoint(),
            failover_urls: Vec::new(),
            fork_url: Some(fork_url.to_string()),
            chain_id: anvil.chain_id(),
            ..base.clone()
        };
        tracing::info!(endpoint = %config.rpc_url, chain_id = config.chain_id, "Anvil fork started");

        let node = Self::connect(&config).await?;
        Ok((anvil, node))
    }

    /// Read-side client for the same node.
    pub fn chain(&self) -> &BlockchainClient {
        &self.chain
    }

    /// Accounts the node holds keys for.
    pub async fn accounts(&self) -> HarnessResult<Vec<Address>> {
        self.provider
            .get_accounts()
            .await
            .map_err(|e| rpc_error("eth_accounts", e))
    }

    /// First unlocked account, used as the test signer.
    pub async fn default_signer(&self) -> HarnessResult<Address> {
        self.accounts()
            .await?
            .first()
            .copied()
            .ok_or(HarnessError::NoAccounts)
    }

    /// Let the node sign for `address` without its key.
    pub async fn impersonate(&self, address: Address) -> HarnessResult<()> {
        self.provider
            .anvil_impersonate_account(address)
            .await
            .map_err(|e| rpc_error("anvil_impersonateAccount", e))?;
        tracing::debug!(address = %address, "Impersonating account");
        Ok(())
    }

    /// Revoke impersonation of `address`.
    pub async fn stop_impersonating(&self, address: Address) -> HarnessResult<()> {
        self.provider
            .anvil_stop_impersonating_account(address)
            .await
            .map_err(|e| rpc_error("anvil_stopImpersonatingAccount", e))
    }

    /// Overwrite the native balance of `address` (gas money for whales).
    pub async fn set_balance(&self, address: Address, wei: U256) -> HarnessResult<()> {
        self.provider
            .anvil_set_balance(address, wei)
            .await
            .map_err(|e| rpc_error("anvil_setBalance", e))
    }

    /// A sender whose transactions the node signs.
    pub fn account(&self, address: Address) -> NodeAccount<'_> {
        NodeAccount {
            node: self,
            address,
        }
    }
}

impl std::fmt::Debug for ForkNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ForkNode").field("chain", &self.chain).finish()
    }
}

fn rpc_error(method: &str, e: impl std::fmt::Display) -> HarnessError {
    HarnessError::Blockchain(BlockchainError::Rpc(format!("{}: {}", method, e)))
}

/// An unlocked or impersonated account on the fork node.
#[derive(Debug, Clone, Copy)]
pub struct NodeAccount<'a> {
    node: &'a ForkNode,
    address: Address,
}

impl TransactionSender for NodeAccount<'_> {
    fn sender(&self) -> Address {
        self.address
    }

    async fn send(&self, tx: TransactionRequest) -> BlockchainResult<TransactionReceipt> {
        let tx = tx.with_from(self.address);
        let pending = self
            .node
            .provider
            .send_transaction(tx)
            .await
            .map_err(|e| BlockchainError::Rpc(format!("eth_sendTransaction: {}", e)))?;
        let tx_hash = *pending.tx_hash();

        tracing::debug!(from = %self.address, tx_hash = %tx_hash, "Transaction sent by node");

        let chain = &self.node.chain;
        chain
            .wait_for_receipt(tx_hash, chain.config().confirmation_timeout_secs)
            .await
    }
}
