//! Contract deployment in dependency order.
//!
//! TokenSwap is created first; LiquidityManager takes its address as the
//! only constructor argument. Any failure stops the sequence.

use alloy::network::TransactionBuilder;
use alloy::primitives::{Address, Bytes, TxHash};
use alloy::rpc::types::TransactionRequest;
use alloy::sol_types::SolValue;
use serde::Serialize;
use thiserror::Error;

use crate::blockchain::{BlockchainError, TransactionSender};
use crate::config::ArtifactsConfig;
use crate::contracts::{ArtifactError, ArtifactStore, ContractArtifact};

/// Errors that abort a deployment run.
#[derive(Debug, Error)]
pub enum DeployError {
    #[error(transparent)]
    Artifact(#[from] ArtifactError),

    #[error("deploying {contract} failed: {source}")]
    Transaction {
        contract: String,
        #[source]
        source: BlockchainError,
    },

    #[error("{contract}: creation receipt {tx_hash} has no contract address")]
    NoContractAddress { contract: String, tx_hash: TxHash },
}

/// A contract created by this run.
#[derive(Debug, Clone, Serialize)]
pub struct DeployedContract {
    /// Contract name, e.g. `TokenSwap`.
    pub name: String,
    /// `<source>:<name>`.
    pub fully_qualified_name: String,
    pub address: Address,
    pub tx_hash: TxHash,
    pub block_number: Option<u64>,
    pub gas_used: u64,
    /// ABI-encoded constructor arguments (needed for verification).
    pub constructor_args: Bytes,
}

/// Both contracts of a completed deployment.
#[derive(Debug, Clone, Serialize)]
pub struct Deployment {
    pub token_swap: DeployedContract,
    pub liquidity_manager: DeployedContract,
}

impl Deployment {
    /// Contracts in deployment order.
    pub fn contracts(&self) -> [&DeployedContract; 2] {
        [&self.token_swap, &self.liquidity_manager]
    }
}

/// Creates contracts from artifacts through a [`TransactionSender`].
#[derive(Debug)]
pub struct Deployer<'a, S> {
    sender: &'a S,
    store: ArtifactStore,
    artifacts: ArtifactsConfig,
}

impl<'a, S: TransactionSender> Deployer<'a, S> {
    pub fn new(sender: &'a S, artifacts: &ArtifactsConfig) -> Self {
        Self {
            sender,
            store: ArtifactStore::new(artifacts),
            artifacts: artifacts.clone(),
        }
    }

    /// Deploy TokenSwap, then LiquidityManager with the TokenSwap address.
    pub async fn deploy_all(&self) -> Result<Deployment, DeployError> {
        // Both artifacts are read before anything is sent.
        let token_swap_artifact = self.store.artifact(&self.artifacts.token_swap)?;
        let liquidity_manager_artifact = self.store.artifact(&self.artifacts.liquidity_manager)?;

        tracing::info!(deployer = %self.sender.sender(), "Starting deployment");

        let token_swap = self.deploy(&token_swap_artifact, Bytes::new()).await?;

        let constructor_args = Bytes::from((token_swap.address,).abi_encode_params());
        let liquidity_manager = self
            .deploy(&liquidity_manager_artifact, constructor_args)
            .await?;

        Ok(Deployment {
            token_swap,
            liquidity_manager,
        })
    }

    /// Create one contract and wait for its confirmation.
    pub async fn deploy(
        &self,
        artifact: &ContractArtifact,
        constructor_args: Bytes,
    ) -> Result<DeployedContract, DeployError> {
        let name = artifact.contract_name.clone();
        let tx = TransactionRequest::default()
            .with_deploy_code(artifact.creation_code(&constructor_args));

        let receipt = self
            .sender
            .send(tx)
            .await
            .map_err(|source| DeployError::Transaction {
                contract: name.clone(),
                source,
            })?;

        let address = receipt
            .contract_address
            .ok_or_else(|| DeployError::NoContractAddress {
                contract: name.clone(),
                tx_hash: receipt.transaction_hash,
            })?;

        tracing::info!(
            contract = %name,
            address = %address,
            tx_hash = %receipt.transaction_hash,
            gas_used = receipt.gas_used,
            "{} deployed",
            name
        );

        Ok(DeployedContract {
            fully_qualified_name: artifact.fully_qualified_name(),
            name,
            address,
            tx_hash: receipt.transaction_hash,
            block_number: receipt.block_number,
            gas_used: receipt.gas_used,
            constructor_args,
        })
    }

    /// Deploy a single contract by fully qualified name.
    pub async fn deploy_named(
        &self,
        fq_name: &str,
        constructor_args: Bytes,
    ) -> Result<DeployedContract, DeployError> {
        let artifact = self.store.artifact(fq_name)?;
        self.deploy(&artifact, constructor_args).await
    }
}
