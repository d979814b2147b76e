//! Deployer key and nonce tracking.
//!
//! # Security
//! - The key comes only from `DEPLOYER_PRIVATE_KEY` (or an explicit string)
//! - `Debug` shows the address, never the key

use alloy::network::EthereumWallet;
use alloy::primitives::Address;
use alloy::signers::local::PrivateKeySigner;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::blockchain::types::{BlockchainError, BlockchainResult};

/// Environment variable holding the deployer private key.
pub const PRIVATE_KEY_ENV_VAR: &str = "DEPLOYER_PRIVATE_KEY";

/// Local signing key with a nonce counter shared between clones.
#[derive(Clone)]
pub struct Wallet {
    signer: PrivateKeySigner,
    next_nonce: Arc<AtomicU64>,
    /// EIP-155 chain id.
    chain_id: u64,
}

impl Wallet {
    /// Parse a hex private key, with or without `0x`.
    pub fn from_private_key(private_key_hex: &str, chain_id: u64) -> BlockchainResult<Self> {
        let trimmed = private_key_hex.trim();
        let key_hex = trimmed.strip_prefix("0x").unwrap_or(trimmed);

        let signer: PrivateKeySigner = key_hex
            .parse()
            .map_err(|e| BlockchainError::Wallet(format!("Invalid private key format: {}", e)))?;

        tracing::info!(address = %signer.address(), chain_id, "Deployer key loaded");

        Ok(Self {
            signer,
            next_nonce: Arc::new(AtomicU64::new(0)),
            chain_id,
        })
    }

    /// Load the key from `DEPLOYER_PRIVATE_KEY`. Unset or blank means `None`.
    pub fn from_env(chain_id: u64) -> BlockchainResult<Option<Self>> {
        Self::from_lookup(chain_id, |name| std::env::var(name).ok())
    }

    /// Like [`Wallet::from_env`] with an injectable variable source.
    pub fn from_lookup<F>(chain_id: u64, lookup: F) -> BlockchainResult<Option<Self>>
    where
        F: Fn(&str) -> Option<String>,
    {
        match lookup(PRIVATE_KEY_ENV_VAR) {
            Some(key) if !key.trim().is_empty() => Self::from_private_key(&key, chain_id).map(Some),
            _ => Ok(None),
        }
    }

    pub fn address(&self) -> Address {
        self.signer.address()
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    /// Network wallet used to sign transaction requests.
    pub fn ethereum_wallet(&self) -> EthereumWallet {
        EthereumWallet::from(self.signer.clone())
    }

    /// Align the counter with the chain's pending transaction count.
    pub fn sync_nonce(&self, chain_nonce: u64) {
        self.next_nonce.store(chain_nonce, Ordering::SeqCst);
    }

    /// Reserve the next nonce.
    pub fn take_nonce(&self) -> u64 {
        self.next_nonce.fetch_add(1, Ordering::SeqCst)
    }

    /// Next nonce that `take_nonce` would hand out.
    pub fn peek_nonce(&self) -> u64 {
        self.next_nonce.load(Ordering::SeqCst)
    }
}

impl fmt::Debug for Wallet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Wallet")
            .field("address", &self.address())
            .field("chain_id", &self.chain_id)
            .finish()
    }
}
