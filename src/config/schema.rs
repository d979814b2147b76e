//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the deployer.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for a deployment run.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct DeployConfig {
    /// Target network and RPC settings.
    pub network: NetworkConfig,

    /// Solidity compiler settings the artifacts were built with.
    pub compiler: CompilerConfig,

    /// Where compiled artifacts live.
    pub artifacts: ArtifactsConfig,

    /// Block explorer API settings.
    pub explorer: ExplorerConfig,

    /// Verification polling policy.
    pub verification: VerificationConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Public networks with a known explorer: `(name, chain id, browser URL)`.
pub const KNOWN_NETWORKS: &[(&str, u64, &str)] = &[
    ("mainnet", 1, "https://etherscan.io"),
    ("sepolia", 11155111, "https://sepolia.etherscan.io"),
    ("holesky", 17000, "https://holesky.etherscan.io"),
    ("arbitrum", 42161, "https://arbiscan.io"),
    ("optimism", 10, "https://optimistic.etherscan.io"),
    ("base", 8453, "https://basescan.org"),
    ("polygon", 137, "https://polygonscan.com"),
];

/// Look up a public network by name, case-insensitively.
pub fn known_network(name: &str) -> Option<(u64, &'static str)> {
    KNOWN_NETWORKS
        .iter()
        .find(|(known, _, _)| known.eq_ignore_ascii_case(name))
        .map(|(_, chain_id, browser)| (*chain_id, *browser))
}

/// Network configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Network name, used to pick the explorer (e.g. "mainnet", "localhost").
    pub name: String,

    /// JSON-RPC endpoint URL.
    pub rpc_url: String,

    /// Failover JSON-RPC endpoint URLs.
    #[serde(default)]
    pub failover_urls: Vec<String>,

    /// Upstream endpoint the local node forks from.
    pub fork_url: Option<String>,

    /// Chain ID (1 for Ethereum mainnet, 31337 for a local fork).
    pub chain_id: u64,

    /// RPC request timeout in seconds.
    pub rpc_timeout_secs: u64,

    /// Number of block confirmations required, counting the inclusion block.
    pub confirmation_blocks: u32,

    /// Maximum time to wait for a transaction to confirm.
    pub confirmation_timeout_secs: u64,

    /// Gas price multiplier (1.0 = estimated, 1.2 = 20% buffer).
    pub gas_price_multiplier: f64,

    /// Maximum gas price in gwei (protection against spikes).
    pub max_gas_price_gwei: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            name: "localhost".to_string(),
            rpc_url: "http://localhost:8545".to_string(),
            failover_urls: Vec::new(),
            fork_url: None,
            chain_id: 31337,
            rpc_timeout_secs: 10,
            confirmation_blocks: 1,
            confirmation_timeout_secs: 120,
            gas_price_multiplier: 1.2,
            max_gas_price_gwei: 500,
        }
    }
}

impl NetworkConfig {
    /// Development networks whose node holds unlocked accounts.
    pub fn is_local(&self) -> bool {
        matches!(
            self.name.to_ascii_lowercase().as_str(),
            "localhost" | "hardhat" | "anvil"
        )
    }

    /// Chain id implied by a public network name.
    pub fn known_chain_id(&self) -> Option<u64> {
        known_network(&self.name).map(|(chain_id, _)| chain_id)
    }
}

/// Solidity compiler settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CompilerConfig {
    /// Short solc version, e.g. "0.7.6".
    pub version: String,

    /// Whether the optimizer was enabled.
    pub optimizer_enabled: bool,

    /// Optimizer runs.
    pub optimizer_runs: u32,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            version: "0.7.6".to_string(),
            optimizer_enabled: true,
            optimizer_runs: 1000,
        }
    }
}

/// Compiled artifact locations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ArtifactsConfig {
    /// Root of the artifacts tree (`<dir>/<source>/<Name>.json`).
    pub dir: String,

    /// solc build-info JSON holding the standard-JSON input.
    pub build_info: Option<String>,

    /// Fully qualified name of the swap router contract.
    pub token_swap: String,

    /// Fully qualified name of the position manager contract.
    pub liquidity_manager: String,
}

impl Default for ArtifactsConfig {
    fn default() -> Self {
        Self {
            dir: "artifacts".to_string(),
            build_info: None,
            token_swap: "contracts/TokenSwap.sol:TokenSwap".to_string(),
            liquidity_manager: "contracts/LiquidityManager.sol:LiquidityManager".to_string(),
        }
    }
}

/// Block explorer configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ExplorerConfig {
    /// API key. Normally supplied through `ETHERSCAN_KEY`.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,

    /// API endpoint override (otherwise derived from the network name).
    pub api_url: Option<String>,

    /// Browser base URL override used for printed links.
    pub browser_url: Option<String>,
}

/// Verification polling policy.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct VerificationConfig {
    /// Verify contracts after deployment.
    pub enabled: bool,

    /// Delay before the first explorer probe, in seconds.
    pub initial_delay_secs: u64,

    /// Maximum number of probes per wait.
    pub max_attempts: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,

    /// Overall deadline for one wait, in seconds.
    pub timeout_secs: u64,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            initial_delay_secs: 0,
            max_attempts: 10,
            base_delay_ms: 2000,
            max_delay_ms: 60_000,
            timeout_secs: 300,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit JSON log lines instead of the human format.
    pub json: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json: false,
        }
    }
}
