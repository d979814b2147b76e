//! uniswap-deployer
//!
//! Deploys TokenSwap and LiquidityManager, publishes their source to the
//! block explorer, and runs the fork scenarios against them.
//!
//! # Architecture Overview
//!
//! ```text
//!   .env + config.toml + env vars
//!              │
//!              ▼
//!        ┌───────────┐      ┌──────────────┐      ┌─────────────┐
//!        │  config   │─────▶│  deploy      │─────▶│  verify     │──▶ explorer API
//!        └───────────┘      │  (artifacts, │      │  (poll with │
//!                           │   TxBuilder) │      │   backoff)  │
//!                           └──────┬───────┘      └─────────────┘
//!                                  │ JSON-RPC
//!                                  ▼
//!                           ┌──────────────┐      ┌─────────────┐
//!                           │  blockchain  │◀─────│  harness    │──▶ Anvil fork
//!                           └──────────────┘      └─────────────┘
//! ```
//!
//! Exit code is 1 when configuration, wallet or deployment fails. Verification
//! outcomes are reported but never change the exit code.

use std::error::Error;
use std::path::PathBuf;

use alloy::primitives::Address;
use clap::{Parser, Subcommand};
use tracing::Instrument;

use uniswap_deployer::blockchain::{BlockchainClient, TxBuilder, Wallet};
use uniswap_deployer::config::{resolve_config, DeployConfig};
use uniswap_deployer::deploy::{Deployer, Deployment};
use uniswap_deployer::harness::{ForkNode, Scenario, Scenarios};
use uniswap_deployer::lifecycle::Shutdown;
use uniswap_deployer::observability::{init_logging, run_span};
use uniswap_deployer::verify::{VerificationReport, VerificationTarget, Verifier};

type CliResult<T> = Result<T, Box<dyn Error>>;

#[derive(Parser)]
#[command(name = "uniswap-deployer")]
#[command(about = "Deploy, verify and fork-test the Uniswap V3 TokenSwap and LiquidityManager contracts", long_about = None)]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Deploy TokenSwap, then LiquidityManager, then verify both
    Deploy {
        /// Skip explorer verification
        #[arg(long)]
        no_verify: bool,
    },
    /// Verify contracts deployed earlier
    Verify {
        #[arg(long)]
        token_swap: Address,
        #[arg(long)]
        liquidity_manager: Address,
    },
    /// Run the fork scenarios
    Scenarios {
        /// Scenario names to run (default: all)
        #[arg(long)]
        only: Vec<String>,
    },
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Commands::Deploy { .. } => "deploy",
            Commands::Verify { .. } => "verify",
            Commands::Scenarios { .. } => "scenarios",
        }
    }
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = match resolve_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };

    init_logging(&config.observability);

    let span = run_span(cli.command.name());
    if let Err(e) = run(cli.command, &config).instrument(span).await {
        tracing::error!(error = %e, "Run failed");
        std::process::exit(1);
    }
}

async fn run(command: Commands, config: &DeployConfig) -> CliResult<()> {
    tracing::info!(
        network = %config.network.name,
        rpc_url = %config.network.rpc_url,
        chain_id = config.network.chain_id,
        "Configuration loaded"
    );

    match command {
        Commands::Deploy { no_verify } => {
            let chain = BlockchainClient::new(config.network.clone()).await?;
            let deployment = deploy(config, &chain).await?;
            println!("{}", serde_json::to_string_pretty(&deployment)?);

            if no_verify {
                tracing::info!("Verification skipped (--no-verify)");
            } else {
                let targets = VerificationTarget::from_deployment(&deployment);
                print_report(&verify(config, &chain, &targets).await)?;
            }
        }
        Commands::Verify {
            token_swap,
            liquidity_manager,
        } => {
            let chain = BlockchainClient::new(config.network.clone()).await?;
            let targets = VerificationTarget::from_addresses(config, token_swap, liquidity_manager);
            print_report(&verify(config, &chain, &targets).await)?;
        }
        Commands::Scenarios { only } => scenarios(config, &only).await?,
    }

    Ok(())
}

async fn deploy(config: &DeployConfig, chain: &BlockchainClient) -> CliResult<Deployment> {
    if let Some(wallet) = Wallet::from_env(config.network.chain_id)? {
        // Locally signed transactions carry the configured chain id.
        chain.verify_chain_id().await?;
        tracing::info!(deployer = %wallet.address(), "Deploying with configured key");
        let sender = TxBuilder::new(chain.clone(), wallet);
        return Ok(Deployer::new(&sender, &config.artifacts).deploy_all().await?);
    }

    if !config.network.is_local() {
        return Err(format!(
            "DEPLOYER_PRIVATE_KEY is required to deploy to '{}'",
            config.network.name
        )
        .into());
    }

    let node = ForkNode::connect(&config.network).await?;
    let account = node.default_signer().await?;
    tracing::info!(deployer = %account, "Deploying with the node's first account");
    let sender = node.account(account);
    Ok(Deployer::new(&sender, &config.artifacts).deploy_all().await?)
}

async fn verify(
    config: &DeployConfig,
    chain: &BlockchainClient,
    targets: &[VerificationTarget],
) -> VerificationReport {
    let shutdown = Shutdown::new();
    shutdown.trigger_on_ctrl_c();
    let mut signal = shutdown.subscribe();

    Verifier::new(config, chain)
        .verify_all(targets, &mut signal)
        .await
}

fn print_report(report: &VerificationReport) -> CliResult<()> {
    for contract in &report.contracts {
        tracing::info!(
            contract = %contract.name,
            address = %contract.address,
            outcome = %contract.outcome,
            "Verification result"
        );
    }
    println!("{}", serde_json::to_string_pretty(report)?);
    Ok(())
}

async fn scenarios(config: &DeployConfig, only: &[String]) -> CliResult<()> {
    let selected = if only.is_empty() {
        Scenario::ALL.to_vec()
    } else {
        only.iter()
            .map(|name| Scenario::from_name(name).ok_or_else(|| format!("unknown scenario '{}'", name)))
            .collect::<Result<Vec<_>, _>>()?
    };

    // Keep the spawned node alive until every scenario has run.
    let (_anvil, node) = match &config.network.fork_url {
        Some(fork_url) => {
            let (anvil, node) = ForkNode::spawn(fork_url, &config.network).await?;
            (Some(anvil), node)
        }
        None => (None, ForkNode::connect(&config.network).await?),
    };

    let runner = Scenarios::new(&node, &config.artifacts);
    let mut reports = Vec::with_capacity(selected.len());
    for scenario in selected {
        reports.push(runner.run(scenario).await);
    }

    println!("{}", serde_json::to_string_pretty(&reports)?);

    let failed = reports.iter().filter(|r| !r.passed).count();
    if failed > 0 {
        return Err(format!("{} of {} scenarios failed", failed, reports.len()).into());
    }
    tracing::info!(count = reports.len(), "All scenarios passed");
    Ok(())
}
