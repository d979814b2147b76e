//! Per-contract source verification.
//!
//! For each target: confirm code on chain, wait for the explorer to index it,
//! submit the source, then poll the verdict. Every wait is bounded by the
//! backoff policy and cancelled by shutdown.

use alloy::primitives::{Address, Bytes};
use alloy::sol_types::SolValue;
use serde::Serialize;
use std::fmt;
use std::time::Duration;
use tokio::sync::broadcast;

use crate::blockchain::BlockchainClient;
use crate::config::{CompilerConfig, DeployConfig};
use crate::contracts::{ArtifactStore, BuildInfo};
use crate::deploy::{DeployedContract, Deployment};
use crate::resilience::{poll_with_backoff, BackoffPolicy, PollError, Probe};
use crate::verify::explorer::{
    ExplorerClient, ExplorerError, Submission, VerificationRequest, VerificationStatus,
};

/// A contract to verify.
#[derive(Debug, Clone)]
pub struct VerificationTarget {
    pub name: String,
    pub fully_qualified_name: String,
    pub address: Address,
    pub constructor_args: Bytes,
}

impl From<&DeployedContract> for VerificationTarget {
    fn from(contract: &DeployedContract) -> Self {
        Self {
            name: contract.name.clone(),
            fully_qualified_name: contract.fully_qualified_name.clone(),
            address: contract.address,
            constructor_args: contract.constructor_args.clone(),
        }
    }
}

impl VerificationTarget {
    /// Targets for a deployment, in deployment order.
    pub fn from_deployment(deployment: &Deployment) -> Vec<Self> {
        deployment.contracts().into_iter().map(Self::from).collect()
    }

    /// Targets for contracts deployed earlier, rebuilding constructor arguments.
    pub fn from_addresses(
        config: &DeployConfig,
        token_swap: Address,
        liquidity_manager: Address,
    ) -> Vec<Self> {
        vec![
            Self {
                name: contract_name(&config.artifacts.token_swap),
                fully_qualified_name: config.artifacts.token_swap.clone(),
                address: token_swap,
                constructor_args: Bytes::new(),
            },
            Self {
                name: contract_name(&config.artifacts.liquidity_manager),
                fully_qualified_name: config.artifacts.liquidity_manager.clone(),
                address: liquidity_manager,
                constructor_args: Bytes::from((token_swap,).abi_encode_params()),
            },
        ]
    }
}

fn contract_name(fq_name: &str) -> String {
    fq_name.rsplit(':').next().unwrap_or(fq_name).to_string()
}

/// How verification of one contract ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum VerificationOutcome {
    Verified { guid: String, url: String },
    AlreadyVerified { url: String },
    Failed { reason: String },
    Skipped { reason: String },
}

impl fmt::Display for VerificationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VerificationOutcome::Verified { url, .. } => write!(f, "verified ({})", url),
            VerificationOutcome::AlreadyVerified { url } => write!(f, "already verified ({})", url),
            VerificationOutcome::Failed { reason } => write!(f, "failed: {}", reason),
            VerificationOutcome::Skipped { reason } => write!(f, "skipped: {}", reason),
        }
    }
}

/// Outcome for one contract.
#[derive(Debug, Clone, Serialize)]
pub struct ContractVerification {
    pub name: String,
    pub address: Address,
    #[serde(flatten)]
    pub outcome: VerificationOutcome,
}

/// Outcomes for every target, independent of each other and of deployment.
#[derive(Debug, Clone, Default, Serialize)]
pub struct VerificationReport {
    pub contracts: Vec<ContractVerification>,
}

impl VerificationReport {
    /// True when every contract is verified (now or previously).
    pub fn all_verified(&self) -> bool {
        self.contracts.iter().all(|c| {
            matches!(
                c.outcome,
                VerificationOutcome::Verified { .. } | VerificationOutcome::AlreadyVerified { .. }
            )
        })
    }
}

/// A failed step, rendered into [`VerificationOutcome::Failed`].
#[derive(Debug)]
enum StepError {
    Cancelled,
    Failed(String),
}

impl<E: fmt::Display> From<PollError<E>> for StepError {
    fn from(e: PollError<E>) -> Self {
        match e {
            PollError::Cancelled => StepError::Cancelled,
            other => StepError::Failed(other.to_string()),
        }
    }
}

/// Publishes deployed contracts' source to the block explorer.
///
/// Every failure is confined to the contract it happened on; nothing here
/// can fail the deployment.
pub struct Verifier<'a> {
    chain: &'a BlockchainClient,
    explorer: Result<ExplorerClient, String>,
    build_info: Result<BuildInfo, String>,
    compiler: CompilerConfig,
    policy: BackoffPolicy,
}

impl<'a> Verifier<'a> {
    /// Resolve explorer and build info from configuration.
    ///
    /// Problems are logged here and turn into `Skipped` outcomes later.
    pub fn new(config: &DeployConfig, chain: &'a BlockchainClient) -> Self {
        let explorer = if !config.verification.enabled {
            Err("verification disabled".to_string())
        } else {
            ExplorerClient::for_network(&config.network.name, &config.explorer).map_err(|e| {
                tracing::error!(network = %config.network.name, error = %e, "Explorer unavailable");
                e.to_string()
            })
        };

        let build_info = ArtifactStore::new(&config.artifacts)
            .build_info()
            .map_err(|e| e.to_string());

        Self::with_parts(
            chain,
            explorer,
            build_info,
            config.compiler.clone(),
            BackoffPolicy::from(&config.verification),
        )
    }

    /// Assemble a verifier from already-resolved parts.
    pub fn with_parts(
        chain: &'a BlockchainClient,
        explorer: Result<ExplorerClient, String>,
        build_info: Result<BuildInfo, String>,
        compiler: CompilerConfig,
        policy: BackoffPolicy,
    ) -> Self {
        Self {
            chain,
            explorer,
            build_info,
            compiler,
            policy,
        }
    }

    /// Verify every target in order, one outcome each.
    pub async fn verify_all(
        &self,
        targets: &[VerificationTarget],
        shutdown: &mut broadcast::Receiver<()>,
    ) -> VerificationReport {
        let mut report = VerificationReport::default();
        let mut cancelled = false;

        for target in targets {
            let outcome = if cancelled {
                VerificationOutcome::Skipped {
                    reason: "cancelled".to_string(),
                }
            } else {
                tracing::info!(contract = %target.name, address = %target.address, "Verifying contract");
                match self.verify_one(target, shutdown).await {
                    Ok(outcome) => outcome,
                    Err(StepError::Cancelled) => {
                        cancelled = true;
                        VerificationOutcome::Skipped {
                            reason: "cancelled".to_string(),
                        }
                    }
                    Err(StepError::Failed(reason)) => VerificationOutcome::Failed { reason },
                }
            };

            match &outcome {
                VerificationOutcome::Verified { .. } | VerificationOutcome::AlreadyVerified { .. } => {
                    tracing::info!(contract = %target.name, %outcome, "Verification finished");
                }
                VerificationOutcome::Failed { .. } => {
                    tracing::error!(contract = %target.name, %outcome, "Verification failed");
                }
                VerificationOutcome::Skipped { .. } => {
                    tracing::warn!(contract = %target.name, %outcome, "Verification skipped");
                }
            }

            report.contracts.push(ContractVerification {
                name: target.name.clone(),
                address: target.address,
                outcome,
            });
        }

        report
    }

    async fn verify_one(
        &self,
        target: &VerificationTarget,
        shutdown: &mut broadcast::Receiver<()>,
    ) -> Result<VerificationOutcome, StepError> {
        let explorer = match &self.explorer {
            Ok(explorer) => explorer,
            Err(reason) => {
                return Ok(VerificationOutcome::Skipped {
                    reason: reason.clone(),
                })
            }
        };
        let build_info = match &self.build_info {
            Ok(info) => info,
            Err(reason) => {
                return Ok(VerificationOutcome::Skipped {
                    reason: reason.clone(),
                })
            }
        };
        build_info
            .check_compiler(&self.compiler)
            .map_err(|e| StepError::Failed(e.to_string()))?;

        // 1. The address must hold code on the chain we deployed to.
        let code = self
            .chain
            .get_code(target.address)
            .await
            .map_err(|e| StepError::Failed(format!("address validation failed: {}", e)))?;
        if code.is_empty() {
            return Err(StepError::Failed(format!("no contract code at {}", target.address)));
        }
        tracing::info!(contract = %target.name, "Contract address validated on the network");

        // 2. Wait for the explorer to index the bytecode.
        poll_with_backoff(&self.policy, shutdown, "explorer indexing", move |_| async move {
            match explorer.get_code(target.address).await {
                Ok(code) if !code.is_empty() => Ok(Probe::Ready(())),
                Ok(_) => Ok(Probe::Pending("bytecode not indexed yet".to_string())),
                Err(e) if e.is_transient() => Ok(Probe::Pending(e.to_string())),
                Err(e) => Err(e),
            }
        })
        .await?;

        // 3. Submit the source.
        let request = VerificationRequest {
            address: target.address,
            contract_name: target.fully_qualified_name.clone(),
            source: build_info.standard_json_input(),
            compiler_version: build_info.explorer_compiler_version(),
            constructor_args: target.constructor_args.clone(),
            optimization_used: self.compiler.optimizer_enabled,
            runs: self.compiler.optimizer_runs,
        };
        let request = &request;
        let follow_up = self.follow_up_policy();

        let submission = poll_with_backoff(&follow_up, shutdown, "verification submit", move |_| async move {
            match explorer.submit_verification(request).await {
                Ok(submission) => Ok(Probe::Ready(submission)),
                Err(e) if e.is_transient() || not_yet_located(&e) => Ok(Probe::Pending(e.to_string())),
                Err(e) => Err(e),
            }
        })
        .await?;

        let url = explorer.address_url(target.address);
        let guid = match submission {
            Submission::AlreadyVerified => return Ok(VerificationOutcome::AlreadyVerified { url }),
            Submission::Queued(guid) => guid,
        };
        tracing::info!(contract = %target.name, guid = %guid, "Verification submitted");

        // 4. Wait for the verdict.
        let guid_ref = guid.as_str();
        let status = poll_with_backoff(&follow_up, shutdown, "verification status", move |_| async move {
            match explorer.check_status(guid_ref).await {
                Ok(VerificationStatus::Pending) => Ok(Probe::Pending("pending in queue".to_string())),
                Ok(status) => Ok(Probe::Ready(status)),
                Err(e) if e.is_transient() => Ok(Probe::Pending(e.to_string())),
                Err(e) => Err(e),
            }
        })
        .await?;

        match status {
            VerificationStatus::Verified => Ok(VerificationOutcome::Verified { guid, url }),
            VerificationStatus::AlreadyVerified => Ok(VerificationOutcome::AlreadyVerified { url }),
            VerificationStatus::Failed(reason) => Err(StepError::Failed(reason)),
            VerificationStatus::Pending => Err(StepError::Failed("still pending".to_string())),
        }
    }

    /// Submission and status polls start immediately.
    fn follow_up_policy(&self) -> BackoffPolicy {
        BackoffPolicy {
            initial_delay: Duration::ZERO,
            ..self.policy.clone()
        }
    }
}

/// The explorer has not caught up with the contract yet.
fn not_yet_located(e: &ExplorerError) -> bool {
    matches!(e, ExplorerError::Api { result, .. } if result.to_lowercase().contains("unable to locate"))
}
