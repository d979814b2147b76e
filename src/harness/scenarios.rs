//! Fork scenarios for TokenSwap and LiquidityManager.
//!
//! Every scenario deploys fresh contracts from the node's first account,
//! impersonates the whales it needs, and stops impersonating them before
//! returning. Scenarios mutate fork state, so balances differ between runs.

use std::future::Future;

use alloy::primitives::utils::format_units;
use alloy::primitives::{address, Address, Bytes, U256};
use alloy::sol_types::{SolCall, SolEvent};
use serde::Serialize;

use crate::config::ArtifactsConfig;
use crate::contracts::{ArtifactStore, ContractArtifact, LiquidityManager, TokenSwap};
use crate::deploy::{Deployer, Deployment};
use crate::harness::assertions::{
    check_deposit, check_swap_deltas, ensure, require_event, BalanceSnapshot, DepositRecord,
    HarnessResult,
};
use crate::harness::erc20::{call_view, send_call, Erc20};
use crate::harness::fork::ForkNode;

pub const DAI: Erc20 = Erc20::new("DAI", address!("6B175474E89094C44Da98b954EedeAC495271d0F"), 18);
pub const USDC: Erc20 = Erc20::new("USDC", address!("A0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48"), 6);
pub const WETH: Erc20 = Erc20::new("WETH", address!("C02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2"), 18);

/// DAI holder used for the swap scenarios.
pub const SWAP_WHALE: Address = address!("60FaAe176336dAb62e284Fe19B885B095d29fB7F");
/// DAI holder funding the liquidity scenarios.
pub const DAI_WHALE: Address = address!("97f991971a37D4Ca58064e6a98FC563F03A71E5c");
/// USDC holder funding the liquidity scenarios.
pub const USDC_WHALE: Address = address!("7713974908Be4BEd47172370115e8b1219F4A5f0");

/// Native balance given to impersonated accounts for gas (10 ETH).
fn gas_money() -> U256 {
    U256::from(10u64).pow(U256::from(19u64))
}

/// One scenario of the fork suite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Scenario {
    SwapExactInputSingle,
    SwapExactOutputSingle,
    SwapExactInputMultihop,
    SwapExactOutputMultihop,
    MintNewPosition,
    IncreaseLiquidityCurrentRange,
    DecreaseLiquidityInHalf,
}

impl Scenario {
    pub const ALL: [Scenario; 7] = [
        Scenario::SwapExactInputSingle,
        Scenario::SwapExactOutputSingle,
        Scenario::SwapExactInputMultihop,
        Scenario::SwapExactOutputMultihop,
        Scenario::MintNewPosition,
        Scenario::IncreaseLiquidityCurrentRange,
        Scenario::DecreaseLiquidityInHalf,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Scenario::SwapExactInputSingle => "swap_exact_input_single",
            Scenario::SwapExactOutputSingle => "swap_exact_output_single",
            Scenario::SwapExactInputMultihop => "swap_exact_input_multihop",
            Scenario::SwapExactOutputMultihop => "swap_exact_output_multihop",
            Scenario::MintNewPosition => "mint_new_position",
            Scenario::IncreaseLiquidityCurrentRange => "increase_liquidity_current_range",
            Scenario::DecreaseLiquidityInHalf => "decrease_liquidity_in_half",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.name() == name)
    }
}

/// Which TokenSwap entry point a swap scenario drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapKind {
    ExactInputSingle,
    ExactOutputSingle,
    ExactInputMultihop,
    ExactOutputMultihop,
}

/// DAI spent and WETH received by a swap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapOutcome {
    pub spent: U256,
    pub received: U256,
}

/// Result of a single scenario.
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioReport {
    pub name: &'static str,
    pub passed: bool,
    pub detail: String,
}

/// A minted position owned by the test signer.
#[derive(Debug, Clone, Copy)]
struct Position {
    owner: Address,
    manager: Address,
    token_id: U256,
}

/// Runs scenarios against a fork node.
#[derive(Debug)]
pub struct Scenarios<'a> {
    node: &'a ForkNode,
    artifacts: ArtifactsConfig,
}

impl<'a> Scenarios<'a> {
    pub fn new(node: &'a ForkNode, artifacts: &ArtifactsConfig) -> Self {
        Self {
            node,
            artifacts: artifacts.clone(),
        }
    }

    /// Run every scenario in order; a failure does not stop the rest.
    pub async fn run_all(&self) -> Vec<ScenarioReport> {
        let mut reports = Vec::with_capacity(Scenario::ALL.len());
        for scenario in Scenario::ALL {
            reports.push(self.run(scenario).await);
        }
        reports
    }

    /// Run one scenario and report its outcome.
    pub async fn run(&self, scenario: Scenario) -> ScenarioReport {
        let name = scenario.name();
        tracing::info!(scenario = name, "Running scenario");

        let result = match scenario {
            Scenario::SwapExactInputSingle => self.swap_report(SwapKind::ExactInputSingle).await,
            Scenario::SwapExactOutputSingle => self.swap_report(SwapKind::ExactOutputSingle).await,
            Scenario::SwapExactInputMultihop => self.swap_report(SwapKind::ExactInputMultihop).await,
            Scenario::SwapExactOutputMultihop => self.swap_report(SwapKind::ExactOutputMultihop).await,
            Scenario::MintNewPosition => self
                .mint_new_position()
                .await
                .map(|(token_id, deposit)| {
                    format!("minted position {} with liquidity {}", token_id, deposit.liquidity)
                }),
            Scenario::IncreaseLiquidityCurrentRange => self
                .increase_liquidity_current_range()
                .await
                .map(|liquidity| format!("liquidity increased by {}", liquidity)),
            Scenario::DecreaseLiquidityInHalf => self
                .decrease_liquidity_in_half()
                .await
                .map(|(amount0, amount1)| {
                    format!(
                        "redeemed {} DAI and {} USDC",
                        display_units(amount0, DAI.decimals),
                        display_units(amount1, USDC.decimals)
                    )
                }),
        };

        match result {
            Ok(detail) => {
                tracing::info!(scenario = name, detail = %detail, "Scenario passed");
                ScenarioReport {
                    name,
                    passed: true,
                    detail,
                }
            }
            Err(e) => {
                tracing::error!(scenario = name, error = %e, "Scenario failed");
                ScenarioReport {
                    name,
                    passed: false,
                    detail: e.to_string(),
                }
            }
        }
    }

    async fn swap_report(&self, kind: SwapKind) -> HarnessResult<String> {
        let outcome = self.swap(kind).await?;
        Ok(format!(
            "swapped {} DAI for {} WETH",
            display_units(outcome.spent, DAI.decimals),
            display_units(outcome.received, WETH.decimals)
        ))
    }

    /// Swap DAI for WETH as the swap whale and check both balance deltas.
    pub async fn swap(&self, kind: SwapKind) -> HarnessResult<SwapOutcome> {
        let deployer = self.node.default_signer().await?;
        let artifact = self.token_swap_artifact()?;
        let account = self.node.account(deployer);
        let token_swap = Deployer::new(&account, &self.artifacts)
            .deploy(&artifact, Bytes::new())
            .await?
            .address;

        self.impersonating(&[SWAP_WHALE], self.swap_as_whale(kind, token_swap))
            .await
    }

    async fn swap_as_whale(&self, kind: SwapKind, token_swap: Address) -> HarnessResult<SwapOutcome> {
        let chain = self.node.chain();
        let whale = self.node.account(SWAP_WHALE);

        DAI.approve(&whale, token_swap, U256::MAX).await?;
        let before = BalanceSnapshot::take(chain, SWAP_WHALE, &DAI, &WETH).await?;

        let amount_in = DAI.units(100);
        let amount_out = WETH.units(1);
        let amount_in_maximum = DAI.units(10_000);

        let outcome = match kind {
            SwapKind::ExactInputSingle => {
                let call = TokenSwap::swapExactInputSingleCall { amountIn: amount_in };
                let receipt = send_call(&whale, token_swap, &call).await?;
                let event = require_event::<TokenSwap::swapExactInputSingleEvent>(&receipt, token_swap)?;
                SwapOutcome {
                    spent: amount_in,
                    received: event.amountOut,
                }
            }
            SwapKind::ExactInputMultihop => {
                let call = TokenSwap::swapExactInputMultihopCall { amountIn: amount_in };
                let receipt = send_call(&whale, token_swap, &call).await?;
                let event = require_event::<TokenSwap::swapExactInputMultihopEvent>(&receipt, token_swap)?;
                SwapOutcome {
                    spent: amount_in,
                    received: event.amountOut,
                }
            }
            SwapKind::ExactOutputSingle => {
                let call = TokenSwap::swapExactOutputSingleCall {
                    amountOut: amount_out,
                    amountInMaximum: amount_in_maximum,
                };
                let receipt = send_call(&whale, token_swap, &call).await?;
                let event = require_event::<TokenSwap::swapExactOutputSingleEvent>(&receipt, token_swap)?;
                SwapOutcome {
                    spent: event.amountIn,
                    received: amount_out,
                }
            }
            SwapKind::ExactOutputMultihop => {
                let call = TokenSwap::swapExactOutputMultihopCall {
                    amountOut: amount_out,
                    amountInMaximum: amount_in_maximum,
                };
                let receipt = send_call(&whale, token_swap, &call).await?;
                let event = require_event::<TokenSwap::swapExactOutputMultihopEvent>(&receipt, token_swap)?;
                SwapOutcome {
                    spent: event.amountIn,
                    received: amount_out,
                }
            }
        };

        ensure(outcome.spent <= amount_in_maximum, || {
            format!("spent {} DAI above the {} maximum", outcome.spent, amount_in_maximum)
        })?;
        ensure(!outcome.received.is_zero(), || "swap returned no WETH".to_string())?;

        let after = BalanceSnapshot::take(chain, SWAP_WHALE, &DAI, &WETH).await?;
        check_swap_deltas(
            &before,
            &after,
            (DAI.symbol, WETH.symbol),
            outcome.spent,
            outcome.received,
        )?;

        Ok(outcome)
    }

    /// Mint a position and check the manager's deposit record.
    pub async fn mint_new_position(&self) -> HarnessResult<(U256, DepositRecord)> {
        self.impersonating(&[DAI_WHALE, USDC_WHALE], async {
            let position = self.mint_position().await?;
            let deposit = self.deposit(&position).await?;
            check_deposit(&deposit, position.owner, DAI.address, USDC.address)?;
            Ok((position.token_id, deposit))
        })
        .await
    }

    /// Mint a position, then add 150 DAI and 150 USDC in the current range.
    pub async fn increase_liquidity_current_range(&self) -> HarnessResult<U256> {
        self.impersonating(&[DAI_WHALE, USDC_WHALE], async {
            let position = self.mint_position().await?;
            let owner = self.node.account(position.owner);

            let add0 = DAI.units(150);
            let add1 = USDC.units(150);
            self.fund(position.owner, add0, add1).await?;

            let call = LiquidityManager::increaseLiquidityCurrentRangeCall {
                tokenId: position.token_id,
                amountAdd0: add0,
                amountAdd1: add1,
            };
            let receipt = send_call(&owner, position.manager, &call).await?;
            let event = require_event::<LiquidityManager::LiquidityIncreased>(&receipt, position.manager)?;
            ensure(!event.liquidity.is_zero(), || "liquidity did not increase".to_string())?;
            Ok(event.liquidity)
        })
        .await
    }

    /// Mint a position, then withdraw half of its liquidity.
    pub async fn decrease_liquidity_in_half(&self) -> HarnessResult<(U256, U256)> {
        self.impersonating(&[DAI_WHALE, USDC_WHALE], async {
            let position = self.mint_position().await?;
            let owner = self.node.account(position.owner);

            let call = LiquidityManager::decreaseLiquidityInHalfCall {
                tokenId: position.token_id,
            };
            let receipt = send_call(&owner, position.manager, &call).await?;
            let event = require_event::<LiquidityManager::LiquidityDecreasedByHalf>(&receipt, position.manager)?;
            ensure(!event.amount0.is_zero(), || "no token0 redeemed".to_string())?;
            ensure(!event.amount1.is_zero(), || "no token1 redeemed".to_string())?;
            Ok((event.amount0, event.amount1))
        })
        .await
    }

    /// Deploy both contracts, fund the signer with 1 DAI and 100 USDC from the
    /// whales, hand them to the manager and mint. Whales must be impersonated.
    async fn mint_position(&self) -> HarnessResult<Position> {
        let owner = self.node.default_signer().await?;
        let signer = self.node.account(owner);
        let deployment = self.deploy_contracts(owner).await?;
        let manager = deployment.liquidity_manager.address;

        let dai_amount = DAI.units(1);
        let usdc_amount = USDC.units(100);
        self.fund(owner, dai_amount, usdc_amount).await?;

        DAI.approve(&signer, manager, U256::MAX).await?;
        USDC.approve(&signer, manager, U256::MAX).await?;
        DAI.transfer(&signer, manager, dai_amount).await?;
        USDC.transfer(&signer, manager, usdc_amount).await?;

        let receipt = send_call(&signer, manager, &LiquidityManager::mintNewPositionCall {}).await?;
        let minted = require_event::<LiquidityManager::PositionMinted>(&receipt, manager)?;

        tracing::debug!(token_id = %minted.tokenId, manager = %manager, "Position minted");

        Ok(Position {
            owner,
            manager,
            token_id: minted.tokenId,
        })
    }

    async fn deposit(&self, position: &Position) -> HarnessResult<DepositRecord> {
        let deposit = call_view(
            self.node.chain(),
            position.manager,
            &LiquidityManager::depositsCall {
                tokenId: position.token_id,
            },
        )
        .await?;

        Ok(DepositRecord {
            owner: deposit.owner,
            liquidity: deposit.liquidity,
            token0: deposit.token0,
            token1: deposit.token1,
        })
    }

    /// Move DAI and USDC from the liquidity whales to `to`.
    async fn fund(&self, to: Address, dai_amount: U256, usdc_amount: U256) -> HarnessResult<()> {
        DAI.transfer(&self.node.account(DAI_WHALE), to, dai_amount).await?;
        USDC.transfer(&self.node.account(USDC_WHALE), to, usdc_amount).await?;
        Ok(())
    }

    async fn deploy_contracts(&self, deployer: Address) -> HarnessResult<Deployment> {
        self.token_swap_artifact()?;
        self.liquidity_manager_artifact()?;
        let account = self.node.account(deployer);
        Ok(Deployer::new(&account, &self.artifacts).deploy_all().await?)
    }

    /// Impersonate `accounts`, give them gas, run `body`, then stop impersonating
    /// whether or not `body` succeeded.
    async fn impersonating<T>(
        &self,
        accounts: &[Address],
        body: impl Future<Output = HarnessResult<T>>,
    ) -> HarnessResult<T> {
        let result = async {
            for &account in accounts {
                self.node.impersonate(account).await?;
                self.node.set_balance(account, gas_money()).await?;
            }
            body.await
        }
        .await;

        for &account in accounts {
            if let Err(e) = self.node.stop_impersonating(account).await {
                tracing::warn!(account = %account, error = %e, "Failed to stop impersonating");
            }
        }
        result
    }

    /// Load TokenSwap and check the bindings against its ABI.
    fn token_swap_artifact(&self) -> HarnessResult<ContractArtifact> {
        let artifact = ArtifactStore::new(&self.artifacts).artifact(&self.artifacts.token_swap)?;
        artifact.require_functions(&[
            TokenSwap::swapExactInputSingleCall::SIGNATURE,
            TokenSwap::swapExactOutputSingleCall::SIGNATURE,
            TokenSwap::swapExactInputMultihopCall::SIGNATURE,
            TokenSwap::swapExactOutputMultihopCall::SIGNATURE,
        ])?;
        artifact.require_events(&[
            TokenSwap::swapExactInputSingleEvent::SIGNATURE,
            TokenSwap::swapExactOutputSingleEvent::SIGNATURE,
            TokenSwap::swapExactInputMultihopEvent::SIGNATURE,
            TokenSwap::swapExactOutputMultihopEvent::SIGNATURE,
        ])?;
        Ok(artifact)
    }

    /// Load LiquidityManager and check the bindings against its ABI.
    fn liquidity_manager_artifact(&self) -> HarnessResult<ContractArtifact> {
        let artifact =
            ArtifactStore::new(&self.artifacts).artifact(&self.artifacts.liquidity_manager)?;
        artifact.require_functions(&[
            LiquidityManager::mintNewPositionCall::SIGNATURE,
            LiquidityManager::depositsCall::SIGNATURE,
            LiquidityManager::increaseLiquidityCurrentRangeCall::SIGNATURE,
            LiquidityManager::decreaseLiquidityInHalfCall::SIGNATURE,
        ])?;
        artifact.require_events(&[
            LiquidityManager::PositionMinted::SIGNATURE,
            LiquidityManager::LiquidityIncreased::SIGNATURE,
            LiquidityManager::LiquidityDecreasedByHalf::SIGNATURE,
        ])?;
        Ok(artifact)
    }
}

fn display_units(amount: U256, decimals: u8) -> String {
    format_units(amount, decimals).unwrap_or_else(|_| amount.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scenario_names_round_trip() {
        for scenario in Scenario::ALL {
            assert_eq!(Scenario::from_name(scenario.name()), Some(scenario));
        }
        assert_eq!(Scenario::from_name("collect_all_fees"), None);
    }

    #[test]
    fn test_token_constants() {
        assert_eq!(DAI.units(1), U256::from(10u64).pow(U256::from(18u64)));
        assert_eq!(USDC.units(100), U256::from(100_000_000u64));
        assert_eq!(gas_money(), U256::from(10_000_000_000_000_000_000u128));
    }

    #[test]
    fn test_display_units() {
        assert_eq!(display_units(DAI.units(100), 18), "100.000000000000000000");
        assert_eq!(display_units(U256::from(1_500_000u64), 6), "1.500000");
    }

    #[test]
    fn test_report_serializes() {
        let report = ScenarioReport {
            name: Scenario::MintNewPosition.name(),
            passed: false,
            detail: "transaction 0x00 did not emit PositionMinted(uint256)".to_string(),
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["name"], "mint_new_position");
        assert_eq!(json["passed"], false);
    }

    #[test]
    fn test_binding_signatures() {
        assert_eq!(
            TokenSwap::swapExactOutputSingleCall::SIGNATURE,
            "swapExactOutputSingle(uint256,uint256)"
        );
        assert_eq!(LiquidityManager::PositionMinted::SIGNATURE, "PositionMinted(uint256)");
        assert_eq!(
            LiquidityManager::LiquidityDecreasedByHalf::SIGNATURE,
            "LiquidityDecreasedByHalf(uint256,uint256)"
        );
    }
}
