//! RPC client, transaction builder and harness teardown against a scripted node.

use std::sync::{Arc, Mutex};

use alloy::network::TransactionBuilder;
use alloy::primitives::{address, keccak256, Address, B256};
use alloy::rpc::types::TransactionRequest;
use alloy::sol_types::{SolCall, SolEvent};
use uniswap_deployer::blockchain::{BlockchainClient, BlockchainError, NetworkConfig, TxBuilder, Wallet};
use uniswap_deployer::config::ArtifactsConfig;
use uniswap_deployer::contracts::{LiquidityManager, TokenSwap};
use uniswap_deployer::harness::scenarios::{DAI_WHALE, USDC_WHALE};
use uniswap_deployer::harness::{ForkNode, Scenario, Scenarios};

mod common;
use common::{rpc_error, rpc_result, MockRequest};

const TX: B256 = B256::repeat_byte(0xab);
const SIGNER: Address = address!("f39Fd6e51aad88F6F4ce6aB8827279cffFb92266");
const ANVIL_KEY: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

/// Every JSON-RPC call the node received, in order: `(method, params)`.
type Calls = Arc<Mutex<Vec<(String, serde_json::Value)>>>;

/// Node whose reply to each call is chosen by `answer(method, request, n)`,
/// where `n` counts earlier calls of the same method.
async fn start_node<F>(answer: F) -> (String, Calls)
where
    F: Fn(&str, &MockRequest, usize) -> (u16, String) + Send + Sync + 'static,
{
    let calls: Calls = Arc::default();
    let log = calls.clone();
    let answer = Arc::new(answer);

    let addr = common::start_programmable_backend(move |req: MockRequest| {
        let log = log.clone();
        let answer = answer.clone();
        async move {
            let method = req.rpc_method().unwrap_or_default();
            let n = {
                let mut log = log.lock().unwrap();
                let n = log.iter().filter(|(m, _)| *m == method).count();
                log.push((method.clone(), req.rpc_params()));
                n
            };
            answer(&method, &req, n)
        }
    })
    .await;

    (format!("http://{}", addr), calls)
}

fn count(calls: &Calls, method: &str) -> usize {
    calls.lock().unwrap().iter().filter(|(m, _)| m == method).count()
}

fn network(rpc_url: String) -> NetworkConfig {
    NetworkConfig {
        rpc_url,
        rpc_timeout_secs: 2,
        ..NetworkConfig::default()
    }
}

fn receipt(status: &str) -> serde_json::Value {
    serde_json::json!({
        "transactionHash": TX,
        "transactionIndex": "0x0",
        "blockHash": B256::repeat_byte(1),
        "blockNumber": "0x10",
        "from": SIGNER,
        "to": Address::repeat_byte(2),
        "cumulativeGasUsed": "0x5208",
        "gasUsed": "0x5208",
        "effectiveGasPrice": "0x1",
        "contractAddress": null,
        "logs": [],
        "logsBloom": format!("0x{}", "00".repeat(256)),
        "type": "0x2",
        "status": status
    })
}

/// Chain id, head block and `receipts(n)` for receipt lookups.
fn chain_answer(
    receipts: fn(usize) -> (u16, serde_json::Value),
) -> impl Fn(&str, &MockRequest, usize) -> (u16, String) + Send + Sync + 'static {
    move |method: &str, req: &MockRequest, n: usize| match method {
        "eth_chainId" => (200, rpc_result(req, serde_json::json!("0x7a69"))),
        "eth_blockNumber" => (200, rpc_result(req, serde_json::json!("0x10"))),
        "eth_getTransactionReceipt" => {
            let (status, result) = receipts(n);
            (status, rpc_result(req, result))
        }
        _ => (200, rpc_error(req, -32601, "method not found")),
    }
}

#[tokio::test]
async fn test_reverted_receipt_is_an_error() {
    let (url, _calls) = start_node(chain_answer(|_| (200, receipt("0x0")))).await;
    let client = BlockchainClient::new(network(url)).await.unwrap();

    let err = client.wait_for_receipt(TX, 5).await.unwrap_err();
    assert!(matches!(err, BlockchainError::Reverted(hash) if hash == TX), "{err}");
}

#[tokio::test]
async fn test_missing_receipt_times_out() {
    let (url, calls) = start_node(chain_answer(|_| (200, serde_json::Value::Null))).await;
    let client = BlockchainClient::new(network(url)).await.unwrap();

    let err = client.wait_for_receipt(TX, 1).await.unwrap_err();
    assert!(matches!(
        err,
        BlockchainError::ConfirmationTimeout { tx_hash, timeout_secs: 1 } if tx_hash == TX
    ));
    assert!(count(&calls, "eth_getTransactionReceipt") >= 1);
}

#[tokio::test]
async fn test_receipt_lookup_error_is_retried() {
    let (url, calls) = start_node(chain_answer(|n| {
        if n == 0 {
            (500, serde_json::Value::Null)
        } else {
            (200, receipt("0x1"))
        }
    }))
    .await;
    let client = BlockchainClient::new(network(url)).await.unwrap();

    let confirmed = client.wait_for_receipt(TX, 10).await.unwrap();
    assert_eq!(confirmed.transaction_hash, TX);
    assert_eq!(count(&calls, "eth_getTransactionReceipt"), 2);
}

#[tokio::test]
async fn test_chain_id_mismatch_is_reported() {
    let (url, _calls) = start_node(|method: &str, req: &MockRequest, _: usize| match method {
        "eth_chainId" => (200, rpc_result(req, serde_json::json!("0x1"))),
        _ => (200, rpc_error(req, -32601, "method not found")),
    })
    .await;
    let client = BlockchainClient::new(NetworkConfig {
        name: "sepolia".to_string(),
        chain_id: 11155111,
        ..network(url)
    })
    .await
    .unwrap();

    let err = client.verify_chain_id().await.unwrap_err();
    assert!(matches!(
        err,
        BlockchainError::ChainMismatch {
            expected: 11155111,
            actual: 1
        }
    ));
}

/// Nonce 3, the given gas price, 21000 gas estimate.
fn fee_answer(gas_price: &'static str) -> impl Fn(&str, &MockRequest, usize) -> (u16, String) + Send + Sync + 'static {
    move |method: &str, req: &MockRequest, _: usize| match method {
        "eth_chainId" => (200, rpc_result(req, serde_json::json!("0x7a69"))),
        "eth_getTransactionCount" => (200, rpc_result(req, serde_json::json!("0x3"))),
        "eth_gasPrice" => (200, rpc_result(req, serde_json::json!(gas_price))),
        "eth_estimateGas" => (200, rpc_result(req, serde_json::json!("0x5208"))),
        _ => (200, rpc_error(req, -32601, "method not found")),
    }
}

#[tokio::test]
async fn test_gas_price_above_ceiling_is_refused() {
    // 600 gwei against the default 500 gwei ceiling.
    let (url, calls) = start_node(fee_answer("0x8bb2c97000")).await;
    let client = BlockchainClient::new(network(url)).await.unwrap();
    let builder = TxBuilder::new(client, Wallet::from_private_key(ANVIL_KEY, 31337).unwrap());

    let err = builder
        .prepare(TransactionRequest::default().with_to(Address::repeat_byte(2)))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        BlockchainError::GasPriceTooHigh {
            current_gwei: 600,
            max_gwei: 500
        }
    ));
    assert_eq!(count(&calls, "eth_estimateGas"), 0);
}

#[tokio::test]
async fn test_prepare_fills_nonce_gas_and_chain() {
    // 10 gwei.
    let (url, _calls) = start_node(fee_answer("0x2540be400")).await;
    let client = BlockchainClient::new(NetworkConfig {
        gas_price_multiplier: 1.5,
        ..network(url)
    })
    .await
    .unwrap();
    let builder = TxBuilder::new(client, Wallet::from_private_key(ANVIL_KEY, 31337).unwrap());

    let tx = builder
        .prepare(TransactionRequest::default().with_to(Address::repeat_byte(2)))
        .await
        .unwrap();

    assert_eq!(tx.from, Some(SIGNER));
    assert_eq!(tx.nonce, Some(3));
    assert_eq!(tx.gas, Some(25_200));
    assert_eq!(tx.gas_price, Some(15_000_000_000));
    assert_eq!(tx.chain_id, Some(31337));
}

fn raw_answer(message: &'static str) -> impl Fn(&str, &MockRequest, usize) -> (u16, String) + Send + Sync + 'static {
    move |method: &str, req: &MockRequest, _: usize| match method {
        "eth_chainId" => (200, rpc_result(req, serde_json::json!("0x7a69"))),
        "eth_sendRawTransaction" => (200, rpc_error(req, -32000, message)),
        _ => (200, rpc_error(req, -32601, "method not found")),
    }
}

#[tokio::test]
async fn test_already_known_rebroadcast_returns_local_hash() {
    let raw = [0x02u8, 0xc0, 0x01];
    let (url, _calls) = start_node(raw_answer("already known")).await;
    let client = BlockchainClient::new(network(url)).await.unwrap();

    let hash = client.send_raw_transaction(&raw).await.unwrap();
    assert_eq!(hash, keccak256(raw));
}

#[tokio::test]
async fn test_nonce_too_low_only_accepted_on_failover() {
    let raw = [0x02u8, 0xc0, 0x02];

    // Primary unreachable: the failover sees the relayed transaction.
    let (url, _calls) = start_node(raw_answer("nonce too low")).await;
    let client = BlockchainClient::new(NetworkConfig {
        failover_urls: vec![url],
        ..network("http://127.0.0.1:1".to_string())
    })
    .await
    .unwrap();
    assert_eq!(client.send_raw_transaction(&raw).await.unwrap(), keccak256(raw));

    // First attempt: a genuine nonce conflict.
    let (url, _calls) = start_node(raw_answer("nonce too low")).await;
    let client = BlockchainClient::new(network(url)).await.unwrap();
    assert!(client.send_raw_transaction(&raw).await.is_err());
}

fn abi_function(signature: &str) -> serde_json::Value {
    let (name, types) = split_signature(signature);
    let inputs: Vec<_> = types
        .iter()
        .map(|ty| serde_json::json!({"name": "", "type": ty, "internalType": ty}))
        .collect();
    serde_json::json!({
        "type": "function",
        "name": name,
        "inputs": inputs,
        "outputs": [],
        "stateMutability": "nonpayable"
    })
}

fn abi_event(signature: &str) -> serde_json::Value {
    let (name, types) = split_signature(signature);
    let inputs: Vec<_> = types
        .iter()
        .map(|ty| serde_json::json!({"name": "", "type": ty, "internalType": ty, "indexed": false}))
        .collect();
    serde_json::json!({"type": "event", "name": name, "inputs": inputs, "anonymous": false})
}

fn split_signature(signature: &str) -> (&str, Vec<&str>) {
    let (name, args) = signature.trim_end_matches(')').split_once('(').unwrap();
    (name, args.split(',').filter(|t| !t.is_empty()).collect())
}

/// Artifacts for both contracts with the ABI entries the scenarios check.
fn write_artifacts() -> ArtifactsConfig {
    let root = std::env::temp_dir().join(format!("harness-artifacts-{}", uuid::Uuid::new_v4()));
    let contracts = [
        (
            "contracts/TokenSwap.sol",
            "TokenSwap",
            vec![
                abi_function(TokenSwap::swapExactInputSingleCall::SIGNATURE),
                abi_function(TokenSwap::swapExactOutputSingleCall::SIGNATURE),
                abi_function(TokenSwap::swapExactInputMultihopCall::SIGNATURE),
                abi_function(TokenSwap::swapExactOutputMultihopCall::SIGNATURE),
                abi_event(TokenSwap::swapExactInputSingleEvent::SIGNATURE),
                abi_event(TokenSwap::swapExactOutputSingleEvent::SIGNATURE),
                abi_event(TokenSwap::swapExactInputMultihopEvent::SIGNATURE),
                abi_event(TokenSwap::swapExactOutputMultihopEvent::SIGNATURE),
            ],
        ),
        (
            "contracts/LiquidityManager.sol",
            "LiquidityManager",
            vec![
                abi_function(LiquidityManager::mintNewPositionCall::SIGNATURE),
                abi_function(LiquidityManager::depositsCall::SIGNATURE),
                abi_function(LiquidityManager::increaseLiquidityCurrentRangeCall::SIGNATURE),
                abi_function(LiquidityManager::decreaseLiquidityInHalfCall::SIGNATURE),
                abi_event(LiquidityManager::PositionMinted::SIGNATURE),
                abi_event(LiquidityManager::LiquidityIncreased::SIGNATURE),
                abi_event(LiquidityManager::LiquidityDecreasedByHalf::SIGNATURE),
            ],
        ),
    ];

    for (source, name, abi) in contracts {
        let dir = root.join(source);
        std::fs::create_dir_all(&dir).unwrap();
        let artifact = serde_json::json!({
            "contractName": name,
            "sourceName": source,
            "abi": abi,
            "bytecode": "0x6080604052",
            "deployedBytecode": "0x6080604052",
        });
        std::fs::write(dir.join(format!("{}.json", name)), artifact.to_string()).unwrap();
    }

    ArtifactsConfig {
        dir: root.to_string_lossy().into_owned(),
        ..ArtifactsConfig::default()
    }
}

fn first_param(params: &serde_json::Value) -> Option<Address> {
    params.get(0)?.as_str()?.parse().ok()
}

#[tokio::test]
async fn test_impersonation_stopped_when_scenario_fails() {
    let (url, calls) = start_node(|method: &str, req: &MockRequest, _: usize| match method {
        "eth_chainId" => (200, rpc_result(req, serde_json::json!("0x7a69"))),
        "eth_accounts" => (200, rpc_result(req, serde_json::json!([SIGNER]))),
        "anvil_impersonateAccount" | "anvil_stopImpersonatingAccount" | "anvil_setBalance" => {
            (200, rpc_result(req, serde_json::Value::Null))
        }
        "eth_sendTransaction" => (200, rpc_error(req, -32000, "execution reverted")),
        _ => (200, rpc_error(req, -32601, "method not found")),
    })
    .await;
    let node = ForkNode::connect(&network(url)).await.unwrap();
    let artifacts = write_artifacts();

    let report = Scenarios::new(&node, &artifacts).run(Scenario::MintNewPosition).await;
    assert!(!report.passed, "{}", report.detail);

    let calls = calls.lock().unwrap();
    let accounts_for = |method: &str| -> Vec<Address> {
        calls
            .iter()
            .filter(|(m, _)| m == method)
            .filter_map(|(_, params)| first_param(params))
            .collect()
    };
    assert_eq!(accounts_for("anvil_impersonateAccount"), vec![DAI_WHALE, USDC_WHALE]);
    assert_eq!(accounts_for("anvil_stopImpersonatingAccount"), vec![DAI_WHALE, USDC_WHALE]);

    // Teardown comes after every other call.
    let last_two: Vec<&str> = calls.iter().rev().take(2).map(|(m, _)| m.as_str()).collect();
    assert_eq!(last_two, vec!["anvil_stopImpersonatingAccount"; 2]);

    let _ = std::fs::remove_dir_all(&artifacts.dir);
}
