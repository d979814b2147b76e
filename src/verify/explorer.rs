//! Etherscan-compatible explorer API client.
//!
//! Uses the unified (v2) endpoint, which selects the chain with a `chainid`
//! query parameter. Every response has the shape
//! `{"status": "0"|"1", "message": "...", "result": ...}`, except the proxy
//! module which answers JSON-RPC style (`{"jsonrpc", "id", "result"}`).

use alloy::primitives::{Address, Bytes};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

use crate::config::{known_network, ExplorerConfig};

const DEFAULT_API_URL: &str = "https://api.etherscan.io/v2/api";
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors talking to the explorer.
#[derive(Debug, Error)]
pub enum ExplorerError {
    #[error("explorer API key missing (set ETHERSCAN_KEY)")]
    MissingApiKey,

    #[error("network '{0}' has no block explorer")]
    UnsupportedNetwork(String),

    #[error("explorer request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("explorer rejected request: {message}: {result}")]
    Api { message: String, result: String },

    #[error("unexpected explorer response: {0}")]
    InvalidResponse(String),
}

impl ExplorerError {
    /// Whether retrying the same request later may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            ExplorerError::Http(e) => {
                e.is_timeout() || e.is_connect() || e.status().is_some_and(|s| s.is_server_error() || s.as_u16() == 429)
            }
            ExplorerError::Api { result, .. } => {
                let lower = result.to_lowercase();
                lower.contains("rate limit") || lower.contains("try again")
            }
            _ => false,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    status: Option<String>,
    message: Option<String>,
    result: Option<serde_json::Value>,
    error: Option<serde_json::Value>,
}

impl ApiResponse {
    fn result_text(&self) -> String {
        match &self.result {
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => String::new(),
        }
    }

    fn is_ok(&self) -> bool {
        self.status.as_deref() == Some("1")
    }

    fn api_error(&self) -> ExplorerError {
        ExplorerError::Api {
            message: self.message.clone().unwrap_or_else(|| "NOTOK".to_string()),
            result: self.result_text(),
        }
    }
}

/// Source verification submission.
#[derive(Debug, Clone)]
pub struct VerificationRequest {
    pub address: Address,
    /// `<source>:<ContractName>`.
    pub contract_name: String,
    /// solc standard-JSON input.
    pub source: String,
    /// Long compiler version, e.g. `v0.7.6+commit.7338295f`.
    pub compiler_version: String,
    pub constructor_args: Bytes,
    pub optimization_used: bool,
    pub runs: u32,
}

/// Response to a submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    /// Queued; poll with this GUID.
    Queued(String),
    /// The explorer already has the source.
    AlreadyVerified,
}

/// State of a queued verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationStatus {
    Pending,
    Verified,
    AlreadyVerified,
    Failed(String),
}

/// Explorer API client for one chain.
#[derive(Debug, Clone)]
pub struct ExplorerClient {
    http: reqwest::Client,
    api_url: String,
    api_key: String,
    chain_id: u64,
    browser_url: String,
}

impl ExplorerClient {
    /// Create a client with explicit endpoints.
    pub fn new(
        api_url: impl Into<String>,
        api_key: impl Into<String>,
        chain_id: u64,
        browser_url: impl Into<String>,
    ) -> Result<Self, ExplorerError> {
        let http = reqwest::Client::builder().timeout(HTTP_TIMEOUT).build()?;
        Ok(Self {
            http,
            api_url: api_url.into(),
            api_key: api_key.into(),
            chain_id,
            browser_url: browser_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Resolve the explorer for a network name.
    ///
    /// Local networks (`localhost`, `hardhat`, `anvil`, ...) have none unless
    /// `api_url` is configured explicitly.
    pub fn for_network(network: &str, config: &ExplorerConfig) -> Result<Self, ExplorerError> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.is_empty())
            .ok_or(ExplorerError::MissingApiKey)?;

        match (known_network(network), &config.api_url) {
            (Some((chain_id, browser)), api_url) => Self::new(
                api_url.clone().unwrap_or_else(|| DEFAULT_API_URL.to_string()),
                api_key,
                chain_id,
                config.browser_url.clone().unwrap_or_else(|| browser.to_string()),
            ),
            (None, Some(api_url)) => {
                let chain_id = network.parse::<u64>().unwrap_or_default();
                Self::new(
                    api_url.clone(),
                    api_key,
                    chain_id,
                    config.browser_url.clone().unwrap_or_else(|| api_url.clone()),
                )
            }
            (None, None) => Err(ExplorerError::UnsupportedNetwork(network.to_string())),
        }
    }

    /// Chain the client is bound to.
    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    /// Human link to a contract's code tab.
    pub fn address_url(&self, address: Address) -> String {
        format!("{}/address/{}#code", self.browser_url, address)
    }

    async fn get(&self, params: &[(&str, String)]) -> Result<ApiResponse, ExplorerError> {
        let chain_id = self.chain_id.to_string();
        let response = self
            .http
            .get(&self.api_url)
            .query(&[("chainid", chain_id.as_str()), ("apikey", self.api_key.as_str())])
            .query(params)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json().await?)
    }

    /// Runtime bytecode the explorer sees at `address` (empty until indexed).
    pub async fn get_code(&self, address: Address) -> Result<Bytes, ExplorerError> {
        let response = self
            .get(&[
                ("module", "proxy".to_string()),
                ("action", "eth_getCode".to_string()),
                ("address", address.to_string()),
                ("tag", "latest".to_string()),
            ])
            .await?;

        if let Some(error) = &response.error {
            return Err(ExplorerError::Api {
                message: "eth_getCode".to_string(),
                result: error.to_string(),
            });
        }
        if response.status.as_deref() == Some("0") {
            return Err(response.api_error());
        }

        let text = response.result_text();
        alloy::hex::decode(&text)
            .map(Bytes::from)
            .map_err(|_| ExplorerError::InvalidResponse(format!("eth_getCode result '{}'", text)))
    }

    /// Submit source for verification.
    pub async fn submit_verification(
        &self,
        request: &VerificationRequest,
    ) -> Result<Submission, ExplorerError> {
        let chain_id = self.chain_id.to_string();
        let form = [
            ("apikey", self.api_key.clone()),
            ("module", "contract".to_string()),
            ("action", "verifysourcecode".to_string()),
            ("contractaddress", request.address.to_string()),
            ("sourceCode", request.source.clone()),
            ("codeformat", "solidity-standard-json-input".to_string()),
            ("contractname", request.contract_name.clone()),
            ("compilerversion", request.compiler_version.clone()),
            // Field name is misspelled in the explorer API.
            ("constructorArguements", alloy::hex::encode(&request.constructor_args)),
            ("optimizationUsed", u8::from(request.optimization_used).to_string()),
            ("runs", request.runs.to_string()),
        ];

        let response: ApiResponse = self
            .http
            .post(&self.api_url)
            .query(&[("chainid", chain_id.as_str())])
            .form(&form)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let text = response.result_text();
        if response.is_ok() {
            if text.is_empty() {
                return Err(ExplorerError::InvalidResponse("empty verification GUID".to_string()));
            }
            return Ok(Submission::Queued(text));
        }
        if text.to_lowercase().contains("already verified") {
            return Ok(Submission::AlreadyVerified);
        }
        Err(response.api_error())
    }

    /// Poll the state of a queued verification.
    pub async fn check_status(&self, guid: &str) -> Result<VerificationStatus, ExplorerError> {
        let response = self
            .get(&[
                ("module", "contract".to_string()),
                ("action", "checkverifystatus".to_string()),
                ("guid", guid.to_string()),
            ])
            .await?;

        if !response.is_ok() {
            let error = response.api_error();
            if error.is_transient() {
                return Err(error);
            }
        }
        Ok(parse_status(&response.result_text(), response.is_ok()))
    }
}

fn parse_status(result: &str, ok: bool) -> VerificationStatus {
    let lower = result.to_lowercase();
    if lower.contains("pending") || lower.contains("in queue") {
        VerificationStatus::Pending
    } else if lower.contains("already verified") {
        VerificationStatus::AlreadyVerified
    } else if ok || lower.starts_with("pass") {
        VerificationStatus::Verified
    } else {
        VerificationStatus::Failed(result.to_string())
    }
}
