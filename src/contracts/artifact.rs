//! Compiled contract artifacts and solc build info.
//!
//! Artifacts follow the Hardhat layout: `<dir>/<sourceName>/<ContractName>.json`
//! holding `contractName`, `sourceName`, `abi`, `bytecode` and `deployedBytecode`.

use alloy::json_abi::JsonAbi;
use alloy::primitives::Bytes;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::config::{ArtifactsConfig, CompilerConfig};

/// Errors raised while loading artifacts.
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("'{0}' is not a fully qualified name (<source>:<ContractName>)")]
    InvalidName(String),

    #[error("{contract}: bytecode is empty (abstract contract or interface?)")]
    EmptyBytecode { contract: String },

    #[error("{contract}: bytecode has unlinked library placeholders")]
    Unlinked { contract: String },

    #[error("{contract}: bytecode is not valid hex: {reason}")]
    InvalidBytecode { contract: String, reason: String },

    #[error("{contract}: ABI has no {kind} matching '{signature}'")]
    AbiMismatch {
        contract: String,
        kind: &'static str,
        signature: String,
    },

    #[error("compiler mismatch: configured {configured}, build info has {actual}")]
    CompilerMismatch { configured: String, actual: String },

    #[error("no build info configured; set artifacts.build_info")]
    NoBuildInfo,
}

/// Raw artifact file shape.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawArtifact {
    contract_name: String,
    source_name: String,
    abi: JsonAbi,
    bytecode: String,
    deployed_bytecode: String,
}

/// A compiled, linked contract.
#[derive(Debug, Clone)]
pub struct ContractArtifact {
    pub contract_name: String,
    pub source_name: String,
    pub abi: JsonAbi,
    pub bytecode: Bytes,
    pub deployed_bytecode: Bytes,
}

impl ContractArtifact {
    /// Load an artifact file.
    pub fn load(path: &Path) -> Result<Self, ArtifactError> {
        let content = fs::read_to_string(path).map_err(|source| ArtifactError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&content).map_err(|e| match e {
            ArtifactError::Parse { source, .. } => ArtifactError::Parse {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })
    }

    /// Parse an artifact from its JSON text.
    pub fn from_json(json: &str) -> Result<Self, ArtifactError> {
        let raw: RawArtifact = serde_json::from_str(json).map_err(|source| ArtifactError::Parse {
            path: PathBuf::new(),
            source,
        })?;

        let bytecode = decode_bytecode(&raw.contract_name, &raw.bytecode)?;
        let deployed_bytecode = decode_bytecode(&raw.contract_name, &raw.deployed_bytecode)?;

        Ok(Self {
            contract_name: raw.contract_name,
            source_name: raw.source_name,
            abi: raw.abi,
            bytecode,
            deployed_bytecode,
        })
    }

    /// `<sourceName>:<contractName>`, the form explorers expect.
    pub fn fully_qualified_name(&self) -> String {
        format!("{}:{}", self.source_name, self.contract_name)
    }

    /// Creation bytecode followed by the ABI-encoded constructor arguments.
    pub fn creation_code(&self, constructor_args: &[u8]) -> Bytes {
        let mut code = Vec::with_capacity(self.bytecode.len() + constructor_args.len());
        code.extend_from_slice(&self.bytecode);
        code.extend_from_slice(constructor_args);
        code.into()
    }

    /// Fail if the ABI lacks any of the given event signatures.
    pub fn require_events(&self, signatures: &[&str]) -> Result<(), ArtifactError> {
        for signature in signatures {
            if !self.abi.events().any(|e| e.signature() == *signature) {
                return Err(ArtifactError::AbiMismatch {
                    contract: self.contract_name.clone(),
                    kind: "event",
                    signature: signature.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Fail if the ABI lacks any of the given function signatures.
    pub fn require_functions(&self, signatures: &[&str]) -> Result<(), ArtifactError> {
        for signature in signatures {
            if !self.abi.functions().any(|f| f.signature() == *signature) {
                return Err(ArtifactError::AbiMismatch {
                    contract: self.contract_name.clone(),
                    kind: "function",
                    signature: signature.to_string(),
                });
            }
        }
        Ok(())
    }
}

fn decode_bytecode(contract: &str, hex: &str) -> Result<Bytes, ArtifactError> {
    if hex.contains("__$") {
        return Err(ArtifactError::Unlinked {
            contract: contract.to_string(),
        });
    }
    let bytes = alloy::hex::decode(hex).map_err(|e| ArtifactError::InvalidBytecode {
        contract: contract.to_string(),
        reason: e.to_string(),
    })?;
    if bytes.is_empty() {
        return Err(ArtifactError::EmptyBytecode {
            contract: contract.to_string(),
        });
    }
    Ok(bytes.into())
}

/// Resolves fully qualified contract names to artifact files.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
    build_info: Option<PathBuf>,
}

impl ArtifactStore {
    pub fn new(config: &ArtifactsConfig) -> Self {
        Self {
            root: PathBuf::from(&config.dir),
            build_info: config.build_info.as_ref().map(PathBuf::from),
        }
    }

    /// Path of the artifact for `contracts/Foo.sol:Foo`.
    pub fn path_for(&self, fq_name: &str) -> Result<PathBuf, ArtifactError> {
        let (source, name) = fq_name
            .rsplit_once(':')
            .filter(|(s, n)| !s.is_empty() && !n.is_empty())
            .ok_or_else(|| ArtifactError::InvalidName(fq_name.to_string()))?;
        Ok(self.root.join(source).join(format!("{}.json", name)))
    }

    /// Load the artifact for a fully qualified name.
    pub fn artifact(&self, fq_name: &str) -> Result<ContractArtifact, ArtifactError> {
        let path = self.path_for(fq_name)?;
        tracing::debug!(contract = fq_name, path = %path.display(), "Loading artifact");
        ContractArtifact::load(&path)
    }

    /// Load the configured build info.
    pub fn build_info(&self) -> Result<BuildInfo, ArtifactError> {
        let path = self.build_info.as_ref().ok_or(ArtifactError::NoBuildInfo)?;
        BuildInfo::load(path)
    }
}

/// solc build info: the exact standard-JSON input and compiler build.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildInfo {
    pub solc_version: String,
    pub solc_long_version: String,
    pub input: serde_json::Value,
}

impl BuildInfo {
    pub fn load(path: &Path) -> Result<Self, ArtifactError> {
        let content = fs::read_to_string(path).map_err(|source| ArtifactError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ArtifactError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Compiler version string explorers expect, e.g. `v0.7.6+commit.7338295f`.
    pub fn explorer_compiler_version(&self) -> String {
        if self.solc_long_version.starts_with('v') {
            self.solc_long_version.clone()
        } else {
            format!("v{}", self.solc_long_version)
        }
    }

    /// The standard-JSON input, serialized.
    pub fn standard_json_input(&self) -> String {
        self.input.to_string()
    }

    /// Optimizer `(enabled, runs)` as recorded in the input settings.
    pub fn optimizer(&self) -> (bool, u32) {
        let optimizer = &self.input["settings"]["optimizer"];
        let enabled = optimizer["enabled"].as_bool().unwrap_or(false);
        let runs = optimizer["runs"]
            .as_u64()
            .and_then(|r| u32::try_from(r).ok())
            .unwrap_or(200);
        (enabled, runs)
    }

    /// Check the build matches the configured compiler settings.
    pub fn check_compiler(&self, compiler: &CompilerConfig) -> Result<(), ArtifactError> {
        if self.solc_version != compiler.version {
            return Err(ArtifactError::CompilerMismatch {
                configured: compiler.version.clone(),
                actual: self.solc_version.clone(),
            });
        }
        let (enabled, runs) = self.optimizer();
        if enabled != compiler.optimizer_enabled || (enabled && runs != compiler.optimizer_runs) {
            return Err(ArtifactError::CompilerMismatch {
                configured: format!(
                    "optimizer={} runs={}",
                    compiler.optimizer_enabled, compiler.optimizer_runs
                ),
                actual: format!("optimizer={} runs={}", enabled, runs),
            });
        }
        Ok(())
    }
}
