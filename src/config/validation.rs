//! Configuration validation.
//!
//! Serde handles syntax; this module checks value ranges and formats.
//! All errors are collected, not just the first.

use std::fmt;

use crate::config::schema::DeployConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: &'static str,
    /// What is wrong with it.
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a configuration, returning every error found.
pub fn validate_config(config: &DeployConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let network = &config.network;

    if network.name.trim().is_empty() {
        errors.push(ValidationError::new("network.name", "must not be empty"));
    }
    if let Err(e) = network.rpc_url.parse::<url::Url>() {
        errors.push(ValidationError::new(
            "network.rpc_url",
            format!("invalid URL '{}': {}", network.rpc_url, e),
        ));
    }
    for failover in &network.failover_urls {
        if failover.parse::<url::Url>().is_err() {
            errors.push(ValidationError::new(
                "network.failover_urls",
                format!("invalid URL '{}'", failover),
            ));
        }
    }
    if let Some(fork_url) = &network.fork_url {
        if fork_url.parse::<url::Url>().is_err() {
            errors.push(ValidationError::new(
                "network.fork_url",
                format!("invalid URL '{}'", fork_url),
            ));
        }
    }
    if let Some(expected) = network.known_chain_id() {
        if network.chain_id != expected {
            errors.push(ValidationError::new(
                "network.chain_id",
                format!("{} does not match network '{}' ({})", network.chain_id, network.name, expected),
            ));
        }
    }
    if network.rpc_timeout_secs == 0 {
        errors.push(ValidationError::new("network.rpc_timeout_secs", "must be > 0"));
    }
    if network.confirmation_timeout_secs == 0 {
        errors.push(ValidationError::new(
            "network.confirmation_timeout_secs",
            "must be > 0",
        ));
    }
    if !(network.gas_price_multiplier > 0.0 && network.gas_price_multiplier <= 10.0) {
        errors.push(ValidationError::new(
            "network.gas_price_multiplier",
            format!("{} is outside (0, 10]", network.gas_price_multiplier),
        ));
    }

    let compiler = &config.compiler;
    if !is_semver(&compiler.version) {
        errors.push(ValidationError::new(
            "compiler.version",
            format!("'{}' is not MAJOR.MINOR.PATCH", compiler.version),
        ));
    }
    if compiler.optimizer_enabled && compiler.optimizer_runs == 0 {
        errors.push(ValidationError::new(
            "compiler.optimizer_runs",
            "must be > 0 when the optimizer is enabled",
        ));
    }

    for (field, name) in [
        ("artifacts.token_swap", &config.artifacts.token_swap),
        ("artifacts.liquidity_manager", &config.artifacts.liquidity_manager),
    ] {
        if !name.contains(':') {
            errors.push(ValidationError::new(
                field,
                format!("'{}' must be <source>:<ContractName>", name),
            ));
        }
    }

    let verification = &config.verification;
    if verification.max_attempts == 0 {
        errors.push(ValidationError::new("verification.max_attempts", "must be > 0"));
    }
    if verification.base_delay_ms > verification.max_delay_ms {
        errors.push(ValidationError::new(
            "verification.base_delay_ms",
            "must not exceed verification.max_delay_ms",
        ));
    }
    if verification.timeout_secs == 0 {
        errors.push(ValidationError::new("verification.timeout_secs", "must be > 0"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn is_semver(version: &str) -> bool {
    let parts: Vec<&str> = version.split('.').collect();
    parts.len() == 3
        && parts
            .iter()
            .all(|p| !p.is_empty() && p.chars().all(|c| c.is_ascii_digit()))
}
