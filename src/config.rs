//! Configuration management for the entity faucet
//!
//! Loads configuration from TOML files with environment variable substitution.
//! Signer keys are normally given as `${VAR}` references so they never live in
//! the file itself.

use crate::chain::Network;

use anyhow::{Context, Result};
use ethers::types::U256;
use serde::Deserialize;
use std::collections::HashSet;
use std::env;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub faucet: FaucetConfig,
    pub network: NetworkConfig,
    pub signers: SignersConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FaucetConfig {
    /// Sleep between lease rounds when no funded signer is free
    pub retry_interval_ms: u64,
    /// Receipt polling interval
    pub poll_interval_ms: u64,
    /// Upper bound on waiting for a signer, 0 waits forever
    pub max_lease_wait_secs: u64,
    /// Give up watching a receipt after this long, 0 never gives up
    pub confirmation_timeout_secs: u64,
    pub health_check_interval_secs: u64,
}

impl Default for FaucetConfig {
    fn default() -> Self {
        Self {
            retry_interval_ms: 5_000,
            poll_interval_ms: 5_000,
            max_lease_wait_secs: 300,
            confirmation_timeout_secs: 600,
            health_check_interval_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NetworkConfig {
    pub name: String,
    pub endpoint: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Gas limit for funding transfers, defaults to a plain transfer
    pub gas_limit: Option<u64>,
    /// Default funding amount in wei as a decimal string
    pub default_amount: Option<String>,
    /// Fixed gas price, bypasses the node suggestion
    pub gas_price_gwei: Option<u64>,
}

fn default_timeout_secs() -> u64 {
    10
}

impl NetworkConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Configured default amount, falling back to the network's own default
    pub fn default_amount_wei(&self, network: &Network) -> Result<U256> {
        match &self.default_amount {
            Some(amount) => parse_wei(amount),
            None => Ok(network.default_amount()),
        }
    }
}

#[derive(Clone, Deserialize)]
pub struct SignersConfig {
    pub private_keys: Vec<String>,
}

impl fmt::Debug for SignersConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignersConfig")
            .field("private_keys", &format!("<{} redacted>", self.private_keys.len()))
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: 9090,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub json: bool,
    /// Overrides the default filter when RUST_LOG is unset
    pub filter: Option<String>,
}

impl Settings {
    /// Load settings from the file named by FAUCET_CONFIG
    pub fn load() -> Result<Self> {
        let config_path = env::var("FAUCET_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config/default.toml"));

        Self::load_from(&config_path)
    }

    /// Load settings from a specific file
    pub fn load_from(path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        Self::from_toml_str(&config_str)
    }

    /// Parse and validate settings from TOML text
    pub fn from_toml_str(input: &str) -> Result<Self> {
        let config_str = substitute_env_vars(input)?;

        let settings: Settings =
            toml::from_str(&config_str).with_context(|| "Failed to parse configuration")?;

        settings.validate()?;

        Ok(settings)
    }

    /// Validate configuration
    fn validate(&self) -> Result<()> {
        let network = Network::by_name(&self.network.name)
            .with_context(|| format!("Unsupported network {}", self.network.name))?;

        if self.network.endpoint.is_empty() {
            anyhow::bail!("Network {} has no endpoint configured", network.name);
        }
        if self.network.timeout_secs == 0 {
            anyhow::bail!("network.timeout_secs must be positive");
        }
        if self.network.gas_limit == Some(0) {
            anyhow::bail!("network.gas_limit must be positive");
        }
        let amount = self.network.default_amount_wei(network)?;
        if amount.is_zero() {
            anyhow::bail!("Default funding amount must be positive");
        }

        if self.faucet.retry_interval_ms == 0 || self.faucet.poll_interval_ms == 0 {
            anyhow::bail!("Faucet retry and poll intervals must be positive");
        }

        if self.signers.private_keys.is_empty() {
            anyhow::bail!("At least one signer key must be configured");
        }
        let mut seen = HashSet::new();
        for (i, key) in self.signers.private_keys.iter().enumerate() {
            let normalized = key.trim().trim_start_matches("0x").to_lowercase();
            if normalized.is_empty() {
                anyhow::bail!("Signer key #{} is empty (unset environment variable?)", i);
            }
            if !seen.insert(normalized) {
                anyhow::bail!("Signer key #{} is a duplicate", i);
            }
        }

        Ok(())
    }
}

/// Parse a decimal wei amount
pub fn parse_wei(input: &str) -> Result<U256> {
    let trimmed = input.trim().replace('_', "");
    U256::from_dec_str(&trimmed).with_context(|| format!("Invalid wei amount '{}'", input))
}

/// Substitute environment variables in the format ${VAR_NAME}
fn substitute_env_vars(input: &str) -> Result<String> {
    let mut result = input.to_string();
    let re = regex::Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}")?;

    for cap in re.captures_iter(input) {
        let var_name = &cap[1];
        let var_value = env::var(var_name).unwrap_or_default();
        result = result.replace(&cap[0], &var_value);
    }

    Ok(result)
}
