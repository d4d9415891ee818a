//! Configuration management for the airdrop relayer
//!
//! Loads configuration from TOML files with environment variable substitution.

use crate::tx::{ExtraGasOptions, RetryOptions, DEFAULT_MAX_BLOCKS_WAIT_TIME};

use anyhow::{Context, Result};
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};

/// Root configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub chain: ChainConfig,
    #[serde(default)]
    pub submission: SubmissionConfig,
    #[serde(default)]
    pub wallet: WalletConfig,
    pub transaction: TransactionConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChainConfig {
    pub chain_id: u64,
    pub name: String,
    pub rpc_urls: Vec<String>,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    pub explorer_url: Option<String>,
}

/// Everything the orchestrator needs besides the chain connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct SubmissionConfig {
    #[serde(flatten)]
    pub retry: RetryOptions,
    #[serde(default)]
    pub gas: ExtraGasOptions,
    #[serde(default = "default_max_blocks_wait_time")]
    pub max_blocks_wait_time: u64,
}

impl Default for SubmissionConfig {
    fn default() -> Self {
        Self {
            retry: RetryOptions::default(),
            gas: ExtraGasOptions::default(),
            max_blocks_wait_time: DEFAULT_MAX_BLOCKS_WAIT_TIME,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WalletConfig {
    #[serde(default = "default_private_key_env")]
    pub private_key_env: String,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            private_key_env: default_private_key_env(),
        }
    }
}

/// The transaction the binary submits
#[derive(Debug, Clone, Deserialize)]
pub struct TransactionConfig {
    pub to: String,
    /// Hex-encoded call data
    #[serde(default)]
    pub data: String,
    /// Value in wei, decimal
    #[serde(default)]
    pub value: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MetricsConfig {
    #[serde(default)]
    pub enabled: bool,
    pub textfile_path: Option<PathBuf>,
}

fn default_poll_interval_ms() -> u64 {
    1_000
}

fn default_max_blocks_wait_time() -> u64 {
    DEFAULT_MAX_BLOCKS_WAIT_TIME
}

fn default_private_key_env() -> String {
    "AIRDROP_PRIVATE_KEY".to_string()
}

impl Settings {
    /// Load settings from the file named by `AIRDROP_RELAYER_CONFIG`
    pub fn load() -> Result<Self> {
        let config_path = env::var("AIRDROP_RELAYER_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config/default.toml"));

        Self::load_from(&config_path)
    }

    /// Load settings from a specific file
    pub fn load_from(config_path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {:?}", config_path))?;

        Self::parse(&config_str)
    }

    /// Parse settings from TOML text
    pub fn parse(config_str: &str) -> Result<Self> {
        // Substitute environment variables
        let config_str = substitute_env_vars(config_str);

        let settings: Settings =
            toml::from_str(&config_str).with_context(|| "Failed to parse configuration")?;

        settings.validate()?;

        Ok(settings)
    }

    /// Validate configuration
    fn validate(&self) -> Result<()> {
        let rpc_urls: Vec<_> = self
            .chain
            .rpc_urls
            .iter()
            .filter(|url| !url.trim().is_empty())
            .collect();
        if rpc_urls.is_empty() {
            anyhow::bail!("Chain {} has no RPC URLs configured", self.chain.name);
        }

        if self.submission.retry.retries == 0 {
            anyhow::bail!("submission.retries must be at least 1");
        }

        if self.submission.max_blocks_wait_time == 0 {
            anyhow::bail!("submission.max_blocks_wait_time must be at least 1");
        }

        if self.transaction.to.is_empty() {
            anyhow::bail!("transaction.to is not set");
        }

        Ok(())
    }
}

/// Substitute environment variables in the format ${VAR_NAME}
fn substitute_env_vars(input: &str) -> String {
    let mut result = input.to_string();
    let re = regex::Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").expect("valid env var pattern");

    for cap in re.captures_iter(input) {
        let var_name = &cap[1];
        let var_value = env::var(var_name).unwrap_or_default();
        result = result.replace(&cap[0], &var_value);
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const MINIMAL: &str = r#"
        [chain]
        chain_id = 11155111
        name = "sepolia"
        rpc_urls = ["http://localhost:8545"]

        [transaction]
        to = "0x0000000000000000000000000000000000000001"
    "#;

    #[test]
    fn test_env_var_substitution() {
        env::set_var("AIRDROP_TEST_VAR", "test_value");
        let input = "url = \"https://api.example.com/${AIRDROP_TEST_VAR}/endpoint\"";
        let result = substitute_env_vars(input);
        assert_eq!(result, "url = \"https://api.example.com/test_value/endpoint\"");
    }

    #[test]
    fn test_defaults_applied() {
        let settings = Settings::parse(MINIMAL).unwrap();

        assert_eq!(settings.chain.poll_interval_ms, 1_000);
        assert_eq!(settings.submission, SubmissionConfig::default());
        assert_eq!(settings.submission.retry.retries, 1);
        assert_eq!(settings.submission.retry.delay_ms, 0);
        assert_eq!(settings.submission.gas.extra_gas_percentage, 10);
        assert_eq!(
            settings.submission.gas.extra_max_priority_fee_per_gas_percentage,
            20
        );
        assert_eq!(settings.submission.gas.extra_on_retry_percentage, 1);
        assert_eq!(settings.submission.max_blocks_wait_time, 30);
        assert_eq!(settings.wallet.private_key_env, "AIRDROP_PRIVATE_KEY");
        assert!(!settings.metrics.enabled);
    }

    #[test]
    fn test_load_full_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
            [chain]
            chain_id = 1
            name = "mainnet"
            rpc_urls = ["https://rpc-a.example", "https://rpc-b.example"]
            poll_interval_ms = 250
            explorer_url = "https://etherscan.io"

            [submission]
            retries = 4
            retry_delay_ms = 1500
            max_blocks_wait_time = 12

            [submission.gas]
            extra_gas_percentage = 15
            extra_on_retry_percentage = 5

            [wallet]
            private_key_env = "CLAIMER_KEY"

            [transaction]
            to = "0x0000000000000000000000000000000000000002"
            data = "0x4e71d92d"

            [metrics]
            enabled = true
            textfile_path = "/tmp/airdrop.prom"
            "#
        )
        .unwrap();

        let settings = Settings::load_from(file.path()).unwrap();

        assert_eq!(settings.chain.rpc_urls.len(), 2);
        assert_eq!(settings.submission.retry, RetryOptions::new(4, 1500));
        assert_eq!(settings.submission.max_blocks_wait_time, 12);
        assert_eq!(settings.submission.gas.extra_gas_percentage, 15);
        assert_eq!(
            settings.submission.gas.extra_max_priority_fee_per_gas_percentage,
            20
        );
        assert_eq!(settings.submission.gas.extra_on_retry_percentage, 5);
        assert_eq!(settings.wallet.private_key_env, "CLAIMER_KEY");
        assert_eq!(settings.transaction.data, "0x4e71d92d");
        assert_eq!(
            settings.metrics.textfile_path,
            Some(PathBuf::from("/tmp/airdrop.prom"))
        );
    }

    #[test]
    fn test_zero_retries_rejected() {
        let config = format!("{}\n[submission]\nretries = 0\n", MINIMAL);
        let err = Settings::parse(&config).unwrap_err();
        assert!(err.to_string().contains("retries"));
    }

    #[test]
    fn test_missing_rpc_rejected() {
        let config = MINIMAL.replace(
            "[\"http://localhost:8545\"]",
            "[\"${AIRDROP_UNSET_RPC}\"]",
        );
        assert!(Settings::parse(&config).is_err());
    }
}
