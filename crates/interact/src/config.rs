use crate::models::Caip2ChainId;
use crate::signer::SignerSource;
use clap::Parser;
use secp256k1::SecretKey;
use serde::Deserialize;
use std::{
    fs::read_to_string,
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};
use thiserror::Error;
use tracing::debug;
use tracing_subscriber::filter::LevelFilter;
use url::Url;
use web3::types::Address;

/// Name of the environment variable holding the deployed contract address.
pub const CONTRACT_ADDRESS_VAR: &str = "CONTRACT_ADDRESS";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("CONTRACT_ADDRESS environment variable not set")]
    MissingContractAddress,
    #[error("CONTRACT_ADDRESS is not a valid address: '{0}'")]
    InvalidContractAddress(String),
    #[error("Environment variable '{0}' not set")]
    MissingEnvVar(String),
    #[error("Bad JSON-RPC provider url: {0}")]
    InvalidJrpcUrl(#[from] url::ParseError),
    #[error("Account '{0}' does not hold a valid private key")]
    InvalidPrivateKey(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("Error deserializing config file")]
    Toml(#[from] toml::de::Error),
}

impl ConfigError {
    /// Extra lines shown to the user alongside the error itself.
    pub fn guidance(&self) -> &'static [&'static str] {
        match self {
            ConfigError::MissingContractAddress | ConfigError::InvalidContractAddress(_) => &[
                "Please set CONTRACT_ADDRESS to the deployed contract address",
                "Example: CONTRACT_ADDRESS=0x... data-contract-interact",
            ],
            ConfigError::MissingEnvVar(_) => &[
                "Set the variable or put the value directly in the configuration file",
            ],
            _ => &[],
        }
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    pub log_level: LevelFilter,
    pub contract_address: Address,
    pub jrpc_url: Url,
    pub signers: SignerSource,
    /// When set, the JSON-RPC endpoint must serve this chain.
    pub network: Option<Caip2ChainId>,
    pub explorer_url: Option<Url>,
    pub transaction_confirmation_count: usize,
    pub transaction_confirmation_poll_interval: Duration,
    pub transaction_confirmation_timeout: Duration,
    pub retry_strategy_max_wait_time: Duration,
}

impl Config {
    /// Loads all configuration options from CLI arguments, the optional TOML
    /// configuration file, and environment variables.
    pub fn parse() -> Result<Self, ConfigError> {
        Self::from_clap(Clap::parse(), &|name| std::env::var(name).ok())
    }

    /// The log level is needed before the rest of the configuration is resolved, so that
    /// configuration errors are reported through an initialized subscriber.
    pub fn log_level_from_args() -> LevelFilter {
        Clap::try_parse()
            .map(|clap| clap.log_level)
            .unwrap_or(LevelFilter::WARN)
    }

    #[cfg(test)]
    fn parse_from(args: &[&str], env: &dyn Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        Self::from_clap(Clap::parse_from(args), env)
    }

    fn from_clap(clap: Clap, env: &dyn Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        // The contract address is checked first so that its absence is reported before
        // anything else is looked at.
        let contract_address = contract_address(env)?;
        let config_file = match &clap.config_file {
            Some(path) => ConfigFile::from_file(path)?,
            None => ConfigFile::default(),
        };
        Self::from_clap_and_config_file(clap, config_file, contract_address, env)
    }

    fn from_clap_and_config_file(
        clap: Clap,
        config_file: ConfigFile,
        contract_address: Address,
        env: &dyn Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let jrpc = clap.rpc_url.unwrap_or(config_file.jrpc);
        let signers = if config_file.use_node_accounts {
            SignerSource::NodeAccounts
        } else {
            SignerSource::PrivateKeys(resolve_accounts(&config_file.accounts, env)?)
        };

        Ok(Self {
            log_level: clap.log_level,
            contract_address,
            jrpc_url: parse_jrpc_provider_url(&jrpc, env)?,
            signers,
            network: config_file.network,
            explorer_url: config_file.explorer_url,
            transaction_confirmation_count: config_file.transaction_confirmation_count,
            transaction_confirmation_poll_interval: Duration::from_secs(
                config_file.transaction_confirmation_poll_interval_in_seconds,
            ),
            transaction_confirmation_timeout: Duration::from_secs(
                config_file.transaction_confirmation_timeout_in_seconds,
            ),
            retry_strategy_max_wait_time: Duration::from_secs(
                config_file.web3_transport_retry_max_wait_time_in_seconds,
            ),
        })
    }
}

fn contract_address(env: &dyn Fn(&str) -> Option<String>) -> Result<Address, ConfigError> {
    let raw = env(CONTRACT_ADDRESS_VAR)
        .filter(|s| !s.trim().is_empty())
        .ok_or(ConfigError::MissingContractAddress)?;
    let trimmed = raw.trim();
    let hex_part = trimmed.strip_prefix("0x").unwrap_or(trimmed);
    if hex_part.len() != 40 {
        return Err(ConfigError::InvalidContractAddress(raw));
    }
    Address::from_str(hex_part).map_err(|_| ConfigError::InvalidContractAddress(raw))
}

fn parse_jrpc_provider_url(
    s: &str,
    env: &dyn Fn(&str) -> Option<String>,
) -> Result<Url, ConfigError> {
    if let Ok(url) = Url::parse(s) {
        Ok(url)
    } else {
        let value = env(s).ok_or_else(|| ConfigError::MissingEnvVar(s.to_string()))?;
        Ok(Url::parse(value.as_str())?)
    }
}

/// Each account is either a hex-encoded private key or the name of an environment variable
/// holding one. Unset variables are skipped, which leaves an empty signer set when nothing is
/// configured.
fn resolve_accounts(
    accounts: &[String],
    env: &dyn Fn(&str) -> Option<String>,
) -> Result<Vec<SecretKey>, ConfigError> {
    let mut keys = Vec::with_capacity(accounts.len());
    for account in accounts {
        let raw = if looks_like_private_key(account) {
            account.clone()
        } else {
            match env(account) {
                Some(value) => value,
                None => {
                    debug!(account = account.as_str(), "Account variable not set. Skipping.");
                    continue;
                }
            }
        };
        let raw = raw.trim();
        let key = SecretKey::from_str(raw.strip_prefix("0x").unwrap_or(raw))
            .map_err(|_| ConfigError::InvalidPrivateKey(account.clone()))?;
        keys.push(key);
    }
    Ok(keys)
}

fn looks_like_private_key(s: &str) -> bool {
    let s = s.strip_prefix("0x").unwrap_or(s);
    s.len() == 64 && s.chars().all(|c| c.is_ascii_hexdigit())
}

#[derive(Parser, Debug, Clone)]
#[clap(name = "data-contract-interact")]
#[clap(bin_name = "data-contract-interact")]
#[clap(author, version, about, long_about = None)]
struct Clap {
    /// The filepath of the optional TOML configuration file.
    #[clap(long, parse(from_os_str))]
    config_file: Option<PathBuf>,
    /// Only show log messages at or above this level. `WARN` by default.
    #[clap(short, long, default_value = "warn")]
    log_level: LevelFilter,
    /// JSON-RPC provider URL, or the name of an environment variable holding it. Overrides the
    /// configuration file.
    #[clap(long)]
    rpc_url: Option<String>,
}

/// Represents the TOML config file
#[derive(Deserialize, Debug)]
#[serde(rename_all = "snake_case")]
struct ConfigFile {
    /// A JSON-RPC provider URL, or the name of the environment variable that holds it.
    #[serde(default = "serde_defaults::jrpc")]
    jrpc: String,
    /// Hex private keys, or names of environment variables holding them.
    #[serde(default = "serde_defaults::accounts")]
    accounts: Vec<String>,
    /// Use the accounts managed by the node (`eth_accounts`) instead of local keys.
    #[serde(default)]
    use_node_accounts: bool,
    #[serde(default)]
    network: Option<Caip2ChainId>,
    #[serde(default)]
    explorer_url: Option<Url>,
    #[serde(default = "serde_defaults::transaction_confirmation_count")]
    transaction_confirmation_count: usize,
    #[serde(default = "serde_defaults::transaction_confirmation_poll_interval_in_seconds")]
    transaction_confirmation_poll_interval_in_seconds: u64,
    #[serde(default = "serde_defaults::transaction_confirmation_timeout_in_seconds")]
    transaction_confirmation_timeout_in_seconds: u64,
    #[serde(default = "serde_defaults::web3_transport_retry_max_wait_time_in_seconds")]
    web3_transport_retry_max_wait_time_in_seconds: u64,
}

impl ConfigFile {
    /// Tries to Create a [`ConfigFile`] from a TOML file.
    fn from_file(file_path: &Path) -> Result<Self, ConfigError> {
        let string = read_to_string(file_path)?;
        toml::from_str(&string).map_err(ConfigError::Toml)
    }
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            jrpc: serde_defaults::jrpc(),
            accounts: serde_defaults::accounts(),
            use_node_accounts: false,
            network: None,
            explorer_url: None,
            transaction_confirmation_count: serde_defaults::transaction_confirmation_count(),
            transaction_confirmation_poll_interval_in_seconds:
                serde_defaults::transaction_confirmation_poll_interval_in_seconds(),
            transaction_confirmation_timeout_in_seconds:
                serde_defaults::transaction_confirmation_timeout_in_seconds(),
            web3_transport_retry_max_wait_time_in_seconds:
                serde_defaults::web3_transport_retry_max_wait_time_in_seconds(),
        }
    }
}

/// These should be expressed as constants once
/// https://github.com/serde-rs/serde/issues/368 is fixed.
mod serde_defaults {
    pub fn jrpc() -> String {
        "SEPOLIA_RPC_URL".to_string()
    }

    pub fn accounts() -> Vec<String> {
        vec!["PRIVATE_KEY".to_string()]
    }

    pub fn transaction_confirmation_count() -> usize {
        1
    }

    pub fn transaction_confirmation_poll_interval_in_seconds() -> u64 {
        4
    }

    pub fn transaction_confirmation_timeout_in_seconds() -> u64 {
        300
    }

    pub fn web3_transport_retry_max_wait_time_in_seconds() -> u64 {
        60
    }
}
