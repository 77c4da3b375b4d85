use alloy_primitives::utils;
use serde_with::DeserializeFromStr;
use std::{fmt::Display, str::FromStr};
use thiserror::Error;
use web3::types::{Address, U256};

/// See https://github.com/ChainAgnostic/CAIPs/blob/master/CAIPs/caip-2.md.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, DeserializeFromStr)]
#[repr(transparent)]
pub struct Caip2ChainId {
    chain_id: String,
}

impl Caip2ChainId {
    const SEPARATOR: char = ':';

    pub fn as_str(&self) -> &str {
        &self.chain_id
    }

    pub fn namespace_part(&self) -> &str {
        self.chain_id.split_once(Self::SEPARATOR).unwrap().0
    }

    pub fn reference_part(&self) -> &str {
        self.chain_id.split_once(Self::SEPARATOR).unwrap().1
    }
}

impl FromStr for Caip2ChainId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let split = s.split(Self::SEPARATOR).collect::<Vec<&str>>();

        let is_ascii_alphanumberic_or_hyphen =
            |s: &str| s.chars().all(|c| c.is_ascii_alphanumeric() || c == '-');

        #[allow(clippy::len_zero)]
        if split.len() == 2
            && split[0].len() >= 3
            && split[0].len() <= 8
            && is_ascii_alphanumberic_or_hyphen(split[0])
            && split[1].len() >= 1
            && split[1].len() <= 32
            && is_ascii_alphanumberic_or_hyphen(split[1])
        {
            Ok(Self {
                chain_id: s.to_string(),
            })
        } else {
            Err("Invalid chain id".to_string())
        }
    }
}

impl Display for Caip2ChainId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The EVM network an RPC endpoint is serving, as reported by `eth_chainId`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Network {
    pub chain_id: u64,
    pub name: &'static str,
}

/// `(chain id, name, block explorer host)`
const KNOWN_NETWORKS: &[(u64, &str, Option<&str>)] = &[
    (1, "mainnet", Some("etherscan.io")),
    (5, "goerli", Some("goerli.etherscan.io")),
    (17000, "holesky", Some("holesky.etherscan.io")),
    (11155111, "sepolia", Some("sepolia.etherscan.io")),
    (1337, "localhost", None),
    (31337, "hardhat", None),
];

impl Network {
    pub const DEFAULT_EXPLORER_HOST: &'static str = "sepolia.etherscan.io";

    pub fn from_chain_id(chain_id: u64) -> Self {
        let name = KNOWN_NETWORKS
            .iter()
            .find(|(id, _, _)| *id == chain_id)
            .map(|(_, name, _)| *name)
            .unwrap_or("unknown");
        Self { chain_id, name }
    }

    pub fn explorer_host(&self) -> Option<&'static str> {
        KNOWN_NETWORKS
            .iter()
            .find(|(id, _, _)| *id == self.chain_id)
            .and_then(|(_, _, host)| *host)
    }
}

impl Display for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (chain id {})", self.name, self.chain_id)
    }
}

/// EIP-55 mixed-case representation of an address.
pub fn checksum_address(address: Address) -> String {
    alloy_primitives::Address::from(address.0).to_checksum(None)
}

/// Link to the explorer page of `contract`. A configured base URL takes precedence over the
/// network's well-known explorer.
pub fn explorer_address_url(
    explorer_url: Option<&url::Url>,
    network: Option<&Network>,
    contract: Address,
) -> String {
    let address = checksum_address(contract);
    match explorer_url {
        Some(base) => format!("{}/address/{}", base.as_str().trim_end_matches('/'), address),
        None => {
            let host = network
                .and_then(Network::explorer_host)
                .unwrap_or(Network::DEFAULT_EXPLORER_HOST);
            format!("https://{}/address/{}", host, address)
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum Bytes32StringError {
    #[error("bytes32 string must be less than 32 bytes, got {0} bytes")]
    TooLong(usize),
}

/// A short UTF-8 label stored in a `bytes32` slot, right padded with zeros. At most 31 bytes
/// are used so the value is always null terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Bytes32String([u8; 32]);

impl Bytes32String {
    pub fn encode(label: &str) -> Result<Self, Bytes32StringError> {
        let bytes = label.as_bytes();
        if bytes.len() > 31 {
            return Err(Bytes32StringError::TooLong(bytes.len()));
        }
        let mut buf = [0u8; 32];
        buf[..bytes.len()].copy_from_slice(bytes);
        Ok(Self(buf))
    }

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Reads the label back, stopping at the first zero byte. Returns `None` if the contents
    /// are not valid UTF-8.
    pub fn label(&self) -> Option<&str> {
        let end = self.0.iter().position(|b| *b == 0).unwrap_or(32);
        std::str::from_utf8(&self.0[..end]).ok()
    }
}

impl Display for Bytes32String {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

/// A record sent to the contract's `sendDataToTarget` method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataEntry {
    pub target: Address,
    pub owner: Bytes32String,
    pub actref: Bytes32String,
    pub topic: String,
}

impl DataEntry {
    pub fn new(
        target: Address,
        owner: &str,
        actref: &str,
        topic: impl Into<String>,
    ) -> Result<Self, Bytes32StringError> {
        Ok(Self {
            target,
            owner: Bytes32String::encode(owner)?,
            actref: Bytes32String::encode(actref)?,
            topic: topic.into(),
        })
    }
}

/// Formats a wei amount as ether the way `ethers.formatEther` does: trailing zeros trimmed,
/// at least one decimal kept.
pub fn format_ether(wei: U256) -> String {
    let mut bytes = [0u8; 32];
    wei.to_big_endian(&mut bytes);
    let ether = utils::format_ether(alloy_primitives::U256::from_be_bytes(bytes));
    match ether.trim_end_matches('0') {
        trimmed if trimmed.ends_with('.') => format!("{}0", trimmed),
        trimmed => trimmed.to_string(),
    }
}
