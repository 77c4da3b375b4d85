pub mod chain_validation;
pub mod config;
pub mod console;
pub mod contracts;
pub mod ethereum_client;
pub mod jrpc_utils;
pub mod models;
pub mod runner;
pub mod signer;

#[cfg(test)]
mod test_utils;

pub use config::{Config, ConfigError};
pub use console::Console;
pub use contracts::{ChainClient, DataContract};
pub use ethereum_client::EthereumClient;
pub use models::{Caip2ChainId, DataEntry, Network};
