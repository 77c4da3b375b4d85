pub mod batch;
pub mod script;

use crate::config::{Config, ConfigError};
use crate::console::Console;
use crate::contracts::{ChainClient, ContractError};
use crate::models::Bytes32StringError;
use script::run_script;
use std::io::{self, Write};
use tracing::{error, info, metadata::LevelFilter};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_FAILURE: u8 = 1;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("No signers available")]
    NoSigners,
    #[error("JSON-RPC issues: {0}")]
    BadJrpc(#[from] web3::Error),
    #[error(transparent)]
    ContractError(#[from] ContractError),
    #[error("Wrong network: {0}")]
    WrongNetwork(anyhow::Error),
    #[error("Invalid data entry: {0}")]
    DataEntry(#[from] Bytes32StringError),
    #[error("Failed to write the report: {0}")]
    Console(#[from] io::Error),
}

/// Runs the interaction script once and returns the process exit code.
///
/// `connect` is only called once the configuration is known to be valid, so configuration
/// problems are reported before any network traffic.
pub async fn run<C, F, O, E>(
    config: Result<Config, ConfigError>,
    connect: F,
    console: &mut Console<O, E>,
) -> u8
where
    C: ChainClient,
    F: FnOnce(&Config) -> web3::Result<C>,
    O: Write,
    E: Write,
{
    match resolve_and_connect(config, connect, console) {
        Ok((config, client)) => execute(&config, &client, console).await,
        Err(err) => fail(err, console),
    }
}

/// Prints the header, then resolves the configuration and connects.
fn resolve_and_connect<C, F, O, E>(
    config: Result<Config, ConfigError>,
    connect: F,
    console: &mut Console<O, E>,
) -> Result<(Config, C), Error>
where
    F: FnOnce(&Config) -> web3::Result<C>,
    O: Write,
    E: Write,
{
    console.line(format_args!("=== DataContract Interaction Script ==="))?;
    let config = config?;
    info!(
        contract = ?config.contract_address,
        jrpc = config.jrpc_url.host_str().unwrap_or_default(),
        "Connecting to the JSON-RPC provider"
    );
    let client = connect(&config)?;
    Ok((config, client))
}

/// Runs the interaction script against an already connected client.
pub async fn execute<C, O, E>(config: &Config, client: &C, console: &mut Console<O, E>) -> u8
where
    C: ChainClient + ?Sized,
    O: Write,
    E: Write,
{
    match run_script(config, client, console).await {
        Ok(outcome) => outcome.exit_code(),
        Err(err) => fail(err, console),
    }
}

fn fail<O: Write, E: Write>(err: Error, console: &mut Console<O, E>) -> u8 {
    error!(error = err.to_string().as_str(), "The interaction script failed");
    if let Err(io_error) = report_failure(&err, console) {
        error!(%io_error, "Failed to report the failure");
    }
    EXIT_FAILURE
}

fn report_failure<O: Write, E: Write>(err: &Error, console: &mut Console<O, E>) -> io::Result<()> {
    match err {
        Error::Config(config_error) => {
            console.error(format_args!("Error: {}", config_error))?;
            for line in config_error.guidance() {
                console.line(format_args!("{}", line))?;
            }
            Ok(())
        }
        Error::NoSigners => console.error(format_args!("Error: {}", err)),
        _ => console.error(format_args!("Script failed: {}", err)),
    }
}

pub fn init_logging(log_level: LevelFilter) {
    let filter = EnvFilter::builder()
        .with_default_directive(log_level.into())
        .from_env_lossy();

    let stderr = fmt::layer()
        .with_ansi(false)
        .without_time()
        .with_target(false)
        .with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr)
        .init();
}
