use super::batch::{batch_entries, send_batch, BatchEntryResult};
use super::{Error, EXIT_FAILURE, EXIT_SUCCESS};
use crate::chain_validation::validate_network;
use crate::config::Config;
use crate::console::Console;
use crate::contracts::{ChainClient, Confirmation, DataContract, DecodedLog, SendError};
use crate::models::{checksum_address, explorer_address_url, format_ether, DataEntry};
use std::io::{self, Write};
use tracing::{info, warn};

/// `(owner, actref, topic)` of the demonstration call.
const DEMONSTRATION_ENTRY: (&str, &str, &str) = (
    "OWNER_001",
    "ACTION_REF_123",
    "Test Topic - Sepolia Contract Interaction",
);

#[derive(Debug)]
pub enum RunOutcome {
    /// Every step ran. Individual batch entries may still have failed.
    Completed { batch: Vec<BatchEntryResult> },
    /// The demonstration transaction produced no receipt, so nothing after it ran.
    DemonstrationReceiptMissing,
}

impl RunOutcome {
    pub fn exit_code(&self) -> u8 {
        match self {
            RunOutcome::Completed { .. } => EXIT_SUCCESS,
            RunOutcome::DemonstrationReceiptMissing => EXIT_FAILURE,
        }
    }
}

pub async fn run_script<C, O, E>(
    config: &Config,
    client: &C,
    console: &mut Console<O, E>,
) -> Result<RunOutcome, Error>
where
    C: ChainClient + ?Sized,
    O: Write,
    E: Write,
{
    let sender = client
        .signers()
        .await?
        .into_iter()
        .next()
        .ok_or(Error::NoSigners)?;
    let target = sender.address();
    console.line(format_args!("Deployer address: {}", checksum_address(target)))?;

    let contract = DataContract::attach(client, config.contract_address, sender)?;

    console.section("Contract Information")?;
    console.line(format_args!(
        "Contract address: {}",
        checksum_address(contract.address())
    ))?;
    let network = client.network().await?;
    console.line(format_args!("Network: {}", network))?;
    if let Some(expected) = &config.network {
        validate_network(expected, &network).map_err(Error::WrongNetwork)?;
    }
    console.line(format_args!("Current caller: {}", checksum_address(target)))?;

    console.section("Sending Data to Target")?;
    let (owner, actref, topic) = DEMONSTRATION_ENTRY;
    let entry = DataEntry::new(target, owner, actref, topic)?;
    console.line(format_args!("Target address: {}", checksum_address(target)))?;
    console.line(format_args!("Owner param: {}", entry.owner))?;
    console.line(format_args!("Action reference: {}", entry.actref))?;
    console.line(format_args!("Topic: {}", entry.topic))?;

    match send_demonstration(&contract, &entry, console).await? {
        Ok(Some(confirmation)) => print_events(&contract, &confirmation, console)?,
        Ok(None) => {
            warn!("No receipt for the demonstration transaction");
            console.error(format_args!("Transaction receipt is null"))?;
            return Ok(RunOutcome::DemonstrationReceiptMissing);
        }
        Err(err) => {
            warn!(error = err.to_string().as_str(), "Demonstration call failed");
            console.error(format_args!("Error sending data: {}", err))?;
            if let Some(reason) = err.reason() {
                console.error(format_args!("Reason: {}", reason))?;
            }
        }
    }

    console.section("Multiple Data Sends")?;
    let entries = batch_entries(target)?;
    let batch = send_batch(&contract, &entries, console).await?;

    console.section("Interaction Complete")?;
    console.line(format_args!(
        "Contract interaction script finished successfully!"
    ))?;
    let confirmed = batch.iter().filter(|result| result.is_confirmed()).count();
    info!(confirmed, total = batch.len(), "Batch finished");
    console.line(format_args!(
        "Batch entries confirmed: {}/{}",
        confirmed,
        batch.len()
    ))?;
    for result in batch.iter().filter(|result| !result.is_confirmed()) {
        console.line(format_args!(
            "Not confirmed: {} / {} ({})",
            result.entry.owner.label().unwrap_or_default(),
            result.entry.actref.label().unwrap_or_default(),
            result.entry.topic
        ))?;
    }
    console.line(format_args!("View transactions on the block explorer:"))?;
    console.line(format_args!(
        "{}",
        explorer_address_url(config.explorer_url.as_ref(), Some(&network), contract.address())
    ))?;

    Ok(RunOutcome::Completed { batch })
}

/// The outer result carries console failures, the inner one the outcome of the call.
async fn send_demonstration<C, O, E>(
    contract: &DataContract<'_, C>,
    entry: &DataEntry,
    console: &mut Console<O, E>,
) -> io::Result<Result<Option<Confirmation>, SendError>>
where
    C: ChainClient + ?Sized,
    O: Write,
    E: Write,
{
    let balance = match contract.client().balance(contract.sender().address()).await {
        Ok(balance) => balance,
        Err(err) => return Ok(Err(err.into())),
    };
    console.line(format_args!("Account balance: {} ETH", format_ether(balance)))?;

    console.line(format_args!("\nSending data to target..."))?;
    let transaction_hash = match contract.send_data_to_target(entry).await {
        Ok(hash) => hash,
        Err(err) => return Ok(Err(err)),
    };
    console.line(format_args!("Transaction hash: {:?}", transaction_hash))?;

    console.line(format_args!("Waiting for confirmation..."))?;
    let confirmation = match contract.wait(transaction_hash).await {
        Ok(Some(confirmation)) => confirmation,
        other => return Ok(other),
    };
    console.line(format_args!(
        "Transaction confirmed in block: {}",
        confirmation.block_number
    ))?;
    if let Some(gas_used) = confirmation.gas_used {
        console.line(format_args!("Gas used: {}", gas_used))?;
    }
    Ok(Ok(Some(confirmation)))
}

fn print_events<C, O, E>(
    contract: &DataContract<'_, C>,
    confirmation: &Confirmation,
    console: &mut Console<O, E>,
) -> io::Result<()>
where
    C: ChainClient + ?Sized,
    O: Write,
    E: Write,
{
    console.line(format_args!(
        "\nFound {} logs in transaction",
        confirmation.logs.len()
    ))?;
    for log in &confirmation.logs {
        if let DecodedLog::DataSent(event) = contract.interface().decode_log(log) {
            console.section("Event Details")?;
            console.line(format_args!("From: {}", checksum_address(event.from)))?;
            console.line(format_args!("To: {}", checksum_address(event.to)))?;
            console.line(format_args!("Owner: {}", event.owner))?;
            console.line(format_args!("Action Ref: {}", event.actref))?;
            console.line(format_args!("Topic: {}", event.topic))?;
        }
    }
    Ok(())
}
