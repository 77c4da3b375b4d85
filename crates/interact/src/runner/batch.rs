use crate::console::Console;
use crate::contracts::{ChainClient, DataContract, SendError};
use crate::models::{Bytes32StringError, DataEntry};
use std::io::{self, Write};
use tracing::{info, warn};
use web3::types::{Address, H256, U64};

/// `(owner, actref, topic)` of each batch entry, in sending order.
const BATCH: [(&str, &str, &str); 2] = [
    ("OWNER_002", "REF_BATCH_001", "Sepolia Batch Entry 1"),
    ("OWNER_003", "REF_BATCH_002", "Sepolia Batch Entry 2"),
];

pub fn batch_entries(target: Address) -> Result<Vec<DataEntry>, Bytes32StringError> {
    BATCH
        .iter()
        .map(|(owner, actref, topic)| DataEntry::new(target, owner, actref, *topic))
        .collect()
}

#[derive(Debug)]
pub enum BatchOutcome {
    Confirmed {
        transaction_hash: H256,
        block_number: U64,
    },
    /// Sent, but the node never returned a receipt.
    MissingReceipt { transaction_hash: H256 },
    Failed(SendError),
}

#[derive(Debug)]
pub struct BatchEntryResult {
    pub entry: DataEntry,
    pub outcome: BatchOutcome,
}

impl BatchEntryResult {
    pub fn is_confirmed(&self) -> bool {
        matches!(self.outcome, BatchOutcome::Confirmed { .. })
    }
}

/// Sends `entries` one after the other, each waiting for the previous one to be mined.
///
/// A failing entry is reported and the remaining ones are still sent. Only console failures
/// abort the batch.
pub async fn send_batch<C, O, E>(
    contract: &DataContract<'_, C>,
    entries: &[DataEntry],
    console: &mut Console<O, E>,
) -> io::Result<Vec<BatchEntryResult>>
where
    C: ChainClient + ?Sized,
    O: Write,
    E: Write,
{
    let total = entries.len();
    let mut results = Vec::with_capacity(total);
    for (index, entry) in entries.iter().enumerate() {
        let number = index + 1;
        console.line(format_args!("\nSending batch entry {}/{}...", number, total))?;
        let outcome = send_entry(contract, entry, console).await?;
        match &outcome {
            BatchOutcome::Confirmed {
                transaction_hash,
                block_number,
            } => {
                info!(
                    entry = number,
                    ?transaction_hash,
                    block = %block_number,
                    "Batch entry confirmed"
                );
                console.line(format_args!(
                    "✓ Batch entry {} sent successfully (Block: {})",
                    number, block_number
                ))?;
            }
            BatchOutcome::MissingReceipt { transaction_hash } => {
                warn!(entry = number, ?transaction_hash, "No receipt for batch entry");
                console.error(format_args!(
                    "✗ Batch entry {} failed: Transaction receipt is null",
                    number
                ))?;
            }
            BatchOutcome::Failed(err) => {
                warn!(entry = number, error = err.to_string().as_str(), "Batch entry failed");
                console.error(format_args!("✗ Batch entry {} failed: {}", number, err))?;
            }
        }
        results.push(BatchEntryResult {
            entry: entry.clone(),
            outcome,
        });
    }
    Ok(results)
}

async fn send_entry<C, O, E>(
    contract: &DataContract<'_, C>,
    entry: &DataEntry,
    console: &mut Console<O, E>,
) -> io::Result<BatchOutcome>
where
    C: ChainClient + ?Sized,
    O: Write,
    E: Write,
{
    let transaction_hash = match contract.send_data_to_target(entry).await {
        Ok(hash) => hash,
        Err(err) => return Ok(BatchOutcome::Failed(err)),
    };
    console.line(format_args!("Transaction hash: {:?}", transaction_hash))?;
    Ok(match contract.wait(transaction_hash).await {
        Ok(Some(confirmation)) => BatchOutcome::Confirmed {
            transaction_hash,
            block_number: confirmation.block_number,
        },
        Ok(None) => BatchOutcome::MissingReceipt { transaction_hash },
        Err(err) => BatchOutcome::Failed(err),
    })
}
