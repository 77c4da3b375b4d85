use crate::models::{Bytes32String, DataEntry, Network};
use crate::signer::Signer;
use async_trait::async_trait;
use jsonrpc_core::Value;
use thiserror::Error;
use tracing::{debug, info, trace};
use web3::{
    ethabi::{self, ParamType, RawLog, Token},
    types::{Address, Log, TransactionReceipt, H256, U256, U64},
};

static DATA_CONTRACT_ABI: &[u8] = include_bytes!("abi/DataContract.json");

const SEND_DATA_FUNCTION: &str = "sendDataToTarget";
const DATA_SENT_EVENT: &str = "DataSentToTarget";

/// Selector of the standard `Error(string)` revert payload.
const ERROR_STRING_SELECTOR: [u8; 4] = [0x08, 0xc3, 0x79, 0xa0];

#[derive(Debug, Error)]
pub enum ContractError {
    #[error("Failed to load the DataContract interface: {0}")]
    Abi(#[from] ethabi::Error),
}

#[derive(Debug, Error)]
pub enum SendError {
    #[error("Failed to encode the contract call: {0}")]
    Encode(#[from] ethabi::Error),
    #[error(transparent)]
    Web3(#[from] web3::Error),
    #[error("Transaction {transaction_hash:?} reverted in block {block_number}")]
    Reverted {
        transaction_hash: H256,
        block_number: U64,
    },
    #[error("Transaction {0:?} has a receipt without a block number")]
    Unmined(H256),
}

impl SendError {
    /// The revert reason reported by the node, when there is one.
    pub fn reason(&self) -> Option<String> {
        match self {
            SendError::Web3(web3::Error::Rpc(rpc_error)) => {
                revert_reason(&rpc_error.message, rpc_error.data.as_ref())
            }
            _ => None,
        }
    }
}

fn revert_reason(message: &str, data: Option<&Value>) -> Option<String> {
    if let Some(reason) = data.and_then(Value::as_str).and_then(decode_error_string) {
        return Some(reason);
    }
    if let Some(reason) = message.strip_prefix("execution reverted: ") {
        return Some(reason.to_string());
    }
    // Hardhat and Anvil style messages.
    let (_, rest) = message.split_once("reverted with reason string '")?;
    rest.strip_suffix('\'').map(str::to_string)
}

fn decode_error_string(data: &str) -> Option<String> {
    let bytes = hex::decode(data.strip_prefix("0x")?).ok()?;
    if bytes.len() < 4 || bytes[..4] != ERROR_STRING_SELECTOR {
        return None;
    }
    match ethabi::decode(&[ParamType::String], &bytes[4..]).ok()?.pop()? {
        Token::String(reason) => Some(reason),
        _ => None,
    }
}

/// Access to the JSON-RPC node, as needed by the interaction script.
#[async_trait(?Send)]
pub trait ChainClient {
    async fn signers(&self) -> Result<Vec<Signer>, web3::Error>;

    async fn network(&self) -> Result<Network, web3::Error>;

    async fn balance(&self, address: Address) -> Result<U256, web3::Error>;

    /// Broadcasts a transaction calling `to` with `calldata`. Never retried.
    async fn submit_transaction(
        &self,
        from: &Signer,
        to: Address,
        calldata: Vec<u8>,
    ) -> Result<H256, web3::Error>;

    /// Resolves to `None` when the transaction was not confirmed in time.
    async fn wait_for_receipt(
        &self,
        transaction_hash: H256,
    ) -> Result<Option<TransactionReceipt>, web3::Error>;
}

/// The `DataSentToTarget` event, fields in declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataSentEvent {
    pub from: Address,
    pub to: Address,
    pub owner: Bytes32String,
    pub actref: Bytes32String,
    pub topic: String,
}

impl DataSentEvent {
    fn from_tokens(tokens: Vec<Token>) -> Option<Self> {
        let [from, to, owner, actref, topic]: [Token; 5] = tokens.try_into().ok()?;
        Some(Self {
            from: from.into_address()?,
            to: to.into_address()?,
            owner: bytes32(owner)?,
            actref: bytes32(actref)?,
            topic: topic.into_string()?,
        })
    }
}

fn bytes32(token: Token) -> Option<Bytes32String> {
    let bytes: [u8; 32] = token.into_fixed_bytes()?.try_into().ok()?;
    Some(Bytes32String::from_bytes(bytes))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodedLog {
    DataSent(DataSentEvent),
    /// Anything that is not a well-formed `DataSentToTarget` event.
    Foreign,
}

/// The parts of the DataContract ABI this tool uses.
#[derive(Debug, Clone)]
pub struct DataContractInterface {
    send_data: ethabi::Function,
    data_sent: ethabi::Event,
}

impl DataContractInterface {
    pub fn load() -> Result<Self, ContractError> {
        let abi = ethabi::Contract::load(DATA_CONTRACT_ABI)?;
        Ok(Self {
            send_data: abi.function(SEND_DATA_FUNCTION)?.clone(),
            data_sent: abi.event(DATA_SENT_EVENT)?.clone(),
        })
    }

    pub fn encode_send_data(&self, entry: &DataEntry) -> Result<Vec<u8>, ethabi::Error> {
        self.send_data.encode_input(&[
            Token::Address(entry.target),
            Token::FixedBytes(entry.owner.as_bytes().to_vec()),
            Token::FixedBytes(entry.actref.as_bytes().to_vec()),
            Token::String(entry.topic.clone()),
        ])
    }

    pub fn decode_log(&self, log: &Log) -> DecodedLog {
        let raw = RawLog {
            topics: log.topics.clone(),
            data: log.data.0.clone(),
        };
        match self.data_sent.parse_log(raw) {
            Ok(parsed) => {
                let tokens = parsed.params.into_iter().map(|p| p.value).collect();
                DataSentEvent::from_tokens(tokens)
                    .map(DecodedLog::DataSent)
                    .unwrap_or(DecodedLog::Foreign)
            }
            Err(error) => {
                trace!(address = ?log.address, %error, "Skipping foreign log");
                DecodedLog::Foreign
            }
        }
    }
}

/// A mined, successful transaction.
#[derive(Debug, Clone)]
pub struct Confirmation {
    pub transaction_hash: H256,
    pub block_number: U64,
    pub gas_used: Option<U256>,
    pub logs: Vec<Log>,
}

/// Handle to a deployed DataContract, bound to the account that sends its transactions.
pub struct DataContract<'a, C: ?Sized> {
    client: &'a C,
    address: Address,
    sender: Signer,
    interface: DataContractInterface,
}

impl<'a, C> DataContract<'a, C>
where
    C: ChainClient + ?Sized,
{
    pub fn attach(client: &'a C, address: Address, sender: Signer) -> Result<Self, ContractError> {
        Ok(Self {
            client,
            address,
            sender,
            interface: DataContractInterface::load()?,
        })
    }

    pub fn client(&self) -> &'a C {
        self.client
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn sender(&self) -> &Signer {
        &self.sender
    }

    pub fn interface(&self) -> &DataContractInterface {
        &self.interface
    }

    pub async fn send_data_to_target(&self, entry: &DataEntry) -> Result<H256, SendError> {
        let calldata = self.interface.encode_send_data(entry)?;
        debug!(
            owner = entry.owner.label().unwrap_or_default(),
            actref = entry.actref.label().unwrap_or_default(),
            "Sending data to target"
        );
        let transaction_hash = self
            .client
            .submit_transaction(&self.sender, self.address, calldata)
            .await?;
        info!(?transaction_hash, "Sent transaction");
        Ok(transaction_hash)
    }

    /// Waits for `transaction_hash` to be mined. `Ok(None)` means no receipt was obtained.
    pub async fn wait(&self, transaction_hash: H256) -> Result<Option<Confirmation>, SendError> {
        let receipt = match self.client.wait_for_receipt(transaction_hash).await? {
            Some(receipt) => receipt,
            None => return Ok(None),
        };
        let block_number = receipt
            .block_number
            .ok_or(SendError::Unmined(transaction_hash))?;
        if receipt.status == Some(U64::zero()) {
            return Err(SendError::Reverted {
                transaction_hash,
                block_number,
            });
        }
        info!(?transaction_hash, block = %block_number, "Transaction confirmed");
        Ok(Some(Confirmation {
            transaction_hash,
            block_number,
            gas_used: receipt.gas_used,
            logs: receipt.logs,
        }))
    }
}
