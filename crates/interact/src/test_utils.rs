//! Scripted stand-ins for the JSON-RPC node.

use crate::config::Config;
use crate::contracts::ChainClient;
use crate::models::{Bytes32String, DataEntry, Network};
use crate::signer::{Signer, SignerSource};
use async_trait::async_trait;
use secp256k1::SecretKey;
use serde_json::json;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Mutex;
use std::time::Duration;
use tracing_subscriber::filter::LevelFilter;
use url::Url;
use web3::{
    ethabi::{self, ParamType, Token},
    signing::keccak256,
    types::{Address, Log, TransactionReceipt, H256, U256},
};

pub(crate) const DEV_PRIVATE_KEY: &str =
    "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

pub(crate) fn contract_address() -> Address {
    "5fbdb2315678afecb367f032d93f642f64180aa3".parse().unwrap()
}

pub(crate) fn config(signers: SignerSource) -> Config {
    Config {
        log_level: LevelFilter::WARN,
        contract_address: contract_address(),
        jrpc_url: Url::parse("http://127.0.0.1:8545").unwrap(),
        signers,
        network: None,
        explorer_url: None,
        transaction_confirmation_count: 1,
        transaction_confirmation_poll_interval: Duration::from_millis(10),
        transaction_confirmation_timeout: Duration::from_millis(100),
        retry_strategy_max_wait_time: Duration::from_secs(1),
    }
}

pub(crate) fn log(topics: Vec<H256>, data: Vec<u8>) -> Log {
    serde_json::from_value(json!({
        "address": Address::from_low_u64_be(0xc0ffee),
        "topics": topics,
        "data": format!("0x{}", hex::encode(data)),
    }))
    .unwrap()
}

pub(crate) fn data_sent_log(from: Address, to: Address, entry: &DataEntry) -> Log {
    let signature = keccak256(b"DataSentToTarget(address,address,bytes32,bytes32,string)");
    let data = ethabi::encode(&[
        Token::FixedBytes(entry.owner.as_bytes().to_vec()),
        Token::FixedBytes(entry.actref.as_bytes().to_vec()),
        Token::String(entry.topic.clone()),
    ]);
    log(
        vec![H256::from(signature), H256::from(from), H256::from(to)],
        data,
    )
}

pub(crate) fn receipt(hash: H256, block: u64, logs: Vec<Log>, status: u64) -> TransactionReceipt {
    serde_json::from_value(json!({
        "transactionHash": hash,
        "transactionIndex": "0x0",
        "blockHash": H256::from_low_u64_be(block),
        "blockNumber": format!("0x{:x}", block),
        "from": Address::zero(),
        "to": Address::zero(),
        "cumulativeGasUsed": "0xb6d6",
        "gasUsed": "0xb6d6",
        "contractAddress": null,
        "logs": logs,
        "status": format!("0x{:x}", status),
        "logsBloom": format!("0x{}", "0".repeat(512)),
        "type": "0x2",
        "effectiveGasPrice": "0x3b9aca00",
    }))
    .unwrap()
}

#[derive(Debug, Clone)]
pub(crate) struct Submission {
    pub from: Address,
    pub to: Address,
    pub calldata: Vec<u8>,
}

#[derive(Default)]
struct FakeState {
    calls: usize,
    submissions: Vec<Submission>,
    failing_submissions: HashMap<usize, String>,
    receipts: HashMap<H256, Option<TransactionReceipt>>,
}

/// Confirms every submitted `sendDataToTarget` call in block `100 + n` and emits the
/// matching `DataSentToTarget` event, unless told otherwise.
pub(crate) struct FakeChain {
    signers: Vec<Signer>,
    chain_id: u64,
    state: Mutex<FakeState>,
}

impl FakeChain {
    pub fn new(signers: Vec<Signer>) -> Self {
        Self {
            signers,
            chain_id: 11155111,
            state: Mutex::new(FakeState::default()),
        }
    }

    pub fn with_local_signer() -> Self {
        Self::new(vec![Signer::local(
            SecretKey::from_str(DEV_PRIVATE_KEY).unwrap(),
        )])
    }

    pub fn on_chain(mut self, chain_id: u64) -> Self {
        self.chain_id = chain_id;
        self
    }

    pub fn transaction_hash(index: usize) -> H256 {
        H256::from_low_u64_be(0x1000 + index as u64)
    }

    /// The `index`-th submission (zero based) is rejected by the node.
    pub fn fail_submission(&self, index: usize) {
        self.fail_submission_with(index, "replacement transaction underpriced");
    }

    pub fn fail_submission_with(&self, index: usize, message: &str) {
        self.state
            .lock()
            .unwrap()
            .failing_submissions
            .insert(index, message.to_string());
    }

    pub fn set_receipt(&self, hash: H256, receipt: Option<TransactionReceipt>) {
        self.state.lock().unwrap().receipts.insert(hash, receipt);
    }

    pub fn submissions(&self) -> Vec<Submission> {
        self.state.lock().unwrap().submissions.clone()
    }

    pub fn calls(&self) -> usize {
        self.state.lock().unwrap().calls
    }

    fn record_call(&self) {
        self.state.lock().unwrap().calls += 1;
    }

    fn default_receipt(&self, hash: H256) -> Option<TransactionReceipt> {
        let state = self.state.lock().unwrap();
        let index = (0..state.submissions.len()).find(|i| Self::transaction_hash(*i) == hash)?;
        let submission = &state.submissions[index];
        let tokens = ethabi::decode(
            &[
                ParamType::Address,
                ParamType::FixedBytes(32),
                ParamType::FixedBytes(32),
                ParamType::String,
            ],
            &submission.calldata[4..],
        )
        .unwrap();
        let entry = DataEntry {
            target: tokens[0].clone().into_address().unwrap(),
            owner: Bytes32String::from_bytes(
                tokens[1].clone().into_fixed_bytes().unwrap().try_into().unwrap(),
            ),
            actref: Bytes32String::from_bytes(
                tokens[2].clone().into_fixed_bytes().unwrap().try_into().unwrap(),
            ),
            topic: tokens[3].clone().into_string().unwrap(),
        };
        let event = data_sent_log(submission.from, entry.target, &entry);
        Some(receipt(hash, 100 + index as u64, vec![event], 1))
    }
}

#[async_trait(?Send)]
impl ChainClient for FakeChain {
    async fn signers(&self) -> Result<Vec<Signer>, web3::Error> {
        self.record_call();
        Ok(self.signers.clone())
    }

    async fn network(&self) -> Result<Network, web3::Error> {
        self.record_call();
        Ok(Network::from_chain_id(self.chain_id))
    }

    async fn balance(&self, _address: Address) -> Result<U256, web3::Error> {
        self.record_call();
        Ok(U256::exp10(17) * 5)
    }

    async fn submit_transaction(
        &self,
        from: &Signer,
        to: Address,
        calldata: Vec<u8>,
    ) -> Result<H256, web3::Error> {
        self.record_call();
        let mut state = self.state.lock().unwrap();
        let index = state.submissions.len();
        state.submissions.push(Submission {
            from: from.address(),
            to,
            calldata,
        });
        if let Some(message) = state.failing_submissions.get(&index) {
            return Err(web3::Error::Rpc(jsonrpc_core::Error {
                code: jsonrpc_core::ErrorCode::ServerError(-32000),
                message: message.clone(),
                data: None,
            }));
        }
        Ok(Self::transaction_hash(index))
    }

    async fn wait_for_receipt(
        &self,
        transaction_hash: H256,
    ) -> Result<Option<TransactionReceipt>, web3::Error> {
        self.record_call();
        let scripted = self
            .state
            .lock()
            .unwrap()
            .receipts
            .get(&transaction_hash)
            .cloned();
        match scripted {
            Some(receipt) => Ok(receipt),
            None => Ok(self.default_receipt(transaction_hash)),
        }
    }
}
