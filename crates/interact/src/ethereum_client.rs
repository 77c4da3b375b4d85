use crate::config::Config;
use crate::contracts::ChainClient;
use crate::jrpc_utils::JrpcExpBackoff;
use crate::models::Network;
use crate::signer::{Signer, SignerSource};
use async_trait::async_trait;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::{debug, trace, warn};
use web3::{
    types::{
        Address, Bytes, CallRequest, TransactionParameters, TransactionReceipt,
        TransactionRequest, H256, U256, U64,
    },
    Transport, Web3,
};

/// Talks to an Ethereum JSON-RPC node, signing transactions locally or through the node
/// depending on the configured [`SignerSource`].
pub struct EthereumClient<T: Transport = JrpcExpBackoff> {
    web3: Web3<T>,
    signer_source: SignerSource,
    confirmations: usize,
    poll_interval: Duration,
    confirmation_timeout: Duration,
}

impl EthereumClient {
    pub fn new(config: &Config) -> web3::Result<Self> {
        let transport =
            JrpcExpBackoff::http(&config.jrpc_url, config.retry_strategy_max_wait_time)?;
        Ok(Self::with_transport(transport, config))
    }
}

impl<T: Transport> EthereumClient<T> {
    pub fn with_transport(transport: T, config: &Config) -> Self {
        Self {
            web3: Web3::new(transport),
            signer_source: config.signers.clone(),
            confirmations: config.transaction_confirmation_count.max(1),
            poll_interval: config.transaction_confirmation_poll_interval,
            confirmation_timeout: config.transaction_confirmation_timeout,
        }
    }

    /// Polls until the transaction is mined and has enough confirmations.
    async fn poll_receipt(&self, transaction_hash: H256) -> web3::Result<TransactionReceipt> {
        let eth = self.web3.eth();
        loop {
            if let Some(receipt) = eth.transaction_receipt(transaction_hash).await? {
                if let Some(block_number) = receipt.block_number {
                    let head = eth.block_number().await?;
                    let confirmed_at = block_number + U64::from(self.confirmations as u64);
                    if head + U64::one() >= confirmed_at {
                        return Ok(receipt);
                    }
                    trace!(%head, %block_number, "Waiting for more confirmations");
                }
            }
            sleep(self.poll_interval).await;
        }
    }
}

#[async_trait(?Send)]
impl<T: Transport> ChainClient for EthereumClient<T> {
    async fn signers(&self) -> Result<Vec<Signer>, web3::Error> {
        match &self.signer_source {
            SignerSource::PrivateKeys(keys) => Ok(keys.iter().copied().map(Signer::local).collect()),
            SignerSource::NodeAccounts => {
                let accounts = self.web3.eth().accounts().await?;
                debug!(count = accounts.len(), "Fetched node-managed accounts");
                Ok(accounts.into_iter().map(Signer::node).collect())
            }
        }
    }

    async fn network(&self) -> Result<Network, web3::Error> {
        let chain_id = self.web3.eth().chain_id().await?;
        Ok(Network::from_chain_id(chain_id.as_u64()))
    }

    async fn balance(&self, address: Address) -> Result<U256, web3::Error> {
        self.web3.eth().balance(address, None).await
    }

    async fn submit_transaction(
        &self,
        from: &Signer,
        to: Address,
        calldata: Vec<u8>,
    ) -> Result<H256, web3::Error> {
        let eth = self.web3.eth();
        let gas = eth
            .estimate_gas(
                CallRequest {
                    from: Some(from.address()),
                    to: Some(to),
                    data: Some(Bytes(calldata.clone())),
                    ..Default::default()
                },
                None,
            )
            .await?;
        debug!(%gas, "Estimated gas");

        match from {
            Signer::Local { key, .. } => {
                let parameters = TransactionParameters {
                    to: Some(to),
                    gas,
                    data: Bytes(calldata),
                    ..Default::default()
                };
                let signed = self.web3.accounts().sign_transaction(parameters, key).await?;
                eth.send_raw_transaction(signed.raw_transaction).await
            }
            Signer::Node { address } => {
                eth.send_transaction(TransactionRequest {
                    from: *address,
                    to: Some(to),
                    gas: Some(gas),
                    data: Some(Bytes(calldata)),
                    ..Default::default()
                })
                .await
            }
        }
    }

    async fn wait_for_receipt(
        &self,
        transaction_hash: H256,
    ) -> Result<Option<TransactionReceipt>, web3::Error> {
        match timeout(self.confirmation_timeout, self.poll_receipt(transaction_hash)).await {
            Ok(result) => result.map(Some),
            Err(_elapsed) => {
                warn!(
                    ?transaction_hash,
                    seconds = self.confirmation_timeout.as_secs(),
                    "Gave up waiting for the transaction receipt"
                );
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{config, receipt, DEV_PRIVATE_KEY};
    use jsonrpc_core::{Call, Value};
    use secp256k1::SecretKey;
    use std::{
        collections::HashMap,
        str::FromStr,
        sync::{Arc, Mutex},
    };
    use web3::RequestId;

    /// Answers each JSON-RPC method with a fixed value and records the methods called.
    #[derive(Debug, Clone, Default)]
    struct ScriptedTransport {
        responses: Arc<Mutex<HashMap<String, Value>>>,
        requests: Arc<Mutex<Vec<String>>>,
    }

    impl ScriptedTransport {
        fn respond(self, method: &str, value: Value) -> Self {
            self.responses
                .lock()
                .unwrap()
                .insert(method.to_string(), value);
            self
        }

        fn requests(&self) -> Vec<String> {
            self.requests.lock().unwrap().clone()
        }
    }

    impl Transport for ScriptedTransport {
        type Out = futures::future::Ready<web3::error::Result<Value>>;

        fn prepare(&self, method: &str, params: Vec<Value>) -> (RequestId, Call) {
            (1, web3::helpers::build_request(1, method, params))
        }

        fn send(&self, _id: RequestId, request: Call) -> Self::Out {
            let method = match request {
                Call::MethodCall(call) => call.method,
                _ => unreachable!("only method calls are sent"),
            };
            self.requests.lock().unwrap().push(method.clone());
            let response = self.responses.lock().unwrap().get(&method).cloned();
            futures::future::ready(response.ok_or(web3::Error::Unreachable))
        }
    }

    fn hash_value(hash: H256) -> Value {
        Value::String(format!("{:?}", hash))
    }

    #[tokio::test]
    async fn network_from_chain_id() {
        let transport = ScriptedTransport::default().respond("eth_chainId", "0xaa36a7".into());
        let client = EthereumClient::with_transport(transport, &config(SignerSource::NodeAccounts));
        let network = client.network().await.unwrap();
        assert_eq!(network, Network::from_chain_id(11155111));
    }

    #[tokio::test]
    async fn node_accounts_become_signers() {
        let account = Address::from_low_u64_be(0xabc);
        let transport = ScriptedTransport::default().respond(
            "eth_accounts",
            Value::Array(vec![Value::String(format!("{:?}", account))]),
        );
        let client = EthereumClient::with_transport(transport, &config(SignerSource::NodeAccounts));
        let signers = client.signers().await.unwrap();
        assert_eq!(signers.len(), 1);
        assert_eq!(signers[0].address(), account);
    }

    #[tokio::test]
    async fn local_keys_need_no_network() {
        let transport = ScriptedTransport::default();
        let key = SecretKey::from_str(DEV_PRIVATE_KEY).unwrap();
        let client = EthereumClient::with_transport(
            transport.clone(),
            &config(SignerSource::PrivateKeys(vec![key])),
        );
        assert_eq!(client.signers().await.unwrap().len(), 1);
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn local_signer_broadcasts_raw_transaction() {
        let hash = H256::from_low_u64_be(0xfeed);
        let transport = ScriptedTransport::default()
            .respond("eth_estimateGas", "0xb6d6".into())
            .respond("eth_chainId", "0xaa36a7".into())
            .respond("eth_gasPrice", "0x3b9aca00".into())
            .respond("eth_getTransactionCount", "0x0".into())
            .respond("eth_sendRawTransaction", hash_value(hash));
        let key = SecretKey::from_str(DEV_PRIVATE_KEY).unwrap();
        let client = EthereumClient::with_transport(
            transport.clone(),
            &config(SignerSource::PrivateKeys(vec![key])),
        );

        let sent = client
            .submit_transaction(&Signer::local(key), Address::from_low_u64_be(99), vec![1, 2, 3])
            .await
            .unwrap();
        assert_eq!(sent, hash);
        let requests = transport.requests();
        assert_eq!(requests.first().map(String::as_str), Some("eth_estimateGas"));
        assert_eq!(requests.last().map(String::as_str), Some("eth_sendRawTransaction"));
        assert!(!requests.iter().any(|m| m == "eth_sendTransaction"));
    }

    #[tokio::test]
    async fn node_signer_uses_send_transaction() {
        let hash = H256::from_low_u64_be(0xbeef);
        let transport = ScriptedTransport::default()
            .respond("eth_estimateGas", "0xb6d6".into())
            .respond("eth_sendTransaction", hash_value(hash));
        let client =
            EthereumClient::with_transport(transport.clone(), &config(SignerSource::NodeAccounts));

        let sent = client
            .submit_transaction(
                &Signer::node(Address::from_low_u64_be(1)),
                Address::from_low_u64_be(99),
                vec![],
            )
            .await
            .unwrap();
        assert_eq!(sent, hash);
        assert_eq!(transport.requests(), vec!["eth_estimateGas", "eth_sendTransaction"]);
    }

    #[tokio::test]
    async fn receipt_is_returned_once_mined() {
        let hash = H256::from_low_u64_be(0xfeed);
        let transport = ScriptedTransport::default()
            .respond(
                "eth_getTransactionReceipt",
                serde_json::to_value(receipt(hash, 0x70, vec![], 1)).unwrap(),
            )
            .respond("eth_blockNumber", "0x70".into());
        let client = EthereumClient::with_transport(transport, &config(SignerSource::NodeAccounts));

        let receipt = client.wait_for_receipt(hash).await.unwrap().unwrap();
        assert_eq!(receipt.block_number, Some(U64::from(0x70)));
    }

    #[tokio::test]
    async fn no_receipt_before_timeout() {
        let transport =
            ScriptedTransport::default().respond("eth_getTransactionReceipt", Value::Null);
        let client = EthereumClient::with_transport(transport, &config(SignerSource::NodeAccounts));

        let receipt = client
            .wait_for_receipt(H256::from_low_u64_be(1))
            .await
            .unwrap();
        assert!(receipt.is_none());
    }
}
