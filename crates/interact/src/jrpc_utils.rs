use backoff::{future::retry, ExponentialBackoff, ExponentialBackoffBuilder};
use futures::TryFutureExt;
use jsonrpc_core::{Call, Value};
use std::{future::Future, pin::Pin, time::Duration};
use tracing::trace;
use url::Url;
use web3::{transports::Http, RequestId};

/// JSON-RPC methods that only read chain state, and are therefore safe to send more than once.
const RETRYABLE_METHODS: &[&str] = &[
    "eth_accounts",
    "eth_blockNumber",
    "eth_chainId",
    "eth_estimateGas",
    "eth_gasPrice",
    "eth_getBalance",
    "eth_getTransactionCount",
    "eth_getTransactionReceipt",
    "net_version",
];

/// A wrapper around [`web3::Transport`] that retries read-only JSON-RPC calls on failure.
/// Anything else, transaction broadcasts in particular, is sent exactly once.
#[derive(Debug, Clone)]
pub struct JrpcExpBackoff<T = Http> {
    inner: T,
    strategy: ExponentialBackoff,
}

impl<T> JrpcExpBackoff<T> {
    pub fn new(transport: T, max_wait: Duration) -> Self {
        let strategy = ExponentialBackoffBuilder::new()
            .with_max_elapsed_time(Some(max_wait))
            .build();

        Self {
            inner: transport,
            strategy,
        }
    }
}

impl JrpcExpBackoff {
    pub fn http(jrpc_url: &Url, max_wait: Duration) -> web3::Result<Self> {
        let client = Http::new(jrpc_url.as_str())?;
        Ok(Self::new(client, max_wait))
    }
}

fn is_retryable(request: &Call) -> bool {
    match request {
        Call::MethodCall(call) => RETRYABLE_METHODS.contains(&call.method.as_str()),
        _ => false,
    }
}

/// Errors reported by the node itself (reverts, bad params) are deterministic and fail fast.
/// Transport failures are retried.
fn classify(error: web3::Error) -> backoff::Error<web3::Error> {
    match error {
        web3::Error::Rpc(_) => backoff::Error::permanent(error),
        _ => backoff::Error::transient(error),
    }
}

impl<T> web3::Transport for JrpcExpBackoff<T>
where
    T: web3::Transport + 'static,
{
    type Out = Pin<Box<dyn Future<Output = web3::error::Result<Value>>>>;

    fn prepare(&self, method: &str, params: Vec<Value>) -> (RequestId, Call) {
        self.inner.prepare(method, params)
    }

    fn send(&self, id: RequestId, request: Call) -> Self::Out {
        if !is_retryable(&request) {
            trace!(?id, ?request, "Sending JRPC call once");
            return Box::pin(self.inner.send(id, request));
        }
        let strategy = self.strategy.clone();
        let transport = self.inner.clone();
        let op = move || {
            trace!(?id, ?request, "Sending JRPC call");
            transport.send(id, request.clone()).map_err(classify)
        };
        Box::pin(retry(strategy, op))
    }
}
