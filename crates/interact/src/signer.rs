use secp256k1::SecretKey;
use web3::{
    signing::{Key, SecretKeyRef},
    types::Address,
};

/// Where the signer set comes from.
#[derive(Clone, Debug)]
pub enum SignerSource {
    /// Keys held by this process. Transactions are signed locally and broadcast raw.
    PrivateKeys(Vec<SecretKey>),
    /// Accounts unlocked on the JSON-RPC node, as listed by `eth_accounts`.
    NodeAccounts,
}

/// An account able to authorize transactions.
#[derive(Clone, Debug)]
pub enum Signer {
    Local { key: SecretKey, address: Address },
    Node { address: Address },
}

impl Signer {
    pub fn local(key: SecretKey) -> Self {
        let address = SecretKeyRef::new(&key).address();
        Self::Local { key, address }
    }

    pub fn node(address: Address) -> Self {
        Self::Node { address }
    }

    pub fn address(&self) -> Address {
        match self {
            Self::Local { address, .. } | Self::Node { address } => *address,
        }
    }
}
