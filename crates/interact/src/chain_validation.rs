use crate::models::{Caip2ChainId, Network};
use anyhow::anyhow;
use std::str::FromStr;
use tracing::{error, info};

/// Validates that the RPC endpoint serves the chain named in the configuration.
pub fn validate_network(expected_chain: &Caip2ChainId, network: &Network) -> anyhow::Result<()> {
    // Only EVM chains (namespace "eip155") can be checked against `eth_chainId`.
    if expected_chain.namespace_part() != "eip155" {
        return Err(anyhow!(
            "Unsupported chain {}: only eip155 chains can be used",
            expected_chain
        ));
    }

    // Parse expected numeric chain ID from CAIP-2 reference
    let expected_numeric_id = u64::from_str(expected_chain.reference_part())
        .map_err(|e| anyhow!("Failed to parse chain ID from {}: {}", expected_chain, e))?;

    if network.chain_id != expected_numeric_id {
        error!(
            "Chain ID mismatch: RPC returned chain ID {} (0x{:x}), expected {} from CAIP-2 identifier {}",
            network.chain_id, network.chain_id, expected_numeric_id, expected_chain
        );
        return Err(anyhow!(
            "Chain ID mismatch: RPC returned chain ID {} (0x{:x}), expected {} from CAIP-2 identifier {}",
            network.chain_id,
            network.chain_id,
            expected_numeric_id,
            expected_chain
        ));
    }

    info!(
        "✓ Chain ID validated for {}: RPC correctly returns chain ID {}",
        expected_chain, network.chain_id
    );

    Ok(())
}
