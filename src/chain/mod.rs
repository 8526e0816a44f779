//! Chain module - the faucet's single point of contact with the network node
//!
//! This module provides:
//! - The `ChainClient` seam the funding engine talks through
//! - `ChainConnection`, the ethers-backed implementation with per-call timeouts
//! - The table of supported networks and their gas/amount defaults

pub mod network;
pub mod provider;

#[cfg(test)]
pub mod testing;

pub use network::Network;
pub use provider::ChainConnection;

use crate::error::{FaucetError, FaucetResult};

use async_trait::async_trait;
use ethers::types::{Address, BlockNumber, Bytes, H256, U256};

/// A signed, ready to broadcast value transfer
#[derive(Debug, Clone, PartialEq)]
pub struct SignedTransfer {
    pub from: Address,
    pub to: Address,
    pub value: U256,
    pub nonce: U256,
    pub gas_limit: U256,
    pub gas_price: U256,
    /// Locally computed hash of the signed payload
    pub hash: H256,
    /// RLP encoded signed transaction
    pub raw: Bytes,
}

/// Operations the funding engine needs from a network node.
///
/// Implementations must be safe for concurrent use; every call is expected to
/// be bounded by the implementation's request timeout.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChainClient: Send + Sync + 'static {
    /// Chain id this client was verified against
    fn chain_id(&self) -> u64;

    /// Balance of `address` at `block`
    async fn balance_of(&self, address: Address, block: BlockNumber) -> FaucetResult<U256>;

    /// Node suggested gas price in wei
    async fn suggest_gas_price(&self) -> FaucetResult<U256>;

    /// Next usable nonce for `address`, counting pending transactions
    async fn next_nonce(&self, address: Address) -> FaucetResult<U256>;

    /// Broadcast a signed transfer and return the hash reported by the node
    async fn broadcast(&self, transfer: &SignedTransfer) -> FaucetResult<H256>;

    /// `Ok(true)` if mined successfully, `Ok(false)` if mined and reverted,
    /// `Err(ReceiptNotFound)` while the transaction is still pending.
    async fn receipt_status(&self, tx_hash: H256) -> FaucetResult<bool>;
}

/// Check a node reported chain id against the expected network
pub fn verify_chain_id(network: &Network, reported: U256) -> FaucetResult<()> {
    if reported != U256::from(network.chain_id) {
        return Err(FaucetError::NetworkMismatch {
            network: network.name.to_string(),
            expected: network.chain_id,
            actual: reported,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verify_chain_id() {
        let mainnet = Network::by_name("mainnet").unwrap();
        assert!(verify_chain_id(mainnet, U256::one()).is_ok());

        match verify_chain_id(mainnet, U256::from(5)) {
            Err(FaucetError::NetworkMismatch {
                expected, actual, ..
            }) => {
                assert_eq!(expected, 1);
                assert_eq!(actual, U256::from(5));
            }
            other => panic!("expected mismatch, got {:?}", other),
        }

        let wide = U256::from(u64::MAX) + U256::from(2);
        assert!(verify_chain_id(mainnet, wide).is_err());
    }
}
