//! Gas price selection with graceful degradation
//!
//! Order of preference: configured or network-fixed price, then the node's
//! suggestion, then the network's hard-coded fallback. A failing suggestion
//! never fails the funding request.

use crate::chain::{ChainClient, Network};
use crate::chain::network::gwei;

use ethers::types::U256;
use tracing::{debug, warn};

/// Gas price source for funding transfers
#[derive(Debug, Clone)]
pub struct GasOracle {
    fixed: Option<U256>,
    fallback: U256,
}

impl GasOracle {
    /// Create an oracle for a network, `configured_gwei` wins over the network's fixed price
    pub fn new(network: &Network, configured_gwei: Option<u64>) -> Self {
        Self {
            fixed: configured_gwei.map(gwei).or_else(|| network.fixed_gas_price()),
            fallback: network.fallback_gas_price(),
        }
    }

    /// Get the gas price to use for the next transfer
    pub async fn gas_price<C: ChainClient + ?Sized>(&self, client: &C) -> U256 {
        if let Some(price) = self.fixed {
            return price;
        }

        match client.suggest_gas_price().await {
            Ok(price) if !price.is_zero() => {
                debug!(gas_price = %price, "Using node suggested gas price");
                price
            }
            Ok(_) => {
                warn!(fallback = %self.fallback, "Node suggested a zero gas price, using fallback");
                self.fallback
            }
            Err(e) => {
                warn!(error = %e, fallback = %self.fallback, "Gas price suggestion failed, using fallback");
                self.fallback
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::MockChainClient;
    use crate::error::FaucetError;

    #[tokio::test]
    async fn test_fixed_price_skips_node() {
        let mut client = MockChainClient::new();
        client.expect_suggest_gas_price().never();

        let xdai = Network::by_name("xdai").unwrap();
        let oracle = GasOracle::new(xdai, None);
        assert_eq!(oracle.gas_price(&client).await, gwei(1));

        let goerli = Network::by_name("goerli").unwrap();
        let oracle = GasOracle::new(goerli, Some(7));
        assert_eq!(oracle.gas_price(&client).await, gwei(7));
    }

    #[tokio::test]
    async fn test_node_suggestion() {
        let mut client = MockChainClient::new();
        client
            .expect_suggest_gas_price()
            .times(1)
            .returning(|| Ok(U256::from(12_345)));

        let oracle = GasOracle::new(Network::by_name("goerli").unwrap(), None);
        assert_eq!(oracle.gas_price(&client).await, U256::from(12_345));
    }

    #[tokio::test]
    async fn test_fallback_on_failure() {
        let mut client = MockChainClient::new();
        client.expect_suggest_gas_price().returning(|| {
            Err(FaucetError::Timeout {
                operation: "gas price".to_string(),
            })
        });

        let mainnet = Network::by_name("mainnet").unwrap();
        let oracle = GasOracle::new(mainnet, None);
        assert_eq!(oracle.gas_price(&client).await, mainnet.fallback_gas_price());
    }
}
