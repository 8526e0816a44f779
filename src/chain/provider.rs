//! Node connection with per-request timeouts and chain id verification

use super::network::Network;
use super::{verify_chain_id, ChainClient, SignedTransfer};
use crate::config::NetworkConfig;
use crate::error::{FaucetError, FaucetResult};

use async_trait::async_trait;
use ethers::providers::{Http, JsonRpcClient, Middleware, Provider, ProviderError};
use ethers::types::{Address, BlockNumber, H256, U256};
use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info};

/// Gas used by a plain value transfer
pub const TRANSFER_GAS: u64 = 21_000;

/// Connection to a single node for one network.
///
/// Immutable after construction and safe to share behind an `Arc`.
pub struct ChainConnection<P = Http> {
    provider: Provider<P>,
    network: &'static Network,
    endpoint: String,
    timeout: Duration,
    gas_limit: U256,
    default_amount: U256,
}

impl ChainConnection<Http> {
    /// Connect to the configured endpoint and verify it serves the expected network
    pub async fn connect(config: &NetworkConfig) -> FaucetResult<Self> {
        let provider = Provider::<Http>::try_from(config.endpoint.as_str()).map_err(|e| {
            FaucetError::Connect {
                endpoint: config.endpoint.clone(),
                message: e.to_string(),
            }
        })?;

        Self::establish(provider, config).await
    }
}

impl<P: JsonRpcClient + 'static> ChainConnection<P> {
    /// Wrap an existing provider, failing if the node reports another chain
    pub async fn establish(provider: Provider<P>, config: &NetworkConfig) -> FaucetResult<Self> {
        let network = Network::by_name(&config.name)
            .ok_or_else(|| FaucetError::UnknownNetwork(config.name.clone()))?;
        let default_amount = config
            .default_amount_wei(network)
            .map_err(|e| FaucetError::Config(e.to_string()))?;
        let request_timeout = config.timeout();

        let reported = match timeout(request_timeout, provider.get_chainid()).await {
            Ok(Ok(id)) => id,
            Ok(Err(e)) => {
                return Err(FaucetError::Connect {
                    endpoint: config.endpoint.clone(),
                    message: e.to_string(),
                })
            }
            Err(_) => {
                return Err(FaucetError::Connect {
                    endpoint: config.endpoint.clone(),
                    message: format!("no answer within {:?}", request_timeout),
                })
            }
        };
        verify_chain_id(network, reported)?;

        info!(
            network = network.name,
            chain_id = network.chain_id,
            endpoint = %config.endpoint,
            "Connected to network node"
        );

        Ok(Self {
            provider,
            network,
            endpoint: config.endpoint.clone(),
            timeout: request_timeout,
            gas_limit: U256::from(config.gas_limit.unwrap_or(TRANSFER_GAS)),
            default_amount,
        })
    }

    /// Run a provider call under the request timeout
    async fn bounded<T, F>(&self, operation: &str, fut: F) -> FaucetResult<T>
    where
        F: Future<Output = Result<T, ProviderError>>,
    {
        match timeout(self.timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(FaucetError::Query {
                operation: operation.to_string(),
                message: e.to_string(),
            }),
            Err(_) => Err(FaucetError::Timeout {
                operation: operation.to_string(),
            }),
        }
    }

    pub fn network(&self) -> &'static Network {
        self.network
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Gas limit used for funding transfers
    pub fn gas_limit(&self) -> U256 {
        self.gas_limit
    }

    /// Amount sent when a caller asks for zero
    pub fn default_amount(&self) -> U256 {
        self.default_amount
    }

    /// Liveness probe used by the health loop and readiness endpoint
    pub async fn health_check(&self) -> bool {
        self.bounded("block number", self.provider.get_block_number())
            .await
            .is_ok()
    }
}

#[async_trait]
impl<P: JsonRpcClient + 'static> ChainClient for ChainConnection<P> {
    fn chain_id(&self) -> u64 {
        self.network.chain_id
    }

    async fn balance_of(&self, address: Address, block: BlockNumber) -> FaucetResult<U256> {
        self.bounded(
            "balance",
            self.provider.get_balance(address, Some(block.into())),
        )
        .await
    }

    async fn suggest_gas_price(&self) -> FaucetResult<U256> {
        self.bounded("gas price", self.provider.get_gas_price()).await
    }

    async fn next_nonce(&self, address: Address) -> FaucetResult<U256> {
        self.bounded(
            "nonce",
            self.provider
                .get_transaction_count(address, Some(BlockNumber::Pending.into())),
        )
        .await
    }

    async fn broadcast(&self, transfer: &SignedTransfer) -> FaucetResult<H256> {
        let send = async {
            self.provider
                .send_raw_transaction(transfer.raw.clone())
                .await
                .map(|pending| pending.tx_hash())
        };

        match timeout(self.timeout, send).await {
            Ok(Ok(tx_hash)) => {
                if tx_hash != transfer.hash {
                    debug!(
                        local = ?transfer.hash,
                        node = ?tx_hash,
                        "Node reported a different transaction hash"
                    );
                }
                Ok(tx_hash)
            }
            Ok(Err(e)) => Err(FaucetError::Broadcast {
                signer: format!("{:?}", transfer.from),
                message: e.to_string(),
            }),
            Err(_) => Err(FaucetError::Timeout {
                operation: "broadcast".to_string(),
            }),
        }
    }

    async fn receipt_status(&self, tx_hash: H256) -> FaucetResult<bool> {
        let receipt = self
            .bounded("receipt", self.provider.get_transaction_receipt(tx_hash))
            .await?;

        match receipt {
            // Pre-byzantium receipts carry no status; being mined counts as success
            Some(receipt) => Ok(receipt.status.map_or(true, |status| !status.is_zero())),
            None => Err(FaucetError::ReceiptNotFound {
                tx_hash: format!("{:?}", tx_hash),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::providers::MockProvider;
    use ethers::types::TransactionReceipt;

    fn network_config(name: &str) -> NetworkConfig {
        NetworkConfig {
            name: name.to_string(),
            endpoint: "http://127.0.0.1:1".to_string(),
            timeout_secs: 2,
            gas_limit: None,
            default_amount: None,
            gas_price_gwei: None,
        }
    }

    async fn mocked(name: &str) -> (ChainConnection<MockProvider>, MockProvider) {
        let (provider, mock) = Provider::mocked();
        let chain_id = Network::by_name(name).unwrap().chain_id;
        mock.push(U256::from(chain_id)).unwrap();
        let conn = ChainConnection::establish(provider, &network_config(name))
            .await
            .unwrap();
        (conn, mock)
    }

    #[tokio::test]
    async fn test_chain_id_mismatch_is_fatal() {
        let (provider, mock) = Provider::mocked();
        mock.push(U256::from(5)).unwrap();

        let err = ChainConnection::establish(provider, &network_config("mainnet"))
            .await
            .err()
            .unwrap();
        assert!(matches!(
            &err,
            FaucetError::NetworkMismatch { expected: 1, actual, .. } if *actual == U256::from(5)
        ));
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_wide_chain_id_is_not_truncated() {
        // Low 64 bits equal mainnet's id
        let (provider, mock) = Provider::mocked();
        mock.push(U256::from(u64::MAX) + U256::from(2)).unwrap();

        let err = ChainConnection::establish(provider, &network_config("mainnet"))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, FaucetError::NetworkMismatch { expected: 1, .. }));
    }

    #[tokio::test]
    async fn test_unknown_network() {
        let (provider, _mock) = Provider::mocked();
        let err = ChainConnection::establish(provider, &network_config("atlantis"))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, FaucetError::UnknownNetwork(_)));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint() {
        let err = ChainConnection::connect(&network_config("goerli"))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, FaucetError::Connect { .. }));
    }

    #[tokio::test]
    async fn test_defaults_from_network() {
        let (conn, _mock) = mocked("xdai").await;
        assert_eq!(conn.chain_id(), 100);
        assert_eq!(conn.gas_limit(), U256::from(TRANSFER_GAS));
        assert_eq!(conn.default_amount(), U256::exp10(17));
    }

    #[tokio::test]
    async fn test_balance_query() {
        let (conn, mock) = mocked("goerli").await;
        mock.push(U256::from(42)).unwrap();

        let balance = conn
            .balance_of(Address::random(), BlockNumber::Latest)
            .await
            .unwrap();
        assert_eq!(balance, U256::from(42));
    }

    #[tokio::test]
    async fn test_pending_receipt_is_not_found() {
        let (conn, mock) = mocked("goerli").await;
        mock.push::<Option<TransactionReceipt>, _>(None).unwrap();

        let err = conn.receipt_status(H256::random()).await.err().unwrap();
        assert!(matches!(err, FaucetError::ReceiptNotFound { .. }));
    }

    #[tokio::test]
    async fn test_reverted_receipt() {
        let (conn, mock) = mocked("goerli").await;
        let receipt = TransactionReceipt {
            status: Some(0u64.into()),
            ..Default::default()
        };
        mock.push(Some(receipt)).unwrap();

        assert!(!conn.receipt_status(H256::random()).await.unwrap());
    }
}
