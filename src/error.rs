//! Error types for the entity faucet

use ethers::types::U256;
use thiserror::Error;

/// Main error type for the faucet
#[derive(Error, Debug)]
pub enum FaucetError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unknown network '{0}'")]
    UnknownNetwork(String),

    #[error("Cannot connect to {endpoint}: {message}")]
    Connect { endpoint: String, message: String },

    #[error("Network mismatch for {network}: expected chain id {expected}, node reports {actual}")]
    NetworkMismatch {
        network: String,
        expected: u64,
        actual: U256,
    },

    #[error("Query '{operation}' failed: {message}")]
    Query { operation: String, message: String },

    #[error("Timeout waiting for {operation}")]
    Timeout { operation: String },

    #[error("Broadcast from {signer} failed: {message}")]
    Broadcast { signer: String, message: String },

    #[error("Receipt for transaction {tx_hash} not found")]
    ReceiptNotFound { tx_hash: String },

    #[error("Signing error: {0}")]
    Signing(String),

    #[error("Invalid signer key #{index}: {message}")]
    InvalidKey { index: usize, message: String },

    #[error("No funded signer became available after {waited_secs}s")]
    NoSignerAvailable { waited_secs: u64 },

    #[error("Funding engine is shutting down")]
    ShuttingDown,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl FaucetError {
    /// Errors that must abort startup instead of being retried
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            FaucetError::Config(_)
                | FaucetError::UnknownNetwork(_)
                | FaucetError::Connect { .. }
                | FaucetError::NetworkMismatch { .. }
                | FaucetError::InvalidKey { .. }
        )
    }

    /// Errors that make the funding loop move on to another signer
    pub fn skips_signer(&self) -> bool {
        matches!(
            self,
            FaucetError::Query { .. }
                | FaucetError::Timeout { .. }
                | FaucetError::Broadcast { .. }
                | FaucetError::Signing(_)
        )
    }
}

/// Result type for faucet operations
pub type FaucetResult<T> = Result<T, FaucetError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        let mismatch = FaucetError::NetworkMismatch {
            network: "mainnet".to_string(),
            expected: 1,
            actual: U256::from(5),
        };
        assert!(mismatch.is_fatal());
        assert!(!mismatch.skips_signer());

        let timeout = FaucetError::Timeout {
            operation: "balance".to_string(),
        };
        assert!(timeout.skips_signer());
        assert!(!timeout.is_fatal());

        assert!(!FaucetError::NoSignerAvailable { waited_secs: 10 }.is_fatal());
    }
}
