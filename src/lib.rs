//! Entity Faucet - funds governance entity accounts with network gas
//!
//! A pool of pre-funded signers is shared across concurrent funding
//! requests. Each request leases a signer that can cover the amount, signs and
//! broadcasts a transfer, and leaves a background tracker to watch for the
//! receipt and return the signer to the pool.

pub mod api;
pub mod chain;
pub mod config;
pub mod error;
pub mod funding;
pub mod metrics;
pub mod signer;
pub mod tx;

pub use chain::{ChainClient, ChainConnection, Network};
pub use error::{FaucetError, FaucetResult};
pub use funding::{FundOutcome, FundingConfig, FundingEngine};
pub use signer::SignerPool;
