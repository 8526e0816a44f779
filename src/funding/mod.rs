//! Funding engine
//!
//! The engine:
//! 1. Rejects destinations that already hold more than the accepted maximum
//! 2. Leases a signer that can cover the amount, retrying while none is free
//! 3. Signs and broadcasts the transfer with a nonce-safe, gas-priced request
//! 4. Hands the transfer to a background confirmation tracker

pub mod engine;
pub mod tracker;


pub use engine::{FundOutcome, FundingConfig, FundingEngine, FundingTicket, SignerReport};
pub use tracker::{
    ConfirmationHandle, ConfirmationTracker, PendingTransaction, TrackingOutcome, TxStatus,
};
