//! Per-signer nonce floor
//!
//! The node's pending nonce is authoritative, but a lagging node may report a
//! nonce we already used. Keeping the last broadcast nonce locally makes
//! consecutive transfers from one signer strictly increasing.

use ethers::types::U256;
use std::sync::Mutex;
use tracing::warn;

#[derive(Debug, Default)]
pub struct NonceTracker {
    last_sent: Mutex<Option<U256>>,
}

impl NonceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pick the nonce for the next transfer given the node's pending nonce
    pub fn next(&self, chain_nonce: U256) -> U256 {
        match *self.lock() {
            Some(last) if last >= chain_nonce => {
                warn!(
                    chain_nonce = %chain_nonce,
                    last_sent = %last,
                    "Node nonce is behind the last broadcast, using local floor"
                );
                last + 1
            }
            _ => chain_nonce,
        }
    }

    /// Record a nonce accepted by the node
    pub fn record_sent(&self, nonce: U256) {
        let mut last = self.lock();
        if last.map_or(true, |l| nonce > l) {
            *last = Some(nonce);
        }
    }

    /// Drop the local floor so the node's view wins again
    pub fn forget(&self) {
        *self.lock() = None;
    }

    pub fn last_sent(&self) -> Option<U256> {
        *self.lock()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<U256>> {
        // Only plain reads and writes happen under the lock, a poisoned value is still valid
        self.last_sent
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
