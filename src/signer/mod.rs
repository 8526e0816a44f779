//! Funding accounts and the pool that leases them out
//!
//! A `Signer` owns one private key and an exclusive-use flag. The
//! `SignerPool` hands signers out through `SignerLease` guards, releasing the
//! flag when the guard is dropped so every exit path releases exactly once.

mod pool;

pub use pool::{PoolStats, SignerLease, SignerPool};

use crate::chain::SignedTransfer;
use crate::error::{FaucetError, FaucetResult};
use crate::tx::{sign_transfer, NonceTracker};

use ethers::signers::{LocalWallet, Signer as _};
use ethers::types::{Address, U256};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

/// One pre-funded account able to pay out from its balance
pub struct Signer {
    index: usize,
    wallet: LocalWallet,
    chain_id: u64,
    leased: AtomicBool,
    nonces: NonceTracker,
}

impl Signer {
    /// Create a signer from a hex private key, with or without `0x`
    pub fn from_key(index: usize, key: &str, chain_id: u64) -> FaucetResult<Self> {
        let wallet = key
            .trim()
            .trim_start_matches("0x")
            .parse::<LocalWallet>()
            .map_err(|e| FaucetError::InvalidKey {
                index,
                message: e.to_string(),
            })?
            .with_chain_id(chain_id);

        Ok(Self {
            index,
            wallet,
            chain_id,
            leased: AtomicBool::new(false),
            nonces: NonceTracker::new(),
        })
    }

    /// Position of this signer in the configured list
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn address(&self) -> Address {
        self.wallet.address()
    }

    pub fn is_leased(&self) -> bool {
        self.leased.load(Ordering::Acquire)
    }

    pub fn nonces(&self) -> &NonceTracker {
        &self.nonces
    }

    /// Sign a value transfer from this signer's account
    pub async fn sign_transfer(
        &self,
        to: Address,
        value: U256,
        nonce: U256,
        gas_limit: U256,
        gas_price: U256,
    ) -> FaucetResult<SignedTransfer> {
        sign_transfer(
            &self.wallet,
            self.chain_id,
            to,
            value,
            nonce,
            gas_limit,
            gas_price,
        )
        .await
    }

    /// Non-blocking attempt to take the lease
    fn try_acquire(&self) -> bool {
        self.leased
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    fn release(&self) {
        self.leased.store(false, Ordering::Release);
    }
}

impl fmt::Debug for Signer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signer")
            .field("index", &self.index)
            .field("address", &self.address())
            .field("leased", &self.is_leased())
            .finish()
    }
}
