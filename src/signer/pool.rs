//! Lease/release over a fixed, insertion-ordered set of signers
//!
//! Each signer carries its own atomic flag, so leasing one signer never waits
//! on another and no pool-wide lock exists.

use super::Signer;
use crate::error::{FaucetError, FaucetResult};

use serde::Serialize;
use std::ops::Deref;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Shared pool of funding signers
#[derive(Debug)]
pub struct SignerPool {
    signers: Vec<Arc<Signer>>,
    leases: AtomicU64,
    releases: AtomicU64,
}

/// Lease counters for observability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    pub size: usize,
    pub leased: usize,
    pub total_leases: u64,
    pub total_releases: u64,
}

impl SignerPool {
    /// Build a pool from already constructed signers
    pub fn new(signers: Vec<Signer>) -> FaucetResult<Self> {
        if signers.is_empty() {
            return Err(FaucetError::Config(
                "Signer pool needs at least one signer".to_string(),
            ));
        }

        Ok(Self {
            signers: signers.into_iter().map(Arc::new).collect(),
            leases: AtomicU64::new(0),
            releases: AtomicU64::new(0),
        })
    }

    /// Build a pool from hex private keys, preserving their order
    pub fn from_keys<S: AsRef<str>>(keys: &[S], chain_id: u64) -> FaucetResult<Self> {
        let signers = keys
            .iter()
            .enumerate()
            .map(|(i, key)| Signer::from_key(i, key.as_ref(), chain_id))
            .collect::<FaucetResult<Vec<_>>>()?;
        Self::new(signers)
    }

    /// Lease the first free signer, scanning once in order
    pub fn try_lease(self: &Arc<Self>) -> Option<SignerLease> {
        self.try_lease_where(|_| true)
    }

    /// Lease the first free signer accepted by `filter`
    pub fn try_lease_where<F>(self: &Arc<Self>, filter: F) -> Option<SignerLease>
    where
        F: Fn(&Signer) -> bool,
    {
        let signer = self
            .signers
            .iter()
            .filter(|s| filter(s))
            .find(|s| s.try_acquire())?;

        self.leases.fetch_add(1, Ordering::Relaxed);
        crate::metrics::record_signer_leased();
        debug!(signer = ?signer.address(), index = signer.index(), "Signer leased");

        Some(SignerLease {
            pool: Arc::clone(self),
            signer: Arc::clone(signer),
        })
    }

    /// Give a lease back; equivalent to dropping it
    pub fn release(&self, lease: SignerLease) {
        drop(lease);
    }

    pub fn signers(&self) -> &[Arc<Signer>] {
        &self.signers
    }

    pub fn len(&self) -> usize {
        self.signers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signers.is_empty()
    }

    pub fn leased_count(&self) -> usize {
        self.signers.iter().filter(|s| s.is_leased()).count()
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            size: self.signers.len(),
            leased: self.leased_count(),
            total_leases: self.leases.load(Ordering::Relaxed),
            total_releases: self.releases.load(Ordering::Relaxed),
        }
    }
}

/// Exclusive use of one signer; released exactly once when dropped
#[derive(Debug)]
pub struct SignerLease {
    pool: Arc<SignerPool>,
    signer: Arc<Signer>,
}

impl SignerLease {
    pub fn signer(&self) -> &Arc<Signer> {
        &self.signer
    }
}

impl Deref for SignerLease {
    type Target = Signer;

    fn deref(&self) -> &Signer {
        &self.signer
    }
}

impl Drop for SignerLease {
    fn drop(&mut self) {
        self.signer.release();
        self.pool.releases.fetch_add(1, Ordering::Relaxed);
        crate::metrics::record_signer_released();
        debug!(signer = ?self.signer.address(), "Signer released");
    }
}
