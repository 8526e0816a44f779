//! Background confirmation tracking for broadcast transfers
//!
//! Each broadcast transfer gets its own detached task that polls for a
//! receipt, logs the terminal state and then gives the signer back to the
//! pool. The caller may await the returned handle or simply drop it.

use crate::chain::ChainClient;
use crate::error::FaucetError;
use crate::signer::SignerLease;

use chrono::{DateTime, Utc};
use ethers::types::{Address, H256, U256};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

/// Lifecycle status of a funding transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TxStatus {
    Submitted,
    Confirmed,
    Failed,
    Unknown,
}

/// A broadcast transfer, never persisted
#[derive(Debug, Clone, Serialize)]
pub struct PendingTransaction {
    pub hash: H256,
    pub nonce: U256,
    pub signer: Address,
    pub destination: Address,
    pub amount: U256,
    pub submitted_at: DateTime<Utc>,
    pub status: TxStatus,
}

/// Terminal state reached by a tracker
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackingOutcome {
    /// Mined with a nonzero status
    Confirmed,
    /// Mined but reverted
    Failed,
    /// Stopped watching without a receipt
    GivenUp { reason: String },
}

impl TrackingOutcome {
    pub fn status(&self) -> TxStatus {
        match self {
            TrackingOutcome::Confirmed => TxStatus::Confirmed,
            TrackingOutcome::Failed => TxStatus::Failed,
            TrackingOutcome::GivenUp { .. } => TxStatus::Unknown,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            TrackingOutcome::Confirmed => "confirmed",
            TrackingOutcome::Failed => "failed",
            TrackingOutcome::GivenUp { .. } => "given_up",
        }
    }
}

/// Optional way for a caller to observe the final state of one transfer
#[derive(Debug)]
pub struct ConfirmationHandle {
    done: oneshot::Receiver<TrackingOutcome>,
}

impl ConfirmationHandle {
    /// Wait for the tracker to finish; the signer is already released when this returns
    pub async fn wait(self) -> TrackingOutcome {
        self.done.await.unwrap_or_else(|_| TrackingOutcome::GivenUp {
            reason: "tracker task ended without reporting".to_string(),
        })
    }
}

/// Spawns receipt pollers for broadcast transfers
pub struct ConfirmationTracker<C> {
    client: Arc<C>,
    poll_interval: Duration,
    give_up_after: Option<Duration>,
}

impl<C: ChainClient> ConfirmationTracker<C> {
    pub fn new(client: Arc<C>, poll_interval: Duration, give_up_after: Option<Duration>) -> Self {
        Self {
            client,
            poll_interval,
            give_up_after,
        }
    }

    /// Watch `tx` in the background, holding `lease` until a terminal state
    pub fn spawn(&self, lease: SignerLease, tx: PendingTransaction) -> ConfirmationHandle {
        let (done_tx, done_rx) = oneshot::channel();
        let client = Arc::clone(&self.client);
        let poll_interval = self.poll_interval;
        let give_up_after = self.give_up_after;

        tokio::spawn(async move {
            let outcome = watch(client.as_ref(), tx.hash, poll_interval, give_up_after).await;
            let elapsed = (Utc::now() - tx.submitted_at).num_milliseconds() as f64 / 1000.0;

            match &outcome {
                TrackingOutcome::Confirmed => info!(
                    tx_hash = ?tx.hash,
                    signer = ?tx.signer,
                    destination = ?tx.destination,
                    amount = %tx.amount,
                    elapsed_secs = elapsed,
                    "Funding transaction confirmed"
                ),
                TrackingOutcome::Failed => warn!(
                    tx_hash = ?tx.hash,
                    signer = ?tx.signer,
                    destination = ?tx.destination,
                    "Funding transaction mined but reverted"
                ),
                TrackingOutcome::GivenUp { reason } => {
                    // The transfer may never land; let the node decide the next nonce
                    lease.nonces().forget();
                    warn!(
                        tx_hash = ?tx.hash,
                        signer = ?tx.signer,
                        reason = %reason,
                        "Stopped tracking funding transaction"
                    );
                }
            }
            crate::metrics::record_confirmation(client.chain_id(), outcome.label(), elapsed);

            drop(lease);
            let _ = done_tx.send(outcome);
        });

        ConfirmationHandle { done: done_rx }
    }
}

/// Poll for a receipt until it is found, the lookup errors or the deadline passes
async fn watch<C: ChainClient + ?Sized>(
    client: &C,
    tx_hash: H256,
    poll_interval: Duration,
    give_up_after: Option<Duration>,
) -> TrackingOutcome {
    let started = Instant::now();

    loop {
        tokio::time::sleep(poll_interval).await;

        match client.receipt_status(tx_hash).await {
            Ok(true) => return TrackingOutcome::Confirmed,
            Ok(false) => return TrackingOutcome::Failed,
            Err(FaucetError::ReceiptNotFound { .. }) => {
                if let Some(limit) = give_up_after {
                    if started.elapsed() >= limit {
                        return TrackingOutcome::GivenUp {
                            reason: format!("no receipt after {}s", limit.as_secs()),
                        };
                    }
                }
                debug!(tx_hash = ?tx_hash, "Transaction pending");
            }
            Err(e) => {
                return TrackingOutcome::GivenUp {
                    reason: e.to_string(),
                }
            }
        }
    }
}
