//! Funding request orchestration
//!
//! `fund` tops a destination account up from whichever pooled signer is free
//! and can cover the amount, then hands the broadcast transfer to a
//! confirmation tracker and returns without waiting for it to be mined.

use super::tracker::{ConfirmationHandle, ConfirmationTracker, PendingTransaction, TxStatus};
use crate::chain::ChainClient;
use crate::config::FaucetConfig;
use crate::error::{FaucetError, FaucetResult};
use crate::signer::{SignerLease, SignerPool};
use crate::tx::GasOracle;

use chrono::Utc;
use ethers::types::{Address, BlockNumber, U256};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

/// Engine tuning, resolved from configuration and the connected network
#[derive(Debug, Clone)]
pub struct FundingConfig {
    /// Sleep between lease rounds when no funded signer is free
    pub retry_interval: Duration,
    /// Receipt polling interval
    pub poll_interval: Duration,
    /// `None` waits for a signer forever
    pub max_lease_wait: Option<Duration>,
    /// `None` tracks receipts until the node answers
    pub confirmation_timeout: Option<Duration>,
    /// Sent when the caller asks for zero
    pub default_amount: U256,
    pub gas_limit: U256,
}

impl FundingConfig {
    pub fn from_settings(faucet: &FaucetConfig, default_amount: U256, gas_limit: U256) -> Self {
        let non_zero_secs = |secs: u64| (secs > 0).then(|| Duration::from_secs(secs));

        Self {
            retry_interval: Duration::from_millis(faucet.retry_interval_ms),
            poll_interval: Duration::from_millis(faucet.poll_interval_ms),
            max_lease_wait: non_zero_secs(faucet.max_lease_wait_secs),
            confirmation_timeout: non_zero_secs(faucet.confirmation_timeout_secs),
            default_amount,
            gas_limit,
        }
    }
}

/// What the caller gets back from a funding request
#[derive(Debug)]
pub enum FundOutcome {
    /// Destination already holds more than the accepted maximum; nothing sent
    AlreadyFunded { balance: U256 },
    /// A transfer was broadcast and is being tracked in the background
    InFlight(FundingTicket),
}

impl FundOutcome {
    /// Amount now travelling to the destination, zero if nothing was sent
    pub fn amount_in_flight(&self) -> U256 {
        match self {
            FundOutcome::AlreadyFunded { .. } => U256::zero(),
            FundOutcome::InFlight(ticket) => ticket.amount,
        }
    }
}

/// Receipt for a broadcast funding transfer
#[derive(Debug)]
pub struct FundingTicket {
    pub amount: U256,
    pub transaction: PendingTransaction,
    /// Await to observe the final state, or drop to stay fire-and-forget
    pub confirmation: ConfirmationHandle,
}

/// Balance and lease state of one signer
#[derive(Debug, Clone, Serialize)]
pub struct SignerReport {
    pub index: usize,
    pub address: Address,
    pub leased: bool,
    /// `None` when the balance query failed
    pub balance: Option<U256>,
}

/// Funds destination accounts from a pool of signers
pub struct FundingEngine<C> {
    client: Arc<C>,
    pool: Arc<SignerPool>,
    gas: GasOracle,
    tracker: ConfirmationTracker<C>,
    config: FundingConfig,
    shutdown: AtomicBool,
}

impl<C: ChainClient> FundingEngine<C> {
    pub fn new(client: Arc<C>, pool: Arc<SignerPool>, gas: GasOracle, config: FundingConfig) -> Self {
        let tracker = ConfirmationTracker::new(
            Arc::clone(&client),
            config.poll_interval,
            config.confirmation_timeout,
        );

        Self {
            client,
            pool,
            gas,
            tracker,
            config,
            shutdown: AtomicBool::new(false),
        }
    }

    pub fn pool(&self) -> &Arc<SignerPool> {
        &self.pool
    }

    pub fn client(&self) -> &Arc<C> {
        &self.client
    }

    pub fn config(&self) -> &FundingConfig {
        &self.config
    }

    /// Top `destination` up with `amount` (zero means the default amount)
    /// unless its balance already exceeds `max_accepted_balance`.
    pub async fn fund(
        &self,
        destination: Address,
        max_accepted_balance: U256,
        amount: U256,
    ) -> FaucetResult<FundOutcome> {
        let span = info_span!("fund", request_id = %Uuid::new_v4(), destination = ?destination);
        let chain_id = self.client.chain_id();

        let result = self
            .fund_inner(destination, max_accepted_balance, amount)
            .instrument(span)
            .await;

        let label = match &result {
            Ok(FundOutcome::AlreadyFunded { .. }) => "already_funded",
            Ok(FundOutcome::InFlight(_)) => "in_flight",
            Err(FaucetError::NoSignerAvailable { .. }) => "no_signer",
            Err(_) => "error",
        };
        crate::metrics::record_fund_request(chain_id, label);

        result
    }

    async fn fund_inner(
        &self,
        destination: Address,
        max_accepted_balance: U256,
        amount: U256,
    ) -> FaucetResult<FundOutcome> {
        let balance = self
            .client
            .balance_of(destination, BlockNumber::Latest)
            .await?;
        if balance > max_accepted_balance {
            info!(
                balance = %balance,
                max_accepted = %max_accepted_balance,
                "Destination already funded, nothing to send"
            );
            return Ok(FundOutcome::AlreadyFunded { balance });
        }

        let amount = if amount.is_zero() {
            self.config.default_amount
        } else {
            amount
        };

        let started = Instant::now();
        loop {
            if self.shutdown.load(Ordering::Acquire) {
                return Err(FaucetError::ShuttingDown);
            }

            // Each signer is tried at most once per round
            let mut tried = HashSet::new();
            while let Some(lease) = self.pool.try_lease_where(|s| !tried.contains(&s.address())) {
                tried.insert(lease.address());

                if !self.check_enough_balance(&lease, amount).await {
                    continue;
                }

                match self.submit(lease, destination, amount).await {
                    Ok(ticket) => return Ok(FundOutcome::InFlight(ticket)),
                    Err(e) if e.skips_signer() => {
                        warn!(error = %e, "Funding attempt failed, trying another signer");
                        crate::metrics::record_signer_skip("broadcast_error");
                    }
                    Err(e) => {
                        warn!(error = %e, "Funding attempt failed");
                        return Err(e);
                    }
                }
            }

            let waited = started.elapsed();
            let mut sleep_for = self.config.retry_interval;
            if let Some(limit) = self.config.max_lease_wait {
                if waited >= limit {
                    warn!(
                        waited_secs = waited.as_secs(),
                        pool_size = self.pool.len(),
                        "No funded signer became available"
                    );
                    return Err(FaucetError::NoSignerAvailable {
                        waited_secs: waited.as_secs(),
                    });
                }
                sleep_for = sleep_for.min(limit - waited);
            }

            debug!(
                retry_in_ms = sleep_for.as_millis() as u64,
                leased = self.pool.leased_count(),
                "No funded signer available"
            );
            tokio::time::sleep(sleep_for).await;
        }
    }

    /// Whether the leased signer can cover `amount`; a failed query counts as no.
    ///
    /// The fee is not included: a signer holding exactly `amount` passes here,
    /// is rejected by the node at broadcast and skipped for the round there.
    async fn check_enough_balance(&self, lease: &SignerLease, amount: U256) -> bool {
        match self.client.balance_of(lease.address(), BlockNumber::Latest).await {
            Ok(balance) if balance >= amount => {
                debug!(signer = ?lease.address(), balance = %balance, "Signer selected");
                true
            }
            Ok(balance) => {
                info!(
                    signer = ?lease.address(),
                    balance = %balance,
                    required = %amount,
                    "Signer balance too low, skipping"
                );
                crate::metrics::record_signer_skip("insufficient_balance");
                false
            }
            Err(e) => {
                warn!(signer = ?lease.address(), error = %e, "Signer balance check failed, skipping");
                crate::metrics::record_signer_skip("balance_error");
                false
            }
        }
    }

    /// Sign and broadcast from a leased signer; the lease is released on error
    /// and moves to the confirmation tracker on success.
    async fn submit(
        &self,
        lease: SignerLease,
        destination: Address,
        amount: U256,
    ) -> FaucetResult<FundingTicket> {
        let gas_price = self.gas.gas_price(self.client.as_ref()).await;
        let chain_nonce = self.client.next_nonce(lease.address()).await?;
        let nonce = lease.nonces().next(chain_nonce);

        let transfer = lease
            .sign_transfer(destination, amount, nonce, self.config.gas_limit, gas_price)
            .await?;
        let tx_hash = self.client.broadcast(&transfer).await?;
        lease.nonces().record_sent(nonce);

        info!(
            tx_hash = ?tx_hash,
            signer = ?lease.address(),
            nonce = %nonce,
            amount = %amount,
            gas_price = %gas_price,
            "Funding transaction broadcast"
        );
        crate::metrics::record_tx_submitted(self.client.chain_id());

        let transaction = PendingTransaction {
            hash: tx_hash,
            nonce,
            signer: lease.address(),
            destination,
            amount,
            submitted_at: Utc::now(),
            status: TxStatus::Submitted,
        };
        let confirmation = self.tracker.spawn(lease, transaction.clone());

        Ok(FundingTicket {
            amount,
            transaction,
            confirmation,
        })
    }

    /// Query every signer's balance, in pool order
    pub async fn report_signers(&self) -> Vec<SignerReport> {
        let queries = self.pool.signers().iter().map(|signer| async move {
            let balance = self
                .client
                .balance_of(signer.address(), BlockNumber::Latest)
                .await
                .ok();
            SignerReport {
                index: signer.index(),
                address: signer.address(),
                leased: signer.is_leased(),
                balance,
            }
        });

        futures::future::join_all(queries).await
    }

    /// Make pending and future `fund` calls fail with `ShuttingDown`
    pub fn stop(&self) {
        self.shutdown.store(true, Ordering::Release);
        info!("Funding engine shutdown initiated");
    }
}
